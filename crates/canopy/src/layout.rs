//! Straight-line connection routing.
//!
//! Connections run from the source's anchor to the target's anchor. Ends on
//! shapes are cropped to the shape outline. Ends on connections dock at the
//! midpoint of that connection's route, or between its endpoints when it has
//! no waypoints.

use canopy_core::{
    canvas::Canvas,
    element::Element,
    geometry::{Bounds, Point},
    identifier::Id,
    CanvasError,
};

/// Gap between a shape and the detour of a connection looping back to it.
const LOOP_OFFSET: f32 = 20.0;

/// How many connections deep an anchor lookup follows endpoints.
const MAX_ANCHOR_DEPTH: usize = 8;

/// Computes waypoints for a connection between `source` and `target`.
///
/// # Errors
///
/// Returns [`CanvasError::NotFound`] for a missing endpoint, and
/// [`CanvasError::InvalidOperation`] if an endpoint has no position at all
/// (a chain of connections without waypoints that never reaches a shape).
pub fn route(canvas: &Canvas, source: Id, target: Id) -> Result<Vec<Point>, CanvasError> {
    let source_element = canvas.require(source)?;
    let target_element = canvas.require(target)?;

    if source == target {
        if let Some(bounds) = source_element.bounds() {
            return Ok(self_loop(bounds));
        }
    }

    let source_anchor = anchor(canvas, source_element, 0)?;
    let target_anchor = anchor(canvas, target_element, 0)?;

    Ok(vec![
        dock(source_element, source_anchor, target_anchor),
        dock(target_element, target_anchor, source_anchor),
    ])
}

fn anchor(canvas: &Canvas, element: &Element, depth: usize) -> Result<Point, CanvasError> {
    if let Some(anchor) = element.anchor() {
        return Ok(anchor);
    }

    // A connection without waypoints sits between its endpoints.
    if let Some((source, target)) = element.endpoints() {
        if depth < MAX_ANCHOR_DEPTH {
            let from = anchor(canvas, canvas.require(source)?, depth + 1)?;
            let to = anchor(canvas, canvas.require(target)?, depth + 1)?;
            return Ok(from.midpoint(to));
        }
    }

    Err(CanvasError::InvalidOperation(format!(
        "{} `{}` has no position to connect to",
        element.kind(),
        element.id()
    )))
}

fn dock(element: &Element, anchor: Point, toward: Point) -> Point {
    match element.bounds() {
        Some(bounds) => bounds.border_point(toward),
        None => anchor,
    }
}

/// Leaves through the right edge and re-enters through the top.
fn self_loop(bounds: Bounds) -> Vec<Point> {
    let center = bounds.center();
    let right = bounds.max_x() + LOOP_OFFSET;
    let top = bounds.y() - LOOP_OFFSET;
    vec![
        Point::new(bounds.max_x(), center.y()),
        Point::new(right, center.y()),
        Point::new(right, top),
        Point::new(center.x(), top),
        Point::new(center.x(), bounds.y()),
    ]
}
