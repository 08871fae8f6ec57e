//! Label commands.

use canopy_core::{
    canvas::RemovedElement,
    element::{Element, ElementKind},
    geometry::{Bounds, Point, Size},
    identifier::Id,
};

use super::{run, ModelingScope, TypedHandler};
use crate::{
    config::ModelingConfig,
    diagram::Diagram,
    error::{ModelingError, Result},
};

/// Attribute of the business object that mirrors the label text.
pub const NAME_ATTRIBUTE: &str = "name";

/// Where a new label for `target` goes: centered below a shape, centered on
/// the midpoint of a connection.
pub fn default_label_bounds(target: &Element, size: Size) -> Option<Bounds> {
    match target.bounds() {
        Some(bounds) => {
            let center = Point::new(
                bounds.center().x(),
                bounds.max_y() + size.height() / 2.0,
            );
            Some(Bounds::new_from_center(center, size))
        }
        None => target
            .anchor()
            .map(|anchor| Bounds::new_from_center(anchor, size)),
    }
}

/// Context of `label.create`.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCreate {
    pub label: Id,
    pub target: Id,
    pub text: String,
    pub bounds: Bounds,
    /// Defaults to the target's parent.
    pub parent: Option<Id>,
}

impl LabelCreate {
    pub fn new(label: Id, target: Id, text: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            label,
            target,
            text: text.into(),
            bounds,
            parent: None,
        }
    }
}

pub(crate) struct CreateLabelHandler;

impl TypedHandler for CreateLabelHandler {
    type Ctx = LabelCreate;

    fn execute(&self, context: &mut LabelCreate, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let target = diagram.canvas().require(context.target)?;
        let parent = context.parent.or(target.parent()).ok_or_else(|| {
            ModelingError::invalid(format!("`{}` has no parent to hold a label", context.target))
        })?;

        let label = Element::label(
            context.label,
            "label",
            context.target,
            context.bounds,
            context.text.as_str(),
        );
        diagram.canvas_mut().add_element(label, parent, None)?;
        context.parent = Some(parent);
        Ok(vec![context.label, context.target])
    }

    fn revert(&self, context: &LabelCreate, diagram: &mut Diagram) -> Result<Vec<Id>> {
        diagram.canvas_mut().remove_element(context.label)?;
        Ok(vec![context.label, context.target])
    }
}

/// Context of `label.delete`.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDelete {
    pub label: Id,
    removed: Option<RemovedElement>,
}

impl LabelDelete {
    pub fn new(label: Id) -> Self {
        Self {
            label,
            removed: None,
        }
    }
}

pub(crate) struct DeleteLabelHandler;

impl TypedHandler for DeleteLabelHandler {
    type Ctx = LabelDelete;

    fn execute(&self, context: &mut LabelDelete, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let element = diagram.canvas().require(context.label)?;
        let target = element.label_target().ok_or_else(|| {
            ModelingError::invalid(format!(
                "`{}` is a {}, not a label",
                context.label,
                element.kind()
            ))
        })?;
        context.removed = Some(diagram.canvas_mut().remove_element(context.label)?);
        Ok(vec![context.label, target])
    }

    fn revert(&self, context: &LabelDelete, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let removed = context
            .removed
            .clone()
            .ok_or_else(|| ModelingError::invalid("label.delete reverted before execution"))?;
        let target = removed.element().label_target();
        diagram.canvas_mut().restore_element(removed)?;
        Ok([Some(context.label), target].into_iter().flatten().collect())
    }
}

/// Context of `label.update`.
///
/// Sets the text of the target's label and mirrors it to the business
/// object's `name`. Creates the label when the target has none, and deletes
/// it when the new text is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelUpdate {
    pub target: Id,
    pub text: String,
    /// Id for a label this update has to create. Defaults to `<target>_label`.
    pub label: Option<Id>,
    /// Previous label text, when a label existed.
    old_text: Option<String>,
    /// Previous `name`, when the target has a business object.
    old_name: Option<Option<String>>,
}

impl LabelUpdate {
    pub fn new(target: Id, text: impl Into<String>) -> Self {
        Self {
            target,
            text: text.into(),
            label: None,
            old_text: None,
            old_name: None,
        }
    }

    /// Names the label created when the target has none yet.
    pub fn with_label(mut self, label: Option<Id>) -> Self {
        self.label = label;
        self
    }
}

pub(crate) struct UpdateLabelHandler {
    config: ModelingConfig,
}

impl UpdateLabelHandler {
    pub(crate) fn new(config: ModelingConfig) -> Self {
        Self { config }
    }
}

impl TypedHandler for UpdateLabelHandler {
    type Ctx = LabelUpdate;

    fn execute(&self, context: &mut LabelUpdate, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let target = diagram.canvas().require(context.target)?;
        if !target.is_labelable() {
            return Err(ModelingError::invalid(format!(
                "{} `{}` cannot carry a label",
                target.kind(),
                context.target
            )));
        }
        let label = target.label_id();
        let business_object = target
            .business_object()
            .filter(|node| diagram.semantics().contains(*node));

        let mut touched = vec![context.target];
        context.old_text = None;
        if let Some(label) = label {
            let old = diagram
                .canvas_mut()
                .set_label_text(label, context.text.clone())?;
            context.old_text = Some(old);
            touched.push(label);
        }

        context.old_name = None;
        if let Some(node) = business_object {
            let name = (!context.text.is_empty()).then(|| context.text.clone());
            let old = diagram
                .semantics_mut()
                .set_attribute(node, NAME_ATTRIBUTE, name)?;
            context.old_name = Some(old);
        }
        Ok(touched)
    }

    fn revert(&self, context: &LabelUpdate, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let mut touched = vec![context.target];
        let target = diagram.canvas().require(context.target)?;
        let label = target.label_id();
        let business_object = target.business_object();

        if let (Some(label), Some(old)) = (label, &context.old_text) {
            diagram.canvas_mut().set_label_text(label, old.clone())?;
            touched.push(label);
        }
        if let (Some(node), Some(old)) = (business_object, &context.old_name) {
            diagram
                .semantics_mut()
                .set_attribute(node, NAME_ATTRIBUTE, old.clone())?;
        }
        Ok(touched)
    }

    fn post_execute(&self, context: &mut LabelUpdate, scope: &mut ModelingScope<'_>) -> Result<()> {
        let target = scope.target().canvas().require(context.target)?;
        match (target.label_id(), context.text.is_empty()) {
            (Some(label), true) => {
                run(scope, LabelDelete::new(label))?;
            }
            (None, false) if target.kind() != ElementKind::Root => {
                let bounds = default_label_bounds(target, self.config.label_size())
                    .ok_or_else(|| {
                        ModelingError::invalid(format!(
                            "`{}` has no position to place a label at",
                            context.target
                        ))
                    })?;
                let label = context
                    .label
                    .unwrap_or_else(|| context.target.with_suffix("label"));
                let create = LabelCreate::new(
                    label,
                    context.target,
                    context.text.as_str(),
                    bounds,
                );
                run(scope, create)?;
            }
            _ => {}
        }
        Ok(())
    }
}
