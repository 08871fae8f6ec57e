//! Property tests for undo and redo over random modeling sessions.

use canopy::{
    DiagramPayload, Modeler,
    config::AppConfig,
    element::{Element, ElementKind},
    geometry::{Bounds, Point},
    identifier::Id,
    semantic::SemanticNode,
};
use proptest::prelude::*;

type Snapshot = (Vec<Element>, Vec<SemanticNode>);

fn snapshot(modeler: &Modeler) -> Snapshot {
    let diagram = modeler.diagram();
    let mut elements: Vec<Element> = diagram
        .canvas()
        .registry()
        .all()
        .into_iter()
        .cloned()
        .collect();
    elements.sort_by_key(|element| element.id().to_string());
    let mut nodes: Vec<SemanticNode> = diagram.semantics().nodes().cloned().collect();
    nodes.sort_by_key(|node| node.id().to_string());
    (elements, nodes)
}

const SEED: &str = r#"
    [semantic]
    root = "Definitions_1"
    nodes = [
        { id = "Definitions_1", kind = "bpmn:Definitions" },
        { id = "Process_1", kind = "bpmn:Process", parent = "Definitions_1" },
        { id = "Task_A", kind = "bpmn:Task", parent = "Process_1" },
        { id = "Task_B", kind = "bpmn:Task", parent = "Process_1" },
    ]

    [root]
    id = "Process_1_di"
    business_object = "Process_1"

    [[elements]]
    kind = "shape"
    id = "Task_A"
    type = "bpmn:Task"
    business_object = "Task_A"
    bounds = { x = 0.0, y = 0.0, width = 100.0, height = 80.0 }

    [[elements]]
    kind = "shape"
    id = "Task_B"
    type = "bpmn:Task"
    business_object = "Task_B"
    bounds = { x = 300.0, y = 0.0, width = 100.0, height = 80.0 }
"#;

fn seeded() -> Modeler {
    let payload: DiagramPayload = toml::from_str(SEED).expect("Failed to parse payload");
    let mut modeler = Modeler::new(AppConfig::default()).expect("Failed to create modeler");
    modeler.import(payload).expect("Failed to import payload");
    modeler
}

#[derive(Debug, Clone)]
enum Op {
    Create { x: i16, y: i16 },
    Append { source: usize },
    Connect { source: usize, target: usize },
    Move { element: usize, dx: i16, dy: i16, into: Option<usize> },
    Resize { element: usize, grow: u8 },
    Label { element: usize, text: Option<String> },
    Delete { element: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-500i16..500, -500i16..500).prop_map(|(x, y)| Op::Create { x, y }),
        any::<usize>().prop_map(|source| Op::Append { source }),
        (any::<usize>(), any::<usize>()).prop_map(|(source, target)| Op::Connect { source, target }),
        (any::<usize>(), -200i16..200, -200i16..200, proptest::option::of(any::<usize>()))
            .prop_map(|(element, dx, dy, into)| Op::Move { element, dx, dy, into }),
        (any::<usize>(), 1u8..100).prop_map(|(element, grow)| Op::Resize { element, grow }),
        (any::<usize>(), proptest::option::of("[a-z]{1,8}"))
            .prop_map(|(element, text)| Op::Label { element, text }),
        any::<usize>().prop_map(|element| Op::Delete { element }),
    ]
}

fn shapes(modeler: &Modeler) -> Vec<Id> {
    let mut ids: Vec<Id> = modeler
        .diagram()
        .canvas()
        .registry()
        .filter(|element| element.kind() == ElementKind::Shape)
        .iter()
        .map(|element| element.id())
        .collect();
    ids.sort_by_key(Id::to_string);
    ids
}

fn pick(ids: &[Id], index: usize) -> Option<Id> {
    (!ids.is_empty()).then(|| ids[index % ids.len()])
}

/// Applies `op`. Returns whether it was recorded as a transaction.
fn apply(modeler: &mut Modeler, op: &Op) -> bool {
    let shapes = shapes(modeler);
    let result = match op {
        Op::Create { x, y } => {
            let bounds = Bounds::new(f32::from(*x), f32::from(*y), 100.0, 80.0);
            modeler.create_shape("bpmn:Task", bounds, None).map(drop)
        }
        Op::Append { source } => match pick(&shapes, *source) {
            Some(source) => modeler.append_shape(source, "bpmn:Task", None).map(drop),
            None => return false,
        },
        Op::Connect { source, target } => match (pick(&shapes, *source), pick(&shapes, *target)) {
            (Some(source), Some(target)) => modeler.connect(source, target, None).map(drop),
            _ => return false,
        },
        Op::Move { element, dx, dy, into } => match pick(&shapes, *element) {
            Some(element) => {
                let into = into.and_then(|index| pick(&shapes, index));
                let delta = Point::new(f32::from(*dx), f32::from(*dy));
                modeler.move_elements(&[element], delta, into)
            }
            None => return false,
        },
        Op::Resize { element, grow } => match pick(&shapes, *element) {
            Some(element) => {
                let bounds = modeler
                    .diagram()
                    .element(element)
                    .and_then(Element::bounds)
                    .unwrap_or_default();
                let grown = Bounds::new(
                    bounds.x(),
                    bounds.y(),
                    bounds.width() + f32::from(*grow),
                    bounds.height() + f32::from(*grow),
                );
                modeler.resize_shape(element, grown)
            }
            None => return false,
        },
        Op::Label { element, text } => match pick(&shapes, *element) {
            Some(element) => modeler.update_label(element, text.as_deref().unwrap_or("")),
            None => return false,
        },
        Op::Delete { element } => match pick(&shapes, *element) {
            Some(element) => modeler.delete_elements(&[element]),
            None => return false,
        },
    };
    result.is_ok()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_undo_restores_every_prior_state(ops in prop::collection::vec(op(), 1..12)) {
        let mut modeler = seeded();
        let mut states = Vec::new();

        for op in &ops {
            let before = snapshot(&modeler);
            let len = modeler.stack().len();
            if apply(&mut modeler, op) {
                states.push(before);
            } else {
                // A failed operation leaves no trace.
                prop_assert_eq!(snapshot(&modeler), before);
                prop_assert_eq!(modeler.stack().len(), len);
            }
        }

        let last = snapshot(&modeler);
        for expected in states.iter().rev() {
            prop_assert!(modeler.undo().unwrap());
            prop_assert_eq!(&snapshot(&modeler), expected);
        }
        prop_assert!(!modeler.undo().unwrap());

        for _ in &states {
            prop_assert!(modeler.redo().unwrap());
        }
        prop_assert!(!modeler.redo().unwrap());
        prop_assert_eq!(snapshot(&modeler), last);
    }

    #[test]
    fn prop_execute_undo_redo_round_trip(ops in prop::collection::vec(op(), 1..8)) {
        let mut modeler = seeded();

        for op in &ops {
            if apply(&mut modeler, op) {
                let after = snapshot(&modeler);
                prop_assert!(modeler.undo().unwrap());
                prop_assert!(modeler.redo().unwrap());
                prop_assert_eq!(snapshot(&modeler), after);
            }
        }
    }
}
