//! Integration tests for the Modeler API
//!
//! These tests drive whole modeling operations through the public facade and
//! check the resulting tree, business objects, history and events.

use std::{cell::RefCell, rc::Rc};

use canopy::{
    CanvasError, DiagramPayload, Modeler, ModelingError,
    classify::DiagramType,
    config::{AppConfig, FeaturesConfig, HistoryConfig},
    element::{Element, ElementKind},
    event::Event,
    features::MixedDiagramSupport,
    geometry::{Bounds, Point},
    identifier::Id,
    modeling::{connection::ConnectionMove, shape::ShapeAppend},
    semantic::SemanticNode,
};

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

fn sorted_ids(modeler: &Modeler) -> Vec<String> {
    let mut ids: Vec<String> = modeler
        .diagram()
        .canvas()
        .registry()
        .ids()
        .iter()
        .map(Id::to_string)
        .collect();
    ids.sort();
    ids
}

fn load(source: &str) -> Modeler {
    load_with(AppConfig::default(), source)
}

fn load_with(config: AppConfig, source: &str) -> Modeler {
    let payload: DiagramPayload = toml::from_str(source).expect("Failed to parse payload");
    let mut modeler = Modeler::new(config).expect("Failed to create modeler");
    modeler.import(payload).expect("Failed to import payload");
    modeler
}

fn record_events(modeler: &Modeler) -> Rc<RefCell<Vec<String>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    modeler
        .events()
        .subscribe(move |event: &Event| sink.borrow_mut().push(event.name()));
    events
}

const TWO_TASKS: &str = r#"
    [[elements]]
    kind = "shape"
    id = "A"
    type = "bpmn:Task"
    bounds = { x = 0.0, y = 0.0, width = 100.0, height = 80.0 }

    [[elements]]
    kind = "shape"
    id = "B"
    type = "bpmn:Task"
    parent = "Root"
    bounds = { x = 0.0, y = 200.0, width = 100.0, height = 80.0 }
"#;

const LABELED_CONNECTION: &str = r#"
    [[elements]]
    kind = "shape"
    id = "A"
    type = "bpmn:Task"
    bounds = { x = 0.0, y = 0.0, width = 100.0, height = 80.0 }

    [[elements]]
    kind = "shape"
    id = "B"
    type = "bpmn:Task"
    bounds = { x = 300.0, y = 0.0, width = 100.0, height = 80.0 }

    [[elements]]
    kind = "label"
    id = "L"
    target = "A"
    parent = "A"
    text = "Review"
    bounds = { x = 5.0, y = 80.0, width = 90.0, height = 20.0 }

    [[elements]]
    kind = "connection"
    id = "A_B"
    type = "bpmn:SequenceFlow"
    source = "A"
    target = "B"
    waypoints = [{ x = 100.0, y = 40.0 }, { x = 300.0, y = 40.0 }]
"#;

const MIXED: &str = r#"
    [semantic]
    root = "Definitions_1"
    nodes = [
        { id = "Definitions_1", kind = "bpmn:Definitions" },
        { id = "Collaboration_1", kind = "bpmn:Collaboration", parent = "Definitions_1" },
        { id = "Participant_1", kind = "bpmn:Participant", parent = "Collaboration_1", attributes = { processRef = "Process_1" } },
        { id = "Process_1", kind = "bpmn:Process", parent = "Definitions_1" },
        { id = "Process_2", kind = "bpmn:Process", parent = "Definitions_1" },
        { id = "StartEvent_2", kind = "bpmn:StartEvent", parent = "Process_2" },
    ]

    [root]
    id = "Collaboration_1_di"
    business_object = "Collaboration_1"

    [[elements]]
    kind = "shape"
    id = "Participant_1_di"
    type = "bpmn:Participant"
    business_object = "Participant_1"
    bounds = { x = 0.0, y = 0.0, width = 600.0, height = 250.0 }

    [[elements]]
    kind = "shape"
    id = "StartEvent_2_di"
    type = "bpmn:StartEvent"
    business_object = "StartEvent_2"
    bounds = { x = 50.0, y = 400.0, width = 36.0, height = 36.0 }
"#;

#[test]
fn test_new_modeler_has_root_only() {
    let modeler = Modeler::new(AppConfig::default()).expect("Failed to create modeler");

    assert_eq!(sorted_ids(&modeler), vec!["Root"]);
    assert_eq!(modeler.diagram_type(), DiagramType::None);
    assert!(!modeler.can_undo());
    assert!(!modeler.can_redo());
}

#[test]
fn test_append_shape_then_undo_restores_registry() {
    let mut modeler = load(TWO_TASKS);

    let appended = modeler
        .append_shape(Id::new("A"), "bpmn:Task", None)
        .expect("Failed to append shape");

    let shape = modeler.diagram().element(appended.shape).expect("Appended shape");
    assert_eq!(shape.parent(), Some(Id::new("Root")));
    assert_eq!(shape.bounds(), Some(Bounds::new(150.0, 0.0, 100.0, 80.0)));

    let connection = modeler
        .diagram()
        .element(appended.connection)
        .expect("Appended connection");
    assert_eq!(
        connection.endpoints(),
        Some((Id::new("A"), appended.shape))
    );
    assert_eq!(sorted_ids(&modeler).len(), 5);

    assert!(modeler.undo().unwrap());

    assert_eq!(sorted_ids(&modeler), vec!["A", "B", "Root"]);
    assert!(!modeler.diagram().semantics().contains(appended.shape));
    assert!(!modeler.diagram().semantics().contains(appended.connection));
    assert!(modeler.diagram().element(Id::new("A")).unwrap().outgoing().is_empty());
}

#[test]
fn test_append_redo_recreates_same_ids() {
    let mut modeler = load(TWO_TASKS);
    let appended = modeler
        .append_shape(Id::new("A"), "bpmn:Task", None)
        .unwrap();
    let after = snapshot(&modeler);

    modeler.undo().unwrap();
    assert!(modeler.redo().unwrap());

    assert_eq!(snapshot(&modeler), after);
    assert!(modeler.diagram().element(appended.connection).is_some());
}

#[test]
fn test_delete_elements_removes_label_and_connection() {
    let mut modeler = load(LABELED_CONNECTION);
    let before = snapshot(&modeler);

    modeler
        .delete_elements(&[Id::new("A")])
        .expect("Failed to delete");

    assert_eq!(sorted_ids(&modeler), vec!["B", "Root"]);
    let b = modeler.diagram().element(Id::new("B")).unwrap();
    assert!(b.incoming().is_empty());
    assert_eq!(modeler.stack().transaction_count(), 1);

    assert!(modeler.undo().unwrap());
    assert_eq!(snapshot(&modeler), before);
    assert!(!modeler.can_undo());
}

#[test]
fn test_classification_process_then_mixed() {
    let process = r#"
        [semantic]
        root = "Definitions_1"
        nodes = [
            { id = "Definitions_1", kind = "bpmn:Definitions" },
            { id = "Process_1", kind = "bpmn:Process", parent = "Definitions_1" },
        ]
    "#;
    let mut modeler = load(process);
    assert_eq!(modeler.diagram_type(), DiagramType::Process);

    let mut payload: DiagramPayload = toml::from_str(process).unwrap();
    payload.semantic.nodes.push(SemanticNode::new(
        Id::new("Process_2"),
        "bpmn:Process",
        Some(Id::new("Definitions_1")),
    ));
    assert_eq!(modeler.import(payload).unwrap(), DiagramType::Mixed);
    assert_eq!(modeler.diagram_type(), DiagramType::Mixed);
}

#[test]
fn test_reparent_connection_under_shape_fails_without_mutation() {
    let mut modeler = load(LABELED_CONNECTION);
    let c = modeler
        .create_shape("bpmn:Task", Bounds::new(0.0, 300.0, 100.0, 80.0), None)
        .unwrap();
    let before = snapshot(&modeler);
    let undo_before = modeler.stack().len();

    let err = modeler
        .execute(ConnectionMove::new(Id::new("A_B"), Point::default()).with_parent(Some(c)))
        .unwrap_err();

    assert!(
        matches!(err, ModelingError::Canvas(CanvasError::InvalidParent { .. })),
        "unexpected error: {err}"
    );
    assert_eq!(snapshot(&modeler), before);
    assert_eq!(modeler.stack().len(), undo_before);
}

#[test]
fn test_failed_connection_move_keeps_parent() {
    let mut modeler = load(
        r#"
        [[elements]]
        kind = "shape"
        id = "Sub"
        type = "bpmn:SubProcess"
        bounds = { x = 0.0, y = 0.0, width = 600.0, height = 300.0 }

        [[elements]]
        kind = "shape"
        id = "A"
        type = "bpmn:Task"
        parent = "Sub"
        bounds = { x = 20.0, y = 20.0, width = 100.0, height = 80.0 }

        [[elements]]
        kind = "shape"
        id = "B"
        type = "bpmn:Task"
        parent = "Sub"
        bounds = { x = 300.0, y = 20.0, width = 100.0, height = 80.0 }

        [[elements]]
        kind = "connection"
        id = "F"
        type = "bpmn:SequenceFlow"
        parent = "Sub"
        source = "A"
        target = "B"
        waypoints = [{ x = 3e38, y = 0.0 }, { x = 3e38, y = 10.0 }]
        "#,
    );
    let before = snapshot(&modeler);
    let undo_before = modeler.stack().len();

    // The shifted waypoints overflow to infinity.
    let err = modeler
        .execute(
            ConnectionMove::new(Id::new("F"), Point::new(1e38, 0.0))
                .with_parent(Some(Id::new("Root"))),
        )
        .unwrap_err();

    assert!(
        matches!(err, ModelingError::InvalidOperation(_)),
        "unexpected error: {err}"
    );
    assert_eq!(
        modeler.diagram().element(Id::new("F")).and_then(Element::parent),
        Some(Id::new("Sub"))
    );
    assert_eq!(snapshot(&modeler), before);
    assert_eq!(modeler.stack().len(), undo_before);
}

#[test]
fn test_structural_edit_reclassifies() {
    let mut modeler = load(
        r#"
        [semantic]
        root = "Definitions_1"
        nodes = [
            { id = "Definitions_1", kind = "bpmn:Definitions" },
            { id = "Process_1", kind = "bpmn:Process", parent = "Definitions_1" },
        ]

        [root]
        id = "Root"
        business_object = "Definitions_1"
        "#,
    );
    let mixed_initialized = |modeler: &Modeler| {
        modeler
            .feature(MixedDiagramSupport::NAME)
            .is_some_and(|feature| feature.initialized())
    };
    assert_eq!(modeler.diagram_type(), DiagramType::Process);
    assert!(!mixed_initialized(&modeler));

    let process = modeler
        .create_shape("bpmn:Process", Bounds::new(0.0, 400.0, 600.0, 250.0), None)
        .unwrap();
    assert_eq!(
        modeler.diagram().business_object(process).and_then(SemanticNode::parent),
        Some(Id::new("Definitions_1"))
    );
    assert_eq!(modeler.diagram_type(), DiagramType::Mixed);
    assert!(mixed_initialized(&modeler));

    modeler.undo().unwrap();
    assert_eq!(modeler.diagram_type(), DiagramType::Process);
    assert!(!mixed_initialized(&modeler));

    modeler.redo().unwrap();
    assert_eq!(modeler.diagram_type(), DiagramType::Mixed);
    assert!(mixed_initialized(&modeler));
}

#[test]
fn test_failed_compound_operation_leaves_no_trace() {
    let mut modeler = load(TWO_TASKS);
    let before = snapshot(&modeler);

    // The shape is created, then the connection id collides with `B`.
    let err = modeler
        .execute(ShapeAppend {
            source: Id::new("A"),
            shape: Id::new("C"),
            element_type: "bpmn:Task".to_string(),
            bounds: Bounds::new(150.0, 0.0, 100.0, 80.0),
            connection: Id::new("B"),
            connection_type: "bpmn:SequenceFlow".to_string(),
            semantic_parent: None,
        })
        .unwrap_err();

    assert_eq!(err, ModelingError::Canvas(CanvasError::DuplicateId(Id::new("B"))));
    assert_eq!(snapshot(&modeler), before);
    assert!(!modeler.can_undo());
    assert!(!modeler.can_redo());
}

#[test]
fn test_append_refused_by_rules() {
    let mut modeler = load(
        r#"
        [[elements]]
        kind = "shape"
        id = "End"
        type = "bpmn:EndEvent"
        bounds = { x = 0.0, y = 0.0, width = 36.0, height = 36.0 }
        "#,
    );

    let err = modeler
        .append_shape(Id::new("End"), "bpmn:Task", None)
        .unwrap_err();

    assert!(matches!(err, ModelingError::InvalidOperation(_)));
    assert_eq!(sorted_ids(&modeler), vec!["End", "Root"]);
}

#[test]
fn test_execute_after_undo_discards_redo() {
    let mut modeler = load(TWO_TASKS);
    let bounds = Bounds::new(400.0, 0.0, 100.0, 80.0);

    modeler.create_shape("bpmn:Task", bounds, None).unwrap();
    let b = modeler.create_shape("bpmn:Task", bounds, None).unwrap();
    modeler.undo().unwrap();
    let c = modeler.create_shape("bpmn:Task", bounds, None).unwrap();
    let after = snapshot(&modeler);

    assert!(!modeler.can_redo());
    assert!(!modeler.redo().unwrap());
    assert_eq!(snapshot(&modeler), after);
    assert!(modeler.diagram().element(c).is_some());
    assert!(b == c || modeler.diagram().element(b).is_none());
}

#[test]
fn test_undo_redo_at_bounds_emit_nothing() {
    let mut modeler = load(TWO_TASKS);
    let events = record_events(&modeler);

    assert!(!modeler.undo().unwrap());
    assert!(!modeler.redo().unwrap());
    assert!(events.borrow().is_empty());

    modeler.update_label(Id::new("A"), "Check").unwrap();
    assert!(!modeler.redo().unwrap());
    let count = events.borrow().len();
    assert!(!modeler.redo().unwrap());
    assert_eq!(events.borrow().len(), count);
}

#[test]
fn test_events_for_append() {
    let mut modeler = load(TWO_TASKS);
    let events = record_events(&modeler);

    modeler
        .append_shape(Id::new("A"), "bpmn:Task", None)
        .unwrap();

    let events = events.borrow();
    assert!(events.contains(&"commandStack.shape.create.executed".to_string()));
    assert!(events.contains(&"commandStack.connection.create.executed".to_string()));
    assert!(events.contains(&"commandStack.shape.append.executed".to_string()));
    assert!(events.contains(&"element.created".to_string()));
    assert_eq!(events.last().map(String::as_str), Some("commandStack.changed"));
}

#[test]
fn test_history_limit_drops_oldest_transactions() {
    let config = AppConfig::default().with_history(HistoryConfig::new(Some(2)));
    let mut modeler = load_with(config, TWO_TASKS);
    let bounds = Bounds::new(400.0, 0.0, 100.0, 80.0);

    let first = modeler.create_shape("bpmn:Task", bounds, None).unwrap();
    modeler.create_shape("bpmn:Task", bounds, None).unwrap();
    modeler.create_shape("bpmn:Task", bounds, None).unwrap();

    assert!(modeler.undo().unwrap());
    assert!(modeler.undo().unwrap());
    assert!(!modeler.undo().unwrap());
    assert!(modeler.diagram().element(first).is_some());
}

#[test]
fn test_move_shape_into_container() {
    let mut modeler = load(TWO_TASKS);
    let pool = modeler
        .create_shape("bpmn:Participant", Bounds::new(0.0, 500.0, 600.0, 250.0), None)
        .unwrap();
    let before = snapshot(&modeler);

    modeler
        .move_shape(Id::new("B"), Point::new(100.0, 350.0), Some(pool))
        .unwrap();

    let b = modeler.diagram().element(Id::new("B")).unwrap();
    assert_eq!(b.parent(), Some(pool));
    assert_eq!(b.bounds(), Some(Bounds::new(100.0, 550.0, 100.0, 80.0)));
    assert_eq!(
        modeler.diagram().business_object(Id::new("B")),
        None,
        "imported shapes without business objects keep none"
    );

    modeler.undo().unwrap();
    assert_eq!(snapshot(&modeler), before);
}

#[test]
fn test_update_label_creates_and_mirrors_name() {
    let mut modeler = Modeler::new(AppConfig::default()).unwrap();
    let task = modeler
        .create_shape("bpmn:Task", Bounds::new(0.0, 0.0, 100.0, 80.0), None)
        .unwrap();

    modeler.update_label(task, "Review").unwrap();

    let label = modeler
        .diagram()
        .element(task)
        .and_then(Element::label_id)
        .expect("Label created");
    assert_eq!(modeler.diagram().element(label).and_then(Element::text), Some("Review"));
    assert_eq!(
        modeler
            .diagram()
            .business_object(task)
            .and_then(|node| node.attribute("name")),
        Some("Review")
    );

    modeler.update_label(task, "").unwrap();
    assert!(modeler.diagram().element(label).is_none());
    assert_eq!(
        modeler
            .diagram()
            .business_object(task)
            .and_then(|node| node.attribute("name")),
        None
    );

    modeler.undo().unwrap();
    assert_eq!(
        modeler.diagram().element(label).map(Element::kind),
        Some(ElementKind::Label)
    );
}

#[test]
fn test_update_label_avoids_taken_label_id() {
    let mut modeler = load(
        r#"
        [[elements]]
        kind = "shape"
        id = "A"
        type = "bpmn:Task"
        bounds = { x = 0.0, y = 0.0, width = 100.0, height = 80.0 }

        [[elements]]
        kind = "shape"
        id = "A_label"
        type = "bpmn:Task"
        bounds = { x = 300.0, y = 0.0, width = 100.0, height = 80.0 }
        "#,
    );

    modeler.update_label(Id::new("A"), "Review").unwrap();

    let label = modeler
        .diagram()
        .element(Id::new("A"))
        .and_then(Element::label_id)
        .expect("Label created");
    assert_ne!(label, Id::new("A_label"));
    assert_eq!(
        modeler.diagram().element(label).map(Element::kind),
        Some(ElementKind::Label)
    );
    assert_eq!(
        modeler.diagram().element(Id::new("A_label")).map(Element::kind),
        Some(ElementKind::Shape)
    );

    modeler.undo().unwrap();
    assert!(modeler.diagram().element(label).is_none());

    modeler.redo().unwrap();
    assert_eq!(
        modeler.diagram().element(Id::new("A")).and_then(Element::label_id),
        Some(label)
    );
}

#[test]
fn test_mixed_append_uses_source_process() {
    let mut modeler = load(MIXED);
    assert_eq!(modeler.diagram_type(), DiagramType::Mixed);
    assert!(
        modeler
            .feature(MixedDiagramSupport::NAME)
            .is_some_and(|feature| feature.initialized())
    );

    let appended = modeler
        .append_shape(Id::new("StartEvent_2_di"), "bpmn:Task", None)
        .unwrap();

    let node = modeler.diagram().business_object(appended.shape).unwrap();
    assert_eq!(node.parent(), Some(Id::new("Process_2")));
    assert_eq!(appended.semantic_parent, Some(Id::new("Process_2")));
}

#[test]
fn test_mixed_append_without_feature_uses_root_object() {
    let config = AppConfig::default().with_features(FeaturesConfig::new(false));
    let mut modeler = load_with(config, MIXED);
    assert!(
        !modeler
            .feature(MixedDiagramSupport::NAME)
            .is_some_and(|feature| feature.initialized())
    );

    let appended = modeler
        .append_shape(Id::new("StartEvent_2_di"), "bpmn:Task", None)
        .unwrap();

    let node = modeler.diagram().business_object(appended.shape).unwrap();
    assert_eq!(node.parent(), Some(Id::new("Collaboration_1")));
}

#[test]
fn test_import_failure_keeps_current_diagram() {
    let mut modeler = load(TWO_TASKS);
    let before = snapshot(&modeler);

    let broken: DiagramPayload = toml::from_str(
        r#"
        [[elements]]
        kind = "connection"
        id = "Flow"
        type = "bpmn:SequenceFlow"
        source = "Missing"
        target = "AlsoMissing"
        "#,
    )
    .unwrap();

    assert!(modeler.import(broken).is_err());
    assert_eq!(snapshot(&modeler), before);
}

#[test]
fn test_unknown_command() {
    let mut modeler = load(TWO_TASKS);
    let context = ConnectionMove::new(Id::new("A"), Point::default()).into();

    assert_eq!(
        modeler.execute_command("shape.teleport", context).unwrap_err(),
        ModelingError::UnknownCommand("shape.teleport".to_string())
    );
}

#[test]
fn test_export_reimports_to_same_diagram() {
    let mut modeler = load(MIXED);
    let appended = modeler
        .append_shape(Id::new("StartEvent_2_di"), "bpmn:Task", None)
        .unwrap();
    modeler.update_label(appended.shape, "Review").unwrap();
    modeler.delete_elements(&[Id::new("Participant_1_di")]).unwrap();
    let before = snapshot(&modeler);

    let exported = modeler.export();
    assert!(
        exported
            .semantic
            .nodes
            .iter()
            .all(|node| node.id() != Id::new("Participant_1")),
        "deleted business objects are not exported"
    );

    let text = toml::to_string(&exported).expect("Failed to serialize payload");
    let reparsed: DiagramPayload = toml::from_str(&text).expect("Failed to parse export");
    let mut reloaded = Modeler::new(AppConfig::default()).unwrap();
    reloaded.import(reparsed).unwrap();

    let (elements, _) = snapshot(&reloaded);
    assert_eq!(elements, before.0);
    assert!(!reloaded.can_undo());
}
