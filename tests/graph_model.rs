use scenegraph::error::GraphError;
use scenegraph::graph::{ChangeKind, ChangeSet, Graph, GraphListener, GraphStore};
use scenegraph::model::{AttrValue, ConnectionRef, ItemRef, NodeId, NodeSpec, Point};
use std::cell::RefCell;
use std::rc::Rc;

struct Log {
    name: &'static str,
    seen: Rc<RefCell<Vec<(&'static str, usize)>>>,
}

impl GraphListener for Log {
    fn on_change(&mut self, graph: &GraphStore, change: &ChangeSet) {
        // Listeners observe the committed state, never a partial one.
        assert!(graph.edges().all(|e| graph.contains_node(e.source.node)));
        self.seen.borrow_mut().push((self.name, change.len()));
    }
}

fn port(graph: &Graph, node: NodeId, name: &str) -> ConnectionRef {
    graph.store().node(node).unwrap().port(name).unwrap()
}

#[test]
fn listeners_run_in_registration_order() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut graph = Graph::new();
    let first = graph.subscribe(Box::new(Log { name: "first", seen: seen.clone() }));
    graph.subscribe(Box::new(Log { name: "second", seen: seen.clone() }));

    graph.add_node(NodeSpec::new("A", Point::default())).unwrap();
    assert_eq!(*seen.borrow(), vec![("first", 1), ("second", 1)]);

    assert!(graph.unsubscribe(first));
    assert!(!graph.unsubscribe(first));
    graph.add_node(NodeSpec::new("B", Point::default())).unwrap();
    assert_eq!(seen.borrow().last(), Some(&("second", 1)));
    assert_eq!(seen.borrow().len(), 3);
}

#[test]
fn transaction_batches_into_one_change_set() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut graph = Graph::new();
    graph.subscribe(Box::new(Log { name: "log", seen: seen.clone() }));

    graph.begin_transaction().unwrap();
    let a = graph
        .add_node(NodeSpec::new("A", Point::default()).with_output("out1"))
        .unwrap();
    let b = graph
        .add_node(NodeSpec::new("B", Point::default()).with_input("in1"))
        .unwrap();
    graph.add_edge(port(&graph, a, "out1"), port(&graph, b, "in1")).unwrap();
    assert!(seen.borrow().is_empty());
    let change = graph.commit_transaction().unwrap();

    assert_eq!(change.count(ChangeKind::NodeAdded), 2);
    assert_eq!(change.count(ChangeKind::EdgeAdded), 1);
    assert_eq!(*seen.borrow(), vec![("log", 3)]);
}

#[test]
fn commit_without_begin_is_rejected() {
    let mut graph = Graph::new();
    assert_eq!(graph.commit_transaction(), Err(GraphError::TransactionNotOpen));
    assert_eq!(graph.rollback_transaction(), Err(GraphError::TransactionNotOpen));
}

#[test]
fn failed_step_rolls_back_the_whole_operation() {
    let mut graph = Graph::new();
    let a = graph
        .add_node(NodeSpec::new("A", Point::default()).with_output("out1"))
        .unwrap();
    let b = graph
        .add_node(NodeSpec::new("B", Point::default()).with_input("in1"))
        .unwrap();
    let before = graph.store().clone();

    graph.begin_transaction().unwrap();
    graph.remove_node(a).unwrap();
    let err = graph.add_edge(port(&graph, b, "in1"), port(&graph, b, "in1")).unwrap_err();
    assert_eq!(err, GraphError::SameNode(b));
    graph.rollback_transaction().unwrap();

    assert_eq!(graph.store(), &before);
}

#[test]
fn edge_queries_follow_linkage() {
    let mut graph = Graph::new();
    let a = graph
        .add_node(NodeSpec::new("A", Point::default()).with_output("out1"))
        .unwrap();
    let b = graph
        .add_node(NodeSpec::new("B", Point::default()).with_input("in1"))
        .unwrap();
    let c = graph
        .add_node(NodeSpec::new("C", Point::default()).with_input("in1"))
        .unwrap();
    let out1 = port(&graph, a, "out1");
    let ab = graph.add_edge(out1, port(&graph, b, "in1")).unwrap();
    let ac = graph.add_edge(out1, port(&graph, c, "in1")).unwrap();

    let store = graph.store();
    assert_eq!(store.edges_from(out1), &[ab, ac]);
    assert_eq!(store.edge_into(port(&graph, c, "in1")), Some(ac));
    assert_eq!(store.edges_of_node(a), vec![ab, ac]);
    assert_eq!(store.connection_label(out1), "A.out1");
}

#[test]
fn attribute_kind_is_fixed_once_set() {
    let mut graph = Graph::new();
    let a = graph
        .add_node(NodeSpec::new("A", Point::default()).with_attribute("label", "x"))
        .unwrap();
    let err = graph.set_attribute(a, "label", AttrValue::Int(3)).unwrap_err();
    assert!(matches!(err, GraphError::TypeMismatch { .. }));
    assert_eq!(
        graph.remove_attribute(a, "missing"),
        Err(GraphError::NotFound(ItemRef::Attribute(a, "missing".to_string())))
    );
}

#[test]
fn store_snapshot_serializes_in_insertion_order() {
    let mut graph = Graph::new();
    graph.add_node(NodeSpec::new("Z", Point::default())).unwrap();
    graph.add_node(NodeSpec::new("A", Point::default())).unwrap();
    let json = serde_json::to_value(graph.store()).unwrap();
    let names: Vec<&str> = json["nodes"]
        .as_object()
        .unwrap()
        .values()
        .map(|n| n["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Z", "A"]);
}
