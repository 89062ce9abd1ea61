use scenegraph::model::{AttrValue, ConnectionRef, NodeId, NodeSpec, Point};
use scenegraph::views::{NodesListModel, SortPolicy, TableColumn, ViewEvent, ViewModel};
use scenegraph::{EditorConfig, Intent, SceneHandler};
use std::collections::BTreeSet;

fn handler_with(sort: SortPolicy) -> SceneHandler {
    SceneHandler::new(EditorConfig {
        nodes_sort: sort,
        edges_sort: sort,
        table_sort: sort,
        ..EditorConfig::default()
    })
}

fn add(h: &mut SceneHandler, spec: NodeSpec) -> NodeId {
    h.handle(Intent::AddNode(spec)).unwrap().created_node().unwrap()
}

fn port(h: &SceneHandler, node: NodeId, name: &str) -> ConnectionRef {
    h.store().node(node).unwrap().port(name).unwrap()
}

fn assert_rows_match_graph(h: &SceneHandler) {
    let live: BTreeSet<NodeId> = h.store().node_ids().collect();
    assert_eq!(h.nodes_model().ids().into_iter().collect::<BTreeSet<_>>(), live);
    let table: BTreeSet<NodeId> = (0..h.table_model().row_count())
        .filter_map(|r| h.table_model().node_at(r))
        .collect();
    assert_eq!(table, live);
    let edges: BTreeSet<_> = h.store().edge_ids().collect();
    assert_eq!(h.edges_model().ids().into_iter().collect::<BTreeSet<_>>(), edges);
    h.verify_views().unwrap();
}

#[test]
fn rows_track_the_graph_through_any_sequence() {
    for sort in [SortPolicy::None, SortPolicy::ByName, SortPolicy::ByCreationOrder] {
        let mut h = handler_with(sort);
        let a = add(&mut h, NodeSpec::new("m", Point::default()).with_output("out"));
        let b = add(&mut h, NodeSpec::new("c", Point::default()).with_input("in"));
        let c = add(&mut h, NodeSpec::new("x", Point::default()).with_input("in"));
        assert_rows_match_graph(&h);
        h.handle(Intent::Connect { source: port(&h, a, "out"), target: port(&h, b, "in") })
            .unwrap();
        h.handle(Intent::Connect { source: port(&h, a, "out"), target: port(&h, c, "in") })
            .unwrap();
        assert_rows_match_graph(&h);
        h.handle(Intent::RenameNode { node: a, name: "a".into() }).unwrap();
        h.handle(Intent::DeleteNodes(vec![b])).unwrap();
        assert_rows_match_graph(&h);
        h.handle(Intent::Undo).unwrap();
        h.handle(Intent::Undo).unwrap();
        assert_rows_match_graph(&h);
        h.handle(Intent::Redo).unwrap();
        h.handle(Intent::DeleteNodes(vec![a, c])).unwrap();
        assert_rows_match_graph(&h);
        while h.stack().can_undo() {
            h.handle(Intent::Undo).unwrap();
            assert_rows_match_graph(&h);
        }
    }
}

#[test]
fn attribute_edit_emits_one_narrow_event() {
    let mut h = handler_with(SortPolicy::None);
    let a = add(
        &mut h,
        NodeSpec::new("A", Point::default()).with_attribute("gain", 1.0),
    );
    add(&mut h, NodeSpec::new("B", Point::default()));
    for view in h.views_mut().all_mut() {
        view.take_events();
    }

    h.handle(Intent::SetAttribute { node: a, name: "gain".into(), value: AttrValue::Float(2.0) })
        .unwrap();

    let column = h.table_model().attribute_column("gain").unwrap();
    let views = h.views_mut();
    assert_eq!(
        views.table.take_events(),
        vec![ViewEvent::DataChanged { row: 0, column: Some(column) }]
    );
    assert_eq!(
        views.nodes.take_events(),
        vec![ViewEvent::DataChanged { row: 0, column: Some(NodesListModel::COLUMN_ATTRIBUTES) }]
    );
    assert!(views.edges.take_events().is_empty());
    assert_eq!(views.nodes.take_dirty(), vec![a]);
    assert_eq!(h.table_model().cell(0, column), Some("2".to_string()));
}

#[test]
fn attribute_columns_come_and_go() {
    let mut h = handler_with(SortPolicy::None);
    let a = add(&mut h, NodeSpec::new("A", Point::default()));
    h.views_mut().table.take_events();

    h.handle(Intent::SetAttribute {
        node: a,
        name: "color".into(),
        value: AttrValue::Color([255, 0, 0, 255]),
    })
    .unwrap();
    let table = h.table_model();
    assert_eq!(table.headers(), vec!["name", "x", "y", "color"]);
    assert_eq!(table.column(3), Some(TableColumn::Attribute("color".into())));
    assert_eq!(table.cell(0, 3), Some("#ff0000ff".to_string()));
    assert!(h.views_mut().table.take_events().contains(&ViewEvent::ColumnInserted { column: 3 }));

    h.handle(Intent::RemoveAttribute { node: a, name: "color".into() }).unwrap();
    assert_eq!(h.table_model().column_count(), 3);
    assert!(h.views_mut().table.take_events().contains(&ViewEvent::ColumnRemoved { column: 3 }));
}

#[test]
fn move_patches_only_changed_coordinates() {
    let mut h = handler_with(SortPolicy::None);
    let a = add(&mut h, NodeSpec::new("A", Point::new(1.0, 2.0)));
    h.views_mut().table.take_events();
    h.handle(Intent::MoveNode { node: a, to: Point::new(1.0, 9.0) }).unwrap();
    assert_eq!(
        h.views_mut().table.take_events(),
        vec![ViewEvent::DataChanged { row: 0, column: Some(2) }]
    );
}

#[test]
fn rename_under_name_sort_moves_the_row() {
    let mut h = handler_with(SortPolicy::ByName);
    let a = add(&mut h, NodeSpec::new("alpha", Point::default()));
    add(&mut h, NodeSpec::new("beta", Point::default()));
    add(&mut h, NodeSpec::new("gamma", Point::default()));
    h.views_mut().nodes.take_events();

    h.handle(Intent::RenameNode { node: a, name: "zeta".into() }).unwrap();
    assert_eq!(h.nodes_model().names(), vec!["beta", "gamma", "zeta"]);
    assert_eq!(
        h.views_mut().nodes.take_events(),
        vec![
            ViewEvent::RowMoved { from: 0, to: 2 },
            ViewEvent::DataChanged { row: 2, column: Some(NodesListModel::COLUMN_NAME) },
        ]
    );
}

#[test]
fn creation_order_restores_undone_rows_in_place() {
    let mut h = handler_with(SortPolicy::ByCreationOrder);
    let a = add(&mut h, NodeSpec::new("A", Point::default()));
    let b = add(&mut h, NodeSpec::new("B", Point::default()));
    let c = add(&mut h, NodeSpec::new("C", Point::default()));
    h.handle(Intent::DeleteNodes(vec![b])).unwrap();
    assert_eq!(h.nodes_model().ids(), vec![a, c]);
    h.handle(Intent::Undo).unwrap();
    assert_eq!(h.nodes_model().ids(), vec![a, b, c]);
}

#[test]
fn renaming_a_node_relabels_its_edges() {
    let mut h = handler_with(SortPolicy::None);
    let a = add(&mut h, NodeSpec::new("A", Point::default()).with_output("out1"));
    let b = add(&mut h, NodeSpec::new("B", Point::default()).with_input("in1"));
    h.handle(Intent::Connect { source: port(&h, a, "out1"), target: port(&h, b, "in1") })
        .unwrap();
    h.handle(Intent::RenameNode { node: b, name: "Sink".into() }).unwrap();
    assert_eq!(h.edges_model().labels(), vec!["A.out1 -> Sink.in1".to_string()]);
    assert_eq!(h.edges_model().row(0).map(|r| r.target_label.as_str()), Some("Sink.in1"));
}
