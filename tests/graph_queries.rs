//! Graph traversal end-to-end behavior: BFS ordering, depth bounds, and
//! the boundary cases around an unknown start node.

use memora::{Edge, EdgeKind, Memora, MemoraError, Node, NodeId};
use tempfile::tempdir;

#[test]
fn bfs_follows_edges_in_order_and_respects_depth() {
    let dir = tempdir().unwrap();
    let mut db = Memora::open(dir.path()).unwrap();

    db.insert_node(Node::with_text_label(NodeId::new(1), "a")).unwrap();
    db.insert_node(Node::with_text_label(NodeId::new(2), "b")).unwrap();
    db.insert_node(Node::with_text_label(NodeId::new(3), "c")).unwrap();
    db.insert_edge(Edge {
        from: NodeId::new(1),
        to: NodeId::new(2),
        kind: EdgeKind::Related,
    })
    .unwrap();
    db.insert_edge(Edge {
        from: NodeId::new(2),
        to: NodeId::new(3),
        kind: EdgeKind::Related,
    })
    .unwrap();

    let from_one = db.query_related(NodeId::new(1), 2, None).unwrap();
    assert_eq!(from_one, vec![NodeId::new(1), NodeId::new(2), NodeId::new(3)]);

    let from_three = db.query_related(NodeId::new(3), 1, None).unwrap();
    assert_eq!(from_three, vec![NodeId::new(3)]);
}

#[test]
fn zero_depth_returns_only_the_start_node() {
    let dir = tempdir().unwrap();
    let mut db = Memora::open(dir.path()).unwrap();
    db.insert_node(Node::with_text_label(NodeId::new(1), "a")).unwrap();

    let result = db.query_related(NodeId::new(1), 0, None).unwrap();
    assert_eq!(result, vec![NodeId::new(1)]);
}

#[test]
fn unknown_start_node_is_not_found() {
    let dir = tempdir().unwrap();
    let db = Memora::open(dir.path()).unwrap();

    let err = db.query_related(NodeId::new(99), 0, None).unwrap_err();
    assert!(matches!(err, MemoraError::NotFound { .. }));
}

#[test]
fn duplicate_edge_insert_is_rejected_and_invalid_edge_never_reaches_the_log() {
    let dir = tempdir().unwrap();
    let mut db = Memora::open(dir.path()).unwrap();
    db.insert_node(Node::with_text_label(NodeId::new(1), "a")).unwrap();

    let edge = Edge {
        from: NodeId::new(1),
        to: NodeId::new(2),
        kind: EdgeKind::Related,
    };
    let err = db.insert_edge(edge).unwrap_err();
    assert!(matches!(err, MemoraError::NotFound { .. }));

    let stats = db.get_stats();
    assert_eq!(stats.edge_count, 0);
}
