//! Test helper factories
//!
//! Record builders with sensible defaults and small graph fixtures shared by
//! the unit tests of every analytics stage.
#![allow(dead_code)]

use crate::graph::models::{InteractionGraph, InteractionType};
use crate::graph::records::{AuthorRef, CommentRecord, PostRecord, SubmoltRef};

// ============================================================================
// Record builders
// ============================================================================

pub fn post(id: &str, author: Option<&str>, submolt: &str) -> PostRecord {
    PostRecord {
        id: id.to_string(),
        author: author.map(|a| AuthorRef::Name(a.to_string())),
        submolt: Some(SubmoltRef::Name(submolt.to_string())),
        created_at: Some("2026-01-30T12:00:00Z".to_string()),
        ..Default::default()
    }
}

/// Top-level comment on `post_id`.
pub fn comment(id: &str, post_id: &str, author: Option<&str>) -> CommentRecord {
    CommentRecord {
        id: id.to_string(),
        post_id: post_id.to_string(),
        author: author.map(|a| AuthorRef::Name(a.to_string())),
        created_at: Some("2026-01-30T13:00:00Z".to_string()),
        ..Default::default()
    }
}

/// Reply to comment `parent_id` on `post_id`.
pub fn reply(id: &str, post_id: &str, parent_id: &str, author: Option<&str>) -> CommentRecord {
    CommentRecord {
        parent_id: Some(parent_id.to_string()),
        ..comment(id, post_id, author)
    }
}

// ============================================================================
// Graph fixtures
// ============================================================================

/// Graph from `(source, target)` pairs; nodes in order of first appearance.
pub fn make_graph(edges: &[(&str, &str)]) -> InteractionGraph {
    let mut g = InteractionGraph::new();
    for (from, to) in edges {
        g.ensure_agent(from);
        g.ensure_agent(to);
        g.record_interaction(from, to, InteractionType::Reply, "p");
    }
    g
}

/// center → leaf_0..leaf_{n-1}
pub fn make_star_graph(n_leaves: usize) -> InteractionGraph {
    let mut g = InteractionGraph::new();
    g.ensure_agent("center");
    for i in 0..n_leaves {
        let leaf = format!("leaf_{}", i);
        g.ensure_agent(&leaf);
        g.record_interaction("center", &leaf, InteractionType::Reply, "p");
    }
    g
}

/// node_0 → node_1 → ... → node_{n-1}
pub fn make_chain_graph(n: usize) -> InteractionGraph {
    let mut g = InteractionGraph::new();
    for i in 0..n {
        g.ensure_agent(&format!("node_{}", i));
    }
    for i in 1..n {
        g.record_interaction(
            &format!("node_{}", i - 1),
            &format!("node_{}", i),
            InteractionType::Reply,
            "p",
        );
    }
    g
}

/// Every ordered pair connected.
pub fn make_complete_graph(n: usize) -> InteractionGraph {
    let mut g = InteractionGraph::new();
    let names: Vec<String> = (0..n).map(|i| format!("node_{}", i)).collect();
    for name in &names {
        g.ensure_agent(name);
    }
    for a in &names {
        for b in &names {
            if a != b {
                g.record_interaction(a, b, InteractionType::Reply, "p");
            }
        }
    }
    g
}

/// Two fully connected cliques `a_*` and `b_*`, optionally bridged by `a_0 → b_0`.
///
/// Nodes are inserted as all `a_*` followed by all `b_*`.
pub fn make_two_cliques(size: usize, bridge: bool) -> InteractionGraph {
    let mut g = InteractionGraph::new();
    for prefix in ["a", "b"] {
        let names: Vec<String> = (0..size).map(|i| format!("{}_{}", prefix, i)).collect();
        for name in &names {
            g.ensure_agent(name);
        }
        for x in &names {
            for y in &names {
                if x != y {
                    g.record_interaction(x, y, InteractionType::Reply, "p");
                }
            }
        }
    }
    if bridge && size > 0 {
        g.record_interaction("a_0", "b_0", InteractionType::Reply, "p");
    }
    g
}

/// Look up a per-node value by agent name.
pub fn score_of(g: &InteractionGraph, values: &[f64], id: &str) -> f64 {
    let idx = g
        .get_index(id)
        .unwrap_or_else(|| panic!("no agent named {}", id));
    values[idx.index()]
}
