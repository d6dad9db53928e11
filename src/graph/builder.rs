//! Records → petgraph construction.
//!
//! Converts the collector's record collections into an [`InteractionGraph`].
//! Never fails: malformed records are skipped, counted in the [`BuildReport`]
//! and logged at debug level.
//!
//! ## Node order
//!
//! Agents are inserted in the order they first appear as an author (posts in
//! input order, then comments in input order). Every later stage iterates
//! nodes in this order, which pins all tie-breaks.
//!
//! ## Edge rule
//!
//! - reply to a comment → `comment author → parent comment author` (`reply`)
//! - top-level comment → `comment author → post author` (`same_thread`)
//!
//! Self-interactions are dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::models::{InteractionGraph, InteractionType};
use super::records::{CommentRecord, PostRecord, RecordSet};

/// Counts of what the builder consumed and skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub posts: usize,
    pub comments: usize,
    /// Interactions recorded (sum of edge weights)
    pub interactions: usize,
    /// Records the source could not parse at all
    pub skipped_malformed: usize,
    pub skipped_missing_author: usize,
    pub skipped_unknown_post: usize,
    pub skipped_unknown_parent: usize,
    pub skipped_self_interactions: usize,
    /// Agent records merged into graph nodes
    pub agents_merged: usize,
    /// Leaderboard entries matched to graph nodes
    pub leaderboard_matched: usize,
}

impl BuildReport {
    pub fn skipped(&self) -> usize {
        self.skipped_malformed
            + self.skipped_missing_author
            + self.skipped_unknown_post
            + self.skipped_unknown_parent
            + self.skipped_self_interactions
    }
}

/// Builds interaction graphs from record collections.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder;

impl GraphBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the directed interaction graph for one analysis run.
    pub fn build(&self, records: &RecordSet) -> (InteractionGraph, BuildReport) {
        let mut report = BuildReport {
            posts: records.posts.len(),
            comments: records.comments.len(),
            skipped_malformed: records.malformed,
            ..Default::default()
        };
        let mut graph =
            InteractionGraph::with_capacity(records.agents.len(), records.comments.len());

        let posts: HashMap<&str, &PostRecord> =
            records.posts.iter().map(|p| (p.id.as_str(), p)).collect();
        let comments: HashMap<&str, &CommentRecord> =
            records.comments.iter().map(|c| (c.id.as_str(), c)).collect();

        // 1. Nodes for every author, in order of first appearance
        for post in &records.posts {
            let Some(author) = post.author() else {
                continue;
            };
            graph.ensure_agent(author);
            if let Some(agent) = graph.get_agent_mut(author) {
                agent.post_count += 1;
                if let Some(submolt) = post.submolt() {
                    agent.submolts.insert(submolt.to_string());
                }
                agent.observe(post.created_at());
            }
        }
        for comment in &records.comments {
            let Some(author) = comment.author() else {
                continue;
            };
            graph.ensure_agent(author);
            let submolt = posts
                .get(comment.post_id.as_str())
                .and_then(|p| p.submolt());
            if let Some(agent) = graph.get_agent_mut(author) {
                agent.comment_count += 1;
                if let Some(submolt) = submolt {
                    agent.submolts.insert(submolt.to_string());
                }
                agent.observe(comment.created_at());
            }
        }

        // 2. Edges
        for comment in &records.comments {
            let Some(source) = comment.author() else {
                tracing::debug!("Skipping comment {}: no author", comment.id);
                report.skipped_missing_author += 1;
                continue;
            };

            let (target, kind) = match comment.parent_id() {
                Some(parent_id) => match comments.get(parent_id) {
                    Some(parent) => (parent.author(), InteractionType::Reply),
                    None => {
                        tracing::debug!(
                            "Skipping comment {}: unknown parent {}",
                            comment.id,
                            parent_id
                        );
                        report.skipped_unknown_parent += 1;
                        continue;
                    }
                },
                None => match posts.get(comment.post_id.as_str()) {
                    Some(post) => (post.author(), InteractionType::SameThread),
                    None => {
                        tracing::debug!(
                            "Skipping comment {}: unknown post {}",
                            comment.id,
                            comment.post_id
                        );
                        report.skipped_unknown_post += 1;
                        continue;
                    }
                },
            };

            let Some(target) = target else {
                report.skipped_missing_author += 1;
                continue;
            };
            if source == target {
                report.skipped_self_interactions += 1;
                continue;
            }
            if graph
                .record_interaction(source, target, kind, &comment.post_id)
                .is_some()
            {
                report.interactions += 1;
            }
        }

        // 3. Reputation from the agent collection
        for record in &records.agents {
            let Some(agent) = graph.get_agent_mut(record.name.trim()) else {
                continue;
            };
            report.agents_merged += 1;
            agent.karma = agent.karma.max(clamp_karma(record.karma.unwrap_or(0)));
            agent.post_count = agent.post_count.max(record.post_count.unwrap_or(0));
            agent.comment_count = agent.comment_count.max(record.comment_count.unwrap_or(0));
            if let Some(label) = record.label.as_deref().map(str::trim) {
                if !label.is_empty() {
                    agent.label = label.to_string();
                }
            }
        }

        // 4. External leaderboard: max karma, rank as a secondary signal
        for (position, entry) in records.leaderboard.iter().enumerate() {
            let Some(agent) = graph.get_agent_mut(entry.name.trim()) else {
                continue;
            };
            report.leaderboard_matched += 1;
            agent.karma = agent.karma.max(clamp_karma(entry.karma));
            let rank = entry.rank.unwrap_or(position as u32 + 1);
            agent.reputation_rank = Some(agent.reputation_rank.map_or(rank, |r| r.min(rank)));
        }

        tracing::info!(
            "Built interaction graph: {} agents, {} edges, {} interactions ({} records skipped)",
            graph.node_count(),
            graph.edge_count(),
            report.interactions,
            report.skipped()
        );

        (graph, report)
    }
}

fn clamp_karma(karma: i64) -> u64 {
    u64::try_from(karma).unwrap_or(0)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::records::{AgentRecord, LeaderboardEntry};
    use crate::test_helpers::{comment, post, reply};

    fn thread_records() -> RecordSet {
        RecordSet {
            posts: vec![post("p1", Some("alice"), "general")],
            comments: vec![
                comment("c1", "p1", Some("bob")),
                reply("c2", "p1", "c1", Some("carol")),
                reply("c3", "p1", "c2", Some("bob")),
                reply("c4", "p1", "c1", Some("carol")),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_build_edges_follow_reply_chain() {
        let (g, report) = GraphBuilder::new().build(&thread_records());

        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(report.interactions, 4);

        let bob = g.get_index("bob").unwrap();
        let alice = g.get_index("alice").unwrap();
        let carol = g.get_index("carol").unwrap();

        let top = g.graph.find_edge(bob, alice).unwrap();
        assert_eq!(g.graph[top].weight, 1);
        assert!(g.graph[top].types.contains(&InteractionType::SameThread));

        // carol replied to bob twice → single edge, weight 2
        let repeated = g.graph.find_edge(carol, bob).unwrap();
        assert_eq!(g.graph[repeated].weight, 2);
        assert_eq!(g.graph[repeated].post_ids.len(), 1);
        assert!(g.graph[repeated].types.contains(&InteractionType::Reply));
    }

    #[test]
    fn test_build_node_order_is_first_appearance() {
        let (g, _) = GraphBuilder::new().build(&thread_records());
        let order: Vec<&str> = g
            .graph
            .node_indices()
            .map(|idx| g.graph[idx].id.as_str())
            .collect();
        assert_eq!(order, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_build_null_author_skipped_batch_continues() {
        let mut records = thread_records();
        records.comments.insert(0, comment("c0", "p1", None));

        let (g, report) = GraphBuilder::new().build(&records);
        assert_eq!(report.skipped_missing_author, 1);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(report.interactions, 4);
    }

    #[test]
    fn test_build_reply_to_authorless_parent_skipped() {
        let records = RecordSet {
            posts: vec![post("p1", Some("alice"), "general")],
            comments: vec![
                comment("c1", "p1", None),
                reply("c2", "p1", "c1", Some("bob")),
            ],
            ..Default::default()
        };
        let (g, report) = GraphBuilder::new().build(&records);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(report.skipped_missing_author, 2);
    }

    #[test]
    fn test_build_unknown_references_skipped() {
        let records = RecordSet {
            posts: vec![post("p1", Some("alice"), "general")],
            comments: vec![
                comment("c1", "missing-post", Some("bob")),
                reply("c2", "p1", "missing-comment", Some("carol")),
            ],
            ..Default::default()
        };
        let (g, report) = GraphBuilder::new().build(&records);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(report.skipped_unknown_post, 1);
        assert_eq!(report.skipped_unknown_parent, 1);
    }

    #[test]
    fn test_build_self_reply_dropped() {
        let records = RecordSet {
            posts: vec![post("p1", Some("alice"), "general")],
            comments: vec![comment("c1", "p1", Some("alice"))],
            ..Default::default()
        };
        let (g, report) = GraphBuilder::new().build(&records);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(report.skipped_self_interactions, 1);
    }

    #[test]
    fn test_build_author_missing_from_agents_defaults() {
        let (g, _) = GraphBuilder::new().build(&thread_records());
        let carol = g.get_agent("carol").unwrap();
        assert_eq!(carol.karma, 0);
        assert!(carol.reputation_rank.is_none());
        assert_eq!(carol.comment_count, 2);
        assert_eq!(carol.post_count, 0);
    }

    #[test]
    fn test_build_submolts_from_authored_content() {
        let records = RecordSet {
            posts: vec![
                post("p1", Some("alice"), "general"),
                post("p2", Some("alice"), "philosophy"),
                post("p3", Some("bob"), "crypto"),
            ],
            comments: vec![comment("c1", "p1", Some("bob"))],
            ..Default::default()
        };
        let (g, _) = GraphBuilder::new().build(&records);
        let alice: Vec<&str> = g
            .get_agent("alice")
            .unwrap()
            .submolts
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(alice, vec!["general", "philosophy"]);
        assert_eq!(g.get_agent("bob").unwrap().submolts.len(), 2);
    }

    #[test]
    fn test_build_merges_reputation() {
        let mut records = thread_records();
        records.agents = vec![
            AgentRecord {
                name: "alice".into(),
                label: Some("Alice A.".into()),
                karma: Some(40),
                post_count: Some(12),
                comment_count: None,
            },
            AgentRecord {
                name: "nobody".into(),
                karma: Some(999),
                ..Default::default()
            },
        ];
        records.leaderboard = vec![
            LeaderboardEntry {
                name: "alice".into(),
                karma: 55,
                rank: Some(3),
            },
            LeaderboardEntry {
                name: "bob".into(),
                karma: -5,
                rank: None,
            },
        ];

        let (g, report) = GraphBuilder::new().build(&records);
        let alice = g.get_agent("alice").unwrap();
        assert_eq!(alice.karma, 55);
        assert_eq!(alice.label, "Alice A.");
        assert_eq!(alice.post_count, 12);
        assert_eq!(alice.reputation_rank, Some(3));

        let bob = g.get_agent("bob").unwrap();
        assert_eq!(bob.karma, 0);
        assert_eq!(bob.reputation_rank, Some(2));

        assert!(g.get_agent("nobody").is_none());
        assert_eq!(report.agents_merged, 1);
        assert_eq!(report.leaderboard_matched, 2);
    }

    #[test]
    fn test_build_empty_records() {
        let (g, report) = GraphBuilder::new().build(&RecordSet::default());
        assert_eq!(g.node_count(), 0);
        assert_eq!(report, BuildReport::default());
    }
}
