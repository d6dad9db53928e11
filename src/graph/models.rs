//! Interaction graph data models.
//!
//! Defines the complete type system for network analytics:
//!
//! ## Canonical graph types (builder → algorithms)
//! - [`Agent`] — a participant node, with reputation and activity counters
//! - [`InteractionType`] / [`InteractionEdge`] — aggregated directed interactions
//! - [`InteractionGraph`] — petgraph arena with name ↔ NodeIndex mapping
//!
//! ## Output types (analytics)
//! - [`NodeMetrics`] — per-node structural metric bundle
//! - [`NetworkSummary`] — network-level aggregates
//! - [`CommunityInfo`] — summary of a detected community
//! - [`InfluencerProfile`] — composite score, rank and tier per agent
//!
//! ## Configuration
//! - [`AnalyticsConfig`] — tuning parameters for the metric and community stages
//! - [`AnalysisWarning`] — configuration fallbacks surfaced to the caller

use chrono::{DateTime, Utc};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

// ============================================================================
// Canonical graph types
// ============================================================================

/// A participant in the interaction graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent name (the node key)
    pub id: String,
    /// Display label, defaults to the name
    pub label: String,
    /// External reputation, the max of every reported value
    pub karma: u64,
    pub post_count: u64,
    pub comment_count: u64,
    /// Rank on the external reputation leaderboard, if listed
    pub reputation_rank: Option<u32>,
    /// Submolt affiliations accumulated from authored content
    pub submolts: BTreeSet<String>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Agent {
    /// Create an agent with zeroed reputation fields.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            karma: 0,
            post_count: 0,
            comment_count: 0,
            reputation_rank: None,
            submolts: BTreeSet::new(),
            first_seen: None,
            last_seen: None,
        }
    }

    /// Widen the first/last-seen window to include `at`.
    pub fn observe(&mut self, at: Option<DateTime<Utc>>) {
        let Some(at) = at else { return };
        if self.first_seen.map_or(true, |f| at < f) {
            self.first_seen = Some(at);
        }
        if self.last_seen.map_or(true, |l| at > l) {
            self.last_seen = Some(at);
        }
    }
}

/// Kind of interaction folded into an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    /// Reply to another comment
    Reply,
    /// Top-level comment in a post's thread
    SameThread,
}

impl std::fmt::Display for InteractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reply => write!(f, "reply"),
            Self::SameThread => write!(f, "same_thread"),
        }
    }
}

/// Aggregated directed interaction `source → target`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionEdge {
    /// Number of interactions folded into this edge
    pub weight: u32,
    pub types: BTreeSet<InteractionType>,
    /// Posts that contributed at least one interaction
    pub post_ids: BTreeSet<String>,
}

impl InteractionEdge {
    fn absorb(&mut self, kind: InteractionType, post_id: &str) {
        self.weight += 1;
        self.types.insert(kind);
        self.post_ids.insert(post_id.to_string());
    }
}

// ============================================================================
// InteractionGraph: petgraph arena with name mapping
// ============================================================================

/// Directed simple graph of agents backed by `petgraph::DiGraph`.
///
/// Node indices are assigned in insertion order and never reused, so every
/// later stage can keep per-node results in a `Vec` indexed by
/// `NodeIndex::index()`.
#[derive(Debug, Clone, Default)]
pub struct InteractionGraph {
    pub graph: DiGraph<Agent, InteractionEdge>,
    pub id_to_index: HashMap<String, NodeIndex>,
}

impl InteractionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            graph: DiGraph::with_capacity(nodes, edges),
            id_to_index: HashMap::with_capacity(nodes),
        }
    }

    /// Return the index for `id`, creating a fresh agent node if needed.
    pub fn ensure_agent(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.id_to_index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(Agent::new(id));
        self.id_to_index.insert(id.to_string(), idx);
        idx
    }

    /// Record one interaction `from → to`.
    ///
    /// Repeated pairs strengthen the existing edge. Returns `None` when either
    /// endpoint is unknown or the interaction is a self-loop.
    pub fn record_interaction(
        &mut self,
        from_id: &str,
        to_id: &str,
        kind: InteractionType,
        post_id: &str,
    ) -> Option<EdgeIndex> {
        let from = *self.id_to_index.get(from_id)?;
        let to = *self.id_to_index.get(to_id)?;
        if from == to {
            return None;
        }
        let edge = match self.graph.find_edge(from, to) {
            Some(edge) => edge,
            None => self.graph.add_edge(from, to, InteractionEdge::default()),
        };
        self.graph[edge].absorb(kind, post_id);
        Some(edge)
    }

    pub fn get_agent(&self, id: &str) -> Option<&Agent> {
        let idx = self.id_to_index.get(id)?;
        self.graph.node_weight(*idx)
    }

    pub fn get_agent_mut(&mut self, id: &str) -> Option<&mut Agent> {
        let idx = self.id_to_index.get(id)?;
        self.graph.node_weight_mut(*idx)
    }

    pub fn get_index(&self, id: &str) -> Option<NodeIndex> {
        self.id_to_index.get(id).copied()
    }

    /// Total interaction weight across all edges.
    pub fn total_weight(&self) -> u64 {
        self.graph.edge_weights().map(|e| u64::from(e.weight)).sum()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

// ============================================================================
// Output types: metrics
// ============================================================================

/// Per-node structural metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    /// In-degree + out-degree (distinct neighbours per direction)
    pub degree: usize,
    pub in_degree: usize,
    pub out_degree: usize,
    pub pagerank: f64,
    /// Normalized betweenness (sampled on large graphs)
    pub betweenness: f64,
    /// Reachable count over summed BFS distance along outgoing edges
    pub closeness: f64,
    pub clustering: f64,
    /// Community id, contiguous from 0 by descending community size
    pub community: u32,
    /// Weakly connected component id
    pub component_id: u32,
}

/// Network-level aggregates produced by the metrics stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    pub weakly_connected_components: usize,
    /// Source count used for betweenness (equals `node_count` when exact)
    pub betweenness_sources: usize,
    pub pagerank_iterations: usize,
}

/// Summary of a detected community.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityInfo {
    pub id: u32,
    pub name: String,
    pub size: usize,
    /// Member names ranked by PageRank, highest first
    pub top_agents: Vec<String>,
    /// Most frequent submolt tags among members
    pub dominant_submolts: Vec<String>,
}

/// Influence tier derived from rank and percentile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Elite,
    Major,
    Rising,
    Active,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Elite => write!(f, "elite"),
            Self::Major => write!(f, "major"),
            Self::Rising => write!(f, "rising"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// An aggregated interaction partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionPartner {
    pub agent: String,
    pub weight: u32,
}

/// Composite influence result for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluencerProfile {
    pub agent: String,
    /// Weighted composite in [0, 1]
    pub influence_score: f64,
    /// 1 = most influential
    pub rank: usize,
    pub tier: Tier,
    pub metrics: NodeMetrics,
    pub karma: u64,
    pub post_count: u64,
    pub comment_count: u64,
    /// Top outbound partners (agents this one replies to)
    pub replies_to: Vec<InteractionPartner>,
    /// Top inbound partners (agents replying to this one)
    pub replies_from: Vec<InteractionPartner>,
}

// ============================================================================
// Configuration
// ============================================================================

/// Tuning parameters for the metric and community stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// PageRank damping factor (default: 0.85)
    pub pagerank_damping: f64,
    /// Convergence threshold on the summed absolute rank delta (default: 1e-6)
    pub pagerank_tolerance: f64,
    /// PageRank maximum iterations (default: 100)
    pub pagerank_max_iterations: usize,
    /// Spread dangling-node mass uniformly (default: false, mass decays)
    pub redistribute_dangling: bool,
    /// Graphs above this node count use sampled betweenness (default: 1000)
    pub betweenness_sample_threshold: usize,
    /// Source nodes sampled when above the threshold (default: 200)
    pub betweenness_sample_size: usize,
    /// Fixed sampling seed; drawn at random when unset
    pub betweenness_seed: Option<u64>,
    /// Louvain resolution parameter (default: 1.0)
    pub louvain_resolution: f64,
    /// Maximum local-move passes (default: 50)
    pub louvain_max_passes: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            pagerank_damping: 0.85,
            pagerank_tolerance: 1e-6,
            pagerank_max_iterations: 100,
            redistribute_dangling: false,
            betweenness_sample_threshold: 1000,
            betweenness_sample_size: 200,
            betweenness_seed: None,
            louvain_resolution: 1.0,
            louvain_max_passes: 50,
        }
    }
}

impl AnalyticsConfig {
    /// Replace out-of-range values with defaults, reporting each fallback.
    pub fn sanitized(&self) -> (Self, Vec<AnalysisWarning>) {
        let defaults = Self::default();
        let mut config = self.clone();
        let mut warnings = Vec::new();

        if !(config.pagerank_damping > 0.0 && config.pagerank_damping < 1.0) {
            warnings.push(AnalysisWarning::InvalidDamping {
                given: config.pagerank_damping,
                fallback: defaults.pagerank_damping,
            });
            config.pagerank_damping = defaults.pagerank_damping;
        }
        if !(config.pagerank_tolerance.is_finite() && config.pagerank_tolerance > 0.0) {
            warnings.push(AnalysisWarning::InvalidParameter {
                name: "pagerank_tolerance".into(),
                fallback: defaults.pagerank_tolerance.to_string(),
            });
            config.pagerank_tolerance = defaults.pagerank_tolerance;
        }
        if config.pagerank_max_iterations == 0 {
            warnings.push(AnalysisWarning::InvalidParameter {
                name: "pagerank_max_iterations".into(),
                fallback: defaults.pagerank_max_iterations.to_string(),
            });
            config.pagerank_max_iterations = defaults.pagerank_max_iterations;
        }
        if config.betweenness_sample_size == 0 {
            warnings.push(AnalysisWarning::InvalidParameter {
                name: "betweenness_sample_size".into(),
                fallback: defaults.betweenness_sample_size.to_string(),
            });
            config.betweenness_sample_size = defaults.betweenness_sample_size;
        }
        // 0 would sample even the smallest graphs
        if config.betweenness_sample_threshold == 0 {
            warnings.push(AnalysisWarning::InvalidParameter {
                name: "betweenness_sample_threshold".into(),
                fallback: defaults.betweenness_sample_threshold.to_string(),
            });
            config.betweenness_sample_threshold = defaults.betweenness_sample_threshold;
        }
        if !(config.louvain_resolution.is_finite() && config.louvain_resolution > 0.0) {
            warnings.push(AnalysisWarning::InvalidParameter {
                name: "louvain_resolution".into(),
                fallback: defaults.louvain_resolution.to_string(),
            });
            config.louvain_resolution = defaults.louvain_resolution;
        }
        if config.louvain_max_passes == 0 {
            warnings.push(AnalysisWarning::InvalidParameter {
                name: "louvain_max_passes".into(),
                fallback: defaults.louvain_max_passes.to_string(),
            });
            config.louvain_max_passes = defaults.louvain_max_passes;
        }

        (config, warnings)
    }
}

/// A configuration problem that was recovered from by falling back to a default.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    #[error("damping factor {given} outside (0, 1), using {fallback}")]
    InvalidDamping { given: f64, fallback: f64 },

    #[error("invalid {name}, using {fallback}")]
    InvalidParameter { name: String, fallback: String },

    #[error("metric weights rejected ({reason}), using defaults")]
    InvalidWeights { reason: String },

    #[error("metric weights sum to {sum}, rescaled to 1.0")]
    WeightsRescaled { sum: f64 },

    #[error("unknown tier '{requested}', falling back to '{fallback}'")]
    UnknownTier { requested: String, fallback: String },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analytics_config_defaults() {
        let config = AnalyticsConfig::default();
        assert!((config.pagerank_damping - 0.85).abs() < f64::EPSILON);
        assert!((config.pagerank_tolerance - 1e-6).abs() < f64::EPSILON);
        assert_eq!(config.pagerank_max_iterations, 100);
        assert_eq!(config.betweenness_sample_threshold, 1000);
        assert_eq!(config.betweenness_sample_size, 200);
        assert_eq!(config.louvain_max_passes, 50);
        assert!(!config.redistribute_dangling);
    }

    #[test]
    fn test_analytics_config_partial_yaml_uses_defaults() {
        let config: AnalyticsConfig = serde_json::from_str(r#"{"pagerank_damping": 0.9}"#).unwrap();
        assert!((config.pagerank_damping - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.pagerank_max_iterations, 100);
    }

    #[test]
    fn test_sanitize_rejects_bad_damping() {
        let config = AnalyticsConfig {
            pagerank_damping: 1.5,
            ..Default::default()
        };
        let (clean, warnings) = config.sanitized();
        assert!((clean.pagerank_damping - 0.85).abs() < f64::EPSILON);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], AnalysisWarning::InvalidDamping { .. }));
    }

    #[test]
    fn test_sanitize_zero_counts_fall_back() {
        let config = AnalyticsConfig {
            louvain_max_passes: 0,
            betweenness_sample_threshold: 0,
            betweenness_sample_size: 0,
            ..Default::default()
        };
        let (clean, warnings) = config.sanitized();
        assert_eq!(clean.louvain_max_passes, 50);
        assert_eq!(clean.betweenness_sample_threshold, 1000);
        assert_eq!(clean.betweenness_sample_size, 200);

        let names: Vec<&str> = warnings
            .iter()
            .filter_map(|w| match w {
                AnalysisWarning::InvalidParameter { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            names,
            vec![
                "betweenness_sample_size",
                "betweenness_sample_threshold",
                "louvain_max_passes"
            ]
        );
    }

    #[test]
    fn test_sanitize_keeps_valid_config() {
        let (_, warnings) = AnalyticsConfig::default().sanitized();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_record_interaction_aggregates() {
        let mut g = InteractionGraph::new();
        g.ensure_agent("a");
        g.ensure_agent("b");

        g.record_interaction("a", "b", InteractionType::Reply, "p1");
        g.record_interaction("a", "b", InteractionType::SameThread, "p2");
        g.record_interaction("a", "b", InteractionType::Reply, "p1");

        assert_eq!(g.edge_count(), 1);
        let edge = g.graph.edge_weights().next().unwrap();
        assert_eq!(edge.weight, 3);
        assert_eq!(edge.types.len(), 2);
        assert_eq!(edge.post_ids.len(), 2);
        assert_eq!(g.total_weight(), 3);
    }

    #[test]
    fn test_record_interaction_rejects_self_loop_and_unknown() {
        let mut g = InteractionGraph::new();
        g.ensure_agent("a");
        assert!(g
            .record_interaction("a", "a", InteractionType::Reply, "p")
            .is_none());
        assert!(g
            .record_interaction("a", "ghost", InteractionType::Reply, "p")
            .is_none());
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_ensure_agent_idempotent() {
        let mut g = InteractionGraph::new();
        let first = g.ensure_agent("a");
        let second = g.ensure_agent("a");
        assert_eq!(first, second);
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.get_agent("a").unwrap().label, "a");
    }

    #[test]
    fn test_agent_observe_window() {
        let mut agent = Agent::new("a");
        let early = "2026-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let late = "2026-02-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        agent.observe(Some(late));
        agent.observe(Some(early));
        agent.observe(None);
        assert_eq!(agent.first_seen, Some(early));
        assert_eq!(agent.last_seen, Some(late));
    }

    #[test]
    fn test_tier_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Tier::Elite).unwrap(), "\"elite\"");
        assert_eq!(Tier::Rising.to_string(), "rising");
        assert_eq!(InteractionType::SameThread.to_string(), "same_thread");
    }

    #[test]
    fn test_warning_messages() {
        let w = AnalysisWarning::UnknownTier {
            requested: "legendary".into(),
            fallback: "elite".into(),
        };
        assert_eq!(
            w.to_string(),
            "unknown tier 'legendary', falling back to 'elite'"
        );
    }
}
