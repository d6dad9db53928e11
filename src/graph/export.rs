//! Tier selection and the visualization result bundle.
//!
//! A [`ViewRequest`] picks a subset of agents from a finished analysis run;
//! [`VisualizationExport`] is the bundle handed to the report/visualization
//! side. Its field names are a wire contract and must not change.

use chrono::{DateTime, Utc};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use super::community::Partition;
use super::influence::{InfluenceRanking, InfluenceWeights};
use super::models::{
    AnalysisWarning, CommunityInfo, InfluencerProfile, InteractionGraph, InteractionPartner,
    InteractionType, NetworkSummary, NodeMetrics, Tier,
};

/// Size hint range for exported nodes.
const MIN_NODE_SIZE: f64 = 5.0;
const MAX_NODE_SIZE: f64 = 50.0;

// ============================================================================
// View requests
// ============================================================================

/// Named view over the analyzed network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierView {
    /// Top-N by influence (default 100)
    Elite,
    /// Top-N by influence (default 500)
    Major,
    /// Top-N by influence plus their direct neighbours
    Expanded,
    /// Top-K per community by PageRank
    Community,
    /// Score threshold, capped at top-N
    Custom,
}

impl TierView {
    pub fn default_top_n(self) -> usize {
        match self {
            Self::Elite | Self::Expanded => 100,
            Self::Major | Self::Custom => 500,
            Self::Community => 20,
        }
    }
}

impl fmt::Display for TierView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elite => write!(f, "elite"),
            Self::Major => write!(f, "major"),
            Self::Expanded => write!(f, "expanded"),
            Self::Community => write!(f, "community"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for TierView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "elite" => Ok(Self::Elite),
            "major" => Ok(Self::Major),
            "expanded" => Ok(Self::Expanded),
            "community" => Ok(Self::Community),
            "custom" => Ok(Self::Custom),
            other => Err(other.to_string()),
        }
    }
}

/// The `export` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Tier name; unknown names fall back to `elite`
    pub tier: String,
    /// Overrides the tier's default N
    pub top_n: Option<usize>,
    /// Minimum composite score for the `custom` tier
    pub min_score: f64,
    /// Ego-expand any tier with direct neighbours
    pub include_connections: bool,
    /// Members per community for the `community` tier
    pub per_community: usize,
    /// Display name overrides keyed by community id
    pub community_names: HashMap<u32, String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            tier: TierView::Elite.to_string(),
            top_n: None,
            min_score: 0.0,
            include_connections: false,
            per_community: TierView::Community.default_top_n(),
            community_names: HashMap::new(),
        }
    }
}

/// A resolved, validated view request.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRequest {
    pub view: TierView,
    pub top_n: usize,
    pub min_score: f64,
    pub include_connections: bool,
    pub per_community: usize,
}

impl ViewRequest {
    pub fn new(view: TierView) -> Self {
        Self {
            view,
            top_n: view.default_top_n(),
            min_score: 0.0,
            include_connections: false,
            per_community: TierView::Community.default_top_n(),
        }
    }

    /// Resolve the export configuration. An unknown tier name falls back to
    /// `elite`; a zero `top_n` or `per_community` and a non-finite
    /// `min_score` fall back to their defaults. Each fallback yields a warning.
    pub fn from_config(config: &ExportConfig) -> (Self, Vec<AnalysisWarning>) {
        let mut warnings = Vec::new();
        let view = match config.tier.parse::<TierView>() {
            Ok(view) => view,
            Err(requested) => {
                let fallback = TierView::Elite;
                warnings.push(AnalysisWarning::UnknownTier {
                    requested,
                    fallback: fallback.to_string(),
                });
                fallback
            }
        };

        let top_n = match config.top_n {
            Some(0) => {
                warnings.push(AnalysisWarning::InvalidParameter {
                    name: "top_n".into(),
                    fallback: view.default_top_n().to_string(),
                });
                view.default_top_n()
            }
            Some(n) => n,
            None => view.default_top_n(),
        };

        let per_community = if config.per_community == 0 {
            let fallback = TierView::Community.default_top_n();
            warnings.push(AnalysisWarning::InvalidParameter {
                name: "per_community".into(),
                fallback: fallback.to_string(),
            });
            fallback
        } else {
            config.per_community
        };

        let min_score = if config.min_score.is_finite() {
            config.min_score
        } else {
            warnings.push(AnalysisWarning::InvalidParameter {
                name: "min_score".into(),
                fallback: "0".into(),
            });
            0.0
        };

        for w in &warnings {
            tracing::warn!("{}", w);
        }

        let request = Self {
            view,
            top_n,
            min_score,
            include_connections: config.include_connections,
            per_community,
        };
        (request, warnings)
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Select the node indices of a view, in influence rank order.
pub fn select_nodes(
    graph: &InteractionGraph,
    metrics: &[NodeMetrics],
    partition: &Partition,
    ranking: &InfluenceRanking,
    request: &ViewRequest,
) -> Vec<usize> {
    let by_rank = || {
        ranking
            .profiles
            .iter()
            .filter_map(|p| graph.get_index(&p.agent).map(NodeIndex::index))
    };

    let mut selected: Vec<usize> = match request.view {
        TierView::Elite | TierView::Major | TierView::Expanded => {
            by_rank().take(request.top_n).collect()
        }
        TierView::Custom => by_rank()
            .filter(|&i| ranking.scores[i] >= request.min_score)
            .take(request.top_n)
            .collect(),
        TierView::Community => {
            let mut members: Vec<Vec<usize>> = vec![Vec::new(); partition.community_count];
            for (node, &c) in partition.assignment.iter().enumerate() {
                if let Some(list) = members.get_mut(c as usize) {
                    list.push(node);
                }
            }
            members
                .into_iter()
                .flat_map(|mut list| {
                    list.sort_by(|&a, &b| metrics[b].pagerank.total_cmp(&metrics[a].pagerank));
                    list.truncate(request.per_community);
                    list
                })
                .collect()
        }
    };

    if request.view == TierView::Expanded || request.include_connections {
        selected = expand_ego(graph, &selected);
    }

    selected.sort_by_key(|&i| ranking.ranks.get(i).copied().unwrap_or(usize::MAX));
    selected
}

/// Union the selection with every direct neighbour, in either direction.
fn expand_ego(graph: &InteractionGraph, selected: &[usize]) -> Vec<usize> {
    let g = &graph.graph;
    let mut included: BTreeSet<usize> = selected.iter().copied().collect();
    for &i in selected {
        let idx = NodeIndex::new(i);
        included.extend(
            g.neighbors_directed(idx, Direction::Outgoing)
                .chain(g.neighbors_directed(idx, Direction::Incoming))
                .map(NodeIndex::index),
        );
    }
    included.into_iter().collect()
}

// ============================================================================
// Result bundle
// ============================================================================

/// Run metadata. Field names are read by the report generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub total_agents: usize,
    pub total_posts: usize,
    pub total_comments: usize,
    pub total_interactions: u64,
    pub network_density: f64,
    pub community_count: usize,
    pub modularity: f64,
    /// Agents above the `active` tier
    pub influencer_count: usize,
    pub top_influencer: Option<String>,
    pub avg_influence_score: f64,
    pub collected_at: DateTime<Utc>,
    pub weakly_connected_components: usize,
    /// View that produced `nodes` and `edges`
    pub tier: String,
    pub node_count: usize,
    pub edge_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportNode {
    pub id: String,
    pub label: String,
    /// Rendering size derived from PageRank
    pub size: f64,
    pub community: u32,
    pub karma: u64,
    pub post_count: u64,
    pub comment_count: u64,
    pub submolts: Vec<String>,
    pub tier: Tier,
    pub influence_score: f64,
    pub rank: usize,
    pub metrics: NodeMetrics,
    pub replies_to: Vec<InteractionPartner>,
    pub replies_from: Vec<InteractionPartner>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEdge {
    pub source: String,
    pub target: String,
    pub weight: u32,
    pub types: Vec<InteractionType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluencerSection {
    pub weights: InfluenceWeights,
    /// Full ranking, independent of the selected view
    pub rankings: Vec<InfluencerProfile>,
}

/// The complete result bundle of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationExport {
    pub metadata: ExportMetadata,
    pub nodes: Vec<ExportNode>,
    pub edges: Vec<ExportEdge>,
    pub communities: Vec<CommunityInfo>,
    pub influencers: InfluencerSection,
}

/// Everything a bundle is assembled from.
pub struct ExportInput<'a> {
    pub graph: &'a InteractionGraph,
    pub metrics: &'a [NodeMetrics],
    pub summary: &'a NetworkSummary,
    pub partition: &'a Partition,
    pub communities: &'a [CommunityInfo],
    pub ranking: &'a InfluenceRanking,
    pub total_posts: usize,
    pub total_comments: usize,
    pub collected_at: DateTime<Utc>,
}

/// Select the requested view and assemble the bundle.
pub fn build_export(input: &ExportInput<'_>, request: &ViewRequest) -> VisualizationExport {
    let g = &input.graph.graph;
    let selected = select_nodes(
        input.graph,
        input.metrics,
        input.partition,
        input.ranking,
        request,
    );
    let included: BTreeSet<usize> = selected.iter().copied().collect();

    let max_pagerank = input
        .metrics
        .iter()
        .map(|m| m.pagerank)
        .fold(0.0_f64, f64::max);
    let profile_of: HashMap<&str, &InfluencerProfile> = input
        .ranking
        .profiles
        .iter()
        .map(|p| (p.agent.as_str(), p))
        .collect();

    let nodes: Vec<ExportNode> = selected
        .iter()
        .filter_map(|&i| {
            let agent = &g[NodeIndex::new(i)];
            let profile = profile_of.get(agent.id.as_str())?;
            let metrics = input.metrics[i].clone();
            Some(ExportNode {
                id: agent.id.clone(),
                label: agent.label.clone(),
                size: size_hint(metrics.pagerank, max_pagerank),
                community: metrics.community,
                karma: agent.karma,
                post_count: agent.post_count,
                comment_count: agent.comment_count,
                submolts: agent.submolts.iter().cloned().collect(),
                tier: profile.tier,
                influence_score: profile.influence_score,
                rank: profile.rank,
                metrics,
                replies_to: profile.replies_to.clone(),
                replies_from: profile.replies_from.clone(),
                first_seen: agent.first_seen,
                last_seen: agent.last_seen,
            })
        })
        .collect();

    let edges: Vec<ExportEdge> = g
        .edge_references()
        .filter(|e| included.contains(&e.source().index()) && included.contains(&e.target().index()))
        .map(|e| ExportEdge {
            source: g[e.source()].id.clone(),
            target: g[e.target()].id.clone(),
            weight: e.weight().weight,
            types: e.weight().types.iter().copied().collect(),
        })
        .collect();

    let profiles = &input.ranking.profiles;
    let avg_influence_score = if profiles.is_empty() {
        0.0
    } else {
        profiles.iter().map(|p| p.influence_score).sum::<f64>() / profiles.len() as f64
    };

    let metadata = ExportMetadata {
        total_agents: input.summary.node_count,
        total_posts: input.total_posts,
        total_comments: input.total_comments,
        total_interactions: input.graph.total_weight(),
        network_density: input.summary.density,
        community_count: input.partition.community_count,
        modularity: input.partition.modularity,
        influencer_count: profiles.iter().filter(|p| p.tier != Tier::Active).count(),
        top_influencer: profiles.first().map(|p| p.agent.clone()),
        avg_influence_score,
        collected_at: input.collected_at,
        weakly_connected_components: input.summary.weakly_connected_components,
        tier: request.view.to_string(),
        node_count: nodes.len(),
        edge_count: edges.len(),
    };

    tracing::info!(
        "Exported '{}' view: {} nodes, {} edges",
        request.view,
        metadata.node_count,
        metadata.edge_count
    );

    VisualizationExport {
        metadata,
        nodes,
        edges,
        communities: input.communities.to_vec(),
        influencers: InfluencerSection {
            weights: input.ranking.weights.clone(),
            rankings: profiles.clone(),
        },
    }
}

/// Linear PageRank-to-size mapping into `[MIN_NODE_SIZE, MAX_NODE_SIZE]`.
fn size_hint(pagerank: f64, max_pagerank: f64) -> f64 {
    if max_pagerank <= 0.0 {
        return MIN_NODE_SIZE;
    }
    MIN_NODE_SIZE + (MAX_NODE_SIZE - MIN_NODE_SIZE) * (pagerank / max_pagerank)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::algorithms::compute_metrics;
    use crate::graph::community::louvain_communities;
    use crate::graph::influence::{score_influence, InfluenceConfig};
    use crate::graph::models::AnalyticsConfig;
    use crate::test_helpers::{make_chain_graph, make_graph, make_two_cliques};

    struct Analyzed {
        graph: InteractionGraph,
        metrics: Vec<NodeMetrics>,
        summary: NetworkSummary,
        partition: Partition,
        ranking: InfluenceRanking,
    }

    fn analyze(graph: InteractionGraph) -> Analyzed {
        let config = AnalyticsConfig::default();
        let report = compute_metrics(&graph, &config);
        let partition = louvain_communities(&graph, &config);
        let mut metrics = report.metrics;
        for (m, &c) in metrics.iter_mut().zip(&partition.assignment) {
            m.community = c;
        }
        let ranking = score_influence(&graph, &metrics, &InfluenceConfig::default());
        Analyzed {
            graph,
            metrics,
            summary: report.summary,
            partition,
            ranking,
        }
    }

    fn select(a: &Analyzed, request: &ViewRequest) -> Vec<usize> {
        select_nodes(&a.graph, &a.metrics, &a.partition, &a.ranking, request)
    }

    #[test]
    fn test_tier_view_parse() {
        assert_eq!("Elite".parse::<TierView>(), Ok(TierView::Elite));
        assert_eq!(" community ".parse::<TierView>(), Ok(TierView::Community));
        assert_eq!(
            "legendary".parse::<TierView>(),
            Err("legendary".to_string())
        );
    }

    #[test]
    fn test_unknown_tier_falls_back_with_warning() {
        let config = ExportConfig {
            tier: "legendary".into(),
            ..Default::default()
        };
        let (request, warnings) = ViewRequest::from_config(&config);
        assert_eq!(request.view, TierView::Elite);
        assert_eq!(request.top_n, 100);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            AnalysisWarning::UnknownTier { requested, .. } if requested == "legendary"
        ));
    }

    #[test]
    fn test_out_of_range_view_settings_fall_back() {
        let config = ExportConfig {
            tier: "custom".into(),
            top_n: Some(0),
            min_score: f64::NAN,
            per_community: 0,
            ..Default::default()
        };
        let (request, warnings) = ViewRequest::from_config(&config);
        assert_eq!(request.view, TierView::Custom);
        assert_eq!(request.top_n, 500);
        assert_eq!(request.min_score, 0.0);
        assert_eq!(request.per_community, 20);

        let names: Vec<&str> = warnings
            .iter()
            .filter_map(|w| match w {
                AnalysisWarning::InvalidParameter { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["top_n", "per_community", "min_score"]);

        // The repaired request still selects every agent of a small graph
        let a = analyze(make_two_cliques(3, true));
        assert_eq!(select(&a, &request).len(), 6);
    }

    #[test]
    fn test_default_top_n_per_tier() {
        for (tier, expected) in [("elite", 100), ("major", 500), ("custom", 500)] {
            let config = ExportConfig {
                tier: tier.into(),
                ..Default::default()
            };
            let (request, warnings) = ViewRequest::from_config(&config);
            assert_eq!(request.top_n, expected, "tier {}", tier);
            assert!(warnings.is_empty());
        }
    }

    #[test]
    fn test_elite_never_exceeds_cutoff() {
        let a = analyze(make_two_cliques(6, true));
        let request = ViewRequest {
            top_n: 3,
            ..ViewRequest::new(TierView::Elite)
        };
        let selected = select(&a, &request);
        assert_eq!(selected.len(), 3);
        for &i in &selected {
            assert!(a.ranking.ranks[i] <= 3, "node {} has rank {}", i, a.ranking.ranks[i]);
        }
    }

    #[test]
    fn test_expanded_adds_neighbors() {
        // a → hub ← b, c isolated from the hub
        let mut g = make_graph(&[("a", "hub"), ("b", "hub"), ("hub", "d")]);
        g.ensure_agent("c");
        let a = analyze(g);
        let request = ViewRequest {
            top_n: 1,
            ..ViewRequest::new(TierView::Expanded)
        };
        let selected: BTreeSet<String> = select(&a, &request)
            .into_iter()
            .map(|i| a.graph.graph[NodeIndex::new(i)].id.clone())
            .collect();
        let expected: BTreeSet<String> =
            ["a", "b", "hub", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(selected, expected);
    }

    #[test]
    fn test_include_connections_expands_elite() {
        let a = analyze(make_chain_graph(5));
        let base = ViewRequest {
            top_n: 1,
            ..ViewRequest::new(TierView::Elite)
        };
        let expanded = ViewRequest {
            include_connections: true,
            ..base.clone()
        };
        assert_eq!(select(&a, &base).len(), 1);
        assert!(select(&a, &expanded).len() > 1);
    }

    #[test]
    fn test_community_tier_top_k_per_community() {
        let a = analyze(make_two_cliques(5, false));
        let request = ViewRequest {
            per_community: 2,
            ..ViewRequest::new(TierView::Community)
        };
        let selected = select(&a, &request);
        assert_eq!(selected.len(), 4);
        let per_comm: Vec<u32> = selected.iter().map(|&i| a.partition.assignment[i]).collect();
        assert_eq!(per_comm.iter().filter(|&&c| c == 0).count(), 2);
        assert_eq!(per_comm.iter().filter(|&&c| c == 1).count(), 2);
    }

    #[test]
    fn test_custom_threshold_and_cap() {
        let a = analyze(make_chain_graph(6));
        let threshold = a.ranking.profiles[2].influence_score;
        let request = ViewRequest {
            min_score: threshold,
            ..ViewRequest::new(TierView::Custom)
        };
        let selected = select(&a, &request);
        assert!(selected.len() >= 3);
        for &i in &selected {
            assert!(a.ranking.scores[i] >= threshold);
        }

        let capped = ViewRequest {
            top_n: 2,
            ..request
        };
        assert_eq!(select(&a, &capped).len(), 2);
    }

    #[test]
    fn test_export_edges_only_between_included_nodes() {
        let a = analyze(make_two_cliques(4, true));
        let communities: Vec<CommunityInfo> = Vec::new();
        let input = ExportInput {
            graph: &a.graph,
            metrics: &a.metrics,
            summary: &a.summary,
            partition: &a.partition,
            communities: &communities,
            ranking: &a.ranking,
            total_posts: 10,
            total_comments: 25,
            collected_at: Utc::now(),
        };
        let request = ViewRequest {
            top_n: 4,
            ..ViewRequest::new(TierView::Elite)
        };
        let export = build_export(&input, &request);

        assert_eq!(export.nodes.len(), 4);
        let ids: BTreeSet<&str> = export.nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &export.edges {
            assert!(ids.contains(edge.source.as_str()));
            assert!(ids.contains(edge.target.as_str()));
        }
        assert_eq!(export.metadata.node_count, 4);
        assert_eq!(export.metadata.edge_count, export.edges.len());
        assert_eq!(export.metadata.total_agents, 8);
        assert_eq!(export.metadata.total_interactions, 25);
        assert_eq!(export.metadata.tier, "elite");
        assert_eq!(export.influencers.rankings.len(), 8);
        assert_eq!(
            export.metadata.top_influencer.as_deref(),
            Some(a.ranking.profiles[0].agent.as_str())
        );
        for node in &export.nodes {
            assert!((MIN_NODE_SIZE..=MAX_NODE_SIZE).contains(&node.size));
        }
    }

    #[test]
    fn test_export_field_names() {
        let a = analyze(make_chain_graph(3));
        let input = ExportInput {
            graph: &a.graph,
            metrics: &a.metrics,
            summary: &a.summary,
            partition: &a.partition,
            communities: &[],
            ranking: &a.ranking,
            total_posts: 1,
            total_comments: 2,
            collected_at: Utc::now(),
        };
        let export = build_export(&input, &ViewRequest::new(TierView::Major));
        let json = serde_json::to_value(&export).unwrap();

        for key in [
            "total_agents",
            "total_posts",
            "total_comments",
            "network_density",
            "community_count",
            "modularity",
            "influencer_count",
            "top_influencer",
            "avg_influence_score",
            "collected_at",
        ] {
            assert!(json["metadata"].get(key).is_some(), "missing metadata.{}", key);
        }
        assert!(json["edges"][0].get("source").is_some());
        assert!(json["influencers"]["weights"].get("pagerank").is_some());
        assert_eq!(json["nodes"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_size_hint_bounds() {
        assert_eq!(size_hint(0.0, 0.0), MIN_NODE_SIZE);
        assert_eq!(size_hint(0.5, 0.5), MAX_NODE_SIZE);
        assert_eq!(size_hint(0.25, 0.5), 27.5);
    }
}
