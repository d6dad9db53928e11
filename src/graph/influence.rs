//! Composite influence scoring, ranking and tiering.
//!
//! Six per-node signals are min-max normalized across the whole node set and
//! combined with [`InfluenceWeights`]:
//!
//! | signal | source | default weight |
//! |---|---|---|
//! | PageRank | metrics | 0.30 |
//! | in-degree | metrics | 0.25 |
//! | karma | agent reputation | 0.15 |
//! | post count | agent activity | 0.10 |
//! | reply rate | in-degree / comment count | 0.10 |
//! | betweenness | metrics | 0.10 |
//!
//! Reply rate is normalized by its maximum rather than min-max.

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::models::{
    AnalysisWarning, InfluencerProfile, InteractionGraph, InteractionPartner, NodeMetrics, Tier,
};

/// Partners kept per direction in a profile.
const TOP_PARTNERS: usize = 10;

// ============================================================================
// Configuration
// ============================================================================

/// Weights of the composite influence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluenceWeights {
    pub pagerank: f64,
    pub in_degree: f64,
    pub karma: f64,
    pub post_count: f64,
    pub reply_rate: f64,
    pub betweenness: f64,
}

impl Default for InfluenceWeights {
    fn default() -> Self {
        Self {
            pagerank: 0.30,
            in_degree: 0.25,
            karma: 0.15,
            post_count: 0.10,
            reply_rate: 0.10,
            betweenness: 0.10,
        }
    }
}

impl InfluenceWeights {
    fn as_array(&self) -> [f64; 6] {
        [
            self.pagerank,
            self.in_degree,
            self.karma,
            self.post_count,
            self.reply_rate,
            self.betweenness,
        ]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Check the weights, falling back or rescaling as needed.
    ///
    /// Negative or non-finite weights, or all-zero weights, are replaced by
    /// the defaults. A usable set that does not sum to 1 is rescaled.
    pub fn validated(&self) -> (Self, Option<AnalysisWarning>) {
        let values = self.as_array();
        if let Some(bad) = values.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return (
                Self::default(),
                Some(AnalysisWarning::InvalidWeights {
                    reason: format!("weight {} is negative or not finite", bad),
                }),
            );
        }

        let sum = self.sum();
        if sum <= 0.0 {
            return (
                Self::default(),
                Some(AnalysisWarning::InvalidWeights {
                    reason: "all weights are zero".to_string(),
                }),
            );
        }
        if (sum - 1.0).abs() > 1e-9 {
            let scaled = Self {
                pagerank: self.pagerank / sum,
                in_degree: self.in_degree / sum,
                karma: self.karma / sum,
                post_count: self.post_count / sum,
                reply_rate: self.reply_rate / sum,
                betweenness: self.betweenness / sum,
            };
            return (scaled, Some(AnalysisWarning::WeightsRescaled { sum }));
        }

        (self.clone(), None)
    }
}

/// Rank and percentile cutoffs for tier assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub elite_rank: usize,
    pub elite_percentile: f64,
    pub major_rank: usize,
    pub major_percentile: f64,
    pub rising_percentile: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            elite_rank: 100,
            elite_percentile: 0.001,
            major_rank: 500,
            major_percentile: 0.01,
            rising_percentile: 0.05,
        }
    }
}

impl TierThresholds {
    /// Tier for a 1-based `rank` among `total` ranked agents.
    pub fn tier_for(&self, rank: usize, total: usize) -> Tier {
        let percentile = if total == 0 {
            1.0
        } else {
            rank as f64 / total as f64
        };
        if rank <= self.elite_rank || percentile <= self.elite_percentile {
            Tier::Elite
        } else if rank <= self.major_rank || percentile <= self.major_percentile {
            Tier::Major
        } else if percentile <= self.rising_percentile {
            Tier::Rising
        } else {
            Tier::Active
        }
    }
}

/// The `influence` configuration section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluenceConfig {
    pub weights: InfluenceWeights,
    pub tiers: TierThresholds,
}

// ============================================================================
// Normalization
// ============================================================================

/// Min-max normalize to [0, 1]. A constant (or empty) input maps to all zeros.
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let (min, max) = values
        .par_iter()
        .fold(
            || (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), &v| (lo.min(v), hi.max(v)),
        )
        .reduce(
            || (f64::INFINITY, f64::NEG_INFINITY),
            |a, b| (a.0.min(b.0), a.1.max(b.1)),
        );

    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.par_iter().map(|v| (v - min) / range).collect()
}

/// Divide by the maximum; all zeros when the maximum is not positive.
fn max_normalize(values: &[f64]) -> Vec<f64> {
    let max = values
        .par_iter()
        .copied()
        .reduce(|| f64::NEG_INFINITY, f64::max);
    if max.is_nan() || max <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.par_iter().map(|v| v / max).collect()
}

/// In-degree per authored comment, 0 for agents without comments.
pub fn reply_rates(graph: &InteractionGraph, metrics: &[NodeMetrics]) -> Vec<f64> {
    graph
        .graph
        .node_indices()
        .map(|idx| {
            let comments = graph.graph[idx].comment_count;
            if comments == 0 {
                0.0
            } else {
                metrics[idx.index()].in_degree as f64 / comments as f64
            }
        })
        .collect()
}

// ============================================================================
// Scoring
// ============================================================================

/// Full influence ranking of one analysis run.
#[derive(Debug, Clone, Default)]
pub struct InfluenceRanking {
    /// Every agent, best first
    pub profiles: Vec<InfluencerProfile>,
    /// Composite score per node, indexed by `NodeIndex::index()`
    pub scores: Vec<f64>,
    /// 1-based rank per node, indexed by `NodeIndex::index()`
    pub ranks: Vec<usize>,
    /// Weights actually applied after validation
    pub weights: InfluenceWeights,
    pub warnings: Vec<AnalysisWarning>,
}

/// Score, rank and tier every agent.
///
/// Ties on score are broken by external reputation rank (unranked last),
/// then by node order.
pub fn score_influence(
    graph: &InteractionGraph,
    metrics: &[NodeMetrics],
    config: &InfluenceConfig,
) -> InfluenceRanking {
    let g = &graph.graph;
    let n = g.node_count();

    let mut warnings = Vec::new();
    let (weights, warning) = config.weights.validated();
    if let Some(w) = warning {
        tracing::warn!("{}", w);
        warnings.push(w);
    }
    if n == 0 {
        return InfluenceRanking {
            weights,
            warnings,
            ..Default::default()
        };
    }

    let agents: Vec<_> = g.node_indices().map(|idx| &g[idx]).collect();
    let metric = |f: fn(&NodeMetrics) -> f64| -> Vec<f64> { metrics.iter().map(f).collect() };

    let pagerank = min_max_normalize(&metric(|m| m.pagerank));
    let in_degree = min_max_normalize(&metric(|m| m.in_degree as f64));
    let karma = min_max_normalize(&agents.iter().map(|a| a.karma as f64).collect::<Vec<_>>());
    let posts =
        min_max_normalize(&agents.iter().map(|a| a.post_count as f64).collect::<Vec<_>>());
    let reply_rate = max_normalize(&reply_rates(graph, metrics));
    let betweenness = min_max_normalize(&metric(|m| m.betweenness));

    let scores: Vec<f64> = (0..n)
        .map(|i| {
            weights.pagerank * pagerank[i]
                + weights.in_degree * in_degree[i]
                + weights.karma * karma[i]
                + weights.post_count * posts[i]
                + weights.reply_rate * reply_rate[i]
                + weights.betweenness * betweenness[i]
        })
        .collect();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .total_cmp(&scores[a])
            .then_with(|| cmp_reputation(agents[a].reputation_rank, agents[b].reputation_rank))
            .then(a.cmp(&b))
    });

    let mut ranks = vec![0; n];
    let profiles: Vec<InfluencerProfile> = order
        .iter()
        .enumerate()
        .map(|(position, &i)| {
            let rank = position + 1;
            ranks[i] = rank;
            let idx = NodeIndex::new(i);
            let agent = agents[i];
            InfluencerProfile {
                agent: agent.id.clone(),
                influence_score: scores[i],
                rank,
                tier: config.tiers.tier_for(rank, n),
                metrics: metrics[i].clone(),
                karma: agent.karma,
                post_count: agent.post_count,
                comment_count: agent.comment_count,
                replies_to: top_partners(graph, idx, Direction::Outgoing),
                replies_from: top_partners(graph, idx, Direction::Incoming),
            }
        })
        .collect();

    tracing::info!(
        "Scored {} agents, top: {} ({:.4})",
        n,
        profiles[0].agent,
        profiles[0].influence_score
    );

    InfluenceRanking {
        profiles,
        scores,
        ranks,
        weights,
        warnings,
    }
}

fn cmp_reputation(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Heaviest interaction partners in one direction, ties in node order.
fn top_partners(
    graph: &InteractionGraph,
    idx: NodeIndex,
    direction: Direction,
) -> Vec<InteractionPartner> {
    let g = &graph.graph;
    let mut partners: Vec<(NodeIndex, u32)> = g
        .edges_directed(idx, direction)
        .map(|edge| {
            let other = match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            };
            (other, edge.weight().weight)
        })
        .collect();
    partners.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    partners
        .into_iter()
        .take(TOP_PARTNERS)
        .map(|(other, weight)| InteractionPartner {
            agent: g[other].id.clone(),
            weight,
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
