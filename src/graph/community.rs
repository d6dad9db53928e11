//! Community detection and community summaries.
//!
//! Single-level Louvain: greedy local moves of nodes between communities on
//! the undirected, weighted view of the interaction graph. No aggregation
//! phase. The move phase is sequential; every choice below is pinned so that
//! the same graph always yields the same partition:
//!
//! - nodes are visited in node (insertion) order
//! - candidate communities are compared in ascending id
//! - a candidate replaces the incumbent only on a strictly larger gain
//! - final ids are renumbered by descending size, ties by smallest member index

use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashMap};

use super::models::{AnalyticsConfig, CommunityInfo, InteractionGraph};

/// Members listed per community summary.
const TOP_AGENTS: usize = 10;
/// Submolt tags listed per community summary.
const DOMINANT_SUBMOLTS: usize = 5;

/// Result of community detection.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// Community id per node, indexed by `NodeIndex::index()`
    pub assignment: Vec<u32>,
    pub community_count: usize,
    pub modularity: f64,
    /// Local-move passes executed
    pub passes: usize,
}

/// Undirected weighted adjacency: each directed edge contributes its weight
/// in both directions.
fn undirected_adjacency(graph: &InteractionGraph) -> (Vec<Vec<(usize, f64)>>, Vec<f64>) {
    let g = &graph.graph;
    let n = g.node_count();
    let mut adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut strengths = vec![0.0; n];

    for edge in g.edge_references() {
        let s = edge.source().index();
        let t = edge.target().index();
        let w = f64::from(edge.weight().weight);
        adj[s].push((t, w));
        adj[t].push((s, w));
        strengths[s] += w;
        strengths[t] += w;
    }
    (adj, strengths)
}

/// Detect communities with greedy modularity optimization.
pub fn louvain_communities(graph: &InteractionGraph, config: &AnalyticsConfig) -> Partition {
    let n = graph.node_count();
    if n == 0 {
        return Partition::default();
    }

    let resolution = config.louvain_resolution;
    let (adj, strengths) = undirected_adjacency(graph);
    let total_weight: f64 = strengths.iter().sum::<f64>() / 2.0;

    let mut community: Vec<u32> = (0..n as u32).collect();
    let mut passes = 0;

    if total_weight > 0.0 {
        let m2 = 2.0 * total_weight;
        let mut comm_total: Vec<f64> = strengths.clone();
        let mut improved = true;

        while improved && passes < config.louvain_max_passes {
            improved = false;
            passes += 1;

            for node in 0..n {
                let current = community[node];
                let ki = strengths[node];

                let mut comm_weights: BTreeMap<u32, f64> = BTreeMap::new();
                for &(neighbor, w) in &adj[node] {
                    *comm_weights.entry(community[neighbor]).or_default() += w;
                }

                let w_in_current = comm_weights.get(&current).copied().unwrap_or(0.0);
                let remove_cost = w_in_current / m2
                    - resolution * ki * (comm_total[current as usize] - ki) / (m2 * m2);

                let mut best_comm = current;
                let mut best_gain = 0.0;
                for (&target, &w_to_target) in &comm_weights {
                    if target == current {
                        continue;
                    }
                    let insert_cost = w_to_target / m2
                        - resolution * ki * comm_total[target as usize] / (m2 * m2);
                    let gain = insert_cost - remove_cost;
                    if gain > best_gain {
                        best_gain = gain;
                        best_comm = target;
                    }
                }

                if best_comm != current {
                    comm_total[current as usize] -= ki;
                    comm_total[best_comm as usize] += ki;
                    community[node] = best_comm;
                    improved = true;
                }
            }
        }
    }

    let community_count = renumber_by_size(&mut community);
    let modularity = compute_modularity(&community, &adj, &strengths, total_weight, resolution);

    tracing::debug!(
        "Louvain: {} communities after {} passes (Q = {:.4})",
        community_count,
        passes,
        modularity
    );

    Partition {
        assignment: community,
        community_count,
        modularity,
        passes,
    }
}

/// Relabel communities contiguously from 0 by descending size, ties broken by
/// smallest member index. Returns the community count.
fn renumber_by_size(community: &mut [u32]) -> usize {
    // old id → (size, first member)
    let mut stats: HashMap<u32, (usize, usize)> = HashMap::new();
    for (node, &c) in community.iter().enumerate() {
        let entry = stats.entry(c).or_insert((0, node));
        entry.0 += 1;
    }

    let mut order: Vec<(u32, usize, usize)> = stats
        .into_iter()
        .map(|(c, (size, first))| (c, size, first))
        .collect();
    order.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    let remap: HashMap<u32, u32> = order
        .iter()
        .enumerate()
        .map(|(new_id, &(old, _, _))| (old, new_id as u32))
        .collect();
    for c in community.iter_mut() {
        if let Some(&new_id) = remap.get(c) {
            *c = new_id;
        }
    }
    order.len()
}

/// Newman modularity `Σ_c [in_c / 2m − γ (tot_c / 2m)²]` of a partition,
/// where `in_c` is the adjacency weight inside `c` (both directions) and
/// `tot_c` the summed strength of its members.
fn compute_modularity(
    community: &[u32],
    adj: &[Vec<(usize, f64)>],
    strengths: &[f64],
    total_weight: f64,
    resolution: f64,
) -> f64 {
    if total_weight == 0.0 {
        return 0.0;
    }
    let m2 = 2.0 * total_weight;
    let count = community.iter().map(|&c| c as usize + 1).max().unwrap_or(0);
    let mut internal = vec![0.0; count];
    let mut totals = vec![0.0; count];

    for (i, neighbors) in adj.iter().enumerate() {
        let ci = community[i] as usize;
        totals[ci] += strengths[i];
        for &(j, w) in neighbors {
            if community[j] as usize == ci {
                internal[ci] += w;
            }
        }
    }

    internal
        .iter()
        .zip(&totals)
        .map(|(inside, tot)| inside / m2 - resolution * (tot / m2) * (tot / m2))
        .sum()
}

// ============================================================================
// Community summaries
// ============================================================================

/// Build the presentation summary of every community, ordered by id.
///
/// Members are ranked by PageRank (ties in node order). `names` overrides the
/// generated display name per community id.
pub fn summarize_communities(
    graph: &InteractionGraph,
    partition: &Partition,
    pagerank: &[f64],
    names: &HashMap<u32, String>,
) -> Vec<CommunityInfo> {
    let g = &graph.graph;
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); partition.community_count];
    for (node, &c) in partition.assignment.iter().enumerate() {
        if let Some(list) = members.get_mut(c as usize) {
            list.push(node);
        }
    }

    let nodes: Vec<_> = g.node_indices().collect();

    members
        .into_iter()
        .enumerate()
        .map(|(id, mut list)| {
            let id = id as u32;
            // stable sort keeps node order among equal scores
            list.sort_by(|&a, &b| pagerank[b].total_cmp(&pagerank[a]));

            let top_agents: Vec<String> = list
                .iter()
                .take(TOP_AGENTS)
                .map(|&i| g[nodes[i]].id.clone())
                .collect();

            let mut tag_counts: BTreeMap<&str, usize> = BTreeMap::new();
            for &i in &list {
                for tag in &g[nodes[i]].submolts {
                    *tag_counts.entry(tag.as_str()).or_default() += 1;
                }
            }
            let mut tags: Vec<(&str, usize)> = tag_counts.into_iter().collect();
            tags.sort_by(|a, b| b.1.cmp(&a.1));
            let dominant_submolts: Vec<String> = tags
                .into_iter()
                .take(DOMINANT_SUBMOLTS)
                .map(|(tag, _)| tag.to_string())
                .collect();

            let name = names
                .get(&id)
                .cloned()
                .unwrap_or_else(|| community_name(id, &dominant_submolts, top_agents.first()));

            CommunityInfo {
                id,
                name,
                size: list.len(),
                top_agents,
                dominant_submolts,
            }
        })
        .collect()
}

/// Generated display name: the dominant submolts joined in frequency order and
/// the top member, e.g. `general + crypto (alice)`, or `Community 3` without
/// submolts.
fn community_name(id: u32, submolts: &[String], top_member: Option<&String>) -> String {
    if submolts.is_empty() {
        return format!("Community {}", id);
    }
    let tags = submolts.join(" + ");
    match top_member {
        Some(member) => format!("{} ({})", tags, member),
        None => tags,
    }
}

// ============================================================================
// Tests
// ============================================================================
