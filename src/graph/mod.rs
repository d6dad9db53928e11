//! Social interaction network analytics.
//!
//! Computes structural influence and community structure over the directed
//! graph of who replies to whom, using petgraph for storage and rayon for the
//! embarrassingly parallel metric passes.
//!
//! ## Architecture
//!
//! ```text
//! RecordSource (JSON dir / in-memory) ──► records ──► builder ──► petgraph::DiGraph
//!                                                                      │
//!                                                  algorithms ─ community ─ influence
//!                                                                      │
//!                                                                AnalysisRun
//!                                                                      │
//!                                                      export (tier view) ──► writer ──► JSON
//! ```
//!
//! ## Modules
//!
//! - [`records`] — Raw record shapes, ingestion normalization, record sources
//! - [`models`] — Canonical graph, metric bundle, profiles, `AnalyticsConfig`, warnings
//! - [`builder`] — Records → `InteractionGraph`
//! - [`algorithms`] — Degree, PageRank, Betweenness, Closeness, Clustering, WCC
//! - [`community`] — Louvain partition, modularity, community summaries
//! - [`influence`] — Composite influence score, ranking, tiers, partners
//! - [`export`] — Tier views and the visualization result bundle
//! - [`writer`] — JSON output of the result bundle
//! - [`engine`] — `AnalyticsEngine` trait and `GraphAnalyticsEngine` orchestrator

pub mod algorithms;
pub mod builder;
pub mod community;
pub mod engine;
pub mod export;
pub mod influence;
pub mod models;
pub mod records;
pub mod writer;

// Re-export primary types for convenience
pub use builder::{BuildReport, GraphBuilder};
pub use community::Partition;
pub use engine::{AnalysisRun, AnalysisSettings, AnalyticsEngine, EngineError, GraphAnalyticsEngine};
pub use export::{ExportConfig, TierView, ViewRequest, VisualizationExport};
pub use influence::{InfluenceConfig, InfluenceRanking, InfluenceWeights, TierThresholds};
pub use models::{
    Agent, AnalysisWarning, AnalyticsConfig, CommunityInfo, InfluencerProfile, InteractionEdge,
    InteractionGraph, InteractionPartner, InteractionType, NetworkSummary, NodeMetrics, Tier,
};
pub use records::{JsonDirSource, LoadError, RecordSet, RecordSource};
pub use writer::{ExportWriter, WriteError};
