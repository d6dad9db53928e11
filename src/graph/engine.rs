//! Analytics engine: orchestrates the full pipeline.
//!
//! The `AnalyticsEngine` trait is the single entry point for analytics
//! consumers (the CLI, integration tests). One run is:
//!
//! 1. **Loading**: records from a [`RecordSource`]
//! 2. **Construction**: records → `InteractionGraph` via [`GraphBuilder`]
//! 3. **Metrics**: degree, PageRank, betweenness, closeness, clustering, WCC
//! 4. **Communities**: Louvain partition and community summaries
//! 5. **Influence**: composite score, rank and tier per agent
//!
//! Each stage runs to completion before the next starts. The resulting
//! [`AnalysisRun`] is immutable; views are exported from it on demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::algorithms::compute_metrics;
use super::builder::{BuildReport, GraphBuilder};
use super::community::{louvain_communities, summarize_communities, Partition};
use super::export::{build_export, ExportConfig, ExportInput, ViewRequest, VisualizationExport};
use super::influence::{score_influence, InfluenceConfig, InfluenceRanking};
use super::models::{
    AnalysisWarning, AnalyticsConfig, CommunityInfo, InteractionGraph, NetworkSummary,
    NodeMetrics,
};
use super::records::{LoadError, RecordSet, RecordSource};
use super::writer::{ExportWriter, WriteError};

// ============================================================================
// Settings and errors
// ============================================================================

/// Everything that tunes one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub analytics: AnalyticsConfig,
    pub influence: InfluenceConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

// ============================================================================
// Output type
// ============================================================================

/// Complete, immutable result of one pipeline run.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub graph: InteractionGraph,
    pub build: BuildReport,
    /// Per-node metrics with community ids attached, indexed by `NodeIndex::index()`
    pub metrics: Vec<NodeMetrics>,
    pub summary: NetworkSummary,
    pub partition: Partition,
    pub communities: Vec<CommunityInfo>,
    pub ranking: InfluenceRanking,
    /// The configured view, already validated
    pub request: ViewRequest,
    /// Every configuration fallback taken during the run
    pub warnings: Vec<AnalysisWarning>,
    pub computed_at: DateTime<Utc>,
}

impl AnalysisRun {
    /// Export the configured view.
    pub fn export(&self) -> VisualizationExport {
        self.export_view(&self.request)
    }

    /// Export an arbitrary view of this run.
    pub fn export_view(&self, request: &ViewRequest) -> VisualizationExport {
        let input = ExportInput {
            graph: &self.graph,
            metrics: &self.metrics,
            summary: &self.summary,
            partition: &self.partition,
            communities: &self.communities,
            ranking: &self.ranking,
            total_posts: self.build.posts,
            total_comments: self.build.comments,
            collected_at: self.computed_at,
        };
        build_export(&input, request)
    }
}

// ============================================================================
// Trait
// ============================================================================

/// Analytics engine trait: single entry point for network analytics.
///
/// Consumers hold `Arc<dyn AnalyticsEngine>`; tests can substitute an
/// engine over an in-memory [`RecordSet`].
pub trait AnalyticsEngine: Send + Sync {
    /// Load records and run every stage.
    fn analyze(&self) -> Result<AnalysisRun, EngineError>;

    /// Full pipeline plus writing the configured view to `output`.
    fn analyze_and_write(&self, output: &Path) -> Result<AnalysisRun, EngineError>;
}

// ============================================================================
// Concrete implementation
// ============================================================================

/// Analytics engine over any [`RecordSource`].
pub struct GraphAnalyticsEngine {
    source: Arc<dyn RecordSource>,
    builder: GraphBuilder,
    writer: ExportWriter,
    settings: AnalysisSettings,
}

impl GraphAnalyticsEngine {
    pub fn new(source: Arc<dyn RecordSource>, settings: AnalysisSettings) -> Self {
        Self {
            source,
            builder: GraphBuilder::new(),
            writer: ExportWriter::new(),
            settings,
        }
    }

    /// Engine with default settings.
    pub fn with_defaults(source: impl RecordSource + 'static) -> Self {
        Self::new(Arc::new(source), AnalysisSettings::default())
    }

    pub fn with_writer(mut self, writer: ExportWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Run every stage over already-loaded records.
    pub fn analyze_records(&self, records: &RecordSet) -> AnalysisRun {
        let start = std::time::Instant::now();
        let mut warnings = Vec::new();

        let (analytics, config_warnings) = self.settings.analytics.sanitized();
        for w in &config_warnings {
            tracing::warn!("{}", w);
        }
        warnings.extend(config_warnings);

        // 1. Construction
        let (graph, build) = self.builder.build(records);

        // 2. Metrics
        let report = compute_metrics(&graph, &analytics);
        let mut metrics = report.metrics;

        // 3. Communities
        let partition = louvain_communities(&graph, &analytics);
        for (m, &community) in metrics.iter_mut().zip(&partition.assignment) {
            m.community = community;
        }
        let pagerank: Vec<f64> = metrics.iter().map(|m| m.pagerank).collect();
        let communities = summarize_communities(
            &graph,
            &partition,
            &pagerank,
            &self.settings.export.community_names,
        );

        // 4. Influence
        let ranking = score_influence(&graph, &metrics, &self.settings.influence);
        warnings.extend(ranking.warnings.iter().cloned());

        // 5. View
        let (request, view_warnings) = ViewRequest::from_config(&self.settings.export);
        warnings.extend(view_warnings);

        tracing::info!(
            "Analysis complete in {}ms: {} agents, {} edges, {} communities (Q = {:.4}), {} warnings",
            start.elapsed().as_millis(),
            report.summary.node_count,
            report.summary.edge_count,
            partition.community_count,
            partition.modularity,
            warnings.len()
        );

        AnalysisRun {
            graph,
            build,
            metrics,
            summary: report.summary,
            partition,
            communities,
            ranking,
            request,
            warnings,
            computed_at: Utc::now(),
        }
    }
}

impl AnalyticsEngine for GraphAnalyticsEngine {
    fn analyze(&self) -> Result<AnalysisRun, EngineError> {
        let records = self.source.load()?;
        Ok(self.analyze_records(&records))
    }

    fn analyze_and_write(&self, output: &Path) -> Result<AnalysisRun, EngineError> {
        let run = self.analyze()?;
        self.writer.write(&run.export(), output)?;
        Ok(run)
    }
}

// ============================================================================
// Tests
// ============================================================================
