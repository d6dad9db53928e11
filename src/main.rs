//! Mist Analytics - CLI
//!
//! Builds the interaction graph from the collector's JSON files, runs the
//! analytics pipeline and writes or prints the results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mist_analytics::graph::{
    AnalysisRun, AnalyticsEngine, ExportWriter, GraphAnalyticsEngine, JsonDirSource,
};
use mist_analytics::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mist-analytics")]
#[command(about = "Influence and community analytics for agent interaction networks")]
struct Cli {
    /// YAML config file (defaults to ./config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory with posts.json, comments.json, agents.json, leaderboard.json
    #[arg(short, long, global = true, env = "MIST_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write the visualization bundle
    Analyze {
        /// Output file (overrides config.yaml)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// View to export: elite, major, expanded, community, custom
        #[arg(short, long)]
        tier: Option<String>,

        /// Number of top agents in the view
        #[arg(long)]
        top_n: Option<usize>,

        /// Minimum influence score for the custom view
        #[arg(long)]
        min_score: Option<f64>,

        /// Add direct neighbours of the selected agents
        #[arg(long)]
        include_connections: bool,

        /// Print the bundle to stdout instead of writing a file
        #[arg(long)]
        stdout: bool,
    },

    /// Print the influencer leaderboard
    Rank {
        /// Number of rows
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Print the detected communities
    Communities,
}

fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,mist_analytics=debug".into());
    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    // Load configuration
    let mut config = Config::from_yaml_and_env(cli.config.as_deref());
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Analyze {
            output,
            tier,
            top_n,
            min_score,
            include_connections,
            stdout,
        } => {
            let export = &mut config.settings.export;
            if let Some(tier) = tier {
                export.tier = tier;
            }
            if top_n.is_some() {
                export.top_n = top_n;
            }
            if let Some(min_score) = min_score {
                export.min_score = min_score;
            }
            if include_connections {
                export.include_connections = true;
            }
            if let Some(output) = output {
                config.output = output;
            }
            run_analyze(&config, stdout)
        }
        Commands::Rank { limit } => {
            let run = analyze(&config)?;
            print_ranking(&run, limit);
            Ok(())
        }
        Commands::Communities => {
            let run = analyze(&config)?;
            print_communities(&run);
            Ok(())
        }
    }
}

fn engine(config: &Config) -> GraphAnalyticsEngine {
    GraphAnalyticsEngine::new(
        Arc::new(JsonDirSource::new(&config.data_dir)),
        config.settings.clone(),
    )
}

fn analyze(config: &Config) -> Result<AnalysisRun> {
    tracing::info!("Analyzing records in {}", config.data_dir.display());
    engine(config)
        .analyze()
        .with_context(|| format!("analysis of {} failed", config.data_dir.display()))
}

fn run_analyze(config: &Config, stdout: bool) -> Result<()> {
    if stdout {
        let run = analyze(config)?;
        let json = ExportWriter::new()
            .render(&run.export())
            .context("failed to render result bundle")?;
        println!("{}", json);
        return Ok(());
    }

    let run = engine(config)
        .analyze_and_write(&config.output)
        .with_context(|| format!("failed to produce {}", config.output.display()))?;

    tracing::info!(
        "Done: {} agents, {} communities, {} warnings -> {}",
        run.summary.node_count,
        run.partition.community_count,
        run.warnings.len(),
        config.output.display()
    );
    Ok(())
}

fn print_ranking(run: &AnalysisRun, limit: usize) {
    println!(
        "{:>5}  {:<28} {:>8}  {:<7} {:>9} {:>7} {:>6}",
        "RANK", "AGENT", "SCORE", "TIER", "PAGERANK", "IN-DEG", "KARMA"
    );
    for p in run.ranking.profiles.iter().take(limit) {
        println!(
            "{:>5}  {:<28} {:>8.4}  {:<7} {:>9.5} {:>7} {:>6}",
            p.rank,
            p.agent,
            p.influence_score,
            p.tier.to_string(),
            p.metrics.pagerank,
            p.metrics.in_degree,
            p.karma
        );
    }
}

fn print_communities(run: &AnalysisRun) {
    println!(
        "{} communities, modularity {:.4}",
        run.partition.community_count, run.partition.modularity
    );
    for c in &run.communities {
        println!(
            "#{:<3} {:<40} size {:>5}  top: {}",
            c.id,
            c.name,
            c.size,
            c.top_agents
                .iter()
                .take(5)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}
