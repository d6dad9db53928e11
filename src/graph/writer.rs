//! Result bundle writer.
//!
//! Serializes a [`VisualizationExport`] as pretty-printed JSON. The bundle is
//! written to a sibling temp file and renamed into place, so a reader never
//! observes a half-written file. Re-running overwrites the previous result.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::export::VisualizationExport;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize result bundle: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes result bundles to disk.
#[derive(Debug, Clone)]
pub struct ExportWriter {
    pretty: bool,
}

impl Default for ExportWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportWriter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Emit compact JSON instead of pretty-printed.
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    /// Serialize to a JSON string.
    pub fn render(&self, export: &VisualizationExport) -> Result<String, WriteError> {
        let json = if self.pretty {
            serde_json::to_string_pretty(export)?
        } else {
            serde_json::to_string(export)?
        };
        Ok(json)
    }

    /// Write the bundle to `path`, creating parent directories as needed.
    pub fn write(&self, export: &VisualizationExport, path: &Path) -> Result<(), WriteError> {
        let io_err = |source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp).map_err(io_err)?;
            let mut out = BufWriter::new(file);
            if self.pretty {
                serde_json::to_writer_pretty(&mut out, export)?;
            } else {
                serde_json::to_writer(&mut out, export)?;
            }
            out.flush().map_err(io_err)?;
        }
        std::fs::rename(&tmp, path).map_err(io_err)?;

        tracing::info!(
            "Wrote {} nodes, {} edges to {}",
            export.metadata.node_count,
            export.metadata.edge_count,
            path.display()
        );
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
