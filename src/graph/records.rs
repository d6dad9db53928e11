//! Raw interaction records and their ingestion normalization.
//!
//! The collector hands over loosely shaped JSON: authors may be plain strings,
//! objects, or missing entirely, and timestamps come under several keys. This
//! module is the single place where those shapes are reduced to canonical
//! values; the builder and every later stage see only normalized accessors.
//!
//! [`RecordSource`] is the seam to the collector. [`JsonDirSource`] reads the
//! collector's on-disk output (`posts.json`, `comments.json`, `agents.json`
//! and an optional `leaderboard.json`).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Flexible field shapes
// ============================================================================

/// An author reference as emitted by the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorRef {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        username: Option<String>,
    },
}

impl AuthorRef {
    fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => clean(Some(name.as_str())),
            Self::Object { name, username } => {
                clean(name.as_deref()).or_else(|| clean(username.as_deref()))
            }
        }
    }
}

/// A submolt reference: either its name or an object carrying it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmoltRef {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<String>,
    },
}

impl SubmoltRef {
    fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => clean(Some(name.as_str())),
            Self::Object { name } => clean(name.as_deref()),
        }
    }
}

fn clean(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_timestamp(primary: Option<&str>, secondary: Option<&str>) -> Option<DateTime<Utc>> {
    clean(primary)
        .or_else(|| clean(secondary))
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn resolve_author<'a>(author: &'a Option<AuthorRef>, author_name: &'a Option<String>) -> Option<&'a str> {
    author
        .as_ref()
        .and_then(AuthorRef::name)
        .or_else(|| clean(author_name.as_deref()))
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    #[serde(default)]
    pub author: Option<AuthorRef>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub submolt: Option<SubmoltRef>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl PostRecord {
    pub fn author(&self) -> Option<&str> {
        resolve_author(&self.author, &self.author_name)
    }

    pub fn submolt(&self) -> Option<&str> {
        self.submolt.as_ref().and_then(SubmoltRef::name)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.created_at.as_deref(), self.timestamp.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub post_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub author: Option<AuthorRef>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl CommentRecord {
    pub fn author(&self) -> Option<&str> {
        resolve_author(&self.author, &self.author_name)
    }

    /// Parent comment id; empty strings count as top-level.
    pub fn parent_id(&self) -> Option<&str> {
        clean(self.parent_id.as_deref())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.created_at.as_deref(), self.timestamp.as_deref())
    }
}

/// Agent profile as reported by the collector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRecord {
    #[serde(alias = "id")]
    pub name: String,
    #[serde(default, alias = "display_name")]
    pub label: Option<String>,
    #[serde(default)]
    pub karma: Option<i64>,
    #[serde(default)]
    pub post_count: Option<u64>,
    #[serde(default)]
    pub comment_count: Option<u64>,
}

/// Entry of the external reputation leaderboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    #[serde(default)]
    pub karma: i64,
    #[serde(default)]
    pub rank: Option<u32>,
}

/// Everything the collector hands over for one analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordSet {
    #[serde(default)]
    pub posts: Vec<PostRecord>,
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
    #[serde(default)]
    pub agents: Vec<AgentRecord>,
    #[serde(default)]
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Records dropped at load time because they did not match any known shape
    #[serde(default)]
    pub malformed: usize,
}

// ============================================================================
// Record sources
// ============================================================================

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Supplier of already-materialized record collections.
pub trait RecordSource: Send + Sync {
    fn load(&self) -> Result<RecordSet, LoadError>;
}

impl RecordSource for RecordSet {
    fn load(&self) -> Result<RecordSet, LoadError> {
        Ok(self.clone())
    }
}

/// Reads the collector's JSON files from a directory.
///
/// `posts.json` and `comments.json` are required; `agents.json` and
/// `leaderboard.json` are optional and default to empty.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Read one collection file. Individual records that fail to parse are
    /// skipped and counted in `malformed`; only a file that is not a JSON
    /// array fails the load.
    fn read<T: DeserializeOwned>(
        &self,
        file: &str,
        required: bool,
        malformed: &mut usize,
    ) -> Result<Vec<T>, LoadError> {
        let path = self.dir.join(file);
        if !required && !path.exists() {
            tracing::debug!("No {} in {}, treating as empty", file, self.dir.display());
            return Ok(Vec::new());
        }

        let values: Vec<serde_json::Value> = read_json(&path)?;
        let mut records = Vec::with_capacity(values.len());
        for (position, value) in values.into_iter().enumerate() {
            match serde_json::from_value(value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::debug!("Skipping record {} of {}: {}", position, file, e);
                    *malformed += 1;
                }
            }
        }
        Ok(records)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

impl RecordSource for JsonDirSource {
    fn load(&self) -> Result<RecordSet, LoadError> {
        let mut malformed = 0;
        let posts = self.read("posts.json", true, &mut malformed)?;
        let comments = self.read("comments.json", true, &mut malformed)?;
        let agents = self.read("agents.json", false, &mut malformed)?;
        let leaderboard = self.read("leaderboard.json", false, &mut malformed)?;
        let records = RecordSet {
            posts,
            comments,
            agents,
            leaderboard,
            malformed,
        };
        tracing::info!(
            "Loaded {} posts, {} comments, {} agents, {} leaderboard entries from {} ({} malformed skipped)",
            records.posts.len(),
            records.comments.len(),
            records.agents.len(),
            records.leaderboard.len(),
            self.dir.display(),
            records.malformed
        );
        Ok(records)
    }
}

// ============================================================================
// Tests
// ============================================================================
