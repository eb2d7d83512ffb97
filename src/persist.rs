//! Persistence sink for finished run results.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::aggregate::RunResult;
use crate::error::PipelineError;

/// Durable storage for a finished [`RunResult`].
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Store `result`, returning a reference to where it went (a file path
    /// for file sinks).
    async fn store(&self, result: &RunResult) -> Result<String, PipelineError>;
}

/// Writes each result as pretty JSON to
/// `<dir>/scrape_results_<YYYYMMDD_HHMMSS>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    directory: PathBuf,
}

impl JsonFileSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_name() -> String {
        format!(
            "scrape_results_{}.json",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        )
    }
}

#[async_trait]
impl PersistenceSink for JsonFileSink {
    async fn store(&self, result: &RunResult) -> Result<String, PipelineError> {
        let json = result
            .to_json_pretty()
            .map_err(|e| PipelineError::Persistence(format!("cannot serialize result: {e}")))?;

        tokio::fs::create_dir_all(&self.directory).await.map_err(|e| {
            PipelineError::Persistence(format!(
                "cannot create {}: {e}",
                self.directory.display()
            ))
        })?;

        let path = self.directory.join(Self::file_name());
        tokio::fs::write(&path, json).await.map_err(|e| {
            PipelineError::Persistence(format!("cannot write {}: {e}", path.display()))
        })?;

        Ok(path.display().to_string())
    }
}
