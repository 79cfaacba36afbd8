// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON artifact store with typed operations.
//!
//! Provides load/save for:
//! - Canonical history (`activities.json`)
//! - Backfill cursors (`backfill_state.json`)
//! - Source marker (`source.json`)
//! - Daily aggregates (`daily.json`)
//! - Dashboard artifact (site data path)
//!
//! A missing artifact loads as its empty default. A present but unreadable
//! one is an integrity error; the run must not merge against it.

use crate::config::PathSettings;
use crate::db::artifacts;
use crate::error::{Result, SyncError};
use crate::models::{CursorSet, DailyAggregate, DashboardData, History, SourceMarker};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Everything a run reads at start.
#[derive(Debug, Clone, Default)]
pub struct PersistedState {
    pub history: History,
    pub cursors: CursorSet,
    pub marker: Option<SourceMarker>,
}

/// File-backed artifact store.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    data_dir: PathBuf,
    site_data_path: PathBuf,
}

impl ArtifactStore {
    pub fn new(paths: &PathSettings) -> Self {
        Self {
            data_dir: paths.data_dir.clone(),
            site_data_path: paths.site_data_path.clone(),
        }
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    // ─── Run state ───────────────────────────────────────────────

    /// Load history, cursors and marker.
    pub async fn load_state(&self) -> Result<PersistedState> {
        let history = self
            .load_or_default(&self.artifact_path(artifacts::ACTIVITIES))
            .await?;
        let cursors = self
            .load_or_default(&self.artifact_path(artifacts::BACKFILL_STATE))
            .await?;
        let marker = self.load(&self.artifact_path(artifacts::SOURCE)).await?;

        Ok(PersistedState {
            history,
            cursors,
            marker,
        })
    }

    pub async fn save_history(&self, history: &History) -> Result<()> {
        self.write_json(&self.artifact_path(artifacts::ACTIVITIES), history)
            .await
    }

    pub async fn save_cursors(&self, cursors: &CursorSet) -> Result<()> {
        self.write_json(&self.artifact_path(artifacts::BACKFILL_STATE), cursors)
            .await
    }

    pub async fn save_marker(&self, marker: &SourceMarker) -> Result<()> {
        self.write_json(&self.artifact_path(artifacts::SOURCE), marker)
            .await
    }

    // ─── Outputs ─────────────────────────────────────────────────

    pub async fn save_aggregates(&self, aggregates: &[DailyAggregate]) -> Result<()> {
        self.write_json(&self.artifact_path(artifacts::DAILY), aggregates)
            .await
    }

    pub async fn save_dashboard(&self, dashboard: &DashboardData) -> Result<()> {
        self.write_json(&self.site_data_path, dashboard).await
    }

    // ─── Helpers ─────────────────────────────────────────────────

    async fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SyncError::Integrity {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| SyncError::Integrity {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    async fn load_or_default<T: DeserializeOwned + Default>(&self, path: &Path) -> Result<T> {
        Ok(self.load(path).await?.unwrap_or_default())
    }

    /// Write pretty JSON to a temp file beside `path`, then rename over it.
    async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let io_error = |e: std::io::Error| SyncError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| SyncError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        bytes.push(b'\n');

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        let mut file = tokio::fs::File::create(&tmp).await.map_err(io_error)?;
        file.write_all(&bytes).await.map_err(io_error)?;
        file.sync_all().await.map_err(io_error)?;
        drop(file);

        tokio::fs::rename(&tmp, path).await.map_err(io_error)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Wrote artifact");
        Ok(())
    }
}
