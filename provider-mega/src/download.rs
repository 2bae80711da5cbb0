//! Download orchestration
//!
//! Every download re-validates the session interactively before streaming,
//! so this is the only path on which the login prompt can appear. Failures
//! are logged and reported as "no file produced"; only cancellation is
//! returned as an error.

use bridge_traits::{ProgressSink, RemoteBackend, RemoteNode};
use core_auth::SessionManager;
use core_runtime::logging::strip_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{MegaError, Result};

pub struct DownloadOrchestrator {
    backend: Arc<dyn RemoteBackend>,
    sessions: Arc<SessionManager>,
}

impl DownloadOrchestrator {
    pub fn new(backend: Arc<dyn RemoteBackend>, sessions: Arc<SessionManager>) -> Self {
        Self { backend, sessions }
    }

    /// Stream `node` to `destination`.
    ///
    /// Returns `Ok(Some(destination))` on success and `Ok(None)` when the
    /// session or the transfer failed. No retry is attempted here; a transfer
    /// the backend refused marks the session lost so the next download
    /// reconnects.
    ///
    /// # Errors
    ///
    /// `MegaError::Cancelled` if `cancel` fires or the user dismisses the
    /// login prompt.
    #[instrument(
        skip(self, node, progress, cancel),
        fields(node = %node.id, destination = %strip_path(&destination.to_string_lossy()))
    )]
    pub async fn download(
        &self,
        node: &RemoteNode,
        destination: &Path,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<Option<PathBuf>> {
        if !node.is_file() {
            warn!("Only files can be downloaded");
            return Ok(None);
        }

        if let Err(e) = self.sessions.ensure_session(true, cancel.clone()).await {
            let e = MegaError::from(e);
            if e.is_cancelled() {
                debug!("Download cancelled while connecting");
                return Err(e);
            }
            warn!(error = %e, "No session for download");
            return Ok(None);
        }

        let sink = clamped(progress.clone());
        match self
            .backend
            .download(node, destination, sink, cancel.clone())
            .await
        {
            Ok(()) => {
                progress(1.0);
                info!(size = node.size, "Download complete");
                Ok(Some(destination.to_path_buf()))
            }
            Err(e) if e.is_cancelled() || cancel.is_cancelled() => {
                debug!("Download cancelled");
                Err(MegaError::Cancelled)
            }
            Err(e) if e.is_rejected() => {
                warn!(error = %e, "Download refused, session will be re-established");
                self.sessions.mark_disconnected().await;
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Download failed");
                Ok(None)
            }
        }
    }
}

/// Forward progress to `sink`, held inside `0.0..=1.0`.
fn clamped(sink: ProgressSink) -> ProgressSink {
    Arc::new(move |fraction: f64| {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        sink(fraction)
    })
}
