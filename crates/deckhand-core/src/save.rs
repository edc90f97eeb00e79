//! Save commit protocol
//!
//! Escalates through three ways of getting the host to write the document,
//! then confirms on the filesystem that the file exists and has stopped
//! growing. The document stays pinned and batch release stays paused for the
//! whole attempt.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{RemoteError, SaveError};
use crate::remote::{HostAutomation, SavableDocument, SaveFormat};
use crate::session::Session;
use crate::stability::{Readiness, StabilityProbe};

/// Ways of getting the host to write the document, in escalation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveStrategy {
    /// The document's own save call
    Native,
    /// The host application's save-as on its active document
    HostSaveAs,
    /// Foreground the host window and send the save shortcut
    KeyboardShortcut,
}

impl SaveStrategy {
    /// All strategies in the order they are tried
    pub const ESCALATION: [SaveStrategy; 3] = [
        SaveStrategy::Native,
        SaveStrategy::HostSaveAs,
        SaveStrategy::KeyboardShortcut,
    ];
}

impl fmt::Display for SaveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveStrategy::Native => write!(f, "native"),
            SaveStrategy::HostSaveAs => write!(f, "host-save-as"),
            SaveStrategy::KeyboardShortcut => write!(f, "keyboard-shortcut"),
        }
    }
}

/// A strategy that did not produce the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveAttempt {
    /// Strategy that was tried
    pub strategy: SaveStrategy,
    /// What went wrong
    pub error: String,
}

/// Successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    /// Where the document was written
    pub path: PathBuf,
    /// Strategy that succeeded
    pub strategy: SaveStrategy,
    /// Filesystem confirmation result
    pub readiness: Readiness,
    /// Strategies that failed before this one
    pub failed_attempts: Vec<SaveAttempt>,
}

/// Output location and format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTarget {
    /// Output file path
    pub path: PathBuf,
    /// Requested format
    pub format: SaveFormat,
}

impl SaveTarget {
    /// Create a target
    pub fn new(path: impl Into<PathBuf>, format: SaveFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }
}

/// Save protocol settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveConfig {
    /// Size-stability confirmation
    pub probe: StabilityProbe,
    /// Appearance checks after sending the save shortcut
    pub shortcut_retries: u32,
    /// Delay between appearance checks
    pub appear_interval: Duration,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            probe: StabilityProbe::default(),
            shortcut_retries: 10,
            appear_interval: Duration::from_secs(1),
        }
    }
}

/// Persists a composed document with escalating fallbacks
#[derive(Debug, Clone, Default)]
pub struct SaveCommitProtocol {
    config: SaveConfig,
}

impl SaveCommitProtocol {
    /// Create a protocol with the given settings
    pub fn new(config: SaveConfig) -> Self {
        Self { config }
    }

    /// Get the protocol settings
    pub fn config(&self) -> &SaveConfig {
        &self.config
    }

    /// Save `document` to `target`.
    ///
    /// Returns the strategy that worked and the confirmation result. An
    /// unsettled confirmation is still a success: only the failure of every
    /// strategy is an error.
    pub async fn commit<D>(
        &self,
        session: &Session,
        document: Arc<D>,
        host: &dyn HostAutomation,
        target: &SaveTarget,
    ) -> Result<SaveReceipt, SaveError>
    where
        D: SavableDocument + ?Sized,
    {
        prepare_output(&target.path)?;

        let _hold = session.hold();
        let _pin = match session.pin(Arc::clone(&document)) {
            Ok(pin) => Some(pin),
            Err(e) => {
                warn!(error = %e, "Saving without a pin on the document");
                None
            }
        };

        info!(
            path = %target.path.display(),
            format = %target.format,
            "Committing document"
        );

        let mut failed_attempts = Vec::new();
        let mut succeeded = None;

        for strategy in SaveStrategy::ESCALATION {
            let result = match strategy {
                SaveStrategy::Native => document.save_as(&target.path, target.format),
                SaveStrategy::HostSaveAs => host.save_active_document_as(&target.path, target.format),
                SaveStrategy::KeyboardShortcut => self.save_via_shortcut(host, &target.path).await,
            };

            match result {
                Ok(()) => {
                    debug!(strategy = %strategy, "Save strategy reported success");
                    succeeded = Some(strategy);
                    break;
                }
                Err(e) => {
                    warn!(strategy = %strategy, error = %e, "Save strategy failed");
                    failed_attempts.push(SaveAttempt {
                        strategy,
                        error: e.to_string(),
                    });
                }
            }
        }

        let Some(strategy) = succeeded else {
            warn!(path = %target.path.display(), "Every save strategy failed");
            return Err(SaveError::AllStrategiesFailed {
                path: target.path.clone(),
                attempts: failed_attempts,
            });
        };

        let readiness = self.config.probe.wait_until_stable(&target.path).await;
        info!(
            path = %target.path.display(),
            strategy = %strategy,
            ready = readiness.is_ready(),
            "Document committed"
        );

        Ok(SaveReceipt {
            path: target.path.clone(),
            strategy,
            readiness,
            failed_attempts,
        })
    }

    async fn save_via_shortcut(&self, host: &dyn HostAutomation, path: &Path) -> Result<(), RemoteError> {
        if let Err(e) = host.bring_to_foreground() {
            // The shortcut may still land if the window already has focus
            warn!(error = %e, "Could not bring host to foreground");
        }
        host.send_save_shortcut()?;

        for attempt in 1..=self.config.shortcut_retries {
            sleep(self.config.appear_interval).await;
            if path.exists() {
                debug!(attempt, "Output file appeared after save shortcut");
                return Ok(());
            }
        }

        Err(RemoteError::call_failed(
            "save shortcut",
            format!(
                "{} did not appear after {} checks",
                path.display(),
                self.config.shortcut_retries
            ),
        ))
    }
}

/// Create the parent directory and clear any stale output
fn prepare_output(path: &Path) -> Result<(), SaveError> {
    let prepare_err = |source| SaveError::Prepare {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(prepare_err)?;
    }
    if path.exists() {
        debug!(path = %path.display(), "Removing stale output file");
        std::fs::remove_file(path).map_err(prepare_err)?;
    }
    Ok(())
}
