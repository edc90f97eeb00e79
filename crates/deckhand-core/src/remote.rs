//! Capabilities the automation layer exposes for remote objects
//!
//! The concrete protocol used to reach the host is not modelled here. Anything
//! that can release a remote object and adjust its external reference count
//! can be tracked by a [`Session`](crate::Session).

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// Local proxy for an object owned by the host process
pub trait RemoteHandle: Send + Sync {
    /// Short description for log lines
    fn describe(&self) -> String {
        "remote object".to_string()
    }

    /// Drop this process's hold on the remote object.
    ///
    /// Runs without the session's state lock, so it may track new handles or
    /// read counts. It must not pause or release on the same session, which
    /// would wait on the release pass that is calling it.
    fn release(&self) -> Result<(), RemoteError>;

    /// Add one external reference, returning the new count
    fn add_ref(&self) -> Result<u32, RemoteError>;

    /// Remove one external reference, returning the new count
    fn release_ref(&self) -> Result<u32, RemoteError>;
}

/// Output format requested from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveFormat {
    /// Host's default open document format
    #[default]
    OpenXml,
    /// Portable document export
    Pdf,
    /// Host-specific format code
    Code(i32),
}

impl fmt::Display for SaveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveFormat::OpenXml => write!(f, "open-xml"),
            SaveFormat::Pdf => write!(f, "pdf"),
            SaveFormat::Code(code) => write!(f, "code:{}", code),
        }
    }
}

/// A document handle that can persist itself
pub trait SavableDocument: RemoteHandle {
    /// Native save of this document to `path`
    fn save_as(&self, path: &Path, format: SaveFormat) -> Result<(), RemoteError>;
}

/// Host-application level operations used as save fallbacks.
///
/// Resolved once per runner, so version differences between hosts live in
/// the implementation rather than in per-call probing.
pub trait HostAutomation: Send + Sync {
    /// "Save as" on whatever document the host considers active
    fn save_active_document_as(&self, path: &Path, format: SaveFormat) -> Result<(), RemoteError>;

    /// Raise the host window above everything else
    fn bring_to_foreground(&self) -> Result<(), RemoteError>;

    /// Send the platform's save keyboard shortcut to the host window
    fn send_save_shortcut(&self) -> Result<(), RemoteError>;
}
