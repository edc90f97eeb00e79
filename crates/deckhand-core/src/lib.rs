//! # deckhand-core
//!
//! **Purpose**: Lifetime management for remote object handles owned by an
//! external document host, and supervision of the runs that create them.
//!
//! Every shape, text range or slide the automation layer touches is a proxy
//! for an object living inside the host process. The host, not this process,
//! decides when those objects die. This crate keeps track of them:
//!
//! - [`Session`]: per-run handle registry and pause gate
//! - [`PinGuard`]: scoped extra reference on a handle in active use
//! - [`AgingBatchReleaser`]: FIFO trimming of old handles
//! - [`SaveCommitProtocol`]: escalating save strategies with size-stability confirmation
//! - [`Supervisor`]: timeout-bounded runs that always end with the host gone
//! - [`GenerationRunner`]: one supervised generation per invocation mode
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use deckhand_core::{Session, Supervisor, SupervisorConfig};
//! use deckhand_process::{ProcessWatchdog, WatchdogConfig};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let supervisor = Supervisor::new(
//!     SupervisorConfig::default(),
//!     Arc::new(ProcessWatchdog::new(WatchdogConfig::default())),
//! );
//! let report = supervisor
//!     .run(Arc::new(Session::new()), |ctx| async move {
//!         ctx.checkpoint()?;
//!         Ok::<_, anyhow::Error>(42)
//!     })
//!     .await;
//! assert!(report.completed());
//! # }
//! ```

pub mod config;
pub mod error;
pub mod eviction;
pub mod logging;
pub mod pause;
pub mod pin;
pub mod registry;
pub mod remote;
pub mod runner;
pub mod save;
pub mod session;
pub mod stability;
pub mod supervisor;

pub use config::{ConfigLoader, DeckhandConfig};
pub use error::{ConfigError, RemoteError, SaveError, SupervisionError};
pub use eviction::AgingBatchReleaser;
pub use pause::{PauseGate, PauseGuard};
pub use pin::PinGuard;
pub use registry::{HandleId, HandleRecord, HandleRegistry, ReleaseReport};
pub use remote::{HostAutomation, RemoteHandle, SavableDocument, SaveFormat};
pub use runner::{DocumentComposer, GenerationReport, GenerationRequest, GenerationRunner, InvocationMode};
pub use save::{SaveAttempt, SaveCommitProtocol, SaveConfig, SaveReceipt, SaveStrategy, SaveTarget};
pub use session::{CollectionHook, Session};
pub use stability::{Readiness, StabilityProbe};
pub use supervisor::{SupervisionOutcome, SupervisionReport, Supervisor, SupervisorConfig, WorkContext};
