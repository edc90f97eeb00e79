//! # deckhand-process
//!
//! **Purpose**: Host process lifecycle for deckhand
//!
//! The document host is an external GUI application that owns every remote
//! object the automation layer touches. This crate launches it, and more
//! importantly makes sure it is gone afterwards.
//!
//! ## Features
//!
//! - **Host Launching**: spawn the host executable and wait for it to settle
//! - **Process Enumeration**: find host instances by name through [`ProcessTable`]
//! - **Watchdog**: graceful close → bounded wait → forced kill, per instance
//! - **Process Tree Kill**: kill process groups on Unix, task trees on Windows
//!
//! ## Usage
//!
//! ```rust,no_run
//! use deckhand_process::{ProcessWatchdog, WatchdogConfig};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let watchdog = ProcessWatchdog::new(WatchdogConfig::default());
//! let report = watchdog.ensure_terminated("POWERPNT").await;
//! assert!(report.converged());
//! # }
//! ```

pub mod child;
pub mod config;
pub mod error;
pub mod manager;
pub mod table;
pub mod watchdog;

pub use child::HostChild;
pub use config::{HostLaunchConfig, WatchdogConfig};
pub use error::{ProcessError, Result};
pub use manager::HostLauncher;
pub use table::{matches_process_name, ProcessEntry, ProcessTable, SystemProcessTable};
pub use watchdog::{ProcessWatchdog, TerminationOutcome, TerminationReport, Terminator};
