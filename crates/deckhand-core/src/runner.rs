//! One supervised generation per invocation
//!
//! Binds the invocation mode, a fresh [`Session`], the optional host launch,
//! the content composer and the save protocol into a single supervised run.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use deckhand_process::{HostLaunchConfig, HostLauncher, Terminator};
use tracing::{info, warn};

use crate::config::DeckhandConfig;
use crate::remote::{HostAutomation, SavableDocument, SaveFormat};
use crate::save::{SaveCommitProtocol, SaveReceipt, SaveTarget};
use crate::session::{CollectionHook, Session};
use crate::supervisor::{SupervisionOutcome, SupervisionReport, Supervisor, WorkContext};

/// What to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    /// Every section of the document
    FullDocument,
    /// One numbered section (1-based)
    Section { index: usize },
}

impl fmt::Display for InvocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationMode::FullDocument => write!(f, "full document"),
            InvocationMode::Section { index } => write!(f, "section {}", index),
        }
    }
}

/// A generation request from the command-line layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// What to generate
    pub mode: InvocationMode,
    /// Where to write it
    pub output_path: PathBuf,
    /// Output format
    pub format: SaveFormat,
}

impl GenerationRequest {
    /// Request the whole document
    pub fn full(output_path: impl Into<PathBuf>) -> Self {
        Self {
            mode: InvocationMode::FullDocument,
            output_path: output_path.into(),
            format: SaveFormat::default(),
        }
    }

    /// Request a single 1-based section
    pub fn section(index: usize, output_path: impl Into<PathBuf>) -> Self {
        Self {
            mode: InvocationMode::Section { index },
            output_path: output_path.into(),
            format: SaveFormat::default(),
        }
    }

    /// Override the output format
    pub fn with_format(mut self, format: SaveFormat) -> Self {
        self.format = format;
        self
    }
}

/// Builds document content inside a supervised run.
///
/// Implementations track every handle they obtain through
/// `ctx.session()`, pin handles used across several calls, and call
/// `ctx.end_of_section()` after finishing each section.
#[async_trait]
pub trait DocumentComposer: Send + Sync + 'static {
    /// Document handle type produced by this composer
    type Document: SavableDocument + 'static;

    /// Compose the requested content and return the document to save
    async fn compose(
        &self,
        ctx: &WorkContext,
        request: &GenerationRequest,
    ) -> anyhow::Result<Arc<Self::Document>>;
}

/// Outcome of [`GenerationRunner::run`]
#[derive(Debug)]
pub struct GenerationReport {
    /// The request that was run
    pub request: GenerationRequest,
    /// Supervision result carrying the save receipt on success
    pub supervision: SupervisionReport<SaveReceipt>,
}

impl GenerationReport {
    /// Whether the document was composed and saved
    pub fn succeeded(&self) -> bool {
        self.supervision.completed()
    }

    /// Save receipt of a successful run
    pub fn receipt(&self) -> Option<&SaveReceipt> {
        match self.supervision.outcome {
            SupervisionOutcome::Completed(ref receipt) => Some(receipt),
            _ => None,
        }
    }
}

/// Runs generation requests end to end
pub struct GenerationRunner<C: DocumentComposer> {
    config: DeckhandConfig,
    composer: Arc<C>,
    host: Arc<dyn HostAutomation>,
    supervisor: Supervisor,
    collector: Option<CollectionHook>,
}

impl<C: DocumentComposer> GenerationRunner<C> {
    /// Create a runner
    pub fn new(
        config: DeckhandConfig,
        composer: Arc<C>,
        host: Arc<dyn HostAutomation>,
        terminator: Arc<dyn Terminator>,
    ) -> Self {
        let supervisor = Supervisor::new(config.supervisor(), terminator);
        Self {
            config,
            composer,
            host,
            supervisor,
            collector: None,
        }
    }

    /// Attach a collection hook to every session this runner creates
    pub fn with_collector(mut self, hook: CollectionHook) -> Self {
        self.collector = Some(hook);
        self
    }

    /// Run one request under supervision
    pub async fn run(&self, request: GenerationRequest) -> GenerationReport {
        let mut session = Session::new();
        if let Some(ref hook) = self.collector {
            session = session.with_collector(Arc::clone(hook));
        }
        let session = Arc::new(session);

        info!(
            session = %session.id(),
            mode = %request.mode,
            output = %request.output_path.display(),
            "Starting generation"
        );

        let composer = Arc::clone(&self.composer);
        let host = Arc::clone(&self.host);
        let protocol = SaveCommitProtocol::new(self.config.save_protocol());
        let launch = self.config.host_launch();
        let work_request = request.clone();

        let supervision = self
            .supervisor
            .run(session, move |ctx| async move {
                generate(ctx, composer, host, protocol, launch, work_request).await
            })
            .await;

        GenerationReport {
            request,
            supervision,
        }
    }
}

async fn generate<C: DocumentComposer>(
    ctx: WorkContext,
    composer: Arc<C>,
    host: Arc<dyn HostAutomation>,
    protocol: SaveCommitProtocol,
    launch: Option<HostLaunchConfig>,
    request: GenerationRequest,
) -> anyhow::Result<SaveReceipt> {
    if let InvocationMode::Section { index: 0 } = request.mode {
        bail!("section numbers start at 1");
    }

    let launcher = HostLauncher::new();
    let launched = match launch {
        Some(config) => Some(launcher.launch(config).await.context("launching host")?),
        None => None,
    };

    ctx.checkpoint()?;
    let document = composer
        .compose(&ctx, &request)
        .await
        .with_context(|| format!("composing {}", request.mode))?;

    ctx.checkpoint()?;
    let target = SaveTarget::new(request.output_path.clone(), request.format);
    let receipt = protocol
        .commit(ctx.session(), document, host.as_ref(), &target)
        .await?;

    if let Some(child) = launched {
        if let Err(e) = launcher.shutdown(child).await {
            warn!(error = %e, "Launched host did not shut down cleanly");
        }
    }

    Ok(receipt)
}
