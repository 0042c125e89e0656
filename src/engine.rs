//! Wiring of ports into services.
//!
//! [`Engine::in_memory`] builds a fully in-process engine whose backends
//! stay reachable for inspection and fault injection.
//! [`Engine::on_disk`] roots the state views, locks and audit log in a
//! working directory:
//!
//! ```text
//! <root>/specs/<specId>.md          human-readable board per spec
//! <root>/.switchyard/state.json     machine-readable aggregate store
//! <root>/.switchyard/audit.jsonl    append-only audit log
//! <root>/.switchyard/locks/         per-spec and store lock files
//! ```

use camino::Utf8Path;
use mockable::Clock;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::audit::{
    adapters::{InMemoryAuditLog, JsonLinesAuditLog},
    ports::{AuditError, AuditSink},
};
use crate::config::{ConfigError, EngineConfig};
use crate::routing::services::TaskRouter;
use crate::task::{
    adapters::{InMemorySpecRepository, StateOverlayRepository},
    domain::Spec,
    ports::{SpecRepository, SpecRepositoryError},
};
use crate::validation::services::AssignmentValidator;
use crate::workflow::{
    adapters::{
        fs::{FileSpecLocker, JsonStateStore, MarkdownStatusBoard, Workspace},
        memory::{InMemorySpecLocker, InMemoryStateView},
    },
    ports::{AssignmentIndex, SpecLocker, StateView},
    services::{
        DualWrite, HandoffEngine, StateManagerParts, WorkflowCommands, WorkflowStateManager,
    },
};

/// Errors raised while assembling an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The catalog could not be built.
    #[error(transparent)]
    Catalog(#[from] SpecRepositoryError),
    /// The audit log could not be opened.
    #[error(transparent)]
    Audit(#[from] AuditError),
    /// The working directory could not be prepared.
    #[error("working directory error: {0}")]
    Workspace(#[from] io::Error),
}

/// Result type for engine assembly.
pub type EngineResult<T> = Result<T, EngineError>;

/// Port implementations an engine is assembled from.
pub struct EngineParts {
    /// Catalog definitions.
    pub catalog: Arc<dyn SpecRepository>,
    /// Machine-readable view.
    pub machine: Arc<dyn StateView>,
    /// Bulk queries over the machine-readable view.
    pub index: Arc<dyn AssignmentIndex>,
    /// Human-readable view.
    pub human: Arc<dyn StateView>,
    /// Per-spec lock.
    pub locker: Arc<dyn SpecLocker>,
    /// Audit sink.
    pub audit: Arc<dyn AuditSink>,
    /// Time source.
    pub clock: Arc<dyn Clock + Send + Sync>,
}

/// Concrete in-memory backends behind an [`Engine::in_memory`] engine.
#[derive(Clone)]
pub struct InMemoryBackends {
    /// The catalog.
    pub catalog: InMemorySpecRepository,
    /// Machine-readable view.
    pub machine: InMemoryStateView,
    /// Human-readable view.
    pub human: InMemoryStateView,
    /// Spec locker.
    pub locker: InMemorySpecLocker,
    /// Audit log.
    pub audit: InMemoryAuditLog,
}

/// Fully wired routing and workflow services.
#[derive(Clone)]
pub struct Engine {
    config: Arc<EngineConfig>,
    repository: Arc<dyn SpecRepository>,
    audit: Arc<dyn AuditSink>,
    router: TaskRouter,
    validator: AssignmentValidator,
    manager: WorkflowStateManager,
    commands: WorkflowCommands,
}

impl Engine {
    /// Assembles an engine from explicit ports.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when `config` fails validation.
    pub fn assemble(config: EngineConfig, parts: EngineParts) -> EngineResult<Self> {
        config.validate()?;
        let shared = Arc::new(config);
        let committed: Arc<dyn SpecRepository> = Arc::new(StateOverlayRepository::new(
            Arc::clone(&parts.catalog),
            Arc::clone(&parts.machine),
        ));
        let router = TaskRouter::new(
            Arc::clone(&committed),
            Arc::clone(&parts.audit),
            Arc::clone(&parts.clock),
            Arc::clone(&shared),
        );
        let validator = AssignmentValidator::new(
            Arc::clone(&committed),
            parts.index,
            Arc::clone(&parts.audit),
            Arc::clone(&parts.clock),
            Arc::clone(&shared),
        );
        let handoff = HandoffEngine::new(
            Arc::clone(&committed),
            Arc::clone(&parts.audit),
            Arc::clone(&parts.clock),
        );
        let manager = WorkflowStateManager::new(StateManagerParts {
            catalog: parts.catalog,
            committed: Arc::clone(&committed),
            views: DualWrite::new(parts.machine, parts.human),
            locker: parts.locker,
            validator: validator.clone(),
            handoff,
            audit: Arc::clone(&parts.audit),
            clock: Arc::clone(&parts.clock),
        });
        let commands = WorkflowCommands::new(
            router.clone(),
            validator.clone(),
            manager.clone(),
            Arc::clone(&parts.audit),
            parts.clock,
            Arc::clone(&shared),
        );
        Ok(Self {
            config: shared,
            repository: committed,
            audit: parts.audit,
            router,
            validator,
            manager,
            commands,
        })
    }

    /// Builds an in-process engine over `specs`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for an invalid configuration and
    /// [`EngineError::Catalog`] when two specs share an identifier.
    pub fn in_memory(
        config: EngineConfig,
        specs: impl IntoIterator<Item = Spec>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> EngineResult<(Self, InMemoryBackends)> {
        let backends = InMemoryBackends {
            catalog: InMemorySpecRepository::with_specs(specs)?,
            machine: InMemoryStateView::machine(),
            human: InMemoryStateView::human(),
            locker: InMemorySpecLocker::new(config.locking, Arc::clone(&clock)),
            audit: InMemoryAuditLog::new(),
        };
        let machine = Arc::new(backends.machine.clone());
        let engine = Self::assemble(
            config,
            EngineParts {
                catalog: Arc::new(backends.catalog.clone()),
                machine: Arc::clone(&machine) as Arc<dyn StateView>,
                index: machine,
                human: Arc::new(backends.human.clone()),
                locker: Arc::new(backends.locker.clone()),
                audit: Arc::new(backends.audit.clone()),
                clock,
            },
        )?;
        Ok((engine, backends))
    }

    /// Builds an engine persisting to the working directory `root`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Workspace`] when the directory layout cannot
    /// be created, [`EngineError::Audit`] when an existing audit log is
    /// unreadable, and [`EngineError::Config`] for an invalid
    /// configuration.
    pub fn on_disk(
        root: &Utf8Path,
        config: EngineConfig,
        catalog: Arc<dyn SpecRepository>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> EngineResult<Self> {
        let workspace = Workspace::open(root)?;
        let store = Arc::new(JsonStateStore::new(
            workspace.engine_dir()?,
            config.locking,
            Arc::clone(&clock),
        ));
        let audit = JsonLinesAuditLog::open(workspace.engine_dir()?)?;
        let locker = FileSpecLocker::new(workspace.lock_dir()?, config.locking, Arc::clone(&clock));
        info!(root = %workspace.root(), "opened working directory");
        Self::assemble(
            config,
            EngineParts {
                catalog,
                machine: Arc::clone(&store) as Arc<dyn StateView>,
                index: store,
                human: Arc::new(MarkdownStatusBoard::new(workspace.board_dir()?)),
                locker: Arc::new(locker),
                audit: Arc::new(audit),
                clock,
            },
        )
    }

    /// Returns the validated configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the catalog with committed state overlaid.
    #[must_use]
    pub fn repository(&self) -> Arc<dyn SpecRepository> {
        Arc::clone(&self.repository)
    }

    /// Returns the audit sink.
    #[must_use]
    pub fn audit(&self) -> Arc<dyn AuditSink> {
        Arc::clone(&self.audit)
    }

    /// Returns the router.
    #[must_use]
    pub const fn router(&self) -> &TaskRouter {
        &self.router
    }

    /// Returns the validator.
    #[must_use]
    pub const fn validator(&self) -> &AssignmentValidator {
        &self.validator
    }

    /// Returns the state manager.
    #[must_use]
    pub const fn manager(&self) -> &WorkflowStateManager {
        &self.manager
    }

    /// Returns the command surface.
    #[must_use]
    pub const fn commands(&self) -> &WorkflowCommands {
        &self.commands
    }
}
