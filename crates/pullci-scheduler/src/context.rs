//! Shared state threaded through a cron cycle.

use pullci_archive::{ArchiveStore, ServerDbStore};
use pullci_config::VariableContext;
use pullci_core::RepositoryRegistry;
use pullci_core::notify::Notifier;
use pullci_core::runner::TestRunner;
use pullci_core::source::SourceControl;
use std::sync::Arc;

/// Everything the scheduler and processor need, built once at start-up.
pub struct CiContext {
    pub archive: ArchiveStore,
    pub db: ServerDbStore,
    pub registry: RepositoryRegistry,
    pub source: Arc<dyn SourceControl>,
    pub runner: Arc<dyn TestRunner>,
    pub notifier: Arc<dyn Notifier>,
    /// Base variables for test commands; scoped per pull request before use.
    pub vars: VariableContext,
}

impl CiContext {
    pub fn new(
        archive: ArchiveStore,
        db: ServerDbStore,
        registry: RepositoryRegistry,
        source: Arc<dyn SourceControl>,
        runner: Arc<dyn TestRunner>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            archive,
            db,
            registry,
            source,
            runner,
            notifier,
            vars: VariableContext::new(),
        }
    }

    pub fn with_vars(mut self, vars: VariableContext) -> Self {
        self.vars = vars;
        self
    }
}
