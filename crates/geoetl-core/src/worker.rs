//! The import worker: one strategy, one run, one result.
//!
//! A worker moves through `Created -> Running -> Succeeded | Failed` exactly
//! once. Cancellation is a request observed by the strategy between records;
//! a cancelled run still succeeds or fails according to the module's exit
//! status.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use geoetl_core_common::StoreObject;
use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ImportConfig;
use crate::copy::ObjectCopy;
use crate::error::{ImportError, Result};
use crate::raster::RasterImport;
use crate::vector::VectorImport;

static NEXT_IMPORT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an import worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImportId(u64);

impl ImportId {
    fn next() -> Self {
        Self(NEXT_IMPORT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ImportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    /// Not run yet
    Created,
    /// `import()` in progress
    Running,
    /// Finished without error
    Succeeded,
    /// Finished with an error; see [`ImportWorker::error`]
    Failed,
}

/// Completion notice sent by [`ImportWorker::spawn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportFinished {
    /// Worker that finished
    pub id: ImportId,
    /// Result of `import()`
    pub success: bool,
}

/// What a worker does.
pub enum Strategy {
    /// Stream raster bands through `r.in.stream`
    Raster(RasterImport),
    /// Stream features through `v.in.stream`
    Vector(VectorImport),
    /// Copy a map inside the store
    Copy(ObjectCopy),
}

impl Strategy {
    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Strategy::Raster(_) => "raster",
            Strategy::Vector(_) => "vector",
            Strategy::Copy(_) => "copy",
        }
    }
}

impl From<RasterImport> for Strategy {
    fn from(import: RasterImport) -> Self {
        Strategy::Raster(import)
    }
}

impl From<VectorImport> for Strategy {
    fn from(import: VectorImport) -> Self {
        Strategy::Vector(import)
    }
}

impl From<ObjectCopy> for Strategy {
    fn from(copy: ObjectCopy) -> Self {
        Strategy::Copy(copy)
    }
}

/// Runs one import strategy and keeps its outcome.
pub struct ImportWorker {
    id: ImportId,
    strategy: Strategy,
    config: ImportConfig,
    cancel: CancellationToken,
    state: ImportState,
    error: Option<String>,
    suggestion: Option<String>,
}

impl ImportWorker {
    /// Creates a worker for `strategy`.
    #[must_use]
    pub fn new(strategy: impl Into<Strategy>, config: ImportConfig) -> Self {
        Self {
            id: ImportId::next(),
            strategy: strategy.into(),
            config,
            cancel: CancellationToken::new(),
            state: ImportState::Created,
            error: None,
            suggestion: None,
        }
    }

    /// Shares `token` with other workers or a signal handler instead of a
    /// private token.
    #[must_use]
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn id(&self) -> ImportId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> ImportState {
        self.state
    }

    #[must_use]
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    #[must_use]
    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Target descriptor.
    #[must_use]
    pub fn object(&self) -> &StoreObject {
        match &self.strategy {
            Strategy::Raster(import) => import.object(),
            Strategy::Vector(import) => import.object(),
            Strategy::Copy(copy) => copy.object(),
        }
    }

    /// Names of the store maps the import creates. Valid before and after a
    /// run, so callers can check for collisions or clean up partial results.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        match &self.strategy {
            Strategy::Raster(import) => import.names(),
            Strategy::Vector(import) => import.names(),
            Strategy::Copy(copy) => copy.names(),
        }
    }

    /// Human readable description of the data source.
    #[must_use]
    pub fn src_description(&self) -> String {
        match &self.strategy {
            Strategy::Raster(import) => import.src_description(),
            Strategy::Vector(import) => import.src_description(),
            Strategy::Copy(copy) => copy.src_description(),
        }
    }

    /// Requests cancellation. The request sticks; the strategy acts on it at
    /// the next record boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A handle other tasks can use to cancel this worker.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Records a failure message, replacing any previous one.
    pub fn set_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        debug!("Import {} error: {error}", self.id);
        self.error = Some(error);
    }

    /// Most recent failure message.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Hint for fixing the most recent failure, when one is known.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    /// Runs the strategy. Returns `true` on success; on failure the message is
    /// available from [`ImportWorker::error`].
    ///
    /// A worker runs at most once; later calls fail without doing anything.
    pub async fn import(&mut self) -> bool {
        if self.state != ImportState::Created {
            self.set_error(ImportError::AlreadyRun.to_string());
            self.suggestion = ImportError::AlreadyRun.recovery_suggestion();
            return false;
        }
        self.state = ImportState::Running;
        info!(
            "Import {} ({}) started: {} -> {}",
            self.id,
            self.strategy.kind(),
            self.src_description(),
            self.object()
        );

        match self.run().await {
            Ok(()) => {
                self.state = ImportState::Succeeded;
                info!("Import {} finished", self.id);
                true
            },
            Err(e) => {
                self.state = ImportState::Failed;
                let message = e.to_string();
                warn!("Import {} failed: {message}", self.id);
                self.suggestion = e.recovery_suggestion();
                if message.is_empty() {
                    self.set_error("Import failed");
                } else {
                    self.set_error(message);
                }
                false
            },
        }
    }

    async fn run(&mut self) -> Result<()> {
        match &mut self.strategy {
            Strategy::Raster(import) => import.run(&self.config, &self.cancel).await,
            Strategy::Vector(import) => import.run(&self.config, &self.cancel).await,
            Strategy::Copy(copy) => copy.run().await,
        }
    }

    /// Runs the import on the tokio runtime and sends an [`ImportFinished`]
    /// notice to `notifier` when it completes.
    ///
    /// The worker moves into the task and comes back from
    /// [`ImportTask::join`], so it cannot be dropped mid-run.
    #[must_use]
    pub fn spawn(self, notifier: UnboundedSender<ImportFinished>) -> ImportTask {
        let id = self.id;
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let mut worker = self;
            let success = worker.import().await;
            if notifier.send(ImportFinished { id, success }).is_err() {
                debug!("Import {id} finished with nobody listening");
            }
            worker
        });
        ImportTask { id, cancel, handle }
    }
}

impl fmt::Debug for ImportWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportWorker")
            .field("id", &self.id)
            .field("strategy", &self.strategy.kind())
            .field("state", &self.state)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Handle to a worker running in the background.
#[derive(Debug)]
pub struct ImportTask {
    id: ImportId,
    cancel: CancellationToken,
    handle: JoinHandle<ImportWorker>,
}

impl ImportTask {
    #[must_use]
    pub fn id(&self) -> ImportId {
        self.id
    }

    /// Requests cancellation of the running import.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the run to complete and returns the worker.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Join`] if the task panicked.
    pub async fn join(self) -> Result<ImportWorker> {
        self.handle
            .await
            .map_err(|e| ImportError::Join(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoetl_core_common::{ObjectKind, StoreCopier};
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    struct CountingCopier {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl StoreCopier for CountingCopier {
        fn copy_object(&self, _source: &StoreObject, _destination: &StoreObject) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("disk full");
            }
            Ok(())
        }
    }

    fn copy_worker(fail: bool) -> (ImportWorker, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = StoreObject::new("/db", "loc", "PERMANENT", "dem", ObjectKind::Raster);
        let copy = ObjectCopy::new(source.clone(), source.with_name("dem_copy")).with_copier(
            Box::new(CountingCopier {
                calls: Arc::clone(&calls),
                fail,
            }),
        );
        (ImportWorker::new(copy, ImportConfig::default()), calls)
    }

    #[tokio::test]
    async fn test_copy_success() {
        let (mut worker, calls) = copy_worker(false);
        assert_eq!(worker.state(), ImportState::Created);
        assert_eq!(worker.names(), vec!["dem_copy"]);
        assert!(worker.import().await);
        assert_eq!(worker.state(), ImportState::Succeeded);
        assert_eq!(worker.error(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_copy_failure_sets_error() {
        let (mut worker, _) = copy_worker(true);
        assert!(!worker.import().await);
        assert_eq!(worker.state(), ImportState::Failed);
        assert_eq!(worker.error(), Some("disk full"));
    }

    #[tokio::test]
    async fn test_import_runs_once() {
        let (mut worker, calls) = copy_worker(false);
        assert!(worker.import().await);
        assert!(!worker.import().await);
        assert_eq!(worker.error(), Some("Import has already been run"));
        assert_eq!(
            worker.recovery_suggestion(),
            Some("Create a new import for every run.")
        );
        assert_eq!(worker.state(), ImportState::Succeeded);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_spawn_notifies_and_returns_worker() {
        let (worker, _) = copy_worker(false);
        let id = worker.id();
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let task = worker.spawn(sender);
        assert_eq!(task.id(), id);
        let finished = receiver.recv().await.unwrap();
        assert_eq!(finished, ImportFinished { id, success: true });
        let worker = task.join().await.unwrap();
        assert_eq!(worker.state(), ImportState::Succeeded);
    }

    #[test]
    fn test_ids_are_unique() {
        let (a, _) = copy_worker(false);
        let (b, _) = copy_worker(false);
        assert_ne!(a.id(), b.id());
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_cancel_is_sticky() {
        let (worker, _) = copy_worker(false);
        let token = worker.cancellation_token();
        assert!(!worker.is_canceled());
        token.cancel();
        assert!(worker.is_canceled());
        worker.cancel();
        assert!(worker.is_canceled());
    }

    #[test]
    fn test_set_error_replaces_message() {
        let (mut worker, _) = copy_worker(false);
        worker.set_error("first");
        worker.set_error("second");
        assert_eq!(worker.error(), Some("second"));
    }
}
