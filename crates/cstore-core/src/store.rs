use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Instant;

use cstore_engine::{
    DatabaseId, EngineProvider, EngineResult, Entry, KeyFilter, StorageEngine,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::completion::{self, Completer, Completion, ContentEntry, KeysResult, LoadResult};
use crate::config::StoreConfig;
use crate::metrics::{names, MetricsSink, TracingMetrics};
use crate::mutation::ContentMutation;
use crate::operation::ContentOperation;
use crate::record::ContentRecord;

/// Initialization progress of a content store.
///
/// Moves forward exactly once, from `Uninitialized` to `Ready` or `Failed`.
/// `Failed` is permanent for the store instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Ready,
    Failed,
}

/// State shared between the store and the tasks it spawns.
///
/// Tasks hold only a `Weak` to this; once the store is dropped they stop
/// acting on completion.
struct StoreShared {
    init: watch::Sender<InitState>,
    draining: Cell<bool>,
    metrics: Rc<dyn MetricsSink>,
}

impl StoreShared {
    fn on_initialized(&self, result: EngineResult<()>) {
        let state = match result {
            Ok(()) => {
                info!("content database initialized");
                InitState::Ready
            }
            Err(e) => {
                error!(error = %e, "content database failed to initialize");
                InitState::Failed
            }
        };
        self.init.send_if_modified(|current| {
            debug_assert_eq!(*current, InitState::Uninitialized);
            if *current != InitState::Uninitialized {
                return false;
            }
            *current = state;
            true
        });
    }
}

/// Persistent asynchronous key/value store for cached content.
///
/// The store owns its [`StorageEngine`] and starts initializing it on
/// construction. Calls made before initialization settles are held until it
/// does, then served, or failed if the engine could not be opened. Writes
/// are submitted as [`ContentMutation`]s whose operations are applied one at a time, in
/// order, stopping at the first failure. Nothing already applied is rolled
/// back.
///
/// # Sequence affinity
///
/// A store lives on one thread: it is `!Send`, must be created inside a
/// [`tokio::task::LocalSet`], and runs all of its engine work as local
/// tasks on that set. Every call returns a [`Completion`] right away; the
/// engine work is scheduled whether or not the completion is awaited.
///
/// Only one mutation may be committed at a time. Await the previous
/// commit's completion before starting the next.
pub struct ContentStore {
    shared: Rc<StoreShared>,
    engine: Rc<dyn StorageEngine>,
}

impl ContentStore {
    /// Take ownership of an uninitialized engine and start initializing it.
    ///
    /// # Panics
    ///
    /// Panics if called outside a `LocalSet`.
    pub fn new(engine: Box<dyn StorageEngine>, tuning: &StoreConfig) -> Self {
        Self::with_metrics(engine, tuning, Rc::new(TracingMetrics))
    }

    /// Like [`ContentStore::new`], reporting metrics to `metrics`.
    pub fn with_metrics(
        engine: Box<dyn StorageEngine>,
        tuning: &StoreConfig,
        metrics: Rc<dyn MetricsSink>,
    ) -> Self {
        let engine: Rc<dyn StorageEngine> = Rc::from(engine);
        let (init, _) = watch::channel(InitState::Uninitialized);
        let shared = Rc::new(StoreShared {
            init,
            draining: Cell::new(false),
            metrics,
        });

        let options = tuning.engine_options();
        debug!(
            write_buffer_size = options.write_buffer_size,
            "initializing content database"
        );
        let weak = Rc::downgrade(&shared);
        let init_engine = Rc::clone(&engine);
        tokio::task::spawn_local(async move {
            let result = init_engine.init(options).await;
            if let Some(shared) = weak.upgrade() {
                shared.on_initialized(result);
            }
        });

        Self { shared, engine }
    }

    /// Resolve the content engine from `provider` under `tuning.data_dir`.
    pub fn with_provider(provider: &dyn EngineProvider, tuning: &StoreConfig) -> Self {
        let engine = provider.engine(DatabaseId::FeedContent, &tuning.data_dir);
        Self::new(engine, tuning)
    }

    /// `true` once the engine reported successful initialization.
    pub fn is_ready(&self) -> bool {
        self.init_state() == InitState::Ready
    }

    pub fn init_state(&self) -> InitState {
        *self.shared.init.borrow()
    }

    /// Wait until initialization finishes and return the outcome.
    pub async fn wait_for_init(&self) -> InitState {
        settled_state(self.shared.init.subscribe()).await
    }

    /// Load the entries for `keys`. Keys that are not stored are omitted.
    pub fn load_content<I, S>(&self, keys: I) -> Completion<LoadResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.load_entries(KeyFilter::keys(keys), String::new())
    }

    /// Load every entry whose key starts with `prefix`.
    pub fn load_content_by_prefix(&self, prefix: impl Into<String>) -> Completion<LoadResult> {
        let prefix = prefix.into();
        self.load_entries(KeyFilter::Prefix(prefix.clone()), prefix)
    }

    /// Load every stored key.
    pub fn load_all_content_keys(&self) -> Completion<KeysResult> {
        let (completer, completion) = completion::channel();
        let engine = Rc::clone(&self.engine);
        let weak = Rc::downgrade(&self.shared);
        let init = self.shared.init.subscribe();
        let start = Instant::now();

        tokio::task::spawn_local(async move {
            if settled_state(init).await != InitState::Ready {
                debug!("content database unavailable; failing key load");
                completer.complete(KeysResult::default());
                return;
            }
            let result = engine.load_keys().await;
            let Some(shared) = weak.upgrade() else {
                return;
            };

            let result = match result {
                Ok(keys) => {
                    shared.metrics.record_count(names::COUNT, keys.len() as u64);
                    KeysResult {
                        success: true,
                        keys,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to load content keys");
                    KeysResult::default()
                }
            };
            shared
                .metrics
                .record_time(names::LOAD_KEYS_TIME, start.elapsed());
            completer.complete(result);
        });

        completion
    }

    /// Apply `mutation`'s operations in order.
    ///
    /// Resolves to `true` once every operation succeeded, or `false` at the
    /// first failed or unsupported operation; later operations are dropped
    /// and earlier ones stay applied. An empty mutation succeeds without
    /// touching the engine.
    ///
    /// # Panics
    ///
    /// Panics if another mutation is still being committed.
    pub fn commit_content_mutation(&self, mutation: ContentMutation) -> Completion<bool> {
        let (completer, completion) = completion::channel();
        self.shared
            .metrics
            .record_count(names::COMMIT_MUTATION_COUNT, mutation.len() as u64);

        if mutation.is_empty() {
            tokio::task::spawn_local(async move { completer.complete(true) });
            return completion;
        }

        assert!(
            !self.shared.draining.replace(true),
            "a content mutation is already being committed"
        );
        let store = Rc::downgrade(&self.shared);
        let drain = MutationDrain {
            remaining: mutation,
            completer,
            draining: DrainingGuard(store.clone()),
        };
        let init = self.shared.init.subscribe();
        tokio::task::spawn_local(drain.run(Rc::clone(&self.engine), store, init));
        completion
    }

    fn load_entries(&self, filter: KeyFilter, target_prefix: String) -> Completion<LoadResult> {
        let (completer, completion) = completion::channel();
        let engine = Rc::clone(&self.engine);
        let weak = Rc::downgrade(&self.shared);
        let init = self.shared.init.subscribe();
        let start = Instant::now();

        tokio::task::spawn_local(async move {
            if settled_state(init).await != InitState::Ready {
                debug!("content database unavailable; failing load");
                completer.complete(LoadResult::failed());
                return;
            }
            let result = engine
                .load_entries_with_filter(&filter, &target_prefix)
                .await;
            let Some(shared) = weak.upgrade() else {
                return;
            };

            let result = match result {
                Ok(entries) => decode_entries(&entries),
                Err(e) => {
                    warn!(error = %e, "failed to load content");
                    LoadResult::failed()
                }
            };
            shared.metrics.record_time(names::LOAD_TIME, start.elapsed());
            completer.complete(result);
        });

        completion
    }
}

impl fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStore")
            .field("init_state", &self.init_state())
            .field("draining", &self.shared.draining.get())
            .finish()
    }
}

/// Wait until initialization settles. A store dropped mid-init counts as
/// failed.
async fn settled_state(mut init: watch::Receiver<InitState>) -> InitState {
    let state = match init.wait_for(|state| *state != InitState::Uninitialized).await {
        Ok(state) => *state,
        Err(_) => InitState::Failed,
    };
    state
}

fn decode_entries(entries: &[Entry]) -> LoadResult {
    let mut decoded = Vec::with_capacity(entries.len());
    for entry in entries {
        match ContentRecord::from_entry(entry) {
            Ok(record) => decoded.push(ContentEntry {
                key: record.key,
                data: record.content_data,
            }),
            Err(e) => {
                warn!(key = %entry.key, error = %e, "undecodable content record");
                return LoadResult::failed();
            }
        }
    }
    LoadResult {
        success: true,
        entries: decoded,
    }
}

/// A single engine write derived from one operation.
enum WriteRequest {
    Update {
        upserts: Vec<Entry>,
        deletes: Vec<String>,
    },
    RemoveMatching(KeyFilter),
}

impl WriteRequest {
    /// Map an operation to its engine write. `None` for operations that
    /// cannot be applied.
    fn for_operation(operation: ContentOperation) -> Option<Self> {
        match operation {
            ContentOperation::Upsert { key, value } => {
                match ContentRecord::new(key, value).to_entry() {
                    Ok(entry) => Some(Self::Update {
                        upserts: vec![entry],
                        deletes: Vec::new(),
                    }),
                    Err(e) => {
                        warn!(error = %e, "cannot encode content record");
                        None
                    }
                }
            }
            ContentOperation::Delete { key } => Some(Self::Update {
                upserts: Vec::new(),
                deletes: vec![key],
            }),
            ContentOperation::DeleteByPrefix { prefix } => {
                Some(Self::RemoveMatching(KeyFilter::Prefix(prefix)))
            }
            ContentOperation::DeleteAll => Some(Self::RemoveMatching(KeyFilter::prefix(""))),
            ContentOperation::Unsupported => {
                warn!("unsupported content operation; failing mutation");
                None
            }
        }
    }

    async fn apply(self, engine: &dyn StorageEngine) -> EngineResult<()> {
        match self {
            Self::Update { upserts, deletes } => engine.update_entries(upserts, deletes).await,
            Self::RemoveMatching(filter) => {
                engine
                    .update_entries_with_remove_filter(Vec::new(), &filter)
                    .await
            }
        }
    }
}

/// What the drain does next.
enum Step {
    Issue(WriteRequest),
    Finish(bool),
}

/// Clears the store's draining flag when the drain ends, including by
/// panic.
struct DrainingGuard(Weak<StoreShared>);

impl Drop for DrainingGuard {
    fn drop(&mut self) {
        if let Some(shared) = self.0.upgrade() {
            shared.draining.set(false);
        }
    }
}

/// An in-flight mutation: the operations not yet applied plus the
/// completion to resolve when draining ends.
struct MutationDrain {
    remaining: ContentMutation,
    completer: Completer<bool>,
    draining: DrainingGuard,
}

impl MutationDrain {
    /// Advance after the previous write finished with `last` (`None` before
    /// the first write).
    fn step(&mut self, last: Option<bool>) -> Step {
        if last == Some(false) {
            if !self.remaining.is_empty() {
                debug!(
                    dropped = self.remaining.len(),
                    "halting mutation after failed operation"
                );
            }
            return Step::Finish(false);
        }
        let Some(operation) = self.remaining.take_first_operation() else {
            return Step::Finish(true);
        };
        debug!(%operation, remaining = self.remaining.len(), "applying content operation");
        match WriteRequest::for_operation(operation) {
            Some(request) => Step::Issue(request),
            None => Step::Finish(false),
        }
    }

    async fn run(
        mut self,
        engine: Rc<dyn StorageEngine>,
        store: Weak<StoreShared>,
        init: watch::Receiver<InitState>,
    ) {
        // Mutations committed before the engine is ready wait for it.
        if settled_state(init).await != InitState::Ready {
            debug!("content database unavailable; failing mutation");
            self.completer.complete(false);
            return;
        }
        let mut last = None;
        loop {
            match self.step(last) {
                Step::Issue(request) => {
                    let result = request.apply(engine.as_ref()).await;
                    if store.strong_count() == 0 {
                        return;
                    }
                    if let Err(e) = &result {
                        warn!(error = %e, "content operation failed");
                    }
                    last = Some(result.is_ok());
                }
                Step::Finish(success) => {
                    let Some(shared) = store.upgrade() else {
                        return;
                    };
                    if success {
                        shared
                            .metrics
                            .record_time(names::OPERATION_COMMIT_TIME, self.remaining.elapsed());
                    }
                    drop(self.draining);
                    self.completer.complete(success);
                    return;
                }
            }
        }
    }
}
