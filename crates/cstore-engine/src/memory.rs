use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::{EngineError, EngineResult};
use crate::filter::{Entry, KeyFilter};
use crate::options::EngineOptions;
use crate::traits::StorageEngine;

/// Holds a gated [`MemoryEngine`]'s `init` until [`InitGate::open`] is called.
#[derive(Clone, Debug)]
pub struct InitGate {
    notify: Arc<Notify>,
}

impl InitGate {
    /// Let the pending (or next) `init` call proceed.
    pub fn open(&self) {
        self.notify.notify_one();
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_init: bool,
    fail_reads: bool,
    fail_update_calls: HashSet<usize>,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<String, Vec<u8>>,
    options: Option<EngineOptions>,
    faults: Faults,
    update_calls: usize,
    read_calls: usize,
}

/// In-memory, `BTreeMap`-backed storage engine.
///
/// Intended for tests and embedding. Clones share the same underlying map,
/// so a test can keep a handle for inspection and fault injection after
/// handing the engine to a content store. Every call yields to the
/// scheduler before touching the map, so results are never produced
/// synchronously.
#[derive(Clone, Debug, Default)]
pub struct MemoryEngine {
    state: Arc<Mutex<MemoryState>>,
    gate: Option<Arc<Notify>>,
}

impl MemoryEngine {
    /// Create a new empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine whose `init` waits until the returned gate is opened.
    pub fn gated() -> (Self, InitGate) {
        let notify = Arc::new(Notify::new());
        let engine = Self {
            state: Arc::default(),
            gate: Some(Arc::clone(&notify)),
        };
        (engine, InitGate { notify })
    }

    /// Pre-populate the engine. Entries are visible once `init` succeeds.
    pub fn with_entries<I>(self, entries: I) -> Self
    where
        I: IntoIterator<Item = Entry>,
    {
        {
            let mut state = self.lock();
            for entry in entries {
                state.entries.insert(entry.key, entry.value);
            }
        }
        self
    }

    /// Make the next `init` fail.
    pub fn fail_init(&self) {
        self.lock().faults.fail_init = true;
    }

    /// Make every read fail (or succeed again when `fail` is `false`).
    pub fn fail_reads(&self, fail: bool) {
        self.lock().faults.fail_reads = fail;
    }

    /// Make the update call with the given zero-based index fail.
    ///
    /// Indices count every `update_entries*` call this engine has seen,
    /// successful or not.
    pub fn fail_update_call(&self, index: usize) {
        self.lock().faults.fail_update_calls.insert(index);
    }

    /// Number of `update_entries*` calls received so far.
    pub fn update_calls(&self) -> usize {
        self.lock().update_calls
    }

    /// Number of load calls received so far.
    pub fn read_calls(&self) -> usize {
        self.lock().read_calls
    }

    /// Sorted snapshot of the stored keys.
    pub fn keys(&self) -> Vec<String> {
        self.lock().entries.keys().cloned().collect()
    }

    /// Value currently stored under `key`.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().entries.get(key).cloned()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns `true` if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Options passed to a successful `init`, if any.
    pub fn options(&self) -> Option<EngineOptions> {
        self.lock().options.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory engine lock poisoned")
    }

    fn initialized(&self) -> EngineResult<MutexGuard<'_, MemoryState>> {
        let state = self.lock();
        if state.options.is_none() {
            return Err(EngineError::NotInitialized);
        }
        Ok(state)
    }

    fn begin_read(&self) -> EngineResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.initialized()?;
        state.read_calls += 1;
        if state.faults.fail_reads {
            return Err(EngineError::Injected("read"));
        }
        Ok(state)
    }

    fn begin_update(&self) -> EngineResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.initialized()?;
        let call = state.update_calls;
        state.update_calls += 1;
        if state.faults.fail_update_calls.contains(&call) {
            return Err(EngineError::Injected("update"));
        }
        Ok(state)
    }
}

#[async_trait(?Send)]
impl StorageEngine for MemoryEngine {
    async fn init(&self, options: EngineOptions) -> EngineResult<()> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        tokio::task::yield_now().await;

        let mut state = self.lock();
        if state.options.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }
        if state.faults.fail_init {
            return Err(EngineError::Injected("init"));
        }
        state.options = Some(options);
        Ok(())
    }

    async fn load_entries_with_filter(
        &self,
        filter: &KeyFilter,
        target_prefix: &str,
    ) -> EngineResult<Vec<Entry>> {
        tokio::task::yield_now().await;

        let state = self.begin_read()?;
        Ok(state
            .entries
            .range(target_prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(target_prefix))
            .filter(|(key, _)| filter.matches(key))
            .map(|(key, value)| Entry::new(key.clone(), value.clone()))
            .collect())
    }

    async fn load_keys(&self) -> EngineResult<Vec<String>> {
        tokio::task::yield_now().await;

        let state = self.begin_read()?;
        Ok(state.entries.keys().cloned().collect())
    }

    async fn update_entries(&self, upserts: Vec<Entry>, deletes: Vec<String>) -> EngineResult<()> {
        tokio::task::yield_now().await;

        let mut state = self.begin_update()?;
        for key in deletes {
            state.entries.remove(&key);
        }
        for entry in upserts {
            state.entries.insert(entry.key, entry.value);
        }
        Ok(())
    }

    async fn update_entries_with_remove_filter(
        &self,
        upserts: Vec<Entry>,
        remove_filter: &KeyFilter,
    ) -> EngineResult<()> {
        tokio::task::yield_now().await;

        let mut state = self.begin_update()?;
        state.entries.retain(|key, _| !remove_filter.matches(key));
        for entry in upserts {
            state.entries.insert(entry.key, entry.value);
        }
        Ok(())
    }
}
