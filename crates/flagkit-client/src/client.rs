use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use flagkit_core::flag::context::EvaluationContext;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::{ClientConfig, DEFAULT_POLL_INTERVAL_SECS};
use crate::error::Result;
use crate::transport::{EvaluationTransport, HttpTransport};

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct ClientState {
    context: EvaluationContext,
    /// Bumped on every context change. A fetch started under an older
    /// generation never writes into the cache.
    generation: u64,
    cache: HashMap<String, bool>,
}

struct Shared<T> {
    transport: T,
    state: RwLock<ClientState>,
}

impl<T: EvaluationTransport> Shared<T> {
    fn snapshot(&self) -> (EvaluationContext, u64) {
        let state = self.state.read();
        (state.context.clone(), state.generation)
    }

    fn store(&self, generation: u64, entries: impl IntoIterator<Item = (String, bool)>) {
        let mut state = self.state.write();
        if state.generation != generation {
            debug!("context changed during fetch; discarding result");
            return;
        }
        state.cache.extend(entries);
    }

    async fn fetch_one(&self, name: &str) -> bool {
        let (context, generation) = self.snapshot();
        match self.transport.evaluate_one(name, &context).await {
            Ok(enabled) => {
                debug!(flag = name, enabled, "remote evaluation");
                self.store(generation, [(name.to_string(), enabled)]);
                enabled
            }
            Err(e) => {
                warn!(flag = name, error = %e, "remote evaluation failed, treating flag as off");
                false
            }
        }
    }

    async fn fetch_many(&self, names: &[String]) -> HashMap<String, bool> {
        let (context, generation) = self.snapshot();
        match self.transport.evaluate_many(names, &context).await {
            Ok(results) => {
                debug!(flags = names.len(), returned = results.len(), "remote batch evaluation");
                let answer: HashMap<String, bool> = names
                    .iter()
                    .map(|name| (name.clone(), results.get(name).copied().unwrap_or(false)))
                    .collect();
                self.store(generation, results);
                answer
            }
            Err(e) => {
                warn!(
                    flags = names.len(),
                    error = %e,
                    "remote batch evaluation failed, treating flags as off"
                );
                names.iter().map(|name| (name.clone(), false)).collect()
            }
        }
    }
}

/// Stops a poller started by [`FlagClient::start_polling`].
///
/// Stopping only prevents future ticks; a fetch already in flight completes.
#[derive(Debug, Clone)]
pub struct PollHandle {
    // None when polling never started
    task: Option<AbortHandle>,
}

impl PollHandle {
    pub fn stop(&self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.task.as_ref().map_or(true, AbortHandle::is_finished)
    }
}

/// Caching front for a remote flag evaluation endpoint.
///
/// Every failure is logged and reported as `false`; nothing here returns an
/// error to the caller.
pub struct FlagClient<T> {
    shared: Arc<Shared<T>>,
    poller: Mutex<Option<PollHandle>>,
    poll_interval: Duration,
}

impl FlagClient<HttpTransport> {
    /// HTTP client whose context starts with the configured environment.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        let context = EvaluationContext::new(config.environment.clone());
        Ok(Self::new(transport, context).with_poll_interval(config.poll_interval()))
    }
}

impl<T: EvaluationTransport + 'static> FlagClient<T> {
    pub fn new(transport: T, context: EvaluationContext) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                state: RwLock::new(ClientState {
                    context,
                    generation: 0,
                    cache: HashMap::new(),
                }),
            }),
            poller: Mutex::new(None),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    /// Intervals under one second are raised to one second.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    pub fn context(&self) -> EvaluationContext {
        self.shared.state.read().context.clone()
    }

    pub fn cached(&self, flag_name: &str) -> Option<bool> {
        self.shared.state.read().cache.get(flag_name).copied()
    }

    pub fn clear_cache(&self) {
        self.shared.state.write().cache.clear();
    }

    /// Cached value if present, otherwise a single remote evaluation.
    pub async fn is_enabled(&self, flag_name: &str) -> bool {
        if let Some(enabled) = self.cached(flag_name) {
            return enabled;
        }
        self.shared.fetch_one(flag_name).await
    }

    /// Batch evaluation. Every requested name is present in the result.
    pub async fn evaluate_flags<S: AsRef<str>>(&self, flag_names: &[S]) -> HashMap<String, bool> {
        let names: Vec<String> = flag_names.iter().map(|n| n.as_ref().to_string()).collect();
        self.shared.fetch_many(&names).await
    }

    /// Merge `partial` into the context and drop every cached result.
    pub fn set_context(&self, partial: Map<String, Value>) {
        let mut state = self.shared.state.write();
        state.context.merge(partial);
        state.cache.clear();
        state.generation = state.generation.wrapping_add(1);
    }

    /// Fetch `flag_names` now and then once per poll interval, replacing any
    /// poller already running.
    ///
    /// Outside a Tokio runtime nothing is spawned: a warning is logged and the
    /// returned handle is already stopped.
    pub fn start_polling<S: AsRef<str>>(&self, flag_names: &[S]) -> PollHandle {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "no Tokio runtime, polling not started");
                return PollHandle { task: None };
            }
        };
        let names: Arc<[String]> = flag_names.iter().map(|n| n.as_ref().to_string()).collect();
        let shared = Arc::clone(&self.shared);
        let period = self.poll_interval;

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                debug!(flags = names.len(), "poll tick");
                let shared = Arc::clone(&shared);
                let names = Arc::clone(&names);
                tokio::spawn(async move {
                    shared.fetch_many(&names).await;
                });
            }
        });

        let handle = PollHandle {
            task: Some(task.abort_handle()),
        };
        if let Some(previous) = self.poller.lock().replace(handle.clone()) {
            previous.stop();
        }
        handle
    }

    pub fn stop_polling(&self) {
        if let Some(handle) = self.poller.lock().take() {
            handle.stop();
        }
    }
}

impl<T> Drop for FlagClient<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.poller.get_mut().take() {
            handle.stop();
        }
    }
}
