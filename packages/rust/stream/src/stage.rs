//! Backed stages: a value slot fed by at most one asynchronous source at a time.
//!
//! Backing a stage with a new source supersedes whatever source was in flight.
//! Each backing gets a fresh generation number and [`CancellationToken`]; a
//! result is applied only if its generation is still current when it arrives,
//! so the last bind always wins no matter which source resolves first. The
//! superseded source itself is not aborted; its token is cancelled so it can
//! stop issuing new work, and its result is dropped on arrival.
//!
//! Superseding a stage also supersedes every stage that [`follow`]s it, so a
//! derived source started from the old upstream value is discarded too.
//!
//! [`follow`]: BackedStage::follow

use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use courseware_shared::SharedError;

/// Result delivered by a stage source.
pub type StageResult<T> = std::result::Result<T, SharedError>;

type SuccessFn<T> = Box<dyn Fn(&T) + Send + Sync>;
type FailureFn = Box<dyn Fn(&SharedError) + Send + Sync>;
type FinallyFn = Box<dyn Fn() + Send + Sync>;
type InvalidateFn = Arc<dyn Fn() + Send + Sync>;

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Callbacks invoked when the current source of a stage resolves.
///
/// `finally` runs after `success` or `failure`, for every outcome.
pub struct Listener<T> {
    success: Option<SuccessFn<T>>,
    failure: Option<FailureFn>,
    finally: Option<FinallyFn>,
}

impl<T> Listener<T> {
    pub fn new() -> Self {
        Self {
            success: None,
            failure: None,
            finally: None,
        }
    }

    pub fn on_success(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.success = Some(Box::new(f));
        self
    }

    pub fn on_failure(mut self, f: impl Fn(&SharedError) + Send + Sync + 'static) -> Self {
        self.failure = Some(Box::new(f));
        self
    }

    pub fn on_finally(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.finally = Some(Box::new(f));
        self
    }

    fn notify(&self, result: &StageResult<T>) {
        match result {
            Ok(value) => {
                if let Some(success) = &self.success {
                    success(value);
                }
            }
            Err(error) => {
                if let Some(failure) = &self.failure {
                    failure(error);
                }
            }
        }
        if let Some(finally) = &self.finally {
            finally();
        }
    }
}

impl<T> Default for Listener<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Keeps a listener registered; dropping it unregisters the listener.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    unregister: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Unregister now instead of at drop.
    pub fn cancel(mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("registered", &self.unregister.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// BackedStage
// ---------------------------------------------------------------------------

struct StageState<T> {
    value: Option<T>,
    generation: u64,
    active: bool,
    closed: bool,
    token: CancellationToken,
    listeners: Vec<(u64, Arc<Listener<T>>)>,
    dependents: Vec<(u64, InvalidateFn)>,
    next_listener_id: u64,
}

/// A value slot backed by the most recently bound asynchronous source.
pub struct BackedStage<T> {
    name: &'static str,
    state: Arc<Mutex<StageState<T>>>,
}

impl<T> Clone for BackedStage<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> std::fmt::Debug for BackedStage<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BackedStage")
            .field("name", &self.name)
            .field("generation", &state.generation)
            .field("active", &state.active)
            .field("has_value", &state.value.is_some())
            .finish()
    }
}

impl<T> BackedStage<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty, idle stage. `name` appears in trace output.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(StageState {
                value: None,
                generation: 0,
                active: false,
                closed: false,
                token: CancellationToken::new(),
                listeners: Vec::new(),
                dependents: Vec::new(),
                next_listener_id: 0,
            })),
        }
    }

    /// Most recent successfully delivered value.
    pub fn value(&self) -> Option<T> {
        self.state.lock().value.clone()
    }

    /// Whether the current source has yet to resolve.
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Number of times the stage has been backed.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Back the stage with a new asynchronous source, superseding any source in flight.
    ///
    /// `make_source` receives the cancellation token of the new generation. The
    /// source runs on the Tokio runtime; the returned handle resolves once its
    /// result has been applied or discarded.
    pub fn back_with<F, Fut>(&self, make_source: F) -> JoinHandle<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = StageResult<T>> + Send + 'static,
    {
        let (generation, token) = self.supersede();
        let source = make_source(token);
        let stage = self.clone();

        tokio::spawn(async move {
            let result = source.await;
            stage.complete(generation, result);
        })
    }

    /// Back the stage with an already-known value; listeners run before this returns.
    pub fn back_with_value(&self, value: T) {
        self.back_with_result(Ok(value));
    }

    /// Back the stage with an already-known result; listeners run before this returns.
    pub fn back_with_result(&self, result: StageResult<T>) {
        let (generation, _token) = self.supersede();
        self.complete(generation, result);
    }

    /// Register a listener for every result delivered from now on.
    pub fn listen(&self, listener: Listener<T>) -> Subscription {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_listener_id;
            state.next_listener_id += 1;
            state.listeners.push((id, Arc::new(listener)));
            id
        };

        let weak: Weak<Mutex<StageState<T>>> = Arc::downgrade(&self.state);
        Subscription {
            unregister: Some(Box::new(move || {
                if let Some(state) = weak.upgrade() {
                    state.lock().listeners.retain(|(listener_id, _)| *listener_id != id);
                }
            })),
        }
    }

    /// Back this stage with `transform(value)` every time `upstream` delivers a
    /// value; upstream failures are forwarded as failures of this stage.
    ///
    /// Re-backing `upstream` supersedes this stage at once, which stays active
    /// until the new upstream source resolves.
    pub fn follow<U, F, Fut>(&self, upstream: &BackedStage<U>, transform: F) -> Subscription
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(U, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StageResult<T>> + Send + 'static,
    {
        let on_value = self.clone();
        let on_error = self.clone();
        let on_rebind = self.clone();

        let listener = upstream.listen(
            Listener::new()
                .on_success(move |value: &U| {
                    on_value.back_with(|token| transform(value.clone(), token));
                })
                .on_failure(move |error| {
                    on_error.back_with_result(Err(Arc::clone(error)));
                }),
        );
        let dependent = upstream.add_dependent(Arc::new(move || {
            on_rebind.supersede();
        }));

        Subscription {
            unregister: Some(Box::new(move || {
                drop(listener);
                drop(dependent);
            })),
        }
    }

    fn add_dependent(&self, invalidate: InvalidateFn) -> Subscription {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_listener_id;
            state.next_listener_id += 1;
            state.dependents.push((id, invalidate));
            id
        };

        let weak: Weak<Mutex<StageState<T>>> = Arc::downgrade(&self.state);
        Subscription {
            unregister: Some(Box::new(move || {
                if let Some(state) = weak.upgrade() {
                    state.lock().dependents.retain(|(dependent_id, _)| *dependent_id != id);
                }
            })),
        }
    }

    /// Stop delivering results: cancels the in-flight source and drops every listener.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.active = false;
        state.token.cancel();
        state.listeners.clear();
        state.dependents.clear();
        debug!(stage = self.name, generation = state.generation, "stage shut down");
    }

    fn supersede(&self) -> (u64, CancellationToken) {
        let (generation, token, dependents) = {
            let mut state = self.state.lock();
            state.token.cancel();
            state.token = CancellationToken::new();
            state.generation += 1;
            state.active = !state.closed;
            trace!(stage = self.name, generation = state.generation, "stage re-backed");
            let dependents: Vec<InvalidateFn> =
                state.dependents.iter().map(|(_, d)| Arc::clone(d)).collect();
            (state.generation, state.token.clone(), dependents)
        };

        for invalidate in dependents {
            invalidate();
        }
        (generation, token)
    }

    fn is_current(&self, generation: u64) -> bool {
        let state = self.state.lock();
        !state.closed && state.generation == generation
    }

    fn complete(&self, generation: u64, result: StageResult<T>) {
        let listeners: Vec<Arc<Listener<T>>> = {
            let mut state = self.state.lock();
            if state.closed || state.generation != generation {
                debug!(
                    stage = self.name,
                    generation,
                    current = state.generation,
                    "discarding superseded result"
                );
                return;
            }
            state.active = false;
            if let Ok(value) = &result {
                state.value = Some(value.clone());
            }
            state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };

        match &result {
            Ok(_) => trace!(stage = self.name, generation, "stage resolved"),
            Err(error) => debug!(stage = self.name, generation, %error, "stage failed"),
        }

        for listener in listeners {
            // A listener may re-back this stage; later listeners must not see the stale result.
            if !self.is_current(generation) {
                break;
            }
            listener.notify(&result);
        }
    }
}
