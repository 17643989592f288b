//! Backend connection lifecycle management.
//!
//! # Responsibilities
//! - Own the single connection's state machine
//! - Build the client, probe it, retry transient failures with bounded backoff
//! - Coalesce concurrent initializers onto one in-flight attempt
//!
//! # State Transitions
//! ```text
//! Uninitialized → Initializing: initialize()
//! Initializing  → Ready:        probe ok (auth-layer rejection tolerated)
//! Initializing  → Retrying:     retryable failure, attempts remaining
//! Retrying      → Initializing: backoff timer fired
//! Initializing  → Error:        non-retryable failure or retries exhausted
//! any           → Initializing: reinitialize() (pending timer cancelled first)
//! ```
//!
//! # Design Decisions
//! - Coalescing: the in-flight attempt publishes through a watch channel;
//!   new callers await the channel instead of starting work, so at most one
//!   build+probe runs at a time
//! - An epoch counter invalidates attempts superseded by reinitialize();
//!   a stale retry timer can observe state but never mutate it
//! - Error is terminal: initialize() replays the stored failure until an
//!   explicit reinitialize()
//! - Diagnostics snapshots persist best-effort after every transition

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::config::resolver::ConfigurationResolver;
use crate::config::schema::ConnectionTuning;
use crate::connection::classifier::ErrorClassifier;
use crate::connection::client::{BackendClient, ProbeOutcome};
use crate::connection::error::{ConnectionError, NotReady};
use crate::connection::state::{ConnectionSnapshot, ConnectionState};
use crate::resilience::{calculate_backoff, schedule, ScheduledTask};
use crate::storage::{KvStore, CONNECTION_DIAGNOSTICS_KEY};

/// Terminal result of an initialization attempt.
pub type InitResult = Result<BackendClient, ConnectionError>;

type OutcomeSender = watch::Sender<Option<InitResult>>;
type OutcomeReceiver = watch::Receiver<Option<InitResult>>;

struct ManagerState {
    snapshot: ConnectionSnapshot,
    client: Option<BackendClient>,
    /// Receiver half of the in-flight attempt's outcome channel. Present
    /// while Initializing or Retrying; new callers attach to it.
    inflight: Option<OutcomeReceiver>,
    retry_task: Option<ScheduledTask>,
    /// Bumped by reinitialize(); attempts carrying an older epoch may not
    /// mutate state.
    epoch: u64,
}

struct ManagerInner {
    resolver: ConfigurationResolver,
    tuning: ConnectionTuning,
    classifier: ErrorClassifier,
    store: Arc<dyn KvStore>,
    state: Mutex<ManagerState>,
}

/// Manages the lifecycle of the single outbound backend connection.
///
/// Cheap to clone; clones share the same state machine.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

enum AttemptOutcome {
    Success(BackendClient),
    Failure(ConnectionError),
}

impl ConnectionManager {
    pub fn new(
        resolver: ConfigurationResolver,
        tuning: ConnectionTuning,
        store: Arc<dyn KvStore>,
    ) -> Self {
        Self::with_classifier(resolver, tuning, store, ErrorClassifier::new())
    }

    /// Construct with a retuned classification table.
    pub fn with_classifier(
        resolver: ConfigurationResolver,
        tuning: ConnectionTuning,
        store: Arc<dyn KvStore>,
        classifier: ErrorClassifier,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                resolver,
                tuning,
                classifier,
                store,
                state: Mutex::new(ManagerState {
                    snapshot: ConnectionSnapshot::default(),
                    client: None,
                    inflight: None,
                    retry_task: None,
                    epoch: 0,
                }),
            }),
        }
    }

    /// Establish the connection, or attach to the attempt already in flight.
    ///
    /// Idempotent when Ready. While an attempt runs, every caller observes
    /// that attempt's terminal result; no duplicate probe is issued. In
    /// Error state the stored failure is replayed until `reinitialize`.
    pub async fn initialize(&self) -> InitResult {
        enum Action {
            Done(InitResult),
            Attach(OutcomeReceiver),
        }

        let action = {
            let mut st = self.lock_state();
            match st.snapshot.state {
                ConnectionState::Ready => match st.client.clone() {
                    Some(client) => Action::Done(Ok(client)),
                    None => Action::Attach(self.start_attempt(&mut st)),
                },
                ConnectionState::Error => Action::Done(Err(st
                    .snapshot
                    .last_error
                    .clone()
                    .unwrap_or_else(|| {
                        ConnectionError::unknown("connection is in Error state")
                    }))),
                ConnectionState::Initializing | ConnectionState::Retrying => {
                    match st.inflight.clone() {
                        Some(rx) => Action::Attach(rx),
                        None => Action::Attach(self.start_attempt(&mut st)),
                    }
                }
                ConnectionState::Uninitialized => Action::Attach(self.start_attempt(&mut st)),
            }
        };

        match action {
            Action::Done(result) => result,
            Action::Attach(rx) => wait_outcome(rx).await,
        }
    }

    /// The ready client. Fails loudly when the connection is not Ready;
    /// callers are expected to check `is_ready` or go through `initialize`.
    pub fn client(&self) -> Result<BackendClient, NotReady> {
        let st = self.lock_state();
        match (st.snapshot.state, st.client.clone()) {
            (ConnectionState::Ready, Some(client)) => Ok(client),
            (state, _) => Err(NotReady { state }),
        }
    }

    /// Boolean readiness snapshot.
    pub fn is_ready(&self) -> bool {
        self.lock_state().snapshot.is_ready()
    }

    /// Snapshot of the connection state machine.
    pub fn status(&self) -> ConnectionSnapshot {
        self.lock_state().snapshot.clone()
    }

    /// Cancel any pending scheduled retry, reset the retry budget, clear
    /// the last error, and start a fresh attempt.
    pub async fn reinitialize(&self) -> InitResult {
        {
            let mut st = self.lock_state();
            st.epoch += 1;
            if let Some(task) = st.retry_task.take() {
                task.cancel();
            }
            st.snapshot.state = ConnectionState::Uninitialized;
            st.snapshot.retry_count = 0;
            st.snapshot.next_retry = None;
            st.snapshot.last_error = None;
            st.client = None;
            st.inflight = None;
            tracing::info!("reinitializing backend connection");
        }
        self.initialize().await
    }

    fn lock_state(&self) -> MutexGuard<'_, ManagerState> {
        self.inner.state.lock().expect("connection state poisoned")
    }

    /// Begin a fresh attempt under the caller's lock: create the outcome
    /// channel, mark Initializing, and spawn the attempt task.
    fn start_attempt(&self, st: &mut ManagerState) -> OutcomeReceiver {
        let (tx, rx) = watch::channel(None);
        st.snapshot.state = ConnectionState::Initializing;
        st.snapshot.last_attempt = Some(Utc::now());
        st.snapshot.next_retry = None;
        st.inflight = Some(rx.clone());
        let manager = self.clone();
        let epoch = st.epoch;
        tokio::spawn(async move {
            manager.run_attempt(tx, epoch).await;
        });
        rx
    }

    /// One build+probe attempt, followed by state finalization.
    async fn run_attempt(self, tx: OutcomeSender, epoch: u64) {
        {
            let mut st = self.lock_state();
            if st.epoch != epoch {
                // Superseded before it began; report to any stragglers.
                let _ = tx.send(Some(Err(ConnectionError::unknown(
                    "initialization attempt superseded by reinitialize",
                ))));
                return;
            }
            st.snapshot.state = ConnectionState::Initializing;
            st.snapshot.last_attempt = Some(Utc::now());
            let _ = tx.send(None);
        }

        let outcome = self.attempt_once().await;
        self.finalize_attempt(tx, epoch, outcome);
    }

    /// Resolve settings, build the client, run the probe. No state mutation.
    async fn attempt_once(&self) -> AttemptOutcome {
        // Resolution failures arrive pre-categorized and non-retryable.
        let settings = match self.inner.resolver.resolve() {
            Ok(settings) => settings,
            Err(e) => return AttemptOutcome::Failure(e),
        };

        let probe_timeout = Duration::from_secs(self.inner.tuning.probe_timeout_secs);
        let client = match BackendClient::build(&settings, &self.inner.tuning.probe_path, probe_timeout)
        {
            Ok(client) => client,
            Err(e) => {
                return AttemptOutcome::Failure(self.inner.classifier.classify(&e.to_string()))
            }
        };

        match client.probe().await {
            Ok(ProbeOutcome::Reachable) => AttemptOutcome::Success(client),
            Ok(ProbeOutcome::AuthRejected(msg)) => {
                // The transport and endpoint answered; only the probe's own
                // authorization layer balked. Non-fatal to initialization.
                tracing::warn!(detail = %msg, "probe auth rejected; tolerating");
                AttemptOutcome::Success(client)
            }
            Err(failure) => {
                AttemptOutcome::Failure(self.inner.classifier.classify(&failure.message))
            }
        }
    }

    /// Apply an attempt's outcome to the state machine and publish it.
    fn finalize_attempt(&self, tx: OutcomeSender, epoch: u64, outcome: AttemptOutcome) {
        let mut st = self.lock_state();
        if st.epoch != epoch {
            // A reinitialize superseded this attempt mid-flight. Deliver the
            // outcome to its waiters but leave the fresh state untouched.
            let result = match outcome {
                AttemptOutcome::Success(client) => Ok(client),
                AttemptOutcome::Failure(err) => Err(err),
            };
            let _ = tx.send(Some(result));
            return;
        }

        match outcome {
            AttemptOutcome::Success(client) => {
                st.snapshot.state = ConnectionState::Ready;
                st.snapshot.retry_count = 0;
                st.snapshot.next_retry = None;
                st.snapshot.last_error = None;
                st.client = Some(client.clone());
                st.inflight = None;
                st.retry_task = None;
                self.persist_snapshot(&st.snapshot);
                tracing::info!("backend connection ready");
                drop(st);
                let _ = tx.send(Some(Ok(client)));
            }
            AttemptOutcome::Failure(err) => {
                let max_retries = self.inner.tuning.max_retries;
                if err.retryable && st.snapshot.retry_count < max_retries {
                    let attempt = st.snapshot.retry_count + 1;
                    let delay = calculate_backoff(
                        attempt,
                        self.inner.tuning.base_delay_ms,
                        self.inner.tuning.max_delay_ms,
                    );
                    let annotated = err.annotated(format!("retry {attempt}/{max_retries}"));

                    st.snapshot.state = ConnectionState::Retrying;
                    st.snapshot.retry_count = attempt;
                    st.snapshot.last_error = Some(annotated.clone());
                    st.snapshot.next_retry = Some(
                        Utc::now() + chrono::Duration::milliseconds(delay.as_millis() as i64),
                    );
                    self.persist_snapshot(&st.snapshot);

                    tracing::warn!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %annotated,
                        "connection attempt failed; retry scheduled"
                    );

                    // Resolve current waiters before handing the channel to
                    // the scheduled retry.
                    let _ = tx.send(Some(Err(annotated)));
                    let manager = self.clone();
                    st.retry_task = Some(schedule(delay, async move {
                        manager.run_attempt(tx, epoch).await;
                    }));
                } else {
                    st.snapshot.state = ConnectionState::Error;
                    st.snapshot.last_error = Some(err.clone());
                    st.snapshot.next_retry = None;
                    st.client = None;
                    st.inflight = None;
                    st.retry_task = None;
                    self.persist_snapshot(&st.snapshot);

                    tracing::error!(
                        category = %err.category,
                        retry_count = st.snapshot.retry_count,
                        error = %err,
                        "connection entered Error state"
                    );
                    drop(st);
                    let _ = tx.send(Some(Err(err)));
                }
            }
        }
    }

    /// Best-effort diagnostics persistence; failures are logged only.
    fn persist_snapshot(&self, snapshot: &ConnectionSnapshot) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let store = self.inner.store.clone();
        let snapshot = snapshot.clone();
        handle.spawn(async move {
            match serde_json::to_value(&snapshot) {
                Ok(value) => {
                    if let Err(e) = store.put(CONNECTION_DIAGNOSTICS_KEY, &value).await {
                        tracing::warn!(error = %e, "failed to persist connection diagnostics");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to serialize connection diagnostics"),
            }
        });
    }
}

/// Await the in-flight attempt's terminal outcome.
async fn wait_outcome(mut rx: OutcomeReceiver) -> InitResult {
    loop {
        if let Some(result) = rx.borrow_and_update().clone() {
            return result;
        }
        if rx.changed().await.is_err() {
            return Err(ConnectionError::unknown(
                "initialization attempt was abandoned",
            ));
        }
    }
}
