//! Concurrent fan-out over independent targets.
//!
//! Every target is queried at once, each under its own deadline, and the
//! batch waits for all of them. One entry per distinct target comes back,
//! success or failure; a failing target never affects its siblings.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::errors::{PartialGatherFailure, TaskAborted, TimeoutError, panic_message};
use crate::timeout::TimeoutController;

/// Outcome for one target. Exactly one of `value` and `error` is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GatherResult<T> {
    /// Target identifier.
    pub key: String,
    /// Query result on success.
    pub value: Option<T>,
    /// Failure description otherwise.
    pub error: Option<String>,
}

impl<T> GatherResult<T> {
    fn success(key: String, value: T) -> Self {
        Self {
            key,
            value: Some(value),
            error: None,
        }
    }

    fn failure(key: String, error: String) -> Self {
        Self {
            key,
            value: None,
            error: Some(error),
        }
    }

    /// Whether the query succeeded.
    pub fn is_ok(&self) -> bool {
        self.value.is_some()
    }
}

/// All outcomes of one gather call, keyed by target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GatherBatch<T> {
    results: BTreeMap<String, GatherResult<T>>,
}

impl<T> GatherBatch<T> {
    /// Number of targets.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no targets were requested.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Outcome for one target.
    pub fn get(&self, key: &str) -> Option<&GatherResult<T>> {
        self.results.get(key)
    }

    /// All outcomes in key order.
    pub fn iter(&self) -> impl Iterator<Item = &GatherResult<T>> {
        self.results.values()
    }

    /// Successful targets and their values.
    pub fn successes(&self) -> impl Iterator<Item = (&str, &T)> {
        self.results
            .iter()
            .filter_map(|(k, r)| r.value.as_ref().map(|v| (k.as_str(), v)))
    }

    /// Failed targets and their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.results
            .iter()
            .filter_map(|(k, r)| r.error.as_deref().map(|e| (k.as_str(), e)))
    }

    /// Summary of failed targets, if any failed.
    pub fn partial_failure(&self) -> Option<PartialGatherFailure> {
        let failed: Vec<String> = self.failures().map(|(k, _)| k.to_owned()).collect();
        (!failed.is_empty()).then(|| PartialGatherFailure {
            failed,
            total: self.len(),
        })
    }
}

/// Why a single target failed inside its wrapper.
enum TargetFailure {
    Query(String),
    Timeout(TimeoutError),
    Aborted(TaskAborted),
}

impl From<TimeoutError> for TargetFailure {
    fn from(e: TimeoutError) -> Self {
        Self::Timeout(e)
    }
}

impl From<TaskAborted> for TargetFailure {
    fn from(e: TaskAborted) -> Self {
        Self::Aborted(e)
    }
}

/// Fans a query out over many targets.
#[derive(Clone, Debug)]
pub struct Gatherer {
    controller: TimeoutController,
    per_target_deadline: Duration,
    cancel: CancellationToken,
}

impl Gatherer {
    /// Gatherer using `controller` for per-target deadlines.
    pub fn new(controller: TimeoutController, per_target_deadline: Duration) -> Self {
        Self {
            controller,
            per_target_deadline,
            cancel: CancellationToken::new(),
        }
    }

    /// Derive every per-target token from `parent`.
    #[must_use]
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    /// Query every distinct target concurrently and collect all outcomes.
    ///
    /// Duplicate identifiers are queried once. Each query receives a token
    /// that is cancelled when its own race resolves or the parent is
    /// cancelled. Business errors and timeouts are recorded per target;
    /// a panic escaping a query is logged as an anomaly and recorded as a
    /// failure too.
    #[instrument(skip_all, fields(targets = tracing::field::Empty))]
    pub async fn gather<I, S, F, Fut, T, E>(&self, targets: I, query: F) -> GatherBatch<T>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(String, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let keys = dedupe(targets);
        let _ = tracing::Span::current().record("targets", keys.len());
        debug!(targets = keys.len(), "gather started");

        let branches = keys.into_iter().map(|key| {
            let query = &query;
            async move {
                let label = format!("gather:{key}");
                let target = key.clone();
                let branch = self.controller.with_timeout_abortable_under(
                    &self.cancel,
                    &label,
                    self.per_target_deadline,
                    move |token| {
                        let fut = query(target, token);
                        async move { fut.await.map_err(|e| TargetFailure::Query(e.to_string())) }
                    },
                );
                match AssertUnwindSafe(branch).catch_unwind().await {
                    Ok(Ok(value)) => GatherResult::success(key, value),
                    Ok(Err(TargetFailure::Query(msg))) => {
                        warn!(target_key = %key, error = %msg, "gather target failed");
                        GatherResult::failure(key, msg)
                    }
                    Ok(Err(TargetFailure::Timeout(e))) => {
                        warn!(target_key = %key, deadline_ms = e.deadline_ms(), "gather target timed out");
                        GatherResult::failure(key, e.to_string())
                    }
                    Ok(Err(TargetFailure::Aborted(e))) => GatherResult::failure(key, e.to_string()),
                    Err(panic) => {
                        let msg = panic_message(panic.as_ref());
                        error!(target_key = %key, panic = %msg, "gather target failed outside its query contract");
                        GatherResult::failure(key, format!("internal error: {msg}"))
                    }
                }
            }
        });

        let results: BTreeMap<String, GatherResult<T>> = join_all(branches)
            .await
            .into_iter()
            .map(|r| (r.key.clone(), r))
            .collect();
        let batch = GatherBatch { results };

        match batch.partial_failure() {
            Some(partial) => warn!(failed = partial.failed.len(), total = partial.total, "gather completed with failures"),
            None => debug!(total = batch.len(), "gather completed"),
        }
        batch
    }
}

/// First occurrence wins; order preserved.
fn dedupe<I, S>(targets: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for target in targets {
        let key: String = target.into();
        if seen.insert(key.clone()) {
            keys.push(key);
        } else {
            debug!(target_key = %key, "duplicate gather target dropped");
        }
    }
    keys
}
