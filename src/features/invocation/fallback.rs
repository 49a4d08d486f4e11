//! Ordered model fallback with classified retry
//!
//! The chain walks `(candidate index, attempt index)` explicitly:
//! - success returns immediately
//! - `Fatal` aborts the chain
//! - `ModelUnavailable` moves to the next candidate with no retry
//! - `Transient` backs off and retries the same candidate until its budget is
//!   spent, then moves on
//!
//! At most `candidates.len() * max_retries` calls are ever issued.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.0.0: Initial release

use log::{info, warn};
use std::sync::Arc;
use tokio::time::Instant;

use super::classifier::{classify, ClassifiedError, ErrorKind};
use super::retry::RetryScheduler;
use super::{InvocationError, ModelInvoker};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainFailure {
    #[error("non-retriable failure on attempt {calls}: {error}")]
    Fatal { error: ClassifiedError, calls: u32 },

    #[error("all candidate models failed after {calls} call(s){}", last_suffix(.last))]
    Exhausted {
        last: Option<ClassifiedError>,
        calls: u32,
    },

    #[error("request deadline exceeded after {calls} call(s){}", last_suffix(.last))]
    DeadlineExceeded {
        last: Option<ClassifiedError>,
        calls: u32,
    },
}

fn last_suffix(last: &Option<ClassifiedError>) -> String {
    match last {
        Some(error) => format!(", last error: {error}"),
        None => String::new(),
    }
}

impl ChainFailure {
    /// The classified error that ended the chain, if any call was made
    pub fn last_error(&self) -> Option<&ClassifiedError> {
        match self {
            ChainFailure::Fatal { error, .. } => Some(error),
            ChainFailure::Exhausted { last, .. } | ChainFailure::DeadlineExceeded { last, .. } => {
                last.as_ref()
            }
        }
    }

    pub fn calls(&self) -> u32 {
        match self {
            ChainFailure::Fatal { calls, .. }
            | ChainFailure::Exhausted { calls, .. }
            | ChainFailure::DeadlineExceeded { calls, .. } => *calls,
        }
    }

    /// True when the service was reachable but kept telling us to come back later
    pub fn is_overloaded(&self) -> bool {
        match self {
            ChainFailure::Exhausted { last: Some(last), .. } => last.kind == ErrorKind::Transient,
            ChainFailure::DeadlineExceeded { .. } => true,
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct ModelFallbackChain {
    invoker: Arc<dyn ModelInvoker>,
    scheduler: RetryScheduler,
}

impl ModelFallbackChain {
    pub fn new(invoker: Arc<dyn ModelInvoker>, scheduler: RetryScheduler) -> Self {
        Self { invoker, scheduler }
    }

    /// Run the prompt through `candidates` in order until one produces text.
    ///
    /// When `deadline` is set, both in-flight calls and backoff waits are
    /// abandoned as soon as it passes.
    pub async fn invoke(
        &self,
        prompt: &str,
        candidates: &[String],
        deadline: Option<Instant>,
    ) -> Result<String, ChainFailure> {
        let mut calls: u32 = 0;
        let mut last: Option<ClassifiedError> = None;

        for (index, model) in candidates.iter().enumerate() {
            let mut state = self.scheduler.start();

            loop {
                calls += 1;
                let outcome = match self.call(model, prompt, deadline).await {
                    Some(outcome) => outcome,
                    None => {
                        warn!("Deadline exceeded while calling {model} (call {calls})");
                        return Err(ChainFailure::DeadlineExceeded { last, calls });
                    }
                };

                let error = match outcome {
                    Ok(text) => {
                        if index > 0 || state.attempt() > 0 {
                            info!(
                                "Model {model} succeeded on attempt {} after {calls} call(s)",
                                state.attempt() + 1
                            );
                        }
                        return Ok(text);
                    }
                    Err(err) => classify(err),
                };

                match error.kind {
                    ErrorKind::Fatal => {
                        warn!("Model {model} failed with non-retriable error: {error}");
                        return Err(ChainFailure::Fatal { error, calls });
                    }
                    ErrorKind::ModelUnavailable => {
                        warn!("Model {model} unavailable, skipping: {error}");
                        last = Some(error);
                        break;
                    }
                    ErrorKind::Transient if state.can_retry() => {
                        warn!(
                            "Model {model} transient failure on attempt {}: {error}",
                            state.attempt() + 1
                        );
                        last = Some(error);
                        if self.scheduler.wait(state.attempt(), deadline).await.is_err() {
                            warn!("Deadline exceeded during backoff for {model}");
                            return Err(ChainFailure::DeadlineExceeded { last, calls });
                        }
                        state.advance();
                    }
                    ErrorKind::Transient => {
                        warn!("Model {model} retry budget spent: {error}");
                        last = Some(error);
                        break;
                    }
                }
            }
        }

        Err(ChainFailure::Exhausted { last, calls })
    }

    /// One call to the model service; `None` means the deadline won the race
    async fn call(
        &self,
        model: &str,
        prompt: &str,
        deadline: Option<Instant>,
    ) -> Option<Result<String, InvocationError>> {
        let call = self.invoker.invoke(model, prompt);
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call).await.ok(),
            None => Some(call.await),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::features::invocation::RetryConfig;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays a fixed script of outcomes and records which model each call hit
    pub(crate) struct ScriptedInvoker {
        script: Mutex<VecDeque<Result<String, InvocationError>>>,
        pub calls: AtomicU32,
        pub models: Mutex<Vec<String>>,
        pub prompts: Mutex<Vec<String>>,
        pub delay: Option<Duration>,
    }

    impl ScriptedInvoker {
        pub(crate) fn new(script: Vec<Result<String, InvocationError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
                models: Mutex::new(Vec::new()),
                prompts: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        pub(crate) fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new(Vec::new())
            }
        }

        pub(crate) fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn models(&self) -> Vec<String> {
            self.models.lock().unwrap().clone()
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelInvoker for ScriptedInvoker {
        async fn invoke(&self, model: &str, prompt: &str) -> Result<String, InvocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.models.lock().unwrap().push(model.to_string());
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(InvocationError::with_status(503, "overloaded")))
        }
    }

    pub(crate) fn fast_retry(max_retries: u32) -> RetryScheduler {
        RetryScheduler::new(RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
            jitter_ceiling: Duration::ZERO,
        })
    }

    fn models(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn chain(invoker: &Arc<ScriptedInvoker>, max_retries: u32) -> ModelFallbackChain {
        ModelFallbackChain::new(invoker.clone(), fast_retry(max_retries))
    }

    #[tokio::test]
    async fn test_first_model_success() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![Ok("hello".into())]));
        let result = chain(&invoker, 3)
            .invoke("p", &models(&["modelA", "modelB"]), None)
            .await;
        assert_eq!(result.unwrap(), "hello");
        assert_eq!(invoker.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_model_skipped_without_retry() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Err(InvocationError::with_status(404, "models/modelA is not found")),
            Ok("ok".into()),
        ]));
        let result = chain(&invoker, 2)
            .invoke("p", &models(&["modelA", "modelB"]), None)
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(invoker.call_count(), 2);
        assert_eq!(invoker.models(), vec!["modelA", "modelB"]);
    }

    #[tokio::test]
    async fn test_transient_retried_then_success() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Err(InvocationError::new("The model is overloaded")),
            Err(InvocationError::with_status(429, "slow down")),
            Ok("third time".into()),
        ]));
        let result = chain(&invoker, 3)
            .invoke("p", &models(&["modelA", "modelB"]), None)
            .await;
        assert_eq!(result.unwrap(), "third time");
        assert_eq!(invoker.models(), vec!["modelA", "modelA", "modelA"]);
    }

    #[tokio::test]
    async fn test_transient_budget_spent_moves_to_next_model() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Err(InvocationError::with_status(503, "overloaded")),
            Err(InvocationError::with_status(503, "overloaded")),
            Ok("fallback".into()),
        ]));
        let result = chain(&invoker, 2)
            .invoke("p", &models(&["modelA", "modelB"]), None)
            .await;
        assert_eq!(result.unwrap(), "fallback");
        assert_eq!(invoker.models(), vec!["modelA", "modelA", "modelB"]);
    }

    #[tokio::test]
    async fn test_fatal_aborts_chain() {
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Err(InvocationError::with_status(403, "permission denied")),
            Ok("never".into()),
        ]));
        let err = chain(&invoker, 3)
            .invoke("p", &models(&["modelA", "modelB"]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainFailure::Fatal { calls: 1, .. }));
        assert!(!err.is_overloaded());
        assert_eq!(invoker.call_count(), 1);
    }

    #[tokio::test]
    async fn test_all_transient_exhausts_with_bounded_calls() {
        let invoker = Arc::new(ScriptedInvoker::new(Vec::new()));
        let err = chain(&invoker, 3)
            .invoke("p", &models(&["modelA", "modelB", "modelC"]), None)
            .await
            .unwrap_err();
        assert_eq!(invoker.call_count(), 9);
        assert_eq!(err.calls(), 9);
        assert!(err.is_overloaded());
        assert_eq!(err.last_error().unwrap().kind, ErrorKind::Transient);
    }

    #[tokio::test]
    async fn test_call_count_never_exceeds_budget() {
        for max_retries in 1..=4u32 {
            for n in 1..=3usize {
                let invoker = Arc::new(ScriptedInvoker::new(Vec::new()));
                let candidates: Vec<String> = (0..n).map(|i| format!("model{i}")).collect();
                let _ = chain(&invoker, max_retries)
                    .invoke("p", &candidates, None)
                    .await;
                assert_eq!(invoker.call_count(), n as u32 * max_retries);
            }
        }
    }

    #[tokio::test]
    async fn test_last_error_wins_after_exhaustion() {
        // modelA transient until spent, modelB unavailable: surfaced kind is unavailable
        let invoker = Arc::new(ScriptedInvoker::new(vec![
            Err(InvocationError::new("timeout")),
            Err(InvocationError::new("Unknown model modelB")),
        ]));
        let err = chain(&invoker, 1)
            .invoke("p", &models(&["modelA", "modelB"]), None)
            .await
            .unwrap_err();
        assert_eq!(err.last_error().unwrap().kind, ErrorKind::ModelUnavailable);
        assert!(!err.is_overloaded());
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let invoker = Arc::new(ScriptedInvoker::new(Vec::new()));
        let err = chain(&invoker, 3).invoke("p", &[], None).await.unwrap_err();
        assert_eq!(err, ChainFailure::Exhausted { last: None, calls: 0 });
        assert_eq!(invoker.call_count(), 0);
    }

    #[tokio::test]
    async fn test_deadline_cancels_in_flight_call() {
        let invoker = Arc::new(ScriptedInvoker::slow(Duration::from_secs(30)));
        let deadline = Instant::now() + Duration::from_millis(20);
        let started = Instant::now();
        let err = chain(&invoker, 3)
            .invoke("p", &models(&["modelA"]), Some(deadline))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainFailure::DeadlineExceeded { calls: 1, .. }));
        assert!(err.is_overloaded());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_deadline_cancels_backoff() {
        let invoker = Arc::new(ScriptedInvoker::new(Vec::new()));
        let slow_backoff = RetryScheduler::new(RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_secs(30),
            jitter_ceiling: Duration::ZERO,
        });
        let chain = ModelFallbackChain::new(invoker.clone(), slow_backoff);
        let deadline = Instant::now() + Duration::from_millis(20);
        let err = chain
            .invoke("p", &models(&["modelA"]), Some(deadline))
            .await
            .unwrap_err();
        match err {
            ChainFailure::DeadlineExceeded { last, calls } => {
                assert_eq!(calls, 1);
                assert_eq!(last.unwrap().kind, ErrorKind::Transient);
            }
            other => panic!("unexpected failure: {other:?}"),
        }
        assert_eq!(invoker.call_count(), 1);
    }
}
