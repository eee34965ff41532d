//! Schedule sweep.
//!
//! Every interval the engine collects buckets whose minute has come, asks the
//! model to perform their tasks and sends the reply to the owner. A performed
//! bucket is emptied and the schedule persisted before the next one starts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::agent::ContextBuilder;
use crate::channels::{ReplyTarget, Transport};
use crate::error::Result;
use crate::providers::{ChatOptions, LLMProvider};
use crate::state::AgentState;

use super::ScheduleKey;

/// What one call to [`ScheduleEngine::sweep`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Another sweep was running or shutdown has begun.
    Skipped,
    /// The sweep ran; counts are per bucket.
    Completed { performed: usize, failed: usize },
}

/// Clears the running flag however the sweep ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Timer-driven executor of due schedule buckets.
pub struct ScheduleEngine {
    state: Arc<AgentState>,
    provider: Arc<dyn LLMProvider>,
    transport: Arc<dyn Transport>,
    recipient: ReplyTarget,
    context: ContextBuilder,
    model: String,
    options: ChatOptions,
    interval: Duration,
    running: AtomicBool,
    shutting_down: AtomicBool,
}

impl ScheduleEngine {
    pub fn new(
        state: Arc<AgentState>,
        provider: Arc<dyn LLMProvider>,
        transport: Arc<dyn Transport>,
        recipient: ReplyTarget,
        model: &str,
    ) -> Self {
        Self {
            state,
            provider,
            transport,
            recipient,
            context: ContextBuilder::new(),
            model: model.to_string(),
            options: ChatOptions::new(),
            interval: Duration::from_secs(60),
            running: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Set the sweep period.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Use a custom context builder.
    pub fn with_context(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    /// Set chat options for sweep calls.
    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether a sweep is in flight.
    pub fn is_sweeping(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Refuse new sweeps from now on. An in-flight sweep stops after its
    /// current bucket.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Wait up to `grace` for an in-flight sweep. Returns true once idle.
    pub async fn wait_idle(&self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        while self.is_sweeping() {
            if Instant::now() >= deadline {
                return false;
            }
            debug!("Waiting for schedule sweep to finish");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        true
    }

    /// Sweep against the current time.
    pub async fn sweep(&self) -> SweepOutcome {
        self.sweep_at(Utc::now()).await
    }

    /// Perform every non-empty bucket due at `now`.
    ///
    /// Skipped entirely when a sweep is already running or shutdown has
    /// begun. A bucket whose model call or delivery fails is left untouched
    /// and retried on the next tick.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepOutcome {
        if self.is_shutting_down() || self.running.swap(true, Ordering::SeqCst) {
            debug!("Schedule sweep skipped");
            return SweepOutcome::Skipped;
        }
        let _guard = RunningGuard(&self.running);

        let due = self.state.due_tasks(now).await;
        if due.is_empty() {
            return SweepOutcome::Completed {
                performed: 0,
                failed: 0,
            };
        }

        let now_key = ScheduleKey::from_datetime(now);
        let mut performed = 0;
        let mut failed = 0;
        for (key, tasks) in due {
            if self.is_shutting_down() {
                info!("Shutdown requested, leaving remaining buckets for next start");
                break;
            }
            match self.perform(now_key, &tasks).await {
                Ok(()) => {
                    self.state.drain_bucket(&key, &tasks).await;
                    performed += 1;
                    info!(bucket = %key, tasks = tasks.len(), "Performed scheduled tasks");
                }
                Err(e) => {
                    failed += 1;
                    error!(bucket = %key, error = %e, "Failed to perform scheduled tasks");
                }
            }
        }

        SweepOutcome::Completed { performed, failed }
    }

    /// One model call for one bucket, reply delivered to the owner.
    async fn perform(&self, now: ScheduleKey, tasks: &[String]) -> Result<()> {
        let memory = self.state.memory().await;
        let messages = self.context.sweep_messages(&memory, now.instant(), tasks);
        let response = self
            .provider
            .chat(messages, vec![], Some(&self.model), self.options.clone())
            .await?;

        match response.content_opt() {
            Some(reply) => self.transport.send_text(self.recipient, &reply).await,
            None => {
                warn!("Model returned an empty reply for scheduled tasks");
                Ok(())
            }
        }
    }

    /// Sweep once now, then every interval until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        crate::log_component!(
            info,
            "schedule",
            "Starting schedule engine",
            interval_secs = self.interval.as_secs()
        );
        self.sweep().await;

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    if let SweepOutcome::Completed { performed, failed } = self.sweep().await {
                        if performed + failed > 0 {
                            debug!(performed, failed, "Schedule sweep finished");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.begin_shutdown();
        crate::log_component!(info, "schedule", "Schedule engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ChatAction, MediaBlob, PollBatch};
    use crate::error::SidekickError;
    use crate::providers::{LLMResponse, ToolDefinition};
    use crate::session::Turn;
    use crate::state::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct EchoTasksProvider {
        calls: AtomicUsize,
        fail: bool,
        delay: Duration,
    }

    #[async_trait]
    impl LLMProvider for EchoTasksProvider {
        async fn chat(
            &self,
            messages: Vec<Turn>,
            tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            assert!(tools.is_empty());
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(SidekickError::Provider("down".to_string()));
            }
            Ok(LLMResponse::text(&format!("done: {}", messages[1].text())))
        }
        fn default_model(&self) -> &str {
            "echo"
        }
        fn name(&self) -> &str {
            "echo"
        }
    }

    #[derive(Default)]
    struct OutboxTransport {
        sent: Mutex<Vec<(ReplyTarget, String)>>,
    }

    #[async_trait]
    impl Transport for OutboxTransport {
        fn name(&self) -> &str {
            "outbox"
        }
        async fn poll(&self, _offset: Option<u32>, _timeout_secs: u32) -> Result<PollBatch> {
            Ok(PollBatch::default())
        }
        async fn send_text(&self, target: ReplyTarget, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push((target, text.to_string()));
            Ok(())
        }
        async fn send_action(&self, _target: ReplyTarget, _action: ChatAction) -> Result<()> {
            Ok(())
        }
        async fn download(&self, file_id: &str) -> Result<MediaBlob> {
            Err(SidekickError::NotFound(file_id.to_string()))
        }
    }

    fn at(raw: &str) -> DateTime<Utc> {
        ScheduleKey::parse(raw).unwrap().instant()
    }

    fn engine(
        fail: bool,
        delay: Duration,
    ) -> (
        Arc<ScheduleEngine>,
        Arc<AgentState>,
        Arc<EchoTasksProvider>,
        Arc<OutboxTransport>,
    ) {
        let state = Arc::new(AgentState::new(Arc::new(InMemoryStore::new()), 50));
        let provider = Arc::new(EchoTasksProvider {
            calls: AtomicUsize::new(0),
            fail,
            delay,
        });
        let transport = Arc::new(OutboxTransport::default());
        let engine = ScheduleEngine::new(
            state.clone(),
            provider.clone(),
            transport.clone(),
            ReplyTarget::chat(777),
            "gpt-4.1-mini",
        );
        (Arc::new(engine), state, provider, transport)
    }

    #[tokio::test]
    async fn test_sweep_drains_due_buckets_only() {
        let (engine, state, provider, transport) = engine(false, Duration::ZERO);
        state
            .schedule_task(ScheduleKey::parse("2026-10-19T09:59:00Z").unwrap(), "past")
            .await;
        state
            .schedule_task(ScheduleKey::parse("2026-10-19T10:00:00Z").unwrap(), "now")
            .await;
        state
            .schedule_task(ScheduleKey::parse("2026-10-19T10:01:00Z").unwrap(), "future")
            .await;

        let outcome = engine.sweep_at(at("2026-10-19T10:00:45Z")).await;
        assert_eq!(
            outcome,
            SweepOutcome::Completed {
                performed: 2,
                failed: 0
            }
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, ReplyTarget::chat(777));
        assert_eq!(sent[0].1, r#"done: Perform the following tasks: ["past"]"#);

        let listing = state.schedule_listing().await;
        assert_eq!(listing.len(), 1);
        assert_eq!(listing["2026-10-19T10:01:00.000Z"], ["future"]);
        // Drained buckets stay as empty lists.
        assert_eq!(state.schedule().await.bucket_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_bucket_is_kept_for_retry() {
        let (engine, state, _provider, transport) = engine(true, Duration::ZERO);
        state
            .schedule_task(ScheduleKey::parse("2026-10-19T09:00:00Z").unwrap(), "call")
            .await;

        let outcome = engine.sweep_at(at("2026-10-19T10:00:00Z")).await;
        assert_eq!(
            outcome,
            SweepOutcome::Completed {
                performed: 0,
                failed: 1
            }
        );
        assert!(transport.sent.lock().unwrap().is_empty());
        assert_eq!(state.schedule().await.pending_count(), 1);
        assert!(!engine.is_sweeping());
    }

    #[tokio::test]
    async fn test_sweep_is_not_reentrant() {
        let (engine, state, provider, _transport) = engine(false, Duration::from_millis(100));
        state
            .schedule_task(ScheduleKey::parse("2026-10-19T09:00:00Z").unwrap(), "call")
            .await;

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.sweep_at(at("2026-10-19T10:00:00Z")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(engine.is_sweeping());
        assert_eq!(
            engine.sweep_at(at("2026-10-19T10:00:00Z")).await,
            SweepOutcome::Skipped
        );

        let outcome = first.await.unwrap();
        assert_eq!(
            outcome,
            SweepOutcome::Completed {
                performed: 1,
                failed: 0
            }
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(engine.wait_idle(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_no_sweep_after_shutdown() {
        let (engine, state, provider, _transport) = engine(false, Duration::ZERO);
        state
            .schedule_task(ScheduleKey::parse("2026-10-19T09:00:00Z").unwrap(), "call")
            .await;
        engine.begin_shutdown();
        assert_eq!(
            engine.sweep_at(at("2026-10-19T10:00:00Z")).await,
            SweepOutcome::Skipped
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_times_out() {
        let (engine, state, _provider, _transport) = engine(false, Duration::from_millis(300));
        state
            .schedule_task(ScheduleKey::parse("2026-10-19T09:00:00Z").unwrap(), "call")
            .await;
        let handle = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.sweep_at(at("2026-10-19T10:00:00Z")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!engine.wait_idle(Duration::from_millis(50)).await);
        handle.await.unwrap();
        assert!(engine.wait_idle(Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn test_run_sweeps_at_startup_and_stops_on_shutdown() {
        let (engine, state, provider, _transport) = engine(false, Duration::ZERO);
        state
            .schedule_task(ScheduleKey::parse("2020-01-01T00:00:00Z").unwrap(), "old")
            .await;
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(engine.clone().run(rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.schedule().await.pending_count(), 0);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(engine.is_shutting_down());
    }
}
