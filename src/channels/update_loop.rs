//! Update loop: sequential intake of inbound messages.
//!
//! Polls the transport, and hands each message to the orchestrator in turn.
//! The next poll starts only after the previous message was fully handled.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::agent::{Orchestrator, StatusSink};
use crate::error::{Result, SidekickError};
use crate::session::{ContentPart, Turn};
use crate::transcription::Transcriber;

use super::telegram::poll_backoff_delay;
use super::{ChatAction, InboundMessage, ReplyTarget, Transport};

/// Reply to `/clear`.
pub const HISTORY_CLEARED: &str = "Message history cleared 😎";
/// Stand-in for a voice clip without intelligible speech.
pub const UNINTELLIGIBLE_SPEECH: &str = "*unintelligible speech*";
/// Generic notice when a turn fails.
pub const FAILURE_NOTICE: &str = "Something broke on my side 🤐";

/// Refusal sent to anyone but the owner.
pub fn refusal(sender: &str) -> String {
    format!("I can't talk to you ({})", sender)
}

/// Sends progress notices into the chat the message came from.
struct ChatStatus {
    transport: Arc<dyn Transport>,
    target: ReplyTarget,
}

#[async_trait]
impl StatusSink for ChatStatus {
    async fn status(&self, text: &str) {
        if let Err(e) = self.transport.send_text(self.target, text).await {
            warn!(error = %e, "Failed to send status notice");
        }
    }
}

/// Pulls messages from the transport and feeds them to the orchestrator.
pub struct UpdateLoop {
    transport: Arc<dyn Transport>,
    orchestrator: Arc<Orchestrator>,
    transcriber: Option<Arc<dyn Transcriber>>,
    owner_id: i64,
    poll_timeout_secs: u32,
}

impl UpdateLoop {
    pub fn new(
        transport: Arc<dyn Transport>,
        orchestrator: Arc<Orchestrator>,
        owner_id: i64,
    ) -> Self {
        Self {
            transport,
            orchestrator,
            transcriber: None,
            owner_id,
            poll_timeout_secs: 10,
        }
    }

    /// Transcribe voice clips with `transcriber`.
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Set the long-poll window.
    pub fn with_poll_timeout(mut self, secs: u32) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    /// Poll and handle messages until `shutdown` flips to true.
    ///
    /// Poll failures are retried with exponential backoff. A message that is
    /// being handled when shutdown arrives is finished first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        crate::log_component!(
            info,
            "channels",
            "Starting update loop",
            transport = self.transport.name()
        );
        let mut offset: Option<u32> = None;
        let mut failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let polled = tokio::select! {
                polled = self.transport.poll(offset, self.poll_timeout_secs) => polled,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            match polled {
                Ok(batch) => {
                    failures = 0;
                    offset = batch.next_offset(offset);
                    for msg in batch.messages {
                        self.handle(msg).await;
                    }
                }
                Err(e) => {
                    let delay = poll_backoff_delay(failures);
                    failures = failures.saturating_add(1);
                    warn!(
                        error = %e,
                        attempt = failures,
                        retry_in_secs = delay.as_secs(),
                        "Polling failed, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!("Update loop stopped");
    }

    /// Handle one inbound message end to end.
    pub async fn handle(&self, msg: InboundMessage) {
        let span = info_span!(
            "request",
            request_id = %uuid::Uuid::new_v4(),
            chat_id = msg.target.chat_id,
            sender = %msg.sender_label()
        );
        self.handle_inner(msg).instrument(span).await
    }

    async fn handle_inner(&self, msg: InboundMessage) {
        let target = msg.target;

        if msg.sender_id != Some(self.owner_id) {
            info!("Refusing message from unauthorised sender");
            self.reply(target, &refusal(&msg.sender_label())).await;
            return;
        }

        if msg.is_command("/clear") {
            self.orchestrator.state().clear_history().await;
            info!("History cleared by command");
            self.reply(target, HISTORY_CLEARED).await;
            return;
        }

        if !msg.has_content() {
            debug!("Ignoring message without usable content");
            return;
        }

        if let Err(e) = self.transport.send_action(target, ChatAction::Typing).await {
            warn!(error = %e, "Failed to send typing action");
        }

        let status = ChatStatus {
            transport: self.transport.clone(),
            target,
        };
        let result = match self.user_turn(&msg).await {
            Ok(turn) => self.orchestrator.process(turn, &status).await,
            Err(e) => Err(e),
        };

        let delivered = match result {
            Ok(answer) if answer.trim().is_empty() => {
                Err(SidekickError::Provider("model returned an empty answer".into()))
            }
            Ok(answer) => self.transport.send_text(target, &answer).await,
            Err(e) => Err(e),
        };
        if let Err(e) = delivered {
            error!(error = %e, "Failed to process message");
            self.reply(target, FAILURE_NOTICE).await;
        }
    }

    /// Build the user turn: text first, then media in arrival order.
    async fn user_turn(&self, msg: &InboundMessage) -> Result<Turn> {
        let mut parts = Vec::new();
        if let Some(text) = &msg.text {
            parts.push(ContentPart::text(text.clone()));
        }

        for media in &msg.media {
            let blob = self.transport.download(media.file_id()).await?;
            if media.is_image() {
                parts.push(ContentPart::image(blob.to_data_url()));
            } else {
                let transcript = self.transcribe(blob.bytes, &blob.mime).await;
                parts.push(ContentPart::text(
                    transcript.unwrap_or_else(|| UNINTELLIGIBLE_SPEECH.to_string()),
                ));
            }
        }

        Ok(Turn::user(parts))
    }

    /// Transcript of a voice clip; `None` when unavailable or empty.
    async fn transcribe(&self, audio: Vec<u8>, mime: &str) -> Option<String> {
        let transcriber = self.transcriber.as_ref()?;
        match transcriber.transcribe(audio, mime).await {
            Ok(transcript) => transcript,
            Err(e) => {
                warn!(error = %e, "Transcription failed, using placeholder");
                None
            }
        }
    }

    async fn reply(&self, target: ReplyTarget, text: &str) {
        if let Err(e) = self.transport.send_text(target, text).await {
            error!(error = %e, "Failed to send reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{MediaBlob, MediaRef, PollBatch};
    use crate::error::SidekickError;
    use crate::providers::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};
    use crate::state::{AgentState, InMemoryStore};
    use crate::tools::ToolRegistry;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const OWNER: i64 = 100;

    struct LastUserProvider {
        requests: Mutex<Vec<Vec<Turn>>>,
        fail: bool,
    }

    #[async_trait]
    impl LLMProvider for LastUserProvider {
        async fn chat(
            &self,
            messages: Vec<Turn>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            let last = messages.last().map(Turn::text).unwrap_or_default();
            self.requests.lock().unwrap().push(messages);
            if self.fail {
                return Err(SidekickError::Provider("boom".to_string()));
            }
            Ok(LLMResponse::text(&format!("echo: {}", last)))
        }
        fn default_model(&self) -> &str {
            "echo"
        }
        fn name(&self) -> &str {
            "echo"
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        batches: Mutex<VecDeque<Result<PollBatch>>>,
        offsets: Mutex<Vec<Option<u32>>>,
        sent: Mutex<Vec<String>>,
        actions: AtomicUsize,
        // Texts longer than this are rejected; zero means no limit.
        max_text_len: AtomicUsize,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        fn name(&self) -> &str {
            "fake"
        }
        async fn poll(&self, offset: Option<u32>, _timeout_secs: u32) -> Result<PollBatch> {
            self.offsets.lock().unwrap().push(offset);
            let next = self.batches.lock().unwrap().pop_front();
            match next {
                Some(batch) => batch,
                None => {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(PollBatch::default())
                }
            }
        }
        async fn send_text(&self, _target: ReplyTarget, text: &str) -> Result<()> {
            let limit = self.max_text_len.load(Ordering::SeqCst);
            if limit > 0 && text.chars().count() > limit {
                return Err(SidekickError::Channel("message is too long".to_string()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
        async fn send_action(&self, _target: ReplyTarget, _action: ChatAction) -> Result<()> {
            self.actions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn download(&self, file_id: &str) -> Result<MediaBlob> {
            let mime = if file_id.starts_with("voice") {
                "audio/ogg"
            } else {
                "image/png"
            };
            Ok(MediaBlob {
                bytes: file_id.as_bytes().to_vec(),
                mime: mime.to_string(),
            })
        }
    }

    struct FixedTranscriber(Option<&'static str>);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _audio: Vec<u8>, _content_type: &str) -> Result<Option<String>> {
            match self.0 {
                Some("fail") => Err(SidekickError::Transcription("offline".to_string())),
                other => Ok(other.map(str::to_string)),
            }
        }
    }

    fn setup(fail: bool) -> (Arc<FakeTransport>, Arc<LastUserProvider>, Arc<AgentState>, UpdateLoop) {
        let transport = Arc::new(FakeTransport::default());
        let provider = Arc::new(LastUserProvider {
            requests: Mutex::new(Vec::new()),
            fail,
        });
        let state = Arc::new(AgentState::new(Arc::new(InMemoryStore::new()), 50));
        let orchestrator = Arc::new(Orchestrator::new(
            provider.clone(),
            Arc::new(ToolRegistry::new()),
            state.clone(),
            "gpt-test",
        ));
        let update_loop = UpdateLoop::new(transport.clone(), orchestrator, OWNER);
        (transport, provider, state, update_loop)
    }

    #[tokio::test]
    async fn test_owner_message_is_answered() {
        let (transport, _provider, state, update_loop) = setup(false);
        update_loop
            .handle(InboundMessage::text(1, OWNER, OWNER, "hello"))
            .await;
        assert_eq!(*transport.sent.lock().unwrap(), ["echo: hello"]);
        assert_eq!(transport.actions.load(Ordering::SeqCst), 1);
        assert_eq!(state.history().await.len(), 2);
    }

    #[tokio::test]
    async fn test_stranger_is_refused() {
        let (transport, provider, state, update_loop) = setup(false);
        update_loop
            .handle(InboundMessage::text(1, 555, 555, "/clear"))
            .await;
        assert_eq!(
            *transport.sent.lock().unwrap(),
            ["I can't talk to you (555)"]
        );
        assert!(provider.requests.lock().unwrap().is_empty());
        assert!(state.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_command_wipes_history() {
        let (transport, provider, state, update_loop) = setup(false);
        state
            .append_turns([Turn::user_text("a"), Turn::assistant("b")])
            .await;
        update_loop
            .handle(InboundMessage::text(1, OWNER, OWNER, "/clear"))
            .await;
        assert!(state.history().await.is_empty());
        assert_eq!(*transport.sent.lock().unwrap(), [HISTORY_CLEARED]);
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_is_ignored() {
        let (transport, provider, _state, update_loop) = setup(false);
        update_loop
            .handle(InboundMessage::text(1, OWNER, OWNER, "  "))
            .await;
        assert!(transport.sent.lock().unwrap().is_empty());
        assert_eq!(transport.actions.load(Ordering::SeqCst), 0);
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_answer_sends_notice() {
        let (transport, _provider, _state, update_loop) = setup(false);
        transport.max_text_len.store(4096, Ordering::SeqCst);
        update_loop
            .handle(InboundMessage::text(1, OWNER, OWNER, &"x".repeat(5000)))
            .await;
        assert_eq!(*transport.sent.lock().unwrap(), [FAILURE_NOTICE]);
    }

    #[tokio::test]
    async fn test_failure_sends_notice() {
        let (transport, _provider, state, update_loop) = setup(true);
        update_loop
            .handle(InboundMessage::text(1, OWNER, OWNER, "hello"))
            .await;
        assert_eq!(*transport.sent.lock().unwrap(), [FAILURE_NOTICE]);
        // The user turn stays in history even though the turn failed.
        assert_eq!(state.history().await.len(), 1);
    }

    #[tokio::test]
    async fn test_media_becomes_content_parts() {
        let (_transport, _provider, state, update_loop) = setup(false);
        let update_loop =
            update_loop.with_transcriber(Arc::new(FixedTranscriber(Some("call mom at ten"))));
        let msg = InboundMessage::text(1, OWNER, OWNER, "look")
            .with_media(MediaRef::Voice {
                file_id: "voice-1".to_string(),
            })
            .with_media(MediaRef::Photo {
                file_id: "photo-1".to_string(),
            });
        update_loop.handle(msg).await;

        let history = state.history().await;
        let Turn::User { content } = &history.turns()[0] else {
            panic!("expected a user turn");
        };
        assert_eq!(content.len(), 3);
        assert_eq!(content[0], ContentPart::text("look"));
        assert_eq!(content[1], ContentPart::text("call mom at ten"));
        let expected_url = MediaBlob {
            bytes: b"photo-1".to_vec(),
            mime: "image/png".to_string(),
        }
        .to_data_url();
        assert_eq!(content[2], ContentPart::image(expected_url));
    }

    #[tokio::test]
    async fn test_voice_placeholder_when_transcript_missing() {
        for transcriber in [None, Some("fail")] {
            let (_transport, _provider, state, update_loop) = setup(false);
            let update_loop = update_loop.with_transcriber(Arc::new(FixedTranscriber(transcriber)));
            let msg = InboundMessage::text(1, OWNER, OWNER, "").with_media(MediaRef::Voice {
                file_id: "voice-2".to_string(),
            });
            update_loop.handle(msg).await;
            let history = state.history().await;
            assert_eq!(history.turns()[0].text(), UNINTELLIGIBLE_SPEECH);
        }
    }

    #[tokio::test]
    async fn test_run_advances_cursor_and_retries() {
        let (transport, _provider, _state, update_loop) = setup(false);
        {
            let mut batches = transport.batches.lock().unwrap();
            batches.push_back(Ok(PollBatch {
                messages: vec![InboundMessage::text(7, OWNER, OWNER, "first")],
                last_update_id: Some(8),
            }));
        }

        let (tx, rx) = watch::channel(false);
        let update_loop = Arc::new(update_loop);
        let runner = {
            let update_loop = update_loop.clone();
            tokio::spawn(async move { update_loop.run(rx).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .unwrap()
            .unwrap();

        let offsets = transport.offsets.lock().unwrap().clone();
        assert_eq!(offsets[0], None);
        assert_eq!(offsets[1], Some(9));
        assert_eq!(transport.sent.lock().unwrap()[0], "echo: first");
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_poll_backoff() {
        let (transport, _provider, _state, update_loop) = setup(false);
        transport
            .batches
            .lock()
            .unwrap()
            .push_back(Err(SidekickError::Channel("network down".to_string())));

        let (tx, rx) = watch::channel(false);
        let update_loop = Arc::new(update_loop);
        let runner = {
            let update_loop = update_loop.clone();
            tokio::spawn(async move { update_loop.run(rx).await })
        };

        // The first retry waits two seconds; nothing else is polled meanwhile.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.offsets.lock().unwrap().len(), 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .unwrap()
            .unwrap();
    }
}
