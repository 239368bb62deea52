//! Chat turn use case
//!
//! [`ChatTurnController`] drives one conversation through
//!
//! ```text
//! Idle -> Submitting -> Streaming -> Persisting -> Idle
//! ```
//!
//! with every failure shunted back to `Idle`. Only one turn runs at a time;
//! a submission outside `Idle` is rejected with [`TurnError::TurnInFlight`].
//!
//! Controller state sits behind a short-lived mutex that is never held across
//! an `.await`. Provider streaming and the commit are the only suspension
//! points; mapping, accumulation and scroll decisions are synchronous.

mod types;

pub use types::{TurnError, TurnOutcome, TurnWarning};

use crate::config::StreamParams;
use crate::ports::chat_repository::{PersistenceError, TurnCommit};
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::provider::ProviderSet;
use crate::ports::turn_observer::{NoTurnObserver, TurnObserver};
use crate::ports::viewport::{NoViewPort, ViewPort};
use crate::stream::accumulator::{BufferUpdate, StreamAccumulator, StreamOutcome, UpdateKind};
use crate::stream::scroll::ScrollAnchor;
use crate::use_cases::persist_turn::PersistenceGate;
use chatline_domain::util::preview;
use chatline_domain::{
    AnchorState, Conversation, ConversationId, IdempotencyKey, InlineImage, ModelId,
    PendingAttachment, ProviderRequest, ScrollOrigin, StreamState, TurnPhase,
    to_provider_request,
};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A commit that failed and can be retried with the same key.
#[derive(Debug, Clone)]
struct FailedCommit {
    commit: TurnCommit,
    partial: bool,
}

struct ControllerState {
    conversation: Conversation,
    phase: TurnPhase,
    stream: StreamState,
    attachment: Option<PendingAttachment>,
    has_bootstrapped: bool,
    cancellation: Option<CancellationToken>,
    failed_commit: Option<FailedCommit>,
}

/// Everything a turn needs once the guards have passed.
struct PreparedTurn {
    model: ModelId,
    request: ProviderRequest,
    inline: Option<InlineImage>,
    img: Option<String>,
    question: Option<String>,
    key: IdempotencyKey,
    cancellation: CancellationToken,
    warning: Option<TurnWarning>,
    snapshot: StreamState,
}

/// Orchestrates submissions for one conversation.
pub struct ChatTurnController {
    conversation_id: ConversationId,
    state: Mutex<ControllerState>,
    anchor: Mutex<ScrollAnchor>,
    providers: ProviderSet,
    accumulator: StreamAccumulator,
    gate: PersistenceGate,
    observer: Arc<dyn TurnObserver>,
    logger: Arc<dyn ConversationLogger>,
    params: StreamParams,
}

impl ChatTurnController {
    pub fn new(
        conversation: Conversation,
        providers: ProviderSet,
        gate: PersistenceGate,
        params: StreamParams,
    ) -> Self {
        Self {
            conversation_id: conversation.id.clone(),
            state: Mutex::new(ControllerState {
                conversation,
                phase: TurnPhase::Idle,
                stream: StreamState::default(),
                attachment: None,
                has_bootstrapped: false,
                cancellation: None,
                failed_commit: None,
            }),
            anchor: Mutex::new(ScrollAnchor::new(
                Arc::new(NoViewPort),
                params.scroll_threshold,
            )),
            providers,
            accumulator: StreamAccumulator::new(params.inactivity_timeout),
            gate,
            observer: Arc::new(NoTurnObserver),
            logger: Arc::new(NoConversationLogger),
            params,
        }
    }

    pub fn with_viewport(self, viewport: Arc<dyn ViewPort>) -> Self {
        let anchor = ScrollAnchor::new(viewport, self.params.scroll_threshold);
        Self {
            anchor: Mutex::new(anchor),
            ..self
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    // ==================== Read Accessors ====================

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Copy of the conversation including turns committed in this session.
    pub fn conversation(&self) -> Conversation {
        self.state().conversation.clone()
    }

    pub fn phase(&self) -> TurnPhase {
        self.state().phase
    }

    /// Snapshot of the turn being rendered.
    pub fn snapshot(&self) -> StreamState {
        self.state().stream.clone()
    }

    pub fn anchor_state(&self) -> AnchorState {
        self.anchor().state()
    }

    pub fn attachment(&self) -> Option<PendingAttachment> {
        self.state().attachment.clone()
    }

    pub fn has_failed_commit(&self) -> bool {
        self.state().failed_commit.is_some()
    }

    // ==================== Commands ====================

    /// Attach an image to the next submission.
    pub fn attach(&self, attachment: PendingAttachment) {
        self.state().attachment = Some(attachment);
    }

    pub fn clear_attachment(&self) {
        self.state().attachment = None;
    }

    /// Forward a scroll of the conversation view.
    pub fn on_scroll(&self, origin: ScrollOrigin) {
        self.anchor().on_scroll(origin);
        if origin == ScrollOrigin::User {
            self.state().stream.has_user_manually_scrolled = true;
        }
    }

    /// Tear down the active stream, if any.
    ///
    /// The running turn returns [`TurnError::Cancelled`] and applies nothing
    /// that arrives afterwards.
    pub fn cancel(&self) {
        let token = self.state().cancellation.clone();
        if let Some(token) = token {
            info!("Cancelling active turn for {}", self.conversation_id);
            token.cancel();
        }
    }

    /// Submit a new user message.
    ///
    /// Blank input is ignored. Errors are reported to the observer as well as
    /// returned.
    pub async fn submit(&self, text: &str) -> Result<TurnOutcome, TurnError> {
        if text.trim().is_empty() {
            return Ok(TurnOutcome::Ignored);
        }
        self.run_turn(Some(text.to_string())).await
    }

    /// Replay the first message of a freshly created conversation.
    ///
    /// Runs at most once per controller, no matter how often it is called.
    /// The replayed message is already stored, so only the answer is saved.
    pub async fn bootstrap(&self) -> Result<TurnOutcome, TurnError> {
        {
            let mut state = self.state();
            if state.has_bootstrapped {
                return Ok(TurnOutcome::Ignored);
            }
            state.has_bootstrapped = true;
            if !state.conversation.is_fresh() {
                return Ok(TurnOutcome::Ignored);
            }
        }

        info!("Bootstrapping conversation {}", self.conversation_id);
        self.run_turn(None).await
    }

    /// Re-send the last commit that failed, under the same idempotency key.
    pub async fn retry_commit(&self) -> Result<TurnOutcome, TurnError> {
        let failed = {
            let mut state = self.state();
            if !state.phase.is_idle() {
                return Err(TurnError::TurnInFlight);
            }
            let Some(failed) = state.failed_commit.clone() else {
                return Err(TurnError::NothingToRetry);
            };
            state.phase = TurnPhase::Persisting;
            failed
        };
        self.observer.on_phase(TurnPhase::Persisting);

        info!("Retrying commit {}", failed.commit.idempotency_key);
        let result = self.gate.commit(&self.conversation_id, &failed.commit).await;
        self.finish_commit(failed.commit, failed.partial, result)
    }

    // ==================== Turn Flow ====================

    async fn run_turn(&self, question: Option<String>) -> Result<TurnOutcome, TurnError> {
        let turn = match self.prepare(question) {
            Ok(turn) => turn,
            Err(e) => {
                self.report(&e);
                return Err(e);
            }
        };

        self.anchor().on_submission();
        self.observer.on_phase(TurnPhase::Submitting);
        if let Some(warning) = &turn.warning {
            warn!("{}", warning);
            self.observer.on_warning(warning);
        }
        self.observer.on_state(&turn.snapshot);
        self.logger.log(ConversationEvent::new(
            "turn_submitted",
            json!({
                "conversation_id": self.conversation_id.as_str(),
                "turn": turn.key.turn_sequence(),
                "model": turn.model.as_str(),
                "question": turn.question.as_deref().map(|q| preview(q, 200)),
                "has_attachment": turn.img.is_some(),
            }),
        ));

        let adapter = self.providers.for_model(turn.model);
        debug!(
            "Opening {} stream for {}",
            adapter.kind().as_str(),
            turn.model
        );
        let opened = tokio::select! {
            biased;
            _ = turn.cancellation.cancelled() => Err(TurnError::Cancelled),
            result = adapter.stream(turn.model, &turn.request, turn.inline.as_ref()) => {
                result.map_err(TurnError::from)
            }
        };
        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => return Err(self.abort_turn(e)),
        };

        self.state().phase = TurnPhase::Streaming;
        self.observer.on_phase(TurnPhase::Streaming);

        let answer = self
            .accumulator
            .consume(stream, &turn.cancellation, |update| {
                self.apply_update(update, &turn.cancellation)
            })
            .await;

        self.logger.log(ConversationEvent::new(
            "turn_streamed",
            json!({
                "conversation_id": self.conversation_id.as_str(),
                "turn": turn.key.turn_sequence(),
                "outcome": answer.outcome.as_str(),
                "fragments": answer.fragments,
                "bytes": answer.text.len(),
            }),
        ));

        let partial = match answer.outcome {
            StreamOutcome::Completed => false,
            StreamOutcome::Cancelled => return Err(self.abort_turn(TurnError::Cancelled)),
            StreamOutcome::Failed(message) => {
                let error = TurnError::ProviderStream(message);
                if !self.params.persist_partial_answers || answer.text.is_empty() {
                    return Err(self.abort_turn(error));
                }
                self.report(&error);
                true
            }
            StreamOutcome::TimedOut(after) => {
                let error = TurnError::StreamTimeout(after);
                if !self.params.persist_partial_answers || answer.text.is_empty() {
                    return Err(self.abort_turn(error));
                }
                self.report(&error);
                true
            }
        };

        let commit = TurnCommit::new(turn.key, answer.text)
            .with_question(turn.question)
            .with_img(turn.img);

        {
            let mut state = self.state();
            state.phase = TurnPhase::Persisting;
            state.cancellation = None;
        }
        self.observer.on_phase(TurnPhase::Persisting);

        let result = self.gate.commit(&self.conversation_id, &commit).await;
        self.finish_commit(commit, partial, result)
    }

    /// Run every guard and move to `Submitting`, all under one lock.
    fn prepare(&self, question: Option<String>) -> Result<PreparedTurn, TurnError> {
        let mut state = self.state();

        if !state.phase.is_idle() {
            debug!("Rejecting submission while {}", state.phase);
            return Err(TurnError::TurnInFlight);
        }
        if let Some(reason) = state
            .attachment
            .as_ref()
            .and_then(PendingAttachment::blocking_reason)
        {
            return Err(TurnError::AttachmentUpload(reason));
        }

        let model = state
            .conversation
            .model_id()
            .map_err(|_| TurnError::UnsupportedModel(state.conversation.model.clone()))?;
        let request =
            to_provider_request(&state.conversation.history, question.as_deref(), model)?;

        let img = state
            .attachment
            .as_ref()
            .and_then(|a| a.stored_path())
            .map(str::to_string);
        let mut inline = state.attachment.as_ref().and_then(|a| a.inline.clone());
        let mut warning = None;
        if !model.provider_kind().supports_attachments() && (inline.is_some() || img.is_some()) {
            inline = None;
            warning = Some(TurnWarning::AttachmentUnsupported {
                model: model.to_string(),
            });
        }

        if let Some(abandoned) = state.failed_commit.take() {
            warn!(
                "Discarding unsaved turn {} for a new submission",
                abandoned.commit.idempotency_key
            );
        }

        // The turn's position in the saved history, so an abandoned commit
        // never shifts the keys of turns saved later.
        let key = IdempotencyKey::new(
            self.conversation_id.clone(),
            state.conversation.history.len(),
        );

        let cancellation = CancellationToken::new();
        state.cancellation = Some(cancellation.clone());
        state.phase = TurnPhase::Submitting;
        state.stream = StreamState::begin(question.clone());

        Ok(PreparedTurn {
            model,
            request,
            inline,
            img,
            question,
            key,
            cancellation,
            warning,
            snapshot: state.stream.clone(),
        })
    }

    /// Apply one buffer update, then let the view follow it.
    fn apply_update(&self, update: BufferUpdate<'_>, cancellation: &CancellationToken) {
        let snapshot = {
            let mut state = self.state();
            if cancellation.is_cancelled() {
                return;
            }
            if update.kind == UpdateKind::Delta {
                state.stream.append(update.delta);
            }
            state.stream.clone()
        };
        self.observer.on_state(&snapshot);
        self.anchor().on_buffer_update();
    }

    /// Shunt back to `Idle` keeping whatever text arrived.
    fn abort_turn(&self, error: TurnError) -> TurnError {
        {
            let mut state = self.state();
            state.phase = TurnPhase::Idle;
            state.cancellation = None;
            state.stream.stop_streaming();
        }

        if error.is_cancelled() {
            debug!("Turn for {} cancelled", self.conversation_id);
            return error;
        }

        self.observer.on_phase(TurnPhase::Idle);
        self.report(&error);
        error
    }

    fn finish_commit(
        &self,
        commit: TurnCommit,
        partial: bool,
        result: Result<ConversationId, PersistenceError>,
    ) -> Result<TurnOutcome, TurnError> {
        let snapshot = {
            let mut state = self.state();
            PersistenceGate::settle(&mut state.stream, &result);
            state.phase = TurnPhase::Idle;
            match &result {
                Ok(_) => {
                    state.conversation.record_exchange(
                        commit.question.as_deref(),
                        &commit.answer,
                        commit.img.as_deref(),
                    );
                    state.attachment = None;
                    state.failed_commit = None;
                }
                Err(_) => {
                    state.failed_commit = Some(FailedCommit {
                        commit: commit.clone(),
                        partial,
                    });
                }
            }
            state.stream.clone()
        };
        self.observer.on_state(&snapshot);
        self.observer.on_phase(TurnPhase::Idle);

        match result {
            Ok(conversation_id) => {
                self.logger.log(ConversationEvent::new(
                    "turn_committed",
                    json!({
                        "conversation_id": conversation_id.as_str(),
                        "idempotency_key": commit.idempotency_key.as_header_value(),
                        "question": commit.question.as_deref().map(|q| preview(q, 200)),
                        "answer": preview(&commit.answer, 500),
                        "partial": partial,
                    }),
                ));
                Ok(TurnOutcome::Committed {
                    conversation_id,
                    answer: commit.answer,
                    idempotency_key: commit.idempotency_key,
                    partial,
                })
            }
            Err(e) => {
                let error = TurnError::Persistence(e);
                self.report(&error);
                Err(error)
            }
        }
    }

    /// Surface an error to the user and the transcript log.
    fn report(&self, error: &TurnError) {
        if error.is_cancelled() {
            return;
        }
        warn!("Turn for {} failed: {}", self.conversation_id, error);
        if error.is_blocking() {
            self.observer.on_blocking_notice(&error.to_string());
        } else {
            self.observer.on_error(error);
        }
        self.logger.log(ConversationEvent::new(
            "turn_failed",
            json!({
                "conversation_id": self.conversation_id.as_str(),
                "error": error.to_string(),
            }),
        ));
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn anchor(&self) -> MutexGuard<'_, ScrollAnchor> {
        self.anchor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::chat_repository::ChatRepository;
    use crate::ports::conversation_cache::ConversationCache;
    use crate::ports::provider::{DeltaStream, ProviderAdapter, ProviderError};
    use async_trait::async_trait;
    use chatline_domain::{
        ChatMessage, ChatRole, ConversationTurn, ProviderKind, ScrollTarget, StoredAsset,
        StreamEvent, ViewportMetrics,
    };
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // ==================== Mocks ====================

    type Call = (ModelId, ProviderRequest, Option<InlineImage>);

    struct ScriptedAdapter {
        kind: ProviderKind,
        streams: Mutex<VecDeque<DeltaStream>>,
        calls: Mutex<Vec<Call>>,
    }

    impl ScriptedAdapter {
        fn new(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                streams: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn push(&self, stream: DeltaStream) {
            self.streams.lock().unwrap().push_back(stream);
        }

        fn push_events(&self, events: Vec<StreamEvent>) {
            self.push(DeltaStream::from_events(events));
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedAdapter {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn stream(
            &self,
            model: ModelId,
            request: &ProviderRequest,
            attachment: Option<&InlineImage>,
        ) -> Result<DeltaStream, ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push((model, request.clone(), attachment.cloned()));
            self.streams
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ProviderError::NotConfigured("no scripted stream".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingRepository {
        commits: Mutex<Vec<TurnCommit>>,
        failures: AtomicUsize,
    }

    impl RecordingRepository {
        fn failing(times: usize) -> Arc<Self> {
            let repo = Self::default();
            repo.failures.store(times, Ordering::SeqCst);
            Arc::new(repo)
        }

        fn commits(&self) -> Vec<TurnCommit> {
            self.commits.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatRepository for RecordingRepository {
        async fn load(&self, id: &ConversationId) -> Result<Conversation, PersistenceError> {
            Err(PersistenceError::NotFound(id.clone()))
        }

        async fn append_turn(
            &self,
            id: &ConversationId,
            commit: &TurnCommit,
        ) -> Result<ConversationId, PersistenceError> {
            self.commits.lock().unwrap().push(commit.clone());
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(PersistenceError::Rejected {
                    status: 500,
                    body: "{\"error\":\"write failed\"}".to_string(),
                });
            }
            Ok(id.clone())
        }
    }

    #[derive(Default)]
    struct CountingCache {
        invalidations: AtomicUsize,
    }

    impl ConversationCache for CountingCache {
        fn get(&self, _id: &ConversationId) -> Option<Conversation> {
            None
        }

        fn put(&self, _conversation: Conversation) {}

        fn invalidate(&self, _id: &ConversationId) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        states: Mutex<Vec<StreamState>>,
        phases: Mutex<Vec<TurnPhase>>,
        warnings: Mutex<Vec<TurnWarning>>,
        errors: Mutex<Vec<TurnError>>,
        notices: Mutex<Vec<String>>,
    }

    impl TurnObserver for RecordingObserver {
        fn on_state(&self, state: &StreamState) {
            self.states.lock().unwrap().push(state.clone());
        }

        fn on_phase(&self, phase: TurnPhase) {
            self.phases.lock().unwrap().push(phase);
        }

        fn on_warning(&self, warning: &TurnWarning) {
            self.warnings.lock().unwrap().push(warning.clone());
        }

        fn on_error(&self, error: &TurnError) {
            self.errors.lock().unwrap().push(error.clone());
        }

        fn on_blocking_notice(&self, message: &str) {
            self.notices.lock().unwrap().push(message.to_string());
        }
    }

    /// Content always just below the fold, so every pinned update scrolls.
    #[derive(Default)]
    struct RecordingViewPort {
        scrolls: AtomicUsize,
    }

    impl ViewPort for RecordingViewPort {
        fn metrics(&self) -> ViewportMetrics {
            ViewportMetrics::new(1050.0, 1000.0)
        }

        fn scroll_into_view(&self, _target: ScrollTarget) {
            self.scrolls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        controller: Arc<ChatTurnController>,
        openai: Arc<ScriptedAdapter>,
        gemini: Arc<ScriptedAdapter>,
        repo: Arc<RecordingRepository>,
        cache: Arc<CountingCache>,
        observer: Arc<RecordingObserver>,
        viewport: Arc<RecordingViewPort>,
    }

    fn harness_with(
        conversation: Conversation,
        repo: Arc<RecordingRepository>,
        params: StreamParams,
    ) -> Harness {
        let openai = ScriptedAdapter::new(ProviderKind::AssistantVocabulary);
        let gemini = ScriptedAdapter::new(ProviderKind::NativeVocabulary);
        let cache = Arc::new(CountingCache::default());
        let observer = Arc::new(RecordingObserver::default());
        let viewport = Arc::new(RecordingViewPort::default());

        let controller = ChatTurnController::new(
            conversation,
            ProviderSet::new(openai.clone(), gemini.clone()),
            PersistenceGate::new(repo.clone(), cache.clone()),
            params,
        )
        .with_viewport(viewport.clone())
        .with_observer(observer.clone());

        Harness {
            controller: Arc::new(controller),
            openai,
            gemini,
            repo,
            cache,
            observer,
            viewport,
        }
    }

    fn harness(conversation: Conversation) -> Harness {
        harness_with(
            conversation,
            Arc::new(RecordingRepository::default()),
            StreamParams::default(),
        )
    }

    fn conversation(model: ModelId, history: Vec<ConversationTurn>) -> Conversation {
        Conversation::new("c1", "u1", model).with_history(history)
    }

    fn answer(parts: &[&str]) -> Vec<StreamEvent> {
        let mut events: Vec<StreamEvent> = parts
            .iter()
            .map(|p| StreamEvent::Delta(p.to_string()))
            .collect();
        events.push(StreamEvent::Completed);
        events
    }

    fn ready_image() -> PendingAttachment {
        PendingAttachment::ready(
            StoredAsset {
                file_path: "/uploads/cat.png".to_string(),
                file_id: "f1".to_string(),
            },
            InlineImage {
                mime_type: "image/png".to_string(),
                data: "aGVsbG8=".to_string(),
            },
        )
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached");
    }

    // ==================== Happy Path ====================

    #[tokio::test]
    async fn test_submit_streams_and_commits() {
        let h = harness(conversation(
            ModelId::Gpt4o,
            vec![ConversationTurn::user("hi"), ConversationTurn::model("hello")],
        ));
        h.openai.push_events(answer(&["Hel", "lo", "", " world"]));

        let outcome = h.controller.submit("how are you?").await.unwrap();

        let TurnOutcome::Committed {
            answer,
            idempotency_key,
            partial,
            ..
        } = outcome
        else {
            panic!("expected a committed turn");
        };
        assert_eq!(answer, "Hello world");
        assert!(!partial);
        assert_eq!(idempotency_key.turn_sequence(), 2);

        let commits = h.repo.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].question.as_deref(), Some("how are you?"));
        assert_eq!(commits[0].answer, "Hello world");
        assert_eq!(commits[0].img, None);
        assert_eq!(h.cache.invalidations.load(Ordering::SeqCst), 1);

        assert_eq!(h.controller.phase(), TurnPhase::Idle);
        assert_eq!(h.controller.snapshot(), StreamState::default());
        let history = h.controller.conversation().history;
        assert_eq!(history.len(), 4);
        assert_eq!(history[3].first_text(), Some("Hello world"));

        assert_eq!(
            *h.observer.phases.lock().unwrap(),
            vec![
                TurnPhase::Submitting,
                TurnPhase::Streaming,
                TurnPhase::Persisting,
                TurnPhase::Idle
            ]
        );
        assert!(h.gemini.calls().is_empty());
    }

    #[tokio::test]
    async fn test_request_maps_history_with_system_prompt() {
        let h = harness(conversation(ModelId::Gpt4o, vec![]));
        h.openai.push_events(answer(&["ok"]));

        h.controller.submit("hi").await.unwrap();

        let calls = h.openai.calls();
        assert_eq!(calls.len(), 1);
        let ProviderRequest::Chat(request) = &calls[0].1 else {
            panic!("expected a chat request");
        };
        assert_eq!(
            request.messages,
            vec![
                ChatMessage::new(ChatRole::System, "You are a helpful assistant."),
                ChatMessage::new(ChatRole::User, "hi"),
            ]
        );
    }

    #[tokio::test]
    async fn test_observer_sees_growing_buffer_and_one_final_flush() {
        let h = harness(conversation(ModelId::Gpt4o, vec![]));
        h.openai.push_events(answer(&["Hel", "lo", "", " world"]));

        h.controller.submit("q").await.unwrap();

        let states = h.observer.states.lock().unwrap().clone();
        let answers: Vec<&str> = states.iter().map(|s| s.accumulated_answer.as_str()).collect();
        // submission, three deltas, final flush, settled
        assert_eq!(
            answers,
            vec!["", "Hel", "Hello", "Hello world", "Hello world", ""]
        );
        assert!(states[..5].iter().all(|s| s.is_streaming));
        // every pinned update scrolls: three deltas plus the flush
        assert_eq!(h.viewport.scrolls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_blank_submission_is_ignored() {
        let h = harness(conversation(ModelId::Gpt4o, vec![]));
        assert_eq!(
            h.controller.submit("   \n").await.unwrap(),
            TurnOutcome::Ignored
        );
        assert!(h.openai.calls().is_empty());
        assert!(h.observer.phases.lock().unwrap().is_empty());
    }

    // ==================== Guards ====================

    #[tokio::test]
    async fn test_unsupported_model_fails_before_streaming() {
        let h = harness(
            conversation(ModelId::Gpt4o, vec![ConversationTurn::user("hi")])
                .with_raw_model("unknown-id"),
        );

        let err = h.controller.submit("hello").await.unwrap_err();

        assert_eq!(err, TurnError::UnsupportedModel("unknown-id".to_string()));
        assert!(h.openai.calls().is_empty());
        assert!(h.gemini.calls().is_empty());
        assert!(!h.controller.snapshot().is_streaming);
        assert!(h.observer.states.lock().unwrap().is_empty());
        assert_eq!(h.observer.notices.lock().unwrap().len(), 1);
        assert!(h.observer.errors.lock().unwrap().is_empty());
        assert_eq!(h.controller.phase(), TurnPhase::Idle);
    }

    #[tokio::test]
    async fn test_malformed_history_fails_before_streaming() {
        let mut broken = ConversationTurn::user("x");
        broken.parts.clear();
        let h = harness(conversation(ModelId::Gpt4o, vec![broken]));

        let err = h.controller.submit("hello").await.unwrap_err();

        assert!(matches!(err, TurnError::Mapping(_)));
        assert!(h.openai.calls().is_empty());
        assert_eq!(h.observer.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_submission_while_streaming_is_rejected() {
        let h = harness(conversation(ModelId::Gpt4o, vec![]));
        let (tx, stream) = DeltaStream::channel(8);
        h.openai.push(stream);

        let controller = h.controller.clone();
        let first = tokio::spawn(async move { controller.submit("first").await });
        wait_until(|| h.controller.phase() == TurnPhase::Streaming).await;

        let err = h.controller.submit("second").await.unwrap_err();
        assert_eq!(err, TurnError::TurnInFlight);

        tx.send(StreamEvent::Delta("done".to_string())).await.unwrap();
        tx.send(StreamEvent::Completed).await.unwrap();
        let outcome = first.await.unwrap().unwrap();

        assert_eq!(outcome.answer(), Some("done"));
        assert_eq!(h.openai.calls().len(), 1);
        assert_eq!(h.repo.commits().len(), 1);
    }

    #[tokio::test]
    async fn test_loading_attachment_blocks_submission() {
        let h = harness(conversation(ModelId::GeminiFlash15, vec![]));
        h.controller.attach(PendingAttachment::loading());

        let err = h.controller.submit("look").await.unwrap_err();

        assert!(matches!(err, TurnError::AttachmentUpload(_)));
        assert!(h.gemini.calls().is_empty());

        h.controller.clear_attachment();
        h.gemini.push_events(answer(&["ok"]));
        assert!(h.controller.submit("look").await.is_ok());
    }

    // ==================== Attachments ====================

    #[tokio::test]
    async fn test_native_provider_receives_inline_image() {
        let h = harness(conversation(ModelId::GeminiFlash15, vec![]));
        h.controller.attach(ready_image());
        h.gemini.push_events(answer(&["a cat"]));

        h.controller.submit("what is this?").await.unwrap();

        let calls = h.gemini.calls();
        assert_eq!(calls[0].2.as_ref().map(|i| i.mime_type.as_str()), Some("image/png"));
        let commits = h.repo.commits();
        assert_eq!(commits[0].img.as_deref(), Some("/uploads/cat.png"));
        assert!(h.observer.warnings.lock().unwrap().is_empty());
        assert!(h.controller.attachment().is_none());

        let history = h.controller.conversation().history;
        assert_eq!(history[0].img.as_deref(), Some("/uploads/cat.png"));
    }

    #[tokio::test]
    async fn test_assistant_provider_warns_and_still_saves_image() {
        let h = harness(conversation(ModelId::Gpt4o, vec![]));
        h.controller.attach(ready_image());
        h.openai.push_events(answer(&["no eyes"]));

        h.controller.submit("what is this?").await.unwrap();

        assert_eq!(h.openai.calls()[0].2, None);
        assert_eq!(
            *h.observer.warnings.lock().unwrap(),
            vec![TurnWarning::AttachmentUnsupported {
                model: "gpt-4o".to_string()
            }]
        );
        assert_eq!(h.repo.commits()[0].img.as_deref(), Some("/uploads/cat.png"));
    }

    // ==================== Stream Failures ====================

    #[tokio::test]
    async fn test_stream_error_keeps_partial_answer_unsaved() {
        let h = harness(conversation(ModelId::Gpt4o, vec![]));
        h.openai.push_events(vec![
            StreamEvent::Delta("half an ".to_string()),
            StreamEvent::Error("connection reset".to_string()),
        ]);

        let err = h.controller.submit("q").await.unwrap_err();

        assert_eq!(err, TurnError::ProviderStream("connection reset".to_string()));
        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.accumulated_answer, "half an ");
        assert!(!snapshot.is_streaming);
        assert!(h.repo.commits().is_empty());
        assert_eq!(h.controller.phase(), TurnPhase::Idle);
        assert_eq!(h.observer.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_error_persists_partial_when_enabled() {
        let h = harness_with(
            conversation(ModelId::Gpt4o, vec![]),
            Arc::new(RecordingRepository::default()),
            StreamParams::default().with_persist_partial_answers(true),
        );
        h.openai.push_events(vec![
            StreamEvent::Delta("half an ".to_string()),
            StreamEvent::Error("connection reset".to_string()),
        ]);

        let outcome = h.controller.submit("q").await.unwrap();

        assert!(matches!(outcome, TurnOutcome::Committed { partial: true, .. }));
        assert_eq!(h.repo.commits()[0].answer, "half an ");
        assert_eq!(h.observer.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stalled_stream_times_out() {
        let h = harness_with(
            conversation(ModelId::Gpt4o, vec![]),
            Arc::new(RecordingRepository::default()),
            StreamParams::default().with_inactivity_timeout(Duration::from_millis(50)),
        );
        let (tx, stream) = DeltaStream::channel(8);
        let producer = stream.cancellation_token();
        tx.send(StreamEvent::Delta("thinking".to_string())).await.unwrap();
        h.openai.push(stream);

        let err = h.controller.submit("q").await.unwrap_err();

        assert_eq!(err, TurnError::StreamTimeout(Duration::from_millis(50)));
        assert!(producer.is_cancelled());
        assert_eq!(h.controller.snapshot().accumulated_answer, "thinking");
        assert!(!h.controller.snapshot().is_streaming);
        assert!(h.repo.commits().is_empty());
        drop(tx);
    }

    #[tokio::test]
    async fn test_provider_refusal_returns_to_idle() {
        let h = harness(conversation(ModelId::Gpt4o, vec![]));

        let err = h.controller.submit("q").await.unwrap_err();

        assert!(matches!(err, TurnError::ProviderStream(_)));
        assert_eq!(h.controller.phase(), TurnPhase::Idle);
        assert!(!h.controller.snapshot().is_streaming);
    }

    #[tokio::test]
    async fn test_cancel_stops_stream_and_ignores_late_deltas() {
        let h = harness(conversation(ModelId::Gpt4o, vec![]));
        let (tx, stream) = DeltaStream::channel(8);
        let producer = stream.cancellation_token();
        h.openai.push(stream);

        let controller = h.controller.clone();
        let turn = tokio::spawn(async move { controller.submit("q").await });
        wait_until(|| h.controller.phase() == TurnPhase::Streaming).await;

        tx.send(StreamEvent::Delta("early".to_string())).await.unwrap();
        wait_until(|| h.controller.snapshot().accumulated_answer == "early").await;
        let updates_before_cancel = h.observer.states.lock().unwrap().len();

        h.controller.cancel();
        let _ = tx.send(StreamEvent::Delta(" late".to_string())).await;

        let err = turn.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(producer.is_cancelled());
        assert_eq!(h.controller.snapshot().accumulated_answer, "early");
        assert_eq!(h.observer.states.lock().unwrap().len(), updates_before_cancel);
        assert!(h.observer.errors.lock().unwrap().is_empty());
        assert!(h.repo.commits().is_empty());
        assert_eq!(h.controller.phase(), TurnPhase::Idle);
    }

    // ==================== Scrolling ====================

    #[tokio::test]
    async fn test_user_scroll_suppresses_auto_scroll_until_next_submission() {
        let h = harness(conversation(ModelId::Gpt4o, vec![]));
        let (tx, stream) = DeltaStream::channel(8);
        h.openai.push(stream);

        let controller = h.controller.clone();
        let turn = tokio::spawn(async move { controller.submit("q").await });
        wait_until(|| h.controller.phase() == TurnPhase::Streaming).await;

        tx.send(StreamEvent::Delta("one".to_string())).await.unwrap();
        wait_until(|| h.controller.snapshot().accumulated_answer == "one").await;
        assert_eq!(h.viewport.scrolls.load(Ordering::SeqCst), 1);

        h.controller.on_scroll(ScrollOrigin::User);
        assert!(h.controller.snapshot().has_user_manually_scrolled);
        tx.send(StreamEvent::Delta(" two".to_string())).await.unwrap();
        tx.send(StreamEvent::Delta(" three".to_string())).await.unwrap();
        tx.send(StreamEvent::Completed).await.unwrap();
        turn.await.unwrap().unwrap();

        assert_eq!(h.viewport.scrolls.load(Ordering::SeqCst), 1);
        assert_eq!(h.controller.anchor_state(), AnchorState::ScrolledAway);

        h.openai.push_events(answer(&["next"]));
        h.controller.submit("again").await.unwrap();
        assert_eq!(h.controller.anchor_state(), AnchorState::PinnedToBottom);
        assert_eq!(h.viewport.scrolls.load(Ordering::SeqCst), 3);
    }

    // ==================== Persistence ====================

    #[tokio::test]
    async fn test_commit_failure_keeps_answer_and_skips_invalidation() {
        let h = harness_with(
            conversation(ModelId::Gpt4o, vec![]),
            RecordingRepository::failing(1),
            StreamParams::default(),
        );
        h.openai.push_events(answer(&["kept"]));

        let err = h.controller.submit("q").await.unwrap_err();

        assert!(matches!(err, TurnError::Persistence(PersistenceError::Rejected { .. })));
        let snapshot = h.controller.snapshot();
        assert_eq!(snapshot.accumulated_answer, "kept");
        assert_eq!(snapshot.pending_question.as_deref(), Some("q"));
        assert!(!snapshot.is_streaming);
        assert_eq!(h.cache.invalidations.load(Ordering::SeqCst), 0);
        assert!(h.controller.has_failed_commit());
        assert!(h.controller.conversation().history.is_empty());
    }

    #[tokio::test]
    async fn test_retry_commit_reuses_key() {
        let h = harness_with(
            conversation(ModelId::Gpt4o, vec![]),
            RecordingRepository::failing(1),
            StreamParams::default(),
        );
        h.openai.push_events(answer(&["kept"]));
        h.controller.submit("q").await.unwrap_err();

        let outcome = h.controller.retry_commit().await.unwrap();

        let commits = h.repo.commits();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].idempotency_key, commits[1].idempotency_key);
        assert_eq!(commits[0], commits[1]);
        assert_eq!(outcome.answer(), Some("kept"));
        assert_eq!(h.cache.invalidations.load(Ordering::SeqCst), 1);
        assert_eq!(h.controller.snapshot(), StreamState::default());
        assert_eq!(h.controller.conversation().history.len(), 2);
        assert_eq!(h.openai.calls().len(), 1);

        assert_eq!(
            h.controller.retry_commit().await.unwrap_err(),
            TurnError::NothingToRetry
        );
    }

    #[tokio::test]
    async fn test_turn_sequence_advances_per_turn() {
        let h = harness(conversation(ModelId::Gpt4o, vec![]));
        h.openai.push_events(answer(&["a"]));
        h.openai.push_events(answer(&["b"]));

        h.controller.submit("one").await.unwrap();
        h.controller.submit("two").await.unwrap();

        let commits = h.repo.commits();
        assert_ne!(commits[0].idempotency_key, commits[1].idempotency_key);
        assert_eq!(commits[0].idempotency_key.turn_sequence(), 0);
        assert_eq!(commits[1].idempotency_key.turn_sequence(), 2);
    }

    /// Chat store shared by several controllers, dropping repeated keys.
    struct SharedStore {
        conversation: Mutex<Conversation>,
        seen: Mutex<Vec<IdempotencyKey>>,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl ChatRepository for SharedStore {
        async fn load(&self, _id: &ConversationId) -> Result<Conversation, PersistenceError> {
            Ok(self.conversation.lock().unwrap().clone())
        }

        async fn append_turn(
            &self,
            id: &ConversationId,
            commit: &TurnCommit,
        ) -> Result<ConversationId, PersistenceError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(PersistenceError::ConnectionError("reset".to_string()));
            }
            let mut seen = self.seen.lock().unwrap();
            if !seen.contains(&commit.idempotency_key) {
                seen.push(commit.idempotency_key.clone());
                self.conversation.lock().unwrap().record_exchange(
                    commit.question.as_deref(),
                    &commit.answer,
                    commit.img.as_deref(),
                );
            }
            Ok(id.clone())
        }
    }

    fn session(
        store: &Arc<SharedStore>,
        conversation: Conversation,
    ) -> (ChatTurnController, Arc<ScriptedAdapter>) {
        let openai = ScriptedAdapter::new(ProviderKind::AssistantVocabulary);
        let gemini = ScriptedAdapter::new(ProviderKind::NativeVocabulary);
        let controller = ChatTurnController::new(
            conversation,
            ProviderSet::new(openai.clone(), gemini),
            PersistenceGate::new(store.clone(), Arc::new(CountingCache::default())),
            StreamParams::default(),
        );
        (controller, openai)
    }

    #[tokio::test]
    async fn test_abandoned_commits_do_not_collide_with_next_session() {
        let store = Arc::new(SharedStore {
            conversation: Mutex::new(conversation(
                ModelId::Gpt4o,
                vec![ConversationTurn::user("q0"), ConversationTurn::model("a0")],
            )),
            seen: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(2),
        });
        let id = ConversationId::new("c1");

        let (first, openai) = session(&store, store.load(&id).await.unwrap());
        for text in ["a1", "a2", "a3"] {
            openai.push_events(answer(&[text]));
        }
        assert!(first.submit("q1").await.is_err());
        assert!(first.submit("q2").await.is_err());
        first.submit("q3").await.unwrap();
        assert_eq!(store.load(&id).await.unwrap().history.len(), 4);

        let (second, openai) = session(&store, store.load(&id).await.unwrap());
        openai.push_events(answer(&["a4"]));
        let outcome = second.submit("q4 brand new").await.unwrap();

        let TurnOutcome::Committed { idempotency_key, .. } = outcome else {
            panic!("expected a committed turn");
        };
        assert_eq!(idempotency_key.turn_sequence(), 4);
        let history = store.load(&id).await.unwrap().history;
        assert_eq!(history.len(), 6);
        assert_eq!(history[4].first_text(), Some("q4 brand new"));
        assert_eq!(history[5].first_text(), Some("a4"));
    }

    // ==================== Bootstrap ====================

    #[tokio::test]
    async fn test_bootstrap_replays_first_message_once() {
        let h = harness(conversation(
            ModelId::Gpt4o,
            vec![ConversationTurn::user("hi")],
        ));
        h.openai.push_events(answer(&["Hello!"]));
        h.openai.push_events(answer(&["unexpected"]));

        let (a, b) = tokio::join!(h.controller.bootstrap(), h.controller.bootstrap());
        let third = h.controller.bootstrap().await.unwrap();

        let outcomes = [a.unwrap(), b.unwrap()];
        let committed = outcomes
            .iter()
            .filter(|o| matches!(o, TurnOutcome::Committed { .. }))
            .count();
        assert_eq!(committed, 1);
        assert_eq!(third, TurnOutcome::Ignored);
        assert_eq!(h.openai.calls().len(), 1);

        let ProviderRequest::Chat(request) = &h.openai.calls()[0].1 else {
            panic!("expected a chat request");
        };
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1], ChatMessage::new(ChatRole::User, "hi"));

        let commits = h.repo.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].question, None);
        assert_eq!(commits[0].answer, "Hello!");

        let history = h.controller.conversation().history;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].first_text(), Some("Hello!"));
    }

    #[tokio::test]
    async fn test_bootstrap_native_sends_stored_message() {
        let h = harness(conversation(
            ModelId::GeminiFlash15,
            vec![ConversationTurn::user("hi")],
        ));
        h.gemini.push_events(answer(&["Hello!"]));

        h.controller.bootstrap().await.unwrap();

        let ProviderRequest::Native(request) = &h.gemini.calls()[0].1 else {
            panic!("expected a native request");
        };
        assert!(request.history.is_empty());
        assert_eq!(request.message, "hi");
    }

    #[tokio::test]
    async fn test_bootstrap_skips_existing_conversations() {
        let h = harness(conversation(
            ModelId::Gpt4o,
            vec![ConversationTurn::user("hi"), ConversationTurn::model("hello")],
        ));

        assert_eq!(h.controller.bootstrap().await.unwrap(), TurnOutcome::Ignored);
        assert!(h.openai.calls().is_empty());
    }
}
