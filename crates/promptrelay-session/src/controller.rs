//! Conversation state controller
//!
//! Holds the active prompt, prior prompts and the in-progress response,
//! and publishes display snapshots as streamed chunks arrive.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

use promptrelay_client::{ChatClient, ClientError};

use crate::format::format_for_display;

/// Shown when a response stream ends without producing anything.
const GENERIC_FAILURE: &str = "An error occurred. Please try again.";

/// Lifecycle of one dispatched prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Pending,
    Streaming,
    Completed,
    Failed,
}

/// One dispatched prompt and its accumulating response.
///
/// `accumulated` only ever grows; chunks append, never replace.
#[derive(Debug, Clone)]
pub struct StreamSession {
    pub request_id: Uuid,
    pub prompt: String,
    pub accumulated: String,
    pub phase: SessionPhase,
    pub created_at: DateTime<Utc>,
}

impl StreamSession {
    fn new(prompt: String) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            prompt,
            accumulated: String::new(),
            phase: SessionPhase::Pending,
            created_at: Utc::now(),
        }
    }
}

/// Submission state machine as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayPhase {
    #[default]
    Idle,
    Sending,
    Streaming,
    Done,
    Failed,
}

/// Immutable view of the conversation published to the UI layer.
#[derive(Debug, Clone, Default)]
pub struct DisplaySnapshot {
    pub phase: DisplayPhase,
    pub loading: bool,
    pub show_result: bool,
    pub recent_prompt: String,
    pub prev_prompts: Vec<String>,
    pub formatted_output: String,
}

#[derive(Debug, Default)]
struct ConversationState {
    input: String,
    recent_prompt: String,
    prev_prompts: Vec<String>,
    session: Option<StreamSession>,
    // Bumped on every dispatch; chunks tagged with an older value are
    // stale and must not touch display state.
    generation: u64,
    loading: bool,
    show_result: bool,
}

impl ConversationState {
    fn snapshot(&self) -> DisplaySnapshot {
        let (phase, formatted_output) = match &self.session {
            None => (DisplayPhase::Idle, String::new()),
            Some(session) => match session.phase {
                SessionPhase::Pending => (DisplayPhase::Sending, String::new()),
                SessionPhase::Streaming => (
                    DisplayPhase::Streaming,
                    format_for_display(&session.accumulated),
                ),
                SessionPhase::Completed => (
                    DisplayPhase::Done,
                    format_for_display(&session.accumulated),
                ),
                SessionPhase::Failed => (DisplayPhase::Failed, GENERIC_FAILURE.to_string()),
            },
        };

        DisplaySnapshot {
            phase,
            loading: self.loading,
            show_result: self.show_result,
            recent_prompt: self.recent_prompt.clone(),
            prev_prompts: self.prev_prompts.clone(),
            formatted_output,
        }
    }
}

/// Drives one conversation: owns the chat client, the history and the
/// active [`StreamSession`], and publishes [`DisplaySnapshot`]s through a
/// watch channel.
///
/// A newer `send` supersedes an in-flight one: each dispatch is tagged
/// with a generation, and chunks from older generations are discarded.
pub struct ConversationController {
    client: Arc<ChatClient>,
    state: Mutex<ConversationState>,
    updates: watch::Sender<DisplaySnapshot>,
}

impl ConversationController {
    pub fn new(client: Arc<ChatClient>) -> Self {
        let (updates, _) = watch::channel(DisplaySnapshot::default());
        Self {
            client,
            state: Mutex::new(ConversationState::default()),
            updates,
        }
    }

    /// Subscribe to display updates.
    pub fn subscribe(&self) -> watch::Receiver<DisplaySnapshot> {
        self.updates.subscribe()
    }

    /// Current display state, for direct reads.
    pub fn snapshot(&self) -> DisplaySnapshot {
        self.state.lock().snapshot()
    }

    pub fn set_input(&self, input: impl Into<String>) {
        self.state.lock().input = input.into();
    }

    pub fn input(&self) -> String {
        self.state.lock().input.clone()
    }

    pub fn history(&self) -> Vec<String> {
        self.state.lock().prev_prompts.clone()
    }

    /// Submit a prompt and stream its response into the display state.
    ///
    /// With an explicit prompt (a replay from history) the prompt is
    /// recorded as the active one but not appended to history again.
    /// With `None`, the buffered input is trimmed and used; an empty
    /// input is a no-op, otherwise it joins the history once the client
    /// has admitted the dispatch, so throttled or rejected submissions
    /// never enter history.
    pub async fn send(&self, explicit: Option<&str>) {
        let from_input = explicit.is_none();
        let prompt = match explicit {
            Some(prompt) => prompt.trim().to_string(),
            None => self.state.lock().input.trim().to_string(),
        };
        if prompt.is_empty() {
            return;
        }

        let mut stream = match self.client.begin_stream(&prompt) {
            Ok(stream) => stream,
            Err(e) => {
                self.display_rejection(&prompt, &e);
                return;
            }
        };

        let generation = self.begin(&prompt, from_input);
        self.publish();

        let mut received_any = false;

        while let Some(chunk) = stream.next().await {
            if !self.apply_chunk(generation, &chunk) {
                tracing::debug!(generation, "dropping chunk from superseded stream");
                return;
            }
            received_any = true;
            self.publish();
        }

        self.finish(generation, received_any);
    }

    /// Reset to an empty conversation.
    pub fn new_chat(&self) {
        {
            let mut state = self.state.lock();
            state.generation += 1;
            state.session = None;
            state.prev_prompts.clear();
            state.recent_prompt.clear();
            state.input.clear();
            state.loading = false;
            state.show_result = false;
        }
        self.publish();
    }

    /// Open a new session for an admitted dispatch, superseding any
    /// in-flight one, and return its generation tag.
    fn begin(&self, prompt: &str, from_input: bool) -> u64 {
        let mut state = self.state.lock();
        if from_input {
            state.prev_prompts.push(prompt.to_string());
        }
        state.recent_prompt = prompt.to_string();
        state.generation += 1;
        state.loading = true;
        state.show_result = true;
        state.session = Some(StreamSession::new(prompt.to_string()));
        state.generation
    }

    /// Show a pre-dispatch rejection (empty prompt, throttle cooldown).
    /// History is untouched; the rejection still takes over the display,
    /// so any in-flight stream is superseded.
    fn display_rejection(&self, prompt: &str, error: &ClientError) {
        tracing::debug!(error = %error, "submission rejected before dispatch");
        {
            let mut state = self.state.lock();
            state.generation += 1;
            state.recent_prompt = prompt.to_string();
            state.show_result = true;
            state.loading = false;
            let mut session = StreamSession::new(prompt.to_string());
            session.accumulated = error.to_diagnostic();
            session.phase = SessionPhase::Completed;
            state.session = Some(session);
        }
        self.publish();
    }

    /// Append a chunk if its generation is still current.
    fn apply_chunk(&self, generation: u64, chunk: &str) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        let Some(session) = state.session.as_mut() else {
            return false;
        };
        session.accumulated.push_str(chunk);
        session.phase = SessionPhase::Streaming;
        true
    }

    fn finish(&self, generation: u64, received_any: bool) {
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            if let Some(session) = state.session.as_mut() {
                session.phase = if received_any {
                    SessionPhase::Completed
                } else {
                    // The wrapper always yields at least one chunk, even
                    // for failures, so an empty stream means the producer
                    // was torn down.
                    SessionPhase::Failed
                };
            }
            state.loading = false;
            state.input.clear();
        }
        self.publish();
    }

    fn publish(&self) {
        let snapshot = self.state.lock().snapshot();
        self.updates.send_replace(snapshot);
    }
}
