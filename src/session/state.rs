//! Session state: buffered output, prompt tracking and flushing

use std::sync::Arc;

use tokio::process::ChildStdin;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

use super::registry::SessionContext;
use super::supervisor::ProcessSlot;
use super::{ChatId, UserId};
use crate::error::DeliveryError;
use crate::journal::JournalTag;
use crate::menu::MenuEntry;
use crate::notify::Markup;
use crate::output::OutputBuffer;
use crate::stream::{LineSegmenter, Segment, Unit};

/// Whether the tool is believed to be waiting for the user
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InputState {
    #[default]
    Idle,
    AwaitingInput { prompt: String, since: Instant },
}

impl InputState {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, InputState::AwaitingInput { .. })
    }

    pub fn prompt(&self) -> Option<&str> {
        match self {
            InputState::AwaitingInput { prompt, .. } => Some(prompt),
            InputState::Idle => None,
        }
    }
}

/// Running totals reported by `status`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    pub flushes: u64,
    pub auto_continues: u64,
    pub inputs_routed: u64,
}

/// Everything the reader, the scheduler and the input router share
#[derive(Debug)]
pub(crate) struct OutputState {
    pub(crate) segmenter: LineSegmenter,
    pub(crate) buffer: OutputBuffer,
    pub(crate) last_output: Instant,
    pub(crate) input_state: InputState,
    /// Set once the reader has seen the end of the tool's output.
    pub(crate) stream_closed: bool,
    pub(crate) counters: SessionCounters,
}

impl OutputState {
    fn new() -> Self {
        Self {
            segmenter: LineSegmenter::new(),
            buffer: OutputBuffer::new(),
            last_output: Instant::now(),
            input_state: InputState::Idle,
            stream_closed: false,
            counters: SessionCounters::default(),
        }
    }

    /// Forget all transient output and prompt bookkeeping
    pub(crate) fn clear_transient(&mut self) {
        self.segmenter.clear();
        self.buffer.clear();
        self.input_state = InputState::Idle;
    }
}

/// Side effects of applying segments that must run without the state lock
#[derive(Debug, Default)]
struct Applied {
    continues: usize,
    records: Vec<(JournalTag, String)>,
}

impl Applied {
    fn record(&mut self, tag: JournalTag, message: String) {
        self.records.push((tag, message));
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub user_id: UserId,
    pub running: bool,
    pub pid: Option<u32>,
    pub awaiting_input: bool,
    pub prompt: Option<String>,
    pub buffered_lines: usize,
    pub menu_entries: usize,
    pub counters: SessionCounters,
}

/// One user's bridge to one tool process.
///
/// The lifecycle lock guards process handles, the state lock guards buffered
/// output, and the send lock serializes flushes. None of them is shared with any
/// other session.
pub struct Session {
    user_id: UserId,
    chat_id: ChatId,
    pub(crate) ctx: Arc<SessionContext>,
    pub(crate) lifecycle: Mutex<ProcessSlot>,
    pub(crate) input: Mutex<Option<ChildStdin>>,
    pub(crate) state: Mutex<OutputState>,
    send_lock: Mutex<()>,
}

impl Session {
    pub fn new(user_id: UserId, chat_id: ChatId, ctx: Arc<SessionContext>) -> Self {
        Self {
            user_id,
            chat_id,
            ctx,
            lifecycle: Mutex::new(ProcessSlot::default()),
            input: Mutex::new(None),
            state: Mutex::new(OutputState::new()),
            send_lock: Mutex::new(()),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// Snapshot of the session for status and listing
    pub async fn status(&self) -> SessionStatus {
        let (running, pid) = {
            let mut slot = self.lifecycle.lock().await;
            (slot.is_running(), slot.pid())
        };
        let state = self.state.lock().await;

        SessionStatus {
            user_id: self.user_id,
            running,
            pid: if running { pid } else { None },
            awaiting_input: state.input_state.is_awaiting(),
            prompt: state.input_state.prompt().map(str::to_string),
            buffered_lines: state.buffer.lines().len(),
            menu_entries: state.buffer.menu().len(),
            counters: state.counters,
        }
    }

    pub async fn input_state(&self) -> InputState {
        self.state.lock().await.input_state.clone()
    }

    /// Plain lines buffered since the last flush
    pub async fn buffered_lines(&self) -> Vec<String> {
        self.state.lock().await.buffer.lines().to_vec()
    }

    /// Menu entries buffered since the last flush
    pub async fn menu_entries(&self) -> Vec<MenuEntry> {
        self.state.lock().await.buffer.menu().to_vec()
    }

    /// Text received after the last line terminator
    pub async fn pending_fragment(&self) -> String {
        self.state.lock().await.segmenter.pending().to_string()
    }

    /// Feed a chunk of raw tool output through segmentation and classification
    pub async fn ingest(&self, bytes: &[u8]) {
        let applied = {
            let mut state = self.state.lock().await;
            state.last_output = Instant::now();
            let segments = state
                .segmenter
                .push(bytes, self.ctx.classifier.as_ref());
            self.apply_segments(&mut state, segments)
        };

        self.finish_apply(applied).await;
    }

    /// Classify whatever is left after the tool's output has ended
    pub async fn finish_stream(&self) {
        let applied = {
            let mut state = self.state.lock().await;
            state.stream_closed = true;
            let segments: Vec<Segment> = state.segmenter.finish().into_iter().collect();
            self.apply_segments(&mut state, segments)
        };

        self.finish_apply(applied).await;
    }

    pub(crate) async fn stream_closed(&self) -> bool {
        self.state.lock().await.stream_closed
    }

    /// Apply segments in arrival order. Journal records are collected for
    /// writing once the state lock is released.
    fn apply_segments(&self, state: &mut OutputState, segments: Vec<Segment>) -> Applied {
        let mut applied = Applied::default();

        for segment in segments {
            let unit = self
                .ctx
                .classifier
                .classify(&segment.text, segment.partial);

            match unit {
                Unit::ControlContinue => {
                    state.input_state = InputState::Idle;
                    applied.continues += 1;
                }
                Unit::MenuEntry(entry) => {
                    applied.record(
                        JournalTag::Menu,
                        format!("{} -> {}", entry.code, entry.label),
                    );
                    state.buffer.push_menu_entry(entry);
                    state.input_state = InputState::Idle;
                }
                Unit::PlainOutput(line) => {
                    applied.record(JournalTag::Output, line.clone());
                    state.buffer.push_line(line);
                    state.last_output = Instant::now();
                    state.input_state = InputState::Idle;
                }
                Unit::Prompt(line) => {
                    applied.record(JournalTag::Output, line.clone());
                    applied.record(JournalTag::Prompt, format!("detected: {}", line));
                    debug!(user_id = self.user_id, prompt = %line, "prompt detected");
                    state.buffer.push_line(line.clone());
                    let now = Instant::now();
                    state.last_output = now;
                    state.input_state = InputState::AwaitingInput {
                        prompt: line,
                        since: now,
                    };
                }
            }
        }

        applied
    }

    /// Write the collected journal records, then answer any continue lines
    async fn finish_apply(&self, applied: Applied) {
        for (tag, message) in &applied.records {
            self.journal(*tag, message);
        }
        for _ in 0..applied.continues {
            self.auto_continue().await;
        }
    }

    /// Answer a "press enter to continue" line
    async fn auto_continue(&self) {
        match self.write_input(b"\n").await {
            Ok(()) => {
                self.state.lock().await.counters.auto_continues += 1;
                self.journal(JournalTag::AutoContinue, "sent Enter");
            }
            Err(e) => {
                warn!(user_id = self.user_id, "Failed to auto-continue: {}", e);
            }
        }
    }

    /// Flush buffered output if the tool has been quiet for at least `idle`
    pub async fn flush_if_idle(&self, idle: Duration) -> Result<bool, DeliveryError> {
        {
            let state = self.state.lock().await;
            if state.buffer.is_empty() || state.last_output.elapsed() < idle {
                return Ok(false);
            }
        }
        self.flush().await
    }

    /// Drain buffered lines and menu entries and deliver them as one message.
    ///
    /// Returns `Ok(false)` when there was nothing to send.
    pub async fn flush(&self) -> Result<bool, DeliveryError> {
        let _guard = self.send_lock.lock().await;

        let message = {
            let mut state = self.state.lock().await;
            let message = state.buffer.drain();
            if message.is_some() {
                state.counters.flushes += 1;
            }
            message
        };

        let Some(message) = message else {
            return Ok(false);
        };

        let with_menu = message.markup.is_some();
        let len = message.text.chars().count();
        let markup = message.markup.map(Markup::Menu);

        self.ctx
            .notifier
            .send_long(self.chat_id, &message.text, markup)?;

        if with_menu {
            self.journal(JournalTag::Send, &format!("sent combined (menu) len={}", len));
        } else {
            self.journal(JournalTag::Send, &format!("sent combined text len={}", len));
        }

        Ok(true)
    }

    /// Clear the menu without touching the process
    pub async fn cancel_menu(&self) {
        let mut state = self.state.lock().await;
        state.buffer.clear_menu();
        state.input_state = InputState::Idle;
    }

    /// Queue a notice for this session's chat, logging delivery failures
    pub fn notify(&self, text: impl Into<String>, markup: Option<Markup>) {
        if let Err(e) = self.ctx.notifier.notify(self.chat_id, text, markup) {
            warn!(user_id = self.user_id, "Failed to deliver notice: {}", e);
        }
    }

    pub(crate) fn journal(&self, tag: JournalTag, message: &str) {
        self.ctx.journal.record(self.user_id, tag, message);
    }
}
