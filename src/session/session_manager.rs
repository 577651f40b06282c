//! Session Manager: dispatches inbound events and hosts the console loop

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::cli::Cli;
use crate::config::Config;
use crate::error::BridgeError;
use crate::notify::{Markup, Notifier, OutboundMessage};
use crate::ui::ConsoleRenderer;

use super::action_channel::{ActionChannel, BridgeAction, InboundEvent};
use super::command_router::{CommandRouter, InteractiveCommand};
use super::input_router::InputSource;
use super::registry::SessionRegistry;
use super::state::Session;
use super::supervisor::StopOutcome;
use super::{ChatId, UserId};

/// How long shutdown waits for a user's queued events to drain
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Manager state tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Starting,
    Running,
    ShuttingDown,
    Terminated,
}

/// Turns inbound events into session operations and user-facing replies
pub struct SessionDispatcher {
    registry: Arc<SessionRegistry>,
}

impl SessionDispatcher {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Handle one inbound event to completion
    pub async fn dispatch(&self, event: InboundEvent) {
        debug!(user_id = event.user_id, action = ?event.action, "dispatching event");

        let InboundEvent {
            user_id,
            chat_id,
            action,
        } = event;
        let session = self.registry.get_or_create(user_id, chat_id).await;

        match action {
            BridgeAction::Start => self.handle_start(&session, chat_id).await,
            BridgeAction::Stop => self.handle_stop(&session, chat_id).await,
            BridgeAction::Reset => self.handle_reset(&session, chat_id).await,
            BridgeAction::Status => self.handle_status(&session, chat_id).await,
            BridgeAction::ListSessions => self.handle_list(chat_id).await,
            BridgeAction::MenuChoice { code } => {
                self.handle_selection(&session, chat_id, &code, InputSource::MenuChoice)
                    .await
            }
            BridgeAction::MenuBack { code } => {
                self.handle_selection(&session, chat_id, &code, InputSource::MenuBack)
                    .await
            }
            BridgeAction::MenuCancel => {
                session.cancel_menu().await;
                self.reply(chat_id, "❌ Menu closed.");
            }
            BridgeAction::Text { text } => self.handle_text(&session, chat_id, &text).await,
        }
    }

    async fn handle_start(&self, session: &Arc<Session>, chat_id: ChatId) {
        match session.start().await {
            Ok(pid) => self.reply(chat_id, format!("▶️ Tool started (PID {}).", pid)),
            Err(BridgeError::AlreadyRunning) => {
                self.reply(chat_id, "⚠️ Tool is already running.")
            }
            Err(BridgeError::ToolNotFound(path)) => {
                warn!(user_id = session.user_id(), "Tool not found: {}", path.display());
                self.reply(chat_id, format!("❌ Tool file not found: {}", path.display()));
            }
            Err(e) => {
                error!(user_id = session.user_id(), "Failed to start tool: {}", e);
                self.reply(chat_id, format!("❌ Failed to start tool: {}", e));
            }
        }
    }

    async fn handle_stop(&self, session: &Session, chat_id: ChatId) {
        match session.stop().await {
            StopOutcome::Stopped => self.reply(chat_id, "🛑 Tool stopped."),
            StopOutcome::NotRunning => self.reply(chat_id, "ℹ️ No tool is running."),
        }
    }

    async fn handle_reset(&self, session: &Session, chat_id: ChatId) {
        session.reset().await;
        self.reply(chat_id, "♻️ Session reset.");
    }

    async fn handle_status(&self, session: &Session, chat_id: ChatId) {
        let status = session.status().await;

        let mut text = format!(
            "Status:\n- Running: {}\n- Awaiting input: {}",
            yes_no(status.running),
            yes_no(status.awaiting_input)
        );
        if let Some(prompt) = &status.prompt {
            text.push_str(&format!("\n- Prompt: {}", prompt));
        }
        if let Some(pid) = status.pid {
            text.push_str(&format!("\n- PID: {}", pid));
        }
        text.push_str(&format!(
            "\n- Flushes: {}\n- Auto-continues: {}\n- Inputs: {}",
            status.counters.flushes, status.counters.auto_continues, status.counters.inputs_routed
        ));

        self.reply(chat_id, text);
    }

    async fn handle_list(&self, chat_id: ChatId) {
        let summaries = self.registry.list().await;

        let text = if summaries.is_empty() {
            "📋 Sessions: none".to_string()
        } else {
            let lines: Vec<String> = summaries
                .iter()
                .map(|s| format!("{} - running={}", s.user_id, s.running))
                .collect();
            format!("📋 Sessions:\n{}", lines.join("\n"))
        };

        self.reply(chat_id, text);
    }

    async fn handle_selection(
        &self,
        session: &Session,
        chat_id: ChatId,
        code: &str,
        source: InputSource,
    ) {
        if !session.is_running().await {
            debug!(user_id = session.user_id(), code, "selection ignored, no tool running");
            return;
        }

        if let Err(e) = session.route_input(code, source).await {
            self.report_input_error(session, chat_id, e);
        }
    }

    async fn handle_text(&self, session: &Session, chat_id: ChatId, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        if !session.is_running().await {
            self.reply(chat_id, "❌ Tool is not running. Use /start to launch it.");
            return;
        }

        if let Err(e) = session.route_input(text, InputSource::Text).await {
            self.report_input_error(session, chat_id, e);
        }
    }

    fn report_input_error(&self, session: &Session, chat_id: ChatId, e: BridgeError) {
        match e {
            BridgeError::NotRunning => {
                self.reply(chat_id, "❌ Tool is not running. Use /start to launch it.")
            }
            e => {
                warn!(user_id = session.user_id(), "Failed to route input: {}", e);
                self.reply(chat_id, "❌ Failed to send input to the tool.");
            }
        }
    }

    /// Reply with the main controls attached
    fn reply(&self, chat_id: ChatId, text: impl Into<String>) {
        if let Err(e) = self
            .registry
            .notifier()
            .notify(chat_id, text, Some(Markup::Controls))
        {
            error!("Failed to deliver reply: {}", e);
        }
    }
}

/// Read console lines on a dedicated thread so a pending read never blocks exit
fn spawn_console_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (line_tx, line_rx) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to read console input: {}", e);
                        break;
                    }
                }
            }
        })
        .context("Failed to spawn console input thread")?;

    Ok(line_rx)
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Ordered event queue for one user
struct UserWorker {
    tx: mpsc::UnboundedSender<InboundEvent>,
    handle: JoinHandle<()>,
}

impl UserWorker {
    fn spawn(dispatcher: Arc<SessionDispatcher>, user_id: UserId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<InboundEvent>();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                dispatcher.dispatch(event).await;
            }
            debug!(user_id, "event worker finished");
        });
        Self { tx, handle }
    }
}

/// Main session manager hosting the console front end
pub struct SessionManager {
    /// Current state
    state: ManagerState,
    /// Event dispatcher shared with the per-user workers
    dispatcher: Arc<SessionDispatcher>,
    /// Inbound events from the console or an external adapter
    action_channel: ActionChannel,
    /// Outbound messages waiting to be rendered
    outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    /// Output renderer
    renderer: ConsoleRenderer,
    /// One worker per user keeps each user's events in order
    workers: HashMap<UserId, UserWorker>,
    /// Identity console input is sent as
    current_user: UserId,
}

impl SessionManager {
    /// Create a new SessionManager
    pub fn new(cli: &Cli, config: Config) -> Result<Self> {
        let (notifier, outbound_rx) = Notifier::channel(config.buffer.max_message_chars);
        let registry = Arc::new(SessionRegistry::from_config(config, notifier)?);

        Ok(Self {
            state: ManagerState::Starting,
            dispatcher: Arc::new(SessionDispatcher::new(registry)),
            action_channel: ActionChannel::new(),
            outbound_rx,
            renderer: ConsoleRenderer::new(cli.json),
            workers: HashMap::new(),
            current_user: cli.user,
        })
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.dispatcher.registry()
    }

    /// Print the welcome page and, in dry-run mode, the configuration summary
    pub fn display_welcome(&self, cli: &Cli) -> Result<()> {
        self.renderer.display_welcome_page(self.current_user)?;
        if cli.is_dry_run_mode() {
            self.renderer.display_dry_run(cli, self.registry().config())?;
        }
        Ok(())
    }

    /// Run the console loop until quit, end of input, or Ctrl+C
    pub async fn run(&mut self) -> Result<()> {
        info!(user_id = self.current_user, "Starting console session loop");
        self.state = ManagerState::Running;

        let mut lines = spawn_console_reader()?;
        let mut stdin_open = true;

        while self.state == ManagerState::Running {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C");
                    self.shutdown().await?;
                }

                line = lines.recv(), if stdin_open => match line {
                    Some(line) => self.handle_line(&line).await?,
                    None => {
                        info!("Console input closed");
                        stdin_open = false;
                        self.shutdown().await?;
                    }
                },

                Some(event) = self.action_channel.next_event() => {
                    self.route_event(event);
                }

                Some(message) = self.outbound_rx.recv() => {
                    self.renderer.render(&message)?;
                }
            }
        }

        info!("Session loop terminated");
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Result<()> {
        match CommandRouter::parse_interactive_command(line) {
            Ok(Some(command)) => self.handle_command(command).await,
            Ok(None) => Ok(()),
            Err(e) => self.renderer.display_error(&e.to_string()),
        }
    }

    /// Handle a console command
    async fn handle_command(&mut self, command: InteractiveCommand) -> Result<()> {
        debug!("Handling command: {:?}", command);

        match command {
            InteractiveCommand::Bridge(action) => {
                let user_id = self.current_user;
                self.action_channel.send_action(user_id, user_id, action)
            }
            InteractiveCommand::SwitchUser { user_id } => {
                info!(from = self.current_user, to = user_id, "switching console identity");
                self.current_user = user_id;
                self.renderer
                    .display_info(&format!("Now acting as user {}", user_id))
            }
            InteractiveCommand::WhoAmI => self
                .renderer
                .display_info(&format!("Acting as user {}", self.current_user)),
            InteractiveCommand::Help => self.renderer.display_help(CommandRouter::help_lines()),
            InteractiveCommand::Quit => self.shutdown().await,
        }
    }

    /// Queue an event on its user's worker
    fn route_event(&mut self, event: InboundEvent) {
        let user_id = event.user_id;
        let dispatcher = &self.dispatcher;
        let worker = self
            .workers
            .entry(user_id)
            .or_insert_with(|| UserWorker::spawn(Arc::clone(dispatcher), user_id));

        if let Err(e) = worker.tx.send(event) {
            error!(user_id, "Event worker is gone: {}", e);
        }
    }

    /// Graceful shutdown
    pub async fn shutdown(&mut self) -> Result<()> {
        if matches!(
            self.state,
            ManagerState::ShuttingDown | ManagerState::Terminated
        ) {
            return Ok(());
        }

        info!("Initiating graceful shutdown");
        self.state = ManagerState::ShuttingDown;

        // Events already queued by the console still get dispatched
        while let Some(event) = self.action_channel.try_next_event() {
            self.route_event(event);
        }

        for (user_id, worker) in self.workers.drain() {
            drop(worker.tx);
            let mut handle = worker.handle;
            if timeout(WORKER_DRAIN_TIMEOUT, &mut handle).await.is_err() {
                warn!(user_id, "Event worker did not drain in time, aborting");
                handle.abort();
            }
        }

        let stopped = self.registry().shutdown_all().await;
        info!(stopped, "Stopped running tools");

        while let Ok(message) = self.outbound_rx.try_recv() {
            self.renderer.render(&message)?;
        }

        self.state = ManagerState::Terminated;
        info!("Shutdown completed");
        Ok(())
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if self.state != ManagerState::Terminated && self.state != ManagerState::Starting {
            warn!("SessionManager dropped without proper shutdown");
        }
    }
}
