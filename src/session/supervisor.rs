//! Process supervision for a session's tool

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::{env, fs, io};

use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, timeout};
use tracing::{debug, info, warn};

use super::reader::reader_loop;
use super::scheduler::flush_loop;
use super::state::Session;
use crate::config::ToolConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::journal::JournalTag;

/// Result of a stop or reset request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

/// Background tasks attached to a running tool
pub(crate) struct SessionTasks {
    cancel: watch::Sender<bool>,
    reader: JoinHandle<()>,
    flusher: JoinHandle<()>,
}

/// Handles owned by the lifecycle lock
#[derive(Default)]
pub(crate) struct ProcessSlot {
    child: Option<Child>,
    pid: Option<u32>,
    tasks: Option<SessionTasks>,
}

impl ProcessSlot {
    /// A tool counts as running while its process is alive and its output is still being read
    pub(crate) fn is_running(&mut self) -> bool {
        let alive = match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        };
        let reading = self
            .tasks
            .as_ref()
            .is_some_and(|tasks| !tasks.reader.is_finished());

        alive && reading
    }

    pub(crate) fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn is_empty(&self) -> bool {
        self.child.is_none() && self.tasks.is_none()
    }
}

/// How the tool process is launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LaunchPlan {
    pub(crate) program: PathBuf,
    pub(crate) args: Vec<OsString>,
    pub(crate) working_dir: Option<PathBuf>,
    pub(crate) env: Vec<(OsString, OsString)>,
}

impl LaunchPlan {
    /// Resolve the configured tool, failing if its executable or entry point is missing
    pub(crate) fn resolve(tool: &ToolConfig) -> BridgeResult<Self> {
        let mut args: Vec<OsString> = tool.args.iter().map(OsString::from).collect();
        let program = PathBuf::from(&tool.program);

        let entry_dir = match &tool.entry_point {
            Some(entry) => {
                if !entry.exists() {
                    return Err(BridgeError::ToolNotFound(entry.clone()));
                }
                let entry = fs::canonicalize(entry)
                    .map_err(|_| BridgeError::ToolNotFound(entry.clone()))?;
                let dir = entry.parent().map(Path::to_path_buf);
                args.push(entry.into_os_string());
                dir
            }
            None => {
                if find_executable(&program).is_none() {
                    return Err(BridgeError::ToolNotFound(program));
                }
                None
            }
        };

        let mut env: Vec<(OsString, OsString)> = tool
            .env
            .iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v)))
            .collect();
        if let Some(search_path) = search_path_value(tool) {
            env.push((OsString::from(&tool.search_path_var), search_path));
        }

        Ok(Self {
            program,
            args,
            working_dir: tool.working_dir.clone().or(entry_dir),
            env,
        })
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

/// Attach one pipe to both stdout and stderr of `command` so arrival order is kept
#[cfg(unix)]
fn attach_merged_output(command: &mut Command) -> io::Result<tokio::net::unix::pipe::Receiver> {
    use std::os::fd::OwnedFd;

    let (reader, writer) = io::pipe()?;
    command.stdout(writer.try_clone()?).stderr(writer);
    tokio::net::unix::pipe::Receiver::from_owned_fd(OwnedFd::from(reader))
}

/// Locate a program: paths with a separator must be files, bare names are looked up on `PATH`
fn find_executable(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Existing search paths prepended to the current value of the search path variable
fn search_path_value(tool: &ToolConfig) -> Option<OsString> {
    let mut dirs: Vec<PathBuf> = tool
        .search_paths
        .iter()
        .filter(|dir| dir.exists())
        .cloned()
        .collect();
    if dirs.is_empty() {
        return None;
    }

    if let Some(current) = env::var_os(&tool.search_path_var) {
        dirs.extend(env::split_paths(&current));
    }

    match env::join_paths(dirs) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring search paths for {}: {}", tool.search_path_var, e);
            None
        }
    }
}

impl Session {
    /// Spawn the tool and its reader and flush tasks. Returns the child's PID.
    pub async fn start(self: &Arc<Self>) -> BridgeResult<u32> {
        let mut slot = self.lifecycle.lock().await;
        if slot.is_running() {
            return Err(BridgeError::AlreadyRunning);
        }

        let tool = &self.ctx.config.tool;
        let plan = LaunchPlan::resolve(tool)?;

        if !slot.is_empty() {
            debug!(user_id = self.user_id(), "reaping stale tool handles");
            self.teardown(&mut slot).await;
        }

        let mut command = plan.command();
        #[cfg(unix)]
        let output = attach_merged_output(&mut command).map_err(BridgeError::Spawn)?;
        #[cfg(not(unix))]
        command.stdout(Stdio::piped()).stderr(Stdio::null());

        let mut child = command.spawn().map_err(BridgeError::Spawn)?;
        // the parent's copies of the write end must close for end of output to be seen
        drop(command);
        let pid = child.id().unwrap_or_default();

        #[cfg(not(unix))]
        let output = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Spawn(io::Error::other("tool stdout not captured")))?;
        *self.input.lock().await = child.stdin.take();

        {
            let mut state = self.state.lock().await;
            state.clear_transient();
            state.stream_closed = false;
            state.last_output = Instant::now();
        }

        let (cancel, cancel_rx) = watch::channel(false);
        let reader = tokio::spawn(reader_loop(Arc::clone(self), output, cancel_rx.clone()));
        let flusher = tokio::spawn(flush_loop(Arc::clone(self), cancel_rx));

        slot.child = Some(child);
        slot.pid = Some(pid);
        slot.tasks = Some(SessionTasks {
            cancel,
            reader,
            flusher,
        });

        info!(user_id = self.user_id(), pid, program = %plan.program.display(), "tool started");
        self.journal(JournalTag::Info, &format!("tool started pid={}", pid));
        Ok(pid)
    }

    /// Terminate the tool if it is running
    pub async fn stop(&self) -> StopOutcome {
        let mut slot = self.lifecycle.lock().await;
        self.stop_locked(&mut slot).await
    }

    /// Stop the tool and forget all buffered output and prompt state
    pub async fn reset(&self) -> StopOutcome {
        let mut slot = self.lifecycle.lock().await;
        let outcome = self.stop_locked(&mut slot).await;

        self.state.lock().await.clear_transient();
        self.journal(JournalTag::Info, "session reset");
        info!(user_id = self.user_id(), "session reset");
        outcome
    }

    /// Whether the tool is currently running
    pub async fn is_running(&self) -> bool {
        self.lifecycle.lock().await.is_running()
    }

    async fn stop_locked(&self, slot: &mut ProcessSlot) -> StopOutcome {
        let was_running = slot.is_running();
        let pid = slot.pid;
        self.teardown(slot).await;

        if was_running {
            info!(user_id = self.user_id(), pid, "tool stopped");
            self.journal(JournalTag::Info, "tool stopped");
            StopOutcome::Stopped
        } else {
            debug!(user_id = self.user_id(), "stop requested with no tool running");
            StopOutcome::NotRunning
        }
    }

    /// Cancel the background tasks, close the input pipe and end the process
    async fn teardown(&self, slot: &mut ProcessSlot) {
        let grace = self.ctx.config.tool.stop_grace();

        if let Some(tasks) = slot.tasks.take() {
            let _ = tasks.cancel.send(true);
            join_task(tasks.reader, grace, "reader").await;
            join_task(tasks.flusher, grace, "flush scheduler").await;
        }

        *self.input.lock().await = None;

        if let Some(child) = slot.child.take() {
            terminate_child(child, grace, self.user_id()).await;
        }
        slot.pid = None;
    }
}

async fn join_task(mut handle: JoinHandle<()>, grace: Duration, name: &str) {
    match timeout(grace, &mut handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) if e.is_cancelled() => {}
        Ok(Err(e)) => warn!("{} task failed: {}", name, e),
        Err(_) => {
            warn!("{} task did not stop in time, aborting", name);
            handle.abort();
        }
    }
}

/// Ask the child to exit, then force it after the grace period
async fn terminate_child(mut child: Child, grace: Duration, user_id: i64) {
    if let Ok(Some(status)) = child.try_wait() {
        debug!(user_id, %status, "tool already exited");
        return;
    }

    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                warn!(user_id, pid, "Failed to send SIGTERM: {}", e);
            }

            match timeout(grace, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(user_id, pid, %status, "tool exited after SIGTERM");
                    return;
                }
                Ok(Err(e)) => warn!(user_id, pid, "Failed to wait for tool: {}", e),
                Err(_) => warn!(user_id, pid, "tool ignored SIGTERM, killing"),
            }
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    if let Err(e) = child.kill().await {
        warn!(user_id, "Failed to kill tool: {}", e);
    }
}
