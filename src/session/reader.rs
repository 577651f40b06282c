//! Reader task: pumps the tool's merged output into the session

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::state::Session;
use crate::journal::JournalTag;
use crate::notify::Markup;

/// Feed the tool's output into the session until it ends.
///
/// On end of output the leftover fragment is classified, everything buffered is
/// flushed, and the user gets a completion notice. A read error is reported once
/// and then handled like end of output. Cancellation skips all of that and
/// returns immediately.
pub(crate) async fn reader_loop<R>(
    session: Arc<Session>,
    mut output: R,
    mut cancel: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    let user_id = session.user_id();
    let chunk_size = session.ctx.config.buffer.read_chunk_size.max(1);
    let mut buf = vec![0u8; chunk_size];

    debug!(user_id, "reader started");

    loop {
        tokio::select! {
            _ = cancel.changed() => {
                debug!(user_id, "reader cancelled");
                return;
            }
            result = output.read(&mut buf) => match result {
                Ok(0) => break,
                Ok(n) => session.ingest(&buf[..n]).await,
                Err(e) => {
                    warn!(user_id, "Reader error: {}", e);
                    session.notify(format!("⚠️ Reader error: {}", e), None);
                    break;
                }
            },
        }
    }

    session.finish_stream().await;
    *session.input.lock().await = None;

    if let Err(e) = session.flush().await {
        warn!(user_id, "Final flush failed: {}", e);
    }

    info!(user_id, "tool output ended");
    session.journal(JournalTag::Info, "tool output ended");
    session.notify("🔚 Tool finished.", Some(Markup::Controls));
}
