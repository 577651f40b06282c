//! Idle flush scheduler

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::state::Session;

/// Periodically flush buffered output once the tool has gone quiet.
///
/// Exits when cancelled or when the reader has seen the end of the output; the
/// reader performs the last flush itself.
pub(crate) async fn flush_loop(session: Arc<Session>, mut cancel: watch::Receiver<bool>) {
    let user_id = session.user_id();
    let interval = session.ctx.config.buffer.poll_interval();
    let idle = session.ctx.config.buffer.flush_idle();

    loop {
        tokio::select! {
            _ = cancel.changed() => {
                debug!(user_id, "flush scheduler cancelled");
                return;
            }
            _ = sleep(interval) => {}
        }

        if session.stream_closed().await {
            debug!(user_id, "flush scheduler exiting after end of output");
            return;
        }

        match session.flush_if_idle(idle).await {
            Ok(true) => debug!(user_id, "idle flush"),
            Ok(false) => {}
            Err(e) => warn!(user_id, "Idle flush failed: {}", e),
        }
    }
}
