use std::future::Future;

use tracing::warn;

use crate::migrate::log::OutcomeLog;

/// Exit status after Ctrl-C, as a shell reports SIGINT.
pub const INTERRUPTED_EXIT: i32 = 130;

/// Drive `run` until it finishes or `shutdown` fires, then close `log`.
/// Returns `None` when interrupted.
pub async fn run_until_interrupted<F, S>(run: F, shutdown: S, log: &OutcomeLog) -> Option<F::Output>
where
    F: Future,
    S: Future,
{
    let finished = {
        // `run` may hold the log lock mid-append; it is dropped before closing
        tokio::pin!(run);
        tokio::select! {
            out = &mut run => Some(out),
            _ = shutdown => None,
        }
    };
    if finished.is_none() {
        warn!("interrupted; closing outcome log");
    }
    log.close().await;
    finished
}
