//! Ties every log line of an auction to the auction's id.
//!
//! Within one task a tracing span is enough, but an auction fans out into one
//! task per adapter and one task per hook. Instead of threading the id through
//! every signature it lives in task local storage and is copied into each
//! task spawned through [`spawn_with_current_id`].
use {std::future::Future, tokio::task::JoinHandle, tracing::Instrument};

tokio::task_local! {
    pub static AUCTION_ID: String;
}

/// Reads the auction id from this task's storage.
/// Returns `None` if the task local storage was not initialized.
pub fn current() -> Option<String> {
    AUCTION_ID.try_with(Clone::clone).ok()
}

/// Sets the task's auction id to `id` for the duration of `scope`.
pub async fn scope<F, R>(id: String, future: F) -> R
where
    F: Future<Output = R>,
{
    AUCTION_ID.scope(id, future).await
}

/// Spawns a new task that inherits the current auction id (if present) and
/// the current tracing span.
pub fn spawn_with_current_id<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let future = future.in_current_span();
    match current() {
        Some(id) => tokio::task::spawn(AUCTION_ID.scope(id, future)),
        None => tokio::task::spawn(future),
    }
}

/// Like [`spawn_with_current_id`] for blocking code: runs `f` on tokio's
/// blocking pool with the current auction id and tracing span.
pub fn spawn_blocking_with_current_id<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let span = tracing::Span::current();
    let id = current();
    tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        match id {
            Some(id) => AUCTION_ID.sync_scope(id, f),
            None => f(),
        }
    })
}
