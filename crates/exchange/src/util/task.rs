use {
    crate::domain::time::Deadline,
    futures::FutureExt,
    std::{any::Any, future::Future, panic::AssertUnwindSafe},
    thiserror::Error,
    tokio::task::JoinHandle,
};

/// A panic that was caught at a task or call boundary.
#[derive(Debug, Clone, Error)]
#[error("panicked: {0}")]
pub struct Panic(pub String);

impl Panic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_owned());
        Self(message)
    }
}

/// Runs `f`, converting a panic into an error.
pub fn catch<T>(f: impl FnOnce() -> T) -> Result<T, Panic> {
    // Partner code may not be unwind safe. Whatever state it leaves behind is
    // owned by the failed call and dropped with it.
    std::panic::catch_unwind(AssertUnwindSafe(f)).map_err(Panic::from_payload)
}

/// Spawns `future` on its own task, inheriting the auction id and tracing
/// span. A panic inside the task is returned as an error instead of tearing
/// down the join.
pub fn spawn_isolated<F>(future: F) -> JoinHandle<Result<F::Output, Panic>>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    observe::request_id::spawn_with_current_id(async move {
        AssertUnwindSafe(future)
            .catch_unwind()
            .await
            .map_err(Panic::from_payload)
    })
}

/// Runs synchronous partner code on the blocking pool so a slow call can't
/// stall the task that waits for it. A panic is returned as an error.
pub fn spawn_blocking_isolated<T>(
    f: impl FnOnce() -> T + Send + 'static,
) -> JoinHandle<Result<T, Panic>>
where
    T: Send + 'static,
{
    observe::request_id::spawn_blocking_with_current_id(move || catch(f))
}

/// Runs `f` with [`spawn_blocking_isolated`] and waits for it without a
/// deadline. Callers bound the wait from the outside.
pub async fn blocking<T>(f: impl FnOnce() -> T + Send + 'static) -> Result<T, Panic>
where
    T: Send + 'static,
{
    match spawn_blocking_isolated(f).await {
        Ok(result) => result,
        Err(err) => Err(Panic(err.to_string())),
    }
}

#[derive(Debug)]
pub enum Joined<T> {
    Done(T),
    Panicked(Panic),
    TimedOut,
}

/// Waits for a task spawned with [`spawn_isolated`] until `deadline`.
///
/// A task still running at the deadline is detached: the handle is dropped,
/// the task keeps running in the background and its result is discarded.
pub async fn join_until<T>(handle: JoinHandle<Result<T, Panic>>, deadline: Deadline) -> Joined<T> {
    match tokio::time::timeout_at(deadline.instant(), handle).await {
        Ok(Ok(Ok(value))) => Joined::Done(value),
        Ok(Ok(Err(panic))) => Joined::Panicked(panic),
        // Only reachable if the runtime is shutting down and cancelled the
        // task.
        Ok(Err(err)) => Joined::Panicked(Panic(err.to_string())),
        Err(_) => Joined::TimedOut,
    }
}
