use {
    crate::domain::hooks::{Hook, HookResult, Invocation},
    std::{sync::Arc, time::Duration},
};

struct FnHook<F>(F);

#[async_trait::async_trait]
impl<P, F> Hook<P> for FnHook<F>
where
    P: Send + Sync + 'static,
    F: Fn(&Invocation, &P) -> anyhow::Result<HookResult<P>> + Send + Sync,
{
    async fn handle(
        &self,
        invocation: &Invocation,
        payload: Arc<P>,
    ) -> anyhow::Result<HookResult<P>> {
        (self.0)(invocation, payload.as_ref())
    }
}

struct Delayed<P: Send + Sync + 'static> {
    /// `None` never finishes.
    delay: Option<Duration>,
    inner: Arc<dyn Hook<P>>,
}

#[async_trait::async_trait]
impl<P: Send + Sync + 'static> Hook<P> for Delayed<P> {
    async fn handle(
        &self,
        invocation: &Invocation,
        payload: Arc<P>,
    ) -> anyhow::Result<HookResult<P>> {
        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => futures::future::pending().await,
        }
        self.inner.handle(invocation, payload).await
    }
}

/// A hook that answers right away.
pub fn hook<P, F>(f: F) -> Arc<dyn Hook<P>>
where
    P: Send + Sync + 'static,
    F: Fn(&Invocation, &P) -> anyhow::Result<HookResult<P>> + Send + Sync + 'static,
{
    Arc::new(FnHook(f))
}

pub fn slow<P: Send + Sync + 'static>(delay: Duration, inner: Arc<dyn Hook<P>>) -> Arc<dyn Hook<P>> {
    Arc::new(Delayed {
        delay: Some(delay),
        inner,
    })
}

pub fn hanging<P: Send + Sync + 'static>() -> Arc<dyn Hook<P>> {
    Arc::new(Delayed {
        delay: None,
        inner: noop(),
    })
}

pub fn noop<P: Send + Sync + 'static>() -> Arc<dyn Hook<P>> {
    hook(|_, _| Ok(HookResult::noop()))
}

pub fn rejecting<P: Send + Sync + 'static>(message: &'static str) -> Arc<dyn Hook<P>> {
    hook(move |_, _| Ok(HookResult::reject(message)))
}

pub fn failing<P: Send + Sync + 'static>() -> Arc<dyn Hook<P>> {
    hook(|_, _| Err(anyhow::anyhow!("module is misconfigured")))
}

pub fn panicking<P: Send + Sync + 'static>() -> Arc<dyn Hook<P>> {
    hook(|_, _| panic!("hook bug"))
}
