// ============================================================================
// Message Handlers
// ============================================================================
//
// The user's business logic, as seen by the dedup layer. A handler has three
// possible outcomes and all three are data, not control flow:
//
// - Success  -> record becomes CONSUMED, message is acknowledged
// - Failure  -> record is deleted, message is redelivered from scratch
// - Fault    -> same cleanup as Failure, but carries the error for logging
//
// A panic inside the handler is caught and turned into a Fault so one bad
// message cannot take the worker down with it.
//
// ============================================================================

use std::future::Future;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use dedup_metrics::HANDLER_DURATION_SECONDS;
use dedup_types::Message;
use futures_util::FutureExt;

/// Result of running a handler on one message
#[derive(Debug)]
pub enum HandlerOutcome {
    Success,
    Failure,
    Fault(anyhow::Error),
}

impl HandlerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, HandlerOutcome::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerOutcome::Success => "success",
            HandlerOutcome::Failure => "failure",
            HandlerOutcome::Fault(_) => "fault",
        }
    }
}

impl From<bool> for HandlerOutcome {
    fn from(success: bool) -> Self {
        if success {
            HandlerOutcome::Success
        } else {
            HandlerOutcome::Failure
        }
    }
}

impl From<anyhow::Result<bool>> for HandlerOutcome {
    fn from(result: anyhow::Result<bool>) -> Self {
        match result {
            Ok(success) => success.into(),
            Err(e) => HandlerOutcome::Fault(e),
        }
    }
}

impl From<anyhow::Result<()>> for HandlerOutcome {
    fn from(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => HandlerOutcome::Success,
            Err(e) => HandlerOutcome::Fault(e),
        }
    }
}

/// Business logic invoked once per message
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &Message) -> HandlerOutcome;
}

/// Adapter turning a closure into a [`MessageHandler`]
///
/// The closure's future must own what it needs from the message:
///
/// ```
/// use dedup_consumer::handler_fn;
///
/// let handler = handler_fn(|msg: &dedup_consumer::Message| {
///     let body = msg.body_str();
///     async move { !body.is_empty() }
/// });
/// ```
pub struct FnHandler<F>(F);

pub fn handler_fn<F, Fut, R>(f: F) -> FnHandler<F>
where
    F: Fn(&Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Into<HandlerOutcome> + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut, R> MessageHandler for FnHandler<F>
where
    F: Fn(&Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Into<HandlerOutcome> + 'static,
{
    async fn handle(&self, message: &Message) -> HandlerOutcome {
        (self.0)(message).await.into()
    }
}

/// Run `handler` on `message`, converting a panic into [`HandlerOutcome::Fault`]
pub async fn invoke(handler: &dyn MessageHandler, message: &Message) -> HandlerOutcome {
    let timer = HANDLER_DURATION_SECONDS.start_timer();
    let outcome = match AssertUnwindSafe(handler.handle(message)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            HandlerOutcome::Fault(anyhow::anyhow!("handler panicked: {}", reason))
        }
    };
    timer.observe_duration();
    outcome
}
