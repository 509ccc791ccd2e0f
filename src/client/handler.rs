use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::Deserialize;

/// Named arguments bound to a handler once and passed on every call.
pub type HandlerArgs = HashMap<String, serde_json::Value>;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives each decoded payload of a subscription.
///
/// Closures of the shape `Fn(&str, &HandlerArgs) -> Result<(), HandlerError>`
/// implement this automatically.
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(&self, payload: &str, args: &HandlerArgs) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&str, &HandlerArgs) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    fn handle(&self, payload: &str, args: &HandlerArgs) -> Result<(), HandlerError> {
        self(payload, args)
    }
}

/// What a subscriber does when its handler fails or panics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerFaultPolicy {
    /// Log the fault and keep dispatching.
    #[default]
    Isolate,
    /// Log the fault and stop the subscriber.
    Terminate,
}

#[derive(Debug)]
pub enum HandlerFault {
    Failed(HandlerError),
    Panicked(String),
}

impl fmt::Display for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerFault::Failed(e) => write!(f, "handler returned an error: {e}"),
            HandlerFault::Panicked(msg) => write!(f, "handler panicked: {msg}"),
        }
    }
}

/// Runs the handler, turning both errors and panics into a `HandlerFault`.
pub(crate) fn invoke(
    handler: &dyn MessageHandler,
    payload: &str,
    args: &HandlerArgs,
) -> Result<(), HandlerFault> {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(payload, args))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(HandlerFault::Failed(e)),
        Err(panic) => Err(HandlerFault::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
