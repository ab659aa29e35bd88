//! The boundary between a stage and whatever produces its output.

use async_trait::async_trait;

use super::error::InvokeError;

/// Maps a stage's input string to its output string.
///
/// Implementations own every concern of the call itself: provider selection,
/// authentication, request formatting, timeouts. The pipeline only awaits the
/// result and never retries.
#[async_trait]
pub trait Invoke: Send + Sync {
    async fn invoke(&self, input: &str) -> Result<String, InvokeError>;

    /// Short description used when listing stages.
    fn describe(&self) -> String {
        "custom".to_string()
    }
}

/// Adapts a synchronous closure into an [`Invoke`] implementation.
pub struct FnInvoke<F>(F);

impl<F> FnInvoke<F>
where
    F: Fn(&str) -> Result<String, InvokeError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self(func)
    }
}

#[async_trait]
impl<F> Invoke for FnInvoke<F>
where
    F: Fn(&str) -> Result<String, InvokeError> + Send + Sync,
{
    async fn invoke(&self, input: &str) -> Result<String, InvokeError> {
        (self.0)(input)
    }

    fn describe(&self) -> String {
        "fn".to_string()
    }
}
