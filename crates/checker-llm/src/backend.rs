use std::future::Future;

use checker_core::Result;

/// Turns a prompt into the raw text of a completion.
///
/// Failures to reach the service, non-success statuses and timeouts are
/// [`checker_core::Error::Transport`]. Backends do not retry.
pub trait CompletionBackend: Send + Sync {
  fn complete<'a>(
    &'a self,
    prompt: &'a str,
  ) -> impl Future<Output = Result<String>> + Send + 'a;
}
