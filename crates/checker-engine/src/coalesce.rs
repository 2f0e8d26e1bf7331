//! Request coalescing keyed by an arbitrary identity.

use std::{
  collections::HashMap,
  hash::Hash,
  sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::{task::JoinError, time::Instant};

struct Run<T, E> {
  started: Instant,
  /// Set by the spawned task once its work has finished.
  done:    Arc<AtomicBool>,
  result:  Shared<BoxFuture<'static, Result<T, E>>>,
}

impl<T: Clone, E: Clone> Run<T, E> {
  fn settled(&self) -> bool {
    self.done.load(Ordering::Acquire) || self.result.peek().is_some()
  }

  /// Whether a caller at `now` takes this run's result instead of starting
  /// its own: the run is still in flight, or it started within the window.
  /// Successes and failures are held alike.
  fn joinable(&self, now: Instant, window: Duration) -> bool {
    !self.settled() || now.duration_since(self.started) < window
  }
}

/// Collapses concurrent calls for the same key onto one shared run, and
/// throttles new runs per key to one per `window`.
///
/// Runs are spawned onto the runtime, so a run finishes even when every
/// caller awaiting it has gone away. Entries are only dropped from the map
/// once their run has settled and the window has passed.
pub struct Coalescer<K, T, E> {
  window: Duration,
  /// Turns a run that panicked or was cancelled into an error.
  lost:   fn(JoinError) -> E,
  runs:   Mutex<HashMap<K, Run<T, E>>>,
}

impl<K, T, E> Coalescer<K, T, E>
where
  K: Eq + Hash,
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  pub fn new(window: Duration, lost: fn(JoinError) -> E) -> Self {
    Self { window, lost, runs: Mutex::new(HashMap::new()) }
  }

  /// Await the run for `key`, starting one with `start` if no joinable run
  /// exists.
  pub async fn run<F>(&self, key: K, start: F) -> Result<T, E>
  where
    F: FnOnce() -> BoxFuture<'static, Result<T, E>>,
  {
    let result = {
      let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
      let now = Instant::now();
      runs.retain(|_, run| run.joinable(now, self.window));

      match runs.get(&key) {
        Some(run) => run.result.clone(),
        None => {
          let done = Arc::new(AtomicBool::new(false));
          let flag = Arc::clone(&done);
          let work = start();
          let task = tokio::spawn(async move {
            let result = work.await;
            flag.store(true, Ordering::Release);
            result
          });

          let lost = self.lost;
          let result = async move { task.await.unwrap_or_else(|e| Err(lost(e))) }
            .boxed()
            .shared();
          runs.insert(key, Run { started: now, done, result: result.clone() });
          result
        }
      }
    };
    result.await
  }

  /// Number of tracked runs, settled or not.
  pub fn len(&self) -> usize {
    self.runs.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}
