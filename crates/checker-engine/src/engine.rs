use std::sync::Arc;

use crate::config::EngineConfig;

/// The collaborators and tunables every engine operation runs against.
///
/// Cheap to clone; collaborators are reference-counted.
pub struct Engine<S, I, R> {
  pub(crate) store:    Arc<S>,
  pub(crate) indexer:  Arc<I>,
  pub(crate) reasoner: Arc<R>,
  pub(crate) config:   EngineConfig,
}

impl<S, I, R> Engine<S, I, R> {
  pub fn new(
    store: Arc<S>,
    indexer: Arc<I>,
    reasoner: Arc<R>,
    config: EngineConfig,
  ) -> Self {
    Self { store, indexer, reasoner, config }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn indexer(&self) -> &I { &self.indexer }

  pub fn reasoner(&self) -> &R { &self.reasoner }

  pub fn config(&self) -> &EngineConfig { &self.config }
}

impl<S, I, R> Clone for Engine<S, I, R> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      indexer:  Arc::clone(&self.indexer),
      reasoner: Arc::clone(&self.reasoner),
      config:   self.config.clone(),
    }
  }
}
