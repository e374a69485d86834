// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use futures::stream::{self, Stream, StreamExt};
use parking_lot::Mutex;
use sluice::{AbortReason, AttachmentId, AttachmentRegistry, KillSwitchHandler};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc, Weak,
};
use std::time::Duration;
use tracing::Level;

// --- Sources ---

/// Emits 1, 2, 3, 4. The first element comes after `initial_delay`, each
/// following one a second after its predecessor.
pub fn delayed_counting_source(initial_delay: Duration) -> impl Stream<Item = u32> + Send + 'static {
  stream::iter(1..=4u32).then(move |n| async move {
    let wait = if n == 1 { initial_delay } else { Duration::from_secs(1) };
    if !wait.is_zero() {
      tokio::time::sleep(wait).await;
    }
    tracing::debug!(target: "test_sources", element = n, "emitting");
    n
  })
}

/// A finite, immediate source that counts how many elements were pulled from it.
pub fn pull_counting_source(
  items: Vec<u32>,
  pulls: Arc<AtomicUsize>,
) -> impl Stream<Item = u32> + Send + 'static {
  stream::iter(items).inspect(move |_| {
    pulls.fetch_add(1, Ordering::SeqCst);
  })
}

// --- Handlers for driving the registry without a stream ---

/// Records every stop effect it receives.
#[derive(Default)]
pub struct RecordingHandler {
  pub graceful: AtomicUsize,
  pub abrupt: AtomicUsize,
  pub reasons: Mutex<Vec<AbortReason>>,
}

impl RecordingHandler {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn graceful_count(&self) -> usize {
    self.graceful.load(Ordering::SeqCst)
  }

  pub fn abrupt_count(&self) -> usize {
    self.abrupt.load(Ordering::SeqCst)
  }

  pub fn total(&self) -> usize {
    self.graceful_count() + self.abrupt_count()
  }
}

impl KillSwitchHandler<AbortReason> for RecordingHandler {
  fn on_graceful_stop(&self) {
    self.graceful.fetch_add(1, Ordering::SeqCst);
  }

  fn on_abrupt_stop(&self, reason: AbortReason) {
    self.abrupt.fetch_add(1, Ordering::SeqCst);
    self.reasons.lock().push(reason);
  }
}

/// Deregisters its own attachment from inside the stop callback, like a run
/// that finishes at the very moment it is being stopped.
pub struct ReentrantHandler {
  pub registry: Arc<AttachmentRegistry<AbortReason>>,
  pub id: once_cell::sync::OnceCell<AttachmentId>,
  pub deregistered_inside_callback: Mutex<Option<bool>>,
  pub calls: AtomicUsize,
}

impl ReentrantHandler {
  pub fn new(registry: Arc<AttachmentRegistry<AbortReason>>) -> Arc<Self> {
    Arc::new(Self {
      registry,
      id: once_cell::sync::OnceCell::new(),
      deregistered_inside_callback: Mutex::new(None),
      calls: AtomicUsize::new(0),
    })
  }

  fn reenter(&self) {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(id) = self.id.get() {
      let won = self.registry.deregister(*id);
      *self.deregistered_inside_callback.lock() = Some(won);
    }
  }
}

impl KillSwitchHandler<AbortReason> for ReentrantHandler {
  fn on_graceful_stop(&self) {
    self.reenter();
  }

  fn on_abrupt_stop(&self, _reason: AbortReason) {
    self.reenter();
  }
}

/// Weak, type-erased reference to a handler, as the registry expects.
pub fn weak_handler<H>(handler: &Arc<H>) -> Weak<dyn KillSwitchHandler<AbortReason>>
where
  H: KillSwitchHandler<AbortReason> + 'static,
{
  let erased: Arc<dyn KillSwitchHandler<AbortReason>> = handler.clone();
  Arc::downgrade(&erased)
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
