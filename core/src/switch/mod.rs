// sluice/src/switch/mod.rs

//! Kill switches: the handles application code uses to stop running streams.
//!
//! - [`UniqueKillSwitch`] is produced by attaching to exactly one stream and
//!   only ever controls that run.
//! - [`SharedKillSwitch`] is created up front, named, and can be wired into
//!   any number of streams, including streams started after it was decided.

pub mod shared;
pub mod unique;

pub use shared::{ControlPoint, SharedKillSwitch};
pub use unique::{SingleKillSwitch, UniqueKillSwitch};

use crate::core::decision::{Decision, DecisionCell};
use crate::core::handler::KillSwitchHandler;
use crate::error::AbortReason;
use crate::registry::{AttachmentRegistry, Registration};

use std::sync::{Arc, Weak};
use tracing::{event, Level};

/// Operations common to both switch kinds.
///
/// Whichever of `shutdown`/`abort` is called first wins; every later call is a
/// silent no-op.
pub trait KillSwitch<E = AbortReason>: Send + Sync {
  /// Graceful stop: attached streams stop pulling and complete normally.
  fn shutdown(&self);

  /// Abrupt stop: attached streams discard in-flight data and fail with `reason`.
  fn abort(&self, reason: E);

  /// Snapshot of the frozen decision (`Unset` while undecided).
  fn decision(&self) -> Decision<E>;

  fn is_decided(&self) -> bool {
    self.decision().is_set()
  }
}

/// Factory functions for kill switches.
pub struct KillSwitches;

impl KillSwitches {
  /// A control point that yields a [`UniqueKillSwitch`] when attached to a stream.
  pub fn single<E>() -> SingleKillSwitch<E>
  where
    E: Clone + Send + Sync + 'static,
  {
    SingleKillSwitch::new()
  }

  /// Same as [`SharedKillSwitch::named`].
  pub fn shared<E>(name: impl Into<String>) -> SharedKillSwitch<E>
  where
    E: Clone + Send + Sync + 'static,
  {
    SharedKillSwitch::named(name)
  }
}

/// Decision cell plus registry; the state both switch kinds wrap.
pub(crate) struct SwitchCore<E>
where
  E: Clone + Send + Sync + 'static,
{
  name: Arc<str>,
  decision: DecisionCell<E>,
  registry: Arc<AttachmentRegistry<E>>,
}

impl<E> SwitchCore<E>
where
  E: Clone + Send + Sync + 'static,
{
  pub(crate) fn new(name: impl Into<Arc<str>>) -> Self {
    let name: Arc<str> = name.into();
    Self {
      registry: Arc::new(AttachmentRegistry::new(Arc::clone(&name))),
      name,
      decision: DecisionCell::new(),
    }
  }

  pub(crate) fn name(&self) -> &str {
    &self.name
  }

  pub(crate) fn decision(&self) -> Decision<E> {
    self.decision.current()
  }

  pub(crate) fn live_count(&self) -> usize {
    self.registry.live_count()
  }

  pub(crate) fn attach(&self, handler: Weak<dyn KillSwitchHandler<E>>) -> Registration<E> {
    self.registry.register(handler, &self.decision)
  }

  /// Freezes `decision` and stops every live attachment if this call won.
  pub(crate) fn decide(&self, decision: Decision<E>) -> bool {
    let kind = match &decision {
      Decision::Completed => "shutdown",
      Decision::Aborted(_) => "abort",
      Decision::Unset => return false,
    };
    if !self.decision.try_set(decision) {
      event!(Level::TRACE, switch = %self.name, kind, "Switch already decided, ignoring.");
      return false;
    }
    let frozen = self.decision.current();
    let stopped = self.registry.broadcast_stop(&frozen);
    event!(Level::INFO, switch = %self.name, kind, stopped, "Kill switch triggered.");
    true
  }
}
