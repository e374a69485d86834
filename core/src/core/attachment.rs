// sluice/src/core/attachment.rs

//! One pipeline run's registration with a kill switch.

use super::decision::Decision;
use super::handler::KillSwitchHandler;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Weak;

/// Identity of an attachment within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachmentId(pub(crate) u64);

impl AttachmentId {
  pub fn as_u64(&self) -> u64 {
    self.0
  }
}

impl fmt::Display for AttachmentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Per-attachment state machine. Every state except `Live` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AttachmentState {
  Live = 0,
  StoppedGraceful = 1,
  StoppedAbrupt = 2,
  CompletedIndependently = 3,
}

impl AttachmentState {
  fn from_u8(raw: u8) -> Self {
    match raw {
      0 => AttachmentState::Live,
      1 => AttachmentState::StoppedGraceful,
      2 => AttachmentState::StoppedAbrupt,
      _ => AttachmentState::CompletedIndependently,
    }
  }

  pub fn is_terminal(&self) -> bool {
    !matches!(self, AttachmentState::Live)
  }

  /// The stop state a decision drives a live attachment into.
  pub(crate) fn for_decision<E>(decision: &Decision<E>) -> Option<Self> {
    match decision {
      Decision::Unset => None,
      Decision::Completed => Some(AttachmentState::StoppedGraceful),
      Decision::Aborted(_) => Some(AttachmentState::StoppedAbrupt),
    }
  }
}

/// Links a switch to one run's stop capability.
///
/// Holds the engine stage weakly: a run that disappears without reporting
/// completion is simply skipped when a stop is delivered.
pub(crate) struct Attachment<E> {
  id: AttachmentId,
  handler: Weak<dyn KillSwitchHandler<E>>,
  state: AtomicU8,
}

impl<E: Clone> Attachment<E> {
  pub(crate) fn new(id: AttachmentId, handler: Weak<dyn KillSwitchHandler<E>>) -> Self {
    Self {
      id,
      handler,
      state: AtomicU8::new(AttachmentState::Live as u8),
    }
  }

  pub(crate) fn id(&self) -> AttachmentId {
    self.id
  }

  pub(crate) fn state(&self) -> AttachmentState {
    AttachmentState::from_u8(self.state.load(Ordering::Acquire))
  }

  /// Moves `Live -> to`. Returns `false` if the attachment already left `Live`.
  ///
  /// Callers hold the registry lock, which makes the claim and the registry
  /// membership change a single step.
  pub(crate) fn claim(&self, to: AttachmentState) -> bool {
    debug_assert!(to.is_terminal());
    self
      .state
      .compare_exchange(
        AttachmentState::Live as u8,
        to as u8,
        Ordering::AcqRel,
        Ordering::Acquire,
      )
      .is_ok()
  }

  /// Invokes the stop effect matching `decision` on the engine stage.
  ///
  /// Only called by the party that won [`claim`](Self::claim). Returns `false`
  /// when the stage is already gone.
  pub(crate) fn deliver(&self, decision: &Decision<E>) -> bool {
    let Some(handler) = self.handler.upgrade() else {
      return false;
    };
    match decision {
      Decision::Completed => handler.on_graceful_stop(),
      Decision::Aborted(reason) => handler.on_abrupt_stop(reason.clone()),
      Decision::Unset => return false,
    }
    true
  }
}

impl<E> fmt::Debug for Attachment<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Attachment")
      .field("id", &self.id)
      .field("state", &AttachmentState::from_u8(self.state.load(Ordering::Acquire)))
      .field("handler_alive", &(self.handler.strong_count() > 0))
      .finish()
  }
}
