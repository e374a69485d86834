// sluice/src/registry.rs

//! Defines `AttachmentRegistry<E>`, the set of live attachments behind a kill switch.
//! A shared switch owns one registry for any number of runs; a unique switch
//! owns one that only ever holds a single entry.

use crate::core::attachment::{Attachment, AttachmentId, AttachmentState};
use crate::core::decision::{Decision, DecisionCell};
use crate::core::handler::KillSwitchHandler;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{event, Level};

/// Registry of attachments, keyed by attachment identity.
///
/// Membership changes (`register`, `deregister`, `broadcast_stop`) are mutually
/// exclusive; the per-attachment terminal state is claimed while the lock is
/// held. Stop effects themselves run after the lock is released, so an engine
/// stage may call back into the registry from inside its stop callback.
pub struct AttachmentRegistry<E> {
  label: Arc<str>,
  live: Mutex<HashMap<AttachmentId, Arc<Attachment<E>>>>,
  next_id: AtomicU64,
}

impl<E> AttachmentRegistry<E>
where
  E: Clone + Send + Sync + 'static,
{
  /// Creates an empty registry. `label` only shows up in logs.
  pub fn new(label: impl Into<Arc<str>>) -> Self {
    Self {
      label: label.into(),
      live: Mutex::new(HashMap::new()),
      next_id: AtomicU64::new(1),
    }
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  /// Adds an attachment for `handler`.
  ///
  /// If `decision` is already frozen the attachment is never stored: it is
  /// stopped with that decision's effect before this call returns, so a late
  /// joiner never runs a single element under normal behaviour.
  pub fn register(
    self: &Arc<Self>,
    handler: Weak<dyn KillSwitchHandler<E>>,
    decision: &DecisionCell<E>,
  ) -> Registration<E> {
    let id = AttachmentId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let attachment = Arc::new(Attachment::new(id, handler));

    let late_decision = {
      let mut live = self.live.lock();
      // Checked under the lock: a concurrent broadcast either already drained
      // (and froze the decision we read here) or will see this entry.
      match decision.get() {
        Some(frozen) => {
          if let Some(effect) = AttachmentState::for_decision(frozen) {
            attachment.claim(effect);
          }
          Some(frozen.clone())
        }
        None => {
          live.insert(id, Arc::clone(&attachment));
          None
        }
      }
    };

    match late_decision {
      Some(frozen) => {
        event!(Level::TRACE, registry = %self.label, attachment = %id, "Late joiner stopped on arrival.");
        attachment.deliver(&frozen);
      }
      None => {
        event!(Level::DEBUG, registry = %self.label, attachment = %id, "Attachment registered.");
      }
    }

    Registration {
      registry: Arc::clone(self),
      attachment,
    }
  }

  /// Removes an attachment whose run finished on its own.
  ///
  /// Returns `true` if this call moved the attachment to
  /// `CompletedIndependently`; `false` if a stop (or an earlier deregister)
  /// got there first, in which case nothing changes.
  pub fn deregister(&self, id: AttachmentId) -> bool {
    let mut live = self.live.lock();
    let Some(attachment) = live.get(&id) else {
      return false;
    };
    if !attachment.claim(AttachmentState::CompletedIndependently) {
      return false;
    }
    live.remove(&id);
    drop(live);
    event!(Level::DEBUG, registry = %self.label, attachment = %id, "Attachment completed independently.");
    true
  }

  /// Applies `decision` to every live attachment and empties the registry.
  ///
  /// Stops are delivered in attach order. Returns the number of attachments
  /// this broadcast stopped. `Unset` is a no-op.
  ///
  /// # Panics
  ///
  /// If a handler panics, the remaining attachments are still delivered and
  /// the first panic is resumed afterwards.
  pub fn broadcast_stop(&self, decision: &Decision<E>) -> usize {
    let Some(effect) = AttachmentState::for_decision(decision) else {
      return 0;
    };

    let mut claimed: Vec<Arc<Attachment<E>>> = {
      let mut live = self.live.lock();
      live
        .drain()
        .map(|(_, attachment)| attachment)
        .filter(|attachment| attachment.claim(effect))
        .collect()
    };
    claimed.sort_unstable_by_key(|attachment| attachment.id());

    event!(Level::DEBUG, registry = %self.label, stopped = claimed.len(), ?effect, "Broadcasting stop.");
    let mut first_panic = None;
    for attachment in &claimed {
      match panic::catch_unwind(AssertUnwindSafe(|| attachment.deliver(decision))) {
        Ok(true) => {}
        Ok(false) => {
          event!(Level::TRACE, registry = %self.label, attachment = %attachment.id(), "Stage already dropped, stop skipped.");
        }
        Err(payload) => {
          event!(Level::ERROR, registry = %self.label, attachment = %attachment.id(), "Stop handler panicked.");
          first_panic.get_or_insert(payload);
        }
      }
    }
    if let Some(payload) = first_panic {
      panic::resume_unwind(payload);
    }
    claimed.len()
  }

  /// Number of attachments currently live.
  pub fn live_count(&self) -> usize {
    self.live.lock().len()
  }
}

impl<E> fmt::Debug for AttachmentRegistry<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AttachmentRegistry")
      .field("label", &self.label)
      .field("live", &self.live.lock().len())
      .finish()
  }
}

/// Handle the engine stage keeps for its attachment.
///
/// Completing it, or dropping it, reports that the run ended on its own; if a
/// stop already claimed the attachment this is a no-op.
pub struct Registration<E>
where
  E: Clone + Send + Sync + 'static,
{
  registry: Arc<AttachmentRegistry<E>>,
  attachment: Arc<Attachment<E>>,
}

impl<E> Registration<E>
where
  E: Clone + Send + Sync + 'static,
{
  pub fn id(&self) -> AttachmentId {
    self.attachment.id()
  }

  pub fn state(&self) -> AttachmentState {
    self.attachment.state()
  }

  /// Reports independent completion. See [`AttachmentRegistry::deregister`].
  pub fn complete(&self) -> bool {
    self.registry.deregister(self.attachment.id())
  }
}

impl<E> Drop for Registration<E>
where
  E: Clone + Send + Sync + 'static,
{
  fn drop(&mut self) {
    if !self.attachment.state().is_terminal() {
      self.registry.deregister(self.attachment.id());
    }
  }
}

impl<E> fmt::Debug for Registration<E>
where
  E: Clone + Send + Sync + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registration")
      .field("registry", &self.registry.label())
      .field("attachment", &self.attachment)
      .finish()
  }
}
