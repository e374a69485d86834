// sluice/src/switch/shared.rs

//! A named kill switch that can be wired into any number of streams.

use super::{KillSwitch, SwitchCore};
use crate::core::decision::Decision;
use crate::core::handler::KillSwitchHandler;
use crate::error::AbortReason;
use crate::registry::Registration;
use crate::stream::stage::KillSwitchStage;

use futures::Stream;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{event, instrument, Level};

/// Stops every stream it is wired into with one decision.
///
/// Created independently of any stream via [`SharedKillSwitch::named`]; each
/// [`ControlPoint`] handed out by [`flow`](Self::flow) attaches one more run.
/// A run attached after the switch was decided is stopped with that decision
/// before it sees any element. The decision is permanent.
///
/// Clones are the same switch. The name is only used for diagnostics.
#[derive(Clone)]
pub struct SharedKillSwitch<E = AbortReason>
where
  E: Clone + Send + Sync + 'static,
{
  core: Arc<SwitchCore<E>>,
}

impl<E> SharedKillSwitch<E>
where
  E: Clone + Send + Sync + 'static,
{
  pub fn named(name: impl Into<String>) -> Self {
    let name: String = name.into();
    event!(Level::DEBUG, switch = %name, "Shared kill switch created.");
    Self {
      core: Arc::new(SwitchCore::new(name)),
    }
  }

  pub fn name(&self) -> &str {
    self.core.name()
  }

  /// A fresh control point to wire into one new stream.
  pub fn flow(&self) -> ControlPoint<E> {
    ControlPoint {
      core: Arc::clone(&self.core),
    }
  }

  /// Alias of [`flow`](Self::flow).
  pub fn as_control_point(&self) -> ControlPoint<E> {
    self.flow()
  }

  /// Completes every attached stream once its already-admitted elements drained.
  #[instrument(name = "SharedKillSwitch::shutdown", skip_all, fields(switch = %self.core.name()))]
  pub fn shutdown(&self) {
    self.core.decide(Decision::Completed);
  }

  /// Fails every attached stream, current and future, with `reason`.
  #[instrument(name = "SharedKillSwitch::abort", skip_all, fields(switch = %self.core.name()))]
  pub fn abort(&self, reason: E) {
    self.core.decide(Decision::Aborted(reason));
  }

  pub fn decision(&self) -> Decision<E> {
    self.core.decision()
  }

  /// Number of streams currently attached and still running.
  pub fn live_attachments(&self) -> usize {
    self.core.live_count()
  }
}

impl<E> KillSwitch<E> for SharedKillSwitch<E>
where
  E: Clone + Send + Sync + 'static,
{
  fn shutdown(&self) {
    SharedKillSwitch::shutdown(self)
  }

  fn abort(&self, reason: E) {
    SharedKillSwitch::abort(self, reason)
  }

  fn decision(&self) -> Decision<E> {
    SharedKillSwitch::decision(self)
  }
}

impl<E> fmt::Display for SharedKillSwitch<E>
where
  E: Clone + Send + Sync + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "KillSwitch({})", self.core.name())
  }
}

impl<E> fmt::Debug for SharedKillSwitch<E>
where
  E: Clone + Send + Sync + fmt::Debug + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SharedKillSwitch")
      .field("name", &self.core.name())
      .field("decision", &self.core.decision())
      .field("live_attachments", &self.core.live_count())
      .finish()
  }
}

/// One attachable control point of a [`SharedKillSwitch`].
///
/// Consumed by [`attach`](Self::attach); the attachment is allocated at that moment.
pub struct ControlPoint<E = AbortReason>
where
  E: Clone + Send + Sync + 'static,
{
  core: Arc<SwitchCore<E>>,
}

impl<E> ControlPoint<E>
where
  E: Clone + Send + Sync + 'static,
{
  /// Name of the switch this control point belongs to.
  pub fn switch_name(&self) -> &str {
    self.core.name()
  }

  /// Wires a control stage in front of `upstream`.
  pub fn attach<S>(self, upstream: S) -> KillSwitchStage<S, E>
  where
    S: Stream,
  {
    KillSwitchStage::attach(upstream, &self.core)
  }

  /// Attaches a custom engine stage instead of the bundled stream adapter.
  ///
  /// The switch keeps only a weak reference to `handler`; the returned
  /// registration must live as long as the run and be completed (or dropped)
  /// when the run ends on its own.
  pub fn attach_handler(self, handler: Weak<dyn KillSwitchHandler<E>>) -> Registration<E> {
    self.core.attach(handler)
  }
}

impl<E> fmt::Debug for ControlPoint<E>
where
  E: Clone + Send + Sync + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ControlPoint").field("switch", &self.core.name()).finish()
  }
}
