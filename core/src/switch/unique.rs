// sluice/src/switch/unique.rs

//! A kill switch bound to a single stream at attachment time.

use super::{KillSwitch, SwitchCore};
use crate::core::decision::Decision;
use crate::core::handler::KillSwitchHandler;
use crate::error::AbortReason;
use crate::registry::Registration;
use crate::stream::stage::KillSwitchStage;

use futures::Stream;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use tracing::instrument;

/// Control point for exactly one stream; attaching it yields the
/// [`UniqueKillSwitch`] for that run.
pub struct SingleKillSwitch<E = AbortReason> {
  _phantom_reason: PhantomData<fn() -> E>,
}

impl<E> SingleKillSwitch<E>
where
  E: Clone + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      _phantom_reason: PhantomData,
    }
  }

  /// Wires a control stage in front of `upstream` and returns it together
  /// with the only handle able to stop it.
  pub fn attach<S>(self, upstream: S) -> (KillSwitchStage<S, E>, UniqueKillSwitch<E>)
  where
    S: Stream,
  {
    let core = Arc::new(SwitchCore::new("unique"));
    let stage = KillSwitchStage::attach(upstream, &core);
    (stage, UniqueKillSwitch { core })
  }

  /// Attaches a custom engine stage instead of the bundled stream adapter.
  /// See [`ControlPoint::attach_handler`](super::ControlPoint::attach_handler).
  pub fn attach_handler(
    self,
    handler: Weak<dyn KillSwitchHandler<E>>,
  ) -> (Registration<E>, UniqueKillSwitch<E>) {
    let core = Arc::new(SwitchCore::new("unique"));
    let registration = core.attach(handler);
    (registration, UniqueKillSwitch { core })
  }
}

impl<E> Default for SingleKillSwitch<E>
where
  E: Clone + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

/// Stops the one stream it was created for.
///
/// Clones drive the same decision. Once decided, or once the stream finished
/// on its own, further calls have no effect.
#[derive(Clone)]
pub struct UniqueKillSwitch<E = AbortReason>
where
  E: Clone + Send + Sync + 'static,
{
  core: Arc<SwitchCore<E>>,
}

impl<E> UniqueKillSwitch<E>
where
  E: Clone + Send + Sync + 'static,
{
  /// Lets elements already past the switch drain, then completes the stream.
  #[instrument(name = "UniqueKillSwitch::shutdown", skip_all)]
  pub fn shutdown(&self) {
    self.core.decide(Decision::Completed);
  }

  /// Fails the stream with `reason`, discarding anything in flight.
  #[instrument(name = "UniqueKillSwitch::abort", skip_all)]
  pub fn abort(&self, reason: E) {
    self.core.decide(Decision::Aborted(reason));
  }

  pub fn decision(&self) -> Decision<E> {
    self.core.decision()
  }

  /// True while the controlled stream is still running and undecided.
  pub fn is_live(&self) -> bool {
    self.core.live_count() > 0
  }
}

impl<E> KillSwitch<E> for UniqueKillSwitch<E>
where
  E: Clone + Send + Sync + 'static,
{
  fn shutdown(&self) {
    UniqueKillSwitch::shutdown(self)
  }

  fn abort(&self, reason: E) {
    UniqueKillSwitch::abort(self, reason)
  }

  fn decision(&self) -> Decision<E> {
    UniqueKillSwitch::decision(self)
  }
}

impl<E> fmt::Debug for UniqueKillSwitch<E>
where
  E: Clone + Send + Sync + fmt::Debug + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("UniqueKillSwitch")
      .field("decision", &self.core.decision())
      .field("live", &self.is_live())
      .finish()
  }
}
