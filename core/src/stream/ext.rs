// sluice/src/stream/ext.rs

use super::stage::KillSwitchStage;
use crate::switch::{ControlPoint, KillSwitches, UniqueKillSwitch};

use futures::Stream;

/// Adds kill-switch wiring to every `Stream`.
pub trait KillSwitchStreamExt: Stream + Sized {
  /// Routes this stream through a shared switch's control point.
  ///
  /// ```
  /// use futures::executor::block_on;
  /// use futures::{stream, StreamExt};
  /// use sluice::{AbortReason, KillSwitchStreamExt, SharedKillSwitch};
  ///
  /// let switch: SharedKillSwitch = SharedKillSwitch::named("ingest");
  /// let stage = stream::iter(1..=3).via(switch.flow());
  /// let items: Vec<Result<i32, AbortReason>> = block_on(stage.collect());
  /// assert_eq!(items.len(), 3);
  /// assert!(items.iter().all(Result::is_ok));
  ///
  /// // Runs wired in after a shutdown end without pulling anything.
  /// switch.shutdown();
  /// let late = stream::iter(1..=3).via(switch.flow());
  /// assert!(block_on(late.collect::<Vec<_>>()).is_empty());
  /// ```
  fn via<E>(self, control_point: ControlPoint<E>) -> KillSwitchStage<Self, E>
  where
    E: Clone + Send + Sync + 'static,
  {
    control_point.attach(self)
  }

  /// Wires a fresh unique switch into this stream.
  fn with_kill_switch<E>(self) -> (KillSwitchStage<Self, E>, UniqueKillSwitch<E>)
  where
    E: Clone + Send + Sync + 'static,
  {
    KillSwitches::single().attach(self)
  }
}

impl<S: Stream> KillSwitchStreamExt for S {}
