// sluice/src/core/handler.rs

//! The narrow contract between a kill switch and the engine stage it controls.

/// Implemented by the engine-side control stage of one pipeline run.
///
/// A switch only ever calls these two methods, and calls at most one of them,
/// at most once, per attachment. Implementations must not block; they are
/// invoked on whichever thread decided the switch (or registered a late
/// joiner), outside of any registry lock. A panicking handler does not keep
/// the other attachments from being stopped; the panic resurfaces on the
/// deciding thread once every stop has been delivered.
///
/// The opposite direction, the run finishing on its own, is reported by
/// completing or dropping the [`Registration`](crate::registry::Registration)
/// returned when the stage was attached.
pub trait KillSwitchHandler<E>: Send + Sync {
  /// Stop pulling new input and let already admitted elements complete normally.
  fn on_graceful_stop(&self);

  /// Discard buffered state and surface `reason` as the run's terminal failure.
  fn on_abrupt_stop(&self, reason: E);
}
