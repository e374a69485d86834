// sluice/src/core/decision.rs

//! Defines the terminal outcome a kill switch applies and the write-once cell holding it.

use once_cell::sync::OnceCell;

/// Terminal outcome applied to a kill switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<E> {
  /// No `shutdown` or `abort` has won yet.
  Unset,
  /// Graceful stop: attached streams stop pulling and complete normally.
  Completed,
  /// Abrupt stop: attached streams fail with the carried reason.
  Aborted(E),
}

impl<E> Decision<E> {
  /// True for `Completed` and `Aborted`.
  pub fn is_set(&self) -> bool {
    !matches!(self, Decision::Unset)
  }

  /// The abort reason, if this decision is `Aborted`.
  pub fn reason(&self) -> Option<&E> {
    match self {
      Decision::Aborted(reason) => Some(reason),
      _ => None,
    }
  }
}

/// One-shot decision primitive.
///
/// Transitions from `Unset` to either `Completed` or `Aborted` exactly once.
/// Among concurrent `try_set` callers only one wins; reads never take a lock.
#[derive(Debug)]
pub struct DecisionCell<E> {
  cell: OnceCell<Decision<E>>,
}

impl<E: Clone> DecisionCell<E> {
  pub fn new() -> Self {
    Self { cell: OnceCell::new() }
  }

  /// Attempts to freeze `decision`. Returns `true` only for the call that won.
  ///
  /// Passing `Decision::Unset` never wins.
  pub fn try_set(&self, decision: Decision<E>) -> bool {
    if !decision.is_set() {
      return false;
    }
    self.cell.set(decision).is_ok()
  }

  /// Snapshot of the current decision.
  pub fn current(&self) -> Decision<E> {
    self.cell.get().cloned().unwrap_or(Decision::Unset)
  }

  /// Borrowing variant of [`current`](Self::current); `None` while unset.
  pub fn get(&self) -> Option<&Decision<E>> {
    self.cell.get()
  }

  pub fn is_set(&self) -> bool {
    self.cell.get().is_some()
  }
}

impl<E: Clone> Default for DecisionCell<E> {
  fn default() -> Self {
    Self::new()
  }
}
