// sluice/src/error.rs
use anyhow::Error as AnyhowError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Default abort reason: an `anyhow::Error` behind an `Arc`.
///
/// Cloning shares the same error object, so every run stopped by one `abort`
/// observes the very same reason (see [`AbortReason::ptr_eq`]).
#[derive(Clone)]
pub struct AbortReason(Arc<AnyhowError>);

impl AbortReason {
  /// Builds a reason from a plain message, e.g. `AbortReason::new("boom!")`.
  pub fn new<M>(message: M) -> Self
  where
    M: fmt::Display + fmt::Debug + Send + Sync + 'static,
  {
    Self(Arc::new(AnyhowError::msg(message)))
  }

  /// True if both values are clones of the same reason.
  pub fn ptr_eq(&self, other: &AbortReason) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }

  pub fn inner(&self) -> &AnyhowError {
    &self.0
  }

  /// Attempts to view the underlying error as `T`.
  pub fn downcast_ref<T>(&self) -> Option<&T>
  where
    T: fmt::Display + fmt::Debug + Send + Sync + 'static,
  {
    self.0.downcast_ref::<T>()
  }
}

impl From<AnyhowError> for AbortReason {
  fn from(err: AnyhowError) -> Self {
    Self(Arc::new(err))
  }
}

impl fmt::Display for AbortReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&*self.0, f)
  }
}

impl fmt::Debug for AbortReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&*self.0, f)
  }
}

impl std::error::Error for AbortReason {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    self.0.source()
  }
}

// Identity, not message equality: two aborts with the same text are different reasons.
impl PartialEq for AbortReason {
  fn eq(&self, other: &Self) -> bool {
    self.ptr_eq(other)
  }
}

impl Eq for AbortReason {}

/// Failed outcome of a consumer reading a controlled stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError<E> {
  /// The stream was aborted; carries the abort reason verbatim.
  #[error("Stream aborted: {0}")]
  Aborted(E),

  /// A consumer that needs at least one element saw none.
  #[error("Stream completed without emitting any element")]
  Empty,
}

impl<E> SinkError<E> {
  /// The abort reason, if this is `Aborted`.
  pub fn reason(&self) -> Option<&E> {
    match self {
      SinkError::Aborted(reason) => Some(reason),
      SinkError::Empty => None,
    }
  }
}

pub type SinkResult<T, E = AbortReason> = std::result::Result<T, SinkError<E>>;
