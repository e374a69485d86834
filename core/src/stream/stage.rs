// sluice/src/stream/stage.rs

//! The engine-side control stage: a transparent `Stream` adapter that stops
//! when its kill switch says so.

use crate::core::attachment::AttachmentId;
use crate::core::handler::KillSwitchHandler;
use crate::registry::Registration;
use crate::switch::SwitchCore;

use futures::stream::FusedStream;
use futures::task::AtomicWaker;
use futures::Stream;
use parking_lot::Mutex;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{event, Level};

/// Stop signal recorded by the switch, consumed by the stage on its next poll.
enum Signal<E> {
  Running,
  Graceful,
  Abrupt(E),
  Finished,
}

struct StageSignal<E> {
  signal: Mutex<Signal<E>>,
  waker: AtomicWaker,
}

impl<E> StageSignal<E> {
  fn raise(&self, next: Signal<E>) {
    {
      let mut signal = self.signal.lock();
      if !matches!(*signal, Signal::Running) {
        return;
      }
      *signal = next;
    }
    self.waker.wake();
  }
}

impl<E> KillSwitchHandler<E> for StageSignal<E>
where
  E: Send + Sync,
{
  fn on_graceful_stop(&self) {
    self.raise(Signal::Graceful);
  }

  fn on_abrupt_stop(&self, reason: E) {
    self.raise(Signal::Abrupt(reason));
  }
}

/// Pass-through stage controlled by a kill switch.
///
/// Yields `Ok(item)` for every upstream element while live. After a graceful
/// stop it ends (`None`) without pulling upstream again; after an abrupt stop
/// it yields `Err(reason)` once and then ends. Upstream exhaustion, or dropping
/// the stage, deregisters it from the switch.
pub struct KillSwitchStage<S, E>
where
  E: Clone + Send + Sync + 'static,
{
  upstream: Option<Pin<Box<S>>>,
  signal: Arc<StageSignal<E>>,
  registration: Registration<E>,
  switch_name: Arc<str>,
  done: bool,
}

impl<S, E> KillSwitchStage<S, E>
where
  S: Stream,
  E: Clone + Send + Sync + 'static,
{
  pub(crate) fn attach(upstream: S, core: &SwitchCore<E>) -> Self {
    let signal = Arc::new(StageSignal {
      signal: Mutex::new(Signal::Running),
      waker: AtomicWaker::new(),
    });
    let handler: Arc<dyn KillSwitchHandler<E>> = signal.clone();
    // A late joiner gets its stop signal here, before the first poll.
    let registration = core.attach(Arc::downgrade(&handler));
    Self {
      upstream: Some(Box::pin(upstream)),
      signal,
      registration,
      switch_name: Arc::from(core.name()),
      done: false,
    }
  }

  pub fn attachment_id(&self) -> AttachmentId {
    self.registration.id()
  }

  pub fn switch_name(&self) -> &str {
    &self.switch_name
  }

  /// Takes a pending stop signal, if any, leaving the stage finished.
  fn take_stop(&mut self) -> Option<Poll<Option<Result<S::Item, E>>>> {
    let mut signal = self.signal.signal.lock();
    let outcome = match std::mem::replace(&mut *signal, Signal::Finished) {
      Signal::Running => {
        *signal = Signal::Running;
        return None;
      }
      Signal::Graceful => {
        event!(Level::DEBUG, switch = %self.switch_name, attachment = %self.registration.id(), "Stage stopped gracefully.");
        Poll::Ready(None)
      }
      Signal::Abrupt(reason) => {
        event!(Level::DEBUG, switch = %self.switch_name, attachment = %self.registration.id(), "Stage aborted.");
        Poll::Ready(Some(Err(reason)))
      }
      Signal::Finished => Poll::Ready(None),
    };
    drop(signal);
    self.upstream = None;
    self.done = true;
    Some(outcome)
  }
}

impl<S, E> Stream for KillSwitchStage<S, E>
where
  S: Stream,
  E: Clone + Send + Sync + 'static,
{
  type Item = Result<S::Item, E>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    if this.done {
      return Poll::Ready(None);
    }

    // Register before checking so a stop raised in between still wakes us.
    this.signal.waker.register(cx.waker());
    if let Some(outcome) = this.take_stop() {
      return outcome;
    }

    let Some(upstream) = this.upstream.as_mut() else {
      // Upstream already ended but a stop claimed the attachment first;
      // its delivery is in progress and will wake us.
      return Poll::Pending;
    };

    match upstream.as_mut().poll_next(cx) {
      Poll::Ready(Some(item)) => Poll::Ready(Some(Ok(item))),
      Poll::Ready(None) => {
        this.upstream = None;
        if this.registration.complete() {
          *this.signal.signal.lock() = Signal::Finished;
          this.done = true;
          event!(Level::DEBUG, switch = %this.switch_name, attachment = %this.registration.id(), "Upstream exhausted.");
          return Poll::Ready(None);
        }
        // Lost to a concurrent stop: honour it.
        match this.take_stop() {
          Some(outcome) => outcome,
          None => Poll::Pending,
        }
      }
      Poll::Pending => Poll::Pending,
    }
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    match &self.upstream {
      Some(upstream) if !self.done => (0, upstream.size_hint().1.and_then(|upper| upper.checked_add(1))),
      _ => (0, Some(0)),
    }
  }
}

impl<S, E> FusedStream for KillSwitchStage<S, E>
where
  S: Stream,
  E: Clone + Send + Sync + 'static,
{
  fn is_terminated(&self) -> bool {
    self.done
  }
}

impl<S, E> fmt::Debug for KillSwitchStage<S, E>
where
  E: Clone + Send + Sync + 'static,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("KillSwitchStage")
      .field("switch", &self.switch_name)
      .field("registration", &self.registration)
      .field("done", &self.done)
      .finish()
  }
}
