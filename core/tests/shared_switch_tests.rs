// tests/shared_switch_tests.rs
mod common;

use common::*;
use futures::task::{waker, ArcWake};
use futures::StreamExt;
use sluice::{
  AbortReason, AttachmentState, Collect, Decision, KillSwitchHandler, KillSwitchStreamExt, KillSwitches, Last,
  SharedKillSwitch, Sink, SinkError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::task::{Context, Poll};
use std::thread;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_shared_shutdown_gives_each_run_its_own_last_element() {
  setup_tracing();
  let switch: SharedKillSwitch = SharedKillSwitch::named("my-kill-switch");

  let run = tokio::spawn(Last.run(delayed_counting_source(Duration::ZERO).via(switch.flow())));
  let run_delayed = tokio::spawn(Last.run(delayed_counting_source(Duration::from_secs(1)).via(switch.flow())));
  assert_eq!(switch.live_attachments(), 2);

  sleep(Duration::from_millis(1500)).await;
  switch.shutdown();

  assert_eq!(run.await.expect("run task panicked"), Ok(2));
  assert_eq!(run_delayed.await.expect("run task panicked"), Ok(1));
  assert_eq!(switch.live_attachments(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shared_abort_fails_every_run_regardless_of_progress() {
  setup_tracing();
  let switch: SharedKillSwitch = SharedKillSwitch::named("my-kill-switch");

  let run = tokio::spawn(Last.run(delayed_counting_source(Duration::ZERO).via(switch.flow())));
  let run_delayed = tokio::spawn(Last.run(delayed_counting_source(Duration::from_secs(1)).via(switch.flow())));

  sleep(Duration::from_millis(1500)).await;
  let reason = AbortReason::new("boom!");
  switch.abort(reason.clone());

  assert_eq!(run.await.expect("run task panicked"), Err(SinkError::Aborted(reason.clone())));
  assert_eq!(run_delayed.await.expect("run task panicked"), Err(SinkError::Aborted(reason)));
}

#[tokio::test]
async fn test_late_joiner_after_abort_fails_without_pulling() {
  setup_tracing();
  let switch: SharedKillSwitch = SharedKillSwitch::named("late");
  let reason = AbortReason::new("already aborted");
  switch.abort(reason.clone());

  let pulls = Arc::new(AtomicUsize::new(0));
  let stage = pull_counting_source(vec![1, 2, 3], pulls.clone()).via(switch.flow());
  assert_eq!(switch.live_attachments(), 0);

  let result = Collect.run(stage).await;
  assert_eq!(result, Err(SinkError::Aborted(reason)));
  assert_eq!(pulls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_late_joiner_after_shutdown_completes_empty() {
  setup_tracing();
  let switch: SharedKillSwitch = SharedKillSwitch::named("late");
  switch.shutdown();

  let pulls = Arc::new(AtomicUsize::new(0));
  let result = Collect.run(pull_counting_source(vec![1, 2, 3], pulls.clone()).via(switch.flow())).await;
  assert_eq!(result, Ok(Vec::<u32>::new()));
  assert_eq!(pulls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_late_joiner_handler_is_stopped_before_attach_returns() {
  setup_tracing();
  let switch: SharedKillSwitch = SharedKillSwitch::named("late-handler");
  let reason = AbortReason::new("stop");
  switch.abort(reason.clone());

  let handler = RecordingHandler::new();
  let registration = switch.flow().attach_handler(weak_handler(&handler));
  assert_eq!(handler.abrupt_count(), 1);
  assert_eq!(handler.graceful_count(), 0);
  assert!(handler.reasons.lock()[0].ptr_eq(&reason));
  assert_eq!(registration.state(), AttachmentState::StoppedAbrupt);
}

#[tokio::test]
async fn test_independent_completion_does_not_leak() {
  setup_tracing();
  let switch: SharedKillSwitch = SharedKillSwitch::named("finite");
  let result = Collect.run(futures::stream::iter(vec![1u32, 2]).via(switch.flow())).await;
  assert_eq!(result, Ok(vec![1, 2]));
  assert_eq!(switch.live_attachments(), 0);

  let handler = RecordingHandler::new();
  let registration = switch.flow().attach_handler(weak_handler(&handler));
  assert!(registration.complete());
  assert_eq!(registration.state(), AttachmentState::CompletedIndependently);

  switch.shutdown();
  assert_eq!(handler.total(), 0);
}

#[tokio::test]
async fn test_unused_control_point_allocates_nothing() {
  setup_tracing();
  let switch: SharedKillSwitch = KillSwitches::shared("idle");
  let control_point = switch.flow();
  assert_eq!(control_point.switch_name(), "idle");
  drop(control_point);
  assert_eq!(switch.live_attachments(), 0);
}

#[tokio::test]
async fn test_decision_is_permanent_across_clones() {
  setup_tracing();
  let switch: SharedKillSwitch = SharedKillSwitch::named("permanent");
  let clone = switch.clone();
  clone.shutdown();
  switch.abort(AbortReason::new("ignored"));

  assert_eq!(switch.decision(), Decision::Completed);
  assert_eq!(clone.decision(), Decision::Completed);

  // Still decided for runs attached much later.
  let result = Last.run(futures::stream::iter(vec![1u32]).via(switch.flow())).await;
  assert_eq!(result, Err(SinkError::Empty));
}

#[tokio::test]
async fn test_name_is_diagnostic_only() {
  setup_tracing();
  let a: SharedKillSwitch = SharedKillSwitch::named("same");
  let b: SharedKillSwitch = SharedKillSwitch::named("same");
  assert_eq!(a.to_string(), "KillSwitch(same)");

  let stage_b = futures::stream::iter(vec![1u32, 2]).via(b.flow());
  a.abort(AbortReason::new("only a"));
  assert_eq!(b.decision(), Decision::Unset);
  assert_eq!(Collect.run(stage_b).await, Ok(vec![1, 2]));
}

/// Holds a broadcast inside its own delivery until the test lets it go.
struct GateHandler {
  entered: Barrier,
  release: Barrier,
}

impl KillSwitchHandler<AbortReason> for GateHandler {
  fn on_graceful_stop(&self) {
    self.entered.wait();
    self.release.wait();
  }

  fn on_abrupt_stop(&self, _reason: AbortReason) {
    self.on_graceful_stop();
  }
}

#[derive(Default)]
struct WakeCounter(AtomicUsize);

impl ArcWake for WakeCounter {
  fn wake_by_ref(arc_self: &Arc<Self>) {
    arc_self.0.fetch_add(1, Ordering::SeqCst);
  }
}

#[test]
fn test_upstream_ending_under_an_in_flight_stop_reports_the_stop() {
  setup_tracing();
  let switch: SharedKillSwitch = SharedKillSwitch::named("in-flight");
  // Attached first, so the broadcast delivers to it before the stage.
  let gate = Arc::new(GateHandler {
    entered: Barrier::new(2),
    release: Barrier::new(2),
  });
  let _gate_registration = switch.flow().attach_handler(weak_handler(&gate));
  let mut stage = futures::stream::iter(Vec::<u32>::new()).via(switch.flow());

  let wakes = Arc::new(WakeCounter::default());
  let stage_waker = waker(Arc::clone(&wakes));
  let mut cx = Context::from_waker(&stage_waker);

  let reason = AbortReason::new("in flight");
  let aborter = {
    let switch = switch.clone();
    let reason = reason.clone();
    thread::spawn(move || switch.abort(reason))
  };
  // Both attachments are claimed now; the stage's stop is not delivered yet.
  gate.entered.wait();

  // Upstream is exhausted, but completion loses to the claimed stop.
  assert_eq!(stage.poll_next_unpin(&mut cx), Poll::Pending);
  assert_eq!(wakes.0.load(Ordering::SeqCst), 0);

  gate.release.wait();
  aborter.join().expect("aborter panicked");
  assert_eq!(wakes.0.load(Ordering::SeqCst), 1);
  assert_eq!(stage.poll_next_unpin(&mut cx), Poll::Ready(Some(Err(reason))));
  assert_eq!(stage.poll_next_unpin(&mut cx), Poll::Ready(None));
  assert_eq!(switch.live_attachments(), 0);
}
