// sluice/examples/shared_kill_switch.rs

use futures::stream::{self, StreamExt};
use sluice::{AbortReason, KillSwitchStreamExt, Last, SharedKillSwitch, Sink, SinkError};
use std::time::Duration;
use tracing::info;

fn counting_source(initial_delay: Duration) -> impl futures::Stream<Item = u32> + Send + 'static {
  stream::iter(1..=4u32).then(move |n| async move {
    let wait = if n == 1 { initial_delay } else { Duration::from_secs(1) };
    if !wait.is_zero() {
      tokio::time::sleep(wait).await;
    }
    n
  })
}

#[tokio::main]
async fn main() -> Result<(), SinkError<AbortReason>> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Shared Kill Switch Example ---");

  // 1. One switch, two independent streams; the second starts a second later.
  let kill_switch: SharedKillSwitch = SharedKillSwitch::named("my-kill-switch");
  let run = tokio::spawn(Last.run(counting_source(Duration::ZERO).via(kill_switch.flow())));
  let run_delayed = tokio::spawn(Last.run(counting_source(Duration::from_secs(1)).via(kill_switch.flow())));

  tokio::time::sleep(Duration::from_millis(1500)).await;
  info!("{} stopping {} streams", kill_switch, kill_switch.live_attachments());
  kill_switch.shutdown();

  let last = run.await.expect("run task panicked")?;
  let last_delayed = run_delayed.await.expect("run task panicked")?;
  info!("Runs finished with {} and {}", last, last_delayed);
  assert_eq!((last, last_delayed), (2, 1));

  // 2. Abort another switch: every attached stream fails with the same reason,
  //    including one attached after the decision.
  let abort_switch: SharedKillSwitch = SharedKillSwitch::named("my-abort-switch");
  let run_a = tokio::spawn(Last.run(counting_source(Duration::ZERO).via(abort_switch.flow())));
  let run_b = tokio::spawn(Last.run(counting_source(Duration::ZERO).via(abort_switch.flow())));
  let reason = AbortReason::new("boom!");
  abort_switch.abort(reason.clone());
  let late = Last.run(counting_source(Duration::ZERO).via(abort_switch.flow())).await;

  for outcome in [
    run_a.await.expect("run task panicked"),
    run_b.await.expect("run task panicked"),
    late,
  ] {
    assert_eq!(outcome, Err(SinkError::Aborted(reason.clone())));
  }
  info!("All runs attached to {} failed with '{}'", abort_switch, reason);

  Ok(())
}
