// sluice/examples/unique_kill_switch.rs

use futures::stream::{self, StreamExt};
use sluice::{AbortReason, KillSwitchStreamExt, Last, Sink, SinkError, UniqueKillSwitch};
use std::time::Duration;
use tracing::{error, info};

// 1. A counting source: 1 right away, then one element per second.
fn counting_source() -> impl futures::Stream<Item = u32> + Send + 'static {
  stream::iter(1..=4u32).then(|n| async move {
    if n > 1 {
      tokio::time::sleep(Duration::from_secs(1)).await;
    }
    n
  })
}

#[tokio::main]
async fn main() -> Result<(), SinkError<AbortReason>> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Unique Kill Switch Example ---");

  // 2. Shutdown: elements already emitted drain, the stream completes normally.
  let (stage, kill_switch): (_, UniqueKillSwitch) = counting_source().with_kill_switch();
  let run = tokio::spawn(Last.run(stage));
  tokio::time::sleep(Duration::from_millis(1500)).await;
  kill_switch.shutdown();

  let last = run.await.expect("run task panicked")?;
  info!("Shutdown run finished with last element {}", last);
  assert_eq!(last, 2);

  // 3. Abort: the stream fails with exactly the reason we supplied.
  let (stage, kill_switch): (_, UniqueKillSwitch) = counting_source().with_kill_switch();
  let run = tokio::spawn(Last.run(stage));
  let reason = AbortReason::new("boom!");
  kill_switch.abort(reason.clone());

  match run.await.expect("run task panicked") {
    Err(SinkError::Aborted(got)) if got.ptr_eq(&reason) => info!("Abort run failed as expected: {}", got),
    other => error!("Unexpected outcome: {:?}", other),
  }

  Ok(())
}
