// src/lib.rs

//! Sluice: kill switches for async stream pipelines.
//!
//! A kill switch lets code outside a running stream stop it, without the
//! stream's own logic knowing about it:
//!  - `shutdown()` stops pulling new input and lets the stream complete normally.
//!  - `abort(reason)` discards in-flight data and fails the stream with `reason`.
//!  - The first decision wins; later calls are silent no-ops.
//!  - A `UniqueKillSwitch` controls the single stream it was attached to.
//!  - A `SharedKillSwitch` controls every stream wired through one of its
//!    control points, including streams attached after it was decided.

pub mod core;
pub mod error;
pub mod registry;
pub mod stream;
pub mod switch;

// --- Re-exports for the Public API ---

pub use crate::core::attachment::{AttachmentId, AttachmentState};
pub use crate::core::decision::{Decision, DecisionCell};
pub use crate::core::handler::KillSwitchHandler;

pub use crate::registry::{AttachmentRegistry, Registration};

pub use crate::switch::{
  ControlPoint, KillSwitch, KillSwitches, SharedKillSwitch, SingleKillSwitch, UniqueKillSwitch,
};

pub use crate::stream::{Collect, KillSwitchStage, KillSwitchStreamExt, Last, Sink};

pub use crate::error::{AbortReason, SinkError, SinkResult};

/*
    Typical usage:
    1. Build a source stream.
    2. Either call `source.with_kill_switch()` to get `(stage, UniqueKillSwitch)`,
       or create `SharedKillSwitch::named("...")` and wire `source.via(switch.flow())`
       into as many streams as needed.
    3. Consume the stage (e.g. `Last.run(stage).await`).
    4. From any thread, call `shutdown()` or `abort(reason)` on the switch.
*/
