// sluice/src/stream/mod.rs

//! Stream integration: the control stage switches attach to, an extension
//! trait for wiring it in, and simple consumers.

pub mod ext;
pub mod sink;
pub mod stage;

pub use ext::KillSwitchStreamExt;
pub use sink::{Collect, Last, Sink};
pub use stage::KillSwitchStage;
