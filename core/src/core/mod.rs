pub mod attachment;
pub mod decision;
pub mod handler;

// Re-export key types for easier access from other sluice modules (and lib.rs)
pub use attachment::{AttachmentId, AttachmentState};
pub use decision::{Decision, DecisionCell};
pub use handler::KillSwitchHandler;
