//! Client side of the scry pipeline: the typing-finality state machine, the
//! offline-resilient pending queue, and the single-flight search dispatcher.
//!
//! The state machine is pure (time is injected), so the whole
//! keystroke-to-final pipeline is testable without a runtime or a network.

pub mod client;
pub mod dispatch;
pub mod queue;
pub mod session;
