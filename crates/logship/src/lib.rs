//! Logship - best-effort log-shipping pipeline
//!
//! Wires the pieces together: a [`Registry`] of input/output constructors
//! and a [`Server`] that instantiates buffers, inputs, and outputs from
//! configuration, runs them, and stops them in order.
//!
//! Delivery is best-effort with backpressure: producers block on full
//! input queues, slow outputs drop their own events, and nothing is
//! spooled across restarts.

mod registry;
mod server;

pub use registry::{InputSpec, OutputSpec, Registry};
pub use server::{RunningServer, Server, ServerError};
