//! Logship Routing - route matching and sampling policy
//!
//! A [`Route`] binds one input buffer to one output and carries the two
//! pure policy checks an output applies to every event it receives:
//!
//! 1. **Field filter** - every rule key must be present in the event's
//!    fields as a string equal to the rule value
//! 2. **Sample gate** - a uniform percent gate in `[0, 100]`
//!
//! Neither check retains state; both run on the output's consume path.

mod route;
mod sample;

pub use route::Route;
pub use sample::SampleGate;

#[cfg(test)]
mod sample_test;
