//! Scheduler runner -- owns the cadence loops and their lifecycle.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, constructor, and accessor methods
//! - `execution`: startup refresh and the per-cadence tick loops
//! - `shutdown`: cancellation with a bounded wait for in-flight runs

mod core;
mod execution;
mod shutdown;
#[cfg(test)]
mod tests;

pub use self::core::Scheduler;
