pub mod core;

// Re-export key items for easy importing in this crate
pub use core::types;

// Re-export key items for easy importing in other crates
pub use core::build_gate::{BuildBackend, BuildGate};
pub use core::harness::Harness;
pub use core::main_shared::run_main;
pub use core::pool::WorkerPool;
pub use core::process::{Capture, Invocation, ProcessRunner};
pub use core::queue::WorkQueue;
