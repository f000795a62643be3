pub mod config;
mod crash;
mod error;
mod job;
mod throughput;
mod timing;
mod tree;

pub use crash::*;
pub use error::*;
pub use job::*;
pub use throughput::*;
pub use timing::*;
pub use tree::*;
