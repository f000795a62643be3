pub mod build_gate;
pub mod cli;
pub mod cmds;
pub mod corpus;
pub mod harness;
pub mod logging;
pub mod main_shared;
pub mod pool;
pub mod process;
pub mod queue;
pub mod types;
pub mod writers;
