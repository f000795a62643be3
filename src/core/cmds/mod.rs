pub mod bug_combinations;
pub mod coverage;
pub mod coverage_list;
pub mod crash_time;
pub mod executions;
pub mod fuzz;
pub mod fuzz_local;
pub mod merge_group;
pub mod plot_data;
pub mod reproducers;

pub use bug_combinations::execute_bug_combinations;
pub use coverage::execute_coverage;
pub use coverage_list::execute_coverage_list;
pub use crash_time::execute_crash_time;
pub use executions::execute_executions;
pub use fuzz::execute_fuzz;
pub use fuzz_local::execute_fuzz_local;
pub use merge_group::execute_merge_group;
pub use plot_data::execute_plot_data;
pub use reproducers::execute_reproducers;
