use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::core::build_gate::{BuildGate, CargoInstall, resolve_binary};
use crate::core::pool::WorkerPool;
use crate::core::process::{Capture, Invocation, ProcessOutput, ProcessRunner};
use crate::types::config::{Config, ToolsConfig};
use crate::types::{AppError, AppResult};

/// Shared state for one harness invocation: tool locations, the process
/// runner, the build gate and pool sizing.
pub struct Harness {
    tools: ToolsConfig,
    runner: ProcessRunner,
    gate: BuildGate<CargoInstall>,
    running: Arc<AtomicBool>,
    cores: usize,
    fuzz_cores: usize,
    progress: bool,
}

impl Harness {
    pub fn new(tools: ToolsConfig, runner: ProcessRunner, cores: usize) -> Self {
        let backend = CargoInstall::new(runner.clone(), tools.source_dir(), tools.bin_dir())
            .with_library(tools.qemu_library());
        Self {
            gate: BuildGate::new(backend),
            tools,
            runner,
            running: Arc::new(AtomicBool::new(true)),
            cores: cores.max(1),
            fuzz_cores: cores.max(1),
            progress: false,
        }
    }

    pub fn from_config(config: &Config, running: Arc<AtomicBool>) -> Self {
        let pool = config.pool();
        let mut harness = Self::new(config.tools(), ProcessRunner::new(), pool.cores());
        harness.fuzz_cores = pool.fuzz_cores();
        harness.progress = pool.progress();
        harness.running = running;
        harness
    }

    pub fn tools(&self) -> &ToolsConfig {
        &self.tools
    }

    pub fn cores(&self) -> usize {
        self.cores
    }

    pub fn fuzz_cores(&self) -> usize {
        self.fuzz_cores
    }

    /// Pool sized for analysis jobs
    pub fn pool(&self) -> WorkerPool {
        self.pool_with(self.cores)
    }

    pub fn pool_with(&self, workers: usize) -> WorkerPool {
        WorkerPool::new(workers)
            .with_running(Arc::clone(&self.running))
            .with_progress_bar(self.progress)
    }

    /// Build `binary` if it cannot be launched and return the path to run
    pub fn tool(&self, binary: &str) -> AppResult<PathBuf> {
        self.gate.ensure_available(binary)?;
        Ok(resolve_binary(&self.tools.bin_dir(), binary))
    }

    pub fn run(
        &self,
        invocation: &Invocation,
        capture: Capture,
        timeout: Option<Duration>,
    ) -> AppResult<ProcessOutput> {
        self.runner.run(invocation, capture, timeout)
    }

    /// Run an analysis tool to completion and fail on a non-zero exit code
    pub fn run_checked(&self, invocation: &Invocation, capture: Capture) -> AppResult<ProcessOutput> {
        let output = self.runner.run(invocation, capture, None)?;
        if !output.success() {
            return Err(AppError::ToolFailed {
                tool: invocation.program().to_string_lossy().into_owned(),
                code: output.code,
            });
        }
        Ok(output)
    }
}
