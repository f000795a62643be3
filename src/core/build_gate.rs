use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info};

use crate::core::process::{Capture, Invocation, ProcessRunner};
use crate::types::{AppError, AppResult};

/// How binaries are probed, built and fixed up afterwards.
pub trait BuildBackend: Send + Sync {
    /// True if the binary can be launched
    fn probe(&self, binary: &str) -> bool;

    /// Compile and install the binary
    fn build(&self, binary: &str) -> AppResult<()>;

    /// Idempotent post-build step
    fn post_build(&self, _binary: &str) -> AppResult<()> {
        Ok(())
    }
}

/// Compile-if-missing coordination. Every probe and build runs under one
/// lock, so concurrent workers that all find a binary missing trigger a
/// single build.
pub struct BuildGate<B: BuildBackend> {
    backend: B,
    lock: Mutex<()>,
}

impl<B: BuildBackend> BuildGate<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            lock: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Make sure `binary` can be launched, building it if the probe fails.
    ///
    /// Returns whether a build was performed.
    pub fn ensure_available(&self, binary: &str) -> AppResult<bool> {
        self.ensure(binary, false)
    }

    /// Build `binary` unconditionally (still serialized with other builds).
    pub fn force_build(&self, binary: &str) -> AppResult<bool> {
        self.ensure(binary, true)
    }

    fn ensure(&self, binary: &str, force: bool) -> AppResult<bool> {
        // A poisoned lock only means another build panicked; the gate itself holds no data
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if !force && self.backend.probe(binary) {
            debug!("{binary} is available");
            return Ok(false);
        }

        info!("building {binary} ...");
        self.backend.build(binary)?;
        self.backend.post_build(binary)?;
        Ok(true)
    }
}

/// `cargo install` from the source checkout, optionally copying the emulator
/// library next to the installed fuzzer binaries.
pub struct CargoInstall {
    runner: ProcessRunner,
    source_dir: PathBuf,
    bin_dir: PathBuf,
    library: Option<PathBuf>,
}

impl CargoInstall {
    pub fn new(runner: ProcessRunner, source_dir: PathBuf, bin_dir: PathBuf) -> Self {
        Self {
            runner,
            source_dir,
            bin_dir,
            library: None,
        }
    }

    /// Copy `library` into the binary directory after every build
    pub fn with_library(mut self, library: PathBuf) -> Self {
        self.library = Some(library);
        self
    }

    /// Workspace crate that provides `binary`
    pub fn crate_for(binary: &str) -> &'static str {
        if binary.starts_with("hoedur-") && !is_fuzzer_binary(binary) {
            "hoedur-analyze"
        } else {
            "hoedur"
        }
    }
}

/// Installed copy of `binary` in `bin_dir`, else the bare name for a `PATH` lookup
pub fn resolve_binary(bin_dir: &Path, binary: &str) -> PathBuf {
    let installed = bin_dir.join(binary);
    if installed.exists() {
        installed
    } else {
        PathBuf::from(binary)
    }
}

fn is_fuzzer_binary(binary: &str) -> bool {
    !["hoedur-eval-", "hoedur-plot-", "hoedur-coverage-", "hoedur-merge-", "hoedur-reproducer"]
        .iter()
        .any(|prefix| binary.starts_with(prefix))
}

impl BuildBackend for CargoInstall {
    fn probe(&self, binary: &str) -> bool {
        let invocation = Invocation::new(resolve_binary(&self.bin_dir, binary)).arg("--help");
        self.runner.run(&invocation, Capture::Discard, None).is_ok()
    }

    fn build(&self, binary: &str) -> AppResult<()> {
        let crate_dir = self.source_dir.join(Self::crate_for(binary));
        let invocation = Invocation::new("cargo")
            .arg("install")
            .arg("--path")
            .arg(&crate_dir)
            .arg("--bin")
            .arg(binary);

        let output = self.runner.run(&invocation, Capture::Inherit, None)?;
        if !output.success() {
            return Err(AppError::Build {
                binary: binary.to_string(),
                reason: format!("cargo install exited with {}", output.code),
            });
        }
        Ok(())
    }

    fn post_build(&self, binary: &str) -> AppResult<()> {
        let Some(library) = &self.library else {
            return Ok(());
        };
        if !is_fuzzer_binary(binary) {
            return Ok(());
        }
        copy_library(library, &self.bin_dir)
    }
}

fn copy_library(library: &Path, bin_dir: &Path) -> AppResult<()> {
    let file_name = library.file_name().ok_or_else(|| {
        AppError::Config(format!("library path has no file name: {}", library.display()))
    })?;
    fs::create_dir_all(bin_dir)?;
    fs::copy(library, bin_dir.join(file_name))?;
    debug!("copied {} to {}", library.display(), bin_dir.display());
    Ok(())
}
