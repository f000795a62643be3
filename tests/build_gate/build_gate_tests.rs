use std::sync::Barrier;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use fuzzeval::types::{AppError, AppResult};
use fuzzeval::{BuildBackend, BuildGate};
use pretty_assertions::assert_eq;

/// Binary becomes available once built; every build is counted.
#[derive(Default)]
struct CountingBackend {
    installed: AtomicBool,
    builds: AtomicUsize,
    fixups: AtomicUsize,
    fail: bool,
}

impl BuildBackend for CountingBackend {
    fn probe(&self, _binary: &str) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    fn build(&self, binary: &str) -> AppResult<()> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        // Long enough for the other workers to pile up on the gate
        thread::sleep(Duration::from_millis(100));
        if self.fail {
            return Err(AppError::Build {
                binary: binary.to_string(),
                reason: "compiler error".to_string(),
            });
        }
        self.installed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn post_build(&self, _binary: &str) -> AppResult<()> {
        self.fixups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn concurrent_missing_probes_build_once() {
    let gate = BuildGate::new(CountingBackend::default());
    let barrier = Barrier::new(2);

    let built: Vec<bool> = thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    gate.ensure_available("hoedur-eval-crash").unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(gate.backend().builds.load(Ordering::SeqCst), 1);
    assert_eq!(gate.backend().fixups.load(Ordering::SeqCst), 1);
    assert_eq!(built.iter().filter(|did_build| **did_build).count(), 1);
}

#[test]
fn many_workers_still_build_once() {
    let gate = BuildGate::new(CountingBackend::default());
    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| gate.ensure_available("hoedur-arm").unwrap());
        }
    });
    assert_eq!(gate.backend().builds.load(Ordering::SeqCst), 1);
}

#[test]
fn forced_build_skips_the_probe() {
    let backend = CountingBackend::default();
    backend.installed.store(true, Ordering::SeqCst);
    let gate = BuildGate::new(backend);

    assert!(!gate.ensure_available("hoedur-arm").unwrap());
    assert!(gate.force_build("hoedur-arm").unwrap());
    assert_eq!(gate.backend().builds.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_build_is_reported_without_fixup() {
    let gate = BuildGate::new(CountingBackend {
        fail: true,
        ..Default::default()
    });
    let result = gate.ensure_available("hoedur-plot-data");
    assert!(matches!(result, Err(AppError::Build { .. })));
    assert_eq!(gate.backend().fixups.load(Ordering::SeqCst), 0);
}
