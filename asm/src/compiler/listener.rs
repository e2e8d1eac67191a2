use crate::unit::{CompilationUnit, Units};
use log::{debug, info, warn};

/// Progress notifications from the compiler. Every method defaults to
/// doing nothing.
pub trait CompilationListener {
    fn on_start(&mut self, _units: &Units) {}

    fn on_phase_start(&mut self, _phase: &str) {}
    fn on_phase_success(&mut self, _phase: &str) {}
    fn on_phase_failure(&mut self, _phase: &str) {}
    fn on_phase_skipped(&mut self, _phase: &str) {}

    fn on_unit_start(&mut self, _phase: &str, _unit: &CompilationUnit) {}
    fn on_unit_success(&mut self, _phase: &str, _unit: &CompilationUnit) {}
    fn on_unit_failure(&mut self, _phase: &str, _unit: &CompilationUnit) {}
    fn on_unit_skipped(&mut self, _phase: &str, _unit: &CompilationUnit) {}

    fn on_success(&mut self) {}
    fn on_failure(&mut self) {}

    /// Called exactly once per compilation, whatever the outcome.
    fn after_compile(&mut self, _units: &Units) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullListener;

impl CompilationListener for NullListener {}

/// Reports progress through `log`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogListener;

impl CompilationListener for LogListener {
    fn on_start(&mut self, units: &Units) {
        info!("Compiling {} unit(s)", units.order().len());
    }

    fn on_phase_start(&mut self, phase: &str) {
        debug!("[{}] start", phase);
    }

    fn on_phase_success(&mut self, phase: &str) {
        debug!("[{}] done", phase);
    }

    fn on_phase_failure(&mut self, phase: &str) {
        warn!("[{}] failed", phase);
    }

    fn on_phase_skipped(&mut self, phase: &str) {
        warn!("[{}] skipped, earlier errors", phase);
    }

    fn on_unit_start(&mut self, phase: &str, unit: &CompilationUnit) {
        debug!("[{}] {}", phase, unit.identifier());
    }

    fn on_unit_failure(&mut self, phase: &str, unit: &CompilationUnit) {
        warn!("[{}] {} has errors", phase, unit.identifier());
    }

    fn on_unit_skipped(&mut self, phase: &str, unit: &CompilationUnit) {
        debug!("[{}] {} skipped", phase, unit.identifier());
    }

    fn on_success(&mut self) {
        info!("Compilation succeeded");
    }

    fn on_failure(&mut self) {
        warn!("Compilation failed");
    }
}
