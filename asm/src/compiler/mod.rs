mod context;
mod listener;
pub mod phases;

pub use context::CompilationContext;
pub use listener::{CompilationListener, LogListener, NullListener};
pub use phases::Phase;

use crate::{
    error::Error,
    marker::Marker,
    options::{CompilerOption, Options},
    program::Program,
    resource::{FileResolver, IdentifierMatcher, ResourceMatcher, ResourceResolver},
    symbols::CycleChecker,
    writer::{MemoryWriterFactory, WriterFactory},
};
use log::{debug, error, trace};

/// A phase and how the pipeline reacts to it.
pub struct PhaseSlot {
    phase: Box<dyn Phase>,
    pub abort_on_error: bool,
    pub stop_after_execution: bool,
}

impl PhaseSlot {
    pub fn new(phase: Box<dyn Phase>) -> Self {
        Self {
            phase,
            abort_on_error: false,
            stop_after_execution: false,
        }
    }

    pub fn aborting(mut self) -> Self {
        self.abort_on_error = true;
        self
    }

    pub fn name(&self) -> &str {
        self.phase.name()
    }

    pub fn phase(&self) -> &dyn Phase {
        self.phase.as_ref()
    }
}

/// Ordered, editable pipeline of phases run over every unit of a program.
pub struct Compiler {
    phases: Vec<PhaseSlot>,
    options: Options,
    writers: Box<dyn WriterFactory>,
    resolver: Box<dyn ResourceResolver>,
    matcher: Box<dyn ResourceMatcher>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            phases: phases::default_phases(),
            options: Options::new(),
            writers: Box::new(MemoryWriterFactory),
            resolver: Box::new(FileResolver::default()),
            matcher: Box::new(IdentifierMatcher),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn with_writers(mut self, writers: Box<dyn WriterFactory>) -> Self {
        self.writers = writers;
        self
    }

    pub fn with_resolver(mut self, resolver: Box<dyn ResourceResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_matcher(mut self, matcher: Box<dyn ResourceMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn resolver(&self) -> &dyn ResourceResolver {
        self.resolver.as_ref()
    }

    pub fn matcher(&self) -> &dyn ResourceMatcher {
        self.matcher.as_ref()
    }

    // ------------------------------------------------------------------------
    // Pipeline editing

    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.iter().map(PhaseSlot::name).collect()
    }

    fn position(&self, name: &str) -> Result<usize, Error> {
        self.phases
            .iter()
            .position(|slot| slot.name() == name)
            .ok_or_else(|| Error::NoSuchPhase(name.to_string()))
    }

    fn check_unique(&self, phase: &dyn Phase) -> Result<(), Error> {
        match self.phases.iter().any(|slot| slot.name() == phase.name()) {
            true => Err(Error::DuplicateName(phase.name().to_string())),
            false => Ok(()),
        }
    }

    pub fn get_phase(&self, name: &str) -> Result<&PhaseSlot, Error> {
        let index = self.position(name)?;
        Ok(&self.phases[index])
    }

    pub fn get_phase_mut(&mut self, name: &str) -> Result<&mut PhaseSlot, Error> {
        let index = self.position(name)?;
        Ok(&mut self.phases[index])
    }

    pub fn insert_before(&mut self, name: &str, phase: Box<dyn Phase>) -> Result<(), Error> {
        let index = self.position(name)?;
        self.check_unique(phase.as_ref())?;
        self.phases.insert(index, PhaseSlot::new(phase));
        Ok(())
    }

    pub fn insert_after(&mut self, name: &str, phase: Box<dyn Phase>) -> Result<(), Error> {
        let index = self.position(name)?;
        self.check_unique(phase.as_ref())?;
        self.phases.insert(index + 1, PhaseSlot::new(phase));
        Ok(())
    }

    /// Swap the phase in a slot, keeping the slot's flags.
    pub fn replace(&mut self, name: &str, phase: Box<dyn Phase>) -> Result<Box<dyn Phase>, Error> {
        let index = self.position(name)?;
        if phase.name() != name {
            self.check_unique(phase.as_ref())?;
        }
        Ok(std::mem::replace(&mut self.phases[index].phase, phase))
    }

    pub fn remove(&mut self, name: &str) -> Result<PhaseSlot, Error> {
        let index = self.position(name)?;
        Ok(self.phases.remove(index))
    }

    /// Stop the pipeline once `name` has run.
    pub fn stop_after(&mut self, name: &str) -> Result<(), Error> {
        for slot in self.phases.iter_mut() {
            slot.stop_after_execution = false;
        }
        self.get_phase_mut(name)?.stop_after_execution = true;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Compile

    /// Run every phase over every unit. Returns whether the program
    /// compiled without errors.
    pub fn compile(&mut self, program: &mut Program, listener: &mut dyn CompilationListener) -> bool {
        let Compiler {
            phases,
            options,
            writers,
            resolver,
            matcher,
        } = self;
        let Program { units, symbols } = program;

        // 1. Forget the previous compilation
        for unit in units.iter_mut() {
            unit.before_compilation_start();
        }
        symbols.clear();
        let mut cycles = CycleChecker::new();
        listener.on_start(units);

        // 2. Phases in order, units in order (the order may grow)
        let mut aborted = false;
        for slot in phases.iter_mut() {
            let name = slot.name().to_string();
            if slot.abort_on_error && units.has_errors() {
                debug!("Not running {}: program has errors", name);
                listener.on_phase_skipped(&name);
                aborted = true;
                break;
            }

            listener.on_phase_start(&name);
            let mut failed = false;
            let mut index = 0;
            while index < units.order().len() {
                let id = units.order()[index];
                index += 1;
                let Some(unit) = units.get(id) else {
                    continue;
                };
                if !slot.phase.should_process(unit) {
                    listener.on_unit_skipped(&name, unit);
                    continue;
                }
                listener.on_unit_start(&name, unit);

                let mut ctx = CompilationContext {
                    unit: id,
                    units: &mut *units,
                    symbols: &mut *symbols,
                    options: &*options,
                    writers: &**writers,
                    resolver: &**resolver,
                    matcher: &**matcher,
                    cycles: &mut cycles,
                };
                if let Err(e) = slot.phase.run(&mut ctx) {
                    error!("{} failed on {}: {}", name, id, e);
                    if let Some(unit) = units.get_mut(id) {
                        let message = format!("Internal error in phase `{}`", name);
                        unit.add_marker(Marker::generic(message, e.to_string()));
                    }
                }

                let Some(unit) = units.get(id) else {
                    continue;
                };
                if options.has(CompilerOption::DebugMode) {
                    for node in unit.ast().into_iter().flat_map(|ast| ast.iter()) {
                        trace!("{} {}: {:?} {:?}", name, unit.identifier(), node.address, node.stmt);
                    }
                }
                if unit.has_errors() {
                    failed = true;
                    listener.on_unit_failure(&name, unit);
                    if slot.abort_on_error {
                        break;
                    }
                } else {
                    listener.on_unit_success(&name, unit);
                }
            }

            if failed {
                listener.on_phase_failure(&name);
                if slot.abort_on_error {
                    aborted = true;
                    break;
                }
            } else {
                listener.on_phase_success(&name);
            }
            if slot.stop_after_execution {
                debug!("Stopping after {}", name);
                break;
            }
        }

        // 3. Outcome
        let success = !aborted && !units.has_errors();
        match success {
            true => listener.on_success(),
            false => listener.on_failure(),
        }
        listener.after_compile(units);
        success
    }
}
