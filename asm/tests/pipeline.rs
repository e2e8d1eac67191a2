use rkasm::{
    compiler::{phases, CompilationContext, CompilationListener},
    marker::{Marker, MarkerType},
    resource::MemoryResolver,
    unit::{CompilationUnit, Units},
    Compiler, CompilerOption, Error, NullListener, Options, Phase, Program, Resource,
};

#[derive(Default)]
struct Recorder {
    events: Vec<String>,
}

impl CompilationListener for Recorder {
    fn on_start(&mut self, units: &Units) {
        self.events.push(format!("start {}", units.len()));
    }
    fn on_phase_start(&mut self, phase: &str) {
        self.events.push(format!("phase-start {}", phase));
    }
    fn on_phase_success(&mut self, phase: &str) {
        self.events.push(format!("phase-success {}", phase));
    }
    fn on_phase_failure(&mut self, phase: &str) {
        self.events.push(format!("phase-failure {}", phase));
    }
    fn on_phase_skipped(&mut self, phase: &str) {
        self.events.push(format!("phase-skipped {}", phase));
    }
    fn on_unit_success(&mut self, phase: &str, unit: &CompilationUnit) {
        self.events.push(format!("unit-success {} {}", phase, unit.identifier()));
    }
    fn on_unit_failure(&mut self, phase: &str, unit: &CompilationUnit) {
        self.events.push(format!("unit-failure {} {}", phase, unit.identifier()));
    }
    fn on_unit_skipped(&mut self, phase: &str, unit: &CompilationUnit) {
        self.events.push(format!("unit-skipped {} {}", phase, unit.identifier()));
    }
    fn on_success(&mut self) {
        self.events.push("success".to_string());
    }
    fn on_failure(&mut self) {
        self.events.push("failure".to_string());
    }
    fn after_compile(&mut self, units: &Units) {
        self.events.push(format!("after {}", units.len()));
    }
}

/// Notes how many units exist once parsing is over.
struct CountUnits;

impl Phase for CountUnits {
    fn name(&self) -> &str {
        "count-units"
    }

    fn run(&mut self, ctx: &mut CompilationContext) -> Result<(), Error> {
        let count = ctx.units.len();
        ctx.mark(Marker::new(MarkerType::CompileWarning, rkasm::marker::Severity::Info, count.to_string()))?;
        Ok(())
    }
}

struct Explode;

impl Phase for Explode {
    fn name(&self) -> &str {
        "explode"
    }

    fn run(&mut self, _ctx: &mut CompilationContext) -> Result<(), Error> {
        Err(Error::Internal("boom".to_string()))
    }
}

fn program(resolver: &MemoryResolver, names: &[&str]) -> Program {
    let mut program = Program::new();
    for name in names {
        program.add(resolver.resource(name).unwrap());
    }
    program
}

fn library() -> MemoryResolver {
    MemoryResolver::new()
        .with("lib.rk", "helper: ret\n")
        .with("main.rk", ".include \"lib.rk\"\nmain: call helper\n      hlt\n")
}

#[test]
fn default_phase_order() {
    let compiler = Compiler::new();
    assert_eq!(
        compiler.phase_names(),
        vec![
            phases::PARSE,
            phases::VALIDATE_REFERENCES,
            phases::RESOLVE_ADDRESSES,
            phases::FOLD_EXPRESSIONS,
            phases::VALIDATE_PRE_CODEGEN,
            phases::GENERATE_CODE,
        ]
    );
    assert!(compiler.get_phase(phases::RESOLVE_ADDRESSES).unwrap().abort_on_error);
    assert!(!compiler.get_phase(phases::PARSE).unwrap().abort_on_error);
}

#[test]
fn unit_list_grows_during_parse() {
    let resolver = library();
    let mut program = program(&resolver, &["main.rk"]);
    assert_eq!(program.units.len(), 1);

    let mut compiler = Compiler::new().with_resolver(Box::new(resolver));
    compiler.insert_after(phases::PARSE, Box::new(CountUnits)).unwrap();
    let mut recorder = Recorder::default();
    assert!(compiler.compile(&mut program, &mut recorder));

    assert_eq!(program.units.len(), 2);
    // Both units were parsed and counted in the same run
    for unit in program.units.iter() {
        let notes = unit.markers(Some(MarkerType::CompileWarning));
        assert_eq!(notes[0].message, "2");
        assert!(unit.object_code().is_some());
    }
    assert!(recorder.events.contains(&"unit-success parse lib.rk".to_string()));
    let lib = program.units.find_by_name("lib.rk").unwrap();
    let main = program.units.find_by_name("main.rk").unwrap();
    assert_eq!(program.units.unit(main).unwrap().dependencies(), &[lib]);
}

#[test]
fn units_are_laid_out_one_after_another() {
    let resolver = library();
    let mut program = program(&resolver, &["main.rk"]);
    let mut compiler = Compiler::new().with_resolver(Box::new(resolver));
    assert!(compiler.compile(&mut program, &mut NullListener));

    // main: call helper (forward, 2 words) + hlt; lib continues at 3
    let main = program.units.unit(program.units.find_by_name("main.rk").unwrap()).unwrap();
    let lib = program.units.unit(program.units.find_by_name("lib.rk").unwrap()).unwrap();
    assert_eq!(main.start_address(), 0);
    assert_eq!(main.end_address(), Some(3));
    assert_eq!(lib.start_address(), 3);
    let helper = program.symbols.global("helper").unwrap();
    assert_eq!(program.symbols.value_of(helper), Some(3));
}

#[test]
fn listener_sees_every_step_once() {
    let resolver = MemoryResolver::new().with("a.rk", "a: nop\n");
    let mut program = program(&resolver, &["a.rk"]);
    let mut compiler = Compiler::new().with_resolver(Box::new(resolver));
    let mut recorder = Recorder::default();
    assert!(compiler.compile(&mut program, &mut recorder));

    let events = &recorder.events;
    assert_eq!(events.first().map(String::as_str), Some("start 1"));
    assert_eq!(events.last().map(String::as_str), Some("after 1"));
    assert_eq!(events.iter().filter(|e| e.starts_with("phase-start")).count(), 6);
    assert_eq!(events.iter().filter(|e| e.starts_with("phase-success")).count(), 6);
    assert!(events.contains(&"success".to_string()));
    assert!(!events.contains(&"failure".to_string()));
}

#[test]
fn internal_errors_become_generic_markers() {
    let resolver = MemoryResolver::new().with("a.rk", "a: nop\n");
    let mut program = program(&resolver, &["a.rk"]);
    let mut compiler = Compiler::new().with_resolver(Box::new(resolver));
    compiler.insert_after(phases::PARSE, Box::new(Explode)).unwrap();
    let mut recorder = Recorder::default();

    assert!(!compiler.compile(&mut program, &mut recorder));

    let unit = program.units.iter().next().unwrap();
    let generic = unit.markers(Some(MarkerType::GenericError));
    assert_eq!(generic.len(), 1);
    assert!(generic[0].cause.as_deref().unwrap().contains("boom"));

    let events = &recorder.events;
    assert!(events.contains(&"unit-failure explode a.rk".to_string()));
    assert!(events.contains(&"phase-failure explode".to_string()));
    assert!(events.contains(&"unit-skipped validate-references a.rk".to_string()));
    assert!(events.contains(&"phase-skipped resolve-addresses".to_string()));
    assert!(!events.iter().any(|e| e.contains("generate-code")));
    assert!(events.contains(&"failure".to_string()));
    assert_eq!(events.last().map(String::as_str), Some("after 1"));
}

#[test]
fn failing_unit_does_not_fail_the_others() {
    let resolver = MemoryResolver::new()
        .with("good.rk", "good: nop\n")
        .with("bad.rk", ".org 0x10\nbad: jmp nowhere\n");
    let mut program = program(&resolver, &["good.rk", "bad.rk"]);
    let mut compiler = Compiler::new().with_resolver(Box::new(resolver));
    let mut recorder = Recorder::default();

    assert!(!compiler.compile(&mut program, &mut recorder));
    assert!(recorder.events.contains(&"unit-success validate-references good.rk".to_string()));
    assert!(recorder.events.contains(&"unit-failure validate-references bad.rk".to_string()));

    let bad = program.units.unit(program.units.find_by_name("bad.rk").unwrap()).unwrap();
    let errors = bad.markers(Some(MarkerType::CompileError));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Unknown symbol `nowhere`");
    assert_eq!(errors[0].location.map(|l| l.line), Some(1));
}

#[test]
fn pipeline_editing() {
    let mut compiler = Compiler::new();
    assert!(matches!(
        compiler.insert_before("missing", Box::new(Explode)),
        Err(Error::NoSuchPhase(_))
    ));
    compiler.insert_before(phases::PARSE, Box::new(Explode)).unwrap();
    assert_eq!(compiler.phase_names()[0], "explode");
    assert!(matches!(
        compiler.insert_after(phases::GENERATE_CODE, Box::new(Explode)),
        Err(Error::DuplicateName(_))
    ));

    let removed = compiler.remove("explode").unwrap();
    assert_eq!(removed.name(), "explode");
    assert!(matches!(compiler.remove("explode"), Err(Error::NoSuchPhase(_))));

    let old = compiler
        .replace(phases::FOLD_EXPRESSIONS, Box::new(phases::FoldExpressions))
        .unwrap();
    assert_eq!(old.name(), phases::FOLD_EXPRESSIONS);
    assert!(matches!(
        compiler.replace(phases::FOLD_EXPRESSIONS, Box::new(phases::Parse)),
        Err(Error::DuplicateName(_))
    ));
    assert!(matches!(compiler.stop_after("missing"), Err(Error::NoSuchPhase(_))));
}

#[test]
fn stop_after_halts_the_pipeline() {
    let resolver = MemoryResolver::new().with("a.rk", "a: nop\n");
    let mut program = program(&resolver, &["a.rk"]);
    let mut compiler = Compiler::new().with_resolver(Box::new(resolver));
    compiler.stop_after(phases::RESOLVE_ADDRESSES).unwrap();
    let mut recorder = Recorder::default();

    assert!(compiler.compile(&mut program, &mut recorder));
    let unit = program.units.iter().next().unwrap();
    assert!(unit.ast().is_some());
    assert!(unit.object_code().is_none());
    assert!(!recorder.events.iter().any(|e| e.contains(phases::FOLD_EXPRESSIONS)));
}

#[test]
fn recompiling_starts_fresh() {
    let resolver = MemoryResolver::new().with("a.rk", "a: nop\n");
    let mut program = program(&resolver, &["a.rk"]);
    let mut compiler = Compiler::new().with_resolver(Box::new(resolver));
    assert!(compiler.compile(&mut program, &mut NullListener));
    // Redefining `a` would clash if symbols survived
    assert!(compiler.compile(&mut program, &mut NullListener));
    assert!(program.units.iter().all(|u| u.markers(None).is_empty()));
}

#[test]
fn includes_can_be_switched_off() {
    let resolver = library();
    let mut program = program(&resolver, &["main.rk"]);
    let options = Options::new().with(CompilerOption::NoSourceIncludeProcessing);
    let mut compiler = Compiler::new()
        .with_resolver(Box::new(resolver))
        .with_options(options);

    // `helper` is never defined without the include
    assert!(!compiler.compile(&mut program, &mut NullListener));
    assert_eq!(program.units.len(), 1);
    let unit = program.units.iter().next().unwrap();
    assert_eq!(unit.markers(Some(MarkerType::CompileWarning)).len(), 1);
}

#[test]
fn bad_includes_are_markers() {
    let resolver = MemoryResolver::new()
        .with("a.rk", ".include \"gone.rk\"\n.include \"a.rk\"\nnop\n");
    let mut program = program(&resolver, &["a.rk"]);
    let mut compiler = Compiler::new().with_resolver(Box::new(resolver));

    assert!(!compiler.compile(&mut program, &mut NullListener));
    let unit = program.units.iter().next().unwrap();
    let errors = unit.markers(Some(MarkerType::CompileError));
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].location.map(|l| l.line), Some(0));
    assert!(errors[1].message.contains("includes itself"));
}

#[test]
fn duplicate_labels_point_at_the_first_definition() {
    let resolver = MemoryResolver::new()
        .with("a.rk", "start: nop\n")
        .with("b.rk", ".org 0x10\n\nstart: nop\n");
    let mut program = program(&resolver, &["a.rk", "b.rk"]);
    let mut compiler = Compiler::new().with_resolver(Box::new(resolver));

    assert!(!compiler.compile(&mut program, &mut NullListener));
    let b = program.units.unit(program.units.find_by_name("b.rk").unwrap()).unwrap();
    let errors = b.markers(Some(MarkerType::CompileError));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Duplicate symbol `start`, first defined at a.rk:1:1");
}

#[test]
fn resource_read_failure_is_a_marker() {
    let mut program = Program::new();
    program.add(Resource::file("/definitely/not/here.rk"));
    let mut compiler = Compiler::new();
    assert!(!compiler.compile(&mut program, &mut NullListener));
    assert!(program.units.iter().next().unwrap().has_errors());
}
