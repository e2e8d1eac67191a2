use rkasm::{
    expr::{BinOp, Expr},
    marker::{Location, MarkerType},
    resource::MemoryResolver,
    symbols::{CycleChecker, Symbol, SymbolTable},
    unit::UnitId,
    Compiler, NullListener, Program,
};

fn equation(name: &str, unit: usize, expr: Expr) -> Symbol {
    Symbol::equation(name, UnitId(unit), Location::default(), expr)
}

fn plus_one(name: &str) -> Expr {
    Expr::binary(Expr::ident(name), BinOp::Add, Expr::Number(1))
}

#[test]
fn mutual_cycle_is_severed() {
    let mut table = SymbolTable::new();
    let a = table.define_symbol(equation("A", 0, plus_one("B"))).unwrap();
    let b = table.define_symbol(equation("B", 0, plus_one("A"))).unwrap();

    let mut checker = CycleChecker::new();
    let markers = checker.check_unit(&mut table, UnitId(0));

    assert_eq!(markers.len(), 2);
    let messages: Vec<&str> = markers.iter().map(|(_, m)| m.message.as_str()).collect();
    assert!(messages.contains(&"Circular equation: A <-> B <-> A"));
    assert!(messages.contains(&"Circular equation: B <-> A <-> B"));
    assert!(table.symbol(a).unwrap().expr().is_none());
    assert!(table.symbol(b).unwrap().expr().is_none());
    assert!(checker.is_poisoned(a) && checker.is_poisoned(b));

    // Poisoned equations have no value and are not reported twice
    assert_eq!(table.value_of(a), None);
    assert!(checker.check_unit(&mut table, UnitId(0)).is_empty());
}

#[test]
fn self_reference_is_a_cycle() {
    let mut table = SymbolTable::new();
    let x = table.define_symbol(equation("X", 0, plus_one("X"))).unwrap();
    let markers = CycleChecker::new().check_unit(&mut table, UnitId(0));
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].1.message, "Circular equation: X <-> X");
    assert!(table.symbol(x).unwrap().expr().is_none());
}

#[test]
fn only_cycle_members_are_poisoned() {
    let mut table = SymbolTable::new();
    let top = table.define_symbol(equation("TOP", 0, plus_one("A"))).unwrap();
    table.define_symbol(equation("A", 0, plus_one("B"))).unwrap();
    table.define_symbol(equation("B", 0, plus_one("A"))).unwrap();
    let fine = table.define_symbol(equation("FINE", 0, Expr::Number(7))).unwrap();

    let markers = CycleChecker::new().check_unit(&mut table, UnitId(0));
    assert_eq!(markers.len(), 2);
    assert!(table.symbol(top).unwrap().expr().is_some());
    assert_eq!(table.value_of(top), None);
    assert_eq!(table.value_of(fine), Some(7));
}

#[test]
fn markers_go_to_the_owning_unit() {
    let mut table = SymbolTable::new();
    table.define_symbol(equation("A", 0, plus_one("B"))).unwrap();
    table.define_symbol(equation("B", 1, plus_one("A"))).unwrap();

    let markers = CycleChecker::new().check_unit(&mut table, UnitId(0));
    let mut owners: Vec<UnitId> = markers.iter().map(|(u, _)| *u).collect();
    owners.sort();
    assert_eq!(owners, vec![UnitId(0), UnitId(1)]);
}

#[test]
fn labels_end_the_walk() {
    let mut table = SymbolTable::new();
    let mut start = Symbol::label("start", UnitId(0), Location::default());
    start.set_address(Some(0x20));
    table.define_symbol(start).unwrap();
    let end = table
        .define_symbol(equation("END", 0, plus_one("start")))
        .unwrap();

    assert!(CycleChecker::new().check_unit(&mut table, UnitId(0)).is_empty());
    assert_eq!(table.value_of(end), Some(0x21));
}

#[test]
fn pipeline_reports_one_marker_per_equation() {
    let source = ".equ A B + 1\n.equ B A + 1\n.equ C 3\nnop\n";
    let mut program = Program::new();
    let unit = program.add(rkasm::Resource::text("cycle.rk", source));
    let mut compiler = Compiler::new().with_resolver(Box::new(MemoryResolver::new()));

    assert!(!compiler.compile(&mut program, &mut NullListener));

    let unit = program.units.unit(unit).unwrap();
    let errors = unit.markers(Some(MarkerType::CompileError));
    let circular: Vec<_> = errors
        .iter()
        .filter(|m| m.message.starts_with("Circular equation"))
        .collect();
    assert_eq!(circular.len(), 2);
    assert_eq!(circular[0].location.map(|l| l.line), Some(0));
    assert_eq!(circular[1].location.map(|l| l.line), Some(1));

    let c = program.symbols.global("C").unwrap();
    assert_eq!(program.symbols.value_of(c), Some(3));
}
