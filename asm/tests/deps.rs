use rkasm::{
    deps::{compilation_order, ByCompilationRoot, ByStartAddress, DependencyGraph},
    resource::{IdentifierMatcher, MemoryResolver},
    unit::{UnitId, Units},
    Error, Resource,
};

fn setup(files: &[(&str, &str)], given: &[&str]) -> (Units, MemoryResolver) {
    let mut resolver = MemoryResolver::new();
    for (name, text) in files {
        resolver.insert(name, text);
    }
    let mut units = Units::new();
    for name in given {
        units.add(resolver.resource(name).unwrap());
    }
    (units, resolver)
}

fn names(units: &Units, order: &[UnitId]) -> Vec<String> {
    order
        .iter()
        .map(|id| units.unit(*id).unwrap().identifier().to_string())
        .collect()
}

#[test]
fn linearize_puts_dependencies_first() {
    let files = [
        ("a.rk", "a: nop"),
        ("b.rk", ".include \"a.rk\"\nb: nop"),
        ("c.rk", ".include \"b.rk\"\nc: nop"),
    ];
    let (mut units, resolver) = setup(&files, &["a.rk", "b.rk", "c.rk"]);
    let graph = DependencyGraph::build(&mut units, &resolver, &IdentifierMatcher).unwrap();

    let roots = graph.roots();
    assert_eq!(names(&units, &roots), vec!["c.rk"]);
    assert_eq!(names(&units, &graph.linearize(roots[0])), vec!["a.rk", "b.rk", "c.rk"]);

    let b = units.find_by_name("b.rk").unwrap();
    let node = graph.node(b).unwrap();
    assert_eq!(names(&units, &node.dependencies.iter().copied().collect::<Vec<_>>()), vec!["a.rk"]);
    assert_eq!(names(&units, &node.dependents.iter().copied().collect::<Vec<_>>()), vec!["c.rk"]);
}

#[test]
fn shared_dependency_appears_once() {
    let files = [
        ("io.rk", "putc: ret"),
        ("a.rk", ".include \"io.rk\"\na: nop"),
        ("main.rk", ".include \"a.rk\"\n.include \"io.rk\"\nmain: nop"),
    ];
    let (mut units, resolver) = setup(&files, &["main.rk"]);
    let order = compilation_order(&mut units, &resolver, &IdentifierMatcher, &ByStartAddress).unwrap();
    assert_eq!(names(&units, &order), vec!["io.rk", "a.rk", "main.rk"]);
}

#[test]
fn discovery_adds_unseen_units() {
    let files = [("lib.rk", "lib: ret"), ("main.rk", ".include \"lib.rk\"\nmain: nop")];
    let (mut units, resolver) = setup(&files, &["main.rk"]);
    assert_eq!(units.len(), 1);
    let order = compilation_order(&mut units, &resolver, &IdentifierMatcher, &ByStartAddress).unwrap();
    assert_eq!(units.len(), 2);
    assert_eq!(names(&units, &order), vec!["lib.rk", "main.rk"]);
}

#[test]
fn directives_in_strings_and_comments_are_ignored() {
    let files = [
        ("x.rk", "x: nop"),
        ("main.rk", "; .include \"x.rk\"\n.word '.'\nmain: nop"),
    ];
    let (mut units, resolver) = setup(&files, &["main.rk"]);
    let graph = DependencyGraph::build(&mut units, &resolver, &IdentifierMatcher).unwrap();
    assert_eq!(units.len(), 1);
    assert!(graph.nodes().all(|n| n.dependencies.is_empty()));
}

#[test]
fn roots_are_ordered_by_start_address() {
    let files = [
        ("high.rk", ".org 0x200\nhigh: nop"),
        ("low.rk", ".org 0x100\nlow: nop"),
        ("zero.rk", "zero: nop"),
    ];
    let (mut units, resolver) = setup(&files, &["high.rk", "low.rk", "zero.rk"]);
    let order = compilation_order(&mut units, &resolver, &IdentifierMatcher, &ByStartAddress).unwrap();
    assert_eq!(names(&units, &order), vec!["zero.rk", "low.rk", "high.rk"]);
}

#[test]
fn equal_start_addresses_are_ambiguous() {
    let files = [("a.rk", ".org 0x100\na: nop"), ("b.rk", ".org 0x100\nb: nop")];
    let (mut units, resolver) = setup(&files, &["a.rk", "b.rk"]);
    let result = compilation_order(&mut units, &resolver, &IdentifierMatcher, &ByStartAddress);
    match result {
        Err(Error::AmbiguousCompilationOrder(_, _, address)) => assert_eq!(address, 0x100),
        other => panic!("expected ambiguity, got {:?}", other),
    }
}

#[test]
fn first_origin_wins() {
    let files = [("a.rk", ".org 0x300\na: nop\n.org 0x10"), ("b.rk", ".org 0x200\nb: nop")];
    let (mut units, resolver) = setup(&files, &["a.rk", "b.rk"]);
    let graph = DependencyGraph::build(&mut units, &resolver, &IdentifierMatcher).unwrap();
    let a = units.find_by_name("a.rk").unwrap();
    assert_eq!(graph.node(a).unwrap().start_address, 0x300);
}

#[test]
fn compilation_root_picks_its_tree() {
    let files = [
        ("shared.rk", "shared: ret"),
        ("app.rk", ".include \"shared.rk\"\n.include \"util.rk\"\napp: nop"),
        ("util.rk", "util: ret"),
        ("test.rk", ".include \"shared.rk\"\ntest: nop"),
    ];
    let (mut units, resolver) = setup(&files, &["app.rk", "test.rk"]);
    let selector = ByCompilationRoot::new(Resource::text("util.rk", ""));
    let order = compilation_order(&mut units, &resolver, &IdentifierMatcher, &selector).unwrap();
    assert_eq!(names(&units, &order), vec!["shared.rk", "util.rk", "app.rk"]);

    let (mut units, resolver) = setup(&files, &["app.rk", "test.rk"]);
    let missing = ByCompilationRoot::new(Resource::text("nowhere.rk", ""));
    assert!(matches!(
        compilation_order(&mut units, &resolver, &IdentifierMatcher, &missing),
        Err(Error::NoCompilationRoot(_))
    ));
}

#[test]
fn include_cycle_without_roots_fails() {
    let files = [("a.rk", ".include \"b.rk\""), ("b.rk", ".include \"a.rk\"")];
    let (mut units, resolver) = setup(&files, &["a.rk"]);
    assert!(matches!(
        compilation_order(&mut units, &resolver, &IdentifierMatcher, &ByStartAddress),
        Err(Error::CircularInclude(_))
    ));
}

#[test]
fn unresolvable_include_is_left_to_the_compiler() {
    let files = [("main.rk", ".include \"gone.rk\"\nmain: nop")];
    let (mut units, resolver) = setup(&files, &["main.rk"]);
    let order = compilation_order(&mut units, &resolver, &IdentifierMatcher, &ByStartAddress).unwrap();
    assert_eq!(names(&units, &order), vec!["main.rk"]);
}
