use super::scan::scan;
use crate::{
    error::Error,
    resource::{IdentifierMatcher, Resource, ResourceMatcher, ResourceResolver},
    unit::{UnitId, Units},
};
use indexmap::{IndexMap, IndexSet};
use log::debug;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    pub unit: UnitId,
    pub dependencies: IndexSet<UnitId>,
    pub dependents: IndexSet<UnitId>,
    pub start_address: u16,
}

impl DependencyNode {
    fn new(unit: UnitId) -> Self {
        Self {
            unit,
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
            start_address: 0,
        }
    }
}

/// Include graph over compilation units.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: IndexMap<UnitId, DependencyNode>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, unit: UnitId) -> &mut DependencyNode {
        self.nodes
            .entry(unit)
            .or_insert_with(|| DependencyNode::new(unit))
    }

    pub fn add_dependency(&mut self, from: UnitId, to: UnitId) {
        self.add_node(from).dependencies.insert(to);
        self.add_node(to).dependents.insert(from);
    }

    pub fn node(&self, unit: UnitId) -> Option<&DependencyNode> {
        self.nodes.get(&unit)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.values()
    }

    /// Scan every unit, discovering included units as they are found.
    pub fn build(
        units: &mut Units,
        resolver: &dyn ResourceResolver,
        matcher: &dyn ResourceMatcher,
    ) -> Result<Self, Error> {
        let mut graph = DependencyGraph::new();
        let mut worklist: Vec<UnitId> = units.order().to_vec();
        let mut seen: HashSet<UnitId> = worklist.iter().copied().collect();

        while let Some(id) = worklist.pop() {
            let resource = units.unit(id)?.resource().clone();
            graph.add_node(id);
            let text = match resource.read_to_string() {
                Ok(text) => text,
                Err(e) => {
                    debug!("Skipping dependencies of {}: {}", resource.identifier(), e);
                    continue;
                }
            };

            let found = scan(&text);
            graph.add_node(id).start_address = found.origin.unwrap_or(0);
            for (path, _) in found.includes {
                match resolver.resolve(&path, Some(&resource)) {
                    Ok(included) => {
                        let dep = units.find_or_add(included, matcher);
                        if dep == id {
                            continue;
                        }
                        graph.add_dependency(id, dep);
                        if seen.insert(dep) {
                            worklist.push(dep);
                        }
                    }
                    Err(e) => debug!("{}: {}", resource.identifier(), e),
                }
            }
        }
        Ok(graph)
    }

    /// Units nothing else includes.
    pub fn roots(&self) -> Vec<UnitId> {
        self.nodes
            .values()
            .filter(|node| node.dependents.is_empty())
            .map(|node| node.unit)
            .collect()
    }

    /// Dependencies before dependents, each unit once.
    pub fn linearize(&self, root: UnitId) -> Vec<UnitId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        self.visit(root, &mut visited, &mut order);
        order
    }

    fn visit(&self, unit: UnitId, visited: &mut HashSet<UnitId>, order: &mut Vec<UnitId>) {
        if !visited.insert(unit) {
            return;
        }
        if let Some(node) = self.nodes.get(&unit) {
            for &dep in &node.dependencies {
                self.visit(dep, visited, order);
            }
        }
        order.push(unit);
    }

    /// Whether `unit` is reachable from `root`.
    pub fn contains(&self, root: UnitId, unit: UnitId) -> bool {
        let mut used = HashSet::from([root]);
        let mut worklist = vec![root];
        while let Some(current) = worklist.pop() {
            if current == unit {
                return true;
            }
            if let Some(node) = self.nodes.get(&current) {
                for &dep in &node.dependencies {
                    if used.insert(dep) {
                        worklist.push(dep);
                    }
                }
            }
        }
        false
    }

    /// Processing order: roots chosen by `selector`, each linearized.
    pub fn order(&self, units: &Units, selector: &dyn RootSelector) -> Result<Vec<UnitId>, Error> {
        if self.nodes.is_empty() {
            return Ok(Vec::new());
        }
        let roots = self.roots();
        if roots.is_empty() {
            let names: Vec<String> = self
                .nodes
                .keys()
                .filter_map(|id| units.get(*id).map(|u| u.identifier().to_string()))
                .collect();
            return Err(Error::CircularInclude(names.join(", ")));
        }
        let roots = match roots.len() {
            1 => roots,
            _ => selector.select(self, units, roots)?,
        };

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        for root in roots {
            self.visit(root, &mut visited, &mut order);
        }
        Ok(order)
    }
}

// ----------------------------------------------------------------------------
// Root selection

/// Orders (or narrows) the roots when more than one exists.
pub trait RootSelector {
    fn select(
        &self,
        graph: &DependencyGraph,
        units: &Units,
        roots: Vec<UnitId>,
    ) -> Result<Vec<UnitId>, Error>;
}

/// Ascending declared start address; equal addresses are ambiguous.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByStartAddress;

impl RootSelector for ByStartAddress {
    fn select(
        &self,
        graph: &DependencyGraph,
        units: &Units,
        mut roots: Vec<UnitId>,
    ) -> Result<Vec<UnitId>, Error> {
        let address = |id: &UnitId| graph.node(*id).map(|n| n.start_address).unwrap_or(0);
        roots.sort_by_key(address);
        for pair in roots.windows(2) {
            if address(&pair[0]) == address(&pair[1]) {
                let name = |id: UnitId| {
                    units
                        .get(id)
                        .map(|u| u.identifier().to_string())
                        .unwrap_or_else(|| id.to_string())
                };
                return Err(Error::AmbiguousCompilationOrder(
                    name(pair[0]),
                    name(pair[1]),
                    address(&pair[0]),
                ));
            }
        }
        Ok(roots)
    }
}

/// Only the root whose subgraph includes a designated compilation root.
pub struct ByCompilationRoot {
    root: Resource,
    matcher: Box<dyn ResourceMatcher>,
}

impl ByCompilationRoot {
    pub fn new(root: Resource) -> Self {
        Self {
            root,
            matcher: Box::new(IdentifierMatcher),
        }
    }

    pub fn with_matcher(root: Resource, matcher: Box<dyn ResourceMatcher>) -> Self {
        Self { root, matcher }
    }
}

impl RootSelector for ByCompilationRoot {
    fn select(
        &self,
        graph: &DependencyGraph,
        units: &Units,
        roots: Vec<UnitId>,
    ) -> Result<Vec<UnitId>, Error> {
        let target = units
            .find(&self.root, self.matcher.as_ref())
            .ok_or_else(|| Error::NoCompilationRoot(self.root.identifier()))?;
        roots
            .into_iter()
            .find(|&root| graph.contains(root, target))
            .map(|root| vec![root])
            .ok_or_else(|| Error::NoCompilationRoot(self.root.identifier()))
    }
}

/// Discover includes and decide the processing order of `units`.
pub fn compilation_order(
    units: &mut Units,
    resolver: &dyn ResourceResolver,
    matcher: &dyn ResourceMatcher,
    selector: &dyn RootSelector,
) -> Result<Vec<UnitId>, Error> {
    let graph = DependencyGraph::build(units, resolver, matcher)?;
    graph.order(units, selector)
}
