use crate::{
    deps::{compilation_order, RootSelector},
    error::Error,
    resource::{Resource, ResourceMatcher, ResourceResolver},
    symbols::SymbolTable,
    unit::{UnitId, Units},
};

/// Everything one compilation works on: the units and their symbols.
#[derive(Debug, Default)]
pub struct Program {
    pub units: Units,
    pub symbols: SymbolTable,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: Resource) -> UnitId {
        self.units.add(resource)
    }

    /// Reorder the units by their include graph.
    pub fn order_units(
        &mut self,
        resolver: &dyn ResourceResolver,
        matcher: &dyn ResourceMatcher,
        selector: &dyn RootSelector,
    ) -> Result<(), Error> {
        let order = compilation_order(&mut self.units, resolver, matcher, selector)?;
        self.units.set_order(order)
    }

    pub fn has_errors(&self) -> bool {
        self.units.has_errors()
    }
}
