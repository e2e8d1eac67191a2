use super::{
    store::SymbolStore,
    symbol::{Symbol, SymbolId, SymbolKind},
};
use crate::{
    error::Error,
    expr::{Env, Expr, Weigh},
    unit::UnitId,
};
use indexmap::IndexMap;
use std::{
    cell::RefCell,
    sync::atomic::{AtomicU32, Ordering},
};

static NEXT_TABLE: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(u32);

/// Whole-program view over every unit's symbol store.
///
/// Global names are unique across all stores. The table is always the
/// outermost scope.
#[derive(Debug)]
pub struct SymbolTable {
    id: TableId,
    stores: IndexMap<UnitId, SymbolStore>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            id: TableId(NEXT_TABLE.fetch_add(1, Ordering::Relaxed)),
            stores: IndexMap::new(),
        }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    /// Store of `unit`, created on first use.
    pub fn register(&mut self, unit: UnitId) -> &mut SymbolStore {
        let id = self.id;
        self.stores.entry(unit).or_insert_with(|| {
            let mut store = SymbolStore::new(unit);
            store.set_parent(Some(id));
            store
        })
    }

    /// Adopt an existing store, replacing any store of the same unit.
    pub fn add_store(&mut self, mut store: SymbolStore) -> Result<(), Error> {
        for (_, symbol) in store.globals() {
            let clash = self
                .stores
                .values()
                .filter(|other| other.unit() != store.unit())
                .any(|other| other.contains_global(&symbol.name));
            if clash {
                return Err(Error::DuplicateSymbol(symbol.name.clone()));
            }
        }
        store.set_parent(Some(self.id));
        self.stores.insert(store.unit(), store);
        Ok(())
    }

    pub fn set_parent(&mut self, _parent: TableId) -> Result<(), Error> {
        Err(Error::NoParentScope)
    }

    pub fn store(&self, unit: UnitId) -> Option<&SymbolStore> {
        self.stores.get(&unit)
    }

    pub fn store_mut(&mut self, unit: UnitId) -> Option<&mut SymbolStore> {
        self.stores.get_mut(&unit)
    }

    pub fn stores(&self) -> impl Iterator<Item = &SymbolStore> {
        self.stores.values()
    }

    fn owner(&self, id: SymbolId) -> Option<&SymbolStore> {
        self.stores.values().find(|store| store.id() == id.store())
    }

    fn owner_mut(&mut self, id: SymbolId) -> Option<&mut SymbolStore> {
        self.stores.values_mut().find(|store| store.id() == id.store())
    }

    pub fn define_symbol(&mut self, symbol: Symbol) -> Result<SymbolId, Error> {
        if symbol.is_global() && self.stores.values().any(|s| s.contains_global(&symbol.name)) {
            return Err(Error::DuplicateSymbol(symbol.name));
        }
        self.register(symbol.unit).define_symbol(symbol)
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.owner(id).and_then(|store| store.symbol(id))
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.owner_mut(id).and_then(|store| store.symbol_mut(id))
    }

    /// Global symbol by name from any unit.
    pub fn global(&self, name: &str) -> Option<SymbolId> {
        self.stores.values().find_map(|store| store.global(name))
    }

    /// Exact lookup, like [`SymbolStore::get_symbol`], across all units.
    pub fn get_symbol(&self, name: &str, scope: Option<SymbolId>) -> Option<&Symbol> {
        match scope {
            Some(scope) => self.owner(scope)?.get_symbol(name, Some(scope)),
            None => self.global(name).and_then(|id| self.symbol(id)),
        }
    }

    /// Every symbol with this name, across all units and scopes.
    pub fn get_symbols(&self, name: &str) -> Vec<&Symbol> {
        self.stores
            .values()
            .flat_map(|store| store.symbols())
            .map(|(_, symbol)| symbol)
            .filter(|symbol| symbol.name == name)
            .collect()
    }

    /// Resolve a reference made from `unit` inside `scope`.
    pub fn resolve(&self, unit: UnitId, name: &str, scope: Option<SymbolId>) -> Option<SymbolId> {
        self.store(unit)
            .and_then(|store| store.lookup(name, scope))
            .or_else(|| self.global(name))
    }

    pub fn rename_symbol(&mut self, id: SymbolId, new_name: &str) -> Result<(), Error> {
        let symbol = self
            .symbol(id)
            .ok_or_else(|| Error::UnknownSymbol(new_name.to_string()))?;
        if symbol.is_global() && symbol.name != new_name && self.global(new_name).is_some() {
            return Err(Error::DuplicateSymbol(new_name.to_string()));
        }
        match self.owner_mut(id) {
            Some(store) => store.rename_symbol(id, new_name),
            None => Err(Error::UnknownSymbol(new_name.to_string())),
        }
    }

    pub fn clear_unit(&mut self, unit: UnitId) {
        if let Some(store) = self.stores.get_mut(&unit) {
            store.clear();
        }
    }

    pub fn clear(&mut self) {
        self.stores.clear();
    }

    // ------------------------------------------------------------------------
    // Evaluation

    /// Evaluator for expressions written in `unit` under `scope`.
    pub fn evaluator(&self, unit: UnitId, scope: Option<SymbolId>) -> Evaluator<'_> {
        Evaluator {
            table: self,
            unit,
            scope,
            current: None,
            labels: true,
            visiting: RefCell::new(Vec::new()),
        }
    }

    pub fn value_of(&self, id: SymbolId) -> Option<i64> {
        let symbol = self.symbol(id)?;
        self.evaluator(symbol.unit, None).value_of(id)
    }

    pub fn weight_of(&self, id: SymbolId) -> Option<i32> {
        let symbol = self.symbol(id)?;
        self.evaluator(symbol.unit, None).weight_of(id)
    }
}

/// Expression environment backed by the symbol table.
///
/// Equations are evaluated on demand in their own unit and context. A
/// re-entered equation has no value.
pub struct Evaluator<'a> {
    table: &'a SymbolTable,
    unit: UnitId,
    scope: Option<SymbolId>,
    current: Option<u16>,
    labels: bool,
    visiting: RefCell<Vec<SymbolId>>,
}

impl<'a> Evaluator<'a> {
    pub fn at(mut self, current: Option<u16>) -> Self {
        self.current = current;
        self
    }

    /// Treat labels as unknown, so only constants evaluate.
    pub fn constants_only(mut self) -> Self {
        self.labels = false;
        self
    }

    pub fn eval(&self, expr: &Expr) -> Option<i64> {
        expr.eval(self)
    }

    pub fn weight(&self, expr: &Expr) -> Option<i32> {
        expr.relocation_weight(self)
    }

    fn nested<T>(&self, id: SymbolId, f: impl FnOnce(&Expr, &Evaluator) -> Option<T>) -> Option<T> {
        let symbol = self.table.symbol(id)?;
        let SymbolKind::Equation { expr, context } = &symbol.kind else {
            return None;
        };
        let expr = expr.as_ref()?;
        if self.visiting.borrow().contains(&id) {
            return None;
        }
        self.visiting.borrow_mut().push(id);
        let inner = Evaluator {
            table: self.table,
            unit: symbol.unit,
            scope: *context,
            current: None,
            labels: self.labels,
            visiting: RefCell::new(self.visiting.borrow().clone()),
        };
        let result = f(expr, &inner);
        self.visiting.borrow_mut().pop();
        result
    }

    fn value_of(&self, id: SymbolId) -> Option<i64> {
        match &self.table.symbol(id)?.kind {
            SymbolKind::Label { address } if self.labels => address.map(i64::from),
            SymbolKind::Label { .. } | SymbolKind::Macro { .. } => None,
            SymbolKind::Equation { .. } => self.nested(id, |expr, inner| expr.eval(inner)),
        }
    }

    fn weight_of(&self, id: SymbolId) -> Option<i32> {
        match &self.table.symbol(id)?.kind {
            SymbolKind::Label { .. } => Some(1),
            SymbolKind::Macro { .. } => None,
            SymbolKind::Equation { .. } => {
                self.nested(id, |expr, inner| expr.relocation_weight(inner))
            }
        }
    }
}

impl Env for Evaluator<'_> {
    fn lookup(&self, name: &str) -> Option<i64> {
        let id = self.table.resolve(self.unit, name, self.scope)?;
        self.value_of(id)
    }

    fn current(&self) -> Option<i64> {
        self.current.map(i64::from)
    }
}

impl Weigh for Evaluator<'_> {
    fn weight(&self, name: &str) -> Option<i32> {
        let id = self.table.resolve(self.unit, name, self.scope)?;
        self.weight_of(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{expr::BinOp, marker::Location};

    fn label(name: &str, unit: usize, address: u16) -> Symbol {
        let mut symbol = Symbol::label(name, UnitId(unit), Location::default());
        symbol.set_address(Some(address));
        symbol
    }

    #[test]
    fn equations_see_labels_of_other_units() {
        let mut table = SymbolTable::new();
        table.define_symbol(label("buffer", 0, 0x200)).unwrap();
        let expr = Expr::binary(Expr::ident("buffer"), BinOp::Add, Expr::Number(4));
        let end = table
            .define_symbol(Symbol::equation("END", UnitId(1), Location::default(), expr))
            .unwrap();
        assert_eq!(table.value_of(end), Some(0x204));
        assert_eq!(table.weight_of(end), Some(1));
        assert_eq!(table.evaluator(UnitId(1), None).constants_only().lookup("END"), None);
    }

    #[test]
    fn self_reference_has_no_value() {
        let mut table = SymbolTable::new();
        let expr = Expr::binary(Expr::ident("A"), BinOp::Add, Expr::Number(1));
        let a = table
            .define_symbol(Symbol::equation("A", UnitId(0), Location::default(), expr))
            .unwrap();
        assert_eq!(table.value_of(a), None);
    }
}
