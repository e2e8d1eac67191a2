use super::{
    symbol::{StoreId, Symbol, SymbolId, SymbolKind},
    table::TableId,
};
use crate::{error::Error, unit::UnitId};
use indexmap::IndexMap;

/// Symbols defined by one compilation unit.
///
/// Globals are keyed by name. Locals are keyed by name under the global
/// symbol that scopes them; the scope must be a global of this very store.
#[derive(Debug)]
pub struct SymbolStore {
    id: StoreId,
    unit: UnitId,
    parent: Option<TableId>,
    symbols: Vec<Symbol>,
    globals: IndexMap<String, usize>,
    locals: IndexMap<usize, IndexMap<String, usize>>,
}

impl SymbolStore {
    pub fn new(unit: UnitId) -> Self {
        Self {
            id: StoreId::next(),
            unit,
            parent: None,
            symbols: Vec::new(),
            globals: IndexMap::new(),
            locals: IndexMap::new(),
        }
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn parent(&self) -> Option<TableId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<TableId>) {
        self.parent = parent;
    }

    fn handle(&self, slot: usize) -> SymbolId {
        SymbolId {
            store: self.id,
            slot,
        }
    }

    /// Slot of `scope` if it is a global currently registered in this store.
    fn scope_slot(&self, scope: SymbolId) -> Option<usize> {
        if scope.store != self.id {
            return None;
        }
        let symbol = self.symbols.get(scope.slot)?;
        match self.globals.get(&symbol.name) {
            Some(&slot) if slot == scope.slot && symbol.is_global() => Some(slot),
            _ => None,
        }
    }

    pub fn define_symbol(&mut self, symbol: Symbol) -> Result<SymbolId, Error> {
        let slot = self.symbols.len();
        match symbol.scope {
            None => {
                if self.globals.contains_key(&symbol.name) {
                    return Err(Error::DuplicateSymbol(symbol.name));
                }
                self.globals.insert(symbol.name.clone(), slot);
            }
            Some(scope) => {
                let symbol = symbol.with_scope(scope)?;
                let parent = self
                    .scope_slot(scope)
                    .ok_or_else(|| Error::InvalidScope(symbol.name.clone()))?;
                let names = self.locals.entry(parent).or_default();
                if names.contains_key(&symbol.name) {
                    return Err(Error::DuplicateSymbol(symbol.name));
                }
                names.insert(symbol.name.clone(), slot);
            }
        }
        self.symbols.push(symbol);
        Ok(self.handle(slot))
    }

    /// Local lookup under `scope`, then global lookup.
    pub fn lookup(&self, name: &str, scope: Option<SymbolId>) -> Option<SymbolId> {
        let local = scope
            .and_then(|scope| self.scope_slot(scope))
            .and_then(|parent| self.locals.get(&parent))
            .and_then(|names| names.get(name));
        local
            .or_else(|| self.globals.get(name))
            .map(|&slot| self.handle(slot))
    }

    /// Exact lookup: the global namespace without a scope, only the
    /// scope's locals with one.
    pub fn get_symbol(&self, name: &str, scope: Option<SymbolId>) -> Option<&Symbol> {
        let slot = match scope {
            None => self.globals.get(name),
            Some(scope) => self
                .scope_slot(scope)
                .and_then(|parent| self.locals.get(&parent))
                .and_then(|names| names.get(name)),
        }?;
        self.symbols.get(*slot)
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        match id.store == self.id {
            true => self.symbols.get(id.slot),
            false => None,
        }
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        match id.store == self.id {
            true => self.symbols.get_mut(id.slot),
            false => None,
        }
    }

    pub fn contains_global(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }

    pub fn global(&self, name: &str) -> Option<SymbolId> {
        self.globals.get(name).map(|&slot| self.handle(slot))
    }

    /// Global symbols in definition order.
    pub fn globals(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.globals
            .values()
            .map(|&slot| (self.handle(slot), &self.symbols[slot]))
    }

    /// Locals scoped under `scope`, in definition order.
    pub fn locals(&self, scope: SymbolId) -> Vec<(SymbolId, &Symbol)> {
        self.scope_slot(scope)
            .and_then(|parent| self.locals.get(&parent))
            .map(|names| {
                names
                    .values()
                    .map(|&slot| (self.handle(slot), &self.symbols[slot]))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All live symbols, globals followed by each global's locals.
    pub fn symbols(&self) -> Vec<(SymbolId, &Symbol)> {
        let mut all = Vec::new();
        for (id, symbol) in self.globals() {
            all.push((id, symbol));
            all.extend(self.locals(id));
        }
        all
    }

    /// Resolve `local_name` under the global symbol called `global_name`.
    pub fn resolve_local(&self, global_name: &str, local_name: &str) -> Option<&Symbol> {
        let scope = self.global(global_name)?;
        self.get_symbol(local_name, Some(scope))
    }

    /// Rename a symbol. Renaming a global re-keys its locals under it.
    pub fn rename_symbol(&mut self, id: SymbolId, new_name: &str) -> Result<(), Error> {
        let old = self
            .symbol(id)
            .ok_or_else(|| Error::UnknownSymbol(format!("#{}", id.slot)))?
            .clone();
        if old.name == new_name {
            return Ok(());
        }

        match old.scope {
            None => {
                if self.globals.contains_key(new_name) {
                    return Err(Error::DuplicateSymbol(new_name.to_string()));
                }
                let index = self
                    .globals
                    .get_index_of(&old.name)
                    .ok_or_else(|| Error::UnknownSymbol(old.name.clone()))?;
                self.globals.shift_remove(&old.name);
                self.globals.insert(new_name.to_string(), id.slot);
                let last = self.globals.len() - 1;
                self.globals.move_index(last, index);
                self.symbols[id.slot].name = new_name.to_string();

                // locals carry their scope's handle, which is unchanged
                let locals: Vec<usize> = self
                    .locals
                    .get(&id.slot)
                    .map(|names| names.values().copied().collect())
                    .unwrap_or_default();
                for slot in locals {
                    self.symbols[slot] = self.symbols[slot].with_scope(id)?;
                }
            }
            Some(scope) => {
                let names = self
                    .locals
                    .get_mut(&scope.slot)
                    .ok_or_else(|| Error::InvalidScope(old.name.clone()))?;
                if names.contains_key(new_name) {
                    return Err(Error::DuplicateSymbol(new_name.to_string()));
                }
                let index = names
                    .get_index_of(&old.name)
                    .ok_or_else(|| Error::UnknownSymbol(old.name.clone()))?;
                names.shift_remove(&old.name);
                names.insert(new_name.to_string(), id.slot);
                let last = names.len() - 1;
                names.move_index(last, index);
                self.symbols[id.slot].name = new_name.to_string();
            }
        }
        Ok(())
    }

    /// Independent deep copy under a new identity, detached from any table.
    pub fn create_copy(&self) -> Result<SymbolStore, Error> {
        let mut copy = SymbolStore::new(self.unit);
        for (_, global) in self.globals() {
            let symbol = Symbol {
                scope: None,
                ..global.clone()
            };
            let scope = copy.define_symbol(symbol)?;
            if let Some(id) = self.global(&global.name) {
                for (_, local) in self.locals(id) {
                    copy.define_symbol(local.with_scope(scope)?)?;
                }
            }
        }
        copy.remap_contexts(self);
        Ok(copy)
    }

    /// Point equation contexts at the copied scopes.
    fn remap_contexts(&mut self, original: &SymbolStore) {
        let store = self.id;
        let globals = &self.globals;
        for symbol in self.symbols.iter_mut() {
            if let SymbolKind::Equation { context, .. } = &mut symbol.kind {
                *context = context
                    .and_then(|old| original.symbol(old))
                    .and_then(|old| globals.get(&old.name))
                    .map(|&slot| SymbolId { store, slot });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
        self.globals.clear();
        self.locals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::Location;

    fn label(name: &str) -> Symbol {
        Symbol::label(name, UnitId(0), Location::default())
    }

    #[test]
    fn local_lookup_falls_back_to_global() {
        let mut store = SymbolStore::new(UnitId(0));
        let main = store.define_symbol(label("main")).unwrap();
        let other = store.define_symbol(label("other")).unwrap();
        let mut local = label(".loop");
        local.scope = Some(main);
        let lp = store.define_symbol(local).unwrap();

        assert_eq!(store.lookup(".loop", Some(main)), Some(lp));
        assert_eq!(store.lookup(".loop", Some(other)), None);
        assert_eq!(store.lookup("other", Some(main)), Some(other));
        assert_eq!(store.symbols().len(), 3);
    }

    #[test]
    fn exact_lookup_never_falls_back() {
        let mut store = SymbolStore::new(UnitId(0));
        let main = store.define_symbol(label("main")).unwrap();
        store.define_symbol(label("other")).unwrap();
        assert!(store.get_symbol("other", Some(main)).is_none());
        assert!(store.get_symbol("other", None).is_some());
        assert!(store.get_symbol("main", None).is_some());
    }

    #[test]
    fn rename_keeps_definition_order() {
        let mut store = SymbolStore::new(UnitId(0));
        let a = store.define_symbol(label("a")).unwrap();
        store.define_symbol(label("b")).unwrap();
        store.rename_symbol(a, "z").unwrap();
        let names: Vec<_> = store.globals().map(|(_, s)| s.name.clone()).collect();
        assert_eq!(names, vec!["z", "b"]);
        assert!(matches!(store.rename_symbol(a, "b"), Err(Error::DuplicateSymbol(_))));
    }
}
