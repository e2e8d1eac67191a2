use super::{
    symbol::{SymbolId, SymbolKind},
    table::SymbolTable,
};
use crate::{marker::Marker, unit::UnitId};
use indexmap::IndexSet;
use log::debug;
use std::collections::HashSet;

/// Finds circular equation definitions.
///
/// Every equation on a cycle loses its expression and gets exactly one
/// error marker naming the cycle starting from itself. Poisoned equations
/// are not reported again by later checks in the same table.
#[derive(Debug, Default)]
pub struct CycleChecker {
    poisoned: HashSet<SymbolId>,
}

impl CycleChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_poisoned(&self, id: SymbolId) -> bool {
        self.poisoned.contains(&id)
    }

    /// Check every equation defined by `unit`. Markers are returned with
    /// the unit owning each poisoned equation.
    pub fn check_unit(&mut self, table: &mut SymbolTable, unit: UnitId) -> Vec<(UnitId, Marker)> {
        let roots: Vec<SymbolId> = table
            .store(unit)
            .map(|store| {
                store
                    .symbols()
                    .into_iter()
                    .filter(|(_, s)| matches!(s.kind, SymbolKind::Equation { .. }))
                    .map(|(id, _)| id)
                    .collect()
            })
            .unwrap_or_default();

        let mut markers = Vec::new();
        let mut done = HashSet::new();
        for root in roots {
            let mut path = IndexSet::new();
            self.visit(table, root, &mut path, &mut done, &mut markers);
        }
        markers
    }

    fn visit(
        &mut self,
        table: &mut SymbolTable,
        id: SymbolId,
        path: &mut IndexSet<SymbolId>,
        done: &mut HashSet<SymbolId>,
        markers: &mut Vec<(UnitId, Marker)>,
    ) {
        if self.poisoned.contains(&id) || done.contains(&id) {
            return;
        }
        if let Some(start) = path.get_index_of(&id) {
            let cycle: Vec<SymbolId> = path.iter().skip(start).copied().collect();
            self.poison(table, &cycle, markers);
            return;
        }

        // 1. Equations this one refers to
        let Some(symbol) = table.symbol(id) else {
            return;
        };
        let SymbolKind::Equation {
            expr: Some(expr),
            context,
        } = &symbol.kind
        else {
            return;
        };
        let refs: Vec<SymbolId> = expr
            .identifiers()
            .into_iter()
            .filter_map(|name| table.resolve(symbol.unit, name, *context))
            .filter(|r| matches!(table.symbol(*r).map(|s| &s.kind), Some(SymbolKind::Equation { .. })))
            .collect();

        // 2. Depth first
        path.insert(id);
        for r in refs {
            self.visit(table, r, path, done, markers);
            if self.poisoned.contains(&id) {
                break;
            }
        }
        path.pop();
        done.insert(id);
    }

    fn poison(
        &mut self,
        table: &mut SymbolTable,
        cycle: &[SymbolId],
        markers: &mut Vec<(UnitId, Marker)>,
    ) {
        let names: Vec<String> = cycle
            .iter()
            .filter_map(|id| table.symbol(*id).map(|s| s.name.clone()))
            .collect();
        for (i, id) in cycle.iter().enumerate() {
            if !self.poisoned.insert(*id) {
                continue;
            }
            let rotated: Vec<&str> = names[i..]
                .iter()
                .chain(names[..=i].iter())
                .map(String::as_str)
                .collect();
            let msg = format!("Circular equation: {}", rotated.join(" <-> "));
            debug!("{}", msg);

            if let Some(symbol) = table.symbol_mut(*id) {
                if let SymbolKind::Equation { expr, .. } = &mut symbol.kind {
                    *expr = None;
                }
                let marker = Marker::error(msg).at(symbol.location);
                markers.push((symbol.unit, marker));
            }
        }
    }
}
