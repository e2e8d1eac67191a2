use crate::{ast::NodeId, error::Error, expr::Expr, marker::Location, unit::UnitId};
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_STORE: AtomicU32 = AtomicU32::new(1);

/// Identity of one symbol store instance. Copies get a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(u32);

impl StoreId {
    pub(crate) fn next() -> Self {
        StoreId(NEXT_STORE.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to a symbol inside one specific store instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId {
    pub(crate) store: StoreId,
    pub(crate) slot: usize,
}

impl SymbolId {
    pub fn store(&self) -> StoreId {
        self.store
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    /// Address of a code location, known after address resolution.
    Label { address: Option<u16> },
    /// Named expression; `context` scopes its local references.
    Equation {
        expr: Option<Expr>,
        context: Option<SymbolId>,
    },
    /// Macro definition node.
    Macro { node: NodeId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub unit: UnitId,
    pub location: Location,
    pub scope: Option<SymbolId>,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn label(name: &str, unit: UnitId, location: Location) -> Self {
        Self {
            name: name.to_string(),
            unit,
            location,
            scope: None,
            kind: SymbolKind::Label { address: None },
        }
    }

    pub fn equation(name: &str, unit: UnitId, location: Location, expr: Expr) -> Self {
        Self {
            name: name.to_string(),
            unit,
            location,
            scope: None,
            kind: SymbolKind::Equation {
                expr: Some(expr),
                context: None,
            },
        }
    }

    pub fn macro_def(name: &str, unit: UnitId, location: Location, node: NodeId) -> Self {
        Self {
            name: name.to_string(),
            unit,
            location,
            scope: None,
            kind: SymbolKind::Macro { node },
        }
    }

    /// Copy of this symbol placed under the global symbol `scope`.
    pub fn with_scope(&self, scope: SymbolId) -> Result<Symbol, Error> {
        if let SymbolKind::Macro { .. } = self.kind {
            return Err(Error::InvalidScope(self.name.clone()));
        }
        Ok(Symbol {
            scope: Some(scope),
            ..self.clone()
        })
    }

    pub fn in_context(mut self, context: Option<SymbolId>) -> Self {
        if let SymbolKind::Equation { context: c, .. } = &mut self.kind {
            *c = context;
        }
        self
    }

    pub fn is_global(&self) -> bool {
        self.scope.is_none()
    }

    pub fn is_label(&self) -> bool {
        matches!(self.kind, SymbolKind::Label { .. })
    }

    pub fn address(&self) -> Option<u16> {
        match self.kind {
            SymbolKind::Label { address } => address,
            _ => None,
        }
    }

    pub fn set_address(&mut self, value: Option<u16>) {
        if let SymbolKind::Label { address } = &mut self.kind {
            *address = value;
        }
    }

    pub fn expr(&self) -> Option<&Expr> {
        match &self.kind {
            SymbolKind::Equation { expr, .. } => expr.as_ref(),
            _ => None,
        }
    }
}
