mod equation;
mod store;
mod symbol;
mod table;

pub use equation::CycleChecker;
pub use store::SymbolStore;
pub use symbol::{StoreId, Symbol, SymbolId, SymbolKind};
pub use table::{Evaluator, SymbolTable, TableId};
