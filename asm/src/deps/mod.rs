mod graph;
mod scan;

pub use graph::{
    compilation_order, ByCompilationRoot, ByStartAddress, DependencyGraph, DependencyNode,
    RootSelector,
};
pub use scan::{scan, Directives};
