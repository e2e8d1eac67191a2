use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read `{0}`")]
    ResourceRead(String, #[source] std::io::Error),

    #[error("Failed to write `{0}`")]
    ResourceWrite(String, #[source] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_yaml::Error),

    // Symbol errors
    #[error("Duplicate symbol: `{0}`")]
    DuplicateSymbol(String),

    #[error("Invalid scope for symbol `{0}`")]
    InvalidScope(String),

    #[error("Unknown symbol: `{0}`")]
    UnknownSymbol(String),

    #[error("The whole-program symbol table has no parent scope")]
    NoParentScope,

    // Pipeline errors
    #[error("No such compilation phase: `{0}`")]
    NoSuchPhase(String),

    #[error("Duplicate compilation phase: `{0}`")]
    DuplicateName(String),

    #[error("Unknown compilation unit: #{0}")]
    UnknownUnit(usize),

    #[error("Cannot resolve include `{0}`")]
    UnresolvedInclude(String),

    // Dependency errors
    #[error("Ambiguous compilation order: `{0}` and `{1}` both start at 0x{2:04X}")]
    AmbiguousCompilationOrder(String, String, u16),

    #[error("No root unit includes the compilation root `{0}`")]
    NoCompilationRoot(String),

    #[error("Circular include: {0}")]
    CircularInclude(String),

    // Link errors
    #[error("Bad module order: `{0}` at 0x{1:04X} must not precede `{2}` at 0x{3:04X}")]
    BadModuleOrder(String, u16, String, u16),

    #[error("Overlapping modules: `{0}` ends at 0x{1:04X}, past the start of `{2}` at 0x{3:04X}")]
    OverlappingModules(String, u32, String, u16),

    #[error("Address out of range: 0x{0:04X} + 0x{1:04X} exceeds 0xFFFF")]
    AddressOutOfRange(u16, u16),

    #[error("Relocation table too large: {0} entries")]
    RelocationTableOverflow(usize),

    #[error("Invalid relocation table data")]
    InvalidRelocationData,

    #[error("Compilation unit `{0}` has errors")]
    UnitHasErrors(String),

    #[error("Compilation unit `{0}` has no object code")]
    NoObjectCode(String),

    // Code generation errors
    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
