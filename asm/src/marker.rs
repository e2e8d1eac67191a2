use crate::ast::NodeId;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum MarkerType {
    #[strum(serialize = "compile-error")]
    CompileError,
    #[strum(serialize = "compile-warning")]
    CompileWarning,
    #[strum(serialize = "generic-error")]
    GenericError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Source position. `line` and `column` are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub len: usize,
}

impl Location {
    pub fn new(offset: usize, line: usize, column: usize, len: usize) -> Self {
        Self {
            offset,
            line,
            column,
            len,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// A diagnostic attached to a compilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub(crate) id: u32,
    pub kind: MarkerType,
    pub severity: Severity,
    pub message: String,
    pub cause: Option<String>,
    pub location: Option<Location>,
    pub node: Option<NodeId>,
}

impl Marker {
    pub fn new(kind: MarkerType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: 0,
            kind,
            severity,
            message: message.into(),
            cause: None,
            location: None,
            node: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(MarkerType::CompileError, Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(MarkerType::CompileWarning, Severity::Warning, message)
    }

    pub fn generic(message: impl Into<String>, cause: impl Into<String>) -> Self {
        let mut marker = Self::new(MarkerType::GenericError, Severity::Error, message);
        marker.cause = Some(cause.into());
        marker
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn on(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{}: ", location)?;
        }
        write!(f, "{}", self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " ({})", cause)?;
        }
        Ok(())
    }
}
