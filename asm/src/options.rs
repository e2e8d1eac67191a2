use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumIter, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum CompilerOption {
    DebugMode,
    RelaxedParsing,
    NoSourceIncludeProcessing,
    RelaxedValidation,
    DisableInlining,
    GenerateRelocationInformation,
    GenerateDebugInfo,
    LocalLabelsSupported,
}

/// Set of enabled compiler options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options(BTreeSet<CompilerOption>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, option: CompilerOption) -> Self {
        self.set(option);
        self
    }

    pub fn set(&mut self, option: CompilerOption) {
        self.0.insert(option);
    }

    pub fn unset(&mut self, option: CompilerOption) {
        self.0.remove(&option);
    }

    /// Relocation information implies inlining is off.
    pub fn has(&self, option: CompilerOption) -> bool {
        match option {
            CompilerOption::DisableInlining => {
                self.0.contains(&CompilerOption::DisableInlining)
                    || self.0.contains(&CompilerOption::GenerateRelocationInformation)
            }
            _ => self.0.contains(&option),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = CompilerOption> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<CompilerOption> for Options {
    fn from_iter<T: IntoIterator<Item = CompilerOption>>(iter: T) -> Self {
        Options(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn relocation_forces_no_inlining() {
        let mut options = Options::new();
        assert!(!options.has(CompilerOption::DisableInlining));
        options.set(CompilerOption::GenerateRelocationInformation);
        assert!(options.has(CompilerOption::DisableInlining));
        options.unset(CompilerOption::GenerateRelocationInformation);
        assert!(!options.has(CompilerOption::DisableInlining));
    }

    #[test]
    fn names() {
        assert_eq!(
            CompilerOption::from_str("local-labels-supported"),
            Ok(CompilerOption::LocalLabelsSupported)
        );
        assert_eq!(CompilerOption::DebugMode.to_string(), "debug-mode");
    }
}
