mod addresses;
mod codegen;
mod fold;
mod parse;
mod references;
mod validate;

pub use addresses::ResolveAddresses;
pub use codegen::GenerateCode;
pub use fold::FoldExpressions;
pub use parse::Parse;
pub use references::ValidateReferences;
pub use validate::ValidatePreCodegen;

use super::{CompilationContext, PhaseSlot};
use crate::{error::Error, unit::CompilationUnit};

pub const PARSE: &str = "parse";
pub const VALIDATE_REFERENCES: &str = "validate-references";
pub const RESOLVE_ADDRESSES: &str = "resolve-addresses";
pub const FOLD_EXPRESSIONS: &str = "fold-expressions";
pub const VALIDATE_PRE_CODEGEN: &str = "validate-pre-codegen";
pub const GENERATE_CODE: &str = "generate-code";

/// One step of the compilation pipeline, run once per unit.
pub trait Phase {
    /// Unique within a pipeline.
    fn name(&self) -> &str;

    /// Units that already have errors are left alone.
    fn should_process(&self, unit: &CompilationUnit) -> bool {
        !unit.has_errors()
    }

    fn run(&mut self, ctx: &mut CompilationContext) -> Result<(), Error>;
}

pub fn default_phases() -> Vec<PhaseSlot> {
    vec![
        PhaseSlot::new(Box::new(Parse)),
        PhaseSlot::new(Box::new(ValidateReferences)),
        PhaseSlot::new(Box::new(ResolveAddresses)).aborting(),
        PhaseSlot::new(Box::new(FoldExpressions)),
        PhaseSlot::new(Box::new(ValidatePreCodegen)),
        PhaseSlot::new(Box::new(GenerateCode)).aborting(),
    ]
}
