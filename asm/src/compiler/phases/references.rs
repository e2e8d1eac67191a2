use super::{Phase, VALIDATE_REFERENCES};
use crate::{compiler::CompilationContext, error::Error, symbols::SymbolKind};

/// Every referenced symbol must exist and have a value; equations must
/// not be circular.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateReferences;

impl Phase for ValidateReferences {
    fn name(&self) -> &str {
        VALIDATE_REFERENCES
    }

    fn run(&mut self, ctx: &mut CompilationContext) -> Result<(), Error> {
        let unit = ctx.unit;

        // 1. Equation cycles, before anything evaluates them
        let found = ctx.cycles.check_unit(ctx.symbols, unit);
        for (owner, marker) in found {
            ctx.units.unit_mut(owner)?.add_marker(marker);
        }

        // 2. Unknown or unusable references
        ctx.with_ast(|ctx, ast| {
            for node in ast.iter() {
                for expr in node.exprs() {
                    for name in expr.identifiers() {
                        let symbol = ctx
                            .symbols
                            .resolve(unit, name, node.scope)
                            .and_then(|id| ctx.symbols.symbol(id));
                        let problem = match symbol {
                            None => Some(format!("Unknown symbol `{}`", name)),
                            Some(s) if matches!(s.kind, SymbolKind::Macro { .. }) => {
                                Some(format!("Macro `{}` cannot be used as a value", name))
                            }
                            Some(_) => None,
                        };
                        if let Some(msg) = problem {
                            ctx.error(msg, node.location)?;
                        }
                    }
                }
            }
            Ok(())
        })
    }
}
