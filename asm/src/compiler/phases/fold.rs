use super::{Phase, FOLD_EXPRESSIONS};
use crate::{compiler::CompilationContext, error::Error};
use log::trace;

/// Replaces absolute subexpressions with their values, leaving
/// relocatable parts symbolic.
#[derive(Debug, Clone, Copy, Default)]
pub struct FoldExpressions;

impl Phase for FoldExpressions {
    fn name(&self) -> &str {
        FOLD_EXPRESSIONS
    }

    fn run(&mut self, ctx: &mut CompilationContext) -> Result<(), Error> {
        let unit = ctx.unit;
        ctx.with_ast(|ctx, ast| {
            for node in ast.iter_mut() {
                let (scope, address) = (node.scope, node.address);
                let eval = ctx.symbols.evaluator(unit, scope).at(address);
                for expr in node.code_exprs_mut() {
                    let folded = expr.fold(&eval, &eval);
                    if folded != *expr {
                        trace!("{} => {}", expr, folded);
                        *expr = folded;
                    }
                }
            }
            Ok(())
        })
    }
}
