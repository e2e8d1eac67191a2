use super::{Phase, VALIDATE_PRE_CODEGEN};
use crate::{
    compiler::CompilationContext,
    error::Error,
    marker::Marker,
    options::CompilerOption,
};
use arch::inst::INLINE_MAX;

/// Last checks before emitting words: every value known, in range, and
/// relocatable when relocation information is requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatePreCodegen;

impl Phase for ValidatePreCodegen {
    fn name(&self) -> &str {
        VALIDATE_PRE_CODEGEN
    }

    fn run(&mut self, ctx: &mut CompilationContext) -> Result<(), Error> {
        let unit = ctx.unit;
        let relocating = ctx.has(CompilerOption::GenerateRelocationInformation);
        let relaxed = ctx.has(CompilerOption::RelaxedValidation);

        ctx.with_ast(|ctx, ast| {
            for node in ast.iter() {
                let eval = ctx.symbols.evaluator(unit, node.scope).at(node.address);
                let mut found = Vec::new();

                for expr in node.code_exprs() {
                    match eval.eval(expr) {
                        None => found.push(Marker::error(format!("Expression `{}` has no value", expr))),
                        Some(v) if !(-0x8000..=0xFFFF).contains(&v) => {
                            found.push(match relaxed {
                                true => Marker::warning(format!("Value {} truncated to {:#06X}", v, v as u16)),
                                false => Marker::error(format!("Value {} does not fit in a word", v)),
                            });
                        }
                        Some(v) if node.inline && !(0..=INLINE_MAX as i64).contains(&v) => {
                            found.push(Marker::error(format!("Inlined operand `{}` changed to {}", expr, v)));
                        }
                        Some(_) => {}
                    }
                    if relocating && !matches!(eval.weight(expr), Some(0) | Some(1)) {
                        found.push(Marker::error(format!("Expression `{}` cannot be relocated", expr)));
                    }
                }

                drop(eval);
                for marker in found {
                    ctx.mark(marker.at(node.location).on(node.id))?;
                }
            }
            Ok(())
        })
    }
}
