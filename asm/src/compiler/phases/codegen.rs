use super::{Phase, GENERATE_CODE};
use crate::{
    ast::{Operand, Stmt},
    compiler::CompilationContext,
    error::Error,
    expr::Expr,
    options::CompilerOption,
    symbols::Evaluator,
};
use arch::inst::{self, Inst};
use log::debug;

/// Encodes every node into words and collects relocation entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateCode;

impl Phase for GenerateCode {
    fn name(&self) -> &str {
        GENERATE_CODE
    }

    fn run(&mut self, ctx: &mut CompilationContext) -> Result<(), Error> {
        let unit = ctx.unit;
        let relocating = ctx.has(CompilerOption::GenerateRelocationInformation);
        let debug_info = ctx.has(CompilerOption::GenerateDebugInfo);
        let start = ctx.current()?.start_address();
        let mut writer = ctx.writers.create(ctx.current()?)?;
        let mut relocations = Vec::new();
        let mut lines = Vec::new();

        ctx.with_ast(|ctx, ast| {
            for node in ast.iter() {
                let Some(address) = node.address else {
                    continue;
                };
                let eval = ctx.symbols.evaluator(unit, node.scope).at(Some(address));

                // Word offsets within this node that hold a relocatable value
                let mut relocatable = Vec::new();
                let words = match &node.stmt {
                    Stmt::Inst(op, a, operand) => {
                        let (b, expr) = match operand {
                            None => (None, None),
                            Some(Operand::Reg(reg)) => (Some(inst::Operand::Reg(*reg)), None),
                            Some(Operand::Expr(expr)) => {
                                let value = word(&eval, expr)?;
                                (Some(inst::Operand::literal(value, node.inline)), Some(expr))
                            }
                        };
                        let inst = Inst::new(*op, *a, b).map_err(Error::InvalidInstruction)?;
                        if let (Some(expr), Some(offset)) = (expr, inst.immediate_offset()) {
                            if eval.weight(expr) == Some(1) {
                                relocatable.push(offset);
                            }
                        }
                        inst.encode()
                    }
                    Stmt::Word(exprs) => {
                        let mut words = Vec::with_capacity(exprs.len());
                        for (offset, expr) in exprs.iter().enumerate() {
                            words.push(word(&eval, expr)?);
                            if eval.weight(expr) == Some(1) {
                                relocatable.push(offset as u16);
                            }
                        }
                        words
                    }
                    _ => continue,
                };

                writer.write(address, &words)?;
                if relocating {
                    relocations.extend(relocatable.iter().map(|offset| address - start + offset));
                }
                if debug_info {
                    lines.push((address, node.location.line));
                }
            }
            Ok(())
        })?;

        let code = writer.close()?;
        let current = ctx.current_mut()?;
        debug!(
            "{}: {} relocation(s), {:?}..={:?}",
            current.identifier(),
            relocations.len(),
            code.first_write,
            code.last_write
        );
        current.set_object_code(code);
        for entry in relocations {
            current.relocation_mut().add_entry(entry);
        }
        for (address, line) in lines {
            current.add_debug_info(address, line);
        }
        Ok(())
    }
}

/// Value of `expr` as an encoded word.
fn word(eval: &Evaluator, expr: &Expr) -> Result<u16, Error> {
    eval.eval(expr)
        .map(|v| v as u16)
        .ok_or_else(|| Error::Internal(format!("expression `{}` has no value", expr)))
}
