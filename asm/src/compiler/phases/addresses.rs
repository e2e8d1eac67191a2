use super::{Phase, RESOLVE_ADDRESSES};
use crate::{
    ast::{Operand, Stmt},
    compiler::CompilationContext,
    error::Error,
    options::CompilerOption,
    unit::UnitId,
};
use arch::inst::INLINE_MAX;
use log::debug;

const MEMORY_END: u32 = 0x10000;

/// Lays out every node of a unit and gives labels their addresses.
///
/// A unit starts where the unit before it in compilation order ended, or
/// at 0. An `.org` ahead of any code moves the start; later ones may only
/// move forward.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveAddresses;

impl Phase for ResolveAddresses {
    fn name(&self) -> &str {
        RESOLVE_ADDRESSES
    }

    fn run(&mut self, ctx: &mut CompilationContext) -> Result<(), Error> {
        let unit = ctx.unit;
        let inline = !ctx.has(CompilerOption::DisableInlining);
        let mut start = previous_end(ctx, unit);

        let end = ctx.with_ast(|ctx, ast| {
            let mut address = start;
            let mut emitted = false;

            for node in ast.iter_mut() {
                let here = u16::try_from(address).ok();

                // 1. Origin
                if let Stmt::Org(expr) = &node.stmt {
                    let value = ctx.symbols.evaluator(unit, node.scope).at(here).eval(expr);
                    match value {
                        None => {
                            ctx.error(format!("Origin `{}` has no value", expr), node.location)?;
                        }
                        Some(v) if !(0..MEMORY_END as i64).contains(&v) => {
                            ctx.error(format!("Origin {} is out of range", v), node.location)?;
                        }
                        Some(v) if !emitted => {
                            start = v as u32;
                            address = start;
                        }
                        Some(v) if (v as u32) < address => {
                            let msg = format!("Origin {:#06X} is behind the current address {:#06X}", v, address);
                            ctx.error(msg, node.location)?;
                        }
                        Some(v) => address = v as u32,
                    }
                    node.address = u16::try_from(address).ok();
                    continue;
                }

                // 2. Size
                node.inline = false;
                node.size = match &node.stmt {
                    Stmt::Inst(_, _, None) | Stmt::Inst(_, _, Some(Operand::Reg(_))) => 1,
                    Stmt::Inst(_, _, Some(Operand::Expr(expr))) => {
                        let value = ctx.symbols.evaluator(unit, node.scope).at(here).eval(expr);
                        node.inline = inline && value.is_some_and(|v| (0..=INLINE_MAX as i64).contains(&v));
                        if node.inline {
                            1
                        } else {
                            2
                        }
                    }
                    Stmt::Word(exprs) => exprs.len() as u16,
                    _ => 0,
                };

                // 3. Placement
                let needs_address = node.size > 0 || matches!(node.stmt, Stmt::Label(_));
                if !needs_address {
                    continue;
                }
                let Some(here) = here.filter(|_| address + node.size as u32 <= MEMORY_END) else {
                    ctx.error("Code runs past the end of memory", node.location)?;
                    break;
                };
                node.address = Some(here);
                if let (Stmt::Label(_), Some(id)) = (&node.stmt, node.symbol) {
                    if let Some(symbol) = ctx.symbols.symbol_mut(id) {
                        symbol.set_address(Some(here));
                    }
                }
                if node.size > 0 {
                    emitted = true;
                    address += node.size as u32;
                }
            }
            Ok(address)
        })?;

        let current = ctx.current_mut()?;
        current.set_start_address(u16::try_from(start).unwrap_or(u16::MAX));
        current.set_end_address(Some(end));
        debug!("{}: {:#06X}..{:#06X}", current.identifier(), start, end);
        Ok(())
    }
}

/// End of the nearest unit before `unit` in compilation order that has
/// been laid out.
fn previous_end(ctx: &CompilationContext, unit: UnitId) -> u32 {
    let order = ctx.units.order();
    let position = order.iter().position(|id| *id == unit).unwrap_or(order.len());
    order[..position]
        .iter()
        .rev()
        .filter_map(|id| ctx.units.get(*id))
        .find_map(|u| u.end_address())
        .unwrap_or(0)
}
