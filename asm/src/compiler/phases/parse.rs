use super::{Phase, PARSE};
use crate::{
    ast::{Ast, Node, Stmt},
    compiler::CompilationContext,
    error::Error,
    marker::Marker,
    options::CompilerOption,
    parser,
    symbols::{Symbol, SymbolId},
};
use log::debug;

/// Source text to nodes; defines every symbol and discovers includes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parse;

impl Phase for Parse {
    fn name(&self) -> &str {
        PARSE
    }

    fn run(&mut self, ctx: &mut CompilationContext) -> Result<(), Error> {
        let resource = ctx.current()?.resource().clone();
        let text = match resource.read_to_string() {
            Ok(text) => text,
            Err(e) => {
                ctx.mark(Marker::error(e.to_string()))?;
                return Ok(());
            }
        };

        let (mut ast, markers) = parser::parse(&text, ctx.options);
        debug!("{}: {} node(s)", resource.identifier(), ast.nodes.len());
        for marker in markers {
            ctx.mark(marker)?;
        }
        define_symbols(ctx, &mut ast)?;
        ctx.current_mut()?.set_ast(ast);
        Ok(())
    }
}

fn define_symbols(ctx: &mut CompilationContext, ast: &mut Ast) -> Result<(), Error> {
    let unit = ctx.unit;
    let mut scope: Option<SymbolId> = None;

    for node in ast.iter_mut() {
        node.scope = scope;
        let symbol = match &node.stmt {
            Stmt::Label(name) if name.starts_with('.') => match scope {
                Some(scope) => Symbol::label(name, unit, node.location).with_scope(scope)?,
                None => {
                    let msg = format!("Local label `{}` has no enclosing global label", name);
                    ctx.error(msg, node.location)?;
                    continue;
                }
            },
            Stmt::Label(name) => Symbol::label(name, unit, node.location),
            Stmt::Equ(name, expr) => {
                Symbol::equation(name, unit, node.location, expr.clone()).in_context(scope)
            }
            Stmt::Macro(name, _) => Symbol::macro_def(name, unit, node.location, node.id),
            Stmt::Include(path) => {
                let path = path.clone();
                include(ctx, node, &path)?;
                continue;
            }
            _ => continue,
        };

        let opens_scope = symbol.is_global() && symbol.is_label();
        match ctx.symbols.define_symbol(symbol) {
            Ok(id) => {
                node.symbol = Some(id);
                if opens_scope {
                    scope = Some(id);
                }
            }
            Err(Error::DuplicateSymbol(name)) => {
                let previous = ctx
                    .symbols
                    .get_symbols(&name)
                    .first()
                    .and_then(|s| ctx.units.get(s.unit).map(|u| (u.identifier().to_string(), s.location)));
                let msg = match previous {
                    Some((file, at)) => format!("Duplicate symbol `{}`, first defined at {}:{}", name, file, at),
                    None => format!("Duplicate symbol `{}`", name),
                };
                ctx.error(msg, node.location)?;
            }
            Err(Error::InvalidScope(name)) => {
                ctx.error(format!("Invalid scope for `{}`", name), node.location)?;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn include(ctx: &mut CompilationContext, node: &mut Node, path: &str) -> Result<(), Error> {
    if ctx.has(CompilerOption::NoSourceIncludeProcessing) {
        ctx.warning(format!("Include of `{}` ignored", path), node.location)?;
        return Ok(());
    }

    let parent = ctx.current()?.resource().clone();
    let resource = match ctx.resolver.resolve(path, Some(&parent)) {
        Ok(resource) => resource,
        Err(e) => {
            ctx.error(e.to_string(), node.location)?;
            return Ok(());
        }
    };
    if ctx.matcher.is_same(&resource, &parent) {
        ctx.error(format!("`{}` includes itself", path), node.location)?;
        return Ok(());
    }

    let dep = ctx.units.find_or_add(resource, ctx.matcher);
    debug!("{} includes {}", parent.identifier(), dep);
    node.include = Some(dep);
    ctx.current_mut()?.add_dependency(dep);
    Ok(())
}
