use crate::{
    ast::Ast,
    error::Error,
    marker::{Location, Marker},
    options::{CompilerOption, Options},
    resource::{ResourceMatcher, ResourceResolver},
    symbols::{CycleChecker, SymbolTable},
    unit::{CompilationUnit, UnitId, Units},
    writer::WriterFactory,
};

/// What a phase sees while it processes one unit.
pub struct CompilationContext<'a> {
    pub unit: UnitId,
    pub units: &'a mut Units,
    pub symbols: &'a mut SymbolTable,
    pub options: &'a Options,
    pub writers: &'a dyn WriterFactory,
    pub resolver: &'a dyn ResourceResolver,
    pub matcher: &'a dyn ResourceMatcher,
    pub cycles: &'a mut CycleChecker,
}

impl<'a> CompilationContext<'a> {
    pub fn current(&self) -> Result<&CompilationUnit, Error> {
        self.units.unit(self.unit)
    }

    pub fn current_mut(&mut self) -> Result<&mut CompilationUnit, Error> {
        self.units.unit_mut(self.unit)
    }

    pub fn has(&self, option: CompilerOption) -> bool {
        self.options.has(option)
    }

    pub fn mark(&mut self, marker: Marker) -> Result<u32, Error> {
        Ok(self.current_mut()?.add_marker(marker))
    }

    pub fn error(&mut self, message: impl Into<String>, location: Location) -> Result<u32, Error> {
        self.mark(Marker::error(message).at(location))
    }

    pub fn warning(&mut self, message: impl Into<String>, location: Location) -> Result<u32, Error> {
        self.mark(Marker::warning(message).at(location))
    }

    /// Run `f` with the current unit's syntax tree detached from the unit.
    pub fn with_ast<T>(
        &mut self,
        f: impl FnOnce(&mut Self, &mut Ast) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut ast = self
            .current_mut()?
            .take_ast()
            .ok_or_else(|| Error::Internal("unit has no syntax tree".to_string()))?;
        let result = f(self, &mut ast);
        if let Ok(unit) = self.current_mut() {
            unit.set_ast(ast);
        }
        result
    }
}
