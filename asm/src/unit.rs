use crate::{
    ast::Ast,
    error::Error,
    marker::{Marker, MarkerType},
    relocation::RelocationTable,
    resource::{Resource, ResourceMatcher},
    writer::ObjectCode,
};
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub usize);

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One source resource and everything compiling it produced.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    id: UnitId,
    identifier: String,
    resource: Resource,
    ast: Option<Ast>,
    markers: IndexMap<MarkerType, Vec<Marker>>,
    next_marker: u32,
    start_address: u16,
    end_address: Option<u32>,
    relocation: RelocationTable,
    dependencies: Vec<UnitId>,
    object_code: Option<ObjectCode>,
    debug_info: IndexMap<u16, usize>,
}

impl CompilationUnit {
    pub fn new(id: UnitId, resource: Resource) -> Self {
        Self {
            id,
            identifier: resource.identifier(),
            resource,
            ast: None,
            markers: IndexMap::new(),
            next_marker: 1,
            start_address: 0,
            end_address: None,
            relocation: RelocationTable::new(),
            dependencies: Vec::new(),
            object_code: None,
            debug_info: IndexMap::new(),
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Drop everything a previous compilation left behind.
    pub fn before_compilation_start(&mut self) {
        self.ast = None;
        self.markers.clear();
        self.start_address = 0;
        self.end_address = None;
        self.relocation.clear();
        self.dependencies.clear();
        self.object_code = None;
        self.debug_info.clear();
    }

    // ------------------------------------------------------------------------
    // AST

    pub fn ast(&self) -> Option<&Ast> {
        self.ast.as_ref()
    }

    pub fn ast_mut(&mut self) -> Option<&mut Ast> {
        self.ast.as_mut()
    }

    pub fn set_ast(&mut self, ast: Ast) {
        self.ast = Some(ast);
    }

    pub fn take_ast(&mut self) -> Option<Ast> {
        self.ast.take()
    }

    // ------------------------------------------------------------------------
    // Markers

    /// Attach a marker and return its id.
    pub fn add_marker(&mut self, mut marker: Marker) -> u32 {
        marker.id = self.next_marker;
        self.next_marker += 1;
        let id = marker.id;
        self.markers.entry(marker.kind).or_default().push(marker);
        id
    }

    pub fn delete_marker(&mut self, id: u32) -> bool {
        for markers in self.markers.values_mut() {
            if let Some(index) = markers.iter().position(|m| m.id == id) {
                markers.remove(index);
                return true;
            }
        }
        false
    }

    /// Markers of one type, or all markers if `kind` is `None`.
    pub fn markers(&self, kind: Option<MarkerType>) -> Vec<&Marker> {
        let mut markers: Vec<&Marker> = match kind {
            Some(kind) => self.markers.get(&kind).into_iter().flatten().collect(),
            None => self.markers.values().flatten().collect(),
        };
        markers.sort_by_key(|m| m.id);
        markers
    }

    pub fn has_markers(&self, kind: MarkerType) -> bool {
        self.markers.get(&kind).is_some_and(|m| !m.is_empty())
    }

    pub fn has_errors(&self) -> bool {
        self.markers.values().flatten().any(Marker::is_error)
    }

    // ------------------------------------------------------------------------
    // Addresses

    pub fn start_address(&self) -> u16 {
        self.start_address
    }

    pub fn set_start_address(&mut self, address: u16) {
        self.start_address = address;
    }

    /// One past the last word laid out, once addresses are resolved. May be
    /// 0x10000 when a unit fills memory to the top.
    pub fn end_address(&self) -> Option<u32> {
        self.end_address
    }

    pub fn set_end_address(&mut self, address: Option<u32>) {
        self.end_address = address;
    }

    // ------------------------------------------------------------------------
    // Outputs

    pub fn relocation(&self) -> &RelocationTable {
        &self.relocation
    }

    pub fn relocation_mut(&mut self) -> &mut RelocationTable {
        &mut self.relocation
    }

    pub fn dependencies(&self) -> &[UnitId] {
        &self.dependencies
    }

    pub fn add_dependency(&mut self, unit: UnitId) {
        if !self.dependencies.contains(&unit) {
            self.dependencies.push(unit);
        }
    }

    pub fn object_code(&self) -> Option<&ObjectCode> {
        self.object_code.as_ref()
    }

    pub fn set_object_code(&mut self, code: ObjectCode) {
        self.object_code = Some(code);
    }

    /// Source line of each emitted address.
    pub fn debug_info(&self) -> &IndexMap<u16, usize> {
        &self.debug_info
    }

    pub fn add_debug_info(&mut self, address: u16, line: usize) {
        self.debug_info.insert(address, line);
    }

    pub fn set_debug_info(&mut self, info: IndexMap<u16, usize>) {
        self.debug_info = info;
    }
}

// ----------------------------------------------------------------------------
// Units

/// Arena of compilation units plus the order they are processed in.
///
/// Units discovered while a phase runs are appended to the order, so a
/// phase walking it by index also visits them.
#[derive(Debug, Clone, Default)]
pub struct Units {
    units: Vec<CompilationUnit>,
    order: Vec<UnitId>,
}

impl Units {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: Resource) -> UnitId {
        let id = UnitId(self.units.len());
        self.units.push(CompilationUnit::new(id, resource));
        self.order.push(id);
        id
    }

    /// Existing unit for `resource`, or a new one appended to the order.
    pub fn find_or_add(&mut self, resource: Resource, matcher: &dyn ResourceMatcher) -> UnitId {
        match self.find(&resource, matcher) {
            Some(id) => {
                self.enqueue(id);
                id
            }
            None => self.add(resource),
        }
    }

    pub fn find(&self, resource: &Resource, matcher: &dyn ResourceMatcher) -> Option<UnitId> {
        self.units
            .iter()
            .find(|u| matcher.is_same(u.resource(), resource))
            .map(|u| u.id)
    }

    pub fn find_by_name(&self, identifier: &str) -> Option<UnitId> {
        self.units
            .iter()
            .find(|u| u.identifier == identifier)
            .map(|u| u.id)
    }

    pub fn get(&self, id: UnitId) -> Option<&CompilationUnit> {
        self.units.get(id.0)
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut CompilationUnit> {
        self.units.get_mut(id.0)
    }

    pub fn unit(&self, id: UnitId) -> Result<&CompilationUnit, Error> {
        self.get(id).ok_or(Error::UnknownUnit(id.0))
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Result<&mut CompilationUnit, Error> {
        self.get_mut(id).ok_or(Error::UnknownUnit(id.0))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn order(&self) -> &[UnitId] {
        &self.order
    }

    /// Replace the processing order. Units left out are not compiled.
    pub fn set_order(&mut self, order: Vec<UnitId>) -> Result<(), Error> {
        if let Some(bad) = order.iter().find(|id| id.0 >= self.units.len()) {
            return Err(Error::UnknownUnit(bad.0));
        }
        self.order = order;
        Ok(())
    }

    /// Append `id` to the processing order unless already queued.
    pub fn enqueue(&mut self, id: UnitId) {
        if !self.order.contains(&id) {
            self.order.push(id);
        }
    }

    /// Units in processing order.
    pub fn iter(&self) -> impl Iterator<Item = &CompilationUnit> {
        self.order.iter().filter_map(|id| self.units.get(id.0))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CompilationUnit> {
        self.units.iter_mut()
    }

    pub fn has_errors(&self) -> bool {
        self.units.iter().any(CompilationUnit::has_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::IdentifierMatcher;

    #[test]
    fn markers_are_typed_and_deletable() {
        let mut unit = CompilationUnit::new(UnitId(0), Resource::text("a.rk", ""));
        let w = unit.add_marker(Marker::warning("careful"));
        let e = unit.add_marker(Marker::error("broken"));
        assert!(unit.has_errors());
        assert_eq!(unit.markers(None).len(), 2);
        assert_eq!(unit.markers(Some(MarkerType::CompileWarning))[0].id(), w);

        assert!(unit.delete_marker(e));
        assert!(!unit.delete_marker(e));
        assert!(!unit.has_errors());
    }

    #[test]
    fn reset_clears_previous_state() {
        let mut unit = CompilationUnit::new(UnitId(0), Resource::text("a.rk", ""));
        unit.set_ast(Ast::default());
        unit.add_marker(Marker::error("old"));
        unit.set_start_address(0x100);
        unit.relocation_mut().add_entry(3);
        unit.before_compilation_start();
        assert!(unit.ast().is_none());
        assert!(unit.markers(None).is_empty());
        assert_eq!(unit.start_address(), 0);
        assert!(unit.relocation().is_empty());
    }

    #[test]
    fn order_grows_with_new_units() {
        let mut units = Units::new();
        let a = units.add(Resource::text("a.rk", ""));
        let b = units.find_or_add(Resource::text("b.rk", ""), &IdentifierMatcher);
        let again = units.find_or_add(Resource::text("a.rk", ""), &IdentifierMatcher);
        assert_eq!(again, a);
        assert_eq!(units.order(), &[a, b]);

        units.set_order(vec![b]).unwrap();
        assert_eq!(units.order(), &[b]);
        units.enqueue(a);
        units.enqueue(b);
        assert_eq!(units.order(), &[b, a]);
        assert!(units.set_order(vec![UnitId(9)]).is_err());
    }
}
