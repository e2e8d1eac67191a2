mod bootstrap;

pub use bootstrap::{bootstrap, SOURCE as BOOTSTRAP_SOURCE};

use crate::{
    ast::Ast,
    error::Error,
    options::CompilerOption,
    program::Program,
    relocation::RelocationTable,
    symbols::SymbolId,
    unit::{UnitId, Units},
    writer::ObjectCode,
};
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::io::Write;

/// Object code of one unit, ready to link.
#[derive(Debug, Clone)]
pub struct CompiledCode {
    pub unit: UnitId,
    pub code: ObjectCode,
    pub start: u16,
    pub relocation: RelocationTable,
}

impl CompiledCode {
    pub fn of(units: &Units, id: UnitId) -> Result<Self, Error> {
        let unit = units.unit(id)?;
        let code = unit
            .object_code()
            .ok_or_else(|| Error::NoObjectCode(unit.identifier().to_string()))?;
        Ok(Self {
            unit: id,
            code: code.clone(),
            start: unit.start_address(),
            relocation: unit.relocation().clone(),
        })
    }

    /// Every unit in compilation order.
    pub fn collect(units: &Units) -> Result<Vec<Self>, Error> {
        units.order().iter().map(|id| Self::of(units, *id)).collect()
    }
}

/// What a link produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linked {
    /// Bytes of bootstrap plus relocation table ahead of the modules.
    pub header_len: usize,
    pub image_len: usize,
    pub relocation: RelocationTable,
}

/// Concatenates compiled modules into one image.
#[derive(Debug, Clone, Copy, Default)]
pub struct Linker {
    self_relocating: bool,
    rewrite_addresses: bool,
}

impl Linker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix the image with the relocation stub and the merged table.
    pub fn self_relocating(mut self, on: bool) -> Self {
        self.self_relocating = on;
        self
    }

    /// Shift every resolved address of the linked units past the header.
    pub fn rewrite_addresses(mut self, on: bool) -> Self {
        self.rewrite_addresses = on;
        self
    }

    pub fn link(
        &self,
        program: &mut Program,
        modules: &[CompiledCode],
        output: &mut dyn Write,
    ) -> Result<Linked, Error> {
        // 1. Ascending load addresses
        for pair in modules.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.start < prev.start {
                return Err(Error::BadModuleOrder(
                    name(&program.units, prev.unit),
                    prev.start,
                    name(&program.units, next.unit),
                    next.start,
                ));
            }
        }
        for module in modules {
            let unit = program.units.unit(module.unit)?;
            if unit.has_errors() {
                return Err(Error::UnitHasErrors(unit.identifier().to_string()));
            }
        }
        let code = modules
            .iter()
            .map(|m| m.code.bytes())
            .collect::<Result<Vec<_>, _>>()?;

        // 2. Header
        let mut relocation = RelocationTable::new();
        let mut image = Vec::new();
        if self.self_relocating {
            for module in modules {
                relocation.merge(&module.relocation, module.start)?;
            }
            if relocation.is_empty() {
                warn!(
                    "Self-relocating image without relocation entries, compile with `{}`",
                    CompilerOption::GenerateRelocationInformation
                );
            }
            image.extend_from_slice(bootstrap());
            image.extend(relocation.to_bytes()?);
        }
        let header_len = image.len();

        // Checked before any byte is written
        let shift = if self.self_relocating && self.rewrite_addresses {
            let shift = u16::try_from(header_len / 2)
                .map_err(|_| Error::RelocationTableOverflow(relocation.len()))?;
            let units: Vec<UnitId> = modules.iter().map(|m| m.unit).collect();
            Some(Shift::plan(program, &units, shift)?)
        } else {
            None
        };

        // 3. Modules. A self-relocating program is laid out from address 0
        // so that table entries are offsets into it.
        let mut end: Option<u32> = self.self_relocating.then_some(0);
        let mut prev: Option<UnitId> = None;
        for (module, bytes) in modules.iter().zip(code) {
            let start = module.start as u32;
            match end {
                Some(end) if self.self_relocating && end > start => {
                    return Err(Error::OverlappingModules(
                        prev.map(|id| name(&program.units, id)).unwrap_or_default(),
                        end,
                        name(&program.units, module.unit),
                        module.start,
                    ));
                }
                Some(end) if self.self_relocating && end < start => {
                    debug!(
                        "Zero fill {:#06X}..{:#06X} ahead of {}",
                        end,
                        start,
                        name(&program.units, module.unit)
                    );
                    image.resize(image.len() + 2 * (start - end) as usize, 0);
                }
                Some(end) if end != start => {
                    warn!(
                        "{} starts at {:#06X}, previous module ends at {:#06X}",
                        name(&program.units, module.unit),
                        module.start,
                        end
                    );
                }
                _ => {}
            }
            end = Some(start + (bytes.len() / 2) as u32);
            prev = Some(module.unit);
            image.extend(bytes);
        }
        output.write_all(&image)?;
        output.flush()?;
        info!(
            "Linked {} module(s): {} byte(s), header {} byte(s)",
            modules.len(),
            image.len(),
            header_len
        );

        // 4. Addresses past the header
        if let Some(shift) = shift {
            shift.apply(program)?;
        }

        Ok(Linked {
            header_len,
            image_len: image.len(),
            relocation,
        })
    }
}

fn name(units: &Units, id: UnitId) -> String {
    units
        .get(id)
        .map(|u| u.identifier().to_string())
        .unwrap_or_else(|| id.to_string())
}

fn shifted(address: u16, shift: u16) -> Result<u16, Error> {
    address
        .checked_add(shift)
        .ok_or(Error::AddressOutOfRange(address, shift))
}

/// Shifted node addresses, label addresses, unit bounds and debug maps of
/// the linked units. Planned in full before anything is applied, so an
/// overflow leaves the program untouched.
struct Shift {
    shift: u16,
    asts: Vec<(UnitId, Ast)>,
    bounds: Vec<(UnitId, u16, Option<u32>)>,
    debug_info: Vec<(UnitId, IndexMap<u16, usize>)>,
    labels: Vec<(SymbolId, u16)>,
}

impl Shift {
    fn plan(program: &Program, units: &[UnitId], shift: u16) -> Result<Self, Error> {
        let mut plan = Shift {
            shift,
            asts: Vec::new(),
            bounds: Vec::new(),
            debug_info: Vec::new(),
            labels: Vec::new(),
        };
        for id in units {
            let unit = program.units.unit(*id)?;
            if let Some(ast) = unit.ast() {
                let mut ast = ast.clone();
                for node in ast.iter_mut() {
                    if let Some(address) = node.address {
                        node.address = Some(shifted(address, shift)?);
                    }
                }
                plan.asts.push((*id, ast));
            }

            let start = shifted(unit.start_address(), shift)?;
            let end = match unit.end_address() {
                Some(end) if end + shift as u32 > 0x10000 => {
                    return Err(Error::AddressOutOfRange((end - 1) as u16, shift));
                }
                end => end.map(|end| end + shift as u32),
            };
            plan.bounds.push((*id, start, end));

            let info = unit
                .debug_info()
                .iter()
                .map(|(address, line)| Ok((shifted(*address, shift)?, *line)))
                .collect::<Result<IndexMap<_, _>, Error>>()?;
            plan.debug_info.push((*id, info));

            if let Some(store) = program.symbols.store(*id) {
                for (symbol, entry) in store.symbols() {
                    if let Some(address) = entry.address() {
                        plan.labels.push((symbol, shifted(address, shift)?));
                    }
                }
            }
        }
        Ok(plan)
    }

    fn apply(self, program: &mut Program) -> Result<(), Error> {
        for (id, ast) in self.asts {
            program.units.unit_mut(id)?.set_ast(ast);
        }
        for (id, start, end) in self.bounds {
            let unit = program.units.unit_mut(id)?;
            unit.set_start_address(start);
            unit.set_end_address(end);
        }
        for (id, info) in self.debug_info {
            program.units.unit_mut(id)?.set_debug_info(info);
        }
        for (symbol, address) in self.labels.iter() {
            if let Some(entry) = program.symbols.symbol_mut(*symbol) {
                entry.set_address(Some(*address));
            }
        }
        debug!("Shifted {} label(s) by {} word(s)", self.labels.len(), self.shift);
        Ok(())
    }
}
