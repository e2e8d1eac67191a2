use crate::{
    ast::Stmt,
    error::Error,
    program::Program,
    symbols::{SymbolKind, SymbolTable},
    unit::CompilationUnit,
};
use arch::inst::Inst;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolClass {
    Label,
    Equation,
    Macro,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMapEntry {
    pub class: SymbolClass,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
}

/// Every symbol of the program, locals keyed as `global.local`.
pub fn symbol_map(program: &Program) -> BTreeMap<String, SymbolMapEntry> {
    let mut map = BTreeMap::new();
    let table: &SymbolTable = &program.symbols;
    for store in table.stores() {
        let unit = program
            .units
            .get(store.unit())
            .map(|u| u.identifier().to_string())
            .unwrap_or_default();
        for (id, symbol) in store.symbols() {
            let key = match symbol.scope.and_then(|scope| table.symbol(scope)) {
                Some(scope) => format!("{}{}", scope.name, symbol.name),
                None => symbol.name.clone(),
            };
            let class = match symbol.kind {
                SymbolKind::Label { .. } => SymbolClass::Label,
                SymbolKind::Equation { .. } => SymbolClass::Equation,
                SymbolKind::Macro { .. } => SymbolClass::Macro,
            };
            let entry = SymbolMapEntry {
                class,
                unit: unit.clone(),
                value: table.value_of(id),
            };
            map.insert(key, entry);
        }
    }
    map
}

pub fn symbol_map_yaml(program: &Program) -> Result<String, Error> {
    Ok(serde_yaml::to_string(&symbol_map(program))?)
}

/// Address listing of one compiled unit: address, words, source line.
pub fn listing(unit: &CompilationUnit) -> Result<Vec<String>, Error> {
    let source = unit.resource().read_to_string()?;
    let lines: Vec<&str> = source.lines().collect();
    let Some(ast) = unit.ast() else {
        return Ok(Vec::new());
    };
    let code = match unit.object_code() {
        Some(code) => code.bytes()?,
        None => Vec::new(),
    };
    let words: Vec<u16> = code
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]))
        .collect();

    let mut out = Vec::new();
    for node in ast.iter() {
        let raw = lines.get(node.location.line).copied().unwrap_or("").trim();
        let Some(address) = node.address else {
            out.push(color_print::cformat!("     |           | {}", raw));
            continue;
        };
        let offset = (address - unit.start_address()) as usize;
        let emitted = words.get(offset..offset + node.size as usize).unwrap_or(&[]);
        let text = match &node.stmt {
            Stmt::Inst(..) => match Inst::decode(emitted) {
                Ok((inst, _)) => inst.cformat(),
                Err(_) => raw.to_string(),
            },
            _ => raw.to_string(),
        };
        let hex: Vec<String> = emitted.iter().map(|w| format!("{:04X}", w)).collect();
        out.push(color_print::cformat!(
            "<green>{:04X}</> | {:<9} | {}",
            address,
            hex.join(" "),
            text
        ));
    }
    out.push("-----+-----------+--------------------------------------------".to_string());
    Ok(out)
}
