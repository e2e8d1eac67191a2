use bimap::BiMap;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Default,
    TryFromPrimitive,
    IntoPrimitive,
)]
#[repr(u8)]
pub enum OpKind {
    #[default]
    Nop,
    Mov,
    Add,
    Sub,
    And,
    Or,
    Xor,
    Eq,
    Neq,
    Lt,
    Lts,
    Sl,
    Sr,
    Srs,
    Ld,
    St,
    Jmp,
    Jz,
    Jnz,
    Call,
    Ret,
    Iret,
    Hlt,
}

static OP_STR: Lazy<BiMap<OpKind, &'static str>> = Lazy::new(|| {
    let mut map: BiMap<OpKind, &'static str> = BiMap::new();
    map.insert(OpKind::Nop, "nop");
    map.insert(OpKind::Mov, "mov");
    map.insert(OpKind::Add, "add");
    map.insert(OpKind::Sub, "sub");
    map.insert(OpKind::And, "and");
    map.insert(OpKind::Or, "or");
    map.insert(OpKind::Xor, "xor");
    map.insert(OpKind::Eq, "eq");
    map.insert(OpKind::Neq, "neq");
    map.insert(OpKind::Lt, "lt");
    map.insert(OpKind::Lts, "lts");
    map.insert(OpKind::Sl, "sl");
    map.insert(OpKind::Sr, "sr");
    map.insert(OpKind::Srs, "srs");
    map.insert(OpKind::Ld, "ld");
    map.insert(OpKind::St, "st");
    map.insert(OpKind::Jmp, "jmp");
    map.insert(OpKind::Jz, "jz");
    map.insert(OpKind::Jnz, "jnz");
    map.insert(OpKind::Call, "call");
    map.insert(OpKind::Ret, "ret");
    map.insert(OpKind::Iret, "iret");
    map.insert(OpKind::Hlt, "hlt");
    map
});

/// Operands an opcode takes, in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    None,  // op
    B,     // op b
    RegB,  // op a, b
}

impl OpKind {
    pub fn parse(s: &str) -> Result<Self, String> {
        let lower = s.to_ascii_lowercase();
        match OP_STR.get_by_right(lower.as_str()) {
            Some(op) => Ok(*op),
            None => Err(format!("Undefined Op: {s}")),
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        OP_STR.get_by_left(self).copied().unwrap_or("???")
    }

    pub fn shape(&self) -> Shape {
        use OpKind::*;
        match self {
            Nop | Ret | Iret | Hlt => Shape::None,
            Jmp | Call => Shape::B,
            Mov | Add | Sub | And | Or | Xor | Eq | Neq | Lt | Lts | Sl | Sr | Srs | Ld | St
            | Jz | Jnz => Shape::RegB,
        }
    }

    /// 6-bit opcode field
    pub fn field(self) -> u16 {
        u8::from(self) as u16
    }

    pub fn from_field(field: u16) -> Result<Self, String> {
        OpKind::try_from((field & 0x3F) as u8).map_err(|e| e.to_string())
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
