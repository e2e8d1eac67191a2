use crate::{
    op::{OpKind, Shape},
    reg::Reg,
};

use color_print::cformat;

// ----------------------------------------------------------------------------
// Word layout
//
//   15        10 9      6 5        0
//  +------------+--------+----------+
//  |   opcode   |   a    |    b     |   [ immediate word ]
//  +------------+--------+----------+
//
//  b = 0x00..=0x0F : register
//  b = 0x10        : immediate in the next word
//  b = 0x20..=0x3F : inline literal 0..=31

pub const NEXT_WORD: u16 = 0x10;
pub const INLINE_FLAG: u16 = 0x20;
pub const INLINE_MAX: u16 = 0x1F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    Imm(u16),
    Short(u8),
}

impl Operand {
    /// Shortest encoding of a literal, honoring whether inlining is allowed.
    pub fn literal(value: u16, inline: bool) -> Self {
        if inline && value <= INLINE_MAX {
            Operand::Short(value as u8)
        } else {
            Operand::Imm(value)
        }
    }

    fn field(&self) -> u16 {
        match self {
            Operand::Reg(reg) => reg.field(),
            Operand::Imm(_) => NEXT_WORD,
            Operand::Short(v) => INLINE_FLAG | (*v as u16 & INLINE_MAX),
        }
    }

    pub fn size(&self) -> u16 {
        match self {
            Operand::Imm(_) => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inst {
    pub op: OpKind,
    pub a: Reg,
    pub b: Option<Operand>,
}

impl Inst {
    pub fn new(op: OpKind, a: Reg, b: Option<Operand>) -> Result<Self, String> {
        match (op.shape(), &b) {
            (Shape::None, None) | (Shape::B, Some(_)) | (Shape::RegB, Some(_)) => {
                Ok(Inst { op, a, b })
            }
            (Shape::None, Some(_)) => Err(format!("`{}` takes no operand", op)),
            (_, None) => Err(format!("`{}` requires an operand", op)),
        }
    }

    /// Size in words
    pub fn size(&self) -> u16 {
        1 + self.b.map(|b| b.size()).unwrap_or(0)
    }

    /// Offset (in words) of the immediate word, if any
    pub fn immediate_offset(&self) -> Option<u16> {
        match self.b {
            Some(Operand::Imm(_)) => Some(1),
            _ => None,
        }
    }

    pub fn encode(&self) -> Vec<u16> {
        let b = self.b.map(|b| b.field()).unwrap_or(0);
        let word = (self.op.field() << 10) | (self.a.field() << 6) | b;
        match self.b {
            Some(Operand::Imm(imm)) => vec![word, imm],
            _ => vec![word],
        }
    }

    /// Decode one instruction, returning it and the number of words consumed.
    pub fn decode(words: &[u16]) -> Result<(Inst, usize), String> {
        let word = *words.first().ok_or("Unexpected end of code")?;
        let op = OpKind::from_field(word >> 10)?;
        let a = Reg::from_field(word >> 6)?;
        let b = word & 0x3F;
        let operand = match b {
            0x00..=0x0F => Operand::Reg(Reg::from_field(b)?),
            NEXT_WORD => {
                let imm = *words.get(1).ok_or("Missing immediate word")?;
                Operand::Imm(imm)
            }
            0x20..=0x3F => Operand::Short((b & INLINE_MAX) as u8),
            _ => return Err(format!("Invalid operand field: 0x{:02X}", b)),
        };
        let inst = match op.shape() {
            Shape::None => Inst { op, a, b: None },
            _ => Inst {
                op,
                a,
                b: Some(operand),
            },
        };
        Ok((inst, inst.size() as usize))
    }

    pub fn cformat(&self) -> String {
        let b = match self.b {
            Some(Operand::Reg(reg)) => cformat!("<b>{}</>", reg),
            Some(Operand::Imm(imm)) => cformat!("<y>0x{:0>4X}</>", imm),
            Some(Operand::Short(v)) => cformat!("<y>{}</>", v),
            None => String::new(),
        };
        match self.op.shape() {
            Shape::None => cformat!("<r>{:<5}</>", self.op),
            Shape::B => cformat!("<r>{:<5}</> {}", self.op, b),
            Shape::RegB => cformat!("<r>{:<5}</> <b>{}</>, {}", self.op, self.a, b),
        }
    }
}
