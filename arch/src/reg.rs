use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

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
    EnumString,
    EnumIter,
    Display,
)]
#[repr(u8)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Reg {
    #[default]
    ZERO,
    IRA,
    PC,
    SP,
    RA,
    FP,
    A0,
    A1,
    T0,
    T1,
    T2,
    T3,
    S0,
    S1,
    S2,
    S3,
}

impl Reg {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.parse::<Self>() {
            Ok(a) => Ok(a),
            Err(_) => Err(format!("Unknown reg name: {s}")),
        }
    }

    /// 4-bit register field
    pub fn field(self) -> u16 {
        u8::from(self) as u16
    }

    pub fn from_field(field: u16) -> Result<Self, String> {
        Reg::try_from((field & 0xF) as u8).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Reg::parse("s2"), Ok(Reg::S2));
        assert_eq!(Reg::parse("ZERO"), Ok(Reg::ZERO));
        assert!(Reg::parse("hoge").is_err());
    }

    #[test]
    fn field_round_trip() {
        use strum::IntoEnumIterator;
        for reg in Reg::iter() {
            assert_eq!(Reg::from_field(reg.field()), Ok(reg));
        }
        assert_eq!(Reg::SP.to_string(), "sp");
    }
}
