//! Chassis model classification.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chassis model as reported by the `type` member of a chassis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChassisType {
    Ixia1600,
    Ixia200,
    Ixia400,
    Ixia100,
    Ixia400C,
    Ixia1600T,
    IxiaDemo,
    IxiaOptixia,
    IxiaOpixJr,
    Ixia400T,
    Ixia250,
    Ixia400Tf,
    IxiaOptixiaX16,
    IxiaOptixiaXL10,
    IxiaOptixiaXM12,
    IxiaOptixiaXV,
    /// Model code not known to this crate.
    Other(i32),
}

const KNOWN: &[(ChassisType, i32, &str)] = &[
    (ChassisType::Ixia1600, 2, "ixia1600"),
    (ChassisType::Ixia200, 3, "ixia200"),
    (ChassisType::Ixia400, 4, "ixia400"),
    (ChassisType::Ixia100, 5, "ixia100"),
    (ChassisType::Ixia400C, 6, "ixia400C"),
    (ChassisType::Ixia1600T, 7, "ixia1600T"),
    (ChassisType::IxiaDemo, 9, "ixiaDemo"),
    (ChassisType::IxiaOptixia, 10, "ixiaOptixia"),
    (ChassisType::IxiaOpixJr, 11, "ixiaOpixJr"),
    (ChassisType::Ixia400T, 14, "ixia400T"),
    (ChassisType::Ixia250, 17, "ixia250"),
    (ChassisType::Ixia400Tf, 18, "ixia400Tf"),
    (ChassisType::IxiaOptixiaX16, 19, "ixiaOptixiaX16"),
    (ChassisType::IxiaOptixiaXL10, 20, "ixiaOptixiaXL10"),
    (ChassisType::IxiaOptixiaXM12, 22, "ixiaOptixiaXM12"),
    (ChassisType::IxiaOptixiaXV, 24, "ixiaOptixiaXV"),
];

impl ChassisType {
    /// Maps a raw device code to a chassis type.
    pub fn from_code(code: i32) -> Self {
        KNOWN
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(t, _, _)| *t)
            .unwrap_or(ChassisType::Other(code))
    }

    /// Returns the raw device code.
    pub fn code(&self) -> i32 {
        match self {
            ChassisType::Other(code) => *code,
            known => KNOWN
                .iter()
                .find(|(t, _, _)| t == known)
                .map(|(_, c, _)| *c)
                .unwrap_or_default(),
        }
    }

    /// Returns the device's model name, if the model is known.
    pub fn model_name(&self) -> Option<&'static str> {
        KNOWN
            .iter()
            .find(|(t, _, _)| t == self)
            .map(|(_, _, name)| *name)
    }
}

impl fmt::Display for ChassisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.model_name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "unknown({})", self.code()),
        }
    }
}

/// Accepts either a model name (`ixia400T`) or a numeric code (`14`).
impl FromStr for ChassisType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i32>() {
            return Ok(ChassisType::from_code(code));
        }
        KNOWN
            .iter()
            .find(|(_, _, name)| *name == s)
            .map(|(t, _, _)| *t)
            .ok_or_else(|| ParseError::InvalidChassisType(s.to_string()))
    }
}
