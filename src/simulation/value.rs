// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Value kinds and cell values
//!
//! A PLC memory location has a declared kind (the S7 data types are reused for
//! Modbus registers). Generators produce raw `f64`/`bool` samples which are
//! coerced into the declared kind before being committed or returned.
//!
//! ## Encoding
//!
//! | Kind  | S7 width | Modbus word        |
//! |-------|----------|--------------------|
//! | BOOL  | 1 byte   | coil / discrete    |
//! | BYTE  | 1 byte   | low byte           |
//! | INT   | 2 bytes  | two's complement   |
//! | WORD  | 2 bytes  | as is              |
//! | DINT  | 4 bytes  | not allowed        |
//! | DWORD | 4 bytes  | not allowed        |
//! | REAL  | 4 bytes  | not allowed        |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Distance below which a sample counts as the whole number next to it
const INTEGRAL_TOLERANCE: f64 = 1e-9;

/// Truncate toward zero, except that floating-point residue around a whole
/// number (49.99999999999 for 50) snaps to that number
fn snap_trunc(raw: f64) -> f64 {
    let nearest = raw.round();
    if (raw - nearest).abs() < INTEGRAL_TOLERANCE {
        nearest
    } else {
        raw.trunc()
    }
}

/// Declared data type of a memory cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueKind {
    Bool,
    Byte,
    Int,
    Word,
    #[serde(rename = "DINT")]
    DInt,
    #[serde(rename = "DWORD")]
    DWord,
    Real,
}

impl ValueKind {
    /// Number of bytes the kind occupies in an S7 memory area
    pub fn byte_width(self) -> usize {
        match self {
            ValueKind::Bool | ValueKind::Byte => 1,
            ValueKind::Int | ValueKind::Word => 2,
            ValueKind::DInt | ValueKind::DWord | ValueKind::Real => 4,
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, ValueKind::Bool)
    }

    /// True for kinds that fit into a single Modbus register
    pub fn fits_register(self) -> bool {
        matches!(self, ValueKind::Byte | ValueKind::Int | ValueKind::Word)
    }

    /// Inclusive numeric range of the kind
    pub fn range(self) -> (f64, f64) {
        match self {
            ValueKind::Bool => (0.0, 1.0),
            ValueKind::Byte => (0.0, u8::MAX as f64),
            ValueKind::Int => (i16::MIN as f64, i16::MAX as f64),
            ValueKind::Word => (0.0, u16::MAX as f64),
            ValueKind::DInt => (i32::MIN as f64, i32::MAX as f64),
            ValueKind::DWord => (0.0, u32::MAX as f64),
            ValueKind::Real => (f32::MIN as f64, f32::MAX as f64),
        }
    }

    /// Coerce a raw numeric sample into this kind.
    ///
    /// Integer kinds truncate toward zero and saturate at the kind bounds.
    /// Samples within rounding error of a whole number take that number.
    pub fn coerce(self, raw: f64) -> CellValue {
        let (lo, hi) = self.range();
        match self {
            ValueKind::Bool => CellValue::Bool(raw != 0.0),
            ValueKind::Real => {
                if raw.is_nan() {
                    CellValue::Float(0.0)
                } else {
                    CellValue::Float(raw.clamp(lo, hi))
                }
            }
            _ => {
                if raw.is_nan() {
                    CellValue::Integer(0)
                } else {
                    CellValue::Integer(snap_trunc(raw).clamp(lo, hi) as i64)
                }
            }
        }
    }

    /// Check that a value written from the outside fits this kind.
    ///
    /// Returns the value normalised to the kind (an integer written to a REAL
    /// cell becomes a float).
    pub fn validate(self, value: &CellValue) -> Result<CellValue, String> {
        let (lo, hi) = self.range();
        match (self, value) {
            (ValueKind::Bool, CellValue::Bool(b)) => Ok(CellValue::Bool(*b)),
            (ValueKind::Bool, other) => Err(format!("expected BOOL, got {}", other)),
            (_, CellValue::Bool(_)) => Err(format!("expected {}, got a boolean", self)),
            (ValueKind::Real, CellValue::Integer(i)) => {
                Ok(CellValue::Float(*i as f64))
            }
            (ValueKind::Real, CellValue::Float(f)) => {
                if !f.is_finite() || *f < lo || *f > hi {
                    Err(format!("{} is outside the REAL range", f))
                } else {
                    Ok(CellValue::Float(*f))
                }
            }
            (_, CellValue::Integer(i)) => {
                if (*i as f64) < lo || (*i as f64) > hi {
                    Err(format!("{} is outside the {} range [{}, {}]", i, self, lo, hi))
                } else {
                    Ok(CellValue::Integer(*i))
                }
            }
            (_, CellValue::Float(f)) => Err(format!("expected {}, got float {}", self, f)),
        }
    }

    /// Neutral value of the kind, used before the first tick of a stateful cell
    pub fn zero(self) -> CellValue {
        match self {
            ValueKind::Bool => CellValue::Bool(false),
            ValueKind::Real => CellValue::Float(0.0),
            _ => CellValue::Integer(0),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "BOOL",
            ValueKind::Byte => "BYTE",
            ValueKind::Int => "INT",
            ValueKind::Word => "WORD",
            ValueKind::DInt => "DINT",
            ValueKind::DWord => "DWORD",
            ValueKind::Real => "REAL",
        };
        f.write_str(name)
    }
}

/// Current value of a memory cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
}

impl CellValue {
    /// Numeric view of the value (booleans map to 0/1)
    pub fn as_f64(&self) -> f64 {
        match self {
            CellValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            CellValue::Integer(i) => *i as f64,
            CellValue::Float(f) => *f,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            CellValue::Bool(b) => *b,
            CellValue::Integer(i) => *i != 0,
            CellValue::Float(f) => *f != 0.0,
        }
    }

    /// Encode the value as a single Modbus register
    pub fn to_register_word(&self, kind: ValueKind) -> u16 {
        match (kind, self) {
            (ValueKind::Int, CellValue::Integer(i)) => (*i as i16) as u16,
            (ValueKind::Byte, CellValue::Integer(i)) => (*i as u8) as u16,
            (_, CellValue::Integer(i)) => *i as u16,
            (_, CellValue::Bool(b)) => *b as u16,
            (_, CellValue::Float(f)) => f.trunc().clamp(0.0, u16::MAX as f64) as u16,
        }
    }

    /// Decode a Modbus register written by a client into a value of `kind`
    pub fn from_register_word(word: u16, kind: ValueKind) -> CellValue {
        match kind {
            ValueKind::Bool => CellValue::Bool(word != 0),
            ValueKind::Int => CellValue::Integer(word as i16 as i64),
            ValueKind::Real => CellValue::Float(word as f64),
            _ => CellValue::Integer(word as i64),
        }
    }

    /// Big-endian S7 encoding of the value
    pub fn to_be_bytes(&self, kind: ValueKind) -> Vec<u8> {
        match kind {
            ValueKind::Bool => vec![self.as_bool() as u8],
            ValueKind::Byte => vec![self.as_f64() as i64 as u8],
            ValueKind::Int => (self.as_f64() as i64 as i16).to_be_bytes().to_vec(),
            ValueKind::Word => (self.as_f64() as i64 as u16).to_be_bytes().to_vec(),
            ValueKind::DInt => (self.as_f64() as i64 as i32).to_be_bytes().to_vec(),
            ValueKind::DWord => (self.as_f64() as i64 as u32).to_be_bytes().to_vec(),
            ValueKind::Real => (self.as_f64() as f32).to_be_bytes().to_vec(),
        }
    }

    /// Decode big-endian S7 bytes into a value of `kind`.
    ///
    /// Returns `None` when `bytes` is shorter than the kind's width.
    pub fn from_be_bytes(bytes: &[u8], kind: ValueKind) -> Option<CellValue> {
        let width = kind.byte_width();
        if bytes.len() < width {
            return None;
        }
        let b = &bytes[..width];
        let value = match kind {
            ValueKind::Bool => CellValue::Bool(b[0] != 0),
            ValueKind::Byte => CellValue::Integer(b[0] as i64),
            ValueKind::Int => CellValue::Integer(i16::from_be_bytes([b[0], b[1]]) as i64),
            ValueKind::Word => CellValue::Integer(u16::from_be_bytes([b[0], b[1]]) as i64),
            ValueKind::DInt => {
                CellValue::Integer(i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as i64)
            }
            ValueKind::DWord => {
                CellValue::Integer(u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as i64)
            }
            ValueKind::Real => {
                CellValue::Float(f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64)
            }
        };
        Some(value)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
        }
    }
}
