//! Symbolic value algebra
//!
//! A [`Value`] represents `a * instr + b` for 32-bit constant coefficients,
//! with `Unknown` standing for "no information". The format is deliberately
//! small; it cannot express every bound the evaluator encounters, but it is
//! exactly what bounds-check elimination can consume. Every coefficient
//! operation is checked and degrades to `Unknown` instead of wrapping.

use crate::ir::InstrId;

/// A symbolic bound: `a * instr + b`, or nothing at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    /// Unknown acts as the minimum of all lower bounds and the maximum of
    /// all upper bounds
    Unknown,
    /// `instr` is `None` exactly when `a == 0` (a plain constant)
    Known {
        instr: Option<InstrId>,
        a: i32,
        b: i32,
    },
}

impl Value {
    /// The plain constant `b`
    pub fn constant(b: i32) -> Self {
        Value::Known {
            instr: None,
            a: 0,
            b,
        }
    }

    /// `a * instr + b`, normalizing `a == 0` to a plain constant
    pub fn affine(instr: InstrId, a: i32, b: i32) -> Self {
        Self::make(Some(instr), a, b)
    }

    fn make(instr: Option<InstrId>, a: i32, b: i32) -> Self {
        if a == 0 {
            Self::constant(b)
        } else {
            Value::Known { instr, a, b }
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, Value::Known { .. })
    }

    /// The constant payload, when this value carries no symbolic part
    pub fn as_constant(self) -> Option<i32> {
        match self {
            Value::Known { a: 0, b, .. } => Some(b),
            _ => None,
        }
    }

    /// The symbolic part, when there is one
    pub fn instr(self) -> Option<InstrId> {
        match self {
            Value::Known { instr, .. } => instr,
            Value::Unknown => None,
        }
    }

    pub fn add(self, other: Value) -> Value {
        match (self, other) {
            (
                Value::Known {
                    instr: i1,
                    a: a1,
                    b: b1,
                },
                Value::Known {
                    instr: i2,
                    a: a2,
                    b: b2,
                },
            ) => {
                let b = match b1.checked_add(b2) {
                    Some(b) => b,
                    None => return Value::Unknown,
                };
                if a1 == 0 {
                    Self::make(i2, a2, b)
                } else if a2 == 0 {
                    Self::make(i1, a1, b)
                } else if i1 == i2 {
                    match a1.checked_add(a2) {
                        Some(a) => Self::make(i1, a, b),
                        None => Value::Unknown,
                    }
                } else {
                    Value::Unknown
                }
            }
            _ => Value::Unknown,
        }
    }

    pub fn sub(self, other: Value) -> Value {
        match (self, other) {
            (
                Value::Known {
                    instr: i1,
                    a: a1,
                    b: b1,
                },
                Value::Known {
                    instr: i2,
                    a: a2,
                    b: b2,
                },
            ) => {
                let b = match b1.checked_sub(b2) {
                    Some(b) => b,
                    None => return Value::Unknown,
                };
                if a2 == 0 {
                    Self::make(i1, a1, b)
                } else if a1 == 0 {
                    match a2.checked_neg() {
                        Some(a) => Self::make(i2, a, b),
                        None => Value::Unknown,
                    }
                } else if i1 == i2 {
                    match a1.checked_sub(a2) {
                        Some(a) => Self::make(i1, a, b),
                        None => Value::Unknown,
                    }
                } else {
                    Value::Unknown
                }
            }
            _ => Value::Unknown,
        }
    }

    /// Multiplication; defined only when one operand is a plain constant
    pub fn mul(self, other: Value) -> Value {
        match (self, other) {
            (
                Value::Known {
                    instr: i1,
                    a: a1,
                    b: b1,
                },
                Value::Known {
                    instr: i2,
                    a: a2,
                    b: b2,
                },
            ) => {
                if a1 == 0 {
                    match (b1.checked_mul(a2), b1.checked_mul(b2)) {
                        (Some(a), Some(b)) => Self::make(i2, a, b),
                        _ => Value::Unknown,
                    }
                } else if a2 == 0 {
                    match (b2.checked_mul(a1), b2.checked_mul(b1)) {
                        (Some(a), Some(b)) => Self::make(i1, a, b),
                        _ => Value::Unknown,
                    }
                } else {
                    Value::Unknown
                }
            }
            _ => Value::Unknown,
        }
    }

    /// Division; defined only for a non-zero constant divisor that divides
    /// both coefficients exactly
    pub fn div(self, other: Value) -> Value {
        let divisor = match other.as_constant() {
            Some(d) if d != 0 => d,
            _ => return Value::Unknown,
        };
        match self {
            Value::Known { instr, a, b } => {
                match (a.checked_rem(divisor), b.checked_rem(divisor)) {
                    (Some(0), Some(0)) => match (a.checked_div(divisor), b.checked_div(divisor)) {
                        (Some(a), Some(b)) => Self::make(instr, a, b),
                        _ => Value::Unknown,
                    },
                    _ => Value::Unknown,
                }
            }
            Value::Unknown => Value::Unknown,
        }
    }

    /// Keep the dominating bound when both sides have a comparable shape
    pub fn merge(self, other: Value, is_min: bool) -> Value {
        match (self, other) {
            (
                Value::Known {
                    instr: i1,
                    a: a1,
                    b: b1,
                },
                Value::Known {
                    instr: i2,
                    a: a2,
                    b: b2,
                },
            ) if i1 == i2 && a1 == a2 => {
                Self::make(i1, a1, if is_min { b1.min(b2) } else { b1.max(b2) })
            }
            _ => Value::Unknown,
        }
    }
}
