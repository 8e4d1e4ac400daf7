//! Numeric tower: arithmetic, comparison, negation, floor/true/mod division
//! over the concrete numeric variants (§4.1).
//!
//! Widths are preserved so host overload resolution can pick the exact-width
//! signature (§3.1). Two operands are evaluated at the wider of the two
//! variants, ordered `byte < short < int < long < float < double`.

use crate::exception::{ExcType, RunError, RunResult};

/// A concrete-width numeric value.
///
/// Integer literals collapse to `Int` when they fit in 32 bits, else `Long`.
/// Floating-point literals are always `Double`. `Byte`/`Short`/`Float` only
/// ever arise from host interop (an overload-chosen narrowing, or a value
/// read back from a host field of that width).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Width {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl Numeric {
    fn width(self) -> Width {
        match self {
            Numeric::Byte(_) => Width::Byte,
            Numeric::Short(_) => Width::Short,
            Numeric::Int(_) => Width::Int,
            Numeric::Long(_) => Width::Long,
            Numeric::Float(_) => Width::Float,
            Numeric::Double(_) => Width::Double,
        }
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Byte(v) => f64::from(v),
            Numeric::Short(v) => f64::from(v),
            Numeric::Int(v) => f64::from(v),
            Numeric::Long(v) => v as f64,
            Numeric::Float(v) => f64::from(v),
            Numeric::Double(v) => v,
        }
    }

    #[must_use]
    pub fn as_i64(self) -> i64 {
        match self {
            Numeric::Byte(v) => i64::from(v),
            Numeric::Short(v) => i64::from(v),
            Numeric::Int(v) => i64::from(v),
            Numeric::Long(v) => v,
            Numeric::Float(v) => v as i64,
            Numeric::Double(v) => v as i64,
        }
    }

    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Numeric::Float(_) | Numeric::Double(_))
    }

    /// Widens `self` up to `width`, never narrowing.
    fn widen_to(self, width: Width) -> Numeric {
        if self.width() >= width {
            return self;
        }
        match width {
            Width::Short => Numeric::Short(self.as_i64() as i16),
            Width::Int => Numeric::Int(self.as_i64() as i32),
            Width::Long => Numeric::Long(self.as_i64()),
            Width::Float => Numeric::Float(self.as_f64() as f32),
            Width::Double => Numeric::Double(self.as_f64()),
            Width::Byte => self,
        }
    }

    /// Widens the pair to a common width (the wider of the two), per §4.1.
    fn promote(a: Numeric, b: Numeric) -> (Numeric, Numeric) {
        let w = a.width().max(b.width());
        (a.widen_to(w), b.widen_to(w))
    }

    #[must_use]
    pub fn negate(self) -> Numeric {
        match self {
            Numeric::Byte(v) => Numeric::Byte(v.wrapping_neg()),
            Numeric::Short(v) => Numeric::Short(v.wrapping_neg()),
            Numeric::Int(v) => Numeric::Int(v.wrapping_neg()),
            Numeric::Long(v) => Numeric::Long(v.wrapping_neg()),
            Numeric::Float(v) => Numeric::Float(-v),
            Numeric::Double(v) => Numeric::Double(-v),
        }
    }

    pub fn add(self, other: Numeric) -> Numeric {
        let (a, b) = Self::promote(self, other);
        Self::apply_same_width(a, b, |x, y| x.wrapping_add(y), |x, y| x + y)
    }

    pub fn sub(self, other: Numeric) -> Numeric {
        let (a, b) = Self::promote(self, other);
        Self::apply_same_width(a, b, |x, y| x.wrapping_sub(y), |x, y| x - y)
    }

    pub fn mul(self, other: Numeric) -> Numeric {
        let (a, b) = Self::promote(self, other);
        Self::apply_same_width(a, b, |x, y| x.wrapping_mul(y), |x, y| x * y)
    }

    /// True division: always produces a `Double` (§4.1).
    pub fn true_div(self, other: Numeric) -> RunResult<Numeric> {
        if other.as_f64() == 0.0 {
            return Err(RunError::simple(ExcType::ZeroDivisionError, "division by zero"));
        }
        Ok(Numeric::Double(self.as_f64() / other.as_f64()))
    }

    /// Floor division: integer floor on ints, `floor(a/b)` as a float on floats.
    pub fn floor_div(self, other: Numeric) -> RunResult<Numeric> {
        let (a, b) = Self::promote(self, other);
        if a.is_float() || b.is_float() {
            if other.as_f64() == 0.0 {
                return Err(RunError::simple(ExcType::ZeroDivisionError, "float floor division by zero"));
            }
            return Ok(Numeric::Double((a.as_f64() / b.as_f64()).floor()));
        }
        let (x, y) = (a.as_i64(), b.as_i64());
        if y == 0 {
            return Err(RunError::simple(ExcType::ZeroDivisionError, "integer division or modulo by zero"));
        }
        let mut quotient = x / y;
        let remainder = x % y;
        if remainder != 0 && ((remainder < 0) != (y < 0)) {
            quotient -= 1;
        }
        Ok(Self::rewiden(quotient, a.width()))
    }

    /// Python-style modulo: result has the sign of the divisor (§4.1).
    pub fn py_mod(self, other: Numeric) -> RunResult<Numeric> {
        let (a, b) = Self::promote(self, other);
        if a.is_float() || b.is_float() {
            let (x, y) = (a.as_f64(), b.as_f64());
            if y == 0.0 {
                return Err(RunError::simple(ExcType::ZeroDivisionError, "float modulo"));
            }
            let r = x - (x / y).floor() * y;
            return Ok(Numeric::Double(r));
        }
        let (x, y) = (a.as_i64(), b.as_i64());
        if y == 0 {
            return Err(RunError::simple(ExcType::ZeroDivisionError, "integer division or modulo by zero"));
        }
        let mut r = x % y;
        if r != 0 && ((r < 0) != (y < 0)) {
            r += y;
        }
        Ok(Self::rewiden(r, a.width()))
    }

    /// "Host-style" modulo: carries the sign of the dividend, as the host
    /// platform's native `%` operator would (explicitly requested, §4.1).
    pub fn host_mod(self, other: Numeric) -> RunResult<Numeric> {
        let (a, b) = Self::promote(self, other);
        if a.is_float() || b.is_float() {
            let (x, y) = (a.as_f64(), b.as_f64());
            if y == 0.0 {
                return Err(RunError::simple(ExcType::ZeroDivisionError, "float modulo"));
            }
            return Ok(Numeric::Double(x % y));
        }
        let (x, y) = (a.as_i64(), b.as_i64());
        if y == 0 {
            return Err(RunError::simple(ExcType::ZeroDivisionError, "integer division or modulo by zero"));
        }
        Ok(Self::rewiden(x % y, a.width()))
    }

    /// Total order for same-kind pairs; cross-kind compares widen first (§4.1).
    pub fn compare(self, other: Numeric) -> std::cmp::Ordering {
        let (a, b) = Self::promote(self, other);
        if a.is_float() || b.is_float() {
            a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(std::cmp::Ordering::Equal)
        } else {
            a.as_i64().cmp(&b.as_i64())
        }
    }

    fn apply_same_width(a: Numeric, b: Numeric, int_op: fn(i64, i64) -> i64, float_op: fn(f64, f64) -> f64) -> Numeric {
        if a.is_float() || b.is_float() {
            Numeric::Double(float_op(a.as_f64(), b.as_f64()))
        } else {
            Self::rewiden(int_op(a.as_i64(), b.as_i64()), a.width())
        }
    }

    /// Places an int result back at its operand width, widening to the next
    /// size if it no longer fits (e.g. a 32-bit shift overflow, per the
    /// boundary behavior in spec.md §8).
    fn rewiden(value: i64, width: Width) -> Numeric {
        match width {
            Width::Byte | Width::Short | Width::Int => {
                if i32::try_from(value).is_ok() {
                    Numeric::Int(value as i32)
                } else {
                    Numeric::Long(value)
                }
            }
            _ => Numeric::Long(value),
        }
    }

    /// Literal-collapsing constructor (§3.1): fits in 32 bits → `Int`, else `Long`.
    #[must_use]
    pub fn from_int_literal(value: i64) -> Numeric {
        Self::rewiden(value, Width::Int)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_mod_invariant() {
        for a in -5..=5i64 {
            for b in -5..=5i64 {
                if b == 0 {
                    continue;
                }
                let qa = Numeric::Long(a);
                let qb = Numeric::Long(b);
                let q = qa.floor_div(qb).unwrap().as_i64();
                let r = qa.py_mod(qb).unwrap().as_i64();
                assert_eq!(q * b + r, a, "a={a} b={b}");
                assert!(r == 0 || r.signum() == b.signum(), "sign a={a} b={b} r={r}");
            }
        }
    }

    #[test]
    fn true_div_always_double() {
        let r = Numeric::Int(7).true_div(Numeric::Int(2)).unwrap();
        assert!(matches!(r, Numeric::Double(v) if (v - 3.5).abs() < 1e-9));
    }

    #[test]
    fn widening_picks_wider_variant() {
        let r = Numeric::Int(1).add(Numeric::Double(0.5));
        assert!(matches!(r, Numeric::Double(v) if (v - 1.5).abs() < 1e-9));
    }
}
