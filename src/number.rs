use std::cmp::Ordering;
use std::fmt;

use num::{
    bigint::BigInt,
    rational::BigRational,
    traits::{Pow, Signed, ToPrimitive, Zero},
};

/// The sole numeric type of the language: an exact arbitrary-precision
/// rational, or a signed infinity. Zero is unsigned and compares equal to
/// itself; integers are the sub-domain with denominator one.
///
/// The variant order gives the derived `Ord` the numeric order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Num {
    NegInf,
    Finite(BigRational),
    PosInf,
}

impl Num {
    pub fn zero() -> Self {
        Num::Finite(BigRational::zero())
    }

    pub fn from_i64(v: i64) -> Self {
        Num::Finite(BigRational::from_integer(BigInt::from(v)))
    }

    pub fn from_u64(v: u64) -> Self {
        Num::Finite(BigRational::from_integer(BigInt::from(v)))
    }

    pub fn from_usize(v: usize) -> Self {
        Num::Finite(BigRational::from_integer(BigInt::from(v)))
    }

    pub fn from_byte(v: u8) -> Self {
        Num::Finite(BigRational::from_integer(BigInt::from(v)))
    }

    pub fn from_f64(v: f64) -> Option<Self> {
        if v.is_nan() {
            return None;
        }
        if v.is_infinite() {
            return Some(if v > 0.0 { Num::PosInf } else { Num::NegInf });
        }
        BigRational::from_float(v).map(Num::Finite)
    }

    /// Parses a numeric literal: `inf`, or an unsigned decimal/binary/octal/
    /// hex literal with optional `_` separators and a base-10 fraction.
    pub fn parse(text: &str) -> Result<Num, String> {
        if text == "inf" {
            return Ok(Num::PosInf);
        }

        let compact: String = text.chars().filter(|&ch| ch != '_').collect();
        let bad = || format!("invalid number literal `{text}`");

        let radix = match compact.get(..2) {
            Some("0b") | Some("0B") => 2,
            Some("0o") | Some("0O") => 8,
            Some("0x") | Some("0X") => 16,
            _ => 10,
        };

        if radix != 10 {
            let digits = &compact[2..];
            if digits.is_empty() || digits.contains('.') {
                return Err(bad());
            }
            let int = BigInt::parse_bytes(digits.as_bytes(), radix).ok_or_else(bad)?;
            return Ok(Num::Finite(BigRational::from_integer(int)));
        }

        let (int_part, frac_part) = match compact.split_once('.') {
            Some((int, frac)) => (int, frac),
            None => (compact.as_str(), ""),
        };
        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }

        let mut digits = String::with_capacity(int_part.len() + frac_part.len());
        digits.push_str(int_part);
        digits.push_str(frac_part);
        let numer = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or_else(bad)?;
        let denom = BigInt::from(10).pow(frac_part.len() as u32);
        Ok(Num::Finite(BigRational::new(numer, denom)))
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Num::Finite(r) if r.is_zero())
    }

    pub fn is_inf(&self) -> bool {
        matches!(self, Num::PosInf | Num::NegInf)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Num::Finite(r) if r.is_integer())
    }

    /// -1, 0 or 1.
    pub fn sign(&self) -> i32 {
        match self {
            Num::NegInf => -1,
            Num::PosInf => 1,
            Num::Finite(r) => match r.cmp(&BigRational::zero()) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            },
        }
    }

    pub fn neg(&self) -> Num {
        match self {
            Num::NegInf => Num::PosInf,
            Num::PosInf => Num::NegInf,
            Num::Finite(r) => Num::Finite(-r.clone()),
        }
    }

    pub fn abs(&self) -> Num {
        match self {
            Num::NegInf | Num::PosInf => Num::PosInf,
            Num::Finite(r) => Num::Finite(r.abs()),
        }
    }

    fn inf_with_sign(negative: bool) -> Num {
        if negative {
            Num::NegInf
        } else {
            Num::PosInf
        }
    }

    pub fn checked_add(&self, other: &Num) -> Result<Num, String> {
        match (self, other) {
            (Num::Finite(a), Num::Finite(b)) => Ok(Num::Finite(a + b)),
            (a, b) if a.is_inf() && b.is_inf() => {
                if a.sign() != b.sign() {
                    Err("addition of inf and inf with opposite signs".into())
                } else {
                    Ok(a.clone())
                }
            }
            (a, b) => Ok(if a.is_inf() { a.clone() } else { b.clone() }),
        }
    }

    pub fn checked_sub(&self, other: &Num) -> Result<Num, String> {
        match (self, other) {
            (Num::Finite(a), Num::Finite(b)) => Ok(Num::Finite(a - b)),
            (a, b) if a.is_inf() && b.is_inf() => {
                if a.sign() == b.sign() {
                    Err("subtraction of inf from inf with equal signs".into())
                } else {
                    Ok(a.clone())
                }
            }
            (a, b) => Ok(if a.is_inf() { a.clone() } else { b.neg() }),
        }
    }

    pub fn checked_mul(&self, other: &Num) -> Result<Num, String> {
        if (self.is_zero() && other.is_inf()) || (self.is_inf() && other.is_zero()) {
            return Err("one operand is zero and the other operand an infinity".into());
        }
        match (self, other) {
            (Num::Finite(a), Num::Finite(b)) => Ok(Num::Finite(a * b)),
            (a, b) => Ok(Num::inf_with_sign(a.sign() * b.sign() < 0)),
        }
    }

    pub fn checked_div(&self, other: &Num) -> Result<Num, String> {
        if self.is_zero() && other.is_zero() {
            return Err("division of zero into zero".into());
        }
        if self.is_inf() && other.is_inf() {
            return Err("division of inf into inf".into());
        }
        if other.is_inf() {
            return Ok(Num::zero());
        }
        if self.is_inf() || other.is_zero() {
            // Unsigned zero contributes a positive sign.
            let rsign = if other.sign() == 0 { 1 } else { other.sign() };
            return Ok(Num::inf_with_sign(self.sign() * rsign < 0));
        }
        match (self, other) {
            (Num::Finite(a), Num::Finite(b)) => Ok(Num::Finite(a / b)),
            _ => unreachable!("infinite operands handled above"),
        }
    }

    /// Integer operands use Euclidean modulus (the result is non-negative).
    /// Otherwise the result is `x - trunc(x/y)*y`, shifted by the divisor
    /// when a negative dividend leaves a remainder of the opposite sign.
    pub fn checked_rem(&self, other: &Num) -> Result<Num, String> {
        if other.is_inf() {
            return Err("modulus with inf".into());
        }
        if other.is_zero() {
            return Err("modulus with zero".into());
        }
        if self.is_inf() {
            let rsign = if other.sign() == 0 { 1 } else { other.sign() };
            return Ok(Num::inf_with_sign(self.sign() * rsign < 0));
        }

        let (a, b) = match (self, other) {
            (Num::Finite(a), Num::Finite(b)) => (a, b),
            _ => unreachable!("infinite operands handled above"),
        };

        if a.is_integer() && b.is_integer() {
            let x = a.to_integer();
            let y = b.to_integer();
            let mut rem = &x % &y;
            if rem.sign() == num::bigint::Sign::Minus {
                rem += y.abs();
            }
            return Ok(Num::Finite(BigRational::from_integer(rem)));
        }

        let div = a / b;
        let mut rem = a - div.trunc() * b;
        if self.sign() < 0 && !rem.is_zero() {
            let rem_negative = rem < BigRational::zero();
            if rem_negative != (other.sign() < 0) {
                rem = rem + b;
            }
        }
        Ok(Num::Finite(rem))
    }

    pub fn checked_pow(&self, exp: &Num) -> Result<Num, String> {
        match (self, exp) {
            (Num::Finite(base), Num::Finite(e)) => {
                if e.is_integer() {
                    if let Some(small) = e.to_integer().to_i32() {
                        if small.unsigned_abs() <= 1_000_000 {
                            return finite_int_pow(base, small);
                        }
                    }
                }
                let base = base.to_f64().ok_or("base is too large")?;
                let e = e.to_f64().ok_or("exponent is too large")?;
                Num::from_f64(base.powf(e)).ok_or_else(|| "power is undefined".to_string())
            }
            (base, Num::Finite(e)) => {
                // Infinite base, finite exponent.
                if e.is_zero() {
                    Ok(Num::from_i64(1))
                } else if e.is_negative() {
                    Ok(Num::zero())
                } else {
                    Ok(base.clone())
                }
            }
            (base, e) => {
                // Infinite exponent.
                let mag = base.abs();
                let one = Num::from_i64(1);
                if mag == one {
                    Ok(one)
                } else if (mag > one) == (e.sign() > 0) {
                    Ok(Num::PosInf)
                } else {
                    Ok(Num::zero())
                }
            }
        }
    }

    pub fn as_i64(&self) -> Result<i64, String> {
        let r = match self {
            Num::Finite(r) => r,
            _ => return Err("number is not integer".into()),
        };
        if !r.is_integer() {
            return Err("number is not integer".into());
        }
        let int = r.to_integer();
        if int < BigInt::from(i64::MIN) {
            return Err("number less than -2^63 (min int64)".into());
        }
        if int > BigInt::from(i64::MAX) {
            return Err("number greater than 2^63 - 1 (max int64)".into());
        }
        int.to_i64().ok_or_else(|| "number is not integer".into())
    }

    pub fn as_u64(&self) -> Result<u64, String> {
        let r = match self {
            Num::Finite(r) => r,
            _ => return Err("number is not integer".into()),
        };
        if !r.is_integer() {
            return Err("number is not integer".into());
        }
        let int = r.to_integer();
        if int.sign() == num::bigint::Sign::Minus {
            return Err("number is negative".into());
        }
        if int > BigInt::from(u64::MAX) {
            return Err("number greater than 2^64".into());
        }
        int.to_u64().ok_or_else(|| "number is not integer".into())
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Num::PosInf => Some(f64::INFINITY),
            Num::NegInf => Some(f64::NEG_INFINITY),
            Num::Finite(r) => r.to_f64(),
        }
    }
}

fn finite_int_pow(base: &BigRational, exp: i32) -> Result<Num, String> {
    if exp == 0 {
        return Ok(Num::from_i64(1));
    }
    if base.is_zero() && exp < 0 {
        return Err("zero to a negative power".into());
    }
    let positive = base.pow(exp.abs());
    if exp < 0 {
        Ok(Num::Finite(positive.recip()))
    } else {
        Ok(Num::Finite(positive))
    }
}

/// Fractional digits produced for values with no finite decimal expansion.
const APPROX_DIGITS: u32 = 30;

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = match self {
            Num::PosInf => return write!(f, "inf"),
            Num::NegInf => return write!(f, "-inf"),
            Num::Finite(r) => r,
        };
        if r.is_integer() {
            return write!(f, "{}", r.numer());
        }

        let negative = r < &BigRational::zero();
        let abs = r.abs();
        let numer = abs.numer().clone();
        let denom = abs.denom().clone();

        // A denominator of only twos and fives has an exact expansion.
        let mut rest = denom.clone();
        let two = BigInt::from(2);
        let five = BigInt::from(5);
        let mut twos = 0u32;
        let mut fives = 0u32;
        while (&rest % &two).is_zero() {
            rest /= &two;
            twos += 1;
        }
        while (&rest % &five).is_zero() {
            rest /= &five;
            fives += 1;
        }

        if negative {
            write!(f, "-")?;
        }

        if rest == BigInt::from(1) {
            let scale = twos.max(fives);
            let scaled = numer * BigInt::from(10).pow(scale) / denom;
            let mut digits = scaled.to_string();
            let width = scale as usize + 1;
            if digits.len() < width {
                digits = format!("{}{}", "0".repeat(width - digits.len()), digits);
            }
            let split = digits.len() - scale as usize;
            write!(f, "{}.{}", &digits[..split], &digits[split..])
        } else {
            let int = (&numer / &denom).to_string();
            let frac_num = &numer % &denom;
            let mut frac =
                (frac_num * BigInt::from(10).pow(APPROX_DIGITS) / denom).to_string();
            if frac.len() < APPROX_DIGITS as usize {
                frac = format!("{}{}", "0".repeat(APPROX_DIGITS as usize - frac.len()), frac);
            }
            let trimmed = frac.trim_end_matches('0');
            write!(f, "{int}.{trimmed}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(text: &str) -> Num {
        Num::parse(text).expect("parse should succeed")
    }

    #[test]
    fn parses_bases_and_separators() {
        assert_eq!(num("007"), Num::from_i64(7));
        assert_eq!(num("10_000"), Num::from_i64(10_000));
        assert_eq!(num("0b101010"), Num::from_i64(0b101010));
        assert_eq!(num("0o777"), Num::from_i64(0o777));
        assert_eq!(num("0xffaabb"), Num::from_i64(0xffaabb));
        assert_eq!(num("0XFF"), Num::from_i64(0xff));
        assert_eq!(num("inf"), Num::PosInf);
    }

    #[test]
    fn parses_fractions_exactly() {
        assert_eq!(num("1_000.0203_405"), num("1000.0203405"));
        assert_eq!(num("0.5").to_string(), "0.5");
        assert!(!num("0.1").is_integer());
    }

    #[test]
    fn rejects_malformed_literals() {
        for bad in ["0b", "0b2", "0o8", "0xg", "0x1.8", "1x2"] {
            assert!(Num::parse(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn renders_round_trip() {
        for text in ["0", "7", "42", "0.5", "3.25", "1000.0203405", "inf"] {
            assert_eq!(num(text).to_string(), text, "{text}");
        }
        assert_eq!(num("1.50").to_string(), "1.5");
        assert_eq!(num("0.05").to_string(), "0.05");
        assert_eq!(Num::parse("inf").unwrap().neg().to_string(), "-inf");
    }

    #[test]
    fn renders_repeating_fractions_deterministically() {
        let third = Num::from_i64(1).checked_div(&Num::from_i64(3)).unwrap();
        let text = third.to_string();
        assert!(text.starts_with("0.333333"));
        assert_eq!(text, third.to_string());
    }

    #[test]
    fn exact_zero_and_integer_checks() {
        assert!(num("0").is_zero());
        assert!(num("0.0").is_zero());
        assert!(!num("0.0001").is_zero());
        assert!(num("5.0").is_integer());
        assert!(!Num::PosInf.is_integer());
    }

    #[test]
    fn ordering_includes_infinities() {
        assert!(Num::NegInf < num("0"));
        assert!(num("0") < Num::PosInf);
        assert!(num("2") < num("10"));
        assert_eq!(Num::PosInf, Num::PosInf);
    }

    #[test]
    fn addition_infinity_rules() {
        assert_eq!(Num::PosInf.checked_add(&Num::PosInf).unwrap(), Num::PosInf);
        assert_eq!(Num::PosInf.checked_add(&num("111")).unwrap(), Num::PosInf);
        let err = Num::PosInf.checked_add(&Num::NegInf).unwrap_err();
        assert!(err.contains("opposite signs"));
    }

    #[test]
    fn subtraction_infinity_rules() {
        assert_eq!(Num::PosInf.checked_sub(&Num::NegInf).unwrap(), Num::PosInf);
        let err = Num::PosInf.checked_sub(&Num::PosInf).unwrap_err();
        assert!(err.contains("equal signs"));
    }

    #[test]
    fn division_rules() {
        assert!(num("0").checked_div(&num("0")).is_err());
        assert!(Num::PosInf.checked_div(&Num::NegInf).is_err());
        assert_eq!(num("1").checked_div(&num("0")).unwrap(), Num::PosInf);
        assert_eq!(num("1").neg().checked_div(&num("0")).unwrap(), Num::NegInf);
        assert_eq!(num("5").checked_div(&Num::PosInf).unwrap(), Num::zero());
        assert_eq!(num("1").checked_div(&num("4")).unwrap(), num("0.25"));
    }

    #[test]
    fn multiplication_rules() {
        assert!(num("0").checked_mul(&Num::PosInf).is_err());
        assert_eq!(
            num("2").neg().checked_mul(&Num::PosInf).unwrap(),
            Num::NegInf
        );
        assert_eq!(num("6").checked_mul(&num("7")).unwrap(), num("42"));
    }

    #[test]
    fn integer_modulus_is_euclidean() {
        let rem = |a: i64, b: i64| {
            Num::from_i64(a)
                .checked_rem(&Num::from_i64(b))
                .expect("modulus should succeed")
        };
        assert_eq!(rem(-4, 3), Num::from_i64(2));
        assert_eq!(rem(4, 3), Num::from_i64(1));
        assert_eq!(rem(-4, -3), Num::from_i64(2));
    }

    #[test]
    fn float_modulus_shares_divisor_sign() {
        let rem = |a: &str, b: &str| num(a).checked_rem(&num(b)).unwrap();
        assert_eq!(rem("5.5", "2"), num("1.5"));
        let adjusted = num("5.5").neg().checked_rem(&num("2")).unwrap();
        assert_eq!(adjusted, num("0.5"));
    }

    #[test]
    fn modulus_error_cases() {
        assert!(num("5").checked_rem(&num("0")).is_err());
        assert!(num("5").checked_rem(&Num::PosInf).is_err());
    }

    #[test]
    fn int_conversions_guard_range_and_sign() {
        assert_eq!(num("42").as_i64().unwrap(), 42);
        assert!(num("0.5").as_i64().is_err());
        assert!(num("1").neg().as_u64().is_err());
        assert!(num("18446744073709551616").as_u64().is_err());
        assert!(num("9223372036854775808").as_i64().is_err());
        assert!(Num::PosInf.as_i64().is_err());
    }

    #[test]
    fn pow_exact_and_approximate() {
        let pow = |a: &str, b: &str| num(a).checked_pow(&num(b)).unwrap();
        assert_eq!(pow("2", "10"), num("1024"));
        assert_eq!(pow("2", "0"), num("1"));
        assert_eq!(pow("4", "0.5"), num("2"));
        assert!(num("0").checked_pow(&num("1").neg()).is_err());
    }
}
