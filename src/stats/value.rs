//! Counter values as they appear in a report.

use super::list::{Initial, StatName};
use std::fmt;

/// The value of one counter in a report snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    String(String),
    Uint64(u64),
    Int64(i64),
    Double(f64),
}

impl StatValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            StatValue::Uint64(v) => Some(*v),
            _ => None,
        }
    }

    /// Add another shard's value of `stat` into this one.
    ///
    /// # Panics
    ///
    /// Panics if either side is a string or the two sides disagree on type.
    /// Both indicate a broken counter table.
    pub fn accumulate(&mut self, stat: StatName, other: &StatValue) {
        match (self, other) {
            (StatValue::Uint64(a), StatValue::Uint64(b)) => *a = a.wrapping_add(*b),
            (StatValue::Int64(a), StatValue::Int64(b)) => *a = a.wrapping_add(*b),
            (StatValue::Double(a), StatValue::Double(b)) => *a += *b,
            _ => panic!("cannot aggregate non-numerical stat {}", stat.name()),
        }
    }
}

impl From<Initial> for StatValue {
    fn from(initial: Initial) -> Self {
        match initial {
            Initial::String(s) => StatValue::String(s.to_string()),
            Initial::Uint64(v) => StatValue::Uint64(v),
            Initial::Int64(v) => StatValue::Int64(v),
            Initial::Double(v) => StatValue::Double(v),
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::String(s) => f.write_str(s),
            StatValue::Uint64(v) => write!(f, "{}", v),
            StatValue::Int64(v) => write!(f, "{}", v),
            StatValue::Double(v) => f.write_str(&format_g(*v)),
        }
    }
}

/// Format a double the way C's `%g` does: six significant digits, trailing
/// zeros removed, scientific notation for very small or large magnitudes.
pub fn format_g(value: f64) -> String {
    const PRECISION: i32 = 6;

    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    // Let the scientific formatter do the rounding so the exponent reflects
    // any carry (e.g. 999999.5 becomes 1e+06).
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exponent < -4 || exponent >= PRECISION {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        let decimals = (PRECISION - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_g() {
        assert_eq!(format_g(0.0), "0");
        assert_eq!(format_g(1.0), "1");
        assert_eq!(format_g(2.5), "2.5");
        assert_eq!(format_g(0.1), "0.1");
        assert_eq!(format_g(1.0 / 3.0), "0.333333");
        assert_eq!(format_g(123456.0), "123456");
        assert_eq!(format_g(1234567.0), "1.23457e+06");
        assert_eq!(format_g(0.0001), "0.0001");
        assert_eq!(format_g(0.00001), "1e-05");
        assert_eq!(format_g(-42.125), "-42.125");
        assert_eq!(format_g(999999.5), "1e+06");
    }

    #[test]
    fn test_accumulate_numeric() {
        let mut v = StatValue::Uint64(3);
        v.accumulate(StatName::NumServers, &StatValue::Uint64(4));
        assert_eq!(v, StatValue::Uint64(7));

        let mut d = StatValue::Double(0.5);
        d.accumulate(StatName::DurationUs, &StatValue::Double(0.25));
        assert_eq!(d, StatValue::Double(0.75));
    }

    #[test]
    #[should_panic(expected = "cannot aggregate non-numerical stat")]
    fn test_accumulate_string_is_fatal() {
        let mut v = StatValue::String("a".to_string());
        v.accumulate(StatName::Version, &StatValue::String("b".to_string()));
    }

    #[test]
    fn test_display() {
        assert_eq!(StatValue::Uint64(17).to_string(), "17");
        assert_eq!(StatValue::Int64(-3).to_string(), "-3");
        assert_eq!(StatValue::Double(0.5).to_string(), "0.5");
        assert_eq!(StatValue::String("x y".into()).to_string(), "x y");
    }
}
