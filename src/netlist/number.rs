//! Engineering-notation number parsing.
//!
//! Accepts decimal integers and floats with an optional exponent, hex
//! (`0x1F`), binary (`0b101`) and octal (`017`) integers, and a single
//! engineering scale suffix:
//!
//! | Suffix | Scale |
//! |--------|-------|
//! | `t`, `T` | 1e12 |
//! | `g`, `G` | 1e9 |
//! | `M` | 1e6 |
//! | `k`, `K` | 1e3 |
//! | `m` | 1e-3 |
//! | `u`, `U` | 1e-6 |
//! | `n`, `N` | 1e-9 |
//! | `p`, `P` | 1e-12 |
//! | `f`, `F` | 1e-15 |
//!
//! Anything after the number and its suffix is ignored, so `1kohms` reads
//! as 1000.

/// Parse `text` as a number, returning `None` when no digits are found.
pub fn parse_number(text: &str) -> Option<f64> {
    let s = text.trim_start().as_bytes();
    let mut pos = 0;

    let mut sign = 1.0;
    match s.first() {
        None => return None,
        Some(b'-') => {
            sign = -1.0;
            pos += 1;
        }
        Some(b'+') => pos += 1,
        _ => {}
    }

    if pos >= s.len() {
        return None;
    }

    // Leading zero selects hex, binary or octal unless a fraction follows
    if s[pos] == b'0' {
        pos += 1;
        match s.get(pos) {
            None => return Some(0.0),
            Some(b'x' | b'X') => return Some(sign * radix_digits(&s[pos + 1..], 16)),
            Some(b'b' | b'B') => return Some(sign * radix_digits(&s[pos + 1..], 2)),
            Some(b'.') => {}
            Some(_) => return Some(sign * radix_digits(&s[pos..], 8)),
        }
    }

    let start = pos;
    while pos < s.len() && s[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < s.len() && s[pos] == b'.' {
        pos += 1;
        while pos < s.len() && s[pos].is_ascii_digit() {
            pos += 1;
        }
    }

    let mantissa = &text.trim_start()[start..pos];
    if mantissa.is_empty() || mantissa == "." {
        // A bare leading zero already counts as a digit ("0.")
        if !(start > 0 && s[start - 1] == b'0') {
            return None;
        }
    }
    let mut value = match mantissa {
        "" | "." => 0.0,
        m => m.parse::<f64>().ok()?,
    };

    if let Some(&suffix) = s.get(pos) {
        pos += 1;
        value *= match suffix {
            b'e' | b'E' => 10f64.powi(exponent(&s[pos..])),
            b't' | b'T' => 1e12,
            b'g' | b'G' => 1e9,
            b'M' => 1e6,
            b'k' | b'K' => 1e3,
            b'm' => 1e-3,
            b'u' | b'U' => 1e-6,
            b'n' | b'N' => 1e-9,
            b'p' | b'P' => 1e-12,
            b'f' | b'F' => 1e-15,
            _ => 1.0,
        };
    }

    Some(sign * value)
}

/// Accumulate leading digits of the given radix, stopping at the first
/// character that is not one.
fn radix_digits(s: &[u8], radix: u32) -> f64 {
    s.iter()
        .map_while(|&c| (c as char).to_digit(radix))
        .fold(0.0, |acc, d| acc * radix as f64 + d as f64)
}

/// Signed decimal exponent; missing digits read as zero.
fn exponent(s: &[u8]) -> i32 {
    let (negative, digits) = match s.first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let magnitude = digits
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .fold(0i32, |acc, c| acc.saturating_mul(10).saturating_add((c - b'0') as i32));
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_engineering_suffixes() {
        assert_eq!(parse_number("1k"), Some(1000.0));
        assert_relative_eq!(parse_number("2.2u").unwrap(), 2.2e-6, max_relative = 1e-12);
        assert_relative_eq!(parse_number("100n").unwrap(), 1e-7, max_relative = 1e-12);
        assert_relative_eq!(parse_number("4.7M").unwrap(), 4.7e6, max_relative = 1e-12);
        assert_relative_eq!(parse_number("3m").unwrap(), 3e-3, max_relative = 1e-12);
        assert_relative_eq!(parse_number("5f").unwrap(), 5e-15, max_relative = 1e-12);
        assert_eq!(parse_number("1kohms"), Some(1000.0));
    }

    #[test]
    fn test_integer_bases() {
        assert_eq!(parse_number("0x1F"), Some(31.0));
        assert_eq!(parse_number("0b101"), Some(5.0));
        assert_eq!(parse_number("017"), Some(15.0));
        assert_eq!(parse_number("-0x10"), Some(-16.0));
        assert_eq!(parse_number("0"), Some(0.0));
    }

    #[test]
    fn test_plain_and_scientific() {
        assert_eq!(parse_number("10"), Some(10.0));
        assert_eq!(parse_number("  -2.5"), Some(-2.5));
        assert_eq!(parse_number("+7"), Some(7.0));
        assert_eq!(parse_number("0.5"), Some(0.5));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_relative_eq!(parse_number("2.5E-3").unwrap(), 2.5e-3, max_relative = 1e-12);
        assert_eq!(parse_number(".5"), Some(0.5));
    }

    #[test]
    fn test_rejects_non_numbers() {
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("   "), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("k1"), None);
    }
}
