//! Java's string conversions and bit-level views of primitives.
//!
//! `Float.toString` and `Double.toString` print the shortest decimal that
//! round-trips, in plain notation for magnitudes in `[1e-3, 1e7)` and in
//! computerized scientific notation (`1.0E10`) outside it. Rust's `{:e}`
//! formatting yields the same shortest digits, so only the layout differs.

/// `Float.floatToIntBits`, which canonicalizes every NaN.
#[must_use]
pub fn float_to_int_bits(value: f32) -> i32 {
    if value.is_nan() {
        0x7fc0_0000
    } else {
        value.to_bits() as i32
    }
}

/// `Double.doubleToLongBits`, which canonicalizes every NaN.
#[must_use]
pub fn double_to_long_bits(value: f64) -> i64 {
    if value.is_nan() {
        0x7ff8_0000_0000_0000
    } else {
        value.to_bits() as i64
    }
}

/// `String.hashCode`, computed over UTF-16 code units.
#[must_use]
pub fn string_hash(value: &str) -> i32 {
    value
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// `Float.toString`.
#[must_use]
pub fn float_to_string(value: f32) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    let abs = f64::from(value.abs());
    layout(
        value.is_sign_negative(),
        &format!("{:e}", value.abs()),
        (1e-3..1e7).contains(&abs),
    )
}

/// `Double.toString`.
#[must_use]
pub fn double_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    let abs = value.abs();
    layout(
        value.is_sign_negative(),
        &format!("{abs:e}"),
        (1e-3..1e7).contains(&abs),
    )
}

/// Rearranges Rust's `d.ddde±x` output into Java's layout.
fn layout(negative: bool, scientific: &str, plain: bool) -> String {
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    let mut out = String::with_capacity(digits.len() + 8);
    if negative {
        out.push('-');
    }

    if plain {
        if exponent >= 0 {
            let int_len = exponent as usize + 1;
            if digits.len() > int_len {
                out.push_str(&digits[..int_len]);
                out.push('.');
                out.push_str(&digits[int_len..]);
            } else {
                out.push_str(digits);
                out.extend(std::iter::repeat('0').take(int_len - digits.len()));
                out.push_str(".0");
            }
        } else {
            out.push_str("0.");
            out.extend(std::iter::repeat('0').take((-exponent - 1) as usize));
            out.push_str(digits);
        }
    } else {
        out.push_str(&digits[..1]);
        out.push('.');
        if digits.len() > 1 {
            out.push_str(&digits[1..]);
        } else {
            out.push('0');
        }
        out.push('E');
        out.push_str(&exponent.to_string());
    }
    out
}

/// `Integer.toHexString` and friends: unsigned radix-16 of the raw bits.
#[must_use]
pub fn to_unsigned_string(bits: u64, shift: u32) -> String {
    match shift {
        4 => format!("{bits:x}"),
        3 => format!("{bits:o}"),
        _ => format!("{bits:b}"),
    }
}

/// Parses like `Integer.parseInt(s, radix)`: optional sign, digits only.
#[must_use]
pub fn parse_int(text: &str, radix: u32) -> Option<i32> {
    parse_long(text, radix).and_then(|v| i32::try_from(v).ok())
}

/// Parses like `Long.parseLong(s, radix)`.
#[must_use]
pub fn parse_long(text: &str, radix: u32) -> Option<i64> {
    if !(2..=36).contains(&radix) {
        return None;
    }
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.is_empty() {
        return None;
    }
    let mut acc: i128 = 0;
    for ch in digits.chars() {
        acc = acc * i128::from(radix) + i128::from(ch.to_digit(radix)?);
        if acc > i128::from(i64::MAX) + 1 {
            return None;
        }
    }
    let acc = if negative { -acc } else { acc };
    i64::try_from(acc).ok()
}

/// Largest `CONSTANT_Utf8` payload, in modified UTF-8 bytes.
pub const MAX_UTF8_CONSTANT: usize = u16::MAX as usize;

/// Largest string, in UTF-8 bytes, that string folding will build.
pub const MAX_STRING_BYTES: usize = 1 << 20;

/// Length of `text` in the classfile's modified UTF-8: `U+0000` takes two
/// bytes and supplementary characters are written as two three-byte
/// surrogates.
#[must_use]
pub fn modified_utf8_len(text: &str) -> usize {
    text.chars()
        .map(|ch| match ch as u32 {
            0 => 2,
            0x01..=0x7f => 1,
            0x80..=0x7ff => 2,
            0x800..=0xffff => 3,
            _ => 6,
        })
        .sum()
}

/// Returns `true` if `text` is what `Object.toString` prints for an instance
/// of `class_name` (internal form): the dotted class name, `@`, and a hex hash.
#[must_use]
pub fn is_identity_string(text: &str, class_name: &str) -> bool {
    let dotted = class_name.replace('/', ".");
    text.strip_prefix(dotted.as_str())
        .and_then(|rest| rest.strip_prefix('@'))
        .is_some_and(|hash| {
            !hash.is_empty() && hash.len() <= 8 && hash.chars().all(|c| c.is_ascii_hexdigit())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_plain_range() {
        assert_eq!(double_to_string(1.0), "1.0");
        assert_eq!(double_to_string(100.0), "100.0");
        assert_eq!(double_to_string(0.1), "0.1");
        assert_eq!(double_to_string(0.001), "0.001");
        assert_eq!(double_to_string(-12.5), "-12.5");
        assert_eq!(double_to_string(1234567.0), "1234567.0");
        assert_eq!(double_to_string(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn test_double_scientific() {
        assert_eq!(double_to_string(1e7), "1.0E7");
        assert_eq!(double_to_string(1.5e-4), "1.5E-4");
        assert_eq!(double_to_string(f64::MAX), "1.7976931348623157E308");
        assert_eq!(double_to_string(f64::MIN_POSITIVE), "2.2250738585072014E-308");
    }

    #[test]
    fn test_specials() {
        assert_eq!(double_to_string(f64::NAN), "NaN");
        assert_eq!(double_to_string(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(double_to_string(-0.0), "-0.0");
        assert_eq!(float_to_string(0.0), "0.0");
    }

    #[test]
    fn test_float() {
        assert_eq!(float_to_string(0.1), "0.1");
        assert_eq!(float_to_string(3.4028235e38), "3.4028235E38");
        assert_eq!(float_to_string(1.0e-5), "1.0E-5");
    }

    #[test]
    fn test_string_hash() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("a"), 97);
        assert_eq!(string_hash("hello"), 99162322);
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse_int("-2147483648", 10), Some(i32::MIN));
        assert_eq!(parse_int("2147483648", 10), None);
        assert_eq!(parse_int("ff", 16), Some(255));
        assert_eq!(parse_int("", 10), None);
        assert_eq!(parse_int("1_0", 10), None);
        assert_eq!(parse_long("-9223372036854775808", 10), Some(i64::MIN));
    }

    #[test]
    fn test_modified_utf8_len() {
        assert_eq!(modified_utf8_len("abc"), 3);
        assert_eq!(modified_utf8_len("a\0b"), 4);
        assert_eq!(modified_utf8_len("\u{e9}"), 2);
        assert_eq!(modified_utf8_len("\u{20ac}"), 3);
        assert_eq!(modified_utf8_len("\u{1f600}"), 6);
    }

    #[test]
    fn test_identity_string() {
        assert!(is_identity_string("com.example.Foo@1b6d3586", "com/example/Foo"));
        assert!(!is_identity_string("Foo[x=1]", "com/example/Foo"));
        assert!(!is_identity_string("com.example.Foo@", "com/example/Foo"));
    }
}
