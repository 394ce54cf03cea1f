//! Native implementations of a deterministic slice of `java.lang`.
//!
//! Only members whose result depends on nothing but their arguments are
//! covered. Locale-sensitive members (`toUpperCase()`, `String.format`) and
//! platform-dependent math (`Math.sin`, `Math.pow`) are absent on purpose.
//!
//! | Class | Members |
//! |-------|---------|
//! | `String` | `length`, `isEmpty`, `charAt`, `substring`, `concat`, `trim`, `strip`, `repeat`, `replace`, `startsWith`, `endsWith`, `contains`, `indexOf`, `equals`, `hashCode`, `toString`, `intern`, `valueOf`, `join` |
//! | `Integer`, `Long` | `valueOf`, `parse*`, `toString`, `*Value`, `toHexString`, `toBinaryString`, `toOctalString`, `bitCount`, `compare`, `max`, `min`, `sum`, `signum` |
//! | `Boolean`, `Character`, `Byte`, `Short` | `valueOf`, `*Value`, `toString`, `parseBoolean` |
//! | `Float`, `Double` | `valueOf`, `parse*`, `toString`, `*Value`, bit conversions, `isNaN` |
//! | `Math` | `abs`, `max`, `min`, `floorDiv`, `floorMod`, `*Exact`, `sqrt` |
//! | `Class` | `getName`, `getSimpleName`, `getTypeName`, `isArray`, `isPrimitive`, `getComponentType` |
//! | `Objects` | `requireNonNull`, `equals`, `hashCode`, `isNull`, `nonNull` |

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    classfile::{Type, STRING},
    registry::{
        reconstructor::{Call, NativeFn, NativeReconstructor, Reconstructor},
        MemberKey,
    },
    runtime::{format, Value},
    Result,
};

const INTEGER: &str = "java/lang/Integer";
const LONG: &str = "java/lang/Long";
const SHORT: &str = "java/lang/Short";
const BYTE: &str = "java/lang/Byte";
const CHARACTER: &str = "java/lang/Character";
const BOOLEAN: &str = "java/lang/Boolean";
const FLOAT: &str = "java/lang/Float";
const DOUBLE: &str = "java/lang/Double";
const MATH: &str = "java/lang/Math";
const CLASS: &str = "java/lang/Class";
const OBJECTS: &str = "java/util/Objects";

/// Types whose whole instance surface is trusted to be deterministic.
pub const CONSTANT_TYPES: [&str; 9] = [
    STRING, INTEGER, LONG, SHORT, BYTE, CHARACTER, BOOLEAN, FLOAT, DOUBLE,
];

struct Builtins<'a> {
    map: &'a mut BTreeMap<MemberKey, Arc<dyn Reconstructor>>,
}

impl Builtins<'_> {
    fn add(&mut self, owner: &str, name: &str, desc: &str, f: NativeFn) {
        let key = MemberKey::method(owner, name, desc);
        let native = NativeReconstructor::new(key.to_string(), f);
        self.map.insert(key, Arc::new(native));
    }

    fn field(&mut self, owner: &str, name: &str, f: NativeFn) {
        let key = MemberKey::field(owner, name);
        let native = NativeReconstructor::new(key.to_string(), f);
        self.map.insert(key, Arc::new(native));
    }
}

/// Registers every built-in reconstructor into `map`.
pub(crate) fn register(map: &mut BTreeMap<MemberKey, Arc<dyn Reconstructor>>) {
    let mut b = Builtins { map };
    string(&mut b);
    integer(&mut b);
    long(&mut b);
    small_wrappers(&mut b);
    floating(&mut b);
    math(&mut b);
    class(&mut b);
    objects(&mut b);
}

fn some(value: impl Into<Value>) -> Result<Option<Value>> {
    Ok(Some(value.into()))
}

fn utf16(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

/// Decodes UTF-16 units. `None` if they hold a lone surrogate.
fn from_utf16(units: &[u16]) -> Result<Option<Value>> {
    Ok(String::from_utf16(units).ok().map(Value::from))
}

/// `String.valueOf(value)`, `None` where no Rust string can hold it.
fn string_of(value: &Value) -> Result<Option<Value>> {
    Ok(value.java_string().map(Value::from))
}

/// Whether a folded string of `bytes` outgrows [`format::MAX_STRING_BYTES`].
fn too_long(bytes: Option<usize>) -> bool {
    bytes.map_or(true, |bytes| bytes > format::MAX_STRING_BYTES)
}

/// `Character.isWhitespace`.
fn java_is_whitespace(c: char) -> bool {
    match c {
        '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r' | '\u{1C}'..='\u{1F}' => true,
        '\u{00A0}' | '\u{2007}' | '\u{202F}' => false,
        c => c.is_whitespace() && c != '\u{85}',
    }
}

fn index_of(haystack: &[u16], needle: &[u16], from: usize) -> i32 {
    if needle.is_empty() {
        return from.min(haystack.len()) as i32;
    }
    (from..haystack.len().saturating_sub(needle.len() - 1))
        .find(|&i| haystack[i..].starts_with(needle))
        .map_or(-1, |i| i as i32)
}

fn string(b: &mut Builtins<'_>) {
    b.add(STRING, "length", "()I", |c| {
        some(c.this_str()?.encode_utf16().count() as i32)
    });
    b.add(STRING, "isEmpty", "()Z", |c| some(c.this_str()?.is_empty()));
    b.add(STRING, "charAt", "(I)C", |c| {
        let units = utf16(c.this_str()?);
        let index = c.int(0)?;
        match usize::try_from(index).ok().and_then(|i| units.get(i)) {
            Some(unit) => Ok(Some(Value::Char(*unit))),
            None => Err(c.fail(format!(
                "java.lang.StringIndexOutOfBoundsException: index {index}, length {}",
                units.len()
            ))),
        }
    });
    b.add(STRING, "substring", "(I)Ljava/lang/String;", |c| {
        let units = utf16(c.this_str()?);
        substring(c, &units, c.int(0)?, units.len() as i32)
    });
    b.add(STRING, "substring", "(II)Ljava/lang/String;", |c| {
        let units = utf16(c.this_str()?);
        substring(c, &units, c.int(0)?, c.int(1)?)
    });
    b.add(STRING, "concat", "(Ljava/lang/String;)Ljava/lang/String;", |c| {
        let (this, other) = (c.this_str()?, c.str(0)?);
        if too_long(this.len().checked_add(other.len())) {
            return Ok(None);
        }
        some(format!("{this}{other}"))
    });
    b.add(STRING, "trim", "()Ljava/lang/String;", |c| {
        some(c.this_str()?.trim_matches(|ch: char| ch <= ' '))
    });
    b.add(STRING, "strip", "()Ljava/lang/String;", |c| {
        some(c.this_str()?.trim_matches(java_is_whitespace))
    });
    b.add(STRING, "isBlank", "()Z", |c| {
        some(c.this_str()?.chars().all(java_is_whitespace))
    });
    b.add(STRING, "repeat", "(I)Ljava/lang/String;", |c| {
        let count = c.int(0)?;
        let count = usize::try_from(count)
            .map_err(|_| c.fail(format!("java.lang.IllegalArgumentException: count is negative: {count}")))?;
        let this = c.this_str()?;
        if too_long(this.len().checked_mul(count)) {
            return Ok(None);
        }
        some(this.repeat(count))
    });
    b.add(STRING, "replace", "(CC)Ljava/lang/String;", |c| {
        let (from, to) = (c.char(0)?, c.char(1)?);
        let units: Vec<u16> = utf16(c.this_str()?)
            .into_iter()
            .map(|u| if u == from { to } else { u })
            .collect();
        from_utf16(&units)
    });
    b.add(
        STRING,
        "replace",
        "(Ljava/lang/CharSequence;Ljava/lang/CharSequence;)Ljava/lang/String;",
        |c| {
            let (this, target, replacement) = (c.this_str()?, c.str(0)?, c.str(1)?);
            if target.is_empty() {
                // Java inserts the replacement around every UTF-16 unit.
                let units = utf16(this);
                let inserted = replacement.len().checked_mul(units.len() + 1);
                if too_long(inserted.and_then(|bytes| bytes.checked_add(this.len()))) {
                    return Ok(None);
                }
                let replacement = utf16(replacement);
                let mut out = replacement.clone();
                for unit in units {
                    out.push(unit);
                    out.extend_from_slice(&replacement);
                }
                return from_utf16(&out);
            }
            let grown = replacement
                .len()
                .checked_mul(this.matches(target).count())
                .and_then(|bytes| bytes.checked_add(this.len()));
            if too_long(grown) {
                return Ok(None);
            }
            some(this.replace(target, replacement))
        },
    );
    b.add(STRING, "startsWith", "(Ljava/lang/String;)Z", |c| {
        some(c.this_str()?.starts_with(c.str(0)?))
    });
    b.add(STRING, "endsWith", "(Ljava/lang/String;)Z", |c| {
        some(c.this_str()?.ends_with(c.str(0)?))
    });
    b.add(STRING, "contains", "(Ljava/lang/CharSequence;)Z", |c| {
        some(c.this_str()?.contains(c.str(0)?))
    });
    b.add(STRING, "indexOf", "(Ljava/lang/String;)I", |c| {
        some(index_of(&utf16(c.this_str()?), &utf16(c.str(0)?), 0))
    });
    b.add(STRING, "indexOf", "(I)I", |c| {
        let units = utf16(c.this_str()?);
        let ch = c.int(0)?;
        let needle: Vec<u16> = char::from_u32(ch as u32)
            .map(|ch| ch.encode_utf16(&mut [0; 2]).to_vec())
            .unwrap_or_default();
        if needle.is_empty() {
            return some(-1);
        }
        some(index_of(&units, &needle, 0))
    });
    b.add(STRING, "equals", "(Ljava/lang/Object;)Z", |c| {
        some(c.this()? == c.arg(0)?)
    });
    b.add(STRING, "equalsIgnoreCase", "(Ljava/lang/String;)Z", |c| {
        let other = match c.arg(0)? {
            Value::Null => return some(false),
            _ => c.str(0)?,
        };
        let a = utf16(c.this_str()?);
        let b = utf16(other);
        let fold = |u: u16| -> u16 {
            // ASCII only folds here; anything else must match exactly.
            if (u16::from(b'A')..=u16::from(b'Z')).contains(&u) {
                u + 32
            } else {
                u
            }
        };
        if a.iter().chain(b.iter()).any(|&u| u > 0x7f) {
            return Ok(None);
        }
        some(a.len() == b.len() && a.iter().zip(&b).all(|(&x, &y)| fold(x) == fold(y)))
    });
    b.add(STRING, "hashCode", "()I", |c| some(format::string_hash(c.this_str()?)));
    b.add(STRING, "toString", "()Ljava/lang/String;", |c| some(c.this_str()?));
    b.add(STRING, "intern", "()Ljava/lang/String;", |c| some(c.this_str()?));
    b.add(STRING, "valueOf", "(I)Ljava/lang/String;", |c| some(c.int(0)?.to_string()));
    b.add(STRING, "valueOf", "(J)Ljava/lang/String;", |c| some(c.long(0)?.to_string()));
    b.add(STRING, "valueOf", "(Z)Ljava/lang/String;", |c| some(c.bool(0)?.to_string()));
    b.add(STRING, "valueOf", "(C)Ljava/lang/String;", |c| from_utf16(&[c.char(0)?]));
    b.add(STRING, "valueOf", "(F)Ljava/lang/String;", |c| {
        some(format::float_to_string(c.float(0)?))
    });
    b.add(STRING, "valueOf", "(D)Ljava/lang/String;", |c| {
        some(format::double_to_string(c.double(0)?))
    });
    b.add(STRING, "valueOf", "(Ljava/lang/Object;)Ljava/lang/String;", |c| {
        let arg = c.arg(0)?;
        match arg {
            Value::Object(_) | Value::Array(_) | Value::Enum(_) => Ok(None),
            value => string_of(value),
        }
    });
    b.add(
        STRING,
        "join",
        "(Ljava/lang/CharSequence;[Ljava/lang/CharSequence;)Ljava/lang/String;",
        |c| {
            let separator = c.str(0)?;
            let Some(parts) = c.arg(1)?.as_array() else {
                return Err(c.fail("java.lang.NullPointerException"));
            };
            let mut out = Vec::with_capacity(parts.elements.len());
            for part in &parts.elements {
                match part {
                    Value::String(s) => out.push(s.to_string()),
                    Value::Null => out.push("null".to_string()),
                    _ => return Ok(None),
                }
            }
            let separators = separator.len().checked_mul(out.len().saturating_sub(1));
            let parts = out.iter().try_fold(0usize, |sum, part| sum.checked_add(part.len()));
            if too_long(separators.zip(parts).and_then(|(a, b)| a.checked_add(b))) {
                return Ok(None);
            }
            some(out.join(separator))
        },
    );
}

fn substring(c: &Call<'_>, units: &[u16], begin: i32, end: i32) -> Result<Option<Value>> {
    let len = units.len() as i32;
    if begin < 0 || end > len || begin > end {
        return Err(c.fail(format!(
            "java.lang.StringIndexOutOfBoundsException: begin {begin}, end {end}, length {len}"
        )));
    }
    from_utf16(&units[begin as usize..end as usize])
}

fn number_format(c: &Call<'_>, text: &str) -> crate::Error {
    c.fail(format!(
        "java.lang.NumberFormatException: For input string: \"{text}\""
    ))
}

fn radix(c: &Call<'_>, index: usize) -> Result<u32> {
    let radix = c.int(index)?;
    u32::try_from(radix)
        .ok()
        .filter(|r| (2..=36).contains(r))
        .ok_or_else(|| c.fail(format!("java.lang.NumberFormatException: radix {radix} out of range")))
}

fn integer(b: &mut Builtins<'_>) {
    b.field(INTEGER, "MAX_VALUE", |_| some(i32::MAX));
    b.field(INTEGER, "MIN_VALUE", |_| some(i32::MIN));
    b.add(INTEGER, "valueOf", "(I)Ljava/lang/Integer;", |c| some(c.int(0)?));
    b.add(INTEGER, "valueOf", "(Ljava/lang/String;)Ljava/lang/Integer;", |c| {
        let text = c.str(0)?;
        format::parse_int(text, 10).map_or_else(|| Err(number_format(c, text)), some)
    });
    b.add(INTEGER, "parseInt", "(Ljava/lang/String;)I", |c| {
        let text = c.str(0)?;
        format::parse_int(text, 10).map_or_else(|| Err(number_format(c, text)), some)
    });
    b.add(INTEGER, "parseInt", "(Ljava/lang/String;I)I", |c| {
        let text = c.str(0)?;
        let radix = radix(c, 1)?;
        format::parse_int(text, radix).map_or_else(|| Err(number_format(c, text)), some)
    });
    b.add(INTEGER, "toString", "(I)Ljava/lang/String;", |c| some(c.int(0)?.to_string()));
    b.add(INTEGER, "toString", "()Ljava/lang/String;", |c| {
        string_of(c.this()?)
    });
    b.add(INTEGER, "toHexString", "(I)Ljava/lang/String;", |c| {
        some(format::to_unsigned_string(u64::from(c.int(0)? as u32), 4))
    });
    b.add(INTEGER, "toOctalString", "(I)Ljava/lang/String;", |c| {
        some(format::to_unsigned_string(u64::from(c.int(0)? as u32), 3))
    });
    b.add(INTEGER, "toBinaryString", "(I)Ljava/lang/String;", |c| {
        some(format::to_unsigned_string(u64::from(c.int(0)? as u32), 1))
    });
    b.add(INTEGER, "intValue", "()I", unbox_int);
    b.add(INTEGER, "longValue", "()J", |c| Ok(unbox_int(c)?.and_then(|v| v.as_int()).map(|v| Value::Long(i64::from(v)))));
    b.add(INTEGER, "doubleValue", "()D", |c| Ok(unbox_int(c)?.and_then(|v| v.as_int()).map(|v| Value::Double(f64::from(v)))));
    b.add(INTEGER, "hashCode", "()I", unbox_int);
    b.add(INTEGER, "hashCode", "(I)I", |c| some(c.int(0)?));
    b.add(INTEGER, "bitCount", "(I)I", |c| some(c.int(0)?.count_ones() as i32));
    b.add(INTEGER, "reverse", "(I)I", |c| some(c.int(0)?.reverse_bits()));
    b.add(INTEGER, "rotateLeft", "(II)I", |c| {
        some(c.int(0)?.rotate_left((c.int(1)? & 31) as u32))
    });
    b.add(INTEGER, "numberOfLeadingZeros", "(I)I", |c| some(c.int(0)?.leading_zeros() as i32));
    b.add(INTEGER, "numberOfTrailingZeros", "(I)I", |c| some(c.int(0)?.trailing_zeros() as i32));
    b.add(INTEGER, "compare", "(II)I", |c| some(c.int(0)?.cmp(&c.int(1)?) as i32));
    b.add(INTEGER, "signum", "(I)I", |c| some(c.int(0)?.signum()));
    b.add(INTEGER, "max", "(II)I", |c| some(c.int(0)?.max(c.int(1)?)));
    b.add(INTEGER, "min", "(II)I", |c| some(c.int(0)?.min(c.int(1)?)));
    b.add(INTEGER, "sum", "(II)I", |c| some(c.int(0)?.wrapping_add(c.int(1)?)));
}

fn unbox_int(c: &Call<'_>) -> Result<Option<Value>> {
    let value = c.this()?;
    value
        .as_int()
        .map(|v| Some(Value::Int(v)))
        .ok_or_else(|| c.fail("receiver is not an int"))
}

fn long(b: &mut Builtins<'_>) {
    b.field(LONG, "MAX_VALUE", |_| some(i64::MAX));
    b.field(LONG, "MIN_VALUE", |_| some(i64::MIN));
    b.add(LONG, "valueOf", "(J)Ljava/lang/Long;", |c| some(c.long(0)?));
    b.add(LONG, "valueOf", "(Ljava/lang/String;)Ljava/lang/Long;", |c| {
        let text = c.str(0)?;
        format::parse_long(text, 10).map_or_else(|| Err(number_format(c, text)), some)
    });
    b.add(LONG, "parseLong", "(Ljava/lang/String;)J", |c| {
        let text = c.str(0)?;
        format::parse_long(text, 10).map_or_else(|| Err(number_format(c, text)), some)
    });
    b.add(LONG, "parseLong", "(Ljava/lang/String;I)J", |c| {
        let text = c.str(0)?;
        let radix = radix(c, 1)?;
        format::parse_long(text, radix).map_or_else(|| Err(number_format(c, text)), some)
    });
    b.add(LONG, "toString", "(J)Ljava/lang/String;", |c| some(c.long(0)?.to_string()));
    b.add(LONG, "toString", "()Ljava/lang/String;", |c| string_of(c.this()?));
    b.add(LONG, "toHexString", "(J)Ljava/lang/String;", |c| {
        some(format::to_unsigned_string(c.long(0)? as u64, 4))
    });
    b.add(LONG, "toBinaryString", "(J)Ljava/lang/String;", |c| {
        some(format::to_unsigned_string(c.long(0)? as u64, 1))
    });
    b.add(LONG, "longValue", "()J", |c| {
        let v = c.this()?;
        v.as_long()
            .map(|v| Some(Value::Long(v)))
            .ok_or_else(|| c.fail("receiver is not a long"))
    });
    b.add(LONG, "intValue", "()I", |c| {
        let v = c.this()?;
        v.as_long()
            .map(|v| Some(Value::Int(v as i32)))
            .ok_or_else(|| c.fail("receiver is not a long"))
    });
    b.add(LONG, "bitCount", "(J)I", |c| some(c.long(0)?.count_ones() as i32));
    b.add(LONG, "hashCode", "(J)I", |c| {
        let v = c.long(0)?;
        some((v ^ ((v as u64) >> 32) as i64) as i32)
    });
    b.add(LONG, "compare", "(JJ)I", |c| some(c.long(0)?.cmp(&c.long(1)?) as i32));
    b.add(LONG, "signum", "(J)I", |c| some(c.long(0)?.signum() as i32));
    b.add(LONG, "max", "(JJ)J", |c| some(c.long(0)?.max(c.long(1)?)));
    b.add(LONG, "min", "(JJ)J", |c| some(c.long(0)?.min(c.long(1)?)));
    b.add(LONG, "sum", "(JJ)J", |c| some(c.long(0)?.wrapping_add(c.long(1)?)));
}

fn small_wrappers(b: &mut Builtins<'_>) {
    b.field(BOOLEAN, "TRUE", |_| some(true));
    b.field(BOOLEAN, "FALSE", |_| some(false));
    b.add(BOOLEAN, "valueOf", "(Z)Ljava/lang/Boolean;", |c| some(c.bool(0)?));
    b.add(BOOLEAN, "valueOf", "(Ljava/lang/String;)Ljava/lang/Boolean;", |c| {
        some(matches!(c.arg(0)?, Value::String(s) if s.eq_ignore_ascii_case("true")))
    });
    b.add(BOOLEAN, "parseBoolean", "(Ljava/lang/String;)Z", |c| {
        some(matches!(c.arg(0)?, Value::String(s) if s.eq_ignore_ascii_case("true")))
    });
    b.add(BOOLEAN, "booleanValue", "()Z", |c| {
        c.this()?
            .as_bool()
            .map(|v| Some(Value::Boolean(v)))
            .ok_or_else(|| c.fail("receiver is not a boolean"))
    });
    b.add(BOOLEAN, "toString", "(Z)Ljava/lang/String;", |c| some(c.bool(0)?.to_string()));
    b.add(BOOLEAN, "toString", "()Ljava/lang/String;", |c| string_of(c.this()?));

    b.add(CHARACTER, "valueOf", "(C)Ljava/lang/Character;", |c| {
        Ok(Some(Value::Char(c.char(0)?)))
    });
    b.add(CHARACTER, "charValue", "()C", |c| {
        c.this()?
            .as_char()
            .map(|v| Some(Value::Char(v)))
            .ok_or_else(|| c.fail("receiver is not a char"))
    });
    b.add(CHARACTER, "toString", "(C)Ljava/lang/String;", |c| from_utf16(&[c.char(0)?]));
    b.add(CHARACTER, "toString", "()Ljava/lang/String;", |c| string_of(c.this()?));
    b.add(CHARACTER, "isDigit", "(C)Z", |c| {
        let unit = c.char(0)?;
        if unit > 0x7f {
            return Ok(None);
        }
        some(u8::try_from(unit).is_ok_and(|b| b.is_ascii_digit()))
    });

    b.add(BYTE, "valueOf", "(B)Ljava/lang/Byte;", |c| Ok(Some(Value::Byte(c.int(0)? as i8))));
    b.add(BYTE, "byteValue", "()B", |c| {
        c.this()?
            .as_int()
            .map(|v| Some(Value::Byte(v as i8)))
            .ok_or_else(|| c.fail("receiver is not a byte"))
    });
    b.add(BYTE, "intValue", "()I", unbox_int);
    b.add(SHORT, "valueOf", "(S)Ljava/lang/Short;", |c| Ok(Some(Value::Short(c.int(0)? as i16))));
    b.add(SHORT, "shortValue", "()S", |c| {
        c.this()?
            .as_int()
            .map(|v| Some(Value::Short(v as i16)))
            .ok_or_else(|| c.fail("receiver is not a short"))
    });
    b.add(SHORT, "intValue", "()I", unbox_int);
}

/// `Double.parseDouble`: decimal notation with an optional type suffix, or
/// the exact words `NaN` and `Infinity`. Hexadecimal literals are declined.
fn parse_java_double(text: &str) -> Option<f64> {
    let trimmed = text.trim_matches(|ch: char| ch <= ' ');
    let (sign, body) = match trimmed.as_bytes().first()? {
        b'-' => (-1.0, &trimmed[1..]),
        b'+' => (1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };
    match body {
        "NaN" => return Some(f64::NAN),
        "Infinity" => return Some(sign * f64::INFINITY),
        _ => {}
    }
    let body = body
        .strip_suffix(['f', 'F', 'd', 'D'])
        .unwrap_or(body);
    if body.is_empty()
        || !body
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }
    body.parse::<f64>().ok().map(|v| sign * v)
}

fn floating(b: &mut Builtins<'_>) {
    b.add(FLOAT, "valueOf", "(F)Ljava/lang/Float;", |c| Ok(Some(Value::Float(c.float(0)?))));
    b.add(FLOAT, "floatValue", "()F", |c| {
        c.this()?
            .as_float()
            .map(|v| Some(Value::Float(v)))
            .ok_or_else(|| c.fail("receiver is not a float"))
    });
    b.add(FLOAT, "parseFloat", "(Ljava/lang/String;)F", |c| {
        let text = c.str(0)?;
        // Parse as f32 directly so the decimal is rounded once.
        match parse_java_double(text) {
            Some(v) if v.is_nan() || v.is_infinite() => Ok(Some(Value::Float(v as f32))),
            Some(_) => {
                let trimmed = text.trim_matches(|ch: char| ch <= ' ');
                let body = trimmed.strip_suffix(['f', 'F', 'd', 'D']).unwrap_or(trimmed);
                body.parse::<f32>()
                    .map(|v| Some(Value::Float(v)))
                    .map_err(|_| number_format(c, text))
            }
            None => Err(number_format(c, text)),
        }
    });
    b.add(FLOAT, "toString", "(F)Ljava/lang/String;", |c| {
        some(format::float_to_string(c.float(0)?))
    });
    b.add(FLOAT, "floatToIntBits", "(F)I", |c| some(format::float_to_int_bits(c.float(0)?)));
    b.add(FLOAT, "floatToRawIntBits", "(F)I", |c| some(c.float(0)?.to_bits() as i32));
    b.add(FLOAT, "intBitsToFloat", "(I)F", |c| {
        Ok(Some(Value::Float(f32::from_bits(c.int(0)? as u32))))
    });
    b.add(FLOAT, "isNaN", "(F)Z", |c| some(c.float(0)?.is_nan()));

    b.add(DOUBLE, "valueOf", "(D)Ljava/lang/Double;", |c| Ok(Some(Value::Double(c.double(0)?))));
    b.add(DOUBLE, "doubleValue", "()D", |c| {
        c.this()?
            .as_double()
            .map(|v| Some(Value::Double(v)))
            .ok_or_else(|| c.fail("receiver is not a double"))
    });
    b.add(DOUBLE, "parseDouble", "(Ljava/lang/String;)D", |c| {
        let text = c.str(0)?;
        parse_java_double(text)
            .map(|v| Some(Value::Double(v)))
            .ok_or_else(|| number_format(c, text))
    });
    b.add(DOUBLE, "valueOf", "(Ljava/lang/String;)Ljava/lang/Double;", |c| {
        let text = c.str(0)?;
        parse_java_double(text)
            .map(|v| Some(Value::Double(v)))
            .ok_or_else(|| number_format(c, text))
    });
    b.add(DOUBLE, "toString", "(D)Ljava/lang/String;", |c| {
        some(format::double_to_string(c.double(0)?))
    });
    b.add(DOUBLE, "doubleToLongBits", "(D)J", |c| {
        some(format::double_to_long_bits(c.double(0)?))
    });
    b.add(DOUBLE, "doubleToRawLongBits", "(D)J", |c| some(c.double(0)?.to_bits() as i64));
    b.add(DOUBLE, "longBitsToDouble", "(J)D", |c| {
        Ok(Some(Value::Double(f64::from_bits(c.long(0)? as u64))))
    });
    b.add(DOUBLE, "isNaN", "(D)Z", |c| some(c.double(0)?.is_nan()));
}

/// `Math.max` for doubles: NaN wins, and `0.0` is greater than `-0.0`.
fn java_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == 0.0 && b == 0.0 {
        if a.is_sign_negative() { b } else { a }
    } else {
        a.max(b)
    }
}

/// `Math.min` for doubles: NaN wins, and `-0.0` is smaller than `0.0`.
fn java_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == 0.0 && b == 0.0 {
        if a.is_sign_negative() { a } else { b }
    } else {
        a.min(b)
    }
}

fn overflow(c: &Call<'_>, kind: &str) -> crate::Error {
    c.fail(format!("java.lang.ArithmeticException: {kind} overflow"))
}

fn math(b: &mut Builtins<'_>) {
    b.add(MATH, "abs", "(I)I", |c| some(c.int(0)?.wrapping_abs()));
    b.add(MATH, "abs", "(J)J", |c| some(c.long(0)?.wrapping_abs()));
    b.add(MATH, "abs", "(F)F", |c| Ok(Some(Value::Float(c.float(0)?.abs()))));
    b.add(MATH, "abs", "(D)D", |c| Ok(Some(Value::Double(c.double(0)?.abs()))));
    b.add(MATH, "max", "(II)I", |c| some(c.int(0)?.max(c.int(1)?)));
    b.add(MATH, "max", "(JJ)J", |c| some(c.long(0)?.max(c.long(1)?)));
    b.add(MATH, "max", "(DD)D", |c| {
        Ok(Some(Value::Double(java_max(c.double(0)?, c.double(1)?))))
    });
    b.add(MATH, "max", "(FF)F", |c| {
        let v = java_max(f64::from(c.float(0)?), f64::from(c.float(1)?));
        Ok(Some(Value::Float(v as f32)))
    });
    b.add(MATH, "min", "(II)I", |c| some(c.int(0)?.min(c.int(1)?)));
    b.add(MATH, "min", "(JJ)J", |c| some(c.long(0)?.min(c.long(1)?)));
    b.add(MATH, "min", "(DD)D", |c| {
        Ok(Some(Value::Double(java_min(c.double(0)?, c.double(1)?))))
    });
    b.add(MATH, "min", "(FF)F", |c| {
        let v = java_min(f64::from(c.float(0)?), f64::from(c.float(1)?));
        Ok(Some(Value::Float(v as f32)))
    });
    b.add(MATH, "sqrt", "(D)D", |c| Ok(Some(Value::Double(c.double(0)?.sqrt()))));
    b.add(MATH, "floorDiv", "(II)I", |c| {
        let (x, y) = (c.int(0)?, c.int(1)?);
        if y == 0 {
            return Err(c.fail("java.lang.ArithmeticException: / by zero"));
        }
        let q = x.wrapping_div(y);
        let q = if (x % y != 0) && ((x ^ y) < 0) { q - 1 } else { q };
        some(q)
    });
    b.add(MATH, "floorMod", "(II)I", |c| {
        let (x, y) = (c.int(0)?, c.int(1)?);
        if y == 0 {
            return Err(c.fail("java.lang.ArithmeticException: / by zero"));
        }
        let m = x.wrapping_rem(y);
        some(if m != 0 && ((m ^ y) < 0) { m + y } else { m })
    });
    b.add(MATH, "floorMod", "(JJ)J", |c| {
        let (x, y) = (c.long(0)?, c.long(1)?);
        if y == 0 {
            return Err(c.fail("java.lang.ArithmeticException: / by zero"));
        }
        let m = x.wrapping_rem(y);
        some(if m != 0 && ((m ^ y) < 0) { m + y } else { m })
    });
    b.add(MATH, "addExact", "(II)I", |c| {
        c.int(0)?.checked_add(c.int(1)?).map_or_else(|| Err(overflow(c, "integer")), some)
    });
    b.add(MATH, "addExact", "(JJ)J", |c| {
        c.long(0)?.checked_add(c.long(1)?).map_or_else(|| Err(overflow(c, "long")), some)
    });
    b.add(MATH, "subtractExact", "(II)I", |c| {
        c.int(0)?.checked_sub(c.int(1)?).map_or_else(|| Err(overflow(c, "integer")), some)
    });
    b.add(MATH, "subtractExact", "(JJ)J", |c| {
        c.long(0)?.checked_sub(c.long(1)?).map_or_else(|| Err(overflow(c, "long")), some)
    });
    b.add(MATH, "multiplyExact", "(II)I", |c| {
        c.int(0)?.checked_mul(c.int(1)?).map_or_else(|| Err(overflow(c, "integer")), some)
    });
    b.add(MATH, "multiplyExact", "(JJ)J", |c| {
        c.long(0)?.checked_mul(c.long(1)?).map_or_else(|| Err(overflow(c, "long")), some)
    });
    b.add(MATH, "negateExact", "(I)I", |c| {
        c.int(0)?.checked_neg().map_or_else(|| Err(overflow(c, "integer")), some)
    });
    b.add(MATH, "toIntExact", "(J)I", |c| {
        i32::try_from(c.long(0)?).map_or_else(|_| Err(overflow(c, "integer")), some)
    });
}

fn class_arg(c: &Call<'_>) -> Result<Type> {
    match c.this()? {
        Value::Class(ty) => Ok(ty.clone()),
        _ => Err(c.fail("receiver is not a class literal")),
    }
}

fn class(b: &mut Builtins<'_>) {
    b.add(CLASS, "getName", "()Ljava/lang/String;", |c| some(class_arg(c)?.class_name()));
    b.add(CLASS, "getSimpleName", "()Ljava/lang/String;", |c| {
        some(class_arg(c)?.simple_name())
    });
    b.add(CLASS, "getTypeName", "()Ljava/lang/String;", |c| {
        let ty = class_arg(c)?;
        let mut element = &ty;
        let mut dims = 0;
        while let Type::Array(component) = element {
            element = component;
            dims += 1;
        }
        some(format!("{}{}", element.class_name(), "[]".repeat(dims)))
    });
    b.add(CLASS, "isArray", "()Z", |c| some(matches!(class_arg(c)?, Type::Array(_))));
    b.add(CLASS, "isPrimitive", "()Z", |c| {
        let ty = class_arg(c)?;
        some(ty.is_primitive() || ty == Type::Void)
    });
    b.add(CLASS, "getComponentType", "()Ljava/lang/Class;", |c| {
        Ok(Some(match class_arg(c)? {
            Type::Array(component) => Value::Class(*component),
            _ => Value::Null,
        }))
    });
}

fn objects(b: &mut Builtins<'_>) {
    b.add(OBJECTS, "requireNonNull", "(Ljava/lang/Object;)Ljava/lang/Object;", |c| {
        match c.arg(0)? {
            Value::Null => Err(c.fail("java.lang.NullPointerException")),
            value => Ok(Some(value.clone())),
        }
    });
    b.add(
        OBJECTS,
        "requireNonNull",
        "(Ljava/lang/Object;Ljava/lang/String;)Ljava/lang/Object;",
        |c| match c.arg(0)? {
            Value::Null => Err(c.fail(format!(
                "java.lang.NullPointerException: {}",
                c.arg(1)?.java_string().unwrap_or_default()
            ))),
            value => Ok(Some(value.clone())),
        },
    );
    b.add(OBJECTS, "equals", "(Ljava/lang/Object;Ljava/lang/Object;)Z", |c| {
        some(c.arg(0)? == c.arg(1)?)
    });
    b.add(OBJECTS, "hashCode", "(Ljava/lang/Object;)I", |c| {
        Ok(c.arg(0)?.java_hash_code().map(Value::Int))
    });
    b.add(OBJECTS, "isNull", "(Ljava/lang/Object;)Z", |c| some(c.arg(0)?.is_null()));
    b.add(OBJECTS, "nonNull", "(Ljava/lang/Object;)Z", |c| some(!c.arg(0)?.is_null()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn call(owner: &str, name: &str, desc: &str, receiver: Option<Value>, args: &[Value]) -> Result<Option<Value>> {
        let mut map = BTreeMap::new();
        register(&mut map);
        let key = MemberKey::method(owner, name, desc);
        let reconstructor = map.get(&key).cloned().expect("builtin registered");
        let call = Call {
            key: &key,
            desc,
            receiver: receiver.as_ref(),
            args,
            loader: None,
        };
        reconstructor.reconstruct(&call)
    }

    #[test]
    fn test_lone_surrogates_are_not_folded() -> Result<()> {
        let emoji = Some(Value::string("\u{1f600}"));
        let high = call(STRING, "charAt", "(I)C", emoji.clone(), &[Value::Int(0)])?;
        assert_eq!(high, Some(Value::Char(0xD83D)));
        assert_eq!(
            call(STRING, "valueOf", "(C)Ljava/lang/String;", None, &[Value::Char(0xD83D)])?,
            None
        );
        assert_eq!(
            call(CHARACTER, "toString", "()Ljava/lang/String;", Some(Value::Char(0xDE00)), &[])?,
            None
        );
        assert_eq!(
            call(STRING, "substring", "(II)Ljava/lang/String;", emoji.clone(), &[Value::Int(0), Value::Int(1)])?,
            None
        );
        assert_eq!(
            call(
                STRING,
                "replace",
                "(Ljava/lang/CharSequence;Ljava/lang/CharSequence;)Ljava/lang/String;",
                emoji.clone(),
                &[Value::string(""), Value::string("-")]
            )?,
            None
        );
        assert_eq!(
            call(STRING, "substring", "(II)Ljava/lang/String;", emoji, &[Value::Int(0), Value::Int(2)])?,
            Some(Value::string("\u{1f600}"))
        );
        Ok(())
    }

    #[test]
    fn test_oversized_results_are_not_folded() -> Result<()> {
        let abcd = Some(Value::string("abcd"));
        assert_eq!(
            call(STRING, "repeat", "(I)Ljava/lang/String;", abcd.clone(), &[Value::Int(i32::MAX)])?,
            None
        );
        assert_eq!(
            call(STRING, "repeat", "(I)Ljava/lang/String;", abcd, &[Value::Int(3)])?,
            Some(Value::string("abcdabcdabcd"))
        );
        let half = Value::from("x".repeat(format::MAX_STRING_BYTES / 2 + 1));
        assert_eq!(
            call(STRING, "concat", "(Ljava/lang/String;)Ljava/lang/String;", Some(half.clone()), &[half.clone()])?,
            None
        );
        assert_eq!(
            call(
                STRING,
                "replace",
                "(Ljava/lang/CharSequence;Ljava/lang/CharSequence;)Ljava/lang/String;",
                Some(Value::string("xxxx")),
                &[Value::string("x"), half]
            )?,
            None
        );
        Ok(())
    }

    #[test]
    fn test_string_members() -> Result<()> {
        let hello = Some(Value::string("hello"));
        assert_eq!(call(STRING, "length", "()I", hello.clone(), &[])?, Some(Value::Int(5)));
        assert_eq!(
            call(STRING, "substring", "(II)Ljava/lang/String;", hello.clone(), &[Value::Int(1), Value::Int(3)])?,
            Some(Value::string("el"))
        );
        assert_eq!(
            call(STRING, "charAt", "(I)C", hello.clone(), &[Value::Int(4)])?,
            Some(Value::Char(u16::from(b'o')))
        );
        assert!(matches!(
            call(STRING, "charAt", "(I)C", hello.clone(), &[Value::Int(5)]),
            Err(Error::InvocationFailed { .. })
        ));
        assert_eq!(
            call(STRING, "hashCode", "()I", hello, &[])?,
            Some(Value::Int(99162322))
        );
        Ok(())
    }

    #[test]
    fn test_string_join_takes_array() -> Result<()> {
        let parts = Value::array(
            Type::object("java/lang/CharSequence"),
            vec![Value::string("a"), Value::string("b")],
        );
        assert_eq!(
            call(
                STRING,
                "join",
                "(Ljava/lang/CharSequence;[Ljava/lang/CharSequence;)Ljava/lang/String;",
                None,
                &[Value::string(", "), parts]
            )?,
            Some(Value::string("a, b"))
        );
        Ok(())
    }

    #[test]
    fn test_parse_int_failure_is_hard() {
        let result = call(INTEGER, "parseInt", "(Ljava/lang/String;)I", None, &[Value::string("4x")]);
        assert!(matches!(result, Err(Error::InvocationFailed { .. })));
    }

    #[test]
    fn test_exact_arithmetic() -> Result<()> {
        assert!(call(MATH, "addExact", "(II)I", None, &[Value::Int(i32::MAX), Value::Int(1)]).is_err());
        assert_eq!(
            call(MATH, "floorMod", "(II)I", None, &[Value::Int(-7), Value::Int(3)])?,
            Some(Value::Int(2))
        );
        assert_eq!(
            call(MATH, "floorDiv", "(II)I", None, &[Value::Int(-7), Value::Int(3)])?,
            Some(Value::Int(-3))
        );
        assert_eq!(
            call(MATH, "max", "(DD)D", None, &[Value::Double(-0.0), Value::Double(0.0)])?,
            Some(Value::Double(0.0))
        );
        Ok(())
    }

    #[test]
    fn test_class_names() -> Result<()> {
        let ty = Some(Value::Class(Type::array_of(Type::object(STRING))));
        assert_eq!(
            call(CLASS, "getName", "()Ljava/lang/String;", ty.clone(), &[])?,
            Some(Value::string("[Ljava.lang.String;"))
        );
        assert_eq!(
            call(CLASS, "getTypeName", "()Ljava/lang/String;", ty.clone(), &[])?,
            Some(Value::string("java.lang.String[]"))
        );
        assert_eq!(
            call(CLASS, "getSimpleName", "()Ljava/lang/String;", ty, &[])?,
            Some(Value::string("String[]"))
        );
        Ok(())
    }

    #[test]
    fn test_parse_double() {
        assert_eq!(parse_java_double(" 1.5d "), Some(1.5));
        assert_eq!(parse_java_double("-Infinity"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_java_double("inf"), None);
        assert_eq!(parse_java_double("0x1p3"), None);
    }

    #[test]
    fn test_identity_hash_declined() -> Result<()> {
        let enum_value = Value::enum_constant("a/E", "X", 0);
        assert_eq!(call(OBJECTS, "hashCode", "(Ljava/lang/Object;)I", None, &[enum_value])?, None);
        Ok(())
    }
}
