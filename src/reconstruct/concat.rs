//! `StringConcatFactory` call sites, as emitted by `javac` 9+ for `a + b`.

use crate::{
    classfile::{Constant, Handle, H_INVOKESTATIC},
    runtime::{format, Value},
};

const FACTORY: &str = "java/lang/invoke/StringConcatFactory";
const TAG_ARG: char = '\u{1}';
const TAG_CONST: char = '\u{2}';

/// The two bootstrap flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatKind {
    /// `makeConcat`: arguments only
    Plain,
    /// `makeConcatWithConstants`: a recipe string plus constants
    WithConstants,
}

/// Recognizes a string concatenation bootstrap method.
#[must_use]
pub fn concat_kind(bsm: &Handle) -> Option<ConcatKind> {
    if bsm.tag != H_INVOKESTATIC || bsm.owner != FACTORY {
        return None;
    }
    match bsm.name.as_str() {
        "makeConcat" => Some(ConcatKind::Plain),
        "makeConcatWithConstants" => Some(ConcatKind::WithConstants),
        _ => None,
    }
}

fn constant_string(constant: &Constant) -> Option<String> {
    let value = match constant {
        Constant::Int(v) => Value::Int(*v),
        Constant::Long(v) => Value::Long(*v),
        Constant::Float(v) => Value::Float(*v),
        Constant::Double(v) => Value::Double(*v),
        Constant::String(s) => return Some(s.clone()),
        Constant::Type(ty) => Value::Class(ty.clone()),
        Constant::Handle(_) => return None,
    };
    value.java_string()
}

/// Performs the concatenation the call site would.
///
/// `args` are the dynamic arguments in order. Returns `None` if the recipe
/// asks for more arguments or constants than provided, for an unsupported
/// constant, for an argument with no string form, or once the result
/// outgrows [`format::MAX_STRING_BYTES`].
#[must_use]
pub fn concat(kind: ConcatKind, bsm_args: &[Constant], args: &[Value]) -> Option<String> {
    if kind == ConcatKind::Plain {
        let mut out = String::new();
        for arg in args {
            push_bounded(&mut out, &arg.java_string()?)?;
        }
        return Some(out);
    }
    let Some(Constant::String(recipe)) = bsm_args.first() else {
        return None;
    };
    let mut args = args.iter();
    let mut constants = bsm_args[1..].iter();
    let mut out = String::with_capacity(recipe.len());
    for ch in recipe.chars() {
        match ch {
            TAG_ARG => push_bounded(&mut out, &args.next()?.java_string()?)?,
            TAG_CONST => push_bounded(&mut out, &constant_string(constants.next()?)?)?,
            ch => out.push(ch),
        }
    }
    if args.next().is_some() || out.len() > format::MAX_STRING_BYTES {
        return None;
    }
    Some(out)
}

fn push_bounded(out: &mut String, part: &str) -> Option<()> {
    if out.len() + part.len() > format::MAX_STRING_BYTES {
        return None;
    }
    out.push_str(part);
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(text: &str) -> Vec<Constant> {
        vec![Constant::String(text.to_string())]
    }

    #[test]
    fn test_recipe_interleaves_arguments() {
        let args = [Value::string("x"), Value::Int(4), Value::Char(u16::from(b'!'))];
        assert_eq!(
            concat(ConcatKind::WithConstants, &recipe("\u{1} = \u{1}\u{1}"), &args).as_deref(),
            Some("x = 4!")
        );
    }

    #[test]
    fn test_recipe_constants() {
        let mut bsm_args = recipe("\u{2}:\u{1}");
        bsm_args.push(Constant::Double(1.5));
        assert_eq!(
            concat(ConcatKind::WithConstants, &bsm_args, &[Value::Null]).as_deref(),
            Some("1.5:null")
        );
    }

    #[test]
    fn test_argument_count_must_match() {
        assert_eq!(concat(ConcatKind::WithConstants, &recipe("\u{1}\u{1}"), &[Value::Int(1)]), None);
        assert_eq!(concat(ConcatKind::WithConstants, &recipe("a"), &[Value::Int(1)]), None);
    }

    #[test]
    fn test_unrepresentable_results() {
        let args = [Value::string("a"), Value::Char(0xD83D)];
        assert_eq!(concat(ConcatKind::Plain, &[], &args), None);
        let big = Value::from("y".repeat(format::MAX_STRING_BYTES));
        assert_eq!(
            concat(ConcatKind::WithConstants, &recipe("\u{1}!"), &[big.clone()]).map(|s| s.len()),
            None
        );
        assert_eq!(
            concat(ConcatKind::Plain, &[], &[big]).map(|s| s.len()),
            Some(format::MAX_STRING_BYTES)
        );
    }

    #[test]
    fn test_plain_and_detection() {
        assert_eq!(
            concat(ConcatKind::Plain, &[], &[Value::Int(1), Value::Boolean(true)]).as_deref(),
            Some("1true")
        );
        let bsm = Handle::invoke_static(FACTORY, "makeConcatWithConstants", "()V");
        assert_eq!(concat_kind(&bsm), Some(ConcatKind::WithConstants));
        let other = Handle::invoke_static("java/lang/invoke/LambdaMetafactory", "metafactory", "()V");
        assert_eq!(concat_kind(&other), None);
    }
}
