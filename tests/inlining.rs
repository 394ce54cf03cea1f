//! Call site inlining through the public driver API.
//!
//! Each test builds class trees by hand, runs a [`Transformer`] with the
//! default configuration and checks the rewritten instruction lists.

use classfold::{
    diagnostics::BytecodeLocation,
    prelude::*,
    reconstruct::{ReconstructionContext, StackReconstructor},
    registry::Registries,
    runtime::InputClasses,
};
use rustc_hash::FxHashSet;

const STRING: &str = "java/lang/String";

fn static_method(class: &str, name: &str, desc: &str, insns: Vec<Insn>) -> ClassNode {
    let mut node = ClassNode::new(class);
    node.methods.push(MethodNode::new(
        AccessFlags::PUBLIC | AccessFlags::STATIC,
        name,
        desc,
        InsnList::from_insns(insns),
    ));
    node
}

fn enum_class(name: &str, constants: &[&str]) -> ClassNode {
    let mut node = ClassNode::new(name);
    node.access = AccessFlags::PUBLIC | AccessFlags::FINAL | AccessFlags::SUPER | AccessFlags::ENUM;
    node.super_name = Some("java/lang/Enum".to_string());
    let desc = format!("L{name};");
    for constant in constants {
        node.fields.push(FieldNode::new(
            AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL | AccessFlags::ENUM,
            *constant,
            desc.clone(),
        ));
    }
    node
}

fn run(classes: Vec<ClassNode>) -> Result<TransformOutput<usize>> {
    Transformer::default().run(classes.into_iter().enumerate().collect())
}

fn body(output: &TransformOutput<usize>, index: usize) -> Vec<Insn> {
    output.outputs[index]
        .1
        .as_ref()
        .map(|class| class.methods[0].insns.to_vec())
        .unwrap_or_default()
}

#[test]
fn test_enum_name_and_ordinal_without_configuration() -> Result<()> {
    let color = enum_class("com/example/Color", &["RED", "GREEN", "BLUE"]);
    let user = static_method(
        "com/example/Palette",
        "describe",
        "()Ljava/lang/String;",
        vec![
            Insn::getstatic("com/example/Color", "GREEN", "Lcom/example/Color;"),
            Insn::invokevirtual("com/example/Color", "name", "()Ljava/lang/String;"),
            Insn::getstatic("com/example/Color", "BLUE", "Lcom/example/Color;"),
            Insn::invokevirtual("com/example/Color", "ordinal", "()I"),
            Insn::invokestatic(STRING, "valueOf", "(I)Ljava/lang/String;"),
            Insn::invokevirtual(STRING, "concat", "(Ljava/lang/String;)Ljava/lang/String;"),
            Insn::Simple(Opcode::Areturn),
        ],
    );
    let output = run(vec![color, user])?;

    assert!(output.outputs[0].1.is_none());
    assert_eq!(
        body(&output, 1),
        vec![Insn::ldc_string("GREEN2"), Insn::Simple(Opcode::Areturn)]
    );
    Ok(())
}

#[test]
fn test_enum_ordinal_alone() -> Result<()> {
    let color = enum_class("com/example/Color", &["RED", "GREEN"]);
    let user = static_method(
        "com/example/Palette",
        "index",
        "()I",
        vec![
            Insn::getstatic("com/example/Color", "GREEN", "Lcom/example/Color;"),
            Insn::invokevirtual("com/example/Color", "ordinal", "()I"),
            Insn::Simple(Opcode::Ireturn),
        ],
    );
    let output = run(vec![color, user])?;
    assert_eq!(
        body(&output, 1),
        vec![Insn::Simple(Opcode::Iconst1), Insn::Simple(Opcode::Ireturn)]
    );
    Ok(())
}

fn array_literal(elements: &[&str]) -> Vec<Insn> {
    let mut insns = vec![
        Insn::Int {
            opcode: Opcode::Bipush,
            operand: elements.len() as i32,
        },
        Insn::type_insn(Opcode::Anewarray, "java/lang/CharSequence"),
    ];
    for (index, element) in elements.iter().enumerate() {
        insns.push(Insn::Simple(Opcode::Dup));
        insns.push(Insn::Int {
            opcode: Opcode::Bipush,
            operand: index as i32,
        });
        insns.push(Insn::ldc_string(*element));
        insns.push(Insn::Simple(Opcode::Aastore));
    }
    insns
}

#[test]
fn test_array_literal_reconstructs_element_wise() -> Result<()> {
    let list = InsnList::from_insns(array_literal(&["a", "b", "c"]));
    let safe = FxHashSet::default();
    let registries = Registries::new();
    let inputs = InputClasses::new();
    let engine = StackReconstructor::new(&list, &safe, &registries, &inputs);
    let ctx = ReconstructionContext::new(BytecodeLocation::new("test/Arrays", "make", "()V"));
    let last = list.last().expect("non-empty literal");

    let reconstructed = engine.reconstruct(&ctx, last)?.expect("array literal");
    assert_eq!(
        reconstructed.value,
        Value::array(
            Type::object("java/lang/CharSequence"),
            vec![Value::string("a"), Value::string("b"), Value::string("c")],
        )
    );
    assert_eq!(Some(reconstructed.first), list.first());
    assert_eq!(reconstructed.end, None);
    Ok(())
}

#[test]
fn test_array_literal_varargs_removed() -> Result<()> {
    let class = static_method(
        "com/example/Csv",
        "header",
        "()Ljava/lang/String;",
        vec![
            Insn::ldc_string(","),
            Insn::Simple(Opcode::Iconst3),
            Insn::type_insn(Opcode::Anewarray, "java/lang/CharSequence"),
            Insn::Simple(Opcode::Dup),
            Insn::Simple(Opcode::Iconst0),
            Insn::ldc_string("id"),
            Insn::Simple(Opcode::Aastore),
            Insn::Simple(Opcode::Dup),
            Insn::Simple(Opcode::Iconst1),
            Insn::ldc_string("name"),
            Insn::Simple(Opcode::Aastore),
            Insn::Simple(Opcode::Dup),
            Insn::Simple(Opcode::Iconst2),
            Insn::ldc_string("email"),
            Insn::Simple(Opcode::Aastore),
            Insn::invokestatic(
                STRING,
                "join",
                "(Ljava/lang/CharSequence;[Ljava/lang/CharSequence;)Ljava/lang/String;",
            ),
            Insn::Simple(Opcode::Areturn),
        ],
    );
    let output = run(vec![class])?;
    assert_eq!(
        body(&output, 0),
        vec![Insn::ldc_string("id,name,email"), Insn::Simple(Opcode::Areturn)]
    );
    Ok(())
}

#[test]
fn test_class_name_of_unloadable_type() -> Result<()> {
    let class = static_method(
        "com/example/Registry",
        "pluginName",
        "()Ljava/lang/String;",
        vec![
            Insn::Ldc(Constant::Type(Type::object("com/vendor/missing/Plugin"))),
            Insn::invokevirtual("java/lang/Class", "getName", "()Ljava/lang/String;"),
            Insn::Simple(Opcode::Areturn),
        ],
    );
    let output = run(vec![class])?;
    assert_eq!(
        body(&output, 0),
        vec![
            Insn::ldc_string("com.vendor.missing.Plugin"),
            Insn::Simple(Opcode::Areturn)
        ]
    );
    assert!(!output.events.has(EventKind::MemberUnavailable));
    Ok(())
}

#[test]
fn test_string_concat_call_site() -> Result<()> {
    let class = static_method(
        "com/example/Banner",
        "text",
        "()Ljava/lang/String;",
        vec![
            Insn::ldc_string("v"),
            Insn::Simple(Opcode::Iconst3),
            Insn::InvokeDynamic {
                name: "makeConcatWithConstants".to_string(),
                desc: "(Ljava/lang/String;I)Ljava/lang/String;".to_string(),
                bsm: Handle::invoke_static(
                    "java/lang/invoke/StringConcatFactory",
                    "makeConcatWithConstants",
                    "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;",
                ),
                bsm_args: vec![Constant::String("release \u{1}.\u{1}".to_string())],
            },
            Insn::Simple(Opcode::Areturn),
        ],
    );
    let output = run(vec![class])?;
    assert_eq!(
        body(&output, 0),
        vec![Insn::ldc_string("release v.3"), Insn::Simple(Opcode::Areturn)]
    );
    Ok(())
}

#[test]
fn test_jump_target_blocks_reconstruction() -> Result<()> {
    let join = LabelId(1);
    let other = LabelId(0);
    let class = static_method(
        "com/example/Flags",
        "length",
        "(Z)I",
        vec![
            Insn::Var {
                opcode: Opcode::Iload,
                var: 0,
            },
            Insn::Jump {
                opcode: Opcode::Ifeq,
                label: other,
            },
            Insn::ldc_string("enabled"),
            Insn::Jump {
                opcode: Opcode::Goto,
                label: join,
            },
            Insn::Label(other),
            Insn::ldc_string("off"),
            Insn::Label(join),
            Insn::invokevirtual(STRING, "length", "()I"),
            Insn::Simple(Opcode::Ireturn),
        ],
    );
    let output = run(vec![class])?;
    assert!(output.outputs[0].1.is_none());
    assert_eq!(output.stats.instructions_replaced, 0);
    Ok(())
}

#[test]
fn test_fall_through_label_is_crossed() -> Result<()> {
    let class = static_method(
        "com/example/Flags",
        "length",
        "()I",
        vec![
            Insn::ldc_string("enabled"),
            Insn::Label(LabelId(0)),
            Insn::LineNumber {
                line: 7,
                start: LabelId(0),
            },
            Insn::invokevirtual(STRING, "length", "()I"),
            Insn::Simple(Opcode::Ireturn),
        ],
    );
    let output = run(vec![class])?;
    assert_eq!(
        body(&output, 0),
        vec![
            Insn::Simple(Opcode::Iconst5),
            Insn::Label(LabelId(0)),
            Insn::LineNumber {
                line: 7,
                start: LabelId(0),
            },
            Insn::Simple(Opcode::Ireturn),
        ]
    );
    let replaced = output
        .events
        .filter_kind(EventKind::InstructionReplaced)
        .next()
        .and_then(|event| event.line);
    assert_eq!(replaced, Some(7));
    Ok(())
}

#[test]
fn test_second_run_is_a_fixed_point() -> Result<()> {
    let color = enum_class("com/example/Color", &["RED"]);
    let classes = vec![
        color,
        static_method(
            "com/example/Mixed",
            "value",
            "()Ljava/lang/Object;",
            vec![
                Insn::ldc_string("12"),
                Insn::invokestatic("java/lang/Integer", "parseInt", "(Ljava/lang/String;)I"),
                Insn::invokestatic("java/lang/Integer", "valueOf", "(I)Ljava/lang/Integer;"),
                Insn::Simple(Opcode::Areturn),
            ],
        ),
        static_method(
            "com/example/Names",
            "first",
            "()Ljava/lang/String;",
            vec![
                Insn::getstatic("com/example/Color", "RED", "Lcom/example/Color;"),
                Insn::invokevirtual("com/example/Color", "toString", "()Ljava/lang/String;"),
                Insn::Simple(Opcode::Areturn),
            ],
        ),
    ];
    let first = run(classes.clone())?;
    assert_eq!(first.changed_count(), 2);

    let again: Vec<ClassNode> = first
        .outputs
        .into_iter()
        .zip(classes)
        .map(|((_, output), input)| output.unwrap_or(input))
        .collect();
    let second = run(again)?;
    assert_eq!(second.changed_count(), 0);
    assert_eq!(second.stats.instructions_replaced, 0);
    Ok(())
}

#[test]
fn test_primitive_type_token_restored() -> Result<()> {
    let class = static_method(
        "com/example/Types",
        "name",
        "()Ljava/lang/String;",
        vec![
            Insn::getstatic("java/lang/Integer", "TYPE", "Ljava/lang/Class;"),
            Insn::invokevirtual("java/lang/Class", "getName", "()Ljava/lang/String;"),
            Insn::getstatic("java/lang/Long", "TYPE", "Ljava/lang/Class;"),
            Insn::Simple(Opcode::Areturn),
        ],
    );
    let output = run(vec![class])?;
    assert_eq!(
        body(&output, 0),
        vec![
            Insn::ldc_string("int"),
            Insn::getstatic("java/lang/Long", "TYPE", "Ljava/lang/Class;"),
            Insn::Simple(Opcode::Areturn),
        ]
    );
    Ok(())
}

#[test]
fn test_identity_string_is_rejected() -> Result<()> {
    let class = static_method(
        "com/example/Debug",
        "dump",
        "()Ljava/lang/String;",
        vec![
            Insn::Simple(Opcode::Iconst1),
            Insn::Int {
                opcode: Opcode::Newarray,
                operand: 10,
            },
            Insn::invokevirtual("java/lang/Object", "toString", "()Ljava/lang/String;"),
            Insn::Simple(Opcode::Areturn),
        ],
    );
    let output = run(vec![class])?;
    assert!(output.outputs[0].1.is_none());
    assert!(output.events.has(EventKind::NonDeterministicString));
    Ok(())
}

#[test]
fn test_lone_surrogate_is_not_folded_into_a_string() -> Result<()> {
    let class = static_method(
        "com/example/Glyphs",
        "head",
        "()Ljava/lang/String;",
        vec![
            Insn::ldc_string("\u{1f600}"),
            Insn::Simple(Opcode::Iconst0),
            Insn::invokevirtual(STRING, "charAt", "(I)C"),
            Insn::invokestatic(STRING, "valueOf", "(C)Ljava/lang/String;"),
            Insn::Simple(Opcode::Areturn),
        ],
    );
    let output = run(vec![class])?;
    assert_eq!(
        body(&output, 0),
        vec![
            Insn::Ldc(Constant::Int(0xD83D)),
            Insn::invokestatic(STRING, "valueOf", "(C)Ljava/lang/String;"),
            Insn::Simple(Opcode::Areturn),
        ]
    );
    Ok(())
}

#[test]
fn test_string_past_constant_pool_limit_is_not_inlined() -> Result<()> {
    let class = static_method(
        "com/example/Padding",
        "pad",
        "()Ljava/lang/String;",
        vec![
            Insn::ldc_string("a"),
            Insn::Ldc(Constant::Int(70000)),
            Insn::invokevirtual(STRING, "repeat", "(I)Ljava/lang/String;"),
            Insn::Simple(Opcode::Areturn),
        ],
    );
    let output = run(vec![class])?;
    assert!(output.outputs[0].1.is_none());
    Ok(())
}

#[test]
fn test_huge_repeat_is_left_alone() -> Result<()> {
    let class = static_method(
        "com/example/Padding",
        "huge",
        "()I",
        vec![
            Insn::ldc_string("abcd"),
            Insn::Ldc(Constant::Int(i32::MAX)),
            Insn::invokevirtual(STRING, "repeat", "(I)Ljava/lang/String;"),
            Insn::invokevirtual(STRING, "length", "()I"),
            Insn::Simple(Opcode::Ireturn),
        ],
    );
    let output = run(vec![class])?;
    assert!(output.outputs[0].1.is_none());
    assert!(!output.events.has(EventKind::InstructionReplaced));
    Ok(())
}
