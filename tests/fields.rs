//! Static final field propagation.
//!
//! Covers the path from a `putstatic` in a static initializer to the
//! field's `ConstantValue` attribute and the substitution of its reads,
//! including the cases where propagation must stay away:
//!
//! 1. Stores that disagree across initialization paths
//! 2. Non-deterministic initializers without a force entry
//! 3. Configured fields the host runtime does not have

use std::sync::Arc;

use classfold::prelude::*;

const CLINIT: &str = "<clinit>";

fn static_final(name: &str, desc: &str) -> FieldNode {
    FieldNode::new(
        AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL,
        name,
        desc,
    )
}

/// A class with the given `static final` fields and initializer.
fn holder(class: &str, fields: &[(&str, &str)], clinit: Vec<Insn>) -> ClassNode {
    let mut node = ClassNode::new(class);
    for (name, desc) in fields {
        node.fields.push(static_final(name, desc));
    }
    node.methods.push(MethodNode::new(
        AccessFlags::STATIC,
        CLINIT,
        "()V",
        InsnList::from_insns(clinit),
    ));
    node
}

/// A class whose single method returns a static field of `owner`.
fn reader(class: &str, owner: &str, name: &str, desc: &str, ret: Opcode) -> ClassNode {
    let mut node = ClassNode::new(class);
    node.methods.push(MethodNode::new(
        AccessFlags::PUBLIC | AccessFlags::STATIC,
        "get",
        format!("(){desc}"),
        InsnList::from_insns([Insn::getstatic(owner, name, desc), Insn::Simple(ret)]),
    ));
    node
}

/// An initializer that stores `first` or `second` depending on a flag the
/// host cannot see.
fn branching_clinit(class: &str, field: &str, first: Insn, second: Insn) -> Vec<Insn> {
    let other = LabelId(0);
    let done = LabelId(1);
    vec![
        Insn::invokestatic("com/example/Env", "flag", "()Z"),
        Insn::Jump {
            opcode: Opcode::Ifeq,
            label: other,
        },
        first,
        Insn::putstatic(class, field, "I"),
        Insn::Jump {
            opcode: Opcode::Goto,
            label: done,
        },
        Insn::Label(other),
        second,
        Insn::putstatic(class, field, "I"),
        Insn::Label(done),
        Insn::Simple(Opcode::Return),
    ]
}

fn run(config: TransformConfig, classes: Vec<ClassNode>) -> Result<TransformOutput<usize>> {
    Transformer::new(config).run(classes.into_iter().enumerate().collect())
}

#[test]
fn test_string_field_resolved_and_reads_substituted() -> Result<()> {
    let config = holder(
        "com/example/Config",
        &[("GREETING", "Ljava/lang/String;")],
        vec![
            Insn::ldc_string("  hello  "),
            Insn::invokevirtual("java/lang/String", "trim", "()Ljava/lang/String;"),
            Insn::putstatic("com/example/Config", "GREETING", "Ljava/lang/String;"),
            Insn::Simple(Opcode::Return),
        ],
    );
    let user = reader(
        "com/example/User",
        "com/example/Config",
        "GREETING",
        "Ljava/lang/String;",
        Opcode::Areturn,
    );
    let output = run(TransformConfig::default(), vec![config, user])?;

    let config = output.outputs[0].1.as_ref().expect("config changed");
    assert_eq!(
        config.field("GREETING").and_then(|field| field.value.clone()),
        Some(Constant::String("hello".to_string()))
    );
    assert!(config.methods.iter().all(|method| method.name != CLINIT));

    let user = output.outputs[1].1.as_ref().expect("reader changed");
    assert_eq!(
        user.methods[0].insns.to_vec(),
        vec![Insn::ldc_string("hello"), Insn::Simple(Opcode::Areturn)]
    );
    assert_eq!(output.stats.reads_substituted, 1);
    Ok(())
}

#[test]
fn test_chained_fields_resolve_across_rounds() -> Result<()> {
    let base = holder(
        "com/example/Base",
        &[("PORT", "I")],
        vec![
            Insn::ldc_string("8080"),
            Insn::invokestatic("java/lang/Integer", "parseInt", "(Ljava/lang/String;)I"),
            Insn::putstatic("com/example/Base", "PORT", "I"),
            Insn::Simple(Opcode::Return),
        ],
    );
    let derived = holder(
        "com/example/Derived",
        &[("NEXT", "I")],
        vec![
            Insn::getstatic("com/example/Base", "PORT", "I"),
            Insn::Simple(Opcode::Iconst1),
            Insn::Simple(Opcode::Iadd),
            Insn::putstatic("com/example/Derived", "NEXT", "I"),
            Insn::Simple(Opcode::Return),
        ],
    );
    let output = run(TransformConfig::default(), vec![derived, base])?;

    let derived = output.outputs[0].1.as_ref().expect("derived changed");
    assert_eq!(
        derived.field("NEXT").and_then(|field| field.value.clone()),
        Some(Constant::Int(8081))
    );
    assert_eq!(output.stats.fields_resolved, 2);
    Ok(())
}

#[test]
fn test_disagreeing_paths_stay_untouched() -> Result<()> {
    let class = holder(
        "com/example/Mode",
        &[("LEVEL", "I")],
        branching_clinit(
            "com/example/Mode",
            "LEVEL",
            Insn::Simple(Opcode::Iconst1),
            Insn::Simple(Opcode::Iconst2),
        ),
    );
    let output = run(TransformConfig::default(), vec![class])?;

    assert!(output.outputs[0].1.is_none());
    assert_eq!(output.events.count_kind(EventKind::MultipleInitPaths), 1);
    assert_eq!(output.stats.fields_resolved, 0);
    Ok(())
}

#[test]
fn test_agreeing_paths_resolve() -> Result<()> {
    let class = holder(
        "com/example/Mode",
        &[("LEVEL", "I")],
        branching_clinit(
            "com/example/Mode",
            "LEVEL",
            Insn::Simple(Opcode::Iconst2),
            Insn::Simple(Opcode::Iconst2),
        ),
    );
    let output = run(TransformConfig::default(), vec![class])?;

    let class = output.outputs[0].1.as_ref().expect("mode changed");
    assert_eq!(
        class.field("LEVEL").and_then(|field| field.value.clone()),
        Some(Constant::Int(2))
    );
    let clinit = class
        .methods
        .iter()
        .find(|method| method.name == CLINIT)
        .expect("initializer still branches");
    assert!(clinit
        .insns
        .iter()
        .all(|(_, insn)| !matches!(insn, Insn::Field { opcode: Opcode::Putstatic, .. })));
    assert!(!output.events.has(EventKind::MultipleInitPaths));
    Ok(())
}

fn timestamp_holder() -> ClassNode {
    holder(
        "com/example/BuildInfo",
        &[("BUILT_AT", "J")],
        vec![
            Insn::invokestatic("com/example/Build", "timestamp", "()J"),
            Insn::putstatic("com/example/BuildInfo", "BUILT_AT", "J"),
            Insn::Simple(Opcode::Return),
        ],
    )
}

fn build_loader() -> Arc<MapClassLoader> {
    Arc::new(MapClassLoader::new().with_class(
        SimpleClass::new("com/example/Build").with_static_method("timestamp", "()J", |_| {
            Ok(Value::Long(1_700_000_000_000))
        }),
    ))
}

#[test]
fn test_non_deterministic_initializer_needs_force() -> Result<()> {
    let config = TransformConfig::default().with_class_loader(build_loader());
    let output = run(config, vec![timestamp_holder()])?;

    assert!(output.outputs[0].1.is_none());
    assert_eq!(output.stats.fields_resolved, 0);
    Ok(())
}

#[test]
fn test_forced_field_is_resolved() -> Result<()> {
    let config = TransformConfig::default()
        .with_class_loader(build_loader())
        .with_force_field(MemberKey::field("com/example/BuildInfo", "BUILT_AT"));
    let output = run(config, vec![timestamp_holder()])?;

    let class = output.outputs[0].1.as_ref().expect("forced field resolved");
    assert_eq!(
        class.field("BUILT_AT").and_then(|field| field.value.clone()),
        Some(Constant::Long(1_700_000_000_000))
    );
    assert_eq!(output.stats.initializers_removed, 1);
    Ok(())
}

#[test]
fn test_forced_field_with_two_stores_is_rejected() -> Result<()> {
    let class = holder(
        "com/example/Mode",
        &[("LEVEL", "I")],
        branching_clinit(
            "com/example/Mode",
            "LEVEL",
            Insn::Simple(Opcode::Iconst2),
            Insn::Simple(Opcode::Iconst2),
        ),
    );
    let config =
        TransformConfig::default().with_force_field(MemberKey::field("com/example/Mode", "LEVEL"));
    let output = run(config, vec![class])?;

    assert!(output.outputs[0].1.is_none());
    assert_eq!(output.events.count_kind(EventKind::MultipleInitPaths), 1);
    Ok(())
}

#[test]
fn test_configured_field_missing_on_host() -> Result<()> {
    let loader = Arc::new(
        MapClassLoader::new().with_class(
            SimpleClass::new("com/vendor/Settings").with_static("OTHER", Value::Int(1)),
        ),
    );
    let config = TransformConfig::default()
        .with_class_loader(loader)
        .with_known_constant_field(FieldRef::new("com/vendor/Settings", "MODE", "I"));
    let user = reader("com/example/User", "com/vendor/Settings", "MODE", "I", Opcode::Ireturn);
    let output = run(config, vec![user])?;

    assert!(output.outputs[0].1.is_none());
    let event = output
        .events
        .filter_kind(EventKind::MemberUnavailable)
        .next()
        .expect("missing member reported");
    assert_eq!(event.class.as_deref(), Some("com/example/User"));
    assert!(event.message.contains("MODE"));
    Ok(())
}

#[test]
fn test_configured_field_read_from_host() -> Result<()> {
    let loader = Arc::new(MapClassLoader::new().with_class(
        SimpleClass::new("com/vendor/Settings").with_static("MODE", Value::Int(3)),
    ));
    let config = TransformConfig::default()
        .with_class_loader(loader)
        .with_known_constant_field(FieldRef::new("com/vendor/Settings", "MODE", "I"));
    let user = reader("com/example/User", "com/vendor/Settings", "MODE", "I", Opcode::Ireturn);
    let output = run(config, vec![user])?;

    let user = output.outputs[0].1.as_ref().expect("read inlined");
    assert_eq!(
        user.methods[0].insns.to_vec(),
        vec![Insn::Simple(Opcode::Iconst3), Insn::Simple(Opcode::Ireturn)]
    );
    Ok(())
}

#[test]
fn test_propagation_can_be_disabled() -> Result<()> {
    let class = holder(
        "com/example/Config",
        &[("SIZE", "I")],
        vec![
            Insn::ldc_string("12"),
            Insn::invokestatic("java/lang/Integer", "parseInt", "(Ljava/lang/String;)I"),
            Insn::putstatic("com/example/Config", "SIZE", "I"),
            Insn::Simple(Opcode::Return),
        ],
    );
    let config = TransformConfig::default().with_propagate_fields(false);
    let output = run(config, vec![class])?;

    let class = output.outputs[0].1.as_ref().expect("call site inlined");
    assert_eq!(class.field("SIZE").and_then(|field| field.value.clone()), None);
    assert_eq!(
        class.methods[0].insns.to_vec(),
        vec![
            Insn::Int {
                opcode: Opcode::Bipush,
                operand: 12
            },
            Insn::putstatic("com/example/Config", "SIZE", "I"),
            Insn::Simple(Opcode::Return),
        ]
    );
    Ok(())
}

#[test]
fn test_field_read_before_its_store_stays_in_the_initializer() -> Result<()> {
    let order = holder(
        "com/example/Order",
        &[("A", "I"), ("B", "I")],
        vec![
            Insn::getstatic("com/example/Order", "B", "I"),
            Insn::Simple(Opcode::Iconst1),
            Insn::Simple(Opcode::Iadd),
            Insn::putstatic("com/example/Order", "A", "I"),
            Insn::ldc_string("5"),
            Insn::invokestatic("java/lang/Integer", "parseInt", "(Ljava/lang/String;)I"),
            Insn::putstatic("com/example/Order", "B", "I"),
            Insn::Simple(Opcode::Return),
        ],
    );
    let user = reader("com/example/User", "com/example/Order", "A", "I", Opcode::Ireturn);
    let output = run(TransformConfig::default(), vec![order, user])?;

    let order = output.outputs[0].1.as_ref().expect("parseInt inlined");
    assert_eq!(order.field("A").and_then(|field| field.value.clone()), None);
    assert_eq!(order.field("B").and_then(|field| field.value.clone()), None);
    let clinit = order
        .methods
        .iter()
        .find(|method| method.name == CLINIT)
        .expect("initializer kept");
    assert_eq!(
        clinit.insns.to_vec(),
        vec![
            Insn::getstatic("com/example/Order", "B", "I"),
            Insn::Simple(Opcode::Iconst1),
            Insn::Simple(Opcode::Iadd),
            Insn::putstatic("com/example/Order", "A", "I"),
            Insn::Simple(Opcode::Iconst5),
            Insn::putstatic("com/example/Order", "B", "I"),
            Insn::Simple(Opcode::Return),
        ]
    );
    assert!(output.outputs[1].1.is_none());
    assert_eq!(output.stats.fields_resolved, 0);
    Ok(())
}

#[test]
fn test_class_field_of_unloadable_type_read_by_name() -> Result<()> {
    let plugins = holder(
        "com/example/Plugins",
        &[("DEFAULT", "Ljava/lang/Class;")],
        vec![
            Insn::Ldc(Constant::Type(Type::object("com/vendor/missing/Plugin"))),
            Insn::putstatic("com/example/Plugins", "DEFAULT", "Ljava/lang/Class;"),
            Insn::Simple(Opcode::Return),
        ],
    );
    let mut user = ClassNode::new("com/example/Loader");
    user.methods.push(MethodNode::new(
        AccessFlags::PUBLIC | AccessFlags::STATIC,
        "defaultName",
        "()Ljava/lang/String;",
        InsnList::from_insns([
            Insn::getstatic("com/example/Plugins", "DEFAULT", "Ljava/lang/Class;"),
            Insn::invokevirtual("java/lang/Class", "getName", "()Ljava/lang/String;"),
            Insn::Simple(Opcode::Areturn),
        ]),
    ));
    let output = run(TransformConfig::default(), vec![plugins, user])?;

    let user = output.outputs[1].1.as_ref().expect("type name inlined");
    assert_eq!(
        user.methods[0].insns.to_vec(),
        vec![
            Insn::ldc_string("com.vendor.missing.Plugin"),
            Insn::Simple(Opcode::Areturn)
        ]
    );
    assert!(!output.events.has(EventKind::MemberUnavailable));
    Ok(())
}

#[test]
fn test_oversized_string_field_keeps_its_initializer() -> Result<()> {
    let banner = holder(
        "com/example/Banner",
        &[("TEXT", "Ljava/lang/String;")],
        vec![
            Insn::ldc_string("="),
            Insn::Ldc(Constant::Int(70000)),
            Insn::invokevirtual("java/lang/String", "repeat", "(I)Ljava/lang/String;"),
            Insn::putstatic("com/example/Banner", "TEXT", "Ljava/lang/String;"),
            Insn::Simple(Opcode::Return),
        ],
    );
    let user = reader(
        "com/example/User",
        "com/example/Banner",
        "TEXT",
        "Ljava/lang/String;",
        Opcode::Areturn,
    );
    let output = run(TransformConfig::default(), vec![banner, user])?;

    assert!(output.outputs[0].1.is_none());
    assert!(output.outputs[1].1.is_none());
    assert!(output.events.has(EventKind::DeconstructionFailed));
    Ok(())
}
