//! The fixed-point transformation loop.
//!
//! A run moves through `Load -> Normalize -> Round* -> Emit`. Every round
//! runs three phases over the classes that changed in the previous round (all
//! classes in the first):
//!
//! 1. **Inline** - every call site whose result reconstructs and deconstructs
//!    is replaced by the deconstructed instructions.
//! 2. **Propagate fields** - a `static final` field whose initializer stores
//!    all reconstruct to the same value is resolved; its reads are replaced
//!    everywhere and the readers are scheduled for another round.
//! 3. **Prune initializers** - static initializers that only return are
//!    removed.
//!
//! The run ends once a round changes nothing, or after
//! [`TransformConfig::max_rounds`] rounds.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use rustc_hash::FxHashSet;

use crate::{
    classfile::{
        ClassCodec, ClassNode, Constant, Insn, InsnId, InsnList, LabelId, MethodDescriptor, Opcode,
        Type, CLINIT, INIT, STRING,
    },
    deconstruct::BytecodeWriter,
    diagnostics::{BytecodeLocation, EventKind, EventLog, TransformStats},
    reconstruct::{concat_kind, ReconstructedValue, ReconstructionContext, StackReconstructor},
    registry::{ConstantFieldReconstructor, MemberKey, Registries},
    runtime::{format, InputClasses, Value},
    transform::{
        class::TransformedClass,
        config::TransformConfig,
        normalize::{denormalize, normalize},
    },
    Error, Result,
};

/// The result of a run.
#[derive(Debug)]
pub struct TransformOutput<K, T = ClassNode> {
    /// One entry per input, in input order; `None` if the class is unchanged
    pub outputs: Vec<(K, Option<T>)>,
    /// Everything that happened during the run
    pub events: EventLog,
    /// Counts derived from `events`
    pub stats: TransformStats,
}

impl<K, T> TransformOutput<K, T> {
    /// Number of inputs with an output.
    #[must_use]
    pub fn changed_count(&self) -> usize {
        self.outputs.iter().filter(|(_, output)| output.is_some()).count()
    }
}

/// Runs the constant inliner over a set of classes.
///
/// # Examples
///
/// ```rust
/// use classfold::classfile::{AccessFlags, ClassNode, Insn, InsnList, MethodNode, Opcode};
/// use classfold::transform::{TransformConfig, Transformer};
///
/// let mut class = ClassNode::new("com/example/Limits");
/// class.methods.push(MethodNode::new(
///     AccessFlags::STATIC,
///     "size",
///     "()I",
///     InsnList::from_insns([
///         Insn::ldc_string("64"),
///         Insn::invokestatic("java/lang/Integer", "parseInt", "(Ljava/lang/String;)I"),
///         Insn::Simple(Opcode::Ireturn),
///     ]),
/// ));
///
/// let output = Transformer::new(TransformConfig::default()).run(vec![("Limits", class)])?;
/// let class = output.outputs[0].1.as_ref().unwrap();
/// assert_eq!(
///     class.methods[0].insns.to_vec(),
///     vec![Insn::Int { opcode: Opcode::Bipush, operand: 64 }, Insn::Simple(Opcode::Ireturn)]
/// );
/// # Ok::<(), classfold::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    config: TransformConfig,
}

impl Transformer {
    /// Creates a transformer.
    #[must_use]
    pub fn new(config: TransformConfig) -> Self {
        Transformer { config }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Transforms class trees.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateClass`] if two inputs declare the same class
    /// and [`Error::FieldAlreadyResolved`] on an internal single-assignment
    /// violation. Failures at individual sites are recorded in the event log
    /// instead.
    pub fn run<K>(&self, inputs: Vec<(K, ClassNode)>) -> Result<TransformOutput<K>> {
        let events = EventLog::new();

        // Load
        let mut order = Vec::with_capacity(inputs.len());
        let mut classes = BTreeMap::new();
        for (key, node) in inputs {
            let name = node.name.clone();
            if classes.contains_key(&name) {
                return Err(Error::DuplicateClass(name));
            }
            order.push((key, name.clone()));
            classes.insert(name, node);
        }

        // Normalize
        for node in classes.values_mut() {
            normalize(node, &events);
        }

        let mut run = Run {
            env: Env {
                config: &self.config,
                registries: self.config.registries(),
                inputs: InputClasses::from_classes(classes.values()),
                events,
            },
            classes: classes
                .into_iter()
                .map(|(name, node)| (name, TransformedClass::new(node)))
                .collect(),
        };
        run.rounds()?;

        // Emit
        let Run { env, mut classes } = run;
        let mut outputs = Vec::with_capacity(order.len());
        for (key, name) in order {
            let output = classes.remove(&name).filter(TransformedClass::is_changed).map(|class| {
                let mut node = class.into_node();
                denormalize(&mut node);
                node
            });
            outputs.push((key, output));
        }
        let stats = TransformStats::from_log(&env.events);
        log::info!(target: "classfold", "{stats}");
        Ok(TransformOutput {
            outputs,
            events: env.events,
            stats,
        })
    }

    /// Transforms classfiles through a codec.
    ///
    /// # Errors
    ///
    /// Codec failures are fatal; otherwise see [`Transformer::run`].
    pub fn run_bytes<K, C: ClassCodec>(
        &self,
        codec: &C,
        inputs: Vec<(K, Vec<u8>)>,
    ) -> Result<TransformOutput<K, Vec<u8>>> {
        let nodes = inputs
            .into_iter()
            .map(|(key, bytes)| Ok((key, codec.read(&bytes)?)))
            .collect::<Result<Vec<_>>>()?;
        let output = self.run(nodes)?;
        let outputs = output
            .outputs
            .into_iter()
            .map(|(key, node)| Ok((key, node.map(|node| codec.write(&node)).transpose()?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(TransformOutput {
            outputs,
            events: output.events,
            stats: output.stats,
        })
    }
}

/// Everything a phase reads while it mutates one class.
struct Env<'a> {
    config: &'a TransformConfig,
    registries: Registries,
    inputs: InputClasses,
    events: EventLog,
}

/// A resolved `static final` field.
struct ResolvedField {
    key: MemberKey,
    ty: Type,
    value: Value,
}

struct Run<'a> {
    env: Env<'a>,
    classes: BTreeMap<String, TransformedClass>,
}

impl Run<'_> {
    fn rounds(&mut self) -> Result<()> {
        let mut dirty: BTreeSet<String> = self.classes.keys().cloned().collect();
        let mut round = 0;
        while !dirty.is_empty() {
            if round == self.env.config.max_rounds {
                self.env.warn_rounds(round, &dirty);
                break;
            }
            round += 1;
            let current = std::mem::take(&mut dirty);

            for name in &current {
                if let Some(class) = self.classes.get_mut(name) {
                    if self.env.inline_class(class)? {
                        dirty.insert(name.clone());
                    }
                }
            }

            if self.env.config.propagate_fields {
                for name in &current {
                    let Some(class) = self.classes.get_mut(name) else {
                        continue;
                    };
                    let resolved = self.env.propagate_class(class)?;
                    if resolved.is_empty() {
                        continue;
                    }
                    self.env.inputs.add(class.node());
                    dirty.insert(name.clone());
                    for field in resolved {
                        self.env.registries.register_reconstructor(
                            field.key.clone(),
                            Arc::new(ConstantFieldReconstructor::new(field.value.clone())),
                        );
                        self.substitute_reads(&field, &mut dirty)?;
                    }
                }
            }

            if self.env.config.prune_initializers {
                for name in &current {
                    if let Some(class) = self.classes.get_mut(name) {
                        if class.prune_initializer() {
                            self.env
                                .events
                                .record(EventKind::InitializerRemoved)
                                .class(name.clone())
                                .member(CLINIT);
                        }
                    }
                }
            }

            self.env
                .events
                .record(EventKind::RoundCompleted)
                .message(format!("round {round}: {} classes, {} scheduled", current.len(), dirty.len()));
        }
        Ok(())
    }

    /// Replaces reads of a resolved field in every class and schedules the
    /// readers for another round.
    fn substitute_reads(&mut self, field: &ResolvedField, dirty: &mut BTreeSet<String>) -> Result<()> {
        let writer = self.env.writer();
        let Some(written) = writer.deconstruct(&field.ty, &field.value)? else {
            self.env
                .events
                .record(EventKind::DeconstructionFailed)
                .class(field.key.owner.clone())
                .member(field.key.name.clone())
                .message(format!("no writer for {}", field.value));
            for (name, class) in &self.classes {
                if class.reads_field(&field.key.owner, &field.key.name) {
                    dirty.insert(name.clone());
                }
            }
            return Ok(());
        };

        for (name, class) in &mut self.classes {
            let mut count = 0;
            for index in 0..class.node().methods.len() {
                let reads: Vec<InsnId> = class.node().methods[index]
                    .insns
                    .iter()
                    .filter(|(_, insn)| is_read_of(insn, &field.key))
                    .map(|(id, _)| id)
                    .collect();
                for id in reads {
                    let insns = &mut class.node_mut().methods[index].insns;
                    let new_ids = insns.insert_all_before(id, written.insns.clone());
                    insns.remove(id);
                    if let Some(last) = new_ids.last() {
                        class.mark_inlined(index, *last);
                    }
                    count += 1;
                }
            }
            if count > 0 {
                class.mark_changed();
                class.reindex();
                dirty.insert(name.clone());
                self.env
                    .events
                    .record(EventKind::FieldReadSubstituted)
                    .class(name.clone())
                    .member(field.key.to_string())
                    .message(format!("{count} reads -> {}", written.info));
            }
        }
        Ok(())
    }
}

impl Env<'_> {
    fn writer(&self) -> BytecodeWriter<'_> {
        BytecodeWriter::new(&self.registries).with_loader(self.config.class_loader.as_deref())
    }

    fn engine<'e>(
        &'e self,
        insns: &'e InsnList,
        safe_labels: &'e FxHashSet<LabelId>,
    ) -> StackReconstructor<'e> {
        StackReconstructor::new(insns, safe_labels, &self.registries, &self.inputs)
            .with_events(&self.events)
            .with_max_depth(self.config.max_depth)
    }

    fn context(&self, location: BytecodeLocation) -> ReconstructionContext {
        ReconstructionContext::new(location).with_loader(self.config.class_loader.clone())
    }

    fn warn_rounds(&self, rounds: usize, pending: &BTreeSet<String>) {
        self.events.warn(format!(
            "no fixed point after {rounds} rounds; {} classes still pending",
            pending.len()
        ));
    }

    /// The type of the value a site pushes, for instructions the inline
    /// phase replaces.
    fn site_type(&self, insn: &Insn) -> Result<Option<Type>> {
        match insn {
            Insn::Method { opcode, method, .. } => {
                if *opcode == Opcode::Invokespecial {
                    return Ok((method.name == INIT).then(|| Type::object(method.owner.clone())));
                }
                let ret = MethodDescriptor::parse(&method.desc)?.ret;
                Ok((ret != Type::Void).then_some(ret))
            }
            Insn::InvokeDynamic { desc, bsm, .. } if concat_kind(bsm).is_some() => {
                Ok(Some(MethodDescriptor::parse(desc)?.ret))
            }
            Insn::Field {
                opcode: Opcode::Getstatic,
                field,
            } if !self.inputs.contains(&field.owner)
                && self.registries.reconstructor(&MemberKey::from(field)).is_some() =>
            {
                Ok(Some(Type::parse(&field.desc)?))
            }
            _ => Ok(None),
        }
    }

    /// Logs a per-site hard failure. Fatal errors are returned.
    fn report(&self, err: Error, location: &BytecodeLocation, site: &str, owner: Option<&str>) -> Result<()> {
        if err.is_fatal() {
            return Err(err);
        }
        if matches!(err.root_cause(), Error::MemberNotFound(_) | Error::AccessDenied(_)) {
            let mut message = format!("{site}: {err}");
            let known = owner.map(|owner| self.registries.members_of(owner)).unwrap_or_default();
            if !known.is_empty() {
                let known: Vec<String> = known.iter().map(ToString::to_string).collect();
                message.push_str(&format!("; registered members: {}", known.join(", ")));
            }
            self.events
                .record(EventKind::MemberUnavailable)
                .at(location)
                .message(message);
        } else {
            self.events
                .record(EventKind::ReconstructionFailed)
                .at(location)
                .message(format!("{site}: {err}"));
        }
        Ok(())
    }

    fn inline_class(&self, class: &mut TransformedClass) -> Result<bool> {
        let mut changed = false;
        for index in 0..class.node().methods.len() {
            changed |= self.inline_method(class, index)?;
        }
        if changed {
            class.mark_changed();
            class.reindex();
        }
        Ok(changed)
    }

    fn inline_method(&self, class: &mut TransformedClass, index: usize) -> Result<bool> {
        let (location, ids) = {
            let method = &class.node().methods[index];
            (
                BytecodeLocation::new(class.name(), method.name.clone(), method.desc.clone()),
                method.insns.ids(),
            )
        };
        let base = self.context(location.clone());
        let mut line = None;
        let mut changed = false;

        for id in ids {
            let Some(insn) = class.node().methods[index].insns.get(id) else {
                continue;
            };
            if let Insn::LineNumber { line: current, .. } = insn {
                line = Some(*current);
                continue;
            }
            if class.is_inlined(index, id) {
                continue;
            }
            let Some(slot) = self.site_type(insn)? else {
                continue;
            };
            let site = insn.to_string();
            let owner = match insn {
                Insn::Method { method, .. } => Some(method.owner.clone()),
                Insn::Field { field, .. } => Some(field.owner.clone()),
                _ => None,
            };
            let ctx = base.at_line(line).with_receiver_type(Some(slot.clone()));

            let attempt = {
                let method = &class.node().methods[index];
                let Some(safe) = class.safe_labels(index) else {
                    continue;
                };
                self.engine(&method.insns, safe)
                    .reconstruct(&ctx, id)
                    .and_then(|reconstructed| match reconstructed {
                        Some(reconstructed) => Ok(self
                            .writer()
                            .deconstruct(&slot, &reconstructed.value)?
                            .map(|written| (reconstructed, written))),
                        None => Ok(None),
                    })
            };
            let (reconstructed, written) = match attempt {
                Ok(Some(pair)) => pair,
                Ok(None) => continue,
                Err(err) => {
                    self.report(err, ctx.location(), &site, owner.as_deref())?;
                    class.mark_inlined(index, id);
                    continue;
                }
            };

            let insns = &mut class.node_mut().methods[index].insns;
            if insns.span_insns(reconstructed.first, reconstructed.end) == written.insns {
                class.mark_inlined(index, id);
                continue;
            }
            let new_ids = insns.insert_all_before(reconstructed.first, written.insns);
            insns.remove_span(reconstructed.first, reconstructed.end);
            if let Some(last) = new_ids.last() {
                class.mark_inlined(index, *last);
            }
            self.events
                .record(EventKind::InstructionReplaced)
                .at(ctx.location())
                .message(format!("{} -> {}", reconstructed.info, written.info));
            changed = true;
        }
        Ok(changed)
    }

    fn propagate_class(&self, class: &mut TransformedClass) -> Result<Vec<ResolvedField>> {
        let Some(clinit) = class.clinit() else {
            return Ok(Vec::new());
        };
        let location = BytecodeLocation::new(class.name(), CLINIT, "()V");
        let base = self.context(location.clone());
        let mut resolved = Vec::new();

        for (name, desc) in class.unresolved_static_finals() {
            let sites = class.store_sites(&name).to_vec();
            if sites.is_empty() {
                continue;
            }
            let key = MemberKey::field(class.name(), name.clone());
            let force = self.config.is_forced(&key);
            let ty = Type::parse(&desc)?;
            if force && sites.len() != 1 {
                self.events
                    .record(EventKind::MultipleInitPaths)
                    .at(&location)
                    .member(key.to_string())
                    .message(format!("forced field stored at {} sites", sites.len()));
                continue;
            }
            if !force && matches!(ty, Type::Array(_)) {
                continue;
            }
            if class.reads_before_store(&name) {
                self.events
                    .record(EventKind::Info)
                    .at(&location)
                    .member(key.to_string())
                    .message("read before its store in the initializer");
                continue;
            }

            let Some(stores) = self.reconstruct_stores(class, clinit, &sites, &base, &ty, force)? else {
                continue;
            };
            let value = stores[0].1.value.clone();
            if stores.iter().any(|(_, store)| store.value != value) {
                self.events
                    .record(EventKind::MultipleInitPaths)
                    .at(&location)
                    .member(key.to_string())
                    .message(format!("{} stores disagree", stores.len()));
                continue;
            }

            let Some(field) = class.field_mut(&name) else {
                continue;
            };
            field.resolve(&key.to_string(), value.clone())?;
            if self.apply_resolution(class, clinit, &name, &ty, &value, &stores)? {
                class.mark_changed();
                class.reindex();
            }
            self.events
                .record(EventKind::FieldResolved)
                .at(&location)
                .member(key.to_string())
                .message(format!("{value}"));
            resolved.push(ResolvedField { key, ty, value });
        }
        Ok(resolved)
    }

    /// Reconstructs the value of every store site. `None` unless all of them
    /// reconstruct.
    fn reconstruct_stores(
        &self,
        class: &TransformedClass,
        clinit: usize,
        sites: &[InsnId],
        base: &ReconstructionContext,
        ty: &Type,
        force: bool,
    ) -> Result<Option<Vec<(InsnId, ReconstructedValue)>>> {
        let method = &class.node().methods[clinit];
        let Some(safe) = class.safe_labels(clinit) else {
            return Ok(None);
        };
        let engine = self.engine(&method.insns, safe);
        let mut stores = Vec::with_capacity(sites.len());
        for site in sites {
            let ctx = base
                .at_line(line_at(&method.insns, *site))
                .with_receiver_type(Some(ty.clone()))
                .with_force(force);
            match engine.reconstruct_operand(&ctx, *site) {
                Ok(Some(store)) => stores.push((*site, store)),
                Ok(None) => return Ok(None),
                Err(err) => {
                    let site = method.insns.get(*site).map(ToString::to_string).unwrap_or_default();
                    self.report(err, ctx.location(), &site, None)?;
                    return Ok(None);
                }
            }
        }
        Ok(Some(stores))
    }

    /// Rewrites the initializer for a resolved field. Constant-value types
    /// move into the field's `ConstantValue` and lose their stores; other
    /// types keep the store with the value written out afresh.
    fn apply_resolution(
        &self,
        class: &mut TransformedClass,
        clinit: usize,
        name: &str,
        ty: &Type,
        value: &Value,
        stores: &[(InsnId, ReconstructedValue)],
    ) -> Result<bool> {
        if let Some(constant) = constant_of(ty, value) {
            if let Some(field) = class.node_mut().fields.iter_mut().find(|f| f.name == name) {
                field.value = Some(constant);
            }
            let insns = &mut class.node_mut().methods[clinit].insns;
            for (site, store) in stores {
                insns.remove_span(store.first, store.end);
                insns.remove(*site);
            }
            return Ok(true);
        }

        let Some(written) = self.writer().deconstruct(ty, value)? else {
            return Ok(false);
        };
        let mut changed = false;
        for (_, store) in stores {
            let insns = &mut class.node_mut().methods[clinit].insns;
            if insns.span_insns(store.first, store.end) == written.insns {
                continue;
            }
            let new_ids = insns.insert_all_before(store.first, written.insns.clone());
            insns.remove_span(store.first, store.end);
            if let Some(last) = new_ids.last() {
                class.mark_inlined(clinit, *last);
            }
            changed = true;
        }
        Ok(changed)
    }
}

fn is_read_of(insn: &Insn, key: &MemberKey) -> bool {
    matches!(insn, Insn::Field { opcode: Opcode::Getstatic, field }
        if field.owner == key.owner && field.name == key.name)
}

/// The source line of the instruction at `id`.
fn line_at(insns: &InsnList, id: InsnId) -> Option<u32> {
    let mut cursor = insns.prev(id);
    while let Some(current) = cursor {
        if let Some(Insn::LineNumber { line, .. }) = insns.get(current) {
            return Some(*line);
        }
        cursor = insns.prev(current);
    }
    None
}

/// The `ConstantValue` attribute holding `value` in a field of type `ty`.
fn constant_of(ty: &Type, value: &Value) -> Option<Constant> {
    match ty {
        Type::Long => value.as_long().map(Constant::Long),
        Type::Float => value.as_float().map(Constant::Float),
        Type::Double => value.as_double().map(Constant::Double),
        ty if ty.is_int_like() => value.as_int().map(Constant::Int),
        ty if ty.is_object(STRING) => value
            .as_str()
            .filter(|s| format::modified_utf8_len(s) <= format::MAX_UTF8_CONSTANT)
            .map(|s| Constant::String(s.to_string())),
        _ => None,
    }
}
