//! The backward symbolic interpreter.
//!
//! [`StackReconstructor::reconstruct`] answers one question: which value is on
//! top of the operand stack right after a given instruction? It never runs the
//! program. Instead it looks at what the instruction consumes, walks backward
//! to the instructions that produced those operands, reconstructs them
//! recursively and then applies the instruction to the reconstructed values.
//!
//! The walk is linear. It may cross labels that only fall-through reaches, but
//! stops at any label a jump, switch or exception handler targets: a value
//! flowing into such a label depends on the path taken, and a backward scan
//! cannot tell which one.
//!
//! # Outcomes
//!
//! - `Ok(Some(_))` - the value with the span of instructions computing it
//! - `Ok(None)` - the value cannot be proven constant; routine and silent
//! - `Err(_)` - a hard failure (missing member, host call that threw), wrapped
//!   in [`FailureFrame`](crate::diagnostics::FailureFrame)s on the way out

use rustc_hash::FxHashSet;

use crate::{
    classfile::{
        array_type, Constant, FieldRef, Insn, InsnId, InsnList, LabelId, MethodDescriptor,
        MethodRef, Opcode, Type, INIT,
    },
    diagnostics::{BytecodeLocation, EventKind, EventLog, FailureContext, FrameKind},
    reconstruct::{
        concat::{concat, concat_kind},
        context::ReconstructionContext,
        info::{ReconstructedValue, StackInfo},
        ops,
    },
    registry::{Call, HostFieldReconstructor, HostMethodReconstructor, MemberKey, Reconstructor, Registries},
    runtime::{format, InputClasses, Value},
    Error, Result,
};

/// Default bound on the nesting of the backward walk.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Largest array an array literal may allocate.
pub const MAX_ARRAY_LENGTH: i32 = 1 << 16;

const TO_STRING_DESC: &str = "()Ljava/lang/String;";

/// Reconstructs stack values of one method body.
pub struct StackReconstructor<'a> {
    insns: &'a InsnList,
    safe_labels: &'a FxHashSet<LabelId>,
    registries: &'a Registries,
    inputs: &'a InputClasses,
    events: Option<&'a EventLog>,
    max_depth: usize,
}

impl<'a> StackReconstructor<'a> {
    /// Creates an engine over `insns`.
    ///
    /// `safe_labels` are the labels of the body that nothing jumps to, see
    /// [`crate::classfile::MethodNode::safe_labels`].
    #[must_use]
    pub fn new(
        insns: &'a InsnList,
        safe_labels: &'a FxHashSet<LabelId>,
        registries: &'a Registries,
        inputs: &'a InputClasses,
    ) -> Self {
        StackReconstructor {
            insns,
            safe_labels,
            registries,
            inputs,
            events: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Reports suspicious string conversions to `events`.
    #[must_use]
    pub fn with_events(mut self, events: &'a EventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// Overrides the recursion bound.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Reconstructs the value on top of the stack after `at`.
    ///
    /// # Errors
    ///
    /// Returns a hard failure if a member the value depends on is missing or
    /// inaccessible, if a host call throws, or if the walk nests deeper than
    /// the configured bound.
    pub fn reconstruct(
        &self,
        ctx: &ReconstructionContext,
        at: InsnId,
    ) -> Result<Option<ReconstructedValue>> {
        if ctx.depth() > self.max_depth {
            return Err(Error::RecursionLimit(self.max_depth));
        }
        let Some(insn) = self.insns.get(at) else {
            return Ok(None);
        };
        let end = self.insns.next(at);

        if let Some(value) = literal(insn) {
            let value = match ctx.receiver_type() {
                Some(ty) => value.coerce(ty),
                None => value,
            };
            return Ok(Some(ReconstructedValue {
                first: at,
                end,
                info: StackInfo::Constant(value.clone()),
                value,
            }));
        }

        match insn {
            Insn::Simple(opcode) if opcode.unary_operand().is_some() => {
                self.unary(ctx, at, *opcode)
            }
            Insn::Simple(opcode) if opcode.binary_kind().is_some() => {
                self.binary(ctx, at, *opcode)
            }
            Insn::Simple(opcode) if opcode.is_array_store() => self.array_literal(ctx, at, *opcode),
            Insn::Simple(opcode) if opcode.is_array_load() => self.array_load(ctx, at, *opcode),
            Insn::Simple(Opcode::Arraylength) => self.array_length(ctx, at),
            Insn::Int {
                opcode: Opcode::Newarray,
                operand,
            } => match array_type::component(*operand) {
                Some(component) => self.new_array(ctx, at, component),
                None => Err(malformed_error!("newarray with type code {}", operand)),
            },
            Insn::Type {
                opcode: Opcode::Anewarray,
                desc,
            } => {
                let component = Type::from_internal_name(desc)?;
                self.new_array(ctx, at, component)
            }
            Insn::Type {
                opcode: Opcode::Checkcast,
                desc,
            } => self.checkcast(ctx, at, desc),
            Insn::Field {
                opcode: Opcode::Getstatic,
                field,
            } => self.field_access(ctx, at, field, None),
            Insn::Field {
                opcode: Opcode::Getfield,
                field,
            } => {
                let owner = Type::object(field.owner.clone());
                let Some(instance) = self
                    .operand(ctx, at, Some(owner))
                    .frame(FrameKind::InstanceAccess, ctx.location())?
                else {
                    return Ok(None);
                };
                self.field_access(ctx, at, field, Some(instance))
            }
            Insn::Method { opcode, method, .. } => self.invoke(ctx, at, *opcode, method),
            Insn::InvokeDynamic {
                desc,
                bsm,
                bsm_args,
                ..
            } => match concat_kind(bsm) {
                Some(kind) => {
                    let descriptor = MethodDescriptor::parse(desc)?;
                    let Some((first, args)) = self.arguments(ctx, at, &descriptor.params)? else {
                        return Ok(None);
                    };
                    let mut strings = Vec::with_capacity(args.len());
                    for arg in &args {
                        match self.stringify(ctx, &arg.value)? {
                            Some(text) => strings.push(Value::string(text)),
                            None => return Ok(None),
                        }
                    }
                    let Some(text) = concat(kind, bsm_args, &strings) else {
                        return Ok(None);
                    };
                    let key = MemberKey::method(&bsm.owner, &bsm.name, desc.clone());
                    Ok(Some(ReconstructedValue {
                        first,
                        end,
                        info: StackInfo::StaticMethod {
                            key,
                            args: args.into_iter().map(|arg| arg.info).collect(),
                        },
                        value: Value::string(text),
                    }))
                }
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// Reconstructs the single value consumed by `at`, such as the value a
    /// `putstatic` stores. The receiver type of `ctx` is the expected type.
    ///
    /// # Errors
    ///
    /// See [`StackReconstructor::reconstruct`].
    pub fn reconstruct_operand(
        &self,
        ctx: &ReconstructionContext,
        at: InsnId,
    ) -> Result<Option<ReconstructedValue>> {
        self.operand(ctx, at, ctx.receiver_type().cloned())
    }

    /// The instruction that produced the operand consumed by `at`, skipping
    /// line numbers, frames and safe labels. `None` at the start of the body
    /// and at a jump target.
    fn previous(&self, at: InsnId) -> Option<InsnId> {
        let mut cursor = self.insns.prev(at);
        while let Some(id) = cursor {
            match self.insns.get(id)? {
                Insn::Label(label) if self.safe_labels.contains(label) => {}
                Insn::Label(_) => return None,
                Insn::LineNumber { .. } | Insn::Frame => {}
                _ => return Some(id),
            }
            cursor = self.insns.prev(id);
        }
        None
    }

    /// Reconstructs the operand directly below `at`.
    fn operand(
        &self,
        ctx: &ReconstructionContext,
        at: InsnId,
        receiver_type: Option<Type>,
    ) -> Result<Option<ReconstructedValue>> {
        match self.previous(at) {
            Some(prev) => self.reconstruct(&ctx.operand(receiver_type), prev),
            None => Ok(None),
        }
    }

    /// Reconstructs the arguments of a call at `at`, last argument first.
    /// Returns the first instruction of the argument span (or `at` without
    /// arguments) and the arguments in declaration order, coerced to their
    /// parameter types.
    fn arguments(
        &self,
        ctx: &ReconstructionContext,
        at: InsnId,
        params: &[Type],
    ) -> Result<Option<(InsnId, Vec<ReconstructedValue>)>> {
        let mut first = at;
        let mut args = Vec::with_capacity(params.len());
        for (index, param) in params.iter().enumerate().rev() {
            let Some(mut arg) = self
                .operand(ctx, first, Some(param.clone()))
                .frame(FrameKind::Argument(index), ctx.location())?
            else {
                return Ok(None);
            };
            first = arg.first;
            arg.value = arg.value.coerce(param);
            args.push(arg);
        }
        args.reverse();
        Ok(Some((first, args)))
    }

    fn unary(
        &self,
        ctx: &ReconstructionContext,
        at: InsnId,
        opcode: Opcode,
    ) -> Result<Option<ReconstructedValue>> {
        let Some(operand) = self
            .operand(ctx, at, opcode.unary_operand())
            .frame(FrameKind::Operator(opcode), ctx.location())?
        else {
            return Ok(None);
        };
        let Some(value) = ops::unary(opcode, &operand.value)? else {
            return Ok(None);
        };
        Ok(Some(ReconstructedValue {
            first: operand.first,
            end: self.insns.next(at),
            info: StackInfo::Operator {
                opcode,
                operands: vec![operand.info],
            },
            value,
        }))
    }

    fn binary(
        &self,
        ctx: &ReconstructionContext,
        at: InsnId,
        opcode: Opcode,
    ) -> Result<Option<ReconstructedValue>> {
        let Some(kind) = opcode.binary_kind() else {
            return Ok(None);
        };
        let right_type = if opcode.is_shift() {
            Type::Int
        } else {
            kind.stack_type()
        };
        let location = ctx.location();
        let Some(right) = self
            .operand(ctx, at, Some(right_type))
            .frame(FrameKind::Operator(opcode), location)?
        else {
            return Ok(None);
        };
        let Some(left) = self
            .operand(ctx, right.first, Some(kind.stack_type()))
            .frame(FrameKind::Operator(opcode), location)?
        else {
            return Ok(None);
        };
        let Some(value) = ops::binary(opcode, &left.value, &right.value)
            .frame(FrameKind::Operator(opcode), location)?
        else {
            return Ok(None);
        };
        Ok(Some(ReconstructedValue {
            first: left.first,
            end: self.insns.next(at),
            info: StackInfo::Operator {
                opcode,
                operands: vec![left.info, right.info],
            },
            value,
        }))
    }

    fn new_array(
        &self,
        ctx: &ReconstructionContext,
        at: InsnId,
        component: Type,
    ) -> Result<Option<ReconstructedValue>> {
        // An `Object[]` literal might be meant as a `String[]`. Only accept a
        // reference component the caller agrees on.
        if component.is_reference() {
            match ctx.receiver_type().and_then(Type::component) {
                Some(expected) if *expected == component => {}
                _ => return Ok(None),
            }
        }
        let opcode = if component.is_primitive() {
            Opcode::Newarray
        } else {
            Opcode::Anewarray
        };
        let Some(size) = self
            .operand(ctx, at, Some(Type::Int))
            .frame(FrameKind::Operator(opcode), ctx.location())?
        else {
            return Ok(None);
        };
        let Some(length) = size.value.as_int() else {
            return Ok(None);
        };
        if length < 0 {
            return thrown(
                opcode,
                format!("java.lang.NegativeArraySizeException: {length}"),
                ctx.location(),
            );
        }
        if length > MAX_ARRAY_LENGTH {
            return Ok(None);
        }
        let elements = vec![Value::default_for(&component); length as usize];
        let infos = elements.iter().cloned().map(StackInfo::Constant).collect();
        Ok(Some(ReconstructedValue {
            first: size.first,
            end: self.insns.next(at),
            info: StackInfo::ArrayLiteral {
                component: component.clone(),
                elements: infos,
            },
            value: Value::array(component, elements),
        }))
    }

    /// `new T[n]; dup; i; v; xastore; dup; ...` ending in the store at `at`.
    ///
    /// The array reference the first `dup` duplicated is what remains on the
    /// stack, now with the stored elements.
    fn array_literal(
        &self,
        ctx: &ReconstructionContext,
        at: InsnId,
        store: Opcode,
    ) -> Result<Option<ReconstructedValue>> {
        let element_type = match store {
            Opcode::Iastore => Some(Type::Int),
            Opcode::Lastore => Some(Type::Long),
            Opcode::Fastore => Some(Type::Float),
            Opcode::Dastore => Some(Type::Double),
            Opcode::Castore => Some(Type::Char),
            Opcode::Sastore => Some(Type::Short),
            Opcode::Aastore => ctx.receiver_type().and_then(Type::component).cloned(),
            _ => None,
        };
        let location = ctx.location();

        let mut stores = Vec::new();
        let mut cursor = at;
        let creation = loop {
            let index = stores.len();
            let Some(value) = self
                .operand(ctx, cursor, element_type.clone())
                .frame(FrameKind::ArrayElement(index), location)?
            else {
                return Ok(None);
            };
            let Some(position) = self
                .operand(ctx, value.first, Some(Type::Int))
                .frame(FrameKind::ArrayElement(index), location)?
            else {
                return Ok(None);
            };
            let Some(dup) = self.previous(position.first) else {
                return Ok(None);
            };
            if self.insns.get(dup) != Some(&Insn::Simple(Opcode::Dup)) {
                return Ok(None);
            }
            stores.push((position.value, value));
            let Some(prev) = self.previous(dup) else {
                return Ok(None);
            };
            match self.insns.get(prev) {
                Some(Insn::Simple(opcode)) if *opcode == store => cursor = prev,
                Some(Insn::Int {
                    opcode: Opcode::Newarray,
                    ..
                })
                | Some(Insn::Type {
                    opcode: Opcode::Anewarray,
                    ..
                }) => break prev,
                _ => return Ok(None),
            }
        };

        let Some(array) = self.reconstruct(ctx, creation)? else {
            return Ok(None);
        };
        let (Value::Array(created), StackInfo::ArrayLiteral { component, mut elements }) =
            (array.value, array.info)
        else {
            return Ok(None);
        };
        let mut values = created.elements.clone();
        for (position, value) in stores.into_iter().rev() {
            let Some(slot) = position
                .as_int()
                .and_then(|i| usize::try_from(i).ok())
                .filter(|i| *i < values.len())
            else {
                return thrown(store, out_of_bounds(&position, values.len()), location);
            };
            values[slot] = value.value.coerce(&component);
            elements[slot] = value.info;
        }
        Ok(Some(ReconstructedValue {
            first: array.first,
            end: self.insns.next(at),
            info: StackInfo::ArrayLiteral {
                component: component.clone(),
                elements,
            },
            value: Value::array(component, values),
        }))
    }

    fn array_load(
        &self,
        ctx: &ReconstructionContext,
        at: InsnId,
        opcode: Opcode,
    ) -> Result<Option<ReconstructedValue>> {
        let location = ctx.location();
        let Some(index) = self
            .operand(ctx, at, Some(Type::Int))
            .frame(FrameKind::Operator(opcode), location)?
        else {
            return Ok(None);
        };
        let array_type = opcode
            .array_load_component()
            .or_else(|| match opcode {
                Opcode::Aaload => ctx.receiver_type().filter(|ty| ty.is_reference()).cloned(),
                _ => None,
            })
            .map(Type::array_of);
        let Some(array) = self
            .operand(ctx, index.first, array_type)
            .frame(FrameKind::Operator(opcode), location)?
        else {
            return Ok(None);
        };
        let elements = match &array.value {
            Value::Array(array) => &array.elements,
            Value::Null => return thrown(opcode, "java.lang.NullPointerException", location),
            _ => return Ok(None),
        };
        let Some(position) = index.value.as_int() else {
            return Ok(None);
        };
        let Some(value) = usize::try_from(position).ok().and_then(|i| elements.get(i)) else {
            return thrown(opcode, out_of_bounds(&index.value, elements.len()), location);
        };
        let value = value.clone();
        Ok(Some(ReconstructedValue {
            first: array.first,
            end: self.insns.next(at),
            info: StackInfo::ArrayLoad {
                array: Box::new(array.info),
                index: Box::new(index.info),
            },
            value,
        }))
    }

    fn array_length(
        &self,
        ctx: &ReconstructionContext,
        at: InsnId,
    ) -> Result<Option<ReconstructedValue>> {
        let Some(array) = self
            .operand(ctx, at, None)
            .frame(FrameKind::Operator(Opcode::Arraylength), ctx.location())?
        else {
            return Ok(None);
        };
        let Some(length) = array.value.as_array().map(|array| array.elements.len()) else {
            return Ok(None);
        };
        Ok(Some(ReconstructedValue {
            first: array.first,
            end: self.insns.next(at),
            info: StackInfo::ArrayLength(Box::new(array.info)),
            value: Value::Int(length as i32),
        }))
    }

    fn checkcast(
        &self,
        ctx: &ReconstructionContext,
        at: InsnId,
        desc: &str,
    ) -> Result<Option<ReconstructedValue>> {
        let target = Type::from_internal_name(desc)?;
        let Some(operand) = self
            .operand(ctx, at, Some(target.clone()))
            .frame(FrameKind::Operator(Opcode::Checkcast), ctx.location())?
        else {
            return Ok(None);
        };
        // A cast that would throw is not a constant. Only final value classes
        // can be checked without a type hierarchy.
        if let (Type::Object(name), Some(runtime)) = (&target, operand.value.runtime_class()) {
            let checkable = name == crate::classfile::STRING
                || name == crate::classfile::CLASS
                || Type::unwrapped(name).is_some();
            if checkable && *name != runtime {
                return Ok(None);
            }
        }
        Ok(Some(ReconstructedValue {
            first: operand.first,
            end: self.insns.next(at),
            info: StackInfo::Operator {
                opcode: Opcode::Checkcast,
                operands: vec![operand.info],
            },
            value: operand.value,
        }))
    }

    fn field_access(
        &self,
        ctx: &ReconstructionContext,
        at: InsnId,
        field: &FieldRef,
        instance: Option<ReconstructedValue>,
    ) -> Result<Option<ReconstructedValue>> {
        let key = MemberKey::from(field);
        let ty = Type::parse(&field.desc)?;
        let receiver = instance.as_ref().map(|instance| &instance.value);
        let frame = || FrameKind::FieldAccess(key.clone());

        let value = match self.registries.reconstructor(&key) {
            Some(reconstructor) if reconstructor.accepts(receiver) => {
                let call = Call {
                    key: &key,
                    desc: &field.desc,
                    receiver,
                    args: &[],
                    loader: ctx.loader(),
                };
                reconstructor
                    .reconstruct(&call)
                    .frame(frame(), ctx.location())?
            }
            _ if instance.is_some() => {
                if ctx.is_forced() {
                    let call = Call {
                        key: &key,
                        desc: &field.desc,
                        receiver,
                        args: &[],
                        loader: ctx.loader(),
                    };
                    HostFieldReconstructor
                        .reconstruct(&call)
                        .frame(frame(), ctx.location())?
                } else {
                    None
                }
            }
            _ => self.static_field_fallback(ctx, &key, &field.desc, &ty)?,
        };
        let Some(value) = value else {
            return Ok(None);
        };

        let (first, info) = match instance {
            Some(instance) => (
                instance.first,
                StackInfo::InstanceField {
                    key,
                    instance: Box::new(instance.info),
                },
            ),
            None => (at, StackInfo::StaticField(key)),
        };
        Ok(Some(ReconstructedValue {
            first,
            end: self.insns.next(at),
            info,
            value: value.coerce(&ty),
        }))
    }

    /// Static fields without a configured strategy: input `ConstantValue`s,
    /// enum constants, and host reads in force mode.
    fn static_field_fallback(
        &self,
        ctx: &ReconstructionContext,
        key: &MemberKey,
        desc: &str,
        ty: &Type,
    ) -> Result<Option<Value>> {
        if let Some(value) = self.inputs.constant_field(&key.owner, &key.name) {
            return Ok(Some(value));
        }
        if ty.is_object(&key.owner) {
            if let Some(constant) = self.inputs.enum_constant(&key.owner, &key.name) {
                return Ok(Some(Value::Enum(constant)));
            }
            if let Some(class) = ctx.loader().and_then(|loader| loader.load_class(&key.owner)) {
                if let Some(constant) = class
                    .enum_constants()
                    .into_iter()
                    .find(|constant| constant.name == key.name)
                {
                    return Ok(Some(Value::Enum(constant)));
                }
            }
        }
        if ctx.is_forced() {
            let call = Call {
                key,
                desc,
                receiver: None,
                args: &[],
                loader: ctx.loader(),
            };
            return HostFieldReconstructor
                .reconstruct(&call)
                .frame(FrameKind::FieldAccess(key.clone()), ctx.location());
        }
        Ok(None)
    }

    fn invoke(
        &self,
        ctx: &ReconstructionContext,
        at: InsnId,
        opcode: Opcode,
        method: &MethodRef,
    ) -> Result<Option<ReconstructedValue>> {
        let key = MemberKey::from(method);
        let descriptor = MethodDescriptor::parse(&method.desc)?;
        let is_init = opcode == Opcode::Invokespecial && method.name == INIT;
        if opcode == Opcode::Invokespecial && !is_init {
            // super calls and private methods of the scanned class
            return Ok(None);
        }
        let location = ctx.location();

        let Some((args_first, args)) = self.arguments(ctx, at, &descriptor.params)? else {
            return Ok(None);
        };
        let arg_values: Vec<Value> = args.iter().map(|arg| arg.value.clone()).collect();
        let arg_infos = args.into_iter().map(|arg| arg.info);

        let mut instance = None;
        let first = if is_init {
            // new T; dup; <args>; invokespecial T.<init>
            let Some(dup) = self.previous(args_first) else {
                return Ok(None);
            };
            let Some(new) = self.previous(dup) else {
                return Ok(None);
            };
            let expected_new = Insn::type_insn(Opcode::New, method.owner.clone());
            if self.insns.get(dup) != Some(&Insn::Simple(Opcode::Dup))
                || self.insns.get(new) != Some(&expected_new)
            {
                return Ok(None);
            }
            new
        } else if opcode == Opcode::Invokestatic {
            args_first
        } else {
            let owner = Type::object(method.owner.clone());
            let Some(receiver) = self
                .operand(ctx, args_first, Some(owner))
                .frame(FrameKind::InstanceAccess, location)?
            else {
                return Ok(None);
            };
            let first = receiver.first;
            instance = Some(receiver);
            first
        };

        let receiver = instance.as_ref().map(|instance| &instance.value);
        let call = Call {
            key: &key,
            desc: &method.desc,
            receiver,
            args: &arg_values,
            loader: ctx.loader(),
        };
        let value = match self.registries.reconstructor(&key) {
            Some(reconstructor) if reconstructor.accepts(receiver) => reconstructor
                .reconstruct(&call)
                .frame(FrameKind::MethodAccess(key.clone()), location)?,
            _ => self
                .invoke_fallback(ctx, &call, &descriptor)
                .frame(FrameKind::MethodAccess(key.clone()), location)?,
        };
        let Some(value) = value else {
            return Ok(None);
        };
        let value = if is_init {
            value
        } else {
            value.coerce(&descriptor.ret)
        };

        let args: Vec<StackInfo> = arg_infos.collect();
        let info = match instance {
            Some(instance) => StackInfo::InstanceMethod {
                key,
                instance: Box::new(instance.info),
                args,
            },
            None if is_init => StackInfo::Constructor { key, args },
            None => StackInfo::StaticMethod { key, args },
        };
        Ok(Some(ReconstructedValue {
            first,
            end: self.insns.next(at),
            info,
            value,
        }))
    }

    /// Calls without a configured strategy.
    fn invoke_fallback(
        &self,
        ctx: &ReconstructionContext,
        call: &Call<'_>,
        descriptor: &MethodDescriptor,
    ) -> Result<Option<Value>> {
        let key = call.key;
        let desc = key.descriptor().unwrap_or_default();

        if let Some(receiver) = call.receiver {
            if key.name == "toString" && desc == TO_STRING_DESC {
                if receiver.is_null() {
                    return Err(call.fail("java.lang.NullPointerException"));
                }
                return Ok(self.stringify(ctx, receiver)?.map(Value::string));
            }
            if let Value::Enum(constant) = receiver {
                match (key.name.as_str(), desc) {
                    ("name", TO_STRING_DESC) => return Ok(Some(Value::string(&constant.name))),
                    ("ordinal", "()I") => return Ok(Some(Value::Int(constant.ordinal))),
                    ("getDeclaringClass", "()Ljava/lang/Class;") => {
                        return Ok(Some(Value::Class(Type::object(constant.owner.clone()))))
                    }
                    _ => {}
                }
            }
            if key.name == "hashCode" && desc == "()I" {
                let trusted = receiver
                    .runtime_class()
                    .is_some_and(|class| self.registries.is_constant_type(&class));
                if trusted || ctx.is_forced() {
                    return Ok(receiver.java_hash_code().map(Value::Int));
                }
                return Ok(None);
            }
        }

        let trusted = self.registries.is_constant_type(&key.owner)
            && call
                .receiver
                .and_then(Value::runtime_class)
                .map_or(true, |class| self.registries.is_constant_type(&class));
        if trusted {
            let loadable = call
                .loader
                .is_some_and(|loader| loader.load_class(&key.owner).is_some());
            if loadable || matches!(call.receiver, Some(Value::Object(_))) {
                return HostMethodReconstructor::new().reconstruct(call);
            }
            return Ok(None);
        }

        if ctx.is_forced() && (descriptor.ret != Type::Void || key.name == INIT) {
            return HostMethodReconstructor::new().reconstruct(call);
        }
        Ok(None)
    }

    /// `String.valueOf(value)`, or `None` if the result is not deterministic.
    ///
    /// Identity-based results (`Type@1b6d3586`) are only accepted for trusted
    /// types and in force mode, and flagged either way.
    fn stringify(&self, ctx: &ReconstructionContext, value: &Value) -> Result<Option<String>> {
        let (text, class) = match value {
            Value::Enum(constant) => {
                if self.inputs.contains(&constant.owner) {
                    if self
                        .inputs
                        .declares_method(&constant.owner, "toString", TO_STRING_DESC)
                    {
                        return Ok(None);
                    }
                    return Ok(Some(constant.name.clone()));
                }
                let Some(class) = ctx.loader().and_then(|loader| loader.load_class(&constant.owner))
                else {
                    return Ok(None);
                };
                match class.invoke_virtual(value, "toString", TO_STRING_DESC, &[])? {
                    Value::String(text) => return Ok(Some(text.to_string())),
                    _ => return Ok(None),
                }
            }
            Value::Array(_) | Value::Object(_) => {
                let Some(text) = value.java_string() else {
                    return Ok(None);
                };
                (text, value.runtime_class().unwrap_or_default())
            }
            other => return Ok(other.java_string()),
        };

        let identity = matches!(value, Value::Array(_))
            || format::is_identity_string(&text, &class);
        if !identity {
            return Ok(Some(text));
        }
        let trusted = self.registries.is_constant_type(&class) || ctx.is_forced();
        if let Some(events) = self.events {
            let verdict = if trusted { "kept" } else { "rejected" };
            events
                .record(EventKind::NonDeterministicString)
                .at(ctx.location())
                .message(format!("{text} looks identity-based ({verdict})"));
        }
        Ok(trusted.then_some(text))
    }
}

/// A JVM exception raised by `opcode` itself.
fn thrown<T>(opcode: Opcode, message: impl Into<String>, location: &BytecodeLocation) -> Result<T> {
    Err(Error::invocation(opcode.mnemonic(), message)).frame(FrameKind::Operator(opcode), location)
}

fn out_of_bounds(index: &Value, length: usize) -> String {
    format!("java.lang.ArrayIndexOutOfBoundsException: Index {index} out of bounds for length {length}")
}

/// The value pushed by a literal instruction.
fn literal(insn: &Insn) -> Option<Value> {
    let value = match insn {
        Insn::Simple(opcode) => match opcode {
            Opcode::AconstNull => Value::Null,
            Opcode::IconstM1 => Value::Int(-1),
            Opcode::Iconst0 => Value::Int(0),
            Opcode::Iconst1 => Value::Int(1),
            Opcode::Iconst2 => Value::Int(2),
            Opcode::Iconst3 => Value::Int(3),
            Opcode::Iconst4 => Value::Int(4),
            Opcode::Iconst5 => Value::Int(5),
            Opcode::Lconst0 => Value::Long(0),
            Opcode::Lconst1 => Value::Long(1),
            Opcode::Fconst0 => Value::Float(0.0),
            Opcode::Fconst1 => Value::Float(1.0),
            Opcode::Fconst2 => Value::Float(2.0),
            Opcode::Dconst0 => Value::Double(0.0),
            Opcode::Dconst1 => Value::Double(1.0),
            _ => return None,
        },
        Insn::Int {
            opcode: Opcode::Bipush | Opcode::Sipush,
            operand,
        } => Value::Int(*operand),
        Insn::Ldc(constant) => match constant {
            Constant::Int(v) => Value::Int(*v),
            Constant::Float(v) => Value::Float(*v),
            Constant::Long(v) => Value::Long(*v),
            Constant::Double(v) => Value::Double(*v),
            Constant::String(s) => Value::string(s),
            Constant::Type(ty) => Value::Class(ty.clone()),
            Constant::Handle(_) => return None,
        },
        _ => return None,
    };
    Some(value)
}
