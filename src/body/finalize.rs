use std::collections::BTreeMap;

use crate::{
    assembly::{OpCode, OperandKind},
    body::{
        HandlerKind, InstructionKind, InstructionStream, LabelHandle, LabelTable, LabelTarget,
        Operand, TokenOperand, VarRef,
    },
    metadata::{flags::ExceptionHandlerFlags, token::Token},
    references::{MemberRefId, MethodRefSignature, TypeRefId},
    Error, Result,
};

/// Turns the symbolic operands of a body into metadata tokens.
///
/// Implemented by the module assembler; every call may resolve (and memoize) the underlying
/// reference on first use.
pub trait OperandResolver {
    /// Token of a type operand.
    ///
    /// # Errors
    /// Propagates resolution failures of the type.
    fn type_token(&mut self, ty: TypeRefId) -> Result<Token>;

    /// Token of a method operand.
    ///
    /// # Errors
    /// Propagates resolution failures of the method.
    fn method_token(&mut self, method: MemberRefId) -> Result<Token>;

    /// Token of a field operand.
    ///
    /// # Errors
    /// Propagates resolution failures of the field.
    fn field_token(&mut self, field: MemberRefId) -> Result<Token>;

    /// User-string token of an `ldstr` literal.
    ///
    /// # Errors
    /// Implementations may reject literals they cannot store.
    fn string_token(&mut self, value: &str) -> Result<Token>;

    /// StandAloneSig token of a `calli` call-site signature.
    ///
    /// # Errors
    /// Propagates resolution failures of the signature types.
    fn signature_token(&mut self, signature: &MethodRefSignature) -> Result<Token>;
}

/// What the finalizer needs to know about the method that owns a body.
#[derive(Debug, Clone, Default)]
pub struct BodyLayout {
    /// Parameter names in declaration order (`None` for unnamed parameters)
    pub params: Vec<Option<String>>,
    /// Instance method; named arguments start at slot 1
    pub has_this: bool,
    /// Max stack used when the body does not declare `.maxstack`
    pub default_max_stack: u16,
}

/// One exception handling clause with resolved offsets (II.25.4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionClause {
    /// Clause kind
    pub flags: ExceptionHandlerFlags,
    /// Start of the protected range
    pub try_offset: u32,
    /// Length of the protected range
    pub try_length: u32,
    /// Start of the handler
    pub handler_offset: u32,
    /// Length of the handler
    pub handler_length: u32,
    /// Caught type, for `catch` clauses
    pub class_token: Option<Token>,
    /// Start of the filter code, for `filter` clauses
    pub filter_offset: Option<u32>,
}

/// A position in the encoded body carrying one or more labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLabel {
    /// Byte offset from the start of the body
    pub offset: u32,
    /// Every label that landed at this offset
    pub names: Vec<String>,
}

/// A fully encoded method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedBody {
    /// CIL bytes
    pub code: Vec<u8>,
    /// Evaluation stack bound
    pub max_stack: u16,
    /// Exception clauses in region order
    pub clauses: Vec<ExceptionClause>,
    /// `(offset, line)` pairs where the source line changes
    pub lines: Vec<(u32, u32)>,
    /// Binary labels in offset order; labels at the same offset share one entry
    pub labels: Vec<BinaryLabel>,
}

impl FinalizedBody {
    /// Offset of the label called `name`.
    #[must_use]
    pub fn label_offset(&self, name: &str) -> Option<u32> {
        self.labels
            .iter()
            .find(|label| label.names.iter().any(|candidate| candidate == name))
            .map(|label| label.offset)
    }
}

/// Encodes a complete instruction stream.
///
/// Labels are resolved first: every named label must have been defined in the body, and
/// raw offsets must fall on an instruction boundary (or the end of the body). Labels at the
/// same offset collapse into one [`BinaryLabel`]. The instructions are then encoded in order
/// with branch targets relative to the next instruction (`switch` targets relative to the end
/// of the whole switch) and member, type and string operands turned into tokens through
/// `resolver`.
///
/// # Errors
/// Returns [`crate::Error::UndefinedLabel`] for a label that was never defined,
/// [`crate::Error::InvalidBranch`] for a short branch whose target does not fit, and
/// [`crate::Error::MalformedBody`] for an unterminated or inverted exception region and
/// [`crate::Error::InvalidReference`] for a label handle that does not belong to this body.
/// Resolution failures from `resolver` are propagated.
pub fn finalize_body(
    stream: &InstructionStream,
    layout: &BodyLayout,
    resolver: &mut dyn OperandResolver,
) -> Result<FinalizedBody> {
    if stream.regions().has_open() {
        return Err(Error::MalformedBody("unterminated try block".to_string()));
    }

    let instructions = stream.instructions();
    let mut offsets = Vec::with_capacity(instructions.len() + 1);
    let mut offset = 0u32;
    for instruction in instructions {
        offsets.push(offset);
        offset += instruction.size();
    }
    offsets.push(offset);

    let targets = resolve_labels(stream.labels(), &offsets)?;
    let labels = collapse_labels(stream.labels(), &targets);

    let mut encoder = BodyEncoder {
        code: Vec::with_capacity(offset as usize),
        targets: &targets,
        stream,
        layout,
        resolver: &mut *resolver,
    };
    let mut lines: Vec<(u32, u32)> = Vec::new();
    for (index, instruction) in instructions.iter().enumerate() {
        if let Some(line) = instruction.line {
            if lines.last().map(|(_, last)| *last) != Some(line) {
                lines.push((offsets[index], line));
            }
        }
        match &instruction.kind {
            InstructionKind::EmitByte(value) => encoder.code.push(*value),
            InstructionKind::Op(opcode, operand) => {
                opcode.encode(&mut encoder.code);
                encoder.operand(*opcode, operand, offsets[index + 1])?;
            }
        }
    }

    let BodyEncoder { code, .. } = encoder;
    let clauses = encode_clauses(stream, &targets, resolver)?;
    Ok(FinalizedBody {
        code,
        max_stack: stream.max_stack().unwrap_or(layout.default_max_stack),
        clauses,
        lines,
        labels,
    })
}

/// Byte offset of every label, indexed by handle.
fn resolve_labels(labels: &LabelTable, offsets: &[u32]) -> Result<Vec<u32>> {
    labels
        .iter()
        .map(|(_, key, target)| match target {
            Some(LabelTarget::Instruction(index)) => offsets
                .get(index)
                .copied()
                .ok_or_else(|| Error::UndefinedLabel(key.to_string())),
            Some(LabelTarget::Offset(offset)) => {
                if offsets.binary_search(&offset).is_ok() {
                    Ok(offset)
                } else {
                    Err(Error::InvalidReference(format!(
                        "label {key} is not on an instruction boundary"
                    )))
                }
            }
            None => Err(Error::UndefinedLabel(key.to_string())),
        })
        .collect()
}

/// Offset of `handle`, which must come from the label table `targets` was resolved from.
fn target_offset(targets: &[u32], handle: LabelHandle) -> Result<u32> {
    targets.get(handle.index()).copied().ok_or_else(|| {
        Error::InvalidReference(format!(
            "label handle {} does not belong to this method body",
            handle.index()
        ))
    })
}

fn collapse_labels(labels: &LabelTable, targets: &[u32]) -> Vec<BinaryLabel> {
    let mut by_offset: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for ((_, key, _), offset) in labels.iter().zip(targets) {
        by_offset.entry(*offset).or_default().push(key.to_string());
    }
    by_offset
        .into_iter()
        .map(|(offset, names)| BinaryLabel { offset, names })
        .collect()
}

/// Exception clauses of every region, in the order the regions were completed.
fn encode_clauses(
    stream: &InstructionStream,
    targets: &[u32],
    resolver: &mut dyn OperandResolver,
) -> Result<Vec<ExceptionClause>> {
    let mut clauses = Vec::new();
    for block in stream.regions().blocks() {
        let try_offset = target_offset(targets, block.try_start)?;
        let try_end = target_offset(targets, block.try_end)?;
        if try_end < try_offset {
            return Err(Error::MalformedBody(format!(
                "try range ends at 0x{try_end:x} before it starts at 0x{try_offset:x}"
            )));
        }

        for clause in &block.clauses {
            let handler_offset = target_offset(targets, clause.handler_start)?;
            let handler_end = target_offset(targets, clause.handler_end)?;
            if handler_end < handler_offset {
                return Err(Error::MalformedBody(format!(
                    "handler ends at 0x{handler_end:x} before it starts at 0x{handler_offset:x}"
                )));
            }

            let (flags, class_token, filter_offset) = match clause.kind {
                HandlerKind::Catch(ty) => (
                    ExceptionHandlerFlags::EXCEPTION,
                    Some(resolver.type_token(ty)?),
                    None,
                ),
                HandlerKind::Filter(filter) => (
                    ExceptionHandlerFlags::FILTER,
                    None,
                    Some(target_offset(targets, filter)?),
                ),
                HandlerKind::Finally => (ExceptionHandlerFlags::FINALLY, None, None),
                HandlerKind::Fault => (ExceptionHandlerFlags::FAULT, None, None),
            };

            clauses.push(ExceptionClause {
                flags,
                try_offset,
                try_length: try_end - try_offset,
                handler_offset,
                handler_length: handler_end - handler_offset,
                class_token,
                filter_offset,
            });
        }
    }
    Ok(clauses)
}

struct BodyEncoder<'a, 'r> {
    code: Vec<u8>,
    targets: &'a [u32],
    stream: &'a InstructionStream,
    layout: &'a BodyLayout,
    resolver: &'a mut (dyn OperandResolver + 'r),
}

impl BodyEncoder<'_, '_> {
    fn operand(&mut self, opcode: &'static OpCode, operand: &Operand, next: u32) -> Result<()> {
        let invalid = |message: String| Error::InvalidOperand {
            mnemonic: opcode.mnemonic,
            message,
        };

        match (opcode.operand, operand) {
            (OperandKind::None, _) => {}
            (OperandKind::ShortInt, Operand::Int(value)) => {
                let value = i8::try_from(*value)
                    .map_err(|_| invalid(format!("{value} does not fit in int8")))?;
                self.code.push(value as u8);
            }
            (OperandKind::UInt8, Operand::Int(value)) => {
                let value = u8::try_from(*value)
                    .map_err(|_| invalid(format!("{value} does not fit in uint8")))?;
                self.code.push(value);
            }
            (OperandKind::Int32, Operand::Int(value)) => {
                // ldc.i4 0xFFFFFFFF is accepted as -1
                let bits = if let Ok(signed) = i32::try_from(*value) {
                    signed as u32
                } else {
                    u32::try_from(*value)
                        .map_err(|_| invalid(format!("{value} does not fit in int32")))?
                };
                self.code.extend_from_slice(&bits.to_le_bytes());
            }
            (OperandKind::Int64, Operand::Int(value)) => {
                self.code.extend_from_slice(&value.to_le_bytes());
            }
            (OperandKind::Float32, Operand::Real(value)) => {
                self.code.extend_from_slice(&(*value as f32).to_le_bytes());
            }
            (OperandKind::Float32, Operand::Int(value)) => {
                self.code.extend_from_slice(&(*value as f32).to_le_bytes());
            }
            (OperandKind::Float64, Operand::Real(value)) => {
                self.code.extend_from_slice(&value.to_le_bytes());
            }
            (OperandKind::Float64, Operand::Int(value)) => {
                self.code.extend_from_slice(&(*value as f64).to_le_bytes());
            }
            (OperandKind::ShortArg | OperandKind::Arg, _) => {
                let index = self.argument(operand).map_err(invalid)?;
                self.slot(opcode.operand == OperandKind::ShortArg, index)
                    .map_err(invalid)?;
            }
            (OperandKind::ShortLocal | OperandKind::Local, _) => {
                let index = self.local(operand).map_err(invalid)?;
                self.slot(opcode.operand == OperandKind::ShortLocal, index)
                    .map_err(invalid)?;
            }
            (OperandKind::ShortBranch, Operand::Label(target)) => {
                let relative = i64::from(target_offset(self.targets, *target)?) - i64::from(next);
                let relative = i8::try_from(relative).map_err(|_| Error::InvalidBranch {
                    mnemonic: opcode.mnemonic,
                    offset: relative,
                })?;
                self.code.push(relative as u8);
            }
            (OperandKind::Branch, Operand::Label(target)) => {
                let relative = i64::from(target_offset(self.targets, *target)?) - i64::from(next);
                self.code.extend_from_slice(&(relative as i32).to_le_bytes());
            }
            (OperandKind::Switch, Operand::Switch(targets)) => {
                self.code
                    .extend_from_slice(&(targets.len() as u32).to_le_bytes());
                for target in targets {
                    let relative =
                        i64::from(target_offset(self.targets, *target)?) - i64::from(next);
                    self.code.extend_from_slice(&(relative as i32).to_le_bytes());
                }
            }
            (OperandKind::Method, Operand::Method(method)) => {
                let token = self.resolver.method_token(*method)?;
                self.token(token);
            }
            (OperandKind::Field, Operand::Field(field)) => {
                let token = self.resolver.field_token(*field)?;
                self.token(token);
            }
            (OperandKind::Type, Operand::Type(ty)) => {
                let token = self.resolver.type_token(*ty)?;
                self.token(token);
            }
            (OperandKind::Token, Operand::Token(target)) => {
                let token = match target {
                    TokenOperand::Type(ty) => self.resolver.type_token(*ty)?,
                    TokenOperand::Method(method) => self.resolver.method_token(*method)?,
                    TokenOperand::Field(field) => self.resolver.field_token(*field)?,
                };
                self.token(token);
            }
            (OperandKind::String, Operand::String(value)) => {
                let token = self.resolver.string_token(value)?;
                self.token(token);
            }
            (OperandKind::Signature, Operand::Signature(signature)) => {
                let token = self.resolver.signature_token(signature)?;
                self.token(token);
            }
            (kind, operand) => {
                return Err(invalid(format!(
                    "expected {kind:?} operand, found {operand:?}"
                )))
            }
        }
        Ok(())
    }

    fn token(&mut self, token: Token) {
        self.code.extend_from_slice(&token.value().to_le_bytes());
    }

    fn slot(&mut self, short: bool, index: u16) -> std::result::Result<(), String> {
        if short {
            let index = u8::try_from(index).map_err(|_| format!("slot {index} needs the long form"))?;
            self.code.push(index);
        } else {
            self.code.extend_from_slice(&index.to_le_bytes());
        }
        Ok(())
    }

    fn argument(&self, operand: &Operand) -> std::result::Result<u16, String> {
        match operand {
            Operand::Int(value) => u16::try_from(*value).map_err(|_| format!("bad argument {value}")),
            Operand::Arg(VarRef::Index(index)) => Ok(*index),
            Operand::Arg(VarRef::Name(name)) => {
                let position = self
                    .layout
                    .params
                    .iter()
                    .position(|param| param.as_deref() == Some(name.as_str()))
                    .ok_or_else(|| format!("unknown argument {name}"))?;
                Ok(position as u16 + u16::from(self.layout.has_this))
            }
            other => Err(format!("expected argument, found {other:?}")),
        }
    }

    fn local(&self, operand: &Operand) -> std::result::Result<u16, String> {
        match operand {
            Operand::Int(value) => u16::try_from(*value).map_err(|_| format!("bad local {value}")),
            Operand::Local(VarRef::Index(index)) => Ok(*index),
            Operand::Local(VarRef::Name(name)) => self
                .stream
                .local_index(name)
                .ok_or_else(|| format!("unknown local {name}")),
            other => Err(format!("expected local, found {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        body::{HandlerClause, TryBlock},
        metadata::tables::TableId,
        references::{PrimitiveType, TypeReferences},
    };

    struct FixedTokens;

    impl OperandResolver for FixedTokens {
        fn type_token(&mut self, _: TypeRefId) -> Result<Token> {
            Ok(Token::from_parts(TableId::TypeRef, 1))
        }
        fn method_token(&mut self, _: MemberRefId) -> Result<Token> {
            Ok(Token::from_parts(TableId::MethodDef, 2))
        }
        fn field_token(&mut self, _: MemberRefId) -> Result<Token> {
            Ok(Token::from_parts(TableId::Field, 3))
        }
        fn string_token(&mut self, _: &str) -> Result<Token> {
            Ok(Token::user_string(1))
        }
        fn signature_token(&mut self, _: &MethodRefSignature) -> Result<Token> {
            Ok(Token::from_parts(TableId::StandAloneSig, 1))
        }
    }

    fn layout() -> BodyLayout {
        BodyLayout {
            params: vec![Some("a".into()), Some("b".into())],
            has_this: true,
            default_max_stack: 8,
        }
    }

    #[test]
    fn test_forward_branch_and_shared_label() {
        let mut body = InstructionStream::new();
        let target = body.label("L");
        body.emit("br.s", Operand::Label(target)).unwrap();
        body.emit("nop", Operand::None).unwrap();
        body.define_label("L").unwrap();
        body.define_label("M").unwrap();
        body.emit("ret", Operand::None).unwrap();

        let finalized = finalize_body(&body, &layout(), &mut FixedTokens).unwrap();
        assert_eq!(finalized.code, vec![0x2B, 0x01, 0x00, 0x2A]);
        assert_eq!(finalized.label_offset("L"), Some(3));
        assert_eq!(finalized.labels.len(), 1);
        assert_eq!(finalized.labels[0].names, vec!["L".to_string(), "M".to_string()]);
        assert_eq!(finalized.max_stack, 8);
    }

    #[test]
    fn test_backward_long_branch() {
        let mut body = InstructionStream::new();
        body.define_label("TOP").unwrap();
        body.emit("nop", Operand::None).unwrap();
        let top = body.label("TOP");
        body.emit("br", Operand::Label(top)).unwrap();

        let finalized = finalize_body(&body, &layout(), &mut FixedTokens).unwrap();
        assert_eq!(finalized.code, vec![0x00, 0x38, 0xFA, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_undefined_label() {
        let mut body = InstructionStream::new();
        let missing = body.label("NOWHERE");
        body.emit("br", Operand::Label(missing)).unwrap();
        assert_eq!(
            finalize_body(&body, &layout(), &mut FixedTokens),
            Err(Error::UndefinedLabel("NOWHERE".to_string()))
        );
    }

    #[test]
    fn test_short_branch_out_of_range() {
        let mut body = InstructionStream::new();
        let far = body.label("FAR");
        body.emit("br.s", Operand::Label(far)).unwrap();
        for _ in 0..200 {
            body.emit("nop", Operand::None).unwrap();
        }
        body.define_label("FAR").unwrap();
        body.emit("ret", Operand::None).unwrap();
        assert_eq!(
            finalize_body(&body, &layout(), &mut FixedTokens),
            Err(Error::InvalidBranch {
                mnemonic: "br.s",
                offset: 200
            })
        );
    }

    #[test]
    fn test_switch_targets_relative_to_end() {
        let mut body = InstructionStream::new();
        let a = body.label("A");
        let b = body.label("B");
        body.emit("switch", Operand::Switch(vec![a, b])).unwrap();
        body.define_label("A").unwrap();
        body.emit("nop", Operand::None).unwrap();
        body.define_label("B").unwrap();
        body.emit("ret", Operand::None).unwrap();

        let finalized = finalize_body(&body, &layout(), &mut FixedTokens).unwrap();
        assert_eq!(
            finalized.code,
            vec![0x45, 2, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0x00, 0x2A]
        );
    }

    #[test]
    fn test_named_arguments_and_locals() {
        let mut types = TypeReferences::new();
        let int32 = types.primitive(PrimitiveType::I4);
        let mut body = InstructionStream::new();
        body.add_local(Some("tmp"), int32);
        body.emit("ldarg.s", Operand::Arg(VarRef::Name("b".into()))).unwrap();
        body.emit("stloc.s", Operand::Local(VarRef::Name("tmp".into()))).unwrap();
        body.emit("ldarg", Operand::Int(0)).unwrap();
        body.emit("pop", Operand::None).unwrap();

        let finalized = finalize_body(&body, &layout(), &mut FixedTokens).unwrap();
        assert_eq!(
            finalized.code,
            vec![0x0E, 0x02, 0x13, 0x00, 0xFE, 0x09, 0x00, 0x00, 0x26]
        );

        let mut bad = InstructionStream::new();
        bad.emit("ldarg.s", Operand::Arg(VarRef::Name("zz".into()))).unwrap();
        assert!(matches!(
            finalize_body(&bad, &layout(), &mut FixedTokens),
            Err(Error::InvalidOperand { mnemonic: "ldarg.s", .. })
        ));
    }

    #[test]
    fn test_tokens_and_lines() {
        let mut types = TypeReferences::new();
        let object = types.primitive(PrimitiveType::Object);
        let mut body = InstructionStream::new();
        body.set_line(10);
        body.emit("ldstr", Operand::String("hi".into())).unwrap();
        body.emit("box", Operand::Type(object)).unwrap();
        body.set_line(11);
        body.emit("ret", Operand::None).unwrap();

        let finalized = finalize_body(&body, &layout(), &mut FixedTokens).unwrap();
        assert_eq!(&finalized.code[..5], &[0x72, 0x01, 0x00, 0x00, 0x70]);
        assert_eq!(&finalized.code[5..10], &[0x8C, 0x01, 0x00, 0x00, 0x01]);
        assert_eq!(finalized.lines, vec![(0, 10), (10, 11)]);
    }

    #[test]
    fn test_exception_clauses() {
        let mut types = TypeReferences::new();
        let exception = types.local("E");
        let mut body = InstructionStream::new();
        let try_start = body.label("TS");
        let try_end = body.label("TE");
        let handler_end = body.label("HE");

        body.define_label("TS").unwrap();
        body.emit("nop", Operand::None).unwrap();
        body.emit("leave.s", Operand::Label(handler_end)).unwrap();
        body.define_label("TE").unwrap();
        body.emit("pop", Operand::None).unwrap();
        body.emit("leave.s", Operand::Label(handler_end)).unwrap();
        body.define_label("HE").unwrap();
        body.emit("ret", Operand::None).unwrap();
        body.add_try_block(TryBlock {
            try_start,
            try_end,
            clauses: vec![HandlerClause {
                kind: HandlerKind::Catch(exception),
                handler_start: try_end,
                handler_end,
            }],
        });

        let finalized = finalize_body(&body, &layout(), &mut FixedTokens).unwrap();
        assert_eq!(
            finalized.clauses,
            vec![ExceptionClause {
                flags: ExceptionHandlerFlags::EXCEPTION,
                try_offset: 0,
                try_length: 3,
                handler_offset: 3,
                handler_length: 3,
                class_token: Some(Token::from_parts(TableId::TypeRef, 1)),
                filter_offset: None,
            }]
        );
    }

    #[test]
    fn test_label_from_another_body() {
        let mut first = InstructionStream::new();
        first.label("A");
        let foreign = first.label("B");

        let mut second = InstructionStream::new();
        second.emit("br.s", Operand::Label(foreign)).unwrap();
        second.emit("ret", Operand::None).unwrap();
        assert!(matches!(
            finalize_body(&second, &layout(), &mut FixedTokens),
            Err(Error::InvalidReference(_))
        ));

        let mut third = InstructionStream::new();
        third.emit("switch", Operand::Switch(vec![foreign])).unwrap();
        assert!(matches!(
            finalize_body(&third, &layout(), &mut FixedTokens),
            Err(Error::InvalidReference(_))
        ));
    }

    #[test]
    fn test_offset_labels_must_hit_boundaries() {
        let mut body = InstructionStream::new();
        let good = body.offset_label(2);
        body.emit("br.s", Operand::Label(good)).unwrap();
        body.emit("ret", Operand::None).unwrap();
        assert!(finalize_body(&body, &layout(), &mut FixedTokens).is_ok());

        let mut body = InstructionStream::new();
        let bad = body.offset_label(1);
        body.emit("br.s", Operand::Label(bad)).unwrap();
        assert!(matches!(
            finalize_body(&body, &layout(), &mut FixedTokens),
            Err(Error::InvalidReference(_))
        ));
    }
}
