use crate::{
    assembly::{OpCode, OperandKind},
    body::{
        exceptions::{ExceptionRegions, TryBlock},
        labels::{LabelHandle, LabelKey, LabelTable},
    },
    references::{MemberRefId, MethodRefSignature, TypeRefId},
    Error, Result,
};

/// An argument or local mentioned by name or by raw index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarRef {
    /// Raw slot number as written (`ldarg 0` is `this` in instance methods)
    Index(u16),
    /// Declared name
    Name(String),
}

/// `ldtoken` operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOperand {
    /// A type
    Type(TypeRefId),
    /// A method
    Method(MemberRefId),
    /// A field
    Field(MemberRefId),
}

/// The symbolic operand of one instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// Integer immediate
    Int(i64),
    /// Floating point immediate
    Real(f64),
    /// Branch target
    Label(LabelHandle),
    /// `switch` targets
    Switch(Vec<LabelHandle>),
    /// Type operand
    Type(TypeRefId),
    /// Method operand
    Method(MemberRefId),
    /// Field operand
    Field(MemberRefId),
    /// `ldtoken` operand
    Token(TokenOperand),
    /// `ldstr` literal
    String(String),
    /// `calli` call-site signature; the name is ignored
    Signature(MethodRefSignature),
    /// Local variable
    Local(VarRef),
    /// Argument
    Arg(VarRef),
}

impl Operand {
    fn fits(&self, kind: OperandKind) -> bool {
        match kind {
            OperandKind::None => matches!(self, Operand::None),
            OperandKind::ShortInt | OperandKind::UInt8 | OperandKind::Int32 | OperandKind::Int64 => {
                matches!(self, Operand::Int(_))
            }
            OperandKind::Float32 | OperandKind::Float64 => {
                matches!(self, Operand::Real(_) | Operand::Int(_))
            }
            OperandKind::ShortArg | OperandKind::Arg => {
                matches!(self, Operand::Arg(_) | Operand::Int(_))
            }
            OperandKind::ShortLocal | OperandKind::Local => {
                matches!(self, Operand::Local(_) | Operand::Int(_))
            }
            OperandKind::ShortBranch | OperandKind::Branch => matches!(self, Operand::Label(_)),
            OperandKind::Switch => matches!(self, Operand::Switch(_)),
            OperandKind::Method => matches!(self, Operand::Method(_)),
            OperandKind::Field => matches!(self, Operand::Field(_)),
            OperandKind::Type => matches!(self, Operand::Type(_)),
            OperandKind::Token => matches!(self, Operand::Token(_)),
            OperandKind::String => matches!(self, Operand::String(_)),
            OperandKind::Signature => matches!(self, Operand::Signature(_)),
        }
    }
}

/// What one stream entry emits.
#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    /// An opcode with its operand
    Op(&'static OpCode, Operand),
    /// `.emitbyte`
    EmitByte(u8),
}

/// One entry of the instruction stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// What the entry emits
    pub kind: InstructionKind,
    /// Source line in effect when the entry was appended
    pub line: Option<u32>,
}

impl Instruction {
    /// Encoded size in bytes.
    #[must_use]
    pub fn size(&self) -> u32 {
        match &self.kind {
            InstructionKind::EmitByte(_) => 1,
            InstructionKind::Op(opcode, Operand::Switch(targets)) => {
                opcode.opcode_size() + 4 + 4 * targets.len() as u32
            }
            InstructionKind::Op(opcode, _) => opcode.opcode_size() + opcode.operand.size(),
        }
    }
}

/// A declared local variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    /// Name, if the declaration gave one
    pub name: Option<String>,
    /// Type of the slot
    pub local_type: TypeRefId,
}

/// The ordered instructions, labels, locals and exception regions of one method body.
///
/// The stream only records symbolic operands. Nothing is resolved until
/// [`crate::body::finalize_body`] runs over the complete stream.
///
/// # Examples
///
/// ```rust
/// use cilasm::body::{InstructionStream, Operand};
///
/// let mut body = InstructionStream::new();
/// let end = body.label("END");
/// body.emit("ldarg.0", Operand::None)?;
/// body.emit("brfalse.s", Operand::Label(end))?;
/// body.emit("nop", Operand::None)?;
/// body.define_label("END")?;
/// body.emit("ret", Operand::None)?;
///
/// assert_eq!(body.len(), 4);
/// assert!(body.labels().undefined().is_empty());
/// # Ok::<(), cilasm::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct InstructionStream {
    instructions: Vec<Instruction>,
    labels: LabelTable,
    regions: ExceptionRegions,
    locals: Vec<LocalVariable>,
    init_locals: bool,
    max_stack: Option<u16>,
    current_line: Option<u32>,
}

impl InstructionStream {
    /// Creates an empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Checks whether no instruction was appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Entries in order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The label table.
    #[must_use]
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// The exception regions.
    #[must_use]
    pub fn regions(&self) -> &ExceptionRegions {
        &self.regions
    }

    /// Declared locals in slot order.
    #[must_use]
    pub fn locals(&self) -> &[LocalVariable] {
        &self.locals
    }

    /// `.locals init`
    #[must_use]
    pub fn init_locals(&self) -> bool {
        self.init_locals
    }

    /// `.maxstack`, if given.
    #[must_use]
    pub fn max_stack(&self) -> Option<u16> {
        self.max_stack
    }

    /// Appends `mnemonic` with `operand`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidMnemonic`] for an unknown mnemonic and
    /// [`crate::Error::InvalidOperand`] if the operand does not fit the opcode.
    pub fn emit(&mut self, mnemonic: &str, operand: Operand) -> Result<()> {
        let opcode = OpCode::from_mnemonic(mnemonic)
            .ok_or_else(|| Error::InvalidMnemonic(mnemonic.to_string()))?;
        self.emit_op(opcode, operand)
    }

    /// Appends `opcode` with `operand`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperand`] if the operand does not fit the opcode.
    pub fn emit_op(&mut self, opcode: &'static OpCode, operand: Operand) -> Result<()> {
        if !operand.fits(opcode.operand) {
            return Err(Error::InvalidOperand {
                mnemonic: opcode.mnemonic,
                message: format!("expected {:?} operand, found {operand:?}", opcode.operand),
            });
        }
        self.instructions.push(Instruction {
            kind: InstructionKind::Op(opcode, operand),
            line: self.current_line,
        });
        Ok(())
    }

    /// Appends a raw byte (`.emitbyte`).
    pub fn emit_byte(&mut self, value: u8) {
        self.instructions.push(Instruction {
            kind: InstructionKind::EmitByte(value),
            line: self.current_line,
        });
    }

    /// Mentions the named label `name`, possibly before its definition.
    pub fn label(&mut self, name: &str) -> LabelHandle {
        self.labels.reference(LabelKey::Name(name.to_string()))
    }

    /// Mentions the label at raw byte offset `offset`.
    pub fn offset_label(&mut self, offset: u32) -> LabelHandle {
        self.labels.reference(LabelKey::Offset(offset))
    }

    /// Returns a label at the current end of the stream.
    pub fn position_label(&mut self) -> LabelHandle {
        self.labels.reference(LabelKey::Position(self.instructions.len()))
    }

    /// Defines the named label `name` before the next instruction.
    ///
    /// # Errors
    /// Returns [`crate::Error::DuplicateLabel`] if `name` was already defined in this body.
    pub fn define_label(&mut self, name: &str) -> Result<LabelHandle> {
        self.labels.define(name, self.instructions.len())
    }

    /// Sets the source line attached to subsequent instructions (`.line`).
    pub fn set_line(&mut self, line: u32) {
        self.current_line = Some(line);
    }

    /// Declares a local variable and returns its slot.
    pub fn add_local(&mut self, name: Option<&str>, local_type: TypeRefId) -> u16 {
        self.locals.push(LocalVariable {
            name: name.map(str::to_string),
            local_type,
        });
        self.locals.len() as u16 - 1
    }

    /// Slot of the local called `name`.
    #[must_use]
    pub fn local_index(&self, name: &str) -> Option<u16> {
        self.locals
            .iter()
            .position(|local| local.name.as_deref() == Some(name))
            .map(|index| index as u16)
    }

    /// Sets `.locals init`.
    pub fn set_init_locals(&mut self, init: bool) {
        self.init_locals = init;
    }

    /// Sets `.maxstack`.
    pub fn set_max_stack(&mut self, max_stack: u16) {
        self.max_stack = Some(max_stack);
    }

    /// Adds a region whose labels were named explicitly (`.try L1 to L2 catch T handler L3 to L4`).
    pub fn add_try_block(&mut self, block: TryBlock) {
        self.regions.add(block);
    }

    /// Opens a scoped `.try {` at the current position.
    pub fn begin_try(&mut self) {
        let start = self.position_label();
        self.regions.begin_try(start);
    }

    /// Closes the protected range `}` of the innermost scoped try.
    ///
    /// # Errors
    /// See [`ExceptionRegions::end_try`].
    pub fn end_try(&mut self) -> Result<()> {
        let end = self.position_label();
        self.regions.end_try(end)
    }

    /// Opens `catch T {` at the current position.
    ///
    /// # Errors
    /// See [`ExceptionRegions::begin_catch`].
    pub fn begin_catch(&mut self, exception: TypeRefId) -> Result<()> {
        let start = self.position_label();
        self.regions.begin_catch(exception, start)
    }

    /// Opens `filter {` at the current position.
    ///
    /// # Errors
    /// See [`ExceptionRegions::begin_filter`].
    pub fn begin_filter(&mut self) -> Result<()> {
        let start = self.position_label();
        self.regions.begin_filter(start)
    }

    /// Opens the handler `{` following a filter block at the current position.
    ///
    /// # Errors
    /// See [`ExceptionRegions::begin_filter_handler`].
    pub fn begin_filter_handler(&mut self) -> Result<()> {
        let start = self.position_label();
        self.regions.begin_filter_handler(start)
    }

    /// Opens `finally {` at the current position.
    ///
    /// # Errors
    /// See [`ExceptionRegions::begin_finally`].
    pub fn begin_finally(&mut self) -> Result<()> {
        let start = self.position_label();
        self.regions.begin_finally(start)
    }

    /// Opens `fault {` at the current position.
    ///
    /// # Errors
    /// See [`ExceptionRegions::begin_fault`].
    pub fn begin_fault(&mut self) -> Result<()> {
        let start = self.position_label();
        self.regions.begin_fault(start)
    }

    /// Closes the open handler `}` at the current position.
    ///
    /// # Errors
    /// See [`ExceptionRegions::end_handler`].
    pub fn end_handler(&mut self) -> Result<()> {
        let end = self.position_label();
        self.regions.end_handler(end)
    }

    /// Closes the innermost scoped try after its last handler.
    ///
    /// # Errors
    /// See [`ExceptionRegions::close_try`].
    pub fn close_try(&mut self) -> Result<()> {
        self.regions.close_try()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::LabelTarget;

    #[test]
    fn test_emit_validates_operands() {
        let mut body = InstructionStream::new();
        assert!(body.emit("nop", Operand::None).is_ok());
        assert_eq!(
            body.emit("frobnicate", Operand::None),
            Err(Error::InvalidMnemonic("frobnicate".to_string()))
        );
        assert!(matches!(
            body.emit("br.s", Operand::Int(3)),
            Err(Error::InvalidOperand { mnemonic: "br.s", .. })
        ));
        assert!(body.emit("ldc.r8", Operand::Int(1)).is_ok());
        assert!(body.emit("ldarg", Operand::Arg(VarRef::Name("x".into()))).is_ok());
        assert_eq!(body.len(), 3);
    }

    #[test]
    fn test_instruction_sizes() {
        let mut body = InstructionStream::new();
        let target = body.label("L");
        body.emit("br.s", Operand::Label(target)).unwrap();
        body.emit("br", Operand::Label(target)).unwrap();
        body.emit("switch", Operand::Switch(vec![target, target])).unwrap();
        body.emit("ceq", Operand::None).unwrap();
        body.emit_byte(0xCC);

        let sizes: Vec<u32> = body.instructions().iter().map(Instruction::size).collect();
        assert_eq!(sizes, vec![2, 5, 13, 2, 1]);
    }

    #[test]
    fn test_lines_and_locals() {
        let mut body = InstructionStream::new();
        let int32 = crate::references::TypeReferences::new().primitive(
            crate::references::PrimitiveType::I4,
        );
        assert_eq!(body.add_local(Some("count"), int32), 0);
        assert_eq!(body.add_local(None, int32), 1);
        assert_eq!(body.local_index("count"), Some(0));

        body.emit("nop", Operand::None).unwrap();
        body.set_line(12);
        body.emit("ret", Operand::None).unwrap();
        assert_eq!(body.instructions()[0].line, None);
        assert_eq!(body.instructions()[1].line, Some(12));
    }

    #[test]
    fn test_scoped_regions_use_positions() {
        let mut body = InstructionStream::new();
        let exception = crate::references::TypeReferences::new().local("E");
        body.begin_try();
        body.emit("nop", Operand::None).unwrap();
        body.end_try().unwrap();
        body.begin_catch(exception).unwrap();
        body.emit("pop", Operand::None).unwrap();
        body.end_handler().unwrap();
        body.close_try().unwrap();

        let block = &body.regions().blocks()[0];
        assert_eq!(body.labels().target(block.try_start), Some(LabelTarget::Instruction(0)));
        assert_eq!(body.labels().target(block.try_end), Some(LabelTarget::Instruction(1)));
        assert_eq!(
            body.labels().target(block.clauses[0].handler_end),
            Some(LabelTarget::Instruction(2))
        );
    }
}
