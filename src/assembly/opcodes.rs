//! CIL opcode table and mnemonic lookup (ECMA-335 Partition III).
//!
//! Every instruction the front end appends is identified by its textual mnemonic. The
//! table below maps mnemonics to their encoding and to the [`OperandKind`] the assembler
//! expects, which decides how the symbolic operand is resolved and how many bytes it takes.
//! No instruction is ever rewritten: a short branch whose target is out of range is an
//! error, not an opportunity to switch to the long form.

use std::collections::HashMap;
use std::sync::OnceLock;

/// The kind of inline operand an opcode carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// No operand
    None,
    /// `int8` immediate (`ldc.i4.s`)
    ShortInt,
    /// `uint8` immediate (`unaligned.`, `no.`)
    UInt8,
    /// `int32` immediate
    Int32,
    /// `int64` immediate
    Int64,
    /// `float32` immediate
    Float32,
    /// `float64` immediate
    Float64,
    /// `uint8` argument index
    ShortArg,
    /// `uint16` argument index
    Arg,
    /// `uint8` local index
    ShortLocal,
    /// `uint16` local index
    Local,
    /// `int8` relative branch target
    ShortBranch,
    /// `int32` relative branch target
    Branch,
    /// Jump table
    Switch,
    /// MethodDef, MemberRef or MethodSpec token
    Method,
    /// Field or MemberRef token
    Field,
    /// TypeDef, TypeRef or TypeSpec token
    Type,
    /// Any type, method or field token (`ldtoken`)
    Token,
    /// User-string token (`ldstr`)
    String,
    /// StandAloneSig token (`calli`)
    Signature,
}

impl OperandKind {
    /// Size in bytes of the inline operand; `switch` reports the size of its count only.
    #[must_use]
    pub fn size(self) -> u32 {
        match self {
            OperandKind::None => 0,
            OperandKind::ShortInt
            | OperandKind::UInt8
            | OperandKind::ShortArg
            | OperandKind::ShortLocal
            | OperandKind::ShortBranch => 1,
            OperandKind::Arg | OperandKind::Local => 2,
            OperandKind::Int64 | OperandKind::Float64 => 8,
            OperandKind::Int32
            | OperandKind::Float32
            | OperandKind::Branch
            | OperandKind::Switch
            | OperandKind::Method
            | OperandKind::Field
            | OperandKind::Type
            | OperandKind::Token
            | OperandKind::String
            | OperandKind::Signature => 4,
        }
    }
}

/// One CIL opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCode {
    /// Canonical mnemonic
    pub mnemonic: &'static str,
    /// `0xFE` for two-byte opcodes, `0` otherwise
    pub prefix: u8,
    /// The (second) opcode byte
    pub value: u8,
    /// Inline operand kind
    pub operand: OperandKind,
}

impl OpCode {
    /// Size of the opcode bytes without operand.
    #[must_use]
    pub fn opcode_size(&self) -> u32 {
        if self.prefix == 0 {
            1
        } else {
            2
        }
    }

    /// Appends the opcode bytes to `buffer`.
    pub fn encode(&self, buffer: &mut Vec<u8>) {
        if self.prefix != 0 {
            buffer.push(self.prefix);
        }
        buffer.push(self.value);
    }

    /// Looks up an opcode by mnemonic, including the common aliases accepted by assemblers.
    #[must_use]
    pub fn from_mnemonic(mnemonic: &str) -> Option<&'static OpCode> {
        static LOOKUP: OnceLock<HashMap<&'static str, &'static OpCode>> = OnceLock::new();

        let lookup = LOOKUP.get_or_init(|| {
            let mut map: HashMap<&'static str, &'static OpCode> = OPCODES
                .iter()
                .map(|opcode| (opcode.mnemonic, opcode))
                .collect();
            for (alias, target) in ALIASES {
                if let Some(opcode) = map.get(target).copied() {
                    map.insert(alias, opcode);
                }
            }
            map
        });

        lookup.get(mnemonic).copied()
    }

    /// Checks whether this opcode transfers control to an inline target.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self.operand,
            OperandKind::ShortBranch | OperandKind::Branch | OperandKind::Switch
        )
    }
}

const fn op(mnemonic: &'static str, value: u8, operand: OperandKind) -> OpCode {
    OpCode {
        mnemonic,
        prefix: 0,
        value,
        operand,
    }
}

const fn fe(mnemonic: &'static str, value: u8, operand: OperandKind) -> OpCode {
    OpCode {
        mnemonic,
        prefix: 0xFE,
        value,
        operand,
    }
}

const ALIASES: [(&str, &str); 10] = [
    ("brnull", "brfalse"),
    ("brnull.s", "brfalse.s"),
    ("brzero", "brfalse"),
    ("brzero.s", "brfalse.s"),
    ("brinst", "brtrue"),
    ("brinst.s", "brtrue.s"),
    ("endfault", "endfinally"),
    ("ldelem.any", "ldelem"),
    ("stelem.any", "stelem"),
    ("ldc.i4.M1", "ldc.i4.m1"),
];

use OperandKind as K;

/// All opcodes, one-byte forms first.
pub static OPCODES: &[OpCode] = &[
    op("nop", 0x00, K::None),
    op("break", 0x01, K::None),
    op("ldarg.0", 0x02, K::None),
    op("ldarg.1", 0x03, K::None),
    op("ldarg.2", 0x04, K::None),
    op("ldarg.3", 0x05, K::None),
    op("ldloc.0", 0x06, K::None),
    op("ldloc.1", 0x07, K::None),
    op("ldloc.2", 0x08, K::None),
    op("ldloc.3", 0x09, K::None),
    op("stloc.0", 0x0A, K::None),
    op("stloc.1", 0x0B, K::None),
    op("stloc.2", 0x0C, K::None),
    op("stloc.3", 0x0D, K::None),
    op("ldarg.s", 0x0E, K::ShortArg),
    op("ldarga.s", 0x0F, K::ShortArg),
    op("starg.s", 0x10, K::ShortArg),
    op("ldloc.s", 0x11, K::ShortLocal),
    op("ldloca.s", 0x12, K::ShortLocal),
    op("stloc.s", 0x13, K::ShortLocal),
    op("ldnull", 0x14, K::None),
    op("ldc.i4.m1", 0x15, K::None),
    op("ldc.i4.0", 0x16, K::None),
    op("ldc.i4.1", 0x17, K::None),
    op("ldc.i4.2", 0x18, K::None),
    op("ldc.i4.3", 0x19, K::None),
    op("ldc.i4.4", 0x1A, K::None),
    op("ldc.i4.5", 0x1B, K::None),
    op("ldc.i4.6", 0x1C, K::None),
    op("ldc.i4.7", 0x1D, K::None),
    op("ldc.i4.8", 0x1E, K::None),
    op("ldc.i4.s", 0x1F, K::ShortInt),
    op("ldc.i4", 0x20, K::Int32),
    op("ldc.i8", 0x21, K::Int64),
    op("ldc.r4", 0x22, K::Float32),
    op("ldc.r8", 0x23, K::Float64),
    op("dup", 0x25, K::None),
    op("pop", 0x26, K::None),
    op("jmp", 0x27, K::Method),
    op("call", 0x28, K::Method),
    op("calli", 0x29, K::Signature),
    op("ret", 0x2A, K::None),
    op("br.s", 0x2B, K::ShortBranch),
    op("brfalse.s", 0x2C, K::ShortBranch),
    op("brtrue.s", 0x2D, K::ShortBranch),
    op("beq.s", 0x2E, K::ShortBranch),
    op("bge.s", 0x2F, K::ShortBranch),
    op("bgt.s", 0x30, K::ShortBranch),
    op("ble.s", 0x31, K::ShortBranch),
    op("blt.s", 0x32, K::ShortBranch),
    op("bne.un.s", 0x33, K::ShortBranch),
    op("bge.un.s", 0x34, K::ShortBranch),
    op("bgt.un.s", 0x35, K::ShortBranch),
    op("ble.un.s", 0x36, K::ShortBranch),
    op("blt.un.s", 0x37, K::ShortBranch),
    op("br", 0x38, K::Branch),
    op("brfalse", 0x39, K::Branch),
    op("brtrue", 0x3A, K::Branch),
    op("beq", 0x3B, K::Branch),
    op("bge", 0x3C, K::Branch),
    op("bgt", 0x3D, K::Branch),
    op("ble", 0x3E, K::Branch),
    op("blt", 0x3F, K::Branch),
    op("bne.un", 0x40, K::Branch),
    op("bge.un", 0x41, K::Branch),
    op("bgt.un", 0x42, K::Branch),
    op("ble.un", 0x43, K::Branch),
    op("blt.un", 0x44, K::Branch),
    op("switch", 0x45, K::Switch),
    op("ldind.i1", 0x46, K::None),
    op("ldind.u1", 0x47, K::None),
    op("ldind.i2", 0x48, K::None),
    op("ldind.u2", 0x49, K::None),
    op("ldind.i4", 0x4A, K::None),
    op("ldind.u4", 0x4B, K::None),
    op("ldind.i8", 0x4C, K::None),
    op("ldind.i", 0x4D, K::None),
    op("ldind.r4", 0x4E, K::None),
    op("ldind.r8", 0x4F, K::None),
    op("ldind.ref", 0x50, K::None),
    op("stind.ref", 0x51, K::None),
    op("stind.i1", 0x52, K::None),
    op("stind.i2", 0x53, K::None),
    op("stind.i4", 0x54, K::None),
    op("stind.i8", 0x55, K::None),
    op("stind.r4", 0x56, K::None),
    op("stind.r8", 0x57, K::None),
    op("add", 0x58, K::None),
    op("sub", 0x59, K::None),
    op("mul", 0x5A, K::None),
    op("div", 0x5B, K::None),
    op("div.un", 0x5C, K::None),
    op("rem", 0x5D, K::None),
    op("rem.un", 0x5E, K::None),
    op("and", 0x5F, K::None),
    op("or", 0x60, K::None),
    op("xor", 0x61, K::None),
    op("shl", 0x62, K::None),
    op("shr", 0x63, K::None),
    op("shr.un", 0x64, K::None),
    op("neg", 0x65, K::None),
    op("not", 0x66, K::None),
    op("conv.i1", 0x67, K::None),
    op("conv.i2", 0x68, K::None),
    op("conv.i4", 0x69, K::None),
    op("conv.i8", 0x6A, K::None),
    op("conv.r4", 0x6B, K::None),
    op("conv.r8", 0x6C, K::None),
    op("conv.u4", 0x6D, K::None),
    op("conv.u8", 0x6E, K::None),
    op("callvirt", 0x6F, K::Method),
    op("cpobj", 0x70, K::Type),
    op("ldobj", 0x71, K::Type),
    op("ldstr", 0x72, K::String),
    op("newobj", 0x73, K::Method),
    op("castclass", 0x74, K::Type),
    op("isinst", 0x75, K::Type),
    op("conv.r.un", 0x76, K::None),
    op("unbox", 0x79, K::Type),
    op("throw", 0x7A, K::None),
    op("ldfld", 0x7B, K::Field),
    op("ldflda", 0x7C, K::Field),
    op("stfld", 0x7D, K::Field),
    op("ldsfld", 0x7E, K::Field),
    op("ldsflda", 0x7F, K::Field),
    op("stsfld", 0x80, K::Field),
    op("stobj", 0x81, K::Type),
    op("conv.ovf.i1.un", 0x82, K::None),
    op("conv.ovf.i2.un", 0x83, K::None),
    op("conv.ovf.i4.un", 0x84, K::None),
    op("conv.ovf.i8.un", 0x85, K::None),
    op("conv.ovf.u1.un", 0x86, K::None),
    op("conv.ovf.u2.un", 0x87, K::None),
    op("conv.ovf.u4.un", 0x88, K::None),
    op("conv.ovf.u8.un", 0x89, K::None),
    op("conv.ovf.i.un", 0x8A, K::None),
    op("conv.ovf.u.un", 0x8B, K::None),
    op("box", 0x8C, K::Type),
    op("newarr", 0x8D, K::Type),
    op("ldlen", 0x8E, K::None),
    op("ldelema", 0x8F, K::Type),
    op("ldelem.i1", 0x90, K::None),
    op("ldelem.u1", 0x91, K::None),
    op("ldelem.i2", 0x92, K::None),
    op("ldelem.u2", 0x93, K::None),
    op("ldelem.i4", 0x94, K::None),
    op("ldelem.u4", 0x95, K::None),
    op("ldelem.i8", 0x96, K::None),
    op("ldelem.i", 0x97, K::None),
    op("ldelem.r4", 0x98, K::None),
    op("ldelem.r8", 0x99, K::None),
    op("ldelem.ref", 0x9A, K::None),
    op("stelem.i", 0x9B, K::None),
    op("stelem.i1", 0x9C, K::None),
    op("stelem.i2", 0x9D, K::None),
    op("stelem.i4", 0x9E, K::None),
    op("stelem.i8", 0x9F, K::None),
    op("stelem.r4", 0xA0, K::None),
    op("stelem.r8", 0xA1, K::None),
    op("stelem.ref", 0xA2, K::None),
    op("ldelem", 0xA3, K::Type),
    op("stelem", 0xA4, K::Type),
    op("unbox.any", 0xA5, K::Type),
    op("conv.ovf.i1", 0xB3, K::None),
    op("conv.ovf.u1", 0xB4, K::None),
    op("conv.ovf.i2", 0xB5, K::None),
    op("conv.ovf.u2", 0xB6, K::None),
    op("conv.ovf.i4", 0xB7, K::None),
    op("conv.ovf.u4", 0xB8, K::None),
    op("conv.ovf.i8", 0xB9, K::None),
    op("conv.ovf.u8", 0xBA, K::None),
    op("refanyval", 0xC2, K::Type),
    op("ckfinite", 0xC3, K::None),
    op("mkrefany", 0xC6, K::Type),
    op("ldtoken", 0xD0, K::Token),
    op("conv.u2", 0xD1, K::None),
    op("conv.u1", 0xD2, K::None),
    op("conv.i", 0xD3, K::None),
    op("conv.ovf.i", 0xD4, K::None),
    op("conv.ovf.u", 0xD5, K::None),
    op("add.ovf", 0xD6, K::None),
    op("add.ovf.un", 0xD7, K::None),
    op("mul.ovf", 0xD8, K::None),
    op("mul.ovf.un", 0xD9, K::None),
    op("sub.ovf", 0xDA, K::None),
    op("sub.ovf.un", 0xDB, K::None),
    op("endfinally", 0xDC, K::None),
    op("leave", 0xDD, K::Branch),
    op("leave.s", 0xDE, K::ShortBranch),
    op("stind.i", 0xDF, K::None),
    op("conv.u", 0xE0, K::None),
    fe("arglist", 0x00, K::None),
    fe("ceq", 0x01, K::None),
    fe("cgt", 0x02, K::None),
    fe("cgt.un", 0x03, K::None),
    fe("clt", 0x04, K::None),
    fe("clt.un", 0x05, K::None),
    fe("ldftn", 0x06, K::Method),
    fe("ldvirtftn", 0x07, K::Method),
    fe("ldarg", 0x09, K::Arg),
    fe("ldarga", 0x0A, K::Arg),
    fe("starg", 0x0B, K::Arg),
    fe("ldloc", 0x0C, K::Local),
    fe("ldloca", 0x0D, K::Local),
    fe("stloc", 0x0E, K::Local),
    fe("localloc", 0x0F, K::None),
    fe("endfilter", 0x11, K::None),
    fe("unaligned.", 0x12, K::UInt8),
    fe("volatile.", 0x13, K::None),
    fe("tail.", 0x14, K::None),
    fe("initobj", 0x15, K::Type),
    fe("constrained.", 0x16, K::Type),
    fe("cpblk", 0x17, K::None),
    fe("initblk", 0x18, K::None),
    fe("no.", 0x19, K::UInt8),
    fe("rethrow", 0x1A, K::None),
    fe("sizeof", 0x1C, K::Type),
    fe("refanytype", 0x1D, K::None),
    fe("readonly.", 0x1E, K::None),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_lookup_single_and_double_byte() {
        let ret = OpCode::from_mnemonic("ret").unwrap();
        assert_eq!((ret.prefix, ret.value), (0, 0x2A));
        assert_eq!(ret.opcode_size(), 1);

        let ceq = OpCode::from_mnemonic("ceq").unwrap();
        assert_eq!((ceq.prefix, ceq.value), (0xFE, 0x01));
        let mut bytes = Vec::new();
        ceq.encode(&mut bytes);
        assert_eq!(bytes, vec![0xFE, 0x01]);
    }

    #[test]
    fn test_aliases() {
        assert_eq!(
            OpCode::from_mnemonic("brnull.s").unwrap().value,
            OpCode::from_mnemonic("brfalse.s").unwrap().value
        );
        assert_eq!(OpCode::from_mnemonic("endfault").unwrap().value, 0xDC);
        assert!(OpCode::from_mnemonic("frobnicate").is_none());
    }

    #[test]
    fn test_mnemonics_and_encodings_are_unique() {
        let mut names = HashSet::new();
        let mut encodings = HashSet::new();
        for opcode in OPCODES {
            assert!(names.insert(opcode.mnemonic), "{}", opcode.mnemonic);
            assert!(encodings.insert((opcode.prefix, opcode.value)), "{}", opcode.mnemonic);
        }
    }

    #[test]
    fn test_operand_sizes() {
        assert_eq!(OperandKind::ShortBranch.size(), 1);
        assert_eq!(OperandKind::Local.size(), 2);
        assert_eq!(OperandKind::Float64.size(), 8);
        assert!(OpCode::from_mnemonic("leave.s").unwrap().is_branch());
        assert!(!OpCode::from_mnemonic("ldloc.s").unwrap().is_branch());
    }
}
