//! JVM opcodes, the decoded instruction form the interpreter runs, and a
//! decoder from raw `Code` attribute bytes.
//!
//! Branch targets are [`Label`]s: indices into the decoded instruction
//! sequence, not byte offsets.
use std::collections::HashMap;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{VmError, VmResult};
use crate::source::TryCatchNode;

macro_rules! opcodes {
    ($($name:ident = $value:literal => $mnemonic:literal,)*) => {
        $(pub const $name: u8 = $value;)*

        /// Returns the mnemonic of `opcode`, `None` for unassigned values.
        pub const fn name_of(opcode: u8) -> Option<&'static str> {
            match opcode {
                $($value => Some($mnemonic),)*
                _ => None,
            }
        }
    };
}

opcodes! {
    NOP = 0 => "nop",
    ACONST_NULL = 1 => "aconst_null",
    ICONST_M1 = 2 => "iconst_m1",
    ICONST_0 = 3 => "iconst_0",
    ICONST_1 = 4 => "iconst_1",
    ICONST_2 = 5 => "iconst_2",
    ICONST_3 = 6 => "iconst_3",
    ICONST_4 = 7 => "iconst_4",
    ICONST_5 = 8 => "iconst_5",
    LCONST_0 = 9 => "lconst_0",
    LCONST_1 = 10 => "lconst_1",
    FCONST_0 = 11 => "fconst_0",
    FCONST_1 = 12 => "fconst_1",
    FCONST_2 = 13 => "fconst_2",
    DCONST_0 = 14 => "dconst_0",
    DCONST_1 = 15 => "dconst_1",
    BIPUSH = 16 => "bipush",
    SIPUSH = 17 => "sipush",
    LDC = 18 => "ldc",
    LDC_W = 19 => "ldc_w",
    LDC2_W = 20 => "ldc2_w",
    ILOAD = 21 => "iload",
    LLOAD = 22 => "lload",
    FLOAD = 23 => "fload",
    DLOAD = 24 => "dload",
    ALOAD = 25 => "aload",
    ILOAD_0 = 26 => "iload_0",
    ILOAD_1 = 27 => "iload_1",
    ILOAD_2 = 28 => "iload_2",
    ILOAD_3 = 29 => "iload_3",
    LLOAD_0 = 30 => "lload_0",
    LLOAD_1 = 31 => "lload_1",
    LLOAD_2 = 32 => "lload_2",
    LLOAD_3 = 33 => "lload_3",
    FLOAD_0 = 34 => "fload_0",
    FLOAD_1 = 35 => "fload_1",
    FLOAD_2 = 36 => "fload_2",
    FLOAD_3 = 37 => "fload_3",
    DLOAD_0 = 38 => "dload_0",
    DLOAD_1 = 39 => "dload_1",
    DLOAD_2 = 40 => "dload_2",
    DLOAD_3 = 41 => "dload_3",
    ALOAD_0 = 42 => "aload_0",
    ALOAD_1 = 43 => "aload_1",
    ALOAD_2 = 44 => "aload_2",
    ALOAD_3 = 45 => "aload_3",
    IALOAD = 46 => "iaload",
    LALOAD = 47 => "laload",
    FALOAD = 48 => "faload",
    DALOAD = 49 => "daload",
    AALOAD = 50 => "aaload",
    BALOAD = 51 => "baload",
    CALOAD = 52 => "caload",
    SALOAD = 53 => "saload",
    ISTORE = 54 => "istore",
    LSTORE = 55 => "lstore",
    FSTORE = 56 => "fstore",
    DSTORE = 57 => "dstore",
    ASTORE = 58 => "astore",
    ISTORE_0 = 59 => "istore_0",
    ISTORE_1 = 60 => "istore_1",
    ISTORE_2 = 61 => "istore_2",
    ISTORE_3 = 62 => "istore_3",
    LSTORE_0 = 63 => "lstore_0",
    LSTORE_1 = 64 => "lstore_1",
    LSTORE_2 = 65 => "lstore_2",
    LSTORE_3 = 66 => "lstore_3",
    FSTORE_0 = 67 => "fstore_0",
    FSTORE_1 = 68 => "fstore_1",
    FSTORE_2 = 69 => "fstore_2",
    FSTORE_3 = 70 => "fstore_3",
    DSTORE_0 = 71 => "dstore_0",
    DSTORE_1 = 72 => "dstore_1",
    DSTORE_2 = 73 => "dstore_2",
    DSTORE_3 = 74 => "dstore_3",
    ASTORE_0 = 75 => "astore_0",
    ASTORE_1 = 76 => "astore_1",
    ASTORE_2 = 77 => "astore_2",
    ASTORE_3 = 78 => "astore_3",
    IASTORE = 79 => "iastore",
    LASTORE = 80 => "lastore",
    FASTORE = 81 => "fastore",
    DASTORE = 82 => "dastore",
    AASTORE = 83 => "aastore",
    BASTORE = 84 => "bastore",
    CASTORE = 85 => "castore",
    SASTORE = 86 => "sastore",
    POP = 87 => "pop",
    POP2 = 88 => "pop2",
    DUP = 89 => "dup",
    DUP_X1 = 90 => "dup_x1",
    DUP_X2 = 91 => "dup_x2",
    DUP2 = 92 => "dup2",
    DUP2_X1 = 93 => "dup2_x1",
    DUP2_X2 = 94 => "dup2_x2",
    SWAP = 95 => "swap",
    IADD = 96 => "iadd",
    LADD = 97 => "ladd",
    FADD = 98 => "fadd",
    DADD = 99 => "dadd",
    ISUB = 100 => "isub",
    LSUB = 101 => "lsub",
    FSUB = 102 => "fsub",
    DSUB = 103 => "dsub",
    IMUL = 104 => "imul",
    LMUL = 105 => "lmul",
    FMUL = 106 => "fmul",
    DMUL = 107 => "dmul",
    IDIV = 108 => "idiv",
    LDIV = 109 => "ldiv",
    FDIV = 110 => "fdiv",
    DDIV = 111 => "ddiv",
    IREM = 112 => "irem",
    LREM = 113 => "lrem",
    FREM = 114 => "frem",
    DREM = 115 => "drem",
    INEG = 116 => "ineg",
    LNEG = 117 => "lneg",
    FNEG = 118 => "fneg",
    DNEG = 119 => "dneg",
    ISHL = 120 => "ishl",
    LSHL = 121 => "lshl",
    ISHR = 122 => "ishr",
    LSHR = 123 => "lshr",
    IUSHR = 124 => "iushr",
    LUSHR = 125 => "lushr",
    IAND = 126 => "iand",
    LAND = 127 => "land",
    IOR = 128 => "ior",
    LOR = 129 => "lor",
    IXOR = 130 => "ixor",
    LXOR = 131 => "lxor",
    IINC = 132 => "iinc",
    I2L = 133 => "i2l",
    I2F = 134 => "i2f",
    I2D = 135 => "i2d",
    L2I = 136 => "l2i",
    L2F = 137 => "l2f",
    L2D = 138 => "l2d",
    F2I = 139 => "f2i",
    F2L = 140 => "f2l",
    F2D = 141 => "f2d",
    D2I = 142 => "d2i",
    D2L = 143 => "d2l",
    D2F = 144 => "d2f",
    I2B = 145 => "i2b",
    I2C = 146 => "i2c",
    I2S = 147 => "i2s",
    LCMP = 148 => "lcmp",
    FCMPL = 149 => "fcmpl",
    FCMPG = 150 => "fcmpg",
    DCMPL = 151 => "dcmpl",
    DCMPG = 152 => "dcmpg",
    IFEQ = 153 => "ifeq",
    IFNE = 154 => "ifne",
    IFLT = 155 => "iflt",
    IFGE = 156 => "ifge",
    IFGT = 157 => "ifgt",
    IFLE = 158 => "ifle",
    IF_ICMPEQ = 159 => "if_icmpeq",
    IF_ICMPNE = 160 => "if_icmpne",
    IF_ICMPLT = 161 => "if_icmplt",
    IF_ICMPGE = 162 => "if_icmpge",
    IF_ICMPGT = 163 => "if_icmpgt",
    IF_ICMPLE = 164 => "if_icmple",
    IF_ACMPEQ = 165 => "if_acmpeq",
    IF_ACMPNE = 166 => "if_acmpne",
    GOTO = 167 => "goto",
    JSR = 168 => "jsr",
    RET = 169 => "ret",
    TABLESWITCH = 170 => "tableswitch",
    LOOKUPSWITCH = 171 => "lookupswitch",
    IRETURN = 172 => "ireturn",
    LRETURN = 173 => "lreturn",
    FRETURN = 174 => "freturn",
    DRETURN = 175 => "dreturn",
    ARETURN = 176 => "areturn",
    RETURN = 177 => "return",
    GETSTATIC = 178 => "getstatic",
    PUTSTATIC = 179 => "putstatic",
    GETFIELD = 180 => "getfield",
    PUTFIELD = 181 => "putfield",
    INVOKEVIRTUAL = 182 => "invokevirtual",
    INVOKESPECIAL = 183 => "invokespecial",
    INVOKESTATIC = 184 => "invokestatic",
    INVOKEINTERFACE = 185 => "invokeinterface",
    INVOKEDYNAMIC = 186 => "invokedynamic",
    NEW = 187 => "new",
    NEWARRAY = 188 => "newarray",
    ANEWARRAY = 189 => "anewarray",
    ARRAYLENGTH = 190 => "arraylength",
    ATHROW = 191 => "athrow",
    CHECKCAST = 192 => "checkcast",
    INSTANCEOF = 193 => "instanceof",
    MONITORENTER = 194 => "monitorenter",
    MONITOREXIT = 195 => "monitorexit",
    WIDE = 196 => "wide",
    MULTIANEWARRAY = 197 => "multianewarray",
    IFNULL = 198 => "ifnull",
    IFNONNULL = 199 => "ifnonnull",
    GOTO_W = 200 => "goto_w",
    JSR_W = 201 => "jsr_w",
}

/// Mnemonic of `opcode`, or `"<unknown>"`.
pub const fn mnemonic(opcode: u8) -> &'static str {
    match name_of(opcode) {
        Some(name) => name,
        None => "<unknown>",
    }
}

/// Position of an instruction inside a method's instruction sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub usize);

/// Loadable constant of `ldc`, `ldc_w` and `ldc2_w`.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    /// Class literal, by internal name.
    Type(String),
}

impl Constant {
    pub const fn is_wide(&self) -> bool {
        matches!(self, Self::Long(_) | Self::Double(_))
    }
}

/// Symbolic reference to a field or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

/// Decoded operands, one shape per instruction format.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    /// `bipush` and `sipush` immediates.
    Int(i32),
    Local(u16),
    Increment { local: u16, delta: i16 },
    Jump(Label),
    Constant(Constant),
    TableSwitch {
        low: i32,
        high: i32,
        default: Label,
        targets: Vec<Label>,
    },
    LookupSwitch {
        default: Label,
        pairs: Vec<(i32, Label)>,
    },
    /// Class operand of `new`, `anewarray`, `checkcast`, `instanceof`.
    Type(String),
    /// `atype` of `newarray`.
    ArrayType(u8),
    Member(MemberRef),
    Dynamic { name: String, descriptor: String },
    MultiArray { descriptor: String, dimensions: u8 },
}

/// Instructions are composed of an opcode and its decoded operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    opcode: u8,
    operand: Operand,
}

impl Instruction {
    pub const fn new(opcode: u8) -> Self {
        Self {
            opcode,
            operand: Operand::None,
        }
    }

    pub const fn with(opcode: u8, operand: Operand) -> Self {
        Self { opcode, operand }
    }

    pub const fn local(opcode: u8, index: u16) -> Self {
        Self::with(opcode, Operand::Local(index))
    }

    pub const fn jump(opcode: u8, target: usize) -> Self {
        Self::with(opcode, Operand::Jump(Label(target)))
    }

    pub const fn push(opcode: u8, value: i32) -> Self {
        Self::with(opcode, Operand::Int(value))
    }

    pub const fn iinc(local: u16, delta: i16) -> Self {
        Self::with(IINC, Operand::Increment { local, delta })
    }

    /// `ldc` or `ldc2_w`, depending on the width of the constant.
    pub fn ldc(constant: Constant) -> Self {
        let opcode = if constant.is_wide() { LDC2_W } else { LDC };
        Self::with(opcode, Operand::Constant(constant))
    }

    pub const fn opcode(&self) -> u8 {
        self.opcode
    }

    pub const fn operand(&self) -> &Operand {
        &self.operand
    }

    pub const fn mnemonic(&self) -> &'static str {
        mnemonic(self.opcode)
    }

    /// Every branch target this instruction may transfer control to.
    pub fn labels(&self) -> Vec<Label> {
        match &self.operand {
            Operand::Jump(label) => vec![*label],
            Operand::TableSwitch {
                default, targets, ..
            } => std::iter::once(*default).chain(targets.iter().copied()).collect(),
            Operand::LookupSwitch { default, pairs } => std::iter::once(*default)
                .chain(pairs.iter().map(|(_, label)| *label))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn labels_mut(&mut self) -> Vec<&mut Label> {
        match &mut self.operand {
            Operand::Jump(label) => vec![label],
            Operand::TableSwitch {
                default, targets, ..
            } => std::iter::once(default).chain(targets.iter_mut()).collect(),
            Operand::LookupSwitch { default, pairs } => std::iter::once(default)
                .chain(pairs.iter_mut().map(|(_, label)| label))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Constant-pool entries the decoder needs to give operands their
/// symbolic form.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
    Constant(Constant),
    Class(String),
    Member(MemberRef),
    Dynamic { name: String, descriptor: String },
}

/// Sparse view of a class constant pool, keyed by pool index.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: HashMap<u16, PoolEntry>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, index: u16, entry: PoolEntry) -> Self {
        self.entries.insert(index, entry);
        self
    }

    pub fn insert(&mut self, index: u16, entry: PoolEntry) {
        self.entries.insert(index, entry);
    }

    pub fn get(&self, index: u16) -> VmResult<&PoolEntry> {
        self.entries
            .get(&index)
            .ok_or_else(|| VmError::invalid(format!("missing constant pool entry #{index}")))
    }

    fn constant(&self, index: u16) -> VmResult<Constant> {
        match self.get(index)? {
            PoolEntry::Constant(constant) => Ok(constant.clone()),
            PoolEntry::Class(name) => Ok(Constant::Type(name.clone())),
            other => Err(VmError::invalid(format!(
                "constant pool entry #{index} is not loadable: {other:?}"
            ))),
        }
    }

    fn class(&self, index: u16) -> VmResult<String> {
        match self.get(index)? {
            PoolEntry::Class(name) => Ok(name.clone()),
            other => Err(VmError::invalid(format!(
                "constant pool entry #{index} is not a class: {other:?}"
            ))),
        }
    }

    fn member(&self, index: u16) -> VmResult<MemberRef> {
        match self.get(index)? {
            PoolEntry::Member(member) => Ok(member.clone()),
            other => Err(VmError::invalid(format!(
                "constant pool entry #{index} is not a member reference: {other:?}"
            ))),
        }
    }
}

/// Instructions decoded from a `Code` attribute, with the byte offset each
/// one started at so the attribute's exception table can be translated too.
#[derive(Debug, Clone)]
pub struct DecodedCode {
    instructions: Vec<Instruction>,
    index_of: HashMap<usize, usize>,
    length: usize,
}

impl DecodedCode {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }

    /// Label of the instruction starting at byte `offset`. The end of the
    /// code maps to one past the last instruction, which is where an
    /// exclusive `end_pc` may point.
    pub fn label_at(&self, offset: usize) -> VmResult<Label> {
        if offset == self.length {
            return Ok(Label(self.instructions.len()));
        }
        self.index_of
            .get(&offset)
            .map(|index| Label(*index))
            .ok_or_else(|| VmError::invalid(format!("no instruction starts at offset {offset}")))
    }

    /// Translates one raw exception table entry into labels.
    pub fn try_catch(
        &self,
        start_pc: u16,
        end_pc: u16,
        handler_pc: u16,
        catch_type: Option<&str>,
    ) -> VmResult<TryCatchNode> {
        Ok(TryCatchNode {
            start: self.label_at(usize::from(start_pc))?,
            end: self.label_at(usize::from(end_pc))?,
            handler: self.label_at(usize::from(handler_pc))?,
            catch_type: catch_type.map(str::to_string),
        })
    }
}

/// Decodes the body of a `Code` attribute into an instruction sequence.
///
/// `wide` prefixes are folded into the instruction they modify and branch
/// offsets are rewritten into labels. A branch that does not land on an
/// instruction boundary is rejected.
pub fn decode(code: &[u8], pool: &ConstantPool) -> VmResult<DecodedCode> {
    let mut reader = CodeReader {
        cursor: Cursor::new(code),
        pool,
    };
    let mut index_of = HashMap::new();
    let mut instructions = Vec::new();
    while (reader.cursor.position() as usize) < code.len() {
        let offset = reader.cursor.position() as usize;
        index_of.insert(offset, instructions.len());
        instructions.push(reader.next_instruction(offset)?);
    }

    for instruction in &mut instructions {
        for label in instruction.labels_mut() {
            let offset = label.0;
            label.0 = *index_of.get(&offset).ok_or_else(|| {
                VmError::invalid(format!("branch into the middle of an instruction at {offset}"))
            })?;
        }
    }
    Ok(DecodedCode {
        instructions,
        index_of,
        length: code.len(),
    })
}

struct CodeReader<'a> {
    cursor: Cursor<&'a [u8]>,
    pool: &'a ConstantPool,
}

impl CodeReader<'_> {
    fn next_instruction(&mut self, offset: usize) -> VmResult<Instruction> {
        let opcode = self.u8()?;
        let operand = match opcode {
            BIPUSH => Operand::Int(i32::from(self.i8()?)),
            SIPUSH => Operand::Int(i32::from(self.i16()?)),
            LDC => {
                let index = u16::from(self.u8()?);
                Operand::Constant(self.pool.constant(index)?)
            }
            LDC_W | LDC2_W => {
                let index = self.u16()?;
                Operand::Constant(self.pool.constant(index)?)
            }
            ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Operand::Local(u16::from(self.u8()?)),
            IINC => Operand::Increment {
                local: u16::from(self.u8()?),
                delta: i16::from(self.i8()?),
            },
            IFEQ..=JSR | IFNULL | IFNONNULL => {
                let delta = i32::from(self.i16()?);
                Operand::Jump(Self::target(offset, delta)?)
            }
            GOTO_W | JSR_W => {
                let delta = self.i32()?;
                Operand::Jump(Self::target(offset, delta)?)
            }
            TABLESWITCH => {
                self.align()?;
                let default = Self::target(offset, self.i32()?)?;
                let low = self.i32()?;
                let high = self.i32()?;
                if high < low {
                    return Err(VmError::invalid(format!(
                        "tableswitch at {offset} has low {low} above high {high}"
                    )));
                }
                let count = i64::from(high) - i64::from(low) + 1;
                let count = self.entries(offset, count as u64, 4)?;
                let mut targets = Vec::with_capacity(count);
                for _ in 0..count {
                    targets.push(Self::target(offset, self.i32()?)?);
                }
                Operand::TableSwitch {
                    low,
                    high,
                    default,
                    targets,
                }
            }
            LOOKUPSWITCH => {
                self.align()?;
                let default = Self::target(offset, self.i32()?)?;
                let count = self.i32()?;
                if count < 0 {
                    return Err(VmError::invalid(format!(
                        "lookupswitch at {offset} has negative pair count"
                    )));
                }
                let count = self.entries(offset, count as u64, 8)?;
                let mut pairs = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = self.i32()?;
                    pairs.push((key, Self::target(offset, self.i32()?)?));
                }
                Operand::LookupSwitch { default, pairs }
            }
            GETSTATIC..=INVOKESTATIC => Operand::Member(self.pool.member(self.u16()?)?),
            INVOKEINTERFACE => {
                let member = self.pool.member(self.u16()?)?;
                // count and a reserved zero byte
                self.u8()?;
                self.u8()?;
                Operand::Member(member)
            }
            INVOKEDYNAMIC => {
                let index = self.u16()?;
                self.u16()?;
                match self.pool.get(index)? {
                    PoolEntry::Dynamic { name, descriptor } => Operand::Dynamic {
                        name: name.clone(),
                        descriptor: descriptor.clone(),
                    },
                    other => {
                        return Err(VmError::invalid(format!(
                            "invokedynamic operand #{index} is {other:?}"
                        )))
                    }
                }
            }
            NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => {
                Operand::Type(self.pool.class(self.u16()?)?)
            }
            NEWARRAY => Operand::ArrayType(self.u8()?),
            MULTIANEWARRAY => Operand::MultiArray {
                descriptor: self.pool.class(self.u16()?)?,
                dimensions: self.u8()?,
            },
            WIDE => return self.wide(),
            other if name_of(other).is_none() => {
                return Err(VmError::invalid(format!(
                    "unknown opcode 0x{other:02x} at {offset}"
                )))
            }
            _ => Operand::None,
        };
        Ok(Instruction::with(opcode, operand))
    }

    fn wide(&mut self) -> VmResult<Instruction> {
        let opcode = self.u8()?;
        let operand = match opcode {
            IINC => Operand::Increment {
                local: self.u16()?,
                delta: self.i16()?,
            },
            ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Operand::Local(self.u16()?),
            other => {
                return Err(VmError::invalid(format!(
                    "wide cannot modify {}",
                    mnemonic(other)
                )))
            }
        };
        Ok(Instruction::with(opcode, operand))
    }

    /// Switch operands start on a four byte boundary of the code array.
    fn align(&mut self) -> VmResult<()> {
        while self.cursor.position() % 4 != 0 {
            self.u8()?;
        }
        Ok(())
    }

    /// Checks that `count` switch entries of `width` bytes each fit in the
    /// rest of the code before anything is allocated for them.
    fn entries(&self, offset: usize, count: u64, width: u64) -> VmResult<usize> {
        let remaining = (self.cursor.get_ref().len() as u64).saturating_sub(self.cursor.position());
        if count.saturating_mul(width) > remaining {
            return Err(VmError::invalid(format!(
                "switch at {offset} declares {count} entries but only {remaining} bytes remain"
            )));
        }
        Ok(count as usize)
    }

    fn target(offset: usize, delta: i32) -> VmResult<Label> {
        let target = offset as i64 + i64::from(delta);
        if target < 0 {
            return Err(VmError::invalid(format!(
                "branch at {offset} jumps before the start of the code"
            )));
        }
        Ok(Label(target as usize))
    }

    fn truncated(&self) -> VmError {
        VmError::invalid(format!(
            "code truncated at offset {}",
            self.cursor.position()
        ))
    }

    fn u8(&mut self) -> VmResult<u8> {
        self.cursor.read_u8().map_err(|_| self.truncated())
    }

    fn i8(&mut self) -> VmResult<i8> {
        self.cursor.read_i8().map_err(|_| self.truncated())
    }

    fn u16(&mut self) -> VmResult<u16> {
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|_| self.truncated())
    }

    fn i16(&mut self) -> VmResult<i16> {
        self.cursor
            .read_i16::<BigEndian>()
            .map_err(|_| self.truncated())
    }

    fn i32(&mut self) -> VmResult<i32> {
        self.cursor
            .read_i32::<BigEndian>()
            .map_err(|_| self.truncated())
    }
}
