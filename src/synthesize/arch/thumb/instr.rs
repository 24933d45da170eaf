use crate::synthesize::arch::thumb::{
    operand::Conv,
    reg::{LOW_REGS, POP_REGS, PUSH_REGS},
};

/// Fixed bits identifying an instruction, one halfword for 16-bit encodings, two for 32-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Narrow(u16),
    Wide(u16, u16),
}

impl Opcode {
    fn halfwords(self) -> (u32, u32) {
        match self {
            Opcode::Narrow(m) => (m.into(), 0),
            Opcode::Wide(m0, m1) => (m0.into(), m1.into()),
        }
    }

    pub fn halfwords_len(self) -> usize {
        match self {
            Opcode::Narrow(_) => 1,
            Opcode::Wide(..) => 2,
        }
    }
}

/// Encoded instruction, ready to append to the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Words {
    Narrow(u16),
    Wide([u16; 2]),
}

impl Words {
    pub fn as_slice(&self) -> &[u16] {
        match self {
            Words::Narrow(w) => std::slice::from_ref(w),
            Words::Wide(w) => w,
        }
    }
}

/// Bit packers: how converted operand fields are merged into the opcode.
///
/// Variants are named after the bit positions their fields land on, in operand order. `Skip`
/// marks a field that is accepted but not encoded (the implicit `sp`).
///
/// Fields have already been range checked by the converters, so packers never fail. Values on
/// the inclusive upper bound of an immediate spill into the neighbouring field; only bits above
/// 15 of a halfword are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pack {
    Bare,
    At0,
    At3,
    At0At3,
    At0At3At6,
    At8At0,
    At8SkipAt0,
    SkipAt0,
    /// 4-bit register at bit 7 (top bit) and 0-2, 4-bit register at bit 3.
    HighRegs,
    /// Second halfword gets the field at bit 0.
    WideAt0,
    /// Rd at bit 8 and SYSm at bit 0 of the second halfword.
    WideMrs,
    /// Rn at bit 0 of the first halfword, SYSm at bit 0 of the second.
    WideMsr,
    /// imm16 split as imm4 in the first halfword and imm12 in the second.
    WideUdf,
    /// Branch with link.
    ///
    /// Encoding (24-bit halfword offset `S:I1:I2:imm10:imm11`):
    /// 15 14 13 12 11 10 9  8  7  6  5  4  3  2  1  0 | 15 14 13 12 11 10 9  8  7  6  5  4  3  2  1  0
    /// 1  1  1  1  0  S  imm10                         | 1  1  J1 1  J2 imm11
    ///
    /// - J1 = NOT(I1 XOR S)
    /// - J2 = NOT(I2 XOR S)
    WideBl,
}

impl Pack {
    /// Number of operand fields consumed.
    pub fn fields(self) -> usize {
        match self {
            Pack::Bare => 0,
            Pack::At0 | Pack::At3 | Pack::WideAt0 | Pack::WideUdf | Pack::WideBl => 1,
            Pack::At0At3
            | Pack::At8At0
            | Pack::SkipAt0
            | Pack::HighRegs
            | Pack::WideMrs
            | Pack::WideMsr => 2,
            Pack::At0At3At6 | Pack::At8SkipAt0 => 3,
        }
    }

    pub fn is_wide(self) -> bool {
        matches!(
            self,
            Pack::WideAt0 | Pack::WideMrs | Pack::WideMsr | Pack::WideUdf | Pack::WideBl
        )
    }

    pub fn encode(self, opcode: Opcode, f: &[u32]) -> Words {
        let (m, m1) = opcode.halfwords();

        let narrow = |w: u32| Words::Narrow(w as u16);
        let wide = |w0: u32, w1: u32| Words::Wide([w0 as u16, w1 as u16]);

        match self {
            Pack::Bare => narrow(m),
            Pack::At0 => narrow(m | f[0]),
            Pack::At3 => narrow(m | f[0] << 3),
            Pack::At0At3 => narrow(m | f[1] << 3 | f[0]),
            Pack::At0At3At6 => narrow(m | f[2] << 6 | f[1] << 3 | f[0]),
            Pack::At8At0 => narrow(m | f[0] << 8 | f[1]),
            Pack::At8SkipAt0 => narrow(m | f[0] << 8 | f[2]),
            Pack::SkipAt0 => narrow(m | f[1]),
            Pack::HighRegs => narrow(m | (0x80 & f[0] << 4) | f[1] << 3 | (0x7 & f[0])),
            Pack::WideAt0 => wide(m, m1 | f[0]),
            Pack::WideMrs => wide(m, m1 | f[0] << 8 | f[1]),
            Pack::WideMsr => wide(m | f[0], m1 | f[1]),
            Pack::WideUdf => wide(m | f[0] >> 12, m1 | (0x0fff & f[0])),
            Pack::WideBl => {
                let a = f[0];
                wide(
                    m | (0x0400 & a >> 13) | (0x03ff & a >> 11),
                    m1 | (0x2000 & (a >> 9 ^ a >> 10 ^ 0x2000))
                        | (0x0800 & (a >> 10 ^ a >> 12 ^ 0x0800))
                        | (0x07ff & a),
                )
            }
        }
    }
}

/// One accepted operand shape of a mnemonic.
#[derive(Debug, Clone, Copy)]
pub struct Variant {
    pub operands: &'static [Conv],
    pub opcode: Opcode,
    pub pack: Pack,
}

/// A mnemonic and its variants, in priority order: the first variant whose converters all
/// accept the operands wins.
#[derive(Debug)]
pub struct Descriptor {
    pub name: &'static str,
    pub variants: &'static [Variant],
}

pub fn lookup(mnemonic: &str) -> Option<&'static Descriptor> {
    INSTRUCTIONS.iter().find(|d| d.name == mnemonic)
}

const fn v(operands: &'static [Conv], opcode: u16, pack: Pack) -> Variant {
    Variant {
        operands,
        opcode: Opcode::Narrow(opcode),
        pack,
    }
}

const fn w(operands: &'static [Conv], opcode: (u16, u16), pack: Pack) -> Variant {
    Variant {
        operands,
        opcode: Opcode::Wide(opcode.0, opcode.1),
        pack,
    }
}

const fn imm(bits: u32) -> Conv {
    Conv::Imm { bits, shift: 0 }
}

const RLO: Conv = Conv::LowReg;
const RLH: Conv = Conv::AnyReg;
const RSP: Conv = Conv::StackPtr;
const COND: Conv = Conv::Cond;
const IMM3: Conv = imm(3);
const IMM4: Conv = imm(4);
const IMM5: Conv = imm(5);
const IMM8: Conv = imm(8);
const IMM16: Conv = imm(16);
const IMM7_2: Conv = Conv::Imm { bits: 7, shift: 2 };
const IMM8_2: Conv = Conv::Imm { bits: 8, shift: 2 };
const REGS_LO: Conv = Conv::RegSet(LOW_REGS);
const REGS_PC: Conv = Conv::RegSet(POP_REGS);
const REGS_LR: Conv = Conv::RegSet(PUSH_REGS);
const RLO_IMM5: Conv = Conv::LowRegImm { bits: 5, shift: 0 };
const RLO_IMM5_1: Conv = Conv::LowRegImm { bits: 5, shift: 1 };
const RLO_IMM5_2: Conv = Conv::LowRegImm { bits: 5, shift: 2 };
const RLO_RLO: Conv = Conv::LowRegPair;
const SP_IMM8_2: Conv = Conv::SpImm;
const LABEL_U8: Conv = Conv::DataLabel { bits: 8 };
const LABEL_S8: Conv = Conv::CodeLabel { bits: 8 };
const LABEL_S11: Conv = Conv::CodeLabel { bits: 11 };
const LABEL_S24: Conv = Conv::CodeLabel { bits: 24 };

macro_rules! instructions {
    ($($name:literal => [$($variant:expr),+ $(,)?]),* $(,)?) => {
        &[$(Descriptor { name: $name, variants: &[$($variant),+] }),*]
    };
}

use Pack::*;

/// The ARMv6-M instruction set.
pub static INSTRUCTIONS: &[Descriptor] = instructions! {
    "adcs"  => [v(&[RLO, RLO], 0x4140, At0At3)],
    "adds"  => [v(&[RLO, RLO, IMM3], 0x1c00, At0At3At6),
                v(&[RLO, IMM8], 0x3000, At8At0),
                v(&[RLO, RLO, RLO], 0x1800, At0At3At6)],
    // covers add(rdm, sp, rdm) and add(sp, rm) too
    "add"   => [v(&[RLH, RLH], 0x4400, HighRegs),
                v(&[RLO, RSP, IMM8_2], 0xa800, At8SkipAt0),
                v(&[RSP, IMM7_2], 0xb000, SkipAt0)],
    "adr"   => [v(&[RLO, LABEL_U8], 0xa000, At8At0)],
    "ands"  => [v(&[RLO, RLO], 0x4000, At0At3)],
    "asrs"  => [v(&[RLO, RLO, IMM5], 0x1000, At0At3At6),
                v(&[RLO, RLO], 0x4100, At0At3)],
    "b"     => [v(&[COND, LABEL_S8], 0xd000, At8At0),
                v(&[LABEL_S11], 0xe000, At0)],
    "bic"   => [v(&[RLO, RLO], 0x4380, At0At3)],
    "bics"  => [v(&[RLO, RLO], 0x4380, At0At3)],
    "bkpt"  => [v(&[IMM8], 0xbe00, At0)],
    "bl"    => [w(&[LABEL_S24], (0xf000, 0xd000), WideBl)],
    "blx"   => [v(&[RLH], 0x4780, At3)],
    "bx"    => [v(&[RLH], 0x4700, At3)],
    "cmn"   => [v(&[RLO, RLO], 0x42c0, At0At3)],
    "cmp"   => [v(&[RLO, IMM8], 0x2800, At8At0),
                v(&[RLO, RLO], 0x4280, At0At3),
                v(&[RLH, RLH], 0x4500, HighRegs)],
    "dmb"   => [w(&[IMM4], (0xf3bf, 0x8f50), WideAt0)],
    "dsb"   => [w(&[IMM4], (0xf3bf, 0x8f40), WideAt0)],
    "eors"  => [v(&[RLO, RLO], 0x4040, At0At3)],
    "isb"   => [w(&[IMM4], (0xf3bf, 0x8f60), WideAt0)],
    "ldm"   => [v(&[RLO, REGS_LO], 0xc800, At8At0)],
    "ldr"   => [v(&[RLO, RLO_IMM5_2], 0x6800, At0At3At6),
                v(&[RLO, SP_IMM8_2], 0x9800, At8At0),
                v(&[RLO, LABEL_U8], 0x4800, At8At0),
                v(&[RLO, RLO_RLO], 0x5800, At0At3At6)],
    "ldrb"  => [v(&[RLO, RLO_IMM5], 0x7800, At0At3At6),
                v(&[RLO, RLO_RLO], 0x5c00, At0At3At6)],
    "ldrh"  => [v(&[RLO, RLO_IMM5_1], 0x8800, At0At3At6),
                v(&[RLO, RLO_RLO], 0x5a00, At0At3At6)],
    "ldrsb" => [v(&[RLO, RLO_RLO], 0x5600, At0At3At6)],
    "ldrsh" => [v(&[RLO, RLO_RLO], 0x5e00, At0At3At6)],
    "lsls"  => [v(&[RLO, RLO, IMM5], 0x0000, At0At3At6),
                v(&[RLO, RLO], 0x4080, At0At3)],
    "lsrs"  => [v(&[RLO, RLO, IMM5], 0x0800, At0At3At6),
                v(&[RLO, RLO], 0x40c0, At0At3)],
    // the register form is lsls #0
    "movs"  => [v(&[RLO, IMM8], 0x2000, At8At0),
                v(&[RLO, RLO], 0x0000, At0At3)],
    "mov"   => [v(&[RLH, RLH], 0x4600, HighRegs)],
    "mrs"   => [w(&[RLH, IMM8], (0xf3ef, 0x8000), WideMrs)],
    "msr"   => [w(&[RLH, IMM8], (0xf380, 0x8800), WideMsr)],
    // muls(rdm, rn): rn goes to bits 3-5
    "muls"  => [v(&[RLO, RLO], 0x4340, At0At3)],
    "mvn"   => [v(&[RLO, RLO], 0x43c0, At0At3)],
    "mvns"  => [v(&[RLO, RLO], 0x43c0, At0At3)],
    "nop"   => [v(&[], 0xbf00, Bare)],
    "orrs"  => [v(&[RLO, RLO], 0x4300, At0At3)],
    "pop"   => [v(&[REGS_PC], 0xbc00, At0)],
    "push"  => [v(&[REGS_LR], 0xb400, At0)],
    "rev"   => [v(&[RLO, RLO], 0xba00, At0At3)],
    "rev16" => [v(&[RLO, RLO], 0xba40, At0At3)],
    "revsh" => [v(&[RLO, RLO], 0xbac0, At0At3)],
    "rors"  => [v(&[RLO, RLO], 0x41c0, At0At3)],
    "rsbs"  => [v(&[RLO, RLO], 0x4240, At0At3)],
    "sbcs"  => [v(&[RLO, RLO], 0x4180, At0At3)],
    "sev"   => [v(&[], 0xbf40, Bare)],
    "stm"   => [v(&[RLO, REGS_LO], 0xc000, At8At0)],
    "str"   => [v(&[RLO, RLO_IMM5_2], 0x6000, At0At3At6),
                v(&[RLO, SP_IMM8_2], 0x9000, At8At0),
                v(&[RLO, RLO_RLO], 0x5000, At0At3At6)],
    "strb"  => [v(&[RLO, RLO_IMM5], 0x7000, At0At3At6),
                v(&[RLO, RLO_RLO], 0x5400, At0At3At6)],
    "strh"  => [v(&[RLO, RLO_IMM5_1], 0x8000, At0At3At6),
                v(&[RLO, RLO_RLO], 0x5200, At0At3At6)],
    "subs"  => [v(&[RLO, RLO, IMM3], 0x1e00, At0At3At6),
                v(&[RLO, IMM8], 0x3800, At8At0),
                v(&[RLO, RLO, RLO], 0x1a00, At0At3At6)],
    "sub"   => [v(&[RSP, IMM7_2], 0xb080, SkipAt0)],
    "svc"   => [v(&[IMM8], 0xdf00, At0)],
    "sxtb"  => [v(&[RLO, RLO], 0xb240, At0At3)],
    "sxth"  => [v(&[RLO, RLO], 0xb200, At0At3)],
    "tst"   => [v(&[RLO, RLO], 0x4200, At0At3)],
    "udf"   => [v(&[IMM8], 0xde00, At0)],
    "udf.w" => [w(&[IMM16], (0xf7f0, 0xa000), WideUdf)],
    "uxtb"  => [v(&[RLO, RLO], 0xb2c0, At0At3)],
    "uxth"  => [v(&[RLO, RLO], 0xb280, At0At3)],
    "wfe"   => [v(&[], 0xbf20, Bare)],
    "wfi"   => [v(&[], 0xbf30, Bare)],
    "yield" => [v(&[], 0xbf10, Bare)],
};
