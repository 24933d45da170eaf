use bitflags::bitflags;
use num_derive::FromPrimitive;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// The sixteen core registers visible to ARMv6-M code.
///
/// `r13`..`r15` double as `sp`, `lr` and `pc`; both spellings parse, the alias is displayed.
#[repr(u32)]
#[derive(
    EnumIter,
    EnumString,
    Display,
    FromPrimitive,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[strum(serialize_all = "lowercase")]
pub enum Register {
    R0 = 0, // 1st argument / return value
    R1 = 1, // 2nd argument
    R2 = 2, // 3rd argument
    R3 = 3, // 4th argument
    R4 = 4, // callee-saved
    R5 = 5, // callee-saved
    R6 = 6, // callee-saved, argument count on entry
    R7 = 7, // callee-saved, argument buffer on entry
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12, // IP
    #[strum(to_string = "sp", serialize = "r13")]
    R13 = 13,
    #[strum(to_string = "lr", serialize = "r14")]
    R14 = 14,
    #[strum(to_string = "pc", serialize = "r15")]
    R15 = 15,
}

pub const SP: Register = Register::R13;
pub const LR: Register = Register::R14;
pub const PC: Register = Register::R15;

impl Register {
    pub fn number(self) -> u32 {
        self as u32
    }
}

use Register::*;

/// Registers reachable from 3-bit register fields.
pub const LOW_REGS: &[Register] = &[R0, R1, R2, R3, R4, R5, R6, R7];

/// Registers reachable from 4-bit register fields, in encoding order.
pub const ALL_REGS: &[Register] = &[
    R0, R1, R2, R3, R4, R5, R6, R7, R8, R9, R10, R11, R12, R13, R14, R15,
];

/// Register list accepted by `pop`: low registers, then `pc` in bit 8.
pub const POP_REGS: &[Register] = &[R0, R1, R2, R3, R4, R5, R6, R7, R15];

/// Register list accepted by `push`: low registers, then `lr` in bit 8.
pub const PUSH_REGS: &[Register] = &[R0, R1, R2, R3, R4, R5, R6, R7, R14];

/// Condition codes for conditional branches. The discriminant is the 4-bit encoding.
#[repr(u32)]
#[derive(
    EnumIter,
    EnumString,
    Display,
    FromPrimitive,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
)]
#[strum(serialize_all = "lowercase")]
pub enum Condition {
    Eq = 0x0,
    Ne = 0x1,
    Cs = 0x2, // HS
    Cc = 0x3, // LO
    Mi = 0x4,
    Pl = 0x5,
    Vs = 0x6,
    Vc = 0x7,
    Hi = 0x8,
    Ls = 0x9,
    Ge = 0xa,
    Lt = 0xb,
    Gt = 0xc,
    Le = 0xd,
    Al = 0xe,
}

bitflags! {
    /// A set of registers, as written between braces in `push {r4, lr}`.
    ///
    /// Bit `i` stands for register `ri`. How the set lands in the instruction depends on
    /// which registers the instruction allows, see [`Conv::RegSet`](super::operand::Conv::RegSet).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RegList: u16 {
        const R0  = 1 << 0;
        const R1  = 1 << 1;
        const R2  = 1 << 2;
        const R3  = 1 << 3;
        const R4  = 1 << 4;
        const R5  = 1 << 5;
        const R6  = 1 << 6;
        const R7  = 1 << 7;
        const R8  = 1 << 8;
        const R9  = 1 << 9;
        const R10 = 1 << 10;
        const R11 = 1 << 11;
        const R12 = 1 << 12;
        const SP  = 1 << 13;
        const LR  = 1 << 14;
        const PC  = 1 << 15;

        const LOW = 0x00ff;
    }
}

impl RegList {
    /// Registers in the set, lowest first.
    pub fn registers(self) -> impl Iterator<Item = Register> {
        Register::iter().filter(move |reg| self.contains(RegList::from(*reg)))
    }
}

impl From<Register> for RegList {
    fn from(reg: Register) -> Self {
        RegList::from_bits_retain(1 << reg.number())
    }
}

impl FromIterator<Register> for RegList {
    fn from_iter<I: IntoIterator<Item = Register>>(iter: I) -> Self {
        iter.into_iter()
            .fold(RegList::empty(), |set, reg| set | RegList::from(reg))
    }
}
