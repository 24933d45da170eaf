use std::fmt;

use derive_more::From;

use crate::{
    Error,
    synthesize::arch::thumb::{
        label::{LabelKind, LabelTable},
        reg::{ALL_REGS, Condition, LOW_REGS, RegList, Register, SP},
    },
};

/// One raw operand, as written by the caller of an instruction.
#[derive(Debug, Clone, PartialEq, Eq, From)]
pub enum Operand {
    Reg(Register),
    Cond(Condition),
    Imm(i64),
    Label(String),
    Regs(RegList),
    /// Bracketed operand group, as in `[r1, 4]` or `[r1, r2]`.
    List(Vec<Operand>),
}

impl Operand {
    /// Builds a bracketed `[base, offset]` operand.
    pub fn indexed(base: impl Into<Operand>, offset: impl Into<Operand>) -> Self {
        Operand::List(vec![base.into(), offset.into()])
    }
}

impl From<&str> for Operand {
    fn from(label: &str) -> Self {
        Operand::Label(label.to_owned())
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Imm(value.into())
    }
}

impl From<u32> for Operand {
    fn from(value: u32) -> Self {
        Operand::Imm(value.into())
    }
}

impl<A: Into<Operand>, B: Into<Operand>> From<(A, B)> for Operand {
    fn from((a, b): (A, B)) -> Self {
        Operand::indexed(a, b)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{reg}"),
            Operand::Cond(cond) => write!(f, "{cond}"),
            Operand::Imm(value) => write!(f, "{value}"),
            Operand::Label(name) => write!(f, "{name:?}"),
            Operand::Regs(set) => {
                let regs: Vec<String> = set.registers().map(|r| r.to_string()).collect();
                write!(f, "{{{}}}", regs.join(", "))
            }
            Operand::List(items) => {
                let items: Vec<String> = items.iter().map(|o| o.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

/// Anything that can stand in for the operand list of one instruction: `()`, a single
/// operand, or a tuple of up to three.
pub trait IntoOperands {
    fn into_operands(self) -> Vec<Operand>;
}

impl IntoOperands for () {
    fn into_operands(self) -> Vec<Operand> {
        Vec::new()
    }
}

impl IntoOperands for Vec<Operand> {
    fn into_operands(self) -> Vec<Operand> {
        self
    }
}

impl<A: Into<Operand>> IntoOperands for (A,) {
    fn into_operands(self) -> Vec<Operand> {
        vec![self.0.into()]
    }
}

impl<A: Into<Operand>, B: Into<Operand>> IntoOperands for (A, B) {
    fn into_operands(self) -> Vec<Operand> {
        vec![self.0.into(), self.1.into()]
    }
}

impl<A: Into<Operand>, B: Into<Operand>, C: Into<Operand>> IntoOperands for (A, B, C) {
    fn into_operands(self) -> Vec<Operand> {
        vec![self.0.into(), self.1.into(), self.2.into()]
    }
}

macro_rules! single_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoOperands for $ty {
                fn into_operands(self) -> Vec<Operand> {
                    vec![self.into()]
                }
            }
        )*
    };
}

single_operand!(Operand, Register, Condition, RegList, i32, i64, u32, &str, String);

/// Bits produced by one converter. Bracketed operands produce two fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    One(u32),
    Two(u32, u32),
}

impl Field {
    pub fn push_to(self, fields: &mut Vec<u32>) {
        match self {
            Field::One(a) => fields.push(a),
            Field::Two(a, b) => fields.extend([a, b]),
        }
    }
}

/// Operand converters: each classifies one raw operand and turns it into the bits an
/// encoder expects, or reports that the operand has the wrong shape (`Ok(None)`).
///
/// An `Err` is never a shape mismatch; it is a usage error that aborts the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conv {
    /// r0-r7
    LowReg,
    /// r0-r15
    AnyReg,
    /// sp only, contributes a zero field
    StackPtr,
    Cond,
    /// Unsigned `bits`-wide immediate whose low `shift` bits must be zero; stored shifted.
    Imm { bits: u32, shift: u32 },
    /// Register list over the allowed registers, one bit per register in table order.
    RegSet(&'static [Register]),
    /// `[rlo, imm]`
    LowRegImm { bits: u32, shift: u32 },
    /// `[rlo, rlo]`
    LowRegPair,
    /// `[sp, imm8 << 2]`, contributes the immediate only
    SpImm,
    /// Signed halfword displacement from `pc + 4`.
    CodeLabel { bits: u32 },
    /// Unsigned word displacement from `align(pc + 4, 4)`.
    DataLabel { bits: u32 },
}

impl Conv {
    /// Number of fields this converter contributes to the encoder.
    pub fn width(self) -> usize {
        match self {
            Conv::LowRegImm { .. } | Conv::LowRegPair => 2,
            _ => 1,
        }
    }

    pub fn convert(
        self,
        operand: &Operand,
        pc: u32,
        labels: &mut LabelTable,
    ) -> Result<Option<Field>, Error> {
        let field = match self {
            Conv::LowReg => reg_index(operand, LOW_REGS).map(Field::One),
            Conv::AnyReg => reg_index(operand, ALL_REGS).map(Field::One),
            Conv::StackPtr => reg_index(operand, &[SP]).map(Field::One),
            Conv::Cond => match operand {
                Operand::Cond(cond) => Some(Field::One(*cond as u32)),
                _ => None,
            },
            Conv::Imm { bits, shift } => imm(operand, bits, shift).map(Field::One),
            Conv::RegSet(allowed) => reg_set(operand, allowed).map(Field::One),
            Conv::LowRegImm { bits, shift } => pair(operand).and_then(|(base, offset)| {
                Some(Field::Two(
                    reg_index(base, LOW_REGS)?,
                    imm(offset, bits, shift)?,
                ))
            }),
            Conv::LowRegPair => pair(operand).and_then(|(base, index)| {
                Some(Field::Two(
                    reg_index(base, LOW_REGS)?,
                    reg_index(index, LOW_REGS)?,
                ))
            }),
            Conv::SpImm => pair(operand).and_then(|(base, offset)| {
                reg_index(base, &[SP])?;
                imm(offset, 8, 2).map(Field::One)
            }),
            Conv::CodeLabel { bits } => {
                return label(operand, pc, labels, LabelKind::Code, bits);
            }
            Conv::DataLabel { bits } => {
                return label(operand, pc, labels, LabelKind::Data, bits);
            }
        };

        Ok(field)
    }
}

fn reg_index(operand: &Operand, allowed: &[Register]) -> Option<u32> {
    let Operand::Reg(reg) = operand else {
        return None;
    };

    allowed.iter().position(|r| r == reg).map(|i| i as u32)
}

/// `bits`-wide unsigned immediate, pre-shifted by `shift`.
///
/// The upper bound is inclusive: `1 << bits` itself is accepted. Callers rely on this, so it
/// stays.
fn imm(operand: &Operand, bits: u32, shift: u32) -> Option<u32> {
    let Operand::Imm(value) = *operand else {
        return None;
    };

    if value & ((1 << shift) - 1) != 0 {
        return None;
    }

    let value = value >> shift;
    if value < 0 || value > (1 << bits) {
        return None;
    }

    Some(value as u32)
}

fn reg_set(operand: &Operand, allowed: &[Register]) -> Option<u32> {
    let Operand::Regs(set) = operand else {
        return None;
    };

    set.registers().try_fold(0, |mask, reg| {
        let bit = allowed.iter().position(|r| *r == reg)?;
        Some(mask | (1 << bit))
    })
}

fn pair(operand: &Operand) -> Option<(&Operand, &Operand)> {
    match operand {
        Operand::List(items) => match items.as_slice() {
            [a, b] => Some((a, b)),
            _ => None,
        },
        _ => None,
    }
}

fn label(
    operand: &Operand,
    pc: u32,
    labels: &mut LabelTable,
    kind: LabelKind,
    bits: u32,
) -> Result<Option<Field>, Error> {
    let Operand::Label(name) = operand else {
        return Ok(None);
    };

    Ok(labels.displacement(name, pc, kind, bits)?.map(Field::One))
}
