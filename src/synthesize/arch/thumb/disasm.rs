//! Inverse of the encoders: recovers the operands of an instruction from its words, given the
//! variant it was encoded with.
//!
//! Label operands come back as the absolute target address (an [`Operand::Imm`]), since names
//! are not part of the code.

use num_traits::FromPrimitive;

use crate::synthesize::arch::thumb::{
    instr::{Opcode, Pack, Variant},
    operand::{Conv, Operand},
    reg::{Condition, RegList, Register, SP},
};

/// Decodes `words`, located at `pc`, as `variant`.
///
/// Returns `None` when the words do not carry the variant's opcode.
pub fn decode(variant: &Variant, pc: u32, words: &[u16]) -> Option<Vec<Operand>> {
    let fields = unpack(variant.pack, variant.opcode, words)?;

    let mut fields = fields.into_iter();
    variant
        .operands
        .iter()
        .map(|conv| recover(*conv, pc, &mut fields))
        .collect()
}

fn unpack(pack: Pack, opcode: Opcode, words: &[u16]) -> Option<Vec<u32>> {
    let (m0, m1, w0, w1) = match (opcode, words) {
        (Opcode::Narrow(m0), [w0]) => (m0, 0, *w0, 0),
        (Opcode::Wide(m0, m1), [w0, w1]) => (m0, m1, *w0, *w1),
        _ => return None,
    };

    if w0 & m0 != m0 || w1 & m1 != m1 {
        return None;
    }

    let v0 = u32::from(w0 & !m0);
    let v1 = u32::from(w1 & !m1);

    let fields = match pack {
        Pack::Bare => vec![],
        Pack::At0 => vec![v0],
        Pack::At3 => vec![v0 >> 3],
        Pack::At0At3 => vec![v0 & 0x7, v0 >> 3],
        Pack::At0At3At6 => vec![v0 & 0x7, (v0 >> 3) & 0x7, v0 >> 6],
        Pack::At8At0 => vec![v0 >> 8, v0 & 0xff],
        Pack::At8SkipAt0 => vec![v0 >> 8, 0, v0 & 0xff],
        Pack::SkipAt0 => vec![0, v0],
        Pack::HighRegs => vec![(v0 & 0x80) >> 4 | (v0 & 0x7), (v0 >> 3) & 0xf],
        Pack::WideAt0 => vec![v1],
        Pack::WideMrs => vec![v1 >> 8, v1 & 0xff],
        Pack::WideMsr => vec![v0, v1],
        Pack::WideUdf => vec![v0 << 12 | v1],
        Pack::WideBl => {
            let s = (v0 >> 10) & 1;
            let j1 = (v1 >> 13) & 1;
            let j2 = (v1 >> 11) & 1;
            let i1 = !(j1 ^ s) & 1;
            let i2 = !(j2 ^ s) & 1;
            vec![s << 23 | i1 << 22 | i2 << 21 | (v0 & 0x3ff) << 11 | (v1 & 0x7ff)]
        }
    };

    Some(fields)
}

fn recover(conv: Conv, pc: u32, fields: &mut impl Iterator<Item = u32>) -> Option<Operand> {
    let mut next = || fields.next();

    let operand = match conv {
        Conv::LowReg | Conv::AnyReg => Operand::Reg(Register::from_u32(next()?)?),
        Conv::StackPtr => {
            next()?;
            Operand::Reg(SP)
        }
        Conv::Cond => Operand::Cond(Condition::from_u32(next()?)?),
        Conv::Imm { shift, .. } => Operand::Imm(i64::from(next()? << shift)),
        Conv::RegSet(allowed) => {
            let mask = next()?;
            Operand::Regs(
                allowed
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, reg)| *reg)
                    .collect::<RegList>(),
            )
        }
        Conv::LowRegImm { shift, .. } => {
            let base = Register::from_u32(next()?)?;
            Operand::indexed(base, i64::from(next()? << shift))
        }
        Conv::LowRegPair => {
            let base = Register::from_u32(next()?)?;
            let index = Register::from_u32(next()?)?;
            Operand::indexed(base, index)
        }
        Conv::SpImm => Operand::indexed(SP, i64::from(next()? << 2)),
        Conv::CodeLabel { bits } => {
            let unused = 64 - bits;
            let halfwords = (i64::from(next()?) << unused) >> unused;
            Operand::Imm(i64::from(pc) + 4 + 2 * halfwords)
        }
        Conv::DataLabel { .. } => {
            Operand::Imm(i64::from((pc + 4) / 4 * 4) + 4 * i64::from(next()?))
        }
    };

    Some(operand)
}
