use tracing::{debug, trace};

use crate::{
    Error,
    synthesize::arch::{
        MachineCode,
        thumb::{
            instr::Words,
            label::LabelTable,
            operand::{IntoOperands, Operand},
            reg::{LOW_REGS, RegList, Register},
        },
    },
};

pub mod disasm;
pub mod instr;
pub mod label;
pub mod operand;
pub mod reg;

/// Every build runs its script this many times. Pass 1 only collects label addresses.
pub const PASSES: usize = 2;

/// Upper limit for [`Assembler::argcount`].
pub const MAX_ARGS: usize = 6;

/// Assembles `script` into a callable routine.
///
/// The script runs once per pass against the same [`Assembler`]. Each pass is wrapped in
/// `push {lr}` / `pop {pc}`, so the result can be called like a function. The script must
/// emit the same code on every pass; only label values may differ.
pub fn assemble<F>(mut script: F) -> Result<MachineCode, Error>
where
    F: FnMut(&mut Assembler) -> Result<(), Error>,
{
    let mut asm = Assembler::default();
    let mut first_pass_len = None;

    for pass in 1..=PASSES {
        asm.begin_pass();

        asm.push(RegList::LR)?;
        script(&mut asm)?;
        asm.pop(RegList::PC)?;

        debug!(
            pass,
            words = asm.words.len(),
            labels = asm.labels.len(),
            "pass finished"
        );

        match first_pass_len {
            None => first_pass_len = Some(asm.words.len()),
            Some(first) if first != asm.words.len() => {
                return Err(Error::PassSizeMismatch {
                    first,
                    second: asm.words.len(),
                });
            }
            Some(_) => (),
        }
    }

    let unresolved = asm.labels.unresolved();
    if !unresolved.is_empty() {
        return Err(Error::UndefinedLabel(unresolved));
    }

    Ok(MachineCode {
        words: asm.words,
        arg_count: asm.arg_count,
    })
}

/// State of one build: the code emitted so far in the current pass, and the labels.
///
/// Instructions are emitted with [`instr`](Self::instr) or the method named after the mnemonic.
/// Operands are given as `()`, a single operand, or a tuple:
///
/// ```
/// use thumbsmith::{Condition, R0, R1, assemble};
///
/// let code = assemble(|asm| {
///     asm.movs((R0, 0))?;
///     asm.label("loop")?;
///     asm.adds((R0, 1))?;
///     asm.cmp((R0, R1))?;
///     asm.b((Condition::Ne, "loop"))?;
///     Ok(())
/// })
/// .unwrap();
///
/// assert_eq!(code.words, [0xb500, 0x2000, 0x3001, 0x4288, 0xd1fc, 0xbd00]);
/// ```
#[derive(Debug, Default)]
pub struct Assembler {
    pc: u32,
    words: Vec<u16>,
    labels: LabelTable,
    arg_count: Option<u8>,
}

impl Assembler {
    /// Byte offset of the next emitted word.
    pub fn pc(&self) -> u32 {
        self.pc
    }

    fn begin_pass(&mut self) {
        self.pc = 0;
        self.words.clear();
        self.labels.begin_pass();
    }

    fn emit(&mut self, words: &[u16]) {
        self.words.extend_from_slice(words);
        self.pc += 2 * words.len() as u32;
    }

    /// Emits `mnemonic` with the first variant that accepts `operands`.
    pub fn instr(&mut self, mnemonic: &str, operands: impl IntoOperands) -> Result<(), Error> {
        let operands = operands.into_operands();
        let descriptor = instr::lookup(mnemonic)
            .ok_or_else(|| Error::UnknownMnemonic(mnemonic.to_owned()))?;

        self.align(2)?;

        for variant in descriptor.variants {
            if variant.operands.len() != operands.len() {
                continue;
            }

            // every converter runs, so label references are recorded even on a mismatch
            let mut fields = Vec::with_capacity(variant.pack.fields());
            let mut matched = true;
            for (conv, operand) in variant.operands.iter().zip(&operands) {
                match conv.convert(operand, self.pc, &mut self.labels)? {
                    Some(field) => field.push_to(&mut fields),
                    None => matched = false,
                }
            }

            if !matched {
                continue;
            }

            let words = variant.pack.encode(variant.opcode, &fields);
            trace!(mnemonic, pc = self.pc, ?words, "emit");
            self.emit_words(words);
            return Ok(());
        }

        Err(Error::UnmatchedInstructionShape {
            mnemonic: mnemonic.to_owned(),
            operands: operands
                .iter()
                .map(Operand::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    fn emit_words(&mut self, words: Words) {
        self.emit(words.as_slice());
    }
}

/// Directives
impl Assembler {
    /// Binds `name` to the current pc. Any non-empty name is accepted.
    pub fn label(&mut self, name: &str) -> Result<(), Error> {
        if name.is_empty() {
            return Err(Error::InvalidLabelName(name.to_owned()));
        }

        self.labels.define(name, self.pc);
        Ok(())
    }

    /// Pads with a zero halfword up to the next multiple of `n` bytes.
    pub fn align(&mut self, n: u32) -> Result<(), Error> {
        if !matches!(n, 1 | 2 | 4) {
            return Err(Error::UnsupportedAlignment(n));
        }

        if !self.pc.is_multiple_of(n) {
            self.emit(&[0]);
        }

        Ok(())
    }

    /// Emits `values` as little-endian data items of `size` bytes, after aligning to `size`.
    ///
    /// Values may be given signed or unsigned, so the accepted range for `size` bytes is
    /// `-2^(8*size-1)..2^(8*size)`. Bytes are packed two per halfword; an odd trailing byte is
    /// padded with zero.
    pub fn data(&mut self, size: usize, values: &[i64]) -> Result<(), Error> {
        if !matches!(size, 1 | 2 | 4) {
            return Err(Error::UnsupportedDataSize(size));
        }

        self.align(size as u32)?;

        let bits = 8 * size as u32;
        if let Some(&value) = values
            .iter()
            .find(|&&v| v < -(1 << (bits - 1)) || v >= 1 << bits)
        {
            return Err(Error::DataOutOfBound { size, value });
        }

        let words: Vec<u16> = match size {
            1 => values
                .chunks(2)
                .map(|pair| {
                    let lo = pair[0] & 0xff;
                    let hi = pair.get(1).map_or(0, |b| b & 0xff);
                    (lo | hi << 8) as u16
                })
                .collect(),
            2 => values.iter().map(|&v| v as u16).collect(),
            _ => values
                .iter()
                .flat_map(|&v| [(v & 0xffff) as u16, ((v >> 16) & 0xffff) as u16])
                .collect(),
        };

        self.emit(&words);
        Ok(())
    }

    /// Declares how many word arguments the routine expects.
    pub fn argcount(&mut self, n: usize) -> Result<(), Error> {
        if n > MAX_ARGS {
            return Err(Error::TooManyArguments(n));
        }

        self.arg_count = Some(n as u8);
        Ok(())
    }
}

/// Macros
impl Assembler {
    /// Declares `n` arguments and loads them into `r0`..`r(n-1)`.
    ///
    /// On entry `r7` points at the argument buffer, see [`launch`](crate::synthesize::launch).
    pub fn args_to_regs(&mut self, n: usize) -> Result<(), Error> {
        self.argcount(n)?;

        for (i, reg) in LOW_REGS.iter().take(n).enumerate() {
            self.ldr((*reg, (Register::R7, 4 * i as i64)))?;
        }

        Ok(())
    }
}

macro_rules! mnemonics {
    ($($method:ident $(($operands:tt))? => $name:literal),* $(,)?) => {
        /// Instructions
        impl Assembler {
            $(mnemonics!(@method $method $(($operands))? => $name);)*
        }
    };
    (@method $method:ident => $name:literal) => {
        #[doc = concat!("Emits `", $name, "`.")]
        pub fn $method(&mut self, operands: impl IntoOperands) -> Result<(), Error> {
            self.instr($name, operands)
        }
    };
    (@method $method:ident (none) => $name:literal) => {
        #[doc = concat!("Emits `", $name, "`.")]
        pub fn $method(&mut self) -> Result<(), Error> {
            self.instr($name, ())
        }
    };
}

mnemonics! {
    adcs => "adcs",
    adds => "adds",
    add => "add",
    adr => "adr",
    ands => "ands",
    asrs => "asrs",
    b => "b",
    bic => "bic",
    bics => "bics",
    bkpt => "bkpt",
    bl => "bl",
    blx => "blx",
    bx => "bx",
    cmn => "cmn",
    cmp => "cmp",
    dmb => "dmb",
    dsb => "dsb",
    eors => "eors",
    isb => "isb",
    ldm => "ldm",
    ldr => "ldr",
    ldrb => "ldrb",
    ldrh => "ldrh",
    ldrsb => "ldrsb",
    ldrsh => "ldrsh",
    lsls => "lsls",
    lsrs => "lsrs",
    movs => "movs",
    mov => "mov",
    mrs => "mrs",
    msr => "msr",
    muls => "muls",
    mvn => "mvn",
    mvns => "mvns",
    nop(none) => "nop",
    orrs => "orrs",
    pop => "pop",
    push => "push",
    rev => "rev",
    rev16 => "rev16",
    revsh => "revsh",
    rors => "rors",
    rsbs => "rsbs",
    sbcs => "sbcs",
    sev(none) => "sev",
    stm => "stm",
    str => "str",
    strb => "strb",
    strh => "strh",
    subs => "subs",
    sub => "sub",
    svc => "svc",
    sxtb => "sxtb",
    sxth => "sxth",
    tst => "tst",
    udf => "udf",
    udf_w => "udf.w",
    uxtb => "uxtb",
    uxth => "uxth",
    wfe(none) => "wfe",
    wfi(none) => "wfi",
    r#yield(none) => "yield",
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesize::arch::thumb::reg::{Condition, LR, Register::*, SP};

    /// Runs `script` as a single pass, without prologue or epilogue.
    fn one_pass(script: impl FnOnce(&mut Assembler) -> Result<(), Error>) -> Assembler {
        let mut asm = Assembler::default();
        script(&mut asm).unwrap();
        asm
    }

    // ---- dispatch ----

    #[test]
    fn first_matching_variant_wins() {
        let asm = one_pass(|asm| {
            asm.adds((R1, R2, 3))?; // register + imm3
            asm.adds((R0, 200))?; // imm8
            asm.adds((R0, R1, R2))?; // three registers
            asm.movs((R0, R1))?;
            asm.cmp((R0, R1))?;
            asm.cmp((R8, R1))
        });

        assert_eq!(asm.words, [0x1cd1, 0x30c8, 0x1888, 0x0008, 0x4288, 0x4588]);
        assert_eq!(asm.pc(), 12);
    }

    #[test]
    fn memory_forms() {
        let asm = one_pass(|asm| {
            asm.ldr((R0, (R7, 4)))?;
            asm.ldr((R1, (SP, 8)))?;
            asm.ldr((R2, (R3, R4)))?;
            asm.strb((R1, (R2, 31)))?;
            asm.strh((R1, (R2, 62)))?;
            asm.str((R5, (SP, 0)))
        });

        assert_eq!(asm.words, [0x6878, 0x9902, 0x591a, 0x77d1, 0x87d1, 0x9500]);
    }

    #[test]
    fn stack_pointer_arithmetic() {
        let asm = one_pass(|asm| {
            asm.add((R0, SP, 4))?;
            asm.add((SP, 8))?;
            asm.sub((SP, 8))?;
            asm.add((SP, R1))
        });

        assert_eq!(asm.words, [0xa801, 0xb002, 0xb082, 0x448d]);
    }

    #[test]
    fn shifts_and_signed_loads() {
        let asm = one_pass(|asm| {
            asm.asrs((R1, R2))?;
            asm.asrs((R1, R2, 3))?;
            asm.ldrsh((R0, (R1, R2)))?;
            asm.ldrsb((R0, (R1, R2)))
        });

        assert_eq!(asm.words, [0x4111, 0x10d1, 0x5e88, 0x5688]);
    }

    #[test]
    fn flag_setting_aliases() {
        let aliases = one_pass(|asm| {
            asm.mvns((R0, R1))?;
            asm.bics((R2, R3))
        });
        let plain = one_pass(|asm| {
            asm.mvn((R0, R1))?;
            asm.bic((R2, R3))
        });

        assert_eq!(aliases.words, [0x43c8, 0x439a]);
        assert_eq!(aliases.words, plain.words);
    }

    #[test]
    fn zero_operand_methods() {
        let asm = one_pass(|asm| {
            asm.nop()?;
            asm.r#yield()?;
            asm.wfi()?;
            asm.bx(LR)
        });

        assert_eq!(asm.words, [0xbf00, 0xbf10, 0xbf30, 0x4770]);
    }

    #[test]
    fn unknown_mnemonic_is_an_error() {
        let mut asm = Assembler::default();
        assert_eq!(
            asm.instr("frobs", ()),
            Err(Error::UnknownMnemonic("frobs".to_owned()))
        );
    }

    #[test]
    fn unmatched_shape_names_mnemonic_and_operands() {
        let mut asm = Assembler::default();
        assert_eq!(
            asm.movs((R8, 1)),
            Err(Error::UnmatchedInstructionShape {
                mnemonic: "movs".to_owned(),
                operands: "r8, 1".to_owned(),
            })
        );
        assert_eq!(asm.pc(), 0);
        assert!(asm.words.is_empty());
    }

    #[test]
    fn arity_is_part_of_the_shape() {
        let mut asm = Assembler::default();
        assert!(asm.b((Condition::Eq, "x", 1)).is_err());
        assert!(asm.nop().is_ok());
        assert!(asm.instr("nop", (R0,)).is_err());
    }

    // ---- directives ----

    #[test]
    fn align_pads_one_halfword() {
        let mut asm = Assembler::default();
        asm.nop().unwrap();
        asm.align(4).unwrap();
        assert_eq!(asm.words, [0xbf00, 0x0000]);
        assert_eq!(asm.pc(), 4);

        asm.align(4).unwrap();
        assert_eq!(asm.pc(), 4);
        assert_eq!(asm.words.len(), 2);
    }

    #[test]
    fn align_rejects_other_sizes() {
        let mut asm = Assembler::default();
        assert_eq!(asm.align(8), Err(Error::UnsupportedAlignment(8)));
        assert_eq!(asm.align(0), Err(Error::UnsupportedAlignment(0)));
        assert!(asm.align(1).is_ok());
    }

    #[test]
    fn bytes_pack_little_endian() {
        let mut asm = Assembler::default();
        asm.data(1, &[0x11, 0x22, 0x33]).unwrap();
        assert_eq!(asm.words, [0x2211, 0x0033]);
        assert_eq!(asm.pc(), 4);
    }

    #[test]
    fn negative_bytes_and_halfwords() {
        let mut asm = Assembler::default();
        asm.data(1, &[-1, 1]).unwrap();
        asm.data(2, &[-2, 0xffff]).unwrap();
        assert_eq!(asm.words, [0x01ff, 0xfffe, 0xffff]);
    }

    #[test]
    fn words_split_into_halfwords_after_alignment() {
        let mut asm = Assembler::default();
        asm.nop().unwrap();
        asm.data(4, &[0x1234_5678, -1]).unwrap();
        assert_eq!(asm.words, [0xbf00, 0x0000, 0x5678, 0x1234, 0xffff, 0xffff]);
        assert_eq!(asm.pc(), 12);
    }

    #[test]
    fn data_bounds() {
        let mut asm = Assembler::default();
        assert_eq!(
            asm.data(1, &[0, 256]),
            Err(Error::DataOutOfBound { size: 1, value: 256 })
        );
        assert_eq!(
            asm.data(2, &[-32769]),
            Err(Error::DataOutOfBound { size: 2, value: -32769 })
        );
        assert_eq!(
            asm.data(4, &[1 << 32]),
            Err(Error::DataOutOfBound {
                size: 4,
                value: 1 << 32
            })
        );
        assert_eq!(
            asm.data(4, &[-(1 << 31) - 1]),
            Err(Error::DataOutOfBound {
                size: 4,
                value: -(1 << 31) - 1
            })
        );
        assert_eq!(asm.data(3, &[1]), Err(Error::UnsupportedDataSize(3)));
        assert!(asm.data(1, &[-128, 255]).is_ok());
        assert!(asm.data(4, &[-(1 << 31), (1 << 32) - 1]).is_ok());
    }

    #[test]
    fn label_names() {
        let mut asm = Assembler::default();
        for name in ["loop", "_start.1", "loop-1", "1", "L$0", "my label"] {
            assert_eq!(asm.label(name), Ok(()), "{name}");
        }
        assert_eq!(asm.label(""), Err(Error::InvalidLabelName(String::new())));
    }

    #[test]
    fn free_form_labels_resolve() {
        for name in ["loop-1", "1", "L$0", "my label"] {
            let code = assemble(|asm| {
                asm.label(name)?;
                asm.b((Condition::Al, name))
            })
            .unwrap();
            assert_eq!(code.words, [0xb500, 0xdefe, 0xbd00], "{name}");
        }
    }

    #[test]
    fn argcount_limit() {
        let mut asm = Assembler::default();
        assert_eq!(asm.argcount(7), Err(Error::TooManyArguments(7)));
        assert_eq!(asm.arg_count, None);
        asm.argcount(6).unwrap();
        assert_eq!(asm.arg_count, Some(6));
    }

    #[test]
    fn args_to_regs_loads_from_r7() {
        let asm = one_pass(|asm| asm.args_to_regs(3));
        assert_eq!(asm.words, [0x6838, 0x6879, 0x68ba]);
        assert_eq!(asm.arg_count, Some(3));
    }

    // ---- passes ----

    #[test]
    fn prologue_and_epilogue_wrap_the_script() {
        let code = assemble(|_| Ok(())).unwrap();
        assert_eq!(code.words, [0xb500, 0xbd00]);
        assert_eq!(code.arg_count, None);
    }

    #[test]
    fn forward_reference_resolves_on_second_pass() {
        let code = assemble(|asm| {
            asm.b((Condition::Eq, "done"))?;
            asm.nop()?;
            asm.nop()?;
            asm.label("done")
        })
        .unwrap();

        // b at 2, target 8: (8 - 6) / 2 = 1
        assert_eq!(code.words, [0xb500, 0xd001, 0xbf00, 0xbf00, 0xbd00]);
    }

    #[test]
    fn size_change_between_passes_is_fatal() {
        let mut pass = 0;
        let result = assemble(|asm| {
            pass += 1;
            if pass == 2 {
                asm.nop()?;
            }
            Ok(())
        });

        assert_eq!(
            result,
            Err(Error::PassSizeMismatch {
                first: 2,
                second: 3
            })
        );
    }

    #[test]
    fn undefined_labels_are_listed() {
        let result = assemble(|asm| {
            asm.b("nowhere")?;
            asm.bl("elsewhere")?;
            asm.b("nowhere")
        });

        assert_eq!(
            result,
            Err(Error::UndefinedLabel(vec![
                "nowhere".to_owned(),
                "elsewhere".to_owned()
            ]))
        );
    }

    #[test]
    fn script_errors_abort_the_build() {
        let result = assemble(|asm| asm.argcount(9));
        assert_eq!(result, Err(Error::TooManyArguments(9)));
    }
}
