//! Calling convention for assembled routines.
//!
//! A routine is entered through a small trampoline: `r0` holds the routine address, `r1` the
//! number of arguments and `r2` the address of the argument buffer (32-bit words). The
//! trampoline sets the Thumb bit, moves the count to `r6` and the buffer to `r7`, and calls the
//! routine, whose result comes back in `r0`. [`Assembler::args_to_regs`] loads arguments from
//! that buffer.
//!
//! [`Assembler::args_to_regs`]: crate::synthesize::arch::thumb::Assembler::args_to_regs

use tracing::debug;

use crate::{
    Error,
    synthesize::arch::{
        MachineCode,
        thumb::{
            assemble,
            reg::{RegList, Register::*},
        },
    },
};

/// Host-provided way to run Thumb code.
pub trait Launcher {
    /// Runs `code` with `args` laid out as described in the [module docs](self), returning `r0`.
    fn launch(&self, code: &[u16], args: &[u32]) -> u32;
}

/// Launcher that runs nothing and returns 0. For builds whose code is only inspected.
#[derive(Default)]
pub struct DummyLauncher;

impl Launcher for DummyLauncher {
    fn launch(&self, _code: &[u16], _args: &[u32]) -> u32 {
        0
    }
}

/// Calls `code` with `args` through `launcher`, after checking the declared argument count.
pub fn run_native<L: Launcher>(
    launcher: &L,
    code: &MachineCode,
    args: &[u32],
) -> Result<u32, Error> {
    if let Some(expected) = code.arg_count
        && usize::from(expected) != args.len()
    {
        return Err(Error::ArgumentCountMismatch {
            expected: expected.into(),
            got: args.len(),
        });
    }

    debug!(words = code.words.len(), args = args.len(), "launching routine");
    Ok(launcher.launch(&code.words, args))
}

/// Assembles the trampoline described in the [module docs](self).
///
/// `r5`-`r7` are callee-saved, so they are preserved around the call; `r5` comes along to keep
/// the stack 8-byte aligned.
pub fn trampoline() -> Result<MachineCode, Error> {
    assemble(|asm| {
        asm.push(RegList::R5 | RegList::R6 | RegList::R7)?;
        asm.movs((R6, 1))?;
        asm.orrs((R0, R6))?;
        asm.mov((R6, R1))?;
        asm.mov((R7, R2))?;
        asm.blx(R0)?;
        asm.pop(RegList::R5 | RegList::R6 | RegList::R7)
    })
}
