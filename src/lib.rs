//! An assembler for ARMv6-M Thumb code, driven from Rust.
//!
//! A routine is written as a closure that calls one [`Assembler`] method per instruction or
//! directive. [`assemble`] runs it twice so that labels can be used before they are defined,
//! and returns the finished [`MachineCode`].
//!
//! ```
//! use thumbsmith::{R0, R1, assemble};
//!
//! let add = assemble(|asm| {
//!     asm.args_to_regs(2)?;
//!     asm.adds((R0, R0, R1))
//! })
//! .unwrap();
//!
//! assert_eq!(add.words, [0xb500, 0x6838, 0x6879, 0x1840, 0xbd00]);
//! assert_eq!(add.arg_count, Some(2));
//! ```

pub use crate::{
    error::Error,
    synthesize::{
        arch::{
            MachineCode,
            thumb::{
                Assembler, MAX_ARGS, PASSES, assemble,
                operand::{IntoOperands, Operand},
                reg::{Condition, LR, PC, RegList, Register, Register::*, SP},
            },
        },
        launch::{DummyLauncher, Launcher, run_native, trampoline},
    },
};

mod error;
pub mod synthesize;
