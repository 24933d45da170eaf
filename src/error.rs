/// Everything that can abort a build or a call into built code.
///
/// None of these are transient: the build that produced one is discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unknown instruction `{0}`")]
    UnknownMnemonic(String),
    #[error("can't find match for operands ({operands}) to instruction `{mnemonic}`")]
    UnmatchedInstructionShape { mnemonic: String, operands: String },
    #[error("unsupported data size: {0}")]
    UnsupportedDataSize(usize),
    #[error("data out of bound: {value} does not fit in {size} byte(s)")]
    DataOutOfBound { size: usize, value: i64 },
    #[error("unsupported alignment: {0}")]
    UnsupportedAlignment(u32),
    #[error("invalid label name {0:?}")]
    InvalidLabelName(String),
    #[error("label not aligned mod 4: {0}")]
    LabelMisalignment(String),
    #[error("undefined label(s): {}", .0.join(", "))]
    UndefinedLabel(Vec<String>),
    #[error("too many arguments: {0} (at most 6)")]
    TooManyArguments(usize),
    #[error("code size changed between passes: {first} words, then {second} words")]
    PassSizeMismatch { first: usize, second: usize },
    #[error("expected arg count: {expected}  got: {got}")]
    ArgumentCountMismatch { expected: usize, got: usize },
}
