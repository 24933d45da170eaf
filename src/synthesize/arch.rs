pub mod thumb;

/// A finished routine: Thumb code plus the argument count it was declared with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachineCode {
    pub words: Vec<u16>,
    /// `None` accepts any number of arguments.
    pub arg_count: Option<u8>,
}

impl MachineCode {
    /// Size of the code in bytes.
    pub fn byte_len(&self) -> usize {
        2 * self.words.len()
    }

    /// The code as it sits in memory on a little-endian core.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }
}
