use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::Error;

/// How a label is addressed from an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    /// Branch targets: signed, halfword granular, relative to `pc + 4`.
    Code,
    /// Literal loads and `adr`: unsigned, word granular, relative to `pc + 4` rounded down to a
    /// multiple of 4.
    Data,
}

/// Label addresses of one build.
///
/// Addresses survive from pass to pass; references to labels that are not defined yet are
/// collected per pass.
#[derive(Debug, Default)]
pub struct LabelTable {
    addresses: HashMap<String, u32>,
    defined_this_pass: HashSet<String>,
    unresolved: Vec<String>,
}

impl LabelTable {
    pub fn begin_pass(&mut self) {
        self.defined_this_pass.clear();
        self.unresolved.clear();
    }

    pub fn define(&mut self, name: &str, address: u32) {
        if !self.defined_this_pass.insert(name.to_owned()) {
            warn!(label = name, address, "label redefined, later definition wins");
        }

        self.addresses.insert(name.to_owned(), address);
    }

    pub fn address(&self, name: &str) -> Option<u32> {
        self.addresses.get(name).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Names referenced before their definition in the current pass, first reference first.
    pub fn unresolved(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.unresolved
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect()
    }

    /// Encoded displacement from the instruction at `pc` to `name`.
    ///
    /// Unknown labels are recorded and resolve to a zero placeholder, to be fixed up by the next
    /// pass. A known label out of reach is a shape mismatch (`Ok(None)`).
    pub fn displacement(
        &mut self,
        name: &str,
        pc: u32,
        kind: LabelKind,
        bits: u32,
    ) -> Result<Option<u32>, Error> {
        let Some(target) = self.address(name) else {
            self.unresolved.push(name.to_owned());
            return Ok(Some(0));
        };

        let target = i64::from(target);
        let pc = i64::from(pc);

        let encoded = match kind {
            LabelKind::Code => {
                let distance = target - (pc + 4);
                ((-(1 << bits))..(1 << bits))
                    .contains(&distance)
                    .then(|| ((distance & ((1 << (bits + 1)) - 1)) >> 1) as u32)
            }
            LabelKind::Data => {
                if target % 4 != 0 {
                    return Err(Error::LabelMisalignment(name.to_owned()));
                }

                let distance = target - (pc + 4) / 4 * 4;
                (0..(1 << (bits + 2)))
                    .contains(&distance)
                    .then_some((distance >> 2) as u32)
            }
        };

        Ok(encoded)
    }
}
