use log::error;

use crate::osm::ElementKind;

use super::SynthesisError;

/// OSM formats carry signed 64-bit identifiers; anything above is unusable.
const MAX_ELEMENT_ID: u64 = i64::MAX.unsigned_abs();

/// Hands out identifiers per primitive kind: 1, 2, 3, ... and never reuses one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next_node: u64,
    next_way: u64,
    next_relation: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self {
            next_node: 1,
            next_way: 1,
            next_relation: 1,
        }
    }
}

impl IdAllocator {
    /// Allocate the next identifier for `kind`.
    ///
    /// Exhausting the identifier space is fatal for the run because it would
    /// break identifier uniqueness.
    pub fn allocate(&mut self, kind: ElementKind) -> Result<u64, SynthesisError> {
        let counter = match kind {
            ElementKind::Node => &mut self.next_node,
            ElementKind::Way => &mut self.next_way,
            ElementKind::Relation => &mut self.next_relation,
        };
        let id = *counter;
        if id > MAX_ELEMENT_ID {
            error!(
                "Identifier space exhausted: kind={}, next={} (maximum {})",
                kind, id, MAX_ELEMENT_ID
            );
            return Err(SynthesisError::IdSpaceExhausted { kind });
        }
        *counter = id + 1;
        Ok(id)
    }

    /// Number of identifiers handed out so far for `kind`.
    #[must_use]
    pub const fn allocated(&self, kind: ElementKind) -> u64 {
        let next = match kind {
            ElementKind::Node => self.next_node,
            ElementKind::Way => self.next_way,
            ElementKind::Relation => self.next_relation,
        };
        next - 1
    }

    #[cfg(test)]
    pub(crate) const fn starting_at(next: u64) -> Self {
        Self {
            next_node: next,
            next_way: next,
            next_relation: next,
        }
    }
}
