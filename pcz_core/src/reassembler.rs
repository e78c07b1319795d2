//! Restoring chunk order after unordered completion.

use crate::error::{PipelineError, PipelineResult};
use crate::pool::ChunkResult;

/// Collects chunk results into pre-sized slots keyed by index.
///
/// Indices are dense and their count is known before dispatch, so a plain
/// `Vec` of slots is enough; completion order never matters.
#[derive(Debug)]
pub struct Reassembler {
    slots: Vec<Option<Vec<u8>>>,
    filled: usize,
}

impl Reassembler {
    /// Prepare slots for `expected` results.
    pub fn new(expected: usize) -> Self {
        Self {
            slots: vec![None; expected],
            filled: 0,
        }
    }

    /// Store one result in its slot.
    ///
    /// An out-of-range or already-filled index means the pool broke its
    /// one-result-per-chunk contract.
    pub fn insert(&mut self, result: ChunkResult) -> PipelineResult<()> {
        let expected = self.slots.len();
        let slot = self.slots.get_mut(result.index).ok_or_else(|| {
            PipelineError::Reassembly(format!(
                "result index {} out of range (expected {} chunks)",
                result.index, expected
            ))
        })?;
        if slot.is_some() {
            return Err(PipelineError::Reassembly(format!(
                "duplicate result for chunk {}",
                result.index
            )));
        }
        *slot = Some(result.bytes);
        self.filled += 1;
        Ok(())
    }

    /// Whether every slot has been filled.
    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// Concatenate all results in ascending index order.
    pub fn finish(self) -> PipelineResult<Vec<u8>> {
        if let Some(missing) = self.slots.iter().position(Option::is_none) {
            return Err(PipelineError::Reassembly(format!(
                "missing result for chunk {} ({} of {} received)",
                missing,
                self.filled,
                self.slots.len()
            )));
        }

        let total: usize = self.slots.iter().flatten().map(Vec::len).sum();
        let mut output = Vec::with_capacity(total);
        for bytes in self.slots.into_iter().flatten() {
            output.extend_from_slice(&bytes);
        }
        Ok(output)
    }
}

/// Order and concatenate `results`, which must cover indices `0..expected`
/// exactly once each.
pub fn assemble(
    expected: usize,
    results: impl IntoIterator<Item = ChunkResult>,
) -> PipelineResult<Vec<u8>> {
    let mut reassembler = Reassembler::new(expected);
    for result in results {
        reassembler.insert(result)?;
    }
    reassembler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: usize, bytes: &[u8]) -> ChunkResult {
        ChunkResult {
            index,
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_assemble_in_index_order() {
        let out = assemble(3, [result(2, b"c"), result(0, b"a"), result(1, b"bb")]).unwrap();
        assert_eq!(out, b"abbc");
    }

    #[test]
    fn test_every_permutation_gives_same_output() {
        let parts: [&[u8]; 4] = [b"zero ", b"one ", b"two ", b"three"];
        let expected = parts.concat();
        let orders = [[0, 1, 2, 3], [3, 2, 1, 0], [1, 3, 0, 2], [2, 0, 3, 1]];
        for order in orders {
            let results = order.iter().map(|&i| result(i, parts[i]));
            assert_eq!(assemble(4, results).unwrap(), expected, "order {order:?}");
        }
    }

    #[test]
    fn test_empty_assembles_to_empty() {
        assert!(assemble(0, Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut r = Reassembler::new(2);
        r.insert(result(0, b"a")).unwrap();
        let err = r.insert(result(0, b"a")).unwrap_err();
        assert!(err.to_string().contains("duplicate"), "got: {err}");
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut r = Reassembler::new(2);
        assert!(matches!(
            r.insert(result(5, b"x")),
            Err(PipelineError::Reassembly(_))
        ));
    }

    #[test]
    fn test_gap_rejected() {
        let mut r = Reassembler::new(3);
        r.insert(result(0, b"a")).unwrap();
        r.insert(result(2, b"c")).unwrap();
        assert!(!r.is_complete());
        let err = r.finish().unwrap_err();
        assert!(err.to_string().contains("missing result for chunk 1"), "got: {err}");
    }
}
