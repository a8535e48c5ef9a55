
use std::collections::HashSet;

/// Identity of a DNA fragment end: molecular tag, adjusted 5' position and
/// strand. Two reads with equal keys are PCR copies of the same molecule.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SeenKey {
	pub tag: String,
	pub pos: i64,
	pub reverse: bool
}

impl SeenKey {
	pub fn new(tag: &str, pos: i64, reverse: bool) -> SeenKey {
		SeenKey { tag: tag.into(), pos, reverse }
	}
}

// Keys seen so far in the current run. Grows for the duration of one pass
// and is dropped with the run.
#[derive(Debug, Default)]
pub struct DuplicateTracker {
	seen: HashSet<SeenKey>,
	duplicates: u64
}

impl DuplicateTracker {
	pub fn new() -> DuplicateTracker { DuplicateTracker::default() }

	/// Returns true if the key was not seen before (keep the read), false if
	/// it is a duplicate (drop it). Duplicates leave the set unchanged.
	pub fn test_and_insert(&mut self, key: SeenKey) -> bool {
		let inserted = self.seen.insert(key);
		if !inserted { self.duplicates += 1; }
		inserted
	}

	pub fn duplicates(&self) -> u64 { self.duplicates }

	pub fn unique(&self) -> usize { self.seen.len() }
}
