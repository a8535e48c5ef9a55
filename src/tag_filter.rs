
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use crate::errors::DedupError;

/// Decides which identifier tags are eligible for deduplication.
#[derive(Clone, Debug)]
pub enum TagFilter {
	/// Tag must appear in the whitelist exactly (case-sensitive).
	Whitelist(HashSet<String>),
	/// Any tag without an ambiguous base ('N') is accepted.
	Randomer
}

impl TagFilter {
	/// Reads a whitelist with one tag per line. Blank lines are ignored and
	/// surrounding whitespace is trimmed.
	pub fn from_whitelist_file(path: &Path) -> Result<TagFilter, DedupError> {
		let file = File::open(path).map_err(|source|
			DedupError::MissingWhitelistFile { path: path.into(), source })?;
		TagFilter::from_whitelist_reader(BufReader::new(file))
	}

	pub fn from_whitelist_reader<R: BufRead>(reader: R) -> Result<TagFilter, DedupError> {
		let mut tags = HashSet::new();
		for l in reader.lines() {
			let line = l?;
			let tag = line.trim();
			if tag.is_empty() { continue; }
			tags.insert(tag.to_string());
		}
		Ok(TagFilter::Whitelist(tags))
	}

	pub fn is_valid(&self, tag: &str) -> bool {
		match self {
			TagFilter::Whitelist(tags) => tags.contains(tag),
			TagFilter::Randomer => !tag.contains('N')
		}
	}

	pub fn describe(&self) -> String {
		match self {
			TagFilter::Whitelist(tags) => format!("UMI whitelist ({} tags)", tags.len()),
			TagFilter::Randomer => "randomer (tags containing N are discarded)".into()
		}
	}
}
