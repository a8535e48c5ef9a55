
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use crate::common::FileReader;
use crate::duplicates::{DuplicateTracker, SeenKey};
use crate::errors::DedupError;
use crate::position::adjusted_position;
use crate::sam_record::SamRecord;
use crate::tag_filter::TagFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum UnmappedPolicy {
	/// Unmapped reads with a valid tag are written out, never deduplicated.
	#[default]
	Keep,
	Discard
}

#[derive(Clone, Debug, Default)]
pub struct DedupConfig {
	pub input: PathBuf,
	pub paired_end: bool,
	pub whitelist: Option<PathBuf>,
	pub output: Option<PathBuf>,
	pub append: bool,
	pub unmapped: UnmappedPolicy
}

impl DedupConfig {
	pub fn new(input: impl Into<PathBuf>) -> DedupConfig {
		DedupConfig { input: input.into(), ..Default::default() }
	}

	pub fn output_path(&self) -> PathBuf {
		self.output.clone().unwrap_or_else(|| output_path_for(&self.input))
	}
}

/// Derives "<name>_deduped.sam" from "<name>.sam" (or "<name>.sam.gz").
pub fn output_path_for(input: &Path) -> PathBuf {
	let lossy = input.to_string_lossy();
	let path: &str = &lossy;
	let stem = path.strip_suffix(".sam.gz")
		.or_else(|| path.strip_suffix(".sam"))
		.unwrap_or(path);
	PathBuf::from(format!("{}_deduped.sam", stem))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Decision {
	Header,
	Unique,
	Duplicate,
	InvalidTag,
	UnmappedKept,
	UnmappedDiscarded
}

impl Decision {
	pub fn keep(self) -> bool {
		matches!(self, Decision::Header | Decision::Unique | Decision::UnmappedKept)
	}
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DedupStats {
	pub header_lines: u64,
	pub records: u64,
	pub written: u64,
	pub duplicates: u64,
	pub invalid_tags: u64,
	pub unmapped: u64
}

impl DedupStats {
	// Mapped records with a valid tag, i.e. those that went through
	// duplicate detection.
	pub fn candidates(&self) -> u64 {
		self.records - self.invalid_tags - self.unmapped
	}

	pub fn duplicate_fraction(&self) -> f64 {
		match self.candidates() {
			0 => 0.0,
			n => self.duplicates as f64 / n as f64
		}
	}
}

/// Per-run state: the tag policy, the set of seen keys and the counters.
pub struct Deduplicator {
	filter: TagFilter,
	unmapped: UnmappedPolicy,
	tracker: DuplicateTracker,
	stats: DedupStats,
	line_num: u64,
	warned_cigar: bool
}

impl Deduplicator {
	pub fn new(filter: TagFilter, unmapped: UnmappedPolicy) -> Deduplicator {
		Deduplicator {
			filter, unmapped, tracker: DuplicateTracker::new(),
			stats: DedupStats::default(), line_num: 0, warned_cigar: false
		}
	}

	/// Classifies the next input line. Lines must be passed in file order.
	pub fn classify(&mut self, line: &str) -> Result<Decision, DedupError> {
		self.line_num += 1;
		let decision = self.decide(line)?;
		match decision {
			Decision::Header => self.stats.header_lines += 1,
			Decision::Duplicate => self.stats.duplicates = self.tracker.duplicates(),
			Decision::InvalidTag => self.stats.invalid_tags += 1,
			Decision::UnmappedKept | Decision::UnmappedDiscarded => self.stats.unmapped += 1,
			Decision::Unique => {}
		}
		if decision != Decision::Header { self.stats.records += 1; }
		if decision.keep() { self.stats.written += 1; }
		Ok(decision)
	}

	fn decide(&mut self, line: &str) -> Result<Decision, DedupError> {
		if line.starts_with('@') { return Ok(Decision::Header); }

		let record = SamRecord::parse(line, self.line_num)?;
		if !self.filter.is_valid(record.tag) {
			debug!("Line {}: discarded read {} with invalid tag {}",
				self.line_num, record.qname, record.tag);
			return Ok(Decision::InvalidTag);
		}

		if !record.is_mapped() {
			return Ok(match self.unmapped {
				UnmappedPolicy::Keep => Decision::UnmappedKept,
				UnmappedPolicy::Discard => Decision::UnmappedDiscarded
			});
		}

		let cigar = record.cigar(self.line_num)?;
		if cigar.skipped && !self.warned_cigar {
			warn!("Line {}: CIGAR of read {} contains operations other than \
				M/I/D/N/S, these were ignored when computing positions.",
				self.line_num, record.qname);
			self.warned_cigar = true;
		}

		let pos = adjusted_position(record.pos, &cigar.tokens, record.is_reverse())
			.map_err(|reason| DedupError::malformed(self.line_num, reason))?;

		let key = SeenKey::new(record.tag, pos, record.is_reverse());
		if self.tracker.test_and_insert(key) {
			Ok(Decision::Unique)
		} else {
			debug!("Line {}: read {} is a duplicate ({} {}:{} {})",
				self.line_num, record.qname, record.tag, record.chr, pos,
				if record.is_reverse() { '-' } else { '+' });
			Ok(Decision::Duplicate)
		}
	}

	pub fn stats(&self) -> DedupStats { self.stats }

	/// Number of lines classified so far.
	pub fn line_num(&self) -> u64 { self.line_num }
}

/// Copies every kept line from `input` to `out` verbatim.
pub fn deduplicate_stream<W: Write>(input: &mut FileReader, out: &mut W,
	dedup: &mut Deduplicator) -> Result<DedupStats, DedupError> {

	let mut line = String::new();
	while input.read_line(&mut line)
		.map_err(|source| DedupError::Read { line: dedup.line_num() + 1, source })? {
		if dedup.classify(&line)?.keep() {
			out.write_all(line.as_bytes())?;
		}
	}
	out.flush()?;
	Ok(dedup.stats())
}

/// Runs a full deduplication pass as described by `config`. Fatal
/// preconditions are checked before the output file is created, and a
/// freshly created output file is removed again if the pass fails.
pub fn run(config: &DedupConfig) -> Result<DedupStats, DedupError> {
	if config.paired_end {
		return Err(DedupError::UnsupportedMode(
			"This program does not support paired-end reads.".into()));
	}
	if config.input == Path::new("-") && config.output.is_none() {
		return Err(DedupError::UnsupportedMode(
			"An output path must be given when reading from standard input.".into()));
	}

	let filter = match &config.whitelist {
		Some(path) => TagFilter::from_whitelist_file(path)?,
		None => TagFilter::Randomer
	};

	let out_path = config.output_path();
	info!("Removing PCR duplicates from {} into {}",
		config.input.display(), out_path.display());
	info!("Tag policy: {}", filter.describe());

	let mut input = FileReader::open(&config.input)?;
	if config.input != Path::new("-") && same_file(&config.input, &out_path) {
		return Err(DedupError::OutputIsInput { path: out_path });
	}
	let file = OpenOptions::new().create(true).write(true)
		.append(config.append).truncate(!config.append)
		.open(&out_path)
		.map_err(|source| DedupError::File { path: out_path.clone(), source })?;
	let mut out = BufWriter::new(file);

	let mut dedup = Deduplicator::new(filter, config.unmapped);
	let result = deduplicate_stream(&mut input, &mut out, &mut dedup);
	drop(out);
	if result.is_err() && !config.append {
		let _ = fs::remove_file(&out_path);
	}
	result
}

// Paths that cannot be resolved (e.g. an output file that does not exist
// yet) never refer to the input.
fn same_file(a: &Path, b: &Path) -> bool {
	match (fs::canonicalize(a), fs::canonicalize(b)) {
		(Ok(a), Ok(b)) => a == b,
		_ => false
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	fn reader(text: &str) -> FileReader {
		FileReader::from_bufread(Box::new(Cursor::new(text.as_bytes().to_vec())))
	}

	fn dedup_text(text: &str, filter: TagFilter, unmapped: UnmappedPolicy)
		-> Result<(String, DedupStats), DedupError> {
		let mut out = Vec::new();
		let mut dedup = Deduplicator::new(filter, unmapped);
		let stats = deduplicate_stream(&mut reader(text), &mut out, &mut dedup)?;
		Ok((String::from_utf8(out).unwrap(), stats))
	}

	fn whitelist(tags: &[&str]) -> TagFilter {
		TagFilter::Whitelist(tags.iter().map(|t| t.to_string()).collect())
	}

	#[test]
	fn output_path_strips_sam_suffix() {
		assert_eq!(output_path_for(Path::new("data/test.sam")),
			PathBuf::from("data/test_deduped.sam"));
		assert_eq!(output_path_for(Path::new("data/test.sam.gz")),
			PathBuf::from("data/test_deduped.sam"));
		assert_eq!(output_path_for(Path::new("reads.sample.sam")),
			PathBuf::from("reads.sample_deduped.sam"));
		assert_eq!(output_path_for(Path::new("reads.txt")),
			PathBuf::from("reads.txt_deduped.sam"));
	}

	#[test]
	fn explicit_output_path_wins() {
		let mut config = DedupConfig::new("in.sam");
		assert_eq!(config.output_path(), PathBuf::from("in_deduped.sam"));
		config.output = Some("elsewhere.sam".into());
		assert_eq!(config.output_path(), PathBuf::from("elsewhere.sam"));
	}

	#[test]
	fn soft_clipped_forward_read_is_duplicate_of_unclipped() {
		let sam = "@HD\tVN:1.0\tSO:coordinate\n\
			r1:AACGCCAT\t0\t2\t100\t36\t50M\t*\t0\t0\tA\tA\n\
			r2:AACGCCAT\t0\t2\t105\t36\t5S45M\t*\t0\t0\tA\tA\n";
		let (out, stats) = dedup_text(sam, whitelist(&["AACGCCAT"]), UnmappedPolicy::Keep).unwrap();
		assert_eq!(out, "@HD\tVN:1.0\tSO:coordinate\n\
			r1:AACGCCAT\t0\t2\t100\t36\t50M\t*\t0\t0\tA\tA\n");
		assert_eq!(stats.duplicates, 1);
		assert_eq!(stats.written, 2);
		assert_eq!(stats.header_lines, 1);
	}

	#[test]
	fn reverse_reads_are_compared_at_their_five_prime_end() {
		// Both reads end at reference base 149 plus a 10 bp trailing clip.
		let sam = "r1:ACGT\t16\t1\t100\t36\t40M10S\n\
			r2:ACGT\t16\t1\t110\t36\t30M10S\n\
			r3:ACGT\t0\t1\t100\t36\t40M10S\n";
		let (out, stats) = dedup_text(sam, TagFilter::Randomer, UnmappedPolicy::Keep).unwrap();
		assert_eq!(out, "r1:ACGT\t16\t1\t100\t36\t40M10S\nr3:ACGT\t0\t1\t100\t36\t40M10S\n");
		assert_eq!(stats.duplicates, 1);
	}

	#[test]
	fn invalid_tags_are_dropped_without_counting() {
		let sam = "r1:GGGGGGGG\t0\t1\t100\t36\t50M\n\
			r2:AACGCCAT\t0\t1\t100\t36\t50M\n\
			r3:GGGGGGGG\t0\t1\t100\t36\t50M\n";
		let (out, stats) = dedup_text(sam, whitelist(&["AACGCCAT"]), UnmappedPolicy::Keep).unwrap();
		assert_eq!(out, "r2:AACGCCAT\t0\t1\t100\t36\t50M\n");
		assert_eq!(stats.duplicates, 0);
		assert_eq!(stats.invalid_tags, 2);
		assert_eq!(stats.candidates(), 1);
	}

	#[test]
	fn randomer_mode_drops_ambiguous_tags() {
		let sam = "r1:ACNT\t0\t1\t100\t36\t50M\n\
			r2:ACGT\t0\t1\t100\t36\t50M\n\
			r3:ACGT\t0\t1\t100\t36\t50M\n";
		let (out, stats) = dedup_text(sam, TagFilter::Randomer, UnmappedPolicy::Keep).unwrap();
		assert_eq!(out, "r2:ACGT\t0\t1\t100\t36\t50M\n");
		assert_eq!(stats.invalid_tags, 1);
		assert_eq!(stats.duplicates, 1);
	}

	#[test]
	fn unmapped_reads_follow_policy_and_skip_tracker() {
		// The unmapped read has an empty CIGAR, which would be malformed if
		// it were deduplicated.
		let sam = "r1:ACGT\t4\t*\t0\t0\t*\n\
			r2:ACGT\t4\t*\t0\t0\t*\n\
			r3:ACGT\t0\t1\t100\t36\t50M\n";
		let (out, stats) = dedup_text(sam, TagFilter::Randomer, UnmappedPolicy::Keep).unwrap();
		assert_eq!(out, sam);
		assert_eq!(stats.unmapped, 2);
		assert_eq!(stats.duplicates, 0);

		let (out, stats) = dedup_text(sam, TagFilter::Randomer, UnmappedPolicy::Discard).unwrap();
		assert_eq!(out, "r3:ACGT\t0\t1\t100\t36\t50M\n");
		assert_eq!(stats.unmapped, 2);
		assert_eq!(stats.written, 1);
	}

	#[test]
	fn unmapped_reads_with_invalid_tags_are_dropped() {
		let sam = "r1:ACNT\t4\t*\t0\t0\t*\n";
		let (out, stats) = dedup_text(sam, TagFilter::Randomer, UnmappedPolicy::Keep).unwrap();
		assert!(out.is_empty());
		assert_eq!(stats.invalid_tags, 1);
		assert_eq!(stats.unmapped, 0);
	}

	#[test]
	fn mapped_read_without_cigar_tokens_aborts() {
		let sam = "@HD\tVN:1.0\nr1:ACGT\t0\t1\t100\t36\t*\n";
		match dedup_text(sam, TagFilter::Randomer, UnmappedPolicy::Keep) {
			Err(DedupError::MalformedRecord { line, .. }) => assert_eq!(line, 2),
			other => panic!("expected MalformedRecord, got {:?}", other.map(|r| r.1))
		}
	}

	#[test]
	fn unmapped_reads_do_not_consult_cigar() {
		let sam = "r1:ACGT\t4\t*\t0\t0\t0M\n";
		let (out, stats) = dedup_text(sam, TagFilter::Randomer, UnmappedPolicy::Keep).unwrap();
		assert_eq!(out, sam);
		assert_eq!(stats.unmapped, 1);
	}

	#[test]
	fn zero_length_operation_on_mapped_read_aborts() {
		let sam = "r1:ACGT\t0\t1\t100\t36\t0M50M\n";
		assert!(matches!(dedup_text(sam, TagFilter::Randomer, UnmappedPolicy::Keep),
			Err(DedupError::MalformedRecord { line: 1, .. })));
	}

	#[test]
	fn invalid_utf8_reports_its_line() {
		let mut bytes = b"@HD\tVN:1.0\nr1:ACGT\t0\t1\t100\t36\t50M\n".to_vec();
		bytes.extend_from_slice(b"r2:AC\xffT\t0\t1\t100\t36\t50M\n");
		let mut input = FileReader::from_bufread(Box::new(Cursor::new(bytes)));
		let mut dedup = Deduplicator::new(TagFilter::Randomer, UnmappedPolicy::Keep);
		match deduplicate_stream(&mut input, &mut Vec::<u8>::new(), &mut dedup) {
			Err(DedupError::Read { line, .. }) => assert_eq!(line, 3),
			other => panic!("expected Read error, got {:?}", other)
		}
	}

	#[test]
	fn short_line_aborts_the_run() {
		let sam = "r1:ACGT\t0\t1\t100\t36\t50M\nr2:ACGT\t0\t1\n";
		assert!(matches!(dedup_text(sam, TagFilter::Randomer, UnmappedPolicy::Keep),
			Err(DedupError::MalformedRecord { line: 2, .. })));
	}

	#[test]
	fn last_line_without_newline_is_copied_verbatim() {
		let sam = "r1:ACGT\t0\t1\t100\t36\t50M";
		let (out, _) = dedup_text(sam, TagFilter::Randomer, UnmappedPolicy::Keep).unwrap();
		assert_eq!(out, sam);
	}

	#[test]
	fn paired_end_is_rejected_before_anything_else() {
		let mut config = DedupConfig::new("/nonexistent/input.sam");
		config.paired_end = true;
		config.whitelist = Some("/nonexistent/umis.txt".into());
		assert!(matches!(run(&config), Err(DedupError::UnsupportedMode(_))));
	}

	#[test]
	fn stdin_requires_explicit_output() {
		let config = DedupConfig::new("-");
		assert!(matches!(run(&config), Err(DedupError::UnsupportedMode(_))));
	}
}
