
use std::sync::OnceLock;
use regex::Regex;
use crate::errors::DedupError;

pub const FLAG_UNMAPPED: u16 = 0x4;
pub const FLAG_REVERSE: u16 = 0x10;

// SAM positions are 1-based 32-bit signed values, 0 meaning no position.
const MAX_POS: u32 = i32::MAX as u32;

// Only these operations are recognized. Anything else in the CIGAR string
// (H, P, X, =, *) is skipped over.
fn cigar_regex() -> &'static Regex {
	static CIGAR: OnceLock<Regex> = OnceLock::new();
	CIGAR.get_or_init(|| Regex::new(r"([0-9]+)([MIDNS])").expect("CIGAR pattern"))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CigarOp { Match, Insertion, Deletion, Skip, SoftClip }

impl CigarOp {
	fn from_char(c: char) -> Option<CigarOp> {
		match c {
			'M' => Some(CigarOp::Match),
			'I' => Some(CigarOp::Insertion),
			'D' => Some(CigarOp::Deletion),
			'N' => Some(CigarOp::Skip),
			'S' => Some(CigarOp::SoftClip),
			_ => None
		}
	}

	// True for operations that advance along the reference.
	pub fn consumes_reference(self) -> bool {
		matches!(self, CigarOp::Match | CigarOp::Deletion | CigarOp::Skip)
	}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CigarToken { pub len: u32, pub op: CigarOp }

impl CigarToken {
	pub fn new(len: u32, op: CigarOp) -> CigarToken { CigarToken { len, op } }
}

/// Result of scanning a CIGAR string: the recognized tokens in file order,
/// and whether any content between or around them had to be skipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cigar {
	pub tokens: Vec<CigarToken>,
	pub skipped: bool
}

/// Scans `cigar` for maximal digit runs followed by one of M, I, D, N or S.
/// Returns an error message if a token has a zero or out-of-range length.
pub fn parse_cigar(cigar: &str) -> Result<Cigar, String> {
	let mut tokens = Vec::new();
	let mut consumed = 0;
	for caps in cigar_regex().captures_iter(cigar) {
		let whole = caps.get(0).map_or("", |m| m.as_str());
		let len: u32 = caps[1].parse().map_err(
			|_| format!("CIGAR operation length in '{}' is too large", whole))?;
		if len == 0 {
			return Err(format!("CIGAR operation '{}' has zero length", whole));
		}
		// The pattern only captures letters accepted by from_char().
		if let Some(op) = caps[2].chars().next().and_then(CigarOp::from_char) {
			tokens.push(CigarToken::new(len, op));
			consumed += whole.len();
		}
	}
	let skipped = consumed != cigar.len() && cigar != "*";
	Ok(Cigar { tokens, skipped })
}

/// A single body line of a SAM file, borrowing its text from the line.
/// The CIGAR string is kept as text until a caller asks for its tokens, so
/// unmapped reads never have their CIGAR inspected.
#[derive(Clone, Debug)]
pub struct SamRecord<'a> {
	pub qname: &'a str,
	pub tag: &'a str,
	pub flags: u16,
	pub chr: &'a str,
	pub pos: i64,
	pub cigar_str: &'a str
}

impl<'a> SamRecord<'a> {
	/// Parses one tab-separated body line. `line_num` is only used for
	/// error messages. Any trailing line terminator is ignored.
	pub fn parse(line: &'a str, line_num: u64) -> Result<SamRecord<'a>, DedupError> {
		let line = line.trim_end_matches(&['\n', '\r'][..]);
		let cols: Vec<&str> = line.splitn(7, '\t').collect();
		if cols.len() < 6 {
			return Err(DedupError::malformed(line_num, format!(
				"expected at least 6 tab-separated fields, found {}", cols.len())));
		}

		let qname = cols[0];
		let tag = qname.rsplit(':').next().unwrap_or(qname);
		let flags: u16 = cols[1].parse().map_err(|_| DedupError::malformed(
			line_num, format!("FLAG '{}' is not an integer", cols[1])))?;
		let pos: u32 = cols[3].parse().map_err(|_| DedupError::malformed(
			line_num, format!("POS '{}' is not an integer", cols[3])))?;
		if pos > MAX_POS {
			return Err(DedupError::malformed(line_num,
				format!("POS {} is larger than {}", pos, MAX_POS)));
		}

		Ok(SamRecord { qname, tag, flags, chr: cols[2], pos: pos as i64, cigar_str: cols[5] })
	}

	pub fn cigar(&self, line_num: u64) -> Result<Cigar, DedupError> {
		parse_cigar(self.cigar_str).map_err(|reason| DedupError::malformed(line_num, reason))
	}

	pub fn is_mapped(&self) -> bool { self.flags & FLAG_UNMAPPED == 0 }

	pub fn is_reverse(&self) -> bool { self.flags & FLAG_REVERSE != 0 }
}
