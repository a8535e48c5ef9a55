use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions that abort a deduplication run.
#[derive(Error, Debug)]
pub enum DedupError {
	/// A processing mode the tool cannot handle, e.g. paired-end input.
	#[error("{0}")]
	UnsupportedMode(String),

	/// A body line that cannot be interpreted as a SAM alignment.
	#[error("Malformed SAM record on line {line}: {reason}")]
	MalformedRecord { line: u64, reason: String },

	#[error("Cannot open UMI whitelist {}: {source}", .path.display())]
	MissingWhitelistFile { path: PathBuf, source: io::Error },

	#[error("Cannot open file {}: {source}", .path.display())]
	File { path: PathBuf, source: io::Error },

	#[error("Cannot read line {line} of the input: {source}")]
	Read { line: u64, source: io::Error },

	#[error("Output file {} is the same file as the input", .path.display())]
	OutputIsInput { path: PathBuf },

	#[error("I/O error: {0}")]
	Io(#[from] io::Error),
}

impl DedupError {
	pub fn malformed(line: u64, reason: impl Into<String>) -> DedupError {
		DedupError::MalformedRecord { line, reason: reason.into() }
	}
}
