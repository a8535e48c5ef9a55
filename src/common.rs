
use docopt::{Docopt, ArgvMap};
use std::process::{Child, Command, Stdio};
use std::io::{self, stdin, BufRead, BufReader};
use std::fs::File;
use std::path::Path;
use crate::errors::DedupError;

#[macro_export]
macro_rules! error {
	($($arg:tt)+) => ({
		use std::process::exit;
		eprint!("ERROR: "); eprintln!($($arg)+); exit(-1);
	})
}

pub fn parse_args(usage: &str) -> ArgvMap {
	Docopt::new(usage).and_then(|d| d.parse()).unwrap_or_else(|_| {
		error!("Invalid arguments.\n{}", usage);
	})
}

pub trait PathArgs {
	fn get_path(&self, arg: &str) -> String;
}

impl PathArgs for ArgvMap {
	fn get_path(&self, arg: &str) -> String {
		let path = self.get_str(arg);
		if let Some(rest) = path.strip_prefix('~') {
			if let Some(home) = std::env::var_os("HOME") {
				return format!("{}{}", Path::new(&home).display(), rest);
			}
		}
		path.into()
	}
}

// Line reader over a plain file, a gzipped file (decompressed through an
// external gunzip process) or standard input when the path is "-".
pub struct FileReader {
	bufread: Box<dyn BufRead>,
	gunzip: Option<Child>
}

impl FileReader {
	pub fn open(path: &Path) -> Result<FileReader, DedupError> {
		let mut gunzip = None;
		let bufread: Box<dyn BufRead> = if path == Path::new("-") {
			Box::new(BufReader::new(stdin()))
		} else {
			let file = File::open(path).map_err(|source|
				DedupError::File { path: path.into(), source })?;
			if path.extension().map_or(false, |ext| ext == "gz") {
				let mut child = Command::new("gunzip").arg("-c")
					.stdout(Stdio::piped()).stdin(file).spawn()
					.map_err(|source| DedupError::File { path: path.into(), source })?;
				let stdout = child.stdout.take().ok_or_else(|| io::Error::new(
					io::ErrorKind::BrokenPipe, "gunzip produced no output stream"))?;
				gunzip = Some(child);
				Box::new(BufReader::new(stdout))
			} else {
				Box::new(BufReader::new(file))
			}
		};
		Ok(FileReader { bufread, gunzip })
	}

	pub fn from_bufread(bufread: Box<dyn BufRead>) -> FileReader {
		FileReader { bufread, gunzip: None }
	}

	// Reads the next line including its line terminator. Returns false at
	// end of input. A decompressor that exits with an error at end of input
	// (e.g. a corrupt archive) is reported as an error rather than EOF.
	pub fn read_line(&mut self, line: &mut String) -> io::Result<bool> {
		line.clear();
		if self.bufread.read_line(line)? > 0 { return Ok(true); }
		if let Some(mut child) = self.gunzip.take() {
			let status = child.wait()?;
			if !status.success() {
				return Err(io::Error::new(io::ErrorKind::InvalidData,
					format!("gunzip failed ({})", status)));
			}
		}
		Ok(false)
	}
}

impl Drop for FileReader {
	fn drop(&mut self) {
		if let Some(mut child) = self.gunzip.take() {
			let _ = child.kill();
			let _ = child.wait();
		}
	}
}
