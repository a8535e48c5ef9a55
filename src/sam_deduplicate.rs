
use deduper::common::{parse_args, PathArgs};
use deduper::{run, DedupConfig, UnmappedPolicy};
use env_logger::Env;
use std::path::PathBuf;

const USAGE: &str = "
Usage:
  sam deduplicate [options] <sam_file>

Options:
  -p --paired          Input is paired-end (not supported yet)
  -u --umi=FILE        File containing the whitelist of valid UMIs
  -o --output=FILE     Output SAM file. By default the .sam suffix of the
                       input path is replaced with _deduped.sam
  --append             Append to the output file instead of overwriting it
  --discard-unmapped   Discard unmapped reads instead of passing them through
  --debug              Print information about every discarded read

Removes PCR duplicates from a position-sorted single-end SAM file. Two reads
are duplicates if they carry the same UMI (the last colon-separated field of
the read name), are on the same strand, and have the same 5' start position
after correcting for soft clipping.

If a UMI whitelist is given, reads whose UMI is not in the whitelist are
discarded. Otherwise the UMIs are treated as randomers, and only reads whose
UMI contains an N are discarded. Header lines are copied as they are.
";

pub fn main() {
	let args = parse_args(USAGE);

	let level = if args.get_bool("--debug") { "debug" } else { "info" };
	env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

	let umi_path = args.get_path("--umi");
	let out_path = args.get_path("--output");
	let config = DedupConfig {
		input: PathBuf::from(args.get_path("<sam_file>")),
		paired_end: args.get_bool("--paired"),
		whitelist: if umi_path.is_empty() { None } else { Some(umi_path.into()) },
		output: if out_path.is_empty() { None } else { Some(out_path.into()) },
		append: args.get_bool("--append"),
		unmapped: if args.get_bool("--discard-unmapped") {
			UnmappedPolicy::Discard
		} else {
			UnmappedPolicy::Keep
		}
	};

	let stats = run(&config).unwrap_or_else(|e| error!("{}", e));

	eprintln!("Successfully deleted {} PCR duplicates.", stats.duplicates);
	eprintln!("{} / {} ({:.1}%) mapped reads with a valid UMI were duplicates.",
		stats.duplicates, stats.candidates(), stats.duplicate_fraction() * 100.0);
	eprintln!("{} reads discarded due to invalid UMI, {} unmapped reads {}.",
		stats.invalid_tags, stats.unmapped,
		if config.unmapped == UnmappedPolicy::Keep { "kept" } else { "discarded" });
}
