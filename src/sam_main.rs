
#[macro_use] extern crate deduper;

use std::env;
use std::process::exit;

mod sam_deduplicate;

const USAGE: &str = "
Usage:
  sam deduplicate [options] <sam_file>
";

fn main() {
	let args: Vec<String> = env::args().collect();

	if args.len() >= 2 && args[1] == "deduplicate" {
		sam_deduplicate::main();
	} else {
		eprintln!("{}", USAGE);
		exit(-1);
	}
}
