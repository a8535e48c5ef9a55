
use crate::sam_record::{CigarOp, CigarToken};

/// Computes the 5' start of the sequenced fragment for a mapped read.
///
/// SAM positions refer to the leftmost aligned reference base. For a forward
/// read, a leading soft-clip is subtracted so that the position points at
/// the first base of the read. For a reverse read the 5' end is on the right,
/// so all reference-consuming operations (M, D, N) and every soft-clip other
/// than a leading one are added. Insertions never contribute.
///
/// Fails if the CIGAR has no tokens or the result does not fit in an i64.
pub fn adjusted_position(pos: i64, cigar: &[CigarToken], reverse: bool)
	-> Result<i64, &'static str> {

	const OVERFLOW: &str = "adjusted position is out of range";
	let first = cigar.first()
		.ok_or("mapped read has no M/I/D/N/S operations in its CIGAR string")?;
	if !reverse {
		return match first.op {
			CigarOp::SoftClip => pos.checked_sub(first.len as i64).ok_or(OVERFLOW),
			_ => Ok(pos)
		};
	}

	let mut offset: i64 = 0;
	for (i, token) in cigar.iter().enumerate() {
		if token.op.consumes_reference() || (token.op == CigarOp::SoftClip && i != 0) {
			offset = offset.checked_add(token.len as i64).ok_or(OVERFLOW)?;
		}
	}
	pos.checked_add(offset).ok_or(OVERFLOW)
}
