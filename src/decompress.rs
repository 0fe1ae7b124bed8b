//! LZO1X decompression.
//!
//! A single forward pass over the compressed stream. Each control byte is
//! classified by value range into a literal run or one of the four match
//! classes; control bytes below 16 change meaning with context, tracked
//! here by a small state enum. Reconstruction terminates only at the reserved
//! end-of-stream marker — exhausting the input anywhere else is a
//! malformed stream, never a valid short result.
//!
//! Every read and write is bounds-checked. Match copies run bytewise
//! because a copy's source region may overlap the bytes being written
//! (distance smaller than length), which is how the format expresses runs.

use crate::bitstream::{StreamReader, LITERAL_SPILL_BASE, M3_SPILL_BASE, M4_SPILL_BASE};
use crate::error::{Error, Result};

/// Interpretation of a control byte below 16, which depends on what came
/// before it.
#[derive(Clone, Copy)]
enum LowCode {
    /// Starts a literal run.
    RunStart,
    /// Three-byte match just past the two-byte-token window; appears only
    /// directly after a literal run.
    AfterRun,
    /// Two-byte match close behind the cursor; follows a match.
    AfterMatch,
}

/// Decompress `input`, which must decode to exactly `expected_len` bytes.
///
/// The stream is self-terminating, so `expected_len` is a cross-check as
/// much as a buffer size: reaching the end marker at any other output
/// length is reported as corruption.
///
/// # Errors
///
/// [`Error::MalformedStream`] for structural damage (truncation, a copy
/// reaching before the start of output, data after the marker),
/// [`Error::OutputOverflow`] if the stream decodes past `expected_len`,
/// [`Error::LengthMismatch`] if it terminates short of it.
///
/// # Example
///
/// ```
/// let packed = [27, 72, 101, 108, 108, 111, 32, 76, 90, 79, 33, 17, 0, 0];
/// let plain = minilzo_rs::decompress(&packed, 10).unwrap();
/// assert_eq!(plain, b"Hello LZO!");
/// ```
pub fn decompress(input: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    crate::ensure_ready()?;
    let mut out = vec![0u8; expected_len];
    let actual = decompress_into(input, &mut out)?;
    if actual != expected_len {
        return Err(Error::LengthMismatch {
            expected: expected_len,
            actual,
        });
    }
    Ok(out)
}

/// Decompress `input` into a caller-provided buffer, returning the number
/// of bytes written. The buffer may be larger than the decoded stream;
/// callers wanting the strict length check should use [`decompress`].
pub fn decompress_to_slice(input: &[u8], dst: &mut [u8]) -> Result<usize> {
    crate::ensure_ready()?;
    decompress_into(input, dst)
}

pub(crate) fn decompress_into(src: &[u8], dst: &mut [u8]) -> Result<usize> {
    let mut input = StreamReader::new(src);
    let mut out = Output { buf: dst, pos: 0 };

    let mut control = input.take()? as usize;
    let mut low;
    if control > 17 {
        // the stream opens with a literal run folded into the first byte
        let run = control - 17;
        out.copy_literals(&mut input, run)?;
        low = if run < 4 {
            LowCode::AfterMatch
        } else {
            LowCode::AfterRun
        };
        control = input.take()? as usize;
    } else {
        low = LowCode::RunStart;
    }

    loop {
        let trailing;
        if control >= 16 {
            let distance;
            let len;
            if control >= 64 {
                // M2: everything in the control byte plus one distance byte
                let b = input.take()? as usize;
                distance = 1 + ((control >> 2) & 7) + (b << 3);
                len = (control >> 5) + 1;
                trailing = control & 3;
            } else if control >= 32 {
                // M3
                let mut len_code = control & 31;
                if len_code == 0 {
                    len_code = input.read_spilled_length(M3_SPILL_BASE)?;
                }
                len = len_code + 2;
                let (low_bits, tr) = input.take_wide_distance()?;
                distance = 1 + low_bits;
                trailing = tr;
            } else {
                // M4, or the end marker when the distance field is zero
                let high = (control & 8) << 11;
                let mut len_code = control & 7;
                if len_code == 0 {
                    len_code = input.read_spilled_length(M4_SPILL_BASE)?;
                }
                len = len_code + 2;
                let (low_bits, tr) = input.take_wide_distance()?;
                if high == 0 && low_bits == 0 {
                    if !input.finished() {
                        return Err(Error::MalformedStream(
                            "data after the end-of-stream marker",
                        ));
                    }
                    return Ok(out.pos);
                }
                distance = 0x4000 + high + low_bits;
                trailing = tr;
            }
            out.copy_match(distance, len)?;
        } else {
            match low {
                LowCode::RunStart => {
                    let mut run = control;
                    if run == 0 {
                        run = input.read_spilled_length(LITERAL_SPILL_BASE)?;
                    }
                    out.copy_literals(&mut input, run + 3)?;
                    low = LowCode::AfterRun;
                    control = input.take()? as usize;
                    continue;
                }
                LowCode::AfterRun => {
                    let b = input.take()? as usize;
                    let distance = 0x801 + (control >> 2) + (b << 2);
                    out.copy_match(distance, 3)?;
                    trailing = control & 3;
                }
                LowCode::AfterMatch => {
                    let b = input.take()? as usize;
                    let distance = 1 + (control >> 2) + (b << 2);
                    out.copy_match(distance, 2)?;
                    trailing = control & 3;
                }
            }
        }

        if trailing == 0 {
            low = LowCode::RunStart;
        } else {
            out.copy_literals(&mut input, trailing)?;
            low = LowCode::AfterMatch;
        }
        control = input.take()? as usize;
    }
}

/// Output cursor over the caller's destination buffer.
struct Output<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Output<'_> {
    fn copy_literals(&mut self, input: &mut StreamReader<'_>, n: usize) -> Result<()> {
        let lits = input.take_slice(n)?;
        if self.pos + n > self.buf.len() {
            return Err(Error::OutputOverflow);
        }
        self.buf[self.pos..self.pos + n].copy_from_slice(lits);
        self.pos += n;
        Ok(())
    }

    /// Replay `len` bytes starting `distance` behind the cursor. The source
    /// may overlap the destination, so the copy stays bytewise.
    fn copy_match(&mut self, distance: usize, len: usize) -> Result<()> {
        if distance > self.pos {
            return Err(Error::MalformedStream(
                "match distance reaches before the start of output",
            ));
        }
        if self.pos + len > self.buf.len() {
            return Err(Error::OutputOverflow);
        }
        let from = self.pos - distance;
        for i in 0..len {
            self.buf[self.pos + i] = self.buf[from + i];
        }
        self.pos += len;
        Ok(())
    }
}
