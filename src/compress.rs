//! LZO1X-1 compression.
//!
//! A greedy, single-pass compressor. The cursor walks the input left to
//! right; at each position a hash of the next four bytes probes a
//! single-slot table for an earlier occurrence of the same prefix. A hit
//! becomes a back-reference token, a miss extends the pending literal run
//! and bumps the cursor — increasingly fast inside long runs, and skipped
//! positions are never revisited. Each table slot remembers only the most
//! recent position with its hash, so the closest candidate always wins and
//! lookups stay O(1); older or better matches that collide are simply
//! missed. That trade is what makes LZO1X-1 fast.
//!
//! Inputs longer than one block are compressed in consecutive 49152-byte
//! blocks so table entries fit in 16 bits and in-block distances never
//! exceed the format maximum. Literal runs may span block seams; match
//! distances never do.

use crate::bitstream::{
    push_spilled_length, push_wide_distance, END_OF_STREAM, M2_MAX_LEN, M2_MAX_OFFSET, M3_MARKER,
    M3_MAX_LEN, M3_MAX_OFFSET, M4_MARKER, M4_MAX_LEN, M4_MAX_OFFSET,
};
use crate::error::{Error, Result};

const DICT_BITS: u32 = 14;
const DICT_SIZE: usize = 1 << DICT_BITS;
const HASH_MUL: u32 = 0x1824_429D;

/// Block size for the match finder; keeps table entries within `u16` and
/// distances within [`M4_MAX_OFFSET`].
const MAX_BLOCK_LEN: usize = 49152;

/// The last bytes of a block are never probed for matches; they end up in
/// the tail literal run instead.
const BLOCK_TAIL: usize = 20;

/// Maximum input size accepted by a single compression call.
pub const MAX_INPUT_LEN: usize = 1 << 30;

/// Worst-case compressed size for `input_len` bytes of input.
///
/// Incompressible data expands by at most one byte per 16 plus a small
/// constant; the final 3 bytes are the end-of-stream marker.
pub const fn max_compressed_len(input_len: usize) -> usize {
    input_len + input_len / 16 + 64 + 3
}

/// Scratch state for the compressor's match finder.
///
/// Holds the 32 KiB position table. A workspace is exclusively borrowed
/// for the duration of one call; allocate it once and reuse it across
/// calls to keep the hot path free of heap churn. The table is cleared at
/// every block start, so reuse requires no other care.
///
/// # Example
///
/// ```
/// use minilzo_rs::{compress_with_workspace, Workspace};
///
/// let mut wrk = Workspace::new();
/// let a = compress_with_workspace(b"first buffer", &mut wrk).unwrap();
/// let b = compress_with_workspace(b"second buffer", &mut wrk).unwrap();
/// assert_ne!(a, b);
/// ```
pub struct Workspace {
    dict: Box<[u16]>,
}

impl Workspace {
    /// Allocate a fresh workspace.
    pub fn new() -> Self {
        Self {
            dict: vec![0; DICT_SIZE].into_boxed_slice(),
        }
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Compress `input` with a freshly allocated workspace.
///
/// Returns the compressed stream, terminated by the end-of-stream marker
/// and guaranteed to decompress back to exactly `input`.
///
/// # Errors
///
/// [`Error::InputTooLarge`] if `input` exceeds [`MAX_INPUT_LEN`];
/// [`Error::SelfCheckFailed`] if the build fails its one-time self-check.
///
/// # Example
///
/// ```
/// let data = b"to be or not to be, that is the question";
/// let packed = minilzo_rs::compress(data).unwrap();
/// let plain = minilzo_rs::decompress(&packed, data.len()).unwrap();
/// assert_eq!(plain, data.as_slice());
/// ```
pub fn compress(input: &[u8]) -> Result<Vec<u8>> {
    crate::ensure_ready()?;
    let mut wrk = Workspace::new();
    compress_into_vec(input, &mut wrk)
}

/// Compress `input`, reusing a caller-owned [`Workspace`].
///
/// Output is byte-identical to [`compress`]; only the allocation of the
/// match-finder table is saved.
pub fn compress_with_workspace(input: &[u8], wrk: &mut Workspace) -> Result<Vec<u8>> {
    crate::ensure_ready()?;
    compress_into_vec(input, wrk)
}

/// Compress `input` into a caller-sized buffer, returning the compressed
/// length. Size `dst` with [`max_compressed_len`] to make overflow
/// impossible.
///
/// # Errors
///
/// [`Error::OutputOverflow`] if `dst` cannot hold the compressed stream;
/// the buffer contents are unspecified on any error.
pub fn compress_to_slice(input: &[u8], dst: &mut [u8], wrk: &mut Workspace) -> Result<usize> {
    crate::ensure_ready()?;
    let packed = compress_into_vec(input, wrk)?;
    if packed.len() > dst.len() {
        return Err(Error::OutputOverflow);
    }
    dst[..packed.len()].copy_from_slice(&packed);
    Ok(packed.len())
}

pub(crate) fn compress_into_vec(input: &[u8], wrk: &mut Workspace) -> Result<Vec<u8>> {
    if input.len() > MAX_INPUT_LEN {
        return Err(Error::InputTooLarge(input.len()));
    }
    let mut out = Vec::with_capacity(max_compressed_len(input.len()));

    let mut base = 0;
    let mut remaining = input.len();
    // literals carried over a block seam, still unemitted
    let mut pending = 0;
    while remaining > BLOCK_TAIL {
        let block_len = remaining.min(MAX_BLOCK_LEN);
        wrk.dict.fill(0);
        pending = compress_block(input, base, block_len, pending, &mut out, &mut wrk.dict);
        base += block_len;
        remaining -= block_len;
    }
    pending += remaining;

    if pending > 0 {
        let start = input.len() - pending;
        if out.is_empty() && pending <= 238 {
            // a stream that opens with a literal run encodes it in the
            // first byte, offset past the copy-token control space
            out.push((17 + pending) as u8);
        } else if pending <= 3 {
            let patch = out.len() - 2;
            out[patch] |= pending as u8;
        } else if pending <= 18 {
            out.push((pending - 3) as u8);
        } else {
            out.push(0);
            push_spilled_length(&mut out, pending - 18);
        }
        out.extend_from_slice(&input[start..]);
    }
    out.extend_from_slice(&END_OF_STREAM);

    log::trace!("compressed {} bytes into {}", input.len(), out.len());
    Ok(out)
}

/// Compress one block of `input`, appending tokens to `out`.
///
/// `carry` literals immediately before `base` are still unemitted when the
/// block starts; the count of unemitted literals at the block end is
/// returned for the caller to carry onward.
fn compress_block(
    input: &[u8],
    base: usize,
    block_len: usize,
    carry: usize,
    out: &mut Vec<u8>,
    dict: &mut [u16],
) -> usize {
    let block_end = base + block_len;
    let probe_end = base + block_len - BLOCK_TAIL;
    let mut carry = carry;
    // start of the pending literal run
    let mut anchor = base;
    let mut ip = base + if carry < 4 { 4 - carry } else { 0 };

    ip += 1 + ((ip - anchor) >> 5);
    while ip < probe_end {
        let dv = read_u32_le(input, ip);
        let slot = hash(dv);
        let candidate = base + dict[slot] as usize;
        dict[slot] = (ip - base) as u16;
        if dv != read_u32_le(input, candidate) {
            ip += 1 + ((ip - anchor) >> 5);
            continue;
        }

        // a match; flush the literals accumulated since the last one
        anchor -= carry;
        carry = 0;
        if ip > anchor {
            emit_literal_run(out, &input[anchor..ip]);
        }

        let len = match_length(input, ip, candidate, probe_end);
        let distance = ip - candidate;
        ip += len;
        anchor = ip;
        emit_match(out, distance, len);
    }

    block_end - (anchor - carry)
}

/// Length of the common prefix of `input[ip..]` and `input[m_pos..]`, at
/// least 4 by the time this is called.
///
/// The guard fires every eight bytes, so no match reaches into the last
/// 12 bytes of the block; those become the tail literal run.
fn match_length(input: &[u8], ip: usize, m_pos: usize, probe_end: usize) -> usize {
    let mut len = 4;
    while input[ip + len] == input[m_pos + len] {
        len += 1;
        if (len & 7) == 4 && ip + len >= probe_end {
            break;
        }
    }
    len
}

/// Emit a pending literal run. Runs of 1–3 bytes ride in the free low bits
/// of the previous match token's distance tail.
fn emit_literal_run(out: &mut Vec<u8>, lits: &[u8]) {
    let n = lits.len();
    if n <= 3 {
        debug_assert!(out.len() >= 2);
        let patch = out.len() - 2;
        out[patch] |= n as u8;
    } else if n <= 18 {
        out.push((n - 3) as u8);
    } else {
        out.push(0);
        push_spilled_length(out, n - 18);
    }
    out.extend_from_slice(lits);
}

/// Emit a match token, choosing the shortest class its distance and length
/// fit in.
fn emit_match(out: &mut Vec<u8>, distance: usize, len: usize) {
    debug_assert!(len >= 4 && distance >= 1 && distance <= M4_MAX_OFFSET);
    if len <= M2_MAX_LEN && distance <= M2_MAX_OFFSET {
        let off = distance - 1;
        out.push((((len - 1) << 5) | ((off & 7) << 2)) as u8);
        out.push((off >> 3) as u8);
    } else if distance <= M3_MAX_OFFSET {
        let off = distance - 1;
        if len <= M3_MAX_LEN {
            out.push(M3_MARKER | (len - 2) as u8);
        } else {
            out.push(M3_MARKER);
            push_spilled_length(out, len - M3_MAX_LEN);
        }
        push_wide_distance(out, off);
    } else {
        let off = distance - 0x4000;
        if len <= M4_MAX_LEN {
            out.push(M4_MARKER | ((off >> 11) & 8) as u8 | (len - 2) as u8);
        } else {
            out.push(M4_MARKER | ((off >> 11) & 8) as u8);
            push_spilled_length(out, len - M4_MAX_LEN);
        }
        push_wide_distance(out, off);
    }
}

fn hash(dv: u32) -> usize {
    (dv.wrapping_mul(HASH_MUL) >> (32 - DICT_BITS)) as usize
}

fn read_u32_le(buf: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompress::decompress;

    #[test]
    fn empty_input_is_marker_only() {
        assert_eq!(compress(b"").unwrap(), [17, 0, 0]);
    }

    #[test]
    fn tiny_inputs_use_the_first_byte_form() {
        assert_eq!(compress(b"A").unwrap(), [18, 65, 17, 0, 0]);
        assert_eq!(compress(b"AB").unwrap(), [19, 65, 66, 17, 0, 0]);
        assert_eq!(compress(b"ABC").unwrap(), [20, 65, 66, 67, 17, 0, 0]);
    }

    #[test]
    fn known_vector() {
        let packed = compress(b"Hello LZO!").unwrap();
        assert_eq!(
            packed,
            [27, 72, 101, 108, 108, 111, 32, 76, 90, 79, 33, 17, 0, 0]
        );
    }

    #[test]
    fn run_of_thirty_emits_one_overlapping_copy() {
        let packed = compress(&[b'a'; 30]).unwrap();
        let mut expected = vec![2u8];
        expected.extend_from_slice(&[b'a'; 5]);
        // M3 copy: length 12 at distance 5, then the 13-byte tail run
        expected.extend_from_slice(&[42, 16, 0, 10]);
        expected.extend_from_slice(&[b'a'; 13]);
        expected.extend_from_slice(&[17, 0, 0]);
        assert_eq!(packed, expected);
    }

    #[test]
    fn short_match_uses_an_m2_token() {
        let data = b"abcdWWabcdXX0123456789ABCDE";
        let packed = compress(data).unwrap();
        let mut expected = vec![3u8];
        expected.extend_from_slice(b"abcdWW");
        // length 4 at distance 6: ((4-1) << 5) | ((5 & 7) << 2) = 116
        expected.extend_from_slice(&[116, 0, 14]);
        expected.extend_from_slice(b"XX0123456789ABCDE");
        expected.extend_from_slice(&[17, 0, 0]);
        assert_eq!(packed, expected);
    }

    #[test]
    fn periodic_input_reuses_the_period() {
        let data: Vec<u8> = b"abcdefgh".repeat(8);
        let packed = compress(&data).unwrap();
        let mut expected = vec![5u8];
        expected.extend_from_slice(b"abcdefgh");
        // M3 copy of 36 bytes (spilled past the 33-byte in-line maximum)
        // at distance 8, then a 20-byte tail run
        expected.extend_from_slice(&[32, 3, 28, 0, 0, 2]);
        expected.extend_from_slice(&data[44..]);
        expected.extend_from_slice(&[17, 0, 0]);
        assert_eq!(packed, expected);
        assert_eq!(decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn long_run_spills_the_match_length() {
        let packed = compress(&[b'x'; 10000]).unwrap();
        assert_eq!(packed.len(), 68);
        assert_eq!(&packed[..7], &[2, 120, 120, 120, 120, 120, 32]);
        // 9947 bytes of spill: 39 full continuation bytes and a closing 2
        assert!(packed[7..46].iter().all(|&b| b == 0));
        assert_eq!(&packed[46..50], &[2, 16, 0, 12]);
        assert!(packed[50..65].iter().all(|&b| b == b'x'));
        assert_eq!(&packed[65..], &[17, 0, 0]);
    }

    #[test]
    fn consecutive_matches_patch_trailing_literals() {
        // run, one odd byte, run again: the single literal rides in the
        // low bits of the first copy token
        let data = b"aaaaaaaaaaaaQaaaaaaaaaaaaaaaaaaaaaaaaa";
        let packed = compress(data).unwrap();
        let mut expected = vec![2u8];
        expected.extend_from_slice(&[b'a'; 5]);
        expected.extend_from_slice(&[209, 0, b'Q', 220, 0, 15]);
        expected.extend_from_slice(&[b'a'; 18]);
        expected.extend_from_slice(&[17, 0, 0]);
        assert_eq!(packed, expected);
        assert_eq!(decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn worst_case_bound_holds_for_incompressible_data() {
        // multiplicative-sequence byte soup; essentially incompressible
        let data: Vec<u8> = (0u32..4096)
            .flat_map(|i| i.wrapping_mul(2654435761).to_le_bytes())
            .collect();
        let packed = compress(&data).unwrap();
        assert!(packed.len() <= max_compressed_len(data.len()));
        assert_eq!(decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn workspace_reuse_is_byte_identical() {
        let data: Vec<u8> = b"the quick brown fox jumps over the lazy dog. ".repeat(40);
        let mut wrk = Workspace::new();
        let first = compress_with_workspace(&data, &mut wrk).unwrap();
        let second = compress_with_workspace(&data, &mut wrk).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, compress(&data).unwrap());
    }

    #[test]
    fn to_slice_matches_and_checks_capacity() {
        let data = b"compress me into a borrowed buffer, twice the fun";
        let mut wrk = Workspace::new();
        let mut dst = vec![0u8; max_compressed_len(data.len())];
        let n = compress_to_slice(data, &mut dst, &mut wrk).unwrap();
        assert_eq!(&dst[..n], compress(data).unwrap().as_slice());

        let mut small = [0u8; 4];
        assert_eq!(
            compress_to_slice(data, &mut small, &mut wrk),
            Err(Error::OutputOverflow)
        );
    }

    #[test]
    fn block_seam_roundtrip() {
        // spans two internal blocks; literals carry across the seam
        let data: Vec<u8> = (0..60000u32).map(|i| (i % 251) as u8).collect();
        let packed = compress(&data).unwrap();
        assert!(packed.len() <= max_compressed_len(data.len()));
        assert_eq!(decompress(&packed, data.len()).unwrap(), data);
    }
}
