//! # minilzo-rs
//!
//! A pure Rust implementation of LZO1X-1 block compression and
//! decompression, byte-compatible with the reference miniLZO bitstream.
//!
//! LZO1X-1 trades ratio for speed: a greedy single pass over the input,
//! a 32 KiB match-finder table, and a token format that decodes with no
//! entropy stage. Compressed streams carry no header or checksum — just
//! tokens and an end-of-stream marker — so the caller supplies the
//! original length when decompressing.
//!
//! ```
//! let data = b"hello hello hello hello hello";
//! let packed = minilzo_rs::compress(data).unwrap();
//! let plain = minilzo_rs::decompress(&packed, data.len()).unwrap();
//! assert_eq!(plain, data.as_slice());
//! ```
//!
//! Both operations are pure CPU-bound transforms with no shared state;
//! concurrent calls from multiple threads are fine as long as each call
//! has its own buffers and [`Workspace`].
//!
//! A known-answer self-check runs once per process before the first real
//! call (or eagerly via [`init`]); a build that cannot reproduce the
//! reference vector fails every call with [`Error::SelfCheckFailed`]
//! instead of silently producing garbage.

use once_cell::sync::Lazy;

mod bitstream;
pub mod compress;
pub mod decompress;
pub mod error;

pub use compress::{
    compress, compress_to_slice, compress_with_workspace, max_compressed_len, Workspace,
    MAX_INPUT_LEN,
};
pub use decompress::{decompress, decompress_to_slice};
pub use error::{Error, Result};

const CHECK_PLAIN: &[u8] = b"Hello LZO!";
const CHECK_PACKED: &[u8] = &[27, 72, 101, 108, 108, 111, 32, 76, 90, 79, 33, 17, 0, 0];

static SELF_CHECK: Lazy<Result<()>> = Lazy::new(self_check);

fn self_check() -> Result<()> {
    let mut wrk = Workspace::new();
    let packed =
        compress::compress_into_vec(CHECK_PLAIN, &mut wrk).map_err(|_| Error::SelfCheckFailed)?;
    let mut plain = [0u8; 10];
    let n =
        decompress::decompress_into(&packed, &mut plain).map_err(|_| Error::SelfCheckFailed)?;
    if packed != CHECK_PACKED || n != CHECK_PLAIN.len() || plain != *CHECK_PLAIN {
        return Err(Error::SelfCheckFailed);
    }
    log::debug!("lzo1x known-answer self-check passed");
    Ok(())
}

pub(crate) fn ensure_ready() -> Result<()> {
    SELF_CHECK.clone()
}

/// Run the one-time self-check now instead of on first use.
///
/// Calling this is optional — every public entry point performs the same
/// check lazily — but it lets startup code fail fast on a broken build.
/// Idempotent and safe to call from any thread.
pub fn init() -> Result<()> {
    ensure_ready()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init().unwrap();
        init().unwrap();
    }

    #[test]
    fn check_vector_roundtrips_through_public_api() {
        let packed = compress(CHECK_PLAIN).unwrap();
        assert_eq!(packed, CHECK_PACKED);
        assert_eq!(
            decompress(&packed, CHECK_PLAIN.len()).unwrap(),
            CHECK_PLAIN
        );
    }
}
