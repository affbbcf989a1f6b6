use std::fs::File;
use std::io::Read;
use std::path::Path;

use xxhash_rust::xxh64::Xxh64;

use crate::{CoreError, MB};

/// Block size used when streaming a file through the hasher.
pub const HASH_BLOCK_SIZE: usize = 8 * MB as usize;

const SEED: u64 = 0;

fn to_hex(digest: u64) -> String {
    hex::encode(digest.to_be_bytes())
}

/// xxHash64 of an in-memory buffer, as 16 lowercase hex chars.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Xxh64::new(SEED);
    hasher.update(data);
    to_hex(hasher.digest())
}

/// xxHash64 of a file, streamed in [`HASH_BLOCK_SIZE`] blocks.
pub fn hash_file(path: &Path) -> Result<String, CoreError> {
    let mut file = File::open(path)?;
    let mut hasher = Xxh64::new(SEED);
    let mut buf = vec![0u8; HASH_BLOCK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(to_hex(hasher.digest()))
}

/// Compare a file's digest against an expected one, ignoring case.
pub fn verify_file(path: &Path, expected: &str) -> Result<bool, CoreError> {
    let actual = hash_file(path)?;
    Ok(actual.eq_ignore_ascii_case(expected.trim()))
}
