pub mod asset;
pub mod chunk;
pub mod error;
pub mod filename;
pub mod hash;
pub mod options;
pub mod units;

pub use asset::Asset;
pub use chunk::{plan_by_size, plan_parts, ByteRange};
pub use error::CoreError;
pub use hash::{hash_bytes, hash_file, verify_file};
pub use options::TransferOptions;

/// Bytes in a kibibyte.
pub const KB: u64 = 1024;
/// Bytes in a mebibyte.
pub const MB: u64 = KB * KB;

/// Files smaller than this are always fetched with a single request.
pub const MULTIPART_THRESHOLD: u64 = 25 * MB;

/// Default byte length of one download chunk.
pub const DEFAULT_CHUNK_SIZE: u64 = 25 * MB;

/// Default number of chunks in flight for one transfer.
pub const DEFAULT_CONCURRENCY: usize = 5;
