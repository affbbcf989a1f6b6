//! API client: credentials, asset calls, and lazy pagination.

pub mod api;
pub mod error;
pub mod files;
pub mod pagination;

pub use api::{client_version, ApiClient, CLIENT_HEADER, DEFAULT_HOST};
pub use error::ClientError;
pub use files::{guess_filetype, NewAsset};
pub use pagination::{PageCursor, PageMeta, PageRequest, PageSource, Paginator, RawPage};
