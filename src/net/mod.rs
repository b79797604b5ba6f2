pub mod fetcher;
pub mod options;

pub use fetcher::{ByteStream, FetchBackend, FetchRequest, FetchResponse, HttpFetcher, HttpMethod};
pub use options::{FetchOptions, Serializer};
