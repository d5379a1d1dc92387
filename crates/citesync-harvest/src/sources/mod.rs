pub mod crossref;
pub mod fetcher;
pub mod proxy;

pub use crossref::Registry;
pub use fetcher::MetadataFetcher;
pub use proxy::DoiProxy;
