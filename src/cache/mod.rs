pub mod fetch;
pub mod keys;
pub mod persist;
pub mod store;

pub use fetch::CachedFetcher;
pub use persist::{CachePersister, PersistCmd};
pub use store::{CacheEntry, CacheStore};
