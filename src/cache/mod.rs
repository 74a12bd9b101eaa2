//! Response cache.
//!
//! - [`key::make_key`] builds bounded, collision-safe keys from call
//!   parameters.
//! - [`Cache`] applies one TTL to every write and hides which backend is in
//!   use: [`RemoteStore`] (Redis) or [`LocalStore`] (table + JSON file).
//! - [`codec`] is the versioned byte format both backends share.

// Author: kelexine (https://github.com/kelexine)

pub mod codec;
pub mod key;
pub mod local;
pub mod remote;
pub mod store;

pub use codec::{CacheEntry, Metadata};
pub use key::make_key;
pub use local::LocalStore;
pub use remote::{KeyValueService, RedisService, RemoteStore};
pub use store::{Cache, CacheBackend};
