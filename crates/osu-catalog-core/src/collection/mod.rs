//! Beatmap collections
//!
//! Collections are read from osu!stable's `collection.db` and from this
//! client's own `collections.db`, which records local additions and removals.

pub mod model;
pub mod registry;

pub use model::{Collection, DEFAULT_COLLECTION_NAME};
pub use registry::{CollectionRegistry, COLLECTIONS_DB_VERSION};
