/*!
 * FileHarbor Library
 * Multi-user virtual filesystem browser core
 */

pub mod browse;
pub mod cache;
pub mod config;
pub mod core;
pub mod indexer;
pub mod ops;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod telemetry;
pub mod users;

// Re-exports
pub use crate::browse::{Browser, FileInfo, ListOptions, Listing};
pub use crate::cache::{MetadataCache, MetadataRecord, STALE_AFTER};
pub use crate::config::Config;
pub use crate::core::{
    Clock, CoreError, CoreResult, Identity, ManualClock, Role, SystemClock, UserRef,
};
pub use crate::indexer::{IndexScheduler, Indexer};
pub use crate::ops::FileOps;
pub use crate::registry::{PathMapping, PathRegistry};
pub use crate::resolver::{PathResolver, Resolved};
pub use crate::store::Store;
pub use crate::telemetry::init_tracing;
pub use crate::users::{Permission, PermissionSet, User, UserStore};
