pub mod batch_loader;
pub mod design_index;
pub mod join_query;
pub mod resolver;
pub mod snapshot;
pub mod version_events;

pub use batch_loader::{DesignAtVersionLoader, LoadResult, PendingLoad};
pub use design_index::{DesignIndex, DesignReference};
pub use join_query::{ColumnSplit, DesignAtVersionQuery, Projection};
pub use resolver::DesignAtVersionResolver;
pub use snapshot::DesignState;
pub use version_events::{VersionEventCache, VersionEvents};
