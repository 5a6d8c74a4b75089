pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

pub use error::{LoadError, ResolveError, ResolveResult};

pub use logic::{
    DesignAtVersionLoader, DesignAtVersionQuery, DesignAtVersionResolver, DesignIndex,
    DesignReference, PendingLoad,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store};
