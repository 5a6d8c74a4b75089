pub mod common;
pub mod design;
pub mod design_at_version;
pub mod filter;
pub mod version;

pub use common::*;
pub use design::*;
pub use design_at_version::*;
pub use filter::*;
pub use version::*;
