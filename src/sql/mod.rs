//! Safe SQL builder: identifiers from the catalog only, values as parameters.

mod builder;
pub mod params;
pub use builder::*;
pub(crate) use builder::{qualified_table, quoted};
pub use params::*;
