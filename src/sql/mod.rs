//! Safe SQL rendering: identifiers from the catalog only, values as parameters.

mod builder;
pub mod dialect;
pub mod params;
pub use builder::*;
pub use dialect::{dialect_for, DatabaseFamily, Dialect, RowReturn};
pub use params::*;
