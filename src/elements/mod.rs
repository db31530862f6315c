//! Element Metadata
//!
//! Static description of known elements: content categories, permitted
//! content/parents/order/occurrences and other requirements.

pub mod registry;
pub mod schema;

pub use registry::MetaTable;
pub use schema::{Deprecated, ElementDef, MetaElement, Permitted};
