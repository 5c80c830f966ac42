//! Domain types: dataset items, annotation records, and the factor taxonomy.

pub mod item;
pub mod record;
pub mod taxonomy;

pub use item::{ClaimSide, Item};
pub use record::{Agreement, AnnotationRecord, ContextualFactors, Label};
pub use taxonomy::Factor;
