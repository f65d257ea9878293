//! Typed collection API.
//!
//! Provides `Collection<T>` for type-safe record storage with automatic
//! JSON mapping via the [`Record`] trait.

mod record;
mod typed;

pub use record::{to_document, Record, ID_FIELD};
pub use typed::Collection;
