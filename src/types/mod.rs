//! Public types for the Stockroom API.

mod fields;
mod fingerprint;
mod item;
mod read;

pub use fields::{CustomFields, RawCustomField};
pub use fingerprint::{FingerprintDiff, ImageFingerprintMap};
pub use item::{CatalogItem, Classification, ItemSet};
pub use read::{CatalogRead, CatalogSource};
