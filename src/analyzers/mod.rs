//! Price aggregation.
//!
//! This module groups awarded unit prices by unit of measure, computes
//! descriptive statistics and the sanitized mean for each group, and
//! derives a reference price with a one-sigma band.

pub mod reference;
pub mod sanitize;
pub mod summary;
pub mod types;
pub mod utility;

pub use reference::derive;
pub use sanitize::sanitized_mean;
pub use summary::{group_summary, summarize_by_unit};
pub use types::{GroupSummary, PriceBasis, ReferencePrice};
