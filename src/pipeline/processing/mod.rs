// Pipeline processing: type coercion, filtering, and rollups

pub mod aggregate;
pub mod filter;
pub mod normalize;
pub mod summary;

pub use aggregate::{aggregate_by_location, LocationSummary};
pub use filter::{filter, DateRange, InspectionFilter, Predicate};
pub use normalize::normalize;
pub use summary::{summarize, summary_metrics, DataSummary, DateSpan, SummaryMetrics};
