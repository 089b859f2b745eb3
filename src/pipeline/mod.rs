// Data pipeline: processing stages, snapshot encoding, and the refresh run

pub mod parquet_out;
pub mod processing;
pub mod refresh;

pub use processing::{aggregate_by_location, filter, normalize, summarize, InspectionFilter};
pub use refresh::{Pipeline, RefreshResult};
