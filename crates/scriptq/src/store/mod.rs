pub mod query;
pub mod registry;

pub use query::{JobQuery, SortOrder, StatusFilter};
pub use registry::{Registry, StatusCounts};
