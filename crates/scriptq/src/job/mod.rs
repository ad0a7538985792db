pub mod record;
pub mod status;
pub mod view;

pub use record::{Completion, JobRecord};
pub use status::JobStatus;
pub use view::{JobDetails, JobSummary, SubmitResponse};
