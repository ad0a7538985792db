//! Filtering and sorting of job listings.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::job::{JobRecord, JobStatus, JobSummary};

/// Listing order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    /// By id, ascending.
    #[default]
    Default,
    /// By duration, shortest first.
    Upper,
    /// By duration, longest first.
    Lower,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEFAULT" => Ok(SortOrder::Default),
            "UPPER" => Ok(SortOrder::Upper),
            "LOWER" => Ok(SortOrder::Lower),
            other => Err(format!("Unknown sort order '{}'", other)),
        }
    }
}

/// Status filter for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(JobStatus),
}

impl StatusFilter {
    pub fn matches(self, status: JobStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => wanted == status,
        }
    }
}

impl From<JobStatus> for StatusFilter {
    fn from(status: JobStatus) -> Self {
        StatusFilter::Only(status)
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("ALL") {
            return Ok(StatusFilter::All);
        }
        s.parse::<JobStatus>().map(StatusFilter::Only)
    }
}

/// A listing request over a registry snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobQuery {
    pub sort: SortOrder,
    pub filter: StatusFilter,
}

impl JobQuery {
    pub fn new(sort: SortOrder, filter: StatusFilter) -> Self {
        Self { sort, filter }
    }

    /// Filters and sorts `snapshot` into summaries.
    ///
    /// Records are first ordered by id so that duration ties are broken
    /// deterministically; the duration sorts are stable on top of that.
    /// Jobs without a duration yet count as 0.
    pub fn apply(&self, snapshot: Vec<JobRecord>) -> Vec<JobSummary> {
        let mut summaries: Vec<JobSummary> = snapshot
            .iter()
            .filter(|job| self.filter.matches(job.status()))
            .map(JobRecord::to_summary)
            .collect();

        summaries.sort_by(|a, b| a.id.cmp(&b.id));

        match self.sort {
            SortOrder::Default => {}
            SortOrder::Upper => summaries.sort_by(by_duration),
            SortOrder::Lower => summaries.sort_by(|a, b| by_duration(b, a)),
        }

        summaries
    }
}

fn by_duration(a: &JobSummary, b: &JobSummary) -> Ordering {
    a.duration_ms.unwrap_or(0).cmp(&b.duration_ms.unwrap_or(0))
}
