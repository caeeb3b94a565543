use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the job a process was launched into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u32);

impl JobId {
    /// Wraps a raw job number.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw job number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Position of a process within its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(u32);

impl Rank {
    /// Wraps a raw rank.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw rank.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Globally unique address of a process in the registry and out-of-band layer.
///
/// Identities are assigned by the launcher before bootstrap begins and never
/// change afterwards.
///
/// # Example
///
/// ```
/// use cohort_types::{JobId, ProcessIdentity, Rank};
///
/// let id = ProcessIdentity::new(JobId::new(1), Rank::new(3));
/// assert_eq!(id.to_string(), "[1,3]");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessIdentity {
    job: JobId,
    rank: Rank,
}

impl ProcessIdentity {
    /// Builds an identity from its parts.
    #[must_use]
    pub const fn new(job: JobId, rank: Rank) -> Self {
        Self { job, rank }
    }

    /// Returns the owning job.
    #[must_use]
    pub const fn job(self) -> JobId {
        self.job
    }

    /// Returns the rank within the job.
    #[must_use]
    pub const fn rank(self) -> Rank {
        self.rank
    }

    /// Lists every identity of a job with `size` members, in rank order.
    #[must_use]
    pub fn job_members(job: JobId, size: u32) -> Vec<Self> {
        (0..size).map(|rank| Self::new(job, Rank::new(rank))).collect()
    }
}

impl fmt::Display for ProcessIdentity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[{},{}]", self.job, self.rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identities_order_by_job_then_rank() {
        let a = ProcessIdentity::new(JobId::new(1), Rank::new(7));
        let b = ProcessIdentity::new(JobId::new(2), Rank::new(0));
        assert!(a < b);
    }

    #[test]
    fn job_members_are_rank_ordered() {
        let members = ProcessIdentity::job_members(JobId::new(4), 3);
        let ranks: Vec<u32> = members.iter().map(|id| id.rank().get()).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
        assert!(members.iter().all(|id| id.job() == JobId::new(4)));
    }
}
