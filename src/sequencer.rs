//! Lazy per-stage parameter sequencing.
//!
//! The job-submission loop runs one distributed job per requested stage.
//! [`for_stages`] turns a base task request plus an ordered stage list into
//! a lazy sequence of validated [`TaskParameters`], one per stage; a stage
//! that fails validation is yielded as an error in its position so the
//! caller stops there instead of silently skipping it.

use crate::error::ParametersError;
use crate::params::{TaskParameters, TaskRequest};

/// Build a lazy stage plan over `stages`, in the given order.
///
/// The plan is consumed once, in order; it is not restartable.
pub fn for_stages<I, S>(request: TaskRequest, stages: I) -> StagePlan
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    StagePlan {
        request,
        stages: stages
            .into_iter()
            .map(Into::into)
            .collect::<Vec<_>>()
            .into_iter(),
    }
}

/// Iterator yielding one validated parameter set per stage.
///
/// Every yielded set shares the request's partition and scaling parameters;
/// only the stage (and its resolved output file name) varies.
#[derive(Debug)]
pub struct StagePlan {
    request: TaskRequest,
    stages: std::vec::IntoIter<String>,
}

impl Iterator for StagePlan {
    type Item = Result<TaskParameters, ParametersError>;

    fn next(&mut self) -> Option<Self::Item> {
        let stage = self.stages.next()?;
        Some(TaskParameters::resolve(&self.request, &stage))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.stages.size_hint()
    }
}
