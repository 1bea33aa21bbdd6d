//! The unit of work the scheduler submits to its executor.

use super::engine::{Completion, Shared};
use super::Job;
use crate::utils::{now_utc, panic_message};
use futures::FutureExt;
use serde_json::json;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs one dispatch of a job and feeds the outcome back to the scheduler.
pub(super) struct JobTask {
    shared: Arc<Shared>,
    token: u64,
    job: Job,
}

impl JobTask {
    pub(super) const fn new(shared: Arc<Shared>, token: u64, job: Job) -> Self {
        Self { shared, token, job }
    }

    pub(super) async fn run(self) {
        let outcome = match AssertUnwindSafe(self.job.execute()).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(anyhow::anyhow!(
                "job panicked: {}",
                panic_message(payload.as_ref())
            )),
        };

        match outcome {
            Ok(next) => {
                let completion = self.shared.complete(self.token, &self.job, next);
                self.report(&completion);
                self.shared
                    .emit("scheduler.job.ended", Some(json!({"job_id": self.job.id()})));
                debug!(job_id = %self.job.id(), "Job ended");
                self.shared.delegate().job_ended(self.job.id());
            }
            Err(err) => {
                let next = if self.shared.config().reschedule_on_failure {
                    self.job.after_interval(now_utc())
                } else {
                    None
                };
                let completion = self.shared.complete(self.token, &self.job, next);
                self.report(&completion);
                self.shared.emit(
                    "scheduler.job.failed",
                    Some(json!({"job_id": self.job.id(), "error": format!("{err:#}")})),
                );
                warn!(job_id = %self.job.id(), error = %format!("{err:#}"), "Job failed");
                self.shared.delegate().job_failed(self.job.id(), &err);
            }
        }
    }

    fn report(&self, completion: &Completion) {
        match completion {
            Completion::Rescheduled(next_run) => {
                self.shared.emit(
                    "scheduler.job.rescheduled",
                    Some(json!({
                        "job_id": self.job.id(),
                        "next_run": next_run.to_rfc3339(),
                    })),
                );
                debug!(job_id = %self.job.id(), next_run = %next_run, "Job rescheduled");
            }
            Completion::Finished => {
                debug!(job_id = %self.job.id(), "Job finished, not rescheduled");
            }
            Completion::Removed => {
                debug!(job_id = %self.job.id(), "Job removed while running, dropping");
            }
        }
    }
}
