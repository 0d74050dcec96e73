//! Runnable jobs: tasks that could be scheduled on a push but have not run.

use sha2::{Digest, Sha256};

use crate::models::{Job, RUNNABLE};

/// Stable negative id for a runnable job, so it never collides with a
/// real job id.
pub fn runnable_job_id(push_id: i64, signature: &str) -> i64 {
    let digest = Sha256::digest(format!("{}:{}", push_id, signature).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let magnitude = (u64::from_be_bytes(bytes) >> 1) as i64;
    -magnitude.max(1)
}

/// Tag upstream runnable records for `push_id`. Records without a
/// signature cannot be scheduled and are dropped.
pub fn prepare_runnable_jobs(push_id: i64, jobs: Vec<Job>) -> Vec<Job> {
    jobs.into_iter()
        .filter_map(|mut job| {
            let signature = job.signature.clone().filter(|s| !s.is_empty())?;
            job.id = runnable_job_id(push_id, &signature);
            job.push_id = push_id;
            job.state = RUNNABLE.to_string();
            job.result = RUNNABLE.to_string();
            job.result_status = None;
            Some(job)
        })
        .collect()
}
