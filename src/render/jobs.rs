//! Fire-and-forget rendering: opaque job ids over a worker thread.
//!
//! Single-process by design. The tracker outlives the triggering
//! request; callers poll [`JobTracker::status`] until the job settles.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime},
};

use serde::Serialize;

use crate::render::orchestrator::{RenderOrchestrator, RenderRequest};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Status record for one async render.
#[derive(Clone, Debug, Serialize)]
pub struct RenderJob {
    pub id: String,
    pub state: JobState,
    pub progress: u8,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
}

struct JobEntry {
    job: RenderJob,
    finished: Option<SystemTime>,
}

#[derive(Default)]
pub struct JobTracker {
    jobs: Arc<Mutex<HashMap<String, JobEntry>>>,
    counter: AtomicU64,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a render on a worker thread and return immediately with
    /// its job id.
    pub fn submit(&self, orchestrator: Arc<RenderOrchestrator>, req: RenderRequest) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let id = format!("job-{seq:06}-{millis:x}");

        {
            let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
            jobs.insert(
                id.clone(),
                JobEntry {
                    job: RenderJob {
                        id: id.clone(),
                        state: JobState::Pending,
                        progress: 0,
                        output_path: None,
                        error: None,
                    },
                    finished: None,
                },
            );
        }

        let jobs = Arc::clone(&self.jobs);
        let worker_id = id.clone();
        std::thread::spawn(move || {
            update(&jobs, &worker_id, |job| {
                job.state = JobState::Processing;
                job.progress = 10;
            });

            let result = orchestrator.render(&req);

            update(&jobs, &worker_id, |job| {
                job.progress = 90;
            });

            let finished = SystemTime::now();
            let mut map = jobs.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = map.get_mut(&worker_id) {
                entry.finished = Some(finished);
                if result.success {
                    entry.job.state = JobState::Completed;
                    entry.job.progress = 100;
                    entry.job.output_path = result.output_path;
                } else {
                    entry.job.state = JobState::Failed;
                    entry.job.error = Some(result.message);
                }
            }
            tracing::debug!(id = %worker_id, "render job settled");
        });

        id
    }

    pub fn status(&self, id: &str) -> Option<RenderJob> {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .map(|entry| entry.job.clone())
    }

    /// Drop settled jobs older than the retention window. Returns the
    /// number removed; in-flight jobs are never touched.
    pub fn purge(&self, retention: Duration) -> usize {
        let cutoff = SystemTime::now()
            .checked_sub(retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let before = jobs.len();
        jobs.retain(|_, entry| match entry.finished {
            Some(done) => done >= cutoff,
            None => true,
        });
        before - jobs.len()
    }
}

fn update(
    jobs: &Arc<Mutex<HashMap<String, JobEntry>>>,
    id: &str,
    f: impl FnOnce(&mut RenderJob),
) {
    let mut map = jobs.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(entry) = map.get_mut(id) {
        f(&mut entry.job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_job_id_returns_none() {
        let tracker = JobTracker::new();
        assert!(tracker.status("job-000000-0").is_none());
    }

    #[test]
    fn purge_keeps_unfinished_jobs() {
        let tracker = JobTracker::new();
        tracker.jobs.lock().unwrap().insert(
            "inflight".to_string(),
            JobEntry {
                job: RenderJob {
                    id: "inflight".to_string(),
                    state: JobState::Processing,
                    progress: 10,
                    output_path: None,
                    error: None,
                },
                finished: None,
            },
        );
        tracker.jobs.lock().unwrap().insert(
            "old".to_string(),
            JobEntry {
                job: RenderJob {
                    id: "old".to_string(),
                    state: JobState::Completed,
                    progress: 100,
                    output_path: None,
                    error: None,
                },
                finished: Some(SystemTime::now() - Duration::from_secs(7200)),
            },
        );

        let removed = tracker.purge(Duration::from_secs(3600));
        assert_eq!(removed, 1);
        assert!(tracker.status("inflight").is_some());
        assert!(tracker.status("old").is_none());
    }
}
