//! Submit-then-poll driver for long-running generation jobs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::content::Artifact;
use crate::errors::StudioError;
use crate::provider::{JobBackend, JobHandle, JobSnapshot, JobStatus};

const UNKNOWN_FAILURE: &str = "Unknown error";
const DEFAULT_MISSING_ARTIFACT: &str = "Generation completed, but no output was returned.";
const DEFAULT_TIMEOUT: &str = "Generation timed out.";

/// How often and how many times a job is polled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Message surfaced when a job succeeds without a usable artifact.
    pub missing_artifact_message: String,
    /// Message surfaced when the attempt budget runs out.
    pub timeout_message: String,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            missing_artifact_message: DEFAULT_MISSING_ARTIFACT.to_string(),
            timeout_message: DEFAULT_TIMEOUT.to_string(),
        }
    }

    /// 2 s × 30 attempts.
    pub fn image() -> Self {
        Self::new(Duration::from_secs(2), 30)
            .missing_artifact_message("Image generation completed, but no image was returned.")
            .timeout_message("Image generation timed out.")
    }

    /// 10 s × `max_attempts`.
    pub fn video(max_attempts: u32) -> Self {
        Self::new(Duration::from_secs(10), max_attempts)
            .missing_artifact_message("Video generation completed, but no video was returned.")
            .timeout_message("Video generation timed out.")
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn missing_artifact_message(mut self, message: impl Into<String>) -> Self {
        self.missing_artifact_message = message.into();
        self
    }

    pub fn timeout_message(mut self, message: impl Into<String>) -> Self {
        self.timeout_message = message.into();
        self
    }
}

/// Local view of a submitted job. Mutated only by poll results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub handle: JobHandle,
    pub status: JobStatus,
    pub polls: u32,
    pub artifact: Option<Artifact>,
    pub failure: Option<String>,
}

impl Job {
    pub fn new(handle: JobHandle) -> Self {
        Self {
            handle,
            status: JobStatus::Pending,
            polls: 0,
            artifact: None,
            failure: None,
        }
    }

    /// Folds one snapshot into the job.
    ///
    /// Returns `false` when the snapshot was ignored: the job is already
    /// terminal, or the snapshot reports an earlier lifecycle state.
    pub fn apply(&mut self, snapshot: JobSnapshot) -> bool {
        if self.status.is_terminal() || snapshot.status < self.status {
            return false;
        }
        self.status = snapshot.status;
        match snapshot.status {
            JobStatus::Succeeded => self.artifact = snapshot.artifact,
            JobStatus::Failed => self.failure = snapshot.message,
            JobStatus::Pending | JobStatus::Running => {}
        }
        true
    }

    fn into_outcome(self, policy: &PollPolicy) -> Result<Artifact, StudioError> {
        match self.status {
            JobStatus::Succeeded => self
                .artifact
                .filter(Artifact::is_usable)
                .ok_or_else(|| StudioError::ArtifactMissing(policy.missing_artifact_message.clone())),
            JobStatus::Failed => Err(StudioError::GenerationFailed {
                message: self
                    .failure
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_FAILURE.to_string()),
            }),
            JobStatus::Pending | JobStatus::Running => {
                Err(StudioError::Timeout {
                    attempts: self.polls,
                    message: policy.timeout_message.clone(),
                })
            }
        }
    }
}

/// Handle used to request cancellation of a running poll loop.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Requests cancellation. The pending attempt timer is dropped and the
    /// waiter resolves with `StudioError::Cancelled`.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving side of an `AbortHandle`.
#[derive(Clone, Debug)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Resolves once cancellation was requested. Pends forever if every
    /// `AbortHandle` was dropped without aborting.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx: Arc::new(tx) }, AbortSignal { rx })
}

/// Background poll loop started with `Poller::spawn`.
pub struct PollTask {
    abort: AbortHandle,
    join: JoinHandle<Result<Artifact, StudioError>>,
}

impl PollTask {
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub async fn wait(self) -> Result<Artifact, StudioError> {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => Err(StudioError::Cancelled),
            Err(e) => Err(StudioError::Internal(format!("poll task failed: {e}"))),
        }
    }
}

/// Drives a `JobBackend` from submission to a terminal outcome.
pub struct Poller<B> {
    backend: Arc<B>,
    policy: PollPolicy,
}

impl<B> Clone for Poller<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            policy: self.policy.clone(),
        }
    }
}

impl<B> Poller<B>
where
    B: JobBackend + 'static,
{
    pub fn new(backend: B, policy: PollPolicy) -> Self {
        Self::from_arc(Arc::new(backend), policy)
    }

    pub fn from_arc(backend: Arc<B>, policy: PollPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Sends the generation request. Any rejection is a `Submission` error.
    pub async fn submit(&self, request: &B::Request) -> Result<Job, StudioError> {
        let provider = self.backend.id();
        let handle = self.backend.submit(request).await.map_err(|e| {
            warn!(
                event = "job.submit_failed",
                domain = "job",
                provider = %provider,
                status_code = e.status_code(),
                error = %e,
                "job submission rejected"
            );
            StudioError::Submission(e.message().to_string())
        })?;
        if handle.id.trim().is_empty() {
            return Err(StudioError::Submission(
                "provider returned no job handle".to_string(),
            ));
        }
        info!(
            event = "job.submitted",
            domain = "job",
            provider = %provider,
            job_id = %handle.id
        );
        Ok(Job::new(handle))
    }

    /// Performs one status check. Failed checks leave the job untouched.
    pub async fn poll(&self, job: &mut Job) -> JobStatus {
        job.polls += 1;
        debug!(
            event = "job.poll_attempt",
            domain = "job",
            provider = %job.handle.provider,
            job_id = %job.handle.id,
            attempt = job.polls
        );
        let snapshot = match self.backend.poll(&job.handle).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    event = "job.poll_failed",
                    domain = "job",
                    provider = %job.handle.provider,
                    job_id = %job.handle.id,
                    attempt = job.polls,
                    error = %e,
                    "status check failed; retrying on next tick"
                );
                return job.status;
            }
        };
        let previous = job.status;
        let reported = snapshot.status;
        if !job.apply(snapshot) {
            warn!(
                event = "job.status_regressed",
                domain = "job",
                job_id = %job.handle.id,
                current = previous.as_str(),
                reported = reported.as_str()
            );
        } else if previous != job.status {
            debug!(
                event = "job.status_changed",
                domain = "job",
                job_id = %job.handle.id,
                from = previous.as_str(),
                to = job.status.as_str()
            );
        }
        job.status
    }

    /// Polls until the job is terminal, the attempt budget runs out or the
    /// signal fires.
    pub async fn wait(&self, mut job: Job, mut signal: AbortSignal) -> Result<Artifact, StudioError> {
        while !job.status.is_terminal() && job.polls < self.policy.max_attempts {
            let tick = async {
                tokio::time::sleep(self.policy.interval).await;
                self.poll(&mut job).await;
            };
            let cancelled = tokio::select! {
                biased;
                _ = signal.cancelled() => true,
                _ = tick => false,
            };
            if cancelled {
                info!(
                    event = "job.cancelled",
                    domain = "job",
                    job_id = %job.handle.id,
                    polls = job.polls
                );
                return Err(StudioError::Cancelled);
            }
        }

        let job_id = job.handle.id.clone();
        let polls = job.polls;
        let outcome = job.into_outcome(&self.policy);
        match &outcome {
            Ok(_) => info!(event = "job.succeeded", domain = "job", job_id = %job_id, polls),
            Err(StudioError::Timeout { .. }) => warn!(
                event = "job.timed_out",
                domain = "job",
                job_id = %job_id,
                polls
            ),
            Err(e) => warn!(
                event = "job.failed",
                domain = "job",
                job_id = %job_id,
                polls,
                error = %e
            ),
        }
        outcome
    }

    /// Submits and waits without cancellation.
    pub async fn run(&self, request: &B::Request) -> Result<Artifact, StudioError> {
        let job = self.submit(request).await?;
        self.wait(job, AbortSignal::never()).await
    }

    /// Runs the wait loop as a background task.
    pub fn spawn(&self, job: Job) -> PollTask {
        let (abort, signal) = abort_pair();
        let poller = self.clone();
        let join = tokio::spawn(async move { poller.wait(job, signal).await });
        PollTask { abort, join }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::errors::ProviderError;
    use crate::model::ProviderId;

    struct FakeBackend {
        submit: Result<String, ProviderError>,
        script: Mutex<VecDeque<Result<JobSnapshot, ProviderError>>>,
        polls: AtomicU32,
    }

    impl FakeBackend {
        fn scripted(script: Vec<Result<JobSnapshot, ProviderError>>) -> Self {
            Self {
                submit: Ok("task-1".to_string()),
                script: Mutex::new(script.into()),
                polls: AtomicU32::new(0),
            }
        }

        fn polls(&self) -> u32 {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl JobBackend for FakeBackend {
        type Request = String;

        fn id(&self) -> ProviderId {
            ProviderId::new("fake")
        }

        async fn submit(&self, _request: &String) -> Result<JobHandle, ProviderError> {
            self.submit
                .clone()
                .map(|id| JobHandle::new(self.id(), id))
        }

        async fn poll(&self, _handle: &JobHandle) -> Result<JobSnapshot, ProviderError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .expect("script lock")
                .pop_front()
                .unwrap_or_else(|| Ok(JobSnapshot::running()))
        }
    }

    fn url(u: &str) -> Option<Artifact> {
        Some(Artifact::Url(u.to_string()))
    }

    fn poller(backend: FakeBackend, max_attempts: u32) -> Poller<FakeBackend> {
        Poller::new(backend, PollPolicy::new(Duration::from_secs(2), max_attempts))
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_exactly_k_polls() {
        let poller = poller(
            FakeBackend::scripted(vec![
                Ok(JobSnapshot::pending()),
                Ok(JobSnapshot::running()),
                Ok(JobSnapshot::succeeded(url("https://cdn/x.png"))),
                Ok(JobSnapshot::succeeded(url("https://cdn/late.png"))),
            ]),
            30,
        );
        let started = tokio::time::Instant::now();
        let artifact = poller.run(&"cat".to_string()).await.expect("artifact");
        assert_eq!(artifact, Artifact::Url("https://cdn/x.png".into()));
        assert_eq!(poller.backend().polls(), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn never_terminal_times_out_after_budget() {
        let poller = poller(FakeBackend::scripted(Vec::new()), 5);
        let err = poller.run(&"cat".to_string()).await.expect_err("timeout");
        assert_eq!(
            err,
            StudioError::Timeout {
                attempts: 5,
                message: "Generation timed out.".into()
            }
        );
        assert_eq!(poller.backend().polls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_message_follows_policy() {
        let image = Poller::new(
            FakeBackend::scripted(Vec::new()),
            PollPolicy::image().max_attempts(2),
        );
        let err = image.run(&"cat".to_string()).await.expect_err("timeout");
        assert_eq!(err.user_message(), "Image generation timed out.");

        let video = Poller::new(FakeBackend::scripted(Vec::new()), PollPolicy::video(1));
        let err = video.run(&"waves".to_string()).await.expect_err("timeout");
        assert_eq!(err.user_message(), "Video generation timed out.");
    }

    #[tokio::test(start_paused = true)]
    async fn failure_message_is_passed_through_verbatim() {
        let poller = poller(
            FakeBackend::scripted(vec![
                Ok(JobSnapshot::running()),
                Ok(JobSnapshot::failed("DataInspectionFailed: input text may contain inappropriate content")),
            ]),
            30,
        );
        let err = poller.run(&"x".to_string()).await.expect_err("failed");
        assert_eq!(
            err,
            StudioError::GenerationFailed {
                message: "DataInspectionFailed: input text may contain inappropriate content".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failure_without_message_reports_unknown_error() {
        let poller = poller(
            FakeBackend::scripted(vec![Ok(JobSnapshot {
                status: JobStatus::Failed,
                artifact: None,
                message: None,
            })]),
            30,
        );
        let err = poller.run(&"x".to_string()).await.expect_err("failed");
        assert_eq!(err.user_message(), "Generation failed: Unknown error");
    }

    #[tokio::test(start_paused = true)]
    async fn transient_poll_errors_are_retried() {
        let poller = poller(
            FakeBackend::scripted(vec![
                Err(ProviderError::provider("fake", "bad gateway", Some(502))),
                Err(ProviderError::protocol("fake", "not json")),
                Ok(JobSnapshot::succeeded(url("https://cdn/ok.png"))),
            ]),
            30,
        );
        let artifact = poller.run(&"x".to_string()).await.expect("artifact");
        assert_eq!(artifact, Artifact::Url("https://cdn/ok.png".into()));
        assert_eq!(poller.backend().polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_artifact_reference_is_artifact_missing() {
        let poller = Poller::new(
            FakeBackend::scripted(vec![Ok(JobSnapshot::succeeded(url("")))]),
            PollPolicy::video(3),
        );
        let err = poller.run(&"x".to_string()).await.expect_err("missing");
        assert_eq!(
            err,
            StudioError::ArtifactMissing(
                "Video generation completed, but no video was returned.".into()
            )
        );
    }

    #[tokio::test(start_paused = true)]
    async fn regressed_status_is_ignored() {
        let poller = poller(
            FakeBackend::scripted(vec![Ok(JobSnapshot::running()), Ok(JobSnapshot::pending())]),
            30,
        );
        let mut job = poller.submit(&"x".to_string()).await.expect("job");
        assert_eq!(poller.poll(&mut job).await, JobStatus::Running);
        assert_eq!(poller.poll(&mut job).await, JobStatus::Running);
        assert_eq!(job.polls, 2);
    }

    #[test]
    fn terminal_job_ignores_further_snapshots() {
        let mut job = Job::new(JobHandle::new("fake", "t"));
        assert!(job.apply(JobSnapshot::failed("boom")));
        assert!(!job.apply(JobSnapshot::succeeded(url("https://x"))));
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure.as_deref(), Some("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn abort_stops_polling() {
        let poller = poller(FakeBackend::scripted(Vec::new()), 30);
        let job = poller.submit(&"x".to_string()).await.expect("job");
        let task = poller.spawn(job);
        let abort = task.abort_handle();

        tokio::time::sleep(Duration::from_millis(4_500)).await;
        abort.abort();
        assert!(abort.is_aborted());
        assert_eq!(task.wait().await, Err(StudioError::Cancelled));

        let polls = poller.backend().polls();
        assert_eq!(polls, 2);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(poller.backend().polls(), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_submission_is_submission_error() {
        let mut backend = FakeBackend::scripted(Vec::new());
        backend.submit = Err(ProviderError::provider("fake", "InvalidApiKey", Some(401)));
        let err = poller(backend, 30)
            .run(&"x".to_string())
            .await
            .expect_err("rejected");
        assert_eq!(err, StudioError::Submission("InvalidApiKey".into()));

        let mut backend = FakeBackend::scripted(Vec::new());
        backend.submit = Ok(String::new());
        let err = poller(backend, 30)
            .run(&"x".to_string())
            .await
            .expect_err("no handle");
        assert!(matches!(err, StudioError::Submission(_)));
    }
}
