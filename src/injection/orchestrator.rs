use crate::error::{Result, SoaLedgerError};
use crate::extractor::extract_data;
use crate::injection::target::{build_updates, find_target_row, SheetTarget};
use crate::injection::types::*;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio::sync::Notify;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// Cuts a pending cool-down short from another task.
#[derive(Debug, Clone)]
pub struct RetryHandle {
    notify: Arc<Notify>,
}

impl RetryHandle {
    /// Starts the retry pass now. Triggers sent after the `AwaitingRetry` event are kept
    /// until the cool-down picks them up; earlier ones are discarded.
    pub fn trigger(&self) {
        self.notify.notify_one();
    }
}

enum Pass {
    First,
    Retry,
}

/// Injects extracted records into a destination sheet, one document at a time.
///
/// Rate-limited documents are set aside during the first pass and resubmitted once after a
/// cool-down. A document that is rate-limited again is counted as failed but stays queued for
/// [`BatchOrchestrator::retry_pending`].
pub struct BatchOrchestrator<T: SheetTarget> {
    target: T,
    config: InjectionConfig,
    progress: Option<Sender<InjectionEvent>>,
    shutdown: CancellationToken,
    cancel: CancellationToken,
    retry_now: Arc<Notify>,
    state: BatchState,
    documents: Vec<SourceDocument>,
    outcomes: Vec<InjectionOutcome>,
    first_pass: BatchSummary,
    pending_retry: Vec<usize>,
}

impl<T: SheetTarget> BatchOrchestrator<T> {
    pub fn new(target: T, config: InjectionConfig) -> Self {
        let shutdown = CancellationToken::new();
        Self {
            target,
            config,
            progress: None,
            cancel: shutdown.child_token(),
            shutdown,
            retry_now: Arc::new(Notify::new()),
            state: BatchState::Idle,
            documents: Vec::new(),
            outcomes: Vec::new(),
            first_pass: BatchSummary::default(),
            pending_retry: Vec::new(),
        }
    }

    pub fn with_progress(mut self, sender: Sender<InjectionEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Ties every batch to an outer token. Cancelling it stops the running batch and any
    /// later one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token.child_token();
        self.shutdown = token;
        self
    }

    /// Token of the running batch, or of the next one when idle. Cancelling it stops that
    /// batch only; the batch after it gets a fresh token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn retry_handle(&self) -> RetryHandle {
        RetryHandle {
            notify: Arc::clone(&self.retry_now),
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn pending_retry(&self) -> &[usize] {
        &self.pending_retry
    }

    /// Runs a new batch over `documents`, replacing any previous one.
    pub async fn run(&mut self, documents: Vec<SourceDocument>) -> Result<BatchReport> {
        self.outcomes = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| InjectionOutcome::new(i, &doc.name))
            .collect();
        self.documents = documents;
        self.pending_retry.clear();
        self.first_pass = BatchSummary::default();
        self.state = BatchState::Running;
        self.rearm_cancellation();

        info!("Starting injection of {} document(s)", self.documents.len());
        self.send_event(InjectionEvent::Started {
            total: self.documents.len(),
        })
        .await;

        let all: Vec<usize> = (0..self.documents.len()).collect();
        let finished = self.run_pass(&all, Pass::First).await;
        self.first_pass = self.summary();
        self.pending_retry = self.rate_limited();

        if !finished {
            return Ok(self.cancelled().await);
        }
        if self.pending_retry.is_empty() {
            return Ok(self.completed().await);
        }

        self.state = BatchState::AwaitingRetry;
        self.discard_retry_trigger().await;
        warn!(
            "{} document(s) hit the rate limit; retrying after {:?}",
            self.pending_retry.len(),
            self.config.cooldown
        );
        self.send_event(InjectionEvent::AwaitingRetry {
            pending: self.pending_retry.len(),
            cooldown: self.config.cooldown,
        })
        .await;

        if !self.config.auto_retry {
            return Ok(self.report());
        }

        let cancelled = tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = sleep(self.config.cooldown) => false,
            _ = self.retry_now.notified() => false,
        };
        if cancelled {
            return Ok(self.cancelled().await);
        }

        self.retry_pending().await
    }

    /// Resubmits the documents still flagged as rate-limited, without waiting.
    pub async fn retry_pending(&mut self) -> Result<BatchReport> {
        let pending = std::mem::take(&mut self.pending_retry);
        if pending.is_empty() {
            debug!("Nothing pending for retry");
            return Ok(self.report());
        }

        self.state = BatchState::Running;
        self.rearm_cancellation();
        info!("Retrying {} rate-limited document(s)", pending.len());
        self.send_event(InjectionEvent::RetryStarted {
            pending: pending.len(),
        })
        .await;

        let finished = self.run_pass(&pending, Pass::Retry).await;
        self.pending_retry = self.rate_limited();

        if finished {
            Ok(self.completed().await)
        } else {
            // Items the cancelled pass never reached keep their earlier standing.
            Ok(self.cancelled().await)
        }
    }

    /// Processes `indices` in order. Returns `false` when cancelled before the end.
    async fn run_pass(&mut self, indices: &[usize], pass: Pass) -> bool {
        let total = indices.len();
        let started = Instant::now();

        for (done, &index) in indices.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return false;
            }

            let eta_secs = (done > 0).then(|| {
                let per_item = started.elapsed().as_secs_f64() / done as f64;
                (per_item * (total - done) as f64).round() as u64
            });
            self.send_event(InjectionEvent::Progress {
                current: done + 1,
                completed: done,
                total,
                percent: (done * 100 / total) as u8,
                eta_secs,
            })
            .await;

            let outcome = self.process(index, &pass).await;
            self.outcomes[index] = outcome.clone();
            self.send_event(InjectionEvent::ItemFinished { outcome }).await;

            if done + 1 < total && !self.config.item_delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => return false,
                    _ = sleep(self.config.item_delay) => {}
                }
            }
        }

        self.send_event(InjectionEvent::Progress {
            current: total,
            completed: total,
            total,
            percent: 100,
            eta_secs: Some(0),
        })
        .await;
        true
    }

    async fn process(&self, index: usize, pass: &Pass) -> InjectionOutcome {
        let doc = &self.documents[index];
        let mut outcome = InjectionOutcome::new(index, &doc.name);

        match self.inject(doc, &mut outcome).await {
            Ok(()) => {
                debug!("Injected '{}' into row {:?}", doc.name, outcome.row);
                outcome.status = ItemStatus::Success;
            }
            Err(err) if err.is_rate_limited() => {
                outcome.rate_limited = true;
                outcome.message = Some(err.to_string());
                outcome.status = match pass {
                    Pass::First => ItemStatus::Skipped,
                    Pass::Retry => ItemStatus::Failed,
                };
                warn!("Rate limited on '{}': {}", doc.name, err);
            }
            Err(err) => {
                outcome.message = Some(err.to_string());
                outcome.status = ItemStatus::Failed;
                warn!("Failed to inject '{}': {}", doc.name, err);
            }
        }

        outcome
    }

    async fn inject(&self, doc: &SourceDocument, outcome: &mut InjectionOutcome) -> Result<()> {
        let data = extract_data(&doc.bytes, &doc.name)?;
        if data.file_id.is_empty() {
            return Err(SoaLedgerError::MissingFileId(doc.name.clone()));
        }
        outcome.file_id = Some(data.file_id.clone());

        let tab = self.config.tab_name.as_deref();
        let row = find_target_row(&self.target, &data.file_id, tab).await?;
        outcome.row = Some(row);

        let updates = build_updates(&data, row, tab);
        if updates.is_empty() {
            debug!("'{}' has no records to write", doc.name);
            return Ok(());
        }
        self.target.batch_write(updates).await
    }

    /// Replaces a token spent by an earlier cancelled batch.
    fn rearm_cancellation(&mut self) {
        if self.cancel.is_cancelled() {
            self.cancel = self.shutdown.child_token();
        }
    }

    /// Consumes a trigger left over from before this wait.
    async fn discard_retry_trigger(&self) {
        tokio::select! {
            biased;
            _ = self.retry_now.notified() => debug!("Discarding an early retry trigger"),
            _ = std::future::ready(()) => {}
        }
    }

    fn rate_limited(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter(|o| o.rate_limited)
            .map(|o| o.index)
            .collect()
    }

    fn summary(&self) -> BatchSummary {
        BatchSummary::from_outcomes(&self.outcomes)
    }

    fn report(&self) -> BatchReport {
        BatchReport {
            summary: self.summary(),
            first_pass: self.first_pass,
            outcomes: self.outcomes.clone(),
            pending_retry: self.pending_retry.clone(),
        }
    }

    async fn completed(&mut self) -> BatchReport {
        self.state = BatchState::Completed;
        let report = self.report();
        info!(
            "Injection finished: {} succeeded, {} failed, {} skipped",
            report.summary.success, report.summary.failed, report.summary.skipped
        );
        self.send_event(InjectionEvent::Completed {
            summary: report.summary,
        })
        .await;
        report
    }

    async fn cancelled(&mut self) -> BatchReport {
        self.state = BatchState::Cancelled;
        let report = self.report();
        warn!("Injection cancelled");
        self.send_event(InjectionEvent::Cancelled {
            summary: report.summary,
        })
        .await;
        report
    }

    async fn send_event(&self, event: InjectionEvent) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event).await;
        }
    }
}
