//! Background Reanalysis
//!
//! When the controller enters `Waiting`, a single reanalysis pass runs off
//! the caller thread: it ranks recent patterns by error rate, recalibrates
//! the ensemble weights and seeds the pattern database with any unseen
//! substrings of the recent window. However the pass ends, the controller is
//! released back to `Predicting` and the busy flag is cleared.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::verification::VerificationController;
use crate::error::ReanalysisError;
use crate::ledger::{PatternErrorRate, PerformanceLedger};
use crate::mixer::{EnsembleWeights, WeightCalibrator};
use crate::patterns::PatternDatabase;
use crate::symbol::Symbol;
use crate::sync::{lock, read, write};

/// Unit of background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where reanalysis jobs run.
///
/// Implementations must either run the job or drop it; dropping releases
/// the controller.
pub trait Spawner: Send + Sync {
    fn spawn(&self, job: Job) -> std::io::Result<()>;
}

/// One named OS thread per job.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn(&self, job: Job) -> std::io::Result<()> {
        std::thread::Builder::new()
            .name("seqcast-reanalysis".into())
            .spawn(job)
            .map(|_| ())
    }
}

/// Runs the job on the calling thread before returning.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineSpawner;

impl Spawner for InlineSpawner {
    fn spawn(&self, job: Job) -> std::io::Result<()> {
        job();
        Ok(())
    }
}

/// Queues jobs until [`run_pending`](Self::run_pending) is called.
/// Used for deterministic stepping in tests and simulations.
#[derive(Default)]
pub struct DeferredSpawner {
    queue: Mutex<Vec<Job>>,
}

impl DeferredSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Run every queued job in submission order; returns how many ran.
    pub fn run_pending(&self) -> usize {
        let jobs: Vec<Job> = std::mem::take(&mut *lock(&self.queue));
        let count = jobs.len();
        for job in jobs {
            job();
        }
        count
    }
}

impl Spawner for DeferredSpawner {
    fn spawn(&self, job: Job) -> std::io::Result<()> {
        lock(&self.queue).push(job);
        Ok(())
    }
}

/// Diagnostic summary of a finished pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReanalysisReport {
    pub observations: usize,
    /// Highest error rate first
    pub error_rates: Vec<PatternErrorRate>,
    pub weights_updated: bool,
    pub new_patterns: usize,
    pub finished_at: DateTime<Utc>,
}

/// Model state touched by both the caller and the reanalysis worker.
pub struct SharedModel {
    pub(crate) controller: Mutex<VerificationController>,
    pub(crate) weights: RwLock<EnsembleWeights>,
    pub(crate) patterns: RwLock<PatternDatabase>,
    pub(crate) ledger: RwLock<PerformanceLedger>,
    busy: AtomicBool,
    critical: Mutex<()>,
    scheduled: AtomicU64,
    completed: AtomicU64,
    last_report: Mutex<Option<ReanalysisReport>>,
}

impl SharedModel {
    pub fn new(
        controller: VerificationController,
        weights: EnsembleWeights,
        patterns: PatternDatabase,
        ledger: PerformanceLedger,
    ) -> Self {
        Self {
            controller: Mutex::new(controller),
            weights: RwLock::new(weights),
            patterns: RwLock::new(patterns),
            ledger: RwLock::new(ledger),
            busy: AtomicBool::new(false),
            critical: Mutex::new(()),
            scheduled: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            last_report: Mutex::new(None),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Clears the single-flight flag when dropped, whether the job ran, failed,
/// panicked or was never started.
struct ReleaseGuard {
    shared: Arc<SharedModel>,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        lock(&self.shared.controller).release();
        self.shared.completed.fetch_add(1, Ordering::AcqRel);
        self.shared.busy.store(false, Ordering::Release);
    }
}

pub struct ReanalysisWorker {
    shared: Arc<SharedModel>,
    spawner: Arc<dyn Spawner>,
    calibrator: WeightCalibrator,
    pattern_len: usize,
}

impl ReanalysisWorker {
    pub fn new(
        shared: Arc<SharedModel>,
        spawner: Arc<dyn Spawner>,
        calibrator: WeightCalibrator,
        pattern_len: usize,
    ) -> Self {
        Self {
            shared,
            spawner,
            calibrator,
            pattern_len,
        }
    }

    /// Schedule a pass over `recent`. Returns false without doing anything
    /// when a pass is already in flight.
    ///
    /// Must not be called while holding the controller lock.
    pub fn trigger(&self, recent: Vec<Symbol>) -> bool {
        if self
            .shared
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("reanalysis already in flight");
            return false;
        }

        let guard = ReleaseGuard {
            shared: Arc::clone(&self.shared),
        };
        let scheduled = self.shared.scheduled.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(scheduled, observations = recent.len(), "reanalysis scheduled");

        let shared = Arc::clone(&self.shared);
        let calibrator = self.calibrator;
        let pattern_len = self.pattern_len;
        let job: Job = Box::new(move || {
            let _guard = guard;
            match run(&shared, &calibrator, pattern_len, &recent) {
                Ok(report) => {
                    info!(
                        observations = report.observations,
                        new_patterns = report.new_patterns,
                        weights_updated = report.weights_updated,
                        "reanalysis finished"
                    );
                    *lock(&shared.last_report) = Some(report);
                }
                Err(e) => warn!(error = %e, "reanalysis failed"),
            }
        });

        if let Err(e) = self.spawner.spawn(job) {
            warn!(error = %e, "could not start reanalysis; releasing controller");
        }
        true
    }

    pub fn is_busy(&self) -> bool {
        self.shared.is_busy()
    }

    pub fn scheduled(&self) -> u64 {
        self.shared.scheduled.load(Ordering::Acquire)
    }

    pub fn completed(&self) -> u64 {
        self.shared.completed.load(Ordering::Acquire)
    }

    pub fn last_report(&self) -> Option<ReanalysisReport> {
        lock(&self.shared.last_report).clone()
    }
}

fn run(
    shared: &SharedModel,
    calibrator: &WeightCalibrator,
    pattern_len: usize,
    recent: &[Symbol],
) -> Result<ReanalysisReport, ReanalysisError> {
    let _critical = lock(&shared.critical);
    if recent.is_empty() {
        return Err(ReanalysisError::NoObservations);
    }

    let (error_rates, weights) = {
        let ledger = read(&shared.ledger);
        (
            ledger.pattern_error_rates(recent, pattern_len),
            calibrator.calibrate(&ledger),
        )
    };
    if let Some(weights) = weights {
        *write(&shared.weights) = weights;
    }
    let new_patterns = write(&shared.patterns).extend_with(recent);

    Ok(ReanalysisReport {
        observations: recent.len(),
        error_rates,
        weights_updated: weights.is_some(),
        new_patterns,
        finished_at: Utc::now(),
    })
}
