//! Concurrent discard of every active run.
//!
//! A fixed pool of scoped worker threads pulls run targets from a shared
//! cursor. Every target is attempted; a transport failure in one unit is
//! held until the whole pool has drained and then returned.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use super::{cancel_run, collect_targets, CancelOutcome, CancelReport, RunTarget, TerraformClient};
use crate::error::{Error, Result, Warning};

/// Number of runs processed at once.
pub const WORKER_POOL_WIDTH: usize = 10;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardSummary {
    pub total: usize,
    pub succeeded: usize,
    pub already_terminal: usize,
    pub failed: usize,
    pub reports: Vec<CancelReport>,
}

impl DiscardSummary {
    fn from_reports(reports: Vec<CancelReport>) -> Self {
        let mut summary = Self {
            total: reports.len(),
            ..Self::default()
        };

        for report in &reports {
            match report.outcome {
                CancelOutcome::Success { .. } => summary.succeeded += 1,
                CancelOutcome::AlreadyTerminal { .. } => summary.already_terminal += 1,
                CancelOutcome::Failed { .. } => summary.failed += 1,
            }
        }

        summary.reports = reports;
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Result of the full pipeline: enumeration warnings plus the discard summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardOutcome {
    pub organization: String,
    pub summary: DiscardSummary,
    pub warnings: Vec<Warning>,
}

/// Enumerate every active run of the organization, then discard them all.
pub fn discard_plans(
    client: &TerraformClient,
    reporter: &(dyn Fn(&CancelReport) + Sync),
) -> Result<DiscardOutcome> {
    let targets = collect_targets(client)?;
    let summary = discard_runs(client, &targets.items, reporter)?;

    Ok(DiscardOutcome {
        organization: client.settings().organization.clone(),
        summary,
        warnings: targets.warnings.into_iter().map(Warning::from).collect(),
    })
}

/// Discard or cancel each target with at most `WORKER_POOL_WIDTH` in flight.
///
/// `reporter` sees each report as soon as its unit finishes, in completion
/// order. Returns only after every target was attempted.
pub fn discard_runs(
    client: &TerraformClient,
    targets: &[RunTarget],
    reporter: &(dyn Fn(&CancelReport) + Sync),
) -> Result<DiscardSummary> {
    log_status!(
        "terraform",
        "Discarding {} runs with {} workers",
        targets.len(),
        WORKER_POOL_WIDTH.min(targets.len())
    );

    let results = run_pool(targets, WORKER_POOL_WIDTH, |target| {
        let result = cancel_run(client, target);
        if let Ok(report) = &result {
            reporter(report);
        }
        result
    })?;

    let mut reports = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(report) => reports.push(report),
            Err(err) => errors.push(err),
        }
    }

    if let Some(first) = errors.first() {
        log_status!("terraform", "{} runs failed at the transport level", errors.len());
        return Err(first
            .clone()
            .with_details_field("failedUnits", errors.len().into())
            .with_details_field("completedUnits", reports.len().into()));
    }

    Ok(DiscardSummary::from_reports(reports))
}

/// Apply `work` to every item on at most `width` scoped threads.
///
/// Results keep the input order.
fn run_pool<T, R, F>(items: &[T], width: usize, work: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let cursor = AtomicUsize::new(0);
    let workers = width.clamp(1, items.len());
    let mut slots: Vec<Option<R>> = items.iter().map(|_| None).collect();
    let mut panicked = false;
    let cursor = &cursor;
    let work = &work;

    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let index = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(item) = items.get(index) else {
                            break;
                        };
                        done.push((index, work(item)));
                    }
                    done
                })
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok(done) => {
                    for (index, result) in done {
                        slots[index] = Some(result);
                    }
                }
                Err(_) => panicked = true,
            }
        }
    });

    if panicked {
        return Err(Error::internal_unexpected("Discard worker thread panicked"));
    }

    slots
        .into_iter()
        .map(|slot| slot.ok_or_else(|| Error::internal_unexpected("Discard unit produced no result")))
        .collect()
}
