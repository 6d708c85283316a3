//! Sequential application of widget mutations with per-item retries.
//!
//! A failing item never aborts the batch; the caller only gets counts.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use canvas_pilot_client::{CanvasApi, ClientError};
use canvas_pilot_model::WidgetUpdatePlan;

use crate::retry::RetryPolicy;

/// Outcome counts of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn record(&mut self, ok: bool) {
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

#[derive(Clone)]
pub struct BatchExecutor {
    api: Arc<dyn CanvasApi>,
    policy: RetryPolicy,
}

impl BatchExecutor {
    pub fn new(api: Arc<dyn CanvasApi>, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }

    /// PATCH every plan to its typed endpoint, in order.
    pub async fn apply(&self, canvas_id: &str, plans: &[WidgetUpdatePlan]) -> BatchReport {
        let mut report = BatchReport::default();
        for plan in plans {
            let ok = self
                .retrying(&plan.widget_id, || {
                    self.api.patch_widget(
                        canvas_id,
                        &plan.widget_type,
                        &plan.widget_id,
                        &plan.payload,
                    )
                })
                .await;
            report.record(ok);
        }
        debug!(
            canvas_id,
            succeeded = report.succeeded,
            failed = report.failed,
            "Batch applied"
        );
        report
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// Errors that cannot change on retry (unsupported widget kinds) stop early.
    pub async fn retrying<F, Fut>(&self, widget_id: &str, mut op: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), ClientError>>,
    {
        for attempt in 1..=self.policy.max_attempts {
            match op().await {
                Ok(()) => return true,
                Err(e @ ClientError::Unsupported(_)) => {
                    warn!(widget_id, error = %e, "Skipping widget");
                    return false;
                }
                Err(e) => {
                    warn!(
                        widget_id,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "Widget update failed"
                    );
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.delay(attempt - 1)).await;
                    }
                }
            }
        }
        false
    }
}
