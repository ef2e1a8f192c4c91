//! Delayed GPU backend re-probe
//!
//! A dGPU that was just powered on needs a few seconds before its driver
//! answers, so mode switches schedule a recreation instead of running one
//! inline. Each request carries a ticket from the slot; a request that wakes
//! after a newer recreation already completed does nothing.

use std::sync::Arc;
use std::time::Duration;

use tc_gpu::GpuKind;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::GpuBackendSlot;

/// Hook run on the blocking pool after each scheduled recreation
pub type AfterRecreate = Arc<dyn Fn(GpuKind) + Send + Sync>;

pub struct RecreationScheduler {
    slot: Arc<GpuBackendSlot>,
    runtime: Handle,
    after_recreate: Option<AfterRecreate>,
}

impl RecreationScheduler {
    pub fn new(slot: Arc<GpuBackendSlot>, runtime: Handle) -> Self {
        Self {
            slot,
            runtime,
            after_recreate: None,
        }
    }

    pub fn with_after_recreate(mut self, hook: AfterRecreate) -> Self {
        self.after_recreate = Some(hook);
        self
    }

    /// Run a backend recreation once after `delay` without blocking the caller
    pub fn schedule_recreate(&self, delay: Duration) -> ScheduledRecreate {
        let ticket = self.slot.issue_ticket();
        let slot = self.slot.clone();
        let hook = self.after_recreate.clone();
        debug!(ticket, delay_ms = delay.as_millis() as u64, "GPU recreation scheduled");

        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if slot.is_superseded(ticket) {
                debug!(ticket, "Skipping stale GPU recreation");
                return None;
            }

            let result = tokio::task::spawn_blocking(move || {
                let kind = slot.recreate_with_ticket(ticket);
                if let Some(hook) = hook {
                    hook(kind);
                }
                kind
            })
            .await;

            match result {
                Ok(kind) => Some(kind),
                Err(e) => {
                    warn!(ticket, "Scheduled GPU recreation failed: {}", e);
                    None
                }
            }
        });

        ScheduledRecreate { ticket, task }
    }
}

impl std::fmt::Debug for RecreationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecreationScheduler")
            .field("slot", &self.slot)
            .field("has_hook", &self.after_recreate.is_some())
            .finish()
    }
}

/// Handle to a pending recreation
#[derive(Debug)]
pub struct ScheduledRecreate {
    ticket: u64,
    task: JoinHandle<Option<GpuKind>>,
}

impl ScheduledRecreate {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Cancel if still waiting; a recreation already on the blocking pool runs to completion
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Bound vendor, or `None` if the request was stale, cancelled or failed
    pub async fn wait(self) -> Option<GpuKind> {
        self.task.await.ok().flatten()
    }
}
