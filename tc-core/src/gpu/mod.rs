//! GPU backend lifecycle
//!
//! Owns the single live [`GpuControl`] handle. Vendor adapters come from the
//! `tc-gpu` crate; this module decides which one is bound.
//!
//! Replacement is probe, validate, publish, then dispose the old handle, so a
//! reader holding an `Arc` clone always sees either the old or the new
//! adapter in full.

mod scheduler;

pub use scheduler::{AfterRecreate, RecreationScheduler, ScheduledRecreate};

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tc_gpu::{AmdGpuControl, GpuControl, GpuKind, NoGpuControl, NvidiaGpuControl};
use tracing::{debug, info, warn};

use crate::error::Result;

/// One vendor's probe step
pub trait GpuProbe: Send + Sync {
    fn kind(&self) -> GpuKind;

    fn probe(&self) -> Result<Arc<dyn GpuControl>>;
}

/// Binds the first NVIDIA GPU visible to nvidia-smi
#[derive(Debug, Default, Clone, Copy)]
pub struct NvidiaProbe;

impl GpuProbe for NvidiaProbe {
    fn kind(&self) -> GpuKind {
        GpuKind::Nvidia
    }

    fn probe(&self) -> Result<Arc<dyn GpuControl>> {
        Ok(Arc::new(NvidiaGpuControl::probe()?))
    }
}

/// Binds the discrete amdgpu device
#[derive(Debug, Default, Clone, Copy)]
pub struct AmdProbe;

impl GpuProbe for AmdProbe {
    fn kind(&self) -> GpuKind {
        GpuKind::Amd
    }

    fn probe(&self) -> Result<Arc<dyn GpuControl>> {
        Ok(Arc::new(AmdGpuControl::probe()?))
    }
}

/// Probe order used on real hardware: NVIDIA first, then AMD
pub fn default_probes() -> Vec<Box<dyn GpuProbe>> {
    vec![Box::new(NvidiaProbe), Box::new(AmdProbe)]
}

/// Owner of the bound GPU adapter
pub struct GpuBackendSlot {
    probes: Vec<Box<dyn GpuProbe>>,
    current: RwLock<Arc<dyn GpuControl>>,
    next_ticket: AtomicU64,
    completed_ticket: AtomicU64,
}

impl GpuBackendSlot {
    /// Create an unbound slot; call [`GpuBackendSlot::recreate`] to probe
    pub fn new(probes: Vec<Box<dyn GpuProbe>>) -> Self {
        Self {
            probes,
            current: RwLock::new(Arc::new(NoGpuControl)),
            next_ticket: AtomicU64::new(0),
            completed_ticket: AtomicU64::new(0),
        }
    }

    /// Clone of the live handle
    pub fn current(&self) -> Arc<dyn GpuControl> {
        self.current.read().clone()
    }

    pub fn kind(&self) -> GpuKind {
        self.current.read().kind()
    }

    pub fn full_name(&self) -> String {
        self.current.read().full_name()
    }

    /// The live handle, only when it is NVIDIA-class
    pub fn nvidia_control(&self) -> Option<Arc<dyn GpuControl>> {
        let gpu = self.current();
        gpu.is_nvidia().then_some(gpu)
    }

    /// Reserve an ordering ticket for a recreation request
    pub fn issue_ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// True once a recreation with a newer ticket has completed
    pub fn is_superseded(&self, ticket: u64) -> bool {
        self.completed_ticket.load(Ordering::SeqCst) > ticket
    }

    /// Re-probe vendors in order and bind the first valid adapter
    pub fn recreate(&self) -> GpuKind {
        let ticket = self.issue_ticket();
        self.recreate_with_ticket(ticket)
    }

    pub(crate) fn recreate_with_ticket(&self, ticket: u64) -> GpuKind {
        let candidate = self.probe_first_valid();
        let kind = candidate.kind();
        let name = candidate.full_name();

        let previous = std::mem::replace(&mut *self.current.write(), candidate);
        self.completed_ticket.fetch_max(ticket, Ordering::SeqCst);
        previous.dispose();

        match kind {
            GpuKind::None => info!("dGPU not found"),
            _ => info!(vendor = %kind, name = %name, "GPU backend bound"),
        }
        kind
    }

    fn probe_first_valid(&self) -> Arc<dyn GpuControl> {
        for probe in &self.probes {
            let vendor = probe.kind();
            match panic::catch_unwind(AssertUnwindSafe(|| probe.probe())) {
                Ok(Ok(gpu)) if gpu.is_valid() => return gpu,
                Ok(Ok(gpu)) => {
                    debug!(vendor = %vendor, "Probed GPU is not valid");
                    gpu.dispose();
                }
                Ok(Err(e)) => debug!(vendor = %vendor, "GPU probe failed: {}", e),
                Err(_) => warn!(vendor = %vendor, "GPU probe panicked"),
            }
        }
        Arc::new(NoGpuControl)
    }

    /// Debounced "is the dGPU in use" check
    ///
    /// Blocks for `settle` when the first reading is above `threshold`.
    /// Unreadable utilization counts as 0.
    pub fn is_gpu_busy(&self, threshold: i32, settle: Duration) -> bool {
        if self.read_utilization() <= threshold {
            return false;
        }
        std::thread::sleep(settle);
        self.read_utilization() > threshold
    }

    fn read_utilization(&self) -> i32 {
        let gpu = self.current();
        match gpu.utilization_percent() {
            Ok(Some(load)) => {
                debug!(gpu = %gpu.full_name(), load, "GPU usage");
                load
            }
            Ok(None) => 0,
            Err(e) => {
                debug!("GPU usage read failed: {}", e);
                0
            }
        }
    }

    /// Unbind and dispose the live adapter
    pub fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.current.write(), Arc::new(NoGpuControl));
        previous.dispose();
    }
}

impl std::fmt::Debug for GpuBackendSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBackendSlot")
            .field("kind", &self.kind())
            .field("probes", &self.probes.iter().map(|p| p.kind()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ThermoctlError;
    use crate::testing::FakeGpu;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Probe returning a scripted sequence of outcomes
    pub(crate) struct ScriptedProbe {
        pub kind: GpuKind,
        pub outcomes: Mutex<Vec<Outcome>>,
        pub calls: AtomicUsize,
        pub produced: Mutex<Vec<Arc<FakeGpu>>>,
    }

    #[derive(Clone, Copy)]
    pub(crate) enum Outcome {
        Valid,
        Invalid,
        Error,
        Panic,
    }

    impl ScriptedProbe {
        pub(crate) fn new(kind: GpuKind, outcomes: Vec<Outcome>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                outcomes: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
                produced: Mutex::new(Vec::new()),
            })
        }
    }

    impl GpuProbe for Arc<ScriptedProbe> {
        fn kind(&self) -> GpuKind {
            self.kind
        }

        fn probe(&self) -> Result<Arc<dyn GpuControl>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = {
                let mut outcomes = self.outcomes.lock();
                if outcomes.len() > 1 {
                    outcomes.remove(0)
                } else {
                    outcomes.first().copied().unwrap_or(Outcome::Error)
                }
            };
            match outcome {
                Outcome::Valid | Outcome::Invalid => {
                    let gpu = Arc::new(FakeGpu::new(self.kind, &format!("{} test GPU", self.kind)));
                    if matches!(outcome, Outcome::Invalid) {
                        gpu.dispose();
                    }
                    self.produced.lock().push(gpu.clone());
                    Ok(gpu)
                }
                Outcome::Error => Err(ThermoctlError::HardwareNotFound("no device".into())),
                Outcome::Panic => panic!("driver library crashed"),
            }
        }
    }

    pub(crate) fn slot(nvidia: &Arc<ScriptedProbe>, amd: &Arc<ScriptedProbe>) -> GpuBackendSlot {
        GpuBackendSlot::new(vec![Box::new(nvidia.clone()), Box::new(amd.clone())])
    }

    #[test]
    fn test_starts_unbound() {
        let slot = GpuBackendSlot::new(Vec::new());
        assert_eq!(slot.kind(), GpuKind::None);
        assert_eq!(slot.full_name(), "dGPU not found");
        assert!(slot.nvidia_control().is_none());
    }

    #[test]
    fn test_prefers_nvidia() {
        let nv = ScriptedProbe::new(GpuKind::Nvidia, vec![Outcome::Valid]);
        let amd = ScriptedProbe::new(GpuKind::Amd, vec![Outcome::Valid]);
        let slot = slot(&nv, &amd);

        assert_eq!(slot.recreate(), GpuKind::Nvidia);
        assert_eq!(amd.calls.load(Ordering::SeqCst), 0);
        assert!(slot.nvidia_control().is_some());
    }

    #[test]
    fn test_falls_back_to_amd_and_disposes_invalid_candidate() {
        let nv = ScriptedProbe::new(GpuKind::Nvidia, vec![Outcome::Invalid]);
        let amd = ScriptedProbe::new(GpuKind::Amd, vec![Outcome::Valid]);
        let slot = slot(&nv, &amd);

        assert_eq!(slot.recreate(), GpuKind::Amd);
        assert!(slot.nvidia_control().is_none());
        let rejected = nv.produced.lock()[0].clone();
        // once by the probe marking it invalid, once by the slot
        assert_eq!(rejected.disposals.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_both_probes_failing_binds_none() {
        let nv = ScriptedProbe::new(GpuKind::Nvidia, vec![Outcome::Panic]);
        let amd = ScriptedProbe::new(GpuKind::Amd, vec![Outcome::Error]);
        let slot = slot(&nv, &amd);

        assert_eq!(slot.recreate(), GpuKind::None);
        assert_eq!(nv.calls.load(Ordering::SeqCst), 1);
        assert_eq!(amd.calls.load(Ordering::SeqCst), 1);
        assert!(!slot.current().is_valid());
    }

    #[test]
    fn test_recreate_disposes_previous_exactly_once() {
        let nv = ScriptedProbe::new(GpuKind::Nvidia, vec![Outcome::Valid, Outcome::Error]);
        let amd = ScriptedProbe::new(GpuKind::Amd, vec![Outcome::Valid]);
        let slot = slot(&nv, &amd);

        slot.recreate();
        let first = nv.produced.lock()[0].clone();
        let held = slot.current();

        assert_eq!(slot.recreate(), GpuKind::Amd);
        assert_eq!(first.disposals.load(Ordering::SeqCst), 1);
        // readers holding the old Arc still see a complete adapter
        assert_eq!(held.kind(), GpuKind::Nvidia);

        slot.recreate();
        assert_eq!(first.disposals.load(Ordering::SeqCst), 1);
        let amd_first = amd.produced.lock()[0].clone();
        assert_eq!(amd_first.disposals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tickets_track_completion() {
        let nv = ScriptedProbe::new(GpuKind::Nvidia, vec![Outcome::Error]);
        let amd = ScriptedProbe::new(GpuKind::Amd, vec![Outcome::Error]);
        let slot = slot(&nv, &amd);

        let stale = slot.issue_ticket();
        assert!(!slot.is_superseded(stale));
        slot.recreate();
        assert!(slot.is_superseded(stale));
    }

    #[test]
    fn test_busy_check_idle_returns_immediately() {
        let slot = GpuBackendSlot::new(Vec::new());
        let gpu = Arc::new(FakeGpu::new(GpuKind::Nvidia, "RTX").with_utilization(vec![Ok(Some(10)), Ok(Some(90))]));
        *slot.current.write() = gpu.clone();

        let started = std::time::Instant::now();
        assert!(!slot.is_gpu_busy(10, Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(gpu.utilization_reads_left(), 1);
    }

    #[test]
    fn test_busy_check_requires_two_reads_over_threshold() {
        let slot = GpuBackendSlot::new(Vec::new());
        let gpu = Arc::new(FakeGpu::new(GpuKind::Nvidia, "RTX").with_utilization(vec![
            Ok(Some(80)),
            Ok(Some(5)),
            Ok(Some(80)),
            Ok(Some(11)),
        ]));
        *slot.current.write() = gpu;

        assert!(!slot.is_gpu_busy(10, Duration::from_millis(5)));
        assert!(slot.is_gpu_busy(10, Duration::from_millis(5)));
    }

    #[test]
    fn test_busy_check_unreadable_counts_as_zero() {
        let slot = GpuBackendSlot::new(Vec::new());
        let gpu = Arc::new(FakeGpu::new(GpuKind::Amd, "RX").with_utilization(vec![
            Err(ThermoctlError::gpu("timeout")),
            Ok(Some(50)),
            Err(ThermoctlError::gpu("timeout")),
        ]));
        *slot.current.write() = gpu;

        assert!(!slot.is_gpu_busy(10, Duration::from_millis(5)));
        assert!(!slot.is_gpu_busy(10, Duration::from_millis(5)));
        assert!(!slot.is_gpu_busy(10, Duration::from_millis(5)));
    }

    #[test]
    fn test_shutdown_disposes_bound_adapter() {
        let nv = ScriptedProbe::new(GpuKind::Nvidia, vec![Outcome::Valid]);
        let amd = ScriptedProbe::new(GpuKind::Amd, vec![Outcome::Valid]);
        let slot = slot(&nv, &amd);
        slot.recreate();
        slot.shutdown();
        assert_eq!(slot.kind(), GpuKind::None);
        assert_eq!(nv.produced.lock()[0].disposals.load(Ordering::SeqCst), 1);
    }
}
