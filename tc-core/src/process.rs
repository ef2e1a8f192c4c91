//! Closing applications that keep the discrete GPU awake

use tc_gpu::GpuKind;
use tracing::info;

use crate::constants::GPU_LAUNCHERS;
use crate::gpu::GpuBackendSlot;
use crate::settings::{keys, ConfigStore};

/// Terminates processes by executable name
pub trait ProcessTerminator: Send + Sync {
    /// Returns how many processes were signalled
    fn kill_by_name(&self, name: &str) -> usize;
}

/// Terminator that never touches a process
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTerminator;

impl ProcessTerminator for NoopTerminator {
    fn kill_by_name(&self, _name: &str) -> usize {
        0
    }
}

/// Close known launchers, then the bound GPU's heavy consumers when enabled
pub fn kill_gpu_apps(
    terminator: &dyn ProcessTerminator,
    config: &dyn ConfigStore,
    gpu: &GpuBackendSlot,
) -> usize {
    let killed: usize = GPU_LAUNCHERS
        .iter()
        .map(|name| terminator.kill_by_name(name))
        .sum();

    if config.is_enabled(keys::KILL_GPU_APPS) && gpu.kind() != GpuKind::None {
        gpu.current().kill_resource_heavy_applications();
    }

    info!(killed, "Closed GPU applications");
    killed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::tests::{slot, Outcome, ScriptedProbe};
    use crate::settings::MemoryConfigStore;
    use parking_lot::Mutex;
    use std::sync::atomic::Ordering;

    #[derive(Default)]
    struct RecordingTerminator {
        names: Mutex<Vec<String>>,
    }

    impl ProcessTerminator for RecordingTerminator {
        fn kill_by_name(&self, name: &str) -> usize {
            self.names.lock().push(name.to_string());
            usize::from(name == "EADesktop")
        }
    }

    fn nvidia_slot() -> (GpuBackendSlot, std::sync::Arc<ScriptedProbe>) {
        let nv = ScriptedProbe::new(GpuKind::Nvidia, vec![Outcome::Valid]);
        let amd = ScriptedProbe::new(GpuKind::Amd, vec![Outcome::Error]);
        let slot = slot(&nv, &amd);
        slot.recreate();
        (slot, nv)
    }

    #[test]
    fn test_launchers_always_closed() {
        let terminator = RecordingTerminator::default();
        let config = MemoryConfigStore::new("FA507");
        let (slot, nv) = nvidia_slot();

        assert_eq!(kill_gpu_apps(&terminator, &config, &slot), 1);
        assert_eq!(
            *terminator.names.lock(),
            vec!["EADesktop", "RadeonSoftware", "epicgameslauncher", "ASUSSmartDisplayControl"]
        );
        assert_eq!(nv.produced.lock()[0].kills.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_backend_kill_requires_flag() {
        let terminator = RecordingTerminator::default();
        let config = MemoryConfigStore::new("FA507").with(keys::KILL_GPU_APPS, 1);
        let (slot, nv) = nvidia_slot();

        kill_gpu_apps(&terminator, &config, &slot);
        assert_eq!(nv.produced.lock()[0].kills.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_gpu_skips_backend_kill() {
        let config = MemoryConfigStore::new("FA507").with(keys::KILL_GPU_APPS, 1);
        let slot = GpuBackendSlot::new(Vec::new());
        assert_eq!(kill_gpu_apps(&NoopTerminator, &config, &slot), 0);
    }
}
