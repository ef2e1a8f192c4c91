//! GPU-related constants

/// PCI vendor ID for AMD GPUs
pub const AMD_VENDOR_ID: &str = "0x1002";

/// PCI vendor ID for NVIDIA GPUs
pub const NVIDIA_VENDOR_ID: &str = "0x10de";

/// Path to DRM (Direct Rendering Manager) devices
pub const DRM_PATH: &str = "/sys/class/drm";

/// Microwatts per watt (for power conversion)
pub const MICROWATTS_PER_WATT: u64 = 1_000_000;

/// Temperature readings are in millidegrees, divide by this to get Celsius
pub const MILLIDEGREE_DIVISOR: i32 = 1000;

/// Clock offset limits accepted by the NVIDIA backend (MHz)
pub mod clocks {
    pub const MIN_CORE_OFFSET_MHZ: i32 = -300;
    pub const MAX_CORE_OFFSET_MHZ: i32 = 300;
    pub const MIN_MEMORY_OFFSET_MHZ: i32 = -300;
    pub const MAX_MEMORY_OFFSET_MHZ: i32 = 300;

    /// nvidia-settings takes memory offsets as transfer rate (DDR, twice the clock)
    pub const MEMORY_TRANSFER_MULTIPLIER: i32 = 2;
}

/// Values nvidia-smi prints when a field has no reading
pub const NVIDIA_EMPTY_MARKERS: &[&str] = &["", "N/A", "[N/A]", "[Not Supported]"];
