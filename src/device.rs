//! Device guard
//!
//! Simulators and virtual devices generate synthetic motion. The guard is
//! consulted before subscribing to the sensor and before every save, so such
//! devices never contribute persisted step data.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Platform probe reporting whether the host is a simulated device
#[async_trait]
pub trait DeviceProbe: Send + Sync {
    async fn is_synthetic_device(&self) -> bool;
}

/// Probe with a fixed (but switchable) answer
#[derive(Debug, Default)]
pub struct StaticProbe {
    synthetic: AtomicBool,
}

impl StaticProbe {
    /// A physical device
    pub fn physical() -> Self {
        Self {
            synthetic: AtomicBool::new(false),
        }
    }

    /// A simulator or emulator
    pub fn synthetic() -> Self {
        Self {
            synthetic: AtomicBool::new(true),
        }
    }

    pub fn set_synthetic(&self, synthetic: bool) {
        self.synthetic.store(synthetic, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeviceProbe for StaticProbe {
    async fn is_synthetic_device(&self) -> bool {
        self.synthetic.load(Ordering::SeqCst)
    }
}
