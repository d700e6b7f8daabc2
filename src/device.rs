use std::fmt;

/// Where tensor arithmetic runs.
///
/// The crate ships a CPU backend only; requesting an accelerator falls back
/// to the CPU without error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Device {
    #[default]
    Cpu,
}

impl Device {
    /// Pick the accelerator with index `requested` if one is available,
    /// otherwise the CPU. This is a capability check only and never fails.
    pub fn select(requested: usize) -> Self {
        log::debug!("accelerator {requested} requested but no accelerator backend is available, using cpu");
        Device::Cpu
    }

    pub fn is_accelerator(&self) -> bool {
        match self {
            Device::Cpu => false,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_accelerator_falls_back_to_cpu() {
        let device = Device::select(3);
        assert_eq!(device, Device::Cpu);
        assert!(!device.is_accelerator());
        assert_eq!(device.to_string(), "cpu");
    }
}
