use std::fmt;

/// The compute device that holds a model's parameters and the batches fed to it.
///
/// Only the general-purpose processor is backed by a compute implementation, so
/// selection always lands on it; the type exists so that placement is explicit and
/// checked for every batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Device {
    #[default]
    Cpu,
}

impl Device {
    /// Selects the device for a whole run. Always `Device::Cpu`, the only device with a
    /// compute implementation.
    ///
    /// # Returns
    /// The device every tensor of the run must live on.
    pub fn select() -> Self {
        let device = Device::Cpu;
        log::info!("selected training device: {device}");
        device
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
    fn selection_lands_on_the_cpu() {
        assert_eq!(Device::select(), Device::Cpu);
        assert_eq!(Device::select().to_string(), "cpu");
    }
}
