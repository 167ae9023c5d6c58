//! Session configuration for the virtual machine.
use std::env;

/// Environment variable read by [`VmConfig::from_env`].
pub const MAX_STEPS_VAR: &str = "CORTADO_MAX_STEPS";

/// Knobs shared by every invocation made through one `VirtualMachine`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct VmConfig {
    // Upper bound on instructions dispatched by a single invocation, `None`
    // lets a guest loop run forever.
    max_steps: Option<u64>,
}

impl VmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `CORTADO_MAX_STEPS` when it holds a number.
    pub fn from_env() -> Self {
        let max_steps = env::var(MAX_STEPS_VAR)
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok());
        Self { max_steps }
    }

    #[must_use]
    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    pub const fn max_steps(&self) -> Option<u64> {
        self.max_steps
    }
}
