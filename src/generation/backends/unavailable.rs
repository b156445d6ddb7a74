use std::path::PathBuf;

use crate::error::RunnerError;
use crate::generation::{DiffusionRequest, DiffusionRunner};

/// Runner used when no diffusion backend is configured.
#[derive(Clone, Debug)]
pub struct UnavailableDiffusion {
    reason: String,
}

impl UnavailableDiffusion {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl DiffusionRunner for UnavailableDiffusion {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn unavailable_reason(&self) -> Option<&str> {
        Some(&self.reason)
    }

    fn generate(&mut self, _request: &DiffusionRequest) -> Result<PathBuf, RunnerError> {
        Err(RunnerError::unavailable(self.reason.clone()))
    }
}
