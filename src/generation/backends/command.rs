//! Diffusion through an external executable.
//!
//! The program is invoked as
//! `CMD --prompt P --init IMG [--control DEPTH] --width W --height H --steps N
//!  --guidance G --strength S --output OUT` and must write `OUT` before exiting 0.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::RunnerError;
use crate::generation::{DiffusionRequest, DiffusionRunner};

const STDERR_TAIL_LINES: usize = 20;

#[derive(Clone, Debug)]
pub struct CommandDiffusion {
    program: PathBuf,
}

impl CommandDiffusion {
    /// Resolve `command` on `PATH` (or as a path). Not found is `Unavailable`.
    pub fn locate(command: &str) -> Result<Self, RunnerError> {
        let program = which::which(command).map_err(|e| {
            RunnerError::unavailable(format!("diffusion command '{}' not found: {}", command, e))
        })?;
        log::info!("diffusion runner: {}", program.display());
        Ok(Self { program })
    }

    fn command(&self, request: &DiffusionRequest) -> Command {
        let (width, height) = request.resolution;
        let mut cmd = Command::new(&self.program);
        cmd.arg("--prompt")
            .arg(&request.prompt)
            .arg("--init")
            .arg(&request.init_image);
        if let Some(control) = &request.control_image {
            cmd.arg("--control").arg(control);
        }
        cmd.arg("--width")
            .arg(width.to_string())
            .arg("--height")
            .arg(height.to_string())
            .arg("--steps")
            .arg(request.steps.to_string())
            .arg("--guidance")
            .arg(request.guidance_scale.to_string())
            .arg("--strength")
            .arg(request.strength.to_string())
            .arg("--output")
            .arg(&request.output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl DiffusionRunner for CommandDiffusion {
    fn name(&self) -> &'static str {
        "command"
    }

    fn generate(&mut self, request: &DiffusionRequest) -> Result<PathBuf, RunnerError> {
        log::debug!("running {} for {}", self.program.display(), request.output.display());
        let output = self.command(request).output().map_err(|e| {
            RunnerError::failed(format!("failed to spawn {}: {}", self.program.display(), e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            return Err(RunnerError::failed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                tail.trim()
            )));
        }
        if !request.output.is_file() {
            return Err(RunnerError::failed(format!(
                "{} did not write {}",
                self.program.display(),
                request.output.display()
            )));
        }
        Ok(request.output.clone())
    }
}
