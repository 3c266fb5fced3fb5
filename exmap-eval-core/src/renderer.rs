use crate::Heuristic;
use anyhow::Context;
use tracing::{debug, info};

/// one evaluation request understood by the renderer's `--eval` flag
#[derive(Clone, Debug, PartialEq)]
pub enum EvalMode {
    /// timing sweep over samples per ray
    Samples { heuristic: Heuristic, frames: u32 },
    /// single timing for a fixed number of samples
    One {
        heuristic: Heuristic,
        samples: u32,
        frames: u32,
    },
    /// write novel-view screenshots for the MSE comparison
    Mse { heuristic: Heuristic, samples: u32 },
    /// write ground-truth screenshots for the MSE comparison
    MseGroundTruth,
    /// timing of the ground-truth renderer
    GroundTruth { frames: u32 },
}

impl EvalMode {
    /// arguments following `--eval`
    pub fn args(&self) -> Vec<String> {
        match self {
            EvalMode::Samples { heuristic, frames } => vec![
                "samples".to_string(),
                heuristic.flag().to_string(),
                frames.to_string(),
            ],
            EvalMode::One {
                heuristic,
                samples,
                frames,
            } => vec![
                "one".to_string(),
                heuristic.flag().to_string(),
                samples.to_string(),
                frames.to_string(),
            ],
            EvalMode::Mse { heuristic, samples } => vec![
                "mse".to_string(),
                heuristic.flag().to_string(),
                samples.to_string(),
            ],
            EvalMode::MseGroundTruth => vec!["mse".to_string(), "gt".to_string()],
            EvalMode::GroundTruth { frames } => vec!["gt".to_string(), frames.to_string()],
        }
    }
}

/// full argument list of a renderer call, without the executable
pub fn command_args(config: &str, mode: &EvalMode) -> Vec<String> {
    let mut args = vec!["--config".to_string(), config.to_string(), "--eval".to_string()];
    args.extend(mode.args());
    args
}

pub trait RenderBackend {
    /// runs one evaluation with the renderer config named `config` and returns its stdout
    fn evaluate(&self, config: &str, mode: &EvalMode) -> anyhow::Result<String>;
}

/// the external renderer executable, called as a blocking subprocess
pub struct Renderer {
    pub executable: std::path::PathBuf,
    pub working_dir: Option<std::path::PathBuf>,
}

impl Renderer {
    pub fn new<PATH: AsRef<std::path::Path>>(executable: PATH) -> Self {
        Renderer {
            executable: executable.as_ref().to_path_buf(),
            working_dir: None,
        }
    }

    pub fn with_working_dir<PATH: AsRef<std::path::Path>>(mut self, dir: PATH) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn command_line(&self, config: &str, mode: &EvalMode) -> String {
        let mut words = vec![self.executable.display().to_string()];
        words.extend(command_args(config, mode));
        words.join(" ")
    }
}

impl RenderBackend for Renderer {
    fn evaluate(&self, config: &str, mode: &EvalMode) -> anyhow::Result<String> {
        let cmdline = self.command_line(config, mode);
        info!("running: {}", cmdline);
        let mut cmd = std::process::Command::new(&self.executable);
        cmd.args(command_args(config, mode));
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        let output = cmd
            .output()
            .with_context(|| format!("failed to spawn `{}`", cmdline))?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            "renderer exited with {}, {} bytes of stdout",
            output.status,
            stdout.len()
        );
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(10).collect();
            let tail = tail.into_iter().rev().collect::<Vec<_>>().join("\n");
            anyhow::bail!("`{}` failed with {}\n{}", cmdline, output.status, tail);
        }
        Ok(stdout)
    }
}

#[test]
fn test_command_args() {
    let mode = EvalMode::Samples {
        heuristic: Heuristic::DepthDist,
        frames: 20,
    };
    assert_eq!(
        command_args("by_step/config.json", &mode).join(" "),
        "--config by_step/config.json --eval samples d 20"
    );
    let mode = EvalMode::One {
        heuristic: Heuristic::DepthAngle,
        samples: 32,
        frames: 20,
    };
    assert_eq!(
        command_args("eval/23.json", &mode).join(" "),
        "--config eval/23.json --eval one da 32 20"
    );
    assert_eq!(
        EvalMode::Mse {
            heuristic: Heuristic::Color,
            samples: 179
        }
        .args(),
        ["mse", "c", "179"]
    );
    assert_eq!(EvalMode::MseGroundTruth.args(), ["mse", "gt"]);
    assert_eq!(EvalMode::GroundTruth { frames: 5 }.args(), ["gt", "5"]);
    let renderer = Renderer::new("../build/ExteriorMapping");
    assert_eq!(
        renderer.command_line("a.json", &EvalMode::MseGroundTruth),
        "../build/ExteriorMapping --config a.json --eval mse gt"
    );
}

#[cfg(unix)]
#[test]
fn test_run_subprocess() -> anyhow::Result<()> {
    let renderer = Renderer::new("true").with_working_dir(std::env::temp_dir());
    let stdout = renderer.evaluate("cfg.json", &EvalMode::MseGroundTruth)?;
    assert!(stdout.is_empty());
    let renderer = Renderer::new("false");
    assert!(renderer.evaluate("cfg.json", &EvalMode::MseGroundTruth).is_err());
    let renderer = Renderer::new("/nonexistent/ExteriorMapping");
    let err = renderer
        .evaluate("cfg.json", &EvalMode::MseGroundTruth)
        .unwrap_err();
    assert!(format!("{err}").contains("failed to spawn"));
    Ok(())
}
