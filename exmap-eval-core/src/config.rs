use crate::Renderer;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridSweepConfig {
    #[serde(default = "GridSweepConfig::default_start")]
    pub start: [u32; 2],
    #[serde(default = "GridSweepConfig::default_steps")]
    pub steps: usize,
}

impl GridSweepConfig {
    fn default_start() -> [u32; 2] {
        [1, 2]
    }
    fn default_steps() -> usize {
        13
    }
}

impl Default for GridSweepConfig {
    fn default() -> Self {
        Self {
            start: Self::default_start(),
            steps: Self::default_steps(),
        }
    }
}

/// settings of an evaluation run, read from a TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessConfig {
    #[serde(default = "HarnessConfig::default_executable")]
    pub executable: PathBuf,
    /// working directory of the renderer process, inherited when unset
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// repository root of the renderer; configs and screenshots live below it
    #[serde(default = "HarnessConfig::default_root")]
    pub root: PathBuf,
    #[serde(default = "HarnessConfig::default_graphs_dir")]
    pub graphs_dir: PathBuf,
    #[serde(default = "HarnessConfig::default_configs_dir")]
    pub configs_dir: PathBuf,
    /// config the sweeps start from, relative to `configs_dir`
    #[serde(default = "HarnessConfig::default_baseline_config")]
    pub baseline_config: String,
    #[serde(default = "HarnessConfig::default_screenshots_dir")]
    pub screenshots_dir: PathBuf,
    /// JSON pointer of the `{ "x": .., "y": .. }` camera grid size
    #[serde(default = "HarnessConfig::default_grid_pointer")]
    pub grid_pointer: String,
    #[serde(default = "HarnessConfig::default_eval_frames")]
    pub eval_frames: u32,
    #[serde(default = "HarnessConfig::default_cameras_samples")]
    pub cameras_samples: u32,
    #[serde(default = "HarnessConfig::default_mse_samples")]
    pub mse_samples: u32,
    #[serde(default)]
    pub mse_regenerate: bool,
    #[serde(default)]
    pub mse_delete: bool,
    #[serde(default)]
    pub include_ground_truth: bool,
    #[serde(default)]
    pub grid: GridSweepConfig,
}

impl HarnessConfig {
    fn default_executable() -> PathBuf {
        PathBuf::from("../build/ExteriorMapping")
    }
    fn default_root() -> PathBuf {
        PathBuf::from("../")
    }
    fn default_graphs_dir() -> PathBuf {
        PathBuf::from("graphs")
    }
    fn default_configs_dir() -> PathBuf {
        PathBuf::from("res/configs")
    }
    fn default_baseline_config() -> String {
        "by_step/config.json".to_string()
    }
    fn default_screenshots_dir() -> PathBuf {
        PathBuf::from("screenshots/eval")
    }
    fn default_grid_pointer() -> String {
        "/viewData/viewGrid/gridSize".to_string()
    }
    fn default_eval_frames() -> u32 {
        20
    }
    fn default_cameras_samples() -> u32 {
        32
    }
    fn default_mse_samples() -> u32 {
        179
    }

    /// reads `path` if it exists, defaults otherwise
    pub fn load<PATH: AsRef<Path>>(path: PATH) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("{} not found, using default settings", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let cfg = toml::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn renderer(&self) -> Renderer {
        let renderer = Renderer::new(&self.executable);
        match &self.working_dir {
            Some(dir) => renderer.with_working_dir(dir),
            None => renderer,
        }
    }

    pub fn configs_path(&self) -> PathBuf {
        self.root.join(&self.configs_dir)
    }

    pub fn screenshots_path(&self) -> PathBuf {
        self.root.join(&self.screenshots_dir)
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            executable: Self::default_executable(),
            working_dir: None,
            root: Self::default_root(),
            graphs_dir: Self::default_graphs_dir(),
            configs_dir: Self::default_configs_dir(),
            baseline_config: Self::default_baseline_config(),
            screenshots_dir: Self::default_screenshots_dir(),
            grid_pointer: Self::default_grid_pointer(),
            eval_frames: Self::default_eval_frames(),
            cameras_samples: Self::default_cameras_samples(),
            mse_samples: Self::default_mse_samples(),
            mse_regenerate: false,
            mse_delete: false,
            include_ground_truth: false,
            grid: GridSweepConfig::default(),
        }
    }
}

#[test]
fn test_load_missing_file_gives_defaults() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let cfg = HarnessConfig::load(tmp.path().join("harness.toml"))?;
    assert_eq!(cfg, HarnessConfig::default());
    assert!(cfg.working_dir.is_none());
    assert_eq!(cfg.eval_frames, 20);
    assert_eq!(cfg.cameras_samples, 32);
    assert_eq!(cfg.mse_samples, 179);
    assert_eq!(cfg.grid.start, [1, 2]);
    assert_eq!(cfg.configs_path(), PathBuf::from("../res/configs"));
    Ok(())
}

#[test]
fn test_load_partial_file() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("harness.toml");
    std::fs::write(
        &path,
        "executable = \"/opt/exmap/ExteriorMapping\"\n\
         working_dir = \"/opt/exmap\"\n\
         eval_frames = 5\n\
         mse_delete = true\n\
         \n\
         [grid]\n\
         steps = 4\n",
    )?;
    let cfg = HarnessConfig::load(&path)?;
    assert_eq!(cfg.executable, PathBuf::from("/opt/exmap/ExteriorMapping"));
    assert_eq!(cfg.working_dir, Some(PathBuf::from("/opt/exmap")));
    assert_eq!(cfg.eval_frames, 5);
    assert!(cfg.mse_delete);
    assert_eq!(cfg.grid.steps, 4);
    assert_eq!(cfg.grid.start, [1, 2]);
    assert_eq!(cfg.mse_samples, 179);
    Ok(())
}

#[test]
fn test_load_invalid_file() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("harness.toml");
    std::fs::write(&path, "eval_frames = \"many\"\n")?;
    assert!(HarnessConfig::load(&path).is_err());
    Ok(())
}

#[test]
fn test_renderer_from_settings() {
    let mut cfg = HarnessConfig::default();
    assert_eq!(cfg.renderer().working_dir, None);
    cfg.working_dir = Some(PathBuf::from("/opt/exmap"));
    let renderer = cfg.renderer();
    assert_eq!(renderer.executable, PathBuf::from("../build/ExteriorMapping"));
    assert_eq!(renderer.working_dir, Some(PathBuf::from("/opt/exmap")));
}
