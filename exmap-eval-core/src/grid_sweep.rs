use anyhow::Context;
use tracing::debug;

/// grid sizes growing alternately in `x` and `y`, starting one step after `start`
pub fn grid_sizes(start: [u32; 2], steps: usize) -> Vec<[u32; 2]> {
    let mut size = start;
    let mut sizes = Vec::with_capacity(steps);
    for i in 0..steps {
        if i % 2 == 0 {
            size[0] += 1;
        } else {
            size[1] += 1;
        }
        sizes.push(size);
    }
    sizes
}

/// renderer config with the camera grid overwritten
pub struct GridConfig {
    pub size: [u32; 2],
    /// name passed to the renderer's `--config`, relative to the configs directory
    pub name: String,
    pub path: std::path::PathBuf,
}

impl GridConfig {
    pub fn num_views(&self) -> u32 {
        self.size[0] * self.size[1]
    }
}

pub fn set_grid_size(
    data: &mut serde_json::Value,
    pointer: &str,
    size: [u32; 2],
) -> anyhow::Result<()> {
    let grid = data
        .pointer_mut(pointer)
        .and_then(|v| v.as_object_mut())
        .with_context(|| format!("baseline config has no object at `{}`", pointer))?;
    grid.insert("x".to_string(), size[0].into());
    grid.insert("y".to_string(), size[1].into());
    Ok(())
}

/// `eval` directory of generated configs, removed on drop
pub struct EvalConfigDir {
    pub dir: std::path::PathBuf,
    pub configs: Vec<GridConfig>,
}

impl EvalConfigDir {
    pub const SUBDIR: &'static str = "eval";

    pub fn create<PATH: AsRef<std::path::Path>>(
        configs_dir: PATH,
        baseline: &str,
        pointer: &str,
        sizes: &[[u32; 2]],
    ) -> anyhow::Result<Self> {
        let configs_dir = configs_dir.as_ref();
        let baseline_path = configs_dir.join(baseline);
        let text = std::fs::read_to_string(&baseline_path)
            .with_context(|| format!("failed to read {}", baseline_path.display()))?;
        let mut data: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", baseline_path.display()))?;
        let dir = configs_dir.join(Self::SUBDIR);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        // from here on the directory is cleaned up even if writing a config fails
        let mut eval_dir = EvalConfigDir {
            dir,
            configs: Vec::with_capacity(sizes.len()),
        };
        for &size in sizes {
            set_grid_size(&mut data, pointer, size)?;
            let file_name = format!("{}{}.json", size[0], size[1]);
            let path = eval_dir.dir.join(&file_name);
            write_json_indent4(&path, &data)?;
            debug!("wrote grid config {}", path.display());
            eval_dir.configs.push(GridConfig {
                size,
                name: format!("{}/{}", Self::SUBDIR, file_name),
                path,
            });
        }
        Ok(eval_dir)
    }
}

impl Drop for EvalConfigDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            tracing::warn!("failed to remove {}: {}", self.dir.display(), e);
        }
    }
}

fn write_json_indent4(path: &std::path::Path, data: &serde_json::Value) -> anyhow::Result<()> {
    use serde::Serialize;
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let writer = std::io::BufWriter::new(file);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(writer, formatter);
    data.serialize(&mut ser)?;
    use std::io::Write;
    ser.into_inner().flush()?;
    Ok(())
}

#[test]
fn test_grid_sizes() {
    let sizes = grid_sizes([1, 2], 13);
    assert_eq!(sizes.first(), Some(&[2, 2]));
    assert_eq!(sizes[1], [2, 3]);
    assert_eq!(sizes.last(), Some(&[8, 8]));
    let views: Vec<u32> = sizes.iter().map(|s| s[0] * s[1]).collect();
    assert_eq!(
        views,
        vec![4, 6, 9, 12, 16, 20, 25, 30, 36, 42, 49, 56, 64]
    );
}

#[test]
fn test_eval_config_dir() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let baseline = serde_json::json!({
        "viewData": {
            "byStep": true,
            "viewGrid": { "gridSize": { "x": 1, "y": 1 }, "step": { "x": 0.5, "y": 0.5 } }
        },
        "sceneData": { "model": "bunny.obj" }
    });
    std::fs::create_dir_all(tmp.path().join("by_step"))?;
    std::fs::write(
        tmp.path().join("by_step/config.json"),
        serde_json::to_string(&baseline)?,
    )?;
    let eval_dir_path = tmp.path().join("eval");
    {
        let eval_dir = EvalConfigDir::create(
            tmp.path(),
            "by_step/config.json",
            "/viewData/viewGrid/gridSize",
            &grid_sizes([1, 2], 3),
        )?;
        assert_eq!(eval_dir.configs.len(), 3);
        let c = &eval_dir.configs[1];
        assert_eq!(c.name, "eval/23.json");
        assert_eq!(c.num_views(), 6);
        let text = std::fs::read_to_string(&c.path)?;
        assert!(text.contains("\n    \"sceneData\""));
        let v: serde_json::Value = serde_json::from_str(&text)?;
        assert_eq!(v["viewData"]["viewGrid"]["gridSize"]["x"], 2);
        assert_eq!(v["viewData"]["viewGrid"]["gridSize"]["y"], 3);
        assert_eq!(v["viewData"]["viewGrid"]["step"]["x"], 0.5);
        assert_eq!(v["sceneData"]["model"], "bunny.obj");
        assert!(eval_dir_path.exists());
    }
    assert!(!eval_dir_path.exists());
    Ok(())
}

#[test]
fn test_missing_pointer() {
    let mut data = serde_json::json!({"viewData": {}});
    assert!(set_grid_size(&mut data, "/viewData/viewGrid/gridSize", [2, 2]).is_err());
}
