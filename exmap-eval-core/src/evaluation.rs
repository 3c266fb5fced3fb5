use crate::config::HarnessConfig;
use crate::grid_sweep::{grid_sizes, EvalConfigDir};
use crate::plot::{plot_timing, write_heatmap, TimingPlot};
use crate::table::Table;
use crate::{image_mse, results, EvalMode, Heuristic, RenderBackend};
use anyhow::Context;
use tracing::info;

pub const SAMPLES_PLOT: &str = "samples_plot.svg";
pub const CAMERAS_PLOT: &str = "cameras_plot.svg";
const Y_DESC: &str = "mean render time [ms]";

fn ensure_graphs_dir(cfg: &HarnessConfig) -> anyhow::Result<()> {
    std::fs::create_dir_all(&cfg.graphs_dir)
        .with_context(|| format!("failed to create {}", cfg.graphs_dir.display()))
}

/// timing of the ground-truth renderer on the baseline config
pub fn evaluate_ground_truth<B: RenderBackend>(
    backend: &B,
    cfg: &HarnessConfig,
) -> anyhow::Result<f64> {
    let mode = EvalMode::GroundTruth {
        frames: cfg.eval_frames,
    };
    let stdout = backend.evaluate(&cfg.baseline_config, &mode)?;
    let value = results::parse_scalar(&stdout).context("ground truth timing")?;
    info!("ground truth render time: {} ms", value);
    Ok(value)
}

/// render time against samples per ray, one column per heuristic
pub fn evaluate_samples<B: RenderBackend>(
    backend: &B,
    cfg: &HarnessConfig,
) -> anyhow::Result<Table> {
    info!("----samples evaluation----");
    let mut index: Option<Vec<f64>> = None;
    let mut columns = vec![];
    for heuristic in Heuristic::ALL {
        let mode = EvalMode::Samples {
            heuristic,
            frames: cfg.eval_frames,
        };
        let stdout = backend.evaluate(&cfg.baseline_config, &mode)?;
        let pairs = results::parse_pairs(&stdout)
            .with_context(|| format!("samples sweep of heuristic `{}`", heuristic))?;
        let (samples, times): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        index.get_or_insert(samples);
        columns.push((heuristic.label(), times));
    }
    let mut table = Table::new("samples", index.unwrap_or_default());
    for (name, times) in columns {
        table.push_column(name, times)?;
    }
    if cfg.include_ground_truth {
        let gt = evaluate_ground_truth(backend, cfg)?;
        table.push_column("ground truth", vec![gt; table.num_rows()])?;
    }
    let table = table.rounded(1);
    ensure_graphs_dir(cfg)?;
    table.write_csv(cfg.graphs_dir.join("samples.csv"))?;
    plot_timing(
        &table,
        &TimingPlot {
            x_desc: "number of samples per ray",
            y_desc: Y_DESC,
            x_max: Some(256.),
            x_ticks: (0..256).step_by(32).map(|s| s as f64).collect(),
        },
        cfg.graphs_dir.join(SAMPLES_PLOT),
    )?;
    Ok(table)
}

/// render time against the number of camera views, one column per heuristic
pub fn evaluate_cameras<B: RenderBackend>(
    backend: &B,
    cfg: &HarnessConfig,
) -> anyhow::Result<Table> {
    info!("----cameras evaluation----");
    let sizes = grid_sizes(cfg.grid.start, cfg.grid.steps);
    let eval_dir = EvalConfigDir::create(
        cfg.configs_path(),
        &cfg.baseline_config,
        &cfg.grid_pointer,
        &sizes,
    )?;
    let num_config = eval_dir.configs.len();
    let mut index: Option<Vec<f64>> = None;
    let mut columns = vec![];
    for heuristic in Heuristic::ALL {
        let mut views = Vec::with_capacity(num_config);
        let mut times = Vec::with_capacity(num_config);
        for (i_config, grid_config) in eval_dir.configs.iter().enumerate() {
            info!(
                "evaluating file: {} {}/{}",
                grid_config.name,
                i_config + 1,
                num_config
            );
            let mode = EvalMode::One {
                heuristic,
                samples: cfg.cameras_samples,
                frames: cfg.eval_frames,
            };
            let stdout = backend.evaluate(&grid_config.name, &mode)?;
            let pairs = results::parse_pairs(&stdout).with_context(|| {
                format!("{} with heuristic `{}`", grid_config.name, heuristic)
            })?;
            let (num_view, time) = pairs[0];
            views.push(num_view);
            times.push(time);
        }
        index.get_or_insert(views);
        columns.push((heuristic.label(), times));
    }
    drop(eval_dir);
    let mut table = Table::new("views", index.unwrap_or_default());
    for (name, times) in columns {
        table.push_column(name, times)?;
    }
    let table = table.rounded(1);
    ensure_graphs_dir(cfg)?;
    table.write_csv(cfg.graphs_dir.join("cameras.csv"))?;
    plot_timing(
        &table,
        &TimingPlot {
            x_desc: "number of views",
            y_desc: Y_DESC,
            x_max: None,
            x_ticks: table.index.clone(),
        },
        cfg.graphs_dir.join(CAMERAS_PLOT),
    )?;
    Ok(table)
}

/// lets the renderer write novel-view and ground-truth screenshots
pub fn generate_images<B: RenderBackend>(backend: &B, cfg: &HarnessConfig) -> anyhow::Result<()> {
    for heuristic in Heuristic::ALL {
        let mode = EvalMode::Mse {
            heuristic,
            samples: cfg.mse_samples,
        };
        backend.evaluate(&cfg.baseline_config, &mode)?;
    }
    backend.evaluate(&cfg.baseline_config, &EvalMode::MseGroundTruth)?;
    Ok(())
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct MseReport {
    pub heuristic: &'static str,
    pub mse: f64,
    pub images: usize,
}

pub fn write_mse_csv<PATH: AsRef<std::path::Path>>(
    reports: &[MseReport],
    path: PATH,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for report in reports {
        writer.serialize(report)?;
    }
    writer.flush()?;
    Ok(())
}

/// MSE and error heatmap of every heuristic against the ground truth screenshots
pub fn evaluate_mse<B: RenderBackend>(
    backend: &B,
    cfg: &HarnessConfig,
) -> anyhow::Result<Vec<MseReport>> {
    info!("----MSE evaluation----");
    if cfg.mse_regenerate {
        generate_images(backend, cfg)?;
    }
    ensure_graphs_dir(cfg)?;
    let screenshots = cfg.screenshots_path();
    let gt_dir = screenshots.join("gt");
    let mut reports = vec![];
    for heuristic in Heuristic::ALL {
        info!("evaluating for {}", heuristic.report_key());
        let res = image_mse::folder_mse(&gt_dir, screenshots.join(heuristic.novel_folder()))?;
        info!(
            "MSE for {} heuristic is: {}",
            heuristic.report_key(),
            res.mse
        );
        let path = cfg
            .graphs_dir
            .join(format!("heatmap_{}.png", heuristic.report_key()));
        write_heatmap(&res.heatmap, path)?;
        reports.push(MseReport {
            heuristic: heuristic.report_key(),
            mse: res.mse,
            images: res.num_pair,
        });
    }
    write_mse_csv(&reports, cfg.graphs_dir.join("mse.csv"))?;
    if cfg.mse_delete {
        std::fs::remove_dir_all(&screenshots)
            .with_context(|| format!("failed to remove {}", screenshots.display()))?;
    }
    Ok(reports)
}

pub fn run_all<B: RenderBackend>(backend: &B, cfg: &HarnessConfig) -> anyhow::Result<()> {
    ensure_graphs_dir(cfg)?;
    evaluate_samples(backend, cfg)?;
    evaluate_cameras(backend, cfg)?;
    evaluate_mse(backend, cfg)?;
    Ok(())
}

// ---------------------------------------
// tests against a renderer stand-in

#[cfg(test)]
struct ScriptedRenderer {
    configs_dir: std::path::PathBuf,
    calls: std::cell::RefCell<Vec<(String, EvalMode)>>,
}

#[cfg(test)]
impl ScriptedRenderer {
    fn new(configs_dir: &std::path::Path) -> Self {
        ScriptedRenderer {
            configs_dir: configs_dir.to_path_buf(),
            calls: Default::default(),
        }
    }

    fn cost(heuristic: Heuristic) -> f64 {
        match heuristic {
            Heuristic::Color => 1.0,
            Heuristic::DepthDist => 1.5,
            Heuristic::DepthAngle => 1.25,
        }
    }
}

#[cfg(test)]
impl RenderBackend for ScriptedRenderer {
    fn evaluate(&self, config: &str, mode: &EvalMode) -> anyhow::Result<String> {
        self.calls
            .borrow_mut()
            .push((config.to_string(), mode.clone()));
        let mut out = String::from("loading scene\n");
        out += results::SENTINEL;
        out += "\n";
        match mode {
            EvalMode::Samples { heuristic, .. } => {
                out += "samples time\n";
                for samples in [1, 32, 64, 128] {
                    let t = 10.0 + samples as f64 * 0.333 * Self::cost(*heuristic);
                    out += &format!("{} {}\n", samples, t);
                }
            }
            EvalMode::One { heuristic, .. } => {
                let text = std::fs::read_to_string(self.configs_dir.join(config))?;
                let v: serde_json::Value = serde_json::from_str(&text)?;
                let grid = &v["viewData"]["viewGrid"]["gridSize"];
                let views = grid["x"].as_u64().unwrap() * grid["y"].as_u64().unwrap();
                out += "views time\n";
                out += &format!("{} {}\n", views, views as f64 * Self::cost(*heuristic));
            }
            EvalMode::GroundTruth { .. } => {
                out += "ground truth\n131.25\n";
            }
            EvalMode::Mse { .. } | EvalMode::MseGroundTruth => {}
        }
        Ok(out)
    }
}

#[cfg(test)]
fn test_setup(tmp: &std::path::Path) -> anyhow::Result<HarnessConfig> {
    let cfg = HarnessConfig {
        root: tmp.to_path_buf(),
        graphs_dir: tmp.join("graphs"),
        ..Default::default()
    };
    let baseline = cfg.configs_path().join(&cfg.baseline_config);
    std::fs::create_dir_all(baseline.parent().unwrap())?;
    std::fs::write(
        &baseline,
        r#"{"viewData": {"byStep": true, "viewGrid": {"gridSize": {"x": 1, "y": 1}}}}"#,
    )?;
    Ok(cfg)
}

#[test]
fn test_evaluate_samples() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut cfg = test_setup(tmp.path())?;
    cfg.include_ground_truth = true;
    let renderer = ScriptedRenderer::new(&cfg.configs_path());
    let table = evaluate_samples(&renderer, &cfg)?;
    assert_eq!(table.index, vec![1., 32., 64., 128.]);
    assert_eq!(table.columns.len(), 4);
    // 10 + 32 * 0.333 = 20.656
    assert_eq!(table.column("color heuristic").unwrap()[1], 20.7);
    // 131.25 is a tie and rounds to even
    assert_eq!(table.column("ground truth").unwrap(), &[131.2; 4][..]);
    {
        let calls = renderer.calls.borrow();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].0, "by_step/config.json");
        assert_eq!(
            calls[2].1,
            EvalMode::Samples {
                heuristic: Heuristic::DepthAngle,
                frames: 20
            }
        );
        assert_eq!(calls[3].1, EvalMode::GroundTruth { frames: 20 });
    }
    assert!(cfg.graphs_dir.join(SAMPLES_PLOT).exists());
    let csv = std::fs::read_to_string(cfg.graphs_dir.join("samples.csv"))?;
    assert!(csv.starts_with(
        "samples,color heuristic,depth euler heuristic,depth angle heuristic,ground truth\n"
    ));
    Ok(())
}

#[test]
fn test_evaluate_cameras() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let cfg = test_setup(tmp.path())?;
    let renderer = ScriptedRenderer::new(&cfg.configs_path());
    let table = evaluate_cameras(&renderer, &cfg)?;
    assert_eq!(
        table.index,
        vec![4., 6., 9., 12., 16., 20., 25., 30., 36., 42., 49., 56., 64.]
    );
    assert_eq!(table.column("depth euler heuristic").unwrap()[1], 9.0);
    assert_eq!(table.column("depth angle heuristic").unwrap()[0], 5.0);
    assert_eq!(renderer.calls.borrow().len(), 3 * 13);
    assert_eq!(renderer.calls.borrow()[1].0, "eval/23.json");
    // generated configs are gone after the sweep
    assert!(!cfg.configs_path().join("eval").exists());
    let svg = std::fs::read_to_string(cfg.graphs_dir.join(CAMERAS_PLOT))?;
    for views in ["4", "9", "42"] {
        assert!(svg.contains(&format!(">{}<", views)), "no x tick at {}", views);
    }
    assert!(cfg.graphs_dir.join("cameras.csv").exists());
    Ok(())
}

#[test]
fn test_evaluate_cameras_cleans_up_on_bad_output() -> anyhow::Result<()> {
    struct Silent;
    impl RenderBackend for Silent {
        fn evaluate(&self, _config: &str, _mode: &EvalMode) -> anyhow::Result<String> {
            Ok("crashed before printing results\n".to_string())
        }
    }
    let tmp = tempfile::tempdir()?;
    let cfg = test_setup(tmp.path())?;
    let err = evaluate_cameras(&Silent, &cfg).unwrap_err();
    assert!(err
        .chain()
        .any(|e| e.to_string().contains("EVALUATION RESULTS")));
    assert!(!cfg.configs_path().join("eval").exists());
    Ok(())
}

#[test]
fn test_evaluate_mse() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut cfg = test_setup(tmp.path())?;
    cfg.mse_regenerate = true;
    cfg.mse_delete = true;
    let screenshots = cfg.screenshots_path();
    let gt = image::RgbImage::from_pixel(5, 4, image::Rgb([200, 100, 50]));
    std::fs::create_dir_all(screenshots.join("gt"))?;
    gt.save(screenshots.join("gt/0000.png"))?;
    gt.save(screenshots.join("gt/0001.png"))?;
    for (i_h, heuristic) in Heuristic::ALL.iter().enumerate() {
        let dir = screenshots.join(heuristic.novel_folder());
        std::fs::create_dir_all(&dir)?;
        let mut novel = gt.clone();
        if i_h > 0 {
            novel.put_pixel(i_h as u32, 0, image::Rgb([200, 100, 255]));
        }
        gt.save(dir.join("0000.png"))?;
        novel.save(dir.join("0001.png"))?;
    }
    let renderer = ScriptedRenderer::new(&cfg.configs_path());
    let reports = evaluate_mse(&renderer, &cfg)?;
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].heuristic, "color");
    assert_eq!(reports[0].mse, 0.0);
    assert_eq!(reports[1].images, 2);
    assert!(reports[1].mse > 0.0);
    assert_eq!(
        renderer.calls.borrow().last().map(|c| c.1.clone()),
        Some(EvalMode::MseGroundTruth)
    );
    for key in ["color", "dist", "dist_angle"] {
        assert!(cfg.graphs_dir.join(format!("heatmap_{key}.png")).exists());
    }
    let csv = std::fs::read_to_string(cfg.graphs_dir.join("mse.csv"))?;
    assert!(csv.starts_with("heuristic,mse,images\ncolor,0"));
    assert_eq!(csv.lines().count(), 4);
    assert!(!screenshots.exists());
    Ok(())
}
