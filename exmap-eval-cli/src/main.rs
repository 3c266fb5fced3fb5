use clap::{Parser, Subcommand};
use exmap_eval_core::config::HarnessConfig;
use exmap_eval_core::evaluation;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to the harness settings (TOML); defaults are used when the file is absent
    #[arg(long, default_value = "harness.toml")]
    config: std::path::PathBuf,

    /// Renderer executable (overrides the settings file)
    #[arg(long)]
    executable: Option<std::path::PathBuf>,

    /// Renderer repository root holding `res/configs` and `screenshots` (overrides the settings file)
    #[arg(long)]
    root: Option<std::path::PathBuf>,

    /// Output directory of plots and tables (overrides the settings file)
    #[arg(long)]
    graphs_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Samples sweep, camera-grid sweep and MSE comparison
    All,
    /// Render time against samples per ray
    Samples {
        /// Add the ground-truth render time as a constant column
        #[arg(long)]
        ground_truth: bool,
    },
    /// Render time against the number of camera views
    Cameras,
    /// MSE and error heatmaps of novel views against the ground truth
    Mse {
        /// Let the renderer write the screenshots first
        #[arg(long)]
        regenerate: bool,
        /// Delete the screenshots afterwards
        #[arg(long)]
        delete: bool,
    },
    /// Let the renderer write novel-view and ground-truth screenshots
    GenerateImages,
    /// Render time of the ground-truth renderer
    GroundTruth,
}

fn settings(cli: &Cli) -> anyhow::Result<HarnessConfig> {
    let mut cfg = HarnessConfig::load(&cli.config)?;
    if let Some(executable) = &cli.executable {
        cfg.executable = executable.clone();
    }
    if let Some(root) = &cli.root {
        cfg.root = root.clone();
    }
    if let Some(graphs_dir) = &cli.graphs_dir {
        cfg.graphs_dir = graphs_dir.clone();
    }
    match cli.command {
        Some(Command::Samples { ground_truth: true }) => cfg.include_ground_truth = true,
        Some(Command::Mse { regenerate, delete }) => {
            cfg.mse_regenerate |= regenerate;
            cfg.mse_delete |= delete;
        }
        _ => {}
    }
    Ok(cfg)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
    let cli = Cli::parse();
    let cfg = settings(&cli)?;
    tracing::info!(
        "renderer {}, root {}",
        cfg.executable.display(),
        cfg.root.display()
    );
    let renderer = cfg.renderer();
    match cli.command.clone().unwrap_or(Command::All) {
        Command::All => evaluation::run_all(&renderer, &cfg)?,
        Command::Samples { .. } => {
            let table = evaluation::evaluate_samples(&renderer, &cfg)?;
            print!("{}", table);
        }
        Command::Cameras => {
            let table = evaluation::evaluate_cameras(&renderer, &cfg)?;
            print!("{}", table);
        }
        Command::Mse { .. } => {
            for report in evaluation::evaluate_mse(&renderer, &cfg)? {
                println!("MSE for {} heuristic is: {}", report.heuristic, report.mse);
            }
        }
        Command::GenerateImages => evaluation::generate_images(&renderer, &cfg)?,
        Command::GroundTruth => {
            let value = evaluation::evaluate_ground_truth(&renderer, &cfg)?;
            println!("ground truth: {} ms", value);
        }
    }
    Ok(())
}

#[test]
fn test_cli_overrides() -> anyhow::Result<()> {
    let cli = Cli::try_parse_from([
        "exmap-eval",
        "--config",
        "/nonexistent/harness.toml",
        "--executable",
        "/opt/ExteriorMapping",
        "mse",
        "--regenerate",
    ])?;
    let cfg = settings(&cli)?;
    assert_eq!(cfg.executable, std::path::PathBuf::from("/opt/ExteriorMapping"));
    assert!(cfg.mse_regenerate);
    assert!(!cfg.mse_delete);
    assert_eq!(cfg.eval_frames, 20);

    let cli = Cli::try_parse_from(["exmap-eval", "samples", "--ground-truth"])?;
    assert_eq!(cli.command, Some(Command::Samples { ground_truth: true }));
    let cli = Cli::try_parse_from(["exmap-eval"])?;
    assert!(cli.command.is_none());
    assert!(Cli::try_parse_from(["exmap-eval", "render"]).is_err());
    Ok(())
}

#[test]
fn test_cli_debug_assert() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
