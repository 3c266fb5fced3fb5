#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const FAKE_RENDERER: &str = r#"#!/bin/sh
# --config NAME --eval MODE ARGS...
echo "loading $2"
echo "-----EVALUATION RESULTS-----"
case "$4" in
  samples)
    echo "samples time"
    for s in 1 32 64; do echo "$s $s.5"; done
    ;;
  one)
    name=$(basename "$2" .json)
    x=${name%?}
    y=${name#?}
    echo "views time"
    echo "$((x * y)) 2.25"
    ;;
  gt)
    echo "ground truth"
    echo "99.96"
    ;;
  *)
    echo "header"
    echo "0"
    ;;
esac
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, body)?;
    let mut perm = std::fs::metadata(&path)?.permissions();
    perm.set_mode(0o755);
    std::fs::set_permissions(&path, perm)?;
    Ok(path)
}

fn renderer_root(dir: &Path) -> anyhow::Result<PathBuf> {
    let root = dir.join("exmap");
    let by_step = root.join("res/configs/by_step");
    std::fs::create_dir_all(&by_step)?;
    let baseline = serde_json::json!({
        "viewData": {
            "byStep": true,
            "viewGrid": { "gridSize": { "x": 4, "y": 4 } }
        }
    });
    std::fs::write(
        by_step.join("config.json"),
        serde_json::to_string_pretty(&baseline)?,
    )?;
    Ok(root)
}

fn run_harness(dir: &Path, executable: &Path, args: &[&str]) -> std::process::Output {
    let root = dir.join("exmap");
    std::process::Command::new(env!("CARGO_BIN_EXE_exmap-eval"))
        .arg("--config")
        .arg(dir.join("harness.toml"))
        .arg("--executable")
        .arg(executable)
        .arg("--root")
        .arg(&root)
        .arg("--graphs-dir")
        .arg(dir.join("graphs"))
        .args(args)
        .output()
        .expect("failed to run exmap-eval")
}

#[test]
fn samples_and_cameras_against_fake_renderer() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = renderer_root(tmp.path())?;
    let executable = write_script(tmp.path(), "ExteriorMapping", FAKE_RENDERER)?;

    let out = run_harness(tmp.path(), &executable, &["samples", "--ground-truth"]);
    assert!(
        out.status.success(),
        "{}",
        String::from_utf8_lossy(&out.stderr)
    );
    let csv = std::fs::read_to_string(tmp.path().join("graphs/samples.csv"))?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "samples,color heuristic,depth euler heuristic,depth angle heuristic,ground truth"
    );
    assert_eq!(lines[1], "1,1.5,1.5,1.5,100");
    assert_eq!(lines[3], "64,64.5,64.5,64.5,100");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("64\t64.5\t64.5\t64.5\t100\n"), "{}", stdout);
    assert!(tmp.path().join("graphs/samples_plot.svg").exists());

    let out = run_harness(tmp.path(), &executable, &["cameras"]);
    assert!(
        out.status.success(),
        "{}",
        String::from_utf8_lossy(&out.stderr)
    );
    let csv = std::fs::read_to_string(tmp.path().join("graphs/cameras.csv"))?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 14);
    assert_eq!(lines[1], "4,2.2,2.2,2.2");
    assert_eq!(lines[13], "64,2.2,2.2,2.2");
    assert!(tmp.path().join("graphs/cameras_plot.svg").exists());
    assert!(!root.join("res/configs/eval").exists());
    Ok(())
}

#[test]
fn failing_renderer_stops_the_run() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    renderer_root(tmp.path())?;
    let executable = write_script(
        tmp.path(),
        "ExteriorMapping",
        "#!/bin/sh\necho 'vkCreateDevice failed' >&2\nexit 3\n",
    )?;
    let out = run_harness(tmp.path(), &executable, &["samples"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("vkCreateDevice failed"), "{}", stderr);
    Ok(())
}
