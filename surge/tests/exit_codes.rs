use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::Context as _;
use surge_testserver::TestServer;

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn ensure_code(out: &Output, expected: i32) -> anyhow::Result<()> {
    anyhow::ensure!(
        status_code(out.status) == expected,
        "expected exit code {expected}, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

fn write_scenario(dir: &Path, yaml: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join("scenario.yaml");
    std::fs::write(&path, yaml).context("write scenario")?;
    Ok(path)
}

async fn run_surge(host: String, args: Vec<String>) -> anyhow::Result<Output> {
    let exe = env!("CARGO_BIN_EXE_surge");
    tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .args(&args)
            .env("HOST", host)
            .env("SURGE_LOG", "warn")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run surge binary")
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let exe = env!("CARGO_BIN_EXE_surge");

    let out = Command::new(exe)
        .arg("run")
        .arg("./does-not-matter.yaml")
        .arg("--host")
        .arg("localhost")
        .arg("--timeout")
        .arg("10x")
        .output()
        .context("run surge binary")?;

    ensure_code(&out, 30)
}

#[test]
fn missing_scenario_file_exits_30() -> anyhow::Result<()> {
    let exe = env!("CARGO_BIN_EXE_surge");

    let out = Command::new(exe)
        .arg("run")
        .arg("./no-such-scenario.yaml")
        .arg("--host")
        .arg("localhost")
        .output()
        .context("run surge binary")?;

    ensure_code(&out, 30)
}

#[test]
fn invalid_profile_exits_30() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = write_scenario(
        dir.path(),
        "executor: constant-arrival-rate\nrate: 10\nduration: 1s\npreAllocatedVUs: 5\nmaxVUs: 2\nrequest: { path: /user }\n",
    )?;

    let out = Command::new(env!("CARGO_BIN_EXE_surge"))
        .arg("validate")
        .arg(&path)
        .output()
        .context("run surge binary")?;

    ensure_code(&out, 30)
}

#[test]
fn bundled_scenarios_validate() -> anyhow::Result<()> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../scenarios");
    for name in ["get-user.yaml", "post-user.yaml"] {
        let out = Command::new(env!("CARGO_BIN_EXE_surge"))
            .arg("validate")
            .arg(root.join(name))
            .output()
            .context("run surge binary")?;
        ensure_code(&out, 0)?;
    }
    Ok(())
}

#[tokio::test]
async fn passing_run_exits_0_with_json_summary() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = write_scenario(
        dir.path(),
        "executor: constant-arrival-rate\nrate: 10\nduration: 1s\npreAllocatedVUs: 2\nmaxVUs: 10\nrequest:\n  method: POST\n  path: /user\n  json: { first_name: john, last_name: smith }\nchecks:\n  - name: status was 200\n    status: 201\n",
    )?;

    let out = run_surge(
        server.host(),
        vec![
            "run".to_string(),
            path.display().to_string(),
            "--output".to_string(),
            "json".to_string(),
        ],
    )
    .await?;
    server.shutdown().await;

    ensure_code(&out, 0)?;

    let stdout = String::from_utf8_lossy(&out.stdout);
    let last = stdout.lines().last().context("no json output")?;
    let v: serde_json::Value = serde_json::from_str(last).context("parse summary line")?;
    anyhow::ensure!(v.get("kind").and_then(|k| k.as_str()) == Some("summary"), "{last}");
    anyhow::ensure!(
        v.get("checks_total").and_then(|k| k.as_u64()) == Some(10),
        "{last}"
    );
    Ok(())
}

#[tokio::test]
async fn checks_failed_exit_10() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = write_scenario(
        dir.path(),
        "executor: constant-arrival-rate\nrate: 5\nduration: 1s\npreAllocatedVUs: 5\nmaxVUs: 5\nrequest: { path: /status/500 }\nchecks:\n  - name: status was 200\n    status: 200\n",
    )?;

    let out = run_surge(
        server.host(),
        vec!["run".to_string(), path.display().to_string()],
    )
    .await?;
    server.shutdown().await;

    ensure_code(&out, 10)
}

#[tokio::test]
async fn missed_arrivals_exit_11() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = write_scenario(
        dir.path(),
        "executor: constant-arrival-rate\nrate: 10\nduration: 1s\npreAllocatedVUs: 1\nmaxVUs: 1\nrequest: { path: /slow?ms=1500 }\nchecks:\n  - name: status was 200\n    status: 200\n",
    )?;

    let out = run_surge(
        server.host(),
        vec!["run".to_string(), path.display().to_string()],
    )
    .await?;
    server.shutdown().await;

    ensure_code(&out, 11)
}
