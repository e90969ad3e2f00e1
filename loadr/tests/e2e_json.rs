use std::path::Path;
use std::process::Command;

use anyhow::Context as _;
use loadr_testserver::TestServer;
use serde_json::Value;

fn json_lines(stdout: &[u8]) -> anyhow::Result<Vec<Value>> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).with_context(|| format!("not JSON: {l}")))
        .collect()
}

fn summary(lines: &[Value]) -> anyhow::Result<&Value> {
    let last = lines.last().context("no output lines")?;
    anyhow::ensure!(
        last.get("kind").and_then(Value::as_str) == Some("summary"),
        "last line is not a summary: {last}"
    );
    Ok(last)
}

async fn run_json(config: &str, url: String) -> anyhow::Result<Vec<Value>> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/configs")
        .join(config);
    let exe = env!("CARGO_BIN_EXE_loadr");

    let out = tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .arg("run")
            .arg(&path)
            .arg("--url")
            .arg(&url)
            .arg("--output")
            .arg("json")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run loadr binary")?;

    anyhow::ensure!(
        out.status.success(),
        "loadr failed: {:?}\nstderr:\n{}",
        out.status.code(),
        String::from_utf8_lossy(&out.stderr)
    );
    json_lines(&out.stdout)
}

#[tokio::test]
async fn flat_run_emits_progress_then_summary() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let lines = run_json("smoke.yaml", server.urls().hello.clone()).await?;
    let served = server.stats().requests_total();
    server.shutdown().await;

    let summary = summary(&lines)?;
    let progress = lines
        .iter()
        .filter(|l| l.get("kind").and_then(Value::as_str) == Some("progress"))
        .collect::<Vec<_>>();
    anyhow::ensure!(!progress.is_empty(), "no progress lines: {lines:?}");
    anyhow::ensure!(progress[0].get("tick").and_then(Value::as_u64) == Some(1));

    let requests = summary
        .get("requests_total")
        .and_then(Value::as_u64)
        .context("requests_total")?;
    // 2 VUs × 2s / ~100ms per iteration.
    anyhow::ensure!((20..=44).contains(&requests), "requests_total = {requests}");
    anyhow::ensure!(requests == served, "served {served}, counted {requests}");
    anyhow::ensure!(summary.get("requests_failed").and_then(Value::as_u64) == Some(0));
    anyhow::ensure!(summary.get("checks_failed").and_then(Value::as_u64) == Some(0));
    anyhow::ensure!(
        summary.pointer("/status_codes/200").and_then(Value::as_u64) == Some(requests)
    );
    anyhow::ensure!(summary.get("vus_peak").and_then(Value::as_u64) == Some(2));
    anyhow::ensure!(
        summary
            .pointer("/latency_ms/count")
            .and_then(Value::as_u64)
            == Some(requests)
    );
    Ok(())
}

#[tokio::test]
async fn staged_run_ramps_up_and_down() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let lines = run_json("staged.yaml", server.urls().hello.clone()).await?;
    server.shutdown().await;

    let summary = summary(&lines)?;
    anyhow::ensure!(summary.get("vus_peak").and_then(Value::as_u64) == Some(3));
    anyhow::ensure!(
        summary
            .get("requests_total")
            .and_then(Value::as_u64)
            .is_some_and(|n| n > 0)
    );
    anyhow::ensure!(
        summary
            .get("anomalies")
            .and_then(Value::as_array)
            .is_some_and(Vec::is_empty)
    );

    let staged_progress = lines
        .iter()
        .filter(|l| l.get("kind").and_then(Value::as_str) == Some("progress"))
        .all(|l| l.get("stages").and_then(Value::as_u64) == Some(3));
    anyhow::ensure!(staged_progress, "progress lines: {lines:?}");
    Ok(())
}
