use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use loadr_core::{HistogramSummary, MetricsSnapshot, ProfileProgress, ProgressUpdate};

use super::OutputFormatter;
use crate::config::LoadTest;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _file: &Path, _test: &LoadTest) {}

    fn progress(&self) -> Option<loadr_core::ProgressFn> {
        Some(Arc::new(move |u| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn print_summary(&self, snapshot: &MetricsSnapshot) -> anyhow::Result<()> {
        let line = build_summary_line(snapshot);
        emit_json_line(&line);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub tick: u64,
    pub elapsed_secs: f64,
    pub state: &'static str,

    pub target_vus: u64,
    pub active_vus: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stages: Option<usize>,

    pub requests_per_sec: f64,
    pub failed_requests_per_sec: f64,
    pub error_rate: f64,
    pub iterations_per_sec: f64,

    pub total_requests: u64,
    pub total_failed_requests: u64,
    pub total_iterations: u64,
    pub checks_failed_total: u64,

    pub latency_p50_ms: Option<f64>,
    pub latency_p90_ms: Option<f64>,
    pub latency_p99_ms: Option<f64>,
    pub latency_max_ms: Option<f64>,

    pub req_per_sec_avg: f64,
    pub req_per_sec_stdev: f64,
    pub req_per_sec_max: f64,
}

fn build_progress_line(u: &ProgressUpdate) -> JsonProgressLine {
    let (stage, stages) = match &u.profile {
        ProfileProgress::Staged {
            stage: Some(stage), ..
        } => (Some(stage.index), Some(stage.count)),
        _ => (None, None),
    };
    let s = &u.snapshot;

    JsonProgressLine {
        kind: "progress",
        tick: u.tick,
        elapsed_secs: u.elapsed.as_secs_f64(),
        state: u.state.into(),

        target_vus: u.target_vus,
        active_vus: u.active_vus,
        stage,
        stages,

        requests_per_sec: u.live.rps_now,
        failed_requests_per_sec: u.live.failed_rps_now,
        error_rate: u.live.error_rate_now,
        iterations_per_sec: u.live.iterations_per_sec_now,

        total_requests: s.requests_total,
        total_failed_requests: s.requests_failed,
        total_iterations: s.iterations_total,
        checks_failed_total: s.checks_failed,

        latency_p50_ms: s.latency_ms.p50,
        latency_p90_ms: s.latency_ms.p90,
        latency_p99_ms: s.latency_ms.p99,
        latency_max_ms: s.latency_ms.max,

        req_per_sec_avg: u.live.req_per_sec_avg,
        req_per_sec_stdev: u.live.req_per_sec_stdev,
        req_per_sec_max: u.live.req_per_sec_max,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub elapsed_secs: f64,

    pub requests_total: u64,
    pub requests_failed: u64,
    pub requests_per_sec: f64,
    pub error_rate: f64,
    pub status_codes: BTreeMap<u16, u64>,
    pub errors: BTreeMap<&'static str, u64>,

    pub iterations_total: u64,
    pub iterations_failed: u64,
    pub iterations_interrupted: u64,
    pub iterations_per_sec: f64,

    pub checks_passed: u64,
    pub checks_failed: u64,
    pub checks: BTreeMap<String, JsonCheckCounts>,

    pub latency_ms: JsonLatencySummary,
    pub iteration_duration_ms: JsonLatencySummary,

    pub vus_peak: u64,
    pub anomalies: Vec<JsonAnomaly>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonCheckCounts {
    pub passed: u64,
    pub failed: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonLatencySummary {
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
    pub count: u64,
}

impl From<&HistogramSummary> for JsonLatencySummary {
    fn from(h: &HistogramSummary) -> Self {
        Self {
            p50: h.p50,
            p75: h.p75,
            p90: h.p90,
            p95: h.p95,
            p99: h.p99,
            min: h.min,
            max: h.max,
            mean: h.mean,
            stdev: h.stdev,
            count: h.count,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonAnomaly {
    pub vu_id: u64,
    pub kind: &'static str,
    pub at_secs: f64,
}

fn build_summary_line(s: &MetricsSnapshot) -> JsonSummaryLine {
    JsonSummaryLine {
        kind: "summary",
        elapsed_secs: s.elapsed.as_secs_f64(),

        requests_total: s.requests_total,
        requests_failed: s.requests_failed,
        requests_per_sec: s.requests_per_sec(),
        error_rate: s.request_error_rate(),
        status_codes: s.status_codes.clone(),
        errors: s.errors.iter().map(|(k, v)| ((*k).into(), *v)).collect(),

        iterations_total: s.iterations_total,
        iterations_failed: s.iterations_failed,
        iterations_interrupted: s.iterations_interrupted,
        iterations_per_sec: s.iterations_per_sec(),

        checks_passed: s.checks_passed,
        checks_failed: s.checks_failed,
        checks: s
            .checks
            .iter()
            .map(|(name, c)| {
                (
                    name.clone(),
                    JsonCheckCounts {
                        passed: c.passed,
                        failed: c.failed,
                    },
                )
            })
            .collect(),

        latency_ms: (&s.latency_ms).into(),
        iteration_duration_ms: (&s.iteration_duration_ms).into(),

        vus_peak: s.vus_peak,
        anomalies: s
            .anomalies
            .iter()
            .map(|a| JsonAnomaly {
                vu_id: a.vu_id,
                kind: a.kind.into(),
                at_secs: a.at.as_secs_f64(),
            })
            .collect(),
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}
