use std::fmt::Write as _;

use loadr_core::{HistogramSummary, MetricsSnapshot};

use super::format::{format_duration, format_ms_opt, format_percent, format_rate};

pub(crate) fn render(s: &MetricsSnapshot) -> String {
    let mut out = String::new();

    out.push_str("summary\n");
    writeln!(&mut out, "  duration: {}", format_duration(s.elapsed)).ok();
    writeln!(&mut out, "  vus: peak={}", s.vus_peak).ok();

    writeln!(
        &mut out,
        "  requests: {} (failed {}, {}) rps={}",
        s.requests_total,
        s.requests_failed,
        format_percent(s.request_error_rate()),
        format_rate(s.requests_per_sec())
    )
    .ok();
    if !s.status_codes.is_empty() {
        let codes = s
            .status_codes
            .iter()
            .map(|(code, n)| format!("{code}={n}"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(&mut out, "    status: {codes}").ok();
    }
    if !s.errors.is_empty() {
        let errors = s
            .errors
            .iter()
            .map(|(kind, n)| format!("{kind}={n}"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(&mut out, "    errors: {errors}").ok();
    }

    writeln!(
        &mut out,
        "  iterations: {} (failed {}, interrupted {}) iters/s={}",
        s.iterations_total,
        s.iterations_failed,
        s.iterations_interrupted,
        format_rate(s.iterations_per_sec())
    )
    .ok();

    render_histogram(&mut out, "latency", &s.latency_ms);
    render_histogram(&mut out, "iteration_duration", &s.iteration_duration_ms);

    if s.checks_total() > 0 {
        writeln!(
            &mut out,
            "  checks: {}/{} passed",
            s.checks_passed,
            s.checks_total()
        )
        .ok();

        // Failing checks first, most failures on top.
        let mut checks: Vec<_> = s.checks.iter().collect();
        checks.sort_by(|(a_name, a), (b_name, b)| {
            b.failed.cmp(&a.failed).then_with(|| a_name.cmp(b_name))
        });
        for (name, c) in checks {
            let mark = if c.failed == 0 { "ok" } else { "FAIL" };
            writeln!(
                &mut out,
                "    {mark} {name}: {}/{} passed",
                c.passed,
                c.total()
            )
            .ok();
        }
    }

    if !s.anomalies.is_empty() {
        writeln!(&mut out, "  anomalies: {}", s.anomalies.len()).ok();
        for a in &s.anomalies {
            writeln!(
                &mut out,
                "    vu={} {} at={}",
                a.vu_id,
                a.kind,
                format_duration(a.at)
            )
            .ok();
        }
    }

    out
}

fn render_histogram(out: &mut String, label: &str, h: &HistogramSummary) {
    if h.count == 0 {
        writeln!(out, "  {label}: n/a").ok();
        return;
    }
    writeln!(
        out,
        "  {label} = p50={} p90={} p95={} p99={} mean={} max={} (n={})",
        format_ms_opt(h.p50),
        format_ms_opt(h.p90),
        format_ms_opt(h.p95),
        format_ms_opt(h.p99),
        format_ms_opt(h.mean),
        format_ms_opt(h.max),
        h.count
    )
    .ok();
}
