use std::fmt::Write as _;

use surge_core::runner::RunSummary;

use super::format::{format_duration, format_latency, format_rate};

pub(crate) fn render(summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str("summary\n");
    writeln!(
        &mut out,
        "  duration: {}",
        format_duration(summary.run_duration)
    )
    .ok();
    writeln!(
        &mut out,
        "  iterations: {} ({}/s)",
        summary.iterations_total,
        format_rate(summary.iterations_per_sec())
    )
    .ok();
    writeln!(
        &mut out,
        "  requests: {} (transport errors {})",
        summary.requests_total, summary.transport_errors_total
    )
    .ok();
    for (kind, count) in &summary.transport_errors {
        writeln!(&mut out, "    {kind}: {count}").ok();
    }
    writeln!(&mut out, "  peak_workers: {}", summary.peak_workers).ok();
    if summary.missed_arrivals_total > 0 {
        writeln!(
            &mut out,
            "  missed_arrivals: {} (worker pool exhausted)",
            summary.missed_arrivals_total
        )
        .ok();
    }
    if summary.aborted_workers > 0 {
        writeln!(
            &mut out,
            "  aborted_workers: {} (still busy after the grace period)",
            summary.aborted_workers
        )
        .ok();
    }
    if summary.panicked_workers > 0 {
        writeln!(
            &mut out,
            "  panicked_workers: {} (scenario or check code panicked)",
            summary.panicked_workers
        )
        .ok();
    }

    match &summary.latency {
        Some(h) => {
            writeln!(
                &mut out,
                "  latency: p50={} p90={} p95={} p99={} mean={} max={} (n={})",
                format_latency(h.p50),
                format_latency(h.p90),
                format_latency(h.p95),
                format_latency(h.p99),
                format_latency(h.mean),
                format_latency(h.max),
                h.count
            )
            .ok();
        }
        None => out.push_str("  latency: n/a\n"),
    }

    if !summary.checks_by_name.is_empty() {
        out.push_str("\nchecks\n");
        for c in &summary.checks_by_name {
            let status = if c.failed > 0 { "FAIL" } else { "OK" };
            writeln!(
                &mut out,
                "  {}: pass={} fail={} [{status}]",
                c.name, c.passed, c.failed
            )
            .ok();
        }
        writeln!(
            &mut out,
            "  checks_failed_total: {}/{}",
            summary.checks_failed, summary.checks_total
        )
        .ok();
    }

    out
}
