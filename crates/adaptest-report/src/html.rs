//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use adaptest_core::report::PsychometricReport;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Generate an HTML report from a psychometric report.
pub fn generate_html(report: &PsychometricReport) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>adaptest report: {}</title>\n",
        html_escape(&report.bank.name)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str("<h1>adaptest report</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Item bank: <strong>{}</strong> | {} items | {} sessions | {} responses | {}</p>\n",
        html_escape(&report.bank.name),
        report.bank.item_count,
        report.metrics.session_count,
        report.metrics.response_count,
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    let verdict = if report.criteria.passed {
        ("pass", "All scientific criteria met")
    } else {
        ("fail", "Scientific criteria not met")
    };
    html.push_str(&format!(
        "<p class=\"verdict {}\">{}</p>\n",
        verdict.0, verdict.1
    ));
    html.push_str("</header>\n");

    // Summary dashboard
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Metric</th><th>Value</th></tr></thead>\n<tbody>\n");
    for (metric, value) in report.headline_metrics() {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{:.3}</td></tr>\n",
            html_escape(metric),
            value
        ));
    }
    html.push_str(&format!(
        "<tr><td>mean_questions</td><td>{:.1}</td></tr>\n",
        report.mean_questions
    ));
    html.push_str(&format!(
        "<tr><td>mean_final_precision</td><td>{:.3}</td></tr>\n",
        report.mean_final_precision
    ));
    if let Some(theta) = &report.theta_summary {
        let ci = &theta.confidence_interval;
        html.push_str(&format!(
            "<tr><td>final θ</td><td>{:.3} ± {:.3} (range {:.2} to {:.2}, {:.0}% CI {:.3} to {:.3})</td></tr>\n",
            theta.mean,
            theta.std_dev,
            theta.min,
            theta.max,
            ci.level * 100.0,
            ci.lower,
            ci.upper
        ));
    }
    if let Some(n) = report.recommended_sample_size {
        html.push_str(&format!(
            "<tr><td>recommended sample size</td><td>{n}</td></tr>\n"
        ));
    }
    html.push_str("</tbody></table>\n");
    html.push_str(&generate_bar_chart(&report.headline_metrics()));
    html.push_str("</section>\n");

    // Criteria
    html.push_str("<section class=\"criteria\">\n");
    html.push_str("<h2>Scientific criteria</h2>\n");
    html.push_str("<table>\n");
    html.push_str(
        "<thead><tr><th>Criterion</th><th>Value</th><th>Threshold</th><th>Status</th></tr></thead>\n<tbody>\n",
    );
    for c in &report.criteria.criteria {
        let (class, text) = if c.passed {
            ("pass", "PASS")
        } else {
            ("fail", "FAIL")
        };
        html.push_str(&format!(
            "<tr class=\"{class}\"><td>{}</td><td>{:.3}</td><td>&gt; {}</td><td>{text}</td></tr>\n",
            html_escape(&c.name),
            c.value,
            c.threshold
        ));
    }
    html.push_str("</tbody></table>\n");
    if !report.criteria.recommendations.is_empty() {
        html.push_str("<h3>Recommendations</h3>\n<ul>\n");
        for r in &report.criteria.recommendations {
            html.push_str(&format!("<li>{}</li>\n", html_escape(r)));
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</section>\n");

    // Categories
    html.push_str("<section class=\"categories\">\n");
    html.push_str("<h2>Categories</h2>\n");
    html.push_str("<table>\n");
    html.push_str("<thead><tr><th>Category</th><th>Items</th><th>Responses</th><th>Mean response</th><th>Mean difficulty</th></tr></thead>\n<tbody>\n");
    for c in &report.categories {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.2}</td><td>{:.2}</td></tr>\n",
            c.category, c.items_in_bank, c.responses, c.mean_response, c.mean_difficulty
        ));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &PsychometricReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

/// Horizontal bars for metrics on a 0..1 scale.
fn generate_bar_chart(metrics: &[(&str, f64)]) -> String {
    let bar_height = 24;
    let max_width = 400;
    let padding = 8;
    let label_width = 220;

    let total_height = metrics.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, (metric, value)) in metrics.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let score = value.clamp(0.0, 1.0);
        let width = (score * max_width as f64) as usize;

        let color = if score >= 0.8 {
            "#22c55e"
        } else if score >= 0.5 {
            "#eab308"
        } else {
            "#ef4444"
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"13\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(metric)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            label_width, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{:.3}</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            value
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
.verdict { display: inline-block; padding: 0.25rem 0.75rem; border-radius: 6px; font-weight: bold; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;
