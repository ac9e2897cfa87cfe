//! Formatted terminal output for fit tables and quality summaries.
//!
//! Formatting lives here so the engines stay free of presentation code.

use crate::domain::{FitQuality, FitRow, FitTable};

const NAME_WIDTH: usize = 16;

/// Format a fit table, one row per unfixed parameter.
pub fn format_fit_table(table: &FitTable) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!(
            "{:<NAME_WIDTH$} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "name", "guess", "estimate", "std", "low_95", "high_95", "lower_bound", "upper_bound"
        ),
    );
    push_line(
        &mut out,
        format!(
            "{:-<NAME_WIDTH$} {:-<12} {:-<12} {:-<12} {:-<12} {:-<12} {:-<12} {:-<12}",
            "", "", "", "", "", "", "", ""
        ),
    );
    for row in &table.rows {
        push_line(&mut out, format_row(row));
    }
    out
}

/// One-line goodness-of-fit summary.
pub fn format_quality(q: &FitQuality) -> String {
    format!(
        "n={} k={} lnL={} chi2={} reduced_chi2={} AIC={} BIC={}",
        q.n_obs,
        q.n_params,
        fmt_num(q.ln_likelihood),
        fmt_num(q.chi2),
        fmt_num(q.reduced_chi2),
        fmt_num(q.aic),
        fmt_num(q.bic),
    )
}

/// Table followed by the quality line, when there is one.
pub fn format_fit_summary(table: &FitTable, quality: Option<&FitQuality>) -> String {
    let mut out = format_fit_table(table);
    if let Some(q) = quality {
        out.push('\n');
        out.push_str(&format_quality(q));
        out.push('\n');
    }
    out
}

fn format_row(row: &FitRow) -> String {
    format!(
        "{:<NAME_WIDTH$} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
        truncate(&row.name, NAME_WIDTH),
        fmt_num(row.guess),
        fmt_num(row.estimate),
        row.std.map_or_else(|| "-".to_string(), fmt_num),
        fmt_num(row.low_95),
        fmt_num(row.high_95),
        fmt_num(row.lower_bound),
        fmt_num(row.upper_bound),
    )
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Six significant-ish decimals, switching to scientific notation for very
/// large or very small magnitudes.
fn fmt_num(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else if v != 0.0 && (v.abs() >= 1e6 || v.abs() < 1e-4) {
        format!("{v:.4e}")
    } else {
        format!("{v:.6}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max - 1).collect();
    out.push('.');
    out
}
