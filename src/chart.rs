//! Text rendering of a load's position on the RC vs SD plane.

use crate::config::{ChartConfig, SectionalDensityFormula};

pub const CHART_COLUMNS: usize = 21;
pub const CHART_ROWS: usize = 11;

/// Grid cell for a value, or `None` when it falls outside the axis range
///
/// Scaled positions truncate toward zero, so a value less than one cell
/// below the minimum still lands in cell 0.
fn cell(value: f64, min: f64, max: f64, cells: usize) -> Option<usize> {
    if !value.is_finite() {
        return None;
    }
    let scaled = ((value - min) / (max - min) * (cells - 1) as f64).trunc();
    if scaled >= 0.0 && scaled <= (cells - 1) as f64 {
        Some(scaled as usize)
    } else {
        None
    }
}

/// Render the chart with a single `*` marking (RC, SD)
///
/// Rows run from the top of the SD range down; the point is drawn only
/// when both coordinates land inside the grid.
pub fn render_rc_sd_chart(
    relative_capacity: f64,
    sectional_density: f64,
    chart: &ChartConfig,
    formula: SectionalDensityFormula,
) -> String {
    let (sd_min, sd_max) = chart.sd_range(formula);
    let col = cell(relative_capacity, chart.rc_min, chart.rc_max, CHART_COLUMNS);
    let row = cell(sectional_density, sd_min, sd_max, CHART_ROWS).map(|r| CHART_ROWS - 1 - r);
    let point = col.zip(row);
    let step = (sd_max - sd_min) / (CHART_ROWS - 1) as f64;
    let precision: usize = if sd_max - sd_min >= 10.0 { 0 } else { 2 };

    let mut out = String::new();
    out.push_str("Position on the Powley chart (RC vs SD)\n");
    for r in 0..CHART_ROWS {
        let label = sd_max - r as f64 * step;
        let cells: Vec<&str> = (0..CHART_COLUMNS)
            .map(|c| if point == Some((c, r)) { "*" } else { "." })
            .collect();
        out.push_str(&format!("{:>7.*} | {}\n", precision, label, cells.join(" ")));
    }
    out.push_str(&format!("        +{}\n", "-".repeat(CHART_COLUMNS * 2)));
    let span = CHART_COLUMNS * 2 - 1;
    let lo = format!("{}", chart.rc_min);
    let hi = format!("{}", chart.rc_max);
    let gap = span.saturating_sub(lo.len() + hi.len());
    out.push_str(&format!("     RC   {}{}{}\n", lo, " ".repeat(gap), hi));
    out
}
