//! Feature importance chart rendered with Plotters

use plotters::prelude::*;

/// How many features the chart shows at most
pub const TOP_FEATURES: usize = 15;

/// Render a horizontal bar chart of the strongest features.
///
/// Features are ranked by normalized split-gain importance; the top 15 are
/// drawn with the strongest at the top, the way the original training run
/// plotted them.
///
/// # Arguments
/// * `names` - Feature column names, aligned with `importances`
/// * `importances` - Normalized importance per feature
/// * `output_path` - Path to save the PNG plot
pub fn plot_feature_importance(
    names: &[String],
    importances: &[f64],
    output_path: &str,
) -> crate::Result<()> {
    if names.len() != importances.len() {
        anyhow::bail!(
            "feature names ({}) and importances ({}) disagree",
            names.len(),
            importances.len()
        );
    }
    if names.is_empty() {
        anyhow::bail!("no features to plot");
    }

    let mut ranked: Vec<(&str, f64)> = names
        .iter()
        .map(String::as_str)
        .zip(importances.iter().copied())
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(TOP_FEATURES);
    // Reverse so the strongest feature ends up at the top of the chart
    ranked.reverse();

    let max_importance = ranked
        .iter()
        .map(|(_, value)| *value)
        .fold(f64::NEG_INFINITY, f64::max)
        .max(1e-6);
    let n_bars = ranked.len();

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Feature Importance", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(160)
        .build_cartesian_2d(0f64..(max_importance * 1.1), 0f64..(n_bars as f64))?;

    let labels: Vec<String> = ranked.iter().map(|(name, _)| name.to_string()).collect();
    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc("Importance")
        .axis_desc_style(("sans-serif", 15))
        .y_labels(n_bars)
        .y_label_formatter(&|y| {
            let index = y.floor() as usize;
            labels.get(index).cloned().unwrap_or_default()
        })
        .draw()?;

    for (i, (_, value)) in ranked.iter().enumerate() {
        chart.draw_series(std::iter::once(Rectangle::new(
            [(0.0, i as f64 + 0.1), (*value, i as f64 + 0.9)],
            BLUE.filled(),
        )))?;
    }

    root.present()?;
    println!("Feature importance chart saved to: {}", output_path);

    Ok(())
}
