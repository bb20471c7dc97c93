// Per-category plot statistics and CSV export

use crate::surface::geometry::polygon_area;
use crate::surface::types::Plot;
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub plot_count: usize,
    /// Summed shoelace area in square surface pixels
    pub total_area: f64,
}

/// Counts and areas per category, ordered by category name
pub fn summarize(plots: &[Plot]) -> Vec<CategorySummary> {
    let mut by_category: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for plot in plots {
        let entry = by_category.entry(plot.category()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += polygon_area(plot.vertices());
    }

    by_category
        .into_iter()
        .map(|(category, (plot_count, total_area))| CategorySummary {
            category: category.to_string(),
            plot_count,
            total_area,
        })
        .collect()
}

#[derive(Serialize)]
struct PlotRow<'a> {
    id: &'a str,
    label: &'a str,
    category: &'a str,
    stroke_color: String,
    vertex_count: usize,
    area: f64,
    created_at: String,
}

pub fn write_plots_csv<W: Write>(plots: &[Plot], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for plot in plots {
        csv_writer.serialize(PlotRow {
            id: plot.id(),
            label: plot.label(),
            category: plot.category(),
            stroke_color: plot.stroke_color().to_string(),
            vertex_count: plot.vertices().len(),
            area: polygon_area(plot.vertices()),
            created_at: plot.created_at().to_rfc3339(),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}
