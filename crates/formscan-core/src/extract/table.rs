//! Bin table reconstruction from spatial layout.
//!
//! Tokens are sorted into the Min, Max and Count columns by their boxes, each
//! column is ordered top to bottom, and every Min token is joined to the
//! vertically nearest Max and Count tokens. Rows the scan did not yield are
//! filled from the row templates, so the table always has one row per
//! template.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::ExtractionError;
use crate::models::layout::{RowTemplate, TableLayout};
use crate::models::record::{TableRow, TableSource};
use crate::ocr::TokenStream;

lazy_static! {
    // Signed decimal marker, leading digits optional; OCR sometimes reads the
    // point as a comma.
    static ref NUMERIC_MARKER: Regex = Regex::new(r"^[+-]?(?:\d+(?:[.,]\d*)?|[.,]\d+)$").unwrap();
}

/// A classified token: its text and vertical center.
#[derive(Debug, Clone, Copy)]
struct Cell<'a> {
    text: &'a str,
    center_y: f32,
}

#[derive(Debug, Default)]
struct Columns<'a> {
    min: Vec<Cell<'a>>,
    max: Vec<Cell<'a>>,
    count: Vec<Cell<'a>>,
}

/// Reconstruct the table; always returns one row per template.
pub fn reconstruct(stream: &TokenStream, layout: &TableLayout) -> Vec<TableRow> {
    reconstruct_detailed(stream, layout).0
}

/// Reconstruct the table and report how it was produced.
///
/// Any hard failure while classifying or joining yields the template table.
pub fn reconstruct_detailed(stream: &TokenStream, layout: &TableLayout) -> (Vec<TableRow>, TableSource) {
    match try_reconstruct(stream, layout) {
        Ok(result) => result,
        Err(e) => {
            warn!("Table reconstruction failed: {}; using template table", e);
            (template_table(layout), TableSource::Template)
        }
    }
}

/// The canonical table, in final row order.
pub fn template_table(layout: &TableLayout) -> Vec<TableRow> {
    sort_rows(layout.rows.iter().map(TableRow::from).collect())
}

fn try_reconstruct(
    stream: &TokenStream,
    layout: &TableLayout,
) -> Result<(Vec<TableRow>, TableSource), ExtractionError> {
    let columns = classify(stream, layout)?;
    debug!(
        "Classified {} min, {} max, {} count tokens",
        columns.min.len(),
        columns.max.len(),
        columns.count.len()
    );

    let mut slots: Vec<Option<TableRow>> = vec![None; layout.rows.len()];

    for min in &columns.min {
        let Some(index) = marker_index(min.text, &layout.rows) else {
            warn!("Discarding unknown row marker {:?} at y={:.1}", min.text, min.center_y);
            continue;
        };
        if slots[index].is_some() {
            debug!("Row marker {:?} seen again at y={:.1}, keeping first", min.text, min.center_y);
            continue;
        }

        let template = &layout.rows[index];
        let max = nearest(&columns.max, min.center_y, layout.max_join_distance)
            .map_or(template.max.as_str(), |c| c.text);
        let count = nearest(&columns.count, min.center_y, layout.max_join_distance)
            .map_or(template.count.as_str(), |c| c.text);

        slots[index] = Some(TableRow::new(&template.min, max, count));
    }

    let detected = slots.iter().flatten().count();
    let filled = slots.len() - detected;

    let rows = slots
        .into_iter()
        .zip(&layout.rows)
        .map(|(slot, template)| {
            slot.unwrap_or_else(|| {
                debug!("Filling row {} from template", template.min);
                TableRow::from(template)
            })
        })
        .collect();

    if filled > 0 {
        info!("Table: {} rows detected, {} filled from templates", detected, filled);
    }

    Ok((sort_rows(rows), TableSource::Reconstructed { detected, filled }))
}

/// Assign each token to the first column window (Min, Max, Count) it fits,
/// then order every column top to bottom.
fn classify<'a>(stream: &'a TokenStream, layout: &TableLayout) -> Result<Columns<'a>, ExtractionError> {
    let mut columns = Columns::default();

    for (index, token) in stream.iter().enumerate() {
        let bbox = token.checked_box(index)?;
        let column = if layout.min_column.contains(bbox) {
            &mut columns.min
        } else if layout.max_column.contains(bbox) {
            &mut columns.max
        } else if layout.count_column.contains(bbox) {
            &mut columns.count
        } else {
            continue;
        };

        column.push(Cell {
            text: token.text.trim(),
            center_y: bbox.center_y(),
        });
    }

    for column in [&mut columns.min, &mut columns.max, &mut columns.count] {
        column.sort_by(|a, b| a.center_y.total_cmp(&b.center_y));
    }

    Ok(columns)
}

/// Cell whose vertical center is closest to `y`; ties go to the upper cell.
fn nearest<'c, 'a>(cells: &'c [Cell<'a>], y: f32, cutoff: Option<f32>) -> Option<&'c Cell<'a>> {
    cells
        .iter()
        .min_by(|a, b| (a.center_y - y).abs().total_cmp(&(b.center_y - y).abs()))
        .filter(|c| cutoff.is_none_or(|d| (c.center_y - y).abs() <= d))
}

/// Template index for a detected Min text, by exact text or numeric value.
fn marker_index(text: &str, rows: &[RowTemplate]) -> Option<usize> {
    rows.iter().position(|r| r.min == text).or_else(|| {
        let value = numeric_value(text)?;
        rows.iter().position(|r| numeric_value(&r.min) == Some(value))
    })
}

fn numeric_value(text: &str) -> Option<f64> {
    let text = text.trim();
    if !NUMERIC_MARKER.is_match(text) {
        return None;
    }
    text.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Ascending by numeric Min; non-numeric markers sort last.
fn sort_rows(mut rows: Vec<TableRow>) -> Vec<TableRow> {
    rows.sort_by(|a, b| sort_key(&a.min).total_cmp(&sort_key(&b.min)));
    rows
}

fn sort_key(marker: &str) -> f64 {
    numeric_value(marker).unwrap_or(f64::INFINITY)
}
