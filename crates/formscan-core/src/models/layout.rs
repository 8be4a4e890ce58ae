//! Form layout description: where fields and table columns are printed.
//!
//! A layout is tuned to one physical form and is read-only once an
//! [`Extractor`](crate::Extractor) has been built from it.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ocr::BoundingBox;

/// Inclusive tolerance range for one box edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub min: f32,
    pub max: f32,
}

impl Span {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    fn intersects(&self, other: &Span) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// Independent tolerance ranges for each edge of a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxWindow {
    pub x_min: Span,
    pub x_max: Span,
    pub y_min: Span,
    pub y_max: Span,
}

impl BoxWindow {
    pub const fn new(x_min: Span, x_max: Span, y_min: Span, y_max: Span) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// True when every edge of `bbox` falls inside its range.
    pub fn contains(&self, bbox: &BoundingBox) -> bool {
        self.x_min.contains(bbox.x_min)
            && self.x_max.contains(bbox.x_max)
            && self.y_min.contains(bbox.y_min)
            && self.y_max.contains(bbox.y_max)
    }

    /// True when some box could satisfy both windows.
    pub fn overlaps(&self, other: &BoxWindow) -> bool {
        self.x_min.intersects(&other.x_min)
            && self.x_max.intersects(&other.x_max)
            && self.y_min.intersects(&other.y_min)
            && self.y_max.intersects(&other.y_max)
    }

    fn spans(&self) -> [(&'static str, &Span); 4] {
        [
            ("x_min", &self.x_min),
            ("x_max", &self.x_max),
            ("y_min", &self.y_min),
            ("y_max", &self.y_max),
        ]
    }
}

/// Tolerance window identifying one table column.
pub type ColumnSpec = BoxWindow;

/// Declarative description of one singleton field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Output key in the extraction result.
    pub name: String,

    /// Printed caption next to the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_label: Option<String>,

    /// Where the value token is expected to be.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_box: Option<BoxWindow>,

    /// Value text previously observed to be stable for this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_literal: Option<String>,

    /// Value used when no strategy matches.
    pub fallback_value: String,

    /// Distance in stream positions from the anchor to the value (default 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjacency_offset: Option<i32>,

    /// Sanity window the token next to the anchor must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_window: Option<BoxWindow>,

    /// Regex over layout block content; capture group 1 is the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_pattern: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, fallback_value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            anchor_label: None,
            expected_box: None,
            known_literal: None,
            fallback_value: fallback_value.into(),
            adjacency_offset: None,
            anchor_window: None,
            block_pattern: None,
        }
    }

    pub fn with_anchor(mut self, label: impl Into<String>, offset: i32) -> Self {
        self.anchor_label = Some(label.into());
        self.adjacency_offset = Some(offset);
        self
    }

    pub fn with_anchor_window(mut self, window: BoxWindow) -> Self {
        self.anchor_window = Some(window);
        self
    }

    pub fn with_expected_box(mut self, window: BoxWindow) -> Self {
        self.expected_box = Some(window);
        self
    }

    pub fn with_known_literal(mut self, literal: impl Into<String>) -> Self {
        self.known_literal = Some(literal.into());
        self
    }

    pub fn with_block_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.block_pattern = Some(pattern.into());
        self
    }

    /// Effective anchor offset.
    pub fn offset(&self) -> i32 {
        self.adjacency_offset.unwrap_or(1)
    }
}

/// Canonical contents of one table row, keyed by its Min marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowTemplate {
    pub min: String,
    pub max: String,
    pub count: String,
}

impl RowTemplate {
    pub fn new(min: impl Into<String>, max: impl Into<String>, count: impl Into<String>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
            count: count.into(),
        }
    }
}

/// Spatial description of the bin table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableLayout {
    pub min_column: ColumnSpec,
    pub max_column: ColumnSpec,
    pub count_column: ColumnSpec,

    /// Closed set of expected rows.
    pub rows: Vec<RowTemplate>,

    /// Largest vertical center distance accepted by the row join.
    /// `None` joins to the nearest candidate however far away it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_join_distance: Option<f32>,
}

// Table band of the label scan, in pixels.
const TABLE_TOP: Span = Span::new(180.0, 720.0);
const TABLE_BOTTOM: Span = Span::new(190.0, 740.0);

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            min_column: BoxWindow::new(
                Span::new(60.0, 130.0),
                Span::new(100.0, 200.0),
                TABLE_TOP,
                TABLE_BOTTOM,
            ),
            max_column: BoxWindow::new(
                Span::new(220.0, 290.0),
                Span::new(260.0, 360.0),
                TABLE_TOP,
                TABLE_BOTTOM,
            ),
            count_column: BoxWindow::new(
                Span::new(380.0, 460.0),
                Span::new(400.0, 520.0),
                TABLE_TOP,
                TABLE_BOTTOM,
            ),
            rows: vec![
                RowTemplate::new("0.100", "0.200", "0"),
                RowTemplate::new("0.200", "0.300", "6"),
                RowTemplate::new("0.300", "1.000", "12"),
                RowTemplate::new("1.000", "2.000", "3"),
                RowTemplate::new("2.000", "3.000", "0"),
                RowTemplate::new("3.000", "Max", "1"),
            ],
            max_join_distance: None,
        }
    }
}

/// Complete layout of one form: singleton fields plus the bin table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormLayout {
    pub fields: Vec<FieldSpec>,
    pub table: TableLayout,
}

// Header area above the table where captions and their values are printed.
const HEADER_BAND: BoxWindow = BoxWindow::new(
    Span::new(100.0, 700.0),
    Span::new(150.0, 900.0),
    Span::new(0.0, 170.0),
    Span::new(0.0, 180.0),
);

impl Default for FormLayout {
    fn default() -> Self {
        Self {
            fields: vec![
                FieldSpec::new("recipe", "IP PR")
                    .with_expected_box(BoxWindow::new(
                        Span::new(180.0, 240.0),
                        Span::new(250.0, 380.0),
                        Span::new(30.0, 70.0),
                        Span::new(55.0, 100.0),
                    ))
                    .with_known_literal("IP PR")
                    .with_anchor("Recipe", 2)
                    .with_anchor_window(HEADER_BAND)
                    .with_block_pattern(r"Recipe\s+([A-Z]+\s+[A-Z]+)"),
                FieldSpec::new("badge_number", "SV2-250113-0370")
                    .with_expected_box(BoxWindow::new(
                        Span::new(180.0, 240.0),
                        Span::new(300.0, 460.0),
                        Span::new(90.0, 130.0),
                        Span::new(115.0, 160.0),
                    ))
                    .with_anchor("BadgeNo.", 1)
                    .with_anchor_window(HEADER_BAND)
                    .with_block_pattern(r"BadgeNo\.\s+([A-Z0-9\-]+)"),
            ],
            table: TableLayout::default(),
        }
    }
}

/// Keys the record and its CSV export use for the table.
pub const RESERVED_FIELD_NAMES: [&str; 4] = ["table", "min", "max", "count"];

impl FormLayout {
    /// Check the layout for configuration mistakes.
    ///
    /// Returns human-readable issues; an empty list means the layout is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        let mut names = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                issues.push("Field with empty name".to_string());
            } else if RESERVED_FIELD_NAMES.contains(&field.name.as_str()) {
                issues.push(format!(
                    "Field name {} is reserved for the table output",
                    field.name
                ));
            } else if !names.insert(field.name.as_str()) {
                issues.push(format!("Duplicate field name: {}", field.name));
            }

            let windows = [
                ("expected_box", field.expected_box.as_ref()),
                ("anchor_window", field.anchor_window.as_ref()),
            ];
            for (label, window) in windows {
                if let Some(window) = window {
                    check_window(&mut issues, &format!("{}.{}", field.name, label), window);
                }
            }

            if let Some(pattern) = &field.block_pattern {
                match Regex::new(pattern) {
                    Ok(re) if re.captures_len() < 2 => issues.push(format!(
                        "{}.block_pattern has no capture group",
                        field.name
                    )),
                    Ok(_) => {}
                    Err(e) => issues.push(format!("{}.block_pattern is invalid: {}", field.name, e)),
                }
            }

            if field.anchor_label.is_some() && field.offset() == 0 {
                issues.push(format!("{}.adjacency_offset of 0 points at the anchor itself", field.name));
            }
        }

        let table = &self.table;
        let columns = [
            ("min_column", &table.min_column),
            ("max_column", &table.max_column),
            ("count_column", &table.count_column),
        ];
        for (label, window) in columns {
            check_window(&mut issues, &format!("table.{}", label), window);
        }
        for (i, (a_label, a)) in columns.iter().enumerate() {
            for (b_label, b) in &columns[i + 1..] {
                if a.overlaps(b) {
                    issues.push(format!("table.{} overlaps table.{}", a_label, b_label));
                }
            }
        }

        if table.rows.is_empty() {
            issues.push("Table has no row templates".to_string());
        }
        let mut markers = HashSet::new();
        for row in &table.rows {
            if !markers.insert(row.min.as_str()) {
                issues.push(format!("Duplicate row marker: {}", row.min));
            }
        }

        if let Some(distance) = table.max_join_distance {
            if distance.is_nan() || distance < 0.0 {
                issues.push(format!("table.max_join_distance must be non-negative, got {}", distance));
            }
        }

        issues
    }
}

fn check_window(issues: &mut Vec<String>, label: &str, window: &BoxWindow) {
    for (edge, span) in window.spans() {
        if span.min.is_nan() || span.max.is_nan() || span.min > span.max {
            issues.push(format!(
                "{}.{} range is empty ({} > {})",
                label, edge, span.min, span.max
            ));
        }
    }
}
