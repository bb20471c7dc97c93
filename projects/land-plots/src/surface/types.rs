// Surface data model
//
// Plots are the committed polygons; everything here is serialized as-is
// into plots.json and the HTTP snapshots.

use crate::surface::color::Color;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A 2D point in surface-local pixel coordinates (origin top-left)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// A committed land plot. Fields are private so the vertex list cannot be
/// changed after commit, and deserialization goes through the same
/// three-vertex check as [`Plot::new`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "PlotRecord")]
pub struct Plot {
    id: String,
    label: String,
    category: String,
    stroke_color: Color,
    vertices: Vec<Point>,
    created_at: DateTime<Utc>,
}

impl Plot {
    /// Builds a plot from a finished sketch. Returns `None` for fewer than
    /// three vertices.
    pub fn new(
        label: String,
        category: String,
        stroke_color: Color,
        vertices: Vec<Point>,
    ) -> Option<Self> {
        if vertices.len() < 3 {
            return None;
        }
        Some(Self {
            id: uuid::Uuid::new_v4().to_string(),
            label,
            category,
            stroke_color,
            vertices,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn stroke_color(&self) -> Color {
        self.stroke_color
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Wire form of a plot, checked before it becomes a [`Plot`]
#[derive(Deserialize)]
struct PlotRecord {
    id: String,
    label: String,
    category: String,
    stroke_color: Color,
    vertices: Vec<Point>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PlotRecord> for Plot {
    type Error = String;

    fn try_from(record: PlotRecord) -> Result<Self, Self::Error> {
        if record.vertices.len() < 3 {
            return Err(format!(
                "plot {} has {} vertices, at least 3 required",
                record.id,
                record.vertices.len()
            ));
        }
        Ok(Self {
            id: record.id,
            label: record.label,
            category: record.category,
            stroke_color: record.stroke_color,
            vertices: record.vertices,
            created_at: record.created_at,
        })
    }
}

/// Label given to the Nth (1-indexed) plot of a drawing session.
pub fn plot_label(category: &str, sequence: usize) -> String {
    format!("{} Plot {}", category, sequence)
}

/// Caller-supplied inputs of a capture surface
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SurfaceInputs {
    pub category: String,
    pub color: Color,
    pub drawing_enabled: bool,
}

impl Default for SurfaceInputs {
    fn default() -> Self {
        let crop = CropType::Corn;
        Self {
            category: crop.label().to_string(),
            color: crop.color(),
            drawing_enabled: false,
        }
    }
}

/// Sketch progress, derived from the in-progress vertex count
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SketchState {
    /// No in-progress points
    Idle,
    /// One or two points, not yet a closed shape
    Sketching,
    /// Three or more points, eligible for commit
    Ready,
}

impl SketchState {
    pub fn from_len(len: usize) -> Self {
        match len {
            0 => SketchState::Idle,
            1 | 2 => SketchState::Sketching,
            _ => SketchState::Ready,
        }
    }
}

/// Known crop classifications and their display colors
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CropType {
    Corn,
    Wheat,
    Rice,
    Soybean,
    Vegetables,
    Fruits,
    Pasture,
    Fallow,
}

impl CropType {
    pub const ALL: [CropType; 8] = [
        CropType::Corn,
        CropType::Wheat,
        CropType::Rice,
        CropType::Soybean,
        CropType::Vegetables,
        CropType::Fruits,
        CropType::Pasture,
        CropType::Fallow,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CropType::Corn => "Corn",
            CropType::Wheat => "Wheat",
            CropType::Rice => "Rice",
            CropType::Soybean => "Soybean",
            CropType::Vegetables => "Vegetables",
            CropType::Fruits => "Fruits",
            CropType::Pasture => "Pasture",
            CropType::Fallow => "Fallow",
        }
    }

    pub fn color(self) -> Color {
        match self {
            CropType::Corn => Color::rgb(0xF5, 0xC2, 0x42),
            CropType::Wheat => Color::rgb(0xD9, 0xA4, 0x41),
            CropType::Rice => Color::rgb(0x7C, 0xB3, 0x42),
            CropType::Soybean => Color::rgb(0x55, 0x8B, 0x2F),
            CropType::Vegetables => Color::rgb(0x2E, 0x7D, 0x32),
            CropType::Fruits => Color::rgb(0xE5, 0x39, 0x35),
            CropType::Pasture => Color::rgb(0x9C, 0xCC, 0x65),
            CropType::Fallow => Color::rgb(0x8D, 0x6E, 0x63),
        }
    }

    /// Looks up a crop by label, ignoring case.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|crop| crop.label().eq_ignore_ascii_case(label.trim()))
    }
}
