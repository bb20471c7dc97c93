// Polygon capture surface
//
// Turns pointer input into committed land plots. Everything here is
// synchronous and owned by a single caller; there is no I/O.

use crate::surface::color::Color;
use crate::surface::geometry::{contains_point, vertex_centroid};
use crate::surface::render::Canvas;
use crate::surface::types::{plot_label, Plot, Point, SketchState, SurfaceInputs};

/// Alpha applied to a plot's stroke color when filling it
pub const FILL_ALPHA: u8 = 0x40;
pub const STROKE_WIDTH: f64 = 2.0;
const LABEL_COLOR: Color = Color::rgb(0x21, 0x21, 0x21);

/// Invoked once per committed plot, after it has been appended
pub type PlotCallback = Box<dyn FnMut(&Plot) + Send>;

pub struct CaptureSurface {
    width: u32,
    height: u32,
    inputs: SurfaceInputs,
    in_progress: Vec<Point>,
    dragging: bool,
    plots: Vec<Plot>,
    /// Bumped on every change that requires a redraw
    revision: u64,
    on_plot_completed: Option<PlotCallback>,
}

impl std::fmt::Debug for CaptureSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("inputs", &self.inputs)
            .field("in_progress", &self.in_progress)
            .field("dragging", &self.dragging)
            .field("plots", &self.plots.len())
            .field("revision", &self.revision)
            .finish()
    }
}

impl CaptureSurface {
    pub fn new(width: u32, height: u32, inputs: SurfaceInputs) -> Self {
        Self {
            width,
            height,
            inputs,
            in_progress: Vec::new(),
            dragging: false,
            plots: Vec::new(),
            revision: 0,
            on_plot_completed: None,
        }
    }

    /// Seeds the committed list, e.g. from plots restored off disk.
    pub fn with_plots(mut self, plots: Vec<Plot>) -> Self {
        self.plots = plots;
        self
    }

    pub fn on_plot_completed(mut self, callback: impl FnMut(&Plot) + Send + 'static) -> Self {
        self.on_plot_completed = Some(Box::new(callback));
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn inputs(&self) -> &SurfaceInputs {
        &self.inputs
    }

    pub fn in_progress(&self) -> &[Point] {
        &self.in_progress
    }

    pub fn plots(&self) -> &[Plot] {
        &self.plots
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn state(&self) -> SketchState {
        SketchState::from_len(self.in_progress.len())
    }

    /// Replaces all caller inputs at once.
    pub fn set_inputs(&mut self, inputs: SurfaceInputs) {
        self.set_drawing_enabled(inputs.drawing_enabled);
        self.set_active(inputs.category, inputs.color);
    }

    /// Leaving drawing mode keeps the in-progress sketch; only the drag
    /// gesture is dropped.
    pub fn set_drawing_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.dragging = false;
        }
        self.inputs.drawing_enabled = enabled;
    }

    /// Sets the category and color used for the next commit. Already
    /// committed plots keep the color they were created with.
    pub fn set_active(&mut self, category: String, color: Color) {
        if self.inputs.color != color {
            // The in-progress path is drawn in the active color
            self.revision += 1;
        }
        self.inputs.category = category;
        self.inputs.color = color;
    }

    /// Primary press. A press with `click_count >= 2` commits when three or
    /// more points were already placed, and its own position is not added.
    /// Any other press appends a vertex and starts a drag.
    ///
    /// Returns the committed plot, if any.
    pub fn pointer_down(&mut self, point: Point, click_count: u32) -> Option<Plot> {
        if !self.inputs.drawing_enabled {
            return None;
        }

        if click_count >= 2 && self.in_progress.len() >= 3 {
            self.dragging = false;
            return self.commit();
        }

        self.in_progress.push(point);
        self.dragging = true;
        self.revision += 1;
        None
    }

    /// Moves the last vertex while the pointer is held down.
    pub fn pointer_move(&mut self, point: Point) {
        if !self.inputs.drawing_enabled || !self.dragging {
            return;
        }
        if let Some(last) = self.in_progress.last_mut() {
            *last = point;
            self.revision += 1;
        }
    }

    pub fn pointer_up(&mut self) {
        if !self.inputs.drawing_enabled {
            return;
        }
        self.dragging = false;
    }

    /// Removes the most recent in-progress point. No-op when empty.
    pub fn undo_last_point(&mut self) -> Option<Point> {
        let removed = self.in_progress.pop();
        if removed.is_some() {
            self.dragging = false;
            self.revision += 1;
        }
        removed
    }

    /// Commits the in-progress points as a new plot labelled from the active
    /// category and the current plot count. Fewer than three points leave
    /// everything untouched.
    pub fn commit(&mut self) -> Option<Plot> {
        if self.in_progress.len() < 3 {
            return None;
        }

        let label = plot_label(&self.inputs.category, self.plots.len() + 1);
        let vertices = std::mem::take(&mut self.in_progress);
        let plot = Plot::new(
            label,
            self.inputs.category.clone(),
            self.inputs.color,
            vertices,
        )?;

        self.plots.push(plot.clone());
        self.revision += 1;

        tracing::debug!(
            "Committed {} with {} vertices",
            plot.label(),
            plot.vertices().len()
        );

        if let Some(callback) = self.on_plot_completed.as_mut() {
            callback(&plot);
        }

        Some(plot)
    }

    /// Topmost committed plot containing `point`
    pub fn plot_at(&self, point: Point) -> Option<&Plot> {
        self.plots
            .iter()
            .rev()
            .find(|plot| contains_point(plot.vertices(), point))
    }

    /// Full redraw: committed plots, their labels, then the open sketch.
    pub fn render<C: Canvas>(&self, canvas: &mut C) {
        canvas.clear(self.width, self.height);

        for plot in &self.plots {
            let color = plot.stroke_color();
            canvas.fill_polygon(plot.vertices(), color.with_alpha(FILL_ALPHA));
            canvas.stroke_path(plot.vertices(), color.with_alpha(255), STROKE_WIDTH, true);
        }

        for plot in &self.plots {
            if let Some(center) = vertex_centroid(plot.vertices()) {
                canvas.fill_text(plot.category(), center, LABEL_COLOR);
            }
        }

        if self.in_progress.len() >= 2 {
            canvas.stroke_path(&self.in_progress, self.inputs.color, STROKE_WIDTH, false);
        }
    }
}
