//! SVG heatmap of one attention matrix.
//!
//! Cells are laid out in pixel space directly on the drawing area so every
//! tick label sits on the centre of its row or column. Rows (queries) run
//! top to bottom, columns (keys) left to right, and a colour bar on the right
//! shows the score range.

use attnscope_core::ViewConfig;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::attention::AttentionMatrix;
use crate::error::{MlError, Result};
use crate::palette::{luminance, normalize, viridis};

const FONT: &str = "sans-serif";
const LABEL_FONT_SIZE: i32 = 13;
const TITLE_FONT_SIZE: i32 = 18;
const TITLE_AREA: i32 = 44;
const AXIS_TITLE_AREA: i32 = 26;
const LABEL_GAP: i32 = 6;
const COLORBAR_AREA: i32 = 90;
const COLORBAR_WIDTH: i32 = 18;
const COLORBAR_STEPS: i32 = 64;
/// Rough glyph width relative to the font size.
const CHAR_WIDTH: f64 = 0.6;

pub const X_AXIS_TITLE: &str = "Key (attended-to token)";
pub const Y_AXIS_TITLE: &str = "Query (attending token)";

/// Appearance of a rendered heatmap.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapStyle {
    pub width: u32,
    pub height: u32,
    /// Print each score inside its cell.
    pub annotate: bool,
    pub title: Option<String>,
}

impl Default for HeatmapStyle {
    fn default() -> Self {
        Self::from(&ViewConfig::default())
    }
}

impl From<&ViewConfig> for HeatmapStyle {
    fn from(view: &ViewConfig) -> Self {
        Self {
            width: view.width,
            height: view.height,
            annotate: view.annotate,
            title: None,
        }
    }
}

impl HeatmapStyle {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Pixel geometry of the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapLayout {
    pub left: i32,
    pub top: i32,
    pub grid_width: i32,
    pub grid_height: i32,
    pub cells: usize,
}

impl HeatmapLayout {
    /// Fit `cells x cells` squares plus labels into a `width x height` image.
    pub fn compute(cells: usize, longest_label: usize, width: u32, height: u32) -> Result<Self> {
        let label_extent =
            (longest_label as f64 * LABEL_FONT_SIZE as f64 * CHAR_WIDTH).ceil() as i32 + LABEL_GAP;
        let left = AXIS_TITLE_AREA + label_extent;
        let top = TITLE_AREA;
        let grid_width = width as i32 - left - COLORBAR_AREA;
        let grid_height = height as i32 - top - label_extent - AXIS_TITLE_AREA;

        if cells == 0 {
            return Err(MlError::render("nothing to draw: the matrix is empty"));
        }
        if grid_width < cells as i32 || grid_height < cells as i32 {
            return Err(MlError::render(format!(
                "{width}x{height} is too small for {cells} tokens"
            )));
        }

        Ok(Self {
            left,
            top,
            grid_width,
            grid_height,
            cells,
        })
    }

    /// Pixel rectangle of cell `(row, col)`, edges shared with neighbours.
    pub fn cell_rect(&self, row: usize, col: usize) -> ((i32, i32), (i32, i32)) {
        let x = |c: usize| self.left + (c as i64 * self.grid_width as i64 / self.cells as i64) as i32;
        let y = |r: usize| self.top + (r as i64 * self.grid_height as i64 / self.cells as i64) as i32;
        ((x(col), y(row)), (x(col + 1), y(row + 1)))
    }

    pub fn column_center(&self, col: usize) -> i32 {
        let ((x0, _), (x1, _)) = self.cell_rect(0, col);
        (x0 + x1) / 2
    }

    pub fn row_center(&self, row: usize) -> i32 {
        let ((_, y0), (_, y1)) = self.cell_rect(row, 0);
        (y0 + y1) / 2
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.grid_height
    }

    pub fn right(&self) -> i32 {
        self.left + self.grid_width
    }
}

fn draw_err<E: std::fmt::Display>(err: E) -> MlError {
    MlError::render(err.to_string())
}

fn text_style(size: i32, color: &RGBColor, pos: Pos) -> TextStyle<'_> {
    TextStyle::from((FONT, size).into_font())
        .color(color)
        .pos(pos)
}

/// Render `matrix` with `tokens` on both axes as an SVG document.
pub fn render_svg(matrix: &AttentionMatrix, tokens: &[String], style: &HeatmapStyle) -> Result<String> {
    if tokens.len() != matrix.size() {
        return Err(MlError::render(format!(
            "{} labels for a {n}x{n} matrix",
            tokens.len(),
            n = matrix.size()
        )));
    }
    let longest = tokens.iter().map(|t| t.chars().count()).max().unwrap_or(0);
    let layout = HeatmapLayout::compute(matrix.size(), longest, style.width, style.height)?;
    let (min, max) = matrix.min_max();

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (style.width, style.height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let ink = RGBColor(33, 37, 41);
        let light = RGBColor(250, 250, 250);

        if let Some(title) = &style.title {
            root.draw(&Text::new(
                title.clone(),
                (style.width as i32 / 2, TITLE_AREA / 2),
                text_style(TITLE_FONT_SIZE, &ink, Pos::new(HPos::Center, VPos::Center)),
            ))
            .map_err(draw_err)?;
        }

        for row in 0..matrix.size() {
            for col in 0..matrix.size() {
                let value = matrix.get(row, col);
                let color = viridis(normalize(value, min, max));
                let (top_left, bottom_right) = layout.cell_rect(row, col);
                root.draw(&Rectangle::new([top_left, bottom_right], color.filled()))
                    .map_err(draw_err)?;

                if style.annotate {
                    let fg = if luminance(&color) > 0.5 { &ink } else { &light };
                    root.draw(&Text::new(
                        format!("{value:.2}"),
                        (layout.column_center(col), layout.row_center(row)),
                        text_style(LABEL_FONT_SIZE - 2, fg, Pos::new(HPos::Center, VPos::Center)),
                    ))
                    .map_err(draw_err)?;
                }
            }
        }

        for (i, token) in tokens.iter().enumerate() {
            root.draw(&Text::new(
                token.clone(),
                (layout.left - LABEL_GAP, layout.row_center(i)),
                text_style(LABEL_FONT_SIZE, &ink, Pos::new(HPos::Right, VPos::Center)),
            ))
            .map_err(draw_err)?;

            let vertical = TextStyle::from(
                (FONT, LABEL_FONT_SIZE)
                    .into_font()
                    .transform(FontTransform::Rotate90),
            )
            .color(&ink)
            .pos(Pos::new(HPos::Left, VPos::Center));
            root.draw(&Text::new(
                token.clone(),
                (layout.column_center(i), layout.bottom() + LABEL_GAP),
                vertical,
            ))
            .map_err(draw_err)?;
        }

        root.draw(&Text::new(
            X_AXIS_TITLE,
            (layout.left + layout.grid_width / 2, style.height as i32 - AXIS_TITLE_AREA / 2),
            text_style(LABEL_FONT_SIZE, &ink, Pos::new(HPos::Center, VPos::Center)),
        ))
        .map_err(draw_err)?;

        let y_title = TextStyle::from(
            (FONT, LABEL_FONT_SIZE)
                .into_font()
                .transform(FontTransform::Rotate270),
        )
        .color(&ink)
        .pos(Pos::new(HPos::Center, VPos::Center));
        root.draw(&Text::new(
            Y_AXIS_TITLE,
            (AXIS_TITLE_AREA / 2, layout.top + layout.grid_height / 2),
            y_title,
        ))
        .map_err(draw_err)?;

        draw_colorbar(&root, &layout, min, max, &ink)?;

        root.present().map_err(draw_err)?;
    }
    Ok(svg)
}

fn draw_colorbar<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    layout: &HeatmapLayout,
    min: f32,
    max: f32,
    ink: &RGBColor,
) -> Result<()> {
    let x0 = layout.right() + 20;
    let x1 = x0 + COLORBAR_WIDTH;
    let height = layout.grid_height;

    for step in 0..COLORBAR_STEPS {
        // step 0 is the top of the bar, i.e. the maximum
        let t = 1.0 - (step as f32 + 0.5) / COLORBAR_STEPS as f32;
        let y0 = layout.top + step * height / COLORBAR_STEPS;
        let y1 = layout.top + (step + 1) * height / COLORBAR_STEPS;
        root.draw(&Rectangle::new([(x0, y0), (x1, y1)], viridis(t).filled()))
            .map_err(draw_err)?;
    }
    root.draw(&Rectangle::new(
        [(x0, layout.top), (x1, layout.bottom())],
        ink.stroke_width(1),
    ))
    .map_err(draw_err)?;

    let ticks = [(max, layout.top), ((min + max) / 2.0, layout.top + height / 2), (min, layout.bottom())];
    for (value, y) in ticks {
        root.draw(&Text::new(
            format!("{value:.2}"),
            (x1 + 6, y),
            text_style(LABEL_FONT_SIZE - 1, ink, Pos::new(HPos::Left, VPos::Center)),
        ))
        .map_err(draw_err)?;
    }
    Ok(())
}
