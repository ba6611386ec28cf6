//! Confusion-matrix and validation-score heatmaps rendered to PNG

use crate::core::{Result, SVMError};
use plotters::prelude::*;
use std::fmt::Display;
use std::path::Path;

const PLOT_SIZE: (u32, u32) = (900, 700);
const COLORBAR_WIDTH: u32 = 130;

/// Piecewise-linear map sending `vmin`, `midpoint` and `vmax` to 0, 0.5, 1
///
/// Values outside `[vmin, vmax]` are clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidpointNormalize {
    pub vmin: f64,
    pub midpoint: f64,
    pub vmax: f64,
}

impl MidpointNormalize {
    pub fn new(vmin: f64, midpoint: f64, vmax: f64) -> Self {
        Self {
            vmin,
            midpoint,
            vmax,
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        if value <= self.vmin {
            0.0
        } else if value < self.midpoint {
            0.5 * (value - self.vmin) / (self.midpoint - self.vmin)
        } else if self.vmax > self.midpoint {
            (0.5 + 0.5 * (value - self.midpoint) / (self.vmax - self.midpoint)).min(1.0)
        } else {
            0.5
        }
    }
}

/// Linear map of `[vmin, vmax]` onto `[0, 1]`
fn linear_normalize(vmin: f64, vmax: f64) -> impl Fn(f64) -> f64 {
    move |v| {
        if vmax > vmin {
            ((v - vmin) / (vmax - vmin)).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Sequential white-to-dark-blue colormap
pub fn blues(t: f64) -> RGBColor {
    const ANCHORS: [(u8, u8, u8); 9] = [
        (247, 251, 255),
        (222, 235, 247),
        (198, 219, 239),
        (158, 202, 225),
        (107, 174, 214),
        (66, 146, 198),
        (33, 113, 181),
        (8, 81, 156),
        (8, 48, 107),
    ];
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let pos = t * (ANCHORS.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(ANCHORS.len() - 1);
    let frac = pos - lo as f64;
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
    RGBColor(
        mix(ANCHORS[lo].0, ANCHORS[hi].0),
        mix(ANCHORS[lo].1, ANCHORS[hi].1),
        mix(ANCHORS[lo].2, ANCHORS[hi].2),
    )
}

/// Black-red-yellow-white colormap
pub fn hot(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let channel = |start: f64, end: f64| {
        (((t - start) / (end - start)).clamp(0.0, 1.0) * 255.0).round() as u8
    };
    RGBColor(
        channel(-0.0416, 0.365),
        channel(0.365, 0.746),
        channel(0.746, 1.0),
    )
}

/// Compact tick label for grid values
pub fn format_tick(value: f64) -> String {
    if value != 0.0 && value.abs() < 0.01 {
        format!("{value:.1e}")
    } else {
        let s = format!("{value:.3}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn plot_err<E: Display>(e: E) -> SVMError {
    SVMError::PlotError(e.to_string())
}

struct Heatmap<'a> {
    title: &'a str,
    values: &'a [Vec<f64>],
    x_labels: Vec<String>,
    y_labels: Vec<String>,
    x_desc: &'a str,
    y_desc: &'a str,
    vmin: f64,
    vmax: f64,
}

impl Heatmap<'_> {
    /// Row 0 is drawn at the top, like an image
    fn draw<N, C>(&self, path: &Path, normalize: N, colormap: C) -> Result<()>
    where
        N: Fn(f64) -> f64,
        C: Fn(f64) -> RGBColor,
    {
        let n_rows = self.values.len() as u32;
        let n_cols = self.values.first().map(Vec::len).unwrap_or(0) as u32;
        if n_rows == 0 || n_cols == 0 {
            return Err(SVMError::PlotError("Nothing to plot".to_string()));
        }

        let root = BitMapBackend::new(path, PLOT_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;
        let (main, bar_area) = root.split_horizontally(PLOT_SIZE.0 - COLORBAR_WIDTH);

        let mut chart = ChartBuilder::on(&main)
            .caption(self.title, ("sans-serif", 22))
            .margin(15)
            .x_label_area_size(80)
            .y_label_area_size(110)
            .build_cartesian_2d((0u32..n_cols).into_segmented(), (0u32..n_rows).into_segmented())
            .map_err(plot_err)?;

        let x_labels = &self.x_labels;
        let y_labels = &self.y_labels;
        let x_fmt = |v: &SegmentValue<u32>| match v {
            SegmentValue::CenterOf(i) => x_labels.get(*i as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        };
        let y_fmt = |v: &SegmentValue<u32>| match v {
            SegmentValue::CenterOf(i) if *i < n_rows => y_labels
                .get((n_rows - 1 - *i) as usize)
                .cloned()
                .unwrap_or_default(),
            _ => String::new(),
        };

        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(n_cols as usize)
            .y_labels(n_rows as usize)
            .x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt)
            .x_desc(self.x_desc)
            .y_desc(self.y_desc)
            .draw()
            .map_err(plot_err)?;

        chart
            .draw_series(self.values.iter().enumerate().flat_map(|(r, row)| {
                let y = n_rows - 1 - r as u32;
                let colors: Vec<RGBColor> = row.iter().map(|&v| colormap(normalize(v))).collect();
                colors.into_iter().enumerate().map(move |(c, color)| {
                    let x = c as u32;
                    Rectangle::new(
                        [
                            (SegmentValue::Exact(x), SegmentValue::Exact(y)),
                            (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1)),
                        ],
                        color.filled(),
                    )
                })
            }))
            .map_err(plot_err)?;

        let (lo, hi) = if self.vmax > self.vmin {
            (self.vmin, self.vmax)
        } else {
            (self.vmin, self.vmin + 1.0)
        };
        let mut bar = ChartBuilder::on(&bar_area)
            .margin_top(50)
            .margin_bottom(95)
            .margin_right(15)
            .y_label_area_size(55)
            .build_cartesian_2d(0f64..1f64, lo..hi)
            .map_err(plot_err)?;
        bar.configure_mesh()
            .disable_mesh()
            .disable_x_axis()
            .y_labels(6)
            .y_label_formatter(&|v: &f64| format_tick(*v))
            .draw()
            .map_err(plot_err)?;

        const STEPS: usize = 100;
        let step = (hi - lo) / STEPS as f64;
        bar.draw_series((0..STEPS).map(|i| {
            let y0 = lo + step * i as f64;
            Rectangle::new(
                [(0.0, y0), (1.0, y0 + step)],
                colormap(normalize(y0 + step / 2.0)).filled(),
            )
        }))
        .map_err(plot_err)?;

        root.present().map_err(plot_err)?;
        Ok(())
    }
}

/// Confusion matrix image with technique names on both axes
///
/// Works for raw counts and row-normalized matrices alike.
pub fn plot_confusion_matrix<P: AsRef<Path>>(
    values: &[Vec<f64>],
    class_names: &[String],
    title: &str,
    path: P,
) -> Result<()> {
    let vmax = values.iter().flatten().copied().fold(0.0, f64::max);
    let heatmap = Heatmap {
        title,
        values,
        x_labels: class_names.to_vec(),
        y_labels: class_names.to_vec(),
        x_desc: "Predicted label",
        y_desc: "True label",
        vmin: 0.0,
        vmax,
    };
    heatmap.draw(path.as_ref(), linear_normalize(0.0, vmax), blues)
}

/// Mean validation score over the (gamma, C) grid
///
/// `scores[i][j]` belongs to `c_range[i]` and `gamma_range[j]`.
pub fn plot_validation_heatmap<P: AsRef<Path>>(
    scores: &[Vec<f64>],
    c_range: &[f64],
    gamma_range: &[f64],
    path: P,
) -> Result<()> {
    let vmax = scores.iter().flatten().copied().fold(f64::MIN, f64::max);
    let norm = MidpointNormalize::new(0.2, 0.92, vmax);
    let heatmap = Heatmap {
        title: "Validation accuracy",
        values: scores,
        x_labels: gamma_range.iter().map(|&g| format_tick(g)).collect(),
        y_labels: c_range.iter().map(|&c| format_tick(c)).collect(),
        x_desc: "gamma",
        y_desc: "C",
        vmin: 0.2,
        vmax,
    };
    heatmap.draw(path.as_ref(), |v| norm.apply(v), hot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_midpoint_normalize() {
        let norm = MidpointNormalize::new(0.2, 0.92, 1.0);
        assert_eq!(norm.apply(0.1), 0.0);
        assert_abs_diff_eq!(norm.apply(0.56), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(norm.apply(0.92), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(norm.apply(0.96), 0.75, epsilon = 1e-12);
        assert_eq!(norm.apply(1.5), 1.0);
    }

    #[test]
    fn test_midpoint_with_low_maximum() {
        let norm = MidpointNormalize::new(0.2, 0.92, 0.8);
        assert!(norm.apply(0.8) < 0.5);
        assert_eq!(norm.apply(0.95), 0.5);
    }

    #[test]
    fn test_colormap_ends() {
        assert_eq!(blues(0.0), RGBColor(247, 251, 255));
        assert_eq!(blues(1.0), RGBColor(8, 48, 107));
        assert_eq!(blues(f64::NAN), blues(0.0));
        assert_eq!(hot(1.0), RGBColor(255, 255, 255));
        assert_eq!(hot(0.5).2, 0);
        assert_eq!(hot(0.5).0, 255);
    }

    #[test]
    fn test_format_tick() {
        assert_eq!(format_tick(0.25), "0.25");
        assert_eq!(format_tick(32.0), "32");
        assert_eq!(format_tick(0.0009765625), "9.8e-4");
        assert_eq!(format_tick(0.0), "0");
    }

    #[test]
    fn test_empty_heatmap_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = plot_confusion_matrix(&[], &[], "Confusion matrix", dir.path().join("cm.png"));
        assert!(matches!(result, Err(SVMError::PlotError(_))));
    }
}
