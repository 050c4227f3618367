use std::f64::consts::PI;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::RenderError;
use crate::render::charts::{ChartData, ChartPanel, ChartRenderer, ChartSpec};

const PANEL_WIDTH: f64 = 640.0;
const PANEL_HEIGHT: f64 = 440.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 44.0;
const MARGIN_BOTTOM: f64 = 120.0;
const AXIS_COLOR: &str = "#333333";

/// Renders charts as standalone SVG documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgChartRenderer;

impl SvgChartRenderer {
    pub fn new() -> Self {
        Self
    }

    /// The SVG document for `chart`.
    pub fn to_svg(&self, chart: &ChartSpec) -> String {
        let width = PANEL_WIDTH * chart.panels.len() as f64;
        let mut out = String::new();
        let _ = write!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif" font-size="11">"#,
            w = width,
            h = PANEL_HEIGHT
        );
        let _ = write!(out, r#"<rect width="{}" height="{}" fill="white"/>"#, width, PANEL_HEIGHT);
        for (i, panel) in chart.panels.iter().enumerate() {
            let _ = write!(out, r#"<g transform="translate({},0)">"#, PANEL_WIDTH * i as f64);
            draw_panel(&mut out, panel);
            out.push_str("</g>");
        }
        out.push_str("</svg>\n");
        out
    }
}

impl ChartRenderer for SvgChartRenderer {
    fn render(&self, chart: &ChartSpec, dir: &Path) -> Result<PathBuf, RenderError> {
        if chart.panels.is_empty() {
            return Err(RenderError::EmptyChart {
                chart: chart.file_stem.to_string(),
            });
        }
        let path = dir.join(format!("{}.svg", chart.file_stem));
        fs::write(&path, self.to_svg(chart)).map_err(|source| RenderError::Io {
            chart: chart.file_stem.to_string(),
            source,
        })?;
        debug!(chart = chart.file_stem, path = %path.display(), "Chart written");
        crate::observability::metrics::render::chart_written(chart.file_stem);
        Ok(path)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Plot area in panel coordinates.
struct Frame {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl Frame {
    fn new() -> Self {
        Self {
            left: MARGIN_LEFT,
            top: MARGIN_TOP,
            width: PANEL_WIDTH - MARGIN_LEFT - MARGIN_RIGHT,
            height: PANEL_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM,
        }
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// y coordinate of `value` on a linear scale over [lo, hi].
    fn y(&self, value: f64, lo: f64, hi: f64) -> f64 {
        let span = if hi > lo { hi - lo } else { 1.0 };
        self.bottom() - (value - lo) / span * self.height
    }
}

fn draw_panel(out: &mut String, panel: &ChartPanel) {
    let _ = write!(
        out,
        r#"<text x="{}" y="24" text-anchor="middle" font-size="15" font-weight="bold">{}</text>"#,
        PANEL_WIDTH / 2.0,
        escape(&panel.title)
    );

    if panel.data.is_empty() {
        let _ = write!(
            out,
            r##"<text x="{}" y="{}" text-anchor="middle" fill="#888888">No data</text>"##,
            PANEL_WIDTH / 2.0,
            PANEL_HEIGHT / 2.0
        );
        return;
    }

    let frame = Frame::new();
    match &panel.data {
        ChartData::Bar { labels, values, colors } => {
            let series = vec![(String::new(), values.clone())];
            draw_bars(out, &frame, panel, labels, &series, colors, false, true);
        }
        ChartData::GroupedBar {
            categories,
            series,
            colors,
            stacked,
        } => {
            draw_bars(out, &frame, panel, categories, series, colors, *stacked, false);
            draw_legend(out, &frame, series.iter().map(|(name, _)| name.as_str()), colors);
        }
        ChartData::Pie { labels, values, colors } => draw_pie(out, labels, values, colors),
        ChartData::Histogram { bins, color } => {
            let max = bins.iter().map(|b| b.count).max().unwrap_or(0) as f64;
            draw_axes(out, &frame, panel, 0.0, max);
            let lo = bins.first().map(|b| b.lower).unwrap_or(0.0);
            let hi = bins.last().map(|b| b.upper).unwrap_or(1.0);
            let span = if hi > lo { hi - lo } else { 1.0 };
            for bin in bins {
                let x = frame.left + (bin.lower - lo) / span * frame.width;
                let w = (bin.upper - bin.lower) / span * frame.width;
                let y = frame.y(bin.count as f64, 0.0, max);
                let _ = write!(
                    out,
                    r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" fill-opacity="0.6" stroke="white"/>"#,
                    x,
                    y,
                    w,
                    frame.bottom() - y,
                    color
                );
            }
            for (value, x) in [(lo, frame.left), (hi, frame.left + frame.width)] {
                let _ = write!(
                    out,
                    r#"<text x="{:.2}" y="{:.2}" text-anchor="middle">{:.2}</text>"#,
                    x,
                    frame.bottom() + 16.0,
                    value
                );
            }
        }
        ChartData::Box {
            labels,
            summaries,
            colors,
        } => {
            let lo = summaries
                .iter()
                .flat_map(|s| s.outliers.iter().copied().chain([s.lower_whisker]))
                .fold(f64::INFINITY, f64::min);
            let hi = summaries
                .iter()
                .flat_map(|s| s.outliers.iter().copied().chain([s.upper_whisker]))
                .fold(f64::NEG_INFINITY, f64::max);
            draw_axes(out, &frame, panel, lo, hi);
            let slot = frame.width / labels.len() as f64;
            for (i, (label, summary)) in labels.iter().zip(summaries).enumerate() {
                let center = frame.left + slot * (i as f64 + 0.5);
                let half = slot * 0.3;
                let y = |v: f64| frame.y(v, lo, hi);
                let color = colors.get(i).map(String::as_str).unwrap_or("#999999");
                let _ = write!(
                    out,
                    r#"<line x1="{c:.2}" x2="{c:.2}" y1="{:.2}" y2="{:.2}" stroke="{a}"/><line x1="{c:.2}" x2="{c:.2}" y1="{:.2}" y2="{:.2}" stroke="{a}"/>"#,
                    y(summary.lower_whisker),
                    y(summary.q1),
                    y(summary.q3),
                    y(summary.upper_whisker),
                    c = center,
                    a = AXIS_COLOR
                );
                let _ = write!(
                    out,
                    r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" stroke="{}"/>"#,
                    center - half,
                    y(summary.q3),
                    half * 2.0,
                    (y(summary.q1) - y(summary.q3)).max(1.0),
                    color,
                    AXIS_COLOR
                );
                let _ = write!(
                    out,
                    r#"<line x1="{:.2}" x2="{:.2}" y1="{m:.2}" y2="{m:.2}" stroke="{}" stroke-width="2"/>"#,
                    center - half,
                    center + half,
                    AXIS_COLOR,
                    m = y(summary.median)
                );
                for outlier in &summary.outliers {
                    let _ = write!(
                        out,
                        r#"<circle cx="{:.2}" cy="{:.2}" r="3" fill="none" stroke="{}"/>"#,
                        center,
                        y(*outlier),
                        AXIS_COLOR
                    );
                }
                draw_tick_label(out, &frame, center, label, panel.label_rotation);
            }
        }
    }
}

fn draw_axes(out: &mut String, frame: &Frame, panel: &ChartPanel, lo: f64, hi: f64) {
    let _ = write!(
        out,
        r#"<line x1="{l}" y1="{t}" x2="{l}" y2="{b}" stroke="{c}"/><line x1="{l}" y1="{b}" x2="{r}" y2="{b}" stroke="{c}"/>"#,
        l = frame.left,
        t = frame.top,
        b = frame.bottom(),
        r = frame.left + frame.width,
        c = AXIS_COLOR
    );
    for step in 0..=4 {
        let value = lo + (hi - lo) * step as f64 / 4.0;
        let y = frame.y(value, lo, hi);
        let _ = write!(
            out,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="end">{}</text>"#,
            frame.left - 6.0,
            y + 4.0,
            format_tick(value)
        );
    }
    let _ = write!(
        out,
        r#"<text x="{:.2}" y="{:.2}" text-anchor="middle">{}</text>"#,
        frame.left + frame.width / 2.0,
        PANEL_HEIGHT - 8.0,
        escape(&panel.x_label)
    );
    let _ = write!(
        out,
        r#"<text transform="translate(16,{:.2}) rotate(-90)" text-anchor="middle">{}</text>"#,
        frame.top + frame.height / 2.0,
        escape(&panel.y_label)
    );
}

fn format_tick(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}

fn draw_tick_label(out: &mut String, frame: &Frame, x: f64, label: &str, rotation: u16) {
    let y = frame.bottom() + 14.0;
    let anchor = if rotation == 0 { "middle" } else { "end" };
    let _ = write!(
        out,
        r#"<text x="{x:.2}" y="{y:.2}" text-anchor="{}" transform="rotate(-{} {x:.2} {y:.2})">{}</text>"#,
        anchor,
        rotation,
        escape(label),
        x = x,
        y = y
    );
}

#[allow(clippy::too_many_arguments)]
fn draw_bars(
    out: &mut String,
    frame: &Frame,
    panel: &ChartPanel,
    categories: &[String],
    series: &[(String, Vec<f64>)],
    colors: &[String],
    stacked: bool,
    color_per_category: bool,
) {
    let max = if stacked {
        (0..categories.len())
            .map(|c| series.iter().map(|(_, v)| v.get(c).copied().unwrap_or(0.0)).sum::<f64>())
            .fold(0.0, f64::max)
    } else {
        series.iter().flat_map(|(_, v)| v.iter().copied()).fold(0.0, f64::max)
    };
    draw_axes(out, frame, panel, 0.0, max);

    let slot = frame.width / categories.len() as f64;
    let group = slot * 0.8;
    let bar_width = if stacked || series.is_empty() {
        group
    } else {
        group / series.len() as f64
    };

    for (c, category) in categories.iter().enumerate() {
        let slot_left = frame.left + slot * c as f64 + (slot - group) / 2.0;
        let mut base = 0.0;
        for (s, (_, values)) in series.iter().enumerate() {
            let value = values.get(c).copied().unwrap_or(0.0);
            let color_index = if color_per_category { c } else { s };
            let color = colors.get(color_index).map(String::as_str).unwrap_or("#999999");
            let x = if stacked { slot_left } else { slot_left + bar_width * s as f64 };
            let top = frame.y(base + value, 0.0, max);
            let bottom = frame.y(base, 0.0, max);
            let _ = write!(
                out,
                r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"><title>{}: {}</title></rect>"#,
                x,
                top,
                bar_width,
                bottom - top,
                color,
                escape(category),
                format_tick(value)
            );
            if stacked {
                base += value;
            }
        }
        draw_tick_label(out, frame, frame.left + slot * (c as f64 + 0.5), category, panel.label_rotation);
    }
}

fn draw_legend<'a>(out: &mut String, frame: &Frame, names: impl Iterator<Item = &'a str>, colors: &[String]) {
    for (i, name) in names.enumerate() {
        let y = frame.top + 6.0 + 16.0 * i as f64;
        let x = frame.left + frame.width - 120.0;
        let color = colors.get(i).map(String::as_str).unwrap_or("#999999");
        let _ = write!(
            out,
            r#"<rect x="{:.2}" y="{:.2}" width="10" height="10" fill="{}"/><text x="{:.2}" y="{:.2}">{}</text>"#,
            x,
            y,
            color,
            x + 14.0,
            y + 9.0,
            escape(name)
        );
    }
}

/// Slices start at twelve o'clock and run counter-clockwise.
fn draw_pie(out: &mut String, labels: &[String], values: &[f64], colors: &[String]) {
    let total: f64 = values.iter().sum();
    let (cx, cy, r) = (PANEL_WIDTH / 2.0, MARGIN_TOP + (PANEL_HEIGHT - MARGIN_TOP) / 2.0, 140.0);
    if total <= 0.0 {
        return;
    }
    let point = |angle: f64, radius: f64| (cx + radius * angle.cos(), cy - radius * angle.sin());
    let mut start = PI / 2.0;
    for (i, (label, value)) in labels.iter().zip(values).enumerate() {
        let share = value / total;
        let sweep = share * 2.0 * PI;
        let color = colors.get(i).map(String::as_str).unwrap_or("#999999");
        if share >= 1.0 {
            let _ = write!(out, r#"<circle cx="{}" cy="{}" r="{}" fill="{}"/>"#, cx, cy, r, color);
        } else {
            let (x1, y1) = point(start, r);
            let (x2, y2) = point(start + sweep, r);
            let large = if sweep > PI { 1 } else { 0 };
            let _ = write!(
                out,
                r#"<path d="M{cx:.2},{cy:.2} L{:.2},{:.2} A{r},{r} 0 {} 0 {:.2},{:.2} Z" fill="{}" stroke="white"/>"#,
                x1,
                y1,
                large,
                x2,
                y2,
                color,
                cx = cx,
                cy = cy,
                r = r
            );
        }
        let middle = start + sweep / 2.0;
        let (lx, ly) = point(middle, r * 0.6);
        let (nx, ny) = point(middle, r * 1.15);
        let _ = write!(
            out,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="middle">{:.1}%</text><text x="{:.2}" y="{:.2}" text-anchor="middle">{}</text>"#,
            lx,
            ly,
            share * 100.0,
            nx,
            ny,
            escape(label)
        );
        start += sweep;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::aggregate::aggregate;
    use crate::render::charts::chart_plan;

    fn bar_chart() -> ChartSpec {
        ChartSpec {
            file_stem: "bars",
            panels: vec![ChartPanel {
                title: "Tickets & Sales".to_string(),
                x_label: "Event Name".to_string(),
                y_label: "Count".to_string(),
                label_rotation: 90,
                data: ChartData::Bar {
                    labels: vec!["A<1>".to_string(), "B".to_string()],
                    values: vec![2.0, 1.0],
                    colors: vec!["#FFA500".to_string(), "#ADD8E6".to_string()],
                },
            }],
        }
    }

    #[test]
    fn test_svg_escapes_text_and_draws_bars() {
        let svg = SvgChartRenderer::new().to_svg(&bar_chart());
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Tickets &amp; Sales"));
        assert!(svg.contains("A&lt;1&gt;"));
        assert_eq!(svg.matches("<rect").count(), 3);
        assert!(svg.contains("#FFA500"));
    }

    #[test]
    fn test_render_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = SvgChartRenderer::new().render(&bar_chart(), dir.path()).unwrap();
        assert_eq!(path, dir.path().join("bars.svg"));
        assert!(fs::read_to_string(path).unwrap().ends_with("</svg>\n"));
    }

    #[test]
    fn test_empty_data_renders_placeholder() {
        let renderer = SvgChartRenderer::new();
        for chart in chart_plan(&aggregate(&[])) {
            assert!(renderer.to_svg(&chart).contains("No data"));
        }
    }

    #[test]
    fn test_chart_without_panels_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let chart = ChartSpec {
            file_stem: "nothing",
            panels: Vec::new(),
        };
        let err = SvgChartRenderer::new().render(&chart, dir.path()).unwrap_err();
        assert!(matches!(err, RenderError::EmptyChart { .. }));
    }

    #[test]
    fn test_missing_directory_is_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        let err = SvgChartRenderer::new().render(&bar_chart(), &missing).unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
    }
}
