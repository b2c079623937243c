use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{
    error::{HazardError, Result},
    report::{ImpactChart, SignTag},
};

/// draws a ranked impact chart somewhere - the pipeline never looks at the result
pub trait ChartRenderer {
    fn render(&mut self, chart: &ImpactChart) -> Result<()>;
}

impl<R: ChartRenderer + ?Sized> ChartRenderer for &mut R {
    fn render(&mut self, chart: &ImpactChart) -> Result<()> {
        (**self).render(chart)
    }
}

/// horizontal bar chart in plain text
///
/// ```text
/// covariate             |
/// has_body_insurance    |##########################    35.2%
/// cargo_perishable   ===|                              -4.1%
/// ```
pub struct TextChartRenderer<W: Write> {
    out: W,
    half_width: usize,  // columns on each side of the zero line
}

impl<W: Write> TextChartRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, half_width: 30 }
    }

    pub fn with_half_width(mut self, half_width: usize) -> Self {
        self.half_width = half_width.max(1);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TextChartRenderer<W> {
    fn draw(&mut self, chart: &ImpactChart) -> std::io::Result<()> {
        let hw = self.half_width;
        let max = chart.max_magnitude();
        let label_w = chart
            .bars
            .iter()
            .map(|b| b.label.chars().count())
            .chain(std::iter::once(chart.y_label.chars().count()))
            .max()
            .unwrap_or(0);

        writeln!(self.out, "{}", chart.title)?;
        writeln!(self.out, "{:=<1$}", "", chart.title.chars().count())?;

        if chart.bars.is_empty() {
            writeln!(self.out, "(no covariates)")?;
            return self.out.flush();
        }

        writeln!(self.out, "{:<label_w$} {:>hw$}|", chart.y_label, "")?;

        for bar in &chart.bars {
            let len = if max > 0.0 && bar.value.is_finite() {
                ((bar.value.abs() / max) * hw as f64).round() as usize
            } else {
                0
            };

            let (left, right) = match bar.sign {
                SignTag::IncreasesHazard => (String::new(), "#".repeat(len)),
                SignTag::DecreasesOrNoEffect => ("=".repeat(len), String::new()),
            };

            writeln!(
                self.out,
                "{:<label_w$} {left:>hw$}|{right:<hw$} {:>8}",
                bar.label,
                bar.annotation(),
            )?;
        }

        let x_label_w = chart.x_label.chars().count();
        writeln!(self.out, "{:>1$}", chart.x_label, label_w + hw + 2 + x_label_w / 2)?;
        self.out.flush()
    }
}

impl<W: Write> ChartRenderer for TextChartRenderer<W> {
    fn render(&mut self, chart: &ImpactChart) -> Result<()> {
        self.draw(chart).map_err(|e| HazardError::render(format!("text chart: {e}")))
    }
}

/// standalone svg bar chart written to a file
#[derive(Debug, Clone)]
pub struct SvgChartRenderer {
    path: PathBuf,
    plot_width: f64,
    bar_height: f64,
}

impl SvgChartRenderer {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            plot_width: 640.0,
            bar_height: 28.0,
        }
    }

    /// the svg document as a string
    pub fn to_svg(&self, chart: &ImpactChart) -> String {
        const TOP: f64 = 60.0;
        const GAP: f64 = 10.0;
        const BOTTOM: f64 = 60.0;

        let label_chars = chart.bars.iter().map(|b| b.label.chars().count()).max().unwrap_or(0);
        let left = 50.0 + 7.5 * label_chars as f64;
        let width = left + self.plot_width + 30.0;
        let plot_height = chart.bars.len() as f64 * (self.bar_height + GAP) + GAP;
        let height = TOP + plot_height + BOTTOM;

        let zero_x = left + self.plot_width / 2.0;
        let max = chart.max_magnitude();
        // leave room for the annotation at the end of the longest bar
        let scale = if max > 0.0 { (self.plot_width / 2.0 - 60.0) / max } else { 0.0 };

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" viewBox="0 0 {width:.0} {height:.0}" font-family="sans-serif">"#
        );
        let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="30" font-size="18" text-anchor="middle">{}</text>"#,
            width / 2.0,
            escape_xml(&chart.title)
        );

        for (i, bar) in chart.bars.iter().enumerate() {
            let y = TOP + GAP + i as f64 * (self.bar_height + GAP);
            let value = if bar.value.is_finite() { bar.value } else { 0.0 };
            let len = value.abs() * scale;
            let x = if value < 0.0 { zero_x - len } else { zero_x };
            let fill = match bar.sign {
                SignTag::IncreasesHazard => "green",
                SignTag::DecreasesOrNoEffect => "red",
            };
            let mid = y + self.bar_height / 2.0;

            let _ = writeln!(
                svg,
                r#"<text x="{:.1}" y="{mid:.1}" font-size="12" text-anchor="end" dominant-baseline="middle">{}</text>"#,
                left - 10.0,
                escape_xml(&bar.label)
            );
            let _ = writeln!(
                svg,
                r#"<rect x="{x:.1}" y="{y:.1}" width="{len:.1}" height="{:.1}" fill="{fill}"/>"#,
                self.bar_height
            );

            let (text_x, anchor) = if value > 0.0 {
                (zero_x + len + 5.0, "start")
            } else {
                (zero_x - len - 5.0, "end")
            };
            let _ = writeln!(
                svg,
                r#"<text x="{text_x:.1}" y="{mid:.1}" font-size="11" text-anchor="{anchor}" dominant-baseline="middle">{}</text>"#,
                escape_xml(&bar.annotation())
            );
        }

        let _ = writeln!(
            svg,
            r#"<line x1="{zero_x:.1}" y1="{TOP:.1}" x2="{zero_x:.1}" y2="{:.1}" stroke="black" stroke-width="0.8" stroke-dasharray="4 3"/>"#,
            TOP + plot_height
        );
        let _ = writeln!(
            svg,
            r#"<text x="{zero_x:.1}" y="{:.1}" font-size="13" text-anchor="middle">{}</text>"#,
            height - 20.0,
            escape_xml(&chart.x_label)
        );
        let _ = writeln!(
            svg,
            r#"<text x="16" y="{:.1}" font-size="13" text-anchor="middle" transform="rotate(-90 16 {:.1})">{}</text>"#,
            TOP + plot_height / 2.0,
            TOP + plot_height / 2.0,
            escape_xml(&chart.y_label)
        );
        svg.push_str("</svg>\n");
        svg
    }
}

impl ChartRenderer for SvgChartRenderer {
    fn render(&mut self, chart: &ImpactChart) -> Result<()> {
        std::fs::write(&self.path, self.to_svg(chart))
            .map_err(|e| HazardError::render(format!("{}: {e}", self.path.display())))?;
        tracing::info!(path = %self.path.display(), "svg chart written");
        Ok(())
    }
}

/// fan one chart out to several renderers, first failure wins
#[derive(Default)]
pub struct RenderSet<'a> {
    renderers: Vec<Box<dyn ChartRenderer + 'a>>,
}

impl<'a> RenderSet<'a> {
    pub fn new() -> Self {
        Self { renderers: Vec::new() }
    }

    pub fn push(&mut self, renderer: impl ChartRenderer + 'a) {
        self.renderers.push(Box::new(renderer));
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

impl ChartRenderer for RenderSet<'_> {
    fn render(&mut self, chart: &ImpactChart) -> Result<()> {
        for renderer in &mut self.renderers {
            renderer.render(chart)?;
        }
        Ok(())
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
