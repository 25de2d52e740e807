//! `generate_vitals_visualization` - renders an SpO2 / heart-rate trend chart.
//!
//! The chart is an SVG document returned base64-encoded so it can travel
//! inside a JSON tool response.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::domain::tools::{ParameterType, Tool, ToolDefinition, ToolError};

/// Registered tool name.
pub const VITALS_CHART_TOOL: &str = "generate_vitals_visualization";

const CHART_TITLE: &str = "Critical Vitals Trend Confirmation";
const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 360.0;
const MARGIN: f64 = 48.0;
const SPO2_MIN: f64 = 80.0;
const SPO2_MAX: f64 = 100.0;

/// One reading in the vitals series.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VitalsSample {
    pub time: String,
    #[serde(rename = "SpO2")]
    pub spo2: f64,
    #[serde(rename = "HeartRate")]
    pub heart_rate: f64,
}

pub struct VitalsChartTool {
    definition: ToolDefinition,
}

impl Default for VitalsChartTool {
    fn default() -> Self {
        Self::new()
    }
}

impl VitalsChartTool {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                VITALS_CHART_TOOL,
                "Generate a trend chart of SpO2 and heart rate over time. Returns a \
                 base64-encoded SVG image.",
            )
            .with_parameter(
                "time_series_data",
                ParameterType::String,
                "JSON array of readings, each {\"time\": string, \"SpO2\": number, \"HeartRate\": number}",
                true,
            ),
        }
    }

    /// Parses the series carried in the `time_series_data` argument.
    pub fn parse_series(raw: &str) -> Result<Vec<VitalsSample>, ToolError> {
        let samples: Vec<VitalsSample> = serde_json::from_str(raw).map_err(|e| {
            ToolError::execution_failed(VITALS_CHART_TOOL, format!("time_series_data is not a valid series: {}", e))
        })?;
        if samples.is_empty() {
            return Err(ToolError::execution_failed(VITALS_CHART_TOOL, "vitals series is empty"));
        }
        Ok(samples)
    }

    /// Renders the series as an SVG document.
    pub fn render_svg(samples: &[VitalsSample]) -> Result<String, ToolError> {
        let mut svg = String::new();
        write_svg(&mut svg, samples)
            .map_err(|_| ToolError::execution_failed(VITALS_CHART_TOOL, "failed to render chart"))?;
        Ok(svg)
    }
}

/// Writes the chart for `samples` into `out`.
fn write_svg(out: &mut impl fmt::Write, samples: &[VitalsSample]) -> fmt::Result {
    let plot_w = WIDTH - 2.0 * MARGIN;
    let plot_h = HEIGHT - 2.0 * MARGIN;

    let (hr_low, hr_high) = heart_rate_axis(samples);

    let x_at = |i: usize| {
        if samples.len() == 1 {
            MARGIN + plot_w / 2.0
        } else {
            MARGIN + plot_w * i as f64 / (samples.len() - 1) as f64
        }
    };
    let y_at = |value: f64, low: f64, high: f64| {
        let clamped = value.clamp(low, high);
        MARGIN + plot_h * (1.0 - (clamped - low) / (high - low))
    };

    let spo2_points = polyline_points(
        samples
            .iter()
            .enumerate()
            .map(|(i, s)| (x_at(i), y_at(s.spo2, SPO2_MIN, SPO2_MAX))),
    );
    let hr_points = polyline_points(
        samples
            .iter()
            .enumerate()
            .map(|(i, s)| (x_at(i), y_at(s.heart_rate, hr_low, hr_high))),
    );

    write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = WIDTH,
        h = HEIGHT
    )?;
    out.write_str(r#"<rect width="100%" height="100%" fill="white"/>"#)?;
    write!(
        out,
        r#"<text x="{x}" y="24" text-anchor="middle" font-family="sans-serif" font-size="16">{t}</text>"#,
        x = WIDTH / 2.0,
        t = escape_xml(CHART_TITLE)
    )?;
    write!(
        out,
        r#"<line x1="{m}" y1="{b}" x2="{r}" y2="{b}" stroke="black"/><line x1="{m}" y1="{m}" x2="{m}" y2="{b}" stroke="black"/>"#,
        m = MARGIN,
        b = HEIGHT - MARGIN,
        r = WIDTH - MARGIN
    )?;
    write!(
        out,
        r#"<polyline fill="none" stroke="steelblue" stroke-width="2" points="{}"/>"#,
        spo2_points
    )?;
    write!(
        out,
        r#"<polyline fill="none" stroke="firebrick" stroke-width="2" stroke-dasharray="6 3" points="{}"/>"#,
        hr_points
    )?;
    for (i, sample) in samples.iter().enumerate() {
        write!(
            out,
            r#"<text x="{x:.1}" y="{y}" text-anchor="middle" font-family="sans-serif" font-size="10">{t}</text>"#,
            x = x_at(i),
            y = HEIGHT - MARGIN + 16.0,
            t = escape_xml(&sample.time)
        )?;
    }
    write!(
        out,
        r#"<text x="{m}" y="{y}" font-family="sans-serif" font-size="11" fill="steelblue">SpO2 (%) {lo}-{hi}</text>"#,
        m = MARGIN,
        y = MARGIN - 8.0,
        lo = SPO2_MIN,
        hi = SPO2_MAX
    )?;
    write!(
        out,
        r#"<text x="{x}" y="{y}" text-anchor="end" font-family="sans-serif" font-size="11" fill="firebrick">Heart Rate (bpm) {lo:.0}-{hi:.0}</text>"#,
        x = WIDTH - MARGIN,
        y = MARGIN - 8.0,
        lo = hr_low,
        hi = hr_high
    )?;
    out.write_str("</svg>")
}

impl Tool for VitalsChartTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let raw = arguments
            .get("time_series_data")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid_arguments(VITALS_CHART_TOOL, "missing time_series_data"))?;

        let samples = Self::parse_series(raw)?;
        let svg = Self::render_svg(&samples)?;

        Ok(Value::String(STANDARD.encode(svg.as_bytes())))
    }
}

fn heart_rate_axis(samples: &[VitalsSample]) -> (f64, f64) {
    let low = samples.iter().map(|s| s.heart_rate).fold(f64::INFINITY, f64::min);
    let high = samples.iter().map(|s| s.heart_rate).fold(f64::NEG_INFINITY, f64::max);
    if !low.is_finite() || !high.is_finite() {
        return (0.0, 200.0);
    }
    ((low - 10.0).max(0.0), high + 10.0)
}

fn polyline_points(points: impl Iterator<Item = (f64, f64)>) -> String {
    points
        .map(|(x, y)| format!("{:.1},{:.1}", x, y))
        .collect::<Vec<_>>()
        .join(" ")
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
            other => out.push(other),
        }
    }
    out
}
