// Bar chart of the strongest correlations in each direction.

use plotters::prelude::*;

use crate::corr::*;

const PANEL_WIDTH: i32 = 800;
const TITLE_HEIGHT: i32 = 90;
const ROW_HEIGHT: i32 = 26;
const LABEL_WIDTH: i32 = 340;
const BAR_WIDTH: f64 = 330.0;
const MAX_LABEL_CHARS: usize = 45;

const POSITIVE_COLOR: RGBColor = RGBColor(0x2E, 0x7D, 0x32);
const NEGATIVE_COLOR: RGBColor = RGBColor(0xC6, 0x28, 0x28);

pub fn significance_stars(p_value: f64) -> &'static str {
    if p_value < 0.001 {
        "***"
    } else if p_value < 0.01 {
        "**"
    } else if p_value < 0.05 {
        "*"
    } else {
        ""
    }
}

/// The bars of each panel: the `top_n` strongest positive and negative results,
/// significant or not.
pub fn chart_bars(
    ranked: &RankedResults,
    top_n: usize,
) -> (Vec<&CorrelationResult>, Vec<&CorrelationResult>) {
    // `all` is sorted by decreasing |r|, which orders each direction from the strongest.
    let pick = |d: Direction| -> Vec<&CorrelationResult> {
        ranked
            .all
            .iter()
            .filter(|r| r.direction == d)
            .take(top_n)
            .collect()
    };
    (pick(Direction::Positive), pick(Direction::Negative))
}

fn truncate_label(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL_CHARS {
        label.to_string()
    } else {
        let s: String = label.chars().take(MAX_LABEL_CHARS - 1).collect();
        format!("{}…", s)
    }
}

fn draw_panel(
    area: &DrawingArea<SVGBackend, plotters::coord::Shift>,
    x0: i32,
    title: &str,
    bars: &[&CorrelationResult],
    color: RGBColor,
) -> Result<(), Box<dyn std::error::Error>> {
    area.draw(&Text::new(
        title.to_string(),
        (x0 + 10, TITLE_HEIGHT - 40),
        ("sans-serif", 18).into_font().color(&color),
    ))?;
    let bar_x = x0 + LABEL_WIDTH + 10;
    area.draw(&PathElement::new(
        vec![
            (bar_x, TITLE_HEIGHT - 5),
            (bar_x, TITLE_HEIGHT + ROW_HEIGHT * bars.len() as i32),
        ],
        &BLACK,
    ))?;
    for (idx, r) in bars.iter().enumerate() {
        let y = TITLE_HEIGHT + ROW_HEIGHT * idx as i32;
        area.draw(&Text::new(
            truncate_label(&r.attribute.short_label()),
            (x0 + 10, y + 6),
            ("sans-serif", 13),
        ))?;
        let length = (r.pearson_r.abs() * BAR_WIDTH).round() as i32;
        area.draw(&Rectangle::new(
            [(bar_x, y + 3), (bar_x + length.max(1), y + ROW_HEIGHT - 3)],
            color.mix(0.85).filled(),
        ))?;
        area.draw(&Text::new(
            format!("{:+.4} {}", r.pearson_r, significance_stars(r.p_value)),
            (bar_x + length + 6, y + 6),
            ("sans-serif", 12),
        ))?;
    }
    Ok(())
}

/// Writes the chart as SVG. Returns false (and writes nothing) if there is no
/// result to draw.
pub fn write_chart(path: &Path, ranked: &RankedResults, top_n: usize, title: &str) -> CorrResult<bool> {
    let path_s = path.display().to_string();
    let (positive, negative) = chart_bars(ranked, top_n);
    if positive.is_empty() && negative.is_empty() {
        warn!("write_chart: no correlation to draw, {:?} not written", path_s);
        return Ok(false);
    }
    let rows = positive.len().max(negative.len()) as i32;
    let height = (TITLE_HEIGHT + ROW_HEIGHT * rows + 40) as u32;
    let draw = || -> Result<(), Box<dyn std::error::Error>> {
        let root = SVGBackend::new(path, ((2 * PANEL_WIDTH) as u32, height)).into_drawing_area();
        root.fill(&WHITE)?;
        root.draw(&Text::new(
            title.to_string(),
            (10, 10),
            ("sans-serif", 22),
        ))?;
        draw_panel(&root, 0, "Top positive correlations", &positive, POSITIVE_COLOR)?;
        draw_panel(
            &root,
            PANEL_WIDTH,
            "Top negative correlations",
            &negative,
            NEGATIVE_COLOR,
        )?;
        root.draw(&Text::new(
            "*** p<0.001  ** p<0.01  * p<0.05".to_string(),
            (10, height as i32 - 25),
            ("sans-serif", 12),
        ))?;
        root.present()?;
        Ok(())
    };
    draw().map_err(|e| {
        ChartSnafu {
            message: e.to_string(),
            path: &path_s,
        }
        .build()
    })?;
    Ok(true)
}
