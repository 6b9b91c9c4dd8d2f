// The Excel report.

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};

use crate::corr::{
    report_csv::{has_spearman, result_headers, result_row, TableValue},
    *,
};

const HEADER_BLUE: u32 = 0x1F4E79;
const HEADER_GREEN: u32 = 0x2E7D32;
const HEADER_RED: u32 = 0xC62828;

const STRONG_POSITIVE_FILL: u32 = 0xC8E6C9;
const WEAK_POSITIVE_FILL: u32 = 0xE8F5E9;
const STRONG_NEGATIVE_FILL: u32 = 0xFFCDD2;
const WEAK_NEGATIVE_FILL: u32 = 0xFFEBEE;

/// Column of the Pearson coefficient in the results tables.
const PEARSON_COLUMN: usize = 4;

/// Number of entries per direction in the summary sheet.
const SUMMARY_TOP: usize = 5;

fn column_width(header: &str) -> f64 {
    match header {
        "Characteristics ID" => 18.0,
        "Category (Level 1)" => 45.0,
        "Subcategory (Level 2)" | "Subsubcategory (Level 3)" => 40.0,
        "Pearson r" | "R-squared" | "Direction" => 12.0,
        "p-value" | "Spearman rho" => 14.0,
        "Correlation Strength" => 20.0,
        "Sample Size (n)" => 15.0,
        h if h.starts_with("Significant") => 18.0,
        _ => 15.0,
    }
}

fn header_format(color: u32) -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_font_size(11)
        .set_background_color(Color::RGB(color))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin)
}

fn cell_format() -> Format {
    Format::new()
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap()
        .set_border(FormatBorder::Thin)
}

/// The fill of a Pearson coefficient cell, by sign and magnitude.
pub fn coefficient_fill(r: f64) -> Option<u32> {
    if r >= 0.3 {
        Some(STRONG_POSITIVE_FILL)
    } else if r > 0.0 {
        Some(WEAK_POSITIVE_FILL)
    } else if r <= -0.3 {
        Some(STRONG_NEGATIVE_FILL)
    } else if r < 0.0 {
        Some(WEAK_NEGATIVE_FILL)
    } else {
        None
    }
}

fn write_results_sheet(
    ws: &mut Worksheet,
    name: &str,
    results: &[CorrelationResult],
    headers: &[String],
    with_spearman: bool,
    header_color: u32,
) -> Result<(), XlsxError> {
    ws.set_name(name)?;
    let hf = header_format(header_color);
    for (col, h) in headers.iter().enumerate() {
        ws.write_string_with_format(0, col as u16, h.as_str(), &hf)?;
        ws.set_column_width(col as u16, column_width(h))?;
    }
    let base = cell_format();
    let p_format = cell_format().set_num_format("0.00E+00");
    for (idx, r) in results.iter().enumerate() {
        let row = (idx + 1) as u32;
        for (col_idx, value) in result_row(r, with_spearman).iter().enumerate() {
            let col = col_idx as u16;
            match value {
                TableValue::Text(s) => {
                    ws.write_string_with_format(row, col, s.as_str(), &base)?;
                }
                TableValue::Number(x) if col_idx == PEARSON_COLUMN => {
                    let f = match coefficient_fill(*x) {
                        Some(c) => cell_format().set_background_color(Color::RGB(c)),
                        None => cell_format(),
                    };
                    ws.write_number_with_format(row, col, *x, &f)?;
                }
                TableValue::Number(x) => {
                    ws.write_number_with_format(row, col, *x, &base)?;
                }
                TableValue::PValue(x) => {
                    ws.write_number_with_format(row, col, *x, &p_format)?;
                }
                TableValue::Integer(n) => {
                    ws.write_number_with_format(row, col, *n as f64, &base)?;
                }
                TableValue::Blank => {
                    ws.write_blank(row, col, &base)?;
                }
            }
        }
    }
    ws.set_freeze_panes(1, 0)?;
    Ok(())
}

/// The lines of the summary sheet.
pub fn summary_lines(ranked: &RankedResults) -> Vec<(String, String)> {
    let mut lines: Vec<(String, String)> = vec![
        ("CORRELATION ANALYSIS SUMMARY".to_string(), String::new()),
        (String::new(), String::new()),
        (
            "Total demographics analyzed".to_string(),
            ranked.all.len().to_string(),
        ),
        (
            "Statistically significant".to_string(),
            ranked.significant.len().to_string(),
        ),
        (
            "Positive correlations (significant)".to_string(),
            ranked.positive.len().to_string(),
        ),
        (
            "Negative correlations (significant)".to_string(),
            ranked.negative.len().to_string(),
        ),
        (String::new(), String::new()),
        ("STRONGEST POSITIVE CORRELATIONS".to_string(), String::new()),
    ];
    for r in ranked.positive.iter().take(SUMMARY_TOP) {
        lines.push((
            format!("  {}", r.attribute.short_label()),
            format!("r = {:.4}", r.pearson_r),
        ));
    }
    lines.push((String::new(), String::new()));
    lines.push(("STRONGEST NEGATIVE CORRELATIONS".to_string(), String::new()));
    for r in ranked.negative.iter().take(SUMMARY_TOP) {
        lines.push((
            format!("  {}", r.attribute.short_label()),
            format!("r = {:.4}", r.pearson_r),
        ));
    }
    lines
}

fn write_summary_sheet(ws: &mut Worksheet, ranked: &RankedResults) -> Result<(), XlsxError> {
    ws.set_name("Summary")?;
    let title = Format::new().set_bold().set_font_size(14);
    let section = Format::new().set_bold();
    for (idx, (label, value)) in summary_lines(ranked).iter().enumerate() {
        let row = idx as u32;
        if idx == 0 {
            ws.write_string_with_format(row, 0, label.as_str(), &title)?;
        } else if value.is_empty() && !label.is_empty() {
            ws.write_string_with_format(row, 0, label.as_str(), &section)?;
        } else {
            ws.write_string(row, 0, label.as_str())?;
            ws.write_string(row, 1, value.as_str())?;
        }
    }
    ws.set_column_width(0, 60)?;
    ws.set_column_width(1, 20)?;
    Ok(())
}

pub fn write_report(path: &Path, ranked: &RankedResults, significance_level: f64) -> CorrResult<()> {
    let path_s = path.display().to_string();
    let mut workbook = Workbook::new();
    let headers = result_headers(&ranked.all, significance_level);
    let with_spearman = has_spearman(&ranked.all);
    debug!("write_report: {:?} spearman: {}", path_s, with_spearman);
    let sheets: [(&str, &Vec<CorrelationResult>, u32); 4] = [
        ("All Significant", &ranked.significant, HEADER_BLUE),
        ("Positive Correlations", &ranked.positive, HEADER_GREEN),
        ("Negative Correlations", &ranked.negative, HEADER_RED),
        ("All Results", &ranked.all, HEADER_BLUE),
    ];
    for (name, results, color) in sheets.iter() {
        let ws = workbook.add_worksheet();
        write_results_sheet(ws, name, results, &headers, with_spearman, *color)
            .context(WritingXlsxSnafu { path: &path_s })?;
    }
    let ws = workbook.add_worksheet();
    write_summary_sheet(ws, ranked).context(WritingXlsxSnafu { path: &path_s })?;
    workbook
        .save(path)
        .context(WritingXlsxSnafu { path: &path_s })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook, DataType, Reader, Xlsx};

    fn result(id: &str, label: &str, r: f64, p: f64) -> CorrelationResult {
        CorrelationResult {
            attribute: AttributeInfo {
                id: id.to_string(),
                category: Some(label.to_string()),
                ..Default::default()
            },
            pearson_r: r,
            p_value: p,
            sample_size: 100,
            strength: Strength::from_coefficient(r),
            direction: Direction::from_coefficient(r),
            significant: p < 0.05,
            spearman: None,
        }
    }

    fn ranked() -> RankedResults {
        rank_results(&[
            result("1", "Trades", 0.62, 1e-8),
            result("2", "Sales", -0.41, 1e-4),
            result("3", "Farming", 0.12, 0.2),
            result("4", "Students", -0.25, 0.01),
        ])
    }

    #[test]
    fn fills() {
        assert_eq!(coefficient_fill(0.3), Some(STRONG_POSITIVE_FILL));
        assert_eq!(coefficient_fill(0.29), Some(WEAK_POSITIVE_FILL));
        assert_eq!(coefficient_fill(-0.3), Some(STRONG_NEGATIVE_FILL));
        assert_eq!(coefficient_fill(-0.01), Some(WEAK_NEGATIVE_FILL));
        assert_eq!(coefficient_fill(0.0), None);
    }

    #[test]
    fn summary_sheet_lines() {
        let lines = summary_lines(&ranked());
        assert_eq!(lines[2].1, "4");
        assert_eq!(lines[3].1, "3");
        assert_eq!(lines[4].1, "1");
        assert_eq!(lines[5].1, "2");
        assert_eq!(lines[8], ("  Trades".to_string(), "r = 0.6200".to_string()));
        let neg_idx = lines
            .iter()
            .position(|(l, _)| l == "STRONGEST NEGATIVE CORRELATIONS")
            .unwrap();
        assert_eq!(lines[neg_idx + 1].0, "  Sales");
        assert_eq!(lines[neg_idx + 2].0, "  Students");
    }

    #[test]
    fn report_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("report.xlsx");
        write_report(&p, &ranked(), 0.05).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&p).unwrap();
        assert_eq!(
            workbook.sheet_names().to_vec(),
            vec![
                "All Significant",
                "Positive Correlations",
                "Negative Correlations",
                "All Results",
                "Summary"
            ]
        );
        let all = workbook.worksheet_range("All Results").unwrap().unwrap();
        // header + 4 results
        assert_eq!(all.height(), 5);
        assert_eq!(
            all.get_value((0, 0)),
            Some(&DataType::String("Characteristics ID".to_string()))
        );
        assert_eq!(all.get_value((1, 4)), Some(&DataType::Float(0.62)));
        let neg = workbook
            .worksheet_range("Negative Correlations")
            .unwrap()
            .unwrap();
        assert_eq!(neg.height(), 3);
        assert_eq!(
            neg.get_value((1, 0)),
            Some(&DataType::String("2".to_string()))
        );
    }
}
