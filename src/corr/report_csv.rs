// Tabular outputs: the results table and the joined table.

use std::collections::BTreeSet;

use crate::corr::*;

/// A value of the results table.
#[derive(PartialEq, Debug, Clone)]
pub enum TableValue {
    Text(String),
    Number(f64),
    /// A p-value, shown in scientific notation.
    PValue(f64),
    Integer(usize),
    Blank,
}

impl TableValue {
    pub fn to_csv_field(&self) -> String {
        match self {
            TableValue::Text(s) => s.clone(),
            TableValue::Number(x) => format!("{}", x),
            TableValue::PValue(x) => format!("{:e}", x),
            TableValue::Integer(n) => n.to_string(),
            TableValue::Blank => String::new(),
        }
    }
}

pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// The columns of the results tables.
///
/// The rank correlation columns are only present when at least one result has them.
pub fn result_headers(results: &[CorrelationResult], significance_level: f64) -> Vec<String> {
    let mut headers: Vec<String> = vec![
        "Characteristics ID".to_string(),
        "Category (Level 1)".to_string(),
        "Subcategory (Level 2)".to_string(),
        "Subsubcategory (Level 3)".to_string(),
        "Pearson r".to_string(),
        "p-value".to_string(),
        format!("Significant (p<{})", significance_level),
        "Correlation Strength".to_string(),
        "R-squared".to_string(),
        "Sample Size (n)".to_string(),
        "Direction".to_string(),
    ];
    if has_spearman(results) {
        headers.push("Spearman rho".to_string());
        headers.push("Spearman p-value".to_string());
    }
    headers
}

pub fn has_spearman(results: &[CorrelationResult]) -> bool {
    results.iter().any(|r| r.spearman.is_some())
}

pub fn result_row(r: &CorrelationResult, with_spearman: bool) -> Vec<TableValue> {
    let text = |s: &Option<String>| TableValue::Text(s.clone().unwrap_or_default());
    let mut row = vec![
        TableValue::Text(r.attribute.id.clone()),
        text(&r.attribute.category),
        text(&r.attribute.subcategory),
        text(&r.attribute.subsubcategory),
        TableValue::Number(round4(r.pearson_r)),
        TableValue::PValue(r.p_value),
        TableValue::Text(if r.significant { "Yes" } else { "No" }.to_string()),
        TableValue::Text(r.strength.label().to_string()),
        TableValue::Number(round4(r.r_squared())),
        TableValue::Integer(r.sample_size),
        TableValue::Text(r.direction.label().to_string()),
    ];
    if with_spearman {
        match &r.spearman {
            Some(s) => {
                row.push(TableValue::Number(round4(s.rho)));
                row.push(TableValue::PValue(s.p_value));
            }
            None => {
                row.push(TableValue::Blank);
                row.push(TableValue::Blank);
            }
        }
    }
    row
}

pub fn write_results_csv(
    path: &Path,
    results: &[CorrelationResult],
    significance_level: f64,
) -> CorrResult<()> {
    let path_s = path.display().to_string();
    let mut wtr = csv::Writer::from_path(path).context(CsvWriteSnafu { path: &path_s })?;
    wtr.write_record(result_headers(results, significance_level))
        .context(CsvWriteSnafu { path: &path_s })?;
    let with_spearman = has_spearman(results);
    for r in results.iter() {
        let fields: Vec<String> = result_row(r, with_spearman)
            .iter()
            .map(|v| v.to_csv_field())
            .collect();
        wtr.write_record(&fields)
            .context(CsvWriteSnafu { path: &path_s })?;
    }
    wtr.flush().context(WritingFileSnafu { path: &path_s })?;
    debug!("write_results_csv: {} rows to {:?}", results.len(), path_s);
    Ok(())
}

/// Writes the joined table: one row per district, the vote columns and then one
/// `demo_<attribute>` column per attribute.
pub fn write_joined_csv(path: &Path, table: &JoinedTable) -> CorrResult<()> {
    let path_s = path.display().to_string();
    let vote_columns: Vec<String> = table
        .rows
        .iter()
        .flat_map(|r| r.district.values.keys().cloned())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect();

    let mut wtr = csv::Writer::from_path(path).context(CsvWriteSnafu { path: &path_s })?;
    let mut header: Vec<String> = vec![
        "constituency_id".to_string(),
        "name".to_string(),
        "region".to_string(),
    ];
    header.extend(vote_columns.iter().cloned());
    header.extend(table.attributes.iter().map(|a| format!("demo_{}", a)));
    wtr.write_record(&header)
        .context(CsvWriteSnafu { path: &path_s })?;

    let num = |x: Option<&f64>| x.map(|v| v.to_string()).unwrap_or_default();
    for row in table.rows.iter() {
        let d = &row.district;
        let mut fields: Vec<String> = vec![
            d.id.0.clone(),
            d.name.clone().unwrap_or_default(),
            d.region.clone().unwrap_or_default(),
        ];
        fields.extend(vote_columns.iter().map(|c| num(d.values.get(c))));
        fields.extend(table.attributes.iter().map(|a| num(row.rates.get(a))));
        wtr.write_record(&fields)
            .context(CsvWriteSnafu { path: &path_s })?;
    }
    wtr.flush().context(WritingFileSnafu { path: &path_s })?;
    debug!("write_joined_csv: {} rows to {:?}", table.len(), path_s);
    Ok(())
}
