// Readers for the vote table.

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use std::collections::BTreeMap;

use crate::corr::{
    config_reader::VoteSource,
    io_common::{normalize_header, parse_number, simplify_file_name},
    *,
};

/// A cell of the vote table, whatever the file format.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Cell {
    fn from_text(s: &str) -> Cell {
        if s.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    fn from_excel(dt: &DataType) -> Cell {
        match dt {
            DataType::Float(f) => Cell::Number(*f),
            DataType::Int(i) => Cell::Number(*i as f64),
            DataType::String(s) => Cell::from_text(s),
            DataType::Empty => Cell::Empty,
            // Booleans, dates and formula errors carry no rate.
            _ => Cell::Empty,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(x) if x.is_finite() => Some(*x),
            Cell::Text(s) => parse_number(s),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            Cell::Number(x) => Some(DistrictId::from_number(*x).0),
            Cell::Text(s) => Some(s.trim().to_string()),
            Cell::Empty => None,
        }
    }

    fn as_district_id(&self) -> Option<DistrictId> {
        match self {
            Cell::Number(x) if x.is_finite() => Some(DistrictId::from_number(*x)),
            Cell::Text(s) if !s.trim().is_empty() => Some(DistrictId::new(s)),
            _ => None,
        }
    }
}

pub fn read_vote_table(path: &Path, vs: &VoteSource) -> CorrResult<Vec<DistrictRecord>> {
    let path_s = path.display().to_string();
    let provider = vs.provider()?;
    info!("read_vote_table: reading {:?} as {}", path_s, provider);
    let (header, rows) = match provider.as_str() {
        "xlsx" => read_excel_cells(&path_s, vs)?,
        "csv" => read_csv_cells(&path_s)?,
        x => whatever!("Vote table provider not implemented {:?}", x),
    };
    rows_to_districts(&header, &rows, vs, &path_s)
}

fn get_range(path: &str, vs: &VoteSource) -> CorrResult<Range<DataType>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let range_o = match &vs.worksheet_name {
        // A worksheet name was provided, use it.
        Some(worksheet_name) => {
            debug!(
                "get_range: path: {:?} worksheet: {:?}",
                path, worksheet_name
            );
            workbook.worksheet_range(worksheet_name)
        }
        None => workbook.worksheet_range_at(0),
    };
    range_o
        .context(EmptyExcelSnafu { path })?
        .context(OpeningExcelSnafu { path })
}

fn read_excel_cells(path: &str, vs: &VoteSource) -> CorrResult<(Vec<String>, Vec<Vec<Cell>>)> {
    let wrange = get_range(path, vs)?;
    let mut iter = wrange.rows();
    let header: Vec<String> = iter
        .next()
        .context(EmptyExcelSnafu { path })?
        .iter()
        .map(|dt| Cell::from_excel(dt).as_text().unwrap_or_default())
        .collect();
    debug!("read_excel_cells: header: {:?}", header);
    let rows: Vec<Vec<Cell>> = iter
        .map(|row| row.iter().map(Cell::from_excel).collect())
        .collect();
    Ok((header, rows))
}

fn read_csv_cells(path: &str) -> CorrResult<(Vec<String>, Vec<Vec<Cell>>)> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let header: Vec<String> = rdr
        .headers()
        .context(CsvOpenSnafu { path })?
        .iter()
        .map(|s| s.trim_start_matches('\u{feff}').to_string())
        .collect();
    debug!("read_csv_cells: header: {:?}", header);
    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        rows.push(line.iter().map(Cell::from_text).collect());
    }
    Ok((header, rows))
}

fn find_column(columns: &[String], name: &str) -> Option<usize> {
    columns.iter().position(|c| c == name)
}

/// Turns the raw cells into district records.
///
/// Rows without an id or without a numeric target value are dropped.
pub fn rows_to_districts(
    header: &[String],
    rows: &[Vec<Cell>],
    vs: &VoteSource,
    path: &str,
) -> CorrResult<Vec<DistrictRecord>> {
    let aliases: Option<&BTreeMap<String, String>> = vs.column_aliases.as_ref();
    let columns: Vec<String> = header
        .iter()
        .map(|h| normalize_header(h, aliases))
        .collect();
    debug!("rows_to_districts: columns: {:?}", columns);

    let id_column = vs.id();
    let target_column = vs.target();
    let id_idx = find_column(&columns, &id_column).context(MissingColumnSnafu {
        column: id_column.clone(),
        path,
    })?;
    find_column(&columns, &target_column).context(MissingColumnSnafu {
        column: target_column.clone(),
        path,
    })?;
    let name_idx = find_column(&columns, &vs.name());
    let region_idx = find_column(&columns, &vs.region());

    let mut res: Vec<DistrictRecord> = Vec::new();
    let mut dropped: usize = 0;
    for (idx, row) in rows.iter().enumerate() {
        let id = match row.get(id_idx).and_then(|c| c.as_district_id()) {
            Some(id) => id,
            None => {
                debug!("rows_to_districts: row {}: no district id, dropped", idx);
                dropped += 1;
                continue;
            }
        };
        let mut record = DistrictRecord::new(id);
        record.name = name_idx.and_then(|i| row.get(i)).and_then(|c| c.as_text());
        record.region = region_idx
            .and_then(|i| row.get(i))
            .and_then(|c| c.as_text());
        for (col_idx, cell) in row.iter().enumerate() {
            if col_idx == id_idx {
                continue;
            }
            if let (Some(col), Some(x)) = (columns.get(col_idx), cell.as_number()) {
                if !col.is_empty() {
                    record.values.insert(col.clone(), x);
                }
            }
        }
        if record.value(&target_column).is_none() {
            debug!(
                "rows_to_districts: district {}: no value for {}, dropped",
                record.id, target_column
            );
            dropped += 1;
            continue;
        }
        res.push(record);
    }
    info!(
        "rows_to_districts: {} districts read from {:?}, {} rows dropped",
        res.len(),
        simplify_file_name(path),
        dropped
    );
    Ok(res)
}
