// Readers for the demographic rates and the labels of the attributes.

use serde_json::Value as JSValue;
use std::collections::{HashMap, HashSet};

use crate::corr::{
    config_reader::DemographicSource,
    io_common::{normalize_column_name, parse_number, resolve_path},
    *,
};

/// Everything read from the demographic source.
#[derive(Debug, Clone, Default)]
pub struct DemographicData {
    pub records: Vec<DemographicRecord>,
    /// Attribute id -> labels. Attributes without labels may be missing.
    pub attributes: HashMap<String, AttributeInfo>,
}

pub fn read_demographics(
    source: &DemographicSource,
    root: &Path,
    selection: Option<&[String]>,
) -> CorrResult<DemographicData> {
    info!(
        "read_demographics: provider: {} selection: {:?}",
        source.provider, selection
    );
    let data = match source.provider.as_str() {
        "csv" => {
            let rates_p = match &source.rates_file_path {
                Some(p) => resolve_path(root, p),
                None => whatever!("The csv demographic provider requires ratesFilePath"),
            };
            let records = read_rates_csv(&rates_p, selection)?;
            let attributes = match &source.attributes_file_path {
                Some(p) => read_attributes_csv(&resolve_path(root, p))?,
                None => HashMap::new(),
            };
            DemographicData {
                records,
                attributes,
            }
        }
        "postgres" => {
            let uri = match &source.source_uri {
                Some(uri) if !uri.trim().is_empty() => uri.clone(),
                _ => whatever!(
                    "The postgres demographic provider requires --source-uri or VOTECORR_SOURCE_URI"
                ),
            };
            read_database(&uri, selection)?
        }
        x => whatever!("Demographic provider not implemented {:?}", x),
    };
    info!(
        "read_demographics: {} records, {} labeled attributes",
        data.records.len(),
        data.attributes.len()
    );
    Ok(data)
}

#[cfg(feature = "postgres")]
fn read_database(uri: &str, selection: Option<&[String]>) -> CorrResult<DemographicData> {
    io_postgres::read_demographics(uri, selection)
}

#[cfg(not(feature = "postgres"))]
fn read_database(_uri: &str, _selection: Option<&[String]>) -> CorrResult<DemographicData> {
    DatabaseSnafu {
        message: "votecorr was compiled without the postgres feature",
    }
    .fail()
}

/// Attribute ids may come as "2256" or, from spreadsheets, as "2256.0".
pub fn attribute_key(s: &str) -> String {
    // Same rendering as the district ids.
    DistrictId::new(s).0
}

/// The rate stored in the `values` column of the database export.
pub fn rate_from_values(values: &str) -> Option<f64> {
    if values.trim().is_empty() {
        return None;
    }
    let js: JSValue = match serde_json::from_str(values) {
        Ok(js) => js,
        Err(e) => {
            debug!("rate_from_values: cannot parse {:?}: {:?}", values, e);
            return None;
        }
    };
    rate_from_json(&js)
}

pub fn rate_from_json(js: &JSValue) -> Option<f64> {
    match js.get("rateTotal") {
        Some(JSValue::Number(n)) => n.as_f64().filter(|x| x.is_finite()),
        Some(JSValue::String(s)) => parse_number(s),
        _ => None,
    }
}

fn column_indexes(header: &csv::StringRecord) -> HashMap<String, usize> {
    header
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            (
                normalize_column_name(h.trim_start_matches('\u{feff}')),
                idx,
            )
        })
        .collect()
}

pub fn read_rates_csv(path: &Path, selection: Option<&[String]>) -> CorrResult<Vec<DemographicRecord>> {
    let path_s = path.display().to_string();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path: &path_s })?;
    let columns = column_indexes(rdr.headers().context(CsvOpenSnafu { path: &path_s })?);
    let district_idx = *columns
        .get("constituency_id")
        .context(MissingColumnSnafu {
            column: "constituency_id",
            path: &path_s,
        })?;
    let attribute_idx = *columns
        .get("characteristics_id")
        .context(MissingColumnSnafu {
            column: "characteristics_id",
            path: &path_s,
        })?;
    let rate_idx = columns.get("rate").cloned();
    let values_idx = columns.get("values").cloned();
    if rate_idx.is_none() && values_idx.is_none() {
        return MissingColumnSnafu {
            column: "rate",
            path: &path_s,
        }
        .fail();
    }

    let selected: Option<HashSet<&str>> =
        selection.map(|ids| ids.iter().map(|s| s.as_str()).collect());

    let mut res: Vec<DemographicRecord> = Vec::new();
    let mut null_rates: usize = 0;
    for (idx, line_r) in rdr.records().enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu {
            path: &path_s,
            lineno,
        })?;
        let district = match line.get(district_idx).map(|s| s.trim()) {
            Some(s) if !s.is_empty() => DistrictId::new(s),
            _ => {
                debug!("read_rates_csv: line {}: no district, skipped", lineno);
                continue;
            }
        };
        let attribute = match line.get(attribute_idx).map(attribute_key) {
            Some(s) if !s.is_empty() => s,
            _ => {
                debug!("read_rates_csv: line {}: no attribute, skipped", lineno);
                continue;
            }
        };
        if let Some(sel) = &selected {
            if !sel.contains(attribute.as_str()) {
                continue;
            }
        }
        // A plain rate column takes precedence over the JSON values.
        let rate = rate_idx
            .and_then(|i| line.get(i))
            .and_then(parse_number)
            .or_else(|| {
                values_idx
                    .and_then(|i| line.get(i))
                    .and_then(rate_from_values)
            });
        if rate.is_none() {
            null_rates += 1;
        }
        res.push(DemographicRecord {
            district,
            attribute,
            rate,
        });
    }
    info!(
        "read_rates_csv: {} records ({} without rate) from {:?}",
        res.len(),
        null_rates,
        path_s
    );
    Ok(res)
}

fn non_empty(s: Option<&str>) -> Option<String> {
    match s.map(|x| x.trim()) {
        Some(x) if !x.is_empty() => Some(x.to_string()),
        _ => None,
    }
}

pub fn read_attributes_csv(path: &Path) -> CorrResult<HashMap<String, AttributeInfo>> {
    let path_s = path.display().to_string();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path: &path_s })?;
    let columns = column_indexes(rdr.headers().context(CsvOpenSnafu { path: &path_s })?);
    let id_idx = *columns
        .get("characteristics_id")
        .context(MissingColumnSnafu {
            column: "characteristics_id",
            path: &path_s,
        })?;
    let col = |name: &str| columns.get(name).cloned();
    let (category_idx, subcategory_idx, subsubcategory_idx, description_idx) = (
        col("category"),
        col("subcategory"),
        col("subsubcategory"),
        col("description"),
    );

    let mut res: HashMap<String, AttributeInfo> = HashMap::new();
    for (idx, line_r) in rdr.records().enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu {
            path: &path_s,
            lineno,
        })?;
        let id = match line.get(id_idx).map(attribute_key) {
            Some(s) if !s.is_empty() => s,
            _ => continue,
        };
        let field = |i: Option<usize>| non_empty(i.and_then(|i| line.get(i)));
        let info = AttributeInfo {
            id: id.clone(),
            category: field(category_idx),
            subcategory: field(subcategory_idx),
            subsubcategory: field(subsubcategory_idx),
            description: field(description_idx),
        };
        if res.insert(id.clone(), info).is_some() {
            warn!("read_attributes_csv: attribute {} is described twice", id);
        }
    }
    debug!("read_attributes_csv: {} attributes", res.len());
    Ok(res)
}
