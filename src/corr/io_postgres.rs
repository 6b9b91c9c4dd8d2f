// Reading the demographic data from the PostgreSQL database.
// Only compiled with the `postgres` feature.

use native_tls::TlsConnector;
use postgres::{Client, Row};
use postgres_native_tls::MakeTlsConnector;
use serde_json::Value as JSValue;
use std::collections::HashMap;

use crate::corr::{
    io_demographics::{attribute_key, rate_from_json, DemographicData},
    *,
};

const CATEGORIES_QUERY: &str = "
    SELECT
        dc.characteristics_id::text,
        dc.category,
        dc.subcategory,
        dc.subsubcategory,
        dc.description
    FROM demographic_categories dc
    WHERE dc.is_province = false OR dc.is_province IS NULL
    ORDER BY dc.characteristics_id";

const RATES_QUERY: &str = "
    SELECT
        dg.constituency_id::text,
        dc.characteristics_id::text,
        dg.values
    FROM demographics_geographic dg
    JOIN demographic_categories dc ON dg.category_id = dc.id
    WHERE dg.is_constituency = true
      AND dg.constituency_id IS NOT NULL
      AND (dc.is_province = false OR dc.is_province IS NULL)
    ORDER BY dg.constituency_id, dc.characteristics_id";

const SELECTED_RATES_QUERY: &str = "
    SELECT
        dg.constituency_id::text,
        dc.characteristics_id::text,
        dg.values
    FROM demographics_geographic dg
    JOIN demographic_categories dc ON dg.category_id = dc.id
    WHERE dc.characteristics_id::text = ANY($1)
      AND dg.is_constituency = true
      AND dg.constituency_id IS NOT NULL
    ORDER BY dg.constituency_id, dc.characteristics_id";

fn connect(uri: &str) -> CorrResult<Client> {
    let connector = TlsConnector::builder()
        .build()
        .context(TlsSnafu {})?;
    let connector = MakeTlsConnector::new(connector);
    Client::connect(uri, connector).context(PostgresSnafu { what: "cannot connect" })
}

fn text_column(row: &Row, idx: usize) -> CorrResult<Option<String>> {
    row.try_get::<_, Option<String>>(idx)
        .context(PostgresSnafu { what: "unexpected column type" })
}

/// Reads the labels of every constituency-level attribute and the rates of the
/// selected attributes (all of them if there is no selection).
pub fn read_demographics(uri: &str, selection: Option<&[String]>) -> CorrResult<DemographicData> {
    let mut client = connect(uri)?;

    let mut attributes: HashMap<String, AttributeInfo> = HashMap::new();
    let rows = client
        .query(CATEGORIES_QUERY, &[])
        .context(PostgresSnafu { what: "cannot read the categories" })?;
    for row in rows.iter() {
        let id = match text_column(row, 0)? {
            Some(id) => attribute_key(&id),
            None => continue,
        };
        let non_empty = |s: Option<String>| s.filter(|x| !x.trim().is_empty());
        let info = AttributeInfo {
            id: id.clone(),
            category: non_empty(text_column(row, 1)?),
            subcategory: non_empty(text_column(row, 2)?),
            subsubcategory: non_empty(text_column(row, 3)?),
            description: non_empty(text_column(row, 4)?),
        };
        attributes.insert(id, info);
    }
    info!("read_demographics: {} categories", attributes.len());

    let rows = match selection {
        Some(ids) => {
            let ids: Vec<String> = ids.to_vec();
            client.query(SELECTED_RATES_QUERY, &[&ids])
        }
        None => client.query(RATES_QUERY, &[]),
    }
    .context(PostgresSnafu { what: "cannot read the rates" })?;

    let mut records: Vec<DemographicRecord> = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        let (district, attribute) = match (text_column(row, 0)?, text_column(row, 1)?) {
            (Some(d), Some(a)) => (DistrictId::new(&d), attribute_key(&a)),
            _ => continue,
        };
        let values: Option<JSValue> = row
            .try_get(2)
            .context(PostgresSnafu { what: "unexpected values column" })?;
        records.push(DemographicRecord {
            district,
            attribute,
            rate: values.as_ref().and_then(rate_from_json),
        });
    }
    debug!("read_demographics: {} records", records.len());

    client
        .close()
        .context(PostgresSnafu { what: "cannot close the connection" })?;
    Ok(DemographicData {
        records,
        attributes,
    })
}
