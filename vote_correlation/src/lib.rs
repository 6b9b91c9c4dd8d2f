mod config;
pub mod builder;
pub mod manual;
pub mod stats;

use log::{debug, info, warn};

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, HashMap},
};

pub use crate::config::*;

/// Why an attribute did not produce a correlation.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SkipReason {
    /// Fewer paired observations than required by the rules.
    InsufficientSample { observed: usize, required: usize },
    /// The attribute takes the same value in every district.
    ConstantAttribute,
    /// The target takes the same value in every district where the attribute is observed.
    ConstantTarget,
}

/// The statistics computed for one attribute.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct PairedStatistics {
    pub pearson_r: f64,
    pub p_value: f64,
    pub sample_size: usize,
    pub spearman: Option<RankCorrelation>,
}

/// Joins the vote table with the demographic observations.
///
/// This is a strict inner join on the district id: districts that are missing from
/// either side are dropped. Districts without a value for the target column are
/// dropped too. Null rates are ignored.
///
/// Arguments:
/// * `districts` the rows of the vote table
/// * `records` the demographic observations
/// * `target_column` the name of the vote change column
/// * `policy` how to treat a (district, attribute) pair observed more than once
pub fn join_districts(
    districts: &[DistrictRecord],
    records: &[DemographicRecord],
    target_column: &str,
    policy: DuplicatePolicy,
) -> Result<JoinedTable, CorrelationErrors> {
    info!(
        "join_districts: {} districts, {} demographic records, target: {}",
        districts.len(),
        records.len(),
        target_column
    );

    if !districts.is_empty() && districts.iter().all(|d| d.value(target_column).is_none()) {
        return Err(CorrelationErrors::MissingTarget(target_column.to_string()));
    }

    // district -> attribute -> rate
    let mut rates_by_district: HashMap<DistrictId, BTreeMap<String, f64>> = HashMap::new();
    for rec in records.iter() {
        let rate = match rec.rate {
            Some(x) if x.is_finite() => x,
            _ => continue,
        };
        let rates = rates_by_district.entry(rec.district.clone()).or_default();
        if let Some(previous) = rates.insert(rec.attribute.clone(), rate) {
            match policy {
                DuplicatePolicy::LastWriteWins => {
                    warn!(
                        "join_districts: district {} attribute {}: replacing rate {} by {}",
                        rec.district, rec.attribute, previous, rate
                    );
                }
                DuplicatePolicy::Reject => {
                    return Err(CorrelationErrors::DuplicateObservation {
                        district: rec.district.clone(),
                        attribute: rec.attribute.clone(),
                    });
                }
            }
        }
    }

    let mut rows_by_district: BTreeMap<DistrictId, JoinedRow> = BTreeMap::new();
    for d in districts.iter() {
        let target = match d.value(target_column) {
            Some(x) if x.is_finite() => x,
            _ => {
                debug!("join_districts: district {}: no target value, dropped", d.id);
                continue;
            }
        };
        let rates = match rates_by_district.get(&d.id) {
            Some(r) => r.clone(),
            None => {
                debug!("join_districts: district {}: no demographic data, dropped", d.id);
                continue;
            }
        };
        let row = JoinedRow {
            district: d.clone(),
            target,
            rates,
        };
        if rows_by_district.insert(d.id.clone(), row).is_some() {
            match policy {
                DuplicatePolicy::LastWriteWins => {
                    warn!("join_districts: district {} appears more than once, keeping the last row", d.id);
                }
                DuplicatePolicy::Reject => {
                    return Err(CorrelationErrors::DuplicateDistrict(d.id.clone()));
                }
            }
        }
    }

    let rows: Vec<JoinedRow> = rows_by_district.into_values().collect();
    let attributes: Vec<String> = rows
        .iter()
        .flat_map(|r| r.rates.keys().cloned())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect();

    info!(
        "join_districts: {} districts with both vote and demographic data, {} attributes",
        rows.len(),
        attributes.len()
    );
    Ok(JoinedTable {
        target_column: target_column.to_string(),
        rows,
        attributes,
    })
}

/// Computes the statistics for one attribute of the joined table, or the reason why
/// they cannot be computed.
pub fn evaluate_attribute(
    table: &JoinedTable,
    attribute: &str,
    rules: &AnalysisRules,
) -> Result<PairedStatistics, SkipReason> {
    let (xs, ys) = table.paired_values(attribute);
    if xs.len() < rules.min_sample_size {
        return Err(SkipReason::InsufficientSample {
            observed: xs.len(),
            required: rules.min_sample_size,
        });
    }
    if stats::is_constant(&xs) {
        return Err(SkipReason::ConstantAttribute);
    }
    if stats::is_constant(&ys) {
        return Err(SkipReason::ConstantTarget);
    }
    // Both samples vary, the coefficient is defined.
    let pearson_r = stats::pearson(&xs, &ys).ok_or(SkipReason::ConstantAttribute)?;
    let n = xs.len();
    let spearman = if rules.compute_spearman {
        stats::spearman(&xs, &ys).map(|rho| RankCorrelation {
            rho,
            p_value: stats::correlation_p_value(rho, n),
        })
    } else {
        None
    };
    Ok(PairedStatistics {
        pearson_r,
        p_value: stats::correlation_p_value(pearson_r, n),
        sample_size: n,
        spearman,
    })
}

/// Runs the correlation of every attribute of the table against the target.
///
/// Arguments:
/// * `table` the joined table
/// * `attributes` the labels of the attributes. Attributes without labels are reported
/// with their id only.
/// * `selection` if provided, only these attributes are analyzed
/// * `rules` the thresholds of the analysis
///
/// The results are sorted by decreasing absolute coefficient.
pub fn run_correlations(
    table: &JoinedTable,
    attributes: &HashMap<String, AttributeInfo>,
    selection: Option<&[String]>,
    rules: &AnalysisRules,
) -> Result<Vec<CorrelationResult>, CorrelationErrors> {
    rules.validate()?;
    if table.is_empty() {
        return Err(CorrelationErrors::EmptyTable);
    }

    let candidates: Vec<String> = match selection {
        Some(ids) => {
            let mut res: Vec<String> = Vec::new();
            for id in ids.iter() {
                if table.has_attribute(id) {
                    if !res.contains(id) {
                        res.push(id.clone());
                    }
                } else {
                    warn!("run_correlations: missing data for attribute {}", id);
                }
            }
            res
        }
        None => table.attributes.clone(),
    };
    info!(
        "run_correlations: analyzing {} attributes over {} districts, rules: {:?}",
        candidates.len(),
        table.len(),
        rules
    );

    let mut results: Vec<CorrelationResult> = Vec::new();
    for attr in candidates.iter() {
        let ps = match evaluate_attribute(table, attr, rules) {
            Ok(ps) => ps,
            Err(reason) => {
                debug!("run_correlations: attribute {} skipped: {:?}", attr, reason);
                continue;
            }
        };
        let info = attributes
            .get(attr)
            .cloned()
            .unwrap_or_else(|| AttributeInfo::unlabeled(attr));
        debug!(
            "run_correlations: attribute {} ({}): r={:.4} p={:.6} n={}",
            attr,
            info.short_label(),
            ps.pearson_r,
            ps.p_value,
            ps.sample_size
        );
        results.push(CorrelationResult {
            attribute: info,
            pearson_r: ps.pearson_r,
            p_value: ps.p_value,
            sample_size: ps.sample_size,
            strength: Strength::from_coefficient(ps.pearson_r),
            direction: Direction::from_coefficient(ps.pearson_r),
            significant: ps.p_value < rules.significance_level,
            spearman: ps.spearman,
        });
    }

    results.sort_by(by_magnitude);
    info!(
        "run_correlations: {} correlations computed, {} attributes skipped",
        results.len(),
        candidates.len() - results.len()
    );
    Ok(results)
}

fn by_magnitude(a: &CorrelationResult, b: &CorrelationResult) -> Ordering {
    b.pearson_r
        .abs()
        .total_cmp(&a.pearson_r.abs())
        .then_with(|| a.attribute.id.cmp(&b.attribute.id))
}

/// Splits the results into the views used by the reports.
///
/// The positive and negative views partition the significant results.
pub fn rank_results(results: &[CorrelationResult]) -> RankedResults {
    let mut all: Vec<CorrelationResult> = results.to_vec();
    all.sort_by(by_magnitude);

    let significant: Vec<CorrelationResult> =
        all.iter().filter(|r| r.significant).cloned().collect();

    let mut positive: Vec<CorrelationResult> = significant
        .iter()
        .filter(|r| r.direction == Direction::Positive)
        .cloned()
        .collect();
    positive.sort_by(|a, b| {
        b.pearson_r
            .total_cmp(&a.pearson_r)
            .then_with(|| a.attribute.id.cmp(&b.attribute.id))
    });

    let mut negative: Vec<CorrelationResult> = significant
        .iter()
        .filter(|r| r.direction == Direction::Negative)
        .cloned()
        .collect();
    negative.sort_by(|a, b| {
        a.pearson_r
            .total_cmp(&b.pearson_r)
            .then_with(|| a.attribute.id.cmp(&b.attribute.id))
    });

    RankedResults {
        all,
        significant,
        positive,
        negative,
    }
}

/// Runs the whole pipeline: join, correlate, rank.
pub fn run_analysis(
    districts: &[DistrictRecord],
    records: &[DemographicRecord],
    attributes: &HashMap<String, AttributeInfo>,
    target_column: &str,
    selection: Option<&[String]>,
    rules: &AnalysisRules,
) -> Result<RankedResults, CorrelationErrors> {
    rules.validate()?;
    let table = join_districts(districts, records, target_column, rules.duplicate_policy)?;
    let results = run_correlations(&table, attributes, selection, rules)?;
    Ok(rank_results(&results))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn district(id: &str, target: Option<f64>) -> DistrictRecord {
        let mut d = DistrictRecord::new(DistrictId::new(id));
        if let Some(t) = target {
            d.values.insert("change".to_string(), t);
        }
        d
    }

    fn rate(id: &str, attr: &str, x: f64) -> DemographicRecord {
        DemographicRecord {
            district: DistrictId::new(id),
            attribute: attr.to_string(),
            rate: Some(x),
        }
    }

    /// 40 districts with target i/2 and a few attributes:
    /// - "up": exactly linear in the target
    /// - "down": decreasing with some noise
    /// - "flat": constant
    /// - "sparse": only observed in the first 25 districts
    /// - "noise": periodic, uncorrelated-ish
    fn fixture() -> (Vec<DistrictRecord>, Vec<DemographicRecord>) {
        let mut districts = Vec::new();
        let mut records = Vec::new();
        for i in 0..40 {
            let id = format!("{}", 35000 + i);
            let t = i as f64 / 2.0;
            districts.push(district(&id, Some(t)));
            records.push(rate(&id, "up", 10.0 + 2.0 * t));
            records.push(rate(&id, "down", 50.0 - 3.0 * t + ((i % 3) as f64)));
            records.push(rate(&id, "flat", 0.0));
            records.push(rate(&id, "noise", ((i * 7) % 5) as f64));
            if i < 25 {
                records.push(rate(&id, "sparse", t * t));
            }
        }
        (districts, records)
    }

    #[test]
    fn inner_join_drops_unmatched_districts() {
        init();
        let (mut districts, mut records) = fixture();
        districts.push(district("votes-only", Some(1.0)));
        districts.push(district("no-target", None));
        records.push(rate("no-target", "up", 3.0));
        records.push(rate("demographics-only", "up", 1.0));
        let table =
            join_districts(&districts, &records, "change", DuplicatePolicy::LastWriteWins).unwrap();
        assert_eq!(table.len(), 40);
        let ids: Vec<&str> = table.rows.iter().map(|r| r.district.id.0.as_str()).collect();
        assert!(!ids.contains(&"votes-only"));
        assert!(!ids.contains(&"demographics-only"));
        assert!(!ids.contains(&"no-target"));
        assert_eq!(
            table.attributes,
            vec!["down", "flat", "noise", "sparse", "up"]
        );
        // Missing observations are not zero-filled.
        assert_eq!(table.paired_values("sparse").0.len(), 25);
    }

    #[test]
    fn null_rates_do_not_create_columns() {
        let districts = vec![district("1", Some(1.0))];
        let records = vec![
            rate("1", "a", 2.0),
            DemographicRecord {
                district: DistrictId::new("1"),
                attribute: "b".to_string(),
                rate: None,
            },
        ];
        let table =
            join_districts(&districts, &records, "change", DuplicatePolicy::LastWriteWins).unwrap();
        assert_eq!(table.attributes, vec!["a"]);
    }

    #[test]
    fn duplicate_observations() {
        let districts = vec![district("1", Some(1.0))];
        let records = vec![rate("1", "a", 2.0), rate("1", "a", 5.0)];
        let table =
            join_districts(&districts, &records, "change", DuplicatePolicy::LastWriteWins).unwrap();
        assert_eq!(table.rows[0].rates.get("a"), Some(&5.0));

        let err = join_districts(&districts, &records, "change", DuplicatePolicy::Reject);
        assert_eq!(
            err,
            Err(CorrelationErrors::DuplicateObservation {
                district: DistrictId::new("1"),
                attribute: "a".to_string()
            })
        );

        let twice = vec![district("1", Some(1.0)), district("1", Some(2.0))];
        let table =
            join_districts(&twice, &records[..1], "change", DuplicatePolicy::LastWriteWins).unwrap();
        assert_eq!(table.rows[0].target, 2.0);
        assert_eq!(
            join_districts(&twice, &records[..1], "change", DuplicatePolicy::Reject),
            Err(CorrelationErrors::DuplicateDistrict(DistrictId::new("1")))
        );
    }

    #[test]
    fn missing_target_column() {
        let (districts, records) = fixture();
        assert_eq!(
            join_districts(&districts, &records, "other", DuplicatePolicy::LastWriteWins),
            Err(CorrelationErrors::MissingTarget("other".to_string()))
        );
    }

    #[test]
    fn full_sweep_filters_and_orders() {
        init();
        let (districts, records) = fixture();
        let table =
            join_districts(&districts, &records, "change", DuplicatePolicy::LastWriteWins).unwrap();
        let res = run_correlations(&table, &HashMap::new(), None, &AnalysisRules::FULL_SWEEP).unwrap();
        let ids: Vec<&str> = res.iter().map(|r| r.attribute_id()).collect();
        assert!(!ids.contains(&"flat"));
        assert!(!ids.contains(&"sparse"));
        assert_eq!(ids[0], "up");
        assert_eq!(ids[1], "down");

        let up = &res[0];
        assert!((up.pearson_r - 1.0).abs() < 1e-12);
        assert_eq!(up.sample_size, 40);
        assert_eq!(up.strength, Strength::Strong);
        assert_eq!(up.direction, Direction::Positive);
        assert!(up.significant);
        assert_eq!(up.spearman, None);
        assert_eq!(up.attribute.short_label(), "Unknown");

        let down = &res[1];
        assert!(down.pearson_r < -0.9 && down.pearson_r >= -1.0);
        assert_eq!(down.direction, Direction::Negative);

        for w in res.windows(2) {
            assert!(w[0].pearson_r.abs() >= w[1].pearson_r.abs());
        }
    }

    #[test]
    fn focused_rules_keep_small_samples() {
        let (districts, records) = fixture();
        let table =
            join_districts(&districts, &records, "change", DuplicatePolicy::LastWriteWins).unwrap();
        let selection = vec!["sparse".to_string(), "flat".to_string(), "unknown".to_string()];
        let res =
            run_correlations(&table, &HashMap::new(), Some(&selection), &AnalysisRules::FOCUSED)
                .unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].attribute_id(), "sparse");
        assert_eq!(res[0].sample_size, 25);
        // t^2 is monotonic in t for t >= 0: the ranks are identical.
        let sp = res[0].spearman.unwrap();
        assert!((sp.rho - 1.0).abs() < 1e-12);
    }

    #[test]
    fn skip_reasons() {
        let (districts, records) = fixture();
        let table =
            join_districts(&districts, &records, "change", DuplicatePolicy::LastWriteWins).unwrap();
        let rules = AnalysisRules::FULL_SWEEP;
        assert_eq!(
            evaluate_attribute(&table, "sparse", &rules),
            Err(SkipReason::InsufficientSample {
                observed: 25,
                required: 30
            })
        );
        assert_eq!(
            evaluate_attribute(&table, "flat", &rules),
            Err(SkipReason::ConstantAttribute)
        );
        assert_eq!(
            evaluate_attribute(&table, "absent", &rules),
            Err(SkipReason::InsufficientSample {
                observed: 0,
                required: 30
            })
        );
    }

    #[test]
    fn constant_target_is_skipped() {
        let mut districts = Vec::new();
        let mut records = Vec::new();
        for i in 0..12 {
            let id = i.to_string();
            districts.push(district(&id, Some(4.0)));
            records.push(rate(&id, "a", i as f64));
        }
        let table =
            join_districts(&districts, &records, "change", DuplicatePolicy::LastWriteWins).unwrap();
        assert_eq!(
            evaluate_attribute(&table, "a", &AnalysisRules::FOCUSED),
            Err(SkipReason::ConstantTarget)
        );
    }

    #[test]
    fn full_sized_example() {
        let mut districts = Vec::new();
        let mut records = Vec::new();
        for i in 0..338 {
            let id = format!("{}", 10001 + i);
            let mut d = DistrictRecord::new(DistrictId::new(&id));
            d.values
                .insert("cpc_change_21_25".to_string(), ((i * 13) % 17) as f64 - 8.0);
            districts.push(d);
            records.push(rate(&id, "2255", 20.0 + ((i * 5) % 11) as f64));
        }
        let table = join_districts(
            &districts,
            &records,
            "cpc_change_21_25",
            DuplicatePolicy::LastWriteWins,
        )
        .unwrap();
        assert_eq!(table.len(), 338);
        let res =
            run_correlations(&table, &HashMap::new(), None, &AnalysisRules::FULL_SWEEP).unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].attribute_id(), "2255");
        assert_eq!(res[0].sample_size, 338);
        assert!(res[0].pearson_r >= -1.0 && res[0].pearson_r <= 1.0);
    }

    #[test]
    fn empty_join_is_an_error() {
        let districts = vec![district("1", Some(1.0))];
        let records = vec![rate("2", "a", 1.0)];
        let table =
            join_districts(&districts, &records, "change", DuplicatePolicy::LastWriteWins).unwrap();
        assert!(table.is_empty());
        assert_eq!(
            run_correlations(&table, &HashMap::new(), None, &AnalysisRules::FULL_SWEEP),
            Err(CorrelationErrors::EmptyTable)
        );
    }

    #[test]
    fn invalid_rules() {
        let (districts, records) = fixture();
        let mut rules = AnalysisRules::FULL_SWEEP;
        rules.min_sample_size = 2;
        assert!(matches!(
            run_analysis(&districts, &records, &HashMap::new(), "change", None, &rules),
            Err(CorrelationErrors::InvalidRules(_))
        ));
        let mut rules = AnalysisRules::FULL_SWEEP;
        rules.significance_level = 1.5;
        assert!(rules.validate().is_err());
    }

    fn result(id: &str, r: f64, p: f64) -> CorrelationResult {
        CorrelationResult {
            attribute: AttributeInfo::unlabeled(id),
            pearson_r: r,
            p_value: p,
            sample_size: 100,
            strength: Strength::from_coefficient(r),
            direction: Direction::from_coefficient(r),
            significant: p < 0.05,
            spearman: None,
        }
    }

    #[test]
    fn ranking_partitions_significant_results() {
        let results = vec![
            result("a", 0.25, 0.01),
            result("b", -0.6, 0.0001),
            result("c", 0.7, 0.00001),
            result("d", -0.1, 0.3),
            result("e", -0.35, 0.001),
            result("f", 0.0, 1.0),
            result("g", 0.15, 0.049),
        ];
        let ranked = rank_results(&results);
        let ids = |v: &[CorrelationResult]| -> Vec<String> {
            v.iter().map(|r| r.attribute.id.clone()).collect()
        };
        assert_eq!(ids(&ranked.all), vec!["c", "b", "e", "a", "g", "d", "f"]);
        assert_eq!(ids(&ranked.significant), vec!["c", "b", "e", "a", "g"]);
        assert_eq!(ids(&ranked.positive), vec!["c", "a", "g"]);
        assert_eq!(ids(&ranked.negative), vec!["b", "e"]);
        assert_eq!(
            ranked.positive.len() + ranked.negative.len(),
            ranked.significant.len()
        );
        for r in ranked.significant.iter() {
            assert!(r.p_value < 0.05);
        }
    }

    #[test]
    fn strength_boundaries() {
        assert_eq!(Strength::from_coefficient(0.5), Strength::Strong);
        assert_eq!(Strength::from_coefficient(-0.5), Strength::Strong);
        assert_eq!(Strength::from_coefficient(0.3), Strength::Moderate);
        assert_eq!(Strength::from_coefficient(0.2), Strength::Weak);
        assert_eq!(Strength::from_coefficient(-0.2), Strength::Weak);
        assert_eq!(Strength::from_coefficient(0.1999), Strength::VeryWeak);
        assert_eq!(Strength::VeryWeak.label(), "Very Weak");
    }

    #[test]
    fn zero_coefficient_is_neutral() {
        assert_eq!(Direction::from_coefficient(0.0), Direction::Neutral);
        assert_eq!(Direction::from_coefficient(1e-9), Direction::Positive);
        assert_eq!(Direction::from_coefficient(-1e-9), Direction::Negative);
    }

    #[test]
    fn idempotent() {
        let (districts, records) = fixture();
        let rules = AnalysisRules::FOCUSED;
        let a = run_analysis(&districts, &records, &HashMap::new(), "change", None, &rules).unwrap();
        let b = run_analysis(&districts, &records, &HashMap::new(), "change", None, &rules).unwrap();
        assert_eq!(a, b);
        for (x, y) in a.all.iter().zip(b.all.iter()) {
            assert_eq!(x.pearson_r.to_bits(), y.pearson_r.to_bits());
            assert_eq!(x.p_value.to_bits(), y.p_value.to_bits());
        }
    }

    #[test]
    fn labels() {
        let info = AttributeInfo {
            id: "2255".to_string(),
            category: Some("Occupation".to_string()),
            subcategory: Some("Sales and service occupations".to_string()),
            subsubcategory: Some("".to_string()),
            description: None,
        };
        assert_eq!(info.short_label(), "Sales and service occupations");
        assert_eq!(
            info.full_label(),
            "Occupation → Sales and service occupations"
        );
        assert_eq!(AttributeInfo::unlabeled("x").full_label(), "Unknown");
        assert_eq!(DistrictId::from_number(35001.0), DistrictId::new("35001"));
        assert_eq!(DistrictId::from_number(1.5).0, "1.5");
        assert_eq!(DistrictId::new(" 35001.0"), DistrictId::from_number(35001.0));
        assert_eq!(DistrictId::new("35001.5").0, "35001.5");
        assert_eq!(DistrictId::new("Ajax").0, "Ajax");
    }
}
