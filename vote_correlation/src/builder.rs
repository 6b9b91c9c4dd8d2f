pub use crate::config::*;

use std::collections::HashMap;

/// A builder for assembling an analysis in memory.
///
/// It is the simplest entry point when the data does not come from files.
///
/// ```
/// pub use vote_correlation::builder::Builder;
/// pub use vote_correlation::AnalysisRules;
/// # use vote_correlation::CorrelationErrors;
///
/// let mut builder = Builder::new(&AnalysisRules::FOCUSED)?.target("cpc_change_21_25");
///
/// for (idx, change) in [-2.0, 0.5, 1.0, 3.5, 4.0, 6.5, 7.0, 8.0, 9.5, 12.0].iter().enumerate() {
///     let district = format!("{}", 35001 + idx);
///     builder.add_district_simple(&district, *change);
///     builder.add_rate(&district, "2255", 10.0 + (idx as f64) * 1.5);
/// }
///
/// let ranked = builder.run()?;
/// assert_eq!(ranked.all.len(), 1);
/// # Ok::<(), CorrelationErrors>(())
/// ```
pub struct Builder {
    pub(crate) _rules: AnalysisRules,
    pub(crate) _target: String,
    pub(crate) _selection: Option<Vec<String>>,
    pub(crate) _districts: Vec<DistrictRecord>,
    pub(crate) _records: Vec<DemographicRecord>,
    pub(crate) _attributes: HashMap<String, AttributeInfo>,
}

impl Builder {
    pub const DEFAULT_TARGET: &'static str = "cpc_change_21_25";

    pub fn new(rules: &AnalysisRules) -> Result<Builder, CorrelationErrors> {
        rules.validate()?;
        Ok(Builder {
            _rules: *rules,
            _target: Builder::DEFAULT_TARGET.to_string(),
            _selection: None,
            _districts: Vec::new(),
            _records: Vec::new(),
            _attributes: HashMap::new(),
        })
    }

    /// Sets the name of the vote change column.
    pub fn target(self, column: &str) -> Builder {
        Builder {
            _target: column.to_string(),
            ..self
        }
    }

    /// Restricts the analysis to the given attributes.
    pub fn select(self, attribute_ids: &[String]) -> Builder {
        Builder {
            _selection: Some(attribute_ids.to_vec()),
            ..self
        }
    }

    /// Adds a district with only its vote change value.
    pub fn add_district_simple(&mut self, id: &str, target_value: f64) {
        let mut d = DistrictRecord::new(DistrictId::new(id));
        d.values.insert(self._target.clone(), target_value);
        self._districts.push(d);
    }

    pub fn add_district(&mut self, record: DistrictRecord) {
        self._districts.push(record);
    }

    pub fn add_rate(&mut self, district: &str, attribute: &str, rate: f64) {
        self._records.push(DemographicRecord {
            district: DistrictId::new(district),
            attribute: attribute.to_string(),
            rate: Some(rate),
        });
    }

    pub fn add_record(&mut self, record: DemographicRecord) {
        self._records.push(record);
    }

    pub fn describe_attribute(&mut self, info: AttributeInfo) {
        self._attributes.insert(info.id.clone(), info);
    }

    /// The joined table, as the engine will see it.
    pub fn table(&self) -> Result<JoinedTable, CorrelationErrors> {
        crate::join_districts(
            &self._districts,
            &self._records,
            &self._target,
            self._rules.duplicate_policy,
        )
    }

    pub fn run(&self) -> Result<RankedResults, CorrelationErrors> {
        crate::run_analysis(
            &self._districts,
            &self._records,
            &self._attributes,
            &self._target,
            self._selection.as_deref(),
            &self._rules,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_end_to_end() {
        let mut builder = Builder::new(&AnalysisRules::FOCUSED).unwrap().target("change");
        for i in 0..12 {
            let id = i.to_string();
            builder.add_district_simple(&id, i as f64);
            builder.add_rate(&id, "a", 100.0 - 2.0 * (i as f64));
            builder.add_rate(&id, "b", (i % 2) as f64);
        }
        builder.describe_attribute(AttributeInfo {
            id: "a".to_string(),
            category: Some("Occupation".to_string()),
            subcategory: Some("Trades".to_string()),
            subsubcategory: None,
            description: None,
        });
        let ranked = builder.run().unwrap();
        assert_eq!(ranked.all.len(), 2);
        assert_eq!(ranked.all[0].attribute.short_label(), "Trades");
        assert_eq!(ranked.negative.len(), 1);
        assert_eq!(ranked.negative[0].attribute_id(), "a");
        assert!(ranked.all[0].spearman.is_some());
    }

    #[test]
    fn builder_selection() {
        let mut builder = Builder::new(&AnalysisRules::FOCUSED)
            .unwrap()
            .target("change")
            .select(&["b".to_string()]);
        for i in 0..12 {
            let id = i.to_string();
            builder.add_district_simple(&id, i as f64);
            builder.add_rate(&id, "a", i as f64);
            builder.add_rate(&id, "b", (i * i) as f64);
        }
        assert_eq!(builder.table().unwrap().attributes, vec!["a", "b"]);
        let ranked = builder.run().unwrap();
        assert_eq!(ranked.all.len(), 1);
        assert_eq!(ranked.all[0].attribute_id(), "b");
    }

    #[test]
    fn builder_rejects_invalid_rules() {
        let mut rules = AnalysisRules::FULL_SWEEP;
        rules.min_sample_size = 0;
        assert!(Builder::new(&rules).is_err());
    }
}
