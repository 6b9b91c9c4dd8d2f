// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

/// The identifier of an electoral district.
///
/// Identifiers are kept as strings. Spreadsheets tend to store integer ids as
/// floating point cells, use [DistrictId::from_number] for those. Text exports of
/// such cells ("35001.0") are brought back to the integer form by [DistrictId::new].
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct DistrictId(pub String);

impl DistrictId {
    pub fn new(s: &str) -> DistrictId {
        let t = s.trim();
        match t.parse::<f64>() {
            Ok(x) if x.is_finite() && x.fract() == 0.0 && t.contains('.') => {
                DistrictId::from_number(x)
            }
            _ => DistrictId(t.to_string()),
        }
    }

    /// Integral values are rendered without a fractional part: 35001.0 -> "35001".
    pub fn from_number(x: f64) -> DistrictId {
        if x.fract() == 0.0 && x.abs() < 1e15 {
            DistrictId(format!("{}", x as i64))
        } else {
            DistrictId(x.to_string())
        }
    }
}

impl Display for DistrictId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the vote table.
#[derive(PartialEq, Debug, Clone)]
pub struct DistrictRecord {
    pub id: DistrictId,
    pub name: Option<String>,
    pub region: Option<String>,
    /// The numeric columns of the row, keyed by canonical column name
    /// (vote percentages, percentage-point changes, ...).
    pub values: BTreeMap<String, f64>,
}

impl DistrictRecord {
    pub fn new(id: DistrictId) -> DistrictRecord {
        DistrictRecord {
            id,
            name: None,
            region: None,
            values: BTreeMap::new(),
        }
    }

    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).cloned()
    }
}

/// A single demographic observation: the rate of one attribute in one district.
#[derive(PartialEq, Debug, Clone)]
pub struct DemographicRecord {
    pub district: DistrictId,
    pub attribute: String,
    pub rate: Option<f64>,
}

/// Reference data about a demographic attribute.
///
/// The labels go from the broadest (category) to the most specific
/// (subsubcategory). Any of them may be missing.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct AttributeInfo {
    pub id: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub subsubcategory: Option<String>,
    pub description: Option<String>,
}

impl AttributeInfo {
    pub fn unlabeled(id: &str) -> AttributeInfo {
        AttributeInfo {
            id: id.to_string(),
            ..Default::default()
        }
    }

    fn levels(&self) -> Vec<&str> {
        [&self.category, &self.subcategory, &self.subsubcategory]
            .iter()
            .filter_map(|l| l.as_deref())
            .filter(|l| !l.is_empty())
            .collect()
    }

    /// The most specific label available, or "Unknown".
    pub fn short_label(&self) -> String {
        self.levels()
            .last()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// All the available labels, broadest first.
    pub fn full_label(&self) -> String {
        let levels = self.levels();
        if levels.is_empty() {
            "Unknown".to_string()
        } else {
            levels.join(" → ")
        }
    }
}

// ******** Joined data structures *********

/// A district that is present both in the vote table and in the demographic data.
#[derive(PartialEq, Debug, Clone)]
pub struct JoinedRow {
    pub district: DistrictRecord,
    /// The value of the target (vote change) column for this district.
    pub target: f64,
    /// Attribute id -> rate. Missing observations are absent, never zero.
    pub rates: BTreeMap<String, f64>,
}

/// The wide table produced by the joiner.
///
/// Rows are sorted by district id and attributes by attribute id.
#[derive(PartialEq, Debug, Clone)]
pub struct JoinedTable {
    pub target_column: String,
    pub rows: Vec<JoinedRow>,
    /// Every attribute with at least one observation in the rows.
    pub attributes: Vec<String>,
}

impl JoinedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.binary_search_by(|a| a.as_str().cmp(attribute)).is_ok()
    }

    /// The (attribute, target) pairs for the rows where the attribute is observed.
    pub fn paired_values(&self, attribute: &str) -> (Vec<f64>, Vec<f64>) {
        let mut xs: Vec<f64> = Vec::new();
        let mut ys: Vec<f64> = Vec::new();
        for row in self.rows.iter() {
            if let Some(x) = row.rates.get(attribute) {
                if x.is_finite() && row.target.is_finite() {
                    xs.push(*x);
                    ys.push(row.target);
                }
            }
        }
        (xs, ys)
    }
}

// ******** Output data structures *********

/// Strength of a correlation, by absolute value of the coefficient.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Strength {
    Strong,
    Moderate,
    Weak,
    VeryWeak,
}

impl Strength {
    pub const STRONG_THRESHOLD: f64 = 0.5;
    pub const MODERATE_THRESHOLD: f64 = 0.3;
    pub const WEAK_THRESHOLD: f64 = 0.2;

    pub fn from_coefficient(r: f64) -> Strength {
        let abs_r = r.abs();
        if abs_r >= Strength::STRONG_THRESHOLD {
            Strength::Strong
        } else if abs_r >= Strength::MODERATE_THRESHOLD {
            Strength::Moderate
        } else if abs_r >= Strength::WEAK_THRESHOLD {
            Strength::Weak
        } else {
            Strength::VeryWeak
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Strength::Strong => "Strong",
            Strength::Moderate => "Moderate",
            Strength::Weak => "Weak",
            Strength::VeryWeak => "Very Weak",
        }
    }
}

/// Sign of a correlation. A coefficient of exactly zero has no direction.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Direction {
    Positive,
    Negative,
    Neutral,
}

impl Direction {
    pub fn from_coefficient(r: f64) -> Direction {
        if r > 0.0 {
            Direction::Positive
        } else if r < 0.0 {
            Direction::Negative
        } else {
            Direction::Neutral
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Positive => "Positive",
            Direction::Negative => "Negative",
            Direction::Neutral => "Neutral",
        }
    }
}

/// Spearman's rank correlation, reported next to the Pearson coefficient.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct RankCorrelation {
    pub rho: f64,
    pub p_value: f64,
}

/// The correlation between one attribute and the target column.
#[derive(PartialEq, Debug, Clone)]
pub struct CorrelationResult {
    pub attribute: AttributeInfo,
    pub pearson_r: f64,
    /// Two-tailed p-value of the Pearson coefficient.
    pub p_value: f64,
    pub sample_size: usize,
    pub strength: Strength,
    pub direction: Direction,
    pub significant: bool,
    pub spearman: Option<RankCorrelation>,
}

impl CorrelationResult {
    pub fn attribute_id(&self) -> &str {
        self.attribute.id.as_str()
    }

    pub fn r_squared(&self) -> f64 {
        self.pearson_r * self.pearson_r
    }
}

/// The results, in the different orders used by the reports.
#[derive(PartialEq, Debug, Clone)]
pub struct RankedResults {
    /// All the results, by decreasing absolute coefficient.
    pub all: Vec<CorrelationResult>,
    /// The significant results, by decreasing absolute coefficient.
    pub significant: Vec<CorrelationResult>,
    /// The significant positive results, strongest first.
    pub positive: Vec<CorrelationResult>,
    /// The significant negative results, most negative first.
    pub negative: Vec<CorrelationResult>,
}

/// Errors that prevent the analysis from completing.
#[derive(PartialEq, Debug, Clone)]
pub enum CorrelationErrors {
    EmptyTable,
    MissingTarget(String),
    InvalidRules(String),
    DuplicateObservation {
        district: DistrictId,
        attribute: String,
    },
    DuplicateDistrict(DistrictId),
}

impl Error for CorrelationErrors {}

impl Display for CorrelationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrelationErrors::EmptyTable => {
                write!(f, "no district is present in both the vote table and the demographic data")
            }
            CorrelationErrors::MissingTarget(col) => {
                write!(f, "no district has a value for the target column {:?}", col)
            }
            CorrelationErrors::InvalidRules(msg) => write!(f, "invalid analysis rules: {}", msg),
            CorrelationErrors::DuplicateObservation {
                district,
                attribute,
            } => write!(
                f,
                "attribute {} has more than one rate for district {}",
                attribute, district
            ),
            CorrelationErrors::DuplicateDistrict(id) => {
                write!(f, "district {} appears more than once in the vote table", id)
            }
        }
    }
}

// ********* Configuration **********

/// What to do when a (district, attribute) pair or a district id is seen twice.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum DuplicatePolicy {
    /// Keep the last value and log a warning.
    LastWriteWins,
    /// Fail the join.
    Reject,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct AnalysisRules {
    /// Minimum number of districts with both an attribute value and a target value.
    pub min_sample_size: usize,
    pub significance_level: f64,
    pub compute_spearman: bool,
    pub duplicate_policy: DuplicatePolicy,
}

impl AnalysisRules {
    /// Sweep over every known attribute.
    pub const FULL_SWEEP: AnalysisRules = AnalysisRules {
        min_sample_size: 30,
        significance_level: 0.05,
        compute_spearman: false,
        duplicate_policy: DuplicatePolicy::LastWriteWins,
    };

    /// A handful of hand-picked attributes, with the rank correlation as a cross-check.
    pub const FOCUSED: AnalysisRules = AnalysisRules {
        min_sample_size: 10,
        significance_level: 0.05,
        compute_spearman: true,
        duplicate_policy: DuplicatePolicy::LastWriteWins,
    };

    pub fn validate(&self) -> Result<(), CorrelationErrors> {
        // The t-test needs at least one degree of freedom.
        if self.min_sample_size < 3 {
            return Err(CorrelationErrors::InvalidRules(format!(
                "min_sample_size must be at least 3, got {}",
                self.min_sample_size
            )));
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(CorrelationErrors::InvalidRules(format!(
                "significance_level must be in (0, 1), got {}",
                self.significance_level
            )));
        }
        Ok(())
    }
}
