// The narrative summary and the JSON summary of a run.

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::corr::{config_reader::AnalysisConfig, io_common::simplify_file_name, *};

const RULE_WIDTH: usize = 100;

fn duplicate_policy_name(p: DuplicatePolicy) -> &'static str {
    match p {
        DuplicatePolicy::LastWriteWins => "lastWriteWins",
        DuplicatePolicy::Reject => "reject",
    }
}

fn signed(r: f64) -> String {
    format!("{:+.4}", r)
}

/// The text summary of the results, one line per entry.
pub fn narrative_lines(ranked: &RankedResults, top_n: usize) -> Vec<String> {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines: Vec<String> = Vec::new();
    lines.push(rule.clone());
    lines.push(format!(
        "TOP {} STRONGEST CORRELATIONS (statistically significant)",
        top_n
    ));
    lines.push(rule.clone());
    for (idx, r) in ranked.significant.iter().take(top_n).enumerate() {
        lines.push(format!(
            "{:>3}. r = {}  |  {}",
            idx + 1,
            signed(r.pearson_r),
            r.attribute.short_label()
        ));
    }

    lines.push(rule.clone());
    lines.push(format!(
        "TOP {} POSITIVE (higher rate, larger vote change)",
        top_n
    ));
    lines.push(rule.clone());
    for r in ranked.positive.iter().take(top_n) {
        lines.push(format!(
            "  r = {}  |  {}",
            signed(r.pearson_r),
            r.attribute.short_label()
        ));
    }

    lines.push(rule.clone());
    lines.push(format!(
        "TOP {} NEGATIVE (higher rate, smaller vote change)",
        top_n
    ));
    lines.push(rule.clone());
    for r in ranked.negative.iter().take(top_n) {
        lines.push(format!(
            "  r = {}  |  {}",
            signed(r.pearson_r),
            r.attribute.short_label()
        ));
    }

    let total = ranked.all.len();
    let significant = ranked.significant.len();
    let pct = if total > 0 {
        100.0 * (significant as f64) / (total as f64)
    } else {
        0.0
    };
    lines.push(rule.clone());
    lines.push("SUMMARY STATISTICS".to_string());
    lines.push(rule.clone());
    lines.push(format!("   Total demographics tested: {}", total));
    lines.push(format!(
        "   Statistically significant: {} ({:.1}%)",
        significant, pct
    ));
    lines.push(format!("   Positive correlations: {}", ranked.positive.len()));
    lines.push(format!("   Negative correlations: {}", ranked.negative.len()));
    let strongest = |d: Direction| ranked.all.iter().find(|r| r.direction == d);
    if let Some(r) = strongest(Direction::Positive) {
        lines.push(format!("   Strongest positive r: {:.4}", r.pearson_r));
    }
    if let Some(r) = strongest(Direction::Negative) {
        lines.push(format!("   Strongest negative r: {:.4}", r.pearson_r));
    }
    lines
}

pub fn log_summary(ranked: &RankedResults, top_n: usize) {
    for line in narrative_lines(ranked, top_n) {
        info!("{}", line);
    }
}

fn result_to_json(r: &CorrelationResult) -> JSValue {
    let mut js = json!({
        "attributeId": r.attribute.id,
        "label": r.attribute.full_label(),
        "pearsonR": r.pearson_r,
        "pValue": r.p_value,
        "sampleSize": r.sample_size,
        "strength": r.strength.label(),
        "direction": r.direction.label(),
        "significant": r.significant,
    });
    if let Some(s) = &r.spearman {
        js["spearmanRho"] = json!(s.rho);
        js["spearmanPValue"] = json!(s.p_value);
    }
    js
}

/// The summary of a run: the settings and the ranked results.
///
/// File locations are reduced to file names so that summaries can be compared
/// across machines.
pub fn build_summary_js(
    config: &AnalysisConfig,
    rules: &AnalysisRules,
    joined_districts: usize,
    ranked: &RankedResults,
) -> JSValue {
    let ids = |v: &[CorrelationResult]| -> Vec<String> {
        v.iter().map(|r| r.attribute.id.clone()).collect()
    };
    json!({
        "config": {
            "analysisName": config.output_settings.analysis_name,
            "voteFile": simplify_file_name(&config.vote_source.file_path),
            "target": config.vote_source.target(),
            "targetLabel": config.output_settings.target_label,
            "demographicProvider": config.demographic_source.provider,
            "attributeIds": config.analysis.attribute_ids,
        },
        "rules": {
            "minSampleSize": rules.min_sample_size,
            "significanceLevel": rules.significance_level,
            "computeSpearman": rules.compute_spearman,
            "duplicatePolicy": duplicate_policy_name(rules.duplicate_policy),
        },
        "joinedDistricts": joined_districts,
        "totals": {
            "analyzed": ranked.all.len(),
            "significant": ranked.significant.len(),
            "positive": ranked.positive.len(),
            "negative": ranked.negative.len(),
        },
        "positive": ids(&ranked.positive),
        "negative": ids(&ranked.negative),
        "results": ranked.all.iter().map(result_to_json).collect::<Vec<JSValue>>(),
    })
}

pub fn write_summary(path: &Path, js: &JSValue) -> CorrResult<()> {
    let path_s = path.display().to_string();
    let pretty = serde_json::to_string_pretty(js).context(ParsingJsonSnafu {})?;
    fs::write(path, pretty).context(WritingFileSnafu { path: path_s })?;
    Ok(())
}

pub fn read_summary(path: &str) -> CorrResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

/// Compares the summary with a reference file. Prints the differences and fails
/// if they do not match.
pub fn check_against_reference(summary_js: &JSValue, reference_path: &str) -> CorrResult<()> {
    let summary_ref = read_summary(reference_path)?;
    debug!("check_against_reference: reference: {:?}", summary_ref);
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    // Both sides go through the same text round trip before the comparison.
    let written = serde_json::to_string_pretty(summary_js).context(ParsingJsonSnafu {})?;
    let reparsed: JSValue = serde_json::from_str(&written).context(ParsingJsonSnafu {})?;
    let pretty_js_stats = serde_json::to_string_pretty(&reparsed).context(ParsingJsonSnafu {})?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference string");
        print_diff(
            pretty_js_summary_ref.as_str(),
            pretty_js_stats.as_ref(),
            "\n",
        );
        return ReferenceMismatchSnafu {
            path: reference_path,
        }
        .fail();
    }
    info!("The summary matches the reference {:?}", reference_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, r: f64, p: f64) -> CorrelationResult {
        CorrelationResult {
            attribute: AttributeInfo {
                id: id.to_string(),
                category: Some("Occupation".to_string()),
                subcategory: Some(format!("Job {}", id)),
                ..Default::default()
            },
            pearson_r: r,
            p_value: p,
            sample_size: 338,
            strength: Strength::from_coefficient(r),
            direction: Direction::from_coefficient(r),
            significant: p < 0.05,
            spearman: None,
        }
    }

    fn ranked() -> RankedResults {
        rank_results(&[
            result("1", 0.52, 1e-9),
            result("2", -0.33, 1e-6),
            result("3", 0.08, 0.14),
            result("4", -0.02, 0.71),
        ])
    }

    #[test]
    fn narrative() {
        let lines = narrative_lines(&ranked(), 10);
        assert!(lines.contains(&"  1. r = +0.5200  |  Job 1".to_string()));
        assert!(lines.contains(&"  2. r = -0.3300  |  Job 2".to_string()));
        assert!(lines.contains(&"   Total demographics tested: 4".to_string()));
        assert!(lines.contains(&"   Statistically significant: 2 (50.0%)".to_string()));
        assert!(lines.contains(&"   Strongest positive r: 0.5200".to_string()));
        assert!(lines.contains(&"   Strongest negative r: -0.3300".to_string()));
        // Non-significant results are not listed.
        assert!(!lines.iter().any(|l| l.contains("Job 3")));

        let empty = narrative_lines(&rank_results(&[]), 10);
        assert!(empty.contains(&"   Statistically significant: 0 (0.0%)".to_string()));
        assert!(!empty.iter().any(|l| l.contains("Strongest")));
    }

    #[test]
    fn narrative_rules() {
        let lines = narrative_lines(&ranked(), 10);
        assert_eq!(lines[0], "=".repeat(100));
        assert_eq!(lines.iter().filter(|l| l.starts_with('=')).count(), 8);
    }

    #[test]
    fn summary_json() {
        let config = AnalysisConfig::from_input("/data/votes.xlsx");
        let js = build_summary_js(&config, &AnalysisRules::FULL_SWEEP, 338, &ranked());
        assert_eq!(js["config"]["voteFile"], json!("votes.xlsx"));
        assert_eq!(js["rules"]["minSampleSize"], json!(30));
        assert_eq!(js["totals"]["significant"], json!(2));
        assert_eq!(js["positive"], json!(["1"]));
        assert_eq!(js["negative"], json!(["2"]));
        assert_eq!(js["results"][0]["label"], json!("Occupation → Job 1"));
        assert_eq!(js["results"][3]["attributeId"], json!("4"));
        assert!(js["results"][0].get("spearmanRho").is_none());
    }

    #[test]
    fn reference_comparison() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("summary.json");
        let config = AnalysisConfig::from_input("votes.csv");
        let js = build_summary_js(&config, &AnalysisRules::FULL_SWEEP, 338, &ranked());
        write_summary(&p, &js).unwrap();
        let p_s = p.display().to_string();
        assert!(check_against_reference(&js, &p_s).is_ok());

        let other = build_summary_js(&config, &AnalysisRules::FOCUSED, 338, &ranked());
        assert!(matches!(
            check_against_reference(&other, &p_s),
            Err(CorrError::ReferenceMismatch { .. })
        ));
        assert!(matches!(
            check_against_reference(&js, "missing.json"),
            Err(CorrError::OpeningJson { .. })
        ));
    }
}
