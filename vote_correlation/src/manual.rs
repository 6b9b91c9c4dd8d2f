/*!

This is the long-form manual for `vote_correlation` and `votecorr`.

The program answers one question: which demographic characteristics of an
electoral district move together with the change of a party's vote share in
that district? It reads a vote table (one row per district) and a set of
demographic rates (one value per district and per attribute), joins them on the
district id and computes the correlation of every attribute with the vote
change.

## Inputs

### Vote table

A spreadsheet with one row per district and a header row. Both Excel (`.xlsx`)
and CSV files are supported. For Excel files, the first worksheet is used unless
a worksheet name is given.

The headers are normalized before use. The headers of the usual election exports
have fixed names:

| Header                       | Column name         |
|------------------------------|---------------------|
| Constituency ID              | `constituency_id`   |
| Riding Name                  | `riding_name`       |
| Riding Code                  | `riding_code`       |
| Province                     | `province`          |
| Region                       | `region`            |
| Subregion                    | `subregion`         |
| CPC % Change (2021→2025)     | `cpc_change_21_25`  |
| CPC % Change (2019→2025)     | `cpc_change_19_25`  |
| CPC % 2019                   | `cpc_pct_2019`      |
| CPC % 2021                   | `cpc_pct_2021`      |
| CPC % 2025                   | `cpc_pct_2025`      |

Any other header is lowercased and every run of characters that are not letters
or digits becomes a single `_`: `Liberal % 2025` becomes `liberal_2025`.

The rows without a district id or without a numeric value in the target column
are dropped.

### Demographic rates

With the `csv` provider, the rates are read from a CSV file with the columns
`constituency_id`, `characteristics_id` and either `rate` (a number) or `values`
(a JSON object, as exported from the database, of which the `rateTotal` field
is used). Blank rates are treated as missing, never as zero.

The labels of the attributes are read from an optional second CSV file with the
columns `characteristics_id`, `category`, `subcategory`, `subsubcategory` and
`description`.

With the `postgres` provider (only available when the program is compiled with
the `postgres` feature), both are read from the demographics database. The
connection string is never stored in the configuration file of a project that
is shared: pass it with `--source-uri` or the `VOTECORR_SOURCE_URI` environment
variable.

## The analysis

Only the districts present in both the vote table and the demographic data are
kept. For each attribute, the districts where the attribute is not observed are
left out of the computation of that attribute only.

An attribute is skipped when:
* fewer districts than the minimum sample size observe it
* it takes the same value in all these districts
* the vote change is the same in all these districts

Otherwise the Pearson correlation coefficient `r` is computed, along with its
two-tailed p-value (t-test with `n - 2` degrees of freedom). On demand, the
Spearman rank correlation is reported next to it.

The strength of a correlation depends on `|r|`:

| `|r|`       | Strength  |
|-------------|-----------|
| >= 0.5      | Strong    |
| >= 0.3      | Moderate  |
| >= 0.2      | Weak      |
| below       | Very Weak |

A correlation is significant when its p-value is below the significance level.

Two presets are available:

| Preset      | Minimum sample size | Significance level | Spearman |
|-------------|---------------------|--------------------|----------|
| `fullSweep` | 30                  | 0.05               | no       |
| `focused`   | 10                  | 0.05               | yes      |

`fullSweep` is meant for a sweep over every attribute of the database, `focused`
for a handful of selected attributes. When no preset is given, `focused` is used
if attributes are selected and `fullSweep` otherwise.

## Configuration file

All the settings can be given on the command line. For repeated analyses, they
are better kept in a JSON file. Relative paths are resolved against the
directory of the configuration file.

```json
{
  "outputSettings": {
    "analysisName": "CPC change vs occupations",
    "outputDirectory": "output",
    "targetLabel": "CPC % Change (2021→2025)",
    "formats": ["xlsx", "csv", "json", "chart"]
  },
  "voteSource": {
    "provider": "xlsx",
    "filePath": "riding_results.xlsx",
    "worksheetName": "Results",
    "idColumn": "constituency_id",
    "targetColumn": "cpc_change_21_25",
    "nameColumn": "riding_name",
    "regionColumn": "province",
    "columnAliases": { "Swing": "cpc_swing" }
  },
  "demographicSource": {
    "provider": "csv",
    "ratesFilePath": "rates.csv",
    "attributesFilePath": "attributes.csv"
  },
  "analysis": {
    "preset": "focused",
    "attributeIds": ["2255", "2256"],
    "minSampleSize": 10,
    "significanceLevel": 0.05,
    "computeSpearman": true,
    "duplicatePolicy": "lastWriteWins",
    "topN": 15
  }
}
```

Only `outputSettings.analysisName` and `voteSource.filePath` are required.

`duplicatePolicy` tells what to do when a district has two rates for the same
attribute (or appears twice in the vote table): `lastWriteWins` keeps the last
value and logs a warning, `reject` stops the analysis.

## Outputs

The output files are named after the analysis name:

* `{name}_correlation_report.xlsx`: one sheet per view of the results (all the
  significant correlations, the positive ones, the negative ones, all the
  results) and a summary sheet.
* `{name}_correlations.csv`: all the results.
* `{name}_merged_data.csv`: the joined table, one row per district.
* `{name}_summary.json`: the settings of the run and the ranked results.
* `{name}_top_correlations.svg`: the strongest positive and negative
  correlations, with stars for the significance (`***` p < 0.001, `**` p < 0.01,
  `*` p < 0.05).

If a reference summary is passed with `--reference`, the computed summary is
compared with it and the program fails if they differ.

*/
