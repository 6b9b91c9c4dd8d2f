use clap::Parser;

/// Finds the demographic characteristics of electoral districts that correlate with
/// the change of a party's vote share.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the analysis. Relative paths in
    /// this file are resolved against its directory. The other options override its content.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The vote table, one row per district (xlsx or csv).
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (xlsx or csv) The type of the vote table. Guessed from the file extension by default.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// When using an Excel file, the name of the worksheet to use. The first worksheet by default.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (column name, default cpc_change_21_25) The vote change column of the vote table.
    #[clap(short, long, value_parser)]
    pub target: Option<String>,

    /// (file path) CSV file with the demographic rates: constituency_id, characteristics_id
    /// and either rate or values.
    #[clap(long, value_parser)]
    pub rates: Option<String>,

    /// (file path) CSV file with the labels of the attributes: characteristics_id, category,
    /// subcategory, subsubcategory, description.
    #[clap(long, value_parser)]
    pub attributes: Option<String>,

    /// Connection string of the demographics database. Requires the postgres feature.
    #[clap(long, value_parser, env = "VOTECORR_SOURCE_URI", hide_env_values = true)]
    pub source_uri: Option<String>,

    /// (attribute id, repeatable) Restricts the analysis to these attributes.
    #[clap(short = 'a', long = "attribute", value_parser)]
    pub select: Vec<String>,

    /// (fullSweep or focused) The preset thresholds. focused if attributes are selected,
    /// fullSweep otherwise.
    #[clap(long, value_parser)]
    pub preset: Option<String>,

    /// The minimum number of districts observing an attribute.
    #[clap(long, value_parser)]
    pub min_sample_size: Option<usize>,

    /// If passed as an argument, also computes the Spearman rank correlation.
    #[clap(long, takes_value = false)]
    pub spearman: bool,

    /// The number of entries in the top lists and in the chart.
    #[clap(long, value_parser)]
    pub top_n: Option<usize>,

    /// (directory) Where the reports are written. Overrides the output directory of the
    /// configuration file.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (list of comma-separated values) The reports to write among xlsx, csv, json and chart.
    /// All of them by default.
    #[clap(long, value_parser, use_value_delimiter = true)]
    pub formats: Option<Vec<String>>,

    /// (file path) A reference summary in JSON format. If provided, votecorr will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
