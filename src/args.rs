use clap::Parser;

/// Converts the Texas DSHS county case count workbook into a JSON document.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file describing the source URL, the sheets, the header spellings and
    /// the population reference. All the entries are optional and default to the current layout of the
    /// DSHS workbook.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path, optional) An existing workbook to read instead of downloading it. Nothing is fetched
    /// when this option is given.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (URL) The location of the workbook. Setting this option overrides the URL of the --config file.
    #[clap(long, value_parser)]
    pub url: Option<String>,

    /// (file path) The population reference in CSV format. Setting this option overrides the path of
    /// the --config file.
    #[clap(short, long, value_parser)]
    pub population: Option<String>,

    /// (file path or 'stdout') Where the JSON document is written. Setting this option overrides the
    /// path of the --config file.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference JSON document. If provided, the run fails when the produced document
    /// differs from it, and nothing is written.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard error.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
