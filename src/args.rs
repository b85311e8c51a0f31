use clap::Parser;

/// This is the summary dashboard of the eCHIS community health worker survey.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the dashboard: data source, filters and output.
    /// The options below override the values of this file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference file containing the expected dashboard in JSON format. If provided, echisdash will
    /// check that the computed dashboard matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the dashboard will be written in JSON format to the given
    /// location. Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or URL) The location of the survey data. Setting this option overrides what may be specified
    /// with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (default csv) The type of the input: csv, excel or kobo.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (default: the only worksheet) When using an Excel file, indicates the name of the worksheet to use.
    /// The eCHIS exports use 'CHW eCHIS'.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (Both, Gabo or Gore) Only keep the submissions of this gender.
    #[clap(long, value_parser)]
    pub gender: Option<String>,

    /// (YYYY-MM-DD) First submission date to include. Defaults to the earliest date in the data.
    #[clap(long, value_parser)]
    pub start_date: Option<String>,

    /// (YYYY-MM-DD) Last submission date to include. Defaults to the latest date in the data.
    #[clap(long, value_parser)]
    pub end_date: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
