use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use survey_tally::filter::{FilterSettings, GenderFilter};

use crate::args::Args;
use crate::dash::panels::PanelSettings;
use crate::dash::*;

pub const DEFAULT_TOKEN_ENV: &str = "KOBO_API_TOKEN";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_DASHBOARD_NAME: &str = "eCHIS Community Health Worker Dashboard";

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    #[serde(rename = "dashboardName")]
    pub dashboard_name: Option<String>,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
    /// The number of villages the survey should cover. It is used for the completion rate.
    #[serde(rename = "expectedVillages")]
    pub expected_villages: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct DataSourceConfig {
    pub provider: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    pub url: Option<String>,
    pub token: Option<String>,
    #[serde(rename = "tokenEnv")]
    pub token_env: Option<String>,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterConfig {
    pub gender: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct DashboardConfig {
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    #[serde(rename = "dataSource", default)]
    pub data_source: DataSourceConfig,
    #[serde(default)]
    pub filters: FilterConfig,
}

/// A validated data source.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum DataSource {
    Csv {
        path: String,
    },
    Excel {
        path: String,
        worksheet: Option<String>,
    },
    Kobo {
        url: String,
        token: Option<String>,
        token_env: String,
        timeout: Duration,
    },
}

impl DataSource {
    /// The file or URL to read. It never includes the API token.
    pub fn location(&self) -> &str {
        match self {
            DataSource::Csv { path } => path,
            DataSource::Excel { path, .. } => path,
            DataSource::Kobo { url, .. } => url,
        }
    }
}

impl DashboardConfig {
    pub fn dashboard_name(&self) -> String {
        self.output_settings
            .dashboard_name
            .clone()
            .unwrap_or_else(|| DEFAULT_DASHBOARD_NAME.to_string())
    }

    /// Checks the data source. When no provider is given, it is guessed from the
    /// location: URLs are read from KoboToolbox, .xlsx files with Excel, anything else as CSV.
    pub fn data_source(&self) -> DashResult<DataSource> {
        let ds = &self.data_source;
        let location = ds.url.clone().or_else(|| ds.file_path.clone());
        let provider = match (&ds.provider, &location) {
            (Some(p), _) => p.to_lowercase(),
            (None, Some(l)) if l.starts_with("http://") || l.starts_with("https://") => {
                "kobo".to_string()
            }
            (None, Some(l)) if l.ends_with(".xlsx") || l.ends_with(".xlsm") => "excel".to_string(),
            (None, Some(_)) => "csv".to_string(),
            (None, None) => {
                return MissingParameterSnafu {
                    name: "dataSource.filePath",
                }
                .fail()
            }
        };
        let file_path = || {
            ds.file_path.clone().context(MissingParameterSnafu {
                name: "dataSource.filePath",
            })
        };
        match provider.as_str() {
            "csv" => Ok(DataSource::Csv { path: file_path()? }),
            "excel" | "xlsx" => Ok(DataSource::Excel {
                path: file_path()?,
                worksheet: ds.excel_worksheet_name.clone(),
            }),
            "kobo" => Ok(DataSource::Kobo {
                url: location.context(MissingParameterSnafu {
                    name: "dataSource.url",
                })?,
                token: ds.token.clone(),
                token_env: ds
                    .token_env
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TOKEN_ENV.to_string()),
                timeout: Duration::from_secs(ds.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)),
            }),
            _ => UnknownProviderSnafu { provider }.fail(),
        }
    }

    pub fn panel_settings(&self) -> PanelSettings {
        PanelSettings {
            expected_villages: self.output_settings.expected_villages,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> DashResult<FilterSettings> {
        Ok(FilterSettings {
            gender: parse_gender(self.gender.as_deref())?,
            start: parse_date(self.start_date.as_deref())?,
            end: parse_date(self.end_date.as_deref())?,
        })
    }
}

pub fn parse_gender(value: Option<&str>) -> DashResult<GenderFilter> {
    match value.map(|s| s.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("both") | Some("all") => Ok(GenderFilter::All),
        Some("gabo") => Ok(GenderFilter::Only("Gabo".to_string())),
        Some("gore") => Ok(GenderFilter::Only("Gore".to_string())),
        Some(_) => InvalidGenderSnafu {
            value: value.unwrap_or_default(),
        }
        .fail(),
    }
}

pub fn parse_date(value: Option<&str>) -> DashResult<Option<NaiveDate>> {
    match value.map(|s| s.trim()) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .context(InvalidDateSnafu { value: s }),
    }
}

/// Reads the configuration file. Relative file paths are resolved against the
/// directory of the configuration file.
pub fn read_config(path: &str) -> DashResult<DashboardConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let mut config: DashboardConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    if let Some(fp) = config.data_source.file_path.clone() {
        let root = Path::new(path).parent().context(MissingParentDirSnafu {})?;
        if Path::new(&fp).is_relative() {
            let p: PathBuf = [root, Path::new(&fp)].iter().collect();
            config.data_source.file_path = Some(p.as_path().display().to_string());
        }
    }
    Ok(config)
}

/// The command line arguments take precedence over the configuration file.
pub fn apply_args(config: &mut DashboardConfig, args: &Args) {
    if let Some(t) = &args.input_type {
        config.data_source.provider = Some(t.clone());
    }
    if let Some(input) = &args.input {
        if input.starts_with("http://") || input.starts_with("https://") {
            config.data_source.url = Some(input.clone());
        } else {
            config.data_source.url = None;
            config.data_source.file_path = Some(input.clone());
        }
    }
    if let Some(w) = &args.excel_worksheet_name {
        config.data_source.excel_worksheet_name = Some(w.clone());
    }
    if let Some(g) = &args.gender {
        config.filters.gender = Some(g.clone());
    }
    if let Some(d) = &args.start_date {
        config.filters.start_date = Some(d.clone());
    }
    if let Some(d) = &args.end_date {
        config.filters.end_date = Some(d.clone());
    }
    if let Some(o) = &args.out {
        config.output_settings.output_path = Some(o.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> DashboardConfig {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn full_config() {
        let c = parse(
            r#"{
                "outputSettings": {"dashboardName": "Musanze", "expectedVillages": 144},
                "dataSource": {"provider": "excel", "filePath": "survey.xlsx", "excelWorksheetName": "CHW eCHIS"},
                "filters": {"gender": "Gore", "startDate": "2024-03-01"}
            }"#,
        );
        assert_eq!(c.dashboard_name(), "Musanze");
        assert_eq!(c.panel_settings().expected_villages, Some(144));
        assert_eq!(
            c.data_source().unwrap(),
            DataSource::Excel {
                path: "survey.xlsx".to_string(),
                worksheet: Some("CHW eCHIS".to_string())
            }
        );
        assert_eq!(
            c.filters.validate().unwrap(),
            FilterSettings {
                gender: GenderFilter::Only("Gore".to_string()),
                start: NaiveDate::from_ymd_opt(2024, 3, 1),
                end: None,
            }
        );
    }

    #[test]
    fn kobo_defaults() {
        let c = parse(
            r#"{"dataSource": {"url": "https://kf.kobotoolbox.org/api/v2/assets/abc/data/"}}"#,
        );
        assert_eq!(c.dashboard_name(), DEFAULT_DASHBOARD_NAME);
        assert_eq!(
            c.data_source().unwrap(),
            DataSource::Kobo {
                url: "https://kf.kobotoolbox.org/api/v2/assets/abc/data/".to_string(),
                token: None,
                token_env: DEFAULT_TOKEN_ENV.to_string(),
                timeout: Duration::from_secs(30),
            }
        );
        assert_eq!(c.filters.validate().unwrap(), FilterSettings::NO_FILTER);
    }

    #[test]
    fn provider_from_extension() {
        let c = parse(r#"{"dataSource": {"filePath": "data/survey.csv"}}"#);
        assert_eq!(
            c.data_source().unwrap(),
            DataSource::Csv {
                path: "data/survey.csv".to_string()
            }
        );
    }

    #[test]
    fn invalid_values() {
        assert!(matches!(
            parse(r#"{"dataSource": {"provider": "odk", "filePath": "a"}}"#).data_source(),
            Err(DashError::UnknownProvider { .. })
        ));
        assert!(matches!(
            parse("{}").data_source(),
            Err(DashError::MissingParameter { .. })
        ));
        assert!(matches!(
            parse_gender(Some("female")),
            Err(DashError::InvalidGender { .. })
        ));
        assert!(matches!(
            parse_date(Some("01/03/2024")),
            Err(DashError::InvalidDate { .. })
        ));
        assert_eq!(parse_gender(Some(" Both ")).unwrap(), GenderFilter::All);
        assert_eq!(parse_date(Some("")).unwrap(), None);
    }

    #[test]
    fn args_override_config() {
        let mut c = parse(
            r#"{"dataSource": {"url": "https://example.org/data"}, "filters": {"gender": "Gabo"}}"#,
        );
        let args = Args {
            config: None,
            reference: None,
            out: Some("stdout".to_string()),
            input: Some("local.csv".to_string()),
            input_type: None,
            excel_worksheet_name: None,
            gender: Some("Gore".to_string()),
            start_date: None,
            end_date: Some("2024-03-06".to_string()),
            verbose: false,
        };
        apply_args(&mut c, &args);
        assert_eq!(
            c.data_source().unwrap(),
            DataSource::Csv {
                path: "local.csv".to_string()
            }
        );
        assert_eq!(c.filters.gender.as_deref(), Some("Gore"));
        assert_eq!(c.filters.end_date.as_deref(), Some("2024-03-06"));
        assert_eq!(c.output_settings.output_path.as_deref(), Some("stdout"));
    }
}
