// The panels of the standard eCHIS dashboard.

use log::{debug, warn};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

use survey_tally::schema::{ColumnRef, SchemaRegistry};
use survey_tally::summary::*;
use survey_tally::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ChartKind {
    Bar,
    HorizontalBar,
    Pie,
    Line,
    Metric,
    Table,
}

impl ChartKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::HorizontalBar => "horizontal-bar",
            ChartKind::Pie => "pie",
            ChartKind::Line => "line",
            ChartKind::Metric => "metric",
            ChartKind::Table => "table",
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum PanelBody {
    Tally(FrequencyTable),
    Value(String),
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// The data does not have the columns needed by this panel.
    Skipped { missing: Vec<String> },
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Panel {
    pub title: String,
    pub chart: ChartKind,
    pub body: PanelBody,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
}

impl Panel {
    fn new(title: &str, chart: ChartKind, body: PanelBody) -> Panel {
        Panel {
            title: title.to_string(),
            chart,
            body,
            x_label: None,
            y_label: None,
        }
    }

    fn axes(self, x: &str, y: &str) -> Panel {
        Panel {
            x_label: Some(x.to_string()),
            y_label: Some(y.to_string()),
            ..self
        }
    }

    fn from_computed<T, F>(title: &str, chart: ChartKind, c: Computed<T>, f: F) -> Panel
    where
        F: FnOnce(T) -> PanelBody,
    {
        let body = match c {
            Computed::Ready(x) => f(x),
            Computed::Unavailable { missing } => PanelBody::Skipped { missing },
        };
        Panel::new(title, chart, body)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.body, PanelBody::Skipped { .. })
    }
}

/// Settings of the dashboard that do not come from the data.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct PanelSettings {
    /// The number of villages that the survey is expected to cover.
    pub expected_villages: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Aggregation {
    Single,
    Multi,
    Conditional,
}

struct QuestionPanel {
    title: &'static str,
    key: &'static str,
    chart: ChartKind,
    aggregation: Aggregation,
    translation: Option<TranslationTable>,
}

pub fn gender_labels() -> TranslationTable {
    TranslationTable::new(&[("Gabo", "Male"), ("Gore", "Female")])
}

pub fn yes_no_labels() -> TranslationTable {
    TranslationTable::ordered(&[
        ("Yego", "Yes"),
        ("yego", "Yes"),
        ("Oya", "No"),
        ("oya", "No"),
        ("Simbizi", "Don't know"),
    ])
}

pub fn frequency_labels() -> TranslationTable {
    TranslationTable::ordered(&[
        ("Buri munsi", "Daily"),
        ("Buri cyumweru", "Weekly"),
        ("Buri kwezi", "Monthly"),
        ("Rimwe na rimwe", "Occasionally"),
        ("Oya", "No"),
    ])
}

pub fn challenge_labels() -> TranslationTable {
    TranslationTable::new(&[
        ("network", "Poor network"),
        ("battery", "Battery life"),
        ("login", "Login problems"),
        ("sync", "Data synchronisation"),
        ("app_crash", "Application crashes"),
    ])
}

fn question_spec(cref: ColumnRef, aggregation: Aggregation) -> Option<QuestionSpec> {
    match (cref, aggregation) {
        (ColumnRef::Single(c), Aggregation::Single) => Some(QuestionSpec::single_select(&c)),
        (ColumnRef::Single(c), Aggregation::Multi) => Some(QuestionSpec::multi_select(&c)),
        (ColumnRef::Gated { gate, dependent }, Aggregation::Conditional) => Some(
            QuestionSpec::conditional(&gate, &dependent, GateRule::default()),
        ),
        (ColumnRef::Gated { dependent, .. }, Aggregation::Single) => {
            Some(QuestionSpec::single_select(&dependent))
        }
        (ColumnRef::Gated { dependent, .. }, Aggregation::Multi) => {
            Some(QuestionSpec::multi_select(&dependent))
        }
        (ColumnRef::Single(_), Aggregation::Conditional) => None,
    }
}

fn question_panel(rows: &RowSet, registry: &SchemaRegistry, qp: QuestionPanel) -> Panel {
    let spec = match registry
        .resolve(qp.key)
        .and_then(|cref| question_spec(cref, qp.aggregation))
    {
        Some(s) => s,
        None => {
            warn!("question_panel: no usable column for {:?}", qp.key);
            return Panel::new(
                qp.title,
                qp.chart,
                PanelBody::Skipped {
                    missing: vec![qp.key.to_string()],
                },
            );
        }
    };
    let spec = match qp.translation {
        Some(t) => spec.with_translation(t),
        None => spec,
    };
    Panel::from_computed(qp.title, qp.chart, tally(rows, &spec), PanelBody::Tally)
}

// The number of respondents of a question, shown next to its chart.
fn respondents_panel(rows: &RowSet, registry: &SchemaRegistry, title: &str, key: &str) -> Panel {
    let column = match registry.resolve(key) {
        Some(ColumnRef::Single(c)) => c,
        Some(ColumnRef::Gated { dependent, .. }) => dependent,
        None => key.to_string(),
    };
    Panel::from_computed(
        title,
        ChartKind::Metric,
        responding_rows(rows, &column),
        |n| PanelBody::Value(n.to_string()),
    )
}

fn column_of(registry: &SchemaRegistry, key: &str) -> String {
    registry.column(key).unwrap_or_else(|| key.to_string())
}

/// Computes all the panels of the dashboard on the filtered rows.
pub fn standard_panels(rows: &RowSet, settings: &PanelSettings) -> Vec<Panel> {
    let registry = SchemaRegistry::standard();
    let submission_time = column_of(&registry, "submission_time");
    let chw_name = column_of(&registry, "chw_name");
    let village = column_of(&registry, "village");

    let mut panels: Vec<Panel> = Vec::new();

    // Summary statistics
    panels.push(Panel::new(
        "Total Forms Submitted",
        ChartKind::Metric,
        PanelBody::Value(rows.len().to_string()),
    ));
    panels.push(Panel::from_computed(
        "Unique CHWs Interviewed",
        ChartKind::Metric,
        distinct_count(rows, &chw_name),
        |n| PanelBody::Value(n.to_string()),
    ));
    panels.push(Panel::from_computed(
        "Date Range",
        ChartKind::Metric,
        Computed::require(rows, &[submission_time.as_str()], || {
            date_range_label(rows, &submission_time).unwrap_or_else(|| "n/a".to_string())
        }),
        PanelBody::Value,
    ));
    if let Some(expected) = settings.expected_villages {
        let rate = distinct_count(rows, &village).map(|n| {
            completion_rate(n, expected)
                .map(|r| format!("{:.1}% ({} of {} villages)", r, n, expected))
                .unwrap_or_else(|| "n/a".to_string())
        });
        panels.push(Panel::from_computed(
            "Village Completion Rate",
            ChartKind::Metric,
            rate,
            PanelBody::Value,
        ));
    }

    // Submission trends
    panels.push(
        Panel::from_computed(
            "Trend of Form Submissions Over Time",
            ChartKind::Line,
            submission_trend(rows, &submission_time),
            PanelBody::Tally,
        )
        .axes("Submission Date", "Count"),
    );

    // Key insights
    panels.push(
        question_panel(
            rows,
            &registry,
            QuestionPanel {
                title: "Gender Distribution",
                key: "gender",
                chart: ChartKind::Bar,
                aggregation: Aggregation::Single,
                translation: Some(gender_labels()),
            },
        )
        .axes("Gender", "Count"),
    );
    panels.push(question_panel(
        rows,
        &registry,
        QuestionPanel {
            title: "Utilization of eCHIS for Data Accuracy",
            key: "data_accuracy",
            chart: ChartKind::Pie,
            aggregation: Aggregation::Single,
            translation: Some(yes_no_labels()),
        },
    ));

    // Technical challenges
    panels.push(respondents_panel(
        rows,
        &registry,
        "Total CHWs Reporting Technical Challenges in eCHIS",
        "technical_challenges",
    ));
    panels.push(question_panel(
        rows,
        &registry,
        QuestionPanel {
            title: "Technical Challenges Faced",
            key: "technical_challenges",
            chart: ChartKind::Bar,
            aggregation: Aggregation::Multi,
            translation: Some(challenge_labels()),
        },
    ));

    // Aggregated insights
    panels.push(respondents_panel(
        rows,
        &registry,
        "Total CHWs Using eCHIS for Decision Making",
        "decision_making",
    ));
    panels.push(question_panel(
        rows,
        &registry,
        QuestionPanel {
            title: "Decision Making Using eCHIS",
            key: "decision_making",
            chart: ChartKind::HorizontalBar,
            aggregation: Aggregation::Conditional,
            translation: Some(frequency_labels()),
        },
    ));
    panels.push(respondents_panel(
        rows,
        &registry,
        "Total CHWs Reporting eCHIS Influence on Digital Literacy",
        "digital_literacy_women",
    ));
    panels.push(question_panel(
        rows,
        &registry,
        QuestionPanel {
            title: "eCHIS Influence on Digital Literacy",
            key: "digital_literacy_women",
            chart: ChartKind::Bar,
            aggregation: Aggregation::Single,
            translation: Some(yes_no_labels()),
        },
    ));

    // Coverage
    let coverage_cols = CoverageColumns {
        area: column_of(&registry, "district"),
        facility: column_of(&registry, "health_facility"),
        worker: chw_name.clone(),
        sub_area: village.clone(),
    };
    panels.push(Panel::from_computed(
        "CHW Coverage by District and Health Facility",
        ChartKind::Table,
        coverage_summary(rows, &coverage_cols),
        coverage_table,
    ));

    debug!(
        "standard_panels: {} panels, {} skipped",
        panels.len(),
        panels.iter().filter(|p| p.is_skipped()).count()
    );
    panels
}

fn coverage_table(summary: CoverageSummary) -> PanelBody {
    let columns = ["District", "Health Facility", "CHWs", "Villages"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut rows: Vec<Vec<String>> = summary
        .groups
        .iter()
        .map(|g| {
            vec![
                g.area.clone(),
                g.facility.clone(),
                g.workers.to_string(),
                g.sub_areas.to_string(),
            ]
        })
        .collect();
    rows.push(vec![
        "Total".to_string(),
        summary.total.facility.clone(),
        summary.total.workers.to_string(),
        summary.total.sub_areas.to_string(),
    ]);
    PanelBody::Table { columns, rows }
}

pub fn tally_to_json(t: &FrequencyTable) -> JSValue {
    let l: Vec<JSValue> = t
        .entries()
        .iter()
        .map(|(label, count)| json!({"label": label, "count": count.to_string()}))
        .collect();
    JSValue::Array(l)
}

pub fn panel_to_json(p: &Panel) -> JSValue {
    let mut m: JSMap<String, JSValue> = JSMap::new();
    m.insert("title".to_string(), json!(p.title));
    m.insert("chart".to_string(), json!(p.chart.name()));
    if let Some(x) = &p.x_label {
        m.insert("xLabel".to_string(), json!(x));
    }
    if let Some(y) = &p.y_label {
        m.insert("yLabel".to_string(), json!(y));
    }
    match &p.body {
        PanelBody::Tally(t) => {
            m.insert("status".to_string(), json!("ok"));
            m.insert("tally".to_string(), tally_to_json(t));
        }
        PanelBody::Value(v) => {
            m.insert("status".to_string(), json!("ok"));
            m.insert("value".to_string(), json!(v));
        }
        PanelBody::Table { columns, rows } => {
            m.insert("status".to_string(), json!("ok"));
            m.insert("columns".to_string(), json!(columns));
            m.insert("rows".to_string(), json!(rows));
        }
        PanelBody::Skipped { missing } => {
            m.insert("status".to_string(), json!("skipped"));
            m.insert("missing".to_string(), json!(missing));
        }
    }
    JSValue::Object(m)
}
