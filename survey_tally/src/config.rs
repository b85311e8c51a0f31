// ********* Input data structures ***********

use std::collections::{HashMap, HashSet};

/// The content of one cell of a survey submission.
///
/// Readers are expected to turn blank strings into `Empty`.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    /// Builds a cell from raw text. Blank or whitespace-only content is a missing answer.
    pub fn from_text(s: &str) -> Cell {
        if s.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// The raw label used as a grouping key. Integral numbers drop the decimal part.
    pub fn label(&self) -> Option<String> {
        match self {
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(f) if f.is_finite() && f.fract() == 0.0 => Some(format!("{}", *f as i64)),
            Cell::Number(f) => Some(f.to_string()),
            Cell::Empty => None,
        }
    }

    /// Trimmed and lower-cased label, for comparisons against fixed tokens.
    pub fn normalized(&self) -> Option<String> {
        self.label().map(|s| s.trim().to_lowercase())
    }
}

/// One survey submission: a mapping from column identifier to cell.
///
/// A column that is not stored in the record reads as `Cell::Empty`.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Record {
    values: HashMap<String, Cell>,
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Record {
    pub fn new() -> Record {
        Record::default()
    }

    pub fn from_pairs(pairs: &[(&str, Cell)]) -> Record {
        let mut r = Record::new();
        for (k, v) in pairs {
            r.insert(k, v.clone());
        }
        r
    }

    pub fn insert(&mut self, column: &str, cell: Cell) {
        self.values.insert(column.to_string(), cell);
    }

    pub fn get(&self, column: &str) -> &Cell {
        self.values.get(column).unwrap_or(&EMPTY_CELL)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }
}

/// An ordered collection of submissions, together with the set of columns
/// that the data source declared.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RowSet {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl RowSet {
    pub fn empty() -> RowSet {
        RowSet::default()
    }

    /// For tabular sources: the header is authoritative, even for columns that
    /// are empty in every record.
    pub fn with_columns(columns: Vec<String>, records: Vec<Record>) -> RowSet {
        RowSet { columns, records }
    }

    /// For sources without a header: the columns are the union of the keys of
    /// all the records. The order follows the first record in which they appear,
    /// and keys are sorted within a record since records do not keep an order.
    pub fn from_records(records: Vec<Record>) -> RowSet {
        let mut seen: HashSet<String> = HashSet::new();
        let mut columns: Vec<String> = Vec::new();
        for r in records.iter() {
            let mut keys: Vec<&String> = r.keys().filter(|k| !seen.contains(*k)).collect();
            keys.sort();
            for k in keys {
                seen.insert(k.clone());
                columns.push(k.clone());
            }
        }
        RowSet { columns, records }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// The subset of the requested columns that this row set does not have.
    pub fn missing_columns(&self, columns: &[&str]) -> Vec<String> {
        columns
            .iter()
            .filter(|c| !self.has_column(c))
            .map(|c| c.to_string())
            .collect()
    }

    /// A new row set with the same columns and only the records accepted by the predicate.
    pub fn select<P>(&self, predicate: P) -> RowSet
    where
        P: Fn(&Record) -> bool,
    {
        RowSet {
            columns: self.columns.clone(),
            records: self
                .records
                .iter()
                .filter(|r| predicate(r))
                .cloned()
                .collect(),
        }
    }
}

/// Display labels for raw answers.
///
/// Translation only happens after counting: the raw values are the grouping keys.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct TranslationTable {
    entries: Vec<(String, String)>,
    /// If set, the tallies are presented in the order of the entries of this table.
    pub fixed_order: bool,
}

impl TranslationTable {
    pub fn new(pairs: &[(&str, &str)]) -> TranslationTable {
        TranslationTable {
            entries: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fixed_order: false,
        }
    }

    pub fn ordered(pairs: &[(&str, &str)]) -> TranslationTable {
        TranslationTable {
            fixed_order: true,
            ..TranslationTable::new(pairs)
        }
    }

    /// Unmapped labels pass through unchanged.
    pub fn translate(&self, raw: &str) -> String {
        self.entries
            .iter()
            .find(|(k, _)| k == raw)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| raw.to_string())
    }

    /// Position of a display label in the table, if the table defines it.
    pub(crate) fn rank(&self, display: &str) -> Option<usize> {
        self.entries.iter().position(|(_, v)| v == display)
    }
}

/// How the answers in the raw row set are turned into categories.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AggregationKind {
    /// One category per distinct value.
    SingleSelect { column: String },
    /// Values are space-delimited tokens, each token is its own category.
    MultiSelect { column: String },
    /// The dependent column is only counted for the respondents who answered
    /// the gating question affirmatively.
    Conditional {
        gate: String,
        dependent: String,
        rule: GateRule,
    },
}

/// The tokens recognized in a gating column.
///
/// The comparison is done on trimmed, lower-cased values.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GateRule {
    pub affirmative: String,
    pub negative: String,
    /// The label of the synthetic category for the respondents who did not qualify.
    pub not_qualified_label: String,
}

impl GateRule {
    pub fn new(affirmative: &str, negative: &str, not_qualified_label: &str) -> GateRule {
        GateRule {
            affirmative: affirmative.trim().to_lowercase(),
            negative: negative.trim().to_lowercase(),
            not_qualified_label: not_qualified_label.to_string(),
        }
    }
}

impl Default for GateRule {
    /// The yes/no answers of the Kinyarwanda forms.
    fn default() -> Self {
        GateRule::new("yego", "oya", "Oya")
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct QuestionSpec {
    pub kind: AggregationKind,
    pub translation: Option<TranslationTable>,
}

impl QuestionSpec {
    pub fn single_select(column: &str) -> QuestionSpec {
        QuestionSpec {
            kind: AggregationKind::SingleSelect {
                column: column.to_string(),
            },
            translation: None,
        }
    }

    pub fn multi_select(column: &str) -> QuestionSpec {
        QuestionSpec {
            kind: AggregationKind::MultiSelect {
                column: column.to_string(),
            },
            translation: None,
        }
    }

    pub fn conditional(gate: &str, dependent: &str, rule: GateRule) -> QuestionSpec {
        QuestionSpec {
            kind: AggregationKind::Conditional {
                gate: gate.to_string(),
                dependent: dependent.to_string(),
                rule,
            },
            translation: None,
        }
    }

    pub fn with_translation(self, translation: TranslationTable) -> QuestionSpec {
        QuestionSpec {
            translation: Some(translation),
            ..self
        }
    }

    /// All the column identifiers this question reads.
    pub fn columns(&self) -> Vec<&str> {
        match &self.kind {
            AggregationKind::SingleSelect { column } | AggregationKind::MultiSelect { column } => {
                vec![column.as_str()]
            }
            AggregationKind::Conditional {
                gate, dependent, ..
            } => vec![gate.as_str(), dependent.as_str()],
        }
    }
}

// ******** Output data structures *********

/// Ordered (label, count) pairs. Labels are unique.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct FrequencyTable {
    entries: Vec<(String, u64)>,
}

impl FrequencyTable {
    pub fn new() -> FrequencyTable {
        FrequencyTable::default()
    }

    /// Builds a table from pairs. Repeated labels are merged into the first occurrence.
    pub fn from_pairs(pairs: &[(&str, u64)]) -> FrequencyTable {
        let mut t = FrequencyTable::new();
        for (label, count) in pairs {
            t.add(label, *count);
        }
        t
    }

    pub fn entries(&self) -> &[(String, u64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, c)| *c).sum()
    }

    pub fn get(&self, label: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, c)| *c)
    }

    /// Adds to the count of a label, appending the label if it is new.
    pub fn add(&mut self, label: &str, count: u64) {
        if let Some(e) = self.entries.iter_mut().find(|(l, _)| l == label) {
            e.1 += count;
        } else {
            self.entries.push((label.to_string(), count));
        }
    }

    pub(crate) fn from_entries(entries: Vec<(String, u64)>) -> FrequencyTable {
        FrequencyTable { entries }
    }

    pub(crate) fn into_entries(self) -> Vec<(String, u64)> {
        self.entries
    }
}

/// The result of a computation that needs some columns to be present.
///
/// A missing column is not an error: the consumer skips the panel and may
/// report the missing identifiers.
#[derive(PartialEq, Debug, Clone)]
pub enum Computed<T> {
    Ready(T),
    Unavailable { missing: Vec<String> },
}

impl<T> Computed<T> {
    /// Declines when any of the columns is missing, otherwise runs the computation.
    pub fn require<F>(rows: &RowSet, columns: &[&str], f: F) -> Computed<T>
    where
        F: FnOnce() -> T,
    {
        let missing = rows.missing_columns(columns);
        if missing.is_empty() {
            Computed::Ready(f())
        } else {
            Computed::Unavailable { missing }
        }
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Computed::Ready(x) => Some(x),
            Computed::Unavailable { .. } => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Computed<U> {
        match self {
            Computed::Ready(x) => Computed::Ready(f(x)),
            Computed::Unavailable { missing } => Computed::Unavailable { missing },
        }
    }
}

pub type Tally = Computed<FrequencyTable>;
