//! The fixed mapping between the logical survey questions and the column
//! identifiers of the CHW eCHIS form.
//!
//! The headers are the question texts of the form (in Kinyarwanda), as exported
//! by the collection service. Some of them carry irregular spacing: they are
//! kept exactly as exported, except for leading and trailing blanks.

use crate::config::RowSet;

pub const SUBMISSION_TIME: &str = "_submission_time";
pub const GENDER: &str = "Igitsina";
pub const CHW_NAME: &str = "Amazina y'ufata amakuru";
pub const DISTRICT: &str = "Akarere";
pub const HEALTH_FACILITY: &str = "Ikigo Nderabuzima";
pub const VILLAGE: &str = "Umudugudu";
pub const DATA_ACCURACY: &str =
    "1.7  Ese gukoresha eCHIS byagufashije gutanga/kubona amakuru yukuri?";
pub const TECHNICAL_CHALLENGES: &str =
    "1.13 Niba ari yego, ni izihe mbogamizi cyangwa ibibazo uhura nabyo cyane?";
pub const USES_DASHBOARDS: &str =
    "2.3 Ese ukoresha amakuru uhabwa n'imbonerahamwe za eCHIS mu gufata ibyemezo?";
pub const DECISION_FREQUENCY: &str =
    "2.4 Niba ari Yego, ni kangahe ukoresha amakuru uhabwa n'imbonerahamwe mu gufata ibyemezo?";
pub const DIGITAL_LITERACY_WOMEN: &str =
    "5.5 Ese eCHIS yongereye ubumenyi bwo gukoresha ikoranabuhanga mu bajyanama b’ ubuzima b'abagore?";

/// Where the answers to a question are found.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ColumnRef {
    Single(String),
    /// A follow-up question, only asked when the gating question is answered with yes.
    Gated { gate: String, dependent: String },
}

impl ColumnRef {
    pub fn columns(&self) -> Vec<&str> {
        match self {
            ColumnRef::Single(c) => vec![c.as_str()],
            ColumnRef::Gated { gate, dependent } => vec![gate.as_str(), dependent.as_str()],
        }
    }

    /// The identifiers that the row set does not contain.
    pub fn missing_in(&self, rows: &RowSet) -> Vec<String> {
        rows.missing_columns(&self.columns())
    }
}

enum Entry {
    Single(&'static str),
    Gated(&'static str, &'static str),
}

const STANDARD_QUESTIONS: &[(&str, Entry)] = &[
    ("submission_time", Entry::Single(SUBMISSION_TIME)),
    ("gender", Entry::Single(GENDER)),
    ("chw_name", Entry::Single(CHW_NAME)),
    ("district", Entry::Single(DISTRICT)),
    ("health_facility", Entry::Single(HEALTH_FACILITY)),
    ("village", Entry::Single(VILLAGE)),
    ("data_accuracy", Entry::Single(DATA_ACCURACY)),
    ("technical_challenges", Entry::Single(TECHNICAL_CHALLENGES)),
    (
        "decision_making",
        Entry::Gated(USES_DASHBOARDS, DECISION_FREQUENCY),
    ),
    ("digital_literacy_women", Entry::Single(DIGITAL_LITERACY_WOMEN)),
];

/// Static lookup of question keys. It never looks at the data.
pub struct SchemaRegistry {
    entries: &'static [(&'static str, Entry)],
}

impl SchemaRegistry {
    /// The questions of the CHW eCHIS evaluation form.
    pub fn standard() -> SchemaRegistry {
        SchemaRegistry {
            entries: STANDARD_QUESTIONS,
        }
    }

    /// Returns `None` for a key that this form does not define.
    pub fn resolve(&self, key: &str) -> Option<ColumnRef> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, e)| match e {
                Entry::Single(c) => ColumnRef::Single(c.to_string()),
                Entry::Gated(g, d) => ColumnRef::Gated {
                    gate: g.to_string(),
                    dependent: d.to_string(),
                },
            })
    }

    /// Resolves a key that is expected to map to a single column.
    pub fn column(&self, key: &str) -> Option<String> {
        match self.resolve(key) {
            Some(ColumnRef::Single(c)) => Some(c),
            _ => None,
        }
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(k, _)| *k).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cell, Record};

    #[test]
    fn resolves_known_keys() {
        let reg = SchemaRegistry::standard();
        assert_eq!(
            reg.resolve("gender"),
            Some(ColumnRef::Single("Igitsina".to_string()))
        );
        assert_eq!(
            reg.resolve("decision_making"),
            Some(ColumnRef::Gated {
                gate: USES_DASHBOARDS.to_string(),
                dependent: DECISION_FREQUENCY.to_string()
            })
        );
        assert_eq!(reg.column("submission_time"), Some(SUBMISSION_TIME.to_string()));
    }

    #[test]
    fn unknown_key_is_absent() {
        let reg = SchemaRegistry::standard();
        assert_eq!(reg.resolve("household_size"), None);
        // A gated question has no single column.
        assert_eq!(reg.column("decision_making"), None);
    }

    #[test]
    fn keys_are_unique() {
        let mut keys = SchemaRegistry::standard().keys();
        let n = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), n);
    }

    #[test]
    fn missing_columns_of_gated_reference() {
        let rows = RowSet::from_records(vec![Record::from_pairs(&[(
            USES_DASHBOARDS,
            Cell::from_text("Yego"),
        )])]);
        let cref = SchemaRegistry::standard()
            .resolve("decision_making")
            .unwrap();
        assert_eq!(cref.missing_in(&rows), vec![DECISION_FREQUENCY.to_string()]);
    }
}
