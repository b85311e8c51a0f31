mod config;
pub mod filter;
pub mod manual;
pub mod schema;
pub mod summary;

use log::{debug, info};

use std::collections::HashMap;

pub use crate::config::*;

// **** Private structures ****

// Counts occurrences while remembering the order in which labels were first seen.
#[derive(Debug, Default)]
struct Tallier {
    index: HashMap<String, usize>,
    counts: Vec<(String, u64)>,
}

impl Tallier {
    fn observe(&mut self, label: &str) {
        if let Some(idx) = self.index.get(label) {
            self.counts[*idx].1 += 1;
        } else {
            self.index.insert(label.to_string(), self.counts.len());
            self.counts.push((label.to_string(), 1));
        }
    }

    // Descending count. The sort is stable: ties keep the first-encountered order.
    fn into_sorted(self) -> Vec<(String, u64)> {
        let mut res = self.counts;
        res.sort_by(|a, b| b.1.cmp(&a.1));
        res
    }
}

// How a translated table is ordered.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Reorder {
    /// Descending count, merges included.
    ByCount,
    /// The order of the translation table, unknown labels last.
    Fixed,
    /// As counted. The synthetic category of a conditional table stays last.
    Keep,
}

// The partition of the rows that answered a gating question.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
struct GateCounts {
    qualified: u64,
    not_qualified: u64,
    unrecognized: u64,
}

/// Runs the aggregation described by the question on the (already filtered) rows.
///
/// If a column named by the question is absent from the rows, nothing is computed
/// and the missing identifiers are returned instead.
pub fn tally(rows: &RowSet, question: &QuestionSpec) -> Tally {
    let missing = rows.missing_columns(&question.columns());
    if !missing.is_empty() {
        info!(
            "tally: declining {:?}: missing columns {:?}",
            question.kind, missing
        );
        return Computed::Unavailable { missing };
    }

    let counts = match &question.kind {
        AggregationKind::SingleSelect { column } => single_select(rows, column),
        AggregationKind::MultiSelect { column } => multi_select(rows, column),
        AggregationKind::Conditional {
            gate,
            dependent,
            rule,
        } => conditional(rows, gate, dependent, rule),
    };
    debug!("tally: {:?}: raw counts {:?}", question.kind, counts);

    let res = match (&question.translation, &question.kind) {
        (None, _) => counts,
        // The conditional tables keep their display order: synthetic category last.
        (Some(t), AggregationKind::Conditional { .. }) => translate(counts, t, Reorder::Keep),
        (Some(t), _) if t.fixed_order => translate(counts, t, Reorder::Fixed),
        (Some(t), _) => translate(counts, t, Reorder::ByCount),
    };
    Computed::Ready(res)
}

/// One category per distinct non-null value, sorted by descending count.
pub fn single_select(rows: &RowSet, column: &str) -> FrequencyTable {
    let mut t = Tallier::default();
    for r in rows.records() {
        if let Some(label) = r.get(column).label() {
            t.observe(&label);
        }
    }
    FrequencyTable::from_entries(t.into_sorted())
}

/// Splits each non-null value on whitespace and counts every token on its own.
///
/// A row may contribute to several categories, so the total may exceed the number
/// of responding rows.
pub fn multi_select(rows: &RowSet, column: &str) -> FrequencyTable {
    let mut t = Tallier::default();
    for r in rows.records() {
        if let Some(value) = r.get(column).label() {
            for token in value.split_whitespace() {
                t.observe(token);
            }
        }
    }
    FrequencyTable::from_entries(t.into_sorted())
}

/// Counts the dependent answers of the respondents that qualify through the gating
/// question, and adds one synthetic category for those that do not qualify.
///
/// Rows without an answer to the gating question are not counted anywhere. Rows with
/// an answer that is neither affirmative nor negative are not counted either.
/// The synthetic category comes last, after the dependent answers in descending
/// count order. If a dependent answer has the same label as the synthetic category,
/// both are merged.
pub fn conditional(rows: &RowSet, gate: &str, dependent: &str, rule: &GateRule) -> FrequencyTable {
    let mut gc = GateCounts::default();
    let mut t = Tallier::default();
    for r in rows.records() {
        let g = match r.get(gate).normalized() {
            Some(g) => g,
            None => continue,
        };
        if g == rule.affirmative {
            gc.qualified += 1;
            if let Some(label) = r.get(dependent).label() {
                t.observe(&label);
            }
        } else if g == rule.negative {
            gc.not_qualified += 1;
        } else {
            gc.unrecognized += 1;
        }
    }
    debug!("conditional: {:?} gate counts {:?}", gate, gc);
    let mut res = FrequencyTable::from_entries(t.into_sorted());
    res.add(&rule.not_qualified_label, gc.not_qualified);
    res
}

/// Maps the labels through the translation table.
///
/// Labels that end up identical after translation are merged at the position of
/// the first one, then the entries are put back in order.
fn translate(counts: FrequencyTable, table: &TranslationTable, reorder: Reorder) -> FrequencyTable {
    let mut res = FrequencyTable::new();
    for (label, count) in counts.into_entries() {
        res.add(&table.translate(&label), count);
    }
    let mut entries = res.into_entries();
    match reorder {
        Reorder::Keep => {}
        // Stable: ties keep the position of their first label.
        Reorder::ByCount => entries.sort_by(|a, b| b.1.cmp(&a.1)),
        // Entries that the table does not know about go after the known ones.
        Reorder::Fixed => {
            entries.sort_by_key(|(label, _)| table.rank(label).unwrap_or(usize::MAX))
        }
    }
    FrequencyTable::from_entries(entries)
}

/// The number of rows that answered the question (non-null value).
pub fn responding_rows(rows: &RowSet, column: &str) -> Computed<u64> {
    Computed::require(rows, &[column], || {
        rows.records()
            .iter()
            .filter(|r| !r.get(column).is_null())
            .count() as u64
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, values: &[Option<&str>]) -> RowSet {
        let recs = values
            .iter()
            .map(|v| {
                Record::from_pairs(&[(name, v.map(Cell::from_text).unwrap_or(Cell::Empty))])
            })
            .collect();
        RowSet::with_columns(vec![name.to_string()], recs)
    }

    fn two_columns(a: &str, b: &str, values: &[(Option<&str>, Option<&str>)]) -> RowSet {
        let recs = values
            .iter()
            .map(|(x, y)| {
                Record::from_pairs(&[
                    (a, x.map(Cell::from_text).unwrap_or(Cell::Empty)),
                    (b, y.map(Cell::from_text).unwrap_or(Cell::Empty)),
                ])
            })
            .collect();
        RowSet::with_columns(vec![a.to_string(), b.to_string()], recs)
    }

    #[test]
    fn single_select_sorted_with_stable_ties() {
        let rows = column(
            "q",
            &[Some("b"), Some("a"), None, Some("a"), Some("c"), Some("b"), Some("a")],
        );
        let t = single_select(&rows, "q");
        assert_eq!(t, FrequencyTable::from_pairs(&[("a", 3), ("b", 2), ("c", 1)]));
        // Only the rows with an answer are counted.
        assert_eq!(t.total(), 6);

        let rows = column("q", &[Some("x"), Some("y"), Some("y"), Some("x")]);
        assert_eq!(
            single_select(&rows, "q"),
            FrequencyTable::from_pairs(&[("x", 2), ("y", 2)])
        );
    }

    #[test]
    fn single_select_counts_raw_values() {
        let rows = column("q", &[Some("Yego"), Some("yego"), Some("Yego")]);
        assert_eq!(
            single_select(&rows, "q"),
            FrequencyTable::from_pairs(&[("Yego", 2), ("yego", 1)])
        );
    }

    #[test]
    fn numbers_are_labels() {
        let recs = vec![
            Record::from_pairs(&[("n", Cell::Number(3.0))]),
            Record::from_pairs(&[("n", Cell::Number(3.0))]),
            Record::from_pairs(&[("n", Cell::Number(2.5))]),
        ];
        let rows = RowSet::with_columns(vec!["n".to_string()], recs);
        assert_eq!(
            single_select(&rows, "n"),
            FrequencyTable::from_pairs(&[("3", 2), ("2.5", 1)])
        );
    }

    #[test]
    fn multi_select_tokens() {
        let rows = column(
            "q",
            &[Some("wifi network"), Some("wifi"), None, Some("network battery")],
        );
        let t = multi_select(&rows, "q");
        assert_eq!(
            t,
            FrequencyTable::from_pairs(&[("wifi", 2), ("network", 2), ("battery", 1)])
        );
        // 5 tokens from 3 responding rows.
        assert_eq!(t.total(), 5);
    }

    #[test]
    fn multi_select_discards_empty_tokens() {
        let rows = column("q", &[Some("  a   b "), Some("a\tc")]);
        assert_eq!(
            multi_select(&rows, "q"),
            FrequencyTable::from_pairs(&[("a", 2), ("b", 1), ("c", 1)])
        );
    }

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn conditional_example() {
        init();
        let rows = two_columns(
            "g",
            "d",
            &[
                (Some("yego"), Some("A")),
                (Some("yego"), Some("B")),
                (Some("oya"), None),
                (Some("yego"), None),
                (None, None),
            ],
        );
        let t = conditional(&rows, "g", "d", &GateRule::new("yego", "oya", "does not qualify"));
        assert_eq!(
            t,
            FrequencyTable::from_pairs(&[("A", 1), ("B", 1), ("does not qualify", 1)])
        );
    }

    #[test]
    fn conditional_accounting() {
        let rows = two_columns(
            "g",
            "d",
            &[
                (Some(" Yego "), Some("Buri munsi")),
                (Some("YEGO"), Some("Buri cyumweru")),
                (Some("yego"), Some("Buri munsi")),
                (Some("Oya"), Some("Buri munsi")),
                (Some("sinzi"), Some("Buri munsi")),
                (None, Some("Buri munsi")),
            ],
        );
        let t = conditional(&rows, "g", "d", &GateRule::default());
        assert_eq!(
            t,
            FrequencyTable::from_pairs(&[("Buri munsi", 2), ("Buri cyumweru", 1), ("Oya", 1)])
        );
        // The unrecognized answer makes the sum strictly smaller than the gated rows.
        let answered = responding_rows(&rows, "g").ready().unwrap();
        assert_eq!(answered, 5);
        assert!(t.total() < answered);
    }

    #[test]
    fn conditional_equality_when_all_recognized() {
        let rows = two_columns(
            "g",
            "d",
            &[
                (Some("yego"), Some("x")),
                (Some("oya"), None),
                (Some("oya"), None),
                (Some("yego"), Some("y")),
            ],
        );
        let t = conditional(&rows, "g", "d", &GateRule::default());
        assert_eq!(t.total(), 4);
        assert_eq!(t.entries().last(), Some(&("Oya".to_string(), 2)));
    }

    #[test]
    fn conditional_merges_synthetic_label() {
        let rows = two_columns(
            "g",
            "d",
            &[(Some("yego"), Some("Oya")), (Some("oya"), None)],
        );
        let t = conditional(&rows, "g", "d", &GateRule::default());
        assert_eq!(t, FrequencyTable::from_pairs(&[("Oya", 2)]));
    }

    #[test]
    fn conditional_keeps_empty_synthetic_category() {
        let rows = two_columns("g", "d", &[(Some("yego"), Some("x"))]);
        let t = conditional(&rows, "g", "d", &GateRule::default());
        assert_eq!(t, FrequencyTable::from_pairs(&[("x", 1), ("Oya", 0)]));
    }

    #[test]
    fn tally_declines_missing_columns() {
        init();
        let rows = column("q", &[Some("a")]);
        let q = QuestionSpec::conditional("g", "q", GateRule::default());
        assert_eq!(
            tally(&rows, &q),
            Computed::Unavailable {
                missing: vec!["g".to_string()]
            }
        );
    }

    #[test]
    fn empty_rows_never_fail() {
        let rows = RowSet::empty();
        for q in [
            QuestionSpec::single_select("q"),
            QuestionSpec::multi_select("q"),
            QuestionSpec::conditional("g", "q", GateRule::default()),
        ] {
            assert!(matches!(tally(&rows, &q), Computed::Unavailable { .. }));
        }
        let rows = RowSet::with_columns(vec!["q".to_string(), "g".to_string()], vec![]);
        assert_eq!(
            tally(&rows, &QuestionSpec::single_select("q")),
            Computed::Ready(FrequencyTable::new())
        );
        assert_eq!(
            tally(&rows, &QuestionSpec::multi_select("q")),
            Computed::Ready(FrequencyTable::new())
        );
        assert_eq!(
            tally(&rows, &QuestionSpec::conditional("g", "q", GateRule::default())),
            Computed::Ready(FrequencyTable::from_pairs(&[("Oya", 0)]))
        );
    }

    #[test]
    fn translation_after_counting() {
        let rows = column("q", &[Some("Oya"), Some("Yego"), Some("Yego"), Some("Sinzi")]);
        let q = QuestionSpec::single_select("q")
            .with_translation(TranslationTable::new(&[("Yego", "Yes"), ("Oya", "No")]));
        assert_eq!(
            tally(&rows, &q),
            Computed::Ready(FrequencyTable::from_pairs(&[("Yes", 2), ("No", 1), ("Sinzi", 1)]))
        );
    }

    #[test]
    fn translation_merges_collisions() {
        let rows = column("q", &[Some("Yego"), Some("yego"), Some("Oya")]);
        let q = QuestionSpec::single_select("q")
            .with_translation(TranslationTable::new(&[("Yego", "Yes"), ("yego", "Yes")]));
        assert_eq!(
            tally(&rows, &q),
            Computed::Ready(FrequencyTable::from_pairs(&[("Yes", 2), ("Oya", 1)]))
        );
    }

    #[test]
    fn merged_label_moves_up() {
        let rows = column(
            "q",
            &[
                Some("Oya"),
                Some("Oya"),
                Some("Oya"),
                Some("Yego"),
                Some("Yego"),
                Some("yego"),
                Some("yego"),
            ],
        );
        let q = QuestionSpec::single_select("q")
            .with_translation(TranslationTable::new(&[("Yego", "Yes"), ("yego", "Yes")]));
        assert_eq!(
            tally(&rows, &q),
            Computed::Ready(FrequencyTable::from_pairs(&[("Yes", 4), ("Oya", 3)]))
        );
    }

    #[test]
    fn conditional_translation_keeps_synthetic_last() {
        let rows = two_columns(
            "g",
            "d",
            &[
                (Some("oya"), None),
                (Some("oya"), None),
                (Some("oya"), None),
                (Some("yego"), Some("Buri munsi")),
                (Some("yego"), Some("buri munsi")),
            ],
        );
        let q = QuestionSpec::conditional("g", "d", GateRule::default()).with_translation(
            TranslationTable::new(&[("Buri munsi", "Daily"), ("buri munsi", "Daily")]),
        );
        assert_eq!(
            tally(&rows, &q),
            Computed::Ready(FrequencyTable::from_pairs(&[("Daily", 2), ("Oya", 3)]))
        );
    }

    #[test]
    fn fixed_order_translation() {
        let rows = column(
            "q",
            &[Some("monthly"), Some("daily"), Some("other"), Some("monthly"), Some("weekly")],
        );
        let table = TranslationTable::ordered(&[
            ("daily", "Daily"),
            ("weekly", "Weekly"),
            ("monthly", "Monthly"),
        ]);
        let q = QuestionSpec::single_select("q").with_translation(table.clone());
        assert_eq!(
            tally(&rows, &q),
            Computed::Ready(FrequencyTable::from_pairs(&[
                ("Daily", 1),
                ("Weekly", 1),
                ("Monthly", 2),
                ("other", 1)
            ]))
        );

        // Conditional tables keep the synthetic category last.
        let rows = two_columns(
            "g",
            "d",
            &[(Some("yego"), Some("monthly")), (Some("oya"), None), (Some("yego"), Some("daily"))],
        );
        let q = QuestionSpec::conditional("g", "d", GateRule::default()).with_translation(table);
        assert_eq!(
            tally(&rows, &q),
            Computed::Ready(FrequencyTable::from_pairs(&[
                ("Monthly", 1),
                ("Daily", 1),
                ("Oya", 1)
            ]))
        );
    }

    #[test]
    fn responding_rows_requires_column() {
        let rows = column("q", &[Some("a"), None, Some("b c")]);
        assert_eq!(responding_rows(&rows, "q"), Computed::Ready(2));
        assert!(matches!(
            responding_rows(&rows, "z"),
            Computed::Unavailable { .. }
        ));
    }
}
