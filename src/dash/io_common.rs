use std::path::Path;

use chrono::{Duration, NaiveDate};
use serde_json::Value as JSValue;

use survey_tally::Cell;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Column names are compared after removing the surrounding blanks.
pub fn normalize_header(h: &str) -> String {
    h.trim().to_string()
}

/// Converts an Excel serial date (days since 1899-12-30) to ISO text.
pub fn excel_serial_to_text(serial: f64) -> Option<String> {
    if !serial.is_finite() {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    let dt = base.checked_add_signed(Duration::try_milliseconds(millis)?)?;
    Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// The cell of a JSON submission. Lists (for example attachments) become
/// space-separated text, like the multi-select answers.
pub fn json_to_cell(v: &JSValue) -> Cell {
    match v {
        JSValue::Null => Cell::Empty,
        JSValue::String(s) => Cell::from_text(s),
        JSValue::Number(n) => match n.as_f64() {
            Some(f) => Cell::Number(f),
            None => Cell::from_text(&n.to_string()),
        },
        JSValue::Bool(b) => Cell::Text(b.to_string()),
        JSValue::Array(l) => {
            let parts: Vec<String> = l
                .iter()
                .filter_map(|x| match x {
                    JSValue::String(s) => Some(s.clone()),
                    JSValue::Null => None,
                    other => Some(other.to_string()),
                })
                .collect();
            Cell::from_text(&parts.join(" "))
        }
        JSValue::Object(_) => Cell::Text(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_names() {
        assert_eq!(simplify_file_name("/data/echis/survey.csv"), "survey.csv");
        assert_eq!(simplify_file_name("survey.csv"), "survey.csv");
        assert_eq!(simplify_file_name("/"), "/");
    }

    #[test]
    fn excel_dates() {
        assert_eq!(
            excel_serial_to_text(45352.0).as_deref(),
            Some("2024-03-01T00:00:00")
        );
        assert_eq!(
            excel_serial_to_text(45352.5).as_deref(),
            Some("2024-03-01T12:00:00")
        );
        assert_eq!(excel_serial_to_text(f64::NAN), None);
        assert_eq!(excel_serial_to_text(-1.0e300), None);
        assert_eq!(excel_serial_to_text(1.0e300), None);
    }

    #[test]
    fn json_cells() {
        assert_eq!(json_to_cell(&json!(null)), Cell::Empty);
        assert_eq!(json_to_cell(&json!("  ")), Cell::Empty);
        assert_eq!(json_to_cell(&json!("Yego")), Cell::Text("Yego".to_string()));
        assert_eq!(json_to_cell(&json!(3)), Cell::Number(3.0));
        assert_eq!(json_to_cell(&json!(true)), Cell::Text("true".to_string()));
        assert_eq!(
            json_to_cell(&json!(["network", "battery"])),
            Cell::Text("network battery".to_string())
        );
        assert_eq!(json_to_cell(&json!([])), Cell::Empty);
    }
}
