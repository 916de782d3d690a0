use std::cmp::Ordering;

use serde_json::Value;
use tracing::trace;

use crate::record::{Record, scalar_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortIndicator {
    Ascending,
    Descending,
}

/// Header click sort state. Lives as long as the view, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortState {
    column: Option<String>,
    ascending: bool,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            column: None,
            ascending: true,
        }
    }
}

impl SortState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same column flips the direction, a new column starts ascending.
    pub fn toggle(&mut self, column: &str) {
        if self.column.as_deref() == Some(column) {
            self.ascending = !self.ascending;
        } else {
            self.column = Some(column.to_string());
            self.ascending = true;
        }
    }

    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    pub fn ascending(&self) -> bool {
        self.ascending
    }

    pub fn indicator_for(&self, column: &str) -> Option<SortIndicator> {
        match self.column.as_deref() {
            Some(c) if c == column && self.ascending => Some(SortIndicator::Ascending),
            Some(c) if c == column => Some(SortIndicator::Descending),
            _ => None,
        }
    }
}

/// Stable sort of `rows` by `column`.
pub fn sort_records(rows: &mut [Record], column: &str, ascending: bool) {
    trace!("Sorting {} rows by {column} (ascending: {ascending})", rows.len());
    rows.sort_by(|a, b| compare_cells(a.get(column), b.get(column), ascending));
}

/// Header sort comparator.
///
/// Missing and null values go last whichever way the column is sorted. Two
/// sequences compare by length, everything else by natural order.
pub fn compare_cells(a: Option<&Value>, b: Option<&Value>, ascending: bool) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    let ordering = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Greater,
        (Some(_), None) => return Ordering::Less,
        (Some(Value::Array(x)), Some(Value::Array(y))) => x.len().cmp(&y.len()),
        (Some(x), Some(y)) => natural_cmp(x, y),
    };
    if ascending { ordering } else { ordering.reverse() }
}

/// Natural order of two non-null values.
///
/// Values of the same kind compare by content (sequences and objects by their
/// text form). Different kinds never compare equal, they are ranked
/// booleans < numbers < text < sequences < objects so the order stays total.
pub fn natural_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => x.to_string().cmp(&y.to_string()),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(_), Value::Array(_)) => scalar_text(a).cmp(&scalar_text(b)),
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rows(values: Vec<Value>) -> Vec<Record> {
        values
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => map,
                _ => panic!("not an object"),
            })
            .collect()
    }

    fn column(rows: &[Record], name: &str) -> Vec<Value> {
        rows.iter()
            .map(|r| r.get(name).cloned().unwrap_or(Value::Null))
            .collect()
    }

    #[test]
    fn nulls_stay_last_in_both_directions() {
        let mut data = rows(vec![json!({"x": null}), json!({"x": 2}), json!({"x": 1})]);
        let mut state = SortState::new();

        state.toggle("x");
        sort_records(&mut data, "x", state.ascending());
        assert_eq!(column(&data, "x"), vec![json!(1), json!(2), Value::Null]);

        state.toggle("x");
        sort_records(&mut data, "x", state.ascending());
        assert_eq!(column(&data, "x"), vec![json!(2), json!(1), Value::Null]);
    }

    #[test]
    fn missing_keys_sort_like_null() {
        let mut data = rows(vec![json!({}), json!({"x": "b"}), json!({"x": "a"})]);
        sort_records(&mut data, "x", false);
        assert_eq!(column(&data, "x"), vec![json!("b"), json!("a"), Value::Null]);
    }

    #[test]
    fn sequences_compare_by_length() {
        let mut data = rows(vec![
            json!({"s": [9, 9, 9]}),
            json!({"s": [0]}),
            json!({"s": [5, 1]}),
        ]);
        sort_records(&mut data, "s", true);
        assert_eq!(
            column(&data, "s"),
            vec![json!([0]), json!([5, 1]), json!([9, 9, 9])]
        );
    }

    #[test]
    fn ties_keep_input_order() {
        let mut data = rows(vec![
            json!({"k": 1, "id": "a"}),
            json!({"k": 0, "id": "b"}),
            json!({"k": 1, "id": "c"}),
        ]);
        sort_records(&mut data, "k", true);
        assert_eq!(column(&data, "id"), vec![json!("b"), json!("a"), json!("c")]);
    }

    #[test]
    fn toggle_state_machine() {
        let mut state = SortState::new();
        assert_eq!(state.column(), None);

        state.toggle("name");
        assert_eq!(state.indicator_for("name"), Some(SortIndicator::Ascending));
        state.toggle("name");
        assert_eq!(state.indicator_for("name"), Some(SortIndicator::Descending));

        state.toggle("id");
        assert_eq!(state.indicator_for("id"), Some(SortIndicator::Ascending));
        assert_eq!(state.indicator_for("name"), None);
    }

    #[test]
    fn mixed_kinds_are_ranked() {
        assert_eq!(natural_cmp(&json!(10), &json!("2")), Ordering::Less);
        assert_eq!(natural_cmp(&json!("b"), &json!(true)), Ordering::Greater);
        assert_eq!(natural_cmp(&json!(2.5), &json!(2)), Ordering::Greater);
    }
}
