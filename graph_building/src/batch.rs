// graph_building/src/batch.rs
//
// Rendering for multi-row UNWIND-and-MERGE statements. The store has no
// bulk-insert API, so relationship rows are flushed as literal lists in
// fixed-size chunks.
use std::collections::HashSet;

/// Escapes a value for embedding in a single-quoted query literal.
pub fn escape_literal(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// One row of an UNWIND list: field name / value pairs.
pub type BatchRow = Vec<(&'static str, String)>;

/// Renders rows as an UNWIND list literal:
/// `[{a: 'x', b: 'y'}, {a: 'z', b: 'w'}]`.
pub fn render_batch_list(rows: &[BatchRow]) -> String {
    let rendered: Vec<String> = rows
        .iter()
        .map(|row| {
            let fields: Vec<String> = row
                .iter()
                .map(|(name, value)| format!("{name}: '{}'", escape_literal(value)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        })
        .collect();
    format!("[{}]", rendered.join(", "))
}

/// Set-semantics dedup that preserves first-seen order, keyed on the
/// full row content.
pub fn dedup_rows(rows: Vec<BatchRow>) -> Vec<BatchRow> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for row in rows {
        let key: Vec<(String, String)> =
            row.iter().map(|(n, v)| (n.to_string(), v.clone())).collect();
        if seen.insert(key) {
            out.push(row);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_escape_quotes_and_backslashes() {
        assert_eq!(escape_literal("O'Brien"), "O\\'Brien");
        assert_eq!(escape_literal("a\\b"), "a\\\\b");
        assert_eq!(escape_literal("line\nbreak"), "line\\nbreak");
    }

    #[test]
    fn should_render_rows_as_list_literal() {
        let rows = vec![
            vec![("doctorId", "d1".to_string()), ("caseId", "c1".to_string())],
            vec![("doctorId", "d2".to_string()), ("caseId", "c2".to_string())],
        ];
        assert_eq!(
            render_batch_list(&rows),
            "[{doctorId: 'd1', caseId: 'c1'}, {doctorId: 'd2', caseId: 'c2'}]"
        );
    }

    #[test]
    fn should_dedup_rows_preserving_first_seen_order() {
        let rows = vec![
            vec![("a", "1".to_string())],
            vec![("a", "2".to_string())],
            vec![("a", "1".to_string())],
        ];
        let deduped = dedup_rows(rows);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0][0].1, "1");
        assert_eq!(deduped[1][0].1, "2");
    }
}
