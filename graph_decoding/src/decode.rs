// graph_decoding/src/decode.rs
//
// The store returns vertices and edges as opaque self-describing text
// blobs. Everything here reconstructs semantics purely from that text:
// key searches are bounded to the `properties` object via balanced-brace
// matching, never global substring search, so values outside the
// properties scope cannot leak into a lookup.
use graph_gateway::Row;

/// A vertex reconstructed from the store's text rendering.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedVertex {
    /// Domain identifier, resolved with the id -> code -> internal-id
    /// precedence chain.
    pub id: String,
    pub label: String,
}

/// Strips the store's `::vertex` / `::edge` type suffix.
fn strip_type_suffix(text: &str) -> &str {
    let text = text.trim();
    text.strip_suffix("::vertex")
        .or_else(|| text.strip_suffix("::edge"))
        .unwrap_or(text)
        .trim_end()
}

/// Byte index of the `}` closing the `{` at `open`, respecting nesting
/// and double-quoted strings.
fn balanced_close(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else if b == b'{' {
            depth += 1;
        } else if b == b'}' {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Bounds of the nested `properties` object: byte indexes of its `{`
/// and matching `}`.
fn properties_bounds(text: &str) -> Option<(usize, usize)> {
    let key_pos = text.find("\"properties\"")?;
    let open = key_pos + text[key_pos..].find('{')?;
    let close = balanced_close(text, open)?;
    Some((open, close))
}

/// Reads the value that follows `"key":` within `[from, to)`. Quoted
/// strings are unescaped; bare tokens run until `,` or `}`.
fn value_in_range(text: &str, key: &str, from: usize, to: usize) -> Option<String> {
    let window = &text[from..to];
    let pattern = format!("\"{key}\":");
    let key_pos = window.find(&pattern)?;
    let mut rest = window[key_pos + pattern.len()..].trim_start();
    if let Some(stripped) = rest.strip_prefix('"') {
        rest = stripped;
        let mut out = String::new();
        let mut chars = rest.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => return Some(out),
                _ => out.push(c),
            }
        }
        None
    } else {
        let end = rest.find([',', '}']).unwrap_or(rest.len());
        let token = rest[..end].trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }
}

/// Extracts one property value from within the `properties` object only.
pub fn extract_property(blob: &str, key: &str) -> Option<String> {
    let text = strip_type_suffix(blob);
    let (open, close) = properties_bounds(text)?;
    value_in_range(text, key, open + 1, close)
}

/// Resolves a vertex's domain identifier with strict precedence:
/// `properties.id`, then `properties.code` (natural key of code
/// vertices), then the store's top-level internal numeric id.
pub fn extract_vertex_id(blob: &str) -> Option<String> {
    let text = strip_type_suffix(blob);
    if let Some((open, close)) = properties_bounds(text) {
        if let Some(id) = value_in_range(text, "id", open + 1, close) {
            return Some(id);
        }
        if let Some(code) = value_in_range(text, "code", open + 1, close) {
            return Some(code);
        }
        // Top-level internal id lives before the properties object.
        return value_in_range(text, "id", 0, open);
    }
    value_in_range(text, "id", 0, text.len())
}

/// Top-level `label` field; bounded to the region before `properties`
/// so a property named "label" cannot shadow it.
pub fn extract_label(blob: &str) -> Option<String> {
    let text = strip_type_suffix(blob);
    let limit = properties_bounds(text).map(|(open, _)| open).unwrap_or(text.len());
    value_in_range(text, "label", 0, limit)
}

/// Edge blobs carry their type in the top-level `label` field.
pub fn extract_edge_type(blob: &str) -> Option<String> {
    extract_label(blob)
}

/// Decodes a vertex blob, or `None` when no identifier can be resolved.
/// Callers that only present data may substitute a synthetic ordinal id;
/// scoring and persistence never do.
pub fn decode_vertex(blob: &str) -> Option<DecodedVertex> {
    let id = extract_vertex_id(blob)?;
    let label = extract_label(blob).unwrap_or_else(|| "Unknown".to_string());
    Some(DecodedVertex { id, label })
}

/// Resolves the source/edge/target columns of an edge row: named
/// columns first, positional `c0`/`c1`/`c2` for older store versions.
pub fn edge_columns(row: &Row) -> Option<(&str, &str, &str)> {
    let named = (row.get("source"), row.get("edge"), row.get("target"));
    if let (Some(source), Some(edge), Some(target)) = named {
        return Some((source, edge, target));
    }
    let positional = (row.get("c0"), row.get("c1"), row.get("c2"));
    if let (Some(source), Some(edge), Some(target)) = positional {
        return Some((source, edge, target));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCTOR: &str = r#"{"id": 281474976710659, "label": "Doctor", "properties": {"id": "d1", "name": "Dr. Ada", "email": "ada@example.org"}}::vertex"#;
    const CODE: &str = r#"{"id": 281474976710777, "label": "ICD10Code", "properties": {"code": "I21.9", "description": "Acute myocardial infarction"}}::vertex"#;
    const BARE: &str = r#"{"id": 42, "label": "MedicalSpecialty", "properties": {}}::vertex"#;

    #[test]
    fn should_prefer_property_id_over_internal_id() {
        assert_eq!(extract_vertex_id(DOCTOR).as_deref(), Some("d1"));
    }

    #[test]
    fn should_fall_back_to_code_when_property_id_is_absent() {
        assert_eq!(extract_vertex_id(CODE).as_deref(), Some("I21.9"));
    }

    #[test]
    fn should_fall_back_to_internal_numeric_id_when_no_natural_key_exists() {
        assert_eq!(extract_vertex_id(BARE).as_deref(), Some("42"));
    }

    #[test]
    fn should_extract_label_from_top_level_only() {
        assert_eq!(extract_label(DOCTOR).as_deref(), Some("Doctor"));
        // A property named "label" must not shadow the top-level field.
        let tricky = r#"{"id": 7, "label": "Facility", "properties": {"label": "not-this", "id": "f1"}}::vertex"#;
        assert_eq!(extract_label(tricky).as_deref(), Some("Facility"));
    }

    #[test]
    fn should_scan_properties_within_brace_bounds_only() {
        assert_eq!(extract_property(DOCTOR, "name").as_deref(), Some("Dr. Ada"));
        assert_eq!(extract_property(CODE, "description").as_deref(), Some("Acute myocardial infarction"));
        // "id" exists top-level but not inside the empty properties map.
        assert_eq!(extract_property(BARE, "id"), None);
    }

    #[test]
    fn should_unescape_quoted_property_values() {
        let blob = r#"{"id": 1, "label": "MedicalCase", "properties": {"id": "c1", "chiefComplaint": "\"crushing\" chest pain"}}::vertex"#;
        assert_eq!(
            extract_property(blob, "chiefComplaint").as_deref(),
            Some("\"crushing\" chest pain")
        );
    }

    #[test]
    fn should_decode_vertex_with_label_and_id() {
        let decoded = decode_vertex(CODE).unwrap();
        assert_eq!(decoded.id, "I21.9");
        assert_eq!(decoded.label, "ICD10Code");
    }

    #[test]
    fn should_return_none_for_undecodable_blobs() {
        assert_eq!(decode_vertex("not a vertex"), None);
    }

    #[test]
    fn should_resolve_named_edge_columns_before_positional() {
        let mut row = Row::new();
        row.insert("source".into(), "s".into());
        row.insert("edge".into(), "e".into());
        row.insert("target".into(), "t".into());
        row.insert("c0".into(), "wrong".into());
        assert_eq!(edge_columns(&row), Some(("s", "e", "t")));
    }

    #[test]
    fn should_fall_back_to_positional_edge_columns() {
        let mut row = Row::new();
        row.insert("c0".into(), "s".into());
        row.insert("c1".into(), "e".into());
        row.insert("c2".into(), "t".into());
        assert_eq!(edge_columns(&row), Some(("s", "e", "t")));
        row.remove("c1");
        assert_eq!(edge_columns(&row), None);
    }
}
