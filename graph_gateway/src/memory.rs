// graph_gateway/src/memory.rs
//
// In-memory implementation of the consumed `GraphStore` interface.
// Interprets the narrow pattern-language subset this engine emits
// (vertex MERGE with SET, MATCH + MERGE edge creation, UNWIND batches,
// count/distinct reads, DELETE, entity RETURN with ORDER BY id()/LIMIT)
// over an in-process property graph, and renders vertices/edges as the
// same self-describing text blobs the production store produces, so the
// decoding layer is exercised against realistic input.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use models::errors::{GraphError, GraphResult};
use models::properties::{ParamMap, PropertyValue};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::store::{GraphStore, Row};

#[derive(Clone, Debug)]
struct StoredVertex {
    internal_id: i64,
    label: String,
    properties: HashMap<String, String>,
}

#[derive(Clone, Debug)]
struct StoredEdge {
    internal_id: i64,
    edge_type: String,
    source: i64,
    target: i64,
}

#[derive(Default)]
struct GraphState {
    created: bool,
    next_id: i64,
    vertices: HashMap<i64, StoredVertex>,
    edges: HashMap<i64, StoredEdge>,
    edge_keys: HashSet<(i64, String, i64)>,
    indexed_labels: HashSet<String>,
}

impl GraphState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn find_vertices(&self, label: Option<&str>, props: &[(String, String)]) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .vertices
            .values()
            .filter(|v| label.map_or(true, |l| v.label == l))
            .filter(|v| props.iter().all(|(k, val)| v.properties.get(k) == Some(val)))
            .map(|v| v.internal_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn merge_vertex(&mut self, label: &str, props: &[(String, String)]) -> i64 {
        if let Some(&id) = self.find_vertices(Some(label), props).first() {
            return id;
        }
        let id = self.allocate_id();
        let vertex = StoredVertex {
            internal_id: id,
            label: label.to_string(),
            properties: props.iter().cloned().collect(),
        };
        self.vertices.insert(id, vertex);
        id
    }

    fn merge_edge(&mut self, source: i64, edge_type: &str, target: i64) {
        let key = (source, edge_type.to_string(), target);
        if self.edge_keys.contains(&key) {
            return;
        }
        let id = self.allocate_id();
        self.edges.insert(
            id,
            StoredEdge { internal_id: id, edge_type: edge_type.to_string(), source, target },
        );
        self.edge_keys.insert(key);
    }
}

/// In-memory graph store. Also the test backend for every layer above
/// the gateway.
#[derive(Clone)]
pub struct MemoryGraphStore {
    state: Arc<RwLock<GraphState>>,
}

impl Default for MemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self { state: Arc::new(RwLock::new(GraphState::default())) }
    }

    /// Labels for which an index was requested; observability for tests.
    pub async fn indexed_labels(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut labels: Vec<String> = state.indexed_labels.iter().cloned().collect();
        labels.sort();
        labels
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn execute(&self, query: &str, params: &ParamMap) -> GraphResult<Vec<Row>> {
        let mut state = self.state.write().await;
        if !state.created {
            return Err(GraphError::GraphMissing("graph has not been created".into()));
        }
        let clauses = parse_query(query)?;
        run_clauses(&mut state, &clauses, params)
    }

    async fn graph_exists(&self) -> GraphResult<bool> {
        Ok(self.state.read().await.created)
    }

    async fn create_graph(&self) -> GraphResult<()> {
        let mut state = self.state.write().await;
        state.created = true;
        Ok(())
    }

    async fn create_vertex_index(&self, label: &str) -> GraphResult<()> {
        let mut state = self.state.write().await;
        if !state.created {
            return Err(GraphError::GraphMissing("graph has not been created".into()));
        }
        state.indexed_labels.insert(label.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pattern-language parsing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum ValueRef {
    Param(String),
    Literal(String),
    Field(String, String),
}

#[derive(Clone, Debug)]
struct NodePattern {
    var: Option<String>,
    label: Option<String>,
    props: Vec<(String, ValueRef)>,
}

#[derive(Clone, Debug)]
struct EdgePattern {
    var: Option<String>,
    edge_type: Option<String>,
}

#[derive(Clone, Debug)]
struct PathPattern {
    nodes: Vec<NodePattern>,
    edges: Vec<EdgePattern>,
}

#[derive(Clone, Debug)]
enum ReturnItem {
    CountStar,
    Count { alias: String },
    DistinctVertexLabel { var: String, alias: String },
    DistinctEdgeType { var: String, alias: String },
    Entity { var: String, alias: Option<String> },
}

#[derive(Clone, Debug)]
struct ReturnClause {
    items: Vec<ReturnItem>,
    order_by_id: Option<String>,
    limit: Option<usize>,
}

#[derive(Clone, Debug)]
enum Clause {
    Unwind { items: Vec<HashMap<String, String>>, var: String },
    Match(PathPattern),
    Merge(PathPattern),
    Set(Vec<(String, String, ValueRef)>),
    Delete(String),
    Return(ReturnClause),
}

fn query_error(query_part: &str, reason: &str) -> GraphError {
    GraphError::QueryError(format!("{reason}: {query_part:?}"))
}

/// Splits a query into keyword-delimited clause bodies, respecting
/// single-quoted string literals.
fn split_clauses(query: &str) -> Vec<(String, String)> {
    const KEYWORDS: [&str; 6] = ["UNWIND", "MATCH", "MERGE", "SET", "DELETE", "RETURN"];
    let chars: Vec<char> = query.chars().collect();
    let mut boundaries: Vec<(usize, &str)> = Vec::new();
    let mut in_string = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == '\'' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if c == '\'' {
            in_string = true;
            i += 1;
            continue;
        }
        let at_word_start = i == 0 || !chars[i - 1].is_ascii_alphanumeric();
        if at_word_start {
            if let Some(kw) = KEYWORDS.iter().find(|kw| {
                let end = i + kw.len();
                end <= chars.len()
                    && chars[i..end].iter().collect::<String>() == **kw
                    && (end == chars.len() || !chars[end].is_ascii_alphanumeric())
            }) {
                boundaries.push((i, kw));
                i += kw.len();
                continue;
            }
        }
        i += 1;
    }

    let mut clauses = Vec::new();
    for (idx, (start, kw)) in boundaries.iter().enumerate() {
        let body_start = start + kw.len();
        let body_end = boundaries.get(idx + 1).map(|(next, _)| *next).unwrap_or(chars.len());
        let body: String = chars[body_start..body_end].iter().collect();
        clauses.push((kw.to_string(), body.trim().to_string()));
    }
    clauses
}

fn parse_query(query: &str) -> GraphResult<Vec<Clause>> {
    let normalized = query.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut clauses = Vec::new();
    for (keyword, body) in split_clauses(&normalized) {
        let clause = match keyword.as_str() {
            "UNWIND" => parse_unwind(&body)?,
            "MATCH" => Clause::Match(parse_path(&body)?),
            "MERGE" => Clause::Merge(parse_path(&body)?),
            "SET" => parse_set(&body)?,
            "DELETE" => Clause::Delete(body.trim().to_string()),
            "RETURN" => Clause::Return(parse_return(&body)?),
            _ => return Err(query_error(&body, "unsupported clause")),
        };
        clauses.push(clause);
    }
    if clauses.is_empty() {
        return Err(query_error(query, "empty query"));
    }
    Ok(clauses)
}

fn parse_unwind(body: &str) -> GraphResult<Clause> {
    let open = body.find('[').ok_or_else(|| query_error(body, "UNWIND expects a list"))?;
    let close = find_balanced(body, open, '[', ']')
        .ok_or_else(|| query_error(body, "unterminated UNWIND list"))?;
    let list_text = &body[open + 1..close];
    let rest = body[close + 1..].trim();
    let var = rest
        .strip_prefix("AS ")
        .map(|v| v.trim().to_string())
        .ok_or_else(|| query_error(body, "UNWIND expects AS <var>"))?;

    let mut items = Vec::new();
    let mut cursor = 0;
    let bytes: Vec<char> = list_text.chars().collect();
    while cursor < bytes.len() {
        if bytes[cursor] == '{' {
            let end = find_balanced(list_text, cursor, '{', '}')
                .ok_or_else(|| query_error(list_text, "unterminated map in UNWIND list"))?;
            let map_text: String = bytes[cursor + 1..end].iter().collect();
            items.push(parse_literal_map(&map_text)?);
            cursor = end + 1;
        } else {
            cursor += 1;
        }
    }
    Ok(Clause::Unwind { items, var })
}

/// Parses `key: 'value', key2: 'value2'` map bodies from UNWIND lists.
fn parse_literal_map(text: &str) -> GraphResult<HashMap<String, String>> {
    let mut map = HashMap::new();
    for part in split_top_level(text, ',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part
            .split_once(':')
            .ok_or_else(|| query_error(part, "expected key: value"))?;
        match parse_value_ref(value.trim())? {
            ValueRef::Literal(s) => {
                map.insert(key.trim().to_string(), s);
            }
            _ => return Err(query_error(part, "UNWIND maps must carry literal values")),
        }
    }
    Ok(map)
}

fn parse_set(body: &str) -> GraphResult<Clause> {
    let mut assignments = Vec::new();
    for part in split_top_level(body, ',') {
        let part = part.trim();
        let (target, value) = part
            .split_once('=')
            .ok_or_else(|| query_error(part, "SET expects var.prop = value"))?;
        let (var, prop) = target
            .trim()
            .split_once('.')
            .ok_or_else(|| query_error(part, "SET target must be var.prop"))?;
        assignments.push((var.to_string(), prop.to_string(), parse_value_ref(value.trim())?));
    }
    Ok(Clause::Set(assignments))
}

fn parse_return(body: &str) -> GraphResult<ReturnClause> {
    let mut rest = body.trim().to_string();
    let mut limit = None;
    if let Some(pos) = rest.rfind(" LIMIT ") {
        let value = rest[pos + 7..].trim();
        limit = Some(
            value
                .parse::<usize>()
                .map_err(|_| query_error(value, "invalid LIMIT"))?,
        );
        rest.truncate(pos);
    }
    let mut order_by_id = None;
    if let Some(pos) = rest.rfind(" ORDER BY id(") {
        let tail = &rest[pos + 13..];
        let close = tail.find(')').ok_or_else(|| query_error(body, "unterminated ORDER BY"))?;
        order_by_id = Some(tail[..close].trim().to_string());
        rest.truncate(pos);
    }

    let mut items = Vec::new();
    for part in split_top_level(rest.trim(), ',') {
        let part = part.trim();
        if part == "count(*)" {
            items.push(ReturnItem::CountStar);
        } else if let Some(inner) = strip_call(part, "count(") {
            let alias = inner.1.unwrap_or_else(|| "c".to_string());
            items.push(ReturnItem::Count { alias });
        } else if let Some(stripped) = part.strip_prefix("DISTINCT ") {
            let stripped = stripped.trim();
            if let Some((var, alias)) = strip_call(stripped, "labels(") {
                items.push(ReturnItem::DistinctVertexLabel {
                    var,
                    alias: alias.unwrap_or_else(|| "type".to_string()),
                });
            } else if let Some((var, alias)) = strip_call(stripped, "type(") {
                items.push(ReturnItem::DistinctEdgeType {
                    var,
                    alias: alias.unwrap_or_else(|| "type".to_string()),
                });
            } else {
                return Err(query_error(part, "unsupported DISTINCT projection"));
            }
        } else {
            let (var, alias) = match part.split_once(" as ") {
                Some((v, a)) => (v.trim().to_string(), Some(a.trim().to_string())),
                None => (part.to_string(), None),
            };
            items.push(ReturnItem::Entity { var, alias });
        }
    }
    Ok(ReturnClause { items, order_by_id, limit })
}

/// Extracts the argument and optional alias of calls shaped like
/// `labels(v)[0] as type`, `count(v) as cnt` or `type(e) as type`.
fn strip_call(part: &str, prefix: &str) -> Option<(String, Option<String>)> {
    let rest = part.strip_prefix(prefix)?;
    let close = rest.find(')')?;
    let var = rest[..close].trim().to_string();
    let tail = rest[close + 1..].trim_start_matches("[0]").trim();
    let alias = tail.strip_prefix("as ").map(|a| a.trim().to_string());
    Some((var, alias))
}

fn parse_path(body: &str) -> GraphResult<PathPattern> {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut rest = body.trim();
    loop {
        let (node, remainder) = parse_node(rest)?;
        nodes.push(node);
        rest = remainder.trim_start();
        if let Some(after) = rest.strip_prefix("-[") {
            let close = after.find(']').ok_or_else(|| query_error(body, "unterminated edge pattern"))?;
            let inner = &after[..close];
            let (var, edge_type) = match inner.split_once(':') {
                Some((v, t)) => {
                    let v = v.trim();
                    (if v.is_empty() { None } else { Some(v.to_string()) }, Some(t.trim().to_string()))
                }
                None => {
                    let v = inner.trim();
                    (if v.is_empty() { None } else { Some(v.to_string()) }, None)
                }
            };
            edges.push(EdgePattern { var, edge_type });
            rest = after[close + 1..]
                .strip_prefix("->")
                .ok_or_else(|| query_error(body, "only directed -> edges are supported"))?
                .trim_start();
            continue;
        }
        break;
    }
    if !rest.is_empty() {
        // Comma-separated patterns are not supported; callers issue one
        // MATCH clause per pattern instead.
        return Err(query_error(rest, "trailing pattern text"));
    }
    Ok(PathPattern { nodes, edges })
}

fn parse_node(text: &str) -> GraphResult<(NodePattern, &str)> {
    let rest = text
        .strip_prefix('(')
        .ok_or_else(|| query_error(text, "expected node pattern"))?;
    let close = find_balanced(text, 0, '(', ')')
        .ok_or_else(|| query_error(text, "unterminated node pattern"))?;
    let inner = &text[1..close];
    let remainder = &text[close + 1..];
    let _ = rest;

    let (head, props_text) = match inner.find('{') {
        Some(open) => {
            let prop_close = find_balanced(inner, open, '{', '}')
                .ok_or_else(|| query_error(inner, "unterminated property map"))?;
            (&inner[..open], Some(&inner[open + 1..prop_close]))
        }
        None => (inner, None),
    };

    let head = head.trim();
    let (var, label) = match head.split_once(':') {
        Some((v, l)) => {
            let v = v.trim();
            (if v.is_empty() { None } else { Some(v.to_string()) }, Some(l.trim().to_string()))
        }
        None => (if head.is_empty() { None } else { Some(head.to_string()) }, None),
    };

    let mut props = Vec::new();
    if let Some(text) = props_text {
        for part in split_top_level(text, ',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (key, value) = part
                .split_once(':')
                .ok_or_else(|| query_error(part, "expected key: value in property map"))?;
            props.push((key.trim().to_string(), parse_value_ref(value.trim())?));
        }
    }
    Ok((NodePattern { var, label, props }, remainder))
}

fn parse_value_ref(text: &str) -> GraphResult<ValueRef> {
    if let Some(name) = text.strip_prefix('$') {
        return Ok(ValueRef::Param(name.to_string()));
    }
    if text.starts_with('\'') {
        let inner = &text[1..text.len().saturating_sub(1)];
        return Ok(ValueRef::Literal(unescape(inner)));
    }
    if let Some((var, field)) = text.split_once('.') {
        return Ok(ValueRef::Field(var.to_string(), field.to_string()));
    }
    // Bare numeric or boolean literal.
    Ok(ValueRef::Literal(text.to_string()))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => break,
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits on a separator at brace/bracket/paren depth zero, respecting
/// single-quoted strings.
fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_string {
            current.push(c);
            if c == '\\' {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            } else if c == '\'' {
                in_string = false;
            }
            continue;
        }
        match c {
            '\'' => {
                in_string = true;
                current.push(c);
            }
            '{' | '[' | '(' => {
                depth += 1;
                current.push(c);
            }
            '}' | ']' | ')' => {
                depth -= 1;
                current.push(c);
            }
            c if c == separator && depth == 0 => {
                parts.push(current.clone());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// Index of the closing delimiter matching the opener at `open`,
/// respecting nesting and single-quoted strings.
fn find_balanced(text: &str, open: usize, open_char: char, close_char: char) -> Option<usize> {
    let chars: Vec<char> = text.chars().collect();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut i = open;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == '\'' {
                in_string = false;
            }
        } else if c == '\'' {
            in_string = true;
        } else if c == open_char {
            depth += 1;
        } else if c == close_char {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum Binding {
    Vertex(i64),
    Edge(i64),
    Item(HashMap<String, String>),
}

type Frame = HashMap<String, Binding>;

fn resolve_value(value: &ValueRef, frame: &Frame, params: &ParamMap) -> GraphResult<String> {
    match value {
        ValueRef::Literal(s) => Ok(s.clone()),
        ValueRef::Param(name) => params
            .get(name)
            .map(PropertyValue::render)
            .ok_or_else(|| GraphError::QueryError(format!("missing parameter ${name}"))),
        ValueRef::Field(var, field) => match frame.get(var) {
            Some(Binding::Item(map)) => map
                .get(field)
                .cloned()
                .ok_or_else(|| GraphError::QueryError(format!("missing field {var}.{field}"))),
            _ => Err(GraphError::QueryError(format!("{var} is not an UNWIND row"))),
        },
    }
}

fn resolve_props(
    props: &[(String, ValueRef)],
    frame: &Frame,
    params: &ParamMap,
) -> GraphResult<Vec<(String, String)>> {
    props
        .iter()
        .map(|(k, v)| Ok((k.clone(), resolve_value(v, frame, params)?)))
        .collect()
}

fn run_clauses(state: &mut GraphState, clauses: &[Clause], params: &ParamMap) -> GraphResult<Vec<Row>> {
    let mut frames: Vec<Frame> = vec![Frame::new()];
    let mut output: Vec<Row> = Vec::new();

    for clause in clauses {
        match clause {
            Clause::Unwind { items, var } => {
                let mut next = Vec::new();
                for frame in &frames {
                    for item in items {
                        let mut extended = frame.clone();
                        extended.insert(var.clone(), Binding::Item(item.clone()));
                        next.push(extended);
                    }
                }
                frames = next;
            }
            Clause::Match(path) => {
                let mut next = Vec::new();
                for frame in &frames {
                    next.extend(match_path(state, path, frame, params)?);
                }
                frames = next;
            }
            Clause::Merge(path) => {
                for frame in &mut frames {
                    merge_path(state, path, frame, params)?;
                }
            }
            Clause::Set(assignments) => {
                for frame in &frames {
                    for (var, prop, value) in assignments {
                        let resolved = resolve_value(value, frame, params)?;
                        match frame.get(var) {
                            Some(Binding::Vertex(id)) => {
                                if let Some(vertex) = state.vertices.get_mut(id) {
                                    vertex.properties.insert(prop.clone(), resolved);
                                }
                            }
                            _ => {
                                return Err(GraphError::QueryError(format!(
                                    "SET target {var} is not a bound vertex"
                                )))
                            }
                        }
                    }
                }
            }
            Clause::Delete(var) => {
                delete_bound(state, &frames, var)?;
            }
            Clause::Return(ret) => {
                output = project(state, &frames, ret)?;
            }
        }
    }
    Ok(output)
}

fn match_path(
    state: &GraphState,
    path: &PathPattern,
    frame: &Frame,
    params: &ParamMap,
) -> GraphResult<Vec<Frame>> {
    // Seed with the first node's candidates, then extend along edges.
    let first = &path.nodes[0];
    let mut partial: Vec<Frame> = Vec::new();
    for id in node_candidates(state, first, frame, params)? {
        let mut extended = frame.clone();
        if let Some(var) = &first.var {
            extended.insert(var.clone(), Binding::Vertex(id));
        }
        extended.insert(anchor_key(0), Binding::Vertex(id));
        partial.push(extended);
    }

    for (i, edge) in path.edges.iter().enumerate() {
        let node = &path.nodes[i + 1];
        let mut next = Vec::new();
        for current in &partial {
            let source = match current.get(&anchor_key(i)) {
                Some(Binding::Vertex(id)) => *id,
                _ => continue,
            };
            for stored in state.edges.values() {
                if stored.source != source {
                    continue;
                }
                if let Some(t) = &edge.edge_type {
                    if &stored.edge_type != t {
                        continue;
                    }
                }
                if !vertex_matches(state, stored.target, node, current, params)? {
                    continue;
                }
                let mut extended = current.clone();
                if let Some(var) = &edge.var {
                    extended.insert(var.clone(), Binding::Edge(stored.internal_id));
                }
                if let Some(var) = &node.var {
                    extended.insert(var.clone(), Binding::Vertex(stored.target));
                }
                extended.insert(anchor_key(i + 1), Binding::Vertex(stored.target));
                next.push(extended);
            }
        }
        partial = next;
    }

    // Drop positional anchors before handing frames back.
    for frame in &mut partial {
        frame.retain(|key, _| !key.starts_with('\u{1}'));
    }
    Ok(partial)
}

/// Positional anchor keys track the current path position without
/// clobbering user variables; the prefix keeps them out of the namespace.
fn anchor_key(position: usize) -> String {
    format!("\u{1}anchor{position}")
}

fn node_candidates(
    state: &GraphState,
    node: &NodePattern,
    frame: &Frame,
    params: &ParamMap,
) -> GraphResult<Vec<i64>> {
    if let Some(var) = &node.var {
        if let Some(Binding::Vertex(id)) = frame.get(var) {
            return if vertex_matches(state, *id, node, frame, params)? {
                Ok(vec![*id])
            } else {
                Ok(Vec::new())
            };
        }
    }
    let props = resolve_props(&node.props, frame, params)?;
    Ok(state.find_vertices(node.label.as_deref(), &props))
}

fn vertex_matches(
    state: &GraphState,
    id: i64,
    node: &NodePattern,
    frame: &Frame,
    params: &ParamMap,
) -> GraphResult<bool> {
    let vertex = match state.vertices.get(&id) {
        Some(v) => v,
        None => return Ok(false),
    };
    if let Some(label) = &node.label {
        if &vertex.label != label {
            return Ok(false);
        }
    }
    for (key, value) in resolve_props(&node.props, frame, params)? {
        if vertex.properties.get(&key) != Some(&value) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn merge_path(
    state: &mut GraphState,
    path: &PathPattern,
    frame: &mut Frame,
    params: &ParamMap,
) -> GraphResult<()> {
    let mut previous = ensure_node(state, &path.nodes[0], frame, params)?;
    for (i, edge) in path.edges.iter().enumerate() {
        let next = ensure_node(state, &path.nodes[i + 1], frame, params)?;
        let edge_type = edge
            .edge_type
            .as_deref()
            .ok_or_else(|| GraphError::QueryError("MERGE edges must carry a type".into()))?;
        state.merge_edge(previous, edge_type, next);
        previous = next;
    }
    Ok(())
}

/// Resolves a node pattern to a vertex id, creating the vertex when the
/// pattern matches nothing (MERGE get-or-create semantics). Bound
/// variables short-circuit.
fn ensure_node(
    state: &mut GraphState,
    node: &NodePattern,
    frame: &mut Frame,
    params: &ParamMap,
) -> GraphResult<i64> {
    if let Some(var) = &node.var {
        if let Some(Binding::Vertex(id)) = frame.get(var) {
            return Ok(*id);
        }
    }
    let label = node
        .label
        .as_deref()
        .ok_or_else(|| GraphError::QueryError("MERGE nodes must carry a label".into()))?;
    let props = resolve_props(&node.props, frame, params)?;
    let id = state.merge_vertex(label, &props);
    if let Some(var) = &node.var {
        frame.insert(var.clone(), Binding::Vertex(id));
    }
    Ok(id)
}

fn delete_bound(state: &mut GraphState, frames: &[Frame], var: &str) -> GraphResult<()> {
    let mut vertex_ids = HashSet::new();
    let mut edge_ids = HashSet::new();
    for frame in frames {
        match frame.get(var) {
            Some(Binding::Vertex(id)) => {
                vertex_ids.insert(*id);
            }
            Some(Binding::Edge(id)) => {
                edge_ids.insert(*id);
            }
            _ => {}
        }
    }
    for id in &edge_ids {
        if let Some(edge) = state.edges.remove(id) {
            state.edge_keys.remove(&(edge.source, edge.edge_type, edge.target));
        }
    }
    // Vertex deletion with live edges is a referential-constraint
    // violation; edges must be removed first.
    for id in &vertex_ids {
        if state.edges.values().any(|e| e.source == *id || e.target == *id) {
            return Err(GraphError::StorageError(format!(
                "cannot delete vertex {id}: edges still reference it"
            )));
        }
    }
    for id in &vertex_ids {
        state.vertices.remove(id);
    }
    Ok(())
}

fn project(state: &GraphState, frames: &[Frame], ret: &ReturnClause) -> GraphResult<Vec<Row>> {
    // Count and distinct projections aggregate over all frames.
    if let Some(item) = ret.items.first() {
        match item {
            ReturnItem::CountStar => {
                let mut row = Row::new();
                row.insert("c".to_string(), frames.len().to_string());
                return Ok(vec![row]);
            }
            ReturnItem::Count { alias } => {
                let mut row = Row::new();
                row.insert(alias.clone(), frames.len().to_string());
                return Ok(vec![row]);
            }
            ReturnItem::DistinctVertexLabel { var, alias } => {
                let mut seen = HashSet::new();
                let mut rows = Vec::new();
                for frame in frames {
                    if let Some(Binding::Vertex(id)) = frame.get(var) {
                        if let Some(vertex) = state.vertices.get(id) {
                            if seen.insert(vertex.label.clone()) {
                                let mut row = Row::new();
                                row.insert(alias.clone(), vertex.label.clone());
                                rows.push(row);
                            }
                        }
                    }
                }
                return Ok(rows);
            }
            ReturnItem::DistinctEdgeType { var, alias } => {
                let mut seen = HashSet::new();
                let mut rows = Vec::new();
                for frame in frames {
                    if let Some(Binding::Edge(id)) = frame.get(var) {
                        if let Some(edge) = state.edges.get(id) {
                            if seen.insert(edge.edge_type.clone()) {
                                let mut row = Row::new();
                                row.insert(alias.clone(), edge.edge_type.clone());
                                rows.push(row);
                            }
                        }
                    }
                }
                return Ok(rows);
            }
            ReturnItem::Entity { .. } => {}
        }
    }

    let mut ordered: Vec<&Frame> = frames.iter().collect();
    if let Some(var) = &ret.order_by_id {
        ordered.sort_by_key(|frame| match frame.get(var) {
            Some(Binding::Vertex(id)) | Some(Binding::Edge(id)) => *id,
            _ => i64::MAX,
        });
    }
    if let Some(limit) = ret.limit {
        ordered.truncate(limit);
    }

    let single = ret.items.len() == 1;
    let mut rows = Vec::new();
    for frame in ordered {
        let mut row = Row::new();
        for (idx, item) in ret.items.iter().enumerate() {
            if let ReturnItem::Entity { var, alias } = item {
                let column = alias
                    .clone()
                    .unwrap_or_else(|| if single { "c".to_string() } else { format!("c{idx}") });
                let rendered = match frame.get(var) {
                    Some(Binding::Vertex(id)) => {
                        state.vertices.get(id).map(render_vertex).unwrap_or_default()
                    }
                    Some(Binding::Edge(id)) => {
                        state.edges.get(id).map(render_edge).unwrap_or_default()
                    }
                    Some(Binding::Item(_)) | None => String::new(),
                };
                row.insert(column, rendered);
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Renders a vertex the way the production store serializes it: a JSON
/// object with the internal id, label and nested properties, tagged with
/// a `::vertex` suffix.
fn render_vertex(vertex: &StoredVertex) -> String {
    let props: Value = vertex
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect::<serde_json::Map<String, Value>>()
        .into();
    let blob = json!({
        "id": vertex.internal_id,
        "label": vertex.label,
        "properties": props,
    });
    format!("{blob}::vertex")
}

fn render_edge(edge: &StoredEdge) -> String {
    let blob = json!({
        "id": edge.internal_id,
        "label": edge.edge_type,
        "start_id": edge.source,
        "end_id": edge.target,
        "properties": {},
    });
    format!("{blob}::edge")
}
