//! Cookbook metadata and a reader for the `metadata.rb` DSL
//!
//! Supports the declarative subset cookbooks use in practice: scalar fields,
//! dependency-style relations, `recipe`, `attribute`, `grouping`, the
//! `IO.read(File.join(File.dirname(__FILE__), 'README'))` idiom and
//! `%w{a b}.each do |x| ... end` loops over literal word lists.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::version::VersionNumber;
use crate::domain::DomainError;

/// Constraint recorded when a relation names no version.
pub const DEFAULT_CONSTRAINT: &str = ">= 0.0.0";

/// Cookbook metadata as serialized to `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookbookMetadata {
    pub name: String,
    pub description: String,
    pub long_description: String,
    pub maintainer: String,
    pub maintainer_email: String,
    pub license: String,
    pub platforms: BTreeMap<String, String>,
    pub dependencies: BTreeMap<String, String>,
    pub recommendations: BTreeMap<String, String>,
    pub suggestions: BTreeMap<String, String>,
    pub conflicting: BTreeMap<String, String>,
    pub providing: BTreeMap<String, String>,
    pub replacing: BTreeMap<String, String>,
    pub attributes: BTreeMap<String, Value>,
    pub groupings: BTreeMap<String, Value>,
    pub recipes: BTreeMap<String, String>,
    pub version: String,
}

impl Default for CookbookMetadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            long_description: String::new(),
            maintainer: String::new(),
            maintainer_email: String::new(),
            license: "none".to_string(),
            platforms: BTreeMap::new(),
            dependencies: BTreeMap::new(),
            recommendations: BTreeMap::new(),
            suggestions: BTreeMap::new(),
            conflicting: BTreeMap::new(),
            providing: BTreeMap::new(),
            replacing: BTreeMap::new(),
            attributes: BTreeMap::new(),
            groupings: BTreeMap::new(),
            recipes: BTreeMap::new(),
            version: "0.0.0".to_string(),
        }
    }
}

impl CookbookMetadata {
    pub fn to_json_pretty(&self) -> Result<String, DomainError> {
        serde_json::to_string_pretty(self).map_err(|e| DomainError::InvalidDocument {
            message: e.to_string(),
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Parsed Ruby literal argument.
#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Str(String),
    Bool(bool),
    Num(String),
    Nil,
    List(Vec<Arg>),
    Pair(String, Box<Arg>),
    Hash(Vec<(String, Arg)>),
}

impl Arg {
    fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) | Arg::Num(s) => Some(s),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Arg::Str(s) => Value::String(s.clone()),
            Arg::Bool(b) => Value::Bool(*b),
            Arg::Num(n) => n
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| n.parse::<f64>().map(Value::from))
                .unwrap_or_else(|_| Value::String(n.clone())),
            Arg::Nil => Value::Null,
            Arg::List(items) => Value::Array(items.iter().map(Arg::to_json).collect()),
            Arg::Pair(k, v) => {
                let mut map = Map::new();
                map.insert(k.clone(), v.to_json());
                Value::Object(map)
            }
            Arg::Hash(pairs) => Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

const READ_IDIOM: &str = r#"^(?:IO|File)\.read\(\s*File\.join\(\s*File\.dirname\(\s*__FILE__\s*\)\s*,\s*['"]([^'"]+)['"]\s*\)\s*\)$"#;

const WORD_LOOP: &str = r"^%w[\{\(\[](.*)[\}\)\]]\.each\s+do\s*\|\s*(\w+)\s*\|$";

/// Compiled patterns plus the sibling-file resolver.
struct Reader<F> {
    read_idiom: Regex,
    word_loop: Regex,
    read_sibling: F,
}

fn compile(pattern: &str) -> Result<Regex, DomainError> {
    Regex::new(pattern).map_err(|e| DomainError::MetadataParse {
        line: 0,
        message: e.to_string(),
    })
}

/// A complete statement with the line it started on.
struct Statement {
    line: usize,
    text: String,
}

/// Parse `metadata.rb` source.
///
/// `read_sibling` resolves files named by the `IO.read` idiom relative to the
/// cookbook directory.
pub fn parse_metadata_rb<F>(
    cookbook_name: &str,
    source: &str,
    read_sibling: F,
) -> Result<CookbookMetadata, DomainError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut metadata = CookbookMetadata {
        name: cookbook_name.to_string(),
        ..Default::default()
    };

    let reader = Reader {
        read_idiom: compile(READ_IDIOM)?,
        word_loop: compile(WORD_LOOP)?,
        read_sibling,
    };

    let statements = join_statements(source)?;
    let mut iter = statements.into_iter();
    while let Some(stmt) = iter.next() {
        if let Some(caps) = reader.word_loop.captures(&stmt.text) {
            let words: Vec<String> = caps[1].split_whitespace().map(String::from).collect();
            let var = caps[2].to_string();
            let mut body = Vec::new();
            for inner in iter.by_ref() {
                if inner.text == "end" {
                    break;
                }
                body.push(inner);
            }
            let var_re = Regex::new(&format!(r"\b{}\b", regex::escape(&var))).map_err(|e| {
                DomainError::MetadataParse {
                    line: stmt.line,
                    message: e.to_string(),
                }
            })?;
            for word in &words {
                for inner in &body {
                    let text = var_re
                        .replace_all(&inner.text, format!("'{word}'").as_str())
                        .into_owned();
                    apply_statement(&mut metadata, inner.line, &text, &reader)?;
                }
            }
            continue;
        }
        apply_statement(&mut metadata, stmt.line, &stmt.text, &reader)?;
    }

    Ok(metadata)
}

/// Join physical lines into statements: continuation while brackets are
/// open, or the line ends with `,` or `\`.
fn join_statements(source: &str) -> Result<Vec<Statement>, DomainError> {
    let mut statements = Vec::new();
    let mut pending: Option<Statement> = None;

    for (idx, raw) in source.lines().enumerate() {
        let line = strip_comment(raw);
        let line = line.trim();
        if line.is_empty() && pending.is_none() {
            continue;
        }
        let stmt = match pending.take() {
            Some(mut p) => {
                p.text.push(' ');
                p.text.push_str(line);
                p
            }
            None => Statement {
                line: idx + 1,
                text: line.to_string(),
            },
        };

        let continues = stmt.text.ends_with(',')
            || stmt.text.ends_with('\\')
            || open_brackets(&stmt.text) > 0;
        if continues {
            let mut stmt = stmt;
            if stmt.text.ends_with('\\') {
                stmt.text.pop();
            }
            pending = Some(stmt);
        } else {
            statements.push(stmt);
        }
    }

    if let Some(p) = pending {
        return Err(DomainError::MetadataParse {
            line: p.line,
            message: "unterminated statement".to_string(),
        });
    }
    Ok(statements)
}

/// Drop a trailing `# comment` that is outside string literals.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '#' => return &line[..i],
                _ => {}
            },
        }
    }
    line
}

fn open_brackets(text: &str) -> i32 {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in text.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                _ => {}
            },
        }
    }
    depth
}

fn apply_statement<F>(
    metadata: &mut CookbookMetadata,
    line: usize,
    text: &str,
    reader: &Reader<F>,
) -> Result<(), DomainError>
where
    F: Fn(&str) -> Option<String>,
{
    let (method, arg_text) = split_call(text);
    let err = |message: String| DomainError::MetadataParse { line, message };

    let args = split_top_level(arg_text, ',')
        .iter()
        .map(|a| parse_arg(a, reader).map_err(err))
        .collect::<Result<Vec<Arg>, DomainError>>()?;

    let string_arg = |idx: usize| -> Result<String, DomainError> {
        args.get(idx)
            .and_then(Arg::as_str)
            .map(String::from)
            .ok_or_else(|| err(format!("{method} expects a string argument")))
    };

    match method {
        "name" => metadata.name = string_arg(0)?,
        "maintainer" => metadata.maintainer = string_arg(0)?,
        "maintainer_email" => metadata.maintainer_email = string_arg(0)?,
        "license" => metadata.license = string_arg(0)?,
        "description" => metadata.description = string_arg(0)?,
        "long_description" => metadata.long_description = string_arg(0)?,
        "version" => {
            let version = string_arg(0)?;
            version.parse::<VersionNumber>()?;
            metadata.version = version;
        }
        "depends" | "recommends" | "suggests" | "conflicts" | "provides" | "replaces"
        | "supports" => {
            let target = string_arg(0)?;
            let constraint = args
                .get(1)
                .and_then(Arg::as_str)
                .unwrap_or(DEFAULT_CONSTRAINT)
                .to_string();
            let map = match method {
                "depends" => &mut metadata.dependencies,
                "recommends" => &mut metadata.recommendations,
                "suggests" => &mut metadata.suggestions,
                "conflicts" => &mut metadata.conflicting,
                "provides" => &mut metadata.providing,
                "replaces" => &mut metadata.replacing,
                _ => &mut metadata.platforms,
            };
            map.insert(target, constraint);
        }
        "recipe" => {
            let recipe = string_arg(0)?;
            let description = args
                .get(1)
                .and_then(Arg::as_str)
                .unwrap_or_default()
                .to_string();
            metadata.recipes.insert(recipe, description);
        }
        "attribute" | "grouping" => {
            let key = string_arg(0)?;
            let options = collect_options(&args[1..]);
            if method == "attribute" {
                metadata.attributes.insert(key, options);
            } else {
                metadata.groupings.insert(key, options);
            }
        }
        other => tracing::trace!("metadata.rb: ignoring {other} on line {line}"),
    }
    Ok(())
}

/// Merge trailing hash arguments into one JSON object.
fn collect_options(args: &[Arg]) -> Value {
    let mut map = Map::new();
    for arg in args {
        match arg {
            Arg::Pair(k, v) => {
                map.insert(k.clone(), v.to_json());
            }
            Arg::Hash(pairs) => {
                for (k, v) in pairs {
                    map.insert(k.clone(), v.to_json());
                }
            }
            _ => {}
        }
    }
    Value::Object(map)
}

/// Split `method args` / `method(args)` into its parts.
fn split_call(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    let method = &text[..end];
    let rest = text[end..].trim();
    if rest.starts_with('(') && rest.ends_with(')') && open_brackets(&rest[1..rest.len() - 1]) == 0
    {
        (method, rest[1..rest.len() - 1].trim())
    } else {
        (method, rest)
    }
}

/// Split on `sep` outside quotes and brackets.
fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            c if c == sep && depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Position of a top-level `=>` or `key:` separator, with its width.
fn find_pair_separator(text: &str) -> Option<(usize, usize)> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth = 0;
    let bytes = text.as_bytes();
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '=' if depth == 0 && bytes.get(i + 1) == Some(&b'>') => return Some((i, 2)),
            ':' if depth == 0
                && i > 0
                && bytes.get(i + 1).is_some_and(|b| b.is_ascii_whitespace()) =>
            {
                return Some((i, 1))
            }
            _ => {}
        }
    }
    None
}

fn parse_arg<F>(text: &str, reader: &Reader<F>) -> Result<Arg, String>
where
    F: Fn(&str) -> Option<String>,
{
    let text = text.trim();

    if let Some((pos, width)) = find_pair_separator(text) {
        let key = parse_arg(&text[..pos], reader)?;
        let key = match key {
            Arg::Str(k) => k,
            other => return Err(format!("unsupported hash key: {other:?}")),
        };
        let value = parse_arg(&text[pos + width..], reader)?;
        return Ok(Arg::Pair(key, Box::new(value)));
    }

    if let Some(caps) = reader.read_idiom.captures(text) {
        let file = &caps[1];
        return (reader.read_sibling)(file)
            .map(Arg::Str)
            .ok_or_else(|| format!("cannot read {file}"));
    }

    if text.len() >= 2 && (text.starts_with('\'') && text.ends_with('\'')) {
        return Ok(Arg::Str(unescape_single(&text[1..text.len() - 1])));
    }
    if text.len() >= 2 && (text.starts_with('"') && text.ends_with('"')) {
        return Ok(Arg::Str(unescape_double(&text[1..text.len() - 1])));
    }
    if let Some(sym) = text.strip_prefix(':') {
        return Ok(Arg::Str(sym.trim_matches('"').to_string()));
    }
    if text.starts_with('[') && text.ends_with(']') {
        let items = split_top_level(&text[1..text.len() - 1], ',')
            .iter()
            .map(|i| parse_arg(i, reader))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Arg::List(items));
    }
    if text.starts_with("%w") && text.len() > 3 {
        let inner = &text[3..text.len() - 1];
        return Ok(Arg::List(
            inner
                .split_whitespace()
                .map(|w| Arg::Str(w.to_string()))
                .collect(),
        ));
    }
    if text.starts_with('{') && text.ends_with('}') {
        let mut pairs = Vec::new();
        for part in split_top_level(&text[1..text.len() - 1], ',') {
            match parse_arg(&part, reader)? {
                Arg::Pair(k, v) => pairs.push((k, *v)),
                other => return Err(format!("expected key => value, got {other:?}")),
            }
        }
        return Ok(Arg::Hash(pairs));
    }
    match text {
        "true" => return Ok(Arg::Bool(true)),
        "false" => return Ok(Arg::Bool(false)),
        "nil" => return Ok(Arg::Nil),
        _ => {}
    }
    if !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Ok(Arg::Num(text.to_string()));
    }
    // Bare identifier used as a hash key (`key: value` form)
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Ok(Arg::Str(text.to_string()));
    }
    Err(format!("unsupported expression: {text}"))
}

fn unescape_single(s: &str) -> String {
    s.replace("\\'", "'").replace("\\\\", "\\")
}

fn unescape_double(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
