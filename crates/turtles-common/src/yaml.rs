//! YAML parsing utilities using yaml-rust2
//!
//! Provides YAML parsing with conversion to serde_json::Value, plus splitting
//! of multi-document streams on `---` separator lines so every document can be
//! decoded (and rejected) on its own.
//!
//! Kubernetes manifests are written against YAML 1.1, where a plain integer
//! with a leading zero (`defaultMode: 0644`) is octal. yaml-rust2 follows the
//! 1.2 core schema and would read it as decimal, so such scalars are rewritten
//! to the `0o644` form before they reach the loader. Quoted values stay strings.

use serde_json::{Map, Number, Value};
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};
use yaml_rust2::{Yaml, YamlLoader};

/// Document separator marker
pub const DOCUMENT_SEPARATOR: &str = "---";

/// Error type for YAML parsing
#[derive(Debug, Clone, PartialEq)]
pub struct YamlError(String);

impl std::fmt::Display for YamlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for YamlError {}

/// A separator line that could not be split on
#[derive(Debug, Clone, PartialEq)]
pub struct SplitError {
    /// Index of the document the bad separator would have opened
    pub document: usize,
    /// 1-based line number of the separator
    pub line: usize,
    content: String,
}

impl std::fmt::Display for SplitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}: unexpected content after document separator: {:?}",
            self.line, self.content
        )
    }
}

impl std::error::Error for SplitError {}

/// Parse a YAML string into a serde_json::Value.
///
/// For multi-document YAML, returns only the first document.
/// Returns `Value::Null` for empty input.
pub fn parse_yaml(input: &str) -> Result<Value, YamlError> {
    // Duplicate keys are only reported through the loader's own entry point.
    YamlLoader::load_from_str(input).map_err(|e| YamlError(e.to_string()))?;

    let mut receiver = OctalScalars::default();
    Parser::new_from_str(input)
        .load(&mut receiver, true)
        .map_err(|e| YamlError(e.to_string()))?;

    match receiver.loader.documents().first() {
        Some(doc) => yaml_to_json(doc.clone()),
        None => Ok(Value::Null),
    }
}

/// Loader front-end that rewrites YAML 1.1 octal integers to `0o` form
#[derive(Default)]
struct OctalScalars {
    loader: YamlLoader,
}

impl MarkedEventReceiver for OctalScalars {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        let ev = match ev {
            Event::Scalar(value, TScalarStyle::Plain, anchor, None) if is_octal_literal(&value) => {
                Event::Scalar(format!("0o{}", &value[1..]), TScalarStyle::Plain, anchor, None)
            }
            other => other,
        };
        self.loader.on_event(ev, mark);
    }
}

fn is_octal_literal(value: &str) -> bool {
    value.len() > 1
        && value.starts_with('0')
        && value.bytes().all(|b| (b'0'..=b'7').contains(&b))
}

/// Split a multi-document YAML stream into its raw documents.
///
/// A line starting with `---` ends the current document. Only whitespace or a
/// `#` comment may follow the marker on that line. A marker on the very first
/// line only opens the first document. Every other separator closes one, so
/// empty documents keep their place and document indexes match the stream.
/// A trailing separator does not open an extra document.
pub fn split_documents(input: &str) -> Result<Vec<String>, SplitError> {
    let mut documents = Vec::new();
    let mut current = String::new();

    for (line_no, line) in input.lines().enumerate() {
        if let Some(rest) = line.strip_prefix(DOCUMENT_SEPARATOR) {
            let trailing = rest.trim();
            if !trailing.is_empty() && !trailing.starts_with('#') {
                return Err(SplitError {
                    document: documents.len() + usize::from(line_no > 0),
                    line: line_no + 1,
                    content: trailing.to_string(),
                });
            }
            if line_no > 0 {
                documents.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }

    if !current.is_empty() {
        documents.push(current);
    }

    Ok(documents)
}

/// Convert a yaml_rust2::Yaml value to serde_json::Value
fn yaml_to_json(yaml: Yaml) -> Result<Value, YamlError> {
    match yaml {
        Yaml::Null => Ok(Value::Null),
        Yaml::Boolean(b) => Ok(Value::Bool(b)),
        Yaml::Integer(i) => Ok(Value::Number(i.into())),
        Yaml::Real(s) => {
            let f: f64 = s
                .parse()
                .map_err(|e: std::num::ParseFloatError| YamlError(e.to_string()))?;
            Ok(Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null))
        }
        Yaml::String(s) => Ok(Value::String(s)),
        Yaml::Array(arr) => arr
            .into_iter()
            .map(yaml_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Yaml::Hash(map) => map
            .into_iter()
            .map(|(k, v)| {
                let key = match k {
                    Yaml::String(s) => s,
                    Yaml::Integer(i) => i.to_string(),
                    Yaml::Real(r) => r,
                    Yaml::Boolean(b) => b.to_string(),
                    Yaml::Null => "null".to_string(),
                    _ => return Err(YamlError("unsupported YAML key type".to_string())),
                };
                yaml_to_json(v).map(|v| (key, v))
            })
            .collect::<Result<Map<String, Value>, _>>()
            .map(Value::Object),
        Yaml::Alias(_) => Err(YamlError("YAML aliases not supported".to_string())),
        Yaml::BadValue => Err(YamlError("bad YAML value".to_string())),
    }
}
