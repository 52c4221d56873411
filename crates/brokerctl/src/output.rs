//! Rendering of command results as JSON, YAML or tables

use crate::cli::OutputFormat;
use crate::error::{BrokerCtlError, Result};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use jpx_core::Runtime;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

static JMESPATH_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// JMESPath runtime with the extended function set
fn jmespath_runtime() -> &'static Runtime {
    JMESPATH_RUNTIME.get_or_init(|| Runtime::builder().with_all_extensions().build())
}

/// Quote bare backtick literals so `` `stable` `` means `` `"stable"` ``
fn normalize_backtick_literals(query: &str) -> String {
    static BACKTICK_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = BACKTICK_RE
        .get_or_init(|| Regex::new(r"`([^`\\]*(?:\\.[^`\\]*)*)`").ok())
        .as_ref()
    else {
        return query.to_string();
    };

    re.replace_all(query, |caps: &regex::Captures| {
        let literal = caps[1].trim();
        if serde_json::from_str::<Value>(literal).is_ok() {
            caps[0].to_string()
        } else {
            format!("`{}`", Value::String(literal.to_string()))
        }
    })
    .into_owned()
}

/// Apply a JMESPath expression to a JSON value
pub fn apply_query(value: &Value, query: &str) -> Result<Value> {
    let expr = jmespath_runtime()
        .compile(&normalize_backtick_literals(query))
        .map_err(|e| BrokerCtlError::InvalidInput {
            message: format!("Invalid JMESPath expression '{}': {}", query, e),
        })?;
    expr.search(value).map_err(|e| BrokerCtlError::OutputError {
        message: format!("JMESPath query failed: {}", e),
    })
}

/// `Auto` means a table, or JSON once a query narrows the shape
pub fn resolve_format(format: OutputFormat, query: Option<&str>) -> OutputFormat {
    match format {
        OutputFormat::Auto if query.is_some() => OutputFormat::Json,
        OutputFormat::Auto => OutputFormat::Table,
        other => other,
    }
}

pub fn print_output<T: Serialize>(data: T, format: OutputFormat, query: Option<&str>) -> Result<()> {
    let mut value = serde_json::to_value(data)?;
    if let Some(query) = query {
        value = apply_query(&value, query)?;
    }

    match resolve_format(format, query) {
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&value).map_err(|e| BrokerCtlError::OutputError {
                message: format!("YAML error: {}", e),
            })?;
            print!("{}", yaml);
        }
        OutputFormat::Table => println!("{}", render_table(&value)),
        OutputFormat::Json | OutputFormat::Auto => {
            println!("{}", serde_json::to_string_pretty(&value)?)
        }
    }
    Ok(())
}

/// Arrays of objects become one row per element; objects become key/value rows
pub fn render_table(value: &Value) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    match value {
        Value::Array(rows) if rows.is_empty() => return "(none)".to_string(),
        Value::Array(rows) => {
            let mut headers: Vec<String> = Vec::new();
            for row in rows {
                if let Value::Object(obj) = row {
                    for key in obj.keys() {
                        if !headers.contains(key) {
                            headers.push(key.clone());
                        }
                    }
                }
            }

            if headers.is_empty() {
                table.set_header(vec!["VALUE"]);
                for row in rows {
                    table.add_row(vec![cell(row)]);
                }
            } else {
                table.set_header(headers.iter().map(|h| h.to_uppercase()));
                for row in rows {
                    table.add_row(
                        headers
                            .iter()
                            .map(|h| row.get(h).map(cell).unwrap_or_default()),
                    );
                }
            }
        }
        Value::Object(obj) => {
            table.set_header(vec!["FIELD", "VALUE"]);
            for (key, val) in obj {
                table.add_row(vec![key.clone(), cell(val)]);
            }
        }
        scalar => return cell(scalar),
    }

    table.to_string()
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(|v| !v.is_object() && !v.is_array()) => {
            items.iter().map(cell).collect::<Vec<_>>().join(",")
        }
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Object(obj) if obj.contains_key("name") && obj.contains_key("code") => {
            // error details
            obj.get("name").map(cell).unwrap_or_default()
        }
        Value::Object(obj) => obj
            .iter()
            .map(|(k, v)| format!("{}={}", k, cell(v)))
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}
