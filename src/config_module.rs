//! Generation of the bundled `config.py` module.
//!
//! The JSON config is parsed here and re-emitted through an explicit
//! encoding rather than pasted as text: either a Python literal whose
//! spelling is fixed below, or compact JSON decoded with `json.loads` at
//! import time. Output is pure ASCII so Python 2 and 3 read it the same.
use crate::layout::{BundleLayout, ModuleFormat};
use crate::staging::write_staged_text;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Read and parse the user's JSON config.
pub fn load_config_value(path: &Path) -> Result<Value> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    Ok(value)
}

/// Parse `config_path` and write the generated module into the staging root.
pub fn synthesize_config_module(
    config_path: &Path,
    staging_root: &Path,
    layout: &BundleLayout,
) -> Result<PathBuf> {
    let value = load_config_value(config_path)?;
    let module = render_module(&value, config_path, layout)?;
    let path = write_staged_text(staging_root, &layout.config_module, &module)?;
    tracing::info!(
        module = %path.display(),
        format = ?layout.module_format,
        bytes = module.len(),
        "config module written"
    );
    Ok(path)
}

/// Render the full module source for `value`.
pub fn render_module(value: &Value, source: &Path, layout: &BundleLayout) -> Result<String> {
    let mut out = String::new();
    out.push_str("# -*- coding: utf-8 -*-\n");
    out.push_str(&format!(
        "# Generated by lpack from {}. Do not edit.\n",
        comment_safe(&source.display().to_string())
    ));
    let rhs = match layout.module_format {
        ModuleFormat::Literal => python_literal(value),
        ModuleFormat::Json => {
            out.push_str("import json\n");
            let json = serde_json::to_string(value).context("serialize config JSON")?;
            format!("json.loads({})", python_string(&json))
        }
    };
    out.push_str("\n\n");
    out.push_str(&format!("class {}(object):\n", layout.class_name));
    out.push('\n');
    out.push_str(&format!("    {} = {}\n", layout.attribute, rhs));
    Ok(out)
}

/// Render a JSON value as a Python expression that evaluates to the same data.
pub fn python_literal(value: &Value) -> String {
    let mut out = String::new();
    push_literal(&mut out, value);
    out
}

fn push_literal(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        // Numbers keep their source spelling, so integers of any size stay
        // exact and floats keep their '.' or exponent.
        Value::Number(number) => out.push_str(&number.to_string()),
        Value::String(text) => out.push_str(&python_string(text)),
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                push_literal(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (idx, (key, item)) in map.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                out.push_str(&python_string(key));
                out.push_str(": ");
                push_literal(out, item);
            }
            out.push('}');
        }
    }
}

/// Double-quoted, ASCII-only Python string literal.
///
/// Strings containing non-ASCII characters get a `u` prefix so `\u`
/// escapes decode to text on Python 2 as well.
pub fn python_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 3);
    if !text.is_ascii() {
        out.push('u');
    }
    out.push('"');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c if c.is_ascii() => out.push(c),
            c if (c as u32) <= 0xffff => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push_str(&format!("\\U{:08x}", c as u32)),
        }
    }
    out.push('"');
    out
}

fn comment_safe(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() || !c.is_ascii() { '?' } else { c })
        .collect()
}

#[cfg(test)]
#[path = "config_module_tests.rs"]
mod tests;
