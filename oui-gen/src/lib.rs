//! Compiles the public `oui-data` vendor index (a JSON object mapping MAC
//! prefixes to company names) into the Rust source of SmartRadar's embedded
//! OUI table.
//!
//! Per entry the prefix is reduced to its first six hex digits and parsed
//! as a 24-bit integer. The first occurrence of a prefix wins, in file
//! order. Names lose control characters and surrounding whitespace and are
//! cut to 30 characters (and 32 UTF-8 bytes) with a trailing `...`. The
//! output is sorted ascending so the firmware can binary-search it.

mod error;

pub use error::Error;

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use smartradar::oui::{ELLIPSIS, MAX_VENDOR_NAME_BYTES, MAX_VENDOR_NAME_LEN, TRUNCATED_NAME_LEN};

/// Counters for what happened to each input entry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompileStats {
    pub accepted: usize,
    /// Prefix with fewer than six hex digits, or a non-string name
    pub malformed: usize,
    /// Prefix already taken by an earlier entry
    pub duplicates: usize,
    pub empty_names: usize,
    pub truncated: usize,
}

impl fmt::Display for CompileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} accepted, {} malformed, {} duplicates, {} empty names, {} truncated",
            self.accepted, self.malformed, self.duplicates, self.empty_names, self.truncated
        )
    }
}

/// The compiled table: unique prefixes in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTable {
    pub entries: Vec<(u32, String)>,
    pub stats: CompileStats,
}

/// First six hex digits of `key` as a 24-bit prefix.
///
/// Separators and any other non-hex characters are ignored, so
/// `"24:0a:c4"`, `"24-0A-C4"` and `"240AC4"` are the same prefix.
pub fn normalize_prefix(key: &str) -> Option<u32> {
    let hex: String = key.chars().filter(char::is_ascii_hexdigit).take(6).collect();
    if hex.len() < 6 {
        return None;
    }
    u32::from_str_radix(&hex, 16).ok()
}

/// Clean a company name for embedding.
///
/// Returns the name and whether it was truncated, or `None` if nothing is
/// left after cleaning.
pub fn sanitize_name(name: &str) -> Option<(String, bool)> {
    let cleaned: String = name.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    if cleaned.chars().count() > MAX_VENDOR_NAME_LEN || cleaned.len() > MAX_VENDOR_NAME_BYTES {
        let budget = MAX_VENDOR_NAME_BYTES - ELLIPSIS.len();
        let mut short = String::new();
        for c in cleaned.chars().take(TRUNCATED_NAME_LEN) {
            if short.len() + c.len_utf8() > budget {
                break;
            }
            short.push(c);
        }
        short.push_str(ELLIPSIS);
        Some((short, true))
    } else {
        Some((cleaned.to_string(), false))
    }
}

/// Compile a parsed index. Iteration follows the map's order, which is
/// file order with `serde_json`'s `preserve_order`.
pub fn compile(index: &Map<String, Value>) -> CompiledTable {
    let mut stats = CompileStats::default();
    let mut table = BTreeMap::new();

    for (key, value) in index {
        let Some(prefix) = normalize_prefix(key) else {
            log::debug!("Skipping malformed prefix {:?}", key);
            stats.malformed += 1;
            continue;
        };
        if table.contains_key(&prefix) {
            log::debug!("Skipping duplicate prefix {:06X} ({:?})", prefix, key);
            stats.duplicates += 1;
            continue;
        }
        let Some(name) = value.as_str() else {
            log::debug!("Skipping {:?}: name is not a string", key);
            stats.malformed += 1;
            continue;
        };
        let Some((name, truncated)) = sanitize_name(name) else {
            log::debug!("Skipping {:?}: empty name", key);
            stats.empty_names += 1;
            continue;
        };
        if truncated {
            stats.truncated += 1;
        }
        table.insert(prefix, name);
    }

    stats.accepted = table.len();
    CompiledTable {
        entries: table.into_iter().collect(),
        stats,
    }
}

/// Parse and compile a JSON index held in memory.
pub fn compile_json(text: &str) -> Result<CompiledTable, Error> {
    match serde_json::from_str(text)? {
        Value::Object(index) => Ok(compile(&index)),
        _ => Err(Error::NotAnObject),
    }
}

/// Read and compile a JSON index file.
pub fn compile_file(path: &Path) -> Result<CompiledTable, Error> {
    let text = fs::read_to_string(path)?;
    compile_json(&text)
}

/// Render the table as the `vendors.rs` module.
pub fn emit_rust(table: &CompiledTable) -> String {
    let mut out = String::new();
    out.push_str("// Generated by oui-gen. Do not edit by hand.\n");
    out.push_str("// Regenerate: oui-gen --input index.json --output src/vendors.rs\n");
    let _ = writeln!(out, "// Entries: {}", table.entries.len());
    out.push('\n');
    out.push_str("use crate::oui::VendorEntry;\n");
    out.push('\n');
    out.push_str("/// Compiled OUI table, strictly ascending by prefix.\n");
    out.push_str("pub static OUI_TABLE: &[VendorEntry] = &[\n");
    for (prefix, name) in &table.entries {
        let _ = writeln!(
            out,
            "    VendorEntry::new(0x{:06X}, \"{}\"),",
            prefix,
            name.escape_debug()
        );
    }
    out.push_str("];\n");
    out
}

/// Whether `existing` is exactly what [`emit_rust`] produces for `table`.
pub fn is_up_to_date(existing: &str, table: &CompiledTable) -> bool {
    existing == emit_rust(table)
}
