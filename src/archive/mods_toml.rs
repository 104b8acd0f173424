//! mods.toml / neoforge.mods.toml parser
//!
//! Reads the `[[mods]]` table for identity and the `[[dependencies.<modId>]]`
//! tables for the runtime and loader requirements. Maven-style version
//! ranges (`[1.20.1,1.21)`) are converted into constraint expressions.

use std::collections::HashMap;

use tracing::warn;

use crate::archive::entries::ArchiveEntries;
use crate::archive::types::{ArchiveMetadata, LoaderKind};
use crate::compat::matcher::VersionConstraint;

pub const NEOFORGE_MANIFEST_NAME: &str = "META-INF/neoforge.mods.toml";
pub const FORGE_MANIFEST_NAME: &str = "META-INF/mods.toml";
const JAR_MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";
const JAR_VERSION_PLACEHOLDER: &str = "${file.jarVersion}";

/// Locate and parse the TOML manifest of an archive
pub fn read(archive: &mut dyn ArchiveEntries) -> Option<ArchiveMetadata> {
    let (content, loader) = if let Some(text) = archive.entry_text(NEOFORGE_MANIFEST_NAME) {
        (text, LoaderKind::NeoForge)
    } else if let Some(text) = archive.entry_text(FORGE_MANIFEST_NAME) {
        (text, LoaderKind::Forge)
    } else {
        let name = archive.find_entry_by_suffix("/mods.toml")?;
        (archive.entry_text(&name)?, LoaderKind::Forge)
    };

    let mut metadata = parse(&content, loader)?;

    if metadata.version.as_deref() == Some(JAR_VERSION_PLACEHOLDER) {
        metadata.version = archive
            .entry_text(JAR_MANIFEST_NAME)
            .and_then(|manifest| implementation_version(&manifest));
    }

    Some(metadata)
}

/// Parse mods.toml content. Returns `None` when no `[[mods]]` table exists.
pub fn parse(content: &str, default_loader: LoaderKind) -> Option<ArchiveMetadata> {
    let sections = parse_sections(content)?;

    let top_level = sections.iter().find(|s| s.name.is_none())?;
    let mods = sections
        .iter()
        .find(|s| s.name.as_deref() == Some("mods"))?;

    let mut metadata = ArchiveMetadata::new(default_loader);
    metadata.mod_id = mods.get("modId");
    metadata.name = mods.get("displayName");
    metadata.version = mods.get("version");
    metadata.description = mods.get("description").map(|d| d.trim().to_string());
    metadata.loader_version = top_level
        .get("loaderVersion")
        .and_then(|range| maven_range(&range));

    let dependencies = sections.iter().filter(|s| {
        s.name
            .as_deref()
            .is_some_and(|name| name.starts_with("dependencies."))
    });

    for dependency in dependencies {
        let Some(dep_id) = dependency.get("modId") else {
            continue;
        };
        let range = dependency.get("versionRange");

        match dep_id.as_str() {
            "minecraft" => {
                metadata.minecraft_version = range.and_then(|r| maven_range(&r));
            }
            "neoforge" => {
                metadata.loader = LoaderKind::NeoForge;
                metadata.loader_version = range.and_then(|r| maven_range(&r));
            }
            "forge" => {
                metadata.loader_version = range.and_then(|r| maven_range(&r));
            }
            _ => {}
        }
    }

    Some(metadata)
}

/// Convert a Maven version range into a constraint expression.
///
/// Examples:
/// - "[1.20.1,1.21)" -> ">=1.20.1 <1.21"
/// - "[1.20.1,)" -> ">=1.20.1"
/// - "[1.20.1]" -> "1.20.1"
/// - "1.20.1" -> "1.20.1"
pub fn maven_range(range: &str) -> Option<VersionConstraint> {
    let range = range.trim();
    if range.is_empty() {
        return None;
    }

    let (Some(open), Some(close)) = (range.chars().next(), range.chars().last()) else {
        return None;
    };

    if !matches!(open, '[' | '(') || !matches!(close, ']' | ')') || range.len() < 2 {
        return Some(VersionConstraint::One(range.to_string()));
    }

    let inner = &range[1..range.len() - 1];
    let Some((lower, upper)) = inner.split_once(',') else {
        let exact = inner.trim();
        return (!exact.is_empty()).then(|| VersionConstraint::One(exact.to_string()));
    };

    let lower = lower.trim();
    let upper = upper.trim();
    let mut bounds = Vec::new();

    if !lower.is_empty() {
        let op = if open == '[' { ">=" } else { ">" };
        bounds.push(format!("{op}{lower}"));
    }
    if !upper.is_empty() {
        let op = if close == ']' { "<=" } else { "<" };
        bounds.push(format!("{op}{upper}"));
    }

    if bounds.is_empty() {
        return Some(VersionConstraint::One("*".to_string()));
    }

    Some(VersionConstraint::One(bounds.join(" ")))
}

/// Read `Implementation-Version` from a jar manifest
fn implementation_version(manifest: &str) -> Option<String> {
    manifest.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "Implementation-Version")
            .then(|| value.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// A top-level block of key/value pairs
#[derive(Debug, Default)]
struct TomlSection {
    /// `None` for the pairs before the first table header
    name: Option<String>,
    pairs: HashMap<String, String>,
}

impl TomlSection {
    fn get(&self, key: &str) -> Option<String> {
        self.pairs.get(key).cloned()
    }
}

fn parse_sections(content: &str) -> Option<Vec<TomlSection>> {
    let mut parser = tree_sitter::Parser::new();
    let language = tree_sitter_toml_ng::LANGUAGE;
    parser
        .set_language(&language.into())
        .inspect_err(|e| warn!("Failed to set TOML language for tree-sitter: {}", e))
        .ok()?;

    let tree = parser.parse(content, None)?;
    let root = tree.root_node();

    let mut sections = vec![TomlSection::default()];
    let mut cursor = root.walk();

    for child in root.children(&mut cursor) {
        match child.kind() {
            "pair" => {
                if let Some((key, value)) = read_pair(child, content) {
                    sections[0].pairs.insert(key, value);
                }
            }
            "table" | "table_array_element" => {
                sections.push(read_section(child, content));
            }
            _ => {}
        }
    }

    Some(sections)
}

fn is_key_kind(kind: &str) -> bool {
    matches!(kind, "bare_key" | "dotted_key" | "quoted_key")
}

/// Normalize a key like `dependencies. "examplemod"` to `dependencies.examplemod`
fn key_text(node: tree_sitter::Node, content: &str) -> String {
    content[node.byte_range()]
        .split('.')
        .map(|part| part.trim().trim_matches('"').trim_matches('\''))
        .collect::<Vec<_>>()
        .join(".")
}

fn read_section(node: tree_sitter::Node, content: &str) -> TomlSection {
    let mut section = TomlSection::default();
    let mut cursor = node.walk();

    for child in node.children(&mut cursor) {
        if section.name.is_none() && is_key_kind(child.kind()) {
            section.name = Some(key_text(child, content));
        } else if child.kind() == "pair"
            && let Some((key, value)) = read_pair(child, content)
        {
            section.pairs.insert(key, value);
        }
    }

    section
}

fn read_pair(node: tree_sitter::Node, content: &str) -> Option<(String, String)> {
    let mut cursor = node.walk();
    let mut key: Option<String> = None;
    let mut value: Option<String> = None;

    for child in node.children(&mut cursor) {
        let kind = child.kind();
        if key.is_none() && is_key_kind(kind) {
            key = Some(key_text(child, content));
        } else if key.is_some() && kind != "=" && child.is_named() {
            let raw = &content[child.byte_range()];
            value = Some(if kind == "string" {
                unquote(raw)
            } else {
                raw.trim().to_string()
            });
        }
    }

    Some((key?, value?))
}

/// Strip TOML string delimiters, handling the four string flavours
fn unquote(raw: &str) -> String {
    let raw = raw.trim();

    if let Some(inner) = raw
        .strip_prefix("\"\"\"")
        .and_then(|s| s.strip_suffix("\"\"\""))
    {
        return unescape(&join_continuations(strip_leading_newline(inner)));
    }

    if let Some(inner) = raw.strip_prefix("'''").and_then(|s| s.strip_suffix("'''")) {
        return strip_leading_newline(inner).to_string();
    }

    if let Some(inner) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return unescape(inner);
    }

    if let Some(inner) = raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return inner.to_string();
    }

    raw.to_string()
}

fn strip_leading_newline(s: &str) -> &str {
    s.strip_prefix("\r\n")
        .or_else(|| s.strip_prefix('\n'))
        .unwrap_or(s)
}

/// A backslash at the end of a line joins it with the next non-blank text
fn join_continuations(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut lines = s.split('\n').peekable();
    let mut joining = false;

    while let Some(line) = lines.next() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let line = if joining { line.trim_start() } else { line };
        if line.is_empty() && joining {
            continue;
        }

        match line.strip_suffix('\\') {
            Some(head) if !head.ends_with('\\') => {
                result.push_str(head);
                joining = true;
            }
            _ => {
                result.push_str(line);
                joining = false;
                if lines.peek().is_some() {
                    result.push('\n');
                }
            }
        }
    }

    result
}

fn unescape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('"') => result.push('"'),
            Some('\\') => result.push('\\'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if let Some(decoded) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
                {
                    result.push(decoded);
                }
            }
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}
