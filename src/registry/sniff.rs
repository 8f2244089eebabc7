//! Artifact content sniffing
//!
//! Builds the [`ArtifactProbe`] handed to every importer's applicability
//! check: the artifact path, its extension, a MIME type guessed from the
//! extension or the leading content, and the leading text itself.

use once_cell::sync::Lazy;
use regex::Regex;

/// Number of leading bytes inspected when sniffing content
const SNIFF_LENGTH: usize = 1024;

static XML_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(<\?xml[\s?]|<!--|<!DOCTYPE|<[A-Za-z_][\w.:-]*[\s/>])")
        .expect("valid XML sniffing pattern")
});

static SQL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*((--[^\n]*\n|/\*.*?\*/)\s*)*(create|alter|drop|insert|comment)\s")
        .expect("valid SQL sniffing pattern")
});

static JSON_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[\{\[]").expect("valid JSON sniffing pattern"));

/// What an importer gets to see when deciding whether it applies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactProbe {
    pub path: String,
    /// Lowercase extension without the dot
    pub extension: Option<String>,
    pub mime_type: Option<String>,
    /// Leading content, lossily decoded
    pub head: String,
}

impl ArtifactProbe {
    pub fn new(path: &str, content: &[u8]) -> Self {
        let head_len = content.len().min(SNIFF_LENGTH);
        let head = String::from_utf8_lossy(&content[..head_len])
            .trim_start_matches('\u{feff}')
            .to_string();
        let extension = extension_of(path);
        let mime_type = extension
            .as_deref()
            .and_then(mime_for_extension)
            .or_else(|| sniff_content(&head))
            .map(str::to_string);

        Self {
            path: path.to_string(),
            extension,
            mime_type,
            head,
        }
    }

    pub fn has_extension(&self, extension: &str) -> bool {
        self.extension
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case(extension.trim_start_matches('.')))
    }

    pub fn looks_like_xml(&self) -> bool {
        XML_PATTERN.is_match(&self.head)
    }

    pub fn looks_like_sql(&self) -> bool {
        SQL_PATTERN.is_match(&self.head)
    }
}

fn extension_of(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// MIME type registered for a file extension
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    let mime = match extension.to_ascii_lowercase().as_str() {
        "xml" | "xsd" | "wsdl" | "xsl" | "xslt" | "xmi" => "application/xml",
        "sql" | "ddl" => "application/sql",
        "json" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime)
}

/// MIME type guessed from leading content
pub fn sniff_content(head: &str) -> Option<&'static str> {
    if XML_PATTERN.is_match(head) {
        Some("application/xml")
    } else if SQL_PATTERN.is_match(head) {
        Some("application/sql")
    } else if JSON_PATTERN.is_match(head) {
        Some("application/json")
    } else {
        None
    }
}
