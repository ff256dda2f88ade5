//! Patch loading: extracting a well-formed JSON object from generator output
//!
//! The generator is unreliable text: its output may wrap the JSON object in
//! markdown code fences, lead with explanatory prose, or trail with chatter.
//! The loader treats that text as untrusted input and recovers the first
//! balanced `{...}` block with an explicit depth-counting scan.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while turning generator output into a patch object.
///
/// Any of these means the whole patch is malformed. The caller must be
/// told: a silently dropped patch silently loses facts.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("no opening '{{' found in patch text")]
    NoJsonObject,

    #[error("unbalanced braces in patch text")]
    UnbalancedBraces,

    #[error("patch is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read patch file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("patch is not a JSON object")]
    NotAnObject,
}

/// Where a patch comes from.
///
/// The generator hands patches around as in-memory objects, file paths,
/// or free-form strings; one explicit variant per case instead of
/// sniffing at every call site.
#[derive(Debug, Clone)]
pub enum PatchSource {
    /// An already-parsed JSON object
    Inline(Value),
    /// Raw generator text, possibly fenced or surrounded by prose
    Raw(String),
    /// A file containing generator text
    Path(PathBuf),
}

impl PatchSource {
    /// Classify a string the way the generator pipeline does: a path to an
    /// existing file is read as a file, anything else is raw text.
    pub fn detect(input: &str) -> Self {
        let path = Path::new(input);
        if path.exists() {
            Self::Path(path.to_path_buf())
        } else {
            Self::Raw(input.to_string())
        }
    }

    /// Resolve this source to a parsed JSON object.
    pub fn resolve(&self) -> Result<Value, PatchError> {
        let value = match self {
            Self::Inline(value) => value.clone(),
            Self::Raw(text) => parse_noisy(text)?,
            Self::Path(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| PatchError::Io {
                    path: path.clone(),
                    source,
                })?;
                parse_noisy(&text)?
            }
        };
        if !value.is_object() {
            return Err(PatchError::NotAnObject);
        }
        Ok(value)
    }
}

/// Pull the list stored under `key` out of a patch.
///
/// A missing key is an empty list, not an error; a nodes-only patch has
/// no `edges` and vice versa. A present key whose entries do not parse
/// (an edge without `source`/`target`/`relation`, say) fails the whole
/// patch; partial application is never allowed.
pub fn load_list<T: DeserializeOwned>(source: &PatchSource, key: &str) -> Result<Vec<T>, PatchError> {
    let object = source.resolve()?;
    match object.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => Ok(serde_json::from_value(value.clone())?),
    }
}

/// Parse generator text: strip fences, try a direct parse, fall back to
/// extracting the first balanced `{...}` block.
fn parse_noisy(text: &str) -> Result<Value, PatchError> {
    let stripped = strip_fences(text);
    match serde_json::from_str(stripped) {
        Ok(value) => Ok(value),
        Err(_) => {
            let block = extract_json_block(stripped)?;
            Ok(serde_json::from_str(block)?)
        }
    }
}

/// Remove leading/trailing markdown code-fence markers and surrounding
/// whitespace.
pub fn strip_fences(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Opening fence may carry a language tag ("```json")
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        s = rest.trim_start();
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest.trim_end();
    }
    s
}

/// Return the first well-balanced `{...}` block in `text`.
///
/// Scans character by character from the first `{`, tracking brace depth.
/// Braces inside JSON string literals are skipped so that a label like
/// `"{deductible}"` cannot throw the count off.
pub fn extract_json_block(text: &str) -> Result<&str, PatchError> {
    let start = text.find('{').ok_or(PatchError::NoJsonObject)?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..start + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    Err(PatchError::UnbalancedBraces)
}
