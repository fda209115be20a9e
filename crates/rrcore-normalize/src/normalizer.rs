use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use rrcore_types::{CoreError, ErrorCode, LedgerConfig, Result};
use serde_json::Value;

use crate::canonical::canonical_bytes;

const SENTINEL_PREFIX: &str = "<redacted:";

/// Matches a canonical UUID's textual shape, used to gate `id`/`uuid`/`*_id`
/// volatile-field patterns on value shape rather than key name alone
/// (SPEC_FULL.md §4.1).
static UUID_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

/// Field-name fragments that mark a string value as a filesystem path
/// subject to project-root rewriting rather than blanket redaction
/// (SPEC_FULL.md §4.1 supplement, Open Question #2 resolution: conservative
/// value-shape gating rather than a user-maintained path allowlist).
const PATH_FIELD_HINTS: &[&str] = &["path", "dir", "cwd", "file", "workdir"];

/// An adapter-supplied pure function that runs before volatile-field
/// scrubbing and may extend the volatile field list (spec.md §4.1 rule 5).
pub trait Sanitizer: Send + Sync {
    fn name(&self) -> &str;

    /// Mutate `value` in place and optionally push additional field names
    /// onto `volatile_field_paths`. Must not perform I/O or panic; any
    /// error here is surfaced as a `NormalizationError`.
    fn sanitize(&self, value: &mut Value, volatile_field_paths: &mut Vec<String>) -> Result<()>;
}

/// Output of a normalization pass: canonical bytes for fingerprinting, plus
/// a redaction-unaware truncated preview for `inputs_preview` (spec.md §4.1).
#[derive(Debug, Clone)]
pub struct NormalizedInput {
    pub bytes: Vec<u8>,
    pub preview: String,
}

pub struct Normalizer {
    volatile_field_paths: Vec<String>,
    project_root: Option<PathBuf>,
    max_preview_bytes: usize,
    sanitizers: Vec<Box<dyn Sanitizer>>,
}

impl Normalizer {
    pub fn new(config: &LedgerConfig, project_root: Option<PathBuf>) -> Self {
        Self {
            volatile_field_paths: config.volatile_field_paths.clone(),
            project_root,
            max_preview_bytes: config.max_preview_bytes,
            sanitizers: Vec::new(),
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: Box<dyn Sanitizer>) -> Self {
        self.sanitizers.push(sanitizer);
        self
    }

    /// Run the full rule sequence from spec.md §4.1 over `input` and return
    /// the canonical bytes and a preview.
    pub fn normalize(&self, input: &Value) -> Result<NormalizedInput> {
        let mut value = input.clone();
        let mut volatile = self.volatile_field_paths.clone();

        for sanitizer in &self.sanitizers {
            sanitizer.sanitize(&mut value, &mut volatile).map_err(|e| {
                CoreError::new(
                    ErrorCode::NormalizationError,
                    format!("sanitizer '{}' failed: {}", sanitizer.name(), e),
                )
            })?;
        }

        scrub_volatile(&mut value, &volatile);
        if let Some(root) = &self.project_root {
            rewrite_paths(&mut value, root, false);
        }
        validate_utf8(&value)?;

        let bytes = canonical_bytes(&value);
        let preview = truncate_preview(&bytes, self.max_preview_bytes);

        Ok(NormalizedInput { bytes, preview })
    }

    /// Entry point for adapters that hand over raw bytes rather than an
    /// already-parsed `Value` (spec.md §4.1 rule 4: invalid UTF-8 is fatal
    /// at record time).
    pub fn normalize_raw(&self, bytes: &[u8]) -> Result<NormalizedInput> {
        let text = std::str::from_utf8(bytes).map_err(|_| {
            CoreError::new(
                ErrorCode::NormalizationError,
                "input payload is not valid UTF-8",
            )
        })?;
        let value: Value = serde_json::from_str(text).map_err(|e| {
            CoreError::new(
                ErrorCode::NormalizationError,
                format!("input payload is not valid JSON: {e}"),
            )
        })?;
        self.normalize(&value)
    }
}

fn is_path_like_field(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    PATH_FIELD_HINTS.iter().any(|hint| lower.contains(hint))
}

/// Does `key` match a configured volatile-field pattern? A leading `*` is a
/// suffix wildcard (`*_at` matches `created_at`, `retried_at`, ...); anything
/// else is an exact key match.
fn matches_pattern(key: &str, pattern: &str) -> bool {
    match pattern.strip_prefix('*') {
        Some(suffix) => key.ends_with(suffix),
        None => key == pattern,
    }
}

fn matching_pattern<'a>(key: &str, patterns: &'a [String]) -> Option<&'a str> {
    patterns
        .iter()
        .map(String::as_str)
        .find(|pattern| matches_pattern(key, pattern))
}

/// `id`/`uuid`/`*_id` patterns only scrub when the value is shaped like a
/// UUID, so a business-meaningful field merely named `id` is not blindly
/// redacted (SPEC_FULL.md §4.1).
fn requires_uuid_shape(pattern: &str) -> bool {
    matches!(pattern, "id" | "uuid" | "*_id")
}

fn scrub_volatile(value: &mut Value, volatile_field_paths: &[String]) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if let Some(pattern) = matching_pattern(key, volatile_field_paths) {
                    let shape_ok = !requires_uuid_shape(pattern)
                        || matches!(child, Value::String(s) if UUID_SHAPE.is_match(s));
                    if shape_ok {
                        *child = Value::String(format!("{SENTINEL_PREFIX}{key}>"));
                        continue;
                    }
                }
                scrub_volatile(child, volatile_field_paths);
            }
        }
        Value::Array(items) => {
            for item in items {
                scrub_volatile(item, volatile_field_paths);
            }
        }
        _ => {}
    }
}

/// `C:\...` / `C:/...` — recognized independently of `Path::is_absolute`,
/// which is platform-gated and never true for drive-letter paths on a
/// non-Windows build host (SPEC_FULL.md §4.1).
fn is_windows_drive_absolute(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

fn is_absolute_path_str(s: &str) -> bool {
    s.starts_with('/') || is_windows_drive_absolute(s) || Path::new(s).is_absolute()
}

fn rewrite_paths(value: &mut Value, project_root: &Path, parent_is_path_field: bool) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                rewrite_paths(child, project_root, is_path_like_field(key));
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_paths(item, project_root, parent_is_path_field);
            }
        }
        Value::String(s) => {
            if parent_is_path_field && is_absolute_path_str(s) {
                *s = rewrite_relative_to_root(s, project_root);
            }
        }
        _ => {}
    }
}

/// Rewrite `s` relative to `project_root`, normalizing `\`-separated
/// components first so Windows-style absolute paths strip correctly even
/// when built on a host whose native path grammar is POSIX.
fn rewrite_relative_to_root(s: &str, project_root: &Path) -> String {
    let normalized_root = project_root.to_string_lossy().replace('\\', "/");
    let normalized_path = s.replace('\\', "/");
    match normalized_path.strip_prefix(normalized_root.as_str()) {
        Some(rel) => rel.trim_start_matches('/').to_string(),
        None => rrcore_core::project_relative(Path::new(s), project_root)
            .to_string_lossy()
            .into_owned(),
    }
}

fn validate_utf8(value: &Value) -> Result<()> {
    // serde_json::Value strings are Rust `String`s and are therefore
    // already guaranteed valid UTF-8; this walk exists so malformed
    // replacement-character runs introduced upstream (lossy byte-to-string
    // conversions done by an adapter before handing us a `Value`) are still
    // caught rather than silently hashed.
    match value {
        Value::String(s) if s.contains('\u{FFFD}') => Err(CoreError::new(
            ErrorCode::NormalizationError,
            "input contains a UTF-8 replacement character, indicating lossy decoding upstream",
        )),
        Value::Object(map) => {
            for child in map.values() {
                validate_utf8(child)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                validate_utf8(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn truncate_preview(bytes: &[u8], max_bytes: usize) -> String {
    if bytes.len() <= max_bytes {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    let mut cut = max_bytes;
    while cut > 0 && !bytes.is_char_boundary(cut) {
        cut -= 1;
    }
    String::from_utf8_lossy(&bytes[..cut]).into_owned()
}
