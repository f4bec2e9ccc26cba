// logtail - core/pattern.rs
//
// Glob pattern compilation for file groups.
//
// A pattern is matched against absolute paths and decomposed into a fixed
// literal directory prefix plus a sequence of per-segment matchers:
//   - `?`        one character within a segment
//   - `*`        zero or more characters within a segment
//   - `**`       zero or more whole path segments
//   - `[abc]`    character class within a segment
//   - `{a,b}`    alternation within a segment (expanded before compilation)
//
// Per-segment wildcards compile to `glob::Pattern`; alternation is expanded
// here because the glob crate does not support braces. A malformed pattern
// is a fatal configuration error surfaced at construction.

use crate::util::error::ConfigError;
use std::path::{Component, Path, PathBuf};

/// One path segment of a compiled pattern.
#[derive(Debug, Clone)]
pub enum Segment {
    /// Exact segment name, no wildcards.
    Literal(String),
    /// Wildcard segment; alternation expanded into one pattern per branch.
    Wildcard(Vec<glob::Pattern>),
    /// The `**` segment: zero or more whole path segments.
    Recursive,
}

impl Segment {
    /// Whether `name` (a single path component) matches this segment.
    /// `Recursive` matches any component; the scanner handles its expansion.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Literal(lit) => lit == name,
            Self::Wildcard(pats) => pats.iter().any(|p| p.matches(name)),
            Self::Recursive => true,
        }
    }
}

/// A compiled file-group glob: a fixed literal directory prefix and the
/// remaining segments, of which the last matches file names.
#[derive(Debug, Clone)]
pub struct TailPattern {
    raw: String,
    base: PathBuf,
    segments: Vec<Segment>,
}

impl TailPattern {
    /// Compile `raw` into a pattern. Fails on relative paths, unclosed
    /// braces, and invalid character classes.
    pub fn compile(raw: &str) -> Result<Self, ConfigError> {
        let path = Path::new(raw);
        if !path.is_absolute() {
            return Err(ConfigError::InvalidPattern {
                pattern: raw.to_string(),
                reason: "pattern must be an absolute path".to_string(),
            });
        }

        let mut base = PathBuf::new();
        let mut segments: Vec<Segment> = Vec::new();

        for component in path.components() {
            let name = match component {
                Component::RootDir | Component::Prefix(_) => {
                    base.push(component.as_os_str());
                    continue;
                }
                Component::Normal(os) => {
                    os.to_str().ok_or_else(|| ConfigError::InvalidPattern {
                        pattern: raw.to_string(),
                        reason: "pattern is not valid UTF-8".to_string(),
                    })?
                }
                Component::CurDir | Component::ParentDir => {
                    return Err(ConfigError::InvalidPattern {
                        pattern: raw.to_string(),
                        reason: "'.' and '..' segments are not supported".to_string(),
                    })
                }
            };

            if segments.is_empty() && !is_wildcard(name) {
                base.push(name);
            } else {
                segments.push(compile_segment(raw, name)?);
            }
        }

        // A fully literal pattern names a single file: its final component
        // becomes the sole (literal) segment so the scanner has a leaf level.
        if segments.is_empty() {
            let leaf = match base.file_name().and_then(|n| n.to_str()) {
                Some(n) => n.to_string(),
                None => {
                    return Err(ConfigError::InvalidPattern {
                        pattern: raw.to_string(),
                        reason: "pattern names no file".to_string(),
                    })
                }
            };
            base.pop();
            segments.push(Segment::Literal(leaf));
        }

        Ok(Self {
            raw: raw.to_string(),
            base,
            segments,
        })
    }

    /// The original pattern string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The fixed literal directory prefix.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The segments following the base; the last one matches file names.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

fn is_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{'])
}

fn compile_segment(raw: &str, segment: &str) -> Result<Segment, ConfigError> {
    if segment == "**" {
        return Ok(Segment::Recursive);
    }
    if !is_wildcard(segment) {
        return Ok(Segment::Literal(segment.to_string()));
    }
    let branches = expand_braces(segment).map_err(|reason| ConfigError::InvalidPattern {
        pattern: raw.to_string(),
        reason,
    })?;
    let mut pats = Vec::with_capacity(branches.len());
    for branch in branches {
        let pat = glob::Pattern::new(&branch).map_err(|e| ConfigError::InvalidPattern {
            pattern: raw.to_string(),
            reason: format!("segment '{segment}': {e}"),
        })?;
        pats.push(pat);
    }
    Ok(Segment::Wildcard(pats))
}

/// Expand `{a,b}` alternation into one string per branch. Nested braces are
/// supported; commas inside nested braces do not split the outer level.
fn expand_braces(segment: &str) -> Result<Vec<String>, String> {
    let Some(open) = segment.find('{') else {
        return Ok(vec![segment.to_string()]);
    };

    let bytes = segment.as_bytes();
    let mut depth = 0usize;
    let mut close = None;
    let mut splits = Vec::new();
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            b',' if depth == 1 => splits.push(i),
            _ => {}
        }
    }
    let close = close.ok_or_else(|| format!("unclosed '{{' in segment '{segment}'"))?;

    let prefix = &segment[..open];
    let suffix = &segment[close + 1..];
    let mut branches = Vec::new();
    let mut start = open + 1;
    for &comma in splits.iter().chain(std::iter::once(&close)) {
        branches.push(&segment[start..comma]);
        start = comma + 1;
    }

    let mut out = Vec::new();
    for branch in branches {
        // Recurse to expand nested braces in the branch and any further
        // brace group in the suffix.
        for expanded in expand_braces(&format!("{prefix}{branch}{suffix}"))? {
            out.push(expanded);
        }
    }
    Ok(out)
}
