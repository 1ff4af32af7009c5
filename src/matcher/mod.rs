//! Path pattern matching for rule dispatch
//!
//! Patterns are evaluated against the POSIX-style path of a node relative to
//! the run root. The root itself has the empty relative path.
//!
//! | Pattern        | Matches                                      |
//! |----------------|----------------------------------------------|
//! | `.`            | the run root only                            |
//! | `data/`        | directories only (trailing slash stripped)   |
//! | `readme.txt`   | files and directories with that exact path   |
//! | `*.log`        | top-level entries ending in `.log`           |
//! | `**/*.tmp`     | `.tmp` entries at any depth                  |
//! | `logs/**/`     | `logs` and every directory below it          |
//!
//! `*`, `?` and `[...]` never cross a `/`. `**` spans zero or more whole
//! path segments and must stand alone in its segment. Matching is anchored
//! and case-sensitive.

use globset::{GlobBuilder, GlobMatcher};

use crate::error::{EngineError, Result};

/// The sentinel pattern that only matches the run root
pub const ROOT_PATTERN: &str = ".";

/// A compiled rule pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    kind: PatternKind,
}

#[derive(Debug, Clone)]
enum PatternKind {
    Root,
    Glob {
        matchers: Vec<GlobMatcher>,
        dirs_only: bool,
        matches_root: bool,
    },
}

impl Pattern {
    /// Compile a pattern string.
    ///
    /// Fails for empty patterns and for anything globset rejects
    /// (unclosed character classes, `**` glued to other characters, ...).
    pub fn parse(raw: &str) -> Result<Self> {
        if raw == ROOT_PATTERN {
            return Ok(Self {
                raw: raw.to_string(),
                kind: PatternKind::Root,
            });
        }

        let dirs_only = raw.ends_with('/');
        let body = raw.trim_end_matches('/').trim_start_matches('/');
        if body.is_empty() {
            return Err(invalid(raw, "pattern is empty"));
        }

        // globset's trailing `/**` needs at least one segment; accept zero too
        let mut sources = vec![body.to_string()];
        if let Some(prefix) = body.strip_suffix("/**") {
            if !prefix.is_empty() && prefix != "**" {
                sources.push(prefix.to_string());
            }
        }

        let matchers = sources
            .iter()
            .map(|source| {
                GlobBuilder::new(source)
                    .literal_separator(true)
                    .backslash_escape(true)
                    .build()
                    .map(|glob| glob.compile_matcher())
                    .map_err(|e| invalid(raw, &e.kind().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: raw.to_string(),
            kind: PatternKind::Glob {
                matchers,
                dirs_only,
                matches_root: body.split('/').all(|segment| segment == "**"),
            },
        })
    }

    /// The pattern as written in the rule table
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True for the root-only `.` sentinel
    pub fn is_root(&self) -> bool {
        matches!(self.kind, PatternKind::Root)
    }

    /// True for patterns with a trailing `/`
    pub fn is_directory_only(&self) -> bool {
        matches!(self.kind, PatternKind::Glob { dirs_only: true, .. })
    }

    /// Test a relative POSIX path. The empty path denotes the run root.
    pub fn matches(&self, rel_path: &str, is_dir: bool) -> bool {
        match &self.kind {
            PatternKind::Root => rel_path.is_empty(),
            PatternKind::Glob {
                matchers,
                dirs_only,
                matches_root,
            } => {
                if *dirs_only && !is_dir {
                    return false;
                }
                if rel_path.is_empty() {
                    return *matches_root;
                }
                matchers.iter().any(|m| m.is_match(rel_path))
            }
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One-shot helper: compile `pattern` and test it against `rel_path`
pub fn matches(pattern: &str, rel_path: &str, is_dir: bool) -> Result<bool> {
    Ok(Pattern::parse(pattern)?.matches(rel_path, is_dir))
}

fn invalid(pattern: &str, reason: &str) -> EngineError {
    EngineError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(pattern: &str, path: &str, is_dir: bool) -> bool {
        matches(pattern, path, is_dir).unwrap()
    }

    #[test]
    fn test_root_sentinel() {
        assert!(m(".", "", true));
        assert!(!m(".", "data", true));
        assert!(!m(".", "a.txt", false));
    }

    #[test]
    fn test_directory_patterns_skip_files() {
        assert!(m("data/", "data", true));
        assert!(!m("data/", "data", false));
        assert!(m("data", "data", false));
        assert!(m("data", "data", true));
    }

    #[test]
    fn test_any_directory_pattern() {
        assert!(m("**/", "", true));
        assert!(m("**/", "data", true));
        assert!(m("**/", "data/group1", true));
        assert!(m("**/", "a/b/c/d", true));
        assert!(!m("**/", "data/file.txt", false));
    }

    #[test]
    fn test_recursive_extension_pattern() {
        assert!(m("**/*.txt", "a/b/c.txt", false));
        assert!(m("**/*.txt", "c.txt", false));
        assert!(!m("**/*.txt", "a/b/c.csv", false));
        assert!(!m("**/*.txt/", "a/b/c.txt", false));
        assert!(!m("**/*.txt", "", true));
    }

    #[test]
    fn test_directory_spelled_path_is_not_a_file_match() {
        assert!(!m("**/*.txt", "a/b/c.txt/", true));
        // general patterns still apply to a directory entry named like a file
        assert!(m("**/*.txt", "a/b/c.txt", true));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        assert!(m("*.log", "app.log", false));
        assert!(!m("*.log", "logs/app.log", false));
        assert!(m("logs/*.log", "logs/app.log", false));
        assert!(!m("logs/*.log", "logs/old/app.log", false));
    }

    #[test]
    fn test_question_mark_and_classes() {
        assert!(m("file?.txt", "file1.txt", false));
        assert!(!m("file?.txt", "file10.txt", false));
        assert!(!m("file?.txt", "file/.txt", false));
        assert!(m("file[12].txt", "file2.txt", false));
        assert!(!m("file[12].txt", "file3.txt", false));
        assert!(m("file[!12].txt", "file3.txt", false));
    }

    #[test]
    fn test_double_star_zero_segments() {
        assert!(m("data/**/", "data", true));
        assert!(m("data/**/", "data/group1", true));
        assert!(m("data/**/", "data/group1/deep", true));
        assert!(!m("data/**/", "database", true));
        assert!(m("a/**/b.txt", "a/b.txt", false));
        assert!(m("a/**/b.txt", "a/x/y/b.txt", false));
    }

    #[test]
    fn test_anchored_and_case_sensitive() {
        assert!(!m("data", "old/data", true));
        assert!(!m("Data/", "data", true));
        assert!(!m("*.TXT", "a.txt", false));
    }

    #[test]
    fn test_invalid_patterns_fail_at_parse() {
        assert!(Pattern::parse("").is_err());
        assert!(Pattern::parse("/").is_err());
        assert!(Pattern::parse("file[12.txt").is_err());
        assert!(Pattern::parse("a**/b").is_err());

        let err = Pattern::parse("[oops").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("[oops"));
    }

    #[test]
    fn test_pattern_accessors() {
        let pattern = Pattern::parse("logs/").unwrap();
        assert!(pattern.is_directory_only());
        assert!(!pattern.is_root());
        assert_eq!(pattern.to_string(), "logs/");
        assert!(Pattern::parse(".").unwrap().is_root());
    }
}
