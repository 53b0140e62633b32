//! core::ops::pattern
//!
//! File patterns used by rewrite operations.
//!
//! A pattern is anchored at both ends. `.` is literal, `*` matches any run
//! of characters including `/`, and parentheses form numbered capture
//! groups that a destination template can refer to as `$1`..`$9`.

use regex::{Captures, Regex};

use crate::core::errors::{RepoError, Result};

/// A compiled file pattern.
#[derive(Debug, Clone)]
pub struct FilePattern {
    source: String,
    regex: Regex,
}

impl FilePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut re = String::with_capacity(pattern.len() + 8);
        re.push('^');
        for c in pattern.chars() {
            match c {
                '.' => re.push_str(r"\."),
                '*' => re.push_str(".*"),
                c => re.push(c),
            }
        }
        re.push('$');
        let regex = Regex::new(&re).map_err(|e| {
            RepoError::Configuration(format!("invalid file pattern '{pattern}': {e}"))
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn captures<'p>(&self, path: &'p str) -> Option<Captures<'p>> {
        self.regex.captures(path)
    }
}

/// Compile a list of patterns.
pub fn compile_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<FilePattern>> {
    patterns.iter().map(|p| FilePattern::new(p.as_ref())).collect()
}

/// The first pattern matching `path`, if any.
pub fn first_match<'a>(patterns: &'a [FilePattern], path: &str) -> Option<&'a FilePattern> {
    patterns.iter().find(|p| p.is_match(path))
}

/// Compute the destination of `path` for a `cp`/`mv` template.
///
/// `$N` is replaced with capture group N of `pattern` (empty if the group
/// did not participate). A trailing `/` appends the source basename, and a
/// leading `/` is dropped.
pub fn resolve_destination(path: &str, template: &str, pattern: &FilePattern) -> String {
    let captures = pattern.captures(path);
    let mut dest = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' {
            if let Some(n) = chars.peek().and_then(|d| d.to_digit(10)) {
                chars.next();
                if let Some(m) = captures.as_ref().and_then(|caps| caps.get(n as usize)) {
                    dest.push_str(m.as_str());
                }
                continue;
            }
        }
        dest.push(c);
    }

    if dest.ends_with('/') {
        let basename = path.rsplit('/').next().unwrap_or(path);
        dest.push_str(basename);
    }
    match dest.strip_prefix('/') {
        Some(stripped) => stripped.to_string(),
        None => dest,
    }
}
