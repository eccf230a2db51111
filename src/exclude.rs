//! Path exclusion patterns for filesystem scanning.
//!
//! Patterns are regular expressions matched against a backup-source-relative
//! path rendered in POSIX form: a leading `/`, components joined by `/`, and
//! a trailing `/` for directories. The trailing slash lets a pattern such as
//! `/temp/` exclude an entire directory without also matching a file that
//! happens to be named `temp`.

use regex::Regex;

/// A compiled path exclusion pattern.
///
/// The inner regex is matched against the whole rendered path, so patterns
/// behave like anchored full matches rather than substring searches.
#[derive(Debug, Clone)]
pub struct ExcludePattern {
    regex: Regex,
    pattern: String,
}

impl ExcludePattern {
    /// Compile an exclusion pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid regular expression.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!(r"\A(?:{pattern})\z"))?;
        Ok(Self {
            regex,
            pattern: pattern.to_string(),
        })
    }

    /// Check whether a rendered path matches this pattern.
    #[must_use]
    pub fn matches(&self, rendered_path: &str) -> bool {
        self.regex.is_match(rendered_path)
    }

    /// The original pattern string, as supplied by the user.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

/// Compile a list of exclusion patterns, failing on the first invalid one.
///
/// # Errors
///
/// Returns the offending pattern together with the regex error.
pub fn compile_exclude_patterns(
    patterns: &[String],
) -> Result<Vec<ExcludePattern>, (String, regex::Error)> {
    patterns
        .iter()
        .map(|p| ExcludePattern::new(p).map_err(|e| (p.clone(), e)))
        .collect()
}

/// Render a source-relative path for pattern matching.
///
/// `components` are the path components below the scan root, in order.
/// Directories are rendered with a trailing `/`.
#[must_use]
pub fn render_relative_path(components: &[String], is_directory: bool) -> String {
    let mut rendered = String::from("/");
    rendered.push_str(&components.join("/"));
    if is_directory && !components.is_empty() {
        rendered.push('/');
    }
    rendered
}

/// Check whether a rendered path matches any of the given patterns.
#[must_use]
pub fn is_path_excluded(rendered_path: &str, patterns: &[ExcludePattern]) -> bool {
    patterns.iter().any(|p| p.matches(rendered_path))
}
