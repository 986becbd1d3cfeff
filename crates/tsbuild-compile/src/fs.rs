//! File-system capabilities used by the build.
//!
//! The build never touches the file system directly: source lookup goes
//! through a [`SourceFs`] and every output file through a [`Destination`].

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use glob::MatchOptions;
use tracing::debug;
use tsbuild_core::SourceError;

/// Finds and reads source files.
#[async_trait]
pub trait SourceFs: Send + Sync {
    /// Resolve match patterns to the source files they select, in pattern order.
    ///
    /// Patterns starting with `!` remove matches instead of adding them.
    async fn resolve(&self, patterns: &[String]) -> Result<Vec<PathBuf>, SourceError>;

    /// Directory that output paths are made relative to.
    fn base_dir(&self, patterns: &[String]) -> PathBuf;

    /// Read a source file as text.
    async fn read_to_string(&self, path: &Path) -> Result<String, SourceError>;
}

/// Writes output files.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Write `contents` to `relative` below `dir`, returning the full path.
    async fn write(&self, dir: &Path, relative: &Path, contents: &[u8])
        -> Result<PathBuf, SourceError>;
}

/// `*` and `?` stop at path separators; only `**` crosses directories.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Sources on the local disk, with patterns relative to `root`.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn anchored(&self, pattern: &str) -> String {
        if Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            self.root.join(pattern).to_string_lossy().into_owned()
        }
    }

    fn resolve_blocking(&self, patterns: &[String]) -> Result<Vec<PathBuf>, SourceError> {
        let invalid = |pattern: &str, e: glob::PatternError| {
            SourceError::other(format!("Invalid pattern '{}': {}", pattern, e.msg))
        };

        let mut excludes = Vec::new();
        for pattern in patterns {
            if let Some(negated) = pattern.strip_prefix('!') {
                for expanded in expand_braces(negated) {
                    let anchored = self.anchored(&expanded);
                    let compiled = glob::Pattern::new(&anchored)
                        .map_err(|e| invalid(pattern.as_str(), e))?;
                    excludes.push(compiled);
                }
            }
        }

        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for pattern in patterns.iter().filter(|p| !p.starts_with('!')) {
            for expanded in expand_braces(pattern) {
                let anchored = self.anchored(&expanded);
                let entries = glob::glob_with(&anchored, MATCH_OPTIONS)
                    .map_err(|e| invalid(pattern.as_str(), e))?;

                for entry in entries {
                    let path = entry.map_err(|e| {
                        let path = e.path().to_path_buf();
                        SourceError::io(path, std::io::Error::from(e))
                    })?;
                    let excluded = excludes
                        .iter()
                        .any(|x| x.matches_path_with(&path, MATCH_OPTIONS));
                    if !path.is_file() || excluded {
                        continue;
                    }
                    if seen.insert(path.clone()) {
                        files.push(path);
                    }
                }
            }
        }

        debug!(patterns = ?patterns, matched = files.len(), "Resolved source patterns");
        Ok(files)
    }
}

impl Default for LocalFs {
    fn default() -> Self {
        Self::new(".")
    }
}

#[async_trait]
impl SourceFs for LocalFs {
    async fn resolve(&self, patterns: &[String]) -> Result<Vec<PathBuf>, SourceError> {
        let fs = self.clone();
        let patterns = patterns.to_vec();
        tokio::task::spawn_blocking(move || fs.resolve_blocking(&patterns))
            .await
            .map_err(|e| SourceError::other(format!("Pattern resolution panicked: {}", e)))?
    }

    fn base_dir(&self, patterns: &[String]) -> PathBuf {
        let bases: Vec<PathBuf> = patterns
            .iter()
            .filter(|p| !p.starts_with('!'))
            .map(|p| PathBuf::from(self.anchored(&glob_base(p).to_string_lossy())))
            .collect();
        common_ancestor(&bases).unwrap_or_else(|| self.root.clone())
    }

    async fn read_to_string(&self, path: &Path) -> Result<String, SourceError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SourceError::io(path, e))
    }
}

/// Writes files below their output directory on the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalDestination;

#[async_trait]
impl Destination for LocalDestination {
    async fn write(
        &self,
        dir: &Path,
        relative: &Path,
        contents: &[u8],
    ) -> Result<PathBuf, SourceError> {
        let target = dir.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SourceError::io(parent, e))?;
        }
        tokio::fs::write(&target, contents)
            .await
            .map_err(|e| SourceError::io(&target, e))?;
        Ok(target)
    }
}

/// Expand `{a,b}` alternatives into one pattern per alternative.
///
/// Groups may nest. A group without a top-level comma, like `{a}`, is kept
/// as literal text.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let mut depth = 0usize;
    let mut open = 0usize;
    let mut commas = Vec::new();

    for (i, c) in pattern.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    open = i;
                    commas.clear();
                }
                depth += 1;
            }
            ',' if depth == 1 => commas.push(i),
            '}' if depth > 0 => {
                depth -= 1;
                if depth > 0 || commas.is_empty() {
                    continue;
                }

                let prefix = &pattern[..open];
                let suffix = &pattern[i + 1..];
                let mut bounds = vec![open];
                bounds.extend(&commas);
                bounds.push(i);

                return bounds
                    .windows(2)
                    .flat_map(|w| {
                        let alternative = &pattern[w[0] + 1..w[1]];
                        expand_braces(&format!("{}{}{}", prefix, alternative, suffix))
                    })
                    .collect();
            }
            _ => {}
        }
    }

    vec![pattern.to_string()]
}

/// Leading part of a pattern that contains no glob syntax.
///
/// `src/**/*.ts` has base `src`; a plain file path has its parent directory
/// as base.
pub fn glob_base(pattern: &str) -> PathBuf {
    let is_magic = |s: &&str| s.contains(|c: char| matches!(c, '*' | '?' | '[' | '{'));
    let segments: Vec<&str> = pattern.split('/').collect();

    let end = segments
        .iter()
        .position(|s| is_magic(s))
        .unwrap_or(segments.len().saturating_sub(1));
    let base = segments[..end].join("/");

    if !base.is_empty() {
        PathBuf::from(base)
    } else if pattern.starts_with('/') {
        PathBuf::from("/")
    } else {
        PathBuf::from(".")
    }
}

/// Deepest directory containing every path in `paths`.
pub fn common_ancestor(paths: &[PathBuf]) -> Option<PathBuf> {
    let (first, rest) = paths.split_first()?;
    let mut common: Vec<Component> = first.components().collect();

    for path in rest {
        let shared = common
            .iter()
            .zip(path.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(shared);
    }

    if common.is_empty() {
        return None;
    }
    Some(common.iter().collect())
}
