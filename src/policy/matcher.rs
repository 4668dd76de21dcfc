//! Path glob matching.
//!
//! # Design Decisions
//! - Patterns compiled once at startup into a single `GlobSet` per method
//! - `*` and `?` never cross a `/`; `**` spans segments
//! - Character classes and `{a,b}` alternation follow shell-glob rules
//! - A path is matched when ANY pattern matches (no precedence)
//! - Segments starting with `.` are hidden: only a pattern segment that
//!   itself starts with a literal `.` matches them, never a wildcard

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

/// Compile a single path pattern with path-aware separator semantics.
pub fn compile_pattern(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

/// Compiled set of path patterns configured for one HTTP method.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    patterns: Vec<String>,
    set: GlobSet,
    rules: Vec<HiddenRule>,
}

impl PathMatcher {
    /// Compile an ordered list of glob patterns.
    pub fn new(patterns: &[String]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(compile_pattern(pattern)?);
        }
        Ok(Self {
            patterns: patterns.to_vec(),
            set: builder.build()?,
            rules: patterns.iter().map(|p| HiddenRule::new(p)).collect(),
        })
    }

    /// Returns true if any pattern matches `path`.
    pub fn is_match(&self, path: &str) -> bool {
        if !path.split('/').any(is_hidden) {
            return self.set.is_match(path);
        }
        self.set
            .matches(path)
            .into_iter()
            .any(|index| self.rules[index].admits(path))
    }

    /// The patterns in configuration order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn is_hidden(segment: &str) -> bool {
    segment.starts_with('.')
}

/// One pattern split into per-segment matchers, consulted only for paths
/// that contain hidden segments.
#[derive(Debug, Clone)]
struct HiddenRule {
    /// `None` when the pattern cannot be split on `/` (alternation spanning
    /// segments); such a pattern never matches hidden segments.
    segments: Option<Vec<Segment>>,
}

#[derive(Debug, Clone)]
enum Segment {
    Globstar,
    Literal(String),
    Wild { matcher: GlobMatcher, dot: bool },
}

impl HiddenRule {
    fn new(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .map(Segment::new)
            .collect::<Option<Vec<_>>>();
        Self { segments }
    }

    fn admits(&self, path: &str) -> bool {
        let Some(segments) = &self.segments else {
            return false;
        };
        let path: Vec<&str> = path.split('/').collect();
        match_segments(segments, &path)
    }
}

impl Segment {
    fn new(segment: &str) -> Option<Self> {
        if segment == "**" {
            return Some(Segment::Globstar);
        }
        if !segment.contains(['*', '?', '[', '{', '\\']) {
            return Some(Segment::Literal(segment.to_string()));
        }
        let matcher = compile_pattern(segment).ok()?.compile_matcher();
        Some(Segment::Wild {
            matcher,
            dot: segment.starts_with('.'),
        })
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Globstar => !is_hidden(segment),
            Segment::Literal(literal) => literal == segment,
            Segment::Wild { matcher, dot } => {
                (*dot || !is_hidden(segment)) && matcher.is_match(segment)
            }
        }
    }
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::Globstar, rest)) => {
            for skip in 0..=path.len() {
                if match_segments(rest, &path[skip..]) {
                    return true;
                }
                if skip < path.len() && !Segment::Globstar.matches(path[skip]) {
                    return false;
                }
            }
            false
        }
        Some((segment, rest)) => match path.split_first() {
            Some((first, tail)) => segment.matches(first) && match_segments(rest, tail),
            None => false,
        },
    }
}
