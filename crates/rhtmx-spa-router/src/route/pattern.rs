//! Route pattern parsing and path matching
//!
//! Patterns are written in URL form: `/users/:id`, `/blog/*`.
//! Parsing validates segment rules once at route-table build time; matching
//! is a pure walk over pattern and path segments.

use std::collections::HashMap;

use crate::path::split_segments;
use crate::RouterError;

/// Parameter name bound by a catch-all segment
pub const CATCH_ALL_PARAM: &str = "slug";

/// Extracted path parameters (name → raw segment value)
pub type Params = HashMap<String, String>;

/// A single segment of a route pattern
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::route::pattern::{classify_segment, Segment};
///
/// assert_eq!(classify_segment("about"), Segment::Literal("about".to_string()));
/// assert_eq!(classify_segment(":id"), Segment::Dynamic("id".to_string()));
/// assert_eq!(classify_segment("*"), Segment::CatchAll);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Exact, case-sensitive text
    Literal(String),
    /// `:name` binds one path segment
    Dynamic(String),
    /// `*` binds every remaining segment to [`CATCH_ALL_PARAM`]
    CatchAll,
}

/// Classifies a raw pattern segment (pure function)
pub fn classify_segment(segment: &str) -> Segment {
    if segment == "*" {
        return Segment::CatchAll;
    }

    match segment.strip_prefix(':') {
        Some(name) => Segment::Dynamic(name.to_string()),
        None => Segment::Literal(segment.to_string()),
    }
}

/// Ordering tier used to sort routes from most to least specific
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SpecificityTier {
    /// Only literal segments
    Static,
    /// At least one `:name` segment, no catch-all
    Dynamic,
    /// Ends in `*`
    CatchAll,
}

/// Outcome of matching a pattern against a pathname
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchResult {
    pub matched: bool,
    pub params: Params,
}

impl MatchResult {
    /// A successful match with the given parameters
    pub fn hit(params: Params) -> Self {
        Self {
            matched: true,
            params,
        }
    }

    /// A failed match
    pub fn miss() -> Self {
        Self::default()
    }
}

/// A parsed route pattern
///
/// At most one catch-all segment, and only in final position.
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::RoutePattern;
///
/// let pattern = RoutePattern::parse("/users/:id").unwrap();
/// let result = pattern.match_path("/users/42");
/// assert!(result.matched);
/// assert_eq!(result.params.get("id"), Some(&"42".to_string()));
///
/// assert!(RoutePattern::parse("/docs/*/edit").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parses and validates a pattern string
    pub fn parse(pattern: &str) -> Result<Self, RouterError> {
        let invalid = |reason| RouterError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        let segments: Vec<Segment> = split_segments(pattern).map(classify_segment).collect();

        for (index, segment) in segments.iter().enumerate() {
            match segment {
                Segment::Dynamic(name) if name.is_empty() => {
                    return Err(invalid("dynamic segment needs a parameter name"));
                }
                Segment::CatchAll if index + 1 != segments.len() => {
                    return Err(invalid("catch-all must be the final segment"));
                }
                _ => {}
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether this is the root pattern (no segments at all)
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Specificity tier of this pattern
    pub fn tier(&self) -> SpecificityTier {
        let mut tier = SpecificityTier::Static;
        for segment in &self.segments {
            match segment {
                Segment::CatchAll => return SpecificityTier::CatchAll,
                Segment::Dynamic(_) => tier = SpecificityTier::Dynamic,
                Segment::Literal(_) => {}
            }
        }
        tier
    }

    /// Names of every parameter this pattern binds, in segment order
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Dynamic(name) => Some(name.as_str()),
                Segment::CatchAll => Some(CATCH_ALL_PARAM),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Matches this pattern against a pathname
    ///
    /// Note that a root pattern matches any pathname reducing to zero
    /// segments (including `///`); the route table applies the exact `/`
    /// check for root routes before calling this.
    pub fn match_path(&self, pathname: &str) -> MatchResult {
        match_path(&self.segments, pathname)
    }

    /// Builds a concrete path by substituting parameters
    ///
    /// Returns `None` when a dynamic parameter is missing. A missing or
    /// empty catch-all contributes no segments.
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_spa_router::RoutePattern;
    /// use std::collections::HashMap;
    ///
    /// let pattern = RoutePattern::parse("/posts/:year/*").unwrap();
    /// let params = HashMap::from([
    ///     ("year".to_string(), "2024".to_string()),
    ///     ("slug".to_string(), "hello/world".to_string()),
    /// ]);
    /// assert_eq!(pattern.href(&params).unwrap(), "/posts/2024/hello/world");
    /// ```
    pub fn href(&self, params: &Params) -> Option<String> {
        let mut url = String::new();

        for segment in &self.segments {
            let value = match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Dynamic(name) => params.get(name)?.as_str(),
                Segment::CatchAll => match params.get(CATCH_ALL_PARAM) {
                    Some(rest) => rest.trim_matches('/'),
                    None => "",
                },
            };
            if !value.is_empty() {
                url.push('/');
                url.push_str(value);
            }
        }

        if url.is_empty() {
            url.push('/');
        }
        Some(url)
    }
}

impl std::fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Walks pattern segments against path segments (pure function)
///
/// - Catch-all succeeds immediately, binding the remaining segments joined
///   with `/` (possibly empty)
/// - A pattern longer than the path fails
/// - Dynamic segments bind unconditionally
/// - Literal segments compare case-sensitively
/// - Leftover path segments fail the match
pub fn match_path(pattern: &[Segment], pathname: &str) -> MatchResult {
    let path: Vec<&str> = split_segments(pathname).collect();
    let mut params = Params::new();

    for (index, segment) in pattern.iter().enumerate() {
        if let Segment::CatchAll = segment {
            let rest = path.get(index..).unwrap_or_default().join("/");
            params.insert(CATCH_ALL_PARAM.to_string(), rest);
            return MatchResult::hit(params);
        }

        let Some(value) = path.get(index) else {
            return MatchResult::miss();
        };

        match segment {
            Segment::Dynamic(name) => {
                params.insert(name.clone(), (*value).to_string());
            }
            Segment::Literal(text) if text.as_str() == *value => {}
            _ => return MatchResult::miss(),
        }
    }

    if path.len() > pattern.len() {
        return MatchResult::miss();
    }

    MatchResult::hit(params)
}
