//! Path pattern compilation, matching and reversal.
//!
//! Patterns are literal text with `{name}` or `{name:convertor}` parameters,
//! e.g. `/rooms/{room}/messages/{id:int}`. Text in braces that is not a valid
//! parameter declaration stays literal.

use std::collections::BTreeSet;

use crate::error::AppError;
use crate::routing::convertors::Convertor;
use crate::routing::params::PathParams;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Param { name: String, convertor: Convertor },
}

/// A compiled route path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile `path`. Paths must start with `/`.
    pub fn compile(path: &str) -> Result<Self, AppError> {
        if !path.starts_with('/') {
            return Err(AppError::Configuration(format!(
                "routed paths must start with '/': {path:?}"
            )));
        }

        let mut segments = Vec::new();
        let mut seen = BTreeSet::new();
        let mut literal = String::new();
        let mut rest = path;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                literal.push_str(&rest[open..]);
                rest = "";
                break;
            };

            match parse_param(&after[..close])? {
                Some((name, convertor)) => {
                    if !seen.insert(name.clone()) {
                        return Err(AppError::Configuration(format!(
                            "duplicated param name '{name}' at path {path:?}"
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Param { name, convertor });
                }
                None => literal.push_str(&rest[open..open + close + 2]),
            }
            rest = &after[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: path.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Declared parameter names, in pattern order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a full path, returning converted parameters.
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let mut captured = Vec::new();
        if !match_segments(&self.segments, path, &mut captured) {
            return None;
        }

        let mut params = PathParams::new();
        let declared = self.segments.iter().filter_map(|segment| match segment {
            Segment::Param { name, convertor } => Some((name, convertor)),
            Segment::Literal(_) => None,
        });
        for ((name, convertor), raw) in declared.zip(captured) {
            params.insert(name.clone(), convertor.convert(raw)?);
        }
        Some(params)
    }

    /// Build a concrete path from `params`.
    ///
    /// The supplied names must equal the declared names exactly, and every
    /// value must satisfy its convertor.
    pub fn reverse(&self, params: &PathParams) -> Option<String> {
        let declared: BTreeSet<&str> = self.param_names().collect();
        let supplied: BTreeSet<&str> = params.names().collect();
        if declared != supplied {
            return None;
        }

        let mut path = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Param { name, convertor } => {
                    path.push_str(&convertor.to_path_segment(params.get(name)?)?);
                }
            }
        }
        Some(path)
    }
}

/// Parse the text between braces. `Ok(None)` means "not a parameter".
fn parse_param(inner: &str) -> Result<Option<(String, Convertor)>, AppError> {
    let (name, convertor) = match inner.split_once(':') {
        Some((name, convertor)) => (name, Some(convertor)),
        None => (inner, None),
    };
    if !is_identifier(name) || !convertor.map_or(true, is_identifier) {
        return Ok(None);
    }

    let convertor = match convertor {
        None => Convertor::Str,
        Some(kind) => Convertor::from_name(kind).ok_or_else(|| {
            AppError::Configuration(format!("unknown path convertor '{kind}'"))
        })?,
    };
    Ok(Some((name.to_string(), convertor)))
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Anchored backtracking match. Parameters are greedy.
fn match_segments<'p>(segments: &[Segment], rest: &'p str, captured: &mut Vec<&'p str>) -> bool {
    let Some((first, tail)) = segments.split_first() else {
        return rest.is_empty();
    };

    match first {
        Segment::Literal(text) => rest
            .strip_prefix(text.as_str())
            .is_some_and(|remaining| match_segments(tail, remaining, captured)),
        Segment::Param { convertor, .. } => {
            let limit = if convertor.spans_slashes() {
                rest.len()
            } else {
                rest.find('/').unwrap_or(rest.len())
            };
            for end in (0..=limit).rev() {
                if !rest.is_char_boundary(end) {
                    continue;
                }
                let candidate = &rest[..end];
                if !convertor.accepts(candidate) {
                    continue;
                }
                captured.push(candidate);
                if match_segments(tail, &rest[end..], captured) {
                    return true;
                }
                captured.pop();
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::params::ParamValue;

    #[test]
    fn literal_paths_match_exactly() {
        let pattern = PathPattern::compile("/chat").unwrap();
        assert_eq!(pattern.match_path("/chat"), Some(PathParams::new()));
        assert_eq!(pattern.match_path("/chat/"), None);
        assert_eq!(pattern.match_path("/cha"), None);
    }

    #[test]
    fn parameters_are_converted() {
        let pattern = PathPattern::compile("/rooms/{room}/messages/{id:int}").unwrap();
        let params = pattern.match_path("/rooms/lobby/messages/17").unwrap();
        assert_eq!(params.get("room"), Some(&ParamValue::Str("lobby".into())));
        assert_eq!(params.get("id"), Some(&ParamValue::Int(17)));

        assert!(pattern.match_path("/rooms/lobby/messages/abc").is_none());
        assert!(pattern.match_path("/rooms/a/b/messages/1").is_none());
    }

    #[test]
    fn path_convertor_spans_segments() {
        let pattern = PathPattern::compile("/files/{rest:path}/raw").unwrap();
        let params = pattern.match_path("/files/a/b/c/raw").unwrap();
        assert_eq!(params.get("rest").and_then(ParamValue::as_str), Some("a/b/c"));
    }

    #[test]
    fn param_inside_a_segment() {
        let pattern = PathPattern::compile("/v{version:int}/feed").unwrap();
        let params = pattern.match_path("/v2/feed").unwrap();
        assert_eq!(params.get("version"), Some(&ParamValue::Int(2)));
    }

    #[test]
    fn invalid_patterns_are_configuration_errors() {
        assert!(matches!(PathPattern::compile("chat"), Err(AppError::Configuration(_))));
        assert!(matches!(
            PathPattern::compile("/{id:hex}"),
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            PathPattern::compile("/{id}/{id}"),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn non_identifier_braces_stay_literal() {
        let pattern = PathPattern::compile("/raw/{1x}").unwrap();
        assert_eq!(pattern.param_names().count(), 0);
        assert!(pattern.match_path("/raw/{1x}").is_some());
    }

    #[test]
    fn reverse_requires_exact_parameter_set() {
        let pattern = PathPattern::compile("/rooms/{room}/messages/{id:int}").unwrap();
        let params = PathParams::new().with("room", "lobby").with("id", 5u64);
        assert_eq!(pattern.reverse(&params).as_deref(), Some("/rooms/lobby/messages/5"));

        assert_eq!(pattern.reverse(&PathParams::new().with("room", "lobby")), None);
        assert_eq!(pattern.reverse(&params.clone().with("extra", "x")), None);
        assert_eq!(
            pattern.reverse(&PathParams::new().with("room", "lobby").with("id", "five")),
            None
        );
    }

    #[test]
    fn reversed_path_matches_again() {
        let pattern = PathPattern::compile("/files/{rest:path}").unwrap();
        let params = PathParams::new().with("rest", "docs/readme.md");
        let path = pattern.reverse(&params).unwrap();
        assert_eq!(pattern.match_path(&path), Some(params));
    }
}
