//! Path parameter convertors.
//!
//! | name    | accepts                              | value             |
//! |---------|--------------------------------------|-------------------|
//! | `str`   | one or more characters except `/`    | `ParamValue::Str` |
//! | `path`  | anything, including `/`              | `ParamValue::Str` |
//! | `int`   | decimal digits                       | `ParamValue::Int` |
//! | `float` | digits with an optional `.digits`    | `ParamValue::Float` |
//! | `uuid`  | lowercase hyphenated UUID            | `ParamValue::Uuid` |

use uuid::Uuid;

use crate::routing::params::ParamValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convertor {
    Str,
    Path,
    Int,
    Float,
    Uuid,
}

impl Convertor {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "str" => Some(Convertor::Str),
            "path" => Some(Convertor::Path),
            "int" => Some(Convertor::Int),
            "float" => Some(Convertor::Float),
            "uuid" => Some(Convertor::Uuid),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Convertor::Str => "str",
            Convertor::Path => "path",
            Convertor::Int => "int",
            Convertor::Float => "float",
            Convertor::Uuid => "uuid",
        }
    }

    /// Whether a captured value may contain `/`.
    pub fn spans_slashes(&self) -> bool {
        matches!(self, Convertor::Path)
    }

    /// Shape check on a raw path fragment.
    pub fn accepts(&self, raw: &str) -> bool {
        match self {
            Convertor::Str => !raw.is_empty() && !raw.contains('/'),
            Convertor::Path => true,
            Convertor::Int => is_digits(raw),
            Convertor::Float => match raw.split_once('.') {
                Some((whole, fraction)) => is_digits(whole) && is_digits(fraction),
                None => is_digits(raw),
            },
            Convertor::Uuid => is_hyphenated_uuid(raw),
        }
    }

    /// Convert a raw fragment into a typed value.
    pub fn convert(&self, raw: &str) -> Option<ParamValue> {
        if !self.accepts(raw) {
            return None;
        }
        match self {
            Convertor::Str | Convertor::Path => Some(ParamValue::Str(raw.to_string())),
            Convertor::Int => raw.parse().ok().map(ParamValue::Int),
            Convertor::Float => raw.parse().ok().map(ParamValue::Float),
            Convertor::Uuid => Uuid::parse_str(raw).ok().map(ParamValue::Uuid),
        }
    }

    /// Render a value back into a path fragment.
    pub fn to_path_segment(&self, value: &ParamValue) -> Option<String> {
        match (self, value) {
            (Convertor::Str | Convertor::Path, ParamValue::Str(s)) => {
                self.accepts(s).then(|| s.clone())
            }
            (Convertor::Str | Convertor::Path, other) => Some(other.to_string()),
            (Convertor::Int, ParamValue::Int(n)) => Some(n.to_string()),
            (Convertor::Float, ParamValue::Int(n)) => Some(n.to_string()),
            (Convertor::Float, ParamValue::Float(v)) => {
                (v.is_finite() && *v >= 0.0).then(|| format_float(*v))
            }
            (Convertor::Uuid, ParamValue::Uuid(id)) => Some(id.to_string()),
            (_, ParamValue::Str(s)) => self.convert(s).map(|_| s.clone()),
            _ => None,
        }
    }
}

fn is_digits(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

fn is_hyphenated_uuid(raw: &str) -> bool {
    raw.len() == 36
        && raw.bytes().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => b == b'-',
            _ => b.is_ascii_digit() || (b'a'..=b'f').contains(&b),
        })
}

/// Fixed-point rendering without trailing zeros.
fn format_float(value: f64) -> String {
    let rendered = format!("{value:.20}");
    rendered.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_rejects_slashes_and_empty() {
        assert!(Convertor::Str.accepts("lobby"));
        assert!(!Convertor::Str.accepts(""));
        assert!(!Convertor::Str.accepts("a/b"));
        assert!(Convertor::Path.accepts("a/b/c"));
    }

    #[test]
    fn int_and_float_shapes() {
        assert_eq!(Convertor::Int.convert("42"), Some(ParamValue::Int(42)));
        assert_eq!(Convertor::Int.convert("-1"), None);
        assert_eq!(Convertor::Int.convert("99999999999999999999999"), None);
        assert_eq!(Convertor::Float.convert("1.5"), Some(ParamValue::Float(1.5)));
        assert_eq!(Convertor::Float.convert("3"), Some(ParamValue::Float(3.0)));
        assert_eq!(Convertor::Float.convert("1."), None);
    }

    #[test]
    fn uuid_must_be_lowercase_hyphenated() {
        let id = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        assert!(matches!(Convertor::Uuid.convert(id), Some(ParamValue::Uuid(_))));
        assert_eq!(Convertor::Uuid.convert(&id.to_uppercase()), None);
        assert_eq!(Convertor::Uuid.convert("67e5504410b1426f9247bb680e5fe0c8"), None);
    }

    #[test]
    fn to_path_segment_validates_values() {
        assert_eq!(Convertor::Int.to_path_segment(&ParamValue::Int(7)).as_deref(), Some("7"));
        assert_eq!(Convertor::Int.to_path_segment(&"12".into()).as_deref(), Some("12"));
        assert_eq!(Convertor::Int.to_path_segment(&"abc".into()), None);
        assert_eq!(Convertor::Str.to_path_segment(&"a/b".into()), None);
        assert_eq!(
            Convertor::Float.to_path_segment(&ParamValue::Float(2.5)).as_deref(),
            Some("2.5")
        );
        assert_eq!(Convertor::Float.to_path_segment(&ParamValue::Float(-1.0)), None);
        assert_eq!(Convertor::Uuid.to_path_segment(&ParamValue::Int(1)), None);
    }
}
