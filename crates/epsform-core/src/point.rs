//! Singularity points and their designated order.

use std::cmp::Ordering;
use std::fmt;

use epsform_engine::{Engine, Expr};

use crate::error::Result;

/// A singularity of the system: a finite point given by an exact symbolic
/// value, or the point at infinity.
#[derive(Clone, Debug)]
pub enum SingPoint {
    Finite(Expr),
    Infinity,
}

impl SingPoint {
    /// Parses the file syntax: `inf` or an engine-parsable value.
    pub fn parse(engine: &Engine, text: &str) -> Result<Self> {
        if text == "inf" {
            Ok(Self::Infinity)
        } else {
            Ok(Self::Finite(Expr::new(engine, text)?))
        }
    }

    pub fn from_i64(engine: &Engine, n: i64) -> Result<Self> {
        Ok(Self::Finite(Expr::from_i64(engine, n)?))
    }

    #[must_use]
    pub fn is_infinity(&self) -> bool {
        matches!(self, Self::Infinity)
    }

    /// The underlying expression of a finite point.
    #[must_use]
    pub fn expr(&self) -> Option<&Expr> {
        match self {
            Self::Finite(x) => Some(x),
            Self::Infinity => None,
        }
    }

    fn key(&self) -> PointKey<'_> {
        match self {
            Self::Infinity => PointKey::Infinity,
            Self::Finite(x) => {
                let s = x.as_str();
                match numeric_value(s) {
                    Some(n) => PointKey::Numeric(n),
                    None => PointKey::Symbolic(s),
                }
            }
        }
    }
}

/// Designated point order: numeric points first (by value), then symbolic
/// points (lexically by canonical form), infinity last.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum PointKey<'a> {
    Numeric(i64),
    Symbolic(&'a str),
    Infinity,
}

fn numeric_value(s: &str) -> Option<i64> {
    if s.is_empty() || !s.chars().all(|c| c == '-' || c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl PartialEq for SingPoint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Infinity, Self::Infinity) => true,
            (Self::Finite(a), Self::Finite(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for SingPoint {}

impl PartialOrd for SingPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SingPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl std::hash::Hash for SingPoint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Self::Infinity => state.write_u8(0),
            Self::Finite(x) => {
                state.write_u8(1);
                x.hash(state);
            }
        }
    }
}

impl fmt::Display for SingPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinity => f.write_str("inf"),
            Self::Finite(x) => f.write_str(x.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_detection() {
        assert_eq!(numeric_value("42"), Some(42));
        assert_eq!(numeric_value("-3"), Some(-3));
        assert_eq!(numeric_value("1/2"), None);
        assert_eq!(numeric_value("y"), None);
        assert_eq!(numeric_value(""), None);
    }

    #[test]
    fn key_order() {
        // numeric before symbolic, numeric by value, infinity last
        assert!(PointKey::Numeric(-1) < PointKey::Numeric(0));
        assert!(PointKey::Numeric(7) < PointKey::Symbolic("a"));
        assert!(PointKey::Symbolic("a") < PointKey::Symbolic("b"));
        assert!(PointKey::Symbolic("zz") < PointKey::Infinity);
    }
}
