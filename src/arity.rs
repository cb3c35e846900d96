//! Arity declarations for all parameter kinds.
//!
//! A positive arity `n` means exactly `n` occurrences. A negative arity `-n`
//! means at least `n - 1` occurrences with no upper bound, so `-1` is
//! zero-or-more and `-2` is one-or-more. Zero is never a valid arity.

use crate::errors::DeclarationError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// A resolved, non-zero arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Arity(i64);

impl Arity {
    pub const ONE: Arity = Arity(1);
    pub const ZERO_OR_MORE: Arity = Arity(-1);
    pub const ONE_OR_MORE: Arity = Arity(-2);

    /// Build an arity from an integer, rejecting zero.
    pub fn new(value: i64) -> Result<Self, DeclarationError> {
        if value == 0 {
            return Err(DeclarationError::InvalidArity(
                "arity cannot be zero".to_string(),
            ));
        }
        Ok(Arity(value))
    }

    /// Resolve an optional arity expression.
    ///
    /// An absent expression is an error: callers wanting the default arity
    /// use [`Arity::ONE`] instead of passing `None`.
    pub fn resolve(expr: Option<&ArityExpr>) -> Result<Self, DeclarationError> {
        match expr {
            None => Err(DeclarationError::InvalidArity(
                "arity cannot be nil".to_string(),
            )),
            Some(ArityExpr::Count(n)) => Arity::new(*n),
            Some(ArityExpr::Text(s)) => s.parse(),
        }
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// Whether more than one occurrence may be supplied.
    pub fn is_multiple(self) -> bool {
        self.0 < 0 || self.0.abs() > 1
    }

    pub fn is_variadic(self) -> bool {
        self.0 < 0
    }

    /// Fewest occurrences that satisfy this arity.
    pub fn min(self) -> usize {
        if self.0 < 0 {
            (self.0.unsigned_abs() - 1) as usize
        } else {
            self.0 as usize
        }
    }

    /// Most occurrences allowed, `None` when open-ended.
    pub fn max(self) -> Option<usize> {
        if self.0 < 0 {
            None
        } else {
            Some(self.0 as usize)
        }
    }

    /// Whether `count` occurrences satisfy this arity.
    pub fn accepts(self, count: usize) -> bool {
        count >= self.min() && self.max().map_or(true, |max| count <= max)
    }
}

impl Default for Arity {
    fn default() -> Self {
        Arity::ONE
    }
}

impl FromStr for Arity {
    type Err = DeclarationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "*" | "any" | "zero_or_more" => return Ok(Arity::ZERO_OR_MORE),
            "+" | "one_or_more" => return Ok(Arity::ONE_OR_MORE),
            _ => {}
        }
        let value: i64 = s
            .parse()
            .map_err(|_| DeclarationError::InvalidArity(format!("cannot resolve arity '{}'", s)))?;
        Arity::new(value)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An arity as written in a declaration, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ArityExpr {
    Count(i64),
    Text(String),
}

impl From<i64> for ArityExpr {
    fn from(value: i64) -> Self {
        ArityExpr::Count(value)
    }
}

impl From<&str> for ArityExpr {
    fn from(value: &str) -> Self {
        ArityExpr::Text(value.to_string())
    }
}
