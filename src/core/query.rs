//! core::query
//!
//! The version query language.
//!
//! # Grammar
//!
//! ```text
//! query      := target (':' rule)* ('->' name)*
//! target     := component | component '/' version
//! rule       := key op value        (rules may also be separated by ',')
//! op         := '=' | '!=' | '<' | '>' | '<=' | '>='
//! ```
//!
//! Examples: `test/comp`, `test/comp/13`, `test/comp:Smoke=green`,
//! `test/comp:maturity>=beta,Smoke!=red`, `my/product->tests->runner`.
//!
//! Relational operators compare positions in a per-component ordering list,
//! see [`crate::core::finder`].
//!
//! Rules filter explicit versions too: `test/comp/13:Smoke=green` resolves
//! to nothing when version 13 lacks that status. Only the newest-match
//! search is skipped when a version is named.

use std::fmt;

use super::errors::{RepoError, Result};

/// Comparison operator of a status rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl StatusOp {
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "=" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            ">" => Some(Self::Gt),
            "<=" => Some(Self::Le),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }
}

/// One `key<op>value` predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRule {
    pub key: String,
    pub op: StatusOp,
    pub value: String,
}

impl StatusRule {
    pub fn new(key: impl Into<String>, op: StatusOp, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op,
            value: value.into(),
        }
    }

    /// Parse `key<op>value`.
    ///
    /// # Errors
    ///
    /// `Configuration` if the text has no operator or an unsupported one.
    pub fn parse(s: &str) -> Result<Self> {
        let is_op = |c: char| matches!(c, '<' | '=' | '>' | '!');
        let start = s
            .find(is_op)
            .ok_or_else(|| RepoError::Configuration(format!("Not a status rule: '{s}'")))?;
        let end = s[start..]
            .find(|c: char| !is_op(c))
            .map_or(s.len(), |n| start + n);
        let (key, op, value) = (&s[..start], &s[start..end], &s[end..]);
        let op = StatusOp::parse(op).ok_or_else(|| {
            RepoError::Configuration(format!("Not supported status operation: '{s}'"))
        })?;
        Ok(Self::new(key, op, value))
    }

    /// Evaluate against a status value and the key's ordering.
    ///
    /// Relational rules are false when there is no ordering or either
    /// value is missing from it.
    pub fn matches(&self, status_value: &str, order: Option<&[String]>) -> bool {
        match self.op {
            StatusOp::Eq => status_value == self.value,
            StatusOp::Ne => status_value != self.value,
            op => {
                let Some(order) = order else {
                    return false;
                };
                let position = |v: &str| order.iter().position(|o| o == v);
                let (Some(actual), Some(wanted)) = (position(status_value), position(&self.value))
                else {
                    return false;
                };
                match op {
                    StatusOp::Lt => actual < wanted,
                    StatusOp::Gt => actual > wanted,
                    StatusOp::Le => actual <= wanted,
                    StatusOp::Ge => actual >= wanted,
                    StatusOp::Eq | StatusOp::Ne => false,
                }
            }
        }
    }
}

impl fmt::Display for StatusRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.key, self.op.as_str(), self.value)
    }
}

/// A parsed query string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionQuery {
    /// Component id or full version id. Empty when the string carried only
    /// rules (possible when a component is given separately).
    pub target: String,
    pub rules: Vec<StatusRule>,
    /// Dependency names to follow after resolution, in order.
    pub navigation: Vec<String>,
}

impl VersionQuery {
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split("->");
        let base = parts.next().unwrap_or("");
        let navigation = parts
            .map(|name| {
                if name.is_empty() {
                    Err(RepoError::Configuration(format!(
                        "empty dependency name in '{s}'"
                    )))
                } else {
                    Ok(name.to_string())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut segments = base.split(':');
        let target = segments.next().unwrap_or("").to_string();
        let rules = segments
            .flat_map(|segment| segment.split(','))
            .filter(|rule| !rule.is_empty())
            .map(StatusRule::parse)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            target,
            rules,
            navigation,
        })
    }
}
