//! Finders: resolve declarative selections against a live object model

pub mod method_finder;
pub mod pointcut_finder;
pub mod result;
pub mod type_finder;

pub use method_finder::{MethodFinder, MethodOptions};
pub use pointcut_finder::{PointcutFinder, PointcutFinderResult};
pub use result::{FinderResult, ResultKey};
pub use type_finder::TypeFinder;

use crate::error::{Result, WeftError};
use crate::options::OptionValue;
use regex::Regex;
use std::fmt;

/// A method, attribute or slot name selector
#[derive(Debug, Clone)]
pub(crate) enum NameMatcher {
    Exact(String),
    Pattern(Regex),
    All,
}

impl NameMatcher {
    /// Build matchers from option values; blank names are skipped
    pub(crate) fn from_values(values: &[OptionValue], what: &str) -> Result<Vec<NameMatcher>> {
        let mut matchers = Vec::with_capacity(values.len());
        for value in values {
            match value {
                OptionValue::Name(name) => {
                    let name = name.trim();
                    if !name.is_empty() {
                        matchers.push(NameMatcher::Exact(name.to_string()));
                    }
                }
                OptionValue::Pattern(re) => matchers.push(NameMatcher::Pattern(re.clone())),
                OptionValue::All => matchers.push(NameMatcher::All),
                other => {
                    return Err(WeftError::invalid(format!(
                        "{} must be names, patterns or all, got {}",
                        what, other
                    )))
                }
            }
        }
        Ok(matchers)
    }

    pub(crate) fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Exact(exact) => exact == name,
            NameMatcher::Pattern(re) => re.is_match(name),
            NameMatcher::All => !name.is_empty(),
        }
    }

    pub(crate) fn is_all(&self) -> bool {
        matches!(self, NameMatcher::All)
    }
}

impl fmt::Display for NameMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameMatcher::Exact(name) => write!(f, "{}", name),
            NameMatcher::Pattern(re) => write!(f, "/{}/", re.as_str()),
            NameMatcher::All => write!(f, "all"),
        }
    }
}
