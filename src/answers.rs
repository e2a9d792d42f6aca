//! User answers: the raw map submitted by a caller and the validated
//! [`AnswerSet`] the catalog produces from it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One submitted answer, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAnswer {
    One(String),
    Many(Vec<String>),
}

impl RawAnswer {
    /// Members of the answer, scalars wrapped as a one-element list
    pub fn members(&self) -> Vec<&str> {
        match self {
            RawAnswer::One(v) => vec![v.as_str()],
            RawAnswer::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for RawAnswer {
    fn from(value: &str) -> Self {
        RawAnswer::One(value.to_string())
    }
}

impl From<Vec<String>> for RawAnswer {
    fn from(values: Vec<String>) -> Self {
        RawAnswer::Many(values)
    }
}

impl<const N: usize> From<[&str; N]> for RawAnswer {
    fn from(values: [&str; N]) -> Self {
        RawAnswer::Many(values.iter().map(|v| v.to_string()).collect())
    }
}

/// Answers as submitted: varname → value or list of values
pub type RawAnswerMap = BTreeMap<String, RawAnswer>;

/// Build a raw answer map from literal pairs
pub fn raw_answers<K, V, I>(pairs: I) -> RawAnswerMap
where
    K: Into<String>,
    V: Into<RawAnswer>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Malformed `key=value[,value...]` token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnswerTokenError {
    #[error("answer '{token}' must have the form key=value[,value...]")]
    Malformed { token: String },

    #[error("answer '{token}' contains an empty value")]
    EmptyValue { token: String },

    #[error("variable '{varname}' is answered more than once")]
    Repeated { varname: String },
}

/// Parse command-line style answer tokens.
///
/// Each token is split on the first `=` and the value part on `,`. A single
/// value stays a scalar; several become a list.
///
/// ```
/// use stepcvt::answers::{parse_answer_tokens, RawAnswer};
///
/// let map = parse_answer_tokens(["NevermoreModel=V6", "PrinterOptions=Filter,Lights"]).unwrap();
/// assert_eq!(map["NevermoreModel"], RawAnswer::One("V6".into()));
/// assert_eq!(map["PrinterOptions"], RawAnswer::Many(vec!["Filter".into(), "Lights".into()]));
/// ```
pub fn parse_answer_tokens<I, S>(tokens: I) -> Result<RawAnswerMap, AnswerTokenError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut map = RawAnswerMap::new();

    for token in tokens {
        let token = token.as_ref();
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| AnswerTokenError::Malformed {
                token: token.to_string(),
            })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(AnswerTokenError::Malformed {
                token: token.to_string(),
            });
        }

        let values: Vec<String> = value.split(',').map(|v| v.trim().to_string()).collect();
        if values.iter().any(String::is_empty) {
            return Err(AnswerTokenError::EmptyValue {
                token: token.to_string(),
            });
        }

        let answer = if values.len() == 1 {
            RawAnswer::One(values.into_iter().next().unwrap_or_default())
        } else {
            RawAnswer::Many(values)
        };

        if map.insert(key.to_string(), answer).is_some() {
            return Err(AnswerTokenError::Repeated {
                varname: key.to_string(),
            });
        }
    }

    Ok(map)
}

/// A validated answer for one variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    /// Single-select or boolean choice
    Single(String),
    /// Multi-select choice
    Multi(BTreeSet<String>),
}

impl Answer {
    pub fn single(value: impl Into<String>) -> Self {
        Answer::Single(value.into())
    }

    pub fn multi<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Answer::Multi(values.into_iter().map(Into::into).collect())
    }

    /// Membership test; a single answer acts as a one-element set
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Answer::Single(v) => v == value,
            Answer::Multi(set) => set.contains(value),
        }
    }
}

/// A validated, internally consistent set of answers.
///
/// Outside this crate it can only be obtained from
/// [`Catalog::validate`](crate::catalog::Catalog::validate).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AnswerSet {
    answers: BTreeMap<String, Answer>,
}

impl AnswerSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, varname: impl Into<String>, answer: Answer) {
        self.answers.insert(varname.into(), answer);
    }

    #[cfg(test)]
    pub(crate) fn from_answers<K: Into<String>>(
        pairs: impl IntoIterator<Item = (K, Answer)>,
    ) -> Self {
        Self {
            answers: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, varname: &str) -> Option<&Answer> {
        self.answers.get(varname)
    }

    pub fn contains_variable(&self, varname: &str) -> bool {
        self.answers.contains_key(varname)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Answer)> {
        self.answers.iter().map(|(k, v)| (k.as_str(), v))
    }
}
