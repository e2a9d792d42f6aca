//! Choice declarations
//!
//! A [`Choice`] is one build-time question ("which Nevermore model?"), with a
//! fixed list of [`ChoiceValue`]s. Each value may carry a precondition that
//! must hold for it to be selectable.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::expr::{Expression, ParseError};

/// Errors building or editing a choice from command-line text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChoiceSpecError {
    #[error("value '{spec}' must have the form text:value[:condition]")]
    Malformed { spec: String },

    #[error(transparent)]
    Condition(#[from] ParseError),

    #[error("boolean choice '{varname}' takes a selected and an optional unselected value, got {count}")]
    BooleanArity { varname: String, count: usize },

    #[error("choice '{varname}' has no value '{value_id}'")]
    UnknownValue { varname: String, value_id: String },

    #[error("the selected value of boolean choice '{varname}' cannot be removed")]
    RequiredValue { varname: String },
}

/// Shape of a choice, independent of its values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ChoiceKind {
    /// Exactly one value
    Single,
    /// Any subset of the values
    Multi,
    /// Selected/unselected checkbox
    Boolean,
}

/// One legal answer to a choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct ChoiceValue {
    /// Text shown to the user
    pub display_text: String,

    /// Identifier stored in answers and matched by expressions
    pub value_id: String,

    /// Value is only selectable while this holds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precondition: Option<Expression>,
}

impl ChoiceValue {
    pub fn new(display_text: impl Into<String>, value_id: impl Into<String>) -> Self {
        Self {
            display_text: display_text.into(),
            value_id: value_id.into(),
            precondition: None,
        }
    }

    /// Shorthand for values whose text and identifier coincide
    pub fn id(value_id: impl Into<String>) -> Self {
        let value_id = value_id.into();
        Self::new(value_id.clone(), value_id)
    }

    /// Guard this value with a precondition
    pub fn with_precondition(mut self, precondition: Expression) -> Self {
        self.precondition = Some(precondition);
        self
    }
}

/// Parses `text:value[:condition]`; the condition may itself contain `:`
impl FromStr for ChoiceValue {
    type Err = ChoiceSpecError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut parts = spec.splitn(3, ':');
        let (Some(text), Some(value_id)) = (parts.next(), parts.next()) else {
            return Err(ChoiceSpecError::Malformed {
                spec: spec.to_string(),
            });
        };
        let (text, value_id) = (text.trim(), value_id.trim());
        if text.is_empty() || value_id.is_empty() {
            return Err(ChoiceSpecError::Malformed {
                spec: spec.to_string(),
            });
        }

        let value = ChoiceValue::new(text, value_id);
        match parts.next().map(str::trim) {
            Some(cond) if !cond.is_empty() => Ok(value.with_precondition(Expression::parse(cond)?)),
            _ => Ok(value),
        }
    }
}

/// A declared configuration question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Choice {
    #[serde(rename = "SingleChoice")]
    Single {
        text: String,
        varname: String,
        values: Vec<ChoiceValue>,
    },

    #[serde(rename = "MultiChoice")]
    Multi {
        text: String,
        varname: String,
        values: Vec<ChoiceValue>,
    },

    #[serde(rename = "BooleanChoice")]
    Boolean {
        text: String,
        varname: String,
        sel_value: ChoiceValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unsel_value: Option<ChoiceValue>,
    },
}

impl Choice {
    pub fn single(
        text: impl Into<String>,
        varname: impl Into<String>,
        values: Vec<ChoiceValue>,
    ) -> Self {
        Choice::Single {
            text: text.into(),
            varname: varname.into(),
            values,
        }
    }

    pub fn multi(
        text: impl Into<String>,
        varname: impl Into<String>,
        values: Vec<ChoiceValue>,
    ) -> Self {
        Choice::Multi {
            text: text.into(),
            varname: varname.into(),
            values,
        }
    }

    pub fn boolean(
        text: impl Into<String>,
        varname: impl Into<String>,
        sel_value: ChoiceValue,
        unsel_value: Option<ChoiceValue>,
    ) -> Self {
        Choice::Boolean {
            text: text.into(),
            varname: varname.into(),
            sel_value,
            unsel_value,
        }
    }

    /// Build a choice of `kind`. A boolean choice takes its selected value
    /// first and at most one unselected value.
    pub fn from_values(
        kind: ChoiceKind,
        text: impl Into<String>,
        varname: impl Into<String>,
        values: Vec<ChoiceValue>,
    ) -> Result<Self, ChoiceSpecError> {
        match kind {
            ChoiceKind::Single => Ok(Choice::single(text, varname, values)),
            ChoiceKind::Multi => Ok(Choice::multi(text, varname, values)),
            ChoiceKind::Boolean => {
                let varname = varname.into();
                let count = values.len();
                let mut values = values.into_iter();
                match (values.next(), values.next(), values.next()) {
                    (Some(sel), unsel, None) => Ok(Choice::boolean(text, varname, sel, unsel)),
                    _ => Err(ChoiceSpecError::BooleanArity { varname, count }),
                }
            }
        }
    }

    pub fn kind(&self) -> ChoiceKind {
        match self {
            Choice::Single { .. } => ChoiceKind::Single,
            Choice::Multi { .. } => ChoiceKind::Multi,
            Choice::Boolean { .. } => ChoiceKind::Boolean,
        }
    }

    pub fn varname(&self) -> &str {
        match self {
            Choice::Single { varname, .. }
            | Choice::Multi { varname, .. }
            | Choice::Boolean { varname, .. } => varname,
        }
    }

    /// Question text
    pub fn text(&self) -> &str {
        match self {
            Choice::Single { text, .. } | Choice::Multi { text, .. } | Choice::Boolean { text, .. } => {
                text
            }
        }
    }

    /// Declared values in order; for a boolean choice the selected value
    /// comes first
    pub fn values(&self) -> Vec<&ChoiceValue> {
        match self {
            Choice::Single { values, .. } | Choice::Multi { values, .. } => values.iter().collect(),
            Choice::Boolean {
                sel_value,
                unsel_value,
                ..
            } => std::iter::once(sel_value).chain(unsel_value.as_ref()).collect(),
        }
    }

    /// Look up a declared value by identifier
    pub fn find_value(&self, value_id: &str) -> Option<&ChoiceValue> {
        self.values().into_iter().find(|v| v.value_id == value_id)
    }

    pub fn find_value_mut(&mut self, value_id: &str) -> Option<&mut ChoiceValue> {
        match self {
            Choice::Single { values, .. } | Choice::Multi { values, .. } => {
                values.iter_mut().find(|v| v.value_id == value_id)
            }
            Choice::Boolean {
                sel_value,
                unsel_value,
                ..
            } => std::iter::once(sel_value)
                .chain(unsel_value.as_mut())
                .find(|v| v.value_id == value_id),
        }
    }

    /// Drop a declared value. The selected value of a boolean choice stays.
    pub fn remove_value(&mut self, value_id: &str) -> Result<ChoiceValue, ChoiceSpecError> {
        let varname = self.varname().to_string();
        let unknown = || ChoiceSpecError::UnknownValue {
            varname: varname.clone(),
            value_id: value_id.to_string(),
        };
        match self {
            Choice::Single { values, .. } | Choice::Multi { values, .. } => {
                let pos = values.iter().position(|v| v.value_id == value_id).ok_or_else(unknown)?;
                Ok(values.remove(pos))
            }
            Choice::Boolean {
                sel_value,
                unsel_value,
                ..
            } => {
                if sel_value.value_id == value_id {
                    return Err(ChoiceSpecError::RequiredValue {
                        varname: varname.clone(),
                    });
                }
                if unsel_value.as_ref().is_some_and(|v| v.value_id == value_id) {
                    return unsel_value.take().ok_or_else(unknown);
                }
                Err(unknown())
            }
        }
    }

    /// Whether an answer must be exactly one identifier
    pub fn is_single_valued(&self) -> bool {
        !matches!(self, Choice::Multi { .. })
    }
}
