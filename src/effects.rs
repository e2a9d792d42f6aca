//! Choice-dependent effects on a part
//!
//! Effects are plain data: a condition plus a typed payload. They are applied
//! in declaration order by [`resolve`](crate::logic::resolver::resolve).

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::expr::Expression;

/// Which part attribute an effect drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum EffectKind {
    Selection,
    RelativeCount,
    AbsoluteCount,
    Scale,
}

/// A conditional rule that alters a part's selected/count/scale attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Effect {
    /// `selected` becomes the value of the condition
    #[serde(rename = "SelectionEffect")]
    Selection { cond: Expression },

    /// `count += delta` while the condition holds
    #[serde(rename = "RelativeCountEffect")]
    RelativeCount { cond: Expression, delta: i64 },

    /// `count` is replaced outright while the condition holds
    #[serde(rename = "AbsoluteCountEffect")]
    AbsoluteCount { cond: Expression, count: i64 },

    /// `scale = factor` while the condition holds
    #[serde(rename = "ScaleEffect")]
    Scale { cond: Expression, factor: f64 },
}

impl Effect {
    pub fn selection(cond: Expression) -> Self {
        Effect::Selection { cond }
    }

    pub fn relative_count(cond: Expression, delta: i64) -> Self {
        Effect::RelativeCount { cond, delta }
    }

    pub fn absolute_count(cond: Expression, count: i64) -> Self {
        Effect::AbsoluteCount { cond, count }
    }

    pub fn scale(cond: Expression, factor: f64) -> Self {
        Effect::Scale { cond, factor }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::Selection { .. } => EffectKind::Selection,
            Effect::RelativeCount { .. } => EffectKind::RelativeCount,
            Effect::AbsoluteCount { .. } => EffectKind::AbsoluteCount,
            Effect::Scale { .. } => EffectKind::Scale,
        }
    }

    pub fn cond(&self) -> &Expression {
        match self {
            Effect::Selection { cond }
            | Effect::RelativeCount { cond, .. }
            | Effect::AbsoluteCount { cond, .. }
            | Effect::Scale { cond, .. } => cond,
        }
    }
}
