//! Part attribute resolver
//!
//! Recomputes a part's derived `selected`/`count`/`scale` from its immutable
//! baseline and its ordered effect list, given a validated answer set.
//!
//! # Design
//!
//! - **Always from the baseline**: every call starts from the part defaults, so
//!   resolving twice (or after a different answer set) never drifts
//! - **Ordered effects**: effects apply in declaration order; the last true
//!   absolute count, the last scale and the last selection win
//! - **Commit on success only**: a part whose effects cannot be evaluated, or
//!   whose count leaves the `i64` range, keeps its previously committed
//!   attributes
//!
//! # Effect Rules
//!
//! | Effect          | When the condition is true | When false |
//! |-----------------|----------------------------|------------|
//! | `Selection`     | `selected = true`          | `selected = false` |
//! | `RelativeCount` | `count += delta`           | no change |
//! | `AbsoluteCount` | `count = <count>`          | no change |
//! | `Scale`         | `scale = factor`           | no change |

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::answers::AnswerSet;
use crate::effects::{Effect, EffectKind};
use crate::expr::EvalError;

/// Immutable baseline of a part
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartDefaults {
    pub selected: bool,
    pub count: i64,
    pub scale: f64,
}

impl Default for PartDefaults {
    fn default() -> Self {
        Self {
            selected: true,
            count: 1,
            scale: 1.0,
        }
    }
}

/// Derived attributes produced by a resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartState {
    pub selected: bool,
    pub count: i64,
    pub scale: f64,
}

impl From<PartDefaults> for PartState {
    fn from(defaults: PartDefaults) -> Self {
        Self {
            selected: defaults.selected,
            count: defaults.count,
            scale: defaults.scale,
        }
    }
}

/// An effect could not be applied; `index` is its position in the part's list
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("{kind} effect #{index} (`{cond}`): {source}")]
    Condition {
        index: usize,
        kind: EffectKind,
        cond: String,
        #[source]
        source: EvalError,
    },

    #[error("relative_count effect #{index}: count {count} + {delta} is out of range")]
    CountOverflow { index: usize, count: i64, delta: i64 },
}

impl ResolveError {
    /// Position of the failing effect
    pub fn index(&self) -> usize {
        match self {
            ResolveError::Condition { index, .. } | ResolveError::CountOverflow { index, .. } => *index,
        }
    }
}

/// A part as seen by the resolver.
///
/// Implemented by whatever owns the part record; the resolver only reads the
/// baseline and effects and writes back derived attributes.
pub trait PartRecord {
    fn part_id(&self) -> &str;

    fn defaults(&self) -> PartDefaults;

    fn effects(&self) -> &[Effect];

    /// Overwrite the derived attributes
    fn commit(&mut self, state: PartState);
}

/// Compute derived attributes from a baseline and ordered effects
pub fn resolve(
    defaults: &PartDefaults,
    effects: &[Effect],
    answers: &AnswerSet,
) -> Result<PartState, ResolveError> {
    let mut state = PartState::from(*defaults);

    for (index, effect) in effects.iter().enumerate() {
        let holds = effect
            .cond()
            .evaluate(answers)
            .map_err(|source| ResolveError::Condition {
                index,
                kind: effect.kind(),
                cond: effect.cond().to_string(),
                source,
            })?;

        match effect {
            Effect::Selection { .. } => state.selected = holds,
            Effect::RelativeCount { delta, .. } if holds => {
                state.count = state.count.checked_add(*delta).ok_or(ResolveError::CountOverflow {
                    index,
                    count: state.count,
                    delta: *delta,
                })?;
            }
            Effect::AbsoluteCount { count, .. } if holds => state.count = *count,
            Effect::Scale { factor, .. } if holds => state.scale = *factor,
            _ => {}
        }
    }

    Ok(state)
}

/// Resolve one part record, committing only if every effect evaluates
pub fn resolve_part<P: PartRecord + ?Sized>(
    part: &mut P,
    answers: &AnswerSet,
) -> Result<PartState, ResolveError> {
    let state = resolve(&part.defaults(), part.effects(), answers)?;
    debug!(
        part = part.part_id(),
        selected = state.selected,
        count = state.count,
        scale = state.scale,
        "part resolved"
    );
    part.commit(state);
    Ok(state)
}

/// Outcome for one part of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct PartOutcome {
    pub part_id: String,
    pub result: Result<PartState, ResolveError>,
}

/// Per-part outcomes of a batch resolution, in part order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionReport {
    pub outcomes: Vec<PartOutcome>,
}

impl ResolutionReport {
    /// Number of parts whose attributes were written
    pub fn committed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ResolveError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.part_id.as_str(), e)))
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn extend(&mut self, other: ResolutionReport) {
        self.outcomes.extend(other.outcomes);
    }
}

/// Resolve every part against one answer set.
///
/// Parts are independent: one part failing does not stop the others, and a
/// failed part keeps its previous attributes. With the `parallel` feature the
/// parts are resolved on the rayon pool.
pub fn resolve_parts<P>(parts: &mut [P], answers: &AnswerSet) -> ResolutionReport
where
    P: PartRecord + Send,
{
    #[cfg(feature = "parallel")]
    let outcomes: Vec<PartOutcome> = {
        use rayon::prelude::*;
        parts.par_iter_mut().map(|p| resolve_one(p, answers)).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<PartOutcome> = parts.iter_mut().map(|p| resolve_one(p, answers)).collect();

    let report = ResolutionReport { outcomes };
    info!(
        parts = report.outcomes.len(),
        committed = report.committed(),
        "parts resolved"
    );
    report
}

fn resolve_one<P: PartRecord>(part: &mut P, answers: &AnswerSet) -> PartOutcome {
    let result = resolve_part(part, answers);
    if let Err(e) = &result {
        warn!(part = part.part_id(), error = %e, "part left unchanged");
    }
    PartOutcome {
        part_id: part.part_id().to_string(),
        result,
    }
}

// ============================================================================
// Tests
// ============================================================================
