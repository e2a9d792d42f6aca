//! stepcvt library
//!
//! Choice expressions, the choice catalog and the effect resolver that turn a
//! user's build options into per-part selection, count and scale.

pub mod answers;
pub mod catalog;
pub mod choices;
pub mod cli;
pub mod effects;
pub mod error;
pub mod expr;
pub mod logic;
pub mod project;

// Re-export main types for convenience
pub use answers::{parse_answer_tokens, raw_answers, Answer, AnswerSet, RawAnswer, RawAnswerMap};
pub use catalog::{Catalog, CatalogError, ValidationError};
pub use choices::{Choice, ChoiceKind, ChoiceSpecError, ChoiceValue};
pub use effects::{Effect, EffectKind};
pub use error::{Result, StepcvtError};
pub use expr::{EvalError, Expression, ParseError};
pub use logic::resolver::{
    resolve, resolve_part, resolve_parts, PartDefaults, PartOutcome, PartRecord, PartState,
    ResolutionReport, ResolveError,
};
pub use project::{project_root, CadSource, GeometrySource, PartInfo, PartList, Project, TaskInfo};
