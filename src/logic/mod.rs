//! Logic modules: turn validated choices into concrete part attributes.
//!
//! # Modules
//!
//! - `resolver`: recomputes selected/count/scale per part from its effects

pub mod resolver;
