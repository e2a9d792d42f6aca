//! Choice catalog
//!
//! The set of choices a project offers, the dependency graph between them, and
//! validation of submitted answers.
//!
//! # Dependency graph
//!
//! Choice A depends on choice B when a precondition on one of A's values
//! references B's variable. A precondition that references its own choice is
//! not an edge: it is checked against an answer set that already holds the
//! current choice's answer.
//!
//! The graph is stored as an arena (`choices`) with index-based edges and must
//! be acyclic. Cycles are rejected when the catalog is built, never during
//! validation.
//!
//! # Validation
//!
//! 1. Every submitted variable must be declared (`UnknownVariable`)
//! 2. Every submitted value must be declared for that choice (`UnknownValue`)
//! 3. Answers are admitted in topological order, each one visible to later
//!    precondition checks
//! 4. Each selected value with a precondition must evaluate to true against
//!    the answers admitted so far (`PreconditionFailed`)
//!
//! Validation is all-or-nothing: an [`AnswerSet`] is only returned when every
//! check passes.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::answers::{Answer, AnswerSet, RawAnswerMap};
use crate::choices::{Choice, ChoiceValue};

/// Authoring errors found while building a catalog
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("variable '{varname}' is declared by more than one choice")]
    DuplicateVariable { varname: String },

    #[error("choice '{varname}' declares value '{value_id}' more than once")]
    DuplicateValue { varname: String, value_id: String },

    #[error(
        "precondition on '{varname}' value '{value_id}' references undeclared variable '{referenced}'"
    )]
    UndeclaredVariable {
        varname: String,
        value_id: String,
        referenced: String,
    },

    #[error("choices depend on each other in a cycle: {}", varnames.join(", "))]
    CyclicDependency { varnames: Vec<String> },
}

/// Reasons a submitted answer map is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no choice declares variable '{varname}'")]
    UnknownVariable { varname: String },

    #[error("'{value}' is not a value of choice '{varname}'")]
    UnknownValue { varname: String, value: String },

    #[error("choice '{varname}' takes exactly one value")]
    NotSingleValued { varname: String },

    #[error("value '{value_id}' of '{varname}' is not available: {precondition} does not hold")]
    PreconditionFailed {
        varname: String,
        value_id: String,
        precondition: String,
    },
}

/// Ordered collection of choices with a checked, acyclic dependency graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Choice>", into = "Vec<Choice>")]
pub struct Catalog {
    choices: Vec<Choice>,
    index: HashMap<String, usize>,
    /// `dependents[b]` lists every choice whose preconditions read `b`
    dependents: Vec<BTreeSet<usize>>,
    order: Vec<usize>,
}

impl Catalog {
    /// Build a catalog, checking names, references and the dependency graph
    pub fn new(choices: Vec<Choice>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(choices.len());
        for (i, choice) in choices.iter().enumerate() {
            if index.insert(choice.varname().to_string(), i).is_some() {
                return Err(CatalogError::DuplicateVariable {
                    varname: choice.varname().to_string(),
                });
            }

            let mut seen = BTreeSet::new();
            for value in choice.values() {
                if !seen.insert(value.value_id.as_str()) {
                    return Err(CatalogError::DuplicateValue {
                        varname: choice.varname().to_string(),
                        value_id: value.value_id.clone(),
                    });
                }
            }
        }

        let mut dependents = vec![BTreeSet::new(); choices.len()];
        let mut in_degree = vec![0usize; choices.len()];
        for (i, choice) in choices.iter().enumerate() {
            let mut dependencies = BTreeSet::new();
            for value in choice.values() {
                let Some(precondition) = &value.precondition else {
                    continue;
                };
                for referenced in precondition.free_variables() {
                    let Some(&dep) = index.get(&referenced) else {
                        return Err(CatalogError::UndeclaredVariable {
                            varname: choice.varname().to_string(),
                            value_id: value.value_id.clone(),
                            referenced,
                        });
                    };
                    if dep != i {
                        dependencies.insert(dep);
                    }
                }
            }
            in_degree[i] = dependencies.len();
            for dep in dependencies {
                dependents[dep].insert(i);
            }
        }

        let order = topological_sort(&choices, &dependents, in_degree)?;
        debug!(choices = choices.len(), "choice catalog built");

        Ok(Self {
            choices,
            index,
            dependents,
            order,
        })
    }

    /// Choices in declaration order
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn get(&self, varname: &str) -> Option<&Choice> {
        self.index.get(varname).map(|&i| &self.choices[i])
    }

    /// Choices ordered so that every choice follows the choices its
    /// preconditions read. Ties keep declaration order.
    pub fn topological_order(&self) -> Vec<&Choice> {
        self.order.iter().map(|&i| &self.choices[i]).collect()
    }

    /// Variables whose preconditions read `varname`
    pub fn dependents_of(&self, varname: &str) -> Vec<&str> {
        self.index
            .get(varname)
            .map(|&i| {
                self.dependents[i]
                    .iter()
                    .map(|&d| self.choices[d].varname())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every value identifier declared for `varname`, in declaration order
    pub fn legal_values(&self, varname: &str) -> Option<Vec<&str>> {
        self.get(varname)
            .map(|choice| choice.values().into_iter().map(|v| v.value_id.as_str()).collect())
    }

    /// Values of `varname` whose precondition holds against `answers`.
    ///
    /// A precondition that cannot be evaluated (for instance because it reads
    /// a variable that has not been answered yet) counts as not holding.
    pub fn available_values(&self, varname: &str, answers: &AnswerSet) -> Option<Vec<&str>> {
        self.get(varname).map(|choice| {
            choice
                .values()
                .into_iter()
                .filter(|v| precondition_holds(v, answers))
                .map(|v| v.value_id.as_str())
                .collect()
        })
    }

    /// Validate a raw answer map, producing an [`AnswerSet`]
    pub fn validate(&self, raw: &RawAnswerMap) -> Result<AnswerSet, ValidationError> {
        let mut normalized: HashMap<usize, Answer> = HashMap::with_capacity(raw.len());

        for (varname, raw_answer) in raw {
            let &i = self
                .index
                .get(varname)
                .ok_or_else(|| ValidationError::UnknownVariable {
                    varname: varname.clone(),
                })?;
            let choice = &self.choices[i];

            let members = raw_answer.members();
            for member in &members {
                if choice.find_value(member).is_none() {
                    return Err(ValidationError::UnknownValue {
                        varname: varname.clone(),
                        value: member.to_string(),
                    });
                }
            }

            let answer = if choice.is_single_valued() {
                match members.as_slice() {
                    [only] => Answer::single(*only),
                    _ => {
                        return Err(ValidationError::NotSingleValued {
                            varname: varname.clone(),
                        });
                    }
                }
            } else {
                Answer::multi(members)
            };
            normalized.insert(i, answer);
        }

        let mut answers = AnswerSet::new();
        for &i in &self.order {
            let Some(answer) = normalized.remove(&i) else {
                continue;
            };
            let choice = &self.choices[i];
            answers.insert(choice.varname(), answer.clone());

            for value in choice.values() {
                if !answer.contains(&value.value_id) {
                    continue;
                }
                if let Some(precondition) = &value.precondition {
                    if !precondition_holds(value, &answers) {
                        return Err(ValidationError::PreconditionFailed {
                            varname: choice.varname().to_string(),
                            value_id: value.value_id.clone(),
                            precondition: precondition.to_string(),
                        });
                    }
                }
            }
            debug!(varname = choice.varname(), answer = ?answer, "answer accepted");
        }

        info!(answers = answers.len(), "answers validated");
        Ok(answers)
    }
}

impl TryFrom<Vec<Choice>> for Catalog {
    type Error = CatalogError;

    fn try_from(choices: Vec<Choice>) -> Result<Self, Self::Error> {
        Self::new(choices)
    }
}

impl From<Catalog> for Vec<Choice> {
    fn from(catalog: Catalog) -> Self {
        catalog.choices
    }
}

fn precondition_holds(value: &ChoiceValue, answers: &AnswerSet) -> bool {
    match &value.precondition {
        None => true,
        Some(expr) => match expr.evaluate(answers) {
            Ok(holds) => holds,
            Err(e) => {
                debug!(value_id = %value.value_id, error = %e, "precondition not evaluable");
                false
            }
        },
    }
}

/// Kahn's algorithm. The ready set is ordered by declaration index, so among
/// choices with no pending dependency the earliest declared goes first.
fn topological_sort(
    choices: &[Choice],
    dependents: &[BTreeSet<usize>],
    mut in_degree: Vec<usize>,
) -> Result<Vec<usize>, CatalogError> {
    let mut ready: BTreeSet<usize> = (0..choices.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(choices.len());

    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &d in &dependents[i] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                ready.insert(d);
            }
        }
    }

    if order.len() == choices.len() {
        return Ok(order);
    }

    // Whatever is left sits on a cycle or downstream of one. Peel off the
    // downstream part so the error names only the choices that loop.
    let mut remaining: BTreeSet<usize> = (0..choices.len()).filter(|&i| in_degree[i] > 0).collect();
    loop {
        let leaves: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&i| dependents[i].iter().all(|d| !remaining.contains(d)))
            .collect();
        if leaves.is_empty() {
            break;
        }
        for leaf in leaves {
            remaining.remove(&leaf);
        }
    }

    Err(CatalogError::CyclicDependency {
        varnames: remaining
            .into_iter()
            .map(|i| choices[i].varname().to_string())
            .collect(),
    })
}
