//! Choice expressions
//!
//! A closed boolean language over choice variables, used for choice-value
//! preconditions and effect conditions.
//!
//! # Grammar
//!
//! | Form                  | Meaning |
//! |-----------------------|---------|
//! | `True`, `False`       | boolean literal |
//! | `'V6'`, `"V6"`        | identifier literal |
//! | `NevermoreModel`      | variable reference |
//! | `a == b`, `a != b`    | identifier (or set) equality |
//! | `Filter in Options`, `'Filter' in Options` | set membership |
//! | `Options contains Filter` | set membership, reversed |
//! | `not e`, `e and e`, `e or e`, `( e )` | boolean connectives |
//!
//! The left side of `in` (right side of `contains`) is always an identifier
//! literal, quoted or bare; only the set side names a variable.
//!
//! Text outside this grammar is rejected with a [`ParseError`]; nothing is
//! ever handed to a general-purpose evaluator.

mod parser;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::answers::{Answer, AnswerSet};

/// Expression text that does not belong to the grammar
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid choice expression `{text}`: {message}")]
pub struct ParseError {
    /// The rejected expression text
    pub text: String,
    /// What went wrong, with a position when one is known
    pub message: String,
}

/// Errors raised while evaluating a parsed expression
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The expression references a variable that has no answer
    #[error("variable '{0}' is not defined in the answer set")]
    UndefinedVariable(String),
}

/// Leaf of a comparison or membership test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Quoted identifier, e.g. `'V6'`
    Literal(String),
    /// Reference to a choice variable
    Variable(String),
}

/// Abstract syntax tree of a choice expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Bool(bool),
    Eq(Operand, Operand),
    Ne(Operand, Operand),
    /// `element in set` (also produced by `set contains element`)
    In { element: String, set: String },
    Not(Box<Node>),
    And(Vec<Node>),
    Or(Vec<Node>),
}

/// A parsed, immutable choice expression
///
/// Keeps its source text so it can be written back out verbatim and
/// re-validated from scratch on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Parse expression text, rejecting anything outside the grammar
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let root = parser::parse(text)?;
        Ok(Self {
            source: text.to_string(),
            root,
        })
    }

    /// The literal source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed tree
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Every variable name referenced anywhere in the expression
    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        collect_variables(&self.root, &mut vars);
        vars
    }

    /// Evaluate against an answer set.
    ///
    /// Both sides of `and`/`or` are always evaluated, so a reference to an
    /// unanswered variable is reported even when the other side already
    /// decides the result.
    pub fn evaluate(&self, answers: &AnswerSet) -> Result<bool, EvalError> {
        eval_node(&self.root, answers)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Expression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Expression {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let root = parser::parse(&value)?;
        Ok(Self {
            source: value,
            root,
        })
    }
}

impl From<Expression> for String {
    fn from(expr: Expression) -> Self {
        expr.source
    }
}

fn collect_operand(op: &Operand, vars: &mut BTreeSet<String>) {
    if let Operand::Variable(name) = op {
        vars.insert(name.clone());
    }
}

fn collect_variables(node: &Node, vars: &mut BTreeSet<String>) {
    match node {
        Node::Bool(_) => {}
        Node::Eq(lhs, rhs) | Node::Ne(lhs, rhs) => {
            collect_operand(lhs, vars);
            collect_operand(rhs, vars);
        }
        Node::In { set, .. } => {
            vars.insert(set.clone());
        }
        Node::Not(inner) => collect_variables(inner, vars),
        Node::And(nodes) | Node::Or(nodes) => {
            for n in nodes {
                collect_variables(n, vars);
            }
        }
    }
}

/// Operand value during evaluation
#[derive(Debug, PartialEq, Eq)]
enum Value<'a> {
    Scalar(&'a str),
    Set(&'a BTreeSet<String>),
}

fn lookup<'a>(name: &str, answers: &'a AnswerSet) -> Result<&'a Answer, EvalError> {
    answers
        .get(name)
        .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
}

fn operand_value<'a>(op: &'a Operand, answers: &'a AnswerSet) -> Result<Value<'a>, EvalError> {
    match op {
        Operand::Literal(s) => Ok(Value::Scalar(s)),
        Operand::Variable(name) => Ok(match lookup(name, answers)? {
            Answer::Single(s) => Value::Scalar(s),
            Answer::Multi(set) => Value::Set(set),
        }),
    }
}

fn eval_node(node: &Node, answers: &AnswerSet) -> Result<bool, EvalError> {
    match node {
        Node::Bool(b) => Ok(*b),
        Node::Eq(lhs, rhs) => Ok(operand_value(lhs, answers)? == operand_value(rhs, answers)?),
        Node::Ne(lhs, rhs) => Ok(operand_value(lhs, answers)? != operand_value(rhs, answers)?),
        Node::In { element, set } => Ok(lookup(set, answers)?.contains(element)),
        Node::Not(inner) => Ok(!eval_node(inner, answers)?),
        Node::And(nodes) => {
            let mut result = true;
            for n in nodes {
                result &= eval_node(n, answers)?;
            }
            Ok(result)
        }
        Node::Or(nodes) => {
            let mut result = false;
            for n in nodes {
                result |= eval_node(n, answers)?;
            }
            Ok(result)
        }
    }
}
