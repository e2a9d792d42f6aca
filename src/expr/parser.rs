//! PEG front end: turns expression text into a [`Node`] tree.

use pest::Parser as _;
use pest::error::LineColLocation;
use pest::iterators::{Pair, Pairs};
use pest_derive::Parser;

use super::{Node, Operand, ParseError};

#[derive(Parser)]
#[grammar = "expr/grammar.pest"]
struct ExprParser;

pub(super) fn parse(text: &str) -> Result<Node, ParseError> {
    let mut pairs = ExprParser::parse(Rule::expression, text).map_err(|e| {
        let (line, col) = match e.line_col {
            LineColLocation::Pos(pos) | LineColLocation::Span(pos, _) => pos,
        };
        ParseError {
            text: text.to_string(),
            message: format!("{} at line {}, column {}", e.variant.message(), line, col),
        }
    })?;

    let builder = Builder { text };
    let expression = builder.next(&mut pairs)?;
    let mut inner = expression.into_inner();
    builder.disjunction(builder.next(&mut inner)?)
}

/// Walks the pest parse tree. Structural surprises surface as a
/// `ParseError` instead of a panic.
struct Builder<'t> {
    text: &'t str,
}

impl<'t> Builder<'t> {
    fn malformed(&self, what: &str) -> ParseError {
        ParseError {
            text: self.text.to_string(),
            message: format!("malformed parse tree: {what}"),
        }
    }

    fn next<'i>(&self, pairs: &mut Pairs<'i, Rule>) -> Result<Pair<'i, Rule>, ParseError> {
        pairs.next().ok_or_else(|| self.malformed("missing node"))
    }

    fn disjunction(&self, pair: Pair<'_, Rule>) -> Result<Node, ParseError> {
        let mut terms = pair
            .into_inner()
            .filter(|p| p.as_rule() != Rule::kw_or)
            .map(|p| self.conjunction(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Node::Or(terms)
        })
    }

    fn conjunction(&self, pair: Pair<'_, Rule>) -> Result<Node, ParseError> {
        let mut terms = pair
            .into_inner()
            .filter(|p| p.as_rule() != Rule::kw_and)
            .map(|p| self.negation(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Node::And(terms)
        })
    }

    fn negation(&self, pair: Pair<'_, Rule>) -> Result<Node, ParseError> {
        let mut inner = pair.into_inner();
        let first = self.next(&mut inner)?;
        match first.as_rule() {
            Rule::kw_not => {
                let operand = self.next(&mut inner)?;
                Ok(Node::Not(Box::new(self.negation(operand)?)))
            }
            _ => self.primary(first),
        }
    }

    fn primary(&self, pair: Pair<'_, Rule>) -> Result<Node, ParseError> {
        match pair.as_rule() {
            Rule::disjunction => self.disjunction(pair),
            Rule::boolean => {
                let literal = self.next(&mut pair.into_inner())?;
                Ok(Node::Bool(literal.as_rule() == Rule::kw_true))
            }
            Rule::comparison => {
                let mut inner = pair.into_inner();
                let lhs = self.operand(self.next(&mut inner)?)?;
                let op = self.next(&mut inner)?;
                let rhs = self.operand(self.next(&mut inner)?)?;
                match op.as_rule() {
                    Rule::eq => Ok(Node::Eq(lhs, rhs)),
                    Rule::ne => Ok(Node::Ne(lhs, rhs)),
                    _ => Err(self.malformed("comparison operator")),
                }
            }
            Rule::membership => {
                let mut inner = pair.into_inner();
                let element = self.element(self.next(&mut inner)?)?;
                let _in = self.next(&mut inner)?;
                let set = self.next(&mut inner)?.as_str().to_string();
                Ok(Node::In { element, set })
            }
            Rule::containment => {
                let mut inner = pair.into_inner();
                let set = self.next(&mut inner)?.as_str().to_string();
                let _contains = self.next(&mut inner)?;
                let element = self.element(self.next(&mut inner)?)?;
                Ok(Node::In { element, set })
            }
            rule => Err(self.malformed(&format!("unexpected {rule:?}"))),
        }
    }

    fn operand(&self, pair: Pair<'_, Rule>) -> Result<Operand, ParseError> {
        match pair.as_rule() {
            Rule::variable => Ok(Operand::Variable(pair.as_str().to_string())),
            Rule::string => Ok(Operand::Literal(self.quoted(pair)?)),
            rule => Err(self.malformed(&format!("unexpected operand {rule:?}"))),
        }
    }

    /// Identifier tested by `in`/`contains`; never a variable
    fn element(&self, pair: Pair<'_, Rule>) -> Result<String, ParseError> {
        match pair.as_rule() {
            Rule::bare_id => Ok(pair.as_str().to_string()),
            Rule::string => self.quoted(pair),
            rule => Err(self.malformed(&format!("unexpected element {rule:?}"))),
        }
    }

    fn quoted(&self, pair: Pair<'_, Rule>) -> Result<String, ParseError> {
        let body = self.next(&mut pair.into_inner())?;
        Ok(body.as_str().to_string())
    }
}
