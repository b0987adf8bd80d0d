//! LP format parser
//!
//! Recursive descent over the token stream: objective sense, objective,
//! `subject to`, `bounds`, `binary`, `general`, `end`. Section keywords are
//! contextual identifiers and matched case-insensitively here. Errors carry
//! the 1-based line and column of the offending token.

use logos::Logos;
use rustc_hash::FxHashMap;
use std::ops::Range;
use thiserror::Error;
use tracing::debug;

use medius_core::{
    Constraint, FunctionElement, ObjectiveElement, ObjectiveSense, RawProblem, VariableType,
    VariableValue,
};

use crate::lexer::Token;

/// What went wrong while reading an LP file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// Input ended inside a section.
    #[error("end of file")]
    EndOfFile,
    /// A character outside the format's alphabet.
    #[error("unknown token")]
    UnknownToken,
    /// A variable was re-declared with a different type.
    #[error("already defined")]
    AlreadyDefined,
    /// Trailing garbage or missing `end`.
    #[error("incomplete")]
    Incomplete,
    /// A name was expected.
    #[error("bad name")]
    BadName,
    /// A relational operator was expected.
    #[error("bad operator")]
    BadOperator,
    /// An integer was expected or out of range.
    #[error("bad integer")]
    BadInteger,
    /// Neither `minimize` nor `maximize`.
    #[error("bad objective function type")]
    BadObjectiveFunctionType,
    /// A malformed bound line.
    #[error("bad bound")]
    BadBound,
    /// A malformed `factor * variable` term.
    #[error("bad function element")]
    BadFunctionElement,
    /// A malformed constraint line.
    #[error("bad constraint")]
    BadConstraint,
    /// More variables than the engine's index type can address.
    #[error("too many variables")]
    TooManyVariables,
}

/// A file-format failure with its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} at line {line}, column {column}")]
pub struct ParseError {
    /// Failure classification.
    pub kind: ParseErrorKind,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
}

/// Relational operator of a constraint or bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equal,
    Greater,
    Less,
}

/// Parse LP text into a raw problem.
///
/// # Errors
///
/// A [`ParseError`] with the §file-format taxonomy and the position of the
/// offending token.
pub fn parse(input: &str) -> Result<RawProblem, ParseError> {
    Parser::new(input)?.run()
}

struct Parser<'a> {
    tokens: Vec<(Token<'a>, Range<usize>)>,
    pos: usize,
    line_starts: Vec<usize>,
    input_len: usize,
    cache: FxHashMap<&'a str, u32>,
    problem: RawProblem,
    constraint_id: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, ParseError> {
        let mut line_starts = vec![0];
        for (i, b) in input.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }

        let mut tokens = Vec::new();
        for (token, span) in Token::lexer(input).spanned() {
            match token {
                Ok(token) => tokens.push((token, span)),
                Err(()) => {
                    return Err(error_at(&line_starts, span.start, ParseErrorKind::UnknownToken))
                }
            }
        }

        Ok(Parser {
            tokens,
            pos: 0,
            line_starts,
            input_len: input.len(),
            cache: FxHashMap::default(),
            problem: RawProblem::default(),
            constraint_id: 0,
        })
    }

    fn run(mut self) -> Result<RawProblem, ParseError> {
        self.problem.sense = self.read_objective_sense()?;
        self.read_objective()?;

        if self.consume_subject_to() {
            self.read_constraints()?;
        }

        if self.consume_keyword(&["bounds", "bound"]) {
            self.read_bounds()?;
        }

        if self.consume_keyword(&["binary", "binaries"]) {
            self.read_binary()?;
        }

        if self.consume_keyword(&["general"]) {
            self.read_general()?;
        }

        if !self.consume_keyword(&["end"]) || self.pos != self.tokens.len() {
            return Err(self.error_here(ParseErrorKind::Incomplete));
        }

        debug!(
            variables = self.problem.vars.len(),
            constraints = self.problem.nb_constraints(),
            "problem parsed"
        );

        Ok(self.problem)
    }

    // ------------------------------------------------------------------
    // Token plumbing

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).map(|(t, _)| *t)
    }

    fn peek_at(&self, offset: usize) -> Option<Token<'a>> {
        self.tokens.get(self.pos + offset).map(|(t, _)| *t)
    }

    fn error_here(&self, kind: ParseErrorKind) -> ParseError {
        let offset = self
            .tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.input_len);
        error_at(&self.line_starts, offset, kind)
    }

    /// True when the next tokens open a new section.
    fn at_section(&self) -> bool {
        match self.peek() {
            Some(Token::Name(name)) => {
                let section = [
                    "st", "bound", "bounds", "binary", "binaries", "general", "end",
                ];
                if section.iter().any(|k| name.eq_ignore_ascii_case(k)) {
                    return true;
                }
                name.eq_ignore_ascii_case("subject")
                    && matches!(self.peek_at(1), Some(Token::Name(to)) if to.eq_ignore_ascii_case("to"))
            }
            _ => false,
        }
    }

    /// Consume one of `keywords` (case-insensitively), returning whether it
    /// was present.
    fn consume_keyword(&mut self, keywords: &[&str]) -> bool {
        if let Some(Token::Name(name)) = self.peek() {
            if keywords.iter().any(|k| name.eq_ignore_ascii_case(k)) {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    /// Consume `st`, `st:`, `subject to`, `subject to:` or `subject to :`.
    fn consume_subject_to(&mut self) -> bool {
        if self.consume_keyword(&["st"]) {
            self.consume_colon();
            return true;
        }
        if let Some(Token::Name(name)) = self.peek() {
            if name.eq_ignore_ascii_case("subject")
                && matches!(self.peek_at(1), Some(Token::Name(to)) if to.eq_ignore_ascii_case("to"))
            {
                self.pos += 2;
                self.consume_colon();
                return true;
            }
        }
        false
    }

    fn consume_colon(&mut self) -> bool {
        if matches!(self.peek(), Some(Token::Colon)) {
            self.pos += 1;
            return true;
        }
        false
    }

    // ------------------------------------------------------------------
    // Shared readers

    fn get_variable(&mut self, name: &'a str) -> Result<u32, ParseError> {
        if let Some(&id) = self.cache.get(name) {
            return Ok(id);
        }
        if self.problem.vars.len() >= i32::MAX as usize {
            return Err(self.error_here(ParseErrorKind::TooManyVariables));
        }
        let id = self.problem.vars.len() as u32;
        self.problem.vars.names.push(name.to_string());
        self.problem.vars.values.push(VariableValue::default());
        self.cache.insert(name, id);
        Ok(id)
    }

    fn read_name(&mut self) -> Result<&'a str, ParseError> {
        match self.peek() {
            Some(Token::Name(name)) => {
                self.pos += 1;
                Ok(name)
            }
            Some(_) => Err(self.error_here(ParseErrorKind::BadName)),
            None => Err(self.error_here(ParseErrorKind::EndOfFile)),
        }
    }

    fn read_operator(&mut self) -> Result<Operator, ParseError> {
        match self.peek() {
            Some(Token::Less) => {
                self.pos += 1;
                Ok(Operator::Less)
            }
            Some(Token::Greater) => {
                self.pos += 1;
                Ok(Operator::Greater)
            }
            Some(Token::Equal) => {
                self.pos += 1;
                Ok(Operator::Equal)
            }
            Some(_) => Err(self.error_here(ParseErrorKind::BadOperator)),
            None => Err(self.error_here(ParseErrorKind::EndOfFile)),
        }
    }

    fn read_integer(&mut self) -> Result<i32, ParseError> {
        let negative = match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                true
            }
            Some(Token::Plus) => {
                self.pos += 1;
                false
            }
            _ => false,
        };

        match self.peek() {
            Some(Token::Integer(text)) => {
                let value: i64 = text
                    .parse()
                    .map_err(|_| self.error_here(ParseErrorKind::BadInteger))?;
                let value = if negative { -value } else { value };
                let value =
                    i32::try_from(value).map_err(|_| self.error_here(ParseErrorKind::BadInteger))?;
                self.pos += 1;
                Ok(value)
            }
            Some(_) => Err(self.error_here(ParseErrorKind::BadInteger)),
            None => Err(self.error_here(ParseErrorKind::EndOfFile)),
        }
    }

    /// Read an optional sign, then return its factor.
    fn read_sign(&mut self) -> f64 {
        match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                1.0
            }
            Some(Token::Minus) => {
                self.pos += 1;
                -1.0
            }
            _ => 1.0,
        }
    }

    // ------------------------------------------------------------------
    // Objective

    fn read_objective_sense(&mut self) -> Result<ObjectiveSense, ParseError> {
        match self.peek() {
            Some(Token::Name(name)) if name.eq_ignore_ascii_case("minimize") => {
                self.pos += 1;
                Ok(ObjectiveSense::Minimize)
            }
            Some(Token::Name(name)) if name.eq_ignore_ascii_case("maximize") => {
                self.pos += 1;
                Ok(ObjectiveSense::Maximize)
            }
            _ => Err(self.error_here(ParseErrorKind::BadObjectiveFunctionType)),
        }
    }

    fn read_objective(&mut self) -> Result<(), ParseError> {
        // Skip the `obj:` label CPLEX emits.
        if matches!(self.peek(), Some(Token::Name(_)))
            && matches!(self.peek_at(1), Some(Token::Colon))
            && !self.at_section()
        {
            self.pos += 2;
        }

        while self.pos != self.tokens.len() && !self.at_section() {
            let sign = self.read_sign();

            let mut factor = match self.peek() {
                Some(Token::Integer(text)) | Some(Token::Double(text)) => {
                    self.pos += 1;
                    let value: f64 = text
                        .parse()
                        .map_err(|_| self.error_here(ParseErrorKind::BadInteger))?;
                    Some(value)
                }
                _ => None,
            };

            let name = match self.peek() {
                Some(Token::Name(_)) if !self.at_section() => Some(self.read_name()?),
                _ => None,
            };

            if factor.is_none() && name.is_none() {
                return Err(self.error_here(ParseErrorKind::BadFunctionElement));
            }
            let value = sign * factor.take().unwrap_or(1.0);

            match name {
                Some(name) => {
                    let variable = self.get_variable(name)?;
                    self.problem.objective.elements.push(ObjectiveElement {
                        factor: value,
                        variable,
                    });
                }
                None => self.problem.objective.constant += value,
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Constraints

    fn read_constraints(&mut self) -> Result<(), ParseError> {
        while self.pos != self.tokens.len() && !self.at_section() {
            self.read_constraint()?;
        }
        Ok(())
    }

    fn read_constraint(&mut self) -> Result<(), ParseError> {
        let label = if matches!(self.peek(), Some(Token::Name(_)))
            && matches!(self.peek_at(1), Some(Token::Colon))
        {
            let name = self.read_name()?;
            self.pos += 1; // colon
            name.to_string()
        } else {
            String::new()
        };

        let mut elements = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Less | Token::Greater | Token::Equal) => break,
                None => return Err(self.error_here(ParseErrorKind::EndOfFile)),
                _ if self.at_section() => {
                    return Err(self.error_here(ParseErrorKind::BadConstraint))
                }
                _ => elements.push(self.read_function_element()?),
            }
        }

        if elements.is_empty() {
            return Err(self.error_here(ParseErrorKind::BadConstraint));
        }

        let operator = self.read_operator()?;
        let value = self.read_integer()?;

        let id = self.constraint_id;
        self.constraint_id += 1;
        let constraint = Constraint {
            label: if label.is_empty() {
                format!("ct{id}")
            } else {
                label
            },
            id,
            elements,
            value,
        };

        match operator {
            Operator::Equal => self.problem.equal_constraints.push(constraint),
            Operator::Greater => self.problem.greater_constraints.push(constraint),
            Operator::Less => self.problem.less_constraints.push(constraint),
        }

        Ok(())
    }

    fn read_function_element(&mut self) -> Result<FunctionElement, ParseError> {
        let negative = match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                true
            }
            Some(Token::Plus) => {
                self.pos += 1;
                false
            }
            _ => false,
        };

        let factor = match self.peek() {
            Some(Token::Integer(text)) => {
                self.pos += 1;
                let value: i64 = text
                    .parse()
                    .map_err(|_| self.error_here(ParseErrorKind::BadInteger))?;
                i32::try_from(value).map_err(|_| self.error_here(ParseErrorKind::BadInteger))?
            }
            _ => 1,
        };
        let factor = if negative { -factor } else { factor };

        match self.peek() {
            Some(Token::Name(_)) if !self.at_section() => {
                let name = self.read_name()?;
                let variable = self.get_variable(name)?;
                Ok(FunctionElement { factor, variable })
            }
            _ => Err(self.error_here(ParseErrorKind::BadFunctionElement)),
        }
    }

    // ------------------------------------------------------------------
    // Bounds and variable sections

    fn read_bounds(&mut self) -> Result<(), ParseError> {
        while self.pos != self.tokens.len() && !self.at_section() {
            self.read_bound()?;
        }
        Ok(())
    }

    fn read_bound(&mut self) -> Result<(), ParseError> {
        let starts_with_value = matches!(
            self.peek(),
            Some(Token::Integer(_)) | Some(Token::Minus) | Some(Token::Plus)
        );

        if starts_with_value {
            // value op var [op value]
            let first = self.read_integer()?;
            let op_first = self.read_operator()?;
            let name = self.read_name()?;
            let id = self.get_variable(name)? as usize;

            let value = &mut self.problem.vars.values[id];
            match op_first {
                Operator::Greater => value.max = first,
                Operator::Less => value.min = first,
                Operator::Equal => {
                    value.min = first;
                    value.max = first;
                }
            }

            if matches!(
                self.peek(),
                Some(Token::Less | Token::Greater | Token::Equal)
            ) {
                let op_second = self.read_operator()?;
                let second = self.read_integer()?;
                let value = &mut self.problem.vars.values[id];
                match op_second {
                    Operator::Greater => value.min = second,
                    Operator::Less => value.max = second,
                    Operator::Equal => {
                        value.min = second;
                        value.max = second;
                    }
                }
            }
        } else {
            // var op value
            let name = self.read_name()?;
            let id = self.get_variable(name)? as usize;
            let op = self.read_operator()?;
            let bound = self.read_integer()?;

            let value = &mut self.problem.vars.values[id];
            match op {
                Operator::Greater => value.min = bound,
                Operator::Less => value.max = bound,
                Operator::Equal => {
                    value.min = bound;
                    value.max = bound;
                }
            }
        }

        Ok(())
    }

    fn read_binary(&mut self) -> Result<(), ParseError> {
        while self.pos != self.tokens.len() && !self.at_section() {
            let name = self.read_name()?;
            match self.cache.get(name) {
                None => return Err(self.error_here(ParseErrorKind::UnknownToken)),
                Some(&id) => {
                    let value = &mut self.problem.vars.values[id as usize];
                    if value.kind != VariableType::Real {
                        return Err(self.error_here(ParseErrorKind::AlreadyDefined));
                    }
                    *value = VariableValue {
                        min: 0,
                        max: 1,
                        kind: VariableType::Binary,
                    };
                }
            }
        }
        Ok(())
    }

    fn read_general(&mut self) -> Result<(), ParseError> {
        while self.pos != self.tokens.len() && !self.at_section() {
            let name = self.read_name()?;
            match self.cache.get(name) {
                None => return Err(self.error_here(ParseErrorKind::UnknownToken)),
                Some(&id) => {
                    let value = &mut self.problem.vars.values[id as usize];
                    if value.kind != VariableType::Real {
                        return Err(self.error_here(ParseErrorKind::AlreadyDefined));
                    }
                    value.kind = VariableType::General;
                }
            }
        }
        Ok(())
    }
}

fn error_at(line_starts: &[usize], offset: usize, kind: ParseErrorKind) -> ParseError {
    let line = line_starts.partition_point(|&start| start <= offset);
    let column = offset - line_starts[line - 1] + 1;
    ParseError { kind, line, column }
}
