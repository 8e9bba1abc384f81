//! Evaluation of thinc programs against a canvas.
//!
//! A program is scoped to a single block. Evaluation walks the statements in
//! order, collecting routed writes as side effects; the writes are applied
//! to the canvas atomically only after the whole program evaluated without
//! error.

use std::collections::HashMap;

use chumsky::input::Stream;
use chumsky::prelude::Parser as _;
use thiserror::Error;

use crate::canvas::{BlockKind, Canvas, RouteError, RoutedWrite};
use crate::diagnostics::render_errors;
use crate::parser::{
    Arm, ArithmeticOperator, Comparator, Expression, Input as _, Literal, Pattern, Span, Spanned,
    Statement, TextPart, Token, lexer, parser,
};
use crate::value::Value;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("source failed to parse ({} error{})", reports.len(), if reports.len() == 1 { "" } else { "s" })]
    Parse { reports: Vec<String> },
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("unknown variable '{name}'")]
    UnknownVariable { name: String },
    #[error("variable '{name}' is already bound")]
    AlreadyBound { name: String },
    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("no WHEN arm matched value {value}")]
    NoArmMatched { value: String },
    #[error("the right side of |> has to be WHEN")]
    InvalidPipe,
    #[error("WHEN requires a piped input")]
    WhenWithoutInput,
    #[error("block '{name}' is not a thinc code block")]
    NotThincCode { name: String },
    #[error("unknown block '{name}'")]
    UnknownBlock { name: String },
}

/// Result of a successful run: the program value plus the writes that were
/// routed to other blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub result: Value,
    pub writes: Vec<RoutedWrite>,
}

/// Lex and parse a program, rendering any errors as ariadne reports.
pub fn parse<'code>(
    filename: &str,
    code: &'code str,
) -> Result<Vec<Spanned<Statement<'code>>>, EngineError> {
    let (tokens, lex_errors) = lexer().parse(code).into_output_errors();
    if !lex_errors.is_empty() {
        return Err(EngineError::Parse {
            reports: render_errors(lex_errors, filename, code),
        });
    }
    let mut tokens = tokens.unwrap_or_default();
    tokens.retain(|(token, _)| !matches!(token, Token::Comment(_)));

    let eoi: Span = (code.len()..code.len()).into();
    let (statements, parse_errors) = parser()
        .parse(Stream::from_iter(tokens).map(eoi, |(t, s): (_, _)| (t, s)))
        .into_output_errors();
    if !parse_errors.is_empty() {
        return Err(EngineError::Parse {
            reports: render_errors(parse_errors, filename, code),
        });
    }
    Ok(statements.unwrap_or_default())
}

/// Evaluate a program and apply its routed writes to the canvas.
pub fn run(canvas: &mut Canvas, filename: &str, code: &str) -> Result<RunOutcome, EngineError> {
    let statements = parse(filename, code)?;
    let outcome = evaluate(&statements)?;
    canvas.apply(&outcome.writes)?;
    Ok(outcome)
}

/// Run the content of a named `code:thinc` block against its canvas.
pub fn run_block(canvas: &mut Canvas, name: &str) -> Result<RunOutcome, EngineError> {
    let handle = canvas
        .resolve(name)
        .ok_or_else(|| EngineError::UnknownBlock { name: name.to_owned() })?;
    let block = canvas.get(handle).expect("resolved handle is valid");
    if block.kind != BlockKind::ThincCode {
        return Err(EngineError::NotThincCode { name: name.to_owned() });
    }
    let code = block.content.clone();
    run(canvas, name, &code)
}

/// Evaluate parsed statements without touching a canvas. Routed writes are
/// returned for the caller to validate and apply.
pub fn evaluate(statements: &[Spanned<Statement<'_>>]) -> Result<RunOutcome, EngineError> {
    let mut evaluator = Evaluator::default();
    let mut result = Value::Unit;
    for statement in statements {
        match &statement.node {
            Statement::Binding { name, value } => {
                let value = evaluator.eval(&value.node)?;
                evaluator.bind(*name, value)?;
            }
            Statement::Route { target, port, value } => {
                let value = evaluator.eval(&value.node)?;
                evaluator.writes.push(RoutedWrite {
                    target: (*target).to_owned(),
                    port: (*port).to_owned(),
                    value,
                });
            }
            Statement::Expression(expression) => {
                result = evaluator.eval(&expression.node)?;
            }
        }
    }
    Ok(RunOutcome { result, writes: evaluator.writes })
}

#[derive(Default)]
struct Evaluator<'code> {
    scope: HashMap<&'code str, Value>,
    writes: Vec<RoutedWrite>,
}

impl<'code> Evaluator<'code> {
    fn bind(&mut self, name: &'code str, value: Value) -> Result<(), EngineError> {
        if self.scope.contains_key(name) {
            return Err(EngineError::AlreadyBound { name: name.to_owned() });
        }
        self.scope.insert(name, value);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Value, EngineError> {
        self.scope
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownVariable { name: name.to_owned() })
    }

    fn eval(&mut self, expression: &Expression<'code>) -> Result<Value, EngineError> {
        match expression {
            Expression::Literal(literal) => Ok(literal_value(literal)),
            Expression::TextLiteral { parts } => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        TextPart::Text(chunk) => text.push_str(chunk),
                        TextPart::Interpolation { var } => {
                            text.push_str(&self.lookup(var)?.to_display_string());
                        }
                    }
                }
                Ok(Value::Text(text))
            }
            Expression::List { items } => {
                let items = items
                    .iter()
                    .map(|item| self.eval(&item.node))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(items))
            }
            Expression::Alias { name } => self.lookup(name),
            Expression::Pipe { from, to } => {
                let input = self.eval(&from.node)?;
                match &to.node {
                    Expression::When { arms } => self.eval_when(input, arms),
                    _ => Err(EngineError::InvalidPipe),
                }
            }
            Expression::When { .. } => Err(EngineError::WhenWithoutInput),
            Expression::Comparator { operator, operand_a, operand_b } => {
                let a = self.eval(&operand_a.node)?;
                let b = self.eval(&operand_b.node)?;
                compare(*operator, a, b)
            }
            Expression::Arithmetic { operator, operand_a, operand_b } => {
                let a = as_number(self.eval(&operand_a.node)?)?;
                let b = as_number(self.eval(&operand_b.node)?)?;
                let result = match operator {
                    ArithmeticOperator::Add => a + b,
                    ArithmeticOperator::Subtract => a - b,
                    ArithmeticOperator::Multiply => a * b,
                    ArithmeticOperator::Divide => {
                        if b == 0.0 {
                            return Err(EngineError::DivisionByZero);
                        }
                        a / b
                    }
                };
                Ok(Value::Number(result))
            }
            Expression::Skip => Ok(Value::Unit),
        }
    }

    fn eval_when(&mut self, input: Value, arms: &[Arm<'code>]) -> Result<Value, EngineError> {
        for arm in arms {
            match &arm.pattern {
                Pattern::Wildcard => return self.eval(&arm.body.node),
                Pattern::Literal(literal) => {
                    if literal_value(literal) == input {
                        return self.eval(&arm.body.node);
                    }
                }
                Pattern::Binding { name } => {
                    // Arm-local binding, removed after the body evaluates.
                    let previous = self.scope.insert(*name, input.clone());
                    let result = self.eval(&arm.body.node);
                    match previous {
                        Some(previous) => {
                            self.scope.insert(name, previous);
                        }
                        None => {
                            self.scope.remove(name);
                        }
                    }
                    return result;
                }
            }
        }
        Err(EngineError::NoArmMatched { value: input.to_display_string() })
    }
}

fn literal_value(literal: &Literal<'_>) -> Value {
    match literal {
        Literal::Number(number) => Value::Number(*number),
        Literal::Text(text) => Value::Text((*text).to_owned()),
        Literal::Tag(tag) => Value::Tag((*tag).to_owned()),
    }
}

fn as_number(value: Value) -> Result<f64, EngineError> {
    match value {
        Value::Number(number) => Ok(number),
        other => Err(EngineError::TypeMismatch {
            expected: "number",
            found: other.kind_name().to_owned(),
        }),
    }
}

fn compare(operator: Comparator, a: Value, b: Value) -> Result<Value, EngineError> {
    let result = match operator {
        Comparator::Equal => a == b,
        Comparator::NotEqual => a != b,
        Comparator::Greater | Comparator::GreaterOrEqual | Comparator::Less
        | Comparator::LessOrEqual => {
            let a = as_number(a)?;
            let b = as_number(b)?;
            match operator {
                Comparator::Greater => a > b,
                Comparator::GreaterOrEqual => a >= b,
                Comparator::Less => a < b,
                Comparator::LessOrEqual => a <= b,
                Comparator::Equal | Comparator::NotEqual => unreachable!(),
            }
        }
    };
    Ok(Value::bool_tag(result))
}
