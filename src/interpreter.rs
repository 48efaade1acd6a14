use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::io::{self, Write};
use std::rc::Rc;

use thiserror::Error;

use crate::ast::{BinaryOp, Expr, ExprKind, Literal, Program, Stmt, StmtKind, UnaryOp};
use crate::scanner::Pos;

/// A fault that aborted an `interpret` call.
///
/// Displays in the two-line form the driver prints verbatim:
/// the message, then `[Line <n>]` for the offending token.
#[derive(Error, Debug)]
#[error("{kind}\n[Line {line}]")]
pub struct RuntimeError {
    pub line: usize,
    pub kind: RuntimeErrorKind,
}

impl RuntimeError {
    fn new(pos: Pos, kind: RuntimeErrorKind) -> RuntimeError {
        RuntimeError {
            line: pos.line,
            kind,
        }
    }
}

#[derive(Error, Debug)]
pub enum RuntimeErrorKind {
    #[error("Operand must be a number.")]
    NumberOperand,
    #[error("Operands must be numbers.")]
    NumberOperands,
    #[error("Operands must be two numbers or two strings.")]
    AddOperands,
    #[error("Undefined variable '{0}'.")]
    UnboundVariable(String),
    #[error("Variable '{0}' is already defined.")]
    Redefinition(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    String(Rc<String>),
    Bool(bool),
    Nil,
}

impl Value {
    /// nil and false are falsy; every other value, including 0 and the empty
    /// string, is truthy.
    fn to_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Nil => false,
            _ => true,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            // `{}` on f64 renders the shortest decimal form and never a
            // trailing `.0`, so 4 prints as 4 while 4.5 prints as 4.5
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => f.write_str("nil"),
        }
    }
}

/// Variable bindings for one interpreter session.
///
/// A single flat scope in this snapshot. It is still an owned struct threaded
/// through evaluation rather than ambient state, so nesting later is a matter
/// of chaining environments behind a parent link.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            values: HashMap::new(),
        }
    }

    /// Insert a new binding. Re-declaring a name already defined in this
    /// environment is a fault, not an overwrite.
    pub fn define(&mut self, name: &str, pos: Pos, value: Value) -> Result<(), RuntimeError> {
        if self.values.contains_key(name) {
            return Err(RuntimeError::new(
                pos,
                RuntimeErrorKind::Redefinition(name.to_string()),
            ));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str, pos: Pos) -> Result<Value, RuntimeError> {
        self.values.get(name).cloned().ok_or_else(|| {
            RuntimeError::new(pos, RuntimeErrorKind::UnboundVariable(name.to_string()))
        })
    }
}

pub struct Interpreter {
    environment: Environment,
}

impl Interpreter {
    pub fn new() -> Interpreter {
        Interpreter {
            environment: Environment::new(),
        }
    }

    /// Execute the statements in order, writing `print` output to `out`.
    ///
    /// The first fault aborts the remaining statements and unwinds out as the
    /// error value, so at most one runtime error surfaces per call. Bindings
    /// made before the fault stay in the environment.
    pub fn interpret<W>(&mut self, program: &Program, out: &mut W) -> Result<(), RuntimeError>
    where
        W: Write,
    {
        for stmt in &program.0 {
            self.execute(stmt, out)?;
        }
        Ok(())
    }

    fn execute<W>(&mut self, stmt: &Stmt, out: &mut W) -> Result<(), RuntimeError>
    where
        W: Write,
    {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
                Ok(())
            }
            StmtKind::Print(expr) => {
                let value = self.eval(expr)?;
                writeln!(out, "{}", value).map_err(|error| RuntimeError::new(stmt.pos, error.into()))
            }
            StmtKind::VarDecl { name, init } => {
                let value = match init {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Nil,
                };
                self.environment.define(name, stmt.pos, value)
            }
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Literal(Literal::Number(f)) => Ok(Value::Number(**f)),
            ExprKind::Literal(Literal::String(s)) => Ok(Value::String(Rc::new(s.clone()))),
            ExprKind::Literal(Literal::Boolean(b)) => Ok(Value::Bool(*b)),
            ExprKind::Literal(Literal::Nil) => Ok(Value::Nil),
            ExprKind::Group(inner) => self.eval(inner),
            ExprKind::Variable { name } => self.environment.get(name, expr.pos),
            ExprKind::Unary { op, expr: operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.to_bool())),
                    UnaryOp::Negative => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(RuntimeError::new(expr.pos, RuntimeErrorKind::NumberOperand)),
                    },
                }
            }
            ExprKind::Binary { left, op, right } => {
                let lhs = self.eval(left)?;
                let rhs = self.eval(right)?;
                eval_binary(expr.pos, op, lhs, rhs)
            }
        }
    }
}

fn eval_binary(pos: Pos, op: &BinaryOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match op {
        // Equality is total: nil equals only nil, cross-type comparisons are
        // false, and it can never raise a type fault
        BinaryOp::Equal => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::NotEqual => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::String(l), Value::String(r)) => {
                let mut joined = l.as_ref().clone();
                joined.push_str(&r);
                Ok(Value::String(Rc::new(joined)))
            }
            // Mixed number/string addition is not coerced
            _ => Err(RuntimeError::new(pos, RuntimeErrorKind::AddOperands)),
        },
        BinaryOp::Subtract => {
            let (l, r) = number_operands(pos, lhs, rhs)?;
            Ok(Value::Number(l - r))
        }
        BinaryOp::Multiply => {
            let (l, r) = number_operands(pos, lhs, rhs)?;
            Ok(Value::Number(l * r))
        }
        BinaryOp::Divide => {
            // No divide-by-zero guard: IEEE semantics yield an infinity or NaN
            let (l, r) = number_operands(pos, lhs, rhs)?;
            Ok(Value::Number(l / r))
        }
        BinaryOp::GreaterThan => {
            let (l, r) = number_operands(pos, lhs, rhs)?;
            Ok(Value::Bool(l > r))
        }
        BinaryOp::GreaterThanEqual => {
            let (l, r) = number_operands(pos, lhs, rhs)?;
            Ok(Value::Bool(l >= r))
        }
        BinaryOp::LessThan => {
            let (l, r) = number_operands(pos, lhs, rhs)?;
            Ok(Value::Bool(l < r))
        }
        BinaryOp::LessThanEqual => {
            let (l, r) = number_operands(pos, lhs, rhs)?;
            Ok(Value::Bool(l <= r))
        }
    }
}

fn number_operands(pos: Pos, lhs: Value, rhs: Value) -> Result<(f64, f64), RuntimeError> {
    match (lhs, rhs) {
        (Value::Number(l), Value::Number(r)) => Ok((l, r)),
        _ => Err(RuntimeError::new(pos, RuntimeErrorKind::NumberOperands)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pos() -> Pos {
        Pos {
            line: 1,
            offset_in_line: 0,
        }
    }

    #[test]
    fn zero_and_empty_string_are_truthy() {
        assert!(Value::Number(0.0).to_bool());
        assert!(Value::String(Rc::new(String::new())).to_bool());
        assert!(!Value::Nil.to_bool());
        assert!(!Value::Bool(false).to_bool());
    }

    #[test]
    fn numbers_stringify_without_a_trailing_zero() {
        assert_eq!("4", Value::Number(4.0).to_string());
        assert_eq!("4.5", Value::Number(4.5).to_string());
        assert_eq!("0.3333333333333333", Value::Number(1.0 / 3.0).to_string());
        assert_eq!("inf", Value::Number(1.0 / 0.0).to_string());
    }

    #[test]
    fn equality_is_total_across_types() {
        let one = Value::Number(1.0);
        let one_text = Value::String(Rc::new("1".to_string()));
        assert_ne!(one, one_text);
        assert_eq!(Value::Nil, Value::Nil);
        assert_ne!(Value::Nil, Value::Bool(false));
        assert_eq!(
            Value::String(Rc::new("a".to_string())),
            Value::String(Rc::new("a".to_string()))
        );
    }

    #[test]
    fn mixed_addition_faults() {
        let error = eval_binary(
            pos(),
            &BinaryOp::Add,
            Value::String(Rc::new("a".to_string())),
            Value::Number(1.0),
        )
        .unwrap_err();
        assert!(matches!(error.kind, RuntimeErrorKind::AddOperands));
        assert_eq!(
            "Operands must be two numbers or two strings.\n[Line 1]",
            error.to_string()
        );
    }

    #[test]
    fn ordering_requires_numbers() {
        let error = eval_binary(
            pos(),
            &BinaryOp::LessThan,
            Value::String(Rc::new("a".to_string())),
            Value::String(Rc::new("b".to_string())),
        )
        .unwrap_err();
        assert!(matches!(error.kind, RuntimeErrorKind::NumberOperands));
    }

    #[test]
    fn division_follows_ieee_semantics() {
        let value = eval_binary(pos(), &BinaryOp::Divide, Value::Number(1.0), Value::Number(0.0))
            .unwrap();
        assert_eq!(Value::Number(f64::INFINITY), value);
    }

    #[test]
    fn environment_rejects_redefinition() {
        let mut environment = Environment::new();
        environment.define("x", pos(), Value::Number(1.0)).unwrap();
        let error = environment
            .define("x", pos(), Value::Number(2.0))
            .unwrap_err();
        assert!(matches!(error.kind, RuntimeErrorKind::Redefinition(ref name) if name == "x"));
        // The first binding survives the failed redefinition
        assert_eq!(Value::Number(1.0), environment.get("x", pos()).unwrap());
    }

    #[test]
    fn environment_reports_unbound_names() {
        let environment = Environment::new();
        let error = environment.get("ghost", pos()).unwrap_err();
        assert_eq!("Undefined variable 'ghost'.\n[Line 1]", error.to_string());
    }
}
