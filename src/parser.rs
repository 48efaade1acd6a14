use ordered_float::OrderedFloat;
use thiserror::Error;

use crate::ast::{BinaryOp, Expr, ExprKind, Literal, Program, Stmt, StmtKind, UnaryOp};
use crate::reporter::{ErrorReporter, Location};
use crate::scanner::{Keyword, ScanError, Scanner, Symbol, Token, TokenType};

// Public error type that is returned from the API; the individual diagnostics
// have already gone to the reporter by the time this is produced
#[derive(Error, Debug)]
#[error("parse error")]
pub struct Error {}

// For unwinding to the statement boundary, we don't actually care about the
// internal cause which is reported through the reporter
#[derive(Error, Debug)]
#[error("internal parse error")]
struct ParsePanic {}

/// Track whether or not an error actually occurred and delegate to another error reporter
/// This is only meant to be used internally so that parse can piggy back on whether an error actually occurred
struct StateTrackingReporter<'a, Reporter> {
    reporter: &'a mut Reporter,
    errored: bool,
}

impl<'a, Reporter> ErrorReporter for StateTrackingReporter<'a, Reporter>
where
    Reporter: ErrorReporter,
{
    fn report(&mut self, line: usize, location: Location<'_>, message: &str) {
        self.errored = true;
        self.reporter.report(line, location, message);
    }
}

/// Parse the token stream into a program.
///
/// Statements that failed to parse are excluded from the result outright, and
/// any reported diagnostic makes the whole parse return `Err`, so a caller can
/// never execute a partial program by accident.
pub fn parse<'src, Reporter>(
    reporter: &mut Reporter,
    mut scanner: Scanner<'src>,
) -> Result<Program, Error>
where
    Reporter: ErrorReporter,
{
    let mut reporter = StateTrackingReporter {
        reporter,
        errored: false,
    };
    let program = program(&mut reporter, &mut scanner);
    if reporter.errored {
        Err(Error {})
    } else {
        Ok(program)
    }
}

fn program<'src, Reporter>(reporter: &mut Reporter, scanner: &mut Scanner<'src>) -> Program
where
    Reporter: ErrorReporter,
{
    let mut stmts = Vec::<Stmt>::new();
    while !scanner.is_at_eof() {
        match declaration(reporter, scanner) {
            Ok(stmt) => stmts.push(stmt),
            // The failed statement contributes no node; skip to the next
            // boundary and keep collecting diagnostics
            Err(ParsePanic {}) => synchronize(scanner),
        }
    }
    Program(stmts)
}

// Consume tokens until just past a ';' or just before a token that can begin a
// statement, bounding the error cascade to one statement per fault
fn synchronize(scanner: &mut Scanner) {
    loop {
        let data = match scanner.peek() {
            Ok(token) => Some(token.data),
            Err(_) => None,
        };
        match data {
            Some(TokenType::Eof) => break,
            Some(TokenType::Symbol(Symbol::Semicolon)) => {
                _ = scanner.next();
                break;
            }
            Some(data) if begins_statement(&data) => break,
            _ => {
                _ = scanner.next();
            }
        }
    }
}

fn begins_statement(data: &TokenType) -> bool {
    matches!(
        data,
        TokenType::Keyword(
            Keyword::Class
                | Keyword::Fun
                | Keyword::Var
                | Keyword::For
                | Keyword::If
                | Keyword::While
                | Keyword::Print
                | Keyword::Return
        )
    )
}

fn declaration<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Stmt, ParsePanic>
where
    Reporter: ErrorReporter,
{
    if scanner.next_if(|data| *data == Keyword::Var).is_some() {
        finish_var_decl(reporter, scanner)
    } else {
        statement(reporter, scanner)
    }
}

fn finish_var_decl<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Stmt, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let (name, pos) = {
        match scanner.next() {
            Ok(Token {
                data: TokenType::Identifier(identifier),
                pos,
                ..
            }) => (identifier.to_string(), pos), // Copy into the AST arena
            Ok(token) => {
                report_at_token(reporter, &token, "Expect variable name.");
                return Err(ParsePanic {});
            }
            Err(error) => {
                report_scan_error(reporter, &error);
                return Err(ParsePanic {});
            }
        }
    };
    let init = if scanner.next_if(|data| *data == Symbol::Equal).is_some() {
        Some(expr(reporter, scanner)?)
    } else {
        // The interpreter supplies nil for a missing initializer
        None
    };
    expect_symbol(
        reporter,
        scanner,
        Symbol::Semicolon,
        "Expect ';' after variable declaration.",
    )?;
    Ok(Stmt {
        pos,
        kind: StmtKind::VarDecl { name, init },
    })
}

fn statement<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Stmt, ParsePanic>
where
    Reporter: ErrorReporter,
{
    if let Some(print) = scanner.next_if(|data| *data == Keyword::Print) {
        let value = expr(reporter, scanner)?;
        expect_symbol(reporter, scanner, Symbol::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt {
            pos: print.pos,
            kind: StmtKind::Print(value),
        })
    } else {
        expr_stmt(reporter, scanner)
    }
}

fn expr_stmt<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Stmt, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let value = expr(reporter, scanner)?;
    expect_symbol(
        reporter,
        scanner,
        Symbol::Semicolon,
        "Expect ';' after expression.",
    )?;
    Ok(Stmt {
        pos: value.pos,
        kind: StmtKind::Expr(value),
    })
}

fn expr<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    equality(reporter, scanner)
}

// This encapsulates the logic of the recursive parsing of levels of binary expression operators
// We define a set of matching symbols (and we have the symbol -> binary op) as well as a higher precedence parser
const EQUALITY_SYMBOLS: [Symbol; 2] = [Symbol::EqualEqual, Symbol::BangEqual];

const COMPARISON_SYMBOLS: [Symbol; 4] = [
    Symbol::Greater,
    Symbol::GreaterEqual,
    Symbol::Less,
    Symbol::LessEqual,
];

const TERM_SYMBOLS: [Symbol; 2] = [Symbol::Minus, Symbol::Plus];

const FACTOR_SYMBOLS: [Symbol; 2] = [Symbol::Star, Symbol::Slash];

// All binary symbols. This is used for error production in primary to recover when we see a binary symbol without a
// left hand operand
const BINARY_SYMBOLS: [Symbol; 10] = [
    Symbol::EqualEqual,
    Symbol::BangEqual,
    Symbol::Greater,
    Symbol::GreaterEqual,
    Symbol::Less,
    Symbol::LessEqual,
    Symbol::Minus,
    Symbol::Plus,
    Symbol::Star,
    Symbol::Slash,
];

fn equality<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    left_recursive_binary_op(reporter, scanner, &EQUALITY_SYMBOLS, comparison)
}

fn comparison<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    left_recursive_binary_op(reporter, scanner, &COMPARISON_SYMBOLS, term)
}

fn term<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    left_recursive_binary_op(reporter, scanner, &TERM_SYMBOLS, factor)
}

fn factor<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    left_recursive_binary_op(reporter, scanner, &FACTOR_SYMBOLS, unary)
}

fn unary<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    if let Some((op, pos)) = scanner.next_if_some(|token| match token.data {
        TokenType::Symbol(Symbol::Bang) => Some((UnaryOp::Not, token.pos)),
        TokenType::Symbol(Symbol::Minus) => Some((UnaryOp::Negative, token.pos)),
        _ => None,
    }) {
        let operand = Box::new(unary(reporter, scanner)?);
        Ok(Expr {
            pos,
            kind: ExprKind::Unary { op, expr: operand },
        })
    } else {
        primary(reporter, scanner)
    }
}

fn primary<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let token = match scanner.next() {
        Ok(token) => token,
        Err(error) => {
            report_scan_error(reporter, &error);
            return Err(ParsePanic {});
        }
    };
    let kind = match token.data {
        TokenType::Keyword(Keyword::True) => ExprKind::Literal(Literal::Boolean(true)),
        TokenType::Keyword(Keyword::False) => ExprKind::Literal(Literal::Boolean(false)),
        TokenType::Keyword(Keyword::Nil) => ExprKind::Literal(Literal::Nil),
        TokenType::Number(number) => ExprKind::Literal(Literal::Number(OrderedFloat(number))),
        TokenType::String(string) => ExprKind::Literal(Literal::String(string.to_string())),
        TokenType::Identifier(identifier) => ExprKind::Variable {
            name: identifier.to_string(),
        },
        TokenType::Symbol(Symbol::LeftParen) => {
            let inner = expr(reporter, scanner)?;
            expect_symbol(
                reporter,
                scanner,
                Symbol::RightParen,
                "Expect ')' after expression.",
            )?;
            ExprKind::Group(Box::new(inner))
        }
        // An unexpected binary symbol, so try to parse the rhs before raising
        // the error; '-' is trapped by unary before it can reach here
        TokenType::Symbol(symbol) if BINARY_SYMBOLS.contains(&symbol) => {
            report_at_token(
                reporter,
                &token,
                "Binary operator without a left-hand operand.",
            );
            // result is unimportant, we are bailing anyway
            let _rhs = expr(reporter, scanner);
            return Err(ParsePanic {});
        }
        _ => {
            report_at_token(reporter, &token, "Expected expression.");
            return Err(ParsePanic {});
        }
    };
    Ok(Expr {
        pos: token.pos,
        kind,
    })
}

// It occurs to me it might be possible to do this as a single recursive call that unfolds generically
// instead of encoding the recursion in separate helpers
fn left_recursive_binary_op<'src, Reporter, F>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
    symbols: &[Symbol],
    higher_precedence: F,
) -> Result<Expr, ParsePanic>
where
    Reporter: ErrorReporter,
    F: Fn(&mut Reporter, &mut Scanner<'src>) -> Result<Expr, ParsePanic>,
{
    let mut expr = higher_precedence(reporter, scanner)?;
    while let Some((symbol, pos)) = scanner.next_if_some(|token| match token.data {
        TokenType::Symbol(symbol) if symbols.contains(&symbol) => Some((symbol, token.pos)),
        _ => None,
    }) {
        let right = Box::new(higher_precedence(reporter, scanner)?);
        expr = Expr {
            pos,
            kind: ExprKind::Binary {
                left: Box::new(expr),
                op: symbol_to_binary_op(symbol),
                right,
            },
        }
    }
    Ok(expr)
}

fn symbol_to_binary_op(symbol: Symbol) -> BinaryOp {
    match symbol {
        Symbol::EqualEqual => BinaryOp::Equal,
        Symbol::BangEqual => BinaryOp::NotEqual,
        Symbol::Less => BinaryOp::LessThan,
        Symbol::LessEqual => BinaryOp::LessThanEqual,
        Symbol::Greater => BinaryOp::GreaterThan,
        Symbol::GreaterEqual => BinaryOp::GreaterThanEqual,
        Symbol::Plus => BinaryOp::Add,
        Symbol::Minus => BinaryOp::Subtract,
        Symbol::Star => BinaryOp::Multiply,
        Symbol::Slash => BinaryOp::Divide,
        s => panic!("symbol was not a valid binary operator: {}", s),
    }
}

/// Expect that the next token from scanner is the given symbol, reporting
/// `message` at the offending token otherwise.
fn expect_symbol<'src, Reporter>(
    reporter: &mut Reporter,
    scanner: &mut Scanner<'src>,
    symbol: Symbol,
    message: &str,
) -> Result<Token<'src>, ParsePanic>
where
    Reporter: ErrorReporter,
{
    match scanner.next() {
        Ok(token) if token.data == symbol => Ok(token),
        Ok(token) => {
            report_at_token(reporter, &token, message);
            Err(ParsePanic {})
        }
        Err(error) => {
            report_scan_error(reporter, &error);
            Err(ParsePanic {})
        }
    }
}

fn report_at_token<Reporter>(reporter: &mut Reporter, token: &Token, message: &str)
where
    Reporter: ErrorReporter,
{
    let location = match token.data {
        TokenType::Eof => Location::Eof,
        _ => Location::At(token.lexeme),
    };
    reporter.report(token.pos.line, location, message);
}

fn report_scan_error<Reporter>(reporter: &mut Reporter, error: &ScanError)
where
    Reporter: ErrorReporter,
{
    reporter.report(error.pos.line, Location::Nowhere, error.kind.message());
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reporter::NoopReporter;
    use crate::scanner::Pos;

    /// Capture diagnostics as rendered text so tests can assert the exact
    /// stream a user would see.
    struct RecordingReporter {
        reports: Vec<String>,
    }

    impl RecordingReporter {
        fn new() -> RecordingReporter {
            RecordingReporter {
                reports: Vec::new(),
            }
        }
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&mut self, line: usize, location: Location<'_>, message: &str) {
            self.reports
                .push(format!("[Line {}] Error: {}: {}", line, location, message));
        }
    }

    fn pos() -> Pos {
        Pos {
            line: 1,
            offset_in_line: 0,
        }
    }

    fn literal(value: f64) -> Expr {
        Expr {
            pos: pos(),
            kind: ExprKind::Literal(Literal::Number(OrderedFloat(value))),
        }
    }

    #[test]
    fn test_pretty_print() {
        // (* (- 123) (group 45.67))
        let expr = Expr {
            pos: pos(),
            kind: ExprKind::Binary {
                left: Box::new(Expr {
                    pos: pos(),
                    kind: ExprKind::Unary {
                        op: UnaryOp::Negative,
                        expr: Box::new(literal(123f64)),
                    },
                }),
                op: BinaryOp::Multiply,
                right: Box::new(Expr {
                    pos: pos(),
                    kind: ExprKind::Group(Box::new(literal(45.67f64))),
                }),
            },
        };

        let mut result = String::new();
        std::fmt::write(&mut result, format_args!("{}", expr)).unwrap();
        assert_eq!("(* (- 123) (group 45.67))", result);
    }

    fn parse_single_expr(code: &str) -> Expr {
        let program = parse(&mut NoopReporter {}, Scanner::new(code)).unwrap();
        let stmt = program.0.into_iter().next().unwrap();
        match stmt.kind {
            StmtKind::Expr(expr) | StmtKind::Print(expr) => expr,
            other => panic!("expected an expression statement, got {:?}", other),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse_single_expr("print 2 + 3 * 4;");
        assert_eq!("(+ 2 (* 3 4))", expr.to_string());
    }

    #[test]
    fn grouping_overrides_precedence() {
        let expr = parse_single_expr("print (2 + 3) * 4;");
        assert_eq!("(* (group (+ 2 3)) 4)", expr.to_string());
    }

    #[test]
    fn binary_chains_fold_to_the_left() {
        let expr = parse_single_expr("1 - 2 - 3;");
        assert_eq!("(- (- 1 2) 3)", expr.to_string());

        let expr = parse_single_expr("1 == 2 < 3;");
        assert_eq!("(== 1 (< 2 3))", expr.to_string());
    }

    #[test]
    fn unary_is_right_recursive() {
        let expr = parse_single_expr("!!true;");
        assert_eq!("(! (! true))", expr.to_string());
    }

    #[test]
    fn var_decl_shapes() {
        let program = parse(&mut NoopReporter {}, Scanner::new("var x = 5; var y;")).unwrap();
        assert_eq!(2, program.0.len());
        match &program.0[0].kind {
            StmtKind::VarDecl { name, init } => {
                assert_eq!("x", name);
                assert_eq!("5", init.as_ref().unwrap().to_string());
            }
            other => panic!("expected a var declaration, got {:?}", other),
        }
        match &program.0[1].kind {
            StmtKind::VarDecl { name, init } => {
                assert_eq!("y", name);
                assert!(init.is_none());
            }
            other => panic!("expected a var declaration, got {:?}", other),
        }
    }

    #[test]
    fn missing_semicolon_reports_at_end() {
        let mut reporter = RecordingReporter::new();
        let result = parse(&mut reporter, Scanner::new("print 1"));
        assert!(result.is_err());
        assert_eq!(
            vec!["[Line 1] Error:  at end: Expect ';' after value.".to_string()],
            reporter.reports
        );
    }

    #[test]
    fn missing_paren_reports_at_the_offending_lexeme() {
        let mut reporter = RecordingReporter::new();
        let result = parse(&mut reporter, Scanner::new("print (1;"));
        assert!(result.is_err());
        assert_eq!(
            vec!["[Line 1] Error:  at ';': Expect ')' after expression.".to_string()],
            reporter.reports
        );
    }

    #[test]
    fn scan_fault_reports_without_a_location() {
        let mut reporter = RecordingReporter::new();
        let result = parse(&mut reporter, Scanner::new("print @;"));
        assert!(result.is_err());
        assert_eq!(
            vec!["[Line 1] Error: : Unexpected character.".to_string()],
            reporter.reports
        );
    }

    #[test]
    fn two_bad_statements_report_two_errors() {
        let mut reporter = RecordingReporter::new();
        let result = parse(&mut reporter, Scanner::new("var 1 = 2; var 3 = 4;"));
        assert!(result.is_err());
        assert_eq!(
            vec![
                "[Line 1] Error:  at '1': Expect variable name.".to_string(),
                "[Line 1] Error:  at '3': Expect variable name.".to_string(),
            ],
            reporter.reports
        );
    }

    #[test]
    fn synchronize_stops_at_a_statement_keyword() {
        let mut reporter = RecordingReporter::new();
        // The fault swallows ')' and '2' but must not swallow the print
        let result = parse(&mut reporter, Scanner::new("var x = ) 2 print 1;"));
        assert!(result.is_err());
        assert_eq!(
            vec!["[Line 1] Error:  at ')': Expected expression.".to_string()],
            reporter.reports
        );
    }

    #[test]
    fn binary_operator_without_lhs_is_one_error() {
        let mut reporter = RecordingReporter::new();
        let result = parse(&mut reporter, Scanner::new("* 3;"));
        assert!(result.is_err());
        assert_eq!(
            vec!["[Line 1] Error:  at '*': Binary operator without a left-hand operand.".to_string()],
            reporter.reports
        );
    }

    #[test]
    fn reparsing_the_same_source_is_idempotent() {
        let code = "var x = 1.5; print x >= 2; x + \"tail\";";
        let first = parse(&mut NoopReporter {}, Scanner::new(code)).unwrap();
        let second = parse(&mut NoopReporter {}, Scanner::new(code)).unwrap();
        assert_eq!(first, second);
    }
}
