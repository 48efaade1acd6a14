//! A tree-walking interpreter for a small dynamically typed scripting
//! language. Source text flows one way through the pipeline: the scanner
//! turns characters into tokens, the parser folds tokens into statements,
//! and the interpreter executes statements against a variable environment.
//! Diagnostics from every stage funnel through the reporter.

pub mod ast;
pub mod interpreter;
pub mod parser;
pub mod reporter;
pub mod scanner;
