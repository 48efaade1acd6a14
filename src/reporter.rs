use std::fmt::{self, Display, Formatter};
use std::io::Write;

/// Where a diagnostic is anchored in the token stream. Renders into the
/// `[Line <n>] Error: <location>: <message>` form that downstream tooling
/// scrapes, so the three variants must stay byte-exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location<'a> {
    /// No token context, as with scanner faults. Renders as nothing.
    Nowhere,
    /// A fault at the terminal `Eof` token.
    Eof,
    /// A fault at any other token, quoted by lexeme.
    At(&'a str),
}

impl Display for Location<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Location::Nowhere => Ok(()),
            Location::Eof => f.write_str(" at end"),
            Location::At(lexeme) => write!(f, " at '{}'", lexeme),
        }
    }
}

pub trait ErrorReporter {
    fn report(&mut self, line: usize, location: Location<'_>, message: &str);
}

/// Renders diagnostics to an output stream.
pub struct WriteReporter<'w, W>
where
    W: Write,
{
    // Store this as a mut reference so we can't accidentally lose something like stderr().lock() inside the reporter
    // that doesn't go out of scope and cause a deadlock
    write: &'w mut W,
}

impl<'w, W> WriteReporter<'w, W>
where
    W: Write,
{
    pub fn new(write: &'w mut W) -> WriteReporter<'w, W> {
        WriteReporter { write }
    }
}

impl<'w, W> ErrorReporter for WriteReporter<'w, W>
where
    W: Write,
{
    fn report(&mut self, line: usize, location: Location<'_>, message: &str) {
        // If we can't write to our output: 🤷🏻‍♂️
        _ = writeln!(self.write, "[Line {}] Error: {}: {}", line, location, message);
    }
}

pub struct NoopReporter {}

impl ErrorReporter for NoopReporter {
    fn report(&mut self, _line: usize, _location: Location<'_>, _message: &str) {}
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn renders_the_scraped_format() {
        let mut out = Vec::new();
        let mut reporter = WriteReporter::new(&mut out);
        reporter.report(1, Location::Nowhere, "Unexpected character.");
        reporter.report(2, Location::Eof, "Expect ';' after value.");
        reporter.report(3, Location::At("oops"), "Expected expression.");
        let rendered = String::from_utf8(out).unwrap();
        assert_eq!(
            "[Line 1] Error: : Unexpected character.\n\
             [Line 2] Error:  at end: Expect ';' after value.\n\
             [Line 3] Error:  at 'oops': Expected expression.\n",
            rendered
        );
    }
}
