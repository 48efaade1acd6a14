use std::env::args;
use std::fs::File;
use std::io::prelude::*;
use std::io::stdout;
use std::io::BufReader;

use anyhow::{Context, Result};

use quill::interpreter::Interpreter;
use quill::parser::parse;
use quill::reporter::WriteReporter;
use quill::scanner::Scanner;

enum Outcome {
    Success,
    SyntaxError,
    RuntimeError,
}

fn main() -> Result<()> {
    let args = args();
    if args.len() > 2 {
        println!("Usage: quill [script]");
        std::process::exit(64);
    } else if args.len() == 2 {
        // Size is validated
        let script_path = args.skip(1).next().unwrap();
        let mut file = File::open(script_path).context("Unable to open script file")?;
        let mut script = String::new();
        file.read_to_string(&mut script)
            .context("Unable to read script file")?;
        match run(&mut Interpreter::new(), &script) {
            Outcome::Success => {}
            Outcome::SyntaxError => std::process::exit(65),
            Outcome::RuntimeError => std::process::exit(70),
        }
    } else {
        run_prompt()?;
    }
    Ok(())
}

fn run_prompt() -> Result<()> {
    let stdin = std::io::stdin().lock();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();
    // One interpreter for the whole session, so bindings persist across
    // prompts while each line is scanned and parsed from scratch
    let mut interpreter = Interpreter::new();
    loop {
        {
            let mut stdout = stdout().lock();
            stdout.write_all("> ".as_bytes())?;
            stdout.flush()?;
        }
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break;
        }
        run(&mut interpreter, &line);
        // Don't keep appending code until the next time
        line.clear();
    }
    Ok(())
}

fn run(interpreter: &mut Interpreter, code: &str) -> Outcome {
    let program = {
        let mut stderr = std::io::stderr().lock();
        let mut reporter = WriteReporter::new(&mut stderr);
        match parse(&mut reporter, Scanner::new(code)) {
            Ok(program) => program,
            // Diagnostics already went to the reporter; never run a partial
            // program
            Err(_) => return Outcome::SyntaxError,
        }
    };
    let mut stdout = stdout().lock();
    let result = interpreter.interpret(&program, &mut stdout);
    drop(stdout);
    match result {
        Ok(()) => Outcome::Success,
        Err(error) => {
            eprintln!("{}", error);
            Outcome::RuntimeError
        }
    }
}
