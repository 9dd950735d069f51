use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use rlox as lox;

use clap::error::ErrorKind;
use clap::Parser as ClapParser;

use lox::error::LoxError;
use lox::interpreter::Interpreter;
use lox::parser::{Parser, Stmt};
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Script file to execute; omit for an interactive prompt
    script: Option<PathBuf>,
}

/// Driver: owns the interpreter (so REPL state persists across lines) and
/// the per-unit diagnostic flags that decide the exit code.
struct Lox {
    interpreter: Interpreter,
    had_static_error: bool,
    had_runtime_error: bool,
}

impl Lox {
    fn new() -> Self {
        Lox {
            interpreter: Interpreter::new(),
            had_static_error: false,
            had_runtime_error: false,
        }
    }

    fn run_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let source = fs::read_to_string(path)?;

        self.run(&source, false);

        if self.had_static_error {
            process::exit(65);
        }

        if self.had_runtime_error {
            process::exit(70);
        }

        Ok(())
    }

    fn run_prompt(&mut self) -> anyhow::Result<()> {
        let stdin = io::stdin();

        loop {
            print!("> ");
            io::stdout().flush()?;

            let mut line = String::new();

            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }

            self.run(&line, true);

            // A bad line must not poison the next one; runtime failures
            // stay on the record.
            self.had_static_error = false;
        }

        Ok(())
    }

    /// Run one source unit through the full pipeline.  Any static error
    /// suppresses execution; a runtime error aborts the unit.
    fn run(&mut self, source: &str, repl: bool) {
        let scanner = Scanner::new(source.as_bytes());

        let mut tokens: Vec<Token> = Vec::new();

        for result in scanner {
            match result {
                Ok(token) => tokens.push(token),

                Err(e) => {
                    eprintln!("{}", e);
                    self.had_static_error = true;
                }
            }
        }

        let (statements, errors) = Parser::new(tokens).parse();

        for e in &errors {
            eprintln!("{}", e);
        }

        if !errors.is_empty() {
            self.had_static_error = true;
        }

        if self.had_static_error {
            return;
        }

        let errors = Resolver::new(&mut self.interpreter).resolve(&statements);

        for e in &errors {
            eprintln!("{}", e);
        }

        if !errors.is_empty() {
            self.had_static_error = true;

            return;
        }

        let result = if repl {
            self.run_repl_statements(&statements)
        } else {
            self.interpreter.interpret(&statements)
        };

        if let Err(e) = result {
            eprintln!("{}", e);
            self.had_runtime_error = true;
        }
    }

    /// REPL niceties: a top-level expression statement echoes its value;
    /// everything else executes silently.
    fn run_repl_statements(&mut self, statements: &[Stmt]) -> Result<(), LoxError> {
        for statement in statements {
            match statement {
                Stmt::Expression(expr) => {
                    let value = self.interpreter.evaluate_expression(expr)?;

                    println!("{}", value);
                }

                other => self.interpreter.interpret(std::slice::from_ref(other))?,
            }
        }

        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,

        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;

            return Ok(());
        }

        Err(_) => {
            eprintln!("Usage: rlox [script]");
            process::exit(64);
        }
    };

    let mut lox = Lox::new();

    match cli.script {
        Some(path) => lox.run_file(&path)?,

        None => lox.run_prompt()?,
    }

    Ok(())
}
