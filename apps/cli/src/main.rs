//! Command-line front end for the math engine.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mathtex_engine::export::{json, latex, mathml, sympy};
use mathtex_engine::{Assumption, Engine, EngineOptions, Expr, Value};
use std::collections::HashMap;
use std::io::{self, BufRead};

#[derive(Parser)]
#[command(name = "mathtex", about = "Parse, evaluate, and rewrite LaTeX math expressions")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Replace would-be complex results with NaN
    #[arg(long, global = true)]
    real_only: bool,

    /// Disable implicit multiplication (enables multi-letter variable names)
    #[arg(long, global = true)]
    no_implicit_multiplication: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate an expression
    Eval {
        /// LaTeX source, or '-' to read one expression per stdin line
        source: String,

        /// Variable bindings, e.g. --var x=3
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
    },
    /// Parse an expression and print it in another format
    Parse {
        source: String,

        #[arg(long, value_enum, default_value_t = Format::Latex)]
        format: Format,
    },
    /// Simplify an expression
    Simplify {
        source: String,

        /// Assumptions, e.g. --assume x=positive
        #[arg(long = "assume", value_name = "NAME=TAG")]
        assumptions: Vec<String>,
    },
    /// Expand products and integer powers
    Expand { source: String },
    /// Factor a polynomial expression
    Factor { source: String },
    /// Differentiate with respect to a variable
    Diff {
        source: String,

        #[arg(short, long)]
        variable: String,

        #[arg(short, long, default_value_t = 1)]
        order: u32,
    },
    /// Find an antiderivative
    Integrate {
        source: String,

        #[arg(short, long)]
        variable: String,
    },
    /// Solve a linear or quadratic equation
    Solve {
        source: String,

        #[arg(short, long)]
        variable: String,
    },
    /// Check an expression and report errors as JSON
    Validate { source: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Latex,
    Mathml,
    Json,
    Sympy,
    SympyScript,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let options = EngineOptions {
        real_only: cli.real_only,
        allow_implicit_multiplication: !cli.no_implicit_multiplication,
        ..Default::default()
    };
    let mut engine = Engine::with_options(options);

    match cli.command {
        Command::Eval { source, vars } => {
            let locals = parse_bindings(&vars)?;
            if source == "-" {
                for line in io::stdin().lock().lines() {
                    let line = line.context("reading stdin")?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    match engine.evaluate_with(&line, &locals) {
                        Ok(value) => println!("{}", value),
                        Err(error) => eprintln!("error: {}", error),
                    }
                }
            } else {
                let value = engine.evaluate_with(&source, &locals)?;
                println!("{}", value);
            }
        }
        Command::Parse { source, format } => {
            let expr = engine.parse(&source)?;
            println!("{}", render(&expr, format)?);
        }
        Command::Simplify {
            source,
            assumptions,
        } => {
            for entry in &assumptions {
                let (name, tag) = entry
                    .split_once('=')
                    .ok_or_else(|| anyhow!("expected NAME=TAG, got '{}'", entry))?;
                let tag = Assumption::parse(tag)
                    .ok_or_else(|| anyhow!("unknown assumption tag '{}'", tag))?;
                engine.assume(name, tag);
            }
            let simplified = engine.simplify(&source)?;
            println!("{}", latex::to_latex(&simplified)?);
        }
        Command::Expand { source } => {
            let expanded = engine.expand(&source)?;
            println!("{}", latex::to_latex(&expanded)?);
        }
        Command::Factor { source } => {
            let factored = engine.factor(&source)?;
            println!("{}", latex::to_latex(&factored)?);
        }
        Command::Diff {
            source,
            variable,
            order,
        } => {
            let derivative = engine.differentiate(&source, &variable, order)?;
            println!("{}", latex::to_latex(&derivative)?);
        }
        Command::Integrate { source, variable } => {
            let antiderivative = engine.integrate(&source, &variable)?;
            println!("{}", latex::to_latex(&antiderivative)?);
        }
        Command::Solve { source, variable } => {
            let roots = engine.solve(&source, &variable)?;
            if roots.is_empty() {
                println!("no roots");
            }
            for root in roots {
                println!("{}", latex::to_latex(&root)?);
            }
        }
        Command::Validate { source } => {
            let report = engine.validate(&source);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.valid {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

fn render(expr: &Expr, format: Format) -> Result<String> {
    Ok(match format {
        Format::Latex => latex::to_latex(expr)?,
        Format::Mathml => mathml::to_mathml_document(expr)?,
        Format::Json => serde_json::to_string_pretty(&json::to_json(expr)?)?,
        Format::Sympy => sympy::to_sympy(expr)?,
        Format::SympyScript => sympy::to_sympy_script(expr)?,
    })
}

fn parse_bindings(entries: &[String]) -> Result<HashMap<String, Value>> {
    let mut locals = HashMap::new();
    for entry in entries {
        let Some((name, value)) = entry.split_once('=') else {
            bail!("expected NAME=VALUE, got '{}'", entry);
        };
        let value: f64 = value
            .parse()
            .with_context(|| format!("binding '{}' is not a number", entry))?;
        locals.insert(name.to_string(), Value::Numeric(value));
    }
    Ok(locals)
}
