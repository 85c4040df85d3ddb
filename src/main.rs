//! termbridge CLI: exercise the bridge against the reference engine.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use miette::Result;
use num_bigint::BigInt;
use num_rational::BigRational;

use termbridge::config::SessionConfig;
use termbridge::error::{BridgeError, NumeralError};
use termbridge::lift;
use termbridge::session::Session;
use termbridge::terms::{BV, Int, Term};

#[derive(Parser)]
#[command(name = "termbridge", version, about = "Reference-counted term bridge")]
struct Cli {
    /// TOML file with session parameters.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session parameter as key=value (repeatable, applied after --config).
    #[arg(long = "set", global = true, value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Write an interaction log to this file.
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show session parameters, registered categories and live objects.
    Info,

    /// Read a bit-vector numeral back unsigned and signed.
    Bv {
        /// Width in bits.
        #[arg(long)]
        width: u32,

        /// Decimal value; reduced modulo 2^width.
        #[arg(long, allow_hyphen_values = true)]
        value: String,
    },

    /// Split a rational literal into numerator and denominator.
    Rational {
        /// Literal of the form p/q or p.
        #[arg(allow_hyphen_values = true)]
        literal: String,
    },

    /// Approximate the real root radicand^(1/degree).
    Root {
        /// Rational radicand, p/q or p.
        #[arg(long)]
        radicand: String,

        #[arg(long, default_value = "2")]
        degree: u32,

        /// Digits after the decimal point.
        #[arg(long, default_value = "10")]
        precision: u32,
    },

    /// Sum integer terms and show the canonical form.
    SimplifySum {
        /// Comma-separated integers and constant names, e.g. "x,1,y,-2".
        #[arg(long, allow_hyphen_values = true)]
        terms: String,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Some(path) = &cli.log {
        termbridge::log::open(path)?;
    }

    let mut config = match &cli.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::new(),
    };
    for assignment in &cli.set {
        config.parse_assignment(assignment)?;
    }
    let session = Session::new(&config)?;

    match cli.command {
        Commands::Info => {
            println!("termbridge session {}", session.id());
            if config.is_empty() {
                println!("  parameters: (defaults)");
            } else {
                println!("  parameters:");
                for (key, value) in config.iter() {
                    println!("    {key} = {value}");
                }
            }
            let kinds: Vec<String> = lift::registry()
                .kinds()
                .iter()
                .map(ToString::to_string)
                .collect();
            println!("  categories: {}", kinds.join(", "));
            println!("  live objects: {}", session.live_object_count()?);
        }

        Commands::Bv { width, value } => {
            let value = parse_literal(&value)?;
            if !value.is_integer() {
                return Err(NumeralError::Literal { text: value.to_string() }.into());
            }
            let sort = session.bv_sort(width)?;
            let term = BV::try_from(session.from_big_int(&value.to_integer(), &sort)?)?;
            println!("term:     {term}");
            println!("unsigned: {}", describe(term.as_big_uint()?));
            println!("signed:   {}", describe(term.as_big_int()?));
            println!("i64:      {}", describe(term.as_i64()?));
            println!("u64:      {}", describe(term.as_u64()?));
        }

        Commands::Rational { literal } => {
            let value = parse_literal(&literal)?;
            let term = session.from_big_rational(&value)?;
            println!("term:        {term}");
            match term.as_rat()? {
                Some((numer, denom)) => {
                    println!("numerator:   {}", describe(numer.as_big_int()?));
                    println!("denominator: {}", describe(denom.as_big_int()?));
                }
                None => println!("not a rational numeral"),
            }
        }

        Commands::Root {
            radicand,
            degree,
            precision,
        } => {
            let radicand = session.from_big_rational(&parse_literal(&radicand)?)?;
            let exponent = session.from_big_rational(&BigRational::new(
                BigInt::from(1),
                BigInt::from(degree.max(1)),
            ))?;
            let root = radicand.power(&exponent)?.simplify()?;
            match root.approx(precision)? {
                Some((lower, upper)) => {
                    println!("{root} is irrational");
                    println!("lower: {}", describe(lower.as_big_rational()?));
                    println!("upper: {}", describe(upper.as_big_rational()?));
                }
                None => println!("exact: {root}"),
            }
        }

        Commands::SimplifySum { terms } => {
            let mut sum: Option<Int> = None;
            for item in terms.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let term = match i64::from_str(item) {
                    Ok(n) => session.int(n)?,
                    Err(_) => session.int_const(item)?,
                };
                sum = Some(match sum {
                    Some(acc) => acc.add(&term)?,
                    None => term,
                });
            }
            let Some(sum) = sum else {
                miette::bail!("no terms given");
            };
            let simplified = sum.simplify()?;
            println!("input:      {sum}");
            println!("simplified: {simplified}");
            println!("hash:       {}", simplified.expr().ast_hash()?);
        }
    }

    drop(session);
    termbridge::log::close();
    Ok(())
}

/// Parse `p/q` or `p` with a non-zero denominator.
fn parse_literal(text: &str) -> std::result::Result<BigRational, BridgeError> {
    let malformed = || NumeralError::Literal {
        text: text.to_string(),
    };
    let (numer, denom) = match text.trim().split_once('/') {
        Some((p, q)) => (p.trim(), q.trim()),
        None => (text.trim(), "1"),
    };
    let numer = BigInt::from_str(numer).map_err(|_| malformed())?;
    let denom = BigInt::from_str(denom).map_err(|_| malformed())?;
    if denom == BigInt::from(0) {
        return Err(malformed().into());
    }
    Ok(BigRational::new(numer, denom))
}

fn describe<T: std::fmt::Display>(value: termbridge::NumeralValue<T>) -> String {
    match value {
        termbridge::NumeralValue::Value(v) => v.to_string(),
        termbridge::NumeralValue::DoesNotFit => "does not fit".to_string(),
        termbridge::NumeralValue::NotANumeral => "not a numeral".to_string(),
    }
}
