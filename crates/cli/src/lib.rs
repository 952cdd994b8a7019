//! # Loreforge CLI
//!
//! Command-line interface for Loreforge.
//!
//! ## Commands
//!
//! - `validate` - Validate the custom types in a type library
//! - `check-formula` - Screen a computed-field formula
//! - `eval` - Evaluate a formula against field values
//! - `types` - List built-in and library entity types
//! - `clone` - Clone a built-in type into a type library
//!

pub mod commands;
pub mod config;
pub mod output;

pub use config::{CONFIG_FILE_NAME, Config};

use clap::{Parser, Subcommand};
use loreforge_core::FieldValue;
use std::path::PathBuf;
use std::process::ExitCode;

/// CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "loreforge", version, about = "Schema and formula tooling for campaign entity types")]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "LOREFORGE_CONFIG", default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Emit JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse the process arguments
    pub fn from_env() -> Self {
        <Self as Parser>::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate the custom types in a type library file or directory
    Validate {
        /// Library file or directory (defaults to the configured library path)
        path: Option<PathBuf>,

        /// Also cross-check computed formulas against the field list
        #[arg(long)]
        strict: bool,
    },

    /// Screen a formula and check its placeholders
    CheckFormula {
        formula: String,

        /// Declared dependencies, comma separated
        #[arg(long, value_delimiter = ',')]
        deps: Option<Vec<String>>,

        /// Field keys available on the type, comma separated
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<String>>,
    },

    /// Evaluate a formula against field values
    Eval {
        formula: String,

        /// Field value; the value is read as JSON when it parses, text otherwise
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
        values: Vec<(String, FieldValue)>,

        /// Declared dependencies (defaults to the formula's placeholders)
        #[arg(long, value_delimiter = ',')]
        deps: Option<Vec<String>>,

        /// Output type: text, number or boolean
        #[arg(long)]
        output: Option<String>,
    },

    /// List built-in and library entity types
    Types {
        /// Library file or directory (defaults to the configured library path)
        #[arg(long)]
        library: Option<PathBuf>,
    },

    /// Clone a built-in type into a type library
    #[command(name = "clone")]
    CloneType {
        /// Key of the built-in type
        source: String,

        /// Key for the copy (suggested from the label when omitted)
        #[arg(long)]
        key: Option<String>,

        /// Label for the copy
        #[arg(long)]
        label: Option<String>,

        /// Plural label for the copy
        #[arg(long)]
        plural: Option<String>,

        /// Library file to add the copy to (defaults to the configured library path)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Parse `key=value` into a field assignment
fn parse_assignment(raw: &str) -> Result<(String, FieldValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{}'", raw));
    }
    let value = serde_json::from_str::<FieldValue>(value)
        .unwrap_or_else(|_| FieldValue::Text(value.to_string()));
    Ok((key.to_string(), value))
}

/// Run a parsed command
pub fn run(cli: Cli, config: &Config) -> anyhow::Result<ExitCode> {
    let json = cli.json;
    let ok = match cli.command {
        Command::Validate { path, strict } => {
            commands::validate(path, strict || config.validation.strict, config, json)?
        }
        Command::CheckFormula {
            formula,
            deps,
            fields,
        } => commands::check_formula(&formula, deps, fields, json)?,
        Command::Eval {
            formula,
            values,
            deps,
            output,
        } => commands::eval(&formula, values, deps, output, json)?,
        Command::Types { library } => commands::types(library, config, json)?,
        Command::CloneType {
            source,
            key,
            label,
            plural,
            out,
        } => commands::clone_type(
            commands::CloneOptions {
                source,
                key,
                label,
                plural,
                out,
            },
            config,
            json,
        )?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
