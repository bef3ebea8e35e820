//! # CLI Module
//!
//! Command-line interface definitions and argument parsing for llm-pricing-calc
//!
//! ## Key Components
//! - [`Args`] - Main CLI arguments structure
//! - [`Commands`] - Subcommand definitions

use clap::{Parser, Subcommand};

use crate::calculator::CalculatorType;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Change one share of an ad-hoc distribution and rebalance the rest
    Redistribute {
        /// Current shares, e.g. "GPT-4.1=50,GPT-4.1 mini=30,GPT-4.1 nano=20"
        #[arg(long)]
        entries: String,

        /// Entry to change
        #[arg(long)]
        target: String,

        /// New share for the target (clamped to 0-100)
        #[arg(long, allow_negative_numbers = true)]
        value: f64,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// List providers that can be added to a calculator
    Providers {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// List saved calculators
    List {
        /// Filter by name or description
        #[arg(long, default_value = "")]
        search: String,

        /// Only show calculators of this billing level
        #[arg(long = "type", value_enum)]
        calculator_type: Option<CalculatorType>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Create a calculator
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: String,

        /// Billing level
        #[arg(long = "type", default_value = "service", value_enum)]
        calculator_type: CalculatorType,

        /// Provider id to include (repeatable)
        #[arg(long = "provider")]
        providers: Vec<String>,
    },
    /// Show pricing and distributions for a calculator
    Show {
        id: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Print the plain-text summary only
        #[arg(long)]
        summary: bool,
    },
    /// Add a provider with default distributions
    AddProvider { id: String, provider: String },
    /// Remove a provider from a calculator
    RemoveProvider { id: String, provider: String },
    /// Set a model's share of a provider's usage
    SetModel {
        id: String,
        provider: String,
        model: String,
        #[arg(allow_negative_numbers = true)]
        percentage: f64,
    },
    /// Set a token type's share of a model's usage
    SetToken {
        id: String,
        provider: String,
        model: String,
        token_type: String,
        #[arg(allow_negative_numbers = true)]
        percentage: f64,
    },
    /// Set a provider's credit mapping (100-900, 500 = break-even)
    SetCredit {
        id: String,
        provider: String,
        credit_mapping: u32,
    },
    /// Delete a calculator
    Delete { id: String },
    /// Add the sample calculators to the store
    Seed,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "LLM Pricing Calculator - model customer billing across providers, models and token types"
)]
pub struct Args {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Calculator store file (can also use LLM_PRICING_CALC_STORE env var)
    #[arg(long, global = true)]
    pub store: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_model() {
        let args = Args::parse_from(["llm-pricing-calc", "set-model", "calc-1", "openai", "GPT-4.1", "80"]);
        match args.command {
            Commands::SetModel { id, model, percentage, .. } => {
                assert_eq!(id, "calc-1");
                assert_eq!(model, "GPT-4.1");
                assert_eq!(percentage, 80.0);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_create_with_providers() {
        let args = Args::parse_from([
            "llm-pricing-calc",
            "--store",
            "/tmp/calcs.json",
            "create",
            "--name",
            "Bot",
            "--description",
            "Support bot",
            "--type",
            "organization",
            "--provider",
            "openai",
            "--provider",
            "anthropic",
        ]);
        assert_eq!(args.store.as_deref(), Some("/tmp/calcs.json"));
        match args.command {
            Commands::Create { calculator_type, providers, .. } => {
                assert_eq!(calculator_type, CalculatorType::Organization);
                assert_eq!(providers, vec!["openai", "anthropic"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_negative_redistribute_value() {
        let args = Args::parse_from([
            "llm-pricing-calc",
            "redistribute",
            "--entries",
            "A=50,B=50",
            "--target",
            "A",
            "--value",
            "-5",
        ]);
        assert!(matches!(args.command, Commands::Redistribute { value, .. } if value == -5.0));
    }
}
