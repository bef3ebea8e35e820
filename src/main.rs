//! # LLM Pricing Calculator
//!
//! Models customer billing for LLM usage across providers, models and token types
//!
//! ## Key Components
//! - [`distribution::redistribute`] - Proportional rebalancing of percentage shares
//! - [`calculator`] - Calculator configuration and its updates
//! - [`pricing`] - Price to pay / charge roll-up
//! - [`store`] - JSON file store for saved calculators

mod calculator;
mod catalog;
mod cli;
mod commands;
mod distribution;
mod pricing;
mod store;
mod table_display;

use anyhow::Result;
use clap::Parser;
use log::debug;

use crate::cli::{Args, Commands};
use crate::store::resolve_store_path;

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger based on debug flag
    if args.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    }

    let store_path = resolve_store_path(args.store.as_deref());
    debug!("Using calculator store at {}", store_path.display());

    match args.command {
        Commands::Redistribute {
            entries,
            target,
            value,
            json,
        } => commands::handle_redistribute_command(&entries, &target, value, json),
        Commands::Providers { json } => commands::handle_providers_command(json),
        Commands::List {
            search,
            calculator_type,
            json,
        } => commands::handle_list_command(&store_path, &search, calculator_type, json),
        Commands::Create {
            name,
            description,
            calculator_type,
            providers,
        } => commands::handle_create_command(
            &store_path,
            &name,
            &description,
            calculator_type,
            &providers,
        ),
        Commands::Show { id, json, summary } => {
            commands::handle_show_command(&store_path, &id, json, summary)
        }
        Commands::AddProvider { id, provider } => {
            commands::handle_add_provider_command(&store_path, &id, &provider)
        }
        Commands::RemoveProvider { id, provider } => {
            commands::handle_remove_provider_command(&store_path, &id, &provider)
        }
        Commands::SetModel {
            id,
            provider,
            model,
            percentage,
        } => commands::handle_set_model_command(&store_path, &id, &provider, &model, percentage),
        Commands::SetToken {
            id,
            provider,
            model,
            token_type,
            percentage,
        } => commands::handle_set_token_command(
            &store_path,
            &id,
            &provider,
            &model,
            &token_type,
            percentage,
        ),
        Commands::SetCredit {
            id,
            provider,
            credit_mapping,
        } => commands::handle_set_credit_command(&store_path, &id, &provider, credit_mapping),
        Commands::Delete { id } => commands::handle_delete_command(&store_path, &id),
        Commands::Seed => commands::handle_seed_command(&store_path),
    }
}
