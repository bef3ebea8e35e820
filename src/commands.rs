//! # Commands Module
//!
//! Command handlers for the redistribution, catalog and calculator operations
//!
//! ## Key Components
//! - [`parse_entries`] - Parse "key=share" lists for ad-hoc redistribution
//! - [`handle_redistribute_command`] - Rebalance an ad-hoc distribution
//! - [`handle_show_command`] - Calculator pricing report
//! - [`update_calculator`] - Load, change, validate and save one calculator

use anyhow::{Context, Result};
use log::{debug, info};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

use crate::calculator::{Calculator, CalculatorDraft, CalculatorType};
use crate::catalog::PROVIDERS;
use crate::distribution::{Percentage, WeightedCollection, WeightedEntry, redistribute};
use crate::store::CalculatorStore;
use crate::table_display::{
    build_calculator_report, format_calculator_detail, format_calculator_list, format_distribution,
    format_provider_catalog, format_redistribution,
};

lazy_static::lazy_static! {
    static ref ENTRY_PATTERN: Regex = Regex::new(r"^\s*([^=]+?)\s*=\s*(\d+)\s*$").expect("valid entry pattern");
}

/// Parse a comma-separated list of `key=share` pairs
pub fn parse_entries(input: &str) -> Result<WeightedCollection> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for part in input.split(',').filter(|p| !p.trim().is_empty()) {
        let caps = ENTRY_PATTERN
            .captures(part)
            .with_context(|| format!("Expected key=percentage, got: {}", part.trim()))?;

        let key = caps[1].to_string();
        let value: u32 = caps[2]
            .parse()
            .with_context(|| format!("Invalid percentage for {}", key))?;
        let percentage = u8::try_from(value)
            .ok()
            .and_then(Percentage::new)
            .with_context(|| format!("Percentage for {} must be between 0 and 100, got {}", key, value))?;

        if !seen.insert(key.clone()) {
            anyhow::bail!("Duplicate entry: {}", key);
        }
        entries.push(WeightedEntry::new(key, percentage));
    }

    if entries.is_empty() {
        anyhow::bail!("No entries given");
    }

    Ok(WeightedCollection::new(entries))
}

/// Handle ad-hoc redistribution command
pub fn handle_redistribute_command(entries: &str, target: &str, value: f64, json: bool) -> Result<()> {
    let before = parse_entries(entries).context("Failed to parse entries")?;
    debug!("Parsed {} entries", before.len());

    if !before.is_balanced() {
        debug!("Input distribution sums to {}%, not 100%", before.total());
    }
    if !before.contains(target) {
        anyhow::bail!(
            "Target {} is not one of the entries: {}",
            target,
            before.keys().collect::<Vec<_>>().join(", ")
        );
    }

    let after = redistribute(&before, target, value);

    if json {
        let json_output = serde_json::json!({
            "target": target,
            "requested": value,
            "applied": after.get(target),
            "before": before,
            "after": after,
            "total": after.total(),
        });
        println!("{}", serde_json::to_string_pretty(&json_output)?);
    } else {
        println!("{}", format_redistribution(&before, &after, target));
    }

    Ok(())
}

/// Handle provider catalog listing
pub fn handle_providers_command(json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::json!({
            "providers": PROVIDERS.iter().map(|provider| {
                serde_json::json!({
                    "id": provider.id,
                    "name": provider.name,
                    "integrated": provider.integrated,
                    "models": provider.models,
                    "tokenTypes": provider.token_types,
                })
            }).collect::<Vec<_>>()
        });
        println!("{}", serde_json::to_string_pretty(&json_output)?);
    } else {
        println!("{}", format_provider_catalog());
    }
    Ok(())
}

/// Handle calculator listing with search and type filter
pub fn handle_list_command(
    store_path: &Path,
    search: &str,
    calculator_type: Option<CalculatorType>,
    json: bool,
) -> Result<()> {
    let store = CalculatorStore::load(store_path)?;
    let calculators = store.filter(search, calculator_type);

    if json {
        println!("{}", serde_json::to_string_pretty(&calculators)?);
    } else {
        println!("{}", format_calculator_list(&calculators));
    }
    Ok(())
}

/// Handle calculator creation
pub fn handle_create_command(
    store_path: &Path,
    name: &str,
    description: &str,
    calculator_type: CalculatorType,
    providers: &[String],
) -> Result<()> {
    let mut draft = CalculatorDraft::new(name, description, calculator_type);
    for provider in providers {
        draft = draft
            .with_provider(provider)
            .with_context(|| format!("Cannot add provider {}", provider))?;
    }

    let mut store = CalculatorStore::load(store_path)?;
    let id = store.create(draft)?.id.clone();
    store.save(store_path)?;

    info!("Created calculator {}", id);
    println!("Created calculator {}", id);
    Ok(())
}

/// Handle calculator detail report
pub fn handle_show_command(store_path: &Path, id: &str, json: bool, summary: bool) -> Result<()> {
    let store = CalculatorStore::load(store_path)?;
    let calculator = store.get_required(id)?;

    if summary {
        println!("{}", calculator.summary_text());
    } else if json {
        let report = build_calculator_report(calculator);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", format_calculator_detail(calculator));
    }
    Ok(())
}

/// Load the store, apply `change` to one calculator, then save the result
pub fn update_calculator<F>(store_path: &Path, id: &str, change: F) -> Result<Calculator>
where
    F: FnOnce(&Calculator) -> Result<Calculator>,
{
    let mut store = CalculatorStore::load(store_path)?;
    let current = store.get_required(id)?;
    let changed = change(current)?;
    let updated = store.update(changed)?.clone();
    store.save(store_path)?;

    info!("Updated calculator {}", id);
    Ok(updated)
}

pub fn handle_add_provider_command(store_path: &Path, id: &str, provider: &str) -> Result<()> {
    let updated = update_calculator(store_path, id, |c| c.with_provider_added(provider))?;
    println!("Added {} to {} ({} providers)", provider, updated.id, updated.providers.len());
    Ok(())
}

pub fn handle_remove_provider_command(store_path: &Path, id: &str, provider: &str) -> Result<()> {
    let updated = update_calculator(store_path, id, |c| c.with_provider_removed(provider))?;
    println!("Removed {} from {} ({} providers)", provider, updated.id, updated.providers.len());
    Ok(())
}

/// Handle model share update
pub fn handle_set_model_command(
    store_path: &Path,
    id: &str,
    provider: &str,
    model: &str,
    percentage: f64,
) -> Result<()> {
    let updated = update_calculator(store_path, id, |c| {
        let config = c
            .provider(provider)
            .with_context(|| format!("Provider {} is not part of calculator {}", provider, id))?;
        if !config.models.contains(model) {
            anyhow::bail!("Model {} is not configured for provider {}", model, provider);
        }
        c.with_model_share(provider, model, percentage)
    })?;

    if let Some(config) = updated.provider(provider) {
        println!("{}", format_distribution("Model distribution", &config.models));
    }
    Ok(())
}

/// Handle token type share update
pub fn handle_set_token_command(
    store_path: &Path,
    id: &str,
    provider: &str,
    model: &str,
    token_type: &str,
    percentage: f64,
) -> Result<()> {
    let updated = update_calculator(store_path, id, |c| {
        let config = c
            .provider(provider)
            .with_context(|| format!("Provider {} is not part of calculator {}", provider, id))?;
        let tokens = config
            .token_distribution(model)
            .with_context(|| format!("Model {} is not configured for provider {}", model, provider))?;
        if !tokens.contains(token_type) {
            anyhow::bail!("Token type {} is not billed for {}", token_type, model);
        }
        c.with_token_share(provider, model, token_type, percentage)
    })?;

    if let Some(tokens) = updated
        .provider(provider)
        .and_then(|config| config.token_distribution(model))
    {
        println!("{}", format_distribution(&format!("{} token distribution", model), tokens));
    }
    Ok(())
}

/// Handle credit mapping update
pub fn handle_set_credit_command(
    store_path: &Path,
    id: &str,
    provider: &str,
    credit_mapping: u32,
) -> Result<()> {
    let updated = update_calculator(store_path, id, |c| c.with_credit_mapping(provider, credit_mapping))?;

    if let Some(config) = updated.provider(provider) {
        println!(
            "{}: credit mapping {} ({}% profit)",
            config.name, config.credit_mapping, config.profit_percentage
        );
    }
    Ok(())
}

pub fn handle_delete_command(store_path: &Path, id: &str) -> Result<()> {
    let mut store = CalculatorStore::load(store_path)?;
    let removed = store.delete(id)?;
    store.save(store_path)?;

    info!("Deleted calculator {}", removed.id);
    println!("Deleted {} ({})", removed.id, removed.name);
    Ok(())
}

pub fn handle_seed_command(store_path: &Path) -> Result<()> {
    let mut store = CalculatorStore::load(store_path)?;
    let added = store.seed_examples()?;
    store.save(store_path)?;

    println!("Added {} example calculators to {}", added, store_path.display());
    Ok(())
}
