//! # Table Display Module
//!
//! Terminal tables and JSON reports for distributions and calculators
//!
//! ## Key Components
//! - [`format_distribution`] - Share bars for one distribution
//! - [`format_calculator_list`] - Overview table of saved calculators
//! - [`format_calculator_detail`] - Pricing and distribution breakdown
//! - [`build_calculator_report`] - JSON report for a calculator

use serde::Serialize;

use crate::calculator::{Calculator, ProviderConfig};
use crate::catalog::PROVIDERS;
use crate::distribution::{FULL_SHARE, WeightedCollection};
use crate::pricing::{PriceBreakdown, calculator_pricing, model_pricing, provider_pricing};

const GRAY: &str = "\x1b[90m";
const CYAN: &str = "\x1b[36m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[39m";

const BAR_WIDTH: usize = 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonModelReport {
    pub model: String,
    pub percentage: u8,
    pub pricing: PriceBreakdown,
    pub token_distribution: WeightedCollection,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonProviderReport {
    pub id: String,
    pub name: String,
    pub credit_mapping: u32,
    pub profit_percentage: i32,
    pub pricing: PriceBreakdown,
    pub models: Vec<JsonModelReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonCalculatorReport {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub calculator_type: String,
    pub average_profit_percentage: f64,
    pub average_credit_mapping: f64,
    pub pricing: PriceBreakdown,
    pub providers: Vec<JsonProviderReport>,
}

fn header_box(title: &str) -> String {
    let width = title.chars().count() + 4;
    let mut output = String::new();
    output.push('\n');
    output.push_str(&format!(" ╭{}╮\n", "─".repeat(width)));
    output.push_str(&format!(" │  {}  │\n", title));
    output.push_str(&format!(" ╰{}╯\n", "─".repeat(width)));
    output
}

fn share_bar(percentage: u8) -> String {
    let filled = BAR_WIDTH * usize::from(percentage) / usize::from(FULL_SHARE);
    let empty = BAR_WIDTH.saturating_sub(filled);
    format!("{GREEN}{}{GRAY}{}{RESET}", "█".repeat(filled), "░".repeat(empty))
}

fn format_price(value: f64) -> String {
    format!("${:.4}", value)
}

/// One line per entry with a share bar, followed by the total
pub fn format_distribution(title: &str, distribution: &WeightedCollection) -> String {
    let mut output = format!("{CYAN}{}{RESET}\n", title);

    if distribution.is_empty() {
        output.push_str("   No entries\n");
        return output;
    }

    for entry in distribution {
        output.push_str(&format!(
            "   {:<16} {} {:>4}\n",
            entry.key,
            share_bar(entry.percentage.value()),
            entry.percentage.to_string()
        ));
    }

    let total = distribution.total();
    let marker = if distribution.is_balanced() {
        format!("{GREEN}{}%{RESET}", total)
    } else {
        format!("{YELLOW}{}% (not 100%){RESET}", total)
    };
    output.push_str(&format!("   {:<16} {}\n", "Total", marker));
    output
}

pub fn format_redistribution(
    before: &WeightedCollection,
    after: &WeightedCollection,
    target: &str,
) -> String {
    let mut output = header_box(&format!("Redistribution - {}", target));
    output.push('\n');
    output.push_str(&format_distribution("Before", before));
    output.push('\n');
    output.push_str(&format_distribution("After", after));
    output
}

pub fn format_provider_catalog() -> String {
    let mut output = header_box("Available Providers");
    output.push('\n');

    for provider in PROVIDERS {
        let status = if provider.integrated {
            format!("{GREEN}Integrated{RESET}")
        } else {
            format!("{GRAY}Not Integrated{RESET}")
        };
        output.push_str(&format!("{CYAN}{:<10}{RESET} {:<14} {}\n", provider.id, provider.name, status));

        if !provider.models.is_empty() {
            output.push_str(&format!("   Models: {}\n", provider.models.join(", ")));
            output.push_str(&format!("   Token types: {}\n", provider.token_types.join(", ")));
        }
    }

    output
}

pub fn format_calculator_list(calculators: &[&Calculator]) -> String {
    let mut output = header_box("Pricing Calculators");
    output.push('\n');

    if calculators.is_empty() {
        output.push_str("No calculators found.\n");
        return output;
    }

    output.push_str(&format!(
        "{GRAY}┌──────────┬────────────────────────────────┬────────────────────┬───────────┬──────────┐{RESET}\n"
    ));
    output.push_str(&format!(
        "{GRAY}│{RESET}{CYAN} Id       {RESET}{GRAY}│{RESET}{CYAN} Name                           {RESET}{GRAY}│{RESET}{CYAN} Type               {RESET}{GRAY}│{RESET}{CYAN} Providers {RESET}{GRAY}│{RESET}{CYAN}   Profit {RESET}{GRAY}│{RESET}\n"
    ));

    for calculator in calculators {
        output.push_str(&format!(
            "{GRAY}├──────────┼────────────────────────────────┼────────────────────┼───────────┼──────────┤{RESET}\n"
        ));
        output.push_str(&format!(
            "{GRAY}│{RESET} {:<8} {GRAY}│{RESET} {:<30} {GRAY}│{RESET} {:<18} {GRAY}│{RESET} {:>9} {GRAY}│{RESET} {:>8} {GRAY}│{RESET}\n",
            calculator.id,
            truncate(&calculator.name, 30),
            calculator.calculator_type.label(),
            calculator.providers.len(),
            format!("{:.1}%", calculator.average_profit_percentage())
        ));
    }

    output.push_str(&format!(
        "{GRAY}└──────────┴────────────────────────────────┴────────────────────┴───────────┴──────────┘{RESET}\n"
    ));
    output
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

fn format_pricing_lines(pricing: &PriceBreakdown, indent: &str) -> String {
    format!(
        "{indent}Price to pay:    {} per 1000 tokens\n{indent}Price to charge: {} per 1000 tokens\n{indent}Profit:          {GREEN}{} ({:.1}%){RESET}\n",
        format_price(pricing.price_to_pay),
        format_price(pricing.price_to_charge),
        format_price(pricing.profit),
        pricing.profit_percentage
    )
}

fn format_provider_detail(provider: &ProviderConfig) -> String {
    let mut output = format!("\n{GREEN}▸ {} ({}){RESET}\n", provider.name, provider.id);
    output.push_str(&format!(
        "   Credit mapping: {} ({}% profit, 500 = break-even)\n",
        provider.credit_mapping, provider.profit_percentage
    ));
    output.push_str(&format_pricing_lines(&provider_pricing(provider), "   "));
    output.push('\n');
    output.push_str(&format_distribution("   Model distribution", &provider.models));

    for entry in &provider.models {
        let pricing = model_pricing(provider, &entry.key);
        output.push_str(&format!(
            "\n   {CYAN}{}{RESET} - {} of usage, pays {} / charges {}\n",
            entry.key,
            entry.percentage,
            format_price(pricing.price_to_pay),
            format_price(pricing.price_to_charge)
        ));
        match provider.token_distribution(&entry.key) {
            Some(tokens) => {
                output.push_str(&format_distribution("   Token distribution", tokens));
            }
            None => output.push_str("   No token distribution\n"),
        }
    }

    output
}

pub fn format_calculator_detail(calculator: &Calculator) -> String {
    let mut output = header_box(&calculator.name);
    output.push('\n');
    output.push_str(&format!("Id:          {}\n", calculator.id));
    output.push_str(&format!("Description: {}\n", calculator.description));
    output.push_str(&format!(
        "Type:        {} - {}\n",
        calculator.calculator_type.label(),
        calculator.calculator_type.description()
    ));
    output.push_str(&format!("             {}\n", calculator.calculator_type.billing_note()));
    output.push_str(&format!(
        "Updated:     {}\n",
        calculator.updated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    output.push_str(&format!("\n{CYAN}Overall pricing{RESET}\n"));
    output.push_str(&format_pricing_lines(&calculator_pricing(calculator), "   "));
    output.push_str(&format!(
        "   Average credit mapping: {:.0}\n",
        calculator.average_credit_mapping()
    ));

    for provider in &calculator.providers {
        output.push_str(&format_provider_detail(provider));
    }

    output
}

pub fn build_calculator_report(calculator: &Calculator) -> JsonCalculatorReport {
    let providers = calculator
        .providers
        .iter()
        .map(|provider| JsonProviderReport {
            id: provider.id.clone(),
            name: provider.name.clone(),
            credit_mapping: provider.credit_mapping,
            profit_percentage: provider.profit_percentage,
            pricing: provider_pricing(provider),
            models: provider
                .models
                .iter()
                .map(|entry| JsonModelReport {
                    model: entry.key.clone(),
                    percentage: entry.percentage.value(),
                    pricing: model_pricing(provider, &entry.key),
                    token_distribution: provider
                        .token_distribution(&entry.key)
                        .cloned()
                        .unwrap_or_default(),
                })
                .collect(),
        })
        .collect();

    JsonCalculatorReport {
        id: calculator.id.clone(),
        name: calculator.name.clone(),
        description: calculator.description.clone(),
        calculator_type: calculator.calculator_type.label().to_string(),
        average_profit_percentage: calculator.average_profit_percentage(),
        average_credit_mapping: calculator.average_credit_mapping(),
        pricing: calculator_pricing(calculator),
        providers,
    }
}
