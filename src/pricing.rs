//! # Pricing Engine Module
//!
//! Rolls placeholder per-token costs up through the token, model and
//! provider distributions of a calculator
//!
//! ## Key Components
//! - [`BaseCosts`] - Cost per 1000 tokens for each token type
//! - [`PriceBreakdown`] - Price to pay, price to charge and profit
//! - [`token_pricing`] / [`model_pricing`] / [`provider_pricing`] / [`calculator_pricing`]
//! - [`profit_from_credit_mapping`] - Margin implied by a credit mapping

use serde::Serialize;

use crate::calculator::{BREAK_EVEN_CREDIT_MAPPING, Calculator, ProviderConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseCosts {
    pub input_per_thousand: f64,
    pub output_per_thousand: f64,
    pub cached_per_thousand: f64,
}

impl BaseCosts {
    /// Unknown token types, and types priced at zero, bill at the input rate
    pub fn for_token_type(&self, token_type: &str) -> f64 {
        let cost = match token_type {
            "input" => self.input_per_thousand,
            "output" => self.output_per_thousand,
            "cached" => self.cached_per_thousand,
            _ => 0.0,
        };
        if cost > 0.0 { cost } else { self.input_per_thousand }
    }
}

const FALLBACK_COSTS: BaseCosts = BaseCosts {
    input_per_thousand: 0.0005,
    output_per_thousand: 0.0015,
    cached_per_thousand: 0.0001,
};

/// Placeholder costs per 1000 tokens; models without an entry use GPT-3.5 Turbo rates
pub fn get_base_costs(model: &str) -> BaseCosts {
    let (input, output, cached) = match model {
        "GPT-4.1" => (0.002, 0.008, 0.0005),
        "GPT-4.1 mini" => (0.0015, 0.006, 0.0004),
        "GPT-4.1 nano" => (0.001, 0.004, 0.0003),
        "GPT-3.5 Turbo" => (0.0005, 0.0015, 0.0001),
        "Claude 3 Opus" => (0.0025, 0.0075, 0.0),
        "Claude 3 Sonnet" => (0.0015, 0.005, 0.0),
        "Claude 3 Haiku" => (0.0008, 0.0024, 0.0),
        _ => return FALLBACK_COSTS,
    };

    BaseCosts {
        input_per_thousand: input,
        output_per_thousand: output,
        cached_per_thousand: cached,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub price_to_pay: f64,
    pub price_to_charge: f64,
    pub profit: f64,
    pub profit_percentage: f64,
}

impl PriceBreakdown {
    fn from_prices(price_to_pay: f64, price_to_charge: f64) -> Self {
        let profit = price_to_charge - price_to_pay;
        let profit_percentage = if price_to_pay > 0.0 {
            profit / price_to_pay * 100.0
        } else {
            0.0
        };

        Self {
            price_to_pay,
            price_to_charge,
            profit,
            profit_percentage,
        }
    }
}

pub fn profit_from_credit_mapping(credit_mapping: u32) -> i32 {
    let break_even = f64::from(BREAK_EVEN_CREDIT_MAPPING);
    ((break_even - f64::from(credit_mapping)) / break_even * 100.0).round() as i32
}

pub fn token_pricing(model: &str, token_type: &str, profit_percentage: i32) -> PriceBreakdown {
    let price_to_pay = get_base_costs(model).for_token_type(token_type);
    let price_to_charge = price_to_pay * (1.0 + f64::from(profit_percentage) / 100.0);

    PriceBreakdown {
        price_to_pay,
        price_to_charge,
        profit: price_to_charge - price_to_pay,
        profit_percentage: f64::from(profit_percentage),
    }
}

/// Price per 1000 tokens for one model, weighted by its token distribution
pub fn model_pricing(provider: &ProviderConfig, model: &str) -> PriceBreakdown {
    let Some(distribution) = provider.token_distribution(model).filter(|d| !d.is_empty()) else {
        return PriceBreakdown::default();
    };

    let (pay, charge) = distribution.iter().fold((0.0, 0.0), |(pay, charge), entry| {
        let pricing = token_pricing(model, &entry.key, provider.profit_percentage);
        let weight = entry.percentage.as_fraction();
        (
            pay + pricing.price_to_pay * weight,
            charge + pricing.price_to_charge * weight,
        )
    });

    PriceBreakdown::from_prices(pay, charge)
}

/// Price per 1000 tokens for a provider, weighted by its model distribution
pub fn provider_pricing(provider: &ProviderConfig) -> PriceBreakdown {
    if provider.models.is_empty() {
        return PriceBreakdown::default();
    }

    let (pay, charge) = provider.models.iter().fold((0.0, 0.0), |(pay, charge), entry| {
        let pricing = model_pricing(provider, &entry.key);
        let weight = entry.percentage.as_fraction();
        (
            pay + pricing.price_to_pay * weight,
            charge + pricing.price_to_charge * weight,
        )
    });

    PriceBreakdown::from_prices(pay, charge)
}

/// Mean of the provider prices
pub fn calculator_pricing(calculator: &Calculator) -> PriceBreakdown {
    if calculator.providers.is_empty() {
        return PriceBreakdown::default();
    }

    let count = calculator.providers.len() as f64;
    let (pay, charge) = calculator
        .providers
        .iter()
        .map(provider_pricing)
        .fold((0.0, 0.0), |(pay, charge), pricing| {
            (pay + pricing.price_to_pay, charge + pricing.price_to_charge)
        });

    PriceBreakdown::from_prices(pay / count, charge / count)
}
