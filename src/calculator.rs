//! # Calculator Module
//!
//! Pricing calculator configuration: which providers are billed, how usage is
//! split across their models and token types, and the credit mapping that
//! sets the margin
//!
//! Every update returns a new value; callers replace their stored copy.
//!
//! ## Key Components
//! - [`CalculatorType`] - Billing level (service, organization, user)
//! - [`ProviderConfig`] - Per-provider distributions and credit mapping
//! - [`CalculatorDraft`] - Unsaved calculator being assembled
//! - [`Calculator`] - Saved calculator with id and timestamps

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::{self, ProviderInfo};
use crate::distribution::{WeightedCollection, redistribute};
use crate::pricing::profit_from_credit_mapping;

pub const BREAK_EVEN_CREDIT_MAPPING: u32 = 500;
pub const MIN_CREDIT_MAPPING: u32 = 100;
pub const MAX_CREDIT_MAPPING: u32 = 900;
pub const CREDIT_MAPPING_STEP: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CalculatorType {
    Service,
    Organization,
    User,
}

impl CalculatorType {
    pub fn label(self) -> &'static str {
        match self {
            CalculatorType::Service => "Service Level",
            CalculatorType::Organization => "Organization Level",
            CalculatorType::User => "User Level",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            CalculatorType::Service => "Bundle LLM costs into your service pricing",
            CalculatorType::Organization => {
                "Track consumption across all users in an organization"
            }
            CalculatorType::User => "Track consumption for individual users",
        }
    }

    /// How credits are charged under this billing level
    pub fn billing_note(self) -> &'static str {
        match self {
            CalculatorType::Service => {
                "LLM costs are bundled into your service pricing. End customers are not charged based on credits."
            }
            CalculatorType::Organization => {
                "Credits are allocated at the organization level. Consumption is tracked across all users within the organization."
            }
            CalculatorType::User => {
                "Credits are allocated to individual users. Consumption is tracked separately for each user."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
    pub models: WeightedCollection,
    #[serde(default)]
    pub token_distributions: BTreeMap<String, WeightedCollection>,
    pub credit_mapping: u32,
    pub profit_percentage: i32,
}

impl ProviderConfig {
    /// Fresh provider: first model takes all usage, token types split evenly
    pub fn from_catalog(info: &ProviderInfo) -> Self {
        let models = catalog::provider_models(info.id);
        let token_types = catalog::token_types(info.id);

        let token_distributions = models
            .iter()
            .map(|model| {
                (
                    model.to_string(),
                    WeightedCollection::even_split(token_types.iter().copied()),
                )
            })
            .collect();

        Self {
            id: info.id.to_string(),
            name: info.name.to_string(),
            models: WeightedCollection::primary_first(models.iter().copied()),
            token_distributions,
            credit_mapping: BREAK_EVEN_CREDIT_MAPPING,
            profit_percentage: 0,
        }
    }

    pub fn token_distribution(&self, model: &str) -> Option<&WeightedCollection> {
        self.token_distributions.get(model)
    }

    pub fn with_model_share(&self, model: &str, percentage: f64) -> Self {
        Self {
            models: redistribute(&self.models, model, percentage),
            ..self.clone()
        }
    }

    pub fn with_token_share(&self, model: &str, token_type: &str, percentage: f64) -> Self {
        let Some(current) = self.token_distributions.get(model) else {
            debug!("Provider {} has no token distribution for {}", self.id, model);
            return self.clone();
        };

        let mut token_distributions = self.token_distributions.clone();
        token_distributions.insert(
            model.to_string(),
            redistribute(current, token_type, percentage),
        );

        Self {
            token_distributions,
            ..self.clone()
        }
    }

    pub fn with_credit_mapping(&self, credit_mapping: u32) -> Self {
        let clamped = credit_mapping.clamp(MIN_CREDIT_MAPPING, MAX_CREDIT_MAPPING);
        let snapped = (clamped + CREDIT_MAPPING_STEP / 2) / CREDIT_MAPPING_STEP * CREDIT_MAPPING_STEP;
        let snapped = snapped.min(MAX_CREDIT_MAPPING);
        if snapped != credit_mapping {
            debug!("Credit mapping {} adjusted to {}", credit_mapping, snapped);
        }

        Self {
            credit_mapping: snapped,
            profit_percentage: profit_from_credit_mapping(snapped),
            ..self.clone()
        }
    }

    /// Credit mapping must sit on the 100-900 grid and agree with the stored profit
    pub fn validate(&self) -> Result<()> {
        let in_range = (MIN_CREDIT_MAPPING..=MAX_CREDIT_MAPPING).contains(&self.credit_mapping);
        if !in_range || self.credit_mapping % CREDIT_MAPPING_STEP != 0 {
            anyhow::bail!(
                "Credit mapping {} for {} must be a multiple of {} between {} and {}",
                self.credit_mapping,
                self.name,
                CREDIT_MAPPING_STEP,
                MIN_CREDIT_MAPPING,
                MAX_CREDIT_MAPPING
            );
        }

        let expected = profit_from_credit_mapping(self.credit_mapping);
        if self.profit_percentage != expected {
            anyhow::bail!(
                "Profit {}% for {} does not match credit mapping {} (expected {}%)",
                self.profit_percentage,
                self.name,
                self.credit_mapping,
                expected
            );
        }
        Ok(())
    }
}

/// Resolve a catalog provider and check it can join `existing`
fn attach_provider(existing: &[ProviderConfig], provider_id: &str) -> Result<ProviderConfig> {
    let info = catalog::get_provider(provider_id)
        .with_context(|| format!("Unknown provider: {}", provider_id))?;

    if !info.integrated {
        anyhow::bail!("This provider is not integrated. Please integrate it first.");
    }

    if existing.iter().any(|p| p.id == provider_id) {
        anyhow::bail!("This provider is already added.");
    }

    Ok(ProviderConfig::from_catalog(info))
}

fn validation_errors(name: &str, description: &str, providers: &[ProviderConfig]) -> Vec<&'static str> {
    let mut errors = Vec::new();
    if name.trim().is_empty() {
        errors.push("Name is required");
    }
    if description.trim().is_empty() {
        errors.push("Description is required");
    }
    if providers.is_empty() {
        errors.push("At least one provider is required");
    }
    errors
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorDraft {
    pub name: String,
    pub description: String,
    pub calculator_type: CalculatorType,
    pub providers: Vec<ProviderConfig>,
}

impl CalculatorDraft {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        calculator_type: CalculatorType,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            calculator_type,
            providers: Vec::new(),
        }
    }

    pub fn with_provider(mut self, provider_id: &str) -> Result<Self> {
        let provider = attach_provider(&self.providers, provider_id)?;
        self.providers.push(provider);
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let errors = validation_errors(&self.name, &self.description, &self.providers);
        if !errors.is_empty() {
            anyhow::bail!("{}", errors.join("; "));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calculator {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub calculator_type: CalculatorType,
    pub providers: Vec<ProviderConfig>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Calculator {
    pub fn from_draft(id: String, draft: CalculatorDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            calculator_type: draft.calculator_type,
            providers: draft.providers,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn provider(&self, provider_id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == provider_id)
    }

    pub fn validate(&self) -> Result<()> {
        let errors = validation_errors(&self.name, &self.description, &self.providers);
        if !errors.is_empty() {
            anyhow::bail!("{}", errors.join("; "));
        }
        for provider in &self.providers {
            provider.validate()?;
        }
        Ok(())
    }

    pub fn with_provider_added(&self, provider_id: &str) -> Result<Self> {
        let provider = attach_provider(&self.providers, provider_id)?;
        let mut providers = self.providers.clone();
        providers.push(provider);
        Ok(Self {
            providers,
            ..self.clone()
        })
    }

    pub fn with_provider_removed(&self, provider_id: &str) -> Result<Self> {
        if self.provider(provider_id).is_none() {
            anyhow::bail!("Provider {} is not part of calculator {}", provider_id, self.id);
        }
        Ok(Self {
            providers: self
                .providers
                .iter()
                .filter(|p| p.id != provider_id)
                .cloned()
                .collect(),
            ..self.clone()
        })
    }

    fn map_provider<F>(&self, provider_id: &str, update: F) -> Result<Self>
    where
        F: FnOnce(&ProviderConfig) -> ProviderConfig,
    {
        let current = self.provider(provider_id).with_context(|| {
            format!("Provider {} is not part of calculator {}", provider_id, self.id)
        })?;
        let updated = update(current);

        Ok(Self {
            providers: self
                .providers
                .iter()
                .map(|p| if p.id == provider_id { updated.clone() } else { p.clone() })
                .collect(),
            ..self.clone()
        })
    }

    pub fn with_model_share(&self, provider_id: &str, model: &str, percentage: f64) -> Result<Self> {
        self.map_provider(provider_id, |p| p.with_model_share(model, percentage))
    }

    pub fn with_token_share(
        &self,
        provider_id: &str,
        model: &str,
        token_type: &str,
        percentage: f64,
    ) -> Result<Self> {
        self.map_provider(provider_id, |p| p.with_token_share(model, token_type, percentage))
    }

    pub fn with_credit_mapping(&self, provider_id: &str, credit_mapping: u32) -> Result<Self> {
        self.map_provider(provider_id, |p| p.with_credit_mapping(credit_mapping))
    }

    pub fn average_profit_percentage(&self) -> f64 {
        if self.providers.is_empty() {
            return 0.0;
        }
        let total: i32 = self.providers.iter().map(|p| p.profit_percentage).sum();
        f64::from(total) / self.providers.len() as f64
    }

    pub fn average_credit_mapping(&self) -> f64 {
        if self.providers.is_empty() {
            return 0.0;
        }
        let total: u32 = self.providers.iter().map(|p| p.credit_mapping).sum();
        f64::from(total) / self.providers.len() as f64
    }

    /// Plain-text details block for sharing
    pub fn summary_text(&self) -> String {
        let providers: Vec<&str> = self.providers.iter().map(|p| p.name.as_str()).collect();
        format!(
            "Calculator: {}\nType: {}\nProviders: {}\nAverage Profit: {:.1}%",
            self.name,
            self.calculator_type.label(),
            providers.join(", "),
            self.average_profit_percentage()
        )
    }

    /// Case-insensitive match on name or description
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
    }
}
