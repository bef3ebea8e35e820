//! # Calculator Store Module
//!
//! Keeps saved calculators in a local JSON file
//!
//! ## Key Components
//! - [`CalculatorStore`] - Loaded set of calculators with CRUD helpers
//! - [`resolve_store_path`] - Flag / env var / config dir lookup
//! - [`example_calculators`] - Sample calculators for a fresh store

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::calculator::{Calculator, CalculatorDraft, CalculatorType, ProviderConfig};
use crate::distribution::{Percentage, WeightedCollection};
use crate::pricing::profit_from_credit_mapping;

pub const STORE_ENV_VAR: &str = "LLM_PRICING_CALC_STORE";

lazy_static::lazy_static! {
    static ref CALCULATOR_ID: Regex = Regex::new(r"^calc-(\d+)$").expect("valid id pattern");
}

/// `--store` flag, then `LLM_PRICING_CALC_STORE`, then the user config dir
pub fn resolve_store_path(flag: Option<&str>) -> PathBuf {
    if let Some(path) = flag {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(STORE_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    let config_dir = dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    config_dir.join("llm-pricing-calc").join("calculators.json")
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CalculatorStore {
    #[serde(default)]
    pub calculators: Vec<Calculator>,
}

impl CalculatorStore {
    /// A missing file is an empty store
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No calculator store at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read calculator store {}", path.display()))?;
        let store: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse calculator store {}", path.display()))?;

        for calculator in &store.calculators {
            for provider in &calculator.providers {
                provider.validate().with_context(|| {
                    format!("Calculator {} in {} is invalid", calculator.id, path.display())
                })?;
            }
        }

        debug!("Loaded {} calculators from {}", store.calculators.len(), path.display());
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize calculators")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write calculator store {}", path.display()))?;

        debug!("Saved {} calculators to {}", self.calculators.len(), path.display());
        Ok(())
    }

    fn next_id(&self) -> String {
        let highest = self
            .calculators
            .iter()
            .filter_map(|c| CALCULATOR_ID.captures(&c.id))
            .filter_map(|caps| caps[1].parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        format!("calc-{}", highest + 1)
    }

    pub fn create(&mut self, draft: CalculatorDraft) -> Result<&Calculator> {
        draft.validate()?;

        let id = self.next_id();
        debug!("Creating calculator {} ({})", id, draft.name);
        self.calculators.push(Calculator::from_draft(id, draft, Utc::now()));

        self.calculators
            .last()
            .context("Calculator missing right after insert")
    }

    pub fn get(&self, id: &str) -> Option<&Calculator> {
        self.calculators.iter().find(|c| c.id == id)
    }

    pub fn get_required(&self, id: &str) -> Result<&Calculator> {
        self.get(id)
            .with_context(|| format!("No calculator with id {}", id))
    }

    /// Replace the stored calculator with the same id and bump its timestamp
    pub fn update(&mut self, calculator: Calculator) -> Result<&Calculator> {
        calculator.validate()?;

        let slot = self
            .calculators
            .iter_mut()
            .find(|c| c.id == calculator.id)
            .with_context(|| format!("No calculator with id {}", calculator.id))?;

        *slot = Calculator {
            updated_at: Utc::now(),
            ..calculator
        };
        Ok(slot)
    }

    pub fn delete(&mut self, id: &str) -> Result<Calculator> {
        let index = self
            .calculators
            .iter()
            .position(|c| c.id == id)
            .with_context(|| format!("No calculator with id {}", id))?;
        Ok(self.calculators.remove(index))
    }

    /// `None` for the type matches every calculator
    pub fn filter(&self, query: &str, calculator_type: Option<CalculatorType>) -> Vec<&Calculator> {
        self.calculators
            .iter()
            .filter(|c| c.matches_query(query))
            .filter(|c| calculator_type.is_none_or(|t| c.calculator_type == t))
            .collect()
    }

    /// Add the sample calculators whose ids are not taken yet, returning how many were added
    pub fn seed_examples(&mut self) -> Result<usize> {
        let mut added = 0;
        for example in example_calculators()? {
            if self.get(&example.id).is_none() {
                self.calculators.push(example);
                added += 1;
            }
        }
        Ok(added)
    }
}

fn shares(pairs: &[(&str, u8)]) -> WeightedCollection {
    WeightedCollection::from_pairs(
        pairs
            .iter()
            .map(|(key, value)| (*key, Percentage::clamped(f64::from(*value)))),
    )
}

fn timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp {}", value))?
        .with_timezone(&Utc))
}

fn example_provider(
    id: &str,
    name: &str,
    models: &[(&str, u8)],
    tokens: &[(&str, &[(&str, u8)])],
    credit_mapping: u32,
) -> ProviderConfig {
    let token_distributions: BTreeMap<String, WeightedCollection> = tokens
        .iter()
        .map(|(model, split)| (model.to_string(), shares(split)))
        .collect();

    ProviderConfig {
        id: id.to_string(),
        name: name.to_string(),
        models: shares(models),
        token_distributions,
        credit_mapping,
        profit_percentage: profit_from_credit_mapping(credit_mapping),
    }
}

pub fn example_calculators() -> Result<Vec<Calculator>> {
    Ok(vec![
        Calculator {
            id: "calc-1".to_string(),
            name: "Enterprise SaaS Pricing".to_string(),
            description: "Pricing calculator for enterprise customers with service-level billing".to_string(),
            calculator_type: CalculatorType::Service,
            providers: vec![example_provider(
                "openai",
                "OpenAI",
                &[("GPT-4.1", 30), ("GPT-4.1 mini", 40), ("GPT-4.1 nano", 30)],
                &[
                    ("GPT-4.1", &[("input", 30), ("output", 60), ("cached", 10)]),
                    ("GPT-4.1 mini", &[("input", 40), ("output", 50), ("cached", 10)]),
                    ("GPT-4.1 nano", &[("input", 50), ("output", 40), ("cached", 10)]),
                ],
                400,
            )],
            created_at: timestamp("2023-10-15T10:30:00Z")?,
            updated_at: timestamp("2023-10-20T14:45:00Z")?,
        },
        Calculator {
            id: "calc-2".to_string(),
            name: "Team Collaboration Tool".to_string(),
            description: "Organization-level pricing for team collaboration platform".to_string(),
            calculator_type: CalculatorType::Organization,
            providers: vec![example_provider(
                "anthropic",
                "Anthropic",
                &[("Claude 3 Opus", 20), ("Claude 3 Sonnet", 50), ("Claude 3 Haiku", 30)],
                &[
                    ("Claude 3 Opus", &[("input", 40), ("output", 60)]),
                    ("Claude 3 Sonnet", &[("input", 45), ("output", 55)]),
                    ("Claude 3 Haiku", &[("input", 50), ("output", 50)]),
                ],
                350,
            )],
            created_at: timestamp("2023-11-05T09:15:00Z")?,
            updated_at: timestamp("2023-11-10T16:20:00Z")?,
        },
        Calculator {
            id: "calc-3".to_string(),
            name: "AI Writing Assistant".to_string(),
            description: "User-level pricing for AI writing assistant".to_string(),
            calculator_type: CalculatorType::User,
            providers: vec![
                example_provider(
                    "openai",
                    "OpenAI",
                    &[("GPT-4.1", 20), ("GPT-3.5 Turbo", 80)],
                    &[
                        ("GPT-4.1", &[("input", 30), ("output", 70)]),
                        ("GPT-3.5 Turbo", &[("input", 40), ("output", 60)]),
                    ],
                    450,
                ),
                example_provider(
                    "anthropic",
                    "Anthropic",
                    &[("Claude 3 Haiku", 100)],
                    &[("Claude 3 Haiku", &[("input", 40), ("output", 60)])],
                    400,
                ),
            ],
            created_at: timestamp("2023-12-01T11:45:00Z")?,
            updated_at: timestamp("2023-12-15T13:30:00Z")?,
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn draft(name: &str, calculator_type: CalculatorType) -> CalculatorDraft {
        CalculatorDraft::new(name, format!("{} description", name), calculator_type)
            .with_provider("openai")
            .unwrap()
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = CalculatorStore::load(&temp_dir.path().join("none.json")).unwrap();
        assert!(store.calculators.is_empty());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("calculators.json");

        let mut store = CalculatorStore::default();
        store.create(draft("Chat", CalculatorType::Service)).unwrap();
        store.save(&path).unwrap();

        let loaded = CalculatorStore::load(&path).unwrap();
        assert_eq!(loaded.calculators, store.calculators);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("calculators.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(CalculatorStore::load(&path).is_err());
    }

    #[test]
    fn test_load_rejects_repeated_model_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("calculators.json");

        let mut store = CalculatorStore::default();
        store.create(draft("Chat", CalculatorType::Service)).unwrap();
        let mut json = serde_json::to_value(&store).unwrap();
        json["calculators"][0]["providers"][0]["models"][1]["key"] = "GPT-4.1".into();
        fs::write(&path, json.to_string()).unwrap();

        let err = CalculatorStore::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("duplicate distribution key 'GPT-4.1'"));
    }

    #[test]
    fn test_load_rejects_inconsistent_credit_mapping() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("calculators.json");

        let mut store = CalculatorStore::default();
        store.create(draft("Chat", CalculatorType::Service)).unwrap();
        let mut json = serde_json::to_value(&store).unwrap();
        json["calculators"][0]["providers"][0]["creditMapping"] = 5000.into();
        fs::write(&path, json.to_string()).unwrap();

        let err = CalculatorStore::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Calculator calc-1"));
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let mut store = CalculatorStore::default();
        assert_eq!(store.create(draft("One", CalculatorType::Service)).unwrap().id, "calc-1");
        assert_eq!(store.create(draft("Two", CalculatorType::User)).unwrap().id, "calc-2");

        store.delete("calc-1").unwrap();
        assert_eq!(store.create(draft("Three", CalculatorType::User)).unwrap().id, "calc-3");
    }

    #[test]
    fn test_create_rejects_invalid_draft() {
        let mut store = CalculatorStore::default();
        let invalid = CalculatorDraft::new("No providers", "Still empty", CalculatorType::Service);
        assert!(store.create(invalid).is_err());
        assert!(store.calculators.is_empty());
    }

    #[test]
    fn test_update_replaces_and_bumps_timestamp() {
        let mut store = CalculatorStore::default();
        store.seed_examples().unwrap();

        let original = store.get("calc-1").unwrap().clone();
        let changed = original.with_credit_mapping("openai", 300).unwrap();
        let updated = store.update(changed).unwrap();

        assert_eq!(updated.provider("openai").unwrap().profit_percentage, 40);
        assert!(updated.updated_at > original.updated_at);
        assert_eq!(updated.created_at, original.created_at);
    }

    #[test]
    fn test_update_and_delete_unknown_id_fail() {
        let mut store = CalculatorStore::default();
        store.seed_examples().unwrap();

        let mut ghost = store.get("calc-1").unwrap().clone();
        ghost.id = "calc-99".to_string();
        assert!(store.update(ghost).is_err());
        assert!(store.delete("calc-99").is_err());
    }

    #[test]
    fn test_filter_by_query_and_type() {
        let mut store = CalculatorStore::default();
        store.seed_examples().unwrap();

        assert_eq!(store.filter("", None).len(), 3);
        assert_eq!(store.filter("WRITING", None).len(), 1);
        assert_eq!(store.filter("pricing", None).len(), 3);
        assert_eq!(store.filter("pricing", Some(CalculatorType::Organization)).len(), 1);
        assert!(store.filter("nothing matches", None).is_empty());
    }

    #[test]
    fn test_seed_is_idempotent_and_balanced() {
        let mut store = CalculatorStore::default();
        assert_eq!(store.seed_examples().unwrap(), 3);
        assert_eq!(store.seed_examples().unwrap(), 0);

        for calculator in &store.calculators {
            assert!(calculator.validate().is_ok(), "{}", calculator.id);
            for provider in &calculator.providers {
                assert!(provider.models.is_balanced(), "{} {}", calculator.id, provider.id);
                for split in provider.token_distributions.values() {
                    assert!(split.is_balanced());
                }
            }
        }
    }

    #[test]
    fn test_store_path_prefers_flag() {
        assert_eq!(
            resolve_store_path(Some("/tmp/custom.json")),
            PathBuf::from("/tmp/custom.json")
        );
    }

    // The only test that touches the env var, so the steps run in sequence
    #[test]
    fn test_store_path_env_then_config_dir() {
        let default_tail = Path::new("llm-pricing-calc").join("calculators.json");

        unsafe { std::env::set_var(STORE_ENV_VAR, "/tmp/from-env.json") };
        assert_eq!(resolve_store_path(None), PathBuf::from("/tmp/from-env.json"));
        assert_eq!(
            resolve_store_path(Some("/tmp/custom.json")),
            PathBuf::from("/tmp/custom.json")
        );

        unsafe { std::env::set_var(STORE_ENV_VAR, "   ") };
        assert!(resolve_store_path(None).ends_with(&default_tail));

        unsafe { std::env::remove_var(STORE_ENV_VAR) };
        let default_path = resolve_store_path(None);
        assert!(default_path.ends_with(&default_tail), "{}", default_path.display());
        if let Some(config_dir) = dirs::config_dir() {
            assert_eq!(default_path, config_dir.join(&default_tail));
        }
    }
}
