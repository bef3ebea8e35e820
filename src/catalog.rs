//! # Provider Catalog Module
//!
//! Providers that can be attached to a calculator, with their models and
//! billable token types
//!
//! ## Key Components
//! - [`ProviderInfo`] - Catalog entry for each provider
//! - [`get_provider`] - Retrieve a provider by id
//! - [`provider_models`] - Models offered by a provider
//! - [`token_types`] - Token types billed by a provider

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub integrated: bool,
    pub models: &'static [&'static str],
    pub token_types: &'static [&'static str],
}

const DEFAULT_TOKEN_TYPES: &[&str] = &["input", "output"];

pub const PROVIDERS: &[ProviderInfo] = &[
    ProviderInfo {
        id: "openai",
        name: "OpenAI",
        integrated: true,
        models: &["GPT-4.1", "GPT-4.1 mini", "GPT-4.1 nano", "GPT-3.5 Turbo"],
        token_types: &["input", "output", "cached"],
    },
    ProviderInfo {
        id: "anthropic",
        name: "Anthropic",
        integrated: true,
        models: &["Claude 3 Opus", "Claude 3 Sonnet", "Claude 3 Haiku"],
        token_types: DEFAULT_TOKEN_TYPES,
    },
    ProviderInfo {
        id: "gemini",
        name: "Google Gemini",
        integrated: true,
        models: &["Gemini Pro", "Gemini Ultra", "Gemini Nano"],
        token_types: DEFAULT_TOKEN_TYPES,
    },
    ProviderInfo {
        id: "llama",
        name: "Meta Llama",
        integrated: true,
        models: &["Llama 3 70B", "Llama 3 8B", "Llama 2"],
        token_types: DEFAULT_TOKEN_TYPES,
    },
    // Listed but not yet integrated, so they can't be added to a calculator
    ProviderInfo {
        id: "mistral",
        name: "Mistral AI",
        integrated: false,
        models: &[],
        token_types: DEFAULT_TOKEN_TYPES,
    },
    ProviderInfo {
        id: "cohere",
        name: "Cohere",
        integrated: false,
        models: &[],
        token_types: DEFAULT_TOKEN_TYPES,
    },
];

lazy_static::lazy_static! {
    static ref PROVIDER_MAP: HashMap<&'static str, &'static ProviderInfo> = {
        let mut map = HashMap::new();
        for provider in PROVIDERS {
            map.insert(provider.id, provider);
        }
        map
    };
}

pub fn get_provider(provider_id: &str) -> Option<&'static ProviderInfo> {
    PROVIDER_MAP.get(provider_id).copied()
}

pub fn provider_models(provider_id: &str) -> &'static [&'static str] {
    get_provider(provider_id)
        .map(|provider| provider.models)
        .unwrap_or(&[])
}

pub fn token_types(provider_id: &str) -> &'static [&'static str] {
    get_provider(provider_id)
        .map(|provider| provider.token_types)
        .unwrap_or(DEFAULT_TOKEN_TYPES)
}
