//! Health checks for mkdocs-rag.
//!
//! Provides the `doctor` command functionality:
//! - Configuration checks (provider credentials, numeric settings)
//! - Vector store reachability and collection size
//! - Model provider reachability

use anyhow::Result;

use crate::collaborators::VectorStore;
use crate::config::{ProviderKind, Settings, StoreKind};
use crate::error::RetrievalError;
use crate::providers::{GeminiClientBuilder, OllamaClientBuilder};
use crate::setup;

// ANSI color codes for terminal output
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

/// Health status for a component.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    /// Component is healthy
    Ok,
    /// Component has a warning but is functional
    Warning(String),
    /// Component is not functional
    Error(String),
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, HealthStatus::Ok)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, HealthStatus::Error(_))
    }
}

/// Configuration health information.
#[derive(Debug)]
pub struct ConfigHealth {
    pub status: HealthStatus,
    pub provider: ProviderKind,
    pub store: StoreKind,
    pub collection: String,
}

/// Vector store health information.
#[derive(Debug)]
pub struct StoreHealth {
    pub status: HealthStatus,
    /// URL or file path of the store
    pub location: String,
    pub chunk_count: Option<usize>,
}

/// Model provider health information.
#[derive(Debug)]
pub struct ProviderHealth {
    pub status: HealthStatus,
    pub endpoint: String,
    pub models: Vec<String>,
}

/// All checks of one doctor run.
#[derive(Debug)]
pub struct HealthReport {
    pub config: ConfigHealth,
    pub store: StoreHealth,
    pub provider: ProviderHealth,
}

impl HealthReport {
    /// Returns true if no check reported an error.
    pub fn is_healthy(&self) -> bool {
        !self.config.status.is_error()
            && !self.store.status.is_error()
            && !self.provider.status.is_error()
    }
}

// ============================================================================
// Health Check Functions
// ============================================================================

/// Performs all health checks and prints results.
///
/// Returns whether every check passed without errors.
pub fn run_health_checks(settings: &Settings) -> Result<bool> {
    let report = collect_report(settings);
    print_health_report(&report);
    Ok(report.is_healthy())
}

/// Runs every check against `settings`.
pub fn collect_report(settings: &Settings) -> HealthReport {
    let config = check_config(settings);

    let location = match settings.store {
        StoreKind::Chroma => settings.chroma_url.clone(),
        StoreKind::Sqlite => settings.db_path.display().to_string(),
    };
    let store = match setup::build_store(settings) {
        Ok(store) => check_store(store.as_ref(), &settings.collection, location),
        Err(e) => StoreHealth {
            status: HealthStatus::Error(format!("{e:#}")),
            location,
            chunk_count: None,
        },
    };

    let provider = match settings.provider {
        ProviderKind::Gemini => check_gemini(settings),
        ProviderKind::Ollama => check_ollama(settings),
    };

    HealthReport {
        config,
        store,
        provider,
    }
}

/// Validates settings that would otherwise only fail on the first question.
pub fn check_config(settings: &Settings) -> ConfigHealth {
    let status = if settings.provider == ProviderKind::Gemini && settings.google_api_key.is_none()
    {
        HealthStatus::Error("GOOGLE_API_KEY is not set".to_string())
    } else if settings.top_k == 0 {
        HealthStatus::Error("top-k must be at least 1".to_string())
    } else if !(0.0..=2.0).contains(&settings.temperature) {
        HealthStatus::Error(format!(
            "temperature {} is outside 0.0..=2.0",
            settings.temperature
        ))
    } else {
        HealthStatus::Ok
    };

    ConfigHealth {
        status,
        provider: settings.provider,
        store: settings.store,
        collection: settings.collection.clone(),
    }
}

/// Counts the chunks of the configured collection.
///
/// An empty collection is a warning: every answer would be the fallback.
pub fn check_store(store: &dyn VectorStore, collection: &str, location: String) -> StoreHealth {
    match store.count() {
        Ok(0) => StoreHealth {
            status: HealthStatus::Warning(format!("Collection '{collection}' is empty")),
            location,
            chunk_count: Some(0),
        },
        Ok(count) => StoreHealth {
            status: HealthStatus::Ok,
            location,
            chunk_count: Some(count),
        },
        Err(RetrievalError::CollectionNotFound { name }) => StoreHealth {
            status: HealthStatus::Error(format!("Collection '{name}' not found")),
            location,
            chunk_count: None,
        },
        Err(e) => StoreHealth {
            status: HealthStatus::Error(format!("Connection failed: {e}")),
            location,
            chunk_count: None,
        },
    }
}

fn check_gemini(settings: &Settings) -> ProviderHealth {
    let mut builder = GeminiClientBuilder::new()
        .model(&settings.gemini_model)
        .embedding_model(&settings.gemini_embedding_model);
    if let Some(key) = &settings.google_api_key {
        builder = builder.api_key(key);
    }

    let client = match builder.build() {
        Ok(c) => c,
        Err(e) => {
            return ProviderHealth {
                status: HealthStatus::Error(format!("Failed to build client: {e}")),
                endpoint: String::new(),
                models: Vec::new(),
            };
        }
    };

    let endpoint = client.base_url().to_string();
    let mut models = Vec::new();
    for model in [client.model(), client.embedding_model()] {
        match client.model_info(model) {
            Ok(info) => models.push(info.display_name.unwrap_or(info.name)),
            Err(e) => {
                return ProviderHealth {
                    status: HealthStatus::Error(format!("Model '{model}' unavailable: {e}")),
                    endpoint,
                    models,
                };
            }
        }
    }

    ProviderHealth {
        status: HealthStatus::Ok,
        endpoint,
        models,
    }
}

fn check_ollama(settings: &Settings) -> ProviderHealth {
    let client = match OllamaClientBuilder::new()
        .base_url(&settings.ollama_host)
        .model(&settings.ollama_model)
        .embedding_model(&settings.ollama_embedding_model)
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            return ProviderHealth {
                status: HealthStatus::Error(format!("Failed to build client: {e}")),
                endpoint: String::new(),
                models: Vec::new(),
            };
        }
    };

    let endpoint = client.base_url().to_string();

    match client.list_models() {
        Ok(models) => {
            let missing: Vec<&str> = [client.model(), client.embedding_model()]
                .into_iter()
                .filter(|wanted| !models.iter().any(|m| model_matches(m, wanted)))
                .collect();
            let status = if models.is_empty() {
                HealthStatus::Warning("No models installed".to_string())
            } else if !missing.is_empty() {
                HealthStatus::Warning(format!("Missing models: {}", missing.join(", ")))
            } else {
                HealthStatus::Ok
            };
            ProviderHealth {
                status,
                endpoint,
                models,
            }
        }
        Err(e) => ProviderHealth {
            status: HealthStatus::Error(format!("Connection failed: {e}")),
            endpoint,
            models: Vec::new(),
        },
    }
}

/// Ollama reports `name:tag`; a bare configured name means `:latest`.
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || (!wanted.contains(':') && installed == format!("{wanted}:latest"))
}

// ============================================================================
// Pretty Printing
// ============================================================================

fn status_symbol(status: &HealthStatus) -> &'static str {
    match status {
        HealthStatus::Ok => "\u{2713}",
        HealthStatus::Warning(_) => "!",
        HealthStatus::Error(_) => "\u{2717}",
    }
}

fn status_color(status: &HealthStatus) -> &'static str {
    match status {
        HealthStatus::Ok => GREEN,
        HealthStatus::Warning(_) => YELLOW,
        HealthStatus::Error(_) => RED,
    }
}

fn status_text(status: &HealthStatus, ok: &str) -> String {
    match status {
        HealthStatus::Ok => ok.to_string(),
        HealthStatus::Warning(w) => w.clone(),
        HealthStatus::Error(e) => e.clone(),
    }
}

fn print_status_line(label: &str, status: &HealthStatus, ok: &str) {
    println!(
        "  {}{}{} {}: {}",
        status_color(status),
        status_symbol(status),
        RESET,
        label,
        status_text(status, ok)
    );
}

fn print_health_report(report: &HealthReport) {
    println!("{}mkdocs-rag doctor{}", BOLD, RESET);
    println!();

    // Configuration section
    let config = &report.config;
    println!("{}Configuration{}", BOLD, RESET);
    print_status_line("Settings", &config.status, "OK");
    println!(
        "    {}Provider: {:?}  Store: {:?}  Collection: {}{}",
        DIM, config.provider, config.store, config.collection, RESET
    );
    println!();

    // Store section
    let store = &report.store;
    println!("{}Vector store{}", BOLD, RESET);
    print_status_line("Status", &store.status, "Connected");
    println!("    {}Location: {}{}", DIM, store.location, RESET);
    if let Some(count) = store.chunk_count {
        println!("    {}Chunks: {}{}", DIM, count, RESET);
    }
    println!();

    // Provider section
    let provider = &report.provider;
    println!("{}Model provider{}", BOLD, RESET);
    print_status_line("Status", &provider.status, "Connected");
    if !provider.endpoint.is_empty() {
        println!("    {}URL: {}{}", DIM, provider.endpoint, RESET);
    }
    if !provider.models.is_empty() {
        let models_display = if provider.models.len() > 3 {
            format!(
                "{}, ... ({} more)",
                provider.models[..3].join(", "),
                provider.models.len() - 3
            )
        } else {
            provider.models.join(", ")
        };
        println!("    {}Models: {}{}", DIM, models_display, RESET);
    }
}

// ============================================================================
// Tests
// ============================================================================
