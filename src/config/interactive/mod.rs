
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};
use std::path::Path;

use super::{Config, ConfigError, EmbeddingConfig, GenerationConfig};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Doc QA Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Embedding Provider").bold().yellow());
    eprintln!("Configure the feature-extraction endpoint used to embed document chunks.");
    eprintln!();

    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Language Models").bold().yellow());
    eprintln!("Models are tried in order; the first one that answers wins.");
    eprintln!();

    configure_generation(&mut config.generation)?;

    eprintln!();
    report_api_key("Embedding", &config.embedding.api_key_env);
    report_api_key("Generation", &config.generation.api_key_env);

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Settings:").bold().yellow());
    eprintln!("  Endpoint: {}", style(&config.embedding.endpoint).cyan());
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());
    eprintln!(
        "  API key variable: {} ({})",
        style(&config.embedding.api_key_env).cyan(),
        key_status(config.embedding.api_key().is_some())
    );

    eprintln!();
    eprintln!("{}", style("Generation Settings:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.generation.base_url).cyan());
    eprintln!(
        "  API key variable: {} ({})",
        style(&config.generation.api_key_env).cyan(),
        key_status(config.generation.api_key().is_some())
    );
    for (position, model) in config.generation.models.iter().enumerate() {
        eprintln!("  Model #{}: {}", position + 1, style(model).cyan());
    }
    eprintln!(
        "  Temperature: {}  top_p: {}",
        style(config.generation.temperature).cyan(),
        style(config.generation.top_p).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Chunking & Retrieval:").bold().yellow());
    eprintln!(
        "  Chunk length: {} chars, overlap: {} words",
        style(config.chunking.max_length).cyan(),
        style(config.chunking.overlap_words).cyan()
    );
    eprintln!(
        "  Top-k: {} primary / {} per keyword, up to {} keywords",
        style(config.retrieval.primary_top_k).cyan(),
        style(config.retrieval.keyword_top_k).cyan(),
        style(config.retrieval.max_keywords).cyan()
    );
    eprintln!(
        "  Context: {} extracts ({} high relevance)",
        style(config.retrieval.context_limit).cyan(),
        style(config.retrieval.high_relevance_count).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn key_status(present: bool) -> console::StyledObject<&'static str> {
    if present {
        style("set").green()
    } else {
        style("not set").red()
    }
}

fn report_api_key(label: &str, variable: &str) {
    if std::env::var(variable).is_ok_and(|value| !value.trim().is_empty()) {
        eprintln!(
            "{}",
            style(format!("✓ {} API key found in ${}", label, variable)).green()
        );
    } else {
        eprintln!(
            "{}",
            style(format!("⚠ Warning: ${} is not set", variable)).yellow()
        );
        eprintln!("Export it before ingesting documents or asking questions.");
    }
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No valid configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Loaded configuration.").green());
            Ok(config)
        },
    )
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let endpoint: String = Input::new()
        .with_prompt("Embedding endpoint URL")
        .default(embedding.endpoint.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            EmbeddingConfig {
                endpoint: input.clone(),
                ..EmbeddingConfig::default()
            }
            .endpoint_url()
            .map(|_| ())
        })
        .interact_text()?;

    let api_key_env: String = Input::new()
        .with_prompt("Environment variable holding the embedding API key")
        .default(embedding.api_key_env.clone())
        .interact_text()?;

    let dimension: u32 = Input::new()
        .with_prompt("Index vector dimension")
        .default(embedding.dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 64 and 4096")
            }
        })
        .interact_text()?;

    embedding.set_endpoint(endpoint)?;
    embedding.set_api_key_env(api_key_env)?;
    embedding.set_dimension(dimension)?;

    Ok(())
}

fn configure_generation(generation: &mut GenerationConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("Chat completion base URL")
        .default(generation.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            GenerationConfig {
                base_url: input.clone(),
                ..GenerationConfig::default()
            }
            .base_url()
            .map(|_| ())
        })
        .interact_text()?;

    let api_key_env: String = Input::new()
        .with_prompt("Environment variable holding the generation API key")
        .default(generation.api_key_env.clone())
        .interact_text()?;

    let models: String = Input::new()
        .with_prompt("Models in fallback order (comma separated)")
        .default(generation.models.join(", "))
        .validate_with(|input: &String| -> Result<(), &str> {
            if parse_model_list(input).is_empty() {
                Err("At least one model is required")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    generation.set_base_url(base_url)?;
    generation.set_api_key_env(api_key_env)?;
    generation.set_models(parse_model_list(&models))?;

    Ok(())
}

fn parse_model_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .map(ToString::to_string)
        .collect()
}
