// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use mirror_core::domain::mirror_config::{MirrorConfigManifest, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long, conflicts_with = "json")]
        yaml: bool,

        /// Print the effective configuration as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./mirror-config.yaml)
        #[arg(short, long, default_value = "./mirror-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml, json } => show(config_override, paths, yaml, json).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(
    config_override: Option<PathBuf>,
    show_paths: bool,
    yaml: bool,
    json: bool,
) -> Result<()> {
    let config = MirrorConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if yaml {
        print!("{}", config.to_yaml_string()?);
        return Ok(());
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./mirror-config.yaml");
        println!("  4. ~/.mirror/config.yaml");
        println!("  5. /etc/mirror/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Agent:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    let radar = &config.spec.radar;
    println!("{}", "Radar:".bold());
    println!("  Control port: {}", radar.port);
    println!("  Data port: {}", radar.mirror_port);
    println!("  Connect timeout: {:?}", radar.connect_timeout);
    if radar.nodes.is_empty() {
        println!("  Node addresses: {}", "(dial by node name)".dimmed());
    } else {
        println!("  Node addresses:");
        for (node, address) in &radar.nodes {
            println!("    {} → {}", node, address);
        }
    }
    println!();

    println!("{}", "Sync Engine:".bold());
    println!(
        "  {}",
        config.spec.engine.invocation(radar.mirror_port, "<local>", "<remote>")
    );
    println!();

    let session = &config.spec.session;
    println!("{}", "Session:".bold());
    println!("  Max connection retries: {}", session.max_connection_retries);
    println!("  Reload debounce: {:?}", session.reload_debounce);
    println!("  Reload trigger: {:?}", session.reload_trigger);
    println!();

    println!("{}", "Containers:".bold());
    if config.spec.containers.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for entry in &config.spec.containers {
        println!(
            "  {}/{}:{} on {} ({})",
            entry.namespace,
            entry.pod.bold(),
            entry.container,
            entry.node,
            entry.id.dimmed()
        );
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = MirrorConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_are_valid_configs() {
        for template in [
            include_str!("../../templates/config-minimal.yaml"),
            include_str!("../../templates/config-with-examples.yaml"),
        ] {
            let config = MirrorConfigManifest::from_yaml_str(template).unwrap();
            config.validate().unwrap();
        }
    }

    #[tokio::test]
    async fn test_generate_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("mirror-config.yaml");

        generate(output.clone(), true).await.unwrap();

        let config = MirrorConfigManifest::from_yaml_file(&output).unwrap();
        assert!(!config.spec.containers.is_empty());
        validate(Some(output)).await.unwrap();
    }
}
