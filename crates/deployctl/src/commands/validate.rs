use anyhow::{Context, Result};
use deploy_config::{parser, resolver};
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating {}...", config_path.display());

    let config = parser::parse_file(config_path).context("Failed to parse configuration")?;

    println!("✓ Configuration valid");
    println!("  Version: {}", config.version);
    if let Some(name) = &config.name {
        println!("  Name: {}", name);
    }
    println!("  Servers: {}", config.servers.len());
    println!("  Modules: {}", config.modules.len());

    for (name, module) in &config.modules {
        if module.server.is_none() {
            println!("  ⚠ Module '{}' has no target server", name);
        }
    }

    let missing: Vec<String> = resolver::find_env_references(&config)
        .into_iter()
        .filter(|var| std::env::var(var).is_err())
        .collect();
    if !missing.is_empty() {
        println!(
            "  ⚠ Environment variables without a value (defaults may apply): {}",
            missing.join(", ")
        );
    }

    Ok(())
}
