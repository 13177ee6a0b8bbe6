use super::environment::Environment;
use anyhow::{Context, Result};
use deploy_orchestration::LoggingProgress;
use std::path::Path;

pub async fn run(config_path: &Path, module: &str, start_server: bool) -> Result<()> {
    let env = Environment::load(config_path)?;
    undeploy(&env, module, start_server).await
}

pub(crate) async fn undeploy(env: &Environment, module: &str, start_server: bool) -> Result<()> {
    let module_handle = env.module(module)?;

    let progress = LoggingProgress::new();
    env.orchestrator
        .undeploy(&module_handle, start_server, &progress)
        .await
        .with_context(|| format!("Failed to undeploy module '{}'", module))?;
    module_handle
        .clear_targets()
        .context("Failed to update deployed targets")?;

    println!("✓ Undeployed {}", module);
    Ok(())
}
