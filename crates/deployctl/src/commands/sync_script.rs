use super::environment::Environment;
use anyhow::{Context, Result};
use deploy_orchestration::{
    CapabilityResolver, ContentSynchronizer, ModuleType, ServerInstanceRef,
    regenerate_deploy_script,
};
use std::path::Path;

pub async fn run(
    config_path: &Path,
    server: &str,
    output: &Path,
    module_type: ModuleType,
) -> Result<()> {
    let env = Environment::load(config_path)?;
    sync_script(&env, server, output, module_type)
}

pub(crate) fn sync_script(
    env: &Environment,
    server: &str,
    output: &Path,
    module_type: ModuleType,
) -> Result<()> {
    let server_ref = ServerInstanceRef::new(server);
    if !env.registry.contains(&server_ref) {
        anyhow::bail!("Server '{}' is not configured", server);
    }

    let capabilities = env.registry.resolve(&server_ref);
    let result = regenerate_deploy_script(
        &ContentSynchronizer::new(),
        output,
        &server_ref,
        &capabilities,
        module_type,
    )
    .with_context(|| format!("Failed to write {}", output.display()))?;

    if result.written {
        println!("✓ Wrote {}", output.display());
    } else {
        println!("✓ {} is up to date", output.display());
    }
    Ok(())
}
