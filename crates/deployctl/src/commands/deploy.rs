use super::environment::Environment;
use anyhow::{Context, Result};
use deploy_orchestration::{DeployRequest, DeploymentMode, LoggingProgress};
use std::path::Path;

pub async fn run(
    config_path: &Path,
    module: &str,
    mode: DeploymentMode,
    force: bool,
    url_part: Option<String>,
) -> Result<()> {
    let env = Environment::load(config_path)?;
    deploy(&env, module, mode, force, url_part.as_deref()).await
}

pub(crate) async fn deploy(
    env: &Environment,
    module: &str,
    mode: DeploymentMode,
    force: bool,
    url_part: Option<&str>,
) -> Result<()> {
    let module_handle = env.module(module)?;

    let mut request = DeployRequest::new(&module_handle)
        .with_mode(mode)
        .with_force_redeploy(force);
    if let Some(part) = url_part {
        request = request.with_client_url_part(part);
    }

    let progress = LoggingProgress::new();
    let outcome = env
        .orchestrator
        .deploy(request, &progress)
        .await
        .with_context(|| format!("Failed to deploy module '{}'", module))?;

    println!("✓ Deployed {} ({})", module, mode);
    for target in &outcome.targets {
        println!("  Target: {}", target);
    }
    println!("  URL: {}", outcome.client_url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::environment::tests::environment;
    use deploy_orchestration::TargetModuleId;

    #[smol_potat::test]
    async fn test_deploy_copies_archive_and_persists_targets() {
        let dir = tempfile::tempdir().unwrap();
        let env = environment(dir.path());

        deploy(&env, "shop", DeploymentMode::Run, false, None).await.unwrap();

        assert!(dir.path().join("autodeploy").join("shop.war").exists());
        assert_eq!(
            env.module("shop").unwrap().stored_targets().unwrap(),
            vec![TargetModuleId::new("local#shop")]
        );
    }

    #[smol_potat::test]
    async fn test_deploy_unknown_module() {
        let dir = tempfile::tempdir().unwrap();
        let env = environment(dir.path());

        assert!(deploy(&env, "billing", DeploymentMode::Run, false, None).await.is_err());
    }
}
