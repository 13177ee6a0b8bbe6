use super::environment::Environment;
use anyhow::Result;
use comfy_table::{Cell, Color, Table};
use deploy_config::ServerKind;
use deploy_orchestration::{CapabilityResolver, ServerInstanceRef};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ServerRow {
    id: String,
    display_name: String,
    kind: &'static str,
    url: String,
    local: bool,
    running: Option<bool>,
}

pub async fn run(config_path: &Path, format: &str) -> Result<()> {
    if format != "table" && format != "json" {
        anyhow::bail!("Invalid format: {}. Must be 'table' or 'json'", format);
    }

    let env = Environment::load(config_path)?;
    let rows = collect(&env).await;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        display_table(&rows);
    }
    Ok(())
}

async fn collect(env: &Environment) -> Vec<ServerRow> {
    let mut rows = Vec::new();
    for id in env.registry.instance_ids() {
        let Some(entry) = env.config.servers.get(id.as_str()) else {
            continue;
        };
        let capabilities = env.registry.resolve(&id);
        let running = match &capabilities.lifecycle {
            Some(lifecycle) => Some(lifecycle.is_running().await),
            None => None,
        };
        let (url, local) = match &capabilities.descriptor {
            Some(descriptor) => (
                format!("http://{}:{}", descriptor.hostname(), descriptor.http_port()),
                descriptor.is_local(),
            ),
            None => (env.config.settings.orchestrator.default_base_url.clone(), entry.local),
        };

        rows.push(ServerRow {
            display_name: display_name(env, &id),
            id: id.to_string(),
            kind: match entry.kind {
                ServerKind::Autodeploy { .. } => "autodeploy",
            },
            url,
            local,
            running,
        });
    }
    rows
}

fn display_name(env: &Environment, id: &ServerInstanceRef) -> String {
    env.registry
        .display_name(id)
        .unwrap_or_else(|| id.to_string())
}

fn display_table(rows: &[ServerRow]) {
    let mut table = Table::new();
    table.set_header(vec!["Server", "Name", "Kind", "URL", "Local", "Status"]);

    for row in rows {
        let status = match row.running {
            Some(true) => Cell::new("running").fg(Color::Green),
            Some(false) => Cell::new("stopped").fg(Color::Red),
            None => Cell::new("unmanaged").fg(Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(&row.id),
            Cell::new(&row.display_name),
            Cell::new(row.kind),
            Cell::new(&row.url),
            Cell::new(if row.local { "yes" } else { "no" }),
            status,
        ]);
    }

    println!("{table}");
}
