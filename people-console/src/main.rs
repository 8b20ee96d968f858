use std::sync::Arc;

use anyhow::Context;
use people_console::api::PeopleQuery;
use people_console::{ConsoleConfig, HttpPeopleApi, PeopleConsole};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "people_console=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ConsoleConfig::from_env()?;
    info!(base_url = %config.base_url, page_size = config.page_size, "people-console starting");

    let api = Arc::new(HttpPeopleApi::new(&config).context("Failed to build HTTP client")?);
    let search = std::env::args().nth(1);
    let query = PeopleQuery {
        search,
        limit: u64::from(config.page_size),
        ..PeopleQuery::default()
    };

    let console = PeopleConsole::new(api, config);
    if let Err(notice) = console.load_table(query).await {
        anyhow::bail!("Failed to load people: {}", notice.message);
    }

    let table = console.table().await;
    info!(
        rows = table.rows.len(),
        total = table.total,
        "People loaded"
    );
    for row in console.rows().await {
        info!(
            person_id = row.person.person_id,
            email = %row.person.person_email,
            entities = row.person.entities.len(),
            edit = row.actions.edit,
            delete = row.actions.delete,
            "row"
        );
    }

    for effect in console.drain_effects().await {
        info!(effect = %serde_json::to_string(&effect)?, "pending effect");
    }
    Ok(())
}
