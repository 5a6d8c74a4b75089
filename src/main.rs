use anyhow::{bail, Context};
use design_at_version::config::AppConfig;
use design_at_version::logic::DesignAtVersionLoader;
use design_at_version::model::IssueId;
use design_at_version::store::PostgresStore;
use std::sync::Arc;

const USAGE: &str = "usage: dav [--issue <id>] <design_id.version_id>...";

struct Args {
    issue_id: Option<IssueId>,
    identities: Vec<String>,
}

fn parse_args(raw: impl IntoIterator<Item = String>) -> anyhow::Result<Args> {
    let mut issue_id = None;
    let mut identities = Vec::new();
    let mut raw = raw.into_iter();

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--issue" => {
                let value = raw.next().context(USAGE)?;
                issue_id = Some(
                    value
                        .parse::<IssueId>()
                        .with_context(|| format!("invalid issue id {:?}", value))?,
                );
            }
            "-h" | "--help" => bail!(USAGE),
            _ => identities.push(arg),
        }
    }

    if identities.is_empty() {
        bail!(USAGE);
    }
    Ok(Args {
        issue_id,
        identities,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with explicit filter to suppress sqlx debug logs
    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .parse_default_env()
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    let config = AppConfig::load()?;
    let database_url = config.database_url()?;
    let store = Arc::new(PostgresStore::connect(&database_url, &config.database).await?);

    let loader = DesignAtVersionLoader::new(store.clone());
    let pending: Vec<_> = args
        .identities
        .iter()
        .map(|identity| loader.load_identity(identity))
        .collect();
    loader.dispatch().await?;

    for load in pending {
        let found = load
            .await?
            .filter(|dav| args.issue_id.map_or(true, |id| dav.design.issue_id == id));
        println!("{}", serde_json::to_string(&found)?);
    }

    log::info!(
        "Resolved {} identities with {} queries",
        args.identities.len(),
        store.queries_executed()
    );
    Ok(())
}
