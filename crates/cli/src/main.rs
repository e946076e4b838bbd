//! `shelfmark` -- QR labels for a location/area/section/item inventory.
//!
//! # Environment variables
//!
//! | Variable                | Required | Default            | Description                      |
//! |-------------------------|----------|--------------------|----------------------------------|
//! | `SHELFMARK_DATA_DIR`    | no       | `./shelfmark-data` | Directory holding the data files |
//! | `SHELFMARK_POOL_PREFIX` | no       | --                 | Default prefix for `pool generate` |
//! | `RUST_LOG`              | no       | `shelfmark=info`   | Log filter                       |

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shelfmark_cli::cli::Cli;
use shelfmark_cli::commands::{self, Context};
use shelfmark_cli::config::CliConfig;
use shelfmark_store::{FileStore, InventoryService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shelfmark=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = CliConfig::from_env().with_data_dir(cli.data_dir.clone());

    tracing::debug!(data_dir = %config.data_dir.display(), "Opening data directory");

    let service = InventoryService::load(FileStore::new(&config.data_dir)).await?;
    let ctx = Context {
        service,
        config,
        json: cli.json,
    };

    let mut stdout = std::io::stdout().lock();
    commands::run(cli.command, &ctx, &mut stdout).await
}
