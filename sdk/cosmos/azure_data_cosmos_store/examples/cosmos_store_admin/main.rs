// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::{error::Error, path::PathBuf};

use azure_data_cosmos_store::{ClientConfig, CosmosStoreClient, CosmosStoreClientMethods};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod delete;
mod query;

/// An operator tool for a Cosmos DB store.
#[derive(Parser)]
struct ProgramArgs {
    /// The TOML configuration file. Settings may also come from `COSMOS_STORE_*` variables.
    #[arg(long, short, env = "COSMOS_STORE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    subcommand: Subcommands,
}

#[derive(Subcommand)]
enum Subcommands {
    /// Print the client's diagnostics report.
    Diagnostics {
        /// Render the report as HTML.
        #[arg(long)]
        html: bool,
    },
    Query(query::QueryCommand),
    Delete(delete::DeleteCommand),
}

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = ProgramArgs::parse();
    let config = match &args.config {
        Some(path) => ClientConfig::load_from_path(path)?,
        None => ClientConfig::from_env()?,
    };

    let client = CosmosStoreClient::new(config, None);
    client.init(None).await?;

    match args.subcommand {
        Subcommands::Diagnostics { html } => {
            let report = client.diagnostics();
            if html {
                print!("{}", report.to_html());
            } else {
                print!("{report}");
            }
            Ok(())
        }
        Subcommands::Query(cmd) => cmd.run(&client).await,
        Subcommands::Delete(cmd) => cmd.run(&client).await,
    }
}
