use std::error::Error;

use azure_data_cosmos_store::{
    CosmosStoreClient, CosmosStoreClientMethods, PartitionKey, QueryOptions,
};
use clap::{Args, Subcommand};
use futures::TryStreamExt;

/// Run a query against a container.
#[derive(Clone, Args)]
pub struct QueryCommand {
    #[command(subcommand)]
    subcommand: Subcommands,
}

#[derive(Clone, Subcommand)]
enum Subcommands {
    /// Print every matching item, page by page.
    Items {
        /// The container to query.
        container: String,

        /// The query to execute.
        query: String,

        /// The partition key to scope the query to. Omit it to query every partition.
        #[arg(long, short)]
        partition_key: Option<String>,

        /// An upper bound on items per page.
        #[arg(long)]
        max_item_count: Option<u32>,
    },
    /// Print the single value produced by a query such as `SELECT VALUE COUNT(1) FROM c`.
    Scalar {
        /// The container to query.
        container: String,

        /// The query to execute.
        query: String,

        /// The partition key to scope the query to. Required for aggregates.
        #[arg(long, short)]
        partition_key: Option<String>,
    },
}

impl QueryCommand {
    pub async fn run(self, client: &CosmosStoreClient) -> Result<(), Box<dyn Error>> {
        match self.subcommand {
            Subcommands::Items {
                container,
                query,
                partition_key,
                max_item_count,
            } => {
                let options = QueryOptions {
                    max_item_count,
                    ..Default::default()
                };
                let pages = client
                    .query_iterator::<serde_json::Value>(
                        &container,
                        query,
                        partition_key.map(PartitionKey::from),
                        Some(options),
                    )?
                    .into_stream();
                let mut pages = std::pin::pin!(pages);
                while let Some(page) = pages.try_next().await? {
                    println!("Results Page ({:.2} RU)", page.request_charge());
                    println!("  Items:");
                    for item in page.into_items() {
                        println!("    * {:#?}", item);
                    }
                }
                println!("Total request charge: {:.2}", client.cost_accountant().total());
                Ok(())
            }
            Subcommands::Scalar {
                container,
                query,
                partition_key,
            } => {
                let value: serde_json::Value = client
                    .query_scalar(
                        &container,
                        query,
                        partition_key.map(PartitionKey::from),
                        None,
                    )
                    .await?;
                println!("{value}");
                Ok(())
            }
        }
    }
}
