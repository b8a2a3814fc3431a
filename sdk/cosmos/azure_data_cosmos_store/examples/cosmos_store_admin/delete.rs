use std::error::Error;

use azure_data_cosmos_store::{
    Confirmation, CosmosStoreClient, CosmosStoreClientMethods, ErrorKind,
};
use clap::{Args, Subcommand};

/// Destructive operations. Each one requires `--confirm` naming its target.
#[derive(Clone, Args)]
pub struct DeleteCommand {
    #[command(subcommand)]
    subcommand: Subcommands,
}

#[derive(Clone, Subcommand)]
enum Subcommands {
    /// Delete the configured database and everything in it.
    Database {
        /// Must repeat the configured database id.
        #[arg(long)]
        confirm: String,
    },
    /// Delete every item in a container, keeping the container.
    AllItems {
        /// The container to empty.
        container: String,

        /// Must repeat the container id.
        #[arg(long)]
        confirm: String,
    },
}

impl DeleteCommand {
    pub async fn run(self, client: &CosmosStoreClient) -> Result<(), Box<dyn Error>> {
        match self.subcommand {
            Subcommands::Database { confirm } => {
                client
                    .delete_database(&Confirmation::new(confirm), None)
                    .await?;
                println!("Deleted database {}", client.config().database_id);
                Ok(())
            }
            Subcommands::AllItems { container, confirm } => {
                match client
                    .delete_all_items(&container, &Confirmation::new(confirm), None)
                    .await
                {
                    Ok(summary) => {
                        println!(
                            "Deleted {} items from {container} ({} were already gone)",
                            summary.deleted, summary.already_deleted
                        );
                        Ok(())
                    }
                    Err(error) => {
                        if let ErrorKind::PartialFailure { failures, .. } = error.kind() {
                            for failure in failures {
                                eprintln!("  ! {failure}");
                            }
                        }
                        Err(error.into())
                    }
                }
            }
        }
    }
}
