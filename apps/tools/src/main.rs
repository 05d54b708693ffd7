use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::{CollectionName, DocumentId, Fields};
use storage::Storage;

/// Direct maintenance of the document database. Changes made here are not
/// pushed to clients already subscribed through a running service.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/documents.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every document of a collection, one JSON object per line.
    List { collection: String },
    /// Insert a document from a JSON object of fields.
    Put { collection: String, fields: String },
    Remove { collection: String, id: String },
    /// Delete every document of a collection.
    Purge { collection: String },
    Collections,
}

fn collection(raw: &str) -> Result<CollectionName> {
    CollectionName::parse(raw).with_context(|| format!("invalid collection name: {raw}"))
}

fn parse_fields(raw: &str) -> Result<Fields> {
    match serde_json::from_str::<serde_json::Value>(raw).context("fields must be valid JSON")? {
        serde_json::Value::Object(fields) => Ok(fields),
        other => Err(anyhow!("fields must be a JSON object, got {other}")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::List { collection: name } => {
            for stored in storage.list_documents(&collection(&name)?).await? {
                println!(
                    "{}",
                    serde_json::json!({
                        "id": stored.document.id,
                        "fields": stored.document.fields,
                        "created_at": stored.created_at.to_rfc3339(),
                        "updated_at": stored.updated_at.to_rfc3339(),
                    })
                );
            }
        }
        Command::Put {
            collection: name,
            fields,
        } => {
            let id = storage
                .create_document(&collection(&name)?, &parse_fields(&fields)?)
                .await?;
            println!("created id={id}");
        }
        Command::Remove {
            collection: name,
            id,
        } => {
            let removed = storage
                .delete_document(&collection(&name)?, &DocumentId::new(id.clone()))
                .await?;
            if removed {
                println!("removed id={id}");
            } else {
                println!("no document with id={id}");
            }
        }
        Command::Purge { collection: name } => {
            let count = storage.purge_collection(&collection(&name)?).await?;
            println!("purged {count} document(s) from {name}");
        }
        Command::Collections => {
            for stats in storage.list_collections().await? {
                println!("{}\t{}", stats.collection, stats.document_count);
            }
        }
    }

    Ok(())
}
