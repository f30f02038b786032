use std::env;

use anyhow::bail;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tabula_store::sdk::Client;
use tabula_store::Record;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Gateway base URL (falls back to TABULA_ADDR)
    #[arg(short, long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// List collection names
    Collections,
    /// Create (or reset) a collection
    Create { name: String },
    /// Delete a collection and print its records
    Drop { name: String },
    /// Add a JSON record to a collection
    Add { collection: String, record: String },
    /// Find records matching field=value pairs
    Find {
        collection: String,
        query: Vec<String>,
    },
    /// Delete the single record matching field=value pairs
    Del {
        collection: String,
        query: Vec<String>,
    },
    /// Merge a JSON patch into the record with the given id
    Update {
        collection: String,
        id: String,
        patch: String,
    },
    /// Persist a snapshot of every collection on the server
    Persist {
        #[arg(long)]
        filename: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
}

fn parse_query(pairs: &[String]) -> anyhow::Result<Vec<(&str, &str)>> {
    let mut query = Vec::with_capacity(pairs.len());
    for pair in pairs {
        match pair.split_once('=') {
            Some((field, value)) => query.push((field, value)),
            None => bail!("expected field=value, got `{pair}`"),
        }
    }
    Ok(query)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let url = cli
        .url
        .or_else(|| env::var("TABULA_ADDR").ok())
        .unwrap_or_else(|| "http://127.0.0.1:4050".to_string());
    let client = Client::from_url(&url);

    match cli.command {
        Commands::Collections => {
            let names = client.collections().await?;
            println!("{}", serde_json::to_string_pretty(&names)?);
        }
        Commands::Create { name } => {
            client.create_collection(&name).await?;
            println!("OK");
        }
        Commands::Drop { name } => {
            let records = client.delete_collection(&name).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Add { collection, record } => {
            let record: Record = serde_json::from_str(&record)?;
            let stored = client.add_record(&collection, &record).await?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        Commands::Find { collection, query } => {
            let query = parse_query(&query)?;
            let records = client.find_records(&collection, &query).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Del { collection, query } => {
            let query = parse_query(&query)?;
            let removed = client.delete_record(&collection, &query).await?;
            println!("{}", serde_json::to_string_pretty(&removed)?);
        }
        Commands::Update {
            collection,
            id,
            patch,
        } => {
            let patch: Value = serde_json::from_str(&patch)?;
            let updated = client.update_record(&collection, &id, &patch).await?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
        Commands::Persist { filename, password } => {
            client
                .persist(filename.as_deref(), password.as_deref())
                .await?;
            println!("OK");
        }
    }

    Ok(())
}
