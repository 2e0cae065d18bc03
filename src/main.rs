use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::*;
use nebuia_copilot::{
    models::{
        BatchType, Document, EntityDocumentExtractor, EntityTextExtractor, File, Job, Search,
        SearchParameters, SearchType, StatusDocument,
    },
    ApiClient, ClientConfig, DocumentHandler, IntegratorApi, Listener, Watch,
};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new batch
    CreateBatch {
        name: String,
        #[arg(long, default_value = "execution")]
        batch_type: BatchType,
    },
    /// Upload local files and/or remote URLs into a batch
    Append {
        batch_id: String,
        #[arg(long)]
        type_document: String,
        /// Local files to upload
        paths: Vec<PathBuf>,
        /// Remote files the server downloads itself
        #[arg(long = "url")]
        urls: Vec<String>,
    },
    /// Show one document
    Get { uuid: String },
    /// List documents in a status
    Status {
        status: StatusDocument,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Move a document to another status
    SetStatus { uuid: String, status: StatusDocument },
    /// List documents in a status within batches of one type
    ByBatchType {
        batch_type: BatchType,
        status: StatusDocument,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// List the documents of a batch
    ByBatch {
        batch_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Reset a document for reprocessing
    Clear { uuid: String },
    /// Delete a batch
    DeleteBatch { batch_id: String },
    /// Delete a document from its batch
    DeleteDocument { uuid: String },
    /// List the document types of this account
    Types {},
    /// Full-text search inside a document
    Search {
        uuid: String,
        matches: String,
        #[arg(long, default_value_t = 10)]
        max_results: i64,
    },
    /// Semantic or literal search in a brain
    Brain {
        batch: String,
        param: String,
        #[arg(short, default_value_t = 5)]
        k: i64,
        #[arg(long, default_value = "semantic")]
        type_search: SearchType,
    },
    /// Extract entities from text; the schema is a JSON value
    ExtractText { text: String, schema: String },
    /// Extract entities from a processed document; the schema is a JSON value
    ExtractDocument {
        uuid: String,
        matches: String,
        schema: String,
    },
    /// Run QA over every document of a batch
    RunQa { batch_id: String },
    /// Print documents as they reach a status
    Listen {
        status: StatusDocument,
        #[arg(long, default_value = "execution")]
        batch_type: BatchType,
        #[arg(long, default_value_t = 4)]
        interval_secs: u64,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

/// Prints every delivered document as one JSON line.
struct PrintHandler;

#[async_trait]
impl DocumentHandler for PrintHandler {
    async fn on_start(&self, status: StatusDocument) {
        eprintln!("listening for documents in {status}");
    }

    async fn on_document(&self, _status: StatusDocument, document: &Document) {
        match serde_json::to_string(document) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("couldn't encode document {}: {e}", document.uuid),
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_schema(schema: &str) -> Value {
    // a bare description is sent as a JSON string
    serde_json::from_str(schema).unwrap_or_else(|_| Value::String(schema.to_string()))
}

fn file_name_from_url(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').find(|segment| !segment.is_empty()))
        .unwrap_or(url)
        .to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if dotenv::dotenv().is_err() {
        warn!("didn't load a .env file")
    }

    let args = Cli::parse();

    let config = ClientConfig::from_env().context("failed to load client configuration")?;
    let client = ApiClient::from_config(&config);

    match args.command {
        Commands::CreateBatch { name, batch_type } => {
            print_json(&client.create_batch(&name, batch_type).await?)?;
        }
        Commands::Append {
            batch_id,
            type_document,
            paths,
            urls,
        } => {
            let mut files = Vec::with_capacity(paths.len() + urls.len());
            for path in paths {
                files.push(File::from_path(&path, type_document.as_str()).await?);
            }
            for url in urls {
                let name = file_name_from_url(&url);
                files.push(File::from_url(url, name, type_document.as_str()));
            }

            let results = client
                .append_job(&Job::new(files), &batch_id, config.retry)
                .await?;
            print_json(&results)?;
        }
        Commands::Get { uuid } => print_json(&client.get_document_by_uuid(&uuid).await?)?,
        Commands::Status {
            status,
            page,
            limit,
        } => print_json(&client.get_documents_by_status(status, page, limit).await?)?,
        Commands::SetStatus { uuid, status } => {
            print_json(&client.set_document_status(&uuid, status).await?)?
        }
        Commands::ByBatchType {
            batch_type,
            status,
            page,
            limit,
        } => print_json(
            &client
                .get_documents_by_status_and_batch_type(status, batch_type, page, limit)
                .await?,
        )?,
        Commands::ByBatch {
            batch_id,
            page,
            limit,
        } => print_json(&client.get_documents_by_batch(&batch_id, page, limit).await?)?,
        Commands::Clear { uuid } => print_json(&client.clear_document_by_uuid(&uuid).await?)?,
        Commands::DeleteBatch { batch_id } => print_json(&client.delete_batch(&batch_id).await?)?,
        Commands::DeleteDocument { uuid } => {
            print_json(&client.delete_document_from_batch(&uuid).await?)?
        }
        Commands::Types {} => print_json(&client.get_document_types().await?)?,
        Commands::Search {
            uuid,
            matches,
            max_results,
        } => {
            let search = Search {
                matches,
                uuid,
                max_results,
            };
            print_json(&client.search_in_document(&search).await?)?;
        }
        Commands::Brain {
            batch,
            param,
            k,
            type_search,
        } => {
            let params = SearchParameters {
                batch,
                param,
                k,
                type_search,
            };
            let results = client.search_in_brain(&params).await?;
            println!("{results}");
        }
        Commands::ExtractText { text, schema } => {
            let data = EntityTextExtractor {
                text,
                schema: parse_schema(&schema),
            };
            print_json(&client.extract_from_text(&data).await?)?;
        }
        Commands::ExtractDocument {
            uuid,
            matches,
            schema,
        } => {
            let data = EntityDocumentExtractor {
                matches,
                schema: parse_schema(&schema),
            };
            print_json(&client.extract_from_document(&uuid, &data).await?)?;
        }
        Commands::RunQa { batch_id } => print_json(&client.run_qa_on_batch(&batch_id).await?)?,
        Commands::Listen {
            status,
            batch_type,
            interval_secs,
            limit,
        } => {
            let mut listener = Listener::new(client);
            listener.add_watch(
                Watch::new(status, batch_type)
                    .every(Duration::from_secs(interval_secs))
                    .limit(limit),
            );
            listener.run(&PrintHandler).await?;
        }
    }

    Ok(())
}
