//! mnemo: hybrid search and question answering over todos and memories.

mod app;
mod logging;

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use uuid::Uuid;

use mnemo_core::{
    defaults, AskMode, AskRequest, AskResponse, ContentType, SearchRequest, SearchResponse,
    VectorIndex,
};
use mnemo_db::{log_pool_metrics, PgVectorIndex};

use crate::app::App;

#[derive(Parser, Debug)]
#[command(name = "mnemo")]
#[command(author, version, about = "Hybrid search and answers over your todos and memories")]
#[command(propagate_version = true)]
struct Cli {
    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search a user's todos and memories
    Search {
        /// User to search for
        #[arg(short, long)]
        user: Uuid,

        /// Free-text query
        query: String,

        /// Maximum results
        #[arg(short, long, default_value_t = defaults::SEARCH_LIMIT)]
        limit: usize,

        /// Weight of semantic similarity (0 = keyword only, 1 = semantic only)
        #[arg(short = 'w', long, default_value_t = defaults::VECTOR_WEIGHT)]
        vector_weight: f32,

        /// Restrict to content types (todo, memory)
        #[arg(short = 't', long = "type", value_delimiter = ',')]
        types: Vec<ContentType>,
    },

    /// Answer a question from personal data, the web, or both
    Ask {
        #[arg(short, long)]
        user: Uuid,

        question: String,

        /// memories, internet, hybrid or llm
        #[arg(short, long, default_value = "hybrid")]
        mode: AskMode,

        /// Personal documents placed into the context
        #[arg(long, default_value_t = defaults::ASK_MAX_CONTEXT)]
        max_context: usize,

        /// Restrict personal context to content types (todo, memory)
        #[arg(short = 't', long = "type", value_delimiter = ',')]
        types: Vec<ContentType>,
    },

    /// Rebuild the vector index from the stored records
    Reindex {
        /// Only this user (default: every user)
        #[arg(short, long)]
        user: Option<Uuid>,

        /// Drop every vector and the model pin first
        #[arg(long)]
        rebuild: bool,
    },

    /// Show index and cache status
    Stats,

    /// Delete a user's records, vectors and cached searches
    Wipe {
        #[arg(short, long)]
        user: Uuid,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Reindex { rebuild: true, .. } = cli.command {
        // Clear before wiring, so a changed model does not trip the version pin.
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let db = mnemo_db::Database::connect(&database_url, mnemo_db::PoolConfig::from_env()).await?;
        db.migrate().await?;
        let removed = PgVectorIndex::rebuild(db.pool()).await?;
        info!(subsystem = "cli", removed, "Vector index cleared");
    }

    let app = App::from_env().await?;
    match cli.command {
        Commands::Search {
            user,
            query,
            limit,
            vector_weight,
            types,
        } => {
            let request = SearchRequest::new(user, query)
                .with_limit(limit)
                .with_vector_weight(vector_weight)
                .with_content_types(types);
            let response = app.engine.search(&request).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_search(&response);
            }
        }
        Commands::Ask {
            user,
            question,
            mode,
            max_context,
            types,
        } => {
            let request = AskRequest::new(user, question, mode)
                .with_max_context(max_context)
                .with_content_types(types);
            let response = app.ask_pipeline()?.ask(&request).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_answer(&response);
            }
        }
        Commands::Reindex { user, .. } => {
            let users = match user {
                Some(user) => vec![user],
                None => app.db.content.list_user_ids().await?,
            };
            for user_id in users {
                let report = app.indexer.index_all_for_user(user_id).await?;
                if cli.json {
                    println!(
                        "{}",
                        serde_json::json!({ "user_id": user_id, "report": report })
                    );
                } else {
                    println!(
                        "{}: indexed {}, skipped {}, errors {} ({} ms)",
                        user_id, report.indexed, report.skipped, report.errors, report.elapsed_ms
                    );
                }
            }
        }
        Commands::Stats => {
            log_pool_metrics(app.db.pool());
            let stats = app.vector.stats().await?;
            let cache_connected = app.cache.is_connected().await;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "index": stats, "cache_connected": cache_connected })
                );
            } else {
                let version = stats
                    .version
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "(unpinned)".to_string());
                println!("documents: {}", stats.documents);
                println!("model:     {}", version);
                println!("cache:     {}", if cache_connected { "connected" } else { "off" });
            }
        }
        Commands::Wipe { user, yes } => {
            anyhow::ensure!(yes, "refusing to wipe {} without --yes", user);
            let content = app.db.content.clone();
            let deleted = app
                .indexer
                .wipe_user(user, || async move { content.delete_user(user).await })
                .await?;
            println!("deleted {} records for {}", deleted, user);
        }
    }
    Ok(())
}

fn print_search(response: &SearchResponse) {
    if response.results.is_empty() {
        println!("No results.");
        return;
    }
    for (i, result) in response.results.iter().enumerate() {
        let doc = &result.document;
        println!(
            "{:>2}. [{}] {} ({:.4}, {:?})",
            i + 1,
            doc.content_type,
            doc.title,
            result.score,
            result.match_type
        );
        if let Some(highlight) = result.highlights.first() {
            println!("    {}", highlight);
        }
    }
    println!(
        "\n{} results in {} ms{}",
        response.total_count,
        response.elapsed_ms,
        if response.cached { " (cached)" } else { "" }
    );
}

fn print_answer(response: &AskResponse) {
    println!("{}", response.answer);
    if !response.sources.is_empty() {
        println!("\nSources:");
        for source in &response.sources {
            match source.url {
                Some(ref url) => println!("  - {} <{}>", source.title, url),
                None => println!("  - [{}] {}", source.content_type, source.title),
            }
        }
    }
    println!("\n({} mode, {} ms)", response.mode, response.elapsed_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_args() {
        let user = Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from([
            "mnemo", "search", "--user", &user, "renew passport", "-t", "todo,memory", "-w",
            "0.5",
        ])
        .unwrap();
        match cli.command {
            Commands::Search {
                query,
                limit,
                vector_weight,
                types,
                ..
            } => {
                assert_eq!(query, "renew passport");
                assert_eq!(limit, defaults::SEARCH_LIMIT);
                assert_eq!(vector_weight, 0.5);
                assert_eq!(types, vec![ContentType::Todo, ContentType::Memory]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ask_args_default_to_hybrid() {
        let user = Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from(["mnemo", "ask", "-u", &user, "what is due?", "--json"])
            .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Ask {
                mode,
                max_context,
                types,
                ..
            } => {
                assert_eq!(mode, AskMode::Hybrid);
                assert_eq!(max_context, defaults::ASK_MAX_CONTEXT);
                assert!(types.is_empty());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ask_type_filter() {
        let user = Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from([
            "mnemo", "ask", "-u", &user, "when is the dentist?", "-m", "memories", "--type",
            "todo,memory",
        ])
        .unwrap();
        match cli.command {
            Commands::Ask { mode, types, .. } => {
                assert_eq!(mode, AskMode::Memories);
                assert_eq!(types, vec![ContentType::Todo, ContentType::Memory]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let user = Uuid::new_v4().to_string();
        assert!(
            Cli::try_parse_from(["mnemo", "ask", "-u", &user, "q", "--mode", "psychic"]).is_err()
        );
    }

    #[test]
    fn test_bad_user_id_rejected() {
        assert!(Cli::try_parse_from(["mnemo", "search", "--user", "bob", "q"]).is_err());
    }
}
