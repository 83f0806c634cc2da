use clap::Parser;
use ifcgraph::Config;
use ifcgraph::db::{Db, migrate};
use ifcgraph::ingest::{
    discover_models, get_existing_hashes, classify_models, find_deleted_graphs, delete_graphs,
    ingest_model,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;
use anyhow::Result;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Build graphs for a directory of IFC models into SQLite (incremental by default)")]
struct Args {
    /// Models root (defaults to ifcgraph.models_dir)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Rebuild every model (ignore hashes)
    #[arg(short, long)]
    force: bool,

    /// Remove graphs whose source file no longer exists
    #[arg(short, long)]
    cleanup: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.ifcgraph.log_level.as_str()),
    )
    .init();

    let root = args.root.clone().unwrap_or_else(|| config.models_dir().to_path_buf());
    log::info!("Models root: {}", root.display());
    log::info!("Database path: {}", config.db_path().display());

    let db = Db::new(config.db_path());
    let migrations_dir = config.migrations_dir().to_path_buf();
    db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await?;

    let schema = config.schema()?;
    let options = config.build_options();
    let strict = config.build.strict_schema;

    let files = discover_models(&root)?;
    if files.is_empty() {
        log::warn!("No .ifc files found under {}", root.display());
    }

    let existing_hashes = get_existing_hashes(&db).await?;
    let classification = classify_models(&files, &existing_hashes)?;
    let num_new = classification.new_models.len();
    let num_modified = classification.modified_models.len();
    let num_unchanged = classification.unchanged_models.len();

    let to_process = if args.force {
        log::info!("Mode: full rebuild (all models)");
        files.clone()
    } else {
        log::info!(
            "Classification: new={}, modified={}, unchanged (skip)={}",
            num_new, num_modified, num_unchanged
        );
        classification.pending()
    };

    let start = Instant::now();
    let total = to_process.len();
    let mut built = 0usize;
    let mut errors = 0usize;
    let mut total_nodes = 0usize;
    let mut total_edges = 0usize;

    for (idx, file) in to_process.iter().enumerate() {
        log::info!("[{}/{}] Building: {}", idx + 1, total, file.relative_path);
        match ingest_model(&db, file, &schema, strict, &options).await {
            Ok(outcome) => {
                built += 1;
                total_nodes += outcome.node_count;
                total_edges += outcome.edge_count;
                log::info!(
                    "✓ {} ({} nodes, {} edges)",
                    file.relative_path,
                    outcome.node_count,
                    outcome.edge_count
                );
            }
            Err(e) if e.is_build_fatal() => {
                errors += 1;
                log::error!("✗ {}: graph build aborted: {}", file.relative_path, e);
            }
            Err(e) => {
                errors += 1;
                log::error!("✗ {}: {}", file.relative_path, e);
            }
        }
    }

    let on_disk: HashSet<String> = files.iter().map(|f| f.relative_path.clone()).collect();
    let deleted = find_deleted_graphs(&db, &on_disk).await?;
    let removed = if deleted.is_empty() {
        0
    } else if args.cleanup {
        delete_graphs(&db, &deleted).await?
    } else {
        log::info!(
            "{} stored graphs have no source file on disk (use --cleanup to remove)",
            deleted.len()
        );
        0
    };

    log::info!("=== Ingestion Complete ===");
    log::info!("Models discovered: {}", files.len());
    log::info!("  New: {}", num_new);
    log::info!("  Modified: {}", num_modified);
    log::info!("  Unchanged (skipped): {}", if args.force { 0 } else { num_unchanged });
    log::info!("Graphs built: {} (errors: {})", built, errors);
    log::info!("Nodes stored: {}, edges stored: {}", total_nodes, total_edges);
    log::info!("Time: {:?}", start.elapsed());
    if removed > 0 {
        log::info!("Graphs cleaned up: {}", removed);
    }
    if errors > 0 {
        log::warn!("Some models failed to build. Check logs above for details.");
    }

    Ok(())
}
