use anyhow::{Context, Result};
use clap::Parser;
use ifcgraph::db::{find_graph, list_graphs, load_graph, migrate, Db};
use ifcgraph::graph::edgelist;
use ifcgraph::ingest::normalize_path;
use ifcgraph::render::write_html;
use ifcgraph::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "export")]
#[command(about = "Export a stored graph as an edge list and/or HTML visualization")]
struct Args {
    /// Source path of the model, relative to the models root
    #[arg(short, long, required_unless_present = "list")]
    source: Option<String>,

    /// Write the edge list here
    #[arg(short, long)]
    edgelist: Option<PathBuf>,

    /// Write the HTML visualization here
    #[arg(long)]
    html: Option<PathBuf>,

    /// List stored graphs and exit
    #[arg(short, long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.ifcgraph.log_level.as_str()),
    )
    .init();

    let db = Db::new(config.db_path());
    let migrations_dir = config.migrations_dir().to_path_buf();
    db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await?;

    if args.list {
        let graphs = list_graphs(&db).await?;
        if graphs.is_empty() {
            println!("No graphs stored in {}", config.db_path().display());
        }
        for g in graphs {
            println!(
                "{}  {} nodes  {} edges  {}  built {}",
                g.source_path, g.node_count, g.edge_count, g.schema_name, g.built_at
            );
        }
        return Ok(());
    }

    let Some(source) = args.source.as_deref() else {
        anyhow::bail!("--source is required unless --list is given");
    };
    let source = normalize_path(source);
    let summary = find_graph(&db, &source)
        .await?
        .with_context(|| format!("No graph stored for {}", source))?;
    let graph = load_graph(&db, &summary.graph_id).await?;
    log::info!(
        "Loaded graph for {} ({} nodes, {} edges)",
        source,
        graph.node_count(),
        graph.edge_count()
    );

    if args.edgelist.is_none() && args.html.is_none() {
        print!("{}", edgelist::to_string(&graph)?);
        return Ok(());
    }
    if let Some(path) = &args.edgelist {
        edgelist::save(&graph, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    if let Some(path) = &args.html {
        write_html(&graph, path, &config.render)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(())
}
