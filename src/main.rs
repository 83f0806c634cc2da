use anyhow::{Context, Result};
use clap::Parser;
use ifcgraph::graph::{edgelist, GraphMaterializer, IfcGraph};
use ifcgraph::render::write_html;
use ifcgraph::{Config, IfcModel};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "ifcgraph")]
#[command(version, about = "Convert an IFC STEP file into a graph and visualize it")]
struct Args {
    /// Input IFC STEP file
    #[arg(short, long, default_value = "test.ifc")]
    file: PathBuf,

    /// Output HTML file for the graph visualization
    #[arg(short, long, default_value = "ifc_graph.html")]
    output: PathBuf,

    /// Edge list file the graph is saved to and rendered from
    #[arg(short, long, default_value = "ifc_graph.txt")]
    graph: PathBuf,

    /// Skip parsing and render an existing edge list
    #[arg(long)]
    plot_only: bool,

    /// Label nodes with every supertype they satisfy
    #[arg(long)]
    hierarchy: bool,

    /// Fail on entity types missing from the schema
    #[arg(long)]
    strict: bool,

    /// JSON schema document (overrides the configured one)
    #[arg(long)]
    schema: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load()?;
    if args.schema.is_some() {
        config.build.schema_path = args.schema.clone();
        config.validate()?;
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.ifcgraph.log_level.as_str()),
    )
    .init();

    let plot_only = args.plot_only || config.build.plot_only;
    if plot_only {
        log::info!("Plot-only mode: skipping {}", args.file.display());
    } else {
        let graph = build(&args, &config)?;
        edgelist::save(&graph, &args.graph)
            .with_context(|| format!("Failed to save edge list {}", args.graph.display()))?;
        log::info!("Graph object saved to {}", args.graph.display());
    }

    let graph = edgelist::load(&args.graph)
        .with_context(|| format!("Failed to load edge list {}", args.graph.display()))?;
    write_html(&graph, &args.output, &config.render)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "{} nodes, {} edges -> {}",
        graph.node_count(),
        graph.edge_count(),
        args.output.display()
    );
    Ok(())
}

fn build(args: &Args, config: &Config) -> Result<IfcGraph> {
    let start = Instant::now();
    let schema = config.schema()?;
    let strict = args.strict || config.build.strict_schema;

    log::info!("Parsing {} (schema {})", args.file.display(), schema.name());
    let model = IfcModel::open(&args.file, schema, strict)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let mut options = config.build_options();
    options.include_hierarchy |= args.hierarchy;

    let mut graph = IfcGraph::new();
    let mut materializer = GraphMaterializer::new(options);
    materializer
        .build(&mut graph, &model)
        .with_context(|| format!("Failed to build graph from {}", args.file.display()))?;

    let stats = materializer.stats();
    log::info!(
        "Graph created in {:?}: {} nodes, {} edges ({} references suppressed)",
        start.elapsed(),
        graph.node_count(),
        graph.edge_count(),
        stats.suppressed
    );
    Ok(graph)
}
