use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use scenegraph::model::{AttrValue, NodeSpec, Point};
use scenegraph::views::ViewModel;
use scenegraph::{EditorConfig, Intent, SceneHandler, Settings};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Node-graph editor core: settings maintenance and demo",
    long_about = None
)]
struct Cli {
    /// Settings file
    #[arg(long, global = true, value_name = "FILE", default_value = "scenegraph.json")]
    settings: Utf8PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recently opened files
    Recent {
        #[command(subcommand)]
        action: RecentAction,
    },
    /// Saved window layouts
    Layouts {
        #[command(subcommand)]
        action: LayoutAction,
    },
    /// Build a small graph, exercise undo/redo and print the views
    Demo,
}

#[derive(Subcommand, Debug)]
enum RecentAction {
    List,
    Add { path: Utf8PathBuf },
    Clear,
}

#[derive(Subcommand, Debug)]
enum LayoutAction {
    List,
    Delete { name: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Command::Recent { action } => {
            let mut settings = open_settings(&cli.settings)?;
            match action {
                RecentAction::List => {
                    for file in settings.recent_files_menu() {
                        println!("{}", file);
                    }
                }
                RecentAction::Add { path } => {
                    settings.add_recent_file(&path);
                    settings.flush()?;
                }
                RecentAction::Clear => {
                    settings.clear_recent_files();
                    settings.flush()?;
                }
            }
        }
        Command::Layouts { action } => {
            let mut settings = open_settings(&cli.settings)?;
            match action {
                LayoutAction::List => {
                    for name in settings.layout_names() {
                        println!("{}", name);
                    }
                }
                LayoutAction::Delete { name } => {
                    if !settings.delete_layout(&name) {
                        anyhow::bail!("No layout named '{}' in {}", name, cli.settings);
                    }
                    settings.flush()?;
                }
            }
        }
        Command::Demo => demo()?,
    }
    Ok(())
}

fn open_settings(path: &Utf8PathBuf) -> Result<Settings> {
    let max_files = EditorConfig::default().max_recent_files;
    let mut settings = Settings::load_or_default(path.clone(), max_files)
        .with_context(|| format!("Failed to open settings {}", path))?;
    let config = EditorConfig::from_settings(&settings);
    settings.set_max_files(config.max_recent_files);
    Ok(settings)
}

fn demo() -> Result<()> {
    let mut handler = SceneHandler::new(EditorConfig::default());

    let a = handler
        .handle(Intent::AddNode(
            NodeSpec::new("Source", Point::new(0.0, 0.0)).with_output("out1"),
        ))?
        .created_node()
        .context("Source was not created")?;
    let b = handler
        .handle(Intent::AddNode(
            NodeSpec::new("Gain", Point::new(250.0, 0.0))
                .with_input("in1")
                .with_output("out1")
                .with_attribute("gain", 2.0),
        ))?
        .created_node()
        .context("Gain was not created")?;

    let source = handler.store().node(a).and_then(|n| n.port("out1")).context("Source.out1")?;
    let target = handler.store().node(b).and_then(|n| n.port("in1")).context("Gain.in1")?;
    handler.handle(Intent::Connect { source, target })?;
    handler.handle(Intent::SetAttribute {
        node: b,
        name: "gain".to_string(),
        value: AttrValue::Float(4.0),
    })?;
    handler.handle(Intent::RenameNode { node: b, name: "Amplifier".to_string() })?;

    print_views(&handler);
    for intent in [Intent::Undo, Intent::Undo, Intent::Redo, Intent::Redo] {
        let outcome = handler.handle(intent)?;
        log::info!("{:?}", outcome.change().map(|c| c.len()));
    }
    handler.verify_views()?;
    print_views(&handler);

    println!("{}", serde_json::to_string_pretty(handler.store())?);
    Ok(())
}

fn print_views(handler: &SceneHandler) {
    let nodes = handler.nodes_model();
    println!("nodes ({}):", nodes.row_count());
    for row in (0..nodes.row_count()).filter_map(|i| nodes.row(i)) {
        println!("  {} at {}", row.name, row.position);
    }
    let edges = handler.edges_model();
    println!("edges ({}):", edges.row_count());
    for label in edges.labels() {
        println!("  {}", label);
    }
    let table = handler.table_model();
    println!("table: {}", table.headers().join(" | "));
    for row in 0..table.row_count() {
        let cells: Vec<String> = (0..table.column_count())
            .filter_map(|c| table.cell(row, c))
            .collect();
        println!("  {}", cells.join(" | "));
    }
}
