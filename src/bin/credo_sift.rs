use std::fs;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use credoscript::config::{ConfigLoader, ResolvedConfig};
use credoscript::domain::UniprotAccession;
use credoscript::error::CredoError;
use credoscript::ligand::LigandAdaptor;
use credoscript::output::JsonOutput;
use credoscript::phyloxml::{PhyloXmlRenderer, RenderOptions};
use credoscript::query::AdaptorOptions;
use credoscript::sift::SiftNodeAdaptor;
use credoscript::store::Database;

#[derive(Parser)]
#[command(name = "credo-sift")]
#[command(about = "Navigate and export the SIFt ligand clusters of a CREDO database")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    database: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Show a SIFt node by its identifier")]
    Node { id: i64 },
    #[command(about = "Show the root node of a UniProt cluster tree")]
    Root { uniprot: String },
    #[command(about = "Show the node holding a ligand as a direct child")]
    Locate { ligand_id: i64 },
    #[command(about = "List the internal nodes below a node (node included)")]
    Descendants(TraversalArgs),
    #[command(about = "List the nodes above a node up to the root")]
    Ancestors(TraversalArgs),
    #[command(about = "List the ligands clustered below a node")]
    Leaves(TraversalArgs),
    #[command(about = "Export a UniProt cluster tree as PhyloXML")]
    Phyloxml(PhyloxmlArgs),
}

#[derive(Args)]
struct TraversalArgs {
    id: i64,

    #[arg(long, default_value_t = 1)]
    page: usize,

    #[arg(long)]
    per_page: Option<usize>,
}

#[derive(Args)]
struct PhyloxmlArgs {
    uniprot: String,

    #[arg(long)]
    buffer_radius: Option<f64>,

    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(credo) = report.downcast_ref::<CredoError>() {
            return ExitCode::from(map_exit_code(credo));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CredoError) -> u8 {
    match error {
        CredoError::NotFound { .. } | CredoError::MissingConfig => 2,
        CredoError::ConfigRead(_) | CredoError::ConfigParse(_) => 2,
        CredoError::Storage(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref(), cli.database)?;
    let db = Database::open(&config)?;

    let result = run_command(cli.command, &db);
    db.teardown()?;
    result
}

fn resolve_config(
    path: Option<&str>,
    database: Option<Utf8PathBuf>,
) -> Result<ResolvedConfig, CredoError> {
    match (path, database) {
        (None, Some(database)) => Ok(ResolvedConfig::for_database(database)),
        (path, database) => {
            let mut config = ConfigLoader::resolve(path)?;
            if let Some(database) = database {
                config.database = database;
            }
            Ok(config)
        }
    }
}

fn run_command(command: Command, db: &Database) -> miette::Result<()> {
    let sift = SiftNodeAdaptor::with_defaults(db);
    match command {
        Command::Node { id } => JsonOutput::print_node(sift.get_by_id(id)?).into_diagnostic(),
        Command::Root { uniprot } => {
            let uniprot: UniprotAccession = uniprot.parse()?;
            JsonOutput::print_node(sift.get_root_by_uniprot(uniprot.as_str())?).into_diagnostic()
        }
        Command::Locate { ligand_id } => {
            JsonOutput::print_node(sift.get_node_containing_ligand(ligand_id)?).into_diagnostic()
        }
        Command::Descendants(args) => {
            let sift = paged_adaptor(db, &args);
            let page = sift.descendants(args.id)?.page(args.page)?;
            JsonOutput::print_page(&page).into_diagnostic()
        }
        Command::Ancestors(args) => {
            let sift = paged_adaptor(db, &args);
            let page = sift.ancestors(args.id)?.page(args.page)?;
            JsonOutput::print_page(&page).into_diagnostic()
        }
        Command::Leaves(args) => {
            let sift = paged_adaptor(db, &args);
            let page = sift.leaves(args.id)?.page(args.page)?;
            JsonOutput::print_page(&page).into_diagnostic()
        }
        Command::Phyloxml(args) => {
            let uniprot: UniprotAccession = args.uniprot.parse()?;
            let ligands = LigandAdaptor::with_defaults(db);
            let mut options = RenderOptions {
                buffer_radius: db.config().buffer_radius,
            };
            if let Some(buffer_radius) = args.buffer_radius {
                options.buffer_radius = buffer_radius;
            }
            let document = PhyloXmlRenderer::new(&sift, &ligands)
                .with_options(options)
                .render_uniprot(uniprot.as_str())?;
            match args.output {
                Some(path) => fs::write(path.as_std_path(), document).into_diagnostic(),
                None => JsonOutput::print_document(&document).into_diagnostic(),
            }
        }
    }
}

fn paged_adaptor<'db>(db: &'db Database, args: &TraversalArgs) -> SiftNodeAdaptor<'db> {
    let per_page = args.per_page.unwrap_or(db.config().per_page);
    SiftNodeAdaptor::new(db, AdaptorOptions::paginated(per_page))
}
