use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_compound_annotator::chembl::ChemblHttpClient;
use kira_compound_annotator::config::{BatchConfig, ConfigLoader, Settings, TaxonomySource};
use kira_compound_annotator::error::KiraError;
use kira_compound_annotator::g2p::G2pHttpClient;
use kira_compound_annotator::output::{
    AncestorView, JsonOutput, TargetResult, TaxonView, TaxonomyResult,
};
use kira_compound_annotator::runner::{MultiSearch, SearchRegistry};
use kira_compound_annotator::searches::{ActivityFactory, G2pFactory};
use kira_compound_annotator::store::Store;
use kira_compound_annotator::target::{CANONICAL_TYPES, CachedTargetSource, TargetSource};
use kira_compound_annotator::taxonomy::{TaxonKey, Taxonomy};
use kira_compound_annotator::uniprot::{UniprotTaxonomyClient, load_taxonomy};

#[derive(Parser)]
#[command(name = "kira-ca")]
#[command(about = "Compound annotation across ChEMBL and the Guide to Pharmacology")]
#[command(version, author)]
struct Cli {
    /// Settings file (defaults to ./kira-ca.json when present)
    #[arg(long, global = true)]
    settings: Option<String>,

    /// More logging; repeat for trace output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run every search in a batch file over a compound list")]
    Search(BatchArgs),
    #[command(about = "Print the provenance table of a batch without running it")]
    Explain(BatchArgs),
    #[command(about = "Show the taxa under a taxon id or name")]
    Taxonomy(TaxonomyArgs),
    #[command(about = "Show a ChEMBL target's ancestors and canonical target")]
    Target(TargetArgs),
}

#[derive(Args)]
struct BatchArgs {
    /// Compound list or TSV with an inchikey column
    input: Utf8PathBuf,

    /// Batch file (.toml or .json)
    config: Utf8PathBuf,

    #[arg(long, default_value = ".")]
    out_dir: Utf8PathBuf,

    #[arg(long)]
    suffix: Option<String>,
}

#[derive(Args)]
struct TaxonomyArgs {
    taxon: String,

    #[arg(long)]
    include_root: bool,
}

#[derive(Args)]
struct TargetArgs {
    chembl_id: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::Search { source, .. } => map_exit_code(source),
        KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_)
        | KiraError::ForbiddenKey { .. }
        | KiraError::DuplicateSearchKey(_)
        | KiraError::DuplicateOutputPath { .. }
        | KiraError::OutputOutsideDir { .. }
        | KiraError::UnknownSearch { .. }
        | KiraError::InvalidParameter { .. } => 2,
        KiraError::ProviderHttp { .. }
        | KiraError::ProviderStatus { .. }
        | KiraError::ProviderPayload { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = ConfigLoader::resolve(cli.settings.as_deref())?;
    let store = match &settings.cache_root {
        Some(root) => Store::new_with_root(root.clone()),
        None => Store::new()?,
    };

    match cli.command {
        Commands::Search(args) => {
            let registry = build_registry(&settings, &store)?;
            let batch = build_batch(&registry, &args)?;
            let report = batch.run(&JsonOutput)?;
            JsonOutput::print_report(&report).into_diagnostic()?;
        }
        Commands::Explain(args) => {
            let registry = build_registry(&settings, &store)?;
            let batch = build_batch(&registry, &args)?;
            JsonOutput::print_explain(&batch.explain()?).into_diagnostic()?;
        }
        Commands::Taxonomy(args) => {
            let taxonomy = open_taxonomy(&settings, &store)?;
            let subtree = taxonomy.under_with(TaxonKey::parse(&args.taxon), args.include_root)?;
            let taxa = subtree
                .taxa()
                .into_iter()
                .map(|taxon| TaxonView::new(taxon, &subtree))
                .collect();
            JsonOutput::print_taxonomy(&TaxonomyResult {
                root: args.taxon,
                count: subtree.len(),
                taxa,
            })
            .into_diagnostic()?;
        }
        Commands::Target(args) => {
            let chembl = ChemblHttpClient::new(&settings.chembl_url, settings.timeout)?;
            let source = CachedTargetSource::new(chembl);
            let target = source.target(&args.chembl_id.parse()?)?;
            let ancestors = target
                .ancestors(&CANONICAL_TYPES, &source)?
                .into_iter()
                .map(|(depth, target)| AncestorView { depth, target })
                .collect();
            let canonical = match target.traverse_smart(&source) {
                Ok(found) => Some(found),
                Err(KiraError::NoCanonicalTarget(_)) => None,
                Err(err) => return Err(err.into()),
            };
            JsonOutput::print_target(&TargetResult {
                target,
                ancestors,
                canonical,
            })
            .into_diagnostic()?;
        }
    }
    Ok(())
}

fn open_taxonomy(settings: &Settings, store: &Store) -> Result<Taxonomy, KiraError> {
    match &settings.taxonomy {
        TaxonomySource::Path(path) => Taxonomy::from_path(path),
        TaxonomySource::Ancestor(ancestor) => {
            store.ensure_cache_root()?;
            let client = UniprotTaxonomyClient::new(settings.timeout)?;
            load_taxonomy(store, &client, *ancestor)
        }
    }
}

fn build_registry(settings: &Settings, store: &Store) -> Result<SearchRegistry, KiraError> {
    let chembl = Arc::new(ChemblHttpClient::new(&settings.chembl_url, settings.timeout)?);
    let targets: Arc<dyn TargetSource> = Arc::new(CachedTargetSource::new(Arc::clone(&chembl)));
    let taxonomy = Arc::new(open_taxonomy(settings, store)?);
    let g2p = Arc::new(G2pHttpClient::new(&settings.g2p_url, settings.timeout)?);

    let mut registry = SearchRegistry::new();
    registry
        .register(Arc::new(ActivityFactory::new(chembl, targets, taxonomy)))
        .register(Arc::new(G2pFactory::new(g2p)));
    Ok(registry)
}

fn build_batch(registry: &SearchRegistry, args: &BatchArgs) -> Result<MultiSearch, KiraError> {
    let config = BatchConfig::from_path(&args.config)?;
    MultiSearch::build(
        registry,
        &config,
        &args.input,
        &args.config,
        &args.out_dir,
        args.suffix.as_deref(),
    )
}
