use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use log::info;

use QuercusTOA::config::EnrichmentConfig;
use QuercusTOA::analysis::{
    aggregation::Grouping,
    multiple_testing_correction::AdjustmentMethod,
    pipeline::run_all,
};
use QuercusTOA::parsers::{
    annotation_parser::TermCategory,
    reference_store::{DirectoryStore, CLUSTER_ID_COLUMN},
};

#[derive(Parser, Debug)]
#[command(name = "toa-enrichment", about, version)]
struct CliArgs {
    #[arg(
        long = "config",
        value_name = "FILE",
        help = "JSON configuration file. Command line options take precedence over its values.",
    )]
    config: Option<PathBuf>,

    #[arg(
        short = 'a',
        long = "annotations",
        value_name = "FILE",
        help = "Functional annotation table (';' or tab delimited, optionally gzipped).",
    )]
    annotation_file: Option<PathBuf>,

    #[arg(
        short = 'r',
        long = "reference",
        value_name = "DIRECTORY",
        help = "Directory with one cluster annotation table per species.",
        required = true
    )]
    reference_dir: PathBuf,

    #[arg(
        long = "obo",
        value_name = "FILE",
        help = "Gene Ontology file in OBO format, used to describe GO terms in the report.",
    )]
    obo_file: Option<PathBuf>,

    #[arg(
        short = 's',
        long = "species",
        value_name = "NAME",
        help = "Reference species, or 'all species' to use the clusters of every species.",
    )]
    species: Option<String>,

    #[arg(
        short = 't',
        long = "terms",
        value_enum,
        value_delimiter = ',',
        help = "Term categories to analyse. All categories by default.",
    )]
    categories: Vec<TermCategory>,

    #[arg(
        short = 'd',
        long = "dir",
        value_name = "DIRECTORY",
        help = "Directory to write the enrichment reports.",
    )]
    output_dir: Option<PathBuf>,

    #[arg(
        short = 'p',
        long = "prefix",
        value_name = "PREFIX",
        help = "Prefix of the report file names.",
    )]
    output_prefix: Option<String>,

    #[arg(
        short = 'z',
        long = "gzip",
        help = "Gzip-compress the reports.",
    )]
    compress: bool,

    #[arg(
        long = "id-column",
        value_name = "COLUMN",
        help = "Sequence identifier column of the annotation table.",
    )]
    id_column: Option<String>,

    #[arg(
        long = "reference-id-column",
        value_name = "COLUMN",
        help = "Cluster identifier column of the reference tables.",
        default_value = CLUSTER_ID_COLUMN,
    )]
    reference_id_column: String,

    #[arg(
        short = 'g',
        long = "grouping",
        value_enum,
        help = "How annotation rows are grouped into sequences.",
    )]
    grouping: Option<Grouping>,

    #[arg(
        short = 'c',
        long = "correction-method",
        value_enum,
        help = "Method to adjust p-values for multiple test correction.",
    )]
    correction_method: Option<AdjustmentMethod>,

    #[arg(
        long = "min-seqnum-annotations",
        value_name = "COUNT",
        help = "Minimum number of annotated sequences a term must have to be reported.",
    )]
    min_seqnum_annotations: Option<usize>,

    #[arg(
        long = "min-seqnum-species",
        value_name = "COUNT",
        help = "Minimum number of reference clusters a term must have to be reported.",
    )]
    min_seqnum_species: Option<usize>,
}

fn build_config(cli_args: &CliArgs) -> Result<EnrichmentConfig, String> {
    let mut config = match &cli_args.config {
        Some(path) => EnrichmentConfig::from_json_file(path).map_err(|e| e.to_string())?,
        None => EnrichmentConfig::default(),
    };

    if let Some(annotation_file) = &cli_args.annotation_file {
        config.annotation_file = annotation_file.clone();
    }
    if let Some(species) = &cli_args.species {
        config.species = species.clone();
    }
    if !cli_args.categories.is_empty() {
        config.categories = cli_args.categories.clone();
    }
    if let Some(output_dir) = &cli_args.output_dir {
        config.output_dir = output_dir.clone();
    }
    if let Some(output_prefix) = &cli_args.output_prefix {
        config.output_prefix = output_prefix.clone();
    }
    if cli_args.compress {
        config.compress = true;
    }
    if let Some(id_column) = &cli_args.id_column {
        config.id_column = id_column.clone();
    }
    if let Some(grouping) = cli_args.grouping {
        config.grouping = grouping;
    }
    if let Some(correction_method) = cli_args.correction_method {
        config.correction_method = correction_method;
    }
    if let Some(min_seqnum_annotations) = cli_args.min_seqnum_annotations {
        config.min_seqnum_annotations = min_seqnum_annotations;
    }
    if let Some(min_seqnum_species) = cli_args.min_seqnum_species {
        config.min_seqnum_species = min_seqnum_species;
    }

    if config.annotation_file.as_os_str().is_empty() {
        return Err("no annotation file given (use --annotations or the configuration file)".to_string());
    }
    Ok(config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli_args: CliArgs = CliArgs::parse();

    let config = match build_config(&cli_args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\nError reading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = fs::create_dir_all(&config.output_dir) {
        eprintln!(
            "\nError creating output directory '{}': {}",
            config.output_dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let mut store = DirectoryStore::new(&cli_args.reference_dir)
        .with_id_column(&cli_args.reference_id_column);
    if let Some(obo_file) = &cli_args.obo_file {
        store = match store.with_ontology(obo_file) {
            Ok(store) => store,
            Err(e) => {
                eprintln!("\nError processing OBO file '{}':", obo_file.display());
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        };
    }

    info!(
        "Starting enrichment analysis against {} using {:?} correction",
        config.species_selector(),
        config.correction_method
    );

    match run_all(&config, &store) {
        Ok(reports) => {
            for report in &reports {
                info!(
                    "{}: {} of {} terms reported ({} study sequences, {} reference clusters)",
                    report.category,
                    report.rows_written,
                    report.terms_tested,
                    report.study_total,
                    report.reference_total
                );
            }
            info!("Finished analysis");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("\nError during enrichment analysis:");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
