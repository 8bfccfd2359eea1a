use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use redeem_cli::cleanlab::demo::{run_demo, run_grid_demo};
use redeem_cli::cleanlab::input::DemoConfig;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("REDEEM_LOG", "error,redeem=info"))
        .init();

    let matches = Command::new("redeem")
        .version(clap::crate_version!())
        .author("Justin Sing <justincsing@gmail.com>")
        .about("\u{1F9EA} ReDeeM CLI - Learning with noisy labels")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("cleanlab")
                .about("Estimate label noise and train noise-robust classifiers")
                .subcommand_required(true)
                .subcommand(
                    Command::new("demo")
                        .about(
                            "Inject label noise, compare plain training with confident learning, then sweep the grid",
                        )
                        .args(common_args()),
                )
                .subcommand(
                    Command::new("grid")
                        .about("Sweep prune_method x converge_latent_estimates on noisy labels")
                        .args(common_args()),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Written by {author-with-newline}Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("cleanlab", sub_m)) => handle_cleanlab(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn common_args() -> Vec<Arg> {
    vec![
        Arg::new("config")
            .help("Path to a JSON demo configuration file")
            .required(false)
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::FilePath),
        Arg::new("data")
            .short('d')
            .long("data")
            .value_parser(clap::builder::NonEmptyStringValueParser::new())
            .help(
                "CSV/TSV file with numeric features and a label column. \
                 Defaults to the bundled Iris table.",
            )
            .value_hint(ValueHint::FilePath),
        Arg::new("label_column")
            .short('l')
            .long("label-column")
            .help("Name of the label column.")
            .value_parser(clap::builder::NonEmptyStringValueParser::new()),
        Arg::new("seed")
            .short('s')
            .long("seed")
            .help("Random seed for the split, the noise and the folds.")
            .value_parser(clap::value_parser!(u64)),
        Arg::new("model_type")
            .long("model-type")
            .help("Override the model type from the JSON config.")
            .value_parser(["logistic", "gbdt"])
            .value_hint(ValueHint::Other),
        Arg::new("prune_method")
            .long("prune-method")
            .help("Pruning policy for likely label errors.")
            .value_parser(["prune_by_noise_rate", "prune_by_class", "both"])
            .value_hint(ValueHint::Other),
        Arg::new("converge")
            .long("converge")
            .help("Re-estimate the noise on the pruned data until the prior settles.")
            .action(ArgAction::SetTrue),
        Arg::new("folds")
            .short('k')
            .long("folds")
            .help("Number of cross-validation folds.")
            .value_parser(clap::value_parser!(usize)),
        Arg::new("threads")
            .short('j')
            .long("threads")
            .help("Worker threads for the cross-validation folds.")
            .value_parser(clap::value_parser!(usize)),
    ]
}

fn handle_cleanlab(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("demo", demo_matches)) => {
            let config = load_config(demo_matches)?;
            match run_demo(&config).and_then(|_| run_grid_demo(&config)) {
                Ok(_) => Ok(()),
                Err(e) => {
                    log::error!("Demo failed: {:#}", e);
                    std::process::exit(1)
                }
            }
        }
        Some(("grid", grid_matches)) => {
            let config = load_config(grid_matches)?;
            let scores = run_grid_demo(&config)?;
            if let Some(best) = scores.first() {
                log::info!(
                    "[ReDeeM::Cleanlab] Best setting: {} / converge_latent_estimates = {} ({:.2})",
                    best.point.prune_method,
                    best.point.converge_latent_estimates,
                    best.accuracy
                );
            }
            Ok(())
        }
        _ => unreachable!(),
    }
}

fn load_config(matches: &ArgMatches) -> Result<DemoConfig> {
    let config_path = matches.get_one::<PathBuf>("config");
    match config_path {
        Some(path) => log::info!("[ReDeeM::Cleanlab] Using config: {:?}", path),
        None => log::info!("[ReDeeM::Cleanlab] No config provided; using defaults."),
    }
    let config = DemoConfig::from_arguments(config_path, matches)?;
    log::debug!(
        "[ReDeeM::Cleanlab] Effective config:\n{}",
        serde_json::to_string_pretty(&config).unwrap_or_default()
    );
    Ok(config)
}
