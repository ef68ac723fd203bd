//! `upq`: command-line producer for the plot update queue

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use upq_core::UpqConfig;
use upq_types::{UpdateFlag, UpdateFlagSet};

mod chunk_arg;
mod commands;

use chunk_arg::{parse_chunk_arg, resolve_all, ChunkArg};
use commands::ChunkSelection;

/// Log filter variable, checked before `RUST_LOG`
const LOG_ENV: &str = "UPQ_LOG";

fn cli() -> Command {
    let chunk_arg = |name: &'static str| {
        Arg::new(name)
            .value_name("CHUNK")
            .value_parser(parse_chunk_arg)
            .help("Chunk id: decimal, 0x-prefixed hex, or a queue key like l2_1d23")
    };

    Command::new("upq")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Producer for the plot update queue")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML config file"),
        )
        .arg(
            Arg::new("index")
                .long("index")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Chunk/plot index file"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .global(true)
                .help("Store host"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .global(true)
                .value_parser(value_parser!(u16))
                .help("Store port"),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .value_parser(value_parser!(i64))
                .help("Store database index"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging"),
        )
        .subcommand(
            Command::new("dispatch")
                .about("Enqueue chunks and mark their plots for update")
                .arg(
                    chunk_arg("chunks")
                        .num_args(1..)
                        .required_unless_present("all")
                        .conflicts_with("all"),
                )
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Dispatch every chunk in the index"),
                )
                .args(UpdateFlag::ALL.iter().map(|&flag| {
                    Arg::new(flag_arg_name(flag))
                        .long(flag_arg_name(flag))
                        .action(ArgAction::SetTrue)
                        .help(format!("Set the '{}' flag on every plot", flag.token()))
                })),
        )
        .subcommand(
            Command::new("inspect")
                .about("Show the queue and, optionally, one chunk's pending plots")
                .arg(chunk_arg("chunk").long("chunk"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("plots")
                .about("List the plots of a chunk from the index")
                .arg(chunk_arg("chunk").required(true)),
        )
}

fn flag_arg_name(flag: UpdateFlag) -> &'static str {
    match flag {
        UpdateFlag::MetadataOnly => "metadata-only",
        UpdateFlag::DefaultJson => "default-json",
        UpdateFlag::DefaultBuild => "default-build",
        UpdateFlag::NoImageUpdate => "no-image-update",
    }
}

fn selected_flags(args: &ArgMatches) -> UpdateFlagSet {
    UpdateFlag::ALL
        .iter()
        .copied()
        .filter(|&flag| args.get_flag(flag_arg_name(flag)))
        .collect()
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(matches: &ArgMatches) -> anyhow::Result<UpqConfig> {
    let mut config = UpqConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    if let Some(index) = matches.get_one::<PathBuf>("index") {
        config = config.with_index_path(index);
    }
    if let Some(host) = matches.get_one::<String>("host") {
        config.store = config.store.with_host(host);
    }
    if let Some(&port) = matches.get_one::<u16>("port") {
        config.store = config.store.with_port(port);
    }
    if let Some(&db) = matches.get_one::<i64>("db") {
        config.store = config.store.with_database(db);
    }
    tracing::debug!(?config, "configuration resolved");
    Ok(config)
}

async fn run(matches: ArgMatches) -> anyhow::Result<bool> {
    let config = resolve_config(&matches)?;

    match matches.subcommand() {
        Some(("dispatch", args)) => {
            let selection = if args.get_flag("all") {
                ChunkSelection::AllIndexed
            } else {
                ChunkSelection::Listed(resolve_all(
                    args.get_many::<ChunkArg>("chunks").into_iter().flatten(),
                    &config.level_tag,
                )?)
            };
            commands::dispatch(&config, selection, selected_flags(args)).await
        }
        Some(("inspect", args)) => {
            let chunk = args
                .get_one::<ChunkArg>("chunk")
                .map(|arg| arg.resolve(&config.level_tag))
                .transpose()?;
            commands::inspect(&config, chunk, args.get_flag("json")).await?;
            Ok(true)
        }
        Some(("plots", args)) => {
            let chunk = args
                .get_one::<ChunkArg>("chunk")
                .ok_or_else(|| anyhow::anyhow!("missing chunk argument"))?
                .resolve(&config.level_tag)?;
            commands::plots(&config, chunk).await?;
            Ok(true)
        }
        _ => Ok(true),
    }
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    setup_tracing(matches.get_flag("verbose"));

    let code = match run(matches).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use upq_types::{ChunkId, LevelTag};

    #[test]
    fn cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn dispatch_collects_chunks_and_flags() {
        let matches = cli()
            .try_get_matches_from([
                "upq",
                "dispatch",
                "0x1d23",
                "l2_0",
                "--default-build",
                "--no-image-update",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();

        let chunks = resolve_all(args.get_many::<ChunkArg>("chunks").unwrap(), &LevelTag::default())
            .unwrap();
        assert_eq!(chunks, vec![ChunkId::new(0x1d23), ChunkId::new(0)]);
        assert_eq!(selected_flags(args).serialize(), "sdb niu");
    }

    #[test]
    fn dispatch_all_conflicts_with_listed_chunks() {
        assert!(cli()
            .try_get_matches_from(["upq", "dispatch", "--all", "7"])
            .is_err());
        assert!(cli().try_get_matches_from(["upq", "dispatch"]).is_err());

        let matches = cli().try_get_matches_from(["upq", "dispatch", "--all"]).unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert!(args.get_flag("all"));
        assert!(selected_flags(args).is_empty());
    }

    #[test]
    fn foreign_level_key_is_not_retargeted() {
        let matches = cli().try_get_matches_from(["upq", "dispatch", "l1_ff"]).unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let chunks = args.get_many::<ChunkArg>("chunks").unwrap();
        assert!(resolve_all(chunks, &LevelTag::default()).is_err());
    }

    #[test]
    fn bad_chunk_is_rejected_by_parser() {
        assert!(cli().try_get_matches_from(["upq", "plots", "1d23"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["upq", "inspect", "--port", "7000", "--json"])
            .unwrap();
        assert_eq!(matches.get_one::<u16>("port"), Some(&7000));
        let (_, args) = matches.subcommand().unwrap();
        assert!(args.get_flag("json"));
    }
}
