use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use folio_core::{
    Collection, ConfigRole, DocumentRef, OpenedDocument, Workspace, WorkspaceConfig,
    WorkspaceError,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("folio")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Turn source documents into generated code artifacts")
        .subcommand_required(true)
        .arg(
            Arg::new("config-file")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .global(true)
                .help("Backing store base URL (overrides config and FOLIO_API_BASE_URL)"),
        )
        .subcommand(
            Command::new("list")
                .about("List one or both collections")
                .arg(
                    Arg::new("collection")
                        .value_parser(value_parser!(Collection))
                        .help("documents or artifacts"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Print a textual document, or describe a binary one")
                .arg(document_collection())
                .arg(Arg::new("name").required(true)),
        )
        .subcommand(
            Command::new("remove")
                .about("Delete a document and print the refreshed listing")
                .arg(document_collection())
                .arg(Arg::new("name").required(true)),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate code from a binary document")
                .arg(Arg::new("name").required(true))
                .arg(
                    Arg::new("save")
                        .long("save")
                        .action(ArgAction::SetTrue)
                        .help("Save the artifact into the artifacts collection"),
                )
                .arg(
                    Arg::new("verify")
                        .long("verify")
                        .action(ArgAction::SetTrue)
                        .help("Trigger a verification run of the artifact"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Active model configuration")
                .subcommand_required(true)
                .subcommand(Command::new("show").about("Print the active configuration"))
                .subcommand(
                    Command::new("set")
                        .about("Assign a model to a role")
                        .arg(
                            Arg::new("role")
                                .required(true)
                                .value_parser(value_parser!(ConfigRole))
                                .help("generatorRole or retrievalRole"),
                        )
                        .arg(Arg::new("model").required(true)),
                ),
        )
        .subcommand(Command::new("models").about("List models and their availability"))
}

fn document_collection() -> Arg {
    Arg::new("collection")
        .required(true)
        .value_parser(value_parser!(Collection))
        .help("documents or artifacts")
}

fn load_config(matches: &ArgMatches) -> Result<WorkspaceConfig> {
    let mut config = match matches.get_one::<PathBuf>("config-file") {
        Some(path) => WorkspaceConfig::load(path)?.with_env_overrides(),
        None => WorkspaceConfig::from_env(),
    };
    if let Some(url) = matches.get_one::<String>("base-url") {
        config = config.with_api_base_url(url.clone());
    }
    Ok(config)
}

fn document(args: &ArgMatches) -> Result<DocumentRef> {
    let collection = *args
        .get_one::<Collection>("collection")
        .context("missing collection")?;
    let name = args.get_one::<String>("name").context("missing name")?;
    Ok(DocumentRef::new(name.clone(), collection))
}

/// Render workspace errors the way a view would
fn user_facing(err: WorkspaceError) -> anyhow::Error {
    anyhow::anyhow!(err.user_message())
}

fn print_listing(collection: Collection, listing: &[DocumentRef]) {
    println!("{collection}:");
    for doc in listing {
        println!("  {}", doc.name);
    }
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let workspace = Workspace::connect(config)?;

    match matches.subcommand() {
        Some(("list", args)) => match args.get_one::<Collection>("collection") {
            Some(collection) => {
                let listing = workspace
                    .index()
                    .refresh(*collection)
                    .await
                    .map_err(user_facing)?;
                print_listing(*collection, &listing);
            }
            None => {
                let snapshot = workspace.index().refresh_all().await.map_err(user_facing)?;
                for collection in Collection::ALL {
                    print_listing(collection, snapshot.listing(collection));
                }
            }
        },
        Some(("show", args)) => {
            let doc = document(args)?;
            match workspace.open(&doc).await.map_err(user_facing)? {
                OpenedDocument::Preview(handle) => {
                    println!("{}: {} bytes ({})", doc, handle.len(), handle.media_type());
                }
                OpenedDocument::Text(text) => print!("{}", text.content),
            }
        }
        Some(("remove", args)) => {
            let doc = document(args)?;
            let listing = workspace.index().remove(&doc).await.map_err(user_facing)?;
            print_listing(doc.collection, &listing);
        }
        Some(("generate", args)) => {
            let name = args.get_one::<String>("name").context("missing name")?;
            let pipeline = workspace.pipeline();
            if let Err(err) = pipeline.select(DocumentRef::document(name.clone())).await {
                tracing::warn!(error = %err, "preview unavailable");
            }
            let artifact = pipeline.generate().await.map_err(user_facing)?;
            tracing::info!(artifact = %artifact.target_name, "generated");
            println!("{}", artifact.payload);

            if args.get_flag("save") {
                pipeline.save().await.map_err(user_facing)?;
                eprintln!("saved {}", artifact.target_name);
            }
            if args.get_flag("verify") {
                pipeline.trigger_verification().await.map_err(user_facing)?;
                eprintln!("verification started for {}", artifact.target_name);
            }
        }
        Some(("config", args)) => match args.subcommand() {
            Some(("set", set)) => {
                let role = *set.get_one::<ConfigRole>("role").context("missing role")?;
                let model = set.get_one::<String>("model").context("missing model")?;
                let active = workspace
                    .mirror()
                    .write(role, model)
                    .await
                    .map_err(user_facing)?;
                println!("generatorRole: {}", active.generator_role);
                println!("retrievalRole: {}", active.retrieval_role);
            }
            _ => {
                let active = workspace.navigate().await.map_err(user_facing)?;
                println!("generatorRole: {}", active.generator_role);
                println!("retrievalRole: {}", active.retrieval_role);
            }
        },
        Some(("models", _)) => {
            let supported = workspace.mirror().list_models().await.map_err(user_facing)?;
            for option in workspace.mirror().catalog().options() {
                let status = if !option.available {
                    "unavailable"
                } else if supported.contains(&option.name) {
                    "available"
                } else {
                    "not offered by backend"
                };
                println!("{:<16} {:<12} {}", option.name, status, option.price);
            }
            for name in supported
                .iter()
                .filter(|name| workspace.mirror().catalog().find(name).is_none())
            {
                println!("{name:<16} {:<12}", "available");
            }
        }
        _ => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    match run(&matches).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
