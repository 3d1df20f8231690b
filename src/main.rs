//! lise CLI entry point

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use lise::{
    commands::{
        cmd_add_datasource, cmd_ask, cmd_chat, cmd_create_property, cmd_delete_property,
        cmd_index_website, cmd_init, cmd_list_datasources, cmd_list_properties, cmd_status,
        confirm, describe_failure, print_datasources, print_index_report, print_init,
        print_properties, print_property, print_reply, print_status, AddDatasourceOptions,
    },
    config::{load_env_files, Config},
    error::Result,
    llm::Platform,
    meta::{DatasourceType, MetaDb},
    progress::LogWriterFactory,
};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "lise")]
#[command(version, about = "Chat with a website: crawl, index locally, answer with RAG", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "LISE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize lise configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Manage properties (websites registered for chat)
    Properties {
        #[command(subcommand)]
        action: PropertyAction,
    },

    /// Manage and index the datasources of a property
    Datasources {
        #[command(subcommand)]
        action: DatasourceAction,
    },

    /// Answer a single question about a property
    Ask {
        /// Property name or ID
        property: String,

        /// The question
        query: String,

        /// Number of chunks used as context
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Chat with a property interactively
    Chat {
        /// Property name or ID
        property: String,
    },

    /// Show system status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum PropertyAction {
    /// Register a website
    Create {
        /// Unique property name
        name: String,

        /// Website URL; only scheme and host are kept
        #[arg(short, long)]
        website: String,

        /// LLM platform (defaults to the configured platform)
        #[arg(short, long, value_enum)]
        platform: Option<PlatformArg>,
    },

    /// List properties
    List,

    /// Delete a property with its chunks and index
    Delete {
        /// Property name or ID
        property: String,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum DatasourceAction {
    /// Add a datasource to a property
    Add {
        /// Property name or ID
        property: String,

        /// URL to crawl or fetch
        #[arg(short, long)]
        url: String,

        /// Crawl the whole site or fetch a single page
        #[arg(short = 't', long = "type", value_enum, default_value = "website")]
        source_type: SourceTypeArg,

        /// Page always fetched, even when not linked (repeatable)
        #[arg(long = "include")]
        include: Vec<String>,

        /// Path substring never crawled (repeatable)
        #[arg(long = "exclude")]
        exclude: Vec<String>,
    },

    /// List the datasources of a property
    List {
        /// Property name or ID
        property: String,
    },

    /// Crawl and (re)build the index of the property registered for a website
    Index {
        /// Website of the property
        #[arg(short, long)]
        website: String,

        /// Reuse the pages of the last crawl instead of crawling again
        #[arg(long)]
        from_cache: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PlatformArg {
    Groq,
    Openai,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Groq => Platform::Groq,
            PlatformArg::Openai => Platform::OpenAi,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceTypeArg {
    Website,
    Page,
}

impl From<SourceTypeArg> for DatasourceType {
    fn from(arg: SourceTypeArg) -> Self {
        match arg {
            SourceTypeArg::Website => DatasourceType::Website,
            SourceTypeArg::Page => DatasourceType::Page,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // .env may set LISE_HOME or LISE_CONFIG, so it is read before the arguments
    load_env_files(None);
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // Handle init command specially (doesn't need existing config)
    if let Commands::Init { force } = cli.command {
        let (base_dir, config_path) = Config::resolve_paths(cli.config.as_deref());
        let info = cmd_init(base_dir, config_path, force).await?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
        } else {
            print_init(&info);
        }
        return Ok(());
    }

    // Handle completions command (doesn't need config/db)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "lise", &mut std::io::stdout());
        return Ok(());
    }

    let (base_dir, _) = Config::resolve_paths(cli.config.as_deref());
    load_env_files(Some(&base_dir));

    let config = Config::open(cli.config.as_deref())?;
    config.ensure_dirs()?;

    let db = MetaDb::connect(&config.paths.db_file).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => {}

        Commands::Properties { action } => match action {
            PropertyAction::Create {
                name,
                website,
                platform,
            } => {
                let info =
                    cmd_create_property(&config, &db, &name, &website, platform.map(Into::into))
                        .await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&info)?);
                } else {
                    println!("✓ Property created");
                    print_property(&info);
                }
            }
            PropertyAction::List => {
                let properties = cmd_list_properties(&config, &db).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&properties)?);
                } else {
                    print_properties(&properties);
                }
            }
            PropertyAction::Delete { property, yes } => {
                let target = db.find_property(&property).await?;
                if !yes
                    && !confirm(&format!(
                        "Delete property '{}' ({}) and all its data?",
                        target.name, target.website
                    ))?
                {
                    println!("Aborted.");
                    return Ok(());
                }
                let deleted = cmd_delete_property(&config, &db, &target.id.to_string()).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&deleted)?);
                } else {
                    println!("✓ Property '{}' deleted", deleted.name);
                }
            }
        },

        Commands::Datasources { action } => match action {
            DatasourceAction::Add {
                property,
                url,
                source_type,
                include,
                exclude,
            } => {
                let options = AddDatasourceOptions {
                    url,
                    source_type: source_type.into(),
                    mandatory_pages: include,
                    exclude_pages: exclude,
                };
                let datasource = cmd_add_datasource(&db, &property, options).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&datasource)?);
                } else {
                    println!("✓ Datasource added");
                    print_datasources(std::slice::from_ref(&datasource));
                }
            }
            DatasourceAction::List { property } => {
                let datasources = cmd_list_datasources(&db, &property).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&datasources)?);
                } else {
                    print_datasources(&datasources);
                }
            }
            DatasourceAction::Index {
                website,
                from_cache,
            } => {
                let report = cmd_index_website(&config, &db, &website, from_cache).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print_index_report(&report);
                }
            }
        },

        Commands::Ask {
            property,
            query,
            top_k,
        } => match cmd_ask(&config, &db, &property, &query, top_k).await {
            Ok(reply) => {
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&reply)?);
                } else {
                    print_reply(&reply);
                }
            }
            Err(e) => {
                if cli.json {
                    let body = serde_json::json!({
                        "error": describe_failure(&e),
                        "rate_limited": e.is_rate_limited(),
                    });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                } else {
                    eprintln!("{}", describe_failure(&e));
                }
                std::process::exit(1);
            }
        },

        Commands::Chat { property } => {
            cmd_chat(&config, &db, &property).await?;
        }

        Commands::Status => {
            let status = cmd_status(&config, &db).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}
