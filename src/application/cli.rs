use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use chrono::Local;
use chrono::TimeZone;
use chrono::Utc;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgGroup;
use clap::ArgMatches;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use yansi::Paint;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ChatSession;
use crate::domain::models::STORAGE_KEY_SESSIONS;
use crate::domain::services::actions::help_text;
use crate::domain::services::SessionStore;
use crate::infrastructure::storage::StorageManager;

/// What the chat loop needs to know that isn't part of the config file.
pub struct ChatOptions {
    pub ephemeral: bool,
}

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

pub fn format_timestamp(millis: i64) -> String {
    return match Utc.timestamp_millis_opt(millis).single() {
        Some(ts) => ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => "unknown".to_string(),
    };
}

pub fn format_session(session: &ChatSession) -> String {
    let mut res = format!(
        "- (ID: {}) {}, {}",
        session.id,
        format_timestamp(session.created_at),
        session.title,
    );

    if let Some(model) = &session.model {
        if !model.is_empty() {
            res = format!("{res}, Model: {model}");
        }
    }

    return format!("{res}, Messages: {}", session.messages.len());
}

async fn open_store() -> SessionStore {
    return SessionStore::load(
        StorageManager::get(false),
        &Config::get(ConfigKey::Model),
    )
    .await;
}

async fn print_sessions_list() -> Result<()> {
    let sessions = SessionStore::read_saved(&StorageManager::get(false))
        .await
        .iter()
        .filter(|session| return !session.messages.is_empty())
        .map(format_session)
        .collect::<Vec<String>>();

    if sessions.is_empty() {
        println!("There are no sessions available. You should start your first one!");
    } else {
        println!("{}", sessions.join("\n"));
    }

    return Ok(());
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(config_file_path.clone()).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_sessions_delete() -> Command {
    return Command::new("delete")
        .about("Delete one or all sessions.")
        .arg(
            clap::Arg::new("session-id")
                .short('i')
                .long("id")
                .help("Session ID")
                .num_args(1),
        )
        .arg(
            clap::Arg::new("all")
                .long("all")
                .help("Delete all sessions.")
                .action(ArgAction::SetTrue),
        )
        .group(
            ArgGroup::new("delete-args")
                .args(["session-id", "all"])
                .required(true),
        );
}

fn subcommand_sessions() -> Command {
    return Command::new("sessions")
        .about("Manage saved chat sessions.")
        .arg_required_else_help(true)
        .subcommand(Command::new("dir").about("Print the directory sessions are saved to."))
        .subcommand(Command::new("list").about("List all saved sessions with their ids, titles and models."))
        .subcommand(subcommand_sessions_delete());
}

pub fn build() -> Command {
    let commands_text = help_text()
        .split('\n')
        .map(|line| {
            if line.starts_with('-') {
                return format!("  {line}");
            }
            if line.starts_with("COMMANDS:") {
                return Paint::new(format!("CHAT {line}"))
                    .underline()
                    .bold()
                    .to_string();
            }
            return line.to_string();
        })
        .collect::<Vec<String>>()
        .join("\n");

    let about = format!(
        "{}\n\nVersion: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
    );

    return Command::new("synapse")
        .about(about)
        .version(env!("CARGO_PKG_VERSION"))
        .after_help(commands_text)
        .arg_required_else_help(false)
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_sessions())
        .arg(
            Arg::new("ephemeral")
                .long("ephemeral")
                .help("Keep sessions in memory only, nothing is read from or written to disk.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("SYNAPSE_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file. [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::ApiURL.to_string())
                .long(ConfigKey::ApiURL.to_string())
                .env("SYNAPSE_API_URL")
                .num_args(1)
                .help(format!("Base URL of the OpenAI compatible API. [default: {}]", Config::default(ConfigKey::ApiURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::ApiToken.to_string())
                .long(ConfigKey::ApiToken.to_string())
                .env("SYNAPSE_API_TOKEN")
                .num_args(1)
                .help("Bearer token attached to every request. Leave unset for anonymous access.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::DataDir.to_string())
                .long(ConfigKey::DataDir.to_string())
                .env("SYNAPSE_DATA_DIR")
                .num_args(1)
                .help(format!("Directory where sessions and preferences are saved. [default: {}]", Config::default(ConfigKey::DataDir)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::Model.to_string())
                .short('m')
                .long(ConfigKey::Model.to_string())
                .env("SYNAPSE_MODEL")
                .num_args(1)
                .help(format!("Model used for new sessions until another one is picked. [default: {}]", Config::default(ConfigKey::Model)))
                .global(true),
        );
}

async fn handle_sessions(matches: &ArgMatches, subcmd_matches: &ArgMatches) -> Result<()> {
    match subcmd_matches.subcommand() {
        Some(("dir", dir_matches)) => {
            Config::load(build(), vec![matches, subcmd_matches, dir_matches]).await?;
            println!("{}", Config::get(ConfigKey::DataDir));
        }
        Some(("list", list_matches)) => {
            Config::load(build(), vec![matches, subcmd_matches, list_matches]).await?;
            print_sessions_list().await?;
        }
        Some(("delete", delete_matches)) => {
            Config::load(build(), vec![matches, subcmd_matches, delete_matches]).await?;
            if let Some(session_id) = delete_matches.get_one::<String>("session-id") {
                if !open_store().await.delete(session_id).await {
                    bail!(format!("No session found for id {session_id}"));
                }
                println!("Deleted session {session_id}");
            } else if delete_matches.get_flag("all") {
                StorageManager::get(false)
                    .remove(STORAGE_KEY_SESSIONS)
                    .await?;
                println!("Deleted all sessions");
            } else {
                subcommand_sessions_delete().print_long_help()?;
            }
        }
        _ => {
            subcommand_sessions().print_long_help()?;
        }
    }

    return Ok(());
}

/// Parses arguments and runs any one-shot subcommand. Returns options for the
/// chat loop when it should start.
pub async fn parse() -> Result<Option<ChatOptions>> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
            return Ok(None);
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(None);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(None);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(None);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(None);
            }
        },
        Some(("sessions", subcmd_matches)) => {
            handle_sessions(&matches, subcmd_matches).await?;
            return Ok(None);
        }
        _ => {
            Config::load(build(), vec![&matches]).await?;
        }
    }

    return Ok(Some(ChatOptions {
        ephemeral: matches.get_flag("ephemeral"),
    }));
}
