#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::process;

use anyhow::Error;
use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task;
use yansi::Paint;

use crate::application::cli;
use crate::application::ui;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Action;
use crate::domain::models::ChatError;
use crate::domain::models::Event;
use crate::domain::services::actions::ActionsService;
use crate::domain::services::GenerationService;
use crate::domain::services::SessionStore;
use crate::infrastructure::backends::BackendManager;
use crate::infrastructure::storage::StorageManager;

fn handle_error(err: Error) {
    let title = match err.downcast_ref::<ChatError>() {
        Some(ChatError::Network(_)) => "Synapse could not reach the chat API.",
        _ => "Oh no! Synapse has failed with the following app version and error.",
    };

    eprintln!(
        "{}",
        Paint::red(format!(
            "{title}\n\nVersion: {}\nError: {}",
            env!("CARGO_PKG_VERSION"),
            err
        ))
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

fn log_dir() -> String {
    return env::var("SYNAPSE_LOG_DIR").unwrap_or_else(|_| {
        return dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("synapse")
            .to_string_lossy()
            .to_string();
    });
}

async fn run(ephemeral: bool) -> Result<()> {
    let storage = StorageManager::get(ephemeral);
    let store = SessionStore::load(storage, &Config::get(ConfigKey::Model)).await;
    let backend = BackendManager::get();

    tracing::debug!(
        ephemeral = ephemeral,
        data_dir = Config::get(ConfigKey::DataDir),
        api_url = Config::get(ConfigKey::ApiURL),
        "Starting chat"
    );

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
    let generation = GenerationService::new(store.clone(), backend.clone()).with_events(event_tx);

    let mut background_futures = task::JoinSet::new();
    background_futures.spawn(async move {
        return ActionsService::start(generation, &mut action_rx).await;
    });

    let ui_future = ui::start(store, backend, action_tx, event_rx);

    let res = tokio::select!(
        res = background_futures.join_next() => match res {
            Some(Ok(res)) => res,
            Some(Err(err)) => Err(err.into()),
            None => Ok(()),
        },
        res = ui_future => res,
    );

    return res;
}

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let file_appender = tracing_appender::rolling::never(log_dir(), "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("synapse")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    let options = match cli::parse().await {
        Ok(Some(options)) => options,
        Ok(None) => process::exit(0),
        Err(err) => {
            handle_error(err);
            return;
        }
    };

    if let Err(err) = run(options.ephemeral).await {
        handle_error(err);
    }

    process::exit(0);
}
