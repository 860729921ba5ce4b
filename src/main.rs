use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use op_bot_store::{Advance, ChapterRecord, ChatId, Store, StoreConfig, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("couldn't render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(about = "Inspect and maintain the op-bot database")]
struct Cli {
    #[arg(long, env = "MONGODB_URI", hide_env_values = true)]
    uri: String,
    #[arg(long, env = "MONGODB_DATABASE", default_value = op_bot_store::config::DEFAULT_DATABASE)]
    database: String,
    /// Give up on an operation after this many seconds.
    #[arg(long)]
    timeout: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the database answers.
    Ping,
    #[command(subcommand)]
    Subscribers(SubscriberCommand),
    #[command(subcommand)]
    Chapter(ChapterCommand),
}

#[derive(Subcommand, Debug)]
enum SubscriberCommand {
    List,
    Add {
        #[arg(allow_hyphen_values = true)]
        chat_id: i64,
    },
    Remove {
        #[arg(allow_hyphen_values = true)]
        chat_id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum ChapterCommand {
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Create the chapter record if there is none yet.
    Seed { number: i64, url: String },
    /// Move the record from <NUMBER> to <NUMBER>+1.
    Advance { number: i64, url: String },
}

async fn run(store: &Store, command: Command) -> Result<(), CliError> {
    match command {
        Command::Ping => println!("{} is reachable", store.database_name()),
        Command::Subscribers(SubscriberCommand::List) => {
            for chat_id in store.list_subscriber_ids().await? {
                println!("{chat_id}");
            }
        }
        Command::Subscribers(SubscriberCommand::Add { chat_id }) => {
            if store.add_subscriber(ChatId(chat_id)).await? {
                println!("Added {chat_id}");
            } else {
                println!("{chat_id} is already subscribed");
            }
        }
        Command::Subscribers(SubscriberCommand::Remove { chat_id }) => {
            if store.remove_subscriber(ChatId(chat_id)).await? {
                println!("Removed {chat_id}");
            } else {
                println!("{chat_id} was not subscribed");
            }
        }
        Command::Chapter(ChapterCommand::Show { json }) => {
            let chapter = store.latest_chapter().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&chapter)?);
            } else {
                println!("Chapter {}: {}", chapter.chapter_number, chapter.latest_url);
            }
        }
        Command::Chapter(ChapterCommand::Seed { number, url }) => {
            if store.seed_chapter(&ChapterRecord::new(number, url)).await? {
                println!("Seeded chapter {number}");
            } else {
                println!("A chapter record already exists, left untouched");
            }
        }
        Command::Chapter(ChapterCommand::Advance { number, url }) => {
            match store.advance_chapter(number, &url).await? {
                Advance::Advanced => println!("Advanced to chapter {}", number + 1),
                Advance::Stale => println!("Stored chapter is not {number}, nothing changed"),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = StoreConfig::new(cli.uri).database(cli.database);
    if let Some(secs) = cli.timeout {
        config = config.operation_timeout(Duration::from_secs(secs));
    }

    let store = match Store::open(&config).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&store, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Store(StoreError::NotFound)) => {
            eprintln!("No chapter record yet, create one with `chapter seed`");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
