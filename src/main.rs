use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tutorchat::commands;
use tutorchat::{AppConfig, ChatSession, LlmClient, Provider, StorageManager};

#[derive(Parser)]
#[command(name = "tutorchat")]
#[command(version)]
#[command(about = "Chat with a tutoring assistant backed by Google or Zhipu models", long_about = None)]
struct Cli {
    /// Directory holding conversations and settings (default: ~/.tutorchat)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Increase log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat in the current conversation
    Chat,
    /// Send one message and print the streamed reply
    Ask {
        /// Message text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// List all conversations
    List,
    /// Print a conversation transcript (default: the current one)
    Show { conversation: Option<String> },
    /// Start a new, empty conversation
    New {
        #[arg(long)]
        title: Option<String>,
    },
    /// Delete a conversation by id, id prefix or list number
    Delete { conversation: String },
    /// View or change provider settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings
    Show,
    /// Store an API key for a provider
    SetKey { provider: Provider, key: String },
    /// Select the provider used for replies
    Use { provider: Provider },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tutorchat::logging::init(cli.verbose);

    let config = AppConfig::resolve(cli.data_dir)?;
    let storage = StorageManager::new(&config.data_dir);
    let mut session = ChatSession::open(storage, LlmClient::new()?)?;

    match cli.command {
        None | Some(Commands::Chat) => commands::run_chat(&mut session).await,
        Some(Commands::Ask { text }) => commands::ask(&mut session, &text.join(" ")).await,
        Some(Commands::List) => commands::list_conversations(&session),
        Some(Commands::Show { conversation }) => {
            commands::show_conversation(&session, conversation.as_deref())
        }
        Some(Commands::New { title }) => commands::new_conversation(&mut session, title.as_deref()),
        Some(Commands::Delete { conversation }) => {
            commands::delete_conversation(&mut session, &conversation)
        }
        Some(Commands::Settings { action }) => match action {
            None | Some(SettingsAction::Show) => commands::show_settings(&session),
            Some(SettingsAction::SetKey { provider, key }) => {
                commands::set_api_key(&mut session, provider, key)
            }
            Some(SettingsAction::Use { provider }) => commands::use_provider(&mut session, provider),
        },
    }
}
