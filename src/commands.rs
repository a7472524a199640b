use anyhow::{Context, Result, bail};
use std::io::{self, Write};
use strum::IntoEnumIterator;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::chat::{ChatSession, TurnOutcome};
use crate::config::Provider;
use crate::conversation::{Conversation, Role};
use crate::session::ConversationStore;
use crate::slash::{SlashCommand, get_help_text, parse_slash_command};

/// Shortest id prefix accepted as a reference; matches what listings print
const MIN_PREFIX_LEN: usize = 8;

/// Resolve a conversation reference: a 1-based list number, a full id, or a
/// unique id prefix of at least [`MIN_PREFIX_LEN`] characters.
///
/// A number only ever names a list position, even when it is out of range.
pub fn resolve_conversation(store: &ConversationStore, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    let conversations = store.conversations();
    if let Ok(index) = reference.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|index| conversations.get(index))
            .map(|c| c.id.clone());
    }

    if let Some(exact) = store.get(reference) {
        return Some(exact.id.clone());
    }
    if reference.len() < MIN_PREFIX_LEN {
        return None;
    }

    let mut matches = conversations.iter().filter(|c| c.id.starts_with(reference));
    match (matches.next(), matches.next()) {
        (Some(only), None) => Some(only.id.clone()),
        _ => None,
    }
}

fn short_id(id: &str) -> &str {
    id.get(..MIN_PREFIX_LEN).unwrap_or(id)
}

fn print_conversation_list(store: &ConversationStore) {
    if store.conversations().is_empty() {
        println!("📭 No conversations yet. Run 'tutorchat chat' to start one!");
        return;
    }

    println!("💬 Your conversations:\n");
    for (index, conversation) in store.conversations().iter().enumerate() {
        let marker = if store.current_id() == Some(conversation.id.as_str()) {
            "▶"
        } else {
            " "
        };
        println!(
            "{} {:>2}. {}  [{}]  {} messages, updated {}",
            marker,
            index + 1,
            conversation.title,
            short_id(&conversation.id),
            conversation.messages.len(),
            conversation.updated_at.format("%Y-%m-%d %H:%M"),
        );
    }
}

fn print_transcript(conversation: &Conversation) {
    println!("📋 {}", conversation.title);
    println!("{}", "=".repeat(50));

    if conversation.messages.is_empty() {
        println!("(no messages yet)");
    }
    for message in &conversation.messages {
        let label = match message.role {
            Role::User => "👤 You",
            Role::Assistant => "🎓 Tutor",
        };
        println!("{} ({}):", label, message.timestamp.format("%Y-%m-%d %H:%M"));
        println!("{}\n", message.content);
    }
}

pub fn list_conversations(session: &ChatSession) -> Result<()> {
    print_conversation_list(session.store());
    Ok(())
}

pub fn show_conversation(session: &ChatSession, reference: Option<&str>) -> Result<()> {
    let store = session.store();
    let conversation = match reference {
        Some(reference) => resolve_conversation(store, reference)
            .and_then(|id| store.get(&id))
            .with_context(|| format!("Conversation '{}' not found", reference))?,
        None => match store.current() {
            Some(conversation) => conversation,
            None => {
                println!("📭 No conversations yet.");
                return Ok(());
            }
        },
    };

    print_transcript(conversation);
    Ok(())
}

pub fn new_conversation(session: &mut ChatSession, title: Option<&str>) -> Result<()> {
    let id = session.store_mut().create_conversation(title)?;
    println!("✨ Started conversation [{}]", short_id(&id));
    Ok(())
}

pub fn delete_conversation(session: &mut ChatSession, reference: &str) -> Result<()> {
    let Some(id) = resolve_conversation(session.store(), reference) else {
        bail!("Conversation '{}' not found", reference);
    };

    session.store_mut().delete_conversation(&id)?;
    println!("🗑️  Deleted conversation [{}]", short_id(&id));
    match session.store().current() {
        Some(current) => println!("▶ Current conversation: {}", current.title),
        None => println!("📭 No conversations left."),
    }
    Ok(())
}

pub fn show_settings(session: &ChatSession) -> Result<()> {
    let settings = session.effective_settings();
    println!("⚙️  Settings");
    println!("   Provider: {} ({})", settings.selected_provider, settings.selected_provider.display_name());
    for provider in Provider::iter() {
        let status = match settings.api_key(provider) {
            Some(key) => mask_key(key),
            None => "not set".to_string(),
        };
        println!("   {} key: {}", provider.display_name(), status);
    }
    Ok(())
}

fn mask_key(key: &str) -> String {
    let visible: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("…{}", visible)
}

pub fn set_api_key(session: &mut ChatSession, provider: Provider, key: String) -> Result<()> {
    let mut settings = session.settings().clone();
    settings.set_api_key(provider, key.trim().to_string());
    session.save_settings(settings)?;
    println!("🔑 Saved {} API key.", provider.display_name());
    Ok(())
}

pub fn use_provider(session: &mut ChatSession, provider: Provider) -> Result<()> {
    let mut settings = session.settings().clone();
    settings.selected_provider = provider;
    session.save_settings(settings)?;
    println!("🤖 Replies will come from {}.", provider.display_name());
    if session.effective_settings().api_key(provider).is_none() {
        println!("💡 No key stored yet: tutorchat settings set-key {} <KEY>", provider);
    }
    Ok(())
}

fn print_missing_key_hint() {
    println!("🔑 No API key configured yet.");
    println!("   Add one with: tutorchat settings set-key <google|zhipu> <KEY>");
}

/// Prints the part of a growing draft that has not been printed yet
#[derive(Default)]
struct DraftPrinter {
    printed: usize,
}

impl DraftPrinter {
    fn update(&mut self, draft: &str) {
        if let Some(delta) = draft.get(self.printed..) {
            print!("{}", delta);
            let _ = io::stdout().flush();
        }
        self.printed = draft.len();
    }
}

async fn run_turn(session: &mut ChatSession, text: &str) {
    println!("🎓 Tutor ({}):", session.settings().selected_provider.display_name());

    let mut printer = DraftPrinter::default();
    match session.send_message(text, |draft| printer.update(draft)).await {
        TurnOutcome::Completed { .. } => println!("\n"),
        TurnOutcome::Aborted => println!("\n⚠️  The reply could not be saved. Please resend your message."),
    }
}

/// Send one message in the current conversation and stream the answer to stdout
pub async fn ask(session: &mut ChatSession, text: &str) -> Result<()> {
    if !session.effective_settings().has_any_api_key() {
        print_missing_key_hint();
        return Ok(());
    }
    if text.trim().is_empty() {
        bail!("Nothing to send");
    }

    run_turn(session, text).await;
    Ok(())
}

/// What the REPL should do after handling a command
enum Flow {
    Continue,
    Quit,
}

fn handle_slash(session: &mut ChatSession, input: &str) -> Result<Flow> {
    let Some(parsed) = parse_slash_command(input) else {
        println!("❓ Unknown command. Type /help for the list.");
        return Ok(Flow::Continue);
    };

    match parsed.command {
        SlashCommand::Quit => return Ok(Flow::Quit),
        SlashCommand::Help => println!("{}", get_help_text()),
        SlashCommand::List => print_conversation_list(session.store()),
        SlashCommand::New => new_conversation(session, parsed.argument())?,
        SlashCommand::Switch => match parsed.argument().and_then(|r| resolve_conversation(session.store(), r)) {
            Some(id) => {
                session.store_mut().select_conversation(&id);
                if let Some(conversation) = session.store().current() {
                    print_transcript(conversation);
                }
            }
            None => println!("❓ Usage: /switch <id or list number>"),
        },
        SlashCommand::Delete => match parsed.argument() {
            Some(reference) => delete_conversation(session, reference)?,
            None => println!("❓ Usage: /delete <id or list number>"),
        },
        SlashCommand::Provider => match parsed.provider_target() {
            Some(provider) => use_provider(session, provider)?,
            None => println!("❓ Usage: /provider <google|zhipu>"),
        },
    }

    Ok(Flow::Continue)
}

/// Interactive chat loop over stdin
pub async fn run_chat(session: &mut ChatSession) -> Result<()> {
    if !session.effective_settings().has_any_api_key() {
        print_missing_key_hint();
        return Ok(());
    }

    println!("🎓 Welcome to tutorchat!");
    println!("{}", "=".repeat(50));
    match session.store().current() {
        Some(conversation) => println!("▶ Continuing: {}", conversation.title),
        None => println!("Ask anything to start a new conversation."),
    }
    println!("Type /help for commands, /quit to leave.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("💭 ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await.context("Failed to read user input")? else {
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            match handle_slash(session, input) {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(err) => println!("❌ {:#}", err),
            }
            continue;
        }

        run_turn(session, input).await;
    }

    println!("👋 Bye!");
    Ok(())
}
