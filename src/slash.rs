use std::str::FromStr;

use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::config::Provider;

/// Commands that can be invoked in the chat prompt by starting a line with a slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Start a new conversation
    New,
    /// List conversations
    List,
    /// Make another conversation current
    Switch,
    /// Delete a conversation
    Delete,
    /// Choose the provider for later turns
    Provider,
    /// Show help
    Help,
    /// Leave the chat
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    pub fn provider_target(&self) -> Option<Provider> {
        if self.command != SlashCommand::Provider {
            return None;
        }

        match self.argument()?.trim().to_lowercase().as_str() {
            "g" | "gemini" | "gemma" => Some(Provider::Google),
            "z" | "glm" => Some(Provider::Zhipu),
            other => Provider::from_str(other).ok(),
        }
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::New => "start a new conversation (optional title)",
            SlashCommand::List => "list conversations, newest first",
            SlashCommand::Switch => "make the conversation with the given id (or list number) current",
            SlashCommand::Delete => "delete the conversation with the given id (or list number)",
            SlashCommand::Provider => "use google or zhipu for the next replies",
            SlashCommand::Help => "show available commands",
            SlashCommand::Quit => "leave the chat",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.trim().strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let head = parts.next()?;
    let tail: Vec<&str> = parts.collect();

    let command = SlashCommand::from_str(head).ok().or_else(|| {
        match head.to_lowercase().as_str() {
            "q" | "exit" | "bye" => Some(SlashCommand::Quit),
            "h" | "?" => Some(SlashCommand::Help),
            "ls" | "l" => Some(SlashCommand::List),
            "s" | "open" => Some(SlashCommand::Switch),
            "rm" | "d" => Some(SlashCommand::Delete),
            "n" => Some(SlashCommand::New),
            "p" | "model" => Some(SlashCommand::Provider),
            _ => None,
        }
    })?;

    let argument = if tail.is_empty() {
        None
    } else {
        Some(tail.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for command in SlashCommand::iter() {
        help.push_str(&format!("/{} - {}\n", command.command(), command.description()));
    }

    help.push_str("\nAliases: /q for /quit, /ls for /list, /s for /switch, /rm for /delete, /p for /provider");
    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_arguments() {
        let parsed = parse_slash_command("/switch abc-123").unwrap();
        assert_eq!(parsed.command, SlashCommand::Switch);
        assert_eq!(parsed.argument(), Some("abc-123"));

        let parsed = parse_slash_command("  /new  Linear   algebra ").unwrap();
        assert_eq!(parsed.command, SlashCommand::New);
        assert_eq!(parsed.argument(), Some("Linear algebra"));
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(parse_slash_command("/q").unwrap().command, SlashCommand::Quit);
        assert_eq!(parse_slash_command("/rm 2").unwrap().command, SlashCommand::Delete);
        assert_eq!(parse_slash_command("/ls").unwrap().command, SlashCommand::List);
    }

    #[test]
    fn plain_text_and_unknown_commands_are_not_commands() {
        assert!(parse_slash_command("what is /usr?").is_none());
        assert!(parse_slash_command("/frobnicate").is_none());
        assert!(parse_slash_command("/").is_none());
    }

    #[test]
    fn provider_target_accepts_names_and_aliases() {
        let target = |input: &str| parse_slash_command(input).unwrap().provider_target();
        assert_eq!(target("/provider zhipu"), Some(Provider::Zhipu));
        assert_eq!(target("/p Google"), Some(Provider::Google));
        assert_eq!(target("/provider glm"), Some(Provider::Zhipu));
        assert_eq!(target("/provider openai"), None);
        assert_eq!(target("/provider"), None);
        assert_eq!(target("/list"), None);
    }

    #[test]
    fn help_lists_every_command() {
        let help = get_help_text();
        for command in SlashCommand::iter() {
            assert!(help.contains(&format!("/{}", command.command())));
        }
    }
}
