//! Command and button handlers.
//!
//! Handlers here only describe what to answer; `bot::dispatcher` decides
//! when they apply and `bot::messenger` delivers the answer.

pub mod help;
pub mod start;

use teloxide::utils::command::BotCommands;

/// Commands advertised in the Telegram command menu.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum Command {
    #[command(description = "Открыть меню документов")]
    Start,
}

#[cfg(test)]
pub(crate) fn test_links() -> crate::config::DocumentLinks {
    crate::config::DocumentLinks {
        pedagogical: "https://docs.example.org/pedagogical".parse().unwrap(),
        educational: "https://docs.example.org/educational".parse().unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_menu() {
        let commands = Command::bot_commands();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].command.ends_with("start"));
    }
}
