//! /start command plugin.
//!
//! Greets the user and shows the main keyboard with the document links.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::config::DocumentLinks;

/// Callback data carried by the help button.
pub const HELP_CALLBACK: &str = "help";

pub const GREETING_TEXT: &str = "Здравствуйте! Я бот-помощник. Выберите нужный раздел:";

/// Build the three-row main keyboard: two document links and the help button.
pub fn build_main_keyboard(links: &DocumentLinks) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::url(
            "📚 Педагогическая работа",
            links.pedagogical.clone(),
        )],
        vec![InlineKeyboardButton::url(
            "👥 Воспитательная работа",
            links.educational.clone(),
        )],
        vec![InlineKeyboardButton::callback("❓ Помощь", HELP_CALLBACK)],
    ])
}
