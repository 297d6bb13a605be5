//! Help button plugin.

/// Shown in place of the main menu when the help button is pressed.
pub const HELP_TEXT: &str = "📋 <b>Как пользоваться ботом:</b>\n\n\
    • Нажмите на кнопку с названием раздела\n\
    • Ссылка откроется в браузере автоматически\n\n\
    ❓ По вопросам доступа обращайтесь к администратору";
