pub mod discord;
pub mod email;
pub mod telegram;

pub use discord::DiscordNotifier;
pub use email::EmailNotifier;
pub use telegram::TelegramNotifier;
