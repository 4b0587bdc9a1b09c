pub mod discovery;
pub mod notifier;
pub mod validator;

pub use discovery::DiscoverySurface;
pub use notifier::{NotificationResult, NotifierPlugin};
pub use validator::ProductValidator;
