/// Command and image handlers
pub mod handlers;
/// Telegram calls with retry
pub mod resilient;
