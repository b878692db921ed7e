use crate::bot::resilient::{delete_message_safe, send_message_resilient};
use crate::config::TELEGRAM_MESSAGE_LIMIT;
use crate::solver::{ModelResult, ResultRelay, ScopedImage, SolveError, SolveReport, Solver};
use crate::utils::{retry_telegram_operation, truncate_str};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::{
    net::Download,
    prelude::*,
    types::{FileId, PhotoSize},
    utils::command::BotCommands,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Reply to `/start`
pub const WELCOME_TEXT: &str = "🤖 Welcome to AI MCQ Solver Bot!\n\n\
    Send me a photo of your MCQ question and I'll analyze it with multiple AI models!\n\n\
    Supported formats: JPEG, PNG\n\
    Max size: 5MB";
/// Reply to a message without a usable image
pub const INVALID_INPUT_TEXT: &str = "Please send a proper image file";
/// Status shown while the models run
pub const PROCESSING_TEXT: &str = "🔍 Processing with AI models...";
/// Reply when a request fails as a whole
pub const FAILURE_TEXT: &str = "❌ Error processing your question";

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// List the commands
    #[command(description = "Show this help.")]
    Help,
    /// Check bot health
    #[command(description = "Check bot health.")]
    Healthcheck,
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Whether a document MIME type is an image
#[must_use]
pub fn is_image_mime(essence: &str) -> bool {
    essence
        .split_once('/')
        .is_some_and(|(kind, subtype)| kind.eq_ignore_ascii_case("image") && !subtype.is_empty())
}

/// The largest rendition of a photo, by pixel count
#[must_use]
pub fn largest_photo(photos: &[PhotoSize]) -> Option<&PhotoSize> {
    photos
        .iter()
        .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
}

/// An image attachment ready to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    /// Telegram file to fetch
    pub file_id: FileId,
    /// MIME type forwarded to the vision models
    pub mime_type: String,
}

/// The question image carried by `msg`, if any
#[must_use]
pub fn image_attachment(msg: &Message) -> Option<ImageAttachment> {
    if let Some(photo) = msg.photo().and_then(largest_photo) {
        return Some(ImageAttachment {
            file_id: photo.file.id.clone(),
            mime_type: "image/jpeg".to_string(),
        });
    }

    let doc = msg.document()?;
    let essence = doc.mime_type.as_ref()?.essence_str().to_ascii_lowercase();
    is_image_mime(&essence).then(|| ImageAttachment {
        file_id: doc.file.id.clone(),
        mime_type: essence,
    })
}

/// Render one result as a chat message
#[must_use]
pub fn format_result(result: &ModelResult) -> String {
    truncate_str(
        format!("✦ {}:\n{}", result.model_name, result.display_text),
        TELEGRAM_MESSAGE_LIMIT,
    )
}

/// Sends each result to the chat the question came from
pub struct TelegramRelay {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramRelay {
    /// Relay into `chat_id`
    #[must_use]
    pub const fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl ResultRelay for TelegramRelay {
    async fn relay(&mut self, result: ModelResult) -> Result<()> {
        send_message_resilient(&self.bot, self.chat_id, format_result(&result)).await?;
        Ok(())
    }
}

/// Handle the `/start` command
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, WELCOME_TEXT).await?;
    Ok(())
}

/// Handle the `/help` command
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn help(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

/// Handle the `/healthcheck` command
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn healthcheck(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, "OK").await?;
    Ok(())
}

/// Handle a message carrying a photo or a document.
///
/// Runs the whole request inside a span tagged with a fresh request id.
///
/// # Errors
///
/// Returns an error only if the final user-facing reply cannot be sent.
pub async fn handle_image(
    bot: Bot,
    msg: Message,
    solver: Arc<Solver>,
    shutdown: CancellationToken,
) -> Result<()> {
    let span = info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        user_id = get_user_id_safe(&msg)
    );

    async move {
        let outcome = match image_attachment(&msg) {
            Some(attachment) => process_image(&bot, &msg, &solver, &attachment, &shutdown).await,
            None => Err(SolveError::InvalidInput(
                "no photo or image document attached".to_string(),
            )),
        };

        match outcome {
            Ok(report) => {
                info!(
                    relayed = report.relayed,
                    text_tasks = report.text_tasks,
                    "Request finished"
                );
            }
            Err(SolveError::InvalidInput(reason)) => {
                info!("Rejected message: {reason}");
                send_message_resilient(&bot, msg.chat.id, INVALID_INPUT_TEXT).await?;
            }
            Err(SolveError::Cancelled) => warn!("Request cancelled by shutdown"),
            Err(e) => {
                error!("Error processing image: {e}");
                send_message_resilient(&bot, msg.chat.id, FAILURE_TEXT).await?;
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .instrument(span)
    .await
}

async fn download(bot: &Bot, file_id: &FileId) -> Result<Vec<u8>> {
    retry_telegram_operation(|| async {
        let file = bot.get_file(file_id.clone()).await?;
        let mut buf = Vec::new();
        bot.download_file(&file.path, &mut buf).await?;
        Ok(buf)
    })
    .await
}

async fn process_image(
    bot: &Bot,
    msg: &Message,
    solver: &Solver,
    attachment: &ImageAttachment,
    shutdown: &CancellationToken,
) -> Result<SolveReport, SolveError> {
    let bytes = download(bot, &attachment.file_id)
        .await
        .map_err(|e| SolveError::DownloadFailed(e.to_string()))?;
    info!(bytes = bytes.len(), mime_type = %attachment.mime_type, "Downloaded image");

    let image = ScopedImage::persist(&bytes, &attachment.mime_type)
        .await
        .map_err(|e| SolveError::DownloadFailed(e.to_string()))?;

    let status = send_message_resilient(bot, msg.chat.id, PROCESSING_TEXT)
        .await
        .map_err(SolveError::Relay)?;

    let mut relay = TelegramRelay::new(bot.clone(), msg.chat.id);
    let outcome = solver
        .solve(&image.input(), &mut relay, &shutdown.child_token())
        .await;

    delete_message_safe(bot, msg.chat.id, status.id).await;
    if let Err(e) = image.remove() {
        warn!("Failed to remove question image: {e}");
    }
    outcome
}
