use dotenvy::dotenv;
use mcq_solver_bot::bot;
use mcq_solver_bot::config::Settings;
use mcq_solver_bot::llm::ProviderRegistry;
use mcq_solver_bot::solver::Solver;
use bot::handlers::{get_user_id_safe, Command};
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
    key_param: Regex,
    bearer: Regex,
    provider_key: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            key_param: Regex::new(r#"([?&]key=)[^&\s"']+"#)?,
            bearer: Regex::new(r"(Bearer\s+)[A-Za-z0-9._~+/=-]+")?,
            provider_key: Regex::new(r"\b(nvapi-|gsk_|ghp_|github_pat_)[A-Za-z0-9_-]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token1
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token2
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token3
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self.key_param.replace_all(&output, "${1}[MASKED]").to_string();
        output = self.bearer.replace_all(&output, "${1}[MASKED]").to_string();
        output = self
            .provider_key
            .replace_all(&output, "${1}[MASKED]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // The caller's buffer was consumed in full even if the redacted text differs in length.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Redaction must be ready before the first log line
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting MCQ Solver Bot...");

    let settings = init_settings();

    run_bot(settings).await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let filter = if debug_mode {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "mcq_solver_bot=info,hyper=warn,h2=error,reqwest=warn,tokio=warn,async_openai=warn",
            )
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    let settings = match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    for name in settings.placeholder_credentials() {
        warn!("{name} is not configured; calls using it will fail");
    }
    if let Some(timeout) = settings.provider_timeout() {
        info!("Provider calls time out after {}s", timeout.as_secs());
    }

    Arc::new(settings)
}

async fn run_bot(settings: Arc<Settings>) {
    let registry = Arc::new(ProviderRegistry::from_settings(&settings));
    let solver = Arc::new(Solver::new(registry, settings.provider_timeout()));
    info!("Provider registry initialized.");

    let bot = Bot::new(settings.telegram_token.clone());
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {e}");
    }

    // In-flight provider calls are abandoned on Ctrl-C; the dispatcher drains handlers
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested, cancelling in-flight requests");
                shutdown.cancel();
            }
        }
    });

    info!("Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![settings, solver, shutdown])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        // Users outside a non-empty allow-list are ignored
        .filter(|msg: Message, settings: Arc<Settings>| {
            settings.is_user_allowed(get_user_id_safe(&msg))
        })
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.photo().is_some() || msg.document().is_some())
                .endpoint(handle_image),
        )
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg).await,
        Command::Help => bot::handlers::help(bot, msg).await,
        Command::Healthcheck => bot::handlers::healthcheck(bot, msg).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_image(
    bot: Bot,
    msg: Message,
    solver: Arc<Solver>,
    shutdown: CancellationToken,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_image(bot, msg, solver, shutdown).await {
        error!("Image handler error: {}", e);
    }
    respond(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_telegram_token_in_url() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;
        let line = "GET https://api.telegram.org/bot123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw1/getMe ";
        let redacted = patterns.redact(line);
        assert!(!redacted.contains("AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw1"));
        assert!(redacted.contains("[TELEGRAM_TOKEN]"));
        Ok(())
    }

    #[test]
    fn test_redacts_provider_keys() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;
        let line = "POST /v1beta/models/gemini-1.5-flash:generateContent?key=AIzaSySecret&alt=json \
                    Authorization: Bearer gsk_abcdef123456";
        let redacted = patterns.redact(line);
        assert!(!redacted.contains("AIzaSySecret"));
        assert!(!redacted.contains("abcdef123456"));
        assert!(redacted.contains("?key=[MASKED]&alt=json"));
        assert!(redacted.contains("Bearer [MASKED]"));
        Ok(())
    }

    #[test]
    fn test_leaves_plain_text_alone() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;
        let line = "Relaying result model=NVIDIA failed=false";
        assert_eq!(patterns.redact(line), line);
        Ok(())
    }
}
