use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use ticket_resolver::classify::LlmClassifier;
use ticket_resolver::config::Config;
use ticket_resolver::lifecycle::TicketLifecycle;
use ticket_resolver::llm::GroqProvider;
use ticket_resolver::mail::SmtpMailer;
use ticket_resolver::reply::LlmReplyGenerator;
use ticket_resolver::server;
use ticket_resolver::store::WorkbookStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            eprintln!(
                "Required environment: GROQ_API_KEY, EMAIL_ADDRESS, EMAIL_APP_PASSWORD"
            );
            std::process::exit(1);
        }
    };

    let llm = Arc::new(GroqProvider::new(
        config.groq_api_key.clone(),
        config.model.clone(),
    ));
    let lifecycle = Arc::new(
        TicketLifecycle::new(
            Arc::new(WorkbookStore::new(config.workbook_path.clone())),
            Arc::new(LlmClassifier::new(llm.clone())),
            Arc::new(LlmReplyGenerator::new(llm)),
            Arc::new(SmtpMailer::new(config.smtp.clone())),
        )
        .with_subject(config.mail_subject.clone()),
    );

    let app = server::router(lifecycle);
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        addr = %addr,
        model = %config.model,
        workbook = %config.workbook_path.display(),
        "Ticket resolver listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
