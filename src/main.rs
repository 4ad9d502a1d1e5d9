use std::sync::Arc;

use wellness_chat::cli::SurveyCli;
use wellness_chat::config::{GeneratorConfig, GeneratorSource, SurveyConfig};
use wellness_chat::survey::{SessionManager, SurveyRouteState, create_generator, survey_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let survey_config = SurveyConfig::from_env()?;
    let generator_config = GeneratorConfig::from_env()?;

    let http_port: Option<u16> = match std::env::var("WELLNESS_CHAT_HTTP_PORT") {
        Ok(raw) => Some(raw.trim().parse().map_err(|e| {
            anyhow::anyhow!("Invalid WELLNESS_CHAT_HTTP_PORT '{raw}': {e}")
        })?),
        Err(_) => None,
    };

    eprintln!("💬 Wellness Chat v{}", env!("CARGO_PKG_VERSION"));
    match &generator_config.source {
        GeneratorSource::Llm(llm) => eprintln!("   Generator: {:?} ({})", llm.backend, llm.model),
        GeneratorSource::Endpoint { url, .. } => eprintln!("   Generator: {url}"),
        GeneratorSource::Offline => eprintln!("   Generator: offline (canned replies)"),
    }
    eprintln!(
        "   Additional feedback: {}",
        if survey_config.collect_additional_feedback { "on" } else { "off" }
    );

    let generator = create_generator(&generator_config)?;
    let manager = Arc::new(SessionManager::new(generator, survey_config));

    // ── HTTP API ─────────────────────────────────────────────────────────
    if let Some(port) = http_port {
        eprintln!("   Sessions API: http://0.0.0.0:{port}/api/sessions\n");
        let app = survey_routes(SurveyRouteState { manager });
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        tracing::info!(port, "Survey HTTP server started");
        axum::serve(listener, app).await?;
        return Ok(());
    }

    // ── CLI ──────────────────────────────────────────────────────────────
    let user_name = std::env::var("WELLNESS_CHAT_USER_NAME").unwrap_or_else(|_| "there".to_string());
    eprintln!("   Type your answers and press Enter. /quit to exit.\n");
    SurveyCli::new(manager).run(&user_name).await?;

    Ok(())
}
