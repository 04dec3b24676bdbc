use openai::OpenAIProvider;
use std::env;
use tfplug::ServerConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = ServerConfig::new();

    // stdout carries the plugin handshake, so logs go to stderr.
    let filter = env::var("TF_LOG_PROVIDER_OPENAI")
        .or_else(|_| env::var("RUST_LOG"))
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    // Local development certificates are picked up when present.
    let config = match env::current_exe()?.parent() {
        Some(exe_dir) => config
            .with_cert_path(exe_dir.join("../../certs/localhost+2.pem"))
            .with_key_path(exe_dir.join("../../certs/localhost+2-key.pem")),
        None => config,
    };

    tfplug::serve(OpenAIProvider::new(), config).await?;

    Ok(())
}
