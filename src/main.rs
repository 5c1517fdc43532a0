use anyhow::Context;
use clap::Parser;
use nanolite_agent::cli::Cli;
use nanolite_agent::config::AgentConfig;
use nanolite_agent::decoder::Decoder;
use nanolite_agent::dispatcher::Dispatcher;
use nanolite_agent::filter::{default_agent_self_regex, default_system_user_regex, PostFilterChain, PreFilterChain};
use nanolite_agent::identifier::ProcessId;
use nanolite_agent::otlp_backend::DryRunActivitySource;
#[cfg(feature = "otlp")]
use nanolite_agent::otlp_backend::OtlpConfig;
use nanolite_agent::span_context::ActivitySource;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Cli::parse();
    let config = AgentConfig::from_path(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;

    let backend: Arc<dyn ActivitySource> = if args.dry_run {
        tracing::info!("dry-run mode: spans will be logged, not exported");
        Arc::new(DryRunActivitySource::new(true))
    } else {
        build_otel_backend(&config)?
    };

    let self_pid = ProcessId(std::process::id() as i64);
    let decoder = Decoder::new(
        PreFilterChain::default_chain(self_pid),
        PostFilterChain::default_chain(
            default_system_user_regex(),
            default_agent_self_regex(&config.exporter),
        ),
    );

    let dispatcher = Dispatcher::spawn(decoder, backend, args.channel_capacity);

    let shutdown_requested = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let ctrlc_flag = Arc::clone(&shutdown_requested);
    ctrlc::set_handler(move || {
        ctrlc_flag.store(true, std::sync::atomic::Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;

    tracing::info!("nanolite-agent running, awaiting Ctrl-C to shut down");
    while !shutdown_requested.load(std::sync::atomic::Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    tracing::info!("shutting down, draining dispatcher");
    dispatcher.shutdown(Duration::from_secs(args.drain_timeout_secs));
    Ok(())
}

#[cfg(feature = "otlp")]
fn build_otel_backend(config: &AgentConfig) -> anyhow::Result<Arc<dyn ActivitySource>> {
    use nanolite_agent::otlp_backend::OtelActivitySource;
    let otlp_config = OtlpConfig {
        endpoint: config.endpoint(),
        service_name: config.exporter.clone(),
    };
    let backend = OtelActivitySource::new(otlp_config)
        .context("constructing the OTLP tracing backend")?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "otlp"))]
fn build_otel_backend(_config: &AgentConfig) -> anyhow::Result<Arc<dyn ActivitySource>> {
    anyhow::bail!("this build was compiled without the `otlp` feature; pass --dry-run or rebuild with --features otlp")
}
