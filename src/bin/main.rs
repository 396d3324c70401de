use std::{error::Error, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use framestat::{
    cli::{Cli, Commands, parse_args},
    config::{DashboardConfig, load_config},
    quick_check,
    settings::{self, SettingsStore},
    sources::SourceRegistry,
    status::{StatusPayload, StatusReconciler},
    web::Server,
};

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();
    init_logging(&args);

    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Serve { bind, port } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config)?;
        }
        Commands::Status { json } => {
            let payload = StatusReconciler::new(Arc::new(config)).collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_status(&payload);
            }
        }
        Commands::Check => {
            let result = quick_check::run_quick_check(&config);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Sources => {
            let sources = SourceRegistry::from_config(&config).list()?;
            if sources.is_empty() {
                println!("No sources registered.");
            }
            for source in sources {
                let marker = if source.active { "*" } else { " " };
                let enabled = if source.enabled { "" } else { " (disabled)" };
                println!(
                    "{marker} {:<12} {}{enabled}\n    {}",
                    source.id, source.label, source.path
                );
            }
        }
        Commands::AutoUpdateConfig => {
            let store = SettingsStore::new(config.paths.settings_file());
            for line in settings::auto_update_lines(&store.read()?) {
                println!("{line}");
            }
        }
    }

    Ok(())
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn serve(config: DashboardConfig) -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        info!(
            "Starting framestat for {} (log {})",
            config.paths.app_root.display(),
            config.paths.log_file.display()
        );
        let server = Server::new(Arc::new(config));
        server.start().await.map_err(|err| err as Box<dyn Error>)
    })
}

fn print_status(payload: &StatusPayload) {
    let count = |value: Option<u64>| value.map_or_else(|| "--".to_string(), |v| v.to_string());

    println!("{} {}", payload.overall.severity, payload.overall.status_text);
    println!("  Remote files:   {}", count(payload.overall.remote_count));
    println!("  Local files:    {}", count(payload.overall.local_count));
    println!("  Current remote: {}", payload.current_remote);
    println!("  Web service:    {}", payload.web_status);
    println!("  Frame service:  {}", payload.pf_status);
    println!("  Last restart:   {}", payload.activity.last_service_restart);
    println!("  Last download:  {}", payload.activity.last_file_download);

    if let Some(debug) = &payload.debug {
        println!("Diagnostics:");
        for (key, value) in debug {
            println!("  {key}: {value}");
        }
    }
}
