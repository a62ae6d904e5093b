//! devtools-mcp: developer tools for a hosted application, served over MCP
//!
//! Speaks newline-delimited JSON-RPC 2.0 on stdin/stdout. Diagnostics and
//! logs are written to stderr only.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use devtools_mcp::config::{self, Config};
use devtools_mcp::mcp::{McpServer, ServerInfo, StdioTransport, SERVER_NAME};
use devtools_mcp::tools::builtin_registry;

/// Developer tools for a hosted application, served over MCP stdio.
#[derive(Parser, Debug)]
#[command(name = "devtools-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to ~/.devtools-mcp/config.json if present)
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// More log output; repeat for debug (-vv) and trace (-vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log errors only
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    /// Flags win over the configured level; `-q` wins over `-v`.
    fn log_level(&self, configured: &str) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => configured.parse().unwrap_or(Level::WARN),
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

fn init_tracing(level: Level) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Startup notice for interactive use, as GPLv3 section 5d asks.
fn license_notice() -> String {
    format!(
        "devtools-mcp {}  Copyright (C) 2026  {}\n\
         This program comes with ABSOLUTELY NO WARRANTY.\n\
         This is free software, licensed under {}.\n\
         Source: {}\n",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_AUTHORS"),
        env!("CARGO_PKG_LICENSE"),
        env!("CARGO_PKG_REPOSITORY"),
    )
}

fn server_info(cfg: &Config) -> ServerInfo {
    ServerInfo::new(
        cfg.server.name.as_deref().unwrap_or(SERVER_NAME),
        env!("CARGO_PKG_VERSION"),
    )
}

fn serve(cfg: &Config) -> ExitCode {
    let allowed_paths = cfg.effective_allowed_paths();
    let registry = Arc::new(builtin_registry(&allowed_paths, &cfg.tools));
    info!(
        allowed_paths = ?allowed_paths,
        tools = ?registry.names().collect::<Vec<_>>(),
        "Registry assembled"
    );

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Could not start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let info = server_info(cfg);
    let outcome = runtime.block_on(async move {
        let mut server = McpServer::new(StdioTransport::stdio(), registry, info);
        server.run().await
    });

    match outcome {
        Ok(()) => {
            info!("Session ended");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Session aborted by transport failure");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let cfg = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if args.config.is_none() {
                if let Some(path) = config::default_config_path() {
                    eprintln!("Checked default location: {}", path.display());
                    eprintln!("See config/example-config.json for the format");
                }
            }
            return ExitCode::FAILURE;
        }
    };

    init_tracing(args.log_level(&cfg.logging.level));
    eprintln!("{}", license_notice());
    info!(version = env!("CARGO_PKG_VERSION"), "devtools-mcp starting");

    serve(&cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("devtools-mcp").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn flags_override_configured_level() {
        assert_eq!(args(&["-q", "-vv"]).log_level("trace"), Level::ERROR);
        assert_eq!(args(&[]).log_level("debug"), Level::DEBUG);
        assert_eq!(args(&[]).log_level("INFO"), Level::INFO);
        assert_eq!(args(&[]).log_level("bogus"), Level::WARN);
        assert_eq!(args(&["-v"]).log_level("error"), Level::INFO);
        assert_eq!(args(&["-vv"]).log_level("error"), Level::DEBUG);
        assert_eq!(args(&["-vvvvv"]).log_level("error"), Level::TRACE);
    }

    #[test]
    fn config_file_is_positional() {
        let parsed = args(&["custom.json"]);
        assert_eq!(parsed.config, Some(PathBuf::from("custom.json")));
    }

    #[test]
    fn license_notice_names_license_and_source() {
        let notice = license_notice();
        assert!(notice.contains("GPL-3.0-or-later"));
        assert!(notice.contains("NO WARRANTY"));
        assert!(notice.contains(env!("CARGO_PKG_REPOSITORY")));
    }

    #[test]
    fn server_name_falls_back_to_default() {
        let mut cfg = Config::default();
        assert_eq!(server_info(&cfg).name, SERVER_NAME);
        cfg.server.name = Some("shop-backend".to_string());
        assert_eq!(server_info(&cfg).name, "shop-backend");
    }
}
