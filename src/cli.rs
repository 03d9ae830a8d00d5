use clap::{Args, Parser, Subcommand};
use log::info;

use crate::config::{Config, CONFIG};
use crate::error::ActivityError;

#[derive(Parser)]
#[command(
    name = "activity-feed",
    version,
    about = "activity-feed: activity event API with real-time broadcast"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the server (default if no command specified)
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Address to bind (overrides the config file)
    #[arg(long = "host")]
    pub host: Option<String>,

    /// Port to listen on (overrides the config file)
    #[arg(long = "port", short = 'p')]
    pub port: Option<u16>,
}

impl Cli {
    pub fn handle_command_line() -> Result<(), ActivityError> {
        let args = Cli::parse();
        let config = CONFIG.get().cloned().unwrap_or_default();

        // Default to Serve if no command specified
        match args
            .command
            .unwrap_or(Command::Serve(ServeArgs::default()))
        {
            Command::Serve(serve) => Self::start_server(config, serve),
        }
    }

    fn start_server(mut config: Config, serve: ServeArgs) -> Result<(), ActivityError> {
        config.apply_overrides(serve.host, serve.port);

        info!(
            "Starting server on {}:{}",
            config.server.host, config.server.port
        );

        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| ActivityError::Error(format!("Failed to create runtime: {}", e)))?;

        rt.block_on(async {
            let web_server = crate::server::WebServer::new(&config.server, &config.activities);
            web_server.start().await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parsing_no_command_defaults_to_serve() {
        let result = Cli::try_parse_from(["activity-feed"]);
        assert!(result.is_ok(), "Should accept no command");

        let cli = result.unwrap();
        assert!(cli.command.is_none());
        assert!(matches!(
            cli.command.unwrap_or(Command::Serve(ServeArgs::default())),
            Command::Serve(_)
        ));
    }

    #[test]
    fn test_cli_parsing_serve_with_overrides() {
        let cli = Cli::try_parse_from(["activity-feed", "serve", "--host", "0.0.0.0", "-p", "9000"])
            .expect("Should accept host and port");

        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
                assert_eq!(args.port, Some(9000));
            }
            None => panic!("Expected serve command"),
        }
    }

    #[test]
    fn test_cli_parsing_invalid_arguments() {
        let result = Cli::try_parse_from(["activity-feed", "nonexistent-command"]);
        assert!(result.is_err(), "Should reject unknown commands");

        let result = Cli::try_parse_from(["activity-feed", "serve", "--port", "not-a-port"]);
        assert!(result.is_err(), "Should reject a non-numeric port");
    }
}
