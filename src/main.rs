use activity_feed::cli::Cli;
use activity_feed::config::{Config, LoggingConfig, CONFIG};
use directories::ProjectDirs;
use flexi_logger::{
    detailed_format, Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming,
};
use log::{debug, error};

fn main() {
    let config = match ProjectDirs::from("", "", "activity-feed") {
        Some(project_dirs) => Config::load_config(&project_dirs),
        None => {
            eprintln!("Could not determine a data directory. Using default configuration.");
            Config::default()
        }
    };

    // Held for the life of the process so buffered log output is flushed on exit
    let _logger = setup_logging(&config.logging);
    debug!("Command-line args: {:?}", std::env::args_os().collect::<Vec<_>>());

    if CONFIG.set(config).is_err() {
        debug!("Configuration was already initialised");
    }

    if let Err(err) = Cli::handle_command_line() {
        error!("{:?}", err);
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn setup_logging(logging: &LoggingConfig) -> Option<LoggerHandle> {
    let logger = match Logger::try_with_env_or_str(logging.level_spec()) {
        Ok(logger) => logger.format(detailed_format),
        Err(e) => {
            eprintln!("Invalid log specification '{}': {}", logging.level_spec(), e);
            return None;
        }
    };

    let logger = match &logging.directory {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir).basename("activity-feed"))
            .rotate(
                Criterion::Size(10 * 1024 * 1024),
                Naming::Timestamps,
                Cleanup::KeepLogFiles(7),
            )
            .duplicate_to_stderr(Duplicate::Warn),
        None => logger.log_to_stderr(),
    };

    match logger.start() {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Failed to start logger: {}", e);
            None
        }
    }
}
