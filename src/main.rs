use std::process;

use clap::{ArgMatches, FromArgMatches};
use tracing::error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use knife::application::ApplicationError;
use knife::cli::commands::execute;
use knife::cli::{output, Cli, CliError};

fn main() {
    let matches = Cli::build_command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    setup_logging(cli.verbose);

    if cli.command.is_none() {
        let mut cmd = Cli::build_command();
        output::info(&cmd.render_help());
        process::exit(knife::exitcode::FAILURE);
    }

    if let Err(e) = execute(&cli) {
        process::exit(report(&e, &matches));
    }
}

/// Log or print a failure the way its kind demands; returns the exit code.
fn report(e: &CliError, matches: &ArgMatches) -> i32 {
    if let Some(remote) = e.unauthorized() {
        error!(
            "Request failed due to authentication ({}), check your client configuration (username, key)",
            remote.message
        );
    } else if let Some(message) = e.usage_message() {
        output::info(&subcommand_usage(matches));
        error!("{}", message);
    } else {
        match e.application() {
            Some(ApplicationError::Fatal { .. }) => error!("{}", e),
            Some(ApplicationError::Aborted) => output::info(e),
            _ => output::error(e),
        }
    }
    e.exit_code()
}

/// Usage line of the innermost subcommand that was invoked.
fn subcommand_usage(matches: &ArgMatches) -> String {
    let mut cmd = Cli::build_command();
    let mut path = Vec::new();
    let mut current = matches;
    while let Some((name, sub_matches)) = current.subcommand() {
        match cmd.find_subcommand(name) {
            Some(sub) => cmd = sub.clone(),
            None => break,
        }
        path.push(name.to_string());
        current = sub_matches;
    }
    let mut cmd = cmd.bin_name(format!("knife {}", path.join(" ")));
    cmd.render_usage().to_string()
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // Create a noisy module filter
    let noisy_modules = ["hyper", "reqwest", "rustls"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    // Create a subscriber with formatted output directed to stderr
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity > 0)
        .with_thread_names(false);

    // Apply filters to the layer
    let filtered_layer = fmt_layer.with_filter(filter).with_filter(module_filter);

    tracing_subscriber::registry().with(filtered_layer).init();

    match filter {
        LevelFilter::DEBUG => tracing::debug!("Debug mode: debug"),
        LevelFilter::TRACE => tracing::debug!("Debug mode: trace"),
        _ => {}
    }
}
