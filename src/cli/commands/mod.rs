pub mod auth;
pub mod cors;
pub mod database;
pub mod limiter;

use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

use crate::api::Environment;

pub const ARG_PORT: &str = "port";
pub const ARG_ENV: &str = "env";
pub const ARG_VERBOSE: &str = "verbose";

/// Level names accepted by `GREENLIGHT_LOG_LEVEL`, indexed by their `-v` count.
const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// `GREENLIGHT_LOG_LEVEL` takes either a level name or the equivalent `-v` count.
fn parse_log_level(value: &str) -> Result<u8, String> {
    let value = value.trim();
    let index = value.parse::<usize>().ok().or_else(|| {
        LOG_LEVELS
            .iter()
            .position(|level| level.eq_ignore_ascii_case(value))
    });
    index
        .filter(|index| *index < LOG_LEVELS.len())
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("expected one of {} or 0-4", LOG_LEVELS.join(", ")))
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("greenlight")
        .about("Movie catalog API")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("4000")
                .env("GREENLIGHT_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_ENV)
                .short('e')
                .long(ARG_ENV)
                .help("Deployment environment reported by the health check")
                .default_value("development")
                .env("GREENLIGHT_ENV")
                .value_parser(Environment::VALUES),
        )
        .arg(
            Arg::new(ARG_VERBOSE)
                .short('v')
                .long(ARG_VERBOSE)
                .help("Log more than errors: -v warn, -vv info, -vvv debug, -vvvv trace")
                .env("GREENLIGHT_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(parse_log_level),
        );

    let command = database::with_args(command);
    let command = limiter::with_args(command);
    let command = auth::with_args(command);
    cors::with_args(command)
}
