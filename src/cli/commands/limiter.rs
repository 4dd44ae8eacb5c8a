use std::time::Duration;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::api::middleware::LimiterConfig;

pub const ARG_LIMITER_ENABLED: &str = "limiter-enabled";
pub const ARG_LIMITER_RPS: &str = "limiter-rps";
pub const ARG_LIMITER_BURST: &str = "limiter-burst";
pub const ARG_LIMITER_IDLE_SECONDS: &str = "limiter-idle-seconds";
pub const ARG_LIMITER_SWEEP_SECONDS: &str = "limiter-sweep-seconds";

/// Build the admission controller settings from matches.
///
/// # Errors
/// Returns an error if the sweep interval is zero.
pub fn parse(matches: &ArgMatches) -> Result<LimiterConfig> {
    let defaults = LimiterConfig::default();
    let mut config = LimiterConfig::new();

    if let Some(enabled) = matches.get_one::<bool>(ARG_LIMITER_ENABLED) {
        config = config.with_enabled(*enabled);
    }
    if let Some(rps) = matches.get_one::<f64>(ARG_LIMITER_RPS) {
        config = config.with_rps(*rps);
    }
    if let Some(burst) = matches.get_one::<u32>(ARG_LIMITER_BURST) {
        config = config.with_burst(*burst);
    }
    if let Some(idle) = matches.get_one::<u64>(ARG_LIMITER_IDLE_SECONDS) {
        config = config.with_idle_timeout(Duration::from_secs(*idle));
    }
    let sweep = matches
        .get_one::<u64>(ARG_LIMITER_SWEEP_SECONDS)
        .map_or(defaults.sweep_interval(), |secs| Duration::from_secs(*secs));
    if sweep.is_zero() {
        anyhow::bail!("--{ARG_LIMITER_SWEEP_SECONDS} must be greater than zero");
    }

    Ok(config.with_sweep_interval(sweep))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LIMITER_ENABLED)
                .long(ARG_LIMITER_ENABLED)
                .help("Enable per-client rate limiting")
                .env("GREENLIGHT_LIMITER_ENABLED")
                .default_value("true")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_LIMITER_RPS)
                .long(ARG_LIMITER_RPS)
                .help("Requests per second refilled into each client bucket")
                .env("GREENLIGHT_LIMITER_RPS")
                .default_value("50")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new(ARG_LIMITER_BURST)
                .long(ARG_LIMITER_BURST)
                .help("Maximum burst per client")
                .env("GREENLIGHT_LIMITER_BURST")
                .default_value("1000")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_LIMITER_IDLE_SECONDS)
                .long(ARG_LIMITER_IDLE_SECONDS)
                .help("Forget a client after this many idle seconds")
                .env("GREENLIGHT_LIMITER_IDLE_SECONDS")
                .default_value("180")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_LIMITER_SWEEP_SECONDS)
                .long(ARG_LIMITER_SWEEP_SECONDS)
                .help("Interval between idle client sweeps")
                .env("GREENLIGHT_LIMITER_SWEEP_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}
