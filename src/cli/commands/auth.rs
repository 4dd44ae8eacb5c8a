use std::time::Duration;

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};

use crate::auth::TokenTtls;

pub const ARG_AUTH_TOKEN_TTL_SECONDS: &str = "auth-token-ttl-seconds";
pub const ARG_ACTIVATION_TOKEN_TTL_SECONDS: &str = "activation-token-ttl-seconds";
pub const ARG_PASSWORD_RESET_TOKEN_TTL_SECONDS: &str = "password-reset-token-ttl-seconds";
pub const ARG_STORE_TIMEOUT_SECONDS: &str = "store-timeout-seconds";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub ttls: TokenTtls,
    pub store_timeout: Duration,
}

impl Options {
    /// Parse token lifetimes and the store call timeout.
    ///
    /// # Errors
    /// Returns an error if any of the durations is zero.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let defaults = TokenTtls::default();
        let seconds = |id: &str, default: Duration| -> Result<Duration> {
            let value = matches
                .get_one::<u64>(id)
                .map_or(default, |secs| Duration::from_secs(*secs));
            if value.is_zero() {
                anyhow::bail!("--{id} must be greater than zero");
            }
            Ok(value)
        };

        Ok(Self {
            ttls: TokenTtls {
                authentication: seconds(ARG_AUTH_TOKEN_TTL_SECONDS, defaults.authentication)?,
                activation: seconds(ARG_ACTIVATION_TOKEN_TTL_SECONDS, defaults.activation)?,
                password_reset: seconds(
                    ARG_PASSWORD_RESET_TOKEN_TTL_SECONDS,
                    defaults.password_reset,
                )?,
            },
            store_timeout: seconds(
                ARG_STORE_TIMEOUT_SECONDS,
                crate::auth::tokens::DEFAULT_STORE_TIMEOUT,
            )?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AUTH_TOKEN_TTL_SECONDS)
                .long(ARG_AUTH_TOKEN_TTL_SECONDS)
                .help("Lifetime of authentication tokens in seconds")
                .env("GREENLIGHT_AUTH_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_ACTIVATION_TOKEN_TTL_SECONDS)
                .long(ARG_ACTIVATION_TOKEN_TTL_SECONDS)
                .help("Lifetime of activation tokens in seconds")
                .env("GREENLIGHT_ACTIVATION_TOKEN_TTL_SECONDS")
                .default_value("259200")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_PASSWORD_RESET_TOKEN_TTL_SECONDS)
                .long(ARG_PASSWORD_RESET_TOKEN_TTL_SECONDS)
                .help("Lifetime of password reset tokens in seconds")
                .env("GREENLIGHT_PASSWORD_RESET_TOKEN_TTL_SECONDS")
                .default_value("2700")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_STORE_TIMEOUT_SECONDS)
                .long(ARG_STORE_TIMEOUT_SECONDS)
                .help("Upper bound on a single store call in seconds")
                .env("GREENLIGHT_STORE_TIMEOUT_SECONDS")
                .default_value("3")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_token_ttls() {
        temp_env::with_vars(
            [
                ("GREENLIGHT_AUTH_TOKEN_TTL_SECONDS", None::<&str>),
                ("GREENLIGHT_ACTIVATION_TOKEN_TTL_SECONDS", None),
                ("GREENLIGHT_PASSWORD_RESET_TOKEN_TTL_SECONDS", None),
                ("GREENLIGHT_STORE_TIMEOUT_SECONDS", None),
            ],
            || {
                let matches = with_args(Command::new("test")).get_matches_from(vec!["test"]);
                let options = Options::parse(&matches).map_err(|err| err.to_string());
                assert_eq!(
                    options,
                    Ok(Options {
                        ttls: TokenTtls::default(),
                        store_timeout: Duration::from_secs(3),
                    })
                );
            },
        );
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let matches = with_args(Command::new("test"))
            .get_matches_from(vec!["test", "--auth-token-ttl-seconds", "0"]);
        let result = Options::parse(&matches);
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("--auth-token-ttl-seconds"));
        }
    }
}
