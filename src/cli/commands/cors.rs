use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_CORS_TRUSTED_ORIGINS: &str = "cors-trusted-origins";

/// Trusted origins, in the order given. Empty strings are dropped.
#[must_use]
pub fn parse(matches: &ArgMatches) -> Vec<String> {
    matches
        .get_many::<String>(ARG_CORS_TRUSTED_ORIGINS)
        .map(|values| {
            values
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_CORS_TRUSTED_ORIGINS)
            .long(ARG_CORS_TRUSTED_ORIGINS)
            .help("Trusted CORS origins (space separated)")
            .env("GREENLIGHT_CORS_TRUSTED_ORIGINS")
            .action(ArgAction::Append)
            .value_delimiter(' '),
    )
}
