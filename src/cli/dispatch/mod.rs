//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action the binary runs, with every
//! per-concern option already parsed into its runtime type.

use crate::api::Environment;
use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_ENV, ARG_PORT, auth, cors, database, limiter};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(4000);
    let environment = matches
        .get_one::<String>(ARG_ENV)
        .map_or(Some(Environment::default()), |value| {
            Environment::parse(value)
        })
        .context("invalid --env")?;

    let storage = database::Storage::parse(matches)?;
    let limiter = limiter::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;
    let trusted_origins = cors::parse(matches);

    Ok(Action::Server(Args {
        port,
        environment,
        storage,
        limiter,
        ttls: auth_opts.ttls,
        store_timeout: auth_opts.store_timeout,
        trusted_origins,
    }))
}
