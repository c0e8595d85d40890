use crate::cli::actions::Action;
use anyhow::{Result, anyhow};

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let required = |name: &str| -> Result<String> {
        matches
            .get_one::<String>(name)
            .map(String::to_string)
            .ok_or_else(|| anyhow!("missing required argument: --{name}"))
    };

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        adminusers_url: required("adminusers-url")?,
        connector_url: required("connector-url")?,
        notify_url: required("notify-url")?,
        base_url: required("base-url")?,
    })
}
