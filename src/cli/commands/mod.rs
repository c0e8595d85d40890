use clap::{
    Arg, ColorChoice, Command,
    builder::{
        ValueParser,
        styling::{AnsiColor, Effects, Styles},
    },
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("selfservice")
        .about("Self-service administration portal for the payments platform")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("SELFSERVICE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("adminusers-url")
                .long("adminusers-url")
                .help("Base URL of the admin-users API")
                .env("SELFSERVICE_ADMINUSERS_URL")
                .required(true),
        )
        .arg(
            Arg::new("connector-url")
                .long("connector-url")
                .help("Base URL of the payment connector API")
                .env("SELFSERVICE_CONNECTOR_URL")
                .required(true),
        )
        .arg(
            Arg::new("notify-url")
                .long("notify-url")
                .help("Base URL of the SMS notification service")
                .env("SELFSERVICE_NOTIFY_URL")
                .required(true),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .help("Public base URL of the portal, used for cookie flags")
                .default_value("http://localhost:8080")
                .env("SELFSERVICE_BASE_URL"),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("SELFSERVICE_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
