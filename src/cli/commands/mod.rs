pub mod logging;
pub mod token;
pub mod vault;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgGroup, ColorChoice, Command,
};

use self::{token::ARG_TOKEN_SECRET, vault::ARG_VAULT_URL};

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::api::GIT_COMMIT_HASH)
            .into_boxed_str(),
    );

    let command = Command::new("payroll-auth")
        .about("Token issuance and rotation for the payroll service")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("PAYROLL_AUTH_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .env("PAYROLL_AUTH_DSN")
                .required(true),
        );

    let command = token::with_args(command);
    let command = vault::with_args(command);
    logging::with_args(command).group(
        ArgGroup::new("signing-secret")
            .args([ARG_TOKEN_SECRET, ARG_VAULT_URL])
            .required(true),
    )
}
