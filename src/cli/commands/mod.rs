pub mod auth;
pub mod logging;
pub mod mail;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

pub const CMD_SERVER: &str = "server";
pub const CMD_LOGIN: &str = "login";
pub const CMD_SIGNUP: &str = "signup";
pub const CMD_OAUTH: &str = "oauth";
pub const CMD_WHOAMI: &str = "whoami";
pub const CMD_LOGOUT: &str = "logout";

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

    let command = Command::new("courtier")
        .about("Insurance brokerage client area and quote notifications")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(server())
        .subcommand(auth::with_args(login()))
        .subcommand(auth::with_args(signup()))
        .subcommand(auth::with_args(oauth()))
        .subcommand(auth::with_args(whoami()))
        .subcommand(auth::with_args(logout()));

    logging::with_args(command)
}

fn server() -> Command {
    let command = Command::new(CMD_SERVER)
        .about("Serve the quote notification endpoint")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("COURTIER_PORT")
                .value_parser(clap::value_parser!(u16)),
        );

    mail::with_args(command)
}

fn email_arg() -> Arg {
    Arg::new("email")
        .short('e')
        .long("email")
        .help("Account email")
        .required(true)
}

fn password_arg() -> Arg {
    Arg::new("password")
        .long("password")
        .help("Account password")
        .env("COURTIER_PASSWORD")
        .hide_env_values(true)
        .required(true)
}

fn login() -> Command {
    Command::new(CMD_LOGIN)
        .about("Sign in with email and password")
        .arg(email_arg())
        .arg(password_arg())
}

fn signup() -> Command {
    Command::new(CMD_SIGNUP)
        .about("Create a client account and its profile")
        .arg(email_arg())
        .arg(password_arg())
        .arg(Arg::new("first-name").long("first-name").help("First name"))
        .arg(Arg::new("last-name").long("last-name").help("Last name"))
        .arg(Arg::new("phone").long("phone").help("Phone number"))
}

fn oauth() -> Command {
    Command::new(CMD_OAUTH)
        .about("Print the federated sign-in URL")
        .arg(
            Arg::new("provider")
                .long("provider")
                .help("Identity provider name")
                .default_value("google"),
        )
}

fn whoami() -> Command {
    Command::new(CMD_WHOAMI)
        .about("Show the current principal and the route guard decision")
        .arg(
            Arg::new("path")
                .long("path")
                .help("Requested location")
                .default_value(crate::auth::CLIENT_AREA_PATH),
        )
        .arg(
            Arg::new("admin")
                .long("admin")
                .help("Evaluate the location as an admin view")
                .action(ArgAction::SetTrue),
        )
}

fn logout() -> Command {
    Command::new(CMD_LOGOUT).about("Sign out and forget the stored session")
}
