use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use viccoin_sync::args::{Args, CategoriesAction, Command, SessionAction};
use viccoin_sync::session::AuthUser;
use viccoin_sync::{commands, Config, Mode, Result};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().viccoin_home().path();

    // When VICCOIN_SYNC_IN_TEST_MODE is set and non-empty, requests go to an in-memory fake
    // backend instead of the network.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args.base_url()).await?.print(),

        Command::Session(session_args) => {
            let config = Config::load(home).await?;
            match session_args.action() {
                SessionAction::SetToken {
                    token,
                    user_id,
                    name,
                    email,
                } => {
                    let user = (user_id.is_some() || name.is_some() || email.is_some()).then(|| {
                        AuthUser {
                            id: user_id.clone(),
                            nome: name.clone(),
                            email: email.clone(),
                            ..AuthUser::default()
                        }
                    });
                    commands::set_token(&config, token, user).await?.print()
                }
                SessionAction::Show => commands::show_session(&config).await?.print(),
                SessionAction::Clear => commands::clear_session(&config).await?.print(),
            }
        }

        Command::Health(health_args) => {
            let config = Config::load(home).await?;
            commands::health(
                &config,
                mode,
                health_args.attempts(),
                Duration::from_secs(health_args.interval_secs()),
            )
            .await?
            .print()
        }

        Command::Summary => commands::summary(&Config::load(home).await?, mode)
            .await?
            .print(),

        Command::List(list_args) => commands::list(&Config::load(home).await?, mode, list_args)
            .await?
            .print(),

        Command::Add(add_args) => commands::add(&Config::load(home).await?, mode, add_args)
            .await?
            .print(),

        Command::Update(update_args) => {
            commands::update(&Config::load(home).await?, mode, update_args)
                .await?
                .print()
        }

        Command::Categories(categories_args) => {
            let config = Config::load(home).await?;
            match categories_args.action() {
                CategoriesAction::List { kind, remote } => {
                    commands::list_categories(&config, mode, *kind, *remote)
                        .await?
                        .print()
                }
                CategoriesAction::Add { kind, label } => {
                    commands::add_category(&config, mode, *kind, label)
                        .await?
                        .print()
                }
            }
        }

        Command::Report(report_args) => {
            commands::report(&Config::load(home).await?, mode, report_args)
                .await?
                .print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => EnvFilter::from_default_env(),
        // The library's target is the package name, the binary's is the bin name.
        None => EnvFilter::new(format!(
            "{}={},{}={}",
            env!("CARGO_PKG_NAME").replace('-', "_"),
            level,
            env!("CARGO_BIN_NAME"),
            level
        )),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
