use clap::Parser;
use pocketsheet::args::{Args, Command, WalletSubcommand};
use pocketsheet::commands::{self, App};
use pocketsheet::store::Mode;
use pocketsheet::Result;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().home().path();

    // This allows for testing the program without hitting remote services.
    // When POCKETSHEET_IN_TEST_MODE is set and non-zero in length, the mode
    // will be Mode::Test, otherwise it will be Mode::Live.
    let mode = Mode::from_env();

    // Route to the appropriate command handler
    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args.backend()).await?.print(),

        Command::Wallet(wallet_args) => match wallet_args.entity() {
            WalletSubcommand::List => {
                let app = App::load(home, mode).await?;
                commands::wallet_list(&app).await?.print()
            }
            WalletSubcommand::Add(add_args) => {
                let mut app = App::load(home, mode).await?;
                commands::wallet_add(&mut app, add_args.name(), add_args.endpoint(), add_args.budget())
                    .await?
                    .print()
            }
            WalletSubcommand::Remove(id_args) => {
                let mut app = App::load(home, mode).await?;
                commands::wallet_remove(&mut app, id_args.id()).await?.print()
            }
            WalletSubcommand::Use(id_args) => {
                let mut app = App::load(home, mode).await?;
                commands::wallet_use(&mut app, id_args.id()).await?.print()
            }
        },

        Command::Add(add_args) => {
            let app = App::load_active(home, mode).await?;
            commands::add(&app, add_args).await?.print()
        }

        Command::Edit(edit_args) => {
            let app = App::load_active(home, mode).await?;
            commands::edit(&app, edit_args).await?.print()
        }

        Command::Delete(delete_args) => {
            let app = App::load_active(home, mode).await?;
            commands::delete(&app, delete_args.id()).await?.print()
        }

        Command::Pay(pay_args) => {
            let app = App::load_active(home, mode).await?;
            commands::pay(&app, pay_args.id()).await?.print()
        }

        Command::List => {
            let app = App::load_active(home, mode).await?;
            commands::list(&app).await?.print()
        }

        Command::Summary => {
            let app = App::load_active(home, mode).await?;
            commands::summary(&app).await?.print()
        }

        Command::Pull => {
            let app = App::load_active(home, mode).await?;
            commands::pull(&app).await?.print()
        }

        Command::Push => {
            let app = App::load_active(home, mode).await?;
            commands::push(&app).await?.print()
        }

        Command::Voice(voice_args) => {
            let app = App::load_active(home, mode).await?;
            commands::voice(&app, voice_args.file(), voice_args.mime())
                .await?
                .print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
