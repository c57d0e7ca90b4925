use std::{error::Error, io::Write};

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::Engine;
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Parser, Debug)]
#[command(name = "ayoqsh_admin")]
#[command(about = "Admin utilities for Ayoqsh (bootstrap moderators, maintenance)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./ayoqsh.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Moderator(Moderator),
    Checks(Checks),
    Balances(Balances),
}

#[derive(Args, Debug)]
struct Moderator {
    #[command(subcommand)]
    command: ModeratorCommand,
}

#[derive(Subcommand, Debug)]
enum ModeratorCommand {
    /// Create a moderator account; the password is prompted for.
    Create(ModeratorCreateArgs),
}

#[derive(Args, Debug)]
struct ModeratorCreateArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    full_name: Option<String>,
}

#[derive(Args, Debug)]
struct Checks {
    #[command(subcommand)]
    command: ChecksCommand,
}

#[derive(Subcommand, Debug)]
enum ChecksCommand {
    /// Mark pending checks past their expiry as expired.
    Expire,
}

#[derive(Args, Debug)]
struct Balances {
    #[command(subcommand)]
    command: BalancesCommand,
}

#[derive(Subcommand, Debug)]
enum BalancesCommand {
    /// Rebuild customer balances from the ledger and report drifts.
    Recompute,
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    out.flush()?;
                }
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
                out.flush()?;
            }
            _ => {}
        }
    }

    Ok(buf)
}

fn prompt_password_twice() -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut out = std::io::stderr();
    for _ in 0..3 {
        let p1 = prompt_password("Password: ")?;
        if p1.chars().count() < MIN_PASSWORD_LEN {
            execute!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(ClearType::CurrentLine),
                Print(format!(
                    "Password must be at least {MIN_PASSWORD_LEN} characters.\r\n"
                ))
            )?;
            continue;
        }

        let p2 = prompt_password("Confirm password: ")?;
        if p1 == p2 {
            return Ok(p1);
        }

        execute!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print("Passwords do not match. Try again.\r\n")
        )?;
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Moderator(Moderator {
            command: ModeratorCommand::Create(args),
        }) => {
            let password = prompt_password_twice()?;
            let user = engine
                .bootstrap_moderator(
                    &args.username,
                    &password,
                    args.full_name.as_deref(),
                    Utc::now(),
                )
                .await?;
            println!(
                "created moderator: {} (id {})",
                user.username.unwrap_or_default(),
                user.id
            );
        }
        Command::Checks(Checks {
            command: ChecksCommand::Expire,
        }) => {
            let expired = engine.expire_overdue(Utc::now()).await?;
            println!("expired checks: {expired}");
        }
        Command::Balances(Balances {
            command: BalancesCommand::Recompute,
        }) => {
            let drifts = engine.recompute_balances().await?;
            if drifts.is_empty() {
                println!("all balances match the ledger");
            }
            for drift in drifts {
                println!(
                    "customer {}: stored {} -> ledger {}",
                    drift.customer_id, drift.stored, drift.ledger
                );
            }
        }
    }

    Ok(())
}
