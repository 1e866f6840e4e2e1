//! Terminal tic-tac-toe between two processes, with no server in between.
//!
//! ```text
//! cargo run -p tic-tac-toe -- X
//! cargo run -p tic-tac-toe -- O
//! cargo run -p tic-tac-toe -- monitor
//! ```
//!
//! Two optional trailing arguments override the publisher addresses of X
//! and O. Logs go to stderr; set `RUST_LOG` to tune them.

use std::io::Write;

use duet::prelude::*;
use duet::Link;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

type Input = Lines<BufReader<Stdin>>;

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Play(Role),
    Monitor,
}

fn parse_mode(text: &str) -> Option<Mode> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("monitor") {
        return Some(Mode::Monitor);
    }
    text.parse::<Role>().ok().map(Mode::Play)
}

/// Asks until a valid choice is typed. `None` on end of input.
async fn prompt_mode(input: &mut Input) -> std::io::Result<Option<Mode>> {
    loop {
        print!("\n\tChoose 'X', 'O' or 'monitor': ");
        std::io::stdout().flush()?;
        let Some(line) = input.next_line().await? else {
            return Ok(None);
        };
        match parse_mode(&line) {
            Some(mode) => return Ok(Some(mode)),
            None if line.trim().is_empty() => {}
            None => println!("{:?} is not a seat", line.trim()),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let mode = match args.next() {
        Some(arg) => parse_mode(&arg)
            .ok_or_else(|| format!("unknown mode {arg:?}, expected X, O or monitor"))?,
        None => match prompt_mode(&mut input).await? {
            Some(mode) => mode,
            None => return Ok(()),
        },
    };

    let mut config = PeerConfig::default();
    if let Some(addr) = args.next() {
        config.endpoints[Role::X] = addr;
    }
    if let Some(addr) = args.next() {
        config.endpoints[Role::O] = addr;
    }

    match mode {
        Mode::Play(role) => {
            config.role = role;
            play(config, input).await?;
        }
        Mode::Monitor => spectate(config).await?,
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

async fn play(config: PeerConfig, mut input: Input) -> Result<(), DuetError> {
    let role = config.role;
    let link = Link::connect(&config).await?;
    let mut handle = Peer::new(config, link).spawn();
    let mut board = handle.board_watch();
    let mut shown = *board.borrow_and_update();
    let mut reading = true;

    println!("\nYou are player {role}, enter your move (row,col)");
    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(event) => println!("{}", describe(&event, Some(role))),
                None => break,
            },
            Ok(()) = board.changed() => {
                let current = *board.borrow_and_update();
                if current != shown {
                    shown = current;
                    println!("\n{current}");
                }
            }
            line = input.next_line(), if reading => match line {
                Ok(Some(text)) if text.trim().is_empty() => {}
                Ok(Some(text)) => {
                    if handle.submit(text).await.is_err() {
                        break;
                    }
                }
                Ok(None) | Err(_) => {
                    reading = false;
                    handle.shutdown();
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\nGame ended by the player.");
                handle.shutdown();
            }
        }
    }

    handle.join().await;
    println!("Connection closed.");
    Ok(())
}

/// One line of text for the terminal. `own` is `None` for the monitor.
fn describe(event: &PeerEvent, own: Option<Role>) -> String {
    match event {
        PeerEvent::Synchronized { restored: true } => "Joined a game in progress.".to_string(),
        PeerEvent::Synchronized { restored: false } => "New game.".to_string(),
        PeerEvent::CellMarked { coord, role } if Some(*role) == own => {
            format!("\t- You played: Row {}, Column {} -", coord.row, coord.col)
        }
        PeerEvent::CellMarked { coord, role } => {
            format!(
                "\t- {role} played: Row {}, Column {} -",
                coord.row, coord.col
            )
        }
        PeerEvent::Rejected { reason } => reason.clone(),
        PeerEvent::Finished(Outcome::Draw) => "GAME OVER | Draw".to_string(),
        PeerEvent::Finished(Outcome::Winner(role)) if Some(*role) == own => {
            "GAME OVER | You win!".to_string()
        }
        PeerEvent::Finished(Outcome::Winner(role)) => format!("GAME OVER | Winner: {role}"),
        PeerEvent::Disconnected { reason } => format!("Connection lost: {reason}"),
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

async fn spectate(config: PeerConfig) -> Result<(), DuetError> {
    let (tx, mut events) = mpsc::unbounded_channel();
    let mut monitor = tokio::spawn(async move { Monitor::new().run(&config, tx).await });
    let mut view = GameState::new();

    println!("Monitor started. Waiting for moves...");
    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                println!("{}", describe(&event, None));
                if let PeerEvent::CellMarked { coord, role } = event {
                    view.apply(role, coord);
                    println!("\n{}", view.snapshot());
                }
            }
            finished = &mut monitor => {
                // Print whatever was queued before the monitor returned.
                while let Ok(event) = events.try_recv() {
                    println!("{}", describe(&event, None));
                }
                return match finished {
                    Ok(result) => result.map(|_| ()),
                    Err(e) => {
                        tracing::error!(error = %e, "monitor task failed");
                        Ok(())
                    }
                };
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nMonitor closing...");
                monitor.abort();
                return Ok(());
            }
        }
    }
}
