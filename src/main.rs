mod rally;

use std::fs::File;
use std::io::{stdout, BufWriter, Stdout};
use std::path::Path;
use std::sync::{mpsc, Mutex};
use std::thread;

use crossterm::{
    cursor,
    event::{self, Event, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    terminal, ExecutableCommand,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use arcade_engine::clock::SystemClock;
use arcade_engine::config::EngineConfig;
use arcade_engine::display::TerminalSurface;
use arcade_engine::error::Result;
use arcade_engine::game::GameManager;
use arcade_engine::input::KeyboardInput;

use rally::{RallyMessage, RallyScene};

/// Optional config file, read from the working directory.
const CONFIG_PATH: &str = "arcade.toml";

fn load_config() -> Result<EngineConfig> {
    if Path::new(CONFIG_PATH).exists() {
        EngineConfig::load(CONFIG_PATH)
    } else {
        Ok(EngineConfig::default())
    }
}

/// Log to a file: the terminal belongs to the game.
fn init_tracing(config: &EngineConfig) -> Result<()> {
    let file = File::create(&config.log.file)?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let config = load_config()?;
    init_tracing(&config)?;

    let mut out = BufWriter::new(stdout());
    terminal::enable_raw_mode()?;
    out.execute(terminal::EnterAlternateScreen)?;
    out.execute(terminal::Clear(terminal::ClearType::All))?;
    out.execute(cursor::Hide)?;

    // Request key-release (and key-repeat) events from the terminal.
    // Terminals without the kitty keyboard protocol fall back to the
    // hold window in `KeyboardInput`.
    let keyboard_enhanced = out
        .execute(PushKeyboardEnhancementFlags(
            KeyboardEnhancementFlags::REPORT_EVENT_TYPES,
        ))
        .is_ok();

    // Blocking event reads happen on their own thread so the frame loop
    // never waits on the terminal.
    let (tx, rx) = mpsc::channel::<Event>();
    thread::spawn(move || loop {
        match event::read() {
            Ok(ev) => {
                if tx.send(ev).is_err() {
                    break; // receiver dropped → program exiting
                }
            }
            Err(_) => break,
        }
    });

    let result = run(out, rx, &config);

    // Always restore the terminal
    let mut out = stdout();
    if keyboard_enhanced {
        let _ = out.execute(PopKeyboardEnhancementFlags);
    }
    let _ = out.execute(cursor::Show);
    let _ = out.execute(terminal::LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();

    if let Err(err) = &result {
        error!(%err, "demo stopped with an error");
    }
    result
}

fn run(out: BufWriter<Stdout>, events: mpsc::Receiver<Event>, config: &EngineConfig) -> Result<()> {
    let keyboard = KeyboardInput::new(events);
    let quit = keyboard.quit_flag();

    let surface = TerminalSurface::new(out, config.display.width, config.display.height);
    let mut game: GameManager<RallyMessage, _, _> = GameManager::new(surface, SystemClock::new(), config);
    game.input_mut().add_provider(Box::new(keyboard));

    let seed: u64 = rand::random();
    info!(seed, "starting rally demo");
    let scene = RallyScene::new(seed, config);
    let round = scene.round();
    game.initialize_with(|game| {
        let rally = game.add_scene("rally", scene);
        game.show_scene(rally)
    })?;
    game.run_until(|_| quit.get())?;

    info!(score = round.score(), state = ?round.state(), "demo finished");
    Ok(())
}
