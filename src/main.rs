mod analyzer;
mod app;
mod config;
mod encoder;
mod error;
mod pairing;
mod postprocess;
mod preview;
mod queue;
mod tracks;
mod ui;
mod utils;

use analyzer::{FfmpegInspector, TrackProbe};
use anyhow::{Context, Result, bail};
use app::{App, ConfirmAction, Screen};
use clap::{Args, Parser, Subcommand};
use config::{AppConfig, GainKey, GainStore, MixSettings, TomlGainStore};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use pairing::collect_media;
use preview::PreviewEngine;
use queue::{BatchObserver, JobStatus, JobStore, Orchestrator};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use utils::{DependencyStatus, LogTarget, init_logging};

const VOLUME_STEP: i32 = 5;

#[derive(Parser)]
#[command(name = "dubmix", version, about = "Mix translated audio into videos with ffmpeg")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List the pairs found in files and folders
    Scan {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Print the pairs as JSON
        #[arg(long)]
        json: bool,
    },
    /// Process every eligible pair
    Run {
        paths: Vec<PathBuf>,
        /// Log to the terminal instead of opening the interactive queue
        #[arg(long)]
        plain: bool,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Play a short preview of the mix for one video
    Preview {
        path: PathBuf,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Show or create the configuration file
    Config {
        /// Only print the configuration file path
        #[arg(long)]
        path: bool,
        /// Write the current configuration to disk
        #[arg(long)]
        init: bool,
    },
}

/// Per-run overrides of the configuration file
#[derive(Args, Default)]
struct Overrides {
    /// Number of parallel encodes
    #[arg(short = 'j', long)]
    workers: Option<usize>,
    /// Swap the original and translation roles
    #[arg(long)]
    invert: bool,
    /// Leave the original track out of the output
    #[arg(long)]
    drop_original: bool,
    /// Do not move sources to the backup directory
    #[arg(long)]
    no_backup: bool,
    /// Delete sources after a successful encode
    #[arg(long)]
    remove_source: bool,
    /// Original track volume, 1-100 (saved)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    original_volume: Option<u32>,
    /// Translation track volume, 1-100 (saved)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    translation_volume: Option<u32>,
}

impl Overrides {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(workers) = self.workers {
            config.performance.workers = Some(workers);
        }
        if self.invert {
            config.options.invert_tracks = true;
        }
        if self.drop_original {
            config.options.delete_original_track = true;
        }
        if self.no_backup {
            config.options.backup = false;
        }
        if self.remove_source {
            config.options.remove_source = true;
        }
    }

    fn save_gains(&self, store: &dyn GainStore) -> Result<()> {
        if let Some(volume) = self.original_volume {
            store
                .save(GainKey::Original, volume)
                .context("Failed to save original volume")?;
        }
        if let Some(volume) = self.translation_volume {
            store
                .save(GainKey::Translation, volume)
                .context("Failed to save translation volume")?;
        }
        Ok(())
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let interactive = matches!(
        cli.command,
        None | Some(Command::Run { plain: false, .. })
    );
    let _guard = init_logging(if interactive {
        LogTarget::Silent
    } else {
        LogTarget::Stderr
    });

    match cli.command {
        None => run_interactive(AppConfig::load(), Vec::new(), Overrides::default()),
        Some(Command::Scan { paths, json }) => scan(AppConfig::load(), &paths, json),
        Some(Command::Run {
            paths,
            plain,
            overrides,
        }) => {
            let mut config = AppConfig::load();
            overrides.apply(&mut config);
            if plain {
                run_plain(config, &paths, &overrides)
            } else {
                run_interactive(config, paths, overrides)
            }
        }
        Some(Command::Preview { path, overrides }) => {
            let mut config = AppConfig::load();
            overrides.apply(&mut config);
            run_preview(config, path, &overrides)
        }
        Some(Command::Config { path, init }) => show_config(path, init),
    }
}

fn inspector(config: &AppConfig) -> Arc<dyn TrackProbe> {
    Arc::new(FfmpegInspector::new(config.tools.ffmpeg.clone()))
}

/// Build the working set from the given paths
fn load_store(config: &AppConfig, paths: &[PathBuf], probe: &dyn TrackProbe) -> Arc<JobStore> {
    let store = Arc::new(JobStore::new());
    let scan = collect_media(paths, &config.output);
    info!(
        "Found {} video(s) and {} audio file(s)",
        scan.videos.len(),
        scan.audios.len()
    );
    store.add_media(scan, probe);
    store
}

fn scan(config: AppConfig, paths: &[PathBuf], json: bool) -> Result<ExitCode> {
    let probe = inspector(&config);
    let store = load_store(&config, paths, probe.as_ref());
    let pairs = store.snapshot();

    if json {
        let out = serde_json::to_string_pretty(&pairs).context("Failed to serialize pairs")?;
        println!("{}", out);
        return Ok(ExitCode::SUCCESS);
    }

    if pairs.is_empty() {
        println!("No media files found");
        return Ok(ExitCode::SUCCESS);
    }

    for pair in &pairs {
        let source = match &pair.audio {
            Some(_) => pair.audio_name(),
            None => pair.track_summary(),
        };
        println!(
            "{} {}  [{}]  {}",
            pair.status.symbol(),
            pair.display_name(),
            source,
            pair.status.label()
        );
    }

    let counts = store.counts();
    println!(
        "{} pair(s): {} ready, {} unusable",
        counts.total(),
        counts.pending,
        counts.error
    );
    Ok(ExitCode::SUCCESS)
}

fn require_encoder(config: &AppConfig, deps: &DependencyStatus) -> Result<()> {
    if !deps.can_encode() {
        bail!(
            "Missing required programs: {}",
            deps.missing(&config.tools).join(", ")
        );
    }
    Ok(())
}

/// Batch observer writing progress to the log
struct LogObserver;

impl BatchObserver for LogObserver {
    fn on_item_status_changed(&self, identity: &str, status: &JobStatus, _progress: f32) {
        match status {
            JobStatus::Processing { progress } if *progress > 0.0 => {}
            JobStatus::Error { message } => warn!("{}: {}", identity, message),
            _ => info!("{}: {}", identity, status.label()),
        }
    }

    fn on_batch_progress(&self, processed: usize, total: usize) {
        info!("Progress: {}/{}", processed, total);
    }
}

fn run_plain(config: AppConfig, paths: &[PathBuf], overrides: &Overrides) -> Result<ExitCode> {
    let deps = DependencyStatus::check(&config.tools);
    require_encoder(&config, &deps)?;

    let gain_store = TomlGainStore::default_location();
    overrides.save_gains(&gain_store)?;
    let mix = MixSettings::load(&gain_store, &config.options);

    let probe = inspector(&config);
    let store = load_store(&config, paths, probe.as_ref());
    if store.counts().pending == 0 {
        println!("Nothing to process");
        return Ok(ExitCode::SUCCESS);
    }

    let orchestrator = Orchestrator::new(config, store, probe);
    let summary = orchestrator
        .run_batch(mix, Arc::new(LogObserver))
        .context("Batch failed")?;

    for line in summary.report_lines() {
        println!("{}", line);
    }

    Ok(if summary.errors > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn run_preview(config: AppConfig, path: PathBuf, overrides: &Overrides) -> Result<ExitCode> {
    let deps = DependencyStatus::check(&config.tools);
    if !deps.can_preview() {
        bail!(
            "Missing required programs: {}",
            deps.missing(&config.tools).join(", ")
        );
    }

    let gain_store = TomlGainStore::default_location();
    overrides.save_gains(&gain_store)?;
    let mix = MixSettings::load(&gain_store, &config.options);

    let probe = inspector(&config);
    let store = load_store(&config, std::slice::from_ref(&path), probe.as_ref());
    let Some(pair) = store
        .snapshot()
        .into_iter()
        .find(|p| p.status == JobStatus::Pending)
    else {
        bail!("No playable pair found for {}", path.display());
    };

    let engine = PreviewEngine::new(config);
    let handle = engine
        .start(&pair, &mix)
        .with_context(|| format!("Failed to preview {}", pair.display_name()))?;
    println!("Playing preview of {}", pair.display_name());
    engine.wait(&handle);
    Ok(ExitCode::SUCCESS)
}

fn show_config(path_only: bool, init: bool) -> Result<ExitCode> {
    let path = AppConfig::config_path();
    if path_only {
        println!("{}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = AppConfig::load();
    if init {
        config.save().context("Failed to write configuration")?;
        println!("Wrote {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let text = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
    println!("# {}", path.display());
    print!("{}", text);
    Ok(ExitCode::SUCCESS)
}

fn run_interactive(config: AppConfig, paths: Vec<PathBuf>, overrides: Overrides) -> Result<ExitCode> {
    let gain_store = TomlGainStore::default_location();
    overrides.save_gains(&gain_store)?;

    let deps = DependencyStatus::check(&config.tools);
    let probe = inspector(&config);
    let mut app = App::new(config, Box::new(gain_store), probe, deps);
    if !paths.is_empty() {
        app.add_paths(&paths);
    }
    if !deps.can_encode() {
        app.set_message(&format!(
            "Missing: {}",
            deps.missing(&app.config.tools).join(", ")
        ));
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    app.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("Interface error: {}", err);
        eprintln!("Error: {:?}", err);
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    loop {
        app.process_batch_messages();

        terminal.draw(|f| {
            match app.current_screen.clone() {
                Screen::Queue => ui::render_queue(f, app),
                Screen::Explorer => ui::render_explorer(f, app),
                Screen::Finish => ui::render_finish(f, app),
            }
            if app.confirm_dialog.is_some() {
                ui::render_confirm_dialog(f, app);
            }
        })?;

        if event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            handle_key(app, key.code);
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, key: KeyCode) {
    if app.confirm_dialog.is_some() {
        handle_confirm_dialog_key(app, key);
        return;
    }

    match app.current_screen {
        Screen::Queue => handle_queue_key(app, key),
        Screen::Explorer => handle_explorer_key(app, key),
        Screen::Finish => handle_finish_key(app, key),
    }
}

/// Yes/no keys answer the dialog, arrows move the highlighted button
fn handle_confirm_dialog_key(app: &mut App, key: KeyCode) {
    let answer = match key {
        KeyCode::Char('y' | 'Y') => Some(true),
        KeyCode::Char('n' | 'N') | KeyCode::Esc => Some(false),
        KeyCode::Enter => Some(app.confirm_selection),
        KeyCode::Left | KeyCode::Right | KeyCode::Char('h' | 'l') => {
            app.confirm_selection = !app.confirm_selection;
            None
        }
        _ => None,
    };

    if let Some(accepted) = answer
        && let Some(action) = app.confirm_dialog.take()
        && accepted
    {
        match action {
            ConfirmAction::StopBatch => app.stop_batch(),
            ConfirmAction::ExitApp => app.should_quit = true,
        }
    }
}

fn handle_queue_key(app: &mut App, key: KeyCode) {
    let running = app.is_running();

    match key {
        KeyCode::Char('q') => app.request_exit(),
        KeyCode::Up | KeyCode::Char('k') => app.move_up(),
        KeyCode::Down | KeyCode::Char('j') => app.move_down(),
        KeyCode::Esc | KeyCode::Char('s') if running => {
            app.ask_confirm(ConfirmAction::StopBatch);
        }
        KeyCode::Char('p') => app.toggle_preview(),
        _ if running => {}
        KeyCode::Enter | KeyCode::Char('g') => app.start_batch(),
        KeyCode::Char('a') => {
            app.clear_message();
            app.navigate_to_explorer();
        }
        KeyCode::Char('d') | KeyCode::Delete => app.remove_selected(),
        KeyCode::Char('c') => app.clear_list(),
        KeyCode::Char('i') => app.toggle_invert(),
        KeyCode::Char('o') => app.toggle_keep_original(),
        KeyCode::Char('[') => app.adjust_original_volume(-VOLUME_STEP),
        KeyCode::Char(']') => app.adjust_original_volume(VOLUME_STEP),
        KeyCode::Char('-') => app.adjust_translation_volume(-VOLUME_STEP),
        KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_translation_volume(VOLUME_STEP),
        _ => {}
    }
}

fn handle_explorer_key(app: &mut App, key: KeyCode) {
    app.clear_message();

    match key {
        KeyCode::Esc => app.navigate_to_queue(),
        KeyCode::Up | KeyCode::Char('k') => app.explorer_move_up(),
        KeyCode::Down | KeyCode::Char('j') => app.explorer_move_down(),
        KeyCode::Enter => app.enter_directory(),
        KeyCode::Char(' ') => app.add_explorer_entry(),
        _ => {}
    }
}

fn handle_finish_key(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Char('q') => app.request_exit(),
        KeyCode::Enter => app.back_to_queue(),
        _ => {}
    }
}
