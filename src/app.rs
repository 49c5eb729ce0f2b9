//! Application Module
//!
//! Front-end state for the interactive queue.

use crate::analyzer::TrackProbe;
use crate::config::{AppConfig, GainStore, MixSettings, clamp_volume};
use crate::pairing::{FilePair, classify, collect_media};
use crate::preview::{PreviewEngine, PreviewHandle};
use crate::queue::{BatchHandle, BatchObserver, BatchSummary, JobStatus, JobStore, Orchestrator};
use crate::utils::DependencyStatus;
use ratatui::widgets::ListState;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;
use tracing::{info, warn};

/// Application screens
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Queue,
    Explorer,
    Finish,
}

/// Confirmation dialog action
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmAction {
    StopBatch,
    ExitApp,
}

/// Batch callbacks forwarded to the interface thread
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Status { identity: String, status: JobStatus },
    Progress { processed: usize, total: usize },
    Finished { success: usize, errors: usize },
}

/// Observer pushing batch callbacks into a channel
pub struct ChannelObserver {
    tx: Sender<UiEvent>,
}

impl ChannelObserver {
    pub fn new(tx: Sender<UiEvent>) -> Self {
        Self { tx }
    }
}

impl BatchObserver for ChannelObserver {
    fn on_item_status_changed(&self, identity: &str, status: &JobStatus, _progress: f32) {
        let _ = self.tx.send(UiEvent::Status {
            identity: identity.to_string(),
            status: status.clone(),
        });
    }

    fn on_batch_progress(&self, processed: usize, total: usize) {
        let _ = self.tx.send(UiEvent::Progress { processed, total });
    }

    fn on_batch_finished(&self, success_count: usize, error_count: usize) {
        let _ = self.tx.send(UiEvent::Finished {
            success: success_count,
            errors: error_count,
        });
    }
}

/// Main application state
pub struct App {
    pub current_screen: Screen,
    pub should_quit: bool,
    pub config: AppConfig,
    pub deps: DependencyStatus,

    // Working set
    store: Arc<JobStore>,
    probe: Arc<dyn TrackProbe>,
    pub pairs: Vec<FilePair>,
    pub selected: usize,
    pub list_state: ListState,

    // Mix
    pub mix: MixSettings,
    gain_store: Box<dyn GainStore>,

    // Explorer
    pub current_dir: PathBuf,
    pub dir_entries: Vec<PathBuf>,
    pub explorer_list_state: ListState,

    // Batch
    orchestrator: Orchestrator,
    batch: Option<BatchHandle>,
    events_tx: Sender<UiEvent>,
    events_rx: Receiver<UiEvent>,
    pub batch_processed: usize,
    pub batch_total: usize,
    pub start_time: Option<Instant>,
    pub summary: Option<BatchSummary>,

    // Preview
    preview: PreviewEngine,
    preview_handle: Option<PreviewHandle>,

    // UI state
    pub message: Option<String>,
    pub confirm_dialog: Option<ConfirmAction>,
    pub confirm_selection: bool,
}

impl App {
    pub fn new(
        config: AppConfig,
        gain_store: Box<dyn GainStore>,
        probe: Arc<dyn TrackProbe>,
        deps: DependencyStatus,
    ) -> Self {
        let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        let mut explorer_list_state = ListState::default();
        explorer_list_state.select(Some(0));

        let store = Arc::new(JobStore::new());
        let orchestrator = Orchestrator::new(config.clone(), store.clone(), probe.clone());
        let preview = PreviewEngine::new(config.clone());
        let mix = MixSettings::load(gain_store.as_ref(), &config.options);
        let (events_tx, events_rx) = mpsc::channel();

        info!(
            "Gains: original {}, translation {}",
            mix.original_volume, mix.translation_volume
        );

        Self {
            current_screen: Screen::Queue,
            should_quit: false,
            config,
            deps,
            store,
            probe,
            pairs: Vec::new(),
            selected: 0,
            list_state,
            mix,
            gain_store,
            current_dir,
            dir_entries: Vec::new(),
            explorer_list_state,
            orchestrator,
            batch: None,
            events_tx,
            events_rx,
            batch_processed: 0,
            batch_total: 0,
            start_time: None,
            summary: None,
            preview,
            preview_handle: None,
            message: None,
            confirm_dialog: None,
            confirm_selection: false,
        }
    }

    // Message handling

    pub fn set_message(&mut self, msg: &str) {
        self.message = Some(msg.to_string());
    }

    pub fn clear_message(&mut self) {
        self.message = None;
    }

    pub fn ask_confirm(&mut self, action: ConfirmAction) {
        self.confirm_dialog = Some(action);
        self.confirm_selection = false;
    }

    // Working set

    /// Scan files and folders and merge what they contain into the list
    pub fn add_paths(&mut self, paths: &[PathBuf]) {
        let scan = collect_media(paths, &self.config.output);
        if scan.is_empty() {
            self.set_message("No media files found");
            return;
        }
        let added = self.store.add_media(scan, self.probe.as_ref());
        self.refresh_pairs();
        self.set_message(&format!(
            "Added {} file(s), {} pair(s) total",
            added,
            self.pairs.len()
        ));
    }

    pub fn refresh_pairs(&mut self) {
        self.pairs = self.store.snapshot();
        if self.selected >= self.pairs.len() {
            self.selected = self.pairs.len().saturating_sub(1);
        }
        self.list_state.select(Some(self.selected));
    }

    pub fn selected_pair(&self) -> Option<&FilePair> {
        self.pairs.get(self.selected)
    }

    pub fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.list_state.select(Some(self.selected));
        }
    }

    pub fn move_down(&mut self) {
        if self.selected < self.pairs.len().saturating_sub(1) {
            self.selected += 1;
            self.list_state.select(Some(self.selected));
        }
    }

    pub fn remove_selected(&mut self) {
        if self.is_running() {
            self.set_message("Cannot remove items while a batch is running");
            return;
        }
        let Some(identity) = self.selected_pair().map(|p| p.identity.clone()) else {
            return;
        };
        self.stop_preview();
        self.store.remove(&identity);
        self.refresh_pairs();
    }

    pub fn clear_list(&mut self) {
        if self.is_running() {
            self.set_message("Cannot clear the list while a batch is running");
            return;
        }
        self.stop_preview();
        self.store.clear();
        self.refresh_pairs();
        self.summary = None;
    }

    // Mix settings

    pub fn toggle_invert(&mut self) {
        self.mix.invert_tracks = !self.mix.invert_tracks;
    }

    pub fn toggle_keep_original(&mut self) {
        self.mix.keep_original_track = !self.mix.keep_original_track;
    }

    pub fn adjust_original_volume(&mut self, delta: i32) {
        self.mix.original_volume = step_volume(self.mix.original_volume, delta);
        self.save_gains();
    }

    pub fn adjust_translation_volume(&mut self, delta: i32) {
        self.mix.translation_volume = step_volume(self.mix.translation_volume, delta);
        self.save_gains();
    }

    fn save_gains(&mut self) {
        if let Err(e) = self.mix.save(self.gain_store.as_ref()) {
            warn!("Failed to save gains: {}", e);
            self.set_message(&format!("Failed to save gains: {}", e));
        }
    }

    // Explorer

    pub fn navigate_to_explorer(&mut self) {
        self.refresh_dir_entries();
        self.current_screen = Screen::Explorer;
    }

    pub fn navigate_to_queue(&mut self) {
        self.current_screen = Screen::Queue;
    }

    /// Folders first, then media files, each group by name
    pub fn refresh_dir_entries(&mut self) {
        let mut listing: Vec<PathBuf> = std::fs::read_dir(&self.current_dir)
            .map(|rd| {
                rd.flatten()
                    .map(|entry| entry.path())
                    .filter(|p| p.is_dir() || classify(p).is_some())
                    .collect()
            })
            .unwrap_or_default();
        listing.sort_by_key(|p| (!p.is_dir(), p.file_name().map(|n| n.to_os_string())));

        let has_parent = self.current_dir.parent().is_some_and(|p| p != self.current_dir);
        self.dir_entries = has_parent
            .then(|| PathBuf::from(".."))
            .into_iter()
            .chain(listing)
            .collect();
        self.explorer_list_state.select(Some(0));
    }

    fn explorer_selection(&self) -> Option<PathBuf> {
        let index = self.explorer_list_state.selected()?;
        self.dir_entries.get(index).cloned()
    }

    pub fn explorer_move_up(&mut self) {
        let index = self.explorer_list_state.selected().unwrap_or(0);
        self.explorer_list_state.select(Some(index.saturating_sub(1)));
    }

    pub fn explorer_move_down(&mut self) {
        let last = self.dir_entries.len().saturating_sub(1);
        let index = self.explorer_list_state.selected().unwrap_or(0);
        self.explorer_list_state.select(Some((index + 1).min(last)));
    }

    pub fn enter_directory(&mut self) {
        let Some(entry) = self.explorer_selection() else {
            return;
        };
        let next = if entry == Path::new("..") {
            self.current_dir.parent().map(Path::to_path_buf)
        } else {
            entry.is_dir().then_some(entry)
        };
        if let Some(dir) = next {
            self.current_dir = dir;
            self.refresh_dir_entries();
        }
    }

    /// Add the highlighted file or folder to the list
    pub fn add_explorer_entry(&mut self) {
        let Some(entry) = self.explorer_selection() else {
            return;
        };
        let target = match entry == Path::new("..") {
            true => self.current_dir.clone(),
            false => entry,
        };
        self.add_paths(&[target]);
        self.navigate_to_queue();
    }

    // Batch

    pub fn is_running(&self) -> bool {
        self.batch.is_some()
    }

    pub fn start_batch(&mut self) {
        if self.is_running() {
            return;
        }
        if !self.deps.can_encode() {
            self.set_message("ffmpeg and ffprobe are required to encode");
            return;
        }
        if self.store.is_empty() {
            self.set_message("Nothing to process, add files first");
            return;
        }

        let observer = Arc::new(ChannelObserver::new(self.events_tx.clone()));
        match self.orchestrator.start_batch(self.mix.clone(), observer) {
            Ok(handle) => {
                self.batch = Some(handle);
                self.batch_processed = 0;
                self.batch_total = 0;
                self.start_time = Some(Instant::now());
                self.summary = None;
                self.clear_message();
            }
            Err(e) => self.set_message(&e.to_string()),
        }
    }

    pub fn stop_batch(&mut self) {
        if self.is_running() {
            self.orchestrator.stop();
            self.set_message("Stopping...");
        }
    }

    pub fn process_batch_messages(&mut self) {
        let mut changed = false;
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                UiEvent::Status { .. } => changed = true,
                UiEvent::Progress { processed, total } => {
                    self.batch_processed = processed;
                    self.batch_total = total;
                }
                UiEvent::Finished { success, errors } => {
                    info!("Batch finished: {} done, {} failed", success, errors);
                }
            }
        }
        if changed {
            self.refresh_pairs();
        }

        if self.batch.as_ref().is_some_and(|b| b.is_finished())
            && let Some(handle) = self.batch.take()
        {
            match handle.join() {
                Ok(summary) => {
                    self.summary = Some(summary);
                    self.current_screen = Screen::Finish;
                }
                Err(e) => self.set_message(&e.to_string()),
            }
            self.refresh_pairs();
        }
    }

    /// Percent of the current batch, counting running items by their progress
    pub fn overall_progress(&self) -> f32 {
        if self.batch_total == 0 {
            return 0.0;
        }
        let running: f32 = self
            .pairs
            .iter()
            .filter_map(|p| match p.status {
                JobStatus::Processing { progress } => Some(progress),
                _ => None,
            })
            .sum();
        let total = (self.batch_processed as f32 * 100.0 + running) / self.batch_total as f32;
        total.min(100.0)
    }

    pub fn elapsed_time(&self) -> Option<std::time::Duration> {
        self.start_time.map(|start| start.elapsed())
    }

    pub fn estimated_time_remaining(&self) -> Option<std::time::Duration> {
        let progress = self.overall_progress();
        if !self.is_running() || progress <= 0.0 || progress >= 100.0 {
            return None;
        }
        let elapsed_secs = self.elapsed_time()?.as_secs_f64();
        let remaining_secs = elapsed_secs / (progress as f64 / 100.0) - elapsed_secs;
        (remaining_secs > 0.0).then(|| std::time::Duration::from_secs_f64(remaining_secs))
    }

    // Preview

    pub fn is_previewing(&self) -> bool {
        self.preview_handle.is_some() && self.preview.is_playing()
    }

    pub fn toggle_preview(&mut self) {
        if self.is_previewing() {
            self.stop_preview();
            return;
        }
        if !self.deps.can_preview() {
            self.set_message("ffplay is required for previews");
            return;
        }
        let Some(pair) = self.selected_pair().cloned() else {
            return;
        };
        match self.preview.start(&pair, &self.mix) {
            Ok(handle) => {
                self.preview_handle = Some(handle);
                self.set_message(&format!("Previewing {}", pair.display_name()));
            }
            Err(e) => self.set_message(&format!("Preview failed: {}", e)),
        }
    }

    pub fn stop_preview(&mut self) {
        if let Some(handle) = self.preview_handle.take() {
            self.preview.stop(&handle);
        }
    }

    // Exit

    pub fn request_exit(&mut self) {
        if self.is_running() {
            self.ask_confirm(ConfirmAction::ExitApp);
        } else {
            self.should_quit = true;
        }
    }

    /// Stop the preview and any running batch, waiting for the batch to wind down
    pub fn shutdown(&mut self) {
        self.preview.stop_current();
        self.preview_handle = None;
        if let Some(handle) = self.batch.take() {
            self.orchestrator.stop();
            if let Err(e) = handle.join() {
                warn!("{}", e);
            }
        }
    }

    pub fn back_to_queue(&mut self) {
        self.summary = None;
        self.start_time = None;
        self.batch_processed = 0;
        self.batch_total = 0;
        self.navigate_to_queue();
    }
}

fn step_volume(current: u8, delta: i32) -> u8 {
    clamp_volume((current as i32 + delta).max(0) as u32)
}
