//! Persisted gain levels.
//!
//! The two volume sliders are stored through a small key-value abstraction so
//! the front-end decides where they live. Values are on a 1-100 scale and are
//! turned into a 0.01-1.0 multiplier when building filter graphs.

use super::ProcessingOptions;
use crate::error::AppError;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

pub const DEFAULT_ORIGINAL_VOLUME: u8 = 5;
pub const DEFAULT_TRANSLATION_VOLUME: u8 = 100;

/// Keys of the persisted gain values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GainKey {
    Original,
    Translation,
}

impl GainKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            GainKey::Original => "orig_volume",
            GainKey::Translation => "new_volume",
        }
    }
}

/// Key-value store for the two gain levels
pub trait GainStore: Send + Sync {
    fn load(&self, key: GainKey) -> Option<u32>;
    fn save(&self, key: GainKey, value: u32) -> Result<(), AppError>;
}

/// Gain store backed by a small TOML table on disk
pub struct TomlGainStore {
    path: PathBuf,
}

impl TomlGainStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at `<config dir>/gains.toml`
    pub fn default_location() -> Self {
        Self::new(super::config_dir().join("gains.toml"))
    }

    fn read_table(&self) -> BTreeMap<String, u32> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return BTreeMap::new(),
        };
        toml::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring unreadable gain store {}: {}", self.path.display(), e);
            BTreeMap::new()
        })
    }
}

impl GainStore for TomlGainStore {
    fn load(&self, key: GainKey) -> Option<u32> {
        self.read_table().get(key.as_str()).copied()
    }

    fn save(&self, key: GainKey, value: u32) -> Result<(), AppError> {
        let mut table = self.read_table();
        table.insert(key.as_str().to_string(), value);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, toml::to_string(&table)?)?;
        Ok(())
    }
}

/// In-memory store, used when persistence is not wanted
#[derive(Default)]
pub struct MemoryGainStore {
    values: Mutex<HashMap<GainKey, u32>>,
}

impl GainStore for MemoryGainStore {
    fn load(&self, key: GainKey) -> Option<u32> {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&key)
            .copied()
    }

    fn save(&self, key: GainKey, value: u32) -> Result<(), AppError> {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key, value);
        Ok(())
    }
}

/// Everything the command builders need to know about the mix
#[derive(Debug, Clone, PartialEq)]
pub struct MixSettings {
    /// Volume of the original track, 1-100
    pub original_volume: u8,
    /// Volume of the translation track, 1-100
    pub translation_volume: u8,
    pub invert_tracks: bool,
    pub keep_original_track: bool,
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            original_volume: DEFAULT_ORIGINAL_VOLUME,
            translation_volume: DEFAULT_TRANSLATION_VOLUME,
            invert_tracks: false,
            keep_original_track: true,
        }
    }
}

impl MixSettings {
    /// Read gains from the store, falling back to defaults for missing keys
    pub fn load(store: &dyn GainStore, options: &ProcessingOptions) -> Self {
        Self {
            original_volume: store
                .load(GainKey::Original)
                .map(clamp_volume)
                .unwrap_or(DEFAULT_ORIGINAL_VOLUME),
            translation_volume: store
                .load(GainKey::Translation)
                .map(clamp_volume)
                .unwrap_or(DEFAULT_TRANSLATION_VOLUME),
            invert_tracks: options.invert_tracks,
            keep_original_track: !options.delete_original_track,
        }
    }

    /// Persist both gains
    pub fn save(&self, store: &dyn GainStore) -> Result<(), AppError> {
        store.save(GainKey::Original, self.original_volume as u32)?;
        store.save(GainKey::Translation, self.translation_volume as u32)
    }

    pub fn original_gain(&self) -> f64 {
        volume_to_gain(self.original_volume)
    }

    pub fn translation_gain(&self) -> f64 {
        volume_to_gain(self.translation_volume)
    }
}

pub fn clamp_volume(value: u32) -> u8 {
    value.clamp(1, 100) as u8
}

fn volume_to_gain(volume: u8) -> f64 {
    volume.clamp(1, 100) as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_use_defaults() {
        let store = MemoryGainStore::default();
        let mix = MixSettings::load(&store, &ProcessingOptions::default());
        assert_eq!(mix.original_volume, 5);
        assert_eq!(mix.translation_volume, 100);
        assert!(mix.keep_original_track);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let store = MemoryGainStore::default();
        store.save(GainKey::Original, 0).unwrap();
        store.save(GainKey::Translation, 250).unwrap();

        let mix = MixSettings::load(&store, &ProcessingOptions::default());
        assert_eq!(mix.original_volume, 1);
        assert_eq!(mix.translation_volume, 100);
        assert_eq!(mix.original_gain(), 0.01);
        assert_eq!(mix.translation_gain(), 1.0);
    }

    #[test]
    fn test_toml_store_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gains.toml");

        let mix = MixSettings {
            original_volume: 20,
            translation_volume: 80,
            ..MixSettings::default()
        };
        mix.save(&TomlGainStore::new(path.clone())).unwrap();

        let reopened = TomlGainStore::new(path);
        assert_eq!(reopened.load(GainKey::Original), Some(20));
        assert_eq!(reopened.load(GainKey::Translation), Some(80));
    }

    #[test]
    fn test_corrupt_store_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gains.toml");
        std::fs::write(&path, "not = [valid").unwrap();

        let store = TomlGainStore::new(path);
        assert_eq!(store.load(GainKey::Original), None);
    }
}
