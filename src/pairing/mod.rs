//! Turning an unordered set of media paths into video/audio pairs.
//!
//! Videos seed one pair each under their normalized identity. Audio files
//! join the pair with the same identity, or failing that the first video
//! identity (in sorted order) that [`naming::similar`] accepts. Leftover audio
//! becomes an audio-only pair, which always evaluates to an error. Fuzzy
//! matching does no scoring, so an ambiguous audio file lands on whichever
//! candidate sorts first.

pub mod intake;
pub mod naming;
pub mod pair;

pub use intake::{MediaKind, MediaScan, classify, collect_media};
pub use naming::{normalize, similar};
pub use pair::FilePair;

use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Pair videos with audio files by base identity
pub fn build_pairs(videos: &[PathBuf], audios: &[PathBuf]) -> BTreeMap<String, FilePair> {
    let mut pairs: BTreeMap<String, FilePair> = BTreeMap::new();

    for video in videos {
        let identity = normalize(video);
        match pairs.get_mut(&identity) {
            Some(existing) => {
                warn!(
                    "{} and {} share identity '{}', keeping the latter",
                    existing.video.as_deref().unwrap_or(video.as_path()).display(),
                    video.display(),
                    identity
                );
                existing.set_video(video.clone());
            }
            None => {
                pairs.insert(identity.clone(), FilePair::with_video(identity, video.clone()));
            }
        }
    }

    for audio in audios {
        let identity = normalize(audio);

        let target = if pairs.get(&identity).is_some_and(|p| p.video.is_some()) {
            Some(identity.clone())
        } else {
            pairs
                .iter()
                .filter(|(_, p)| p.video.is_some())
                .map(|(key, _)| key)
                .find(|key| similar(key, &identity))
                .cloned()
        };

        match target.and_then(|key| pairs.get_mut(&key)) {
            Some(pair) => {
                if let Some(previous) = &pair.audio {
                    warn!(
                        "Replacing audio {} with {} for '{}'",
                        previous.display(),
                        audio.display(),
                        pair.identity
                    );
                }
                debug!("Paired {} with '{}'", audio.display(), pair.identity);
                pair.set_audio(audio.clone());
            }
            None => {
                pairs
                    .entry(identity.clone())
                    .and_modify(|p| p.set_audio(audio.clone()))
                    .or_insert_with(|| FilePair::with_audio(identity, audio.clone()));
            }
        }
    }

    pairs
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analyzer::TrackProbe;
    use crate::tracks::AudioTrack;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Probe returning the same tracks for every video
    pub struct FixedProbe {
        tracks: Vec<AudioTrack>,
        calls: AtomicUsize,
    }

    impl FixedProbe {
        pub fn new(tracks: Vec<AudioTrack>) -> Self {
            Self {
                tracks,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TrackProbe for FixedProbe {
        fn inspect(&self, _video: &Path) -> (usize, Vec<AudioTrack>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.tracks.len(), self.tracks.clone())
        }
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from("/media").join(n)).collect()
    }

    #[test]
    fn test_exact_identity_attaches_audio() {
        let pairs = build_pairs(
            &paths(&["01_Movie_Title_rus.mp4"]),
            &paths(&["Movie_Title_eng.mp3"]),
        );
        assert_eq!(pairs.len(), 1);
        let pair = &pairs["movie_title"];
        assert_eq!(pair.audio, Some(PathBuf::from("/media/Movie_Title_eng.mp3")));
    }

    #[test]
    fn test_fuzzy_match_is_first_in_sorted_order() {
        let pairs = build_pairs(
            &paths(&["the_movie_title_part2.mkv", "the_movie_title_part1.mkv"]),
            &paths(&["movie title.mp3"]),
        );
        assert_eq!(pairs.len(), 2);
        assert!(pairs["the_movie_title_part1"].audio.is_some());
        assert!(pairs["the_movie_title_part2"].audio.is_none());
    }

    #[test]
    fn test_unmatched_audio_becomes_audio_only_pair() {
        let pairs = build_pairs(&paths(&["alpha.mp4"]), &paths(&["beta.wav"]));
        assert_eq!(pairs.len(), 2);
        assert!(pairs["beta"].video.is_none());
        assert!(pairs["alpha"].audio.is_none());
    }

    #[test]
    fn test_duplicate_video_identity_keeps_latest() {
        let pairs = build_pairs(&paths(&["movie.mp4", "01_movie.mkv"]), &[]);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs["movie"].video, Some(PathBuf::from("/media/01_movie.mkv")));
    }

    #[test]
    fn test_second_audio_replaces_first() {
        let pairs = build_pairs(
            &paths(&["movie.mp4"]),
            &paths(&["movie_rus.mp3", "movie_audio.flac"]),
        );
        assert_eq!(pairs["movie"].audio, Some(PathBuf::from("/media/movie_audio.flac")));
    }
}
