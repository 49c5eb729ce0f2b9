use super::job::JobStatus;
use crate::analyzer::TrackProbe;
use crate::pairing::{FilePair, MediaScan, build_pairs};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// Known paths and the pairs derived from them
#[derive(Default)]
struct WorkingSet {
    videos: Vec<PathBuf>,
    audios: Vec<PathBuf>,
    pairs: BTreeMap<String, FilePair>,
}

/// Number of pairs in each status
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub done: usize,
    pub error: usize,
    pub stopped: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.done + self.error + self.stopped
    }
}

/// Thread-safe store of every pair and its status.
///
/// The front-end reads snapshots; only the batch consumer and the intake
/// operations write.
#[derive(Default)]
pub struct JobStore {
    inner: RwLock<WorkingSet>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, WorkingSet> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, WorkingSet> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add newly found media and re-pair everything known so far.
    ///
    /// Pairs whose video and audio are unchanged keep their status. Returns
    /// the number of paths that were not known before.
    pub fn add_media(&self, scan: MediaScan, probe: &dyn TrackProbe) -> usize {
        let (videos, audios, previous, added) = {
            let set = self.read();
            let mut videos = set.videos.clone();
            let mut audios = set.audios.clone();
            let mut added = 0;

            for (path, is_video) in scan
                .videos
                .into_iter()
                .map(|v| (v, true))
                .chain(scan.audios.into_iter().map(|a| (a, false)))
            {
                if videos.contains(&path) || audios.contains(&path) {
                    continue;
                }
                added += 1;
                if is_video {
                    videos.push(path);
                } else {
                    audios.push(path);
                }
            }

            if added == 0 {
                return 0;
            }
            (videos, audios, set.pairs.clone(), added)
        };

        let mut pairs = build_pairs(&videos, &audios);

        for pair in pairs.values_mut() {
            if let Some(old) = previous.get(&pair.identity)
                && old.video == pair.video
                && let Some(tracks) = old.tracks()
            {
                pair.set_tracks(tracks.to_vec());
            }
            pair.evaluate(probe);
        }

        let mut set = self.write();
        for pair in pairs.values_mut() {
            if let Some(current) = set.pairs.get(&pair.identity)
                && current.video == pair.video
                && current.audio == pair.audio
            {
                pair.status = current.status.clone();
            }
        }

        set.videos = videos;
        set.audios = audios;
        set.pairs = pairs;
        info!("Working set: {} pair(s), {} new path(s)", set.pairs.len(), added);
        added
    }

    /// Remove one pair and forget its paths
    pub fn remove(&self, identity: &str) -> Option<FilePair> {
        let mut set = self.write();
        let pair = set.pairs.remove(identity)?;
        if let Some(video) = &pair.video {
            set.videos.retain(|v| v != video);
        }
        if let Some(audio) = &pair.audio {
            set.audios.retain(|a| a != audio);
        }
        Some(pair)
    }

    pub fn clear(&self) {
        *self.write() = WorkingSet::default();
    }

    pub fn snapshot(&self) -> Vec<FilePair> {
        self.read().pairs.values().cloned().collect()
    }

    pub fn get(&self, identity: &str) -> Option<FilePair> {
        self.read().pairs.get(identity).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().pairs.is_empty()
    }

    /// Set a pair's status, returning false when the pair is gone
    pub fn set_status(&self, identity: &str, status: JobStatus) -> bool {
        match self.write().pairs.get_mut(identity) {
            Some(pair) => {
                pair.status = status;
                true
            }
            None => false,
        }
    }

    /// Apply a progress update, only while the pair is processing
    pub fn update_progress(&self, identity: &str, progress: f32) -> bool {
        match self.write().pairs.get_mut(identity) {
            Some(pair) if matches!(pair.status, JobStatus::Processing { .. }) => {
                pair.status = JobStatus::Processing {
                    progress: progress.clamp(0.0, 100.0),
                };
                true
            }
            _ => false,
        }
    }

    /// Reset every retryable pair with usable audio to `Pending` and return them.
    ///
    /// Video-only pairs without cached tracks are inspected again first.
    pub fn schedule(&self, probe: &dyn TrackProbe) -> Vec<FilePair> {
        let candidates: Vec<FilePair> = self
            .read()
            .pairs
            .values()
            .filter(|p| p.status.is_retryable() && p.video.is_some())
            .cloned()
            .collect();

        let mut inspected = Vec::new();
        for pair in &candidates {
            if pair.audio.is_none()
                && pair.tracks().is_none()
                && let Some(video) = &pair.video
            {
                let (_, tracks) = probe.inspect(video);
                inspected.push((pair.identity.clone(), tracks));
            }
        }

        let mut set = self.write();
        for (identity, tracks) in inspected {
            if let Some(pair) = set.pairs.get_mut(&identity) {
                pair.set_tracks(tracks);
            }
        }

        let mut scheduled = Vec::new();
        for pair in set.pairs.values_mut() {
            if !pair.status.is_retryable() || pair.video.is_none() {
                continue;
            }
            if pair.has_usable_audio() {
                pair.status = JobStatus::Pending;
                scheduled.push(pair.clone());
            } else {
                pair.status = JobStatus::error("Not enough audio tracks");
            }
        }
        scheduled
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for pair in self.read().pairs.values() {
            match pair.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Processing { .. } => counts.processing += 1,
                JobStatus::Done => counts.done += 1,
                JobStatus::Error { .. } => counts.error += 1,
                JobStatus::Stopped => counts.stopped += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::tests::FixedProbe;
    use crate::tracks::track;

    fn scan(videos: &[&str], audios: &[&str]) -> MediaScan {
        MediaScan {
            videos: videos.iter().map(PathBuf::from).collect(),
            audios: audios.iter().map(PathBuf::from).collect(),
        }
    }

    fn two_tracks() -> FixedProbe {
        FixedProbe::new(vec![track(0, "eng", "stereo"), track(1, "rus", "stereo")])
    }

    #[test]
    fn test_add_media_evaluates_pairs() {
        let store = JobStore::new();
        let probe = FixedProbe::new(vec![track(0, "eng", "stereo")]);
        store.add_media(scan(&["/m/a.mp4", "/m/b.mp4"], &["/m/a_rus.mp3"]), &probe);

        assert_eq!(store.get("a").unwrap().status, JobStatus::Pending);
        assert!(matches!(
            store.get("b").unwrap().status,
            JobStatus::Error { .. }
        ));
    }

    #[test]
    fn test_known_paths_are_ignored() {
        let store = JobStore::new();
        let probe = two_tracks();
        store.add_media(scan(&["/m/a.mp4"], &[]), &probe);
        assert_eq!(store.add_media(scan(&["/m/a.mp4"], &[]), &probe), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_repairing_preserves_unchanged_status() {
        let store = JobStore::new();
        let probe = two_tracks();
        store.add_media(scan(&["/m/a.mp4"], &[]), &probe);
        store.set_status("a", JobStatus::Done);

        store.add_media(scan(&["/m/b.mp4"], &[]), &probe);
        assert_eq!(store.get("a").unwrap().status, JobStatus::Done);
        assert_eq!(store.get("b").unwrap().status, JobStatus::Pending);
        // cached tracks are reused for unchanged videos
        assert_eq!(probe.calls(), 2);
    }

    #[test]
    fn test_new_audio_reevaluates_pair() {
        let store = JobStore::new();
        let probe = FixedProbe::new(vec![]);
        store.add_media(scan(&["/m/a.mp4"], &[]), &probe);
        assert!(matches!(
            store.get("a").unwrap().status,
            JobStatus::Error { .. }
        ));

        store.add_media(scan(&[], &["/m/a_rus.wav"]), &probe);
        assert_eq!(store.get("a").unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn test_remove_forgets_paths() {
        let store = JobStore::new();
        let probe = two_tracks();
        store.add_media(scan(&["/m/a.mp4"], &["/m/a_rus.mp3"]), &probe);
        assert!(store.remove("a").is_some());
        assert!(store.is_empty());

        assert_eq!(store.add_media(scan(&["/m/a.mp4"], &[]), &probe), 1);
    }

    #[test]
    fn test_progress_only_applies_while_processing() {
        let store = JobStore::new();
        store.add_media(scan(&["/m/a.mp4"], &[]), &two_tracks());

        assert!(!store.update_progress("a", 50.0));
        store.set_status("a", JobStatus::Processing { progress: 0.0 });
        assert!(store.update_progress("a", 150.0));
        assert_eq!(store.get("a").unwrap().progress_percent(), 100.0);

        store.set_status("a", JobStatus::Stopped);
        assert!(!store.update_progress("a", 10.0));
    }

    #[test]
    fn test_schedule_resets_retryable_pairs() {
        let store = JobStore::new();
        store.add_media(
            scan(&["/m/a.mp4", "/m/b.mp4", "/m/c.mp4"], &[]),
            &two_tracks(),
        );
        store.set_status("a", JobStatus::Stopped);
        store.set_status("b", JobStatus::Done);
        store.set_status("c", JobStatus::error("encoder failed"));

        let scheduled = store.schedule(&two_tracks());
        let ids: Vec<_> = scheduled.iter().map(|p| p.identity.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(store.counts().pending, 2);
        assert_eq!(store.counts().done, 1);
    }

    #[test]
    fn test_clear_empties_everything() {
        let store = JobStore::new();
        store.add_media(scan(&["/m/a.mp4"], &[]), &two_tracks());
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.counts().total(), 0);
    }
}
