use super::AudioTrack;

/// Part a track plays in the mix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackRole {
    Original,
    Translation,
}

impl TrackRole {
    pub fn label(&self) -> &'static str {
        match self {
            TrackRole::Original => "original",
            TrackRole::Translation => "translation",
        }
    }
}

/// The two embedded tracks chosen for mixing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRoles {
    pub original: AudioTrack,
    pub translation: AudioTrack,
}

impl TrackRoles {
    /// Pick original and translation among embedded tracks.
    ///
    /// An `eng`/`rus` pair wins when both languages are present, otherwise the
    /// first two tracks are used. Inversion swaps the roles, so the original
    /// gain follows whichever track ends up as original.
    pub fn select(tracks: &[AudioTrack], invert: bool) -> Option<Self> {
        if tracks.len() < 2 {
            return None;
        }

        let eng = tracks.iter().find(|t| t.language == "eng");
        let rus = tracks.iter().find(|t| t.language == "rus");

        let (original, translation) = match (eng, rus) {
            (Some(eng), Some(rus)) => (eng, rus),
            _ => (&tracks[0], &tracks[1]),
        };

        let (original, translation) = if invert {
            (translation, original)
        } else {
            (original, translation)
        };

        Some(Self {
            original: original.clone(),
            translation: translation.clone(),
        })
    }

    pub fn role_of(&self, track: &AudioTrack) -> Option<TrackRole> {
        if track.audio_index == self.original.audio_index {
            Some(TrackRole::Original)
        } else if track.audio_index == self.translation.audio_index {
            Some(TrackRole::Translation)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracks::track;

    #[test]
    fn test_language_pair_wins_over_order() {
        let tracks = vec![
            track(0, "und", "stereo"),
            track(1, "rus", "stereo"),
            track(2, "eng", "stereo"),
        ];
        let roles = TrackRoles::select(&tracks, false).unwrap();
        assert_eq!(roles.original.audio_index, 2);
        assert_eq!(roles.translation.audio_index, 1);
        assert_eq!(roles.role_of(&tracks[0]), None);
    }

    #[test]
    fn test_first_two_tracks_without_language_pair() {
        let tracks = vec![
            track(0, "eng", "stereo"),
            track(1, "ger", "stereo"),
            track(2, "fre", "stereo"),
        ];
        let roles = TrackRoles::select(&tracks, false).unwrap();
        assert_eq!(roles.original.audio_index, 0);
        assert_eq!(roles.translation.audio_index, 1);
    }

    #[test]
    fn test_inversion_swaps_roles() {
        let tracks = vec![track(0, "eng", "mono"), track(1, "rus", "stereo")];
        let roles = TrackRoles::select(&tracks, true).unwrap();
        assert_eq!(roles.original.language, "rus");
        assert_eq!(roles.translation.language, "eng");
        assert!(roles.translation.is_mono());
        assert_eq!(roles.role_of(&tracks[1]), Some(TrackRole::Original));
    }

    #[test]
    fn test_single_track_is_not_enough() {
        assert!(TrackRoles::select(&[track(0, "eng", "stereo")], false).is_none());
    }
}
