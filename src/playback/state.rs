/// Playback lifecycle.
///
/// `Idle → Loading → Ready → Playing ⇄ Paused → Ended`. `stop` reaches `Ended` from anywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Nothing loaded.
    Idle,
    /// Assets and master audio are being prepared.
    Loading,
    /// Master audio installed; waiting for `play`.
    Ready,
    /// Clock running, ticks present frames.
    Playing,
    /// Clock frozen at the pause position.
    Paused,
    /// Reached the end or stopped.
    Ended,
}

impl PlaybackState {
    /// Return `true` if `self → next` is a legal transition.
    pub fn can_transition_to(self, next: PlaybackState) -> bool {
        use PlaybackState::*;
        matches!(
            (self, next),
            (Idle | Ended, Loading)
                | (Loading, Ready)
                | (Ready, Playing)
                | (Playing, Paused)
                | (Paused, Playing)
                | (_, Ended)
        )
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Ready => "ready",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Ended => "ended",
        })
    }
}
