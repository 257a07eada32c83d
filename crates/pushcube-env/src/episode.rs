//! Per-slot episode lifecycle.
//!
//! Every slot of the batch runs its own episode: it is reset, accumulates
//! reward for each control step, and ends either on success (`Done`) or at
//! the time limit (`Truncated`).

// ---------------------------------------------------------------------------
// EpisodeState
// ---------------------------------------------------------------------------

/// Lifecycle state of one slot's episode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EpisodeState {
    /// Before the first reset.
    #[default]
    Idle,
    Running,
    /// Ended because the task succeeded.
    Done,
    /// Ended at the time limit.
    Truncated,
}

impl EpisodeState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Truncated)
    }

    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

// ---------------------------------------------------------------------------
// SlotEpisode
// ---------------------------------------------------------------------------

/// Episode bookkeeping for one slot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SlotEpisode {
    pub state: EpisodeState,
    pub step_count: u32,
    pub total_reward: f32,
    /// Seed passed with the reset that started this episode.
    pub seed: Option<u64>,
    /// Episodes started in this slot, including the current one.
    pub episode_number: u32,
    /// Whether any step of this episode succeeded.
    pub succeeded: bool,
}

impl SlotEpisode {
    /// Start a new episode.
    pub const fn reset(&mut self, seed: Option<u64>) {
        self.state = EpisodeState::Running;
        self.step_count = 0;
        self.total_reward = 0.0;
        self.seed = seed;
        self.succeeded = false;
        self.episode_number += 1;
    }

    /// Count one step. Returns `false` (and records nothing) unless the
    /// episode is running.
    pub fn advance(&mut self, reward: f32, success: bool) -> bool {
        if !self.state.is_running() {
            return false;
        }
        self.step_count += 1;
        self.total_reward += reward;
        self.succeeded |= success;
        true
    }

    pub const fn terminate(&mut self) {
        self.state = EpisodeState::Done;
    }

    /// Truncate if still running and `max_steps` (non-zero) is reached.
    pub fn check_truncation(&mut self, max_steps: u32) -> bool {
        if max_steps > 0 && self.step_count >= max_steps && self.state.is_running() {
            self.state = EpisodeState::Truncated;
            return true;
        }
        false
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.state.is_terminal()
    }
}

// ---------------------------------------------------------------------------
// EpisodeBatch
// ---------------------------------------------------------------------------

/// One [`SlotEpisode`] per slot.
#[derive(Clone, Debug, Default)]
pub struct EpisodeBatch {
    slots: Vec<SlotEpisode>,
}

impl EpisodeBatch {
    #[must_use]
    pub fn new(num_envs: usize) -> Self {
        Self {
            slots: vec![SlotEpisode::default(); num_envs],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&SlotEpisode> {
        self.slots.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut SlotEpisode> {
        self.slots.get_mut(slot)
    }

    pub fn reset(&mut self, env_idx: &[usize], seed: Option<u64>) {
        for slot in env_idx {
            if let Some(episode) = self.slots.get_mut(*slot) {
                episode.reset(seed);
            }
        }
    }

    pub fn reset_all(&mut self, seed: Option<u64>) {
        for episode in &mut self.slots {
            episode.reset(seed);
        }
    }

    /// Slots whose episode has ended.
    #[must_use]
    pub fn done_slots(&self) -> Vec<usize> {
        self.indices(SlotEpisode::is_done)
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &SlotEpisode> {
        self.slots.iter()
    }

    fn indices(&self, pred: impl Fn(&SlotEpisode) -> bool) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, e)| pred(e))
            .map(|(i, _)| i)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
