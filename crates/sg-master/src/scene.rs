//! A scene: one group of channels updated and addressed together.

use sg_engine::Channel;
use sg_ir::{Catalog, FragmentId, InstrumentId, OutputSlot, RolloffMode, SpatialParams, TempoId};

/// Channels grouped under one musical context, addressed by index.
///
/// The scene remembers which channels were playing before a `stop_all` so
/// `resume_all(true)` can restore exactly those.
pub struct Scene<S> {
    channels: Vec<Channel<S>>,
    /// Channels that should come back on a previously-playing resume
    active: Vec<bool>,
    spatial: SpatialParams,
}

impl<S: OutputSlot> Scene<S> {
    pub fn new(mut channels: Vec<Channel<S>>, spatial: SpatialParams) -> Self {
        for channel in &mut channels {
            channel.set_spatial(&spatial);
        }
        let active = vec![false; channels.len()];
        Self { channels, active, spatial }
    }

    /// Start every channel configured to play on start.
    pub fn start(&mut self) {
        for channel in &mut self.channels {
            channel.start();
        }
        self.active.fill(true);
    }

    pub fn update(&mut self, catalog: &Catalog, dt: f32, now: f64) {
        for channel in &mut self.channels {
            channel.update(catalog, dt, now);
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel(&self, index: usize) -> Option<&Channel<S>> {
        self.channels.get(index)
    }

    /// Indexed access with the best-effort contract: out of range is
    /// reported and the operation is dropped.
    fn channel_mut(&mut self, index: usize, op: &str) -> Option<&mut Channel<S>> {
        let found = self.channels.get_mut(index);
        if found.is_none() {
            log::error!("can't {} on channel {}: index out of range", op, index);
        }
        found
    }

    pub fn set_volume(&mut self, index: usize, volume: f32) {
        if let Some(channel) = self.channel_mut(index, "set volume") {
            channel.set_volume(volume);
        }
    }

    pub fn set_global_volume(&mut self, volume: f32) {
        for channel in &mut self.channels {
            channel.set_global_volume(volume);
        }
    }

    pub fn resume(&mut self, index: usize) {
        if let Some(channel) = self.channel_mut(index, "resume") {
            channel.resume();
        }
        if let Some(flag) = self.active.get_mut(index) {
            *flag = true;
        }
    }

    pub fn stop(&mut self, index: usize) {
        if let Some(channel) = self.channel_mut(index, "stop") {
            channel.stop();
        }
        if let Some(flag) = self.active.get_mut(index) {
            *flag = false;
        }
    }

    pub fn play_motif(
        &mut self,
        index: usize,
        motif: FragmentId,
        interrupt: bool,
        priority: f32,
        decay_rate: f32,
    ) {
        if let Some(channel) = self.channel_mut(index, "play motif") {
            channel.play_motif(motif, interrupt, priority, decay_rate);
        }
    }

    pub fn cancel_motif(&mut self, index: usize, motif: FragmentId) {
        if let Some(channel) = self.channel_mut(index, "cancel motif") {
            channel.cancel_motif(motif);
        }
    }

    pub fn set_instrument(
        &mut self,
        catalog: &Catalog,
        index: usize,
        instrument: InstrumentId,
        change_current: bool,
        fade_duration: f32,
        now: f64,
    ) {
        if let Some(channel) = self.channel_mut(index, "set instrument") {
            channel.set_instrument(catalog, instrument, change_current, fade_duration, now);
        }
    }

    pub fn set_tempo(&mut self, index: usize, tempo: TempoId) {
        if let Some(channel) = self.channel_mut(index, "set tempo") {
            channel.set_tempo(tempo);
        }
    }

    /// Change tempo on every channel at once.
    pub fn set_tempo_all(&mut self, tempo: TempoId) {
        for channel in &mut self.channels {
            channel.set_tempo(tempo);
        }
    }

    pub fn stop_all(&mut self) {
        // Leaves the active flags alone so resume_all(true) can restore
        for channel in &mut self.channels {
            channel.stop();
        }
    }

    /// Resume channels: all of them, or only the ones that were playing
    /// before the last stop.
    pub fn resume_all(&mut self, only_previously_playing: bool) {
        for (i, channel) in self.channels.iter_mut().enumerate() {
            if only_previously_playing && !self.active[i] {
                continue;
            }
            channel.resume();
            self.active[i] = true;
        }
    }

    pub fn set_spatial_blend(&mut self, blend: f32) {
        self.spatial.blend = blend;
        self.apply_spatial();
    }

    pub fn set_rolloff_mode(&mut self, rolloff: RolloffMode) {
        self.spatial.rolloff = rolloff;
        self.apply_spatial();
    }

    pub fn set_min_distance(&mut self, min_distance: f32) {
        self.spatial.min_distance = min_distance;
        self.apply_spatial();
    }

    pub fn set_max_distance(&mut self, max_distance: f32) {
        self.spatial.max_distance = max_distance;
        self.apply_spatial();
    }

    fn apply_spatial(&mut self) {
        for channel in &mut self.channels {
            channel.set_spatial(&self.spatial);
        }
    }
}
