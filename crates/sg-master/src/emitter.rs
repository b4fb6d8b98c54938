//! Top-level emitter: catalogs, scenes, global volume.

use sg_engine::Channel;
use sg_ir::{Catalog, FragmentId, InstrumentId, OutputSlot, RolloffMode, TempoId};

use crate::scene::Scene;

/// The facade the embedding application drives.
///
/// Owns the resolved content catalog and all scenes; exactly one scene is
/// current and receives updates. Constructed explicitly with its content —
/// there is no ambient registry.
pub struct Emitter<S> {
    catalog: Catalog,
    scenes: Vec<Scene<S>>,
    current: usize,
    volume: f32,
}

impl<S: OutputSlot> Emitter<S> {
    pub fn new(catalog: Catalog, scenes: Vec<Scene<S>>) -> Self {
        Self { catalog, scenes, current: 0, volume: 1.0 }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn current_scene(&self) -> usize {
        self.current
    }

    pub fn global_volume(&self) -> f32 {
        self.volume
    }

    pub fn scene(&self, index: usize) -> Option<&Scene<S>> {
        self.scenes.get(index)
    }

    /// Start the current scene. Call once after construction.
    pub fn start(&mut self) {
        let volume = self.volume;
        for scene in &mut self.scenes {
            scene.set_global_volume(volume);
        }
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.start();
        }
    }

    /// Advance the current scene by one tick. `dt` is the wall-clock delta
    /// since the last call, `now` the device-clock time.
    pub fn update(&mut self, dt: f32, now: f64) {
        let catalog = &self.catalog;
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.update(catalog, dt, now);
        }
    }

    /// Switch scenes: the outgoing scene is fully stopped, the incoming
    /// one started. Out of range is reported and ignored.
    pub fn set_scene(&mut self, index: usize) {
        if index >= self.scenes.len() {
            log::error!("can't set scene {}: index out of range", index);
            return;
        }
        log::debug!("current scene set to {}", index);
        self.scenes[self.current].stop_all();
        self.current = index;
        self.scenes[self.current].start();
    }

    /// Set the volume of one channel of the current scene (clamped).
    pub fn set_volume(&mut self, channel: usize, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        log::debug!("volume of channel {} set to {}", channel, volume);
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.set_volume(channel, volume);
        }
    }

    /// Set the emitter-wide volume factor (clamped). Every channel's
    /// audible volume is its local volume times this.
    pub fn set_global_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        log::debug!("emitter volume set to {}", self.volume);
        for scene in &mut self.scenes {
            scene.set_global_volume(self.volume);
        }
    }

    pub fn play_motif(
        &mut self,
        channel: usize,
        motif: FragmentId,
        interrupt: bool,
        priority: f32,
        decay_rate: f32,
    ) {
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.play_motif(channel, motif, interrupt, priority, decay_rate);
        }
    }

    pub fn cancel_motif(&mut self, channel: usize, motif: FragmentId) {
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.cancel_motif(channel, motif);
        }
    }

    pub fn set_instrument(
        &mut self,
        channel: usize,
        instrument: InstrumentId,
        change_current: bool,
        fade_duration: f32,
        now: f64,
    ) {
        let catalog = &self.catalog;
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.set_instrument(catalog, channel, instrument, change_current, fade_duration, now);
        }
    }

    pub fn set_tempo(&mut self, channel: usize, tempo: TempoId) {
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.set_tempo(channel, tempo);
        }
    }

    /// Change tempo across the whole current scene.
    pub fn set_tempo_all(&mut self, tempo: TempoId) {
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.set_tempo_all(tempo);
        }
    }

    pub fn resume(&mut self, channel: usize) {
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.resume(channel);
        }
    }

    pub fn stop(&mut self, channel: usize) {
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.stop(channel);
        }
    }

    pub fn stop_all(&mut self) {
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.stop_all();
        }
    }

    pub fn resume_all(&mut self, only_previously_playing: bool) {
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.resume_all(only_previously_playing);
        }
    }

    pub fn set_spatial_blend(&mut self, blend: f32) {
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.set_spatial_blend(blend);
        }
    }

    pub fn set_rolloff_mode(&mut self, rolloff: RolloffMode) {
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.set_rolloff_mode(rolloff);
        }
    }

    pub fn set_min_distance(&mut self, min_distance: f32) {
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.set_min_distance(min_distance);
        }
    }

    pub fn set_max_distance(&mut self, max_distance: f32) {
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.set_max_distance(max_distance);
        }
    }

    /// Direct access to a channel of the current scene, mostly for
    /// inspection.
    pub fn channel(&self, index: usize) -> Option<&Channel<S>> {
        self.scenes.get(self.current)?.channel(index)
    }
}
