//! Output-slot trait and spatial parameters.

use slotmap::new_key_type;

new_key_type! {
    /// Opaque handle to an externally rendered audio buffer.
    pub struct BufferId;
}

/// Distance attenuation shape, passed through to the output backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RolloffMode {
    /// Inverse-distance attenuation
    #[default]
    Logarithmic,
    /// Linear falloff between min and max distance
    Linear,
}

/// Spatial parameters applied uniformly to every slot of a channel.
///
/// The engine core only stores and forwards these; attenuation math is the
/// backend's business.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialParams {
    /// 0.0 = fully 2D, 1.0 = fully 3D
    pub blend: f32,
    pub rolloff: RolloffMode,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for SpatialParams {
    fn default() -> Self {
        Self {
            blend: 0.0,
            rolloff: RolloffMode::Logarithmic,
            min_distance: 1.0,
            max_distance: 500.0,
        }
    }
}

/// A schedulable audio output slot.
///
/// Starts are *scheduled* against the device (dsp) clock, never awaited, so
/// look-ahead scheduling cannot stall the update loop. One slot plays at
/// most one buffer at a time.
pub trait OutputSlot {
    /// Schedule `buffer` to begin at device time `at`, starting `offset`
    /// seconds into the buffer. Replaces any previous schedule.
    fn schedule_start(&mut self, buffer: BufferId, at: f64, offset: f64);

    /// Halt playback and clear the schedule.
    fn stop(&mut self);

    /// Set the slot gain (0.0..=1.0).
    fn set_gain(&mut self, gain: f32);

    /// Current playback position in seconds within the loaded buffer.
    /// Before the scheduled start this is the configured start offset.
    fn playback_offset(&self, now: f64) -> f64;

    /// True while the scheduled buffer is audible at `now`.
    fn is_playing(&self, now: f64) -> bool;

    /// Duration in seconds of the loaded buffer, `None` if the slot is empty.
    fn buffer_duration(&self) -> Option<f64>;

    /// Apply spatial parameters (pass-through to the backend).
    fn set_spatial(&mut self, params: &SpatialParams);
}
