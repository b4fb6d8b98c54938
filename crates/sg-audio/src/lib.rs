//! Audio output backend for the segue adaptive music engine.
//!
//! Implements the schedulable output-slot primitive over cpal: the control
//! thread mutates slots through lock-free command rings, the audio callback
//! mixes every playing slot sample-accurately against a dsp clock derived
//! from the rendered frame count.

mod clock;
mod engine;
mod slot;
mod store;

pub use clock::DspClock;
pub use engine::{AudioEngine, AudioError};
pub use slot::StreamSlot;
pub use store::{AudioData, BufferStore};
