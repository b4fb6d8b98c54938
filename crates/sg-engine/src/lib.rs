//! Playback scheduler core for the segue adaptive music engine.
//!
//! A `Channel` owns a measure clock and decides *which* pre-rendered buffer
//! starts *when*; a `PlaybackSource` executes the scheduled starts and runs
//! the crossfade ramp. Content arrives as opaque ids resolved through a
//! catalog — this crate never touches audio data.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod channel;
mod decay_queue;
mod select;
mod source;

pub use channel::{Channel, ChannelConfig, PendingCrossfade, PendingMotif};
pub use decay_queue::DecayQueue;
pub use select::{SelectionPolicy, Selector};
pub use source::{CrossfadeState, PlaybackSource};
