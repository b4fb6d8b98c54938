//! Core types for the segue adaptive music engine.
//!
//! This crate defines the asset model shared by the whole engine: fragments
//! (pre-rendered musical phrases), instruments and tempos as opaque keys,
//! the catalog that resolves them by name, and the output-slot trait the
//! playback core schedules against.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod audio_traits;
mod catalog;
mod fragment;
mod instrument;
mod tempo;
mod time;

pub use audio_traits::{BufferId, OutputSlot, RolloffMode, SpatialParams};
pub use catalog::{Catalog, FragmentId, InstrumentId, TempoId};
pub use fragment::Fragment;
pub use instrument::Instrument;
pub use tempo::Tempo;
pub use time::{measure_len, silence_tail, LOADING_BUFFER};
