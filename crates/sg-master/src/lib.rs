//! Scene and emitter facade for the segue adaptive music engine.
//!
//! Provides the top-level API the embedding application talks to: an
//! `Emitter` owns the content catalog and a set of `Scene`s, each scene a
//! group of channels addressed by index. All per-channel calls route
//! through here; out-of-range indices are reported and ignored rather than
//! failed (best effort).

mod emitter;
mod scene;

pub use emitter::Emitter;
pub use scene::Scene;

// Re-export the types callers need so they don't depend on the inner
// crates directly.
pub use sg_engine::{Channel, ChannelConfig, SelectionPolicy};
pub use sg_ir::{
    Catalog, Fragment, FragmentId, Instrument, InstrumentId, OutputSlot, RolloffMode,
    SpatialParams, Tempo, TempoId,
};
