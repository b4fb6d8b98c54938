//! Storage for externally rendered audio buffers.

use sg_ir::BufferId;
use slotmap::SlotMap;
use std::sync::Arc;

/// PCM data for one rendered buffer. Content is produced offline by the
/// authoring pipeline; the engine only ever reads it.
#[derive(Clone, Debug)]
pub struct AudioData {
    /// Interleaved samples (1 or 2 channels)
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples: samples.into(), sample_rate, channels: 1 }
    }

    pub fn stereo(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples: samples.into(), sample_rate, channels: 2 }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Slotmap-keyed store handing out the opaque `BufferId`s the rest of the
/// engine schedules by. Filled during content load, immutable afterwards.
#[derive(Debug, Default)]
pub struct BufferStore {
    buffers: SlotMap<BufferId, AudioData>,
}

impl BufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, data: AudioData) -> BufferId {
        if data.channels == 0 || data.channels > 2 {
            log::warn!("buffer with {} channels; only mono/stereo mix correctly", data.channels);
        }
        self.buffers.insert(data)
    }

    pub fn get(&self, id: BufferId) -> Option<&AudioData> {
        self.buffers.get(id)
    }

    pub fn duration(&self, id: BufferId) -> Option<f64> {
        self.buffers.get(id).map(AudioData::duration)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
