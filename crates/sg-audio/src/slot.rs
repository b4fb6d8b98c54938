//! Output slots: control-thread handles and their callback-side states.

use ringbuf::traits::{Consumer, Producer};
use ringbuf::{HeapCons, HeapProd};
use sg_ir::{BufferId, OutputSlot, SpatialParams};
use std::sync::Arc;

use crate::store::{AudioData, BufferStore};

/// Commands crossing from the control thread to the audio callback.
#[derive(Clone, Copy, Debug)]
pub(crate) enum SlotCommand {
    Start { buffer: BufferId, at: f64, offset: f64 },
    Stop,
    Gain(f32),
}

/// Control-thread handle for one output slot.
///
/// Every mutation is mirrored locally (for lock-free queries) and pushed
/// through an SPSC ring to the callback. Spatial parameters are stored but
/// not fed into the mix — attenuation math is out of scope here.
pub struct StreamSlot {
    store: Arc<BufferStore>,
    commands: HeapProd<SlotCommand>,
    schedule: Option<Schedule>,
    gain: f32,
    spatial: SpatialParams,
}

#[derive(Clone, Copy, Debug)]
struct Schedule {
    at: f64,
    offset: f64,
    duration: f64,
}

impl StreamSlot {
    pub(crate) fn new(store: Arc<BufferStore>, commands: HeapProd<SlotCommand>) -> Self {
        Self {
            store,
            commands,
            schedule: None,
            gain: 1.0,
            spatial: SpatialParams::default(),
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn spatial(&self) -> &SpatialParams {
        &self.spatial
    }

    fn send(&mut self, command: SlotCommand) {
        if self.commands.try_push(command).is_err() {
            log::warn!("slot command ring full; command dropped");
        }
    }
}

impl OutputSlot for StreamSlot {
    fn schedule_start(&mut self, buffer: BufferId, at: f64, offset: f64) {
        let Some(duration) = self.store.duration(buffer) else {
            log::error!("schedule_start with unknown buffer {:?}", buffer);
            return;
        };
        self.schedule = Some(Schedule { at, offset, duration });
        self.send(SlotCommand::Start { buffer, at, offset });
    }

    fn stop(&mut self) {
        self.schedule = None;
        self.send(SlotCommand::Stop);
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
        self.send(SlotCommand::Gain(gain));
    }

    fn playback_offset(&self, now: f64) -> f64 {
        match self.schedule {
            Some(s) if now >= s.at => (s.offset + (now - s.at)).min(s.duration),
            Some(s) => s.offset,
            None => 0.0,
        }
    }

    fn is_playing(&self, now: f64) -> bool {
        match self.schedule {
            Some(s) => now >= s.at && s.offset + (now - s.at) < s.duration,
            None => false,
        }
    }

    fn buffer_duration(&self) -> Option<f64> {
        self.schedule.map(|s| s.duration)
    }

    fn set_spatial(&mut self, params: &SpatialParams) {
        self.spatial = *params;
    }
}

/// Callback-side state for one slot. Lives inside the audio callback and
/// is only touched from there.
pub(crate) struct SlotState {
    store: Arc<BufferStore>,
    commands: HeapCons<SlotCommand>,
    active: Option<ActiveClip>,
    gain: f32,
}

struct ActiveClip {
    data: AudioData,
    at: f64,
    offset: f64,
}

impl SlotState {
    pub(crate) fn new(store: Arc<BufferStore>, commands: HeapCons<SlotCommand>) -> Self {
        Self { store, commands, active: None, gain: 1.0 }
    }

    pub(crate) fn drain_commands(&mut self) {
        while let Some(command) = self.commands.try_pop() {
            match command {
                SlotCommand::Start { buffer, at, offset } => {
                    self.active = self
                        .store
                        .get(buffer)
                        .cloned()
                        .map(|data| ActiveClip { data, at, offset });
                }
                SlotCommand::Stop => self.active = None,
                SlotCommand::Gain(gain) => self.gain = gain,
            }
        }
    }

    /// Mix this slot into an interleaved output block starting at device
    /// time `t0`. Buffers are expected at the device sample rate; content
    /// is rendered offline for the target device.
    pub(crate) fn mix(&mut self, out: &mut [f32], out_channels: usize, t0: f64, sample_rate: u32) {
        let Some(clip) = &self.active else {
            return;
        };
        let clip_frames = clip.data.frames() as i64;
        // Source frame position of the block's first output frame
        let pos0 = (t0 - clip.at + clip.offset) * sample_rate as f64;

        let mut exhausted = false;
        for (i, frame) in out.chunks_mut(out_channels).enumerate() {
            let pos = (pos0 + i as f64).floor() as i64;
            if pos < 0 {
                continue;
            }
            if pos >= clip_frames {
                exhausted = true;
                break;
            }
            let (left, right) = match clip.data.channels {
                1 => {
                    let s = clip.data.samples[pos as usize];
                    (s, s)
                }
                _ => {
                    let idx = pos as usize * 2;
                    (clip.data.samples[idx], clip.data.samples[idx + 1])
                }
            };
            if let Some(sample) = frame.get_mut(0) {
                *sample += left * self.gain;
            }
            if let Some(sample) = frame.get_mut(1) {
                *sample += right * self.gain;
            }
        }

        if exhausted {
            self.active = None;
        }
    }
}
