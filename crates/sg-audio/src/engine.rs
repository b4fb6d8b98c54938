//! CPAL-based audio engine.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use ringbuf::traits::Split;
use ringbuf::HeapRb;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::clock::DspClock;
use crate::slot::{SlotState, StreamSlot};
use crate::store::BufferStore;

/// Commands queued per slot before the callback drains them.
const COMMAND_RING_CAPACITY: usize = 64;

/// Error type for audio operations.
#[derive(Debug)]
pub enum AudioError {
    /// Failed to initialize audio device
    DeviceInit(String),
    /// Failed to create audio stream
    StreamCreate(String),
    /// Playback error
    Playback(String),
    /// No audio device available
    NoDevice,
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::DeviceInit(msg) => write!(f, "Device init error: {}", msg),
            AudioError::StreamCreate(msg) => write!(f, "Stream create error: {}", msg),
            AudioError::Playback(msg) => write!(f, "Playback error: {}", msg),
            AudioError::NoDevice => write!(f, "No audio device available"),
        }
    }
}

impl std::error::Error for AudioError {}

/// Owns the cpal stream, the dsp clock, and the callback-side slot states.
///
/// Slots are handed out before the stream is built; the callback then mixes
/// every playing slot into the output and advances the clock by the frames
/// it rendered.
pub struct AudioEngine {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    store: Arc<BufferStore>,
    clock: Arc<DspClock>,
    pending: Vec<SlotState>,
    running: Arc<AtomicBool>,
}

impl AudioEngine {
    /// Sample rate of the default output device, for rendering content
    /// before the engine itself exists.
    pub fn default_sample_rate() -> Result<u32, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
        Ok(config.sample_rate().0)
    }

    /// Create an engine on the default output device.
    pub fn new(store: Arc<BufferStore>) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let mut config: StreamConfig = config.into();
        // Force stereo output — the mix path writes 2-channel interleaving
        config.channels = 2;

        let clock = Arc::new(DspClock::new(config.sample_rate.0));

        Ok(Self {
            device,
            config,
            stream: None,
            store,
            clock,
            pending: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// The device clock all scheduling runs against.
    pub fn clock(&self) -> Arc<DspClock> {
        self.clock.clone()
    }

    /// Create one connected output slot. Must be called before
    /// `build_stream`; slots created later never reach the callback.
    pub fn create_slot(&mut self) -> StreamSlot {
        let ring = HeapRb::new(COMMAND_RING_CAPACITY);
        let (producer, consumer) = ring.split();
        self.pending.push(SlotState::new(self.store.clone(), consumer));
        StreamSlot::new(self.store.clone(), producer)
    }

    /// Create the four slots a playback source needs.
    pub fn create_slot_quad(&mut self) -> [StreamSlot; 4] {
        core::array::from_fn(|_| self.create_slot())
    }

    /// Build and start the audio stream over all slots created so far.
    pub fn build_stream(&mut self) -> Result<(), AudioError> {
        let running = self.running.clone();
        let clock = self.clock.clone();
        let channels = self.config.channels as usize;
        let sample_rate = self.config.sample_rate.0;
        let mut slots = std::mem::take(&mut self.pending);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        *sample = 0.0;
                    }

                    if running.load(Ordering::Relaxed) {
                        let t0 = clock.now();
                        for slot in &mut slots {
                            slot.drain_commands();
                            slot.mix(data, channels, t0, sample_rate);
                        }
                    }

                    clock.advance((data.len() / channels) as u64);
                },
                |err| log::error!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        self.stream = Some(stream);

        Ok(())
    }

    /// Begin mixing slot output.
    pub fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    /// Mute the output. The stream and the dsp clock keep running.
    pub fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        Ok(())
    }
}
