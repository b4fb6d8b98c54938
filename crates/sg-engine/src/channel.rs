//! Per-channel playback scheduler.
//!
//! The channel is the decision-maker: it watches the measure clock, picks
//! the next fragment at each loading point, and sequences instrument
//! crossfades and tempo changes so they land on synchronization points.
//! All actual audio execution is delegated to the `PlaybackSource`.

use alloc::vec::Vec;

use sg_ir::{
    measure_len, Catalog, FragmentId, InstrumentId, OutputSlot, SpatialParams, TempoId,
    LOADING_BUFFER,
};

use crate::decay_queue::DecayQueue;
use crate::select::{SelectionPolicy, Selector};
use crate::source::PlaybackSource;

/// An interrupting motif waiting for the next loading point. A later
/// request only displaces it with equal or higher priority.
#[derive(Clone, Copy, Debug)]
pub struct PendingMotif {
    pub fragment: FragmentId,
    pub priority: f32,
}

/// A deferred instrument crossfade, at most one outstanding per channel.
#[derive(Clone, Copy, Debug)]
pub struct PendingCrossfade {
    pub instrument: InstrumentId,
    pub fade_duration: f32,
}

/// Static configuration for one channel.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// Ambient fragment sequence played when no motif is queued
    pub fragments: Vec<FragmentId>,
    pub policy: SelectionPolicy,
    /// Base volume, 0.0..=1.0
    pub volume: f32,
    pub instrument: InstrumentId,
    pub tempo: TempoId,
    /// Beats per measure, >= 1
    pub beats_per_measure: u32,
    pub play_on_start: bool,
    /// Seed for the randomized selection policies
    pub rng_seed: u64,
}

impl ChannelConfig {
    pub fn new(instrument: InstrumentId, tempo: TempoId) -> Self {
        Self {
            fragments: Vec::new(),
            policy: SelectionPolicy::default(),
            volume: 1.0,
            instrument,
            tempo,
            beats_per_measure: 4,
            play_on_start: true,
            rng_seed: 0,
        }
    }
}

/// One independent musical voice: measure clock, pending-change slots, a
/// motif queue, a selection policy, and the playback source they drive.
pub struct Channel<S> {
    fragments: Vec<FragmentId>,
    selector: Selector,
    volume: f32,
    global_volume: f32,
    beats_per_measure: u32,
    play_on_start: bool,

    source: PlaybackSource<S>,
    motif_queue: DecayQueue<FragmentId>,

    playing: bool,
    /// Inside the look-ahead window before the next measure boundary
    in_window: bool,
    curr_fragment: Option<FragmentId>,
    /// Device-clock timestamp of the next measure boundary; advances by
    /// exact measure lengths, never re-derived from deltas
    next_measure: f64,
    /// Accumulated wall-clock, used only for motif priority decay
    wall_clock: f64,

    instrument: InstrumentId,
    next_instrument: InstrumentId,
    tempo: TempoId,
    next_tempo: TempoId,

    pending_motif: Option<PendingMotif>,
    pending_crossfade: Option<PendingCrossfade>,
}

impl<S: OutputSlot> Channel<S> {
    /// Build a channel from its configuration and four output slots.
    /// `now` is the current device-clock time; the first measure boundary
    /// is reserved two loading buffers out so content can be pre-scheduled.
    pub fn new(config: ChannelConfig, slots: [S; 4], now: f64) -> Self {
        let selector = Selector::new(config.policy, &config.fragments, config.rng_seed);
        let mut source = PlaybackSource::new(slots);
        source.set_volume(config.volume);

        Self {
            fragments: config.fragments,
            selector,
            volume: config.volume,
            global_volume: 1.0,
            beats_per_measure: config.beats_per_measure.max(1),
            play_on_start: config.play_on_start,
            source,
            motif_queue: DecayQueue::new(),
            playing: false,
            in_window: false,
            curr_fragment: None,
            next_measure: now + 2.0 * LOADING_BUFFER,
            wall_clock: 0.0,
            instrument: config.instrument,
            next_instrument: config.instrument,
            tempo: config.tempo,
            next_tempo: config.tempo,
            pending_motif: None,
            pending_crossfade: None,
        }
    }

    /// Begin playback if the channel is configured to play on start.
    pub fn start(&mut self) {
        if self.play_on_start {
            self.resume();
        }
    }

    /// Advance the scheduler by one tick. `dt` is the wall-clock delta
    /// (drives priority decay only); `now` is the device clock that all
    /// measure and crossfade scheduling runs against.
    pub fn update(&mut self, catalog: &Catalog, dt: f32, now: f64) {
        self.wall_clock += dt as f64;

        if self.playing
            && self.curr_fragment.is_none()
            && self.fragments.is_empty()
            && self.motif_queue.is_empty()
            && self.pending_motif.is_none()
        {
            self.playing = false;
        }

        if self.playing && !self.in_window && now > self.next_measure - LOADING_BUFFER {
            self.enter_loading_window(catalog, now);
        } else if now > self.next_measure + 0.01 {
            self.turn_over_measure(catalog, now);
        }

        if self.source.update(now) {
            // Crossfade finished: the new instrument is steady state now
            self.instrument = self.next_instrument;
        }
    }

    /// The loading point: decide what the next measure plays.
    fn enter_loading_window(&mut self, catalog: &Catalog, now: f64) {
        self.in_window = true;

        let Some(bpm) = catalog.bpm(self.tempo) else {
            return;
        };

        let transition_due = self.pending_motif.is_some()
            || (self.source.is_ending(self.next_measure, bpm, now)
                && (!self.fragments.is_empty() || !self.motif_queue.is_empty()));

        if transition_due {
            // A new fragment starts at the boundary
            self.curr_fragment = match self.pending_motif.take() {
                Some(pending) => {
                    log::debug!("pending motif takes the next measure");
                    Some(pending.fragment)
                }
                None => self.pop_fragment(),
            };
            self.tempo = self.next_tempo;

            if let Some(fragment) = self.curr_fragment {
                let mut fade_duration = None;
                if !self.source.is_crossfading() {
                    if let Some(pending) = self.pending_crossfade.take() {
                        self.next_instrument = pending.instrument;
                        fade_duration = Some(pending.fade_duration);
                    }
                }

                let primary = catalog.buffer(fragment, self.instrument, self.tempo);
                let secondary = catalog.buffer(fragment, self.next_instrument, self.tempo);
                self.source.play(primary, secondary, self.next_measure, 0.0);

                if let Some(duration) = fade_duration {
                    self.source.start_crossfade_next_measure(self.next_measure, duration);
                }
            }
        } else {
            // Same fragment keeps playing; apply deferred instrument/tempo
            let mut fade_duration = None;
            if !self.source.is_crossfading() {
                if let Some(pending) = self.pending_crossfade.take() {
                    self.next_instrument = pending.instrument;
                    fade_duration = Some(pending.fade_duration);
                }
            }
            let change_tempo = self.next_tempo != self.tempo;

            if fade_duration.is_some() || change_tempo {
                let Some(fragment) = self.curr_fragment else {
                    return;
                };
                let Some(next_bpm) = catalog.bpm(self.next_tempo) else {
                    return;
                };

                let primary = catalog.buffer(fragment, self.instrument, self.next_tempo);
                let secondary = catalog.buffer(fragment, self.next_instrument, self.next_tempo);
                let offset = self.source.time_at_new_tempo(self.next_measure, bpm, next_bpm, now);
                self.source.play(primary, secondary, self.next_measure, offset);

                if let Some(duration) = fade_duration {
                    self.source.start_crossfade_next_measure(self.next_measure, duration);
                }
                self.tempo = self.next_tempo;
            }
        }
    }

    /// The measure boundary has passed: advance the clock by exactly one
    /// measure, promote the pre-scheduled slots, and drop the fragment if
    /// it has run its course (silence is acceptable).
    fn turn_over_measure(&mut self, catalog: &Catalog, now: f64) {
        let Some(bpm) = catalog.bpm(self.tempo) else {
            return;
        };
        self.next_measure += measure_len(bpm, self.beats_per_measure);
        self.in_window = false;
        self.source.clip_change(now);
        if self.source.is_ending(self.next_measure, bpm, now) {
            self.curr_fragment = None;
        }
    }

    /// Next ambient selection: the motif queue wins over the policy; an
    /// empty (or fully decayed) queue pop yields silence, not a fallback.
    fn pop_fragment(&mut self) -> Option<FragmentId> {
        if self.motif_queue.is_empty() {
            if self.fragments.is_empty() {
                log::warn!("no ambient fragments loaded in channel");
                return None;
            }
            self.selector.next()
        } else {
            self.motif_queue.pop(self.wall_clock)
        }
    }

    /// Queue a motif. An interrupting motif occupies the single pending
    /// slot and wins the next loading point; it is displaced only by an
    /// equal-or-higher priority request. A non-interrupting motif joins
    /// the decay queue unconditionally.
    pub fn play_motif(&mut self, fragment: FragmentId, interrupt: bool, priority: f32, decay_rate: f32) {
        self.playing = true;

        if interrupt {
            let displaced = self
                .pending_motif
                .is_none_or(|pending| priority >= pending.priority);
            if displaced {
                self.pending_motif = Some(PendingMotif { fragment, priority });
            }
        } else {
            self.motif_queue.push(fragment, priority, decay_rate, self.wall_clock);
        }
    }

    /// Remove every queued instance of `fragment` from the motif queue.
    /// A pending interrupt holding the same fragment is left alone.
    pub fn cancel_motif(&mut self, fragment: FragmentId) {
        self.motif_queue.retain(|queued| *queued != fragment);
    }

    /// Change instrumentation. With `change_current` the active fragment
    /// crossfades as soon as the loading buffer allows; requests landing
    /// inside the loading window or during another crossfade are deferred.
    /// Without `change_current` the instrument only applies from the next
    /// fragment on, since the active buffers were already resolved.
    pub fn set_instrument(
        &mut self,
        catalog: &Catalog,
        instrument: InstrumentId,
        change_current: bool,
        fade_duration: f32,
        now: f64,
    ) {
        log::debug!("set instrument {:?}", instrument);

        let already_pending = self
            .pending_crossfade
            .is_some_and(|pending| pending.instrument == instrument);

        if self.next_instrument != instrument && !already_pending {
            match self.curr_fragment {
                Some(fragment)
                    if change_current && !self.in_window && !self.source.is_crossfading() =>
                {
                    if let Some(buffer) = catalog.buffer(fragment, instrument, self.tempo) {
                        self.next_instrument = instrument;
                        self.source.start_crossfade_now(buffer, fade_duration, now);
                        self.pending_crossfade = None;
                        if self.source.crossfade_end() < self.next_measure {
                            // Fade finishes inside this measure; commit early
                            self.instrument = self.next_instrument;
                        }
                    }
                }
                Some(_) if change_current => {
                    self.pending_crossfade = Some(PendingCrossfade { instrument, fade_duration });
                }
                _ => {
                    // No active fragment, or the change waits for the next
                    // fragment anyway
                    self.instrument = instrument;
                    self.next_instrument = instrument;
                }
            }
        } else if self.pending_crossfade.is_some() && self.next_instrument == instrument {
            // Re-requesting the already-incoming instrument cancels the
            // deferred fade
            self.pending_crossfade = None;
        }
    }

    /// Change tempo. Always deferred: takes effect at the next loading
    /// point, preserving the bar position.
    pub fn set_tempo(&mut self, tempo: TempoId) {
        log::debug!("set tempo {:?}", tempo);
        self.next_tempo = tempo;
    }

    /// Continue playback from wherever the channel left off.
    pub fn resume(&mut self) {
        self.playing = true;
    }

    /// Halt playback and all scheduled starts. The measure clock keeps
    /// running so a later resume stays aligned to the grid.
    pub fn stop(&mut self) {
        if self.playing {
            self.playing = false;
            self.source.stop();
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.source.set_volume(self.volume * self.global_volume);
    }

    pub fn set_global_volume(&mut self, volume: f32) {
        self.global_volume = volume;
        self.source.set_volume(self.volume * self.global_volume);
    }

    pub fn set_spatial(&mut self, params: &SpatialParams) {
        self.source.set_spatial(params);
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_crossfading(&self) -> bool {
        self.source.is_crossfading()
    }

    pub fn current_fragment(&self) -> Option<FragmentId> {
        self.curr_fragment
    }

    pub fn pending_motif(&self) -> Option<PendingMotif> {
        self.pending_motif
    }

    pub fn pending_crossfade(&self) -> Option<PendingCrossfade> {
        self.pending_crossfade
    }

    /// Number of motifs waiting in the non-interrupting queue.
    pub fn queued_motifs(&self) -> usize {
        self.motif_queue.len()
    }

    /// The steady-state instrument (after any committed crossfade).
    pub fn instrument(&self) -> InstrumentId {
        self.instrument
    }

    pub fn next_measure(&self) -> f64 {
        self.next_measure
    }
}
