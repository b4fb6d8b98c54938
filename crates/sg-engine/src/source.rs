//! Double-buffered playback source.
//!
//! Pure mechanism: executes the starts the channel schedules and runs the
//! crossfade ramp. Owns four output slots — two decks (current/incoming,
//! for instrument crossfades), each with a primary and a secondary slot
//! (the secondary is pre-scheduled during the loading window so the next
//! measure starts with zero load latency).

use sg_ir::{silence_tail, BufferId, OutputSlot, SpatialParams, LOADING_BUFFER};

/// Crossfade ramp progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CrossfadeState {
    /// No crossfade in flight
    #[default]
    None,
    /// Requested; the incoming buffer is scheduled but its start time has
    /// not been reached yet
    Loading,
    /// Ramp running
    InProgress,
}

// Slot layout: deck × role. The current deck is audible at the resting
// volume; the incoming deck sits at zero gain until a crossfade ramps it up.
const CUR_PRI: usize = 0;
const CUR_SEC: usize = 1;
const IN_PRI: usize = 2;
const IN_SEC: usize = 3;

/// Executes scheduled starts and crossfades over four output slots.
pub struct PlaybackSource<S> {
    slots: [S; 4],
    state: CrossfadeState,
    /// Moment the ramp takes effect (delayed relative to the request)
    crossfade_start: f64,
    crossfade_duration: f32,
    /// Resting volume of the current deck while no ramp is driving gains
    volume: f32,
}

impl<S: OutputSlot> PlaybackSource<S> {
    pub fn new(mut slots: [S; 4]) -> Self {
        slots[CUR_PRI].set_gain(1.0);
        slots[CUR_SEC].set_gain(1.0);
        slots[IN_PRI].set_gain(0.0);
        slots[IN_SEC].set_gain(0.0);
        Self {
            slots,
            state: CrossfadeState::None,
            crossfade_start: 0.0,
            crossfade_duration: 0.0,
            volume: 1.0,
        }
    }

    /// Advance the crossfade state machine. Returns true when a crossfade
    /// completed this tick, so the owner can commit the new instrument.
    pub fn update(&mut self, now: f64) -> bool {
        if self.state == CrossfadeState::Loading && now >= self.crossfade_start {
            log::debug!("crossfade start");
            self.state = CrossfadeState::InProgress;
        }

        if self.state == CrossfadeState::InProgress {
            if now < self.crossfade_start + self.crossfade_duration as f64 {
                let progress = (((now - self.crossfade_start) / self.crossfade_duration as f64)
                    as f32)
                    .clamp(0.0, 1.0);
                let outgoing = fade_curve((1.0 - progress) * self.volume);
                let incoming = fade_curve(progress * self.volume);
                self.slots[CUR_PRI].set_gain(outgoing);
                self.slots[CUR_SEC].set_gain(outgoing);
                self.slots[IN_PRI].set_gain(incoming);
                self.slots[IN_SEC].set_gain(incoming);
            } else {
                log::debug!("crossfade end");
                // The incoming primary becomes the new current primary
                self.slots.swap(CUR_PRI, IN_PRI);
                self.reset_idle_gains();
                self.state = CrossfadeState::None;
                return true;
            }
        }
        false
    }

    /// Schedule both decks' secondary slots to begin at `at`, starting
    /// `offset` seconds into the buffer. A `None` buffer (failed lookup)
    /// leaves that slot silent.
    pub fn play(
        &mut self,
        primary: Option<BufferId>,
        secondary: Option<BufferId>,
        at: f64,
        offset: f64,
    ) {
        match primary {
            Some(buffer) => self.slots[CUR_SEC].schedule_start(buffer, at, offset),
            None => self.slots[CUR_SEC].stop(),
        }
        match secondary {
            Some(buffer) => self.slots[IN_SEC].schedule_start(buffer, at, offset),
            None => self.slots[IN_SEC].stop(),
        }
    }

    /// Halt all slots and reset gains to the idle configuration.
    pub fn stop(&mut self) {
        for slot in &mut self.slots {
            slot.stop();
        }
        self.reset_idle_gains();
        self.state = CrossfadeState::None;
    }

    /// Set the resting volume. While a ramp is in progress the ramp drives
    /// the gains instead.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if self.state != CrossfadeState::InProgress {
            self.slots[CUR_PRI].set_gain(volume);
            self.slots[CUR_SEC].set_gain(volume);
        }
    }

    pub fn is_crossfading(&self) -> bool {
        self.state != CrossfadeState::None
    }

    /// Begin an instrument crossfade as soon as the loading buffer allows.
    /// The incoming primary is scheduled offset so it lines up with the
    /// current deck's playback position at the ramp start. Only legal when
    /// no crossfade is in flight.
    pub fn start_crossfade_now(&mut self, buffer: BufferId, duration: f32, now: f64) {
        if self.is_crossfading() {
            return;
        }
        self.state = CrossfadeState::Loading;
        self.crossfade_start = now + LOADING_BUFFER;
        self.crossfade_duration = duration;

        let offset = self.slots[CUR_PRI].playback_offset(now) + LOADING_BUFFER;
        self.slots[IN_PRI].schedule_start(buffer, self.crossfade_start, offset);
    }

    /// Defer the ramp to the next measure boundary. Used when the request
    /// arrived inside the loading window: the incoming deck's secondary is
    /// already scheduled for `at` by the regular look-ahead path, so only
    /// the ramp needs arming.
    pub fn start_crossfade_next_measure(&mut self, at: f64, duration: f32) {
        self.state = CrossfadeState::Loading;
        self.crossfade_start = at;
        self.crossfade_duration = duration;
    }

    /// When the ramp will finish (only meaningful while crossfading).
    pub fn crossfade_end(&self) -> f64 {
        self.crossfade_start + self.crossfade_duration as f64
    }

    /// Promote the pre-scheduled secondary slots to primary at measure
    /// turnover. A no-op unless a new clip actually started.
    pub fn clip_change(&mut self, now: f64) {
        if self.slots[CUR_SEC].is_playing(now) {
            self.slots.swap(CUR_PRI, CUR_SEC);
            self.slots.swap(IN_PRI, IN_SEC);
            self.slots[CUR_SEC].stop();
            self.slots[IN_SEC].stop();
        }
    }

    /// True if the active buffer has no clip, is not playing, or runs out
    /// before the next measure plus the two-measure silence tail baked into
    /// every render.
    pub fn is_ending(&self, next_measure: f64, bpm: u16, now: f64) -> bool {
        let Some(len) = self.slots[CUR_PRI].buffer_duration() else {
            return true;
        };
        let pos = self.slots[CUR_PRI].playback_offset(now);
        now - pos + len < next_measure + silence_tail(bpm) + 0.1
            || !self.slots[CUR_PRI].is_playing(now)
    }

    /// Playback offset to resume from after a tempo change, scaled by the
    /// tempo ratio so the bar position is preserved rather than restarted.
    pub fn time_at_new_tempo(&self, next_measure: f64, old_bpm: u16, new_bpm: u16, now: f64) -> f64 {
        let pos = self.slots[CUR_PRI].playback_offset(now);
        if pos > 0.0 {
            (pos + (next_measure - now)) * old_bpm as f64 / new_bpm as f64
        } else {
            0.0
        }
    }

    /// Apply spatial parameters uniformly to all slots.
    pub fn set_spatial(&mut self, params: &SpatialParams) {
        for slot in &mut self.slots {
            slot.set_spatial(params);
        }
    }

    fn reset_idle_gains(&mut self) {
        self.slots[CUR_PRI].set_gain(self.volume);
        self.slots[CUR_SEC].set_gain(self.volume);
        self.slots[IN_PRI].set_gain(0.0);
        self.slots[IN_SEC].set_gain(0.0);
    }
}

/// Ease-out gain curve: keeps perceived loudness closer to constant through
/// the crossfade than a linear ramp.
fn fade_curve(linear: f32) -> f32 {
    1.0 - (linear - 1.0) * (linear - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn buffer_id() -> BufferId {
        let mut map: SlotMap<BufferId, ()> = SlotMap::with_key();
        map.insert(())
    }

    /// Minimal slot that records schedules and gains.
    #[derive(Clone, Debug, Default)]
    struct FakeSlot {
        gain: f32,
        schedule: Option<(BufferId, f64, f64)>,
        duration: Option<f64>,
    }

    impl OutputSlot for FakeSlot {
        fn schedule_start(&mut self, buffer: BufferId, at: f64, offset: f64) {
            self.schedule = Some((buffer, at, offset));
        }

        fn stop(&mut self) {
            self.schedule = None;
        }

        fn set_gain(&mut self, gain: f32) {
            self.gain = gain;
        }

        fn playback_offset(&self, now: f64) -> f64 {
            match self.schedule {
                Some((_, at, offset)) if now >= at => offset + (now - at),
                Some((_, _, offset)) => offset,
                None => 0.0,
            }
        }

        fn is_playing(&self, now: f64) -> bool {
            match (self.schedule, self.duration) {
                (Some((_, at, offset)), Some(len)) => now >= at && offset + (now - at) < len,
                (Some((_, at, _)), None) => now >= at,
                _ => false,
            }
        }

        fn buffer_duration(&self) -> Option<f64> {
            if self.schedule.is_some() {
                self.duration
            } else {
                None
            }
        }

        fn set_spatial(&mut self, _params: &SpatialParams) {}
    }

    fn source() -> PlaybackSource<FakeSlot> {
        PlaybackSource::new([
            FakeSlot::default(),
            FakeSlot::default(),
            FakeSlot::default(),
            FakeSlot::default(),
        ])
    }

    #[test]
    fn idle_gains_after_new() {
        let src = source();
        assert_eq!(src.slots[CUR_PRI].gain, 1.0);
        assert_eq!(src.slots[IN_PRI].gain, 0.0);
    }

    #[test]
    fn play_schedules_both_secondaries() {
        let mut src = source();
        let buf = buffer_id();
        src.play(Some(buf), Some(buf), 2.0, 0.0);

        assert_eq!(src.slots[CUR_SEC].schedule, Some((buf, 2.0, 0.0)));
        assert_eq!(src.slots[IN_SEC].schedule, Some((buf, 2.0, 0.0)));
        assert_eq!(src.slots[CUR_PRI].schedule, None);
    }

    #[test]
    fn play_with_missing_buffer_silences_slot() {
        let mut src = source();
        let buf = buffer_id();
        src.play(Some(buf), Some(buf), 2.0, 0.0);
        src.play(Some(buf), None, 4.0, 0.0);

        assert!(src.slots[CUR_SEC].schedule.is_some());
        assert_eq!(src.slots[IN_SEC].schedule, None);
    }

    #[test]
    fn crossfade_ramp_endpoint_gains() {
        let mut src = source();
        src.set_volume(0.8);
        let buf = buffer_id();
        src.slots[CUR_PRI].schedule = Some((buf, 0.0, 0.0));
        src.slots[CUR_PRI].duration = Some(100.0);

        src.start_crossfade_now(buf, 2.0, 1.0);
        assert_eq!(src.state, CrossfadeState::Loading);

        // Ramp starts after the loading buffer
        assert!(!src.update(1.0));
        assert_eq!(src.state, CrossfadeState::Loading);
        assert!(!src.update(1.0 + LOADING_BUFFER));
        assert_eq!(src.state, CrossfadeState::InProgress);

        // progress 0: outgoing at curve(volume), incoming at curve(0) = 0
        assert!((src.slots[CUR_PRI].gain - fade_curve(0.8)).abs() < 1e-6);
        assert!(src.slots[IN_PRI].gain.abs() < 1e-6);

        // Past the end: decks swap, idle gains restored
        assert!(src.update(1.0 + LOADING_BUFFER + 2.5));
        assert_eq!(src.state, CrossfadeState::None);
        assert_eq!(src.slots[CUR_PRI].gain, 0.8);
        assert_eq!(src.slots[IN_PRI].gain, 0.0);
    }

    #[test]
    fn crossfade_swaps_incoming_primary_to_current() {
        let mut src = source();
        let buf = buffer_id();
        src.start_crossfade_now(buf, 1.0, 0.0);
        // The incoming primary got the schedule
        assert!(src.slots[IN_PRI].schedule.is_some());

        src.update(LOADING_BUFFER);
        assert!(src.update(LOADING_BUFFER + 1.5));
        // After the swap the schedule lives on the current primary
        assert!(src.slots[CUR_PRI].schedule.is_some());
        assert_eq!(src.slots[IN_PRI].schedule, None);
    }

    #[test]
    fn start_crossfade_now_aligns_incoming_offset() {
        let mut src = source();
        let buf = buffer_id();
        // Current primary has been playing for 3s
        src.slots[CUR_PRI].schedule = Some((buf, 0.0, 0.0));
        src.slots[CUR_PRI].duration = Some(100.0);

        src.start_crossfade_now(buf, 1.0, 3.0);

        let (_, at, offset) = src.slots[IN_PRI].schedule.unwrap();
        assert_eq!(at, 3.0 + LOADING_BUFFER);
        // Time-aligned with the current deck position at the ramp start
        assert_eq!(offset, 3.0 + LOADING_BUFFER);
    }

    #[test]
    fn second_crossfade_request_is_ignored_while_in_flight() {
        let mut src = source();
        let buf = buffer_id();
        src.start_crossfade_now(buf, 1.0, 0.0);
        let first = src.crossfade_end();
        src.start_crossfade_now(buf, 9.0, 5.0);
        assert_eq!(src.crossfade_end(), first);
    }

    #[test]
    fn clip_change_promotes_playing_secondary() {
        let mut src = source();
        let buf = buffer_id();
        src.play(Some(buf), Some(buf), 2.0, 0.0);
        src.slots[CUR_SEC].duration = Some(10.0);

        // Before the scheduled start nothing is promoted
        src.clip_change(1.0);
        assert_eq!(src.slots[CUR_PRI].schedule, None);

        // After the start the secondary is playing and gets promoted
        src.play(Some(buf), Some(buf), 2.0, 0.0);
        src.clip_change(2.05);
        assert!(src.slots[CUR_PRI].schedule.is_some());
        assert_eq!(src.slots[CUR_SEC].schedule, None);
    }

    #[test]
    fn is_ending_with_no_buffer() {
        let src = source();
        assert!(src.is_ending(2.0, 120, 0.0));
    }

    #[test]
    fn is_ending_tracks_remaining_time() {
        let mut src = source();
        let buf = buffer_id();
        // 10s buffer started at t=0
        src.slots[CUR_PRI].schedule = Some((buf, 0.0, 0.0));
        src.slots[CUR_PRI].duration = Some(10.0);

        // At t=1, next measure at 2.0, tail at 120bpm = 1.0s:
        // buffer ends at 10.0 > 2.0 + 1.0 + 0.1 — not ending
        assert!(!src.is_ending(2.0, 120, 1.0));

        // Next measure at 9.5: 10.0 < 9.5 + 1.1 — ending
        assert!(src.is_ending(9.5, 120, 1.0));
    }

    #[test]
    fn is_ending_when_not_playing() {
        let mut src = source();
        let buf = buffer_id();
        src.slots[CUR_PRI].schedule = Some((buf, 0.0, 0.0));
        src.slots[CUR_PRI].duration = Some(3.0);
        // Played out at t=5
        assert!(src.is_ending(6.0, 120, 5.0));
    }

    #[test]
    fn tempo_rescale_preserves_beat_phase() {
        let mut src = source();
        let buf = buffer_id();
        src.slots[CUR_PRI].schedule = Some((buf, 0.0, 0.0));
        src.slots[CUR_PRI].duration = Some(100.0);

        // offset 2.0s, halving the tempo doubles the offset
        let rescaled = src.time_at_new_tempo(2.0, 120, 60, 2.0);
        assert_eq!(rescaled, 4.0);
    }

    #[test]
    fn tempo_rescale_from_start_is_zero() {
        let src = source();
        assert_eq!(src.time_at_new_tempo(2.0, 120, 60, 0.0), 0.0);
    }

    #[test]
    fn stop_resets_gains_and_state() {
        let mut src = source();
        src.set_volume(0.5);
        let buf = buffer_id();
        src.start_crossfade_now(buf, 1.0, 0.0);
        src.stop();

        assert!(!src.is_crossfading());
        assert_eq!(src.slots[CUR_PRI].gain, 0.5);
        assert_eq!(src.slots[IN_PRI].gain, 0.0);
        assert_eq!(src.slots[IN_PRI].schedule, None);
    }

    #[test]
    fn set_volume_is_deferred_while_ramping() {
        let mut src = source();
        let buf = buffer_id();
        src.start_crossfade_now(buf, 10.0, 0.0);
        src.update(LOADING_BUFFER + 0.01);
        assert_eq!(src.state, CrossfadeState::InProgress);

        let before = src.slots[CUR_PRI].gain;
        src.set_volume(0.1);
        // Ramp keeps driving the gains; the new volume applies afterwards
        assert_eq!(src.slots[CUR_PRI].gain, before);
    }
}
