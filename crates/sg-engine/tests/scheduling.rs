//! Integration tests: drive a channel through measure boundaries with mock
//! output slots and a manual clock, and verify the scheduling decisions.

use std::cell::RefCell;
use std::rc::Rc;

use sg_engine::{Channel, ChannelConfig, SelectionPolicy};
use sg_ir::{
    measure_len, BufferId, Catalog, Fragment, FragmentId, Instrument, InstrumentId, OutputSlot,
    SpatialParams, Tempo, TempoId, LOADING_BUFFER,
};
use slotmap::SlotMap;

/// What a slot was asked to do, tagged with the slot's index in the source
/// (0 = current primary, 1 = current secondary, 2 = incoming primary,
/// 3 = incoming secondary).
#[derive(Clone, Copy, Debug, PartialEq)]
enum SlotEvent {
    Start { slot: usize, buffer: BufferId, at: f64, offset: f64 },
    Stop { slot: usize },
}

#[derive(Clone)]
struct MockSlot {
    index: usize,
    store: Rc<SlotMap<BufferId, f64>>,
    log: Rc<RefCell<Vec<SlotEvent>>>,
    schedule: Option<(BufferId, f64, f64)>,
}

impl OutputSlot for MockSlot {
    fn schedule_start(&mut self, buffer: BufferId, at: f64, offset: f64) {
        self.schedule = Some((buffer, at, offset));
        self.log
            .borrow_mut()
            .push(SlotEvent::Start { slot: self.index, buffer, at, offset });
    }

    fn stop(&mut self) {
        if self.schedule.take().is_some() {
            self.log.borrow_mut().push(SlotEvent::Stop { slot: self.index });
        }
    }

    fn set_gain(&mut self, _gain: f32) {}

    fn playback_offset(&self, now: f64) -> f64 {
        match self.schedule {
            Some((_, at, offset)) if now >= at => offset + (now - at),
            Some((_, _, offset)) => offset,
            None => 0.0,
        }
    }

    fn is_playing(&self, now: f64) -> bool {
        match self.schedule {
            Some((buffer, at, offset)) => {
                let len = self.store.get(buffer).copied().unwrap_or(0.0);
                now >= at && offset + (now - at) < len
            }
            None => false,
        }
    }

    fn buffer_duration(&self) -> Option<f64> {
        let (buffer, _, _) = self.schedule?;
        self.store.get(buffer).copied()
    }

    fn set_spatial(&mut self, _params: &SpatialParams) {}
}

/// Catalog with two instruments × two tempos and two fragments, every
/// combination rendered. Renders are 4 measures of content plus the
/// 2-measure silence tail.
struct Rig {
    catalog: Catalog,
    store: Rc<SlotMap<BufferId, f64>>,
    log: Rc<RefCell<Vec<SlotEvent>>>,
    piano: InstrumentId,
    organ: InstrumentId,
    normal: TempoId, // 120 bpm: 2.0 s/measure
    half: TempoId,   // 60 bpm: 4.0 s/measure
    theme: FragmentId,
    riff: FragmentId,
}

fn rig() -> Rig {
    let mut catalog = Catalog::new();
    let mut store: SlotMap<BufferId, f64> = SlotMap::with_key();

    let piano = catalog.add_instrument(Instrument::new("piano"));
    let organ = catalog.add_instrument(Instrument::new("organ"));
    let normal = catalog.add_tempo(Tempo::new("normal", 120));
    let half = catalog.add_tempo(Tempo::new("half", 60));

    let add_fragment = |name: &str, catalog: &mut Catalog, store: &mut SlotMap<BufferId, f64>| {
        let mut fragment = Fragment::new(name, vec![piano, organ], vec![normal, half]);
        for instrument in [piano, organ] {
            for (tempo, bpm) in [(normal, 120), (half, 60)] {
                let len = 6.0 * measure_len(bpm, 4);
                fragment.set_render(instrument, tempo, store.insert(len));
            }
        }
        catalog.add_fragment(fragment)
    };

    let theme = add_fragment("theme", &mut catalog, &mut store);
    let riff = add_fragment("riff", &mut catalog, &mut store);

    Rig {
        catalog,
        store: Rc::new(store),
        log: Rc::new(RefCell::new(Vec::new())),
        piano,
        organ,
        normal,
        half,
        theme,
        riff,
    }
}

impl Rig {
    fn slots(&self) -> [MockSlot; 4] {
        core::array::from_fn(|index| MockSlot {
            index,
            store: self.store.clone(),
            log: self.log.clone(),
            schedule: None,
        })
    }

    fn channel(&self, fragments: Vec<FragmentId>) -> Channel<MockSlot> {
        let mut config = ChannelConfig::new(self.piano, self.normal);
        config.fragments = fragments;
        config.policy = SelectionPolicy::RoundRobin;
        let mut channel = Channel::new(config, self.slots(), 0.0);
        channel.start();
        channel
    }

    fn starts(&self) -> Vec<SlotEvent> {
        self.log
            .borrow()
            .iter()
            .copied()
            .filter(|e| matches!(e, SlotEvent::Start { .. }))
            .collect()
    }

    fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }
}

/// Step the channel at a 20 ms tick until `until` (exclusive-ish).
fn run_until(channel: &mut Channel<MockSlot>, catalog: &Catalog, from: f64, until: f64) -> f64 {
    let mut now = from;
    while now < until {
        now += 0.02;
        channel.update(catalog, 0.02, now);
    }
    now
}

#[test]
fn first_fragment_scheduled_at_first_boundary() {
    let rig = rig();
    let mut channel = rig.channel(vec![rig.theme]);

    // First boundary is reserved two loading buffers out
    assert_eq!(channel.next_measure(), 2.0 * LOADING_BUFFER);

    run_until(&mut channel, &rig.catalog, 0.0, 0.5);
    assert_eq!(channel.current_fragment(), Some(rig.theme));

    let starts = rig.starts();
    assert_eq!(starts.len(), 2);
    for event in starts {
        let SlotEvent::Start { slot, at, offset, .. } = event else { unreachable!() };
        // Both secondaries pre-scheduled for the boundary, from the top
        assert!(slot == 1 || slot == 3);
        assert_eq!(at, 0.8);
        assert_eq!(offset, 0.0);
    }
}

#[test]
fn measure_clock_advances_by_exact_measures() {
    let rig = rig();
    let mut channel = rig.channel(vec![rig.theme]);

    run_until(&mut channel, &rig.catalog, 0.0, 0.9);
    assert!((channel.next_measure() - 2.8).abs() < 1e-9);

    run_until(&mut channel, &rig.catalog, 0.9, 2.9);
    assert!((channel.next_measure() - 4.8).abs() < 1e-9);
}

#[test]
fn ambient_round_robin_rotates_at_fragment_end() {
    let rig = rig();
    let mut channel = rig.channel(vec![rig.theme, rig.riff]);

    run_until(&mut channel, &rig.catalog, 0.0, 0.5);
    assert_eq!(channel.current_fragment(), Some(rig.theme));

    // Renders hold 12s of audio (4 measures of content + the tail). The
    // first fragment starts at 0.8 and the loading point before the 12.8
    // boundary is the first one where it reads as ending
    run_until(&mut channel, &rig.catalog, 0.5, 12.3);
    assert_eq!(channel.current_fragment(), Some(rig.theme));

    run_until(&mut channel, &rig.catalog, 12.3, 12.7);
    assert_eq!(channel.current_fragment(), Some(rig.riff));
}

#[test]
fn idles_when_there_is_nothing_to_play() {
    let rig = rig();
    let mut channel = rig.channel(Vec::new());

    assert!(channel.is_playing());
    channel.update(&rig.catalog, 0.02, 0.02);
    assert!(!channel.is_playing());
}

#[test]
fn interrupt_priority_gating() {
    let rig = rig();
    let mut channel = rig.channel(vec![rig.theme]);

    channel.play_motif(rig.theme, true, 5.0, 0.0);
    channel.play_motif(rig.riff, true, 3.0, 0.0);
    // Lower-priority request is dropped
    assert_eq!(channel.pending_motif().unwrap().fragment, rig.theme);

    channel.play_motif(rig.riff, true, 7.0, 0.0);
    // Equal-or-higher priority displaces
    assert_eq!(channel.pending_motif().unwrap().fragment, rig.riff);
}

#[test]
fn pending_interrupt_wins_the_next_loading_point() {
    let rig = rig();
    let mut channel = rig.channel(vec![rig.theme]);

    // theme is playing steadily by t=1.0
    let now = run_until(&mut channel, &rig.catalog, 0.0, 1.0);
    channel.play_motif(rig.riff, true, 1.0, 0.0);

    // Next loading point consumes the pending motif even though the
    // current fragment was nowhere near ending
    run_until(&mut channel, &rig.catalog, now, 2.6);
    assert_eq!(channel.current_fragment(), Some(rig.riff));
    assert!(channel.pending_motif().is_none());
}

#[test]
fn cancel_motif_scrubs_queue_but_not_pending_interrupt() {
    let rig = rig();
    let mut channel = rig.channel(vec![rig.theme]);

    channel.play_motif(rig.riff, false, 1.0, 0.0);
    channel.play_motif(rig.riff, false, 2.0, 0.0);
    channel.play_motif(rig.riff, true, 5.0, 0.0);
    assert_eq!(channel.queued_motifs(), 2);

    channel.cancel_motif(rig.riff);
    assert_eq!(channel.queued_motifs(), 0);
    // The pending interrupt survives cancellation
    assert_eq!(channel.pending_motif().unwrap().fragment, rig.riff);
}

#[test]
fn set_instrument_deferred_inside_loading_window() {
    let rig = rig();
    let mut channel = rig.channel(vec![rig.theme]);

    // Steady playback; boundary at 2.8, window opens at 2.4
    let now = run_until(&mut channel, &rig.catalog, 0.0, 2.5);
    assert!(now > 2.4 && now < 2.8);
    rig.clear_log();

    channel.set_instrument(&rig.catalog, rig.organ, true, 0.2, now);

    // Inside the window the change must be deferred, not started
    assert!(!channel.is_crossfading());
    assert_eq!(channel.pending_crossfade().unwrap().instrument, rig.organ);
    assert!(rig.starts().is_empty());
}

#[test]
fn set_instrument_mid_measure_starts_crossfade_and_commits_early() {
    let rig = rig();
    let mut channel = rig.channel(vec![rig.theme]);

    // Steady playback, mid-measure (boundary 2.8, window opens 2.4)
    let now = run_until(&mut channel, &rig.catalog, 0.0, 1.5);
    rig.clear_log();

    channel.set_instrument(&rig.catalog, rig.organ, true, 0.3, now);

    assert!(channel.is_crossfading());
    // Fade ends at now + 0.4 + 0.3 < 2.8: committed optimistically
    assert_eq!(channel.instrument(), rig.organ);

    // The incoming primary got a scheduled start after the loading buffer,
    // offset so it lines up with the current deck at the ramp start
    let starts = rig.starts();
    assert_eq!(starts.len(), 1);
    let SlotEvent::Start { at, offset, .. } = starts[0] else { unreachable!() };
    assert!((at - (now + LOADING_BUFFER)).abs() < 1e-9);
    assert!((offset - ((now - 0.8) + LOADING_BUFFER)).abs() < 1e-9);
}

#[test]
fn set_instrument_for_next_fragment_keeps_current_buffers() {
    let rig = rig();
    let mut channel = rig.channel(vec![rig.theme]);

    let now = run_until(&mut channel, &rig.catalog, 0.0, 1.5);
    rig.clear_log();

    channel.set_instrument(&rig.catalog, rig.organ, false, 0.0, now);

    // Direct commit, no rescheduling of the active fragment
    assert_eq!(channel.instrument(), rig.organ);
    assert!(!channel.is_crossfading());
    assert!(rig.starts().is_empty());
}

#[test]
fn duplicate_instrument_request_is_a_no_op() {
    let rig = rig();
    let mut channel = rig.channel(vec![rig.theme]);

    let now = run_until(&mut channel, &rig.catalog, 0.0, 1.5);
    rig.clear_log();

    channel.set_instrument(&rig.catalog, rig.piano, true, 0.3, now);
    assert!(!channel.is_crossfading());
    assert!(rig.starts().is_empty());
}

#[test]
fn rerequesting_incoming_instrument_cancels_deferred_fade() {
    let rig = rig();
    let mut channel = rig.channel(vec![rig.theme]);

    // Long fade to organ in flight (too long to commit early)
    let now = run_until(&mut channel, &rig.catalog, 0.0, 1.0);
    channel.set_instrument(&rig.catalog, rig.organ, true, 2.0, now);
    assert!(channel.is_crossfading());
    assert_eq!(channel.instrument(), rig.piano);

    // A change back to piano while crossfading is deferred
    channel.set_instrument(&rig.catalog, rig.piano, true, 0.5, now);
    assert_eq!(channel.pending_crossfade().unwrap().instrument, rig.piano);

    // Re-requesting organ — already the incoming instrument — cancels the
    // deferred fade instead of queueing another change
    channel.set_instrument(&rig.catalog, rig.organ, true, 0.5, now);
    assert!(channel.pending_crossfade().is_none());

    // The original fade still runs to completion
    run_until(&mut channel, &rig.catalog, now, 4.0);
    assert_eq!(channel.instrument(), rig.organ);
}

#[test]
fn deferred_crossfade_runs_from_the_next_boundary() {
    let rig = rig();
    let mut channel = rig.channel(vec![rig.theme]);

    // Defer a change by requesting inside the loading window
    let now = run_until(&mut channel, &rig.catalog, 0.0, 2.5);
    channel.set_instrument(&rig.catalog, rig.organ, true, 0.5, now);
    assert!(channel.pending_crossfade().is_some());

    // Boundary at 2.8 passes; the following loading point (4.4..4.8)
    // promotes the pending fade and arms it at the 4.8 boundary
    let now = run_until(&mut channel, &rig.catalog, now, 4.6);
    assert!(channel.pending_crossfade().is_none());
    assert!(channel.is_crossfading());

    // Ramp runs from 4.8 for 0.5s, then the instrument commits
    run_until(&mut channel, &rig.catalog, now, 5.5);
    assert!(!channel.is_crossfading());
    assert_eq!(channel.instrument(), rig.organ);
}

#[test]
fn tempo_change_waits_for_the_loading_point_and_keeps_bar_phase() {
    let rig = rig();
    let mut channel = rig.channel(vec![rig.theme]);

    let now = run_until(&mut channel, &rig.catalog, 0.0, 1.5);
    rig.clear_log();
    channel.set_tempo(rig.half);

    // Nothing happens until the loading window
    run_until(&mut channel, &rig.catalog, now, 2.3);
    assert!(rig.starts().is_empty());

    // Inside the window both decks are rescheduled at the boundary with a
    // tempo-scaled offset: position at the 2.8 boundary is 2.0 s into the
    // buffer, scaled by 120/60 = 4.0 s
    run_until(&mut channel, &rig.catalog, 2.3, 2.6);
    let starts = rig.starts();
    assert_eq!(starts.len(), 2);
    for event in starts {
        let SlotEvent::Start { at, offset, .. } = event else { unreachable!() };
        assert!((at - 2.8).abs() < 1e-9);
        assert!((offset - 4.0).abs() < 1e-9, "offset {} not tempo-scaled", offset);
    }

    // After the turnover the measure clock runs at the new tempo
    run_until(&mut channel, &rig.catalog, 2.6, 2.9);
    assert!((channel.next_measure() - 6.8).abs() < 1e-9);
}

#[test]
fn stop_halts_slots_and_resume_continues() {
    let rig = rig();
    let mut channel = rig.channel(vec![rig.theme]);

    let now = run_until(&mut channel, &rig.catalog, 0.0, 1.5);
    channel.stop();
    assert!(!channel.is_playing());
    // Both playing slots got stopped
    let stops: Vec<_> = rig
        .log
        .borrow()
        .iter()
        .copied()
        .filter(|e| matches!(e, SlotEvent::Stop { .. }))
        .collect();
    assert!(!stops.is_empty());

    rig.clear_log();
    channel.resume();
    assert!(channel.is_playing());
    // Continuation, not restart: nothing is rescheduled immediately
    assert!(rig.starts().is_empty());
}

#[test]
fn motif_queue_decays_to_silence() {
    let rig = rig();
    let mut channel = rig.channel(Vec::new());

    // A motif that expires in 0.2 s of wall time — gone before the first
    // loading point at 0.4
    channel.play_motif(rig.riff, false, 1.0, -5.0);
    let now = run_until(&mut channel, &rig.catalog, 0.0, 0.3);

    // Still pending: keeps the channel alive through the first window
    assert!(channel.is_playing());

    // By the first loading point (0.4) it has decayed away: the pop yields
    // nothing and the channel goes silent, then idle
    run_until(&mut channel, &rig.catalog, now, 1.0);
    assert_eq!(channel.current_fragment(), None);
}
