//! segue demo CLI — plays a small generated score and exercises runtime
//! motif, instrument and tempo changes.
//!
//! Usage:
//!   sg-cli [seconds]
//!
//! Content normally comes from an offline authoring pipeline; here the
//! renders are generated in-process so the demo is self-contained.

use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use sg_audio::{AudioData, AudioEngine, BufferStore};
use sg_master::{
    Catalog, Channel, ChannelConfig, Emitter, Fragment, Instrument, Scene, SelectionPolicy,
    SpatialParams, Tempo,
};

fn main() {
    env_logger::init();

    let seconds: f64 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(24.0);

    let sample_rate = match AudioEngine::default_sample_rate() {
        Ok(rate) => rate,
        Err(e) => {
            eprintln!("No audio output: {}", e);
            std::process::exit(1);
        }
    };

    let mut store = BufferStore::new();
    let mut catalog = Catalog::new();
    let content = build_content(&mut catalog, &mut store, sample_rate);

    println!("Fragments:   aurora, drift, ember (+ stinger motif)");
    println!("Instruments: glass, brass");
    println!("Tempos:      amble (100 bpm), rush (140 bpm)");
    println!("Renders:     {} buffers at {} Hz", store.len(), sample_rate);
    println!();

    let mut engine = match AudioEngine::new(Arc::new(store)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Audio init failed: {}", e);
            std::process::exit(1);
        }
    };

    let pad_slots = engine.create_slot_quad();
    let lead_slots = engine.create_slot_quad();
    if let Err(e) = engine.build_stream() {
        eprintln!("Stream failed: {}", e);
        std::process::exit(1);
    }
    let _ = engine.start();
    let clock = engine.clock();

    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    // Channel 0: ambient pad cycling through the three fragments.
    let mut pad_config = ChannelConfig::new(content.glass, content.amble);
    pad_config.fragments = vec![content.aurora, content.drift, content.ember];
    pad_config.policy = SelectionPolicy::Shuffle;
    pad_config.rng_seed = seed;
    pad_config.volume = 0.8;
    let pad = Channel::new(pad_config, pad_slots, clock.now());

    // Channel 1: silent until a motif is queued.
    let mut lead_config = ChannelConfig::new(content.glass, content.amble);
    lead_config.play_on_start = false;
    let lead = Channel::new(lead_config, lead_slots, clock.now());

    let scene = Scene::new(vec![pad, lead], SpatialParams::default());
    let mut emitter = Emitter::new(catalog, vec![scene]);
    emitter.start();

    println!("Playing for {:.0} s...", seconds);
    println!("  t=6   queue stinger motif (interrupt)");
    println!("  t=10  crossfade pad to brass");
    println!("  t=16  tempo change to rush");
    println!();

    let mut fired = [false; 3];
    let mut last_tick = Instant::now();
    let started = clock.now();

    while clock.now() - started < seconds {
        std::thread::sleep(Duration::from_millis(10));
        let dt = last_tick.elapsed().as_secs_f32();
        last_tick = Instant::now();

        let now = clock.now();
        let t = now - started;

        if !fired[0] && t >= 6.0 {
            fired[0] = true;
            emitter.play_motif(1, content.stinger, true, 5.0, 0.0);
        }
        if !fired[1] && t >= 10.0 {
            fired[1] = true;
            emitter.set_instrument(0, content.brass, true, 1.5, now);
        }
        if !fired[2] && t >= 16.0 {
            fired[2] = true;
            emitter.set_tempo_all(content.rush);
        }

        emitter.update(dt, now);
    }

    emitter.stop_all();
    let _ = engine.stop();
    println!("Done.");
}

struct Content {
    glass: sg_master::InstrumentId,
    brass: sg_master::InstrumentId,
    amble: sg_master::TempoId,
    rush: sg_master::TempoId,
    aurora: sg_master::FragmentId,
    drift: sg_master::FragmentId,
    ember: sg_master::FragmentId,
    stinger: sg_master::FragmentId,
}

/// Register two instruments, two tempos and four fragments, rendering
/// every combination into the buffer store.
fn build_content(catalog: &mut Catalog, store: &mut BufferStore, sample_rate: u32) -> Content {
    let glass = catalog.add_instrument(Instrument::new("glass"));
    let brass = catalog.add_instrument(Instrument::new("brass"));
    let amble = catalog.add_tempo(Tempo::new("amble", 100));
    let rush = catalog.add_tempo(Tempo::new("rush", 140));

    // Chord progressions, one chord per measure
    let aurora_chords: &[[f32; 3]] = &[
        [220.00, 261.63, 329.63],
        [174.61, 220.00, 261.63],
        [196.00, 246.94, 293.66],
        [220.00, 277.18, 329.63],
    ];
    let drift_chords: &[[f32; 3]] = &[
        [146.83, 220.00, 293.66],
        [164.81, 207.65, 246.94],
        [174.61, 220.00, 261.63],
        [146.83, 185.00, 220.00],
    ];
    let ember_chords: &[[f32; 3]] = &[
        [130.81, 196.00, 261.63],
        [146.83, 174.61, 220.00],
        [123.47, 196.00, 246.94],
        [130.81, 164.81, 196.00],
    ];
    let stinger_chords: &[[f32; 3]] = &[
        [440.00, 523.25, 659.25],
        [392.00, 493.88, 587.33],
    ];

    let add = |name: &str, chords: &[[f32; 3]], catalog: &mut Catalog, store: &mut BufferStore| {
        let mut fragment = Fragment::new(name, vec![glass, brass], vec![amble, rush]);
        for (instrument, bright) in [(glass, false), (brass, true)] {
            for (tempo, bpm) in [(amble, 100), (rush, 140)] {
                let samples = render_chords(chords, bpm, sample_rate, bright);
                let buffer = store.insert(AudioData::mono(samples, sample_rate));
                fragment.set_render(instrument, tempo, buffer);
            }
        }
        catalog.add_fragment(fragment)
    };

    let aurora = add("aurora", aurora_chords, catalog, store);
    let drift = add("drift", drift_chords, catalog, store);
    let ember = add("ember", ember_chords, catalog, store);
    let stinger = add("stinger", stinger_chords, catalog, store);

    Content { glass, brass, amble, rush, aurora, drift, ember, stinger }
}

/// Render a chord-per-measure progression in 4/4 at `bpm`, plus the
/// two-measure silence tail every segue render carries.
fn render_chords(chords: &[[f32; 3]], bpm: u16, sample_rate: u32, bright: bool) -> Vec<f32> {
    let measure_frames = (60.0 / bpm as f64 * 4.0 * sample_rate as f64) as usize;
    let total = measure_frames * (chords.len() + 2);
    let mut samples = vec![0.0f32; total];

    for (m, chord) in chords.iter().enumerate() {
        let base = m * measure_frames;
        for i in 0..measure_frames {
            let t = i as f32 / sample_rate as f32;
            let env = envelope(i as f32 / measure_frames as f32);
            let mut value = 0.0;
            for &freq in chord {
                value += (TAU * freq * t).sin();
                if bright {
                    value += 0.4 * (TAU * freq * 2.0 * t).sin();
                    value += 0.2 * (TAU * freq * 3.0 * t).sin();
                }
            }
            samples[base + i] = value * env * 0.12;
        }
    }
    samples
}

/// Soft attack and release within each measure.
fn envelope(phase: f32) -> f32 {
    let attack = (phase / 0.05).min(1.0);
    let release = ((1.0 - phase) / 0.15).min(1.0);
    attack * release
}
