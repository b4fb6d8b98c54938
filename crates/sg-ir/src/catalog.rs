//! Asset catalogs with by-name resolution.

use slotmap::{new_key_type, SlotMap};

use crate::audio_traits::BufferId;
use crate::fragment::Fragment;
use crate::instrument::Instrument;
use crate::tempo::Tempo;

new_key_type! {
    pub struct FragmentId;
    pub struct InstrumentId;
    pub struct TempoId;
}

/// The resolved content catalogs: fragments, instruments and tempos loaded
/// by the embedding application before the engine starts.
///
/// The scheduler core receives a `&Catalog` on every call that needs to
/// resolve content; there is no ambient lookup.
#[derive(Debug, Default)]
pub struct Catalog {
    fragments: SlotMap<FragmentId, Fragment>,
    instruments: SlotMap<InstrumentId, Instrument>,
    tempos: SlotMap<TempoId, Tempo>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_fragment(&mut self, fragment: Fragment) -> FragmentId {
        self.fragments.insert(fragment)
    }

    pub fn add_instrument(&mut self, instrument: Instrument) -> InstrumentId {
        self.instruments.insert(instrument)
    }

    pub fn add_tempo(&mut self, tempo: Tempo) -> TempoId {
        self.tempos.insert(tempo)
    }

    pub fn fragment(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.get(id)
    }

    pub fn instrument(&self, id: InstrumentId) -> Option<&Instrument> {
        self.instruments.get(id)
    }

    pub fn tempo(&self, id: TempoId) -> Option<&Tempo> {
        self.tempos.get(id)
    }

    /// Beats-per-minute of a tempo, or `None` (logged) for a stale id.
    pub fn bpm(&self, id: TempoId) -> Option<u16> {
        let tempo = self.tempos.get(id);
        if tempo.is_none() {
            log::error!("unknown tempo id {:?}", id);
        }
        tempo.map(|t| t.bpm)
    }

    /// Resolve a fragment by case-insensitive name.
    pub fn resolve_fragment(&self, name: &str) -> Option<FragmentId> {
        let found = self
            .fragments
            .iter()
            .find(|(_, f)| f.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| id);
        if found.is_none() {
            log::error!("fragment \"{}\" not found", name);
        }
        found
    }

    /// Resolve an instrument by case-insensitive name.
    pub fn resolve_instrument(&self, name: &str) -> Option<InstrumentId> {
        let found = self
            .instruments
            .iter()
            .find(|(_, i)| i.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| id);
        if found.is_none() {
            log::error!("instrument \"{}\" not found", name);
        }
        found
    }

    /// Resolve a tempo by case-insensitive name.
    pub fn resolve_tempo(&self, name: &str) -> Option<TempoId> {
        let found = self
            .tempos
            .iter()
            .find(|(_, t)| t.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| id);
        if found.is_none() {
            log::error!("tempo \"{}\" not found", name);
        }
        found
    }

    /// Look up the rendered buffer for a fragment at an instrument × tempo
    /// combination. Logs and returns `None` if the combination was never
    /// rendered or any id is stale — the caller degrades to silence.
    pub fn buffer(
        &self,
        fragment: FragmentId,
        instrument: InstrumentId,
        tempo: TempoId,
    ) -> Option<BufferId> {
        let Some(frag) = self.fragments.get(fragment) else {
            log::error!("unknown fragment id {:?}", fragment);
            return None;
        };
        let found = frag.buffer(instrument, tempo);
        if found.is_none() {
            let instrument_name =
                self.instruments.get(instrument).map(|i| i.name.as_str()).unwrap_or("?");
            let tempo_name = self.tempos.get(tempo).map(|t| t.name.as_str()).unwrap_or("?");
            log::error!(
                "fragment \"{}\" is not rendered for instrument \"{}\" at tempo \"{}\"",
                frag.name,
                instrument_name,
                tempo_name
            );
        }
        found
    }
}
