//! Fragment render tables.

use alloc::vec;
use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::audio_traits::BufferId;
use crate::catalog::{InstrumentId, TempoId};

/// A musical phrase, rendered offline for every supported
/// instrument × tempo combination, designed to chain seamlessly with other
/// fragments at measure boundaries.
///
/// The render table is row-major over the fragment's own instrument and
/// tempo axes; a missing entry means that combination was never rendered.
#[derive(Clone, Debug)]
pub struct Fragment {
    pub name: ArrayString<32>,
    instruments: Vec<InstrumentId>,
    tempos: Vec<TempoId>,
    renders: Vec<Option<BufferId>>,
}

impl Fragment {
    /// Create a fragment with empty renders for the given axes.
    pub fn new(name: &str, instruments: Vec<InstrumentId>, tempos: Vec<TempoId>) -> Self {
        let mut frag = Self {
            name: ArrayString::new(),
            renders: vec![None; instruments.len() * tempos.len()],
            instruments,
            tempos,
        };
        let _ = frag.name.try_push_str(name);
        frag
    }

    /// Register a rendered buffer for an instrument × tempo combination.
    /// Returns false if either axis is not part of this fragment.
    pub fn set_render(
        &mut self,
        instrument: InstrumentId,
        tempo: TempoId,
        buffer: BufferId,
    ) -> bool {
        match self.render_index(instrument, tempo) {
            Some(idx) => {
                self.renders[idx] = Some(buffer);
                true
            }
            None => false,
        }
    }

    /// Look up the rendered buffer for an instrument × tempo combination.
    pub fn buffer(&self, instrument: InstrumentId, tempo: TempoId) -> Option<BufferId> {
        self.render_index(instrument, tempo)
            .and_then(|idx| self.renders[idx])
    }

    fn render_index(&self, instrument: InstrumentId, tempo: TempoId) -> Option<usize> {
        let i = self.instruments.iter().position(|&id| id == instrument)?;
        let t = self.tempos.iter().position(|&id| id == tempo)?;
        Some(i * self.tempos.len() + t)
    }
}
