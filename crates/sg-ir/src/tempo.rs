//! Tempo key type.

use arrayvec::ArrayString;

/// A beats-per-minute variant of the same musical content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tempo {
    pub name: ArrayString<32>,
    /// Beats per minute
    pub bpm: u16,
}

impl Tempo {
    pub fn new(name: &str, bpm: u16) -> Self {
        let mut tempo = Self { name: ArrayString::new(), bpm };
        let _ = tempo.name.try_push_str(name);
        tempo
    }
}
