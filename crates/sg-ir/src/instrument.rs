//! Instrument key type.

use arrayvec::ArrayString;

/// An instrumentation/timbre variant of the same musical content.
///
/// Instruments are opaque keys: the engine never inspects anything beyond
/// the name, which exists for catalog resolution and log messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instrument {
    pub name: ArrayString<32>,
}

impl Instrument {
    pub fn new(name: &str) -> Self {
        let mut inst = Self { name: ArrayString::new() };
        let _ = inst.name.try_push_str(name);
        inst
    }
}
