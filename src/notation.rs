use serde_json::Value;

use crate::record::scalar_text;

/// Turns a numeric svar sequence into display text for a notation.
pub trait NotationConverter: Send + Sync {
    fn convert(&self, svars: &[Value], notation: &str) -> String;
}

impl<F> NotationConverter for F
where
    F: Fn(&[Value], &str) -> String + Send + Sync,
{
    fn convert(&self, svars: &[Value], notation: &str) -> String {
        self(svars, notation)
    }
}

const SARGAM: [&str; 12] = ["S", "r", "R", "g", "G", "m", "M", "P", "d", "D", "n", "N"];
const WESTERN: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Semitone degrees (0 = Sa) in sargam, western or plain numeric notation.
///
/// Degrees outside one octave get a `'` per octave above and a `.` per octave
/// below, up to `MAX_OCTAVES` either way. Degrees further out and unknown
/// notations print numbers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SvarNotation;

impl SvarNotation {
    pub const NOTATIONS: [&'static str; 3] = ["sargam", "western", "numeric"];
    pub const MAX_OCTAVES: i64 = 3;

    fn name(degree: i64, names: &[&str; 12]) -> String {
        let octave = degree.div_euclid(12);
        let name = names[degree.rem_euclid(12) as usize];
        match octave {
            0 => name.to_string(),
            o if o > 0 => format!("{name}{}", "'".repeat(o as usize)),
            o => format!("{}{name}", ".".repeat(o.unsigned_abs() as usize)),
        }
    }
}

impl NotationConverter for SvarNotation {
    fn convert(&self, svars: &[Value], notation: &str) -> String {
        let names = match notation {
            "sargam" => Some(&SARGAM),
            "western" => Some(&WESTERN),
            _ => None,
        };
        svars
            .iter()
            .map(|svar| match (names, svar.as_i64()) {
                (Some(names), Some(degree))
                    if degree.div_euclid(12).abs() <= Self::MAX_OCTAVES =>
                {
                    Self::name(degree, names)
                }
                _ => scalar_text(svar),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
