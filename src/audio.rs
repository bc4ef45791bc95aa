//! Sound cues. A terminal has one sound, so every cue rings the bell.

use crate::game::Cue;
use std::io::Write;

pub trait AudioSink {
    fn play(&mut self, cue: Cue);
}

#[derive(Debug, Default)]
pub struct Muted;

impl AudioSink for Muted {
    fn play(&mut self, _cue: Cue) {}
}

/// Rings BEL on the wrapped writer (stdout in the app).
#[derive(Debug)]
pub struct Bell<W: Write> {
    out: W,
}

impl<W: Write> Bell<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> AudioSink for Bell<W> {
    fn play(&mut self, cue: Cue) {
        if let Err(err) = self.out.write_all(b"\x07").and_then(|()| self.out.flush()) {
            tracing::debug!(?cue, %err, "bell failed");
        }
    }
}

/// Sink chosen from the `--bell` flag.
pub fn sink(bell: bool) -> Box<dyn AudioSink> {
    if bell {
        Box::new(Bell::new(std::io::stdout()))
    } else {
        Box::new(Muted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bell_writes_one_bel_per_cue() {
        let mut bell = Bell::new(Vec::new());
        bell.play(Cue::EatApple);
        bell.play(Cue::GameOver);
        assert_eq!(bell.out, b"\x07\x07");
    }
}
