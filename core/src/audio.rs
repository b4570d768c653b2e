//! Audio collaborators (spec §1, §6, §9, C12): the codec never opens a
//! device or spawns a thread, it only pulls/pushes PCM through these two
//! traits. `KeyProvider` lives in [`crate::crypto`], the other side of the
//! same external-collaborator boundary.

/// Blocking pull of up to `max_samples` PCM samples. An empty return signals
/// end of stream.
pub trait AudioSource {
    fn pull(&mut self, max_samples: usize) -> Vec<f32>;
}

/// Accepts one complete waveform (or successive chunks of it).
pub trait AudioSink {
    fn push(&mut self, samples: &[f32]);
}

/// A `Vec<f32>`-backed `AudioSource`, for tests and for callers that already
/// hold a full waveform in memory (e.g. a WAV file read up front).
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    samples: Vec<f32>,
    position: usize,
}

impl MemorySource {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples, position: 0 }
    }
}

impl AudioSource for MemorySource {
    fn pull(&mut self, max_samples: usize) -> Vec<f32> {
        let end = (self.position + max_samples).min(self.samples.len());
        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;
        chunk
    }
}

/// A `Vec<f32>`-backed `AudioSink`.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub samples: Vec<f32>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioSink for MemorySink {
    fn push(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_yields_chunks_then_empty() {
        let mut source = MemorySource::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(source.pull(2), vec![1.0, 2.0]);
        assert_eq!(source.pull(2), vec![3.0]);
        assert_eq!(source.pull(2), Vec::<f32>::new());
    }

    #[test]
    fn memory_sink_accumulates_pushes() {
        let mut sink = MemorySink::new();
        sink.push(&[1.0, 2.0]);
        sink.push(&[3.0]);
        assert_eq!(sink.samples, vec![1.0, 2.0, 3.0]);
    }
}
