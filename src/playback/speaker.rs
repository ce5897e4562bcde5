use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tracing::debug;

use crate::audio::master::MasterAudioBuffer;
use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::playback::output::AudioOutput;

/// Plays the master buffer on the default output device.
///
/// Holds one sink at a time; `start` always drops the previous one first.
pub struct SpeakerOutput {
    stream: OutputStream,
    sink: Option<Sink>,
}

impl SpeakerOutput {
    /// Open the system default output device.
    pub fn open_default() -> StoryreelResult<Self> {
        let mut stream = OutputStreamBuilder::open_default_stream().map_err(|e| {
            StoryreelError::validation(format!("no audio output device available: {e}"))
        })?;
        stream.log_on_drop(false);
        Ok(Self { stream, sink: None })
    }
}

impl AudioOutput for SpeakerOutput {
    fn start(&mut self, buffer: &MasterAudioBuffer, offset_secs: f64) -> StoryreelResult<()> {
        self.stop();
        let samples = buffer.samples_from_secs(offset_secs).to_vec();
        debug!(offset_secs, samples = samples.len(), "starting speaker output");
        let sink = Sink::connect_new(self.stream.mixer());
        sink.append(SamplesBuffer::new(
            buffer.channels(),
            buffer.sample_rate(),
            samples,
        ));
        sink.play();
        self.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn is_active(&self) -> bool {
        self.sink.as_ref().is_some_and(|s| !s.empty())
    }
}

impl Drop for SpeakerOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
