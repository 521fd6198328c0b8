//! PCM clips and the audio output seam.

use crate::error::VoiceError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mono or interleaved 16-bit PCM audio. Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    samples: Arc<[i16]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioClip {
    pub fn new(samples: impl Into<Arc<[i16]>>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Builds a clip from raw little-endian s16 bytes. A trailing odd byte is
    /// dropped.
    pub fn from_pcm_s16le(bytes: &[u8], sample_rate: u32, channels: u16) -> Self {
        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(samples, sample_rate, channels)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as f64 / f64::from(self.channels);
        Duration::from_secs_f64(frames / f64::from(self.sample_rate))
    }
}

/// Reads a 16-bit integer PCM WAV file.
pub fn read_wav(path: impl AsRef<Path>) -> Result<AudioClip, VoiceError> {
    let reader = hound::WavReader::open(path.as_ref())?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(VoiceError::Config(format!(
            "{}: expected 16-bit integer PCM, found {:?} at {} bits",
            path.as_ref().display(),
            spec.sample_format,
            spec.bits_per_sample
        )));
    }
    let samples = reader.into_samples::<i16>().collect::<Result<Vec<_>, _>>()?;
    Ok(AudioClip::new(samples, spec.sample_rate, spec.channels))
}

/// Writes a clip as a 16-bit integer PCM WAV file.
pub fn write_wav(path: impl AsRef<Path>, clip: &AudioClip) -> Result<(), VoiceError> {
    let spec = hound::WavSpec {
        channels: clip.channels(),
        sample_rate: clip.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path.as_ref(), spec)?;
    for &sample in clip.samples() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Where the agent's voice goes: a room track, a speaker, a file.
///
/// `play` resolves once the clip has been handed off completely. `stop` must
/// silence anything still queued and is safe to call when nothing plays.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, clip: &AudioClip) -> Result<(), VoiceError>;

    async fn stop(&self);
}

/// Writes every played clip to a numbered WAV file in a directory.
#[derive(Debug)]
pub struct WavDirSink {
    dir: PathBuf,
    next: AtomicU64,
}

impl WavDirSink {
    /// Creates the output directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, VoiceError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            next: AtomicU64::new(1),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl AudioSink for WavDirSink {
    async fn play(&self, clip: &AudioClip) -> Result<(), VoiceError> {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("{:04}.wav", seq));
        let clip = clip.clone();

        tracing::debug!(path = %path.display(), duration_ms = clip.duration().as_millis() as u64, "writing clip");

        tokio::task::spawn_blocking(move || write_wav(&path, &clip))
            .await
            .map_err(|e| VoiceError::Playback(format!("WAV writer task failed: {}", e)))?
    }

    async fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_bytes_decode_little_endian() {
        let clip = AudioClip::from_pcm_s16le(&[0x01, 0x00, 0xff, 0xff, 0x07], 16_000, 1);
        assert_eq!(clip.samples(), &[1, -1]);
    }

    #[test]
    fn duration_accounts_for_channels() {
        let clip = AudioClip::new(vec![0i16; 48_000], 24_000, 2);
        assert_eq!(clip.duration(), Duration::from_secs(1));
        assert_eq!(AudioClip::new(vec![0i16; 4], 0, 1).duration(), Duration::ZERO);
    }

    #[test]
    fn wav_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let clip = AudioClip::new(vec![0, 1000, -1000, i16::MAX], 22_050, 1);

        write_wav(&path, &clip).unwrap();
        assert_eq!(read_wav(&path).unwrap(), clip);
    }

    #[test]
    fn non_16_bit_wav_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(read_wav(&path), Err(VoiceError::Config(_))));
    }

    #[tokio::test]
    async fn wav_dir_sink_numbers_clips() {
        let dir = tempfile::tempdir().unwrap();
        let sink = WavDirSink::new(dir.path().join("out")).unwrap();
        let clip = AudioClip::new(vec![1, 2, 3], 16_000, 1);

        sink.play(&clip).await.unwrap();
        sink.play(&clip).await.unwrap();
        sink.stop().await;

        assert!(sink.dir().join("0001.wav").exists());
        assert!(sink.dir().join("0002.wav").exists());
    }
}
