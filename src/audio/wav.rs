// FileSource - WAV file acquisition via hound
//
// Accepts 16-bit integer PCM only, the same layout the capture device
// delivers. Multichannel files are reduced to their first channel.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hound::{SampleFormat, WavReader};

use super::source::AcquisitionSource;
use crate::error::AudioError;

/// WAV file acquisition source
pub struct FileSource {
    reader: WavReader<BufReader<File>>,
    sample_rate: u32,
    channels: usize,
    frames_read: u64,
}

impl FileSource {
    /// Open a WAV file for block reads
    ///
    /// # Returns
    /// * `Err(AudioError::FileOpenFailed)` - File missing or not a WAV file
    /// * `Err(AudioError::UnsupportedFormat)` - Not 16-bit integer PCM
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AudioError> {
        let path = path.as_ref();
        let reader = WavReader::open(path).map_err(|err| AudioError::FileOpenFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(AudioError::UnsupportedFormat {
                details: format!(
                    "{}: {:?} {}-bit samples, expected 16-bit integer PCM",
                    path.display(),
                    spec.sample_format,
                    spec.bits_per_sample
                ),
            });
        }

        tracing::info!(
            "[FileSource] Opened {} ({} Hz, {} channel(s), {} frames)",
            path.display(),
            spec.sample_rate,
            spec.channels,
            reader.duration()
        );

        Ok(Self {
            reader,
            sample_rate: spec.sample_rate,
            channels: spec.channels.max(1) as usize,
            frames_read: 0,
        })
    }

    /// Total frames in the file
    pub fn duration_frames(&self) -> u32 {
        self.reader.duration()
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl AcquisitionSource for FileSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buffer: &mut [i16]) -> Result<usize, AudioError> {
        let channels = self.channels;
        let mut frames = 0usize;
        let mut samples = self.reader.samples::<i16>();

        while frames < buffer.len() {
            let mut frame_first = None;
            for channel in 0..channels {
                match samples.next() {
                    Some(Ok(sample)) => {
                        if channel == 0 {
                            frame_first = Some(sample);
                        }
                    }
                    Some(Err(err)) => {
                        return Err(AudioError::ReadFailed {
                            reason: err.to_string(),
                        })
                    }
                    None => break,
                }
            }
            match frame_first {
                Some(sample) => {
                    buffer[frames] = sample;
                    frames += 1;
                }
                None => break,
            }
        }

        self.frames_read += frames as u64;
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, channels: u16, frames: &[Vec<i16>]) {
        let spec = WavSpec {
            channels,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for &sample in frame {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_reads_mono_in_blocks_until_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let frames: Vec<Vec<i16>> = (0..10).map(|i| vec![i as i16]).collect();
        write_wav(&path, 1, &frames);

        let mut source = FileSource::open(&path).unwrap();
        assert_eq!(source.sample_rate(), 48_000);
        assert_eq!(source.duration_frames(), 10);

        let mut block = [0i16; 4];
        assert_eq!(source.read(&mut block).unwrap(), 4);
        assert_eq!(block, [0, 1, 2, 3]);
        assert_eq!(source.read(&mut block).unwrap(), 4);
        assert_eq!(source.read(&mut block).unwrap(), 2);
        assert_eq!(&block[..2], &[8, 9]);
        assert_eq!(source.read(&mut block).unwrap(), 0);
        assert_eq!(source.frames_read(), 10);
    }

    #[test]
    fn test_stereo_keeps_first_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let frames: Vec<Vec<i16>> = (0..3).map(|i| vec![i as i16, -100]).collect();
        write_wav(&path, 2, &frames);

        let mut source = FileSource::open(&path).unwrap();
        let mut block = [0i16; 8];
        assert_eq!(source.read(&mut block).unwrap(), 3);
        assert_eq!(&block[..3], &[0, 1, 2]);
    }

    #[test]
    fn test_float_wav_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.25f32).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(
            FileSource::open(&path),
            Err(AudioError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_missing_file_fails_to_open() {
        assert!(matches!(
            FileSource::open("/no/such/recording.wav"),
            Err(AudioError::FileOpenFailed { .. })
        ));
    }
}
