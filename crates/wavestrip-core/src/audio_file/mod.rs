//! RF64/WAV audio file handling
//!
//! Reads uncompressed PCM (16/24/32-bit integer or 32-bit float) mono or
//! stereo WAV and RF64 files block by block into deinterleaved [`PcmBuffer`]s.
//! Mono files are delivered as degenerate stereo (the single channel is
//! copied to both sides). Compressed formats are not decoded here; hosts that
//! already hold decoded audio can serve it through [`MemoryOpener`].

mod source;

pub use source::{AssetOpener, FrameSource, MemoryOpener, WavOpener};

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;

use crate::types::Sample;

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Audio file errors
#[derive(Error, Debug, Clone)]
pub enum AudioFileError {
    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),

    /// File couldn't be opened or read
    #[error("IO error: {0}")]
    Io(String),

    /// Invalid or unsupported file format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Only mono and stereo sources can be decimated
    #[error("Unsupported channel count: {0} (expected 1 or 2)")]
    UnsupportedChannelCount(u16),

    /// Unsupported bit depth
    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    /// Missing required chunk
    #[error("Missing required chunk: {0}")]
    MissingChunk(&'static str),

    /// File is corrupted or truncated
    #[error("File corrupted: {0}")]
    Corrupted(String),
}

impl From<std::io::Error> for AudioFileError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => AudioFileError::NotFound(e.to_string()),
            _ => AudioFileError::Io(e.to_string()),
        }
    }
}

/// Audio format information from the fmt chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    /// Number of channels (1 or 2)
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Bits per sample (16, 24, or 32)
    pub bits_per_sample: u16,
    /// Bytes per sample frame (channels * bits_per_sample / 8)
    pub block_align: u16,
    /// Audio format tag (1 = PCM, 3 = IEEE float), resolved through WAVE_FORMAT_EXTENSIBLE
    pub format_tag: u16,
}

impl AudioFormat {
    /// Check that frames in this format can be decoded
    pub fn is_supported(&self) -> Result<(), AudioFileError> {
        if self.channels != 1 && self.channels != 2 {
            return Err(AudioFileError::UnsupportedChannelCount(self.channels));
        }
        match (self.format_tag, self.bits_per_sample) {
            (WAVE_FORMAT_PCM, 16 | 24 | 32) | (WAVE_FORMAT_IEEE_FLOAT, 32) => {}
            (WAVE_FORMAT_PCM | WAVE_FORMAT_IEEE_FLOAT, bits) => {
                return Err(AudioFileError::UnsupportedBitDepth(bits));
            }
            (tag, _) => {
                return Err(AudioFileError::InvalidFormat(format!(
                    "Unsupported format tag 0x{:04X}",
                    tag
                )));
            }
        }
        let expected_align = self.channels * (self.bits_per_sample / 8);
        if self.block_align != expected_align {
            return Err(AudioFileError::Corrupted(format!(
                "block_align {} does not match {} channels x {} bits",
                self.block_align, self.channels, self.bits_per_sample
            )));
        }
        Ok(())
    }

    fn sample_decoder(&self) -> fn(&[u8]) -> Sample {
        match (self.format_tag, self.bits_per_sample) {
            (WAVE_FORMAT_IEEE_FLOAT, _) => decode_f32,
            (_, 16) => decode_i16,
            (_, 24) => decode_i24,
            _ => decode_i32,
        }
    }
}

fn decode_i16(b: &[u8]) -> Sample {
    const SCALE: f32 = 1.0 / 32768.0;
    i16::from_le_bytes([b[0], b[1]]) as f32 * SCALE
}

fn decode_i24(b: &[u8]) -> Sample {
    const SCALE: f32 = 1.0 / 8388608.0; // 2^23
    let val = (b[0] as i32) | ((b[1] as i32) << 8) | ((b[2] as i32) << 16);
    let val = if val & 0x800000 != 0 { val | !0xFFFFFF } else { val };
    val as f32 * SCALE
}

fn decode_i32(b: &[u8]) -> Sample {
    const SCALE: f32 = 1.0 / 2147483648.0; // 2^31
    i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 * SCALE
}

fn decode_f32(b: &[u8]) -> Sample {
    f32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

/// Deinterleaved two-channel frame buffer filled by readers
///
/// The capacity is fixed at construction; `frame_length` counts the valid
/// frames. Reduction runs in place, shrinking `frame_length` to the number of
/// output frames.
#[derive(Debug)]
pub struct PcmBuffer {
    left: Vec<Sample>,
    right: Vec<Sample>,
    frame_length: usize,
}

impl PcmBuffer {
    /// Allocate a buffer for `frames` stereo frames
    ///
    /// Returns `None` for a zero capacity or when the allocation fails.
    pub fn with_capacity(frames: usize) -> Option<Self> {
        if frames == 0 {
            return None;
        }
        let mut left = Vec::new();
        let mut right = Vec::new();
        left.try_reserve_exact(frames).ok()?;
        right.try_reserve_exact(frames).ok()?;
        left.resize(frames, 0.0);
        right.resize(frames, 0.0);
        Some(Self {
            left,
            right,
            frame_length: 0,
        })
    }

    /// Build a buffer holding exactly the given channel data
    pub fn from_channels(left: Vec<Sample>, right: Vec<Sample>) -> Self {
        assert_eq!(left.len(), right.len(), "Channel lengths must match");
        let frame_length = left.len();
        Self {
            left,
            right,
            frame_length,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.left.len()
    }

    #[inline]
    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    /// Set the number of valid frames (clamped to capacity)
    #[inline]
    pub fn set_frame_length(&mut self, frames: usize) {
        self.frame_length = frames.min(self.capacity());
    }

    /// Valid frames of both channels
    #[inline]
    pub fn channels(&self) -> (&[Sample], &[Sample]) {
        (&self.left[..self.frame_length], &self.right[..self.frame_length])
    }

    /// Both channels over the full capacity, for writers
    #[inline]
    pub fn channels_mut(&mut self) -> (&mut [Sample], &mut [Sample]) {
        (&mut self.left, &mut self.right)
    }
}

/// WAV/RF64 file reader
pub struct AudioFileReader {
    reader: BufReader<File>,
    format: AudioFormat,
    data_offset: u64,
    data_size: u64,
    /// Current frame position within the data chunk
    position: u64,
    /// Raw bytes of the block being decoded
    scratch: Vec<u8>,
}

impl AudioFileReader {
    /// Open an audio file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AudioFileError> {
        let file = File::open(path.as_ref())?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        // Read RIFF/RF64 header
        let mut riff_id = [0u8; 4];
        reader.read_exact(&mut riff_id)?;

        let is_rf64 = match &riff_id {
            b"RIFF" => false,
            b"RF64" => true,
            _ => return Err(AudioFileError::InvalidFormat("Not a RIFF/RF64 file".into())),
        };

        // File size (placeholder for RF64)
        let mut size_bytes = [0u8; 4];
        reader.read_exact(&mut size_bytes)?;

        let mut wave_id = [0u8; 4];
        reader.read_exact(&mut wave_id)?;
        if &wave_id != b"WAVE" {
            return Err(AudioFileError::InvalidFormat("Not a WAVE file".into()));
        }

        // For RF64, the ds64 chunk comes first and carries the real data size
        let mut rf64_data_size: Option<u64> = None;
        if is_rf64 {
            let mut chunk_id = [0u8; 4];
            reader.read_exact(&mut chunk_id)?;

            if &chunk_id == b"ds64" {
                let mut chunk_size = [0u8; 4];
                reader.read_exact(&mut chunk_size)?;
                let chunk_size = u32::from_le_bytes(chunk_size);

                let mut ds64_data = vec![0u8; chunk_size as usize];
                reader.read_exact(&mut ds64_data)?;

                if ds64_data.len() >= 16 {
                    // Skip riff_size (8 bytes), read data_size (8 bytes)
                    let mut data_size_bytes = [0u8; 8];
                    data_size_bytes.copy_from_slice(&ds64_data[8..16]);
                    rf64_data_size = Some(u64::from_le_bytes(data_size_bytes));
                }
                if chunk_size % 2 != 0 {
                    reader.seek(SeekFrom::Current(1))?;
                }
            } else {
                reader.seek(SeekFrom::Current(-4))?;
            }
        }

        let mut format: Option<AudioFormat> = None;
        let mut data: Option<(u64, u64)> = None;

        while format.is_none() || data.is_none() {
            let mut chunk_id = [0u8; 4];
            if reader.read_exact(&mut chunk_id).is_err() {
                break;
            }

            let mut chunk_size_bytes = [0u8; 4];
            reader.read_exact(&mut chunk_size_bytes)?;
            let chunk_size = u32::from_le_bytes(chunk_size_bytes);

            // Bytes left to skip, including the pad byte of odd-sized chunks
            let skip = match &chunk_id {
                b"fmt " => {
                    format = Some(Self::read_fmt_chunk(&mut reader, chunk_size)?);
                    chunk_size as u64 % 2
                }
                b"data" => {
                    let offset = reader.stream_position()?;
                    let size = rf64_data_size.unwrap_or(chunk_size as u64);
                    data = Some((offset, size));
                    size + size % 2
                }
                _ => chunk_size as u64 + chunk_size as u64 % 2,
            };

            if skip > 0 && (format.is_none() || data.is_none()) {
                reader.seek(SeekFrom::Current(skip as i64))?;
            }
        }

        let format = format.ok_or(AudioFileError::MissingChunk("fmt"))?;
        let (data_offset, mut data_size) = data.ok_or(AudioFileError::MissingChunk("data"))?;

        format.is_supported()?;

        let available = file_len.saturating_sub(data_offset);
        if data_size > available {
            log::warn!(
                "AudioFileReader::open: data chunk claims {} bytes but only {} remain, truncating",
                data_size,
                available
            );
            data_size = available;
        }

        let mut this = Self {
            reader,
            format,
            data_offset,
            data_size,
            position: 0,
            scratch: Vec::new(),
        };
        this.seek(0)?;
        Ok(this)
    }

    /// Read the fmt chunk
    fn read_fmt_chunk(reader: &mut BufReader<File>, size: u32) -> Result<AudioFormat, AudioFileError> {
        if size < 16 {
            return Err(AudioFileError::Corrupted("fmt chunk too small".into()));
        }

        let mut fmt_data = vec![0u8; size as usize];
        reader.read_exact(&mut fmt_data)?;

        let mut format_tag = u16::from_le_bytes([fmt_data[0], fmt_data[1]]);
        let channels = u16::from_le_bytes([fmt_data[2], fmt_data[3]]);
        let sample_rate = u32::from_le_bytes([fmt_data[4], fmt_data[5], fmt_data[6], fmt_data[7]]);
        let block_align = u16::from_le_bytes([fmt_data[12], fmt_data[13]]);
        let bits_per_sample = u16::from_le_bytes([fmt_data[14], fmt_data[15]]);

        // WAVE_FORMAT_EXTENSIBLE: the real tag leads the sub-format GUID
        if format_tag == WAVE_FORMAT_EXTENSIBLE {
            if fmt_data.len() < 26 {
                return Err(AudioFileError::Corrupted("extensible fmt chunk too small".into()));
            }
            format_tag = u16::from_le_bytes([fmt_data[24], fmt_data[25]]);
        }

        Ok(AudioFormat {
            format_tag,
            channels,
            sample_rate,
            bits_per_sample,
            block_align,
        })
    }

    /// Get the audio format
    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Get the number of sample frames in the file
    pub fn frame_count(&self) -> u64 {
        self.data_size / self.format.block_align as u64
    }

    /// Get the duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.format.sample_rate as f64
    }

    /// Current frame position
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move to a frame position (clamped to the end of the data)
    pub fn seek(&mut self, frame: u64) -> Result<(), AudioFileError> {
        let frame = frame.min(self.frame_count());
        let byte_offset = self.data_offset + frame * self.format.block_align as u64;
        self.reader.seek(SeekFrom::Start(byte_offset))?;
        self.position = frame;
        Ok(())
    }

    /// Read up to `count` frames from the current position into `buffer`
    ///
    /// Returns the number of frames actually read, which is smaller than
    /// `count` at the end of the file or when `buffer` is too small.
    pub fn read_frames(&mut self, buffer: &mut PcmBuffer, count: usize) -> Result<usize, AudioFileError> {
        let remaining = self.frame_count().saturating_sub(self.position);
        let count = count.min(buffer.capacity()).min(remaining as usize);
        buffer.set_frame_length(0);
        if count == 0 {
            return Ok(0);
        }

        let block_align = self.format.block_align as usize;
        let byte_count = count * block_align;
        self.scratch.resize(byte_count, 0);
        self.reader.read_exact(&mut self.scratch[..byte_count])?;

        let decode = self.format.sample_decoder();
        let sample_bytes = (self.format.bits_per_sample / 8) as usize;
        let stereo = self.format.channels == 2;
        let (left, right) = buffer.channels_mut();

        for (i, frame) in self.scratch[..byte_count].chunks_exact(block_align).enumerate() {
            let l = decode(&frame[..sample_bytes]);
            left[i] = l;
            right[i] = if stereo { decode(&frame[sample_bytes..2 * sample_bytes]) } else { l };
        }

        buffer.set_frame_length(count);
        self.position += count as u64;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    fn write_wav(path: &Path, spec: hound::WavSpec, frames: &[(f32, f32)]) {
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let mut write = |s: f32| match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, _) => writer.write_sample(s).unwrap(),
            (_, 16) => writer.write_sample((s * 32767.0) as i16).unwrap(),
            (_, 24) => writer.write_sample((s * 8_388_607.0) as i32).unwrap(),
            _ => writer.write_sample((s as f64 * 2_147_483_647.0) as i32).unwrap(),
        };
        for &(l, r) in frames {
            write(l);
            if spec.channels == 2 {
                write(r);
            }
        }
        writer.finalize().unwrap();
    }

    fn ramp_frames(len: usize) -> Vec<(f32, f32)> {
        (0..len)
            .map(|i| {
                let v = (i as f32 / len as f32) - 0.5;
                (v, -v)
            })
            .collect()
    }

    fn fixture(dir: &tempfile::TempDir, name: &str, spec: hound::WavSpec, frames: &[(f32, f32)]) -> PathBuf {
        let path = dir.path().join(name);
        write_wav(&path, spec, frames);
        path
    }

    #[test]
    fn test_read_stereo_float() {
        let dir = tempfile::tempdir().unwrap();
        let frames = ramp_frames(1000);
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let path = fixture(&dir, "float.wav", spec, &frames);

        let mut reader = AudioFileReader::open(&path).unwrap();
        assert_eq!(reader.frame_count(), 1000);
        assert_eq!(reader.format().sample_rate, 44100);
        assert_eq!(reader.format().format_tag, WAVE_FORMAT_IEEE_FLOAT);

        let mut buffer = PcmBuffer::with_capacity(1000).unwrap();
        let read = reader.read_frames(&mut buffer, 1000).unwrap();
        assert_eq!(read, 1000);

        let (left, right) = buffer.channels();
        for (i, &(l, r)) in frames.iter().enumerate() {
            assert_eq!(left[i], l);
            assert_eq!(right[i], r);
        }
    }

    #[test]
    fn test_read_stereo_16bit_with_seek() {
        let dir = tempfile::tempdir().unwrap();
        let frames = ramp_frames(512);
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let path = fixture(&dir, "int16.wav", spec, &frames);

        let mut reader = AudioFileReader::open(&path).unwrap();
        reader.seek(256).unwrap();
        assert_eq!(reader.position(), 256);

        let mut buffer = PcmBuffer::with_capacity(8).unwrap();
        assert_eq!(reader.read_frames(&mut buffer, 8).unwrap(), 8);

        let (left, right) = buffer.channels();
        for i in 0..8 {
            let (l, r) = frames[256 + i];
            assert!((left[i] - l).abs() < 1.0 / 16384.0);
            assert!((right[i] - r).abs() < 1.0 / 16384.0);
        }
    }

    #[test]
    fn test_mono_24bit_reads_as_degenerate_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let frames: Vec<(f32, f32)> = (0..64).map(|i| (i as f32 / 128.0, 0.0)).collect();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 24,
            sample_format: hound::SampleFormat::Int,
        };
        let path = fixture(&dir, "mono24.wav", spec, &frames);

        let mut reader = AudioFileReader::open(&path).unwrap();
        assert_eq!(reader.format().channels, 1);
        assert_eq!(reader.frame_count(), 64);

        let mut buffer = PcmBuffer::with_capacity(64).unwrap();
        reader.read_frames(&mut buffer, 64).unwrap();
        let (left, right) = buffer.channels();
        assert_eq!(left, right);
        assert!((left[32] - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_short_read_at_end_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let path = fixture(&dir, "short.wav", spec, &ramp_frames(100));

        let mut reader = AudioFileReader::open(&path).unwrap();
        reader.seek(90).unwrap();
        let mut buffer = PcmBuffer::with_capacity(64).unwrap();
        assert_eq!(reader.read_frames(&mut buffer, 64).unwrap(), 10);
        assert_eq!(buffer.frame_length(), 10);
        assert_eq!(reader.read_frames(&mut buffer, 64).unwrap(), 0);
        assert_eq!(buffer.frame_length(), 0);

        // Seeking past the end clamps to the end
        reader.seek(10_000).unwrap();
        assert_eq!(reader.position(), 100);
    }

    #[test]
    fn test_rejects_non_riff_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"this is not a wave file at all").unwrap();

        assert!(matches!(
            AudioFileReader::open(&path),
            Err(AudioFileError::InvalidFormat(_))
        ));
        assert!(matches!(
            AudioFileReader::open(dir.path().join("missing.wav")),
            Err(AudioFileError::NotFound(_))
        ));
    }

    #[test]
    fn test_rejects_multichannel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.wav");
        let spec = hound::WavSpec {
            channels: 4,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..16 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        assert!(matches!(
            AudioFileReader::open(&path),
            Err(AudioFileError::UnsupportedChannelCount(4))
        ));
    }

    #[test]
    fn test_format_support_matrix() {
        let base = AudioFormat {
            format_tag: WAVE_FORMAT_PCM,
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            block_align: 4,
        };
        assert!(base.is_supported().is_ok());

        let float16 = AudioFormat {
            format_tag: WAVE_FORMAT_IEEE_FLOAT,
            ..base.clone()
        };
        assert!(matches!(
            float16.is_supported(),
            Err(AudioFileError::UnsupportedBitDepth(16))
        ));

        let bad_align = AudioFormat {
            block_align: 6,
            ..base.clone()
        };
        assert!(matches!(bad_align.is_supported(), Err(AudioFileError::Corrupted(_))));

        let adpcm = AudioFormat {
            format_tag: 0x0002,
            ..base
        };
        assert!(matches!(adpcm.is_supported(), Err(AudioFileError::InvalidFormat(_))));
    }

    #[test]
    fn test_pcm_buffer_rejects_zero_capacity() {
        assert!(PcmBuffer::with_capacity(0).is_none());
        let mut buffer = PcmBuffer::with_capacity(4).unwrap();
        buffer.set_frame_length(10);
        assert_eq!(buffer.frame_length(), 4);
    }
}
