// StreamingContainerWriter - reserve-then-patch WAV writer
//
// The header goes out first with a zero data length so samples can be
// appended while recording is still running. Once the total is known the two
// size fields are patched in place. Until `finalize` succeeds the file on disk
// holds valid PCM behind an invalid header; readers reject it rather than
// guessing the length.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use super::format::{
    AudioStreamConfig, ContainerHeader, CHUNK_SIZE_OFFSET, DATA_SIZE_OFFSET, RIFF_SIZE_OVERHEAD,
};
use crate::error::CaptureError;

/// Streaming writer for mono 16-bit PCM WAV containers
pub struct StreamingContainerWriter<W: Write + Seek = BufWriter<File>> {
    sink: W,
    config: AudioStreamConfig,
    data_bytes: u64,
    header_written: bool,
}

impl StreamingContainerWriter<BufWriter<File>> {
    /// Create (or truncate) the file at `path`
    ///
    /// # Errors
    /// `CaptureError::Io` if the file cannot be created
    pub fn open<P: AsRef<Path>>(path: P, config: AudioStreamConfig) -> Result<Self, CaptureError> {
        let file = File::create(path.as_ref()).map_err(|err| CaptureError::Io {
            details: format!("creating {}: {}", path.as_ref().display(), err),
        })?;
        Ok(Self::new(BufWriter::new(file), config))
    }
}

impl<W: Write + Seek> StreamingContainerWriter<W> {
    /// Wrap an arbitrary seekable sink
    pub fn new(sink: W, config: AudioStreamConfig) -> Self {
        Self {
            sink,
            config,
            data_bytes: 0,
            header_written: false,
        }
    }

    pub fn config(&self) -> &AudioStreamConfig {
        &self.config
    }

    /// PCM bytes appended so far
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    /// Write the 44-byte header with a zero data length
    ///
    /// Format fields are final at this point; only the two size fields are
    /// rewritten by [`finalize`](Self::finalize).
    pub fn write_header_placeholder(&mut self) -> Result<(), CaptureError> {
        let header = ContainerHeader::for_stream(&self.config, 0);
        self.sink.write_all(&header.to_bytes())?;
        self.header_written = true;
        Ok(())
    }

    /// Append raw PCM bytes verbatim
    ///
    /// # Returns
    /// Number of bytes accepted (always `bytes.len()` on success)
    pub fn append_pcm(&mut self, bytes: &[u8]) -> Result<usize, CaptureError> {
        if !self.header_written {
            return Err(CaptureError::Io {
                details: "append_pcm called before write_header_placeholder".to_string(),
            });
        }
        self.sink.write_all(bytes)?;
        self.data_bytes += bytes.len() as u64;
        Ok(bytes.len())
    }

    /// Patch both size fields and release the sink
    ///
    /// Seeks to offset 4 (data + 36) and offset 40 (data), rewrites them and
    /// flushes. Consuming `self` guarantees the handle is released once.
    ///
    /// # Errors
    /// `CaptureError::Io` on seek/write/flush failure, or when the length
    /// does not fit the 32-bit RIFF size fields.
    pub fn finalize(mut self, total_data_bytes: u64) -> Result<W, CaptureError> {
        if !self.header_written {
            return Err(CaptureError::Io {
                details: "finalize called before write_header_placeholder".to_string(),
            });
        }

        let data_len = u32::try_from(total_data_bytes)
            .ok()
            .filter(|len| len.checked_add(RIFF_SIZE_OVERHEAD).is_some())
            .ok_or_else(|| CaptureError::Io {
                details: format!(
                    "{} data bytes exceed the 32-bit RIFF size limit",
                    total_data_bytes
                ),
            })?;

        if total_data_bytes != self.data_bytes {
            tracing::warn!(
                "[ContainerWriter] Finalizing with {} bytes but {} were appended",
                total_data_bytes,
                self.data_bytes
            );
        }

        self.sink.seek(SeekFrom::Start(CHUNK_SIZE_OFFSET))?;
        self.sink
            .write_all(&(data_len + RIFF_SIZE_OVERHEAD).to_le_bytes())?;
        self.sink.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        self.sink.write_all(&data_len.to_le_bytes())?;
        self.sink.seek(SeekFrom::End(0))?;
        self.sink.flush()?;

        Ok(self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::HEADER_LEN;
    use std::io::Cursor;

    fn writer(sample_rate: u32) -> StreamingContainerWriter<Cursor<Vec<u8>>> {
        let config = AudioStreamConfig::mono_16bit(sample_rate).unwrap();
        StreamingContainerWriter::new(Cursor::new(Vec::new()), config)
    }

    #[test]
    fn test_placeholder_has_zero_data_length() {
        let mut writer = writer(16_000);
        writer.write_header_placeholder().unwrap();
        let bytes = writer.sink.get_ref().clone();

        assert_eq!(bytes.len(), HEADER_LEN);
        let header = ContainerHeader::parse(&bytes).unwrap();
        assert_eq!(header.data_len, 0);
        assert_eq!(header.chunk_size, 36);
        assert_eq!(header.byte_rate, 32_000);
    }

    #[test]
    fn test_finalize_patches_sizes_for_chunked_writes() {
        let mut writer = writer(8_000);
        writer.write_header_placeholder().unwrap();
        let chunks: [&[u8]; 3] = [&[1, 2, 3, 4], &[5, 6], &[7, 8, 9, 10, 11, 12]];
        let mut total = 0;
        for chunk in chunks {
            total += writer.append_pcm(chunk).unwrap();
        }
        assert_eq!(writer.data_bytes(), 12);

        let bytes = writer.finalize(total as u64).unwrap().into_inner();
        let header = ContainerHeader::parse(&bytes).unwrap();
        assert_eq!(header.chunk_size, 48);
        assert_eq!(header.data_len, 12);
        assert_eq!(&bytes[HEADER_LEN..], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_one_second_at_44100() {
        let mut writer = writer(44_100);
        writer.write_header_placeholder().unwrap();
        let chunk = vec![0u8; 4410];
        for _ in 0..20 {
            writer.append_pcm(&chunk).unwrap();
        }

        let bytes = writer.finalize(88_200).unwrap().into_inner();
        let header = ContainerHeader::parse(&bytes).unwrap();
        assert_eq!(header.chunk_size, 88_236);
        assert_eq!(header.data_len, 88_200);
        assert_eq!(header.byte_rate, 88_200);
        assert_eq!(header.block_align, 2);
        assert_eq!(bytes.len(), HEADER_LEN + 88_200);
    }

    #[test]
    fn test_append_before_header_is_rejected() {
        let mut writer = writer(16_000);
        assert!(matches!(
            writer.append_pcm(&[0, 0]),
            Err(CaptureError::Io { .. })
        ));
    }

    #[test]
    fn test_finalize_rejects_oversized_length() {
        let mut writer = writer(16_000);
        writer.write_header_placeholder().unwrap();
        assert!(writer.finalize(u32::MAX as u64).is_err());
    }

    #[test]
    fn test_open_fails_for_missing_directory() {
        let config = AudioStreamConfig::mono_16bit(16_000).unwrap();
        let result = StreamingContainerWriter::open("/nonexistent-dir/clip.wav", config);
        assert!(matches!(result, Err(CaptureError::Io { .. })));
    }
}
