use crate::error::Result;
use crate::generator::GeneratedProfile;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Conventional download name of a generated bundle.
pub const ARCHIVE_FILENAME: &str = "farmer-profiles.zip";

/// Zip bundle of generated profiles. Entries are deflated at level 6 and stamped with a fixed
/// timestamp so the same profiles always produce the same archive.
pub struct ProfileArchive {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    entries: usize,
}

impl Default for ProfileArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileArchive {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(6))
                .last_modified_time(DateTime::default()),
            entries: 0,
        }
    }

    pub fn add(&mut self, filename: &str, bytes: &[u8]) -> Result<()> {
        self.writer.start_file(filename, self.options)?;
        self.writer.write_all(bytes)?;
        self.entries += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        Ok(self.writer.finish()?.into_inner())
    }

    pub fn from_profiles(profiles: &[GeneratedProfile]) -> Result<Vec<u8>> {
        let mut archive = Self::new();
        for profile in profiles {
            archive.add(&profile.filename, &profile.bytes)?;
        }
        archive.finish()
    }
}
