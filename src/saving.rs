use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Cursor, Write};
use std::path::Path;

use crate::spreadsheet::Workbook;
use crate::store::StoreError;

/// Writes the workbook as gzip-compressed bincode.
///
/// The file is written next to its destination first and renamed into place
/// so a failed save never truncates the previous copy.
pub fn save_workbook(workbook: &Workbook, filename: impl AsRef<Path>) -> std::io::Result<()> {
    let path = filename.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = path.with_extension("tmp");
    {
        let file = File::create(&tmp_path)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut writer = BufWriter::new(encoder);

        serialize_into(&mut writer, workbook)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        let encoder = writer.into_inner().map_err(|e| e.into_error())?;
        encoder.finish()?.flush()?;
    }
    fs::rename(&tmp_path, path)?;
    log::debug!("saved workbook to {}", path.display());
    Ok(())
}

pub fn load_workbook(filename: impl AsRef<Path>) -> std::io::Result<Workbook> {
    let file = File::open(filename)?;
    let decoder = GzDecoder::new(file);
    let mut reader = BufReader::new(decoder);

    let workbook: Workbook = deserialize_from(&mut reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    Ok(workbook)
}

/// Loads the workbook at `filename`, or builds a fresh one with `create`
/// when the file does not exist yet.
pub fn load_or_create(
    filename: impl AsRef<Path>,
    create: impl FnOnce() -> Result<Workbook, StoreError>,
) -> std::io::Result<Workbook> {
    let path = filename.as_ref();
    if path.exists() {
        load_workbook(path)
    } else {
        log::info!("no workbook at {}, starting a new one", path.display());
        create().map_err(std::io::Error::other)
    }
}

/// Serializes a workbook into an in-memory `.bin.gz` image.
pub fn workbook_to_bytes(workbook: &Workbook) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let encoder = GzEncoder::new(&mut buffer, Compression::default());
        let mut writer = BufWriter::new(encoder);

        serialize_into(&mut writer, workbook)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        let encoder = writer.into_inner().map_err(|e| e.into_error())?;
        encoder.finish()?;
    }
    Ok(buffer)
}

pub fn workbook_from_bytes(buffer: &[u8]) -> std::io::Result<Workbook> {
    let decoder = GzDecoder::new(Cursor::new(buffer));
    let mut reader = BufReader::new(decoder);

    deserialize_from(&mut reader).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
