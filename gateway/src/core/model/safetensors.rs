//! In-place editing of the safetensors header
//!
//! A safetensors file starts with an 8-byte little-endian header length,
//! followed by a JSON header and the raw tensor data. Only the header is
//! rewritten here; the tensor bytes are streamed through unchanged.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde_json::{Map, Value};

use super::converter::ConvertError;

const METADATA_KEY: &str = "__metadata__";

/// Headers larger than this are rejected as corrupt
const MAX_HEADER_LEN: u64 = 100 * 1024 * 1024;

fn read_header(path: &Path, reader: &mut impl Read) -> Result<Map<String, Value>, ConvertError> {
    let mut len_bytes = [0u8; 8];
    reader
        .read_exact(&mut len_bytes)
        .map_err(|e| ConvertError::io(path, e))?;

    let header_len = u64::from_le_bytes(len_bytes);
    if header_len > MAX_HEADER_LEN {
        return Err(ConvertError::header(
            path,
            format!("header length {header_len} exceeds the {MAX_HEADER_LEN} byte limit"),
        ));
    }

    let mut header_bytes = vec![0u8; header_len as usize];
    reader
        .read_exact(&mut header_bytes)
        .map_err(|e| ConvertError::io(path, e))?;

    serde_json::from_slice(&header_bytes).map_err(|e| ConvertError::header(path, e.to_string()))
}

/// Read the string metadata stored under `__metadata__`
pub fn read_metadata(path: &Path) -> Result<BTreeMap<String, String>, ConvertError> {
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    let header = read_header(path, &mut BufReader::new(file))?;

    let mut metadata = BTreeMap::new();
    if let Some(Value::Object(entries)) = header.get(METADATA_KEY) {
        for (key, value) in entries {
            if let Value::String(value) = value {
                metadata.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(metadata)
}

/// Merge `metadata` into the header's `__metadata__` map.
///
/// The rewritten file replaces the original atomically, so readers never
/// observe a half-written header.
pub fn tag_metadata(path: &Path, metadata: &BTreeMap<String, String>) -> Result<(), ConvertError> {
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut header = read_header(path, &mut reader)?;

    let entry = header
        .entry(METADATA_KEY)
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(existing) = entry else {
        return Err(ConvertError::header(path, "__metadata__ is not an object"));
    };
    for (key, value) in metadata {
        existing.insert(key.clone(), Value::String(value.clone()));
    }

    let mut encoded =
        serde_json::to_vec(&header).map_err(|e| ConvertError::header(path, e.to_string()))?;
    // Tensor data must stay 8-byte aligned.
    while encoded.len() % 8 != 0 {
        encoded.push(b' ');
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| ConvertError::io(dir, e))?;
    write_rewritten(staged.as_file(), &encoded, &mut reader)
        .map_err(|e| ConvertError::io(staged.path(), e))?;

    staged
        .persist(path)
        .map_err(|e| ConvertError::io(path, e.error))?;
    Ok(())
}

fn write_rewritten(out: &File, header: &[u8], tensors: &mut impl Read) -> std::io::Result<()> {
    let mut writer = BufWriter::new(out);
    writer.write_all(&(header.len() as u64).to_le_bytes())?;
    writer.write_all(header)?;
    std::io::copy(tensors, &mut writer)?;
    writer.flush()
}
