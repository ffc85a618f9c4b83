//! Canonical JSON serialization and hashed model blobs
//!
//! Fitted models leave the process as an opaque blob: a canonical JSON
//! envelope carrying the model kind, a format version and the BLAKE3 hash of
//! the canonical model payload. Decoding re-derives the hash and refuses
//! blobs that do not match.

use serde::{de::DeserializeOwned, ser::Error as _, Serialize};
use serde_json::{map::Map, ser::PrettyFormatter, Serializer, Value};
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::errors::{ClvError, Result};
use crate::frequency::FrequencyModel;
use crate::monetary::MonetaryModel;

/// Version of the blob envelope layout
pub const FORMAT_VERSION: u32 = 1;

/// A model type that can travel as a blob
pub trait ModelBlob: Serialize + DeserializeOwned {
    /// Stable tag stored in the envelope
    const KIND: &'static str;
}

impl ModelBlob for FrequencyModel {
    const KIND: &'static str = "bg_nbd";
}

impl ModelBlob for MonetaryModel {
    const KIND: &'static str = "gamma_gamma";
}

/// Envelope around a serialized model
#[derive(Debug, Clone, PartialEq, serde::Deserialize, Serialize)]
pub struct ModelArtifact {
    pub kind: String,
    pub format_version: u32,
    pub model_hash: String,
    pub model: Value,
}

/// Sort object keys at every depth
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, val)| (key, canonicalize(val)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serialize a value as canonical JSON into `writer`
pub fn write_canonical_json<T, W>(mut writer: W, value: &T) -> std::result::Result<(), serde_json::Error>
where
    T: Serialize,
    W: Write,
{
    let canonical = canonicalize(serde_json::to_value(value)?);
    let mut serializer = Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"  "));
    canonical.serialize(&mut serializer)
}

/// Serialize a value as a canonical JSON string
pub fn canonical_json_string<T: Serialize>(value: &T) -> std::result::Result<String, serde_json::Error> {
    let mut buffer = Vec::new();
    write_canonical_json(&mut buffer, value)?;
    String::from_utf8(buffer).map_err(|err| serde_json::Error::custom(err.to_string()))
}

/// BLAKE3 hex digest of a model's canonical JSON
pub fn model_hash_hex<M: ModelBlob>(model: &M) -> Result<String> {
    let payload = canonical_json_string(model)?;
    Ok(hex::encode(blake3::hash(payload.as_bytes()).as_bytes()))
}

/// Encode a model as an opaque blob
pub fn encode_model<M: ModelBlob>(model: &M) -> Result<Vec<u8>> {
    let artifact = ModelArtifact {
        kind: M::KIND.to_string(),
        format_version: FORMAT_VERSION,
        model_hash: model_hash_hex(model)?,
        model: serde_json::to_value(model)?,
    };
    Ok(canonical_json_string(&artifact)?.into_bytes())
}

/// Decode a blob produced by [`encode_model`], verifying kind, version and hash
pub fn decode_model<M: ModelBlob>(bytes: &[u8]) -> Result<M> {
    let artifact: ModelArtifact = serde_json::from_slice(bytes)?;

    if artifact.kind != M::KIND {
        return Err(ClvError::ModelIntegrity(format!(
            "expected a {} model, blob holds {}",
            M::KIND,
            artifact.kind
        )));
    }
    if artifact.format_version != FORMAT_VERSION {
        return Err(ClvError::ModelIntegrity(format!(
            "unsupported blob format version {}",
            artifact.format_version
        )));
    }

    let payload = canonical_json_string(&artifact.model)?;
    let actual = hex::encode(blake3::hash(payload.as_bytes()).as_bytes());
    if actual != artifact.model_hash {
        return Err(ClvError::ModelIntegrity(format!(
            "hash mismatch: envelope {}, payload {}",
            artifact.model_hash, actual
        )));
    }

    Ok(serde_json::from_value(artifact.model)?)
}

/// Write a model blob to `path`, returning its model hash
pub fn save_model<M: ModelBlob>(path: &Path, model: &M) -> Result<String> {
    let blob = encode_model(model)?;
    std::fs::write(path, &blob)?;
    let hash = model_hash_hex(model)?;
    info!("Saved {} model to {} ({})", M::KIND, path.display(), hash);
    Ok(hash)
}

/// Read and verify a model blob from `path`
pub fn load_model<M: ModelBlob>(path: &Path) -> Result<M> {
    let bytes = std::fs::read(path)?;
    decode_model(&bytes)
}
