//! Serialized compiled-grammar artifacts.
//!
//! An artifact is an envelope of `{ abi_version, language }`. Loading
//! probes the version before decoding the payload, so an artifact compiled
//! by an incompatible version fails fast with
//! [`ArtifactError::VersionMismatch`] instead of parsing incorrectly.

use super::{Language, LanguageData};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Bump on any change to the shape of the compiled tables.
pub const ABI_VERSION: u32 = 3;

/// Errors loading or saving a compiled artifact. Fatal to loading; never
/// produced while parsing text.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The artifact was compiled under an incompatible ABI version.
    #[error("artifact ABI version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    /// The artifact bytes are not a well-formed envelope.
    #[error("malformed artifact: {0}")]
    Malformed(String),
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    abi_version: u32,
    language: &'a LanguageData,
}

#[derive(Deserialize)]
struct Envelope {
    abi_version: u32,
    language: LanguageData,
}

/// First pass: read only the version field, ignoring the payload.
#[derive(Deserialize)]
struct VersionProbe {
    abi_version: u32,
}

impl Language {
    /// Serialize the compiled tables as a versioned artifact.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        serde_json::to_vec(&EnvelopeRef {
            abi_version: ABI_VERSION,
            language: self.data(),
        })
        .map_err(|e| ArtifactError::Malformed(e.to_string()))
    }

    /// Load a compiled artifact produced by [`Language::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Language, ArtifactError> {
        let probe: VersionProbe = serde_json::from_slice(bytes)
            .map_err(|e| ArtifactError::Malformed(e.to_string()))?;
        if probe.abi_version != ABI_VERSION {
            return Err(ArtifactError::VersionMismatch {
                found: probe.abi_version,
                expected: ABI_VERSION,
            });
        }
        let envelope: Envelope = serde_json::from_slice(bytes)
            .map_err(|e| ArtifactError::Malformed(e.to_string()))?;
        debug!(
            states = envelope.language.table.state_count(),
            "loaded compiled artifact"
        );
        Ok(Language::from_data(envelope.language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GrammarBuilder, alt, tok};

    fn tiny() -> Language {
        let mut g = GrammarBuilder::new();
        g.token("word", "[a-z]+");
        g.rule("doc", [alt([tok("word")])]);
        Language::compile(g.build().unwrap()).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let language = tiny();
        let bytes = language.to_bytes().unwrap();
        let loaded = Language::from_bytes(&bytes).unwrap();
        assert_eq!(language, loaded);
    }

    #[test]
    fn test_version_mismatch() {
        let language = tiny();
        let mut value: serde_json::Value =
            serde_json::from_slice(&language.to_bytes().unwrap()).unwrap();
        value["abi_version"] = serde_json::json!(ABI_VERSION + 1);
        let bytes = serde_json::to_vec(&value).unwrap();
        let err = Language::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::VersionMismatch { found, expected }
                if found == ABI_VERSION + 1 && expected == ABI_VERSION
        ));
    }

    #[test]
    fn test_malformed_bytes() {
        assert!(matches!(
            Language::from_bytes(b"not json").unwrap_err(),
            ArtifactError::Malformed(_)
        ));
    }
}
