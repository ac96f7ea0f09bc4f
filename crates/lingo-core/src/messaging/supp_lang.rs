//! Supported-languages query and answer bodies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{MsgType, PROTOCOL_VERSION};

/// A supported-languages query. Carries no payload beyond the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppLangRequest {
    /// Protocol version of the sender.
    pub prot_ver: u32,
    /// Always [`MsgType::SuppLangReq`] on the wire.
    pub msg_type: i32,
}

impl SuppLangRequest {
    /// Creates a query with the current protocol version.
    pub fn new() -> Self {
        Self {
            prot_ver: PROTOCOL_VERSION,
            msg_type: MsgType::SuppLangReq.code(),
        }
    }
}

impl Default for SuppLangRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// The supported-languages answer: source name to target names.
///
/// Keys are held in a `BTreeMap` so that serializing the same language
/// set always yields byte-identical JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppLangResponse {
    /// Protocol version of the sender.
    pub prot_ver: u32,
    /// Always [`MsgType::SuppLangResp`] on the wire.
    pub msg_type: i32,
    /// Source language name to the list of reachable target names.
    #[serde(default)]
    pub languages: BTreeMap<String, Vec<String>>,
}

impl SuppLangResponse {
    /// Wraps a language map in a response envelope.
    pub fn new(languages: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            prot_ver: PROTOCOL_VERSION,
            msg_type: MsgType::SuppLangResp.code(),
            languages,
        }
    }

    /// Whether the pair is present in the map.
    pub fn supports(&self, source: &str, target: &str) -> bool {
        self.languages
            .get(source)
            .is_some_and(|targets| targets.iter().any(|t| t == target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_round_trips() {
        let mut languages = BTreeMap::new();
        languages.insert("en".to_string(), vec!["de".to_string(), "nl".to_string()]);
        let resp = SuppLangResponse::new(languages);
        let raw = serde_json::to_string(&resp).unwrap();
        let back: SuppLangResponse = serde_json::from_str(&raw).unwrap();
        assert!(back.supports("en", "nl"));
        assert!(back.supports("en", "de"));
        assert!(!back.supports("nl", "en"));
    }

    #[test]
    fn serialization_is_deterministic() {
        let mut a = BTreeMap::new();
        a.insert("nl".to_string(), vec!["en".to_string()]);
        a.insert("en".to_string(), vec!["nl".to_string()]);
        let first = serde_json::to_string(&SuppLangResponse::new(a.clone())).unwrap();
        let second = serde_json::to_string(&SuppLangResponse::new(a)).unwrap();
        assert_eq!(first, second);
    }
}
