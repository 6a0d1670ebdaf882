//! Controller message protocol
//!
//! This module provides:
//! - Versioned message grammars and a registry to look them up by name
//! - Incremental UTF-8 decoding of raw serial chunks
//! - The scanning buffer that turns decoded text into area events

pub mod decode;
pub mod grammar;
pub mod scan;

pub use decode::ChunkDecoder;
pub use grammar::MessageGrammar;
pub use scan::{AreaEvent, IngestBuffer};

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Grammar spoken by the original controller firmware
pub static GRAMMAR_V1: Lazy<MessageGrammar> = Lazy::new(|| MessageGrammar {
    id: "v1".to_string(),
    description: "Fire panel firmware: SMS alarm notices and global reset".to_string(),
    reset_phrase: "Fire cleared, system reset to normal.".to_string(),
    alarm_prefix: "Sending SMS: Fire detected in area ".to_string(),
});

/// Registry of built-in grammars
pub static GRAMMARS: Lazy<HashMap<&'static str, &'static MessageGrammar>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("v1", &*GRAMMAR_V1);
    m.insert("default", &*GRAMMAR_V1);
    m
});

/// Get a grammar by name
pub fn get_grammar(name: &str) -> Option<&'static MessageGrammar> {
    GRAMMARS.get(name.to_lowercase().as_str()).copied()
}

/// Grammar ids only (aliases removed)
pub fn grammar_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = GRAMMARS.values().map(|g| g.id.as_str()).collect();
    names.sort();
    names.dedup();
    names
}
