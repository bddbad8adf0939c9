// src/query.rs
//! Query normalization and instrument categorization.
//!
//! The normalized form is the cache key: two raw descriptions that normalize
//! identically share one cache entry, so noise tokens (case/bag/condition
//! qualifiers) must not leak into it.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

fn re(cell: &'static OnceCell<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// Normalize an item description into a cache key: strip accessory and
/// condition noise, lowercase, collapse whitespace.
pub fn normalize_query(raw: &str) -> String {
    static RE_CASE: OnceCell<Regex> = OnceCell::new();
    static RE_BAG: OnceCell<Regex> = OnceCell::new();
    static RE_NOISE: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();

    let mut out = raw.to_string();
    out = re(&RE_CASE, r"(?i)w/\s*(?:hardshell|chipboard)?\s*case")
        .replace_all(&out, " ")
        .into_owned();
    out = re(&RE_BAG, r"(?i)w/\s*(?:gig\s*)?bag")
        .replace_all(&out, " ")
        .into_owned();
    out = re(&RE_NOISE, r"(?i)\b(?:nos|new|retail)\b")
        .replace_all(&out, " ")
        .into_owned();
    out = out.to_lowercase();
    out = re(&RE_WS, r"\s+").replace_all(&out, " ").into_owned();
    out.trim().to_string()
}

/// Coarse instrument category derived from the item description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentCategory {
    ElectricGuitar,
    AcousticGuitar,
    BassGuitar,
    Amplifier,
    EffectsPedal,
    Ukulele,
    Banjo,
    Mandolin,
    Percussion,
    Other,
}

impl InstrumentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentCategory::ElectricGuitar => "Electric Guitar",
            InstrumentCategory::AcousticGuitar => "Acoustic Guitar",
            InstrumentCategory::BassGuitar => "Bass Guitar",
            InstrumentCategory::Amplifier => "Amplifier",
            InstrumentCategory::EffectsPedal => "Effects Pedal",
            InstrumentCategory::Ukulele => "Ukulele",
            InstrumentCategory::Banjo => "Banjo",
            InstrumentCategory::Mandolin => "Mandolin",
            InstrumentCategory::Percussion => "Percussion",
            InstrumentCategory::Other => "Other",
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Keyword classifier over a raw or normalized description.
pub fn categorize(description: &str) -> InstrumentCategory {
    let d = description.to_lowercase();

    if contains_any(&d, &["guitar", "stratocaster", "telecaster", "les paul", "sg "]) {
        if d.contains("bass") {
            InstrumentCategory::BassGuitar
        } else if d.contains("acoustic") || d.contains("parlor") {
            InstrumentCategory::AcousticGuitar
        } else {
            InstrumentCategory::ElectricGuitar
        }
    } else if d.contains("bass") {
        InstrumentCategory::BassGuitar
    } else if contains_any(&d, &["amp", "amplifier"]) {
        InstrumentCategory::Amplifier
    } else if contains_any(&d, &["pedal", "overdrive", "distortion", "delay", "effect"]) {
        InstrumentCategory::EffectsPedal
    } else if contains_any(&d, &["ukulele", "uke"]) {
        InstrumentCategory::Ukulele
    } else if d.contains("banjo") {
        InstrumentCategory::Banjo
    } else if d.contains("mandolin") {
        InstrumentCategory::Mandolin
    } else if contains_any(&d, &["conga", "drum", "percussion", "cajon"]) {
        InstrumentCategory::Percussion
    } else {
        InstrumentCategory::Other
    }
}
