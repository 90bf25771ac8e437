//! Avatar growth and per-agent avatar profiles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthStage {
    Seed,
    Sprout,
    Bloom,
    Radiant,
}

impl GrowthStage {
    pub fn from_count(answers: u32) -> Self {
        match answers {
            0..=4 => GrowthStage::Seed,
            5..=19 => GrowthStage::Sprout,
            20..=49 => GrowthStage::Bloom,
            _ => GrowthStage::Radiant,
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            GrowthStage::Seed => "·",
            GrowthStage::Sprout => "✦",
            GrowthStage::Bloom => "✿",
            GrowthStage::Radiant => "☀",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GrowthStage::Seed => "Seed",
            GrowthStage::Sprout => "Sprout",
            GrowthStage::Bloom => "Bloom",
            GrowthStage::Radiant => "Radiant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarShape {
    Orb,
    Square,
    Diamond,
    Hexagon,
}

impl AvatarShape {
    const ALL: [AvatarShape; 4] = [
        AvatarShape::Orb,
        AvatarShape::Square,
        AvatarShape::Diamond,
        AvatarShape::Hexagon,
    ];

    pub fn glyph(&self) -> &'static str {
        match self {
            AvatarShape::Orb => "●",
            AvatarShape::Square => "■",
            AvatarShape::Diamond => "◆",
            AvatarShape::Hexagon => "⬢",
        }
    }

    pub fn next(&self) -> Self {
        let i = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

const PALETTE: [&str; 6] = ["#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6", "#ec4899"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarProfile {
    pub shape: AvatarShape,
    pub color: String,
}

impl AvatarProfile {
    /// Stable default for an agent, so it looks the same on every launch.
    pub fn default_for(specialty: &str) -> Self {
        let hash = specialty
            .bytes()
            .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
        Self {
            shape: AvatarShape::ALL[(hash % AvatarShape::ALL.len() as u32) as usize],
            color: PALETTE[((hash >> 8) % PALETTE.len() as u32) as usize].to_string(),
        }
    }
}

/// User overrides, persisted as one JSON object keyed by specialty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarProfiles(BTreeMap<String, AvatarProfile>);

impl AvatarProfiles {
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|s| serde_json::from_str(s).ok()).unwrap_or_default()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn get(&self, specialty: &str) -> AvatarProfile {
        self.0
            .get(specialty)
            .cloned()
            .unwrap_or_else(|| AvatarProfile::default_for(specialty))
    }

    pub fn set(&mut self, specialty: &str, profile: AvatarProfile) {
        self.0.insert(specialty.to_string(), profile);
    }
}
