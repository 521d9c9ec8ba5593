use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A geocoded point in decimal degrees. Offices and tickets either carry
/// both coordinates or neither, so the pair travels as one value.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Office {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub coordinates: Option<Coordinates>,
}

impl Office {
    pub fn is_geocoded(&self) -> bool {
        self.coordinates.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Chief,
    Senior,
    Specialist,
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Chief => "chief",
            Self::Senior => "senior",
            Self::Specialist => "specialist",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manager {
    pub id: i64,
    pub name: String,
    pub position: Position,
    #[serde(default)]
    pub skills: Vec<String>,
    pub office_id: i64,
    #[serde(default)]
    pub current_load: u32,
}

impl Manager {
    pub fn has_skill(&self, tag: &str) -> bool {
        self.skills.iter().any(|s| s == tag)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Standard,
    Priority,
    Vip,
}

impl Segment {
    /// Premium tiers require VIP-skilled managers.
    pub fn is_premium(&self) -> bool {
        matches!(self, Self::Priority | Self::Vip)
    }
}

#[derive(Debug, Error)]
#[error("unknown segment: {0}")]
pub struct SegmentParseError(pub String);

impl FromStr for Segment {
    type Err = SegmentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "priority" => Ok(Self::Priority),
            "vip" => Ok(Self::Vip),
            _ => Err(SegmentParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub segment: Segment,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub house: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl Ticket {
    pub fn is_geocoded(&self) -> bool {
        self.coordinates.is_some()
    }
}

/// Classifier categories, fixed by the upstream analysis contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Complaint,
    DataChange,
    Consultation,
    Claim,
    AppOutage,
    Fraud,
    Spam,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// Detected ticket language. The codes double as manager skill tags, so the
/// wire form stays uppercase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    Ru,
    Kz,
    Eng,
}

impl Language {
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Ru => "RU",
            Self::Kz => "KZ",
            Self::Eng => "ENG",
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

#[derive(Debug, Error)]
#[error("unknown language code: {0}")]
pub struct LanguageParseError(pub String);

impl FromStr for Language {
    type Err = LanguageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RU" => Ok(Self::Ru),
            "KZ" => Ok(Self::Kz),
            "ENG" | "EN" => Ok(Self::Eng),
            _ => Err(LanguageParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub id: i64,
    pub ticket_id: i64,
    pub category: Category,
    pub sentiment: Sentiment,
    /// 1..=10, 10 is the most urgent.
    pub priority: u8,
    pub language: Language,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub ticket_id: i64,
    pub analysis_id: i64,
    pub manager_id: i64,
    pub office_id: i64,
    /// Ordered decision notes joined with " | " for audit.
    pub reason: String,
    pub assigned_at: DateTime<Utc>,
}

/// The in-memory collections the dispatcher and geocoder operate on. Loading
/// and durable persistence stay with the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub offices: Vec<Office>,
    #[serde(default)]
    pub managers: Vec<Manager>,
    #[serde(default)]
    pub tickets: Vec<Ticket>,
    #[serde(default)]
    pub analyses: Vec<AiAnalysis>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

impl Dataset {
    pub fn next_assignment_id(&self) -> i64 {
        self.assignments.iter().map(|a| a.id).max().unwrap_or(0) + 1
    }
}
