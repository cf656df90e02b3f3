//! Judicial opinions

use crate::error::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Adjudicative role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Judge {
    /// Looks for gaps, risks and security problems
    Prosecutor,
    /// Looks for effort, intent and mitigating evidence
    Defense,
    /// Technical tie-breaker focused on architecture
    TechLead,
}

impl Judge {
    /// All roles in report order
    pub const ALL: [Self; 3] = [Self::Prosecutor, Self::Defense, Self::TechLead];

    /// Role weight for weighted criteria
    #[inline]
    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            Self::Prosecutor | Self::Defense => 0.25,
            Self::TechLead => 0.50,
        }
    }

    /// Label as it appears in model output and reports
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prosecutor => "Prosecutor",
            Self::Defense => "Defense",
            Self::TechLead => "TechLead",
        }
    }

    /// Key used for this role in rubric `judicial_logic`
    #[must_use]
    pub fn rubric_key(self) -> &'static str {
        match self {
            Self::Prosecutor => "prosecutor",
            Self::Defense => "defense",
            Self::TechLead => "tech_lead",
        }
    }
}

impl fmt::Display for Judge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Judge {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "").as_str() {
            "prosecutor" => Ok(Self::Prosecutor),
            "defense" | "defence" => Ok(Self::Defense),
            "techlead" => Ok(Self::TechLead),
            _ => Err(TypeError::UnknownJudge(s.to_string())),
        }
    }
}

/// Integer score within `[1, 5]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Score(u8);

impl Score {
    /// Lowest score
    pub const MIN: Self = Self(1);
    /// Highest score
    pub const MAX: Self = Self(5);

    /// Create a validated score
    ///
    /// # Errors
    /// Returns [`TypeError::ScoreOutOfRange`] outside `[1, 5]`.
    pub fn new(value: i64) -> Result<Self, TypeError> {
        match u8::try_from(value) {
            Ok(v @ 1..=5) => Ok(Self(v)),
            _ => Err(TypeError::ScoreOutOfRange(value)),
        }
    }

    /// Raw value
    #[inline]
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Value as float for aggregation
    #[inline]
    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }
}

impl TryFrom<i64> for Score {
    type Error = TypeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for i64 {
    fn from(value: Score) -> Self {
        i64::from(value.0)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One judge's score and argument for one criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudicialOpinion {
    /// Role that produced the opinion
    pub judge: Judge,
    /// Criterion being scored
    pub criterion_id: String,
    /// Raw score before citation validation
    pub score: Score,
    /// Free-text argument
    #[serde(default)]
    pub argument: String,
    /// Claimed citations, in the order the judge gave them
    #[serde(default)]
    pub cited_evidence: Vec<String>,
}

impl JudicialOpinion {
    /// Create an opinion without citations
    #[must_use]
    pub fn new(
        judge: Judge,
        criterion_id: impl Into<String>,
        score: Score,
        argument: impl Into<String>,
    ) -> Self {
        Self {
            judge,
            criterion_id: criterion_id.into(),
            score,
            argument: argument.into(),
            cited_evidence: Vec::new(),
        }
    }

    /// Replace the citations
    #[must_use]
    pub fn with_citations<I, S>(mut self, citations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cited_evidence = citations.into_iter().map(Into::into).collect();
        self
    }
}
