use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::{BirthDate, Cpf};

/// INEP school code: eight ASCII alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchoolId(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("INEP code must have 8 alphanumeric characters, got '{0}'")]
pub struct SchoolIdError(pub String);

impl SchoolId {
    pub fn parse(raw: &str) -> Result<Self, SchoolIdError> {
        let code = raw.trim().to_ascii_uppercase();
        if code.len() == 8 && code.chars().all(|c| c.is_ascii_alphanumeric()) {
            Ok(Self(code))
        } else {
            Err(SchoolIdError(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SchoolId {
    type Error = SchoolIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SchoolId> for String {
    fn from(value: SchoolId) -> Self {
        value.0
    }
}

impl fmt::Display for SchoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Yearly running of the olympiad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Edition(pub i32);

impl Edition {
    pub fn previous(self) -> Self {
        Self(self.0 - 1)
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Competition tier a student sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Level {
    One,
    Two,
    Three,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("level must be 1, 2 or 3, got {0}")]
pub struct LevelError(pub i64);

impl Level {
    pub const ALL: [Level; 3] = [Level::One, Level::Two, Level::Three];

    pub const fn number(self) -> u8 {
        match self {
            Level::One => 1,
            Level::Two => 2,
            Level::Three => 3,
        }
    }
}

impl TryFrom<u8> for Level {
    type Error = LevelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Level::One),
            2 => Ok(Level::Two),
            3 => Ok(Level::Three),
            other => Err(LevelError(other as i64)),
        }
    }
}

impl From<Level> for u8 {
    fn from(value: Level) -> Self {
        value.number()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Outcome recorded on an enrollment once the edition is graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Award {
    #[default]
    None,
    Bronze,
    Silver,
    Gold,
    HonorableMention,
}

impl Award {
    pub const fn is_medal(self) -> bool {
        !matches!(self, Award::None)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Award::None => "none",
            Award::Bronze => "bronze",
            Award::Silver => "silver",
            Award::Gold => "gold",
            Award::HonorableMention => "honorable_mention",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Professor {
    pub id: Cpf,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: Cpf,
    pub name: String,
    pub birth_date: BirthDate,
    pub email: String,
}

/// Reference data loaded from the national school registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    pub city: String,
    pub zone: String,
    pub tier: String,
    pub code: String,
    pub phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Composite identity of an enrollment row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnrollmentKey {
    pub student: Cpf,
    pub professor: Cpf,
    pub school: SchoolId,
    pub edition: Edition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub student: Cpf,
    pub professor: Cpf,
    pub school: SchoolId,
    pub edition: Edition,
    pub level: Level,
    pub special_needs: String,
    #[serde(default)]
    pub award: Award,
}

impl Enrollment {
    pub fn key(&self) -> EnrollmentKey {
        EnrollmentKey {
            student: self.student.clone(),
            professor: self.professor.clone(),
            school: self.school.clone(),
            edition: self.edition,
        }
    }

    pub fn quota_key(&self) -> QuotaKey {
        QuotaKey {
            school: self.school.clone(),
            edition: self.edition,
            level: self.level,
        }
    }
}

/// Seats are capped per school, edition and level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QuotaKey {
    pub school: SchoolId,
    pub edition: Edition,
    pub level: Level,
}
