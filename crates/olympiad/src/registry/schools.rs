use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::domain::{School, SchoolId, SchoolIdError};

#[derive(Debug, thiserror::Error)]
pub enum SchoolImportError {
    #[error("failed to read school registry: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid school registry CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {source}")]
    InvalidCode { row: usize, source: SchoolIdError },
}

/// Loads the school reference table from a registry CSV export.
pub struct SchoolImporter;

impl SchoolImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<School>, SchoolImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<School>, SchoolImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut schools = Vec::new();

        for (index, record) in csv_reader.deserialize::<SchoolRow>().enumerate() {
            let row = record?;
            let id = SchoolId::parse(&row.inep).map_err(|source| SchoolImportError::InvalidCode {
                row: index + 2,
                source,
            })?;

            schools.push(School {
                id,
                name: row.name,
                city: row.city,
                zone: row.zone,
                tier: row.tier,
                code: row.code,
                phone: row.phone,
                latitude: row.latitude,
                longitude: row.longitude,
            });
        }

        Ok(schools)
    }
}

#[derive(Debug, Deserialize)]
struct SchoolRow {
    inep: String,
    name: String,
    city: String,
    zone: String,
    tier: String,
    code: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    phone: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
