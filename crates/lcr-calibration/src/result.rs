use crate::{CalibrationError, Result};
use serde::{Deserialize, Serialize};
use servo_bus::codec::{apply_configuration, to_signed};
use std::fs;
use std::path::Path;
use time::OffsetDateTime;

/// What a calibration run produced, one entry per motor in layout order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalibrationOutcome {
    pub motor_ids: Vec<u8>,
    pub homing_offset: Vec<Option<i32>>,
    pub inverted: Vec<Option<bool>>,
}

impl CalibrationOutcome {
    /// Motors for which no offset or direction could be determined.
    pub fn missing(&self) -> Vec<u8> {
        self.motor_ids
            .iter()
            .zip(self.homing_offset.iter().zip(&self.inverted))
            .filter(|(_, (offset, flip))| offset.is_none() || flip.is_none())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// A usable result, or the first motor that was never read.
    pub fn into_result(self) -> Result<CalibrationResult> {
        if let Some(id) = self.missing().first() {
            return Err(CalibrationError::MissingJoint(*id));
        }
        Ok(CalibrationResult {
            motor_ids: self.motor_ids,
            homing_offset: self.homing_offset.into_iter().flatten().collect(),
            inverted: self.inverted.into_iter().flatten().collect(),
            calibrated_at: OffsetDateTime::now_utc(),
        })
    }
}

/// Per-motor homing offsets and inversion flags for runtime control.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct CalibrationResult {
    pub motor_ids: Vec<u8>,
    pub homing_offset: Vec<i32>,
    pub inverted: Vec<bool>,
    #[serde(with = "time::serde::rfc3339")]
    pub calibrated_at: OffsetDateTime,
}

impl CalibrationResult {
    /// Signed joint positions for raw readings taken in layout order.
    pub fn apply(&self, raw: &[Option<u32>]) -> Vec<Option<i32>> {
        to_signed(&apply_configuration(raw, &self.homing_offset, &self.inverted))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| CalibrationError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CalibrationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let result: Self = serde_json::from_str(&raw)?;
        result.check_lengths()?;
        Ok(result)
    }

    fn check_lengths(&self) -> Result<()> {
        let n = self.motor_ids.len();
        if self.homing_offset.len() != n || self.inverted.len() != n {
            return Err(CalibrationError::Parse(format!(
                "{} motors, {} offsets, {} flags",
                n,
                self.homing_offset.len(),
                self.inverted.len()
            )));
        }
        Ok(())
    }

    /// Two-line text form, e.g. for pasting into another tool's config.
    pub fn to_text(&self) -> String {
        let offsets: Vec<String> = self.homing_offset.iter().map(i32::to_string).collect();
        let flags: Vec<String> = self.inverted.iter().map(bool::to_string).collect();
        format!(
            "HOMING_OFFSET: {}\nINVERTED: {}\n",
            offsets.join(" "),
            flags.join(" ")
        )
    }

    /// Parse the text form. Flags are case-insensitive so `True`/`False` work.
    pub fn parse_text(text: &str, motor_ids: &[u8]) -> Result<Self> {
        let mut homing_offset = None;
        let mut inverted = None;
        for line in text.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            match key.trim() {
                "HOMING_OFFSET" => {
                    let values = rest
                        .split_whitespace()
                        .map(|v| {
                            v.parse::<i32>()
                                .map_err(|e| CalibrationError::Parse(format!("offset {v}: {e}")))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    homing_offset = Some(values);
                }
                "INVERTED" => {
                    let values = rest
                        .split_whitespace()
                        .map(|v| match v.to_ascii_lowercase().as_str() {
                            "true" => Ok(true),
                            "false" => Ok(false),
                            _ => Err(CalibrationError::Parse(format!("flag {v}"))),
                        })
                        .collect::<Result<Vec<_>>>()?;
                    inverted = Some(values);
                }
                _ => {}
            }
        }
        let result = Self {
            motor_ids: motor_ids.to_vec(),
            homing_offset: homing_offset
                .ok_or_else(|| CalibrationError::Parse("missing HOMING_OFFSET line".into()))?,
            inverted: inverted
                .ok_or_else(|| CalibrationError::Parse("missing INVERTED line".into()))?,
            calibrated_at: OffsetDateTime::now_utc(),
        };
        result.check_lengths()?;
        Ok(result)
    }
}
