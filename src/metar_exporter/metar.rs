// metar_exporter - Prometheus metrics exporter for aviationweather.gov METAR reports
//
// Copyright 2024 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

//! Extraction of values from raw METAR text that aren't present in the structured response.

use metar::{Data, Metar};
use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty report")]
    Empty,
    #[error("malformed report: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Meters,
    StatuteMiles,
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Meters => f.write_str("m"),
            Self::StatuteMiles => f.write_str("SM"),
        }
    }
}

/// Prevailing visibility as encoded in the report, in the unit used by the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub distance: u32,
    pub unit: DistanceUnit,
}

/// Values derived from the raw METAR text of a single station.
///
/// `visibility` is `None` when the report is valid but the visibility can't be expressed
/// as a whole number (unreported or fractional statute miles).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxiliaryFields {
    pub visibility: Option<Visibility>,
}

/// Parser for the raw METAR text of a station report.
pub trait ReportParser: fmt::Debug + Send + Sync {
    fn parse(&self, raw: &str) -> Result<AuxiliaryFields, ParseError>;
}

/// Default `ReportParser` backed by the `metar` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetarParser;

impl MetarParser {
    const VISIBILITY_CAVOK: u32 = 9999;
}

impl ReportParser for MetarParser {
    fn parse(&self, raw: &str) -> Result<AuxiliaryFields, ParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ParseError::Empty);
        }

        let parsed = Metar::parse(raw).map_err(|e| ParseError::Malformed(format!("{:?}", e)))?;
        let visibility = match parsed.visibility {
            Data::Known(v) => to_visibility(v),
            Data::Unknown => None,
        };

        Ok(AuxiliaryFields { visibility })
    }
}

fn to_visibility(visibility: metar::Visibility) -> Option<Visibility> {
    match visibility {
        metar::Visibility::CAVOK => Some(Visibility {
            distance: MetarParser::VISIBILITY_CAVOK,
            unit: DistanceUnit::Meters,
        }),
        metar::Visibility::Metres(m) => Some(Visibility {
            distance: u32::from(m),
            unit: DistanceUnit::Meters,
        }),
        metar::Visibility::StatuteMiles(sm) if sm >= 0.0 && sm.fract() == 0.0 => Some(Visibility {
            distance: sm as u32,
            unit: DistanceUnit::StatuteMiles,
        }),
        metar::Visibility::StatuteMiles(_) => None,
    }
}
