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

use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StationError {
    #[error("no stations configured")]
    Empty,
    #[error("invalid station {0}")]
    Invalid(String),
}

/// Ordered set of station identifiers (ICAO codes) to request reports for.
///
/// Identifiers are normalized when parsed: all whitespace is removed and letters are
/// upper-cased. Empty entries (e.g. from a trailing comma) are skipped. A `StationSet`
/// always contains at least one station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationSet {
    ids: Vec<String>,
}

impl StationSet {
    /// Parse a comma-separated list of station identifiers such as `"EDDH, EDDM"`.
    pub fn parse(stations: &str) -> Result<Self, StationError> {
        let mut ids = Vec::new();

        for entry in stations.split(',') {
            let id: String = entry
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| c.to_ascii_uppercase())
                .collect();

            if id.is_empty() {
                continue;
            }

            if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(StationError::Invalid(id));
            }

            ids.push(id);
        }

        if ids.is_empty() {
            return Err(StationError::Empty);
        }

        Ok(StationSet { ids })
    }

    /// Station identifiers joined by commas, the form expected by the `ids` query parameter.
    pub fn request_ids(&self) -> String {
        self.ids.join(",")
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|s| s.eq_ignore_ascii_case(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl FromStr for StationSet {
    type Err = StationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.request_ids())
    }
}
