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

use crate::metar::AuxiliaryFields;
use crate::stations::StationSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode a response body from the METAR endpoint into one report per station.
///
/// The body must be a JSON array, otherwise the entire response is rejected. Individual
/// elements that don't match the expected schema are skipped (and logged) so that a single
/// odd station doesn't prevent metrics for the rest. A difference between the number of
/// stations requested and the number of reports received is logged but not an error.
pub fn decode(body: &[u8], stations: &StationSet) -> Result<Vec<MetarReport>, DecodeError> {
    let elements: Vec<Value> = serde_json::from_slice(body)?;

    if elements.len() != stations.len() {
        tracing::warn!(
            message = "not all requested stations were received",
            requested = stations.len(),
            received = elements.len(),
        );
    }

    let mut reports = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        match serde_json::from_value::<MetarReport>(element) {
            Ok(report) => {
                if !stations.contains(&report.icao_id) {
                    tracing::debug!(message = "received report for unrequested station", station = %report.icao_id);
                }
                reports.push(report);
            }
            Err(e) => {
                tracing::warn!(message = "skipping malformed station report", index = index, error = %e);
            }
        }
    }

    for id in stations.iter() {
        if !reports.iter().any(|r| r.icao_id.eq_ignore_ascii_case(id)) {
            tracing::debug!(message = "no report received for station", station = id);
        }
    }

    Ok(reports)
}

/// A single station report from the METAR endpoint.
///
/// Values that the exporter doesn't use and whose type varies between stations (or between
/// reports of the same station) are kept as untyped JSON.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetarReport {
    #[serde(rename = "metar_id")]
    pub metar_id: Option<u64>,
    #[serde(rename = "icaoId")]
    pub icao_id: String,
    #[serde(rename = "receiptTime")]
    pub receipt_time: Option<String>,
    #[serde(rename = "obsTime")]
    pub obs_time: Option<i64>,
    #[serde(rename = "reportTime")]
    pub report_time: Option<String>,
    #[serde(rename = "temp")]
    pub temperature: Option<f64>,
    #[serde(rename = "dewp")]
    pub dewpoint: Option<f64>,
    #[serde(rename = "wdir")]
    pub wind_direction: Option<WindDirection>,
    #[serde(rename = "wspd")]
    pub wind_speed: Option<f64>,
    #[serde(rename = "wgst")]
    pub wind_gust: Option<Value>,
    #[serde(rename = "visib")]
    pub visibility: Option<VisibilityText>,
    #[serde(rename = "altim")]
    pub altimeter: Option<f64>,
    #[serde(rename = "slp")]
    pub sea_level_pressure: Option<Value>,
    #[serde(rename = "qcField")]
    pub qc_field: Option<i64>,
    #[serde(rename = "wxString")]
    pub weather: Option<String>,
    #[serde(rename = "presTend")]
    pub pressure_tendency: Option<Value>,
    #[serde(rename = "maxT")]
    pub max_temperature: Option<Value>,
    #[serde(rename = "minT")]
    pub min_temperature: Option<Value>,
    #[serde(rename = "maxT24")]
    pub max_temperature_24_hours: Option<Value>,
    #[serde(rename = "minT24")]
    pub min_temperature_24_hours: Option<Value>,
    #[serde(rename = "precip")]
    pub precipitation: Option<Value>,
    #[serde(rename = "pcp3hr")]
    pub precipitation_3_hours: Option<Value>,
    #[serde(rename = "pcp6hr")]
    pub precipitation_6_hours: Option<Value>,
    #[serde(rename = "pcp24hr")]
    pub precipitation_24_hours: Option<Value>,
    #[serde(rename = "snow")]
    pub snow: Option<Value>,
    #[serde(rename = "vertVis")]
    pub vertical_visibility: Option<Value>,
    #[serde(rename = "metarType")]
    pub metar_type: Option<String>,
    #[serde(rename = "rawOb")]
    pub raw_ob: String,
    #[serde(rename = "mostRecent")]
    pub most_recent: Option<i64>,
    #[serde(rename = "lat")]
    pub latitude: Option<f64>,
    #[serde(rename = "lon")]
    pub longitude: Option<f64>,
    #[serde(rename = "elev")]
    pub elevation: Option<f64>,
    #[serde(rename = "prior")]
    pub prior: Option<i64>,
    #[serde(rename = "name")]
    pub name: String,
    #[serde(rename = "clouds", default)]
    pub clouds: Vec<CloudLayer>,
}

/// Wind direction in degrees or `VRB` for variable winds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum WindDirection {
    Degrees(f64),
    Variable(String),
}

impl WindDirection {
    pub fn degrees(&self) -> Option<f64> {
        match self {
            Self::Degrees(d) => Some(*d),
            Self::Variable(_) => None,
        }
    }
}

/// Visibility as reported in the structured response, e.g. `"6+"` or `10`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum VisibilityText {
    Number(f64),
    Text(String),
}

impl fmt::Display for VisibilityText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CloudLayer {
    #[serde(rename = "cover")]
    pub cover: String,
    #[serde(rename = "base")]
    pub base: Option<f64>,
}

/// A report along with values derived from its raw METAR text.
#[derive(Debug, Clone)]
pub struct AugmentedReport {
    pub report: MetarReport,
    pub fields: AuxiliaryFields,
}
