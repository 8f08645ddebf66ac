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

use crate::report::AugmentedReport;
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

/// Content type of the text produced by `MetarMetrics::encode`.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct StationLabels {
    station: String,
}

/// Name and help text of a single gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub name: &'static str,
    pub help: &'static str,
}

/// A single gauge value produced by a collection cycle.
///
/// Per-station samples have a `station` label, the cycle duration has none.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: &'static str,
    pub station: Option<String>,
    pub value: f64,
}

/// All samples produced by a single collection cycle, in the order they were emitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scrape {
    samples: Vec<MetricSample>,
}

impl Scrape {
    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Value of the sample with the given name and station label, if one was emitted.
    pub fn value(&self, name: &str, station: Option<&str>) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.name == name && s.station.as_deref() == station)
            .map(|s| s.value)
    }

    fn push(&mut self, descriptor: &Descriptor, station: Option<&str>, value: f64) {
        self.samples.push(MetricSample {
            name: descriptor.name,
            station: station.map(str::to_owned),
            value,
        });
    }
}

/// Descriptors for every metric emitted from an `AugmentedReport`.
///
/// Created once at startup and shared by every collection cycle. Each cycle produces its
/// own `Scrape` which is then encoded with a registry that only lives for that scrape,
/// so overlapping cycles can't see each other's values and stations that disappear from
/// upstream responses don't linger.
///
/// Per-station metrics are labeled with the station name reported upstream, e.g.
/// `{station="Hamburg Arpt, HH, DE"}`.
#[derive(Debug, Clone)]
pub struct MetarMetrics {
    temperature: Descriptor,
    dewpoint: Descriptor,
    wind_speed: Descriptor,
    wind_direction: Descriptor,
    altimeter: Descriptor,
    visibility: Descriptor,
    exec_time: Descriptor,
}

impl MetarMetrics {
    pub fn new() -> Self {
        Self {
            temperature: Descriptor {
                name: "metar_temperature",
                help: "Temperature in Celsius",
            },
            dewpoint: Descriptor {
                name: "metar_dewPoint",
                help: "Dew point in Celsius",
            },
            wind_speed: Descriptor {
                name: "metar_wind_speed",
                help: "Wind speed in knots",
            },
            wind_direction: Descriptor {
                name: "metar_wind_direction",
                help: "Wind direction in degrees",
            },
            altimeter: Descriptor {
                name: "metar_altim",
                help: "Altimeter setting",
            },
            visibility: Descriptor {
                name: "metar_visibilityStatute",
                help: "Prevailing visibility from the raw report, in the unit used by the report",
            },
            exec_time: Descriptor {
                name: "metar_execTime",
                help: "Duration of the collection cycle in nanoseconds",
            },
        }
    }

    /// Add samples for the provided report to `scrape` if the relevant value exists.
    ///
    /// If the report doesn't contain a value for a particular metric (or it couldn't be
    /// determined from the raw report), no sample is emitted for it.
    pub fn observation(&self, augmented: &AugmentedReport, scrape: &mut Scrape) {
        let report = &augmented.report;
        let station = report.name.as_str();
        let wind_direction = report.wind_direction.as_ref().and_then(|w| w.degrees());
        let visibility = augmented.fields.visibility.map(|v| f64::from(v.distance));

        self.set_from_value(scrape, station, &self.temperature, report.temperature);
        self.set_from_value(scrape, station, &self.dewpoint, report.dewpoint);
        self.set_from_value(scrape, station, &self.wind_speed, report.wind_speed);
        self.set_from_value(scrape, station, &self.wind_direction, wind_direction);
        self.set_from_value(scrape, station, &self.altimeter, report.altimeter);
        self.set_from_value(scrape, station, &self.visibility, visibility);
    }

    /// Add the duration of a collection cycle to `scrape`, in nanoseconds.
    pub fn exec_time(&self, elapsed: Duration, scrape: &mut Scrape) {
        scrape.push(&self.exec_time, None, elapsed.as_nanos() as f64);
    }

    /// Encode samples from a single scrape in the OpenMetrics text format.
    pub fn encode(&self, scrape: &Scrape) -> Result<String, fmt::Error> {
        let mut registry = Registry::default();

        for descriptor in self.station_descriptors() {
            let family = Family::<StationLabels, Gauge<f64, AtomicU64>>::default();
            for sample in scrape.samples().iter().filter(|s| s.name == descriptor.name) {
                if let Some(station) = &sample.station {
                    family
                        .get_or_create(&StationLabels {
                            station: escape_label_value(station),
                        })
                        .set(sample.value);
                }
            }

            registry.register(descriptor.name, descriptor.help, family);
        }

        if let Some(elapsed) = scrape.value(self.exec_time.name, None) {
            let gauge = Gauge::<f64, AtomicU64>::default();
            gauge.set(elapsed);
            registry.register(self.exec_time.name, self.exec_time.help, gauge);
        }

        let mut buf = String::new();
        encode(&mut buf, &registry)?;
        Ok(buf)
    }

    fn station_descriptors(&self) -> [&Descriptor; 6] {
        [
            &self.temperature,
            &self.dewpoint,
            &self.wind_speed,
            &self.wind_direction,
            &self.altimeter,
            &self.visibility,
        ]
    }

    fn set_from_value(&self, scrape: &mut Scrape, station: &str, descriptor: &Descriptor, value: Option<f64>) {
        if let Some(v) = value {
            scrape.push(descriptor, Some(station), v);
        }
    }
}

/// Escape a label value for the text exposition format. The encoder writes label values
/// verbatim and station names come from upstream.
fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl Default for MetarMetrics {
    fn default() -> Self {
        Self::new()
    }
}
