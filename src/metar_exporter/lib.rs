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

//! Prometheus metrics exporter for aviationweather.gov METAR reports
//!
//! ## Features
//!
//! `metar_exporter` fetches the latest [METAR] reports for one or more airport stations using the
//! [aviationweather.gov] data API and emits them as Prometheus metrics. Reports are fetched when
//! Prometheus scrapes the exporter, a single upstream request is made per scrape for all configured
//! stations. The following metrics are emitted when available (not all fields are available for all
//! stations, values that are missing or can't be determined are not emitted instead of being zero).
//!
//! * `metar_temperature{station=$STATION}` - Temperature, in degrees celsius.
//! * `metar_dewPoint{station=$STATION}` - Dew point, in degrees celsius.
//! * `metar_wind_direction{station=$STATION}` - Wind direction, in degrees. Not emitted for variable winds.
//! * `metar_wind_speed{station=$STATION}` - Wind speed, in knots.
//! * `metar_altim{station=$STATION}` - Altimeter setting.
//! * `metar_visibilityStatute{station=$STATION}` - Prevailing visibility parsed from the raw report.
//! * `metar_execTime` - Duration of the collection for this scrape, in nanoseconds.
//!
//! The `station` label is the name of the station as reported by the API (e.g. `Hamburg Arpt, HH, DE`).
//!
//! [METAR]: https://en.wikipedia.org/wiki/METAR
//! [aviationweather.gov]: https://aviationweather.gov/data/api/
//!
//! ## Build
//!
//! `metar_exporter` is a Rust program and must be built from source using a [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! git clone git@github.com:56quarters/metar_exporter.git && cd metar_exporter
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! Stations are given as a comma-separated list of ICAO codes. Whitespace is ignored and codes
//! are case-insensitive.
//!
//! ```text
//! ./metar_exporter --stations 'EDDH, EDDM' --listen localhost:9093
//! ```
//!
//! ### Prometheus
//!
//! Prometheus metrics are exposed on port `9093` at `/metrics` by default. Since each scrape results
//! in a request to aviationweather.gov, there is no benefit to scraping more often than reports are
//! published (usually every 30 or 60 minutes).
//!
//! ```yaml
//! scrape_configs:
//! - job_name: metar_exporter
//!   scrape_interval: 5m
//!   static_configs:
//!   - targets: ['example:9093']
//! ```
//!

pub mod client;
pub mod collector;
pub mod http;
pub mod metar;
pub mod metrics;
pub mod report;
pub mod stations;
