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

use crate::client::{AviationWeatherClient, ClientError};
use crate::metar::{MetarParser, ReportParser};
use crate::metrics::{MetarMetrics, Scrape};
use crate::report::{self, AugmentedReport};
use crate::stations::StationSet;
use std::time::Instant;
use tracing::Instrument;

/// Runs a complete collection cycle for every scrape of the metrics endpoint.
///
/// Each call to `collect` fetches reports for all configured stations, decodes them, parses
/// the raw METAR of each station, and returns the resulting samples. Nothing is kept between
/// calls so concurrent scrapes are independent of each other. Failures to fetch or decode
/// the response result in an empty `Scrape`, they are logged but never returned.
#[derive(Debug)]
pub struct MetarCollector {
    client: AviationWeatherClient,
    stations: StationSet,
    metrics: MetarMetrics,
    parser: Box<dyn ReportParser>,
}

impl MetarCollector {
    pub fn new(client: AviationWeatherClient, stations: StationSet, metrics: MetarMetrics) -> Self {
        Self::with_parser(client, stations, metrics, MetarParser)
    }

    pub fn with_parser<P>(client: AviationWeatherClient, stations: StationSet, metrics: MetarMetrics, parser: P) -> Self
    where
        P: ReportParser + 'static,
    {
        MetarCollector {
            client,
            stations,
            metrics,
            parser: Box::new(parser),
        }
    }

    pub fn metrics(&self) -> &MetarMetrics {
        &self.metrics
    }

    pub async fn collect(&self) -> Scrape {
        let start = Instant::now();

        let body = match self
            .client
            .metars(&self.stations.request_ids())
            .instrument(tracing::span!(tracing::Level::DEBUG, "metar_fetch"))
            .await
        {
            Ok(body) => body,
            Err(ClientError::Unexpected(status, url)) => {
                tracing::warn!(
                    message = "unexpected status fetching reports",
                    status_code = status.as_u16(),
                    status = %status,
                    url = %url,
                );
                return Scrape::default();
            }
            Err(e) => {
                tracing::error!(message = "failed to fetch reports", error = %e);
                return Scrape::default();
            }
        };

        let reports = match report::decode(&body, &self.stations) {
            Ok(reports) => reports,
            Err(e) => {
                tracing::error!(message = "failed to decode reports", error = %e, num_bytes = body.len());
                return Scrape::default();
            }
        };

        let mut scrape = Scrape::default();
        for report in reports {
            tracing::debug!(
                message = "received report",
                station = %report.name,
                icao = %report.icao_id,
                temp = ?report.temperature,
                dewp = ?report.dewpoint,
                wind.speed = ?report.wind_speed,
                wind.dir = ?report.wind_direction,
                altim = ?report.altimeter,
                visibility = ?report.visibility,
                wx = ?report.weather,
            );

            let fields = match self.parser.parse(&report.raw_ob) {
                Ok(fields) => fields,
                Err(e) => {
                    tracing::warn!(
                        message = "unable to parse raw report",
                        station = %report.name,
                        raw = %report.raw_ob,
                        error = %e,
                    );
                    Default::default()
                }
            };

            self.metrics.observation(&AugmentedReport { report, fields }, &mut scrape);
        }

        let elapsed = start.elapsed();
        self.metrics.exec_time(elapsed, &mut scrape);
        tracing::debug!(message = "collection finished", elapsed = ?elapsed, samples = scrape.len());

        scrape
    }
}
