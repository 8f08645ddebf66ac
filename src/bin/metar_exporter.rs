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

use clap::Parser;
use metar_exporter::client::AviationWeatherClient;
use metar_exporter::collector::MetarCollector;
use metar_exporter::http::RequestContext;
use metar_exporter::metrics::MetarMetrics;
use metar_exporter::stations::StationSet;
use reqwest::Client;
use std::error::Error;
use std::io;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{self, SignalKind};
use tracing::Level;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_LISTEN_ADDR: &str = "localhost:9093";
const DEFAULT_STATIONS: &str = "EDDH";
const DEFAULT_TIMEOUT_MILLIS: u64 = 5000;
const DEFAULT_API_URL: &str = "https://aviationweather.gov/cgi-bin/data/metar.php";

#[derive(Debug, Parser)]
#[clap(name = "metar_exporter", version = clap::crate_version!())]
struct MetarExporterApplication {
    /// Comma-separated ICAO codes of the stations to fetch METAR reports for
    #[clap(long, default_value = DEFAULT_STATIONS)]
    stations: StationSet,

    /// URL of the METAR endpoint of the aviationweather.gov data API
    #[clap(long, default_value_t = DEFAULT_API_URL.into())]
    api_url: String,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, alias = "loglevel", default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Timeout for fetching reports from the aviationweather.gov API, in milliseconds.
    /// Scrapes that take longer than this will not include any station metrics.
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_MILLIS)]
    timeout_millis: u64,

    /// Address to listen on, as `host:port`
    #[clap(long, default_value_t = DEFAULT_LISTEN_ADDR.into())]
    listen: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = MetarExporterApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let timeout = Duration::from_millis(opts.timeout_millis);
    let http_client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let client = AviationWeatherClient::new(http_client, &opts.api_url).unwrap_or_else(|e| {
        tracing::error!(message = "invalid API URL", error = %e);
        process::exit(1)
    });

    let addr = match tokio::net::lookup_host(opts.listen.as_str()).await.map(|mut a| a.next()) {
        Ok(Some(addr)) => addr,
        Ok(None) => {
            tracing::error!(message = "listen address did not resolve", address = %opts.listen);
            process::exit(1)
        }
        Err(e) => {
            tracing::error!(message = "unable to resolve listen address", address = %opts.listen, error = %e);
            process::exit(1)
        }
    };

    let collector = MetarCollector::new(client, opts.stations.clone(), MetarMetrics::new());
    let context = Arc::new(RequestContext::new(collector));
    let app = metar_exporter::http::router(context);

    let server = axum::Server::try_bind(&addr)
        .unwrap_or_else(|e| {
            tracing::error!(message = "error binding to address", address = %addr, error = %e);
            process::exit(1)
        })
        .serve(app.into_make_service());

    tracing::info!(
        message = "server started",
        address = %server.local_addr(),
        api_url = %opts.api_url,
        stations = %opts.stations,
    );

    server
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    tracing::info!("server shutdown");
    Ok(())
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}
