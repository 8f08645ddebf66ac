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

use bytes::Bytes;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Response, StatusCode, Url};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid API URL {0}: {1}")]
    InvalidUrl(String, String),
    #[error(transparent)]
    Internal(#[from] reqwest::Error),
    #[error("unexpected status {0} for {1}")]
    Unexpected(StatusCode, Url),
}

/// Client for the METAR endpoint of the aviationweather.gov data API.
///
/// A single request is made for all stations of interest. Timeouts are the responsibility
/// of the underlying `reqwest::Client` and surface as `ClientError::Internal`.
#[derive(Debug, Clone)]
pub struct AviationWeatherClient {
    client: Client,
    base_url: Url,
}

impl AviationWeatherClient {
    // The upstream API rejects requests that don't look like they come from a browser.
    const USER_AGENT: &'static str = "Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0";
    const JSON_RESPONSE: &'static str = "application/json";

    pub fn new(client: Client, base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(base_url.to_owned(), e.to_string()))?;
        Ok(AviationWeatherClient { client, base_url })
    }

    /// Fetch the latest METAR reports for the comma-separated station `ids`, returning
    /// the raw response body.
    pub async fn metars(&self, ids: &str) -> Result<Bytes, ClientError> {
        let request_url = self.metar_url(ids);
        tracing::debug!(message = "making latest METAR request", url = %request_url);

        let res = self.make_request(request_url).await?;
        Ok(res.bytes().await?)
    }

    async fn make_request(&self, url: Url) -> Result<Response, ClientError> {
        let res = self
            .client
            .get(url.clone())
            .header(USER_AGENT, Self::USER_AGENT)
            .header(ACCEPT, Self::JSON_RESPONSE)
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::OK {
            Ok(res)
        } else {
            Err(ClientError::Unexpected(status, url))
        }
    }

    fn metar_url(&self, ids: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("ids", ids)
            .append_pair("format", "json")
            .append_pair("taf", "false");
        url
    }
}
