// vedur_exporter - Prometheus metrics exporter for xmlweather.vedur.is
//
// Copyright 2022 Nick Pillitteri
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

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Url};
use std::error;
use std::fmt;

#[derive(Debug)]
pub enum ClientError {
    Internal(reqwest::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(e) => write!(f, "{}", e),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
        }
    }
}

/// Client for the observation feed of the Icelandic Met Office XML API.
#[derive(Debug)]
pub struct VedurClient {
    client: Client,
    base_url: Url,
}

impl VedurClient {
    const USER_AGENT: &'static str = "Vedur Prometheus Exporter";
    const XML_RESPONSE: &'static str = "text/xml";

    pub fn new(client: Client, base_url: Url) -> Self {
        VedurClient { client, base_url }
    }

    /// Fetch the latest observation for `station` as raw XML text.
    ///
    /// The body is returned no matter what HTTP status the API responds with. Problems
    /// with a station (unknown ID, no recent observation) are reported by the API inside
    /// the XML document itself.
    pub async fn observation(&self, station: &str) -> Result<String, ClientError> {
        let request_url = self.observation_url(station);
        tracing::debug!(message = "making latest observation request", url = %request_url);

        let res = self
            .client
            .get(request_url)
            .header(USER_AGENT, Self::USER_AGENT)
            .header(ACCEPT, Self::XML_RESPONSE)
            .send()
            .await
            .map_err(ClientError::Internal)?;

        let status = res.status();
        let body = res.text().await.map_err(ClientError::Internal)?;
        tracing::debug!(
            message = "received latest observation response",
            status = %status,
            num_bytes = body.len(),
        );

        Ok(body)
    }

    fn observation_url(&self, station: &str) -> Url {
        let encoded_station = utf8_percent_encode(station, NON_ALPHANUMERIC);
        let mut url = self.base_url.clone();
        url.set_query(Some(&format!(
            "op_w=xml&type=obs&lang=en&view=xml&ids={}",
            encoded_station
        )));

        url
    }
}
