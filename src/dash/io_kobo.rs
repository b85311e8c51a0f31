// Client for the data endpoint of a KoboToolbox form.

use std::time::Duration;

use log::{debug, warn};
use reqwest::header::AUTHORIZATION;
use serde_json::Value as JSValue;
use snafu::prelude::*;

use survey_tally::{Record, RowSet};

use crate::dash::{
    io_common::{json_to_cell, normalize_header},
    *,
};

pub struct KoboClient {
    client: reqwest::blocking::Client,
    token: String,
    timeout: Duration,
}

impl KoboClient {
    pub fn new(token: String, timeout: Duration) -> DashResult<KoboClient> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context(HttpClientSnafu {})?;
        Ok(KoboClient {
            client,
            token,
            timeout,
        })
    }

    /// One GET on the data endpoint. Only the first page of submissions is read.
    pub fn fetch_rows(&self, url: &str) -> DashResult<RowSet> {
        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .send()
            .map_err(|e| self.request_error(e, url))?;

        let status = resp.status().as_u16();
        ensure!(status == 200, HttpStatusSnafu { url, status });

        let body = resp.text().map_err(|e| self.request_error(e, url))?;
        debug!("fetch_rows: {} bytes from {}", body.len(), url);
        parse_kobo_envelope(&body, url)
    }

    fn request_error(&self, e: reqwest::Error, url: &str) -> DashError {
        if e.is_timeout() {
            DashError::Timeout {
                source: e,
                url: url.to_string(),
                seconds: self.timeout.as_secs(),
            }
        } else {
            DashError::Network {
                source: e,
                url: url.to_string(),
            }
        }
    }
}

/// Reads the submissions in the `results` list of a data answer.
pub fn parse_kobo_envelope(body: &str, url: &str) -> DashResult<RowSet> {
    let js: JSValue = serde_json::from_str(body).context(InvalidResponseSnafu { url })?;
    let results = js
        .get("results")
        .and_then(|r| r.as_array())
        .context(MissingResultsSnafu { url })?;
    if let Some(next) = js.get("next").and_then(|n| n.as_str()) {
        warn!(
            "parse_kobo_envelope: more submissions are available at {}, they are not read",
            next
        );
    }

    let mut records: Vec<Record> = Vec::new();
    for (idx, r) in results.iter().enumerate() {
        match r.as_object() {
            Some(obj) => {
                let mut record = Record::new();
                for (k, v) in obj.iter() {
                    record.insert(&normalize_header(k), json_to_cell(v));
                }
                records.push(record);
            }
            None => {
                warn!("parse_kobo_envelope: result {} is not an object: {:?}", idx, r);
            }
        }
    }
    Ok(RowSet::from_records(records))
}
