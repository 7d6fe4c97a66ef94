use crate::cpi::remote::{RawObservation, SeriesSource};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BLS_URL: &str = "https://api.bls.gov/publicAPI/v1/timeseries/data/";
const REQUEST_SUCCEEDED: &str = "REQUEST_SUCCEEDED";

#[derive(Debug, Serialize)]
struct SeriesRequest<'a> {
    seriesid: [&'a str; 1],
    startyear: String,
    endyear: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    registrationkey: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    status: String,
    #[serde(default)]
    message: Vec<String>,
    #[serde(rename = "Results")]
    results: Option<SeriesResults>,
}

#[derive(Debug, Deserialize)]
struct SeriesResults {
    #[serde(default)]
    series: Vec<SeriesBlock>,
}

#[derive(Debug, Deserialize)]
struct SeriesBlock {
    #[serde(rename = "seriesID", default)]
    series_id: String,
    #[serde(default)]
    data: Vec<RawObservation>,
}

/// Client for the BLS public timeseries API.
pub struct BlsClient {
    client: Client,
    url: String,
    registration_key: Option<String>,
}

impl BlsClient {
    pub fn new(url: &str, registration_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build BLS http client")?;
        Ok(Self {
            client,
            url: url.to_string(),
            registration_key,
        })
    }
}

fn parse_response(body: &str) -> Result<Vec<RawObservation>> {
    let parsed: SeriesResponse =
        serde_json::from_str(body).context("BLS response is not valid series JSON")?;
    if parsed.status != REQUEST_SUCCEEDED {
        anyhow::bail!(
            "BLS API status={} message={}",
            parsed.status,
            parsed.message.join("; ")
        );
    }
    let block = parsed
        .results
        .and_then(|r| r.series.into_iter().next())
        .context("BLS response missing series block")?;
    log::debug!(
        "BLS series {} returned {} rows",
        block.series_id,
        block.data.len()
    );
    Ok(block.data)
}

impl SeriesSource for BlsClient {
    fn fetch(&self, series_id: &str, start_year: i32, end_year: i32) -> Result<Vec<RawObservation>> {
        let payload = SeriesRequest {
            seriesid: [series_id],
            startyear: start_year.to_string(),
            endyear: end_year.to_string(),
            registrationkey: self.registration_key.as_deref(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .with_context(|| format!("BLS request failed for {series_id} {start_year}-{end_year}"))?;
        if !response.status().is_success() {
            anyhow::bail!("BLS call failed with status {}", response.status());
        }
        let body = response.text().context("failed to read BLS response body")?;
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves exactly one HTTP response on a loopback port and returns its URL.
    fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let url = format!("http://{}/", listener.local_addr().expect("addr"));
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).expect("read request");
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let content_length = text[..split]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if request.len() >= split + 4 + content_length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write response");
            String::from_utf8_lossy(&request).to_string()
        });
        (url, handle)
    }

    fn client(url: &str) -> BlsClient {
        BlsClient::new(url, Some("k3y".into()), Duration::from_secs(5)).expect("client")
    }

    #[test]
    fn fetch_posts_series_request_and_reads_rows() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"status":"REQUEST_SUCCEEDED","Results":{"series":[{"seriesID":"CUUR0000SA0","data":[{"year":"2024","period":"M01","value":"308.417"}]}]}}"#,
        );
        let rows = client(&url).fetch("CUUR0000SA0", 2020, 2024).expect("fetch");
        assert_eq!(rows, vec![RawObservation::new("2024", "M01", "308.417")]);

        let request = server.join().expect("server");
        assert!(request.starts_with("POST "));
        assert!(request.contains(r#""startyear":"2020""#));
        assert!(request.contains(r#""registrationkey":"k3y""#));
    }

    #[test]
    fn non_success_http_status_is_an_error() {
        let (url, server) = serve_once("503 Service Unavailable", "{}");
        let err = client(&url).fetch("CUUR0000SA0", 2020, 2024).unwrap_err();
        assert!(format!("{err:#}").contains("status 503"));
        server.join().expect("server");
    }

    #[test]
    fn unreachable_endpoint_is_a_transport_error() {
        let port = TcpListener::bind("127.0.0.1:0")
            .expect("bind")
            .local_addr()
            .expect("addr")
            .port();
        let err = client(&format!("http://127.0.0.1:{port}/"))
            .fetch("CUUR0000SA0", 2020, 2024)
            .unwrap_err();
        assert!(format!("{err:#}").contains("BLS request failed for CUUR0000SA0 2020-2024"));
    }

    #[test]
    fn parse_response_reads_data_rows() {
        let body = r#"{
            "status": "REQUEST_SUCCEEDED",
            "responseTime": 120,
            "message": [],
            "Results": {"series": [{"seriesID": "CUUR0000SA0", "data": [
                {"year": "2024", "period": "M02", "periodName": "February", "value": "310.326", "footnotes": [{}]},
                {"year": "2024", "period": "M01", "periodName": "January", "value": "-", "footnotes": [{}]}
            ]}]}
        }"#;
        let rows = parse_response(body).expect("parse");
        assert_eq!(
            rows,
            vec![
                RawObservation::new("2024", "M02", "310.326"),
                RawObservation::new("2024", "M01", "-"),
            ]
        );
    }

    #[test]
    fn null_value_is_dropped_without_failing_the_batch() {
        let body = r#"{
            "status": "REQUEST_SUCCEEDED",
            "Results": {"series": [{"seriesID": "CUUR0000SA0", "data": [
                {"year": "2024", "period": "M02", "value": "310.326"},
                {"year": "2024", "period": "M01", "value": null}
            ]}]}
        }"#;
        let rows = parse_response(body).expect("parse");
        assert_eq!(rows.len(), 2);
        let points = crate::cpi::remote::extract_monthly_points(&rows);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].month, 2);
    }

    #[test]
    fn parse_response_rejects_failed_status() {
        let body = r#"{"status": "REQUEST_NOT_PROCESSED", "message": ["daily threshold reached"]}"#;
        let err = parse_response(body).unwrap_err();
        assert!(format!("{err:#}").contains("daily threshold reached"));
    }

    #[test]
    fn parse_response_requires_series_block() {
        let body = r#"{"status": "REQUEST_SUCCEEDED", "Results": {"series": []}}"#;
        assert!(parse_response(body).is_err());
    }

    #[test]
    fn request_omits_missing_registration_key() {
        let payload = SeriesRequest {
            seriesid: ["CUUR0000SA0"],
            startyear: "2020".into(),
            endyear: "2024".into(),
            registrationkey: None,
        };
        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"seriesid": ["CUUR0000SA0"], "startyear": "2020", "endyear": "2024"})
        );
    }
}
