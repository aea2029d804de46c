//! ClickHouse backend over the HTTP interface

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use reqwest::{header, Client, Request, StatusCode};
use serde::Deserialize;
use url::Url;

use super::core::{DatabaseConnection, Row};
use crate::error::{DatabaseError, DbResult};

const HTTP_PORT: u16 = 8123;
const HTTPS_PORT: u16 = 8443;

/// Connection to a ClickHouse server.
///
/// Accepts `clickhouse://` (plain HTTP) and `clickhouses://` (HTTPS) URLs as
/// well as plain `http(s)://` ones. The path names the database and URL
/// credentials are percent-decoded and sent as basic auth.
#[derive(Debug, Clone)]
pub struct ClickHouseConnection {
    client: Client,
    endpoint: Url,
    database: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompactResponse {
    data: Vec<Row>,
}

impl ClickHouseConnection {
    /// Prepare a connection from a URL. No request is made until the first query.
    pub fn connect(url: &str) -> DbResult<Self> {
        let parsed = Url::parse(url)?;

        // Explicit http(s) URLs keep their usual default ports
        let (scheme, default_port) = match parsed.scheme() {
            "clickhouse" | "tcp" => ("http", HTTP_PORT),
            "clickhouses" => ("https", HTTPS_PORT),
            "http" => ("http", 80),
            "https" => ("https", 443),
            other => {
                return Err(DatabaseError::InvalidUrl(format!(
                    "unsupported scheme '{}'",
                    other
                )))
            }
        };

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| DatabaseError::InvalidUrl(format!("missing host in '{}'", url)))?;
        let port = parsed.port().unwrap_or(default_port);
        let endpoint = Url::parse(&format!("{}://{}:{}/", scheme, host, port))?;

        let database = non_empty(parsed.path().trim_matches('/')).or_else(|| {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "database")
                .map(|(_, value)| value.into_owned())
        });

        let user = non_empty(&decode_credential(parsed.username())?);
        let password = parsed.password().map(decode_credential).transpose()?;

        Ok(Self {
            client: Client::new(),
            endpoint,
            database,
            user,
            password,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Check that the server answers
    pub async fn ping(&self) -> DbResult<()> {
        let url = self.endpoint.join("ping")?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        check_status(status, &body)
    }

    /// POST carrying one statement, with the database and credentials attached
    fn build_request(&self, sql: &str) -> DbResult<Request> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .query(&[("default_format", "JSONCompact")])
            .body(sql.to_string());

        if let Some(database) = &self.database {
            request = request.query(&[("database", database)]);
        }
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref());
        }

        Ok(request.build()?)
    }
}

#[async_trait]
impl DatabaseConnection for ClickHouseConnection {
    async fn execute(&mut self, sql: &str) -> DbResult<Vec<Row>> {
        let request = self.build_request(sql)?;

        tracing::trace!(sql, "sending statement");
        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        check_status(status, &body)?;
        parse_rows(&body)
    }
}

/// Non-2xx answers carry the server's error text in the body
fn check_status(status: StatusCode, body: &str) -> DbResult<()> {
    if status.is_success() {
        return Ok(());
    }
    Err(DatabaseError::Server {
        status: status.as_u16(),
        message: body.trim().to_string(),
    })
}

/// Rows of a `JSONCompact` response; statements without output return nothing
fn parse_rows(body: &str) -> DbResult<Vec<Row>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let response: CompactResponse = serde_json::from_str(body)?;
    Ok(response.data)
}

fn decode_credential(value: &str) -> DbResult<String> {
    percent_decode_str(value)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| DatabaseError::InvalidUrl(format!("credentials are not valid UTF-8: {}", e)))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
