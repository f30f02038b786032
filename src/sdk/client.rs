use serde_json::Value;

use crate::engine::record::Record;
use crate::{Error, Result};

/// HTTP client mirroring the REST gateway routes.
pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(host: &str, port: u16) -> Self {
        Self::from_url(&format!("http://{host}:{port}"))
    }

    /// Builds a client against a base URL such as `http://127.0.0.1:4050`.
    pub fn from_url(url: &str) -> Self {
        Self {
            base_url: url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn collection_url(&self, name: &str) -> String {
        format!("{}/collections/{name}", self.base_url)
    }

    fn records_url(&self, name: &str) -> String {
        format!("{}/collections/{name}/records", self.base_url)
    }

    /// Lists registered collection names.
    pub async fn collections(&self) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(format!("{}/collections", self.base_url))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Creates (or resets) a collection.
    pub async fn create_collection(&self, name: &str) -> Result<Vec<Record>> {
        let resp = self.http.post(self.collection_url(name)).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Deletes a collection, returning its records at deletion.
    pub async fn delete_collection(&self, name: &str) -> Result<Vec<Record>> {
        let resp = self.http.delete(self.collection_url(name)).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Adds a record, returning it as stored (with its identifier).
    pub async fn add_record(&self, collection: &str, record: &Record) -> Result<Record> {
        let resp = self
            .http
            .post(self.records_url(collection))
            .json(record)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Finds records matching the given `field=value` pairs.
    pub async fn find_records(
        &self,
        collection: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<Record>> {
        let resp = self
            .http
            .get(self.records_url(collection))
            .query(query)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Deletes the single record matching the given pairs. The server
    /// rejects ambiguous descriptors, surfaced here as [`Error::Remote`].
    pub async fn delete_record(&self, collection: &str, query: &[(&str, &str)]) -> Result<Record> {
        let resp = self
            .http
            .delete(self.records_url(collection))
            .query(query)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Merges `patch` into the record with the given identifier.
    pub async fn update_record(&self, collection: &str, id: &str, patch: &Value) -> Result<Record> {
        let resp = self
            .http
            .put(format!("{}/{id}", self.records_url(collection)))
            .json(patch)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Asks the gateway to persist a snapshot of every collection.
    pub async fn persist(&self, filename: Option<&str>, password: Option<&str>) -> Result<()> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(filename) = filename {
            query.push(("filename", filename));
        }
        if let Some(password) = password {
            query.push(("password", password));
        }
        let resp = self
            .http
            .post(format!("{}/persist", self.base_url))
            .query(&query)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

/// Maps non-success responses to [`Error::Remote`], pulling the message out
/// of the gateway's `{"error": ...}` body when present.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let message = resp
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| {
            body.get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown server error".to_string());
    Err(Error::Remote { status, message })
}
