use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tether_core::{Registry, RemoteRef, ServiceError, StubEndpoint, TransportError};

fn map_err(target: &str, timeout: Duration, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_decode() {
        TransportError::Protocol(err.to_string())
    } else {
        TransportError::unreachable(target, err)
    }
}

fn unexpected(status: StatusCode) -> TransportError {
    TransportError::Protocol(format!("unexpected status {status}"))
}

/// Registry owned by another process, reached over HTTP.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: Client,
    target: String,
    timeout: Duration,
}

impl RegistryClient {
    pub fn new(http: Client, host: &str, port: u16, timeout: Duration) -> Self {
        Self {
            http,
            target: format!("{host}:{port}"),
            timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.target, path)
    }

    fn name_url(&self, name: &str) -> String {
        self.url(&format!("/names/{}", urlencoding::encode(name)))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, TransportError> {
        request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| map_err(&self.target, self.timeout, e))
    }
}

#[async_trait]
impl Registry for RegistryClient {
    async fn rebind(&self, name: &str, endpoint: StubEndpoint) -> Result<(), TransportError> {
        let res = self.send(self.http.put(self.name_url(name)).json(&endpoint)).await?;
        if res.status().is_success() {
            Ok(())
        } else {
            Err(unexpected(res.status()))
        }
    }

    async fn lookup(&self, name: &str) -> Result<StubEndpoint, TransportError> {
        let res = self.send(self.http.get(self.name_url(name))).await?;
        match res.status() {
            StatusCode::OK => res
                .json::<StubEndpoint>()
                .await
                .map_err(|e| map_err(&self.target, self.timeout, e)),
            StatusCode::NOT_FOUND => Err(TransportError::NotBound(name.to_string())),
            other => Err(unexpected(other)),
        }
    }

    async fn unbind(&self, name: &str) -> Result<(), TransportError> {
        let res = self.send(self.http.delete(self.name_url(name))).await?;
        match res.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(TransportError::NotBound(name.to_string())),
            other => Err(unexpected(other)),
        }
    }

    async fn list(&self) -> Result<Vec<String>, TransportError> {
        let res = self.send(self.http.get(self.url("/names"))).await?;
        if !res.status().is_success() {
            return Err(unexpected(res.status()));
        }
        res.json::<Vec<String>>()
            .await
            .map_err(|e| map_err(&self.target, self.timeout, e))
    }
}

/// Stub for one exported object.
#[derive(Debug, Clone)]
pub struct HttpRemoteRef {
    http: Client,
    endpoint: StubEndpoint,
    target: String,
    timeout: Duration,
}

impl HttpRemoteRef {
    pub fn new(http: Client, endpoint: StubEndpoint, timeout: Duration) -> Self {
        let target = format!("{}:{}", endpoint.host, endpoint.port);
        Self {
            http,
            endpoint,
            target,
            timeout,
        }
    }
}

#[async_trait]
impl RemoteRef for HttpRemoteRef {
    fn endpoint(&self) -> &StubEndpoint {
        &self.endpoint
    }

    async fn invoke(&self, method: &str, args: Value) -> Result<Value, TransportError> {
        let url = format!(
            "http://{}/objects/{}/{}",
            self.target,
            self.endpoint.object_id,
            urlencoding::encode(method)
        );
        let res = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(&args)
            .send()
            .await
            .map_err(|e| map_err(&self.target, self.timeout, e))?;

        match res.status() {
            StatusCode::OK => res
                .json::<Value>()
                .await
                .map_err(|e| map_err(&self.target, self.timeout, e)),
            StatusCode::NOT_FOUND => Err(TransportError::NoSuchObject(self.endpoint.object_id)),
            StatusCode::UNPROCESSABLE_ENTITY => {
                let fault = res
                    .json::<ServiceError>()
                    .await
                    .map_err(|e| map_err(&self.target, self.timeout, e))?;
                Err(TransportError::Service(fault))
            }
            other => Err(unexpected(other)),
        }
    }
}
