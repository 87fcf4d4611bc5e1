//! Talks to the daemon's plugin socket with `hyper` + `hyperlocal`, the same pairing the
//! teacher uses for its TCP/TLS `HttpsClient` (`libblkcapt/src/sys/net.rs`), repurposed here
//! for the UNIX-socket transport `hyperlocal` is actually built for.
use anyhow::{anyhow, Result};
use hyper::{Body, Client, Method, Request};
use hyper_timeout::TimeoutConnector;
use hyperlocal::UnixConnector;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub struct ServiceClient {
    client: Client<TimeoutConnector<UnixConnector>>,
    socket_path: PathBuf,
}

impl ServiceClient {
    pub fn new(socket_path: PathBuf) -> Self {
        let unix = UnixConnector {};
        let mut connector = TimeoutConnector::new(unix);
        connector.set_connect_timeout(Some(Duration::from_secs(5)));
        connector.set_read_timeout(Some(Duration::from_secs(30)));
        connector.set_write_timeout(Some(Duration::from_secs(10)));

        Self {
            client: Client::builder().build::<_, Body>(connector),
            socket_path,
        }
    }

    fn url(&self, endpoint: &str) -> hyper::Uri {
        hyperlocal::Uri::new(&self.socket_path, &format!("/{}", endpoint)).into()
    }

    /// POSTs `body` (or `{}` if absent) to `endpoint` and decodes the JSON response.
    pub async fn call<B: Serialize, R: DeserializeOwned>(&self, endpoint: &str, body: &B) -> Result<R> {
        let payload = serde_json::to_vec(body)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.url(endpoint))
            .header("content-type", "application/json")
            .body(Body::from(payload))?;
        let response = self.client.request(request).await?;
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await?;
        if !status.is_success() {
            return Err(anyhow!("{}: HTTP {}", endpoint, status));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// GETs `endpoint` with no request body and decodes the JSON response.
    pub async fn call_get<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(self.url(endpoint))
            .body(Body::empty())?;
        let response = self.client.request(request).await?;
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await?;
        if !status.is_success() {
            return Err(anyhow!("{}: HTTP {}", endpoint, status));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
