//! HTTP producer: POSTs a message and returns the reply as a message.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use eventing::{HeaderFilter, Message, Producer, TransportError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};
use tracing::{debug, instrument};

use crate::listener::to_headers;

/// Reply header carrying the HTTP status code.
pub const STATUS_HEADER: &str = "http.status";

// Recomputed by the client from the URL and body.
const SKIPPED_HEADERS: [&str; 2] = ["host", "content-length"];

/// Sends messages to one physical URL as HTTP POSTs.
///
/// Shares the owning endpoint's user count and refuses to send while the
/// endpoint is stopped.
pub struct HttpProducer {
    client: Client,
    url: Url,
    filter: Option<HeaderFilter>,
    users: Arc<AtomicUsize>,
}

impl HttpProducer {
    pub(crate) fn new(
        client: Client,
        url: Url,
        filter: Option<HeaderFilter>,
        users: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            client,
            url,
            filter,
            users,
        }
    }

    fn request_headers(&self, message: &Message) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        for (name, value) in message.headers.iter() {
            if SKIPPED_HEADERS.iter().any(|s| name.eq_ignore_ascii_case(s)) {
                continue;
            }
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| TransportError::InvalidHeader {
                    name: name.to_string(),
                    message: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
                    name: name.to_string(),
                    message: e.to_string(),
                })?;
            headers.insert(header_name, header_value);
        }

        // Address the consumer sharing the listener under this filter.
        if let Some(filter) = &self.filter {
            if !message.headers.contains(&filter.name) {
                let name = HeaderName::from_bytes(filter.name.as_bytes()).map_err(|e| {
                    TransportError::InvalidHeader {
                        name: filter.name.clone(),
                        message: e.to_string(),
                    }
                })?;
                let value = HeaderValue::from_str(&filter.value).map_err(|e| {
                    TransportError::InvalidHeader {
                        name: filter.name.clone(),
                        message: e.to_string(),
                    }
                })?;
                headers.insert(name, value);
            }
        }
        Ok(headers)
    }

    fn map_error(&self, e: reqwest::Error) -> TransportError {
        let uri = self.url.to_string();
        if e.is_timeout() {
            TransportError::Timeout { uri }
        } else if e.is_connect() {
            TransportError::Connect {
                uri,
                message: e.to_string(),
            }
        } else {
            TransportError::Io(e.to_string())
        }
    }
}

#[async_trait]
impl Producer for HttpProducer {
    #[instrument(skip_all, fields(uri = %self.url, message_id = %message.id()))]
    async fn send(&self, message: Message) -> Result<Message, TransportError> {
        if self.users.load(Ordering::SeqCst) == 0 {
            return Err(TransportError::NotStarted {
                uri: self.url.to_string(),
            });
        }

        let headers = self.request_headers(&message)?;
        let response = self
            .client
            .post(self.url.clone())
            .headers(headers)
            .body(message.body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        let reply_headers = to_headers(response.headers());
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;
        debug!(status = status.as_u16(), len = body.len(), "Received reply");

        if !status.is_success() {
            return Err(TransportError::Status {
                uri: self.url.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let mut reply = Message::new(body.to_vec());
        reply.headers = reply_headers;
        reply.headers.insert(STATUS_HEADER, status.as_u16().to_string());
        Ok(reply)
    }
}
