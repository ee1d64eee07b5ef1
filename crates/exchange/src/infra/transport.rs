use {
    crate::{
        domain::time::{Deadline, DeadlineExceeded},
        infra::adapter::{OutboundRequest, RawResponse},
    },
    bytes::BytesMut,
    thiserror::Error,
};

/// Performs the HTTP calls built by adapters.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request`, giving up once `deadline` passes.
    async fn send(&self, request: &OutboundRequest, deadline: Deadline)
    -> Result<RawResponse, Error>;
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),
    #[error("request error: {0:?}")]
    Request(#[from] reqwest::Error),
    #[error("the response was too large, the limit was {limit_bytes} bytes")]
    ResponseTooLarge { limit_bytes: usize },
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Deadline(_) => true,
            Self::Request(err) => err.is_timeout(),
            Self::ResponseTooLarge { .. } => false,
        }
    }
}

/// [`Transport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct Http {
    client: reqwest::Client,
    limit_bytes: usize,
}

impl Http {
    pub fn new(client: reqwest::Client, limit_bytes: usize) -> Self {
        Self {
            client,
            limit_bytes,
        }
    }
}

#[async_trait::async_trait]
impl Transport for Http {
    async fn send(
        &self,
        request: &OutboundRequest,
        deadline: Deadline,
    ) -> Result<RawResponse, Error> {
        let timeout = deadline.remaining_or_exceeded()?;
        let mut res = self
            .client
            .request(request.method.clone(), request.uri.clone())
            .headers(request.headers.clone())
            .body(request.body.clone())
            .timeout(timeout)
            .send()
            .await?;
        let status = res.status();
        let headers = res.headers().clone();
        let mut body = BytesMut::new();
        while let Some(chunk) = res.chunk().await? {
            if body.len() + chunk.len() > self.limit_bytes {
                return Err(Error::ResponseTooLarge {
                    limit_bytes: self.limit_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(RawResponse {
            status,
            headers,
            body: body.freeze(),
        })
    }
}
