use {
    crate::{
        domain::{TypedBid, time::Deadline},
        infra::{
            adapter::{OutboundRequest, RawResponse},
            transport::{Error, Transport},
        },
    },
    bytes::Bytes,
    reqwest::{StatusCode, header::HeaderMap},
    std::{collections::HashMap, sync::Mutex, time::Duration},
};

/// How a fake partner answers.
#[derive(Debug, Clone)]
pub struct Reply {
    /// `None` never answers.
    delay: Option<Duration>,
    status: StatusCode,
    body: Bytes,
}

impl Reply {
    pub fn bids(delay: Duration, bids: &[TypedBid]) -> Self {
        Self {
            delay: Some(delay),
            status: StatusCode::OK,
            body: serde_json::to_vec(bids).unwrap().into(),
        }
    }

    pub fn no_content(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            status: StatusCode::NO_CONTENT,
            body: Bytes::new(),
        }
    }

    pub fn never() -> Self {
        Self {
            delay: None,
            status: StatusCode::OK,
            body: Bytes::new(),
        }
    }
}

/// Answers requests by host with canned replies. Deliberately ignores the
/// deadline it is given, like a misbehaving network would.
#[derive(Debug, Default)]
pub struct FakeTransport {
    replies: HashMap<String, Reply>,
    sent: Mutex<HashMap<String, usize>>,
}

impl FakeTransport {
    pub fn with(mut self, adapter: &str, reply: Reply) -> Self {
        self.replies.insert(format!("{adapter}.test"), reply);
        self
    }

    /// Number of requests sent to the adapter's host.
    pub fn sent(&self, adapter: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .get(&format!("{adapter}.test"))
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: &OutboundRequest, _: Deadline) -> Result<RawResponse, Error> {
        let host = request.uri.host_str().unwrap_or_default().to_owned();
        *self.sent.lock().unwrap().entry(host.clone()).or_default() += 1;
        let reply = self
            .replies
            .get(&host)
            .cloned()
            .unwrap_or_else(|| Reply::no_content(Duration::ZERO));
        match reply.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => futures::future::pending().await,
        }
        Ok(RawResponse {
            status: reply.status,
            headers: HeaderMap::new(),
            body: reply.body,
        })
    }
}
