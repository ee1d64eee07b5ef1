use {
    crate::{
        domain::{AdapterName, AuctionRequest, TypedBid},
        infra::adapter::{Adapter, OutboundRequest, RawResponse},
    },
    anyhow::anyhow,
    reqwest::{Method, header::HeaderMap},
    std::{
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    },
};

#[derive(Debug, Clone, Copy)]
pub enum Build {
    /// Build this many requests.
    Requests(usize),
    Fail,
    Panic,
    /// Blocks the calling thread for this long, then builds one request.
    Blocking(Duration),
}

#[derive(Debug, Clone, Copy)]
pub enum Parse {
    /// The response body is a JSON list of [`TypedBid`]s.
    Bids,
    Fail,
    Panic,
}

/// An adapter that talks to `http://{name}.test/` and records how it was
/// used.
pub struct FakeAdapter {
    pub name: AdapterName,
    build: Build,
    parse: Parse,
    builds: AtomicUsize,
    parses: AtomicUsize,
    consent: Mutex<Vec<Option<serde_json::Value>>>,
}

impl FakeAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            build: Build::Requests(1),
            parse: Parse::Bids,
            builds: Default::default(),
            parses: Default::default(),
            consent: Default::default(),
        }
    }

    pub fn build(self, build: Build) -> Self {
        Self { build, ..self }
    }

    pub fn parse(self, parse: Parse) -> Self {
        Self { parse, ..self }
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn parses(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    /// The consent signal of every request this adapter built for.
    pub fn seen_consent(&self) -> Vec<Option<serde_json::Value>> {
        self.consent.lock().unwrap().clone()
    }
}

impl Adapter for FakeAdapter {
    fn build_requests(
        &self,
        request: &AuctionRequest,
    ) -> (Vec<OutboundRequest>, Vec<anyhow::Error>) {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.consent.lock().unwrap().push(request.consent.clone());
        let count = match self.build {
            Build::Requests(n) => n,
            Build::Fail => return (vec![], vec![anyhow!("missing placement id")]),
            Build::Panic => panic!("{} failed to build", self.name),
            Build::Blocking(duration) => {
                std::thread::sleep(duration);
                1
            }
        };
        let requests = (0..count)
            .map(|i| OutboundRequest {
                method: Method::POST,
                uri: format!("http://{}.test/bid/{i}", self.name).parse().unwrap(),
                headers: HeaderMap::new(),
                body: Default::default(),
                impressions: request.impressions.iter().map(|imp| imp.id.clone()).collect(),
            })
            .collect();
        (requests, vec![])
    }

    fn parse_response(
        &self,
        _: &OutboundRequest,
        response: &RawResponse,
    ) -> (Vec<TypedBid>, Vec<anyhow::Error>) {
        self.parses.fetch_add(1, Ordering::SeqCst);
        match self.parse {
            Parse::Bids if response.is_no_content() => (vec![], vec![]),
            Parse::Bids => match serde_json::from_slice(&response.body) {
                Ok(bids) => (bids, vec![]),
                Err(err) => (vec![], vec![err.into()]),
            },
            Parse::Fail => (vec![], vec![anyhow!("unexpected response format")]),
            Parse::Panic => panic!("{} failed to parse", self.name),
        }
    }
}
