//! A config driven adapter for partners that speak a plain JSON dialect.
//!
//! The request is a trimmed down copy of the auction request:
//!
//! ```json
//! { "id": "...", "imp": [{ "id": "...", "media": ["banner"], "ext": {} }], "consent": {}, "tmax": 100 }
//! ```
//!
//! The partner answers with `204 No Content` or:
//!
//! ```json
//! { "cur": "USD", "bids": [{ "id": "...", "impid": "...", "price": "1.5", "adm": "<div/>", "mtype": "banner" }] }
//! ```

use {
    super::{Adapter, OutboundRequest, RawResponse},
    crate::domain::{
        AdapterName,
        AuctionRequest,
        Currency,
        ImpressionId,
        TypedBid,
        auction::{MediaType, VideoInfo},
    },
    anyhow::{Context, anyhow},
    reqwest::{
        Method,
        header::{CONTENT_TYPE, HeaderMap, HeaderValue},
    },
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    url::Url,
};

#[derive(Debug, Clone)]
pub struct Generic {
    name: AdapterName,
    endpoint: Url,
}

impl Generic {
    pub fn new(name: AdapterName, endpoint: Url) -> Self {
        Self { name, endpoint }
    }
}

impl Adapter for Generic {
    fn build_requests(
        &self,
        request: &AuctionRequest,
    ) -> (Vec<OutboundRequest>, Vec<anyhow::Error>) {
        let body = dto::Request {
            id: request.id.0.as_str(),
            imp: request
                .impressions
                .iter()
                .map(|imp| dto::Imp {
                    id: &imp.id,
                    media: &imp.media,
                    ext: imp.ext.get(&self.name.0),
                })
                .collect(),
            consent: request.consent.as_ref(),
            tmax: request
                .tmax
                .map(|tmax| u64::try_from(tmax.as_millis()).unwrap_or(u64::MAX)),
        };
        let body = match serde_json::to_vec(&body) {
            Ok(body) => body,
            Err(err) => return (vec![], vec![anyhow!(err).context("serializing request")]),
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let outbound = OutboundRequest {
            method: Method::POST,
            uri: self.endpoint.clone(),
            headers,
            body: body.into(),
            impressions: request.impressions.iter().map(|imp| imp.id.clone()).collect(),
        };
        (vec![outbound], vec![])
    }

    fn parse_response(
        &self,
        request: &OutboundRequest,
        response: &RawResponse,
    ) -> (Vec<TypedBid>, Vec<anyhow::Error>) {
        if response.is_no_content() {
            return (vec![], vec![]);
        }
        if !response.status.is_success() {
            return (
                vec![],
                vec![anyhow!("unexpected status code {}", response.status)],
            );
        }
        let parsed: dto::Response = match serde_json::from_slice(&response.body)
            .context("malformed response body")
        {
            Ok(parsed) => parsed,
            Err(err) => return (vec![], vec![err]),
        };

        let currency = parsed.cur.unwrap_or_else(Currency::usd);
        let mut bids = Vec::with_capacity(parsed.bids.len());
        let mut errors = Vec::new();
        for bid in parsed.bids {
            if !request.impressions.contains(&bid.impid) {
                errors.push(anyhow!(
                    "bid {} is for impression {} which was not requested",
                    bid.id,
                    bid.impid
                ));
                continue;
            }
            let video = match (bid.mtype, bid.dur) {
                (MediaType::Video, Some(duration)) => Some(VideoInfo {
                    duration,
                    primary_category: bid.cat.into_iter().next(),
                }),
                _ => None,
            };
            bids.push(TypedBid {
                id: bid.id,
                impression: bid.impid,
                price: bid.price,
                currency: currency.clone(),
                media_type: bid.mtype,
                creative: bid.adm,
                creative_id: bid.crid,
                video,
            });
        }
        (bids, errors)
    }
}

mod dto {
    use super::*;

    #[derive(Serialize)]
    pub struct Request<'a> {
        pub id: &'a str,
        pub imp: Vec<Imp<'a>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub consent: Option<&'a serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub tmax: Option<u64>,
    }

    #[derive(Serialize)]
    pub struct Imp<'a> {
        pub id: &'a ImpressionId,
        pub media: &'a [MediaType],
        #[serde(skip_serializing_if = "Option::is_none")]
        pub ext: Option<&'a serde_json::Value>,
    }

    #[derive(Deserialize)]
    pub struct Response {
        pub cur: Option<Currency>,
        #[serde(default)]
        pub bids: Vec<Bid>,
    }

    #[derive(Deserialize)]
    pub struct Bid {
        pub id: String,
        pub impid: ImpressionId,
        /// JSON number or string.
        pub price: Decimal,
        pub adm: String,
        pub crid: Option<String>,
        pub mtype: MediaType,
        pub dur: Option<u32>,
        #[serde(default)]
        pub cat: Vec<String>,
    }
}
