//! Turns the adapters' results into one ranked list of candidates per
//! impression.

use {
    crate::{
        domain::{
            AdapterName,
            AuctionRequest,
            Currency,
            ImpressionId,
            TypedBid,
            currency::Conversions,
            fanout::{AdapterOutcome, AdapterResult},
        },
        infra::{adapter::Registry, observe},
    },
    indexmap::IndexMap,
    rust_decimal::Decimal,
    serde::Serialize,
    std::cmp::Reverse,
};

/// The ranked auction result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionOutcome {
    /// Currency of every candidate's `price`.
    pub currency: Currency,
    /// The requested impressions, in request order.
    pub impressions: Vec<ImpressionId>,
    /// Grouped by impression in request order, best candidate first.
    pub candidates: Vec<Candidate>,
    pub dropped: Vec<DroppedBid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub adapter: AdapterName,
    pub bid: TypedBid,
    /// The bid's price converted to the auction currency and adjusted for
    /// its adapter.
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedBid {
    pub adapter: AdapterName,
    pub bid: String,
    pub impression: ImpressionId,
    pub reason: DropReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DropReason {
    UnknownImpression,
    EmptyCreative,
    NegativePrice,
    UnsupportedCurrency,
    PriceOverflow,
}

impl AuctionOutcome {
    pub fn empty(currency: Currency, impressions: Vec<ImpressionId>) -> Self {
        Self {
            currency,
            impressions,
            candidates: vec![],
            dropped: vec![],
        }
    }

    pub fn winner(&self, impression: &ImpressionId) -> Option<&Candidate> {
        self.candidates
            .iter()
            .find(|candidate| &candidate.bid.impression == impression)
    }

    /// The winning candidate of every impression that has one.
    pub fn winners(&self) -> impl Iterator<Item = &Candidate> {
        self.impressions.iter().filter_map(|imp| self.winner(imp))
    }
}

/// Per adapter bid counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub received: usize,
    pub accepted: usize,
    pub conversion_errors: usize,
}

#[derive(Debug)]
pub struct Aggregation {
    pub outcome: AuctionOutcome,
    pub tallies: IndexMap<AdapterName, Tally>,
}

/// Validates, normalises and ranks all bids.
///
/// Only [`AdapterResult::Bids`] contribute. Ranking per impression: higher
/// normalised price first, then the adapter registered earlier, then the
/// order the adapter returned its bids in.
pub fn aggregate(
    request: &AuctionRequest,
    currency: &Currency,
    results: &IndexMap<AdapterName, AdapterOutcome>,
    registry: &Registry,
    conversions: &dyn Conversions,
) -> Aggregation {
    let mut candidates = Vec::new();
    let mut dropped = Vec::new();
    let mut tallies = IndexMap::new();

    for (adapter, outcome) in results {
        let AdapterResult::Bids(bids) = &outcome.result else {
            continue;
        };
        let tally: &mut Tally = tallies.entry(adapter.clone()).or_default();
        let adjustment = registry.settings(adapter).bid_adjustment;
        for bid in bids {
            tally.received += 1;
            match normalise(request, currency, bid, adjustment, conversions) {
                Ok(price) => {
                    tally.accepted += 1;
                    candidates.push(Candidate {
                        adapter: adapter.clone(),
                        bid: bid.clone(),
                        price,
                    });
                }
                Err(reason) => {
                    if reason == DropReason::UnsupportedCurrency {
                        tally.conversion_errors += 1;
                    }
                    observe::bid_dropped(adapter, bid, reason);
                    dropped.push(DroppedBid {
                        adapter: adapter.clone(),
                        bid: bid.id.clone(),
                        impression: bid.impression.clone(),
                        reason,
                    });
                }
            }
        }
    }

    // Stable, so bids of one adapter keep the order they were returned in.
    candidates.sort_by_key(|candidate| {
        (
            request.impression_position(&candidate.bid.impression),
            Reverse(candidate.price),
            registry.rank(&candidate.adapter),
        )
    });

    Aggregation {
        outcome: AuctionOutcome {
            currency: currency.clone(),
            impressions: request.impressions.iter().map(|imp| imp.id.clone()).collect(),
            candidates,
            dropped,
        },
        tallies,
    }
}

fn normalise(
    request: &AuctionRequest,
    currency: &Currency,
    bid: &TypedBid,
    adjustment: Decimal,
    conversions: &dyn Conversions,
) -> Result<Decimal, DropReason> {
    if request.impression_position(&bid.impression).is_none() {
        return Err(DropReason::UnknownImpression);
    }
    if bid.creative.trim().is_empty() {
        return Err(DropReason::EmptyCreative);
    }
    if bid.price.is_sign_negative() && !bid.price.is_zero() {
        return Err(DropReason::NegativePrice);
    }
    let rate = conversions
        .rate(&bid.currency, currency)
        .ok_or(DropReason::UnsupportedCurrency)?;
    bid.price
        .checked_mul(rate)
        .and_then(|price| price.checked_mul(adjustment))
        .ok_or(DropReason::PriceOverflow)
}
