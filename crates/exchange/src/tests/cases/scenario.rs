use crate::{
    domain::{AdapterName, fanout::AdapterResult},
    tests::{
        self,
        setup::{FakeAdapter, Reply, bid, ms, price, request},
    },
};

/// Three partners: one bids, one has nothing to offer and one never answers.
#[tokio::test(start_paused = true)]
async fn one_bid_one_no_bid_one_timeout() {
    let test = tests::setup()
        .adapter(FakeAdapter::new("x"))
        .adapter(FakeAdapter::new("y"))
        .adapter(FakeAdapter::new("z"))
        .reply("x", Reply::bids(ms(10), &[bid("x-1", "2.00")]))
        .reply("y", Reply::no_content(ms(5)))
        .reply("z", Reply::never())
        .done();

    let result = test.auction(request(&["x", "y", "z"])).await;

    let outcome = result.outcome.bids().unwrap();
    let winner = outcome.winner(&"imp-1".into()).unwrap();
    assert_eq!(winner.adapter, AdapterName::from("x"));
    assert_eq!(winner.bid.id, "x-1");
    assert_eq!(winner.price, price("2.00"));
    assert_eq!(outcome.candidates.len(), 1);

    assert!(matches!(result.adapters["x"].result, AdapterResult::Bids(_)));
    assert!(matches!(result.adapters["y"].result, AdapterResult::NoBid));
    assert!(matches!(result.adapters["z"].result, AdapterResult::Timeout));
    assert!(result.adapters["y"].warnings.is_empty());
    assert_eq!(result.adapters["x"].bids.accepted, 1);

    assert!(result.elapsed <= ms(110), "took {:?}", result.elapsed);
}

#[tokio::test(start_paused = true)]
async fn result_serializes_for_the_caller() {
    let test = tests::setup()
        .adapter(FakeAdapter::new("x"))
        .reply("x", Reply::bids(ms(10), &[bid("x-1", "1.5")]))
        .done();

    let result = test.auction(request(&["x"])).await;
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["outcome"]["kind"], "bids");
    assert_eq!(json["outcome"]["candidates"][0]["adapter"], "x");
    assert_eq!(json["adapters"]["x"]["result"]["kind"], "bids");
    assert_eq!(json["id"], "auction-1");
}

#[tokio::test(start_paused = true)]
async fn invalid_request_never_starts() {
    let test = tests::setup().adapter(FakeAdapter::new("x")).done();
    let mut request = request(&["x"]);
    request.impressions.clear();

    let result = test.auction(request).await;

    assert_eq!(result.outcome.label(), "bad_input");
    assert_eq!(test.adapter("x").builds(), 0);
    assert!(result.adapters.is_empty());
    assert!(result.hooks.is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_timeout_uses_default_and_large_ones_are_capped() {
    let test = tests::setup()
        .adapter(FakeAdapter::new("z"))
        .reply("z", Reply::never())
        .timeouts(ms(50), ms(300))
        .done();

    let mut request = request(&["z"]);
    request.tmax = None;
    let result = test.auction(request.clone()).await;
    assert!((ms(50)..=ms(51)).contains(&result.elapsed));

    request.tmax = Some(ms(10_000));
    let result = test.auction(request).await;
    assert!((ms(300)..=ms(301)).contains(&result.elapsed));
}
