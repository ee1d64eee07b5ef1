use {
    crate::{
        domain::fanout::{AdapterError, AdapterResult},
        infra::transport::{Error, MockTransport},
        tests::{
            self,
            setup::{Build, FakeAdapter, Parse, Reply, bid, ms, request},
        },
    },
    std::sync::Arc,
};

/// Every way a partner can fail only costs that partner its bids.
#[tokio::test(start_paused = true)]
async fn failing_adapters_do_not_affect_others() {
    let test = tests::setup()
        .adapter(FakeAdapter::new("good"))
        .adapter(FakeAdapter::new("no-build").build(Build::Fail))
        .adapter(FakeAdapter::new("build-panic").build(Build::Panic))
        .adapter(FakeAdapter::new("no-parse").parse(Parse::Fail))
        .adapter(FakeAdapter::new("parse-panic").parse(Parse::Panic))
        .reply("good", Reply::bids(ms(10), &[bid("g-1", "1.00")]))
        .reply("no-parse", Reply::bids(ms(10), &[bid("np-1", "3.00")]))
        .reply("parse-panic", Reply::bids(ms(10), &[bid("pp-1", "4.00")]))
        .done();

    let result = test
        .auction(request(&[
            "good",
            "no-build",
            "build-panic",
            "no-parse",
            "parse-panic",
        ]))
        .await;

    let outcome = result.outcome.bids().unwrap();
    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(outcome.candidates[0].bid.id, "g-1");

    let error = |name: &str| match &result.adapters[name].result {
        AdapterResult::Error(err) => err.clone(),
        other => panic!("{name}: unexpected {other:?}"),
    };
    assert!(matches!(error("no-build"), AdapterError::BadInput(_)));
    assert!(matches!(error("build-panic"), AdapterError::Panic(_)));
    assert!(matches!(error("no-parse"), AdapterError::BadServerResponse(_)));
    assert!(matches!(error("parse-panic"), AdapterError::Panic(_)));

    // A failed build never reaches the network.
    assert_eq!(test.transport().sent("no-build"), 0);
    assert_eq!(test.transport().sent("build-panic"), 0);
}

/// Each adapter's build and parse run at most once per auction, even if the
/// request names it twice.
#[tokio::test(start_paused = true)]
async fn adapters_are_called_once() {
    let test = tests::setup()
        .adapter(FakeAdapter::new("x"))
        .adapter(FakeAdapter::new("y"))
        .reply("x", Reply::bids(ms(10), &[bid("x-1", "1.00")]))
        .reply("y", Reply::no_content(ms(10)))
        .done();

    let result = test.auction(request(&["x", "y", "x"])).await;

    assert_eq!(result.adapters.len(), 2);
    for name in ["x", "y"] {
        assert_eq!(test.adapter(name).builds(), 1);
        assert_eq!(test.adapter(name).parses(), 1);
        assert_eq!(test.transport().sent(name), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn adapter_requests_run_concurrently() {
    let test = tests::setup()
        .adapter(FakeAdapter::new("multi").build(Build::Requests(3)))
        .reply("multi", Reply::bids(ms(40), &[bid("m", "1.00")]))
        .done();

    let result = test.auction(request(&["multi"])).await;

    let status = &result.adapters["multi"];
    assert_eq!(status.result.bids().len(), 3);
    assert!(status.elapsed <= ms(41), "took {:?}", status.elapsed);
    assert_eq!(test.adapter("multi").parses(), 3);
}

#[tokio::test(start_paused = true)]
async fn unknown_adapter_is_bad_input() {
    let test = tests::setup().adapter(FakeAdapter::new("x")).done();

    let result = test.auction(request(&["x", "ghost"])).await;

    assert!(matches!(
        result.adapters["ghost"].result,
        AdapterResult::Error(AdapterError::BadInput(_))
    ));
    assert!(matches!(result.adapters["x"].result, AdapterResult::NoBid));
}

#[tokio::test(start_paused = true)]
async fn transport_failures_are_contained() {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .times(1)
        .returning(|_, _| Err(Error::ResponseTooLarge { limit_bytes: 16 }));
    let test = tests::setup()
        .adapter(FakeAdapter::new("big"))
        .transport(Arc::new(transport))
        .done();

    let result = test.auction(request(&["big"])).await;

    assert!(matches!(
        result.adapters["big"].result,
        AdapterResult::Error(AdapterError::FailedToRequestBids(_))
    ));
    assert_eq!(test.adapter("big").parses(), 0);
}
