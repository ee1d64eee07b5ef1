use {
    crate::{
        domain::AdapterName,
        infra::adapter::Settings,
        tests::{
            self,
            setup::{FakeAdapter, Reply, bid, bid_in, ms, price, request},
        },
    },
    std::collections::HashSet,
};

/// Equal prices are resolved by configuration order, the same way on every
/// run and regardless of who answered first.
#[tokio::test(start_paused = true)]
async fn ties_break_by_configuration_order() {
    let test = tests::setup()
        .adapter(FakeAdapter::new("first"))
        .adapter(FakeAdapter::new("second"))
        .reply("first", Reply::bids(ms(30), &[bid("f-1", "1.50")]))
        .reply("second", Reply::bids(ms(5), &[bid("s-1", "1.50")]))
        .done();

    let mut winners = HashSet::new();
    for _ in 0..10 {
        let result = test.auction(request(&["second", "first"])).await;
        let winner = result
            .outcome
            .bids()
            .unwrap()
            .winner(&"imp-1".into())
            .unwrap()
            .adapter
            .clone();
        winners.insert(winner);
    }

    assert_eq!(winners, HashSet::from([AdapterName::from("first")]));
}

/// 1.40 EUR at 1.10 USD/EUR is worth 1.54 USD and beats 1.50 USD.
#[tokio::test(start_paused = true)]
async fn prices_compare_in_auction_currency() {
    let test = tests::setup()
        .adapter(FakeAdapter::new("dollars"))
        .adapter(FakeAdapter::new("euros"))
        .rate("EUR", "USD", price("1.10"))
        .reply("dollars", Reply::bids(ms(10), &[bid("d-1", "1.50")]))
        .reply("euros", Reply::bids(ms(10), &[bid_in("e-1", "1.40", "EUR")]))
        .done();

    let result = test.auction(request(&["dollars", "euros"])).await;

    let outcome = result.outcome.bids().unwrap();
    let winner = outcome.winner(&"imp-1".into()).unwrap();
    assert_eq!(winner.bid.id, "e-1");
    assert_eq!(winner.price, price("1.54"));
    assert_eq!(winner.bid.price, price("1.40"));
    assert_eq!(outcome.candidates[1].bid.id, "d-1");
}

#[tokio::test(start_paused = true)]
async fn unconvertible_bids_count_against_their_adapter() {
    let test = tests::setup()
        .adapter(FakeAdapter::new("yen"))
        .reply(
            "yen",
            Reply::bids(
                ms(10),
                &[bid_in("y-1", "150", "JPY"), bid_in("y-2", "1.00", "USD")],
            ),
        )
        .done();

    let result = test.auction(request(&["yen"])).await;

    let tally = result.adapters["yen"].bids;
    assert_eq!((tally.received, tally.accepted, tally.conversion_errors), (2, 1, 1));
    assert_eq!(result.outcome.bids().unwrap().dropped.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn bid_adjustment_applies_before_ranking() {
    let test = tests::setup()
        .adapter_with(
            FakeAdapter::new("discounted"),
            Settings {
                bid_adjustment: price("0.5"),
                ..Default::default()
            },
        )
        .adapter(FakeAdapter::new("plain"))
        .reply("discounted", Reply::bids(ms(10), &[bid("d-1", "3.00")]))
        .reply("plain", Reply::bids(ms(10), &[bid("p-1", "2.00")]))
        .done();

    let result = test.auction(request(&["discounted", "plain"])).await;

    let outcome = result.outcome.bids().unwrap();
    assert_eq!(outcome.candidates[0].bid.id, "p-1");
    assert_eq!(outcome.candidates[1].price, price("1.5"));
}
