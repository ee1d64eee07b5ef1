use crate::{
    domain::hooks::{HookId, Stage},
    infra::config,
};

/// Test that the example configuration file is valid and describes what it
/// claims to.
#[tokio::test]
async fn test() {
    let example_config_file = std::env::current_dir().unwrap().join("example.toml");
    let config = config::file::load(&example_config_file).await.unwrap();

    assert_eq!(config.adapters.len(), 2);
    assert_eq!(config.adapters[1].timeout, Some(std::time::Duration::from_millis(120)));
    assert_eq!(config.rates.len(), 2);

    let raw = config
        .plans
        .groups("/openrtb2/auction", None, Stage::RawAuctionRequest);
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].hooks[0], HookId::new("privacy", "strip-consent"));
    assert_eq!(
        config
            .plans
            .groups("/openrtb2/auction", Some("publisher-1"), Stage::RawBidderResponse)
            .len(),
        1
    );
    assert_eq!(
        config
            .plans
            .groups("/openrtb2/auction", Some("publisher-1"), Stage::AllProcessedBidResponses)
            .len(),
        0
    );

    // The exchange can be assembled from it.
    crate::exchange(&config).unwrap();
}
