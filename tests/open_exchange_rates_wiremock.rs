use anyhow::Result;
use chrono::NaiveDate;
use ratebook::credentials::Credential;
use ratebook::rates::providers::OpenExchangeRatesApi;
use ratebook::rates::{RateApi, RateProvider, UsdBid};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SAMPLE_HISTORICAL: &str = r#"{
    "disclaimer": "Usage subject to terms",
    "timestamp": 1577923199,
    "base": "USD",
    "rates": {
        "EUR": 0.9,
        "GBP": 0.8
    }
}"#;

const SAMPLE_ERROR: &str = r#"{
    "error": true,
    "status": 401,
    "message": "invalid_app_id",
    "description": "Invalid App ID provided."
}"#;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn symbols() -> Vec<String> {
    vec!["EUR".to_string(), "GBP".to_string()]
}

#[tokio::test]
async fn historical_request_is_parsed_into_rates() -> Result<()> {
    let server = MockServer::start().await;
    let api = OpenExchangeRatesApi::new(0).with_base_url(server.uri());

    Mock::given(method("GET"))
        .and(path("/historical/2020-01-01.json"))
        .and(query_param("app_id", "test-key"))
        .and(query_param("base", "USD"))
        .and(query_param("symbols", "EUR,GBP"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SAMPLE_HISTORICAL, "application/json"))
        .mount(&server)
        .await;

    let rates = api
        .historical(&Credential::new("test-key"), date(2020, 1, 1), &symbols())
        .await
        .expect("expected rates");

    assert_eq!(rates.len(), 2);
    assert!((rates["EUR"] - 0.9).abs() < 1e-12);
    Ok(())
}

#[tokio::test]
async fn vendor_error_envelope_is_a_provider_failure() -> Result<()> {
    let server = MockServer::start().await;
    let api = OpenExchangeRatesApi::new(0).with_base_url(server.uri());

    Mock::given(method("GET"))
        .and(path("/historical/2020-01-01.json"))
        .respond_with(ResponseTemplate::new(401).set_body_raw(SAMPLE_ERROR, "application/json"))
        .mount(&server)
        .await;

    let rates = api
        .historical(&Credential::new("bad-key"), date(2020, 1, 1), &symbols())
        .await;
    assert!(rates.is_none());
    Ok(())
}

#[tokio::test]
async fn retryable_status_is_retried_then_succeeds() -> Result<()> {
    let server = MockServer::start().await;
    let api = OpenExchangeRatesApi::new(2).with_base_url(server.uri());

    Mock::given(method("GET"))
        .and(path("/historical/2020-01-01.json"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/historical/2020-01-01.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SAMPLE_HISTORICAL, "application/json"))
        .mount(&server)
        .await;

    let rates = api
        .historical(&Credential::new("test-key"), date(2020, 1, 1), &symbols())
        .await
        .expect("expected rates after retry");
    assert!((rates["GBP"] - 0.8).abs() < 1e-12);
    Ok(())
}

#[tokio::test]
async fn retry_exhaustion_registers_an_account_failure() -> Result<()> {
    let server = MockServer::start().await;
    let api = OpenExchangeRatesApi::new(2).with_base_url(server.uri());

    // One initial attempt plus two retries.
    Mock::given(method("GET"))
        .and(path("/historical/2020-01-01.json"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let mut provider = RateProvider::new(Box::new(api), vec![Credential::new("test-key")]);
    let bids = vec![UsdBid::new(date(2020, 1, 1), "EUR")];
    assert!(provider.rates(&bids).await.is_none());
    assert_eq!(provider.accounts()[0].failed_accesses, 1);
    assert_eq!(provider.accounts()[0].subsequent_failures, 1);
    Ok(())
}

#[tokio::test]
async fn currency_catalog_is_listed() -> Result<()> {
    let server = MockServer::start().await;
    let api = OpenExchangeRatesApi::new(0).with_base_url(server.uri());

    let body = r#"{"EUR": "Euro", "GBP": "British Pound Sterling"}"#;
    Mock::given(method("GET"))
        .and(path("/currencies.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;

    let mut catalog = api
        .currencies(&Credential::new("test-key"))
        .await
        .expect("expected catalog");
    catalog.sort();
    assert_eq!(catalog, vec!["EUR", "GBP"]);
    Ok(())
}
