mod support;

use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use ratebook::rates::{Bid, ConvertError, CurrencyConverter, RateRecord};
use support::{new_store, provider_for, seed_store, store_contents, TableApi};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn eur_gbp_table(on: NaiveDate) -> HashMap<NaiveDate, HashMap<String, f64>> {
    HashMap::from([(
        on,
        HashMap::from([("EUR".to_string(), 0.9), ("GBP".to_string(), 0.8)]),
    )])
}

#[tokio::test]
async fn identity_bids_resolve_without_store_or_provider() -> Result<()> {
    let fixture = new_store();
    let api = TableApi::empty();
    let mut converter = CurrencyConverter::open(&fixture.path, provider_for(&api))?;

    let bids = vec![
        Bid::new(date(2020, 1, 1), "EUR", "EUR"),
        Bid::new(date(2020, 1, 1), "USD", "USD"),
    ];
    let rates = converter.convert(&bids).await?;

    assert_eq!(rates, vec![1.0, 1.0]);
    assert_eq!(api.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn cached_rates_are_served_without_provider_access() -> Result<()> {
    let fixture = new_store();
    seed_store(
        &fixture,
        &[
            RateRecord::new(date(2020, 1, 1), "EUR", 0.9),
            RateRecord::new(date(2020, 1, 1), "GBP", 0.8),
        ],
    );

    let api = TableApi::empty();
    let mut converter = CurrencyConverter::open(&fixture.path, provider_for(&api))?;

    let bid = Bid::new(date(2020, 1, 1), "EUR", "GBP");
    let rates = converter.convert(std::slice::from_ref(&bid)).await?;

    assert!((rates[0] - 0.8 / 0.9).abs() < 1e-12);
    assert_eq!(api.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn misses_are_fetched_once_and_written_back() -> Result<()> {
    let fixture = new_store();
    let api = TableApi::new(eur_gbp_table(date(2020, 1, 1)));
    let mut converter = CurrencyConverter::open(&fixture.path, provider_for(&api))?;

    let bids = vec![
        Bid::new(date(2020, 1, 1), "EUR", "USD"),
        Bid::new(date(2020, 1, 1), "GBP", "USD"),
        Bid::new(date(2020, 1, 1), "EUR", "GBP"),
    ];
    let rates = converter.convert(&bids).await?;

    assert!((rates[0] - 1.0 / 0.9).abs() < 1e-12);
    assert!((rates[1] - 1.0 / 0.8).abs() < 1e-12);
    assert!((rates[2] - 0.8 / 0.9).abs() < 1e-12);

    // One request covers the whole date; the USD leg is never fetched.
    let calls = api.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, vec!["EUR".to_string(), "GBP".to_string()]);

    // The fetched legs were persisted for later sessions.
    drop(converter);
    assert_eq!(
        store_contents(&fixture),
        vec![
            RateRecord::new(date(2020, 1, 1), "EUR", 0.9),
            RateRecord::new(date(2020, 1, 1), "GBP", 0.8),
        ]
    );

    // A fresh session with a dead provider resolves entirely from the store.
    let dead = TableApi::empty();
    let mut offline = CurrencyConverter::open(&fixture.path, provider_for(&dead))?;
    let rates = offline
        .convert(&[Bid::new(date(2020, 1, 1), "EUR", "GBP")])
        .await?;
    assert!((rates[0] - 0.8 / 0.9).abs() < 1e-12);
    assert_eq!(dead.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn one_unresolved_leg_fails_the_whole_batch() -> Result<()> {
    let fixture = new_store();
    // The provider knows EUR but not GBP on this date.
    let api = TableApi::new(HashMap::from([(
        date(2020, 1, 1),
        HashMap::from([("EUR".to_string(), 0.9)]),
    )]));
    let mut converter = CurrencyConverter::open(&fixture.path, provider_for(&api))?;

    let bids = vec![
        Bid::new(date(2020, 1, 1), "EUR", "USD"),
        Bid::new(date(2020, 1, 1), "GBP", "USD"),
    ];
    let error = converter.convert(&bids).await.unwrap_err();
    assert!(matches!(
        error,
        ConvertError::Unresolved { symbol, .. } if symbol == "GBP"
    ));

    // The resolved EUR leg was still written back.
    drop(converter);
    assert_eq!(
        store_contents(&fixture),
        vec![RateRecord::new(date(2020, 1, 1), "EUR", 0.9)]
    );
    Ok(())
}

#[tokio::test]
async fn distinct_dates_trigger_one_fetch_each() -> Result<()> {
    let fixture = new_store();
    let mut table = eur_gbp_table(date(2020, 1, 1));
    table.extend(eur_gbp_table(date(2020, 1, 2)));
    let api = TableApi::new(table);
    let mut converter = CurrencyConverter::open(&fixture.path, provider_for(&api))?;

    let bids = vec![
        Bid::new(date(2020, 1, 1), "EUR", "GBP"),
        Bid::new(date(2020, 1, 2), "EUR", "GBP"),
    ];
    converter.convert(&bids).await?;

    assert_eq!(api.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn totals_are_converted_into_the_target_currency() -> Result<()> {
    let fixture = new_store();
    let api = TableApi::new(eur_gbp_table(date(2020, 1, 1)));
    let mut converter = CurrencyConverter::open(&fixture.path, provider_for(&api))?;

    let dates = vec![date(2020, 1, 1), date(2020, 1, 1)];
    let currencies = vec!["EUR".to_string(), "GBP".to_string()];
    let totals = vec![90.0, 80.0];

    let converted = converter
        .convert_totals(&dates, &currencies, &totals, "USD")
        .await?;

    // 90 EUR at 0.9 EUR/USD and 80 GBP at 0.8 GBP/USD are both 100 USD.
    assert!((converted[0] - 100.0).abs() < 1e-9);
    assert!((converted[1] - 100.0).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn repeated_conversion_is_served_from_the_memo() -> Result<()> {
    let fixture = new_store();
    let api = TableApi::new(eur_gbp_table(date(2020, 1, 1)));
    let mut converter = CurrencyConverter::open(&fixture.path, provider_for(&api))?;

    let bid = Bid::new(date(2020, 1, 1), "EUR", "GBP");
    converter.convert(std::slice::from_ref(&bid)).await?;
    converter.convert(std::slice::from_ref(&bid)).await?;
    converter.convert(std::slice::from_ref(&bid)).await?;

    assert_eq!(api.call_count(), 1);
    Ok(())
}
