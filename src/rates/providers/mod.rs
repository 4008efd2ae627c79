pub mod currency_layer;
pub mod open_exchange_rates;

pub use currency_layer::CurrencyLayerApi;
pub use open_exchange_rates::OpenExchangeRatesApi;
