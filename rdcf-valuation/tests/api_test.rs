//! HTTP API tests against an in-memory fundamentals provider.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use rdcf_common::config::Config;
use rdcf_valuation::data::{
    GrowthPeriod, MarketDataProvider, MarketSnapshot, ProviderError, StatementBasis,
};
use rdcf_valuation::{build_router, ValuationState};
use std::io::Write;
use std::sync::Arc;
use tower::ServiceExt;

// ============================================================================
// Test Provider
// ============================================================================

struct StaticProvider;

fn nestle_snapshot() -> MarketSnapshot {
    MarketSnapshot {
        symbol: "NESTLEIND".into(),
        company_name: Some("Nestle India Ltd".into()),
        exchange_symbol: Some("NESTLEIND".into()),
        basis: StatementBasis::Consolidated,
        current_pe: 72.4,
        forward_pe: 61.0,
        market_cap: 239_776.0,
        latest_annual_net_profit: 3933.0,
        latest_fiscal_year: "Mar 2024".into(),
        historical_roce: 135.0,
        roce_history: vec![62.0, 68.0, 140.0, 135.0, 141.0, 135.0],
        sales_growth: vec![GrowthPeriod {
            label: "5 Years".into(),
            percent: Some(10.0),
        }],
        profit_growth: vec![GrowthPeriod {
            label: "5 Years".into(),
            percent: Some(19.0),
        }],
        fetched_at: Utc::now(),
    }
}

#[async_trait]
impl MarketDataProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self, symbol: &str) -> Result<MarketSnapshot, ProviderError> {
        match symbol.to_uppercase().as_str() {
            "NESTLEIND" => Ok(nestle_snapshot()),
            "LOSSMAKER" => Ok(MarketSnapshot {
                symbol: "LOSSMAKER".into(),
                current_pe: f64::NAN,
                ..nestle_snapshot()
            }),
            "BUSY" => Err(ProviderError::RateLimited {
                retry_after_secs: Some(5),
            }),
            "BLANK" => Err(ProviderError::MissingField {
                field: "Stock P/E".into(),
            }),
            other => Err(ProviderError::NotFound(other.to_string())),
        }
    }
}

fn test_app() -> Router {
    test_app_with_config(Config::default())
}

fn test_app_with_config(config: Config) -> Router {
    build_router(Arc::new(ValuationState::with_provider(
        config,
        Arc::new(StaticProvider),
    )))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str, body: Option<&str>) -> Request<Body> {
    let builder = Request::builder().method("POST").uri(uri);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

// ============================================================================
// Market Snapshot
// ============================================================================

#[tokio::test]
async fn market_snapshot_is_returned() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/v1/market/NESTLEIND")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["current_pe"], 72.4);
    assert_eq!(json["forward_pe"], 61.0);
    assert_eq!(json["basis"], "consolidated");
}

#[tokio::test]
async fn unknown_symbol_is_not_found() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/v1/market/NOSUCH")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "SYMBOL_NOT_FOUND");
}

// ============================================================================
// Symbol Valuation
// ============================================================================

#[tokio::test]
async fn symbol_valuation_with_defaults() {
    let response = test_app()
        .oneshot(post("/api/v1/valuation/NESTLEIND", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["valuation"]["display_pe"], 14.97);
    assert_eq!(json["overvaluation"]["reference"], "forward");
    assert_eq!(json["overvaluation"]["reference_multiple"], 61.0);
    // (61 / 14.9727 - 1) * 100 = 307.41
    assert_eq!(json["overvaluation"]["display_percent"], 307);
    assert_eq!(json["snapshot"]["symbol"], "NESTLEIND");
    assert!(json["trace_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn symbol_valuation_with_historical_roce() {
    let response = test_app()
        .oneshot(post(
            "/api/v1/valuation/NESTLEIND?ledger=true",
            Some(r#"{"use_historical_roce": true}"#),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["valuation"]["params"]["pre_tax_roce_pct"], 135.0);
    assert_eq!(json["valuation"]["display_pe"], 34.19);
    assert_eq!(json["overvaluation"]["display_percent"], 78);
    // 135% is outside the 10-100% input range
    assert_eq!(json["valuation"]["warnings"].as_array().unwrap().len(), 1);
    assert_eq!(
        json["valuation"]["projection"]["years"].as_array().unwrap().len(),
        31
    );
}

#[tokio::test]
async fn symbol_valuation_with_overrides() {
    let response = test_app()
        .oneshot(post(
            "/api/v1/valuation/NESTLEIND",
            Some(r#"{"params": {"cost_of_capital_pct": 10}}"#),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["valuation"]["display_pe"], 27.42);
}

#[tokio::test]
async fn symbol_valuation_rejects_invalid_configuration_before_scoring() {
    let response = test_app()
        .oneshot(post(
            "/api/v1/valuation/NESTLEIND",
            Some(r#"{"params": {"cost_of_capital_pct": 4}}"#),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "INVALID_CONFIGURATION");
    assert!(json.get("overvaluation").is_none());
}

#[tokio::test]
async fn symbol_valuation_rejects_malformed_body() {
    let response = test_app()
        .oneshot(post(
            "/api/v1/valuation/NESTLEIND",
            Some(r#"{"params": {"cost_of_capital_pct": "fifteen", "explicit_growth_years": -3}}"#),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "INVALID_REQUEST");
    assert!(json.get("valuation").is_none());
}

#[tokio::test]
async fn symbol_valuation_accepts_blank_body() {
    let response = test_app()
        .oneshot(post("/api/v1/valuation/NESTLEIND", Some("")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["valuation"]["display_pe"], 14.97);
}

#[tokio::test]
async fn non_finite_multiple_is_unprocessable() {
    let response = test_app()
        .oneshot(post("/api/v1/valuation/LOSSMAKER", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "INVALID_MULTIPLE");
}

#[tokio::test]
async fn provider_failures_map_to_status_codes() {
    let cases = [
        ("BUSY", StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
        ("BLANK", StatusCode::BAD_GATEWAY, "MISSING_FIELD"),
        ("NOSUCH", StatusCode::NOT_FOUND, "SYMBOL_NOT_FOUND"),
    ];

    for (symbol, status, code) in cases {
        let response = test_app()
            .oneshot(post(&format!("/api/v1/valuation/{}", symbol), None))
            .await
            .unwrap();

        assert_eq!(response.status(), status, "{}", symbol);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], code);
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn configured_defaults_are_served_and_used() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"valuation": {{"cost_of_capital_pct": 10, "terminal_discounting": "one_period_later"}}}}"#
    )
    .unwrap();
    let config = Config::load_from(file.path()).unwrap();

    let app = test_app_with_config(config);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/valuation/defaults")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["params"]["cost_of_capital_pct"], 10.0);
    assert_eq!(json["params"]["pre_tax_roce_pct"], 20.0);
    assert_eq!(json["terminal_discounting"], "one_period_later");

    let response = app
        .oneshot(post("/api/v1/valuation/intrinsic-pe", Some("{}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["params"]["cost_of_capital_pct"], 10.0);
    // one extra discount period lowers the result below the at-horizon value
    assert!(json["intrinsic_pe"].as_f64().unwrap() < 27.424_594);
}
