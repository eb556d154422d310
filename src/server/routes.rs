use crate::errors::{ForecastError, ForecastResult};
use crate::forecast::features::{parse_feature_csv, CSV_TEMPLATE};
use crate::forecast::{FeatureRecord, ModelId, PromptVersion, Provider, SalesCategory};
use crate::scoring::{self, rules};
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Json};
use portable_atomic::Ordering::Relaxed;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, serde::Deserialize)]
pub struct PredictRequest {
    pub features: Option<FeatureRecord>,
    pub model: Option<ModelId>,
    pub version: Option<PromptVersion>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    /// When known, the response also carries the per-record score.
    pub true_class: Option<SalesCategory>,
}

#[derive(Debug, serde::Deserialize)]
pub struct SelectionQuery {
    pub model: ModelId,
    pub version: PromptVersion,
}

/// POST /api/predict -- one feature record, one provider call
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> ForecastResult<Json<Value>> {
    state.counters.predictions_requested.fetch_add(1, Relaxed);

    let outcome = run_prediction(&state, payload).await;
    match &outcome {
        Ok(_) => {
            state.counters.predictions_succeeded.fetch_add(1, Relaxed);
        }
        Err(e) => state.counters.record_failure(e),
    }
    outcome
}

async fn run_prediction(
    state: &AppState,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> ForecastResult<Json<Value>> {
    let Json(req) = payload.map_err(|e| ForecastError::Validation(e.body_text()))?;

    let (features, model, version) = match (req.features, req.model, req.version) {
        (Some(f), Some(m), Some(v)) => (f, m, v),
        _ => {
            return Err(ForecastError::Validation(
                "Missing required fields: features, model, version".into(),
            ))
        }
    };

    let provider = model.provider();
    let credential = match provider {
        Provider::Anthropic => non_empty(req.anthropic_api_key)
            .ok_or_else(|| ForecastError::Validation("Anthropic API key required for Claude Haiku".into()))?,
        Provider::OpenAi { .. } => non_empty(req.openai_api_key)
            .ok_or_else(|| ForecastError::Validation("OpenAI API key required for GPT models".into()))?,
    };

    let request_id = uuid::Uuid::new_v4();
    tracing::info!(%request_id, model = %model, version = %version, month = %features.month, "prediction requested");

    let result = match state.predictor.predict(&features, version, provider, &credential).await {
        Ok(r) => r,
        Err(e) => {
            if let ForecastError::Provider { provider, status, .. } = &e {
                tracing::error!(%request_id, provider = *provider, status = ?status, error = %e, "provider call failed");
            } else {
                tracing::error!(%request_id, model = %model, version = %version, error = %e, "prediction failed");
            }
            return Err(e);
        }
    };

    tracing::info!(
        %request_id,
        pred_class = %result.pred_class,
        prob_l = result.prob_l,
        prob_m = result.prob_m,
        prob_h = result.prob_h,
        "prediction complete"
    );

    let body = match req.true_class {
        Some(truth) => json!({ "result": result, "score": rules::score_prediction(&result, truth) }),
        None => json!({ "result": result }),
    };
    Ok(Json(body))
}

fn non_empty(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

fn selection(query: Result<Query<SelectionQuery>, QueryRejection>) -> ForecastResult<SelectionQuery> {
    query
        .map(|Query(q)| q)
        .map_err(|e| ForecastError::Validation(e.body_text()))
}

/// POST /api/features/parse -- uploaded CSV text to a feature record
pub async fn parse_features(body: String) -> ForecastResult<Json<Value>> {
    let features = parse_feature_csv(&body)?;
    Ok(Json(json!({ "features": features })))
}

/// GET /api/features/template -- downloadable CSV template
pub async fn get_template() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"health_food_template.csv\""),
        ],
        CSV_TEMPLATE,
    )
}

/// GET /api/results?model=..&version=..
pub async fn get_results(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SelectionQuery>, QueryRejection>,
) -> ForecastResult<Json<Value>> {
    let q = selection(query)?;
    let rows = state.store.load_results(q.model, q.version).await?;
    Ok(Json(json!({ "results": rows.as_slice() })))
}

/// GET /api/results/all -- every model/strategy pair
pub async fn get_all_results(State(state): State<Arc<AppState>>) -> ForecastResult<Json<Value>> {
    let rows = state.store.load_all_results().await?;
    Ok(Json(json!({ "results": rows })))
}

/// GET /api/stats?model=..&version=..
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SelectionQuery>, QueryRejection>,
) -> ForecastResult<Json<scoring::Stats>> {
    let q = selection(query)?;
    let rows = state.store.load_results(q.model, q.version).await?;
    Ok(Json(scoring::compute_stats(&rows)))
}

/// GET /api/comparison -- model × strategy summary
pub async fn get_comparison(State(state): State<Arc<AppState>>) -> ForecastResult<Json<Value>> {
    let all = state.store.load_all_results().await?;
    Ok(Json(json!({ "rows": scoring::compare_models(&all) })))
}

/// GET /api/distribution?model=..&version=..
pub async fn get_distribution(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SelectionQuery>, QueryRejection>,
) -> ForecastResult<Json<Value>> {
    let q = selection(query)?;
    let (rows, truth) = tokio::try_join!(
        state.store.load_results(q.model, q.version),
        state.store.load_ground_truth(),
    )?;
    Ok(Json(json!({ "months": scoring::month_distribution(&rows, &truth) })))
}

/// GET /api/ground-truth
pub async fn get_ground_truth(State(state): State<Arc<AppState>>) -> ForecastResult<Json<Value>> {
    let truth = state.store.load_ground_truth().await?;
    Ok(Json(json!(truth.as_ref())))
}

/// GET /api/ablation
pub async fn get_ablation(State(state): State<Arc<AppState>>) -> ForecastResult<Json<Value>> {
    let rows = state.store.load_ablation().await?;
    Ok(Json(json!({ "rows": rows.as_slice() })))
}

/// POST /api/cache/clear -- drop every cached result file
pub async fn clear_cache(State(state): State<Arc<AppState>>) -> ForecastResult<Json<Value>> {
    state.store.clear()?;
    state.counters.cache_clears.fetch_add(1, Relaxed);
    Ok(Json(json!({ "cleared": true })))
}

/// GET /api/counters -- request counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(state.counters.snapshot())
}

#[cfg(test)]
mod tests {
    use crate::config::AppConfig;
    use crate::llm::predictor::tests::spawn_stub;
    use crate::server::router;
    use crate::state::AppState;
    use crate::store::tests::write_fixtures;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state(results_dir: &Path, llm_base: &str) -> Arc<AppState> {
        AppState::new(AppConfig {
            results_dir: results_dir.to_path_buf(),
            static_dir: results_dir.join("dist"),
            openai_base_url: format!("{llm_base}/openai"),
            anthropic_base_url: format!("{llm_base}/anthropic"),
            anthropic_version: "2023-06-01".into(),
            llm_timeout: Some(std::time::Duration::from_secs(5)),
            server_port: 0,
        })
    }

    async fn call(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn features() -> Value {
        json!({
            "month": "2025-11",
            "avg_temp_taipei": 18.5,
            "epidemic_index": 45.2,
            "gt_flu": 62,
            "gt_cold": 55,
            "gt_immunity": 48,
            "gt_competitor_total": 120,
            "has_bundle_promo": true,
            "bundle_discount_rate": 0.3,
            "bundle_start_date": "2025-11-05",
            "bundle_duration_days": 14,
            "has_bulk_promo": false,
            "bulk_discount_rate": 0,
            "season_event_tag": "",
            "historical_sales": [
                {"month": "2025-08", "qty": 668},
                {"month": "2025-09", "qty": 316},
                {"month": "2025-10", "qty": 904}
            ]
        })
    }

    #[tokio::test]
    async fn test_predict_success() {
        let tmp = tempfile::tempdir().unwrap();
        let (base, seen) = spawn_stub(r#"{"prob_L":0.1,"prob_M":0.7,"prob_H":0.2}"#, "").await;
        let state = test_state(tmp.path(), &base);

        let (status, body) = call(
            &state,
            post_json(
                "/api/predict",
                json!({"features": features(), "model": "mini", "version": "vA", "openai_api_key": "sk-test"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["pred_class"], "Mid");
        assert_eq!(body["result"]["prob_M"], 0.7);
        assert!(body.get("score").is_none());
        assert_eq!(seen.lock().unwrap()[0].3["model"], "gpt-4o-mini");
        assert_eq!(state.counters.snapshot()["predictions_succeeded"], 1);
    }

    #[tokio::test]
    async fn test_predict_with_true_class_scores() {
        let tmp = tempfile::tempdir().unwrap();
        let (base, _) = spawn_stub("", r#"{"step1_reasoning":"ok","prob_L":0.0,"prob_M":0.0,"prob_H":1.0}"#).await;
        let state = test_state(tmp.path(), &base);

        let (status, body) = call(
            &state,
            post_json(
                "/api/predict",
                json!({
                    "features": features(), "model": "haiku", "version": "vB",
                    "anthropic_api_key": "sk-ant", "true_class": "High"
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["step1_b"], "ok");
        assert_eq!(body["score"]["correct"], 1);
        assert_eq!(body["score"]["rps"], 0.0);
    }

    #[tokio::test]
    async fn test_predict_missing_fields_is_400() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), "http://127.0.0.1:9");

        let (status, body) = call(&state, post_json("/api/predict", json!({"model": "gpt-4o", "version": "vA"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields: features, model, version");

        let (status, _) = call(&state, post_json("/api/predict", json!({"features": features(), "model": "gpt-4o"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_predict_missing_credential_is_400() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), "http://127.0.0.1:9");

        let (status, body) = call(
            &state,
            post_json(
                "/api/predict",
                json!({"features": features(), "model": "haiku", "version": "vA", "openai_api_key": "sk-test"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Anthropic API key required for Claude Haiku");

        let (status, body) = call(
            &state,
            post_json(
                "/api/predict",
                json!({"features": features(), "model": "gpt-4o", "version": "vA", "openai_api_key": "  "}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "OpenAI API key required for GPT models");
        assert_eq!(state.counters.snapshot()["validation_errors"], 2);
    }

    #[tokio::test]
    async fn test_predict_upstream_failures_are_500() {
        let tmp = tempfile::tempdir().unwrap();
        let (base, _) = spawn_stub("not json", "").await;
        let state = test_state(tmp.path(), &base);

        let (status, body) = call(
            &state,
            post_json(
                "/api/predict",
                json!({"features": features(), "model": "gpt-4o", "version": "vA", "openai_api_key": "sk-test"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to parse model output: not json");

        let (status, body) = call(
            &state,
            post_json(
                "/api/predict",
                json!({"features": features(), "model": "gpt-4o", "version": "vA", "openai_api_key": "bad-key"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Incorrect API key provided");

        let (status, body) = call(
            &state,
            post_json(
                "/api/predict",
                json!({"features": features(), "model": "haiku", "version": "vA", "anthropic_api_key": "bad-key"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Anthropic API error");
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), "http://127.0.0.1:9");
        let req = Request::builder()
            .method("POST")
            .uri("/api/predict")
            .header("content-type", "application/json")
            .body(Body::from("{oops"))
            .unwrap();
        let (status, body) = call(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_feature_parse_and_template() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), "http://127.0.0.1:9");

        let template = router(state.clone()).oneshot(get("/api/features/template")).await.unwrap();
        assert_eq!(template.status(), StatusCode::OK);
        assert_eq!(template.headers()["content-type"], "text/csv");
        let csv = axum::body::to_bytes(template.into_body(), usize::MAX).await.unwrap();

        let req = Request::builder()
            .method("POST")
            .uri("/api/features/parse")
            .body(Body::from(csv))
            .unwrap();
        let (status, body) = call(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["features"]["month"], "2025-11");
        assert_eq!(body["features"]["historical_sales"].as_array().map(Vec::len), Some(3));

        let bad = Request::builder()
            .method("POST")
            .uri("/api/features/parse")
            .body(Body::from("month\n"))
            .unwrap();
        let (status, _) = call(&state, bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dashboard_endpoints() {
        let tmp = tempfile::tempdir().unwrap();
        write_fixtures(tmp.path());
        let state = test_state(tmp.path(), "http://127.0.0.1:9");

        let (status, body) = call(&state, get("/api/results?model=gpt-4o&version=vA")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"].as_array().map(Vec::len), Some(3));

        let (_, stats) = call(&state, get("/api/stats?model=gpt-4o&version=vA")).await;
        assert_eq!(stats["correct"], 2);
        assert_eq!(stats["total"], 3);

        let (_, empty) = call(&state, get("/api/stats?model=mini&version=vB")).await;
        assert_eq!(empty["directional_accuracy"], 0.0);

        let (_, all) = call(&state, get("/api/results/all")).await;
        assert_eq!(all["results"].as_array().map(Vec::len), Some(5));

        let (_, comparison) = call(&state, get("/api/comparison")).await;
        assert_eq!(comparison["rows"].as_array().map(Vec::len), Some(6));
        assert_eq!(comparison["rows"][1]["name"], "GPT-4o vB");

        let (_, dist) = call(&state, get("/api/distribution?model=gpt-4o&version=vA")).await;
        assert_eq!(dist["months"].as_array().map(Vec::len), Some(3));
        assert_eq!(dist["months"][2]["correct"], 0);

        let (_, truth) = call(&state, get("/api/ground-truth")).await;
        assert_eq!(truth["cutpoints"]["High"], "≥ 447");

        let (_, ablation) = call(&state, get("/api/ablation")).await;
        assert_eq!(ablation["rows"][1]["impact"], "critical");

        let (status, cleared) = call(&state, post_json("/api/cache/clear", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cleared["cleared"], true);
    }

    #[tokio::test]
    async fn test_bad_selection_is_400() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), "http://127.0.0.1:9");
        let (status, body) = call(&state, get("/api/results?model=gpt-5&version=vA")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_ground_truth_is_500() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), "http://127.0.0.1:9");
        let (status, body) = call(&state, get("/api/ground-truth")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().starts_with("data error"));
    }
}
