use axum::{
    Router, middleware,
    routing::{get, put},
};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::AppState;
use crate::handlers::{awssecrets, health, secrets, watch};
use crate::request_id::request_id_middleware;

/// Server configuration passed from the binary's CLI.
pub struct ServerConfig {
    pub addr: SocketAddr,
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/api/v1/watch", get(watch::watch_events))
        .route("/apis/v1alpha1/awssecrets", get(awssecrets::list_all))
        .route(
            "/apis/v1alpha1/namespaces/{ns}/awssecrets",
            get(awssecrets::list_namespaced),
        )
        .route(
            "/apis/v1alpha1/namespaces/{ns}/awssecrets/{name}",
            put(awssecrets::apply)
                .get(awssecrets::get)
                .delete(awssecrets::delete),
        )
        .route(
            "/api/v1/namespaces/{ns}/secrets",
            get(secrets::list_secrets),
        )
        .route(
            "/api/v1/namespaces/{ns}/secrets/{name}",
            get(secrets::get_secret),
        );

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/metrics", get(health::metrics))
        .merge(api_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn start_server(
    config: ServerConfig,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(state);

    info!("Starting API server on {}", config.addr);
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use pkg_metrics::MetricsRegistry;
    use pkg_state::client::StateStore;
    use pkg_state::registry::Registry;
    use pkg_types::awssecret::AwsSecret;
    use pkg_types::meta::{ObjectKey, OwnerReference};
    use pkg_types::secret::Secret;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> (tempfile::TempDir, AppState, Router) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().to_str().unwrap()).await.unwrap();
        let state = AppState {
            registry: Registry::new(store),
            metrics: Arc::new(MetricsRegistry::for_operator()),
        };
        let router = router(state.clone());
        (dir, state, router)
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn spec() -> Value {
        serde_json::json!({
            "stringDataFrom": {"secretsManagerSecretRef": {"secretId": "S", "versionId": "V1"}},
            "type": "Opaque"
        })
    }

    #[tokio::test]
    async fn healthz_and_metrics() {
        let (_dir, state, router) = app().await;
        state.metrics.counter_inc_with(
            pkg_metrics::RECONCILE_TOTAL,
            &[("outcome", "created")],
        );

        let (status, body) = send(&router, Method::GET, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");

        let (status, body) = send(&router, Method::GET, "/metrics", None).await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("awssecret_reconcile_total{outcome=\"created\"} 1"));
    }

    #[tokio::test]
    async fn apply_get_list_delete() {
        let (_dir, _state, router) = app().await;
        let uri = "/apis/v1alpha1/namespaces/default/awssecrets/example-secret";

        let (status, body) = send(&router, Method::PUT, uri, Some(spec())).await;
        assert_eq!(status, StatusCode::CREATED);
        let created: AwsSecret = serde_json::from_slice(&body).unwrap();
        assert_eq!(created.resource_version, 1);

        let (status, body) = send(&router, Method::PUT, uri, Some(spec())).await;
        assert_eq!(status, StatusCode::OK);
        let updated: AwsSecret = serde_json::from_slice(&body).unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.resource_version, 2);

        let (status, body) = send(&router, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let fetched: AwsSecret = serde_json::from_slice(&body).unwrap();
        assert_eq!(fetched.spec.secret_type, "Opaque");

        let (_, body) = send(&router, Method::GET, "/apis/v1alpha1/awssecrets", None).await;
        let all: Vec<AwsSecret> = serde_json::from_slice(&body).unwrap();
        assert_eq!(all.len(), 1);

        let (_, body) = send(
            &router,
            Method::GET,
            "/apis/v1alpha1/namespaces/other/awssecrets",
            None,
        )
        .await;
        let other: Vec<AwsSecret> = serde_json::from_slice(&body).unwrap();
        assert!(other.is_empty());

        let (status, _) = send(&router, Method::DELETE, uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&router, Method::DELETE, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&router, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_names_are_rejected() {
        let (_dir, _state, router) = app().await;

        let (status, _) = send(
            &router,
            Method::PUT,
            "/apis/v1alpha1/namespaces/default/awssecrets/Not_Valid",
            Some(spec()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_removes_owned_secrets() {
        let (_dir, state, router) = app().await;
        let uri = "/apis/v1alpha1/namespaces/default/awssecrets/example-secret";
        let (_, body) = send(&router, Method::PUT, uri, Some(spec())).await;
        let decl: AwsSecret = serde_json::from_slice(&body).unwrap();

        let mut secret = Secret::new("default", "example-secret");
        secret.string_data.insert("value".into(), "v1value".into());
        secret.owner_ref = Some(OwnerReference {
            api_version: "mumoshu.github.io/v1alpha1".into(),
            kind: "AWSSecret".into(),
            name: decl.name.clone(),
            uid: decl.id.clone(),
            controller: true,
        });
        state.registry.create_secret(&secret).await.unwrap();

        let (status, body) = send(
            &router,
            Method::GET,
            "/api/v1/namespaces/default/secrets/example-secret",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["value"], "djF2YWx1ZQ==");

        send(&router, Method::DELETE, uri, None).await;
        assert!(
            state
                .registry
                .get_secret(&ObjectKey::new("default", "example-secret"))
                .await
                .unwrap()
                .is_none()
        );
        let (_, body) = send(&router, Method::GET, "/api/v1/namespaces/default/secrets", None).await;
        let secrets: Vec<Secret> = serde_json::from_slice(&body).unwrap();
        assert!(secrets.is_empty());
    }
}
