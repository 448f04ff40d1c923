// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local Strava OAuth callback for the `auth` command.
//!
//! Serves a single `/callback` route on localhost, waits for Strava to
//! redirect the browser back with an authorization code, then exchanges
//! the code for tokens.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::sync::{oneshot, Mutex};
use tower_http::trace::TraceLayer;

use crate::error::{Result, SyncError};
use crate::services::strava::{StravaClient, TokenRefreshResponse};

/// How long to wait for the user to approve access in the browser.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Authorization code, or the error Strava reported.
pub type CallbackResult = std::result::Result<String, String>;

/// Shared state of the callback route: the channel for the first result.
pub struct CallbackState {
    sender: Mutex<Option<oneshot::Sender<CallbackResult>>>,
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Router for the callback; the first result is sent on `sender`.
pub fn routes(sender: oneshot::Sender<CallbackResult>) -> Router {
    let state = Arc::new(CallbackState {
        sender: Mutex::new(Some(sender)),
    });
    Router::new()
        .route("/callback", get(auth_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// OAuth callback - hand the code (or error) to the waiting command.
async fn auth_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<&'static str>) {
    let (result, response) = match (params.code, params.error) {
        (_, Some(error)) => {
            tracing::warn!(error = %error, "OAuth error from Strava");
            (
                Err(error),
                (
                    StatusCode::BAD_REQUEST,
                    Html("<h1>Authorization failed</h1><p>Check the terminal for details.</p>"),
                ),
            )
        }
        (Some(code), None) => (
            Ok(code),
            (
                StatusCode::OK,
                Html("<h1>Authorization successful!</h1><p>You can close this window.</p>"),
            ),
        ),
        (None, None) => {
            return (
                StatusCode::BAD_REQUEST,
                Html("<h1>Missing authorization code</h1>"),
            )
        }
    };

    match state.sender.lock().await.take() {
        Some(sender) => {
            // Receiver gone means the command already gave up
            sender.send(result).ok();
            response
        }
        None => (
            StatusCode::CONFLICT,
            Html("<h1>Authorization already handled</h1>"),
        ),
    }
}

/// Run the authorization-code flow end to end.
///
/// `on_url` receives the Strava URL the user must open in a browser.
pub async fn authorize<F>(
    client: &StravaClient,
    port: u16,
    on_url: F,
) -> Result<TokenRefreshResponse>
where
    F: FnOnce(&str),
{
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .map_err(|e| {
            SyncError::Internal(anyhow::anyhow!("Failed to bind port {}: {}", port, e))
        })?;

    let redirect_uri = format!("http://localhost:{}/callback", port);
    on_url(&client.authorize_url(&redirect_uri));

    let (sender, receiver) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(
        axum::serve(listener, routes(sender))
            .with_graceful_shutdown(async move {
                shutdown_rx.await.ok();
            })
            .into_future(),
    );
    tracing::info!(port, "Waiting for Strava OAuth callback");

    let outcome = tokio::time::timeout(CALLBACK_TIMEOUT, receiver).await;
    shutdown_tx.send(()).ok();
    server.await.ok();

    let code = match outcome {
        Ok(Ok(Ok(code))) => code,
        Ok(Ok(Err(error))) => {
            return Err(SyncError::Auth(format!("Authorization failed: {}", error)))
        }
        Ok(Err(_)) => {
            return Err(SyncError::Auth(
                "No authorization code received".to_string(),
            ))
        }
        Err(_) => {
            return Err(SyncError::Auth(
                "Timed out waiting for authorization".to_string(),
            ))
        }
    };

    tracing::info!("Exchanging authorization code for tokens");
    client.exchange_code(&code).await
}
