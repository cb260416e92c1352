//! The webhook server that receives chat events and hands their text to the `Dispatcher`.

use crate::dispatch::{Dispatcher, Handled};
use crate::Result;
use anyhow::{anyhow, Context};
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

pub const LIVENESS: &str = "chat-ledger is running";
pub const OK: &str = "OK";
/// Webhook bodies are small JSON documents; anything past this is refused.
const MAX_BODY_BYTES: usize = 1024 * 1024;
pub const METHOD_NOT_ALLOWED: &str = "Method Not Allowed";
pub const INTERNAL_ERROR: &str = "Internal Server Error";

/// The webhook request body. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct WebhookBody {
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Event {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    reply_token: Option<String>,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl Event {
    /// The text and reply token of a text message event.
    fn text_message(&self) -> Option<(&str, &str)> {
        if self.kind != "message" {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.kind != "text" {
            return None;
        }
        Some((message.text.as_deref()?, self.reply_token.as_deref()?))
    }
}

/// Binds `addr` and serves webhook requests until ctrl-c is received. Each connection is served on
/// its own task.
pub async fn serve(addr: SocketAddr, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Unable to listen on {addr}"))?;
    info!("Listening on http://{}", listener.local_addr()?);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Unable to accept a connection: {e}");
                        continue;
                    }
                };
                debug!("Connection from {peer}");
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let dispatcher = dispatcher.clone();
                        async move { handle_request(&dispatcher, req).await }
                    });
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        debug!("Connection from {peer} ended with an error: {e}");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_request(
    dispatcher: &Dispatcher,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let (status, text) = match read_body(req.into_body(), MAX_BODY_BYTES).await {
        Ok(body) => route(dispatcher, &method, &body).await,
        Err(e) => {
            error!("{e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
        }
    };
    let mut response = Response::new(Full::new(Bytes::from_static(text.as_bytes())));
    *response.status_mut() = status;
    Ok(response)
}

/// Collects at most `limit` bytes of `body`. A longer body is an error.
async fn read_body<B>(body: B, limit: usize) -> Result<Bytes>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let collected = Limited::new(body, limit)
        .collect()
        .await
        .map_err(|e| anyhow!(e))
        .context("Unable to read the request body")?;
    Ok(collected.to_bytes())
}

/// Decides the response for one request. `POST` bodies are parsed as webhook events and every
/// text message is dispatched in order. A failing event does not stop the ones after it, but any
/// failure becomes a 500 with a fixed body.
pub async fn route(
    dispatcher: &Dispatcher,
    method: &Method,
    body: &[u8],
) -> (StatusCode, &'static str) {
    match *method {
        Method::GET => (StatusCode::OK, LIVENESS),
        Method::POST => match handle_events(dispatcher, body).await {
            Ok(()) => (StatusCode::OK, OK),
            Err(e) => {
                error!("Webhook failed: {e:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
            }
        },
        _ => (StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED),
    }
}

async fn handle_events(dispatcher: &Dispatcher, body: &[u8]) -> Result<()> {
    let body: WebhookBody =
        serde_json::from_slice(body).context("Unable to parse the webhook body")?;
    debug!("Received {} events", body.events.len());
    let mut first_error = None;
    for event in &body.events {
        let Some((text, reply_token)) = event.text_message() else {
            debug!("Skipping a '{}' event", event.kind);
            continue;
        };
        match dispatcher.handle(text, reply_token).await {
            Ok(Handled::Ignored) => debug!("Ignored a message"),
            Ok(Handled::Replied(_)) => {}
            Err(e) => {
                error!("Unable to handle the message for reply token {reply_token}: {e:#}");
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
