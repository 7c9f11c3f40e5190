//! Local HTTP stubs for exercising the real `reqwest` transports in tests.

use crate::api_client::{RawCampaign, RawMetrics, RawRow, RawSegments};
use crate::data::CampaignStatus;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    /// Path and query, e.g. `/v16/customers/111/googleAds:search`.
    pub path: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

struct Stub {
    responses: Mutex<VecDeque<(StatusCode, String)>>,
    recorded: Mutex<Vec<RecordedRequest>>,
    done: Mutex<Option<oneshot::Sender<()>>>,
}

async fn answer(
    State(stub): State<Arc<Stub>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri
        .path_and_query()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    stub.recorded.lock().expect("stub requests").push(RecordedRequest {
        method,
        path,
        headers,
        body,
    });

    let (next, exhausted) = {
        let mut responses = stub.responses.lock().expect("stub responses");
        (responses.pop_front(), responses.is_empty())
    };
    if exhausted {
        if let Some(done) = stub.done.lock().expect("stub done").take() {
            done.send(()).ok();
        }
    }

    match next {
        Some((status, body)) => {
            (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Answers requests on any path with `responses` in order, each a status and a
/// JSON body. The handle yields the recorded requests once the last response
/// has been served.
pub(crate) async fn serve_json(
    responses: &[(u16, &str)],
) -> (String, JoinHandle<Vec<RecordedRequest>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub address");
    let (done_tx, done_rx) = oneshot::channel();

    let stub = Arc::new(Stub {
        responses: Mutex::new(
            responses
                .iter()
                .map(|(status, body)| {
                    (
                        StatusCode::from_u16(*status).expect("stub status"),
                        body.to_string(),
                    )
                })
                .collect(),
        ),
        recorded: Mutex::new(Vec::new()),
        done: Mutex::new(Some(done_tx)),
    });
    let app = Router::new().fallback(answer).with_state(stub.clone());

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                done_rx.await.ok();
            })
            .await
            .expect("stub server");
        std::mem::take(&mut *stub.recorded.lock().expect("stub requests"))
    });

    (format!("http://{}", addr), handle)
}

/// A single reporting row for campaign 1 ("Spring Sale") on 2024-01-01.
pub(crate) fn spring_sale_row() -> RawRow {
    RawRow {
        campaign: RawCampaign {
            id: 1,
            name: "Spring Sale".to_string(),
            status: CampaignStatus::Enabled,
        },
        metrics: RawMetrics {
            impressions: 1000,
            clicks: 50,
            ctr: 5.0,
            cost_micros: 200000,
            average_cpa_micros: Some(4000),
        },
        segments: RawSegments {
            date: "2024-01-01".to_string(),
        },
    }
}
