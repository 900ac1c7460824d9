// Chunked NDJSON streaming of live dashboard events
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use tokio::sync::broadcast;

use crate::application::events::DashboardEvent;

/// Create a chunked streaming response, one JSON document per line.
pub fn chunked_ndjson_stream<S>(stream: S) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = DashboardEvent> + Send + 'static,
{
    let byte_stream = stream.map(|event| serialize_line(&event));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Serialize a single event to a newline-terminated chunk.
fn serialize_line(event: &DashboardEvent) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(event)?;
    let mut chunk = BytesMut::with_capacity(json.len() + 1);
    chunk.put_slice(&json);
    chunk.put_u8(b'\n');
    Ok(chunk.freeze())
}

/// Adapt a broadcast subscription into a feed. A slow reader skips what it
/// missed instead of ending the stream.
pub fn feed_from_receiver(mut rx: broadcast::Receiver<DashboardEvent>) -> impl IntoResponse {
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => yield event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "feed subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    match chunked_ndjson_stream(stream) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_line() {
        let line = serialize_line(&DashboardEvent::Setpoint { speed: 1300.0 }).unwrap();
        assert_eq!(&line[..], b"{\"kind\":\"setpoint\",\"speed\":1300.0}\n");
    }

    #[tokio::test]
    async fn test_feed_streams_events_in_order() {
        let (tx, rx) = broadcast::channel(8);
        tx.send(DashboardEvent::Link { connected: true }).unwrap();
        tx.send(DashboardEvent::Setpoint { speed: 1200.0 }).unwrap();
        drop(tx);

        let response = feed_from_receiver(rx).into_response();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/x-ndjson"
        );
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        let text = std::str::from_utf8(&body).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"link\""));
        assert!(lines[1].contains("1200"));
    }
}
