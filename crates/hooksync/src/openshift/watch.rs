//! Decoding of newline-delimited watch responses.

use std::fmt::Display;

use futures_util::{Stream, StreamExt};
use serde::Deserialize;

use super::error::OpenShiftError;
use super::types::{BuildConfig, Status, WatchEvent};

#[derive(Deserialize)]
struct RawWatchEvent {
    #[serde(rename = "type")]
    event_type: String,
    object: serde_json::Value,
}

/// Decode one line of a watch response.
pub fn parse_watch_line(line: &[u8]) -> Result<WatchEvent, OpenShiftError> {
    let raw: RawWatchEvent = serde_json::from_slice(line)?;
    let event = match raw.event_type.as_str() {
        "ADDED" => WatchEvent::Added(serde_json::from_value::<BuildConfig>(raw.object)?),
        "MODIFIED" => WatchEvent::Modified(serde_json::from_value::<BuildConfig>(raw.object)?),
        "DELETED" => WatchEvent::Deleted(serde_json::from_value::<BuildConfig>(raw.object)?),
        "ERROR" => WatchEvent::Error(serde_json::from_value::<Status>(raw.object)?),
        other => return Err(OpenShiftError::UnknownEvent(other.to_string())),
    };
    Ok(event)
}

/// Turn a chunked byte stream into watch events.
///
/// Chunks may split or join lines arbitrarily. A transport error ends the
/// stream after being reported once. A trailing line without a newline is
/// decoded when the body ends.
pub fn decode_watch_stream<S, B, E>(
    stream: S,
) -> impl Stream<Item = Result<WatchEvent, OpenShiftError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]>,
    E: Display,
{
    futures_util::stream::unfold(
        (Box::pin(stream), Vec::<u8>::new(), false),
        |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }
            loop {
                if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = line.trim_ascii();
                    if line.is_empty() {
                        continue;
                    }
                    return Some((parse_watch_line(line), (stream, buffer, false)));
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
                    Some(Err(e)) => {
                        let err = OpenShiftError::Stream(e.to_string());
                        return Some((Err(err), (stream, buffer, true)));
                    }
                    None => {
                        let rest = buffer.trim_ascii().to_vec();
                        if rest.is_empty() {
                            return None;
                        }
                        buffer.clear();
                        return Some((parse_watch_line(&rest), (stream, buffer, true)));
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn chunks(parts: &[&str]) -> Vec<Result<Vec<u8>, String>> {
        parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect()
    }

    #[tokio::test]
    async fn test_decode_events_split_across_chunks() {
        let body = concat!(
            r#"{"type":"ADDED","object":{"metadata":{"name":"a","namespace":"ns","resourceVersion":"5"}}}"#,
            "\n",
            r#"{"type":"MODIFIED","object":{"metadata":{"name":"a","namespace":"ns","resourceVersion":"6"}}}"#,
            "\n\n",
            r#"{"type":"DELETED","object":{"metadata":{"name":"a","namespace":"ns","resourceVersion":"7"}}}"#
        );
        let (left, right) = body.split_at(40);
        let (middle, right) = right.split_at(70);
        let input = stream::iter(chunks(&[left, middle, right]));

        let events: Vec<_> = decode_watch_stream(input).collect().await;
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], Ok(WatchEvent::Added(bc)) if bc.key() == "ns/a"));
        assert!(
            matches!(&events[1], Ok(WatchEvent::Modified(bc)) if bc.metadata.resource_version.as_deref() == Some("6"))
        );
        assert!(matches!(&events[2], Ok(WatchEvent::Deleted(_))));
    }

    #[tokio::test]
    async fn test_decode_error_event() {
        let body = r#"{"type":"ERROR","object":{"kind":"Status","code":410,"reason":"Gone","message":"too old resource version: 1 (20)"}}
"#;
        let events: Vec<_> = decode_watch_stream(stream::iter(chunks(&[body])))
            .collect()
            .await;
        match &events[..] {
            [Ok(WatchEvent::Error(status))] => {
                assert_eq!(status.code, 410);
                assert_eq!(status.reason, "Gone");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let input = stream::iter(vec![
            Ok(b"{\"type\":\"ADDED\",\"object\":{}}\n{\"ty".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"pe\":\"ADDED\",\"object\":{}}\n".to_vec()),
        ]);
        let events: Vec<_> = decode_watch_stream(input).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(&events[1], Err(OpenShiftError::Stream(msg)) if msg == "connection reset"));
    }

    #[test]
    fn test_parse_watch_line_rejects_unknown_types() {
        let err = parse_watch_line(br#"{"type":"BOOKMARK","object":{}}"#).unwrap_err();
        assert!(matches!(err, OpenShiftError::UnknownEvent(t) if t == "BOOKMARK"));
        assert!(matches!(
            parse_watch_line(b"not json"),
            Err(OpenShiftError::Json(_))
        ));
    }
}
