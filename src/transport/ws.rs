use crate::error::Result;
use reqwest::header::HeaderValue;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Establish a WebSocket connection to a realtime endpoint.
///
/// `model` is appended as a query parameter when set; the xAI endpoint
/// picks its default model otherwise.
///
/// # Errors
/// Returns an error if the URL is invalid or the handshake fails.
pub async fn connect(api_key: &str, endpoint: &str, model: Option<&str>) -> Result<WsStream> {
    let url = realtime_url(endpoint, model)?;
    let auth_header = HeaderValue::from_str(&format!("Bearer {api_key}"))?;

    let mut req = url.as_str().into_client_request()?;
    req.headers_mut()
        .insert(reqwest::header::AUTHORIZATION, auth_header);
    let (ws_stream, response) = connect_async(req).await?;

    tracing::info!(
        host = url.host_str().unwrap_or_default(),
        status = %response.status(),
        "Connected to realtime endpoint"
    );

    Ok(ws_stream)
}

fn realtime_url(endpoint: &str, model: Option<&str>) -> Result<Url> {
    let mut url = Url::parse(endpoint)?;
    if let Some(model) = model {
        url.query_pairs_mut().append_pair("model", model);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_url_appends_model() {
        let url = realtime_url("wss://api.x.ai/v1/realtime", Some("grok-voice")).unwrap();
        assert_eq!(url.as_str(), "wss://api.x.ai/v1/realtime?model=grok-voice");
    }

    #[test]
    fn realtime_url_without_model_is_unchanged() {
        let url = realtime_url("wss://api.x.ai/v1/realtime", None).unwrap();
        assert_eq!(url.as_str(), "wss://api.x.ai/v1/realtime");
    }

    #[test]
    fn realtime_url_rejects_garbage() {
        assert!(realtime_url("not a url", None).is_err());
    }
}
