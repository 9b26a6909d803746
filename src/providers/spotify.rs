use super::{ProviderError, SpotifyApi};
/// Spotify Web API client
use crate::config::SpotifyConfig;
use crate::models::Device;
use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Web API endpoint
pub const SPOTIFY_API_ENDPOINT: &str = "https://api.spotify.com/v1";

const UNKNOWN_ERROR: &str = "Unknown error occurred";

/// Spotify API response types
#[derive(Debug, Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<SpotifyDevice>,
}

#[derive(Debug, Deserialize)]
struct SpotifyDevice {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_active: bool,
}

/// A page of saved tracks or playlist items; both wrap the track in `track`
#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    /// Null for removed tracks and some local files
    track: Option<TrackRef>,
}

#[derive(Debug, Deserialize)]
struct TrackRef {
    uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct PlayRequest<'a> {
    uris: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl TrackPage {
    fn into_uris(self) -> Vec<String> {
        self.items
            .into_iter()
            .filter_map(|item| item.track.and_then(|track| track.uri))
            .filter(|uri| !uri.is_empty())
            .collect()
    }
}

/// Extract `error.message` from a Spotify error body
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.error)
        .and_then(|detail| detail.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}

/// reqwest-backed implementation of [`SpotifyApi`]
pub struct SpotifyWebApi {
    client: Client,
    base_url: String,
}

impl SpotifyWebApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &SpotifyConfig) -> Result<Self, ProviderError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into [`ProviderError::Api`]
    async fn check(response: Response) -> Result<Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Api {
            status: status.as_u16(),
            message: api_error_message(&body),
        })
    }

    async fn get_track_page(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<String>, ProviderError> {
        let response = self
            .client
            .get(self.endpoint(path))
            .query(query)
            .bearer_auth(token)
            .send()
            .await?;
        let page: TrackPage = Self::check(response).await?.json().await?;
        Ok(page.into_uris())
    }
}

#[async_trait]
impl SpotifyApi for SpotifyWebApi {
    async fn devices(&self, token: &str) -> Result<Vec<Device>, ProviderError> {
        let response = self
            .client
            .get(self.endpoint("/me/player/devices"))
            .bearer_auth(token)
            .send()
            .await?;
        let body: DevicesResponse = Self::check(response).await?.json().await?;

        // Restricted devices may come back without an id and cannot be targeted
        Ok(body
            .devices
            .into_iter()
            .filter_map(|device| {
                device.id.map(|id| Device {
                    id,
                    name: device.name,
                    is_active: device.is_active,
                })
            })
            .collect())
    }

    async fn liked_track_uris(&self, token: &str, limit: u32) -> Result<Vec<String>, ProviderError> {
        self.get_track_page(token, "/me/tracks", &[("limit", limit.to_string())])
            .await
    }

    async fn playlist_track_uris(
        &self,
        token: &str,
        playlist_id: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let path = format!("/playlists/{}/tracks", playlist_id);
        self.get_track_page(token, &path, &[]).await
    }

    async fn play(&self, token: &str, device_id: &str, uris: &[String]) -> Result<(), ProviderError> {
        let response = self
            .client
            .put(self.endpoint("/me/player/play"))
            .query(&[("device_id", device_id)])
            .bearer_auth(token)
            .json(&PlayRequest { uris })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn pause(&self, token: &str) -> Result<(), ProviderError> {
        // Spotify rejects body-less PUTs without an explicit Content-Length
        let response = self
            .client
            .put(self.endpoint("/me/player/pause"))
            .bearer_auth(token)
            .header(header::CONTENT_LENGTH, "0")
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// A request as it arrived on the socket
    #[derive(Debug, Clone)]
    struct Captured {
        method: String,
        target: String,
        headers: HashMap<String, String>,
        body: String,
    }

    /// Local HTTP/1.1 server answering each path with a fixed status and body
    struct CannedServer {
        base_url: String,
        requests: Arc<Mutex<Vec<Captured>>>,
    }

    impl CannedServer {
        async fn start(routes: Vec<(&'static str, u16, &'static str)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let recorded = requests.clone();

            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    let mut reader = BufReader::new(stream);
                    let request = read_request(&mut reader).await;
                    let path = request.target.split('?').next().unwrap_or_default().to_string();
                    recorded.lock().unwrap().push(request);

                    let (status, body) = routes
                        .iter()
                        .find(|(route, _, _)| *route == path)
                        .map(|(_, status, body)| (*status, *body))
                        .unwrap_or((404, "{}"));
                    let response = format!(
                        "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let stream = reader.get_mut();
                    stream.write_all(response.as_bytes()).await.unwrap();
                    stream.shutdown().await.unwrap();
                }
            });

            Self {
                base_url: format!("http://{}/v1", addr),
                requests,
            }
        }

        fn requests(&self) -> Vec<Captured> {
            self.requests.lock().unwrap().clone()
        }
    }

    /// Client that ignores proxy settings from the environment
    fn local_api(server: &CannedServer) -> SpotifyWebApi {
        SpotifyWebApi {
            client: Client::builder().no_proxy().build().unwrap(),
            base_url: server.base_url.clone(),
        }
    }

    async fn read_request(reader: &mut BufReader<tokio::net::TcpStream>) -> Captured {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let mut parts = line.split_whitespace();
        let method = parts.next().unwrap().to_string();
        let target = parts.next().unwrap().to_string();

        let mut headers = HashMap::new();
        loop {
            let mut header = String::new();
            reader.read_line(&mut header).await.unwrap();
            let header = header.trim_end();
            if header.is_empty() {
                break;
            }
            let (name, value) = header.split_once(':').unwrap();
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        let length: usize = headers
            .get("content-length")
            .map(|len| len.parse().unwrap())
            .unwrap_or(0);
        let mut body = vec![0; length];
        reader.read_exact(&mut body).await.unwrap();

        Captured {
            method,
            target,
            headers,
            body: String::from_utf8(body).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_calls_reach_the_wire_with_bearer_auth() {
        let server = CannedServer::start(vec![
            (
                "/v1/me/player/devices",
                200,
                r#"{"devices":[{"id":"d1","is_active":true,"name":"Desk"},{"id":null,"is_active":false,"name":"Hidden"}]}"#,
            ),
            ("/v1/me/tracks", 200, r#"{"items":[{"track":{"uri":"spotify:track:a"}}]}"#),
            (
                "/v1/playlists/p1/tracks",
                200,
                r#"{"items":[{"track":null},{"track":{"uri":"spotify:track:b"}}]}"#,
            ),
            ("/v1/me/player/play", 204, ""),
            ("/v1/me/player/pause", 204, ""),
        ])
        .await;
        let api = local_api(&server);

        let devices = api.devices("tok").await.unwrap();
        assert_eq!(
            devices,
            vec![Device {
                id: "d1".to_string(),
                name: "Desk".to_string(),
                is_active: true
            }]
        );
        assert_eq!(
            api.liked_track_uris("tok", 50).await.unwrap(),
            vec!["spotify:track:a"]
        );
        assert_eq!(
            api.playlist_track_uris("tok", "p1").await.unwrap(),
            vec!["spotify:track:b"]
        );
        let uris = vec!["spotify:track:a".to_string(), "spotify:track:b".to_string()];
        api.play("tok", "d1", &uris).await.unwrap();
        api.pause("tok").await.unwrap();

        let requests = server.requests();
        let lines: Vec<(&str, &str)> = requests
            .iter()
            .map(|r| (r.method.as_str(), r.target.as_str()))
            .collect();
        assert_eq!(
            lines,
            vec![
                ("GET", "/v1/me/player/devices"),
                ("GET", "/v1/me/tracks?limit=50"),
                ("GET", "/v1/playlists/p1/tracks"),
                ("PUT", "/v1/me/player/play?device_id=d1"),
                ("PUT", "/v1/me/player/pause"),
            ]
        );
        for request in &requests {
            assert_eq!(request.headers["authorization"], "Bearer tok");
        }

        let play_body: serde_json::Value = serde_json::from_str(&requests[3].body).unwrap();
        assert_eq!(
            play_body,
            serde_json::json!({"uris": ["spotify:track:a", "spotify:track:b"]})
        );
        assert_eq!(requests[4].headers["content-length"], "0");
        assert!(requests[4].body.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_maps_to_api_error() {
        let server = CannedServer::start(vec![(
            "/v1/me/player/pause",
            404,
            r#"{"error":{"status":404,"message":"Player command failed: No active device found"}}"#,
        )])
        .await;
        let api = local_api(&server);

        match api.pause("tok").await {
            Err(ProviderError::Api { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Player command failed: No active device found");
            }
            other => panic!("expected an API error, got {:?}", other),
        }

        // Unknown path answers 404 with a body lacking error.message
        match api.devices("tok").await {
            Err(ProviderError::Api { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, UNKNOWN_ERROR);
            }
            other => panic!("expected an API error, got {:?}", other),
        }
    }

    #[test]
    fn test_saved_tracks_page_yields_uris() {
        let page: TrackPage = serde_json::from_str(
            r#"{
                "href": "https://api.spotify.com/v1/me/tracks?offset=0&limit=50",
                "items": [
                    {"added_at": "2024-01-01T00:00:00Z", "track": {"uri": "spotify:track:a", "name": "A"}},
                    {"added_at": "2024-01-02T00:00:00Z", "track": {"uri": "spotify:track:b", "name": "B"}}
                ],
                "limit": 50,
                "next": null,
                "total": 2
            }"#,
        )
        .unwrap();

        assert_eq!(page.into_uris(), vec!["spotify:track:a", "spotify:track:b"]);
    }

    #[test]
    fn test_playlist_items_skip_missing_tracks() {
        let page: TrackPage = serde_json::from_str(
            r#"{
                "items": [
                    {"track": null},
                    {"track": {"uri": "spotify:local:::x:1"}},
                    {"track": {"name": "no uri"}},
                    {"track": {"uri": "spotify:episode:e"}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(
            page.into_uris(),
            vec!["spotify:local:::x:1", "spotify:episode:e"]
        );
    }

    #[test]
    fn test_devices_response_parses() {
        let body: DevicesResponse = serde_json::from_str(
            r#"{
                "devices": [
                    {"id": "d1", "is_active": false, "name": "Phone", "type": "Smartphone", "volume_percent": 50},
                    {"id": null, "is_active": true, "name": "Restricted", "type": "Speaker"},
                    {"id": "d2", "is_active": true, "name": "Desktop", "type": "Computer"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(body.devices.len(), 3);
        assert!(body.devices[1].id.is_none());
        assert!(body.devices[2].is_active);
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            api_error_message(r#"{"error": {"status": 404, "message": "Player command failed: No active device found"}}"#),
            "Player command failed: No active device found"
        );
        assert_eq!(api_error_message(""), UNKNOWN_ERROR);
        assert_eq!(api_error_message(r#"{"error": {"status": 500}}"#), UNKNOWN_ERROR);
        assert_eq!(api_error_message("<html>bad gateway</html>"), UNKNOWN_ERROR);
    }

    #[test]
    fn test_play_request_body() {
        let uris = vec!["spotify:track:a".to_string()];
        let body = serde_json::to_value(PlayRequest { uris: &uris }).unwrap();
        assert_eq!(body, serde_json::json!({"uris": ["spotify:track:a"]}));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let api = SpotifyWebApi::new("http://localhost:9000/v1/");
        assert_eq!(
            api.endpoint("/me/player/pause"),
            "http://localhost:9000/v1/me/player/pause"
        );
        let default = SpotifyWebApi::from_config(&SpotifyConfig::default()).unwrap();
        assert_eq!(
            default.endpoint("/me/tracks"),
            format!("{}/me/tracks", SPOTIFY_API_ENDPOINT)
        );
    }
}
