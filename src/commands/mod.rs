/// Control message handlers
pub mod types;

pub use types::*;

use crate::background::Background;
use crate::platform::{MatchPattern, PROVIDER_HOME_URL};
use tracing::{error, info};

/// Run the interactive login and store the token
pub async fn login(bg: &Background) -> Result<(), String> {
    bg.auth()
        .login()
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

pub async fn logout(bg: &Background) -> Result<(), String> {
    bg.auth().logout().await.map_err(|e| e.to_string())
}

/// The stored access token, unless missing or expired
pub async fn get_token(bg: &Background) -> Result<String, String> {
    bg.auth().token().await.map_err(|e| e.to_string())
}

pub fn audio_status(bg: &Background) -> bool {
    bg.poller().is_audio_playing()
}

/// Make sure a Spotify web player tab is open
pub async fn play_selected(bg: &Background) -> Result<String, String> {
    let pattern = MatchPattern::provider_tabs();
    let tabs = bg
        .tabs()
        .query(Some(&pattern))
        .await
        .map_err(|e| format!("Failed to query tabs: {}", e))?;

    if tabs.is_empty() {
        bg.tabs()
            .create(PROVIDER_HOME_URL)
            .await
            .map_err(|e| format!("Failed to open Spotify tab: {}", e))?;
        info!("Spotify tab opened");
        Ok("Spotify tab opened".to_string())
    } else {
        Ok("Spotify tab found".to_string())
    }
}

/// Handle one request and shape the result into its response
pub async fn dispatch(bg: &Background, request: Request) -> Response {
    match request {
        Request::Login => Response::Action(match login(bg).await {
            Ok(()) => ActionResponse::ok(),
            Err(e) => ActionResponse::failed(e),
        }),
        Request::Logout => Response::Action(match logout(bg).await {
            Ok(()) => ActionResponse::ok(),
            Err(e) => ActionResponse::failed(e),
        }),
        Request::GetToken => Response::Token(get_token(bg).await.into()),
        Request::GetAudioStatus => Response::AudioStatus(AudioStatusResponse {
            is_playing: audio_status(bg),
        }),
        Request::PlaySelected => {
            let (success, message) = match play_selected(bg).await {
                Ok(message) => (true, message),
                Err(message) => (false, message),
            };
            Response::PlaySelected(PlaySelectedResponse { success, message })
        }
    }
}

/// Parse a JSON message and dispatch it
pub async fn dispatch_line(bg: &Background, line: &str) -> Response {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => dispatch(bg, request).await,
        Err(e) => {
            error!("Invalid control message {:?}: {}", line, e);
            Response::Action(ActionResponse::failed(format!("Invalid message: {}", e)))
        }
    }
}
