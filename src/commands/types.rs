/// Control message and response types
use serde::{Deserialize, Serialize};

/// Inbound message, tagged by `action`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    Login,
    Logout,
    #[serde(alias = "getSpotifyToken")]
    GetToken,
    GetAudioStatus,
    PlaySelected,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AudioStatusResponse {
    #[serde(rename = "isPlaying")]
    pub is_playing: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlaySelectedResponse {
    pub success: bool,
    pub message: String,
}

/// Any response written back on the control channel
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Response {
    Action(ActionResponse),
    Token(TokenResponse),
    AudioStatus(AudioStatusResponse),
    PlaySelected(PlaySelectedResponse),
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl<T: Into<String>> From<Result<T, String>> for TokenResponse {
    fn from(result: Result<T, String>) -> Self {
        match result {
            Ok(token) => Self {
                success: true,
                token: Some(token.into()),
                error: None,
            },
            Err(error) => Self {
                success: false,
                token: None,
                error: Some(error),
            },
        }
    }
}
