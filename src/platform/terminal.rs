/// Authorization prompt for a terminal: print the URL, read back the redirect
use super::{AuthorizationPrompt, PromptError};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use url::Url;

/// Where the pasted redirect URL is read from
#[derive(Debug, Clone)]
pub enum PromptInput {
    Stdin,
    /// A file or device such as `/dev/tty`, opened per prompt
    File(PathBuf),
}

pub struct TerminalPrompt {
    input: PromptInput,
}

impl TerminalPrompt {
    pub fn stdin() -> Self {
        Self {
            input: PromptInput::Stdin,
        }
    }

    /// Read from the controlling terminal, for when stdin carries messages
    pub fn tty() -> Self {
        Self::from_file("/dev/tty")
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            input: PromptInput::File(path.into()),
        }
    }

    async fn read_redirect(&self) -> Result<String, PromptError> {
        let io_error = |e: std::io::Error| PromptError::Failed(e.to_string());
        match &self.input {
            PromptInput::Stdin => read_line(BufReader::new(tokio::io::stdin())).await,
            PromptInput::File(path) => {
                let file = tokio::fs::File::open(path).await.map_err(io_error)?;
                read_line(BufReader::new(file)).await
            }
        }
    }
}

async fn read_line<R: AsyncBufRead + Unpin>(mut reader: R) -> Result<String, PromptError> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .map_err(|e| PromptError::Failed(e.to_string()))?;
    Ok(line.trim().to_string())
}

#[async_trait]
impl AuthorizationPrompt for TerminalPrompt {
    async fn launch(&self, url: &Url, interactive: bool) -> Result<Option<String>, PromptError> {
        if !interactive {
            return Err(PromptError::Failed(
                "User interaction required".to_string(),
            ));
        }

        let message = format!(
            "Open this URL in your browser and approve access:\n\n  {}\n\nThen paste the URL you were redirected to (empty line to cancel):\n",
            url
        );
        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(message.as_bytes())
            .await
            .map_err(|e| PromptError::Failed(e.to_string()))?;
        stderr
            .flush()
            .await
            .map_err(|e| PromptError::Failed(e.to_string()))?;

        let redirect = self.read_redirect().await?;
        if redirect.is_empty() {
            tracing::info!("Authorization prompt cancelled");
            return Err(PromptError::Cancelled);
        }
        Ok(Some(redirect))
    }
}
