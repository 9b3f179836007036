//! AWS Bedrock bidirectional stream connector.
//!
//! Outbound events are wrapped as `BidirectionalInputPayloadPart` chunks;
//! inbound chunks are decoded as UTF-8 JSON and forwarded unchanged.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_bedrockruntime::types::{
    BidirectionalInputPayloadPart, InvokeModelWithBidirectionalStreamInput,
    InvokeModelWithBidirectionalStreamOutput,
};
use aws_smithy_types::Blob;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use zeroize::Zeroize;

use super::{
    INBOUND_CHANNEL_CAPACITY, ModelStreamConnector, OUTBOUND_CHANNEL_CAPACITY, RemoteStream,
    StreamDriver,
};
use crate::config::ServerConfig;
use crate::errors::{SessionError, SessionResult};

/// Connection settings for Bedrock.
#[derive(Clone)]
pub struct BedrockSettings {
    pub model_id: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub connect_timeout: Duration,
}

impl BedrockSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            model_id: config.model_id.clone(),
            region: config.aws_region.clone(),
            access_key_id: config.aws_access_key_id.clone(),
            secret_access_key: config.aws_secret_access_key.clone(),
            session_token: config.aws_session_token.clone(),
            connect_timeout: config.remote_connect_timeout,
        }
    }

    fn has_explicit_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

impl std::fmt::Debug for BedrockSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockSettings")
            .field("model_id", &self.model_id)
            .field("region", &self.region)
            .field("explicit_credentials", &self.has_explicit_credentials())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Drop for BedrockSettings {
    fn drop(&mut self) {
        if let Some(ref mut key) = self.access_key_id {
            key.zeroize();
        }
        if let Some(ref mut secret) = self.secret_access_key {
            secret.zeroize();
        }
        if let Some(ref mut token) = self.session_token {
            token.zeroize();
        }
    }
}

/// Opens `InvokeModelWithBidirectionalStream` sessions.
#[derive(Debug, Clone)]
pub struct BedrockConnector {
    settings: BedrockSettings,
}

impl BedrockConnector {
    pub fn new(settings: BedrockSettings) -> Self {
        Self { settings }
    }

    async fn build_client(settings: &BedrockSettings) -> BedrockClient {
        let region = aws_config::Region::new(settings.region.clone());
        let aws_config = if settings.has_explicit_credentials() {
            let credentials = aws_credential_types::Credentials::new(
                settings.access_key_id.as_deref().unwrap_or_default(),
                settings.secret_access_key.as_deref().unwrap_or_default(),
                settings.session_token.clone(),
                None,
                "sonic-gateway",
            );
            aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(credentials)
                .load()
                .await
        } else {
            // Default chain: env vars, profile, IAM role
            aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .load()
                .await
        };
        BedrockClient::new(&aws_config)
    }
}

#[async_trait]
impl ModelStreamConnector for BedrockConnector {
    async fn connect(&self) -> SessionResult<RemoteStream> {
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) =
            mpsc::channel::<SessionResult<String>>(INBOUND_CHANNEL_CAPACITY);
        let (connected_tx, connected_rx) = oneshot::channel::<SessionResult<()>>();

        let settings = self.settings.clone();
        let connect_timeout = settings.connect_timeout;

        let handle = tokio::spawn(async move {
            let client = Self::build_client(&settings).await;

            let input_stream = async_stream::stream! {
                while let Some(event) = outbound_rx.recv().await {
                    let part = BidirectionalInputPayloadPart::builder()
                        .bytes(Blob::new(event.into_bytes()))
                        .build();
                    yield Ok(InvokeModelWithBidirectionalStreamInput::Chunk(part));
                }
                debug!("Outbound event channel closed, ending Bedrock input stream");
            };

            let response = client
                .invoke_model_with_bidirectional_stream()
                .model_id(settings.model_id.clone())
                .body(input_stream.into())
                .send()
                .await;

            let mut output = match response {
                Ok(output) => {
                    info!("Bedrock stream opened for model {}", settings.model_id);
                    let _ = connected_tx.send(Ok(()));
                    output
                }
                Err(e) => {
                    let err = SessionError::Initialization(format!(
                        "Failed to open Bedrock stream: {e}"
                    ));
                    error!("{}", err);
                    let _ = connected_tx.send(Err(err));
                    return;
                }
            };

            loop {
                match output.body.recv().await {
                    Ok(Some(InvokeModelWithBidirectionalStreamOutput::Chunk(part))) => {
                        let Some(bytes) = part.bytes else {
                            continue;
                        };
                        match String::from_utf8(bytes.into_inner()) {
                            Ok(text) => {
                                if inbound_tx.send(Ok(text)).await.is_err() {
                                    debug!("Inbound receiver dropped, stopping Bedrock reader");
                                    break;
                                }
                            }
                            Err(e) => warn!("Dropping non UTF-8 chunk from Bedrock: {}", e),
                        }
                    }
                    Ok(Some(other)) => {
                        debug!("Ignoring Bedrock output event: {:?}", other);
                    }
                    Ok(None) => {
                        info!("Bedrock stream ended");
                        break;
                    }
                    Err(e) => {
                        let err = SessionError::Stream(format!("Bedrock stream error: {e}"));
                        error!("{}", err);
                        let _ = inbound_tx.send(Err(err)).await;
                        break;
                    }
                }
            }
        });

        let driver = StreamDriver::new(handle);
        match tokio::time::timeout(connect_timeout, connected_rx).await {
            Ok(Ok(Ok(()))) => Ok(RemoteStream::new(outbound_tx, inbound_rx, driver)),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(SessionError::Initialization(
                "Bedrock connection task ended before reporting".to_string(),
            )),
            Err(_) => Err(SessionError::Initialization(format!(
                "Timed out opening Bedrock stream after {connect_timeout:?}"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "bedrock"
    }
}
