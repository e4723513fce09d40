//! Line-delimited JSON shim between the companion and its host runtime.
//!
//! The host forwards app-message arrivals and configuration screen events
//! as one JSON object per line; the companion answers with outbound
//! messages and viewer requests in the same framing.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::bridge::ConfigViewer;
use crate::message::{AppMessage, MessageSink};

/// Events delivered by the host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event")]
pub enum HostEvent {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "appmessage")]
    AppMessage { payload: AppMessage },
    #[serde(rename = "showConfiguration")]
    ShowConfiguration,
    #[serde(rename = "webviewclosed")]
    WebviewClosed {
        #[serde(default)]
        response: Option<String>,
    },
}

/// Requests sent back to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum HostCommand {
    #[serde(rename = "sendAppMessage")]
    SendAppMessage { payload: AppMessage },
    #[serde(rename = "openURL")]
    OpenUrl { url: String },
}

/// Outbound half of the host shim: both the device channel and the viewer.
#[derive(Debug, Clone)]
pub struct HostChannel {
    tx: UnboundedSender<HostCommand>,
}

impl HostChannel {
    pub fn new(tx: UnboundedSender<HostCommand>) -> Self {
        Self { tx }
    }

    fn push(&self, command: HostCommand) {
        if self.tx.send(command).is_err() {
            tracing::warn!("Host output closed, dropping command");
        }
    }
}

impl MessageSink for HostChannel {
    fn send(&self, message: AppMessage) {
        tracing::debug!("Sending {:?}", message);
        self.push(HostCommand::SendAppMessage { payload: message });
    }
}

impl ConfigViewer for HostChannel {
    fn open_url(&self, url: &str) {
        self.push(HostCommand::OpenUrl {
            url: url.to_string(),
        });
    }
}
