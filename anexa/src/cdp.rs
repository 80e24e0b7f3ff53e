use std::path::Path;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::errors::AutomationError;

/// Shown when no DevTools endpoint answers on the configured port.
pub const LAUNCH_INSTRUCTIONS: &str = "start Chrome with remote debugging enabled, e.g. \
`chrome.exe --remote-debugging-port=9222 --user-data-dir=C:\\ChromeDebugProfile`, \
log into SEI in that window and run again";

/// Lightweight Chrome DevTools Protocol client bound to a single tab of an
/// already running browser started with `--remote-debugging-port`.
///
/// Tab discovery goes over the HTTP endpoints (`/json/version`, `/json`);
/// everything else runs on the tab's own WebSocket.
pub struct CdpClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u32,
    tab: TabInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TabInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub websocket_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct CdpRequest {
    id: u32,
    method: String,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct CdpResponse {
    id: Option<u32>,
    result: Option<Value>,
    error: Option<Value>,
}

impl CdpClient {
    /// List the open tabs of the browser debugged on `port`.
    pub async fn list_tabs(port: u16) -> Result<Vec<TabInfo>, AutomationError> {
        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://127.0.0.1:{port}/json"))
            .send()
            .await
            .map_err(|e| AutomationError::Connection(format!("failed to list tabs: {e}")))?;

        let tabs: Vec<TabInfo> = response
            .json()
            .await
            .map_err(|e| AutomationError::Protocol(format!("failed to parse tab list: {e}")))?;

        debug!("found {} open tabs", tabs.len());
        Ok(tabs)
    }

    /// Check whether a browser is listening with DevTools enabled on `port`.
    pub async fn is_available(port: u16) -> bool {
        let client = reqwest::Client::new();
        match client
            .get(format!("http://127.0.0.1:{port}/json/version"))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Attach to the first tab whose URL contains `url_pattern`.
    pub async fn connect(port: u16, url_pattern: &str) -> Result<Self, AutomationError> {
        if !Self::is_available(port).await {
            return Err(AutomationError::Connection(format!(
                "no DevTools endpoint on port {port}; {LAUNCH_INSTRUCTIONS}"
            )));
        }

        let tab = Self::list_tabs(port)
            .await?
            .into_iter()
            .find(|t| t.url.contains(url_pattern))
            .ok_or_else(|| AutomationError::TabNotFound(url_pattern.to_string()))?;

        let ws_url = tab.websocket_url.clone().ok_or_else(|| {
            AutomationError::Protocol(format!("tab {} exposes no webSocketDebuggerUrl", tab.id))
        })?;

        let (ws, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|e| AutomationError::Connection(format!("websocket connect failed: {e}")))?;

        info!(title = %tab.title, url = %tab.url, "attached to browser tab");
        Ok(Self {
            ws,
            next_id: 0,
            tab,
        })
    }

    /// The tab this client is attached to.
    pub fn tab(&self) -> &TabInfo {
        &self.tab
    }

    /// Evaluate a JavaScript expression in the tab and return its value.
    pub async fn evaluate(&mut self, expression: &str) -> Result<Value, AutomationError> {
        let result = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .and_then(Value::as_str)
                .unwrap_or("JavaScript exception");
            return Err(AutomationError::Script(text.to_string()));
        }

        Ok(result
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Populate a file input with a local file.
    ///
    /// Page JavaScript cannot write to a file input, so this goes through
    /// `DOM.setFileInputFiles`. When `frame_element_id` is given the input
    /// is looked up inside that iframe's content document.
    pub async fn set_file_input(
        &mut self,
        frame_element_id: Option<&str>,
        input_selector: &str,
        file: &Path,
    ) -> Result<(), AutomationError> {
        let doc = self
            .call("DOM.getDocument", json!({"depth": -1, "pierce": true}))
            .await?;
        let root = doc
            .get("root")
            .ok_or_else(|| AutomationError::Protocol("DOM.getDocument returned no root".into()))?;

        let scope_id = match frame_element_id {
            Some(frame_id) => frame_document_node_id(root, frame_id).ok_or_else(|| {
                AutomationError::ElementNotFound(format!(
                    "iframe '{frame_id}' has no content document"
                ))
            })?,
            None => root
                .get("nodeId")
                .and_then(Value::as_i64)
                .ok_or_else(|| AutomationError::Protocol("document root has no nodeId".into()))?,
        };

        let found = self
            .call(
                "DOM.querySelector",
                json!({"nodeId": scope_id, "selector": input_selector}),
            )
            .await?;
        let node_id = found.get("nodeId").and_then(Value::as_i64).unwrap_or(0);
        if node_id == 0 {
            return Err(AutomationError::ElementNotFound(input_selector.to_string()));
        }

        self.call(
            "DOM.setFileInputFiles",
            json!({"nodeId": node_id, "files": [file.to_string_lossy()]}),
        )
        .await?;
        debug!(file = %file.display(), "file input populated");
        Ok(())
    }

    async fn call(&mut self, method: &str, params: Value) -> Result<Value, AutomationError> {
        self.next_id += 1;
        let id = self.next_id;
        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
        };
        let text = serde_json::to_string(&request)
            .map_err(|e| AutomationError::Protocol(e.to_string()))?;
        self.ws
            .send(Message::Text(text))
            .await
            .map_err(|e| AutomationError::Connection(format!("send failed: {e}")))?;

        loop {
            let msg = self
                .ws
                .next()
                .await
                .ok_or_else(|| AutomationError::Connection("websocket closed".into()))?
                .map_err(|e| AutomationError::Connection(format!("receive failed: {e}")))?;

            let Message::Text(text) = msg else { continue };
            let Ok(response) = serde_json::from_str::<CdpResponse>(&text) else {
                continue;
            };
            match response.id {
                Some(rid) if rid == id => {
                    if let Some(error) = response.error {
                        return Err(AutomationError::Protocol(format!("{method}: {error}")));
                    }
                    return Ok(response.result.unwrap_or(Value::Null));
                }
                // Protocol events and answers to other calls.
                _ => continue,
            }
        }
    }
}

/// Walk a pierced `DOM.getDocument` tree looking for the iframe with the
/// given element id and return the nodeId of its content document.
fn frame_document_node_id(node: &Value, frame_element_id: &str) -> Option<i64> {
    if node.get("nodeName").and_then(Value::as_str) == Some("IFRAME")
        && attribute(node, "id") == Some(frame_element_id)
    {
        return node
            .pointer("/contentDocument/nodeId")
            .and_then(Value::as_i64);
    }
    for child in node.get("children").and_then(Value::as_array).into_iter().flatten() {
        if let Some(found) = frame_document_node_id(child, frame_element_id) {
            return Some(found);
        }
    }
    // Nested frames hang their own documents off contentDocument.
    if let Some(content) = node.get("contentDocument") {
        if let Some(found) = frame_document_node_id(content, frame_element_id) {
            return Some(found);
        }
    }
    None
}

/// DOM node attributes come as a flat [name, value, name, value, ...] array.
fn attribute<'a>(node: &'a Value, name: &str) -> Option<&'a str> {
    let attrs = node.get("attributes")?.as_array()?;
    attrs.chunks(2).find_map(|pair| match pair {
        [k, v] if k.as_str() == Some(name) => v.as_str(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_content_document_of_named_iframe() {
        let tree = json!({
            "nodeId": 1,
            "nodeName": "#document",
            "children": [{
                "nodeId": 2,
                "nodeName": "HTML",
                "children": [{
                    "nodeId": 5,
                    "nodeName": "IFRAME",
                    "attributes": ["id", "ifrVisualizacao", "src", "about:blank"],
                    "contentDocument": {"nodeId": 9, "nodeName": "#document"}
                }]
            }]
        });
        assert_eq!(frame_document_node_id(&tree, "ifrVisualizacao"), Some(9));
        assert_eq!(frame_document_node_id(&tree, "ifrOutro"), None);
    }

    #[test]
    fn attribute_reads_flat_pairs() {
        let node = json!({"attributes": ["id", "btnSalvar", "class", "infraButton"]});
        assert_eq!(attribute(&node, "id"), Some("btnSalvar"));
        assert_eq!(attribute(&node, "class"), Some("infraButton"));
        assert_eq!(attribute(&node, "name"), None);
    }
}
