use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument};

use crate::artifacts::Artifact;
use crate::batch::DocumentUploader;
use crate::cdp::CdpClient;
use crate::config::Config;
use crate::errors::AutomationError;

/// Element ids and CSS selectors of the SEI screens the robot touches,
/// collected in one place because they are the first thing to break when
/// SEI changes shape.
pub mod selectors {
    /// Quick search field on the top document.
    pub const QUICK_SEARCH: &str = "#txtPesquisaRapida";
    /// Iframe where SEI renders the process view and all forms (element id).
    pub const VIEWER_FRAME: &str = "ifrVisualizacao";
    /// "Include document" action link in the process action tree.
    pub const NEW_DOCUMENT_LINK: &str =
        "#divArvoreAcoes a[href*='acao=documento_escolher_tipo']";
    /// First row of the document type table — "Documento Externo".
    pub const EXTERNAL_DOC_ROW: &str = "#tblSeries > tbody > tr:nth-child(1)";
    /// Document series dropdown on the external document form.
    pub const SERIES_DROPDOWN: &str = "#selSerie";
    /// Elaboration date field (dd/mm/yyyy).
    pub const DATE_FIELD: &str = "#txtDataElaboracao";
    /// "Nato-digital" origin radio label.
    pub const NATO_DIGITAL_LABEL: &str = "#lblNato";
    /// "Público" access level label.
    pub const PUBLIC_LABEL: &str = "#lblPublico";
    /// Attachment display name field.
    pub const DOC_NAME_FIELD: &str = "#txtNumero";
    /// File input of the attachment form.
    pub const FILE_INPUT: &str = "#filArquivo";
    /// "Confirmar Dados" button.
    pub const SAVE_BUTTON: &str = "#btnSalvar";
    /// Progress iframe shown while the upload runs; its disappearance is
    /// the confirmation signal.
    pub const UPLOAD_PROGRESS_FRAME: &str = "#ifrProgressofrmAnexos";
}

/// Visible label of the document series every attachment is filed under.
const SERIES_LABEL: &str = "Anexo";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Where a page-script lookup runs: the top document, or the viewer iframe
/// where SEI renders forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Top,
    Viewer,
}

impl Scope {
    fn document_expr(self) -> String {
        match self {
            Scope::Top => "document".to_string(),
            Scope::Viewer => format!(
                "(document.getElementById({}) || {{}}).contentDocument",
                js_string(selectors::VIEWER_FRAME)
            ),
        }
    }
}

/// Drives the fixed SEI upload workflow over an attached browser tab.
///
/// One unified sequence per file: search the process, open the external
/// document form, fill the metadata, attach the file, save, and wait for
/// the confirmation. The full navigation is redone for every file so the
/// page is always in a known state.
pub struct SeiDriver {
    client: CdpClient,
    wait_timeout: Duration,
}

impl SeiDriver {
    /// Attach to the authenticated SEI tab described by `config`.
    pub async fn connect(config: &Config) -> Result<Self, AutomationError> {
        let client = CdpClient::connect(config.debug_port, &config.tab_url_pattern).await?;
        Ok(Self {
            client,
            wait_timeout: config.wait_timeout,
        })
    }

    /// Walk SEI from the quick search to a filled "Documento Externo" form.
    async fn open_external_document_form(&mut self, process: &str) -> Result<(), AutomationError> {
        self.wait_for(Scope::Top, selectors::QUICK_SEARCH).await?;
        let submitted = self
            .client
            .evaluate(&submit_search_expr(selectors::QUICK_SEARCH, process))
            .await?;
        if !submitted.as_bool().unwrap_or(false) {
            return Err(AutomationError::ElementNotFound(
                selectors::QUICK_SEARCH.to_string(),
            ));
        }
        debug!(process, "process search submitted");

        // The click waits double as the frame-load waits: the viewer iframe
        // only resolves once the process page rendered inside it.
        self.click(Scope::Viewer, selectors::NEW_DOCUMENT_LINK).await?;
        self.click(Scope::Viewer, selectors::EXTERNAL_DOC_ROW).await?;

        // Metadata common to every attachment: series, date, origin, access.
        self.select_option(Scope::Viewer, selectors::SERIES_DROPDOWN, SERIES_LABEL)
            .await?;
        let today = Local::now().format("%d/%m/%Y").to_string();
        self.set_value(Scope::Viewer, selectors::DATE_FIELD, &today)
            .await?;
        self.click(Scope::Viewer, selectors::NATO_DIGITAL_LABEL).await?;
        self.click(Scope::Viewer, selectors::PUBLIC_LABEL).await?;
        debug!("external document form prepared");
        Ok(())
    }

    /// Wait until an element matching `selector` exists in `scope`.
    async fn wait_for(&mut self, scope: Scope, selector: &str) -> Result<(), AutomationError> {
        let expr = exists_expr(scope, selector);
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            match self.client.evaluate(&expr).await {
                Ok(v) if v.as_bool().unwrap_or(false) => return Ok(()),
                Ok(_) => {}
                // The page may be mid-navigation; keep polling.
                Err(AutomationError::Script(_)) => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "element '{selector}' did not appear within {:?}",
                    self.wait_timeout
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait until no element matching `selector` is visible in `scope`.
    async fn wait_gone(&mut self, scope: Scope, selector: &str) -> Result<(), AutomationError> {
        let expr = visible_expr(scope, selector);
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            match self.client.evaluate(&expr).await {
                Ok(v) if !v.as_bool().unwrap_or(false) => return Ok(()),
                Ok(_) => {}
                Err(AutomationError::Script(_)) => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "element '{selector}' still visible after {:?}",
                    self.wait_timeout
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&mut self, scope: Scope, selector: &str) -> Result<(), AutomationError> {
        self.wait_for(scope, selector).await?;
        let clicked = self.client.evaluate(&click_expr(scope, selector)).await?;
        if !clicked.as_bool().unwrap_or(false) {
            return Err(AutomationError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn set_value(
        &mut self,
        scope: Scope,
        selector: &str,
        value: &str,
    ) -> Result<(), AutomationError> {
        self.wait_for(scope, selector).await?;
        let set = self
            .client
            .evaluate(&set_value_expr(scope, selector, value))
            .await?;
        if !set.as_bool().unwrap_or(false) {
            return Err(AutomationError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn select_option(
        &mut self,
        scope: Scope,
        selector: &str,
        label: &str,
    ) -> Result<(), AutomationError> {
        self.wait_for(scope, selector).await?;
        let selected = self
            .client
            .evaluate(&select_option_expr(scope, selector, label))
            .await?;
        if !selected.as_bool().unwrap_or(false) {
            return Err(AutomationError::ElementNotFound(format!(
                "option '{label}' in {selector}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentUploader for SeiDriver {
    #[instrument(skip(self, artifact), fields(artifact = %artifact.name))]
    async fn upload(&mut self, process: &str, artifact: &Artifact) -> Result<(), AutomationError> {
        self.open_external_document_form(process).await?;

        self.set_value(Scope::Viewer, selectors::DOC_NAME_FIELD, &artifact.name)
            .await?;
        self.client
            .set_file_input(
                Some(selectors::VIEWER_FRAME),
                selectors::FILE_INPUT,
                &artifact.path,
            )
            .await?;
        self.click(Scope::Viewer, selectors::SAVE_BUTTON).await?;
        info!("save clicked, waiting for the upload to finish");

        // The progress iframe disappearing is the confirmation signal; a
        // timeout here means the upload was never confirmed and the caller
        // must not record it.
        self.wait_gone(Scope::Viewer, selectors::UPLOAD_PROGRESS_FRAME)
            .await
            .map_err(|e| match e {
                AutomationError::Timeout(_) => AutomationError::Timeout(format!(
                    "upload of '{}' was not confirmed within {:?}",
                    artifact.name, self.wait_timeout
                )),
                other => other,
            })?;
        info!("upload confirmed");
        Ok(())
    }
}

/// Embed a Rust string as a JavaScript string literal.
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn exists_expr(scope: Scope, selector: &str) -> String {
    format!(
        "(() => {{ const d = {doc}; return !!(d && d.querySelector({sel})); }})()",
        doc = scope.document_expr(),
        sel = js_string(selector)
    )
}

fn visible_expr(scope: Scope, selector: &str) -> String {
    format!(
        "(() => {{ const d = {doc}; const el = d && d.querySelector({sel}); \
         return !!(el && el.offsetParent !== null); }})()",
        doc = scope.document_expr(),
        sel = js_string(selector)
    )
}

fn click_expr(scope: Scope, selector: &str) -> String {
    format!(
        "(() => {{ const d = {doc}; const el = d && d.querySelector({sel}); \
         if (!el) return false; el.click(); return true; }})()",
        doc = scope.document_expr(),
        sel = js_string(selector)
    )
}

fn set_value_expr(scope: Scope, selector: &str, value: &str) -> String {
    format!(
        "(() => {{ const d = {doc}; const el = d && d.querySelector({sel}); \
         if (!el) return false; el.value = {val}; \
         el.dispatchEvent(new Event('input', {{bubbles: true}})); \
         el.dispatchEvent(new Event('change', {{bubbles: true}})); return true; }})()",
        doc = scope.document_expr(),
        sel = js_string(selector),
        val = js_string(value)
    )
}

fn select_option_expr(scope: Scope, selector: &str, label: &str) -> String {
    format!(
        "(() => {{ const d = {doc}; const el = d && d.querySelector({sel}); \
         if (!el) return false; \
         const opt = Array.from(el.options).find(o => o.text.trim() === {label}); \
         if (!opt) return false; el.value = opt.value; \
         el.dispatchEvent(new Event('change', {{bubbles: true}})); return true; }})()",
        doc = scope.document_expr(),
        sel = js_string(selector),
        label = js_string(label)
    )
}

fn submit_search_expr(selector: &str, value: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({sel}); \
         if (!el || !el.form) return false; el.value = {val}; \
         el.form.submit(); return true; }})()",
        sel = js_string(selector),
        val = js_string(value)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes_and_backslashes() {
        assert_eq!(js_string(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn viewer_scope_goes_through_the_iframe() {
        let expr = exists_expr(Scope::Viewer, selectors::SAVE_BUTTON);
        assert!(expr.contains("ifrVisualizacao"));
        assert!(expr.contains("contentDocument"));
        assert!(expr.contains("#btnSalvar"));
    }

    #[test]
    fn top_scope_uses_the_plain_document() {
        let expr = exists_expr(Scope::Top, selectors::QUICK_SEARCH);
        assert!(expr.starts_with("(() => { const d = document;"));
    }

    #[test]
    fn set_value_fires_input_and_change() {
        let expr = set_value_expr(Scope::Viewer, selectors::DATE_FIELD, "05/08/2026");
        assert!(expr.contains("new Event('input'"));
        assert!(expr.contains("new Event('change'"));
        assert!(expr.contains(r#""05/08/2026""#));
    }

    #[test]
    fn select_option_matches_by_visible_text() {
        let expr = select_option_expr(Scope::Viewer, selectors::SERIES_DROPDOWN, SERIES_LABEL);
        assert!(expr.contains(r#"o.text.trim() === "Anexo""#));
    }

    #[test]
    fn search_submits_the_enclosing_form() {
        let expr = submit_search_expr(selectors::QUICK_SEARCH, "53000.012345/2024-01");
        assert!(expr.contains("el.form.submit()"));
        assert!(expr.contains("53000.012345/2024-01"));
    }
}
