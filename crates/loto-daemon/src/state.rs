//! Shared state handed to every Axum handler.

use std::sync::Arc;

use anyhow::Context;
use loto_auth::TokenVerifier;
use loto_core::LotoService;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::qr::{QrPngEncoder, TicketCodeEncoder};
use crate::render::{HtmlTicketPage, TicketPageRenderer};

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Holds no round state: every request goes through `service` to the store.
pub struct AppState {
    pub build: BuildInfo,
    pub service: LotoService,
    pub verifier: Arc<dyn TokenVerifier>,
    pub encoder: Arc<dyn TicketCodeEncoder>,
    pub renderer: Arc<dyn TicketPageRenderer>,
}

impl AppState {
    /// QR/PNG codes and the HTML ticket page by default.
    pub fn new(service: LotoService, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            build: BuildInfo {
                service: "loto-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            service,
            verifier,
            encoder: Arc::new(QrPngEncoder::default()),
            renderer: Arc::new(HtmlTicketPage),
        }
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn TicketCodeEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn TicketPageRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Refuse to serve if a lookup URL cannot be turned into a ticket code.
    /// Ticket ids are fixed-length, so one nil-id URL stands for all of them.
    pub fn check_ticket_code(&self) -> anyhow::Result<()> {
        let url = self.service.lookup_url(Uuid::nil());
        self.encoder
            .encode(&url)
            .map(|_| ())
            .with_context(|| format!("ticket lookup URL {url} cannot be encoded"))
    }
}
