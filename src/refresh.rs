//! Partial refresh of rendered back office pages.
//!
//! The webview shows server-rendered admin pages; the backend mirrors the
//! page it last loaded as a [`PageSnapshot`]. A refresh re-fetches the same
//! URL, extracts a named region from the fresh document, and swaps that
//! region's content both in the snapshot and (via a `region_refresh` event)
//! in the live page. Regions are an explicit contract: name + selector,
//! validated against both documents at refresh time, so a missing region on
//! either side is a clean no-op rather than a corrupted page.

use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tauri::Emitter;
use tracing::{debug, info};

/// A named, selector-identified subtree of a rendered page that can be
/// wholesale-replaced without reloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRegion {
    pub name: &'static str,
    pub selector: &'static str,
}

/// The order changelist table on the admin order list page.
pub const ORDER_LIST_REGION: RefreshRegion = RefreshRegion {
    name: "order-list",
    selector: ".results",
};

/// Every region the companion knows how to refresh.
pub const KNOWN_REGIONS: &[RefreshRegion] = &[ORDER_LIST_REGION];

pub fn region_by_name(name: &str) -> Option<&'static RefreshRegion> {
    KNOWN_REGIONS.iter().find(|r| r.name == name.trim())
}

/// What a refresh attempt did. Anything but `Replaced` leaves the snapshot
/// untouched and emits nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Replaced { content: String },
    LiveRegionMissing,
    FetchedRegionMissing,
    NoPage,
}

impl RefreshOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            RefreshOutcome::Replaced { .. } => "replaced",
            RefreshOutcome::LiveRegionMissing => "live-region-missing",
            RefreshOutcome::FetchedRegionMissing => "fetched-region-missing",
            RefreshOutcome::NoPage => "no-page",
        }
    }
}

/// The backend's mirror of the page the webview currently renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub url: String,
    pub regions: HashMap<String, String>,
}

/// Managed state wrapping the current snapshot. Registered when the webview
/// loads a page, mutated only by successful refreshes.
#[derive(Default)]
pub struct PageView {
    snapshot: Mutex<Option<PageSnapshot>>,
}

/// Inner content of the first node matching the region selector, if present.
pub fn extract_region(html: &str, region: &RefreshRegion) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(region.selector).ok()?;
    document.select(&selector).next().map(|el| el.inner_html())
}

impl PageView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot a freshly loaded page: capture every known region present in
    /// it. Returns the names of the regions captured.
    pub fn register(&self, url: &str, html: &str) -> Vec<&'static str> {
        let mut regions = HashMap::new();
        let mut captured = Vec::new();
        for region in KNOWN_REGIONS {
            if let Some(content) = extract_region(html, region) {
                regions.insert(region.name.to_string(), content);
                captured.push(region.name);
            }
        }
        let mut snapshot = self.snapshot.lock().unwrap_or_else(|p| p.into_inner());
        *snapshot = Some(PageSnapshot {
            url: url.to_string(),
            regions,
        });
        captured
    }

    pub fn current_url(&self) -> Option<String> {
        let snapshot = self.snapshot.lock().unwrap_or_else(|p| p.into_inner());
        snapshot.as_ref().map(|s| s.url.clone())
    }

    /// The snapshot's current content for a region, if captured.
    pub fn region_content(&self, region: &RefreshRegion) -> Option<String> {
        let snapshot = self.snapshot.lock().unwrap_or_else(|p| p.into_inner());
        snapshot
            .as_ref()
            .and_then(|s| s.regions.get(region.name).cloned())
    }

    /// Apply a freshly fetched document to the snapshot. The swap is all or
    /// nothing: either the region exists in both documents and its content is
    /// replaced wholesale, or the snapshot is left exactly as it was.
    pub fn apply_fetched(&self, region: &RefreshRegion, fetched_html: &str) -> RefreshOutcome {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(|p| p.into_inner());
        let Some(snapshot) = snapshot.as_mut() else {
            return RefreshOutcome::NoPage;
        };
        if !snapshot.regions.contains_key(region.name) {
            return RefreshOutcome::LiveRegionMissing;
        }
        let Some(content) = extract_region(fetched_html, region) else {
            return RefreshOutcome::FetchedRegionMissing;
        };
        snapshot.regions.insert(region.name.to_string(), content.clone());
        RefreshOutcome::Replaced { content }
    }

    pub fn snapshot_for_status(&self) -> Value {
        let snapshot = self.snapshot.lock().unwrap_or_else(|p| p.into_inner());
        match snapshot.as_ref() {
            Some(s) => serde_json::json!({
                "url": s.url,
                "regions": s.regions.keys().collect::<Vec<_>>(),
            }),
            None => Value::Null,
        }
    }
}

/// Re-fetch the snapshot's page and swap `region` in place.
///
/// Best-effort background operation: failures are returned for the caller to
/// log, never surfaced to the operator. Only a `Replaced` outcome mutates
/// state and notifies the webview.
pub async fn refresh_region(
    app: &tauri::AppHandle,
    page_view: &PageView,
    region: &RefreshRegion,
) -> Result<RefreshOutcome, String> {
    let Some(url) = page_view.current_url() else {
        return Ok(RefreshOutcome::NoPage);
    };
    let (backoffice_url, session) = crate::backoffice_creds()?;
    let fetched_html = crate::api::fetch_page_html(&backoffice_url, &session, &url).await?;

    let outcome = page_view.apply_fetched(region, &fetched_html);
    match &outcome {
        RefreshOutcome::Replaced { content } => {
            info!(region = region.name, bytes = content.len(), "region refreshed");
            let _ = app.emit(
                "region_refresh",
                serde_json::json!({
                    "region": region.name,
                    "selector": region.selector,
                    "content": content,
                }),
            );
        }
        RefreshOutcome::LiveRegionMissing | RefreshOutcome::FetchedRegionMissing => {
            debug!(region = region.name, outcome = ?outcome, "region not present, refresh skipped");
        }
        RefreshOutcome::NoPage => {
            debug!(region = region.name, "no page registered, refresh skipped");
        }
    }
    Ok(outcome)
}
