//! Automation hub: cached external data-fetch results with freshness.

pub mod hub;

use iverton_types::error::FetchError;
use iverton_types::payload::{DataCategory, FetchParams, WidgetContent};

pub use hub::{AutomationHub, HubState, RefreshOutcome};

/// Where the hub gets fresh data from.
pub trait AutomationSource: Send + Sync {
    fn fetch(
        &self,
        category: DataCategory,
        params: &FetchParams,
    ) -> impl std::future::Future<Output = Result<WidgetContent, FetchError>> + Send;
}
