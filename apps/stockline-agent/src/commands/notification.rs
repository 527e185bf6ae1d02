//! # Notification Commands

use std::fmt;

use futures_util::StreamExt;
use serde::Serialize;

use stockline_core::{LoadState, Notification};
use stockline_sync::SyncEngine;

use crate::error::{ApiError, ApiResult, ErrorCode};

/// Result of `notifications`.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationList {
    /// Unviewed count before any `--mark-viewed`.
    pub unviewed: u64,
    pub notifications: Vec<Notification>,
}

impl fmt::Display for NotificationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} unviewed", self.unviewed)?;
        for n in &self.notifications {
            let marker = if n.is_viewed { ' ' } else { '*' };
            write!(
                f,
                "\n{marker} {:<9} {:<30} {}",
                n.status.as_str(),
                n.product_name,
                n.created_at.format("%Y-%m-%d %H:%M:%S")
            )?;
        }
        Ok(())
    }
}

/// Lists notifications newest first, optionally marking them all viewed.
pub async fn list(engine: &SyncEngine, mark_viewed: bool) -> ApiResult<NotificationList> {
    let unviewed = engine
        .unviewed_notification_count()
        .next()
        .await
        .ok_or_else(|| ApiError::internal("Unviewed count ended without a result"))?;

    let mut states = engine.notifications();
    let notifications = loop {
        match states.next().await {
            Some(LoadState::Loading) => continue,
            Some(LoadState::Ready(list)) => break list,
            Some(LoadState::Failed(message)) => return Err(ApiError::new(ErrorCode::StorageError, message)),
            None => return Err(ApiError::internal("Notification list ended without a result")),
        }
    };

    if mark_viewed {
        engine.mark_all_viewed().await?;
    }

    Ok(NotificationList { unviewed, notifications })
}
