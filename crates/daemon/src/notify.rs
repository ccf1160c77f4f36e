// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification sink selected by configuration.

use async_trait::async_trait;
use tl_adapters::{DesktopNotifyAdapter, LogNotifyAdapter, NotifyAdapter, NotifyError};

use crate::config::NotifyMode;

/// Routes notifications to the adapter chosen in `taskloop.toml`.
#[derive(Clone, Copy, Debug)]
pub enum DaemonNotifier {
    Desktop(DesktopNotifyAdapter),
    Log(LogNotifyAdapter),
}

impl DaemonNotifier {
    pub fn new(mode: NotifyMode) -> Self {
        match mode {
            NotifyMode::Desktop => DaemonNotifier::Desktop(DesktopNotifyAdapter::new()),
            NotifyMode::Log => DaemonNotifier::Log(LogNotifyAdapter),
        }
    }
}

#[async_trait]
impl NotifyAdapter for DaemonNotifier {
    async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        match self {
            DaemonNotifier::Desktop(adapter) => adapter.notify(title, message).await,
            DaemonNotifier::Log(adapter) => adapter.notify(title, message).await,
        }
    }
}
