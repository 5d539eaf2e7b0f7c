//! Test doubles for the sweep pipeline.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use crate::error::{AppError, Result};
use crate::models::{Article, ChangeEvent, GeneralPageRecord};
use crate::services::{ContentPipeline, WebhookTransport};

/// Serves a configurable title per URL; unknown URLs fail to fetch.
#[derive(Default)]
pub struct ScriptedPipeline {
    titles: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
    entered: Notify,
    shutdowns: Mutex<usize>,
}

impl ScriptedPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, title: &str) {
        self.titles
            .lock()
            .unwrap()
            .insert(url.to_string(), title.to_string());
    }

    pub fn fail(&self, url: &str) {
        self.titles.lock().unwrap().remove(url);
    }

    /// Block every fetch until the returned notify is signalled.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Wait until some fetch has started.
    pub async fn wait_entered(&self) {
        self.entered.notified().await
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn shutdowns(&self) -> usize {
        *self.shutdowns.lock().unwrap()
    }
}

#[async_trait]
impl ContentPipeline for ScriptedPipeline {
    async fn fetch(&self, url: &str) -> Result<Article> {
        self.calls.lock().unwrap().push(url.to_string());
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.entered.notify_one();
            gate.notified().await;
        }

        let title = self.titles.lock().unwrap().get(url).cloned();
        let title = title.ok_or_else(|| AppError::status(url, 500))?;
        Ok(Article::GeneralPage(GeneralPageRecord {
            url: url.to_string(),
            title,
            description: Some("scripted".into()),
            headlines: vec![],
            links: vec![],
            topics: vec![],
            word_count: 1,
            fetched_at: Utc::now(),
        }))
    }

    async fn shutdown(&self) {
        *self.shutdowns.lock().unwrap() += 1;
    }
}

/// Accepts every delivery and records the events.
#[derive(Default)]
pub struct RecordingTransport {
    events: Mutex<Vec<(String, ChangeEvent)>>,
}

impl RecordingTransport {
    pub fn events(&self) -> Vec<(String, ChangeEvent)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookTransport for RecordingTransport {
    async fn deliver(&self, callback_url: &str, event: &ChangeEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push((callback_url.to_string(), event.clone()));
        Ok(())
    }
}
