//! Fake Moe FM API shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use moefm::api::SignedApi;
use moefm::catalog::{ContainerUpdate, DirectoryHost, NotificationError};
use moefm::{MoeFmError, Result};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Build one raw playlist entry
pub fn entry(sub_id: &str, stream_length: u64) -> Value {
    json!({
        "sub_id": sub_id,
        "title": format!("song.01 Song {}", sub_id),
        "sub_title": format!("Song {}", sub_id),
        "artist": "Artist",
        "wiki_title": "Album",
        "cover": {"large": format!("http://img.moe.fm/{}.jpg", sub_id)},
        "stream_time": "3:20",
        "stream_length": stream_length,
        "url": format!("http://nyan.moe.fm/{}.mp3", sub_id),
        "file_size": 3200
    })
}

/// Build a playlist page from sub ids, each 200 seconds long
pub fn page(sub_ids: &[&str]) -> Value {
    json!({
        "response": {
            "information": {"has_error": false, "page": 1, "may_have_next": true},
            "playlist": sub_ids.iter().map(|id| entry(id, 200)).collect::<Vec<_>>()
        }
    })
}

pub fn empty_page() -> Value {
    page(&[])
}

pub fn error_page(message: &str) -> Value {
    json!({
        "response": {
            "information": {"has_error": true, "msg": [message]}
        }
    })
}

/// Scripted [`SignedApi`]: playlist requests consume the queued responses in
/// order (an exhausted script answers empty pages), listen reports are counted.
#[derive(Default)]
pub struct ScriptedApi {
    responses: Mutex<VecDeque<Result<Value>>>,
    playlist_params: Mutex<Vec<Vec<(String, String)>>>,
    listened: Mutex<Vec<String>>,
    playlist_calls: AtomicUsize,
    fail_listen: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: Value) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn push_err(&self, err: MoeFmError) -> &Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap() = Some(latency);
        self
    }

    pub fn fail_listen(&self) {
        self.fail_listen.store(true, Ordering::SeqCst);
    }

    pub fn playlist_calls(&self) -> usize {
        self.playlist_calls.load(Ordering::SeqCst)
    }

    pub fn playlist_params(&self) -> Vec<Vec<(String, String)>> {
        self.playlist_params.lock().unwrap().clone()
    }

    pub fn listened(&self) -> Vec<String> {
        self.listened.lock().unwrap().clone()
    }
}

#[async_trait]
impl SignedApi for ScriptedApi {
    async fn get_json(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value> {
        if endpoint.starts_with("/ajax/log") {
            let obj_id = params
                .iter()
                .find(|(k, _)| k == "obj_id")
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
            self.listened.lock().unwrap().push(obj_id);
            if self.fail_listen.load(Ordering::SeqCst) {
                return Err(MoeFmError::Status {
                    code: 500,
                    message: "log unavailable".into(),
                });
            }
            return Ok(json!({"response": {"information": {"has_error": false}}}));
        }

        self.playlist_calls.fetch_add(1, Ordering::SeqCst);
        self.playlist_params.lock().unwrap().push(params.to_vec());

        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(empty_page()))
    }
}

/// Host that records every notification
#[derive(Default)]
pub struct RecordingHost {
    pub updates: Mutex<Vec<ContainerUpdate>>,
}

impl DirectoryHost for RecordingHost {
    fn container_updated(
        &self,
        update: &ContainerUpdate,
    ) -> std::result::Result<(), NotificationError> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

/// Yield until `condition` holds, giving spawned tasks a chance to run
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::task::yield_now().await;
    }
    condition()
}
