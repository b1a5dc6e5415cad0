//! Mock click-through opener for orchestrator tests.

use crate::playback::LinkOpener;
use std::sync::Mutex;
use url::Url;

/// Mock implementation of the `LinkOpener` trait; journals opened URLs.
pub struct MockOpener {
    opened: Mutex<Vec<Url>>,
}

impl MockOpener {
    pub fn new() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<Url> {
        self.opened.lock().unwrap().clone()
    }
}

impl Default for MockOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkOpener for MockOpener {
    fn open(&self, url: &Url) {
        self.opened.lock().unwrap().push(url.clone());
    }
}
