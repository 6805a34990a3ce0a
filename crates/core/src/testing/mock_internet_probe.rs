//! Switchable internet probe for testing.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::connectivity::InternetProbe;

#[derive(Debug)]
pub struct MockInternetProbe {
    online: AtomicBool,
}

impl Default for MockInternetProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInternetProbe {
    pub fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl InternetProbe for MockInternetProbe {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
