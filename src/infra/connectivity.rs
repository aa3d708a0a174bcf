use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::application::transport::Connectivity;

/// Shared reachability flag. Clones observe the same value.
///
/// Starts online; the HTTP transport flips it as requests fail to connect or
/// get any response back.
#[derive(Debug, Clone)]
pub struct ConnectivityFlag {
    online: Arc<AtomicBool>,
}

impl ConnectivityFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::AcqRel);
        if previous != online {
            info!(online, "Network reachability changed");
        }
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ConnectivityFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let flag = ConnectivityFlag::default();
        let observer = flag.clone();
        assert!(observer.is_online());

        flag.set_online(false);
        assert!(!observer.is_online());
    }
}
