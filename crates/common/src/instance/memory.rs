//! In-process session backend
//!
//! A [`MemoryHost`] stands in for one OS session: named mutexes and windows
//! are shared by every [`MemorySession`] created from it, so threads can play
//! the part of separate launches.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Acquired, CoordinationError, SessionBackend};
use crate::relay::{CopyData, CopyDataReceiver};

struct Window {
    id: u64,
    class: String,
    title: String,
    receiver: Option<Arc<dyn CopyDataReceiver>>,
}

#[derive(Default)]
struct HostState {
    mutexes: HashSet<String>,
    windows: Vec<Window>,
    next_window_id: u64,
}

#[derive(Clone, Default)]
pub struct MemoryHost {
    state: Arc<Mutex<HostState>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A launch whose endpoint, if it opens one, delivers to `receiver`
    pub fn session(&self, receiver: Option<Arc<dyn CopyDataReceiver>>) -> MemorySession {
        MemorySession {
            host: self.clone(),
            receiver,
        }
    }

    pub fn is_held(&self, mutex_name: &str) -> bool {
        self.state.lock().mutexes.contains(mutex_name)
    }

    /// Titles of the open windows of `class`
    pub fn window_titles(&self, class: &str) -> Vec<String> {
        self.state
            .lock()
            .windows
            .iter()
            .filter(|window| window.class == class)
            .map(|window| window.title.clone())
            .collect()
    }
}

pub struct MemorySession {
    host: MemoryHost,
    receiver: Option<Arc<dyn CopyDataReceiver>>,
}

/// Owns a named mutex until dropped
pub struct MemoryMutexGuard {
    host: MemoryHost,
    name: String,
}

impl Drop for MemoryMutexGuard {
    fn drop(&mut self) {
        self.host.state.lock().mutexes.remove(&self.name);
    }
}

/// Open window; closed when dropped
pub struct MemoryWindow {
    host: MemoryHost,
    id: u64,
}

impl MemoryWindow {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for MemoryWindow {
    fn drop(&mut self) {
        self.host
            .state
            .lock()
            .windows
            .retain(|window| window.id != self.id);
    }
}

impl SessionBackend for MemorySession {
    type Guard = MemoryMutexGuard;
    type Endpoint = MemoryWindow;
    type Target = u64;

    fn acquire(&self, mutex_name: &str) -> Result<Acquired<Self::Guard>, CoordinationError> {
        if !self.host.state.lock().mutexes.insert(mutex_name.to_string()) {
            return Ok(Acquired::Existing);
        }
        Ok(Acquired::Owned(MemoryMutexGuard {
            host: self.host.clone(),
            name: mutex_name.to_string(),
        }))
    }

    fn open_endpoint(&self, class: &str, title: &str) -> Result<Self::Endpoint, CoordinationError> {
        let mut state = self.host.state.lock();
        state.next_window_id += 1;
        let id = state.next_window_id;
        state.windows.push(Window {
            id,
            class: class.to_string(),
            title: title.to_string(),
            receiver: self.receiver.clone(),
        });
        Ok(MemoryWindow {
            host: self.host.clone(),
            id,
        })
    }

    fn publish(&self, endpoint: &Self::Endpoint, ready_title: &str) -> Result<(), CoordinationError> {
        let mut state = self.host.state.lock();
        let window = state
            .windows
            .iter_mut()
            .find(|window| window.id == endpoint.id)
            .ok_or_else(|| CoordinationError::Publish("window is closed".to_string()))?;
        window.title = ready_title.to_string();
        Ok(())
    }

    fn find(&self, class: &str, ready_title: &str) -> Option<Self::Target> {
        self.host
            .state
            .lock()
            .windows
            .iter()
            .find(|window| window.class == class && window.title == ready_title)
            .map(|window| window.id)
    }

    fn send(&self, target: &Self::Target, message: &CopyData) -> Result<bool, CoordinationError> {
        let receiver = {
            let state = self.host.state.lock();
            let window = state
                .windows
                .iter()
                .find(|window| window.id == *target)
                .ok_or_else(|| CoordinationError::Send("invalid window".to_string()))?;
            window.receiver.clone()
        };
        Ok(receiver.is_some_and(|receiver| receiver.receive(message)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Coordinator, InstanceNames, InstanceState, Role};

    struct Accept;

    impl CopyDataReceiver for Accept {
        fn receive(&self, _message: &CopyData) -> bool {
            true
        }
    }

    #[test]
    fn test_elected_then_relay() {
        let host = MemoryHost::new();
        let names = InstanceNames::default();

        let first = Coordinator::new(host.session(Some(Arc::new(Accept))), names.clone());
        let elected = first.start(vec!["exe".to_string()], |_, _| Ok(())).unwrap();
        assert_eq!(elected.state(), InstanceState::Elected);
        assert_eq!(host.window_titles(&names.class), vec![names.ready_window.clone()]);

        let second = Coordinator::new(host.session(None), names.clone());
        let relay = second.start(vec!["exe".to_string()], |_, _| Ok(())).unwrap();
        assert!(matches!(relay, Role::Relay { delivered: true }));

        drop(elected);
        assert!(!host.is_held(&names.mutex));
        assert!(host.window_titles(&names.class).is_empty());
    }

    #[test]
    fn test_failed_init_releases_everything() {
        let host = MemoryHost::new();
        let names = InstanceNames::default();

        let err = Coordinator::new(host.session(None), names.clone())
            .start(Vec::new(), |_, _| {
                Err(CoordinationError::Init("engine unavailable".to_string()))
            })
            .err();
        assert!(matches!(err, Some(CoordinationError::Init(_))));
        assert!(!host.is_held(&names.mutex));
        assert!(host.window_titles(&names.class).is_empty());
    }

    #[test]
    fn test_unpublished_endpoint_is_invisible() {
        let host = MemoryHost::new();
        let names = InstanceNames::default();
        let relay_host = host.clone();
        let relay_names = names.clone();

        let coordinator = Coordinator::new(host.session(Some(Arc::new(Accept))), names.clone());
        let _role = coordinator
            .start(Vec::new(), move |_, _| {
                let relay = Coordinator::new(relay_host.session(None), relay_names);
                let err = relay.start(Vec::new(), |_, _| Ok(())).err();
                assert!(matches!(err, Some(CoordinationError::ElectedNotFound)));
                Ok(())
            })
            .unwrap();
    }
}
