use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use filterio::Session;

/// Sessions currently served, keyed by session id.
#[derive(Clone, Default)]
pub(crate) struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<u64, Session>>>,
}

impl SessionRegistry {
    pub(crate) fn insert(&self, session: Session) {
        self.sessions.lock().insert(session.id(), session);
    }

    pub(crate) fn remove(&self, id: u64) {
        self.sessions.lock().remove(&id);
    }

    pub(crate) fn snapshot(&self) -> Vec<Session> {
        self.sessions.lock().values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.lock().len()
    }
}
