use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Request scopes that may have at most one live request at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// League list plus the per-league team batch.
    Root,
    /// Seasons of the currently selected league.
    Seasons,
    /// The prediction call.
    Predict,
    /// API health probe shown in the header.
    Health,
}

/// Cooperative cancellation flag shared between the UI thread and a worker.
///
/// A child token observes its parent, so cancelling a root token cancels every child
/// created from it, while cancelling a child leaves the parent untouched.
#[derive(Debug, Clone)]
pub struct CancelToken {
    id: u64,
    flag: Arc<AtomicBool>,
    ancestors: Vec<Arc<AtomicBool>>,
}

impl CancelToken {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            flag: Arc::new(AtomicBool::new(false)),
            ancestors: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self
                .ancestors
                .iter()
                .any(|flag| flag.load(Ordering::Relaxed))
    }

    pub fn child(&self) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(Arc::clone(&self.flag));
        Self {
            id: self.id,
            flag: Arc::new(AtomicBool::new(false)),
            ancestors,
        }
    }
}

/// Registry of the live token per scope. Owned by the UI thread.
#[derive(Debug, Default)]
pub struct ScopeTokens {
    next_id: u64,
    live: HashMap<Scope, CancelToken>,
}

impl ScopeTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels whatever is live for `scope` and registers a fresh token.
    pub fn begin(&mut self, scope: Scope) -> CancelToken {
        self.cancel(scope);
        self.next_id += 1;
        let token = CancelToken::new(self.next_id);
        self.live.insert(scope, token.clone());
        token
    }

    pub fn is_current(&self, scope: Scope, id: u64) -> bool {
        self.live
            .get(&scope)
            .is_some_and(|token| token.id() == id && !token.is_cancelled())
    }

    pub fn is_live(&self, scope: Scope) -> bool {
        self.live.contains_key(&scope)
    }

    /// Retires the token once its result has been applied.
    pub fn finish(&mut self, scope: Scope, id: u64) {
        if self.live.get(&scope).is_some_and(|token| token.id() == id) {
            self.live.remove(&scope);
        }
    }

    pub fn cancel(&mut self, scope: Scope) -> bool {
        match self.live.remove(&scope) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, token) in self.live.drain() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_cancels_previous_token_in_same_scope() {
        let mut tokens = ScopeTokens::new();
        let first = tokens.begin(Scope::Root);
        let second = tokens.begin(Scope::Root);
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!tokens.is_current(Scope::Root, first.id()));
        assert!(tokens.is_current(Scope::Root, second.id()));
    }

    #[test]
    fn scopes_are_independent() {
        let mut tokens = ScopeTokens::new();
        let root = tokens.begin(Scope::Root);
        let seasons = tokens.begin(Scope::Seasons);
        tokens.begin(Scope::Seasons);
        assert!(!root.is_cancelled());
        assert!(seasons.is_cancelled());
    }

    #[test]
    fn child_follows_parent_but_not_the_reverse() {
        let root = CancelToken::new(1);
        let child = root.child();
        let sibling = root.child();
        child.cancel();
        assert!(!root.is_cancelled());
        assert!(!sibling.is_cancelled());
        root.cancel();
        assert!(sibling.is_cancelled());
    }

    #[test]
    fn finish_ignores_stale_ids() {
        let mut tokens = ScopeTokens::new();
        let first = tokens.begin(Scope::Predict);
        let second = tokens.begin(Scope::Predict);
        tokens.finish(Scope::Predict, first.id());
        assert!(tokens.is_live(Scope::Predict));
        tokens.finish(Scope::Predict, second.id());
        assert!(!tokens.is_live(Scope::Predict));
    }

    #[test]
    fn cancel_all_trips_every_token() {
        let mut tokens = ScopeTokens::new();
        let root = tokens.begin(Scope::Root);
        let predict = tokens.begin(Scope::Predict);
        tokens.cancel_all();
        assert!(root.is_cancelled());
        assert!(predict.is_cancelled());
        assert!(!tokens.is_live(Scope::Root));
    }
}
