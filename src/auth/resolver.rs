//! Per-scope bearer token selection strategies.

// std
use std::collections::hash_map::Entry;
// self
use crate::{
	_prelude::*,
	auth::{Scope, ScopeSet, Token},
	dispatch::Dispatcher,
};

/// Strategy that picks the bearer token for a request's required scope.
///
/// `None` from [`TokenResolver::token_for`] means the request goes out without an
/// `authorization` header.
#[derive(Debug)]
pub enum TokenResolver {
	/// One token serves every scope.
	Single(Token),
	/// Tokens with unknown scopes, introspected once on first use.
	Pooled(TokenPool),
	/// Fixed scope to token map.
	Explicit(BTreeMap<Scope, Token>),
}
impl TokenResolver {
	/// Single-token strategy.
	pub fn single(token: Token) -> Self {
		Self::Single(token)
	}

	/// Auto-scoped pool strategy.
	pub fn pooled<I>(tokens: I) -> Self
	where
		I: IntoIterator<Item = Token>,
	{
		Self::Pooled(TokenPool::new(tokens))
	}

	/// Explicit scope map strategy.
	pub fn explicit<I>(entries: I) -> Self
	where
		I: IntoIterator<Item = (Scope, Token)>,
	{
		Self::Explicit(entries.into_iter().collect())
	}

	/// Returns the token to attach for `scope`.
	///
	/// Pooled resolvers only answer from their cache; call [`TokenResolver::resolve`] first
	/// (the dispatcher does so before every scoped request).
	pub fn token_for(&self, scope: Scope) -> Option<Token> {
		match self {
			Self::Single(token) => Some(token.clone()),
			Self::Pooled(pool) => pool.token_for(scope),
			Self::Explicit(map) => match scope {
				Scope::Any => map.get(&Scope::Any).or_else(|| map.values().next()).cloned(),
				scope => map.get(&scope).cloned(),
			},
		}
	}

	/// Runs pooled scope introspection if it has not happened yet. No-op for other
	/// strategies.
	pub async fn resolve(&self, dispatcher: &Dispatcher) {
		if let Self::Pooled(pool) = self {
			pool.resolve(dispatcher).await;
		}
	}
}
impl From<Token> for TokenResolver {
	fn from(token: Token) -> Self {
		Self::Single(token)
	}
}

/// Pool of tokens whose scopes are discovered through introspection.
#[derive(Debug)]
pub struct TokenPool {
	tokens: Vec<Token>,
	cache: ScopeCache,
	resolved: AsyncMutex<bool>,
}
impl TokenPool {
	/// Creates an unresolved pool; token order decides lookup priority.
	pub fn new<I>(tokens: I) -> Self
	where
		I: IntoIterator<Item = Token>,
	{
		Self {
			tokens: tokens.into_iter().collect(),
			cache: ScopeCache::default(),
			resolved: AsyncMutex::new(false),
		}
	}

	/// Tokens in insertion order.
	pub fn tokens(&self) -> &[Token] {
		&self.tokens
	}

	/// Returns `true` once introspection has completed.
	pub fn is_resolved(&self) -> bool {
		self.resolved.try_lock().is_some_and(|resolved| *resolved)
	}

	/// Introspects every token in order, exactly once per pool.
	///
	/// Concurrent callers wait for the first resolution instead of repeating it. Tokens whose
	/// introspection fails contribute no scopes.
	pub async fn resolve(&self, dispatcher: &Dispatcher) {
		let mut resolved = self.resolved.lock().await;

		if *resolved {
			return;
		}

		for token in &self.tokens {
			let scopes = dispatcher.fetch_scopes(token).await;

			self.cache.insert(token, &scopes);
		}

		tracing::debug!(tokens = self.tokens.len(), "Token pool scopes resolved.");

		*resolved = true;
	}

	/// First cached token valid for `scope`; [`Scope::Any`] returns the first pool token.
	pub fn token_for(&self, scope: Scope) -> Option<Token> {
		match scope {
			Scope::Any => self.tokens.first().cloned(),
			scope => self.cache.first(scope),
		}
	}

	/// Read access to the scope cache.
	pub fn cache(&self) -> &ScopeCache {
		&self.cache
	}
}

/// Append-only scope to token index.
#[derive(Debug, Default)]
pub struct ScopeCache(RwLock<HashMap<Scope, Vec<Token>>>);
impl ScopeCache {
	/// Registers `token` under each of `scopes`, preserving insertion order.
	pub fn insert(&self, token: &Token, scopes: &ScopeSet) {
		let mut map = self.0.write();

		for scope in scopes.iter() {
			match map.entry(scope) {
				Entry::Occupied(mut entry) => {
					if !entry.get().iter().any(|known| known.same_handle(token)) {
						entry.get_mut().push(token.clone());
					}
				},
				Entry::Vacant(entry) => {
					entry.insert(vec![token.clone()]);
				},
			}
		}
	}

	/// First token registered for `scope`.
	pub fn first(&self, scope: Scope) -> Option<Token> {
		self.0.read().get(&scope).and_then(|tokens| tokens.first().cloned())
	}

	/// Number of tokens registered for `scope`.
	pub fn count(&self, scope: Scope) -> usize {
		self.0.read().get(&scope).map_or(0, Vec::len)
	}

	/// Every scope with at least one token.
	pub fn scopes(&self) -> ScopeSet {
		self.0.read().keys().copied().collect()
	}
}
