//! OAuth scope modeling for the Lichess API.

// std
use std::collections::BTreeSet;
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError, ser::SerializeSeq};
// self
use crate::_prelude::*;

macro_rules! def_scopes {
	($($variant:ident => $wire:literal, $doc:literal;)+) => {
		/// Permission granted to a bearer token.
		///
		/// [`Scope::Any`] is a client-side pseudo-scope for endpoints that need some token but
		/// no particular permission. It parses and serializes as `any` but is never sent to or
		/// accepted from the API.
		#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
		pub enum Scope {
			$(
				#[doc = $doc]
				$variant,
			)+
			/// Any authenticated token satisfies the request.
			Any,
		}
		impl Scope {
			/// Every scope the API grants, in declaration order.
			pub const ALL: &'static [Scope] = &[$(Scope::$variant,)+];

			/// Returns the wire identifier (e.g. `email:read`).
			pub const fn as_str(self) -> &'static str {
				match self {
					$(Scope::$variant => $wire,)+
					Scope::Any => "any",
				}
			}
		}
		impl FromStr for Scope {
			type Err = ScopeValidationError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				match s {
					$($wire => Ok(Scope::$variant),)+
					"any" => Ok(Scope::Any),
					"" => Err(ScopeValidationError::Empty),
					other => Err(ScopeValidationError::Unknown { scope: other.to_owned() }),
				}
			}
		}
	};
}

def_scopes! {
	PreferenceRead => "preference:read", "Read preferences.";
	PreferenceWrite => "preference:write", "Write preferences.";
	EmailRead => "email:read", "Read email address.";
	EngineRead => "engine:read", "Read external engines.";
	EngineWrite => "engine:write", "Create, update, delete external engines.";
	ChallengeRead => "challenge:read", "Read incoming challenges.";
	ChallengeWrite => "challenge:write", "Create, accept, decline challenges.";
	ChallengeBulk => "challenge:bulk", "Create many games at once for other players.";
	StudyRead => "study:read", "Read private studies and broadcasts.";
	StudyWrite => "study:write", "Create, update, delete studies and broadcasts.";
	TournamentWrite => "tournament:write", "Create tournaments.";
	RacerWrite => "racer:write", "Create and join puzzle races.";
	PuzzleRead => "puzzle:read", "Read puzzle activity.";
	PuzzleWrite => "puzzle:write", "Create and join puzzle races.";
	TeamRead => "team:read", "Read private team information.";
	TeamWrite => "team:write", "Join and leave teams.";
	TeamLead => "team:lead", "Manage teams you lead.";
	FollowRead => "follow:read", "Read followed players.";
	FollowWrite => "follow:write", "Follow and unfollow other players.";
	MsgWrite => "msg:write", "Send private messages to other players.";
	BoardPlay => "board:play", "Play with the Board API.";
	BotPlay => "bot:play", "Play with the Bot API.";
	WebLogin => "web:login", "Create authenticated website sessions.";
	WebMod => "web:mod", "Use moderator tools.";
}

impl Display for Scope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl Serialize for Scope {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}
impl<'de> Deserialize<'de> for Scope {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		raw.parse().map_err(DeError::custom)
	}
}

/// Errors emitted when validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// The scope is not one the API knows about.
	#[error("Unknown scope: {scope}.")]
	Unknown {
		/// The offending scope string.
		scope: String,
	},
}

/// Ordered, deduplicated set of scopes.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ScopeSet(BTreeSet<Scope>);
impl ScopeSet {
	/// Creates a set from any iterator of scopes.
	pub fn new<I>(scopes: I) -> Self
	where
		I: IntoIterator<Item = Scope>,
	{
		Self(scopes.into_iter().collect())
	}

	/// Parses the comma-separated scope list the API returns in `x-oauth-scopes`.
	///
	/// Unknown entries are skipped so newly introduced server scopes never break
	/// introspection.
	pub fn from_header(value: &str) -> Self {
		Self::from_names(value.split(','))
	}

	/// Collects known scopes from API wire names, skipping blanks, unknown entries, and the
	/// client-side `any`.
	pub fn from_names<'a, I>(names: I) -> Self
	where
		I: IntoIterator<Item = &'a str>,
	{
		let mut set = BTreeSet::new();

		for raw in names.into_iter().map(str::trim).filter(|raw| !raw.is_empty()) {
			match raw.parse::<Scope>() {
				Ok(Scope::Any) => tracing::debug!("Skipping client-side scope from the API."),
				Ok(scope) => {
					set.insert(scope);
				},
				Err(_) => tracing::debug!(scope = raw, "Skipping unknown scope."),
			}
		}

		Self(set)
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the set contains the provided scope.
	pub fn contains(&self, scope: Scope) -> bool {
		self.0.contains(&scope)
	}

	/// Iterator over scopes in stable order.
	pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
		self.0.iter().copied()
	}

	/// Returns the space-delimited representation used in authorization requests.
	///
	/// [`Scope::Any`] is left out; it only matters when picking a token.
	pub fn normalized(&self) -> String {
		self.iter()
			.filter(|scope| *scope != Scope::Any)
			.map(Scope::as_str)
			.collect::<Vec<_>>()
			.join(" ")
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeSet").field(&self.0).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl FromIterator<Scope> for ScopeSet {
	fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
		Self::new(iter)
	}
}
impl<const N: usize> From<[Scope; N]> for ScopeSet {
	fn from(value: [Scope; N]) -> Self {
		Self::new(value)
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.split_whitespace().map(Scope::from_str).collect::<Result<BTreeSet<_>, _>>().map(Self)
	}
}
impl Serialize for ScopeSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut seq = serializer.serialize_seq(Some(self.0.len()))?;

		for scope in &self.0 {
			seq.serialize_element(scope)?;
		}

		seq.end()
	}
}
impl<'de> Deserialize<'de> for ScopeSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let values = <Vec<Scope>>::deserialize(deserializer)?;

		Ok(Self::new(values))
	}
}
