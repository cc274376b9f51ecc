//! Response mappers and the lazy sequence of mapped lines.

// std
use std::{
	marker::PhantomData,
	task::{Context, Poll},
};
// crates.io
use futures::{Stream, StreamExt, TryStreamExt, stream::BoxStream};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::{ApiError, MappingError},
	http::BodyStream,
};

/// Converts response lines into caller items and failure bodies into [`ApiError`]s.
pub trait ResponseMapper
where
	Self: 'static + Send + Sync,
{
	/// Item produced per non-empty response line.
	type Item: 'static + Send;

	/// Maps one trimmed, non-empty, non-keep-alive line.
	fn map_line(&self, line: &str) -> Result<Self::Item, MappingError>;

	/// Parses the drained body of a non-success response.
	fn map_failure(&self, status: StatusCode, body: &str) -> ApiError {
		ApiError::from_body(status, body)
	}
}

/// Decodes every line as JSON into `T`, reporting the failing path on errors.
pub struct JsonMapper<T>(PhantomData<fn() -> T>);
impl<T> JsonMapper<T> {
	/// Creates the mapper.
	pub fn new() -> Self {
		Self(PhantomData)
	}
}
impl<T> Default for JsonMapper<T> {
	fn default() -> Self {
		Self::new()
	}
}
impl<T> Clone for JsonMapper<T> {
	fn clone(&self) -> Self {
		Self::new()
	}
}
impl<T> Debug for JsonMapper<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "JsonMapper<{}>", std::any::type_name::<T>())
	}
}
impl<T> ResponseMapper for JsonMapper<T>
where
	T: 'static + Send + DeserializeOwned,
{
	type Item = T;

	fn map_line(&self, line: &str) -> Result<T, MappingError> {
		let mut deserializer = serde_json::Deserializer::from_str(line);

		Ok(serde_path_to_error::deserialize(&mut deserializer)?)
	}
}

/// Yields every line verbatim (PGN, plain text endpoints).
#[derive(Clone, Copy, Debug, Default)]
pub struct TextMapper;
impl ResponseMapper for TextMapper {
	type Item = String;

	fn map_line(&self, line: &str) -> Result<String, MappingError> {
		Ok(line.to_owned())
	}
}

/// Lazy sequence of mapped response lines.
///
/// Finite for buffered endpoints, open-ended for streams. Dropping it closes the connection
/// and releases any capacity the request still holds.
pub struct Entries<T> {
	inner: BoxStream<'static, Result<T>>,
}
impl<T> Entries<T>
where
	T: 'static + Send,
{
	/// Wraps an arbitrary stream of items.
	pub fn new<S>(stream: S) -> Self
	where
		S: 'static + Send + Stream<Item = Result<T>>,
	{
		Self { inner: stream.boxed() }
	}

	/// First item, dropping the rest of the sequence.
	pub async fn first(mut self) -> Option<Result<T>> {
		self.inner.next().await
	}

	/// Collects every item, stopping at the first error.
	pub async fn collect_all(self) -> Result<Vec<T>> {
		self.inner.try_collect().await
	}
}
impl<T> Stream for Entries<T> {
	type Item = Result<T>;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		self.inner.as_mut().poll_next(cx)
	}
}
impl<T> Debug for Entries<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Entries(..)")
	}
}

/// Splits `body` into lines and maps them, keeping `guard` alive until the sequence ends or
/// is dropped.
pub(crate) fn map_lines<M, G>(body: BodyStream, mapper: M, guard: G) -> Entries<M::Item>
where
	M: ResponseMapper,
	G: 'static + Send,
{
	let stream = async_stream::stream! {
		let _guard = guard;
		let mut body = body;
		let mut pending = Vec::new();

		while let Some(chunk) = body.next().await {
			let chunk = match chunk {
				Ok(chunk) => chunk,
				Err(e) => {
					yield Err(Error::from(e));
					pending.clear();

					break;
				},
			};

			pending.extend_from_slice(&chunk);

			while let Some(end) = pending.iter().position(|byte| *byte == b'\n') {
				let line = pending.drain(..=end).collect::<Vec<_>>();

				if let Some(item) = map_line(&mapper, line) {
					yield item;
				}
			}
		}

		if !pending.is_empty() {
			if let Some(item) = map_line(&mapper, pending) {
				yield item;
			}
		}
	};

	Entries::new(stream)
}

fn map_line<M>(mapper: &M, raw: Vec<u8>) -> Option<Result<M::Item>>
where
	M: ResponseMapper,
{
	let line = match String::from_utf8(raw) {
		Ok(line) => line,
		Err(e) => return Some(Err(MappingError::from(e).into())),
	};
	let line = line.trim();

	// Keep-alive.
	if line.is_empty() || line == "{}" {
		return None;
	}

	Some(mapper.map_line(line).map_err(Error::from))
}

#[cfg(test)]
mod tests {
	// crates.io
	use futures::stream;
	// self
	use super::*;
	use crate::error::TransportError;

	#[derive(Debug, PartialEq, Deserialize)]
	struct Event {
		r#type: String,
	}

	fn chunked(chunks: &[&str]) -> BodyStream {
		let chunks = chunks
			.iter()
			.map(|chunk| Ok::<_, TransportError>(chunk.as_bytes().to_vec()))
			.collect::<Vec<_>>();

		Box::pin(stream::iter(chunks))
	}

	#[tokio::test]
	async fn lines_split_across_chunks_and_skip_keep_alives() {
		let body = chunked(&["{\"type\":\"gam", "eStart\"}\n{}\n\n", "{\"type\":\"gameFinish\"}"]);
		let events = map_lines(body, JsonMapper::<Event>::new(), ())
			.collect_all()
			.await
			.expect("Events should decode.");

		let kinds = events.into_iter().map(|event| event.r#type).collect::<Vec<_>>();

		assert_eq!(kinds, ["gameStart", "gameFinish"]);
	}

	#[tokio::test]
	async fn undecodable_lines_surface_in_sequence() {
		let body = chunked(&["{\"type\":1}\n{\"type\":\"ok\"}\n"]);
		let items = map_lines(body, JsonMapper::<Event>::new(), ()).collect::<Vec<_>>().await;

		assert_eq!(items.len(), 2);

		let Err(Error::Mapping(MappingError::Json(err))) = &items[0] else {
			panic!("First line should fail to map: {:?}", items[0]);
		};

		assert_eq!(err.path().to_string(), "type");
		assert!(items[1].is_ok());
	}

	#[tokio::test]
	async fn transport_errors_end_the_sequence() {
		let body: BodyStream = Box::pin(stream::iter(vec![
			Ok(b"one\ntw".to_vec()),
			Err(TransportError::Io(std::io::Error::other("reset"))),
			Ok(b"o\n".to_vec()),
		]));
		let items = map_lines(body, TextMapper, ()).collect::<Vec<_>>().await;

		assert_eq!(items.len(), 2);
		assert_eq!(items[0].as_ref().expect("First line should map."), "one");
		assert!(matches!(items[1], Err(Error::Transport(_))));
	}

	#[tokio::test]
	async fn guard_drops_with_sequence() {
		let guard = Arc::new(());
		let entries = map_lines(chunked(&["a\nb\n"]), TextMapper, guard.clone());

		assert_eq!(Arc::strong_count(&guard), 2);

		let first = entries.first().await;

		assert_eq!(first.and_then(|item| item.ok()), Some("a".to_owned()));
		assert_eq!(Arc::strong_count(&guard), 1);
	}
}
