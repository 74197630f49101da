//! Incremental `text/event-stream` decoding.

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
	pub event: String,
	pub data: String,
}

/// Splits a byte stream into events. Chunks may end anywhere, including in
/// the middle of a UTF-8 sequence.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
	buf: Vec<u8>,
}

impl SseDecoder {
	pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
		self.buf.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

		let mut events = Vec::new();
		while let Some(end) = self.buf.windows(2).position(|w| w == b"\n\n") {
			let block: Vec<u8> = self.buf.drain(..end + 2).collect();
			if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..end])) {
				events.push(event);
			}
		}
		events
	}
}

fn parse_block(block: &str) -> Option<SseEvent> {
	let mut event = String::from("message");
	let mut data: Vec<&str> = Vec::new();
	for line in block.lines() {
		if line.starts_with(':') {
			continue;
		}
		let (field, value) = match line.split_once(':') {
			Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
			None => (line, ""),
		};
		match field {
			"event" => event = value.to_string(),
			"data" => data.push(value),
			_ => {}
		}
	}
	if data.is_empty() && event == "message" {
		return None;
	}
	Some(SseEvent { event, data: data.join("\n") })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn events_split_across_chunks() {
		let mut decoder = SseDecoder::default();
		assert!(decoder.push(b"event: put\ndata: {\"pa").is_empty());
		let events = decoder.push(b"th\":\"/\",\"data\":null}\n\nevent: keep-alive\ndata: null\n\n");
		assert_eq!(
			events,
			vec![
				SseEvent {
					event: "put".into(),
					data: r#"{"path":"/","data":null}"#.into(),
				},
				SseEvent {
					event: "keep-alive".into(),
					data: "null".into(),
				},
			]
		);
	}

	#[test]
	fn crlf_comments_and_multiline_data() {
		let mut decoder = SseDecoder::default();
		let events = decoder.push(b": hello\r\nevent: patch\r\ndata: a\r\ndata: b\r\n\r\n");
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].event, "patch");
		assert_eq!(events[0].data, "a\nb");
	}

	#[test]
	fn split_utf8_sequence_survives() {
		let mut decoder = SseDecoder::default();
		let text = "event: put\ndata: café\n\n".as_bytes();
		let split = text.len() - 3;
		assert!(decoder.push(&text[..split]).is_empty());
		let events = decoder.push(&text[split..]);
		assert_eq!(events[0].data, "café");
	}
}
