//! Minimal STOMP 1.2 frame codec.
//!
//! The backend's push channel is a WebSocket carrying STOMP text frames.
//! A frame is `COMMAND\n(header:value\n)*\nbody\0`. A text message may
//! carry several frames; bare EOLs between frames are heart-beats.

use std::fmt;

/// Protocol version offered in CONNECT.
pub const ACCEPT_VERSION: &str = "1.2";

/// STOMP frame commands used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Subscribe,
    Unsubscribe,
    Send,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Send => "SEND",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
            Self::Disconnect => "DISCONNECT",
        }
    }

    fn parse(s: &str) -> Result<Self, StompError> {
        Ok(match s {
            "CONNECT" | "STOMP" => Self::Connect,
            "CONNECTED" => Self::Connected,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "SEND" => Self::Send,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            "DISCONNECT" => Self::Disconnect,
            other => return Err(StompError::UnknownCommand(other.to_string())),
        })
    }

    /// CONNECT and CONNECTED headers are never escaped.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of `name`. Repeated headers keep the first
    /// occurrence.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// CONNECT for `host`, heart-beating disabled.
    pub fn connect(host: &str) -> Self {
        Self::new(Command::Connect)
            .with_header("accept-version", ACCEPT_VERSION)
            .with_header("host", host)
            .with_header("heart-beat", "0,0")
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Self::new(Command::Unsubscribe).with_header("id", id)
    }

    pub fn disconnect(receipt: &str) -> Self {
        Self::new(Command::Disconnect).with_header("receipt", receipt)
    }

    /// Serialize to wire text, NUL-terminated.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.header("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// Errors decoding STOMP text.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StompError {
    #[error("Unknown STOMP command: {0}")]
    UnknownCommand(String),

    #[error("Malformed STOMP frame: {0}")]
    Malformed(String),

    #[error("Invalid header escape sequence: \\{0}")]
    BadEscape(char),
}

/// Decode every frame in a WebSocket text message. Heart-beats yield
/// no frames.
pub fn decode_frames(text: &str) -> Result<Vec<Frame>, StompError> {
    let mut frames = Vec::new();
    let mut rest = text;
    loop {
        rest = rest.trim_start_matches(&['\r', '\n'][..]);
        if rest.is_empty() {
            return Ok(frames);
        }
        let (frame, remaining) = decode_one(rest)?;
        frames.push(frame);
        rest = remaining;
    }
}

fn decode_one(text: &str) -> Result<(Frame, &str), StompError> {
    let (command_line, mut rest) = split_line(text)
        .ok_or_else(|| StompError::Malformed("missing command line".into()))?;
    let command = Command::parse(command_line)?;
    let escape = command.escapes_headers();

    let mut headers = Vec::new();
    loop {
        let (line, remaining) = split_line(rest)
            .ok_or_else(|| StompError::Malformed("unterminated headers".into()))?;
        rest = remaining;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| StompError::Malformed(format!("header without colon: {line}")))?;
        if escape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| StompError::Malformed(format!("bad content-length: {v}")))
        })
        .transpose()?;

    let (body, rest) = match content_length {
        Some(len) => {
            let body = rest
                .get(..len)
                .ok_or_else(|| StompError::Malformed("body shorter than content-length".into()))?;
            let after = &rest[len..];
            let after = after
                .strip_prefix('\0')
                .ok_or_else(|| StompError::Malformed("missing NUL after body".into()))?;
            (body, after)
        }
        None => {
            let end = rest
                .find('\0')
                .ok_or_else(|| StompError::Malformed("missing NUL terminator".into()))?;
            (&rest[..end], &rest[end + 1..])
        }
    };

    Ok((
        Frame {
            command,
            headers,
            body: body.to_string(),
        },
        rest,
    ))
}

/// Split off one line, accepting `\n` or `\r\n`.
fn split_line(text: &str) -> Option<(&str, &str)> {
    let end = text.find('\n')?;
    let line = text[..end].strip_suffix('\r').unwrap_or(&text[..end]);
    Some((line, &text[end + 1..]))
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some(other) => return Err(StompError::BadEscape(other)),
            None => return Err(StompError::Malformed("trailing backslash in header".into())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_connect() {
        let text = Frame::connect("localhost").encode();
        assert_eq!(
            text,
            "CONNECT\naccept-version:1.2\nhost:localhost\nheart-beat:0,0\n\n\0"
        );
    }

    #[test]
    fn encode_subscribe() {
        let text = Frame::subscribe("sub-0", "/topic/deadlock").encode();
        assert_eq!(
            text,
            "SUBSCRIBE\nid:sub-0\ndestination:/topic/deadlock\nack:auto\n\n\0"
        );
    }

    #[test]
    fn encode_escapes_headers() {
        let text = Frame::new(Command::Send)
            .with_header("note", "a:b\nc\\d")
            .encode();
        assert!(text.contains("note:a\\cb\\nc\\\\d\n"));
    }

    #[test]
    fn encode_adds_content_length_for_body() {
        let text = Frame::new(Command::Send).with_body("{}").encode();
        assert_eq!(text, "SEND\ncontent-length:2\n\n{}\0");
    }

    #[test]
    fn decode_message_frame() {
        let text = "MESSAGE\ndestination:/topic/deadlock\nsubscription:sub-0\nmessage-id:1\n\n{\"deadlockDetected\":true}\0";
        let frames = decode_frames(text).unwrap();
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.header("destination"), Some("/topic/deadlock"));
        assert_eq!(frame.body, "{\"deadlockDetected\":true}");
    }

    #[test]
    fn decode_connected_does_not_unescape() {
        let frames = decode_frames("CONNECTED\nversion:1.2\nserver:a\\b\n\n\0").unwrap();
        assert_eq!(frames[0].command, Command::Connected);
        assert_eq!(frames[0].header("server"), Some("a\\b"));
    }

    #[test]
    fn decode_unescapes_headers() {
        let frames = decode_frames("ERROR\nmessage:bad\\cthing\n\n\0").unwrap();
        assert_eq!(frames[0].header("message"), Some("bad:thing"));
    }

    #[test]
    fn decode_bad_escape() {
        let err = decode_frames("ERROR\nmessage:bad\\t\n\n\0").unwrap_err();
        assert_eq!(err, StompError::BadEscape('t'));
    }

    #[test]
    fn heartbeats_yield_nothing() {
        assert!(decode_frames("\n").unwrap().is_empty());
        assert!(decode_frames("\r\n\n").unwrap().is_empty());
    }

    #[test]
    fn several_frames_in_one_message() {
        let text = "RECEIPT\nreceipt-id:r1\n\n\0\nMESSAGE\ndestination:/topic/monitor\n\n{}\0";
        let frames = decode_frames(text).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command, Command::Receipt);
        assert_eq!(frames[1].header("destination"), Some("/topic/monitor"));
    }

    #[test]
    fn content_length_allows_nul_in_body() {
        let text = "MESSAGE\ncontent-length:3\n\na\0b\0";
        let frames = decode_frames(text).unwrap();
        assert_eq!(frames[0].body, "a\0b");
    }

    #[test]
    fn crlf_line_endings() {
        let frames = decode_frames("CONNECTED\r\nversion:1.2\r\n\r\n\0").unwrap();
        assert_eq!(frames[0].header("version"), Some("1.2"));
    }

    #[test]
    fn repeated_header_first_wins() {
        let frames = decode_frames("MESSAGE\nfoo:1\nfoo:2\n\n\0").unwrap();
        assert_eq!(frames[0].header("foo"), Some("1"));
    }

    #[test]
    fn malformed_frames() {
        assert!(matches!(
            decode_frames("BOGUS\n\n\0"),
            Err(StompError::UnknownCommand(_))
        ));
        assert!(matches!(
            decode_frames("MESSAGE\nno-nul\n\nbody"),
            Err(StompError::Malformed(_))
        ));
        assert!(matches!(
            decode_frames("MESSAGE\nnocolon\n\n\0"),
            Err(StompError::Malformed(_))
        ));
    }
}
