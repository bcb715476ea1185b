//! IRC line parsing with IRCv3 message tags

use crate::types::ChatMessage;
use std::collections::HashMap;

/// A parsed IRC line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IrcMessage {
    pub tags: HashMap<String, String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Nick portion of a `nick!user@host` prefix
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split('!').next().unwrap_or(prefix))
    }

    /// Convert a PRIVMSG into a chat message. Other commands yield `None`.
    pub fn into_chat_message(self) -> Option<ChatMessage> {
        if self.command != "PRIVMSG" || self.params.len() < 2 {
            return None;
        }

        let author_name = self
            .tag("display-name")
            .filter(|name| !name.is_empty())
            .or_else(|| self.nick())
            .unwrap_or_default()
            .to_string();

        Some(ChatMessage {
            channel: self.params[0].trim_start_matches('#').to_string(),
            room_id: self.tag("room-id").unwrap_or_default().to_string(),
            author_id: self.tag("user-id").unwrap_or_default().to_string(),
            author_name,
            text: self.params[1].clone(),
        })
    }
}

fn unescape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Parse one line, without its trailing CRLF. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<IrcMessage> {
    let mut rest = line.trim_end_matches(['\r', '\n']);
    let mut message = IrcMessage::default();

    if let Some(tagged) = rest.strip_prefix('@') {
        let (tags, remainder) = tagged.split_once(' ')?;
        for tag in tags.split(';').filter(|t| !t.is_empty()) {
            let (key, value) = tag.split_once('=').unwrap_or((tag, ""));
            message
                .tags
                .insert(key.to_string(), unescape_tag_value(value));
        }
        rest = remainder.trim_start();
    }

    if let Some(prefixed) = rest.strip_prefix(':') {
        let (prefix, remainder) = prefixed.split_once(' ')?;
        message.prefix = Some(prefix.to_string());
        rest = remainder.trim_start();
    }

    let (head, trailing) = match rest.split_once(" :") {
        Some((head, trailing)) => (head, Some(trailing)),
        None => (rest, None),
    };

    let mut words = head.split(' ').filter(|w| !w.is_empty());
    message.command = words.next()?.to_ascii_uppercase();
    message.params = words.map(str::to_string).collect();
    if let Some(trailing) = trailing {
        message.params.push(trailing.to_string());
    }

    Some(message)
}

/// Strip line breaks so a reply cannot inject extra IRC commands
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect()
}
