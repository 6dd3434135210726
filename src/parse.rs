use serde_json::Value;

pub const NO_STRUCTURE: &str = "no expected structure";
pub const NO_MESSAGE: &str = "no message";

/// What the connector needs out of one inbound event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedMessage {
    pub sender: Option<String>,
    pub text: String,
    pub message_id: Option<String>,
    pub profile_name: Option<String>,
}

impl ParsedMessage {
    fn sentinel(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }
}

/// Extracts sender and text from the first entry/change/message of a Cloud API
/// webhook payload. Never fails: a missing `entry`, `changes` or `value` yields
/// [`NO_STRUCTURE`], an empty or absent `messages` list yields [`NO_MESSAGE`].
pub fn parse_event(payload: &Value) -> ParsedMessage {
    let Some(value) = payload
        .get("entry")
        .and_then(|e| e.get(0))
        .and_then(|e| e.get("changes"))
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("value"))
    else {
        return ParsedMessage::sentinel(NO_STRUCTURE);
    };

    let Some(message) = value
        .get("messages")
        .and_then(|m| m.as_array())
        .and_then(|m| m.first())
    else {
        return ParsedMessage::sentinel(NO_MESSAGE);
    };

    let sender = match message.get("from") {
        Some(Value::String(from)) => Some(from.trim().to_string()),
        Some(from) => from.as_u64().map(|n| n.to_string()),
        None => None,
    }
    .filter(|s| !s.is_empty());

    let profile_name = value
        .get("contacts")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("profile"))
        .and_then(|p| str_field(p, "name"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    ParsedMessage {
        sender,
        text: message_text(message).trim().to_string(),
        message_id: str_field(message, "id").map(String::from),
        profile_name,
    }
}

fn message_text(message: &Value) -> String {
    if let Some(body) = message.get("text").and_then(|t| str_field(t, "body")) {
        return body.to_string();
    }

    // Quick-reply buttons on template messages
    if let Some(text) = message.get("button").and_then(|b| str_field(b, "text")) {
        return text.to_string();
    }

    if let Some(interactive) = message.get("interactive") {
        let title = interactive
            .get("button_reply")
            .or_else(|| interactive.get("list_reply"))
            .and_then(|r| str_field(r, "title"));
        if let Some(title) = title {
            return title.to_string();
        }
    }

    let kind = str_field(message, "type");

    if let Some(kind @ ("image" | "video" | "document")) = kind {
        if let Some(caption) = message.get(kind).and_then(|m| str_field(m, "caption")) {
            return caption.to_string();
        }
    }

    format!("message type: {}", kind.unwrap_or("unknown"))
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str())
}
