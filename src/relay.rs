use crate::completion::CompletionResult;
use crate::config::ReplyConfig;

/// The trimmed inbound message text, or the default prompt when it is blank or absent.
pub fn extract_prompt(body: Option<&str>, default_prompt: &str) -> String {
    match body.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => default_prompt.to_string(),
    }
}

/// Joins the completion text (or the fallback on failure) with the disclaimer. Unescaped.
pub fn compose_reply(result: &CompletionResult, reply: &ReplyConfig) -> String {
    let text = match result {
        Ok(text) => text.as_str(),
        Err(_) => reply.fallback.as_str(),
    };
    format!("{text}\n\n{}", reply.disclaimer)
}

/// Wraps the message in a TwiML response, escaping it in a single pass.
pub fn render_twiml(message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Message>{}</Message></Response>"#,
        escape_markup(message)
    )
}

pub fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
