//! Verification-code delivery boundary. The recipient check, escaping and
//! body rendering mirror what a real transport needs; the default
//! transport writes the rendered mail to the log, and swapping in SMTP is
//! a deployment concern.

use tracing::info;

type DynErr = Box<dyn std::error::Error + Send + Sync>;

pub fn deliver_verification(username: &str, email: &str, code: &str) -> Result<(), DynErr> {
    if !is_valid_email(email) {
        return Err(format!("Refusing to mail invalid address: {email}").into());
    }

    let body = render_verification(username, code);
    info!(recipient = %email, "Queued verification email:\n{body}");
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !local.contains(char::is_whitespace)
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains(char::is_whitespace)
        }
        _ => false,
    }
}

fn render_verification(username: &str, code: &str) -> String {
    let username = escape_html(username.trim());
    let code = escape_html(code.trim());

    format!(
        "<div style=\"font-family: Roboto, Verdana, sans-serif; line-height: 1.6;\">\
         <h2>Hello {username},</h2>\
         <p>Thank you for registering. Please use the following verification code \
         to complete your registration:</p>\
         <div style=\"font-size: 24px; font-weight: bold; margin: 20px 0;\">{code}</div>\
         <p>If you did not request this code, please ignore this email.</p>\
         </div>"
    )
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
