use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, PartType};
use otpdesk_core::{AppError, AppResult};
use otpdesk_domain::MailMessage;

/// Decodes a raw RFC 5322 message into the fields the extractor reads.
pub fn parse_message(raw: &[u8]) -> AppResult<MailMessage> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| AppError::MailParse("fetched message could not be decoded".to_owned()))?;

    let sender = message
        .from()
        .and_then(|from| from.first())
        .and_then(|address| address.address())
        .map(str::to_owned);

    let date = message
        .date()
        .and_then(|date| DateTime::<Utc>::from_timestamp(date.to_timestamp(), 0));

    let text_body = message.text_bodies().find_map(|part| match &part.body {
        PartType::Text(text) => Some(text.to_string()),
        _ => None,
    });

    let html_body = message.html_bodies().find_map(|part| match &part.body {
        PartType::Html(html) => Some(html.to_string()),
        _ => None,
    });

    Ok(MailMessage {
        sender,
        subject: message.subject().map(str::to_owned),
        date,
        text_body,
        html_body,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::parse_message;

    const ALTERNATIVE: &str = "From: \"Provider\" <no-reply@provider.com>\r\n\
To: codes@desk.example\r\n\
Subject: =?UTF-8?Q?Seu_c=C3=B3digo?=\r\n\
Date: Mon, 19 Oct 2026 09:15:00 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Your code is 482 913\r\n\
--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Your code is <b>482 913</b></p>\r\n\
--b1--\r\n";

    const HTML_ONLY: &str = "From: alerts@provider.com\r\n\
Subject: Login\r\n\
MIME-Version: 1.0\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<div>Login: <span>YPDG</span></div>\r\n";

    #[test]
    fn multipart_message_keeps_both_bodies() {
        let message =
            parse_message(ALTERNATIVE.as_bytes()).unwrap_or_else(|error| panic!("{error}"));

        assert_eq!(message.sender.as_deref(), Some("no-reply@provider.com"));
        assert_eq!(message.subject.as_deref(), Some("Seu código"));
        assert_eq!(
            message.date,
            Utc.with_ymd_and_hms(2026, 10, 19, 9, 15, 0).single()
        );
        assert!(
            message
                .text_body
                .as_deref()
                .is_some_and(|body| body.contains("482 913"))
        );
        assert!(
            message
                .html_body
                .as_deref()
                .is_some_and(|body| body.contains("<b>482 913</b>"))
        );
    }

    #[test]
    fn html_only_message_has_no_text_body() {
        let message = parse_message(HTML_ONLY.as_bytes()).unwrap_or_else(|error| panic!("{error}"));

        assert_eq!(message.sender.as_deref(), Some("alerts@provider.com"));
        assert_eq!(message.date, None);
        assert_eq!(message.text_body, None);
        assert!(
            message
                .html_body
                .as_deref()
                .is_some_and(|body| body.contains("YPDG"))
        );
    }
}
