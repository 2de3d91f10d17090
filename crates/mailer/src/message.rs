use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};

use crate::{MailError, MailResult};

const LINE_WIDTH: usize = 76;

/// An address with an optional display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    name: Option<String>,
    address: String,
}

impl Mailbox {
    pub fn new(name: Option<String>, address: impl Into<String>) -> MailResult<Self> {
        let address = address.into().trim().to_string();
        if !is_plausible_address(&address) {
            return Err(MailError::InvalidAddress(address));
        }
        let name = name
            .map(|n| n.replace(['"', '\r', '\n'], ""))
            .filter(|n| !n.trim().is_empty());
        Ok(Self { name, address })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn to_header(&self) -> String {
        match &self.name {
            Some(name) if name.is_ascii() => format!("\"{name}\" <{}>", self.address),
            Some(name) => format!("{} <{}>", encode_word(name), self.address),
            None => format!("<{}>", self.address),
        }
    }
}

fn is_plausible_address(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !address.chars().any(|c| c.is_whitespace() || c == '<' || c == '>')
}

/// A binary attachment, carried base64-encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A composed email message
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub message_id: String,
    pub from: Mailbox,
    pub to: Vec<Mailbox>,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl MailMessage {
    pub fn new(from: Mailbox, subject: impl Into<String>) -> Self {
        let domain = from
            .address()
            .split_once('@')
            .map(|(_, d)| d.to_string())
            .unwrap_or_else(|| "localhost".into());
        Self {
            message_id: format!("{}@{}", cuid2::create_id(), domain),
            from,
            to: Vec::new(),
            subject: subject.into(),
            text: String::new(),
            html: None,
            attachments: Vec::new(),
        }
    }

    pub fn to(mut self, mailbox: Mailbox) -> Self {
        self.to.push(mailbox);
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.text = body.into();
        self
    }

    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.html = Some(body.into());
        self
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn validate(&self) -> MailResult<()> {
        if self.to.is_empty() {
            return Err(MailError::NoRecipients);
        }
        if self.text.trim().is_empty() && self.html.is_none() {
            return Err(MailError::EmptyBody);
        }
        Ok(())
    }

    /// Render the message as an RFC 5322 document with CRLF line endings.
    pub fn to_mime(&self, date: DateTime<Utc>) -> String {
        let boundary = format!("feza-alt-{}", cuid2::create_id());
        let recipients: Vec<String> = self.to.iter().map(Mailbox::to_header).collect();

        let mut out = String::new();
        push_line(&mut out, &format!("From: {}", self.from.to_header()));
        push_line(&mut out, &format!("To: {}", recipients.join(", ")));
        push_line(&mut out, &format!("Subject: {}", encode_header(&self.subject)));
        push_line(&mut out, &format!("Date: {}", date.to_rfc2822()));
        push_line(&mut out, &format!("Message-ID: <{}>", self.message_id));
        push_line(&mut out, "MIME-Version: 1.0");

        if self.attachments.is_empty() {
            push_line(
                &mut out,
                &format!("Content-Type: multipart/alternative; boundary=\"{boundary}\""),
            );
            push_line(&mut out, "");
            self.push_alternatives(&mut out, &boundary);
        } else {
            let mixed = format!("feza-mixed-{}", cuid2::create_id());
            push_line(
                &mut out,
                &format!("Content-Type: multipart/mixed; boundary=\"{mixed}\""),
            );
            push_line(&mut out, "");
            push_line(&mut out, &format!("--{mixed}"));
            push_line(
                &mut out,
                &format!("Content-Type: multipart/alternative; boundary=\"{boundary}\""),
            );
            push_line(&mut out, "");
            self.push_alternatives(&mut out, &boundary);

            for attachment in &self.attachments {
                push_line(&mut out, &format!("--{mixed}"));
                push_line(
                    &mut out,
                    &format!(
                        "Content-Type: {}; name=\"{}\"",
                        attachment.content_type, attachment.file_name
                    ),
                );
                push_line(&mut out, "Content-Transfer-Encoding: base64");
                push_line(
                    &mut out,
                    &format!(
                        "Content-Disposition: attachment; filename=\"{}\"",
                        attachment.file_name
                    ),
                );
                push_line(&mut out, "");
                push_base64(&mut out, &attachment.data);
            }
            push_line(&mut out, &format!("--{mixed}--"));
        }

        out
    }

    fn push_alternatives(&self, out: &mut String, boundary: &str) {
        push_line(out, &format!("--{boundary}"));
        push_line(out, "Content-Type: text/plain; charset=utf-8");
        push_line(out, "Content-Transfer-Encoding: base64");
        push_line(out, "");
        push_base64(out, self.text.as_bytes());

        if let Some(html) = &self.html {
            push_line(out, &format!("--{boundary}"));
            push_line(out, "Content-Type: text/html; charset=utf-8");
            push_line(out, "Content-Transfer-Encoding: base64");
            push_line(out, "");
            push_base64(out, html.as_bytes());
        }
        push_line(out, &format!("--{boundary}--"));
    }
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str("\r\n");
}

fn push_base64(out: &mut String, data: &[u8]) {
    let encoded = STANDARD.encode(data);
    for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is pure ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
}

fn encode_header(value: &str) -> String {
    let flat = value.replace(['\r', '\n'], " ");
    if flat.is_ascii() {
        flat
    } else {
        encode_word(&flat)
    }
}

fn encode_word(value: &str) -> String {
    format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> Mailbox {
        Mailbox::new(Some("Feza Logistics".into()), "no-reply@fezalogistics.com").unwrap()
    }

    fn decode_parts(mime: &str) -> Vec<String> {
        mime.split("\r\n\r\n")
            .skip(1)
            .filter_map(|block| {
                let body: String = block
                    .lines()
                    .take_while(|line| !line.starts_with("--"))
                    .collect();
                STANDARD.decode(body).ok()
            })
            .filter_map(|bytes| String::from_utf8(bytes).ok())
            .collect()
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(Mailbox::new(None, "plainaddress").is_err());
        assert!(Mailbox::new(None, "a@localhost").is_err());
        assert!(Mailbox::new(None, "a b@example.com").is_err());
        assert!(Mailbox::new(None, " ok@example.com ").is_ok());
    }

    #[test]
    fn validate_requires_recipient_and_body() {
        let message = MailMessage::new(sender(), "Hello");
        assert!(matches!(message.validate(), Err(MailError::NoRecipients)));

        let message = message.to(Mailbox::new(None, "client@example.com").unwrap());
        assert!(matches!(message.validate(), Err(MailError::EmptyBody)));
        assert!(message.text("hi").validate().is_ok());
    }

    #[test]
    fn renders_alternative_parts() {
        let message = MailMessage::new(sender(), "Invoice INV-2026-0001")
            .to(Mailbox::new(Some("Client".into()), "client@example.com").unwrap())
            .text("Amount due: 118.00")
            .html("<p>Amount due: <b>118.00</b></p>");

        let mime = message.to_mime(Utc::now());
        assert!(mime.contains("Subject: Invoice INV-2026-0001\r\n"));
        assert!(mime.contains("To: \"Client\" <client@example.com>\r\n"));
        assert!(mime.contains("multipart/alternative"));
        assert!(mime.contains(&format!("Message-ID: <{}>", message.message_id)));

        let parts = decode_parts(&mime);
        assert!(parts.iter().any(|p| p == "Amount due: 118.00"));
        assert!(parts.iter().any(|p| p.contains("<b>118.00</b>")));
    }

    #[test]
    fn non_ascii_subject_is_encoded() {
        let mime = MailMessage::new(sender(), "Reçu RCT-2026-0001")
            .to(Mailbox::new(None, "client@example.com").unwrap())
            .text("merci")
            .to_mime(Utc::now());
        assert!(mime.contains("Subject: =?UTF-8?B?"));
    }

    #[test]
    fn attachments_switch_to_mixed() {
        let mime = MailMessage::new(sender(), "Statement")
            .to(Mailbox::new(None, "client@example.com").unwrap())
            .text("see attached")
            .attach(Attachment {
                file_name: "statement.csv".into(),
                content_type: "text/csv".into(),
                data: b"number,total\nINV-2026-0001,118.00\n".to_vec(),
            })
            .to_mime(Utc::now());

        assert!(mime.contains("multipart/mixed"));
        assert!(mime.contains("Content-Disposition: attachment; filename=\"statement.csv\""));
        assert!(decode_parts(&mime)
            .iter()
            .any(|p| p.contains("INV-2026-0001,118.00")));
    }
}
