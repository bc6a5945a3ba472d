//! End-to-end composition tests.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use mimemailer_mime::encoding::{decode_quoted_printable, normalize_crlf};
use mimemailer_mime::{Composer, Email, Error, Result, SenderIdentity, compose};
use proptest::prelude::*;

const HTML: &str = r"<!doctype html>
<html xmlns=http://www.w3.org/1999/xhtml style=background:#f3f3f3>
<body>
<p>Hello 🌍. This email wíll be formatted as a MIME message as per RFC 2045 and RFC 2046 📧</p>
</body>
</html>";

const TEXT: &str =
    "Hello 🌍. This email wíll be formatted as a MIME message as per RFC 2045 and RFC 2046 📧";

const EXPECTED: &str = r#"Subject: Test Email
From: "Sender Name" <sender@example.com>
To: "Test Recipient" <test@example.com>
Date: Tue, 10 Nov 2009 23:00:00 +0000
MIME-Version: 1.0
Content-Type: multipart/alternative; boundary=boundary42

--boundary42
Content-Type: text/plain; charset=utf-8
Content-Transfer-Encoding: quoted-printable

Hello =F0=9F=8C=8D. This email w=C3=ADll be formatted as a MIME message as =
per RFC 2045 and RFC 2046 =F0=9F=93=A7

--boundary42
Content-Type: text/html; charset=utf-8
Content-Transfer-Encoding: quoted-printable

<!doctype html>
<html xmlns=3Dhttp://www.w3.org/1999/xhtml style=3Dbackground:#f3f3f3>
<body>
<p>Hello =F0=9F=8C=8D. This email w=C3=ADll be formatted as a MIME message =
as per RFC 2045 and RFC 2046 =F0=9F=93=A7</p>
</body>
</html>

--boundary42--
"#;

fn test_email() -> Email {
    Email::new("test@example.com", "Test Recipient", "Test Email", HTML)
        .date(&Utc.with_ymd_and_hms(2009, 11, 10, 23, 0, 0).unwrap())
}

fn sender() -> SenderIdentity {
    SenderIdentity::new("Sender Name", "sender@example.com")
}

fn fixed_text(_: &str) -> Result<String> {
    Ok(TEXT.to_string())
}

/// Returns the decoded body of the part with the given content type.
fn part_body(message: &str, content_type: &str) -> String {
    let part = message
        .split("--boundary42\r\n")
        .find(|part| part.starts_with(&format!("Content-Type: {content_type};")))
        .unwrap();
    let (_, body) = part.split_once("\r\n\r\n").unwrap();
    let body = body.trim_end_matches("--boundary42--\r\n");
    decode_quoted_printable(body.trim_end_matches("\r\n")).unwrap()
}

fn has_bare_line_endings(data: &[u8]) -> bool {
    data.iter().enumerate().any(|(i, &b)| match b {
        b'\r' => data.get(i + 1) != Some(&b'\n'),
        b'\n' => i == 0 || data[i - 1] != b'\r',
        _ => false,
    })
}

#[test]
fn test_compose_golden() {
    let message = Composer::with_reducer(fixed_text)
        .compose(&test_email(), &sender())
        .unwrap();

    let expected = normalize_crlf(EXPECTED.as_bytes());
    assert_eq!(
        String::from_utf8_lossy(message.as_bytes()),
        String::from_utf8_lossy(&expected)
    );
    assert_eq!(message.as_bytes(), expected.as_slice());
}

#[test]
fn test_compose_golden_default_reducer() {
    let message = compose(&test_email(), &sender()).unwrap();

    let expected = normalize_crlf(EXPECTED.as_bytes());
    assert_eq!(
        String::from_utf8_lossy(message.as_bytes()),
        String::from_utf8_lossy(&expected)
    );
    assert_eq!(message.as_bytes(), expected.as_slice());
}

#[test]
fn test_compose_keeps_crlf_after_trailing_space() {
    let html = "<p>line one \r\nline two</p>";
    let email = Email::new("test@example.com", "Test Recipient", "Test Email", html);
    let message = compose(&email, &sender()).unwrap();
    let text = String::from_utf8(message.into_bytes()).unwrap();

    assert!(text.contains("<p>line one=20\r\nline two</p>"));
    assert!(!text.contains("=20\r\n\r\nline two"));
    assert_eq!(part_body(&text, "text/html"), html);
}

#[test]
fn test_compose_with_html2text() {
    let message = compose(&test_email(), &sender()).unwrap();
    let text = String::from_utf8(message.into_bytes()).unwrap();

    let plain = part_body(&text, "text/plain");
    assert!(plain.contains(TEXT));
    assert!(!plain.contains('<'));

    let html = part_body(&text, "text/html");
    assert_eq!(html, HTML.replace('\n', "\r\n"));
}

#[test]
fn test_list_unsubscribe_after_date() {
    let email = test_email().list_unsubscribe("<mailto:unsubscribe@example.com?subject=unsubscribe-request>");
    let message = Composer::with_reducer(fixed_text)
        .compose(&email, &sender())
        .unwrap();
    let text = String::from_utf8(message.into_bytes()).unwrap();

    assert!(text.contains(
        "Date: Tue, 10 Nov 2009 23:00:00 +0000\r\n\
List-Unsubscribe: <mailto:unsubscribe@example.com?subject=unsubscribe-request>\r\n\
MIME-Version: 1.0\r\n"
    ));
}

#[test]
fn test_list_unsubscribe_omitted() {
    let message = Composer::with_reducer(fixed_text)
        .compose(&test_email(), &sender())
        .unwrap();
    let text = String::from_utf8(message.into_bytes()).unwrap();
    assert!(!text.contains("List-Unsubscribe:"));
}

#[test]
fn test_reduction_failure_is_returned_unchanged() {
    let failing = |_: &str| -> Result<String> { Err(Error::Reduction("bad markup".into())) };
    let err = Composer::with_reducer(failing)
        .compose(&test_email(), &sender())
        .unwrap_err();
    assert_eq!(err.to_string(), "HTML to text conversion failed: bad markup");
}

proptest! {
    #[test]
    fn composed_messages_use_crlf_only(
        html in "[a-z<>/ \r\n=\t]{0,200}",
        subject in "[ -~]{0,40}",
    ) {
        let email = Email::new("to@example.com", "To", subject, html);
        let identity = |html: &str| -> Result<String> { Ok(html.to_string()) };
        let message = Composer::with_reducer(identity).compose(&email, &sender()).unwrap();
        prop_assert!(!has_bare_line_endings(message.as_bytes()));
    }
}
