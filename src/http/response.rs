//! Fixed response texts

use super::{DigestChallenge, SERVER_NAME};

/// Header block sent before a single JPEG
pub const SNAPSHOT_HEADER: &str = "HTTP/1.0 200 OK\r\n\
    Server: UVC Streamer\r\n\
    Access-Control-Allow-Origin: *\r\n\
    Content-type: image/jpeg\r\n\
    \r\n";

/// Header block opening a multipart stream
pub const STREAM_HEADER: &str = "HTTP/1.0 200 OK\r\n\
    Server: UVC Streamer\r\n\
    Content-Type: multipart/x-mixed-replace;boundary=arflebarfle\r\n\
    Cache-Control: no-cache\r\n\
    Cache-Control: private\r\n\
    Pragma: no-cache\r\n\
    Access-Control-Allow-Origin: *\r\n\
    \r\n";

/// Boundary and part header written before every streamed frame
pub const STREAM_PART_HEADER: &str = "--arflebarfle\nContent-type: image/jpeg\n\n";

/// 401 with the Digest challenge
pub fn auth_challenge(challenge: &DigestChallenge) -> String {
    format!(
        "HTTP/1.1 401 Unauthorized\r\n\
         Access-Control-Allow-Origin: *\r\n\
         WWW-Authenticate: {}\r\n\
         \r\n",
        challenge.header_value()
    )
}

pub fn bad_request() -> String {
    error_page(
        "HTTP/1.0 400 Bad Request",
        "Bad Request",
        "This server did not understand your request.",
    )
}

/// 401 sent when the client's digest does not match
pub fn unauthorized() -> String {
    error_page(
        "HTTP/1.0 401 Unauthorized",
        "Unauthorized",
        "Invalid credentials.",
    )
}

pub fn not_found(uri: &str) -> String {
    error_page(
        "HTTP/1.1 404 Not Found",
        "Not Found",
        &format!(
            "The requested URL {} was not found on this server.",
            escape_html(uri)
        ),
    )
}

fn error_page(status_line: &str, title: &str, message: &str) -> String {
    format!(
        "{status_line}\r\n\
         Content-type: text/html\r\n\
         Server: {SERVER_NAME}\r\n\
         \r\n\
         <html>\n \
         <body>\n  \
         <h1>{title}</h1>\n  \
         <p>{message}</p>\n \
         </body>\n\
         </html>\n"
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
