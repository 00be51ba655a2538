use crate::wire::endpoint::Endpoint;

/// Request line and headers for a segment upload, up to and including the
/// blank line separating headers from the body.
pub fn request_head(
    endpoint: &Endpoint,
    boundary: &str,
    content_length: u64,
    auth_token: Option<&str>,
) -> String {
    let mut head = String::new();
    head.push_str(&format!("POST {} HTTP/1.1\r\n", endpoint.path));
    head.push_str(&format!("Host: {}\r\n", endpoint.host_header()));
    head.push_str(&format!(
        "Content-Type: multipart/form-data; boundary={boundary}\r\n"
    ));
    head.push_str(&format!("Content-Length: {content_length}\r\n"));
    if let Some(token) = auth_token {
        head.push_str(&format!("Authorization: Bearer {token}\r\n"));
    }
    head.push_str("Connection: close\r\n\r\n");
    head
}
