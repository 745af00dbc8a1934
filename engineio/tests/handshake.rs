use engineio::config::EngineIoConfig;
use engineio::session::EngineIoSession;

fn framed_open(json: &str) -> Vec<u8> {
    let mut body = vec![0x00u8];
    let text_len = json.len() + 1; // +1 for the leading '0' type digit
    for digit in text_len.to_string().bytes() {
        body.push(digit - b'0');
    }
    body.push(0xFF);
    body.push(b'0');
    body.extend_from_slice(json.as_bytes());
    body
}

#[test]
fn parses_handshake_body_into_session() {
    let json = r#"{"sid":"S","pingInterval":25000,"pingTimeout":60000,"upgrades":["websocket"]}"#;
    let body = framed_open(json);
    let session = EngineIoSession::from_handshake_body(&body).unwrap();

    assert_eq!(session.id, "S");
    assert_eq!(session.ping_interval.as_millis(), 25000);
    assert_eq!(session.ping_timeout.as_millis(), 60000);
    assert!(session.supports_websocket_upgrade());
}

#[test]
fn rejects_a_body_with_more_than_one_packet() {
    let json = r#"{"sid":"S","pingInterval":1,"pingTimeout":1,"upgrades":[]}"#;
    let mut body = framed_open(json);
    body.extend(framed_open(json));
    assert!(EngineIoSession::from_handshake_body(&body).is_err());
}

#[test]
fn rejects_a_body_that_is_not_an_open_packet() {
    // type digit '4' (Message) instead of '0' (Open).
    let body = vec![0x00u8, 1, 0xFF, b'4'];
    assert!(EngineIoSession::from_handshake_body(&body).is_err());
}

#[test]
fn parse_host_defaults_port_by_scheme() {
    let (secure, host, port) = EngineIoConfig::parse_host("example.com", None).unwrap();
    assert!(!secure);
    assert_eq!(host, "example.com");
    assert_eq!(port, 80);

    let (secure, host, port) = EngineIoConfig::parse_host("https://example.com", None).unwrap();
    assert!(secure);
    assert_eq!(host, "example.com");
    assert_eq!(port, 443);

    let (_, _, port) = EngineIoConfig::parse_host("http://example.com", Some(8080)).unwrap();
    assert_eq!(port, 8080);
}

#[test]
fn base_url_assembles_scheme_host_port_and_resource() {
    let mut config = EngineIoConfig::default();
    config.host = "example.com".to_string();
    config.port = 80;
    config.secure = false;
    assert_eq!(config.base_url(), "http://example.com:80/socket.io/");
}
