//! Client IP extraction.
//!
//! Uses actix's connection info, which honors Forwarded/X-Forwarded-For when
//! the service sits behind a reverse proxy.

use actix_web::HttpRequest;
use actix_web::dev::ServiceRequest;

pub fn client_ip(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .map(strip_port)
        .unwrap_or_default()
}

pub fn client_ip_service(req: &ServiceRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .map(strip_port)
        .unwrap_or_default()
}

/// `realip_remote_addr` may yield `ip:port` for direct peers.
fn strip_port(addr: &str) -> String {
    if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
        return sock.ip().to_string();
    }
    addr.to_string()
}

#[cfg(test)]
mod tests {
    use super::strip_port;

    #[test]
    fn strips_port_from_socket_addr() {
        assert_eq!(strip_port("1.2.3.4:5678"), "1.2.3.4");
        assert_eq!(strip_port("1.2.3.4"), "1.2.3.4");
        assert_eq!(strip_port("[::1]:8080"), "::1");
    }
}
