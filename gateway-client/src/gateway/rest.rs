use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    Client as ReqwestClient, StatusCode,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::{
    models::{
        DiscoveredChannel, Discovery, GatewayErrorBody, GatewayResponse, SubmitIdentity,
        SubmitRequest,
    },
    ConnectOptions, Connection, ContractRef, Gateway, GatewayError,
};
use crate::{identity::Identity, profile::ConnectionProfile};

/// Talks to a ledger gateway that exposes submission over HTTP with JSON bodies.
#[derive(Clone, Default)]
pub struct RestGateway {
    http_client: Arc<ReqwestClient>,
}

impl RestGateway {
    pub fn new() -> RestGateway {
        RestGateway {
            http_client: Arc::new(ReqwestClient::new()),
        }
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_connect() {
        GatewayError::Unreachable(e.to_string())
    } else {
        GatewayError::Transport(e.to_string())
    }
}

#[async_trait]
impl Gateway for RestGateway {
    async fn connect(
        &self,
        profile: &ConnectionProfile,
        identity: &Identity,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Connection>, GatewayError> {
        let endpoint = match &options.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_owned(),
            None => profile
                .peer_endpoint(options.as_localhost)
                .map_err(|e| GatewayError::Profile(e.to_string()))?,
        };
        info!(
            "Connecting to {endpoint} as {} ({})",
            identity.label, identity.msp_id
        );

        let mut connection = RestConnection {
            http_client: self.http_client.clone(),
            endpoint,
            label: identity.label.clone(),
            msp_id: identity.msp_id.clone(),
            certificate: identity.certificate.clone(),
            channels: None,
            connected: true,
        };
        if options.discovery {
            connection.channels = Some(connection.discover().await?);
        }

        Ok(Box::new(connection))
    }
}

pub struct RestConnection {
    http_client: Arc<ReqwestClient>,
    endpoint: String,
    label: String,
    msp_id: String,
    certificate: String,
    channels: Option<Vec<DiscoveredChannel>>,
    connected: bool,
}

impl RestConnection {
    fn ensure_connected(&self) -> Result<(), GatewayError> {
        if self.connected {
            Ok(())
        } else {
            Err(GatewayError::Unreachable(format!(
                "connection to {} is closed",
                self.endpoint
            )))
        }
    }

    async fn discover(&self) -> Result<Vec<DiscoveredChannel>, GatewayError> {
        let full_url = format!("{}/api/discovery", self.endpoint);
        debug!("get_request: {full_url:?}");

        let start = Instant::now();
        let response = self
            .http_client
            .get(full_url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;
        debug!(
            "found response for request {full_url} (duration {} ms)",
            start.elapsed().as_millis()
        );

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if status != StatusCode::OK {
            warn!("discovery response.status(): {status:?}");
            return Err(GatewayError::Unreachable(format!(
                "discovery failed with status {status}"
            )));
        }
        let discovery: Discovery = parse_body(&body)?;
        Ok(discovery.channels)
    }
}

#[async_trait]
impl Connection for RestConnection {
    async fn resolve(&self, channel: &str, contract: &str) -> Result<ContractRef, GatewayError> {
        self.ensure_connected()?;

        if let Some(channels) = &self.channels {
            let found = channels
                .iter()
                .find(|c| c.name == channel)
                .ok_or_else(|| GatewayError::ChannelNotFound(channel.to_owned()))?;
            if !found.contracts.iter().any(|c| c == contract) {
                return Err(GatewayError::ContractNotFound {
                    channel: channel.to_owned(),
                    contract: contract.to_owned(),
                });
            }
        }

        Ok(ContractRef {
            channel: channel.to_owned(),
            contract: contract.to_owned(),
        })
    }

    async fn submit(
        &self,
        contract: &ContractRef,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, GatewayError> {
        self.ensure_connected()?;

        let full_url = format!(
            "{}/api/channels/{}/contracts/{}/transactions",
            self.endpoint, contract.channel, contract.contract
        );
        let request = SubmitRequest {
            function,
            args,
            identity: SubmitIdentity {
                label: &self.label,
                msp_id: &self.msp_id,
                certificate: &self.certificate,
            },
        };
        info!("post_request: {full_url:?}, function: {function}, args: {args:?}");

        let start = Instant::now();
        let response = self
            .http_client
            .post(full_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        info!(
            "found response for request {full_url} (duration {} ms)",
            start.elapsed().as_millis()
        );

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        parse_submit_response(status, &body, contract)
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            self.channels = None;
            info!("Disconnected from {}", self.endpoint);
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, GatewayError> {
    serde_json::from_str(body).map_err(|e| {
        warn!("error to deserialize gateway response: {e:?}");
        GatewayError::Protocol(format!("{e}: {body}"))
    })
}

fn parse_submit_response(
    status: StatusCode,
    body: &str,
    contract: &ContractRef,
) -> Result<Vec<u8>, GatewayError> {
    match status {
        StatusCode::OK => {
            let response: GatewayResponse = parse_body(body)?;
            if response.result != "success" {
                warn!("GatewayResponse.result != success");
                return Err(GatewayError::Protocol(format!(
                    "result is {:?}",
                    response.result
                )));
            }
            Ok(match response.payload {
                serde_json::Value::Null => Vec::new(),
                serde_json::Value::String(payload) => payload.into_bytes(),
                other => other.to_string().into_bytes(),
            })
        }
        StatusCode::NOT_FOUND => Err(GatewayError::ContractNotFound {
            channel: contract.channel.clone(),
            contract: contract.contract.clone(),
        }),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::INTERNAL_SERVER_ERROR => {
            warn!("gateway response.status() is {status:?}");
            let error: GatewayErrorBody = parse_body(body)?;
            Err(match error.kind.as_deref() {
                Some("validation") => GatewayError::Validation(error.error),
                _ => GatewayError::Endorsement(error.error),
            })
        }
        other => {
            warn!("unknown gateway response.status(): {other:?}");
            Err(GatewayError::Protocol(format!("status {other}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    };

    use super::*;
    use crate::profile::tests::profile_json;

    fn auction() -> ContractRef {
        ContractRef {
            channel: "mychannel".into(),
            contract: "auction".into(),
        }
    }

    #[test]
    fn success_with_string_payload() {
        let body = r#"{"result":"success","payload":"seller s1 provides 2 VM0 to buyer b1"}"#;
        let payload = parse_submit_response(StatusCode::OK, body, &auction()).unwrap();
        assert_eq!(payload, b"seller s1 provides 2 VM0 to buyer b1");
    }

    #[test]
    fn success_with_json_payload() {
        let body = r#"{"result":"success","payload":["a","b"]}"#;
        let payload = parse_submit_response(StatusCode::OK, body, &auction()).unwrap();
        assert_eq!(payload, br#"["a","b"]"#);
    }

    #[test]
    fn success_without_payload() {
        let payload =
            parse_submit_response(StatusCode::OK, r#"{"result":"success"}"#, &auction()).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn ok_status_with_failed_result() {
        let err = parse_submit_response(StatusCode::OK, r#"{"result":"error"}"#, &auction())
            .unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(_)));
    }

    #[test]
    fn error_kinds() {
        let endorsement = r#"{"result":"error","kind":"endorsement","error":"no auction1 auction"}"#;
        assert_eq!(
            parse_submit_response(StatusCode::INTERNAL_SERVER_ERROR, endorsement, &auction()),
            Err(GatewayError::Endorsement("no auction1 auction".into()))
        );

        let validation = r#"{"result":"error","kind":"validation","error":"MVCC_READ_CONFLICT"}"#;
        assert_eq!(
            parse_submit_response(StatusCode::CONFLICT, validation, &auction()),
            Err(GatewayError::Validation("MVCC_READ_CONFLICT".into()))
        );
    }

    #[test]
    fn not_found_is_resolution_failure() {
        assert!(matches!(
            parse_submit_response(StatusCode::NOT_FOUND, "", &auction()),
            Err(GatewayError::ContractNotFound { .. })
        ));
    }

    #[test]
    fn garbage_body_is_protocol_error() {
        assert!(matches!(
            parse_submit_response(StatusCode::BAD_REQUEST, "<html>", &auction()),
            Err(GatewayError::Protocol(_))
        ));
        assert!(matches!(
            parse_submit_response(StatusCode::BAD_GATEWAY, "", &auction()),
            Err(GatewayError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn resolve_checks_discovered_contracts() {
        let mut connection = RestConnection {
            http_client: Arc::new(ReqwestClient::new()),
            endpoint: "http://localhost:7051".into(),
            label: "alice".into(),
            msp_id: "Org1MSP".into(),
            certificate: String::new(),
            channels: Some(vec![DiscoveredChannel {
                name: "mychannel".into(),
                contracts: vec!["auction".into()],
            }]),
            connected: true,
        };

        assert_eq!(
            connection.resolve("mychannel", "auction").await.unwrap(),
            auction()
        );
        assert_eq!(
            connection.resolve("otherchannel", "auction").await,
            Err(GatewayError::ChannelNotFound("otherchannel".into()))
        );
        assert!(matches!(
            connection.resolve("mychannel", "basic").await,
            Err(GatewayError::ContractNotFound { .. })
        ));

        connection.disconnect();
        assert!(matches!(
            connection.resolve("mychannel", "auction").await,
            Err(GatewayError::Unreachable(_))
        ));
    }

    struct ReceivedRequest {
        method: String,
        path: String,
        body: String,
    }

    async fn read_request(socket: &mut TcpStream) -> ReceivedRequest {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before end of headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8(buf[..header_end].to_vec()).unwrap();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .map(|(_, value)| value.trim().parse::<usize>().unwrap())
            .unwrap_or(0);
        while buf.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before end of body");
            buf.extend_from_slice(&chunk[..n]);
        }

        let mut request_line = head.lines().next().unwrap().split_whitespace();
        ReceivedRequest {
            method: request_line.next().unwrap().to_owned(),
            path: request_line.next().unwrap().to_owned(),
            body: String::from_utf8(buf[header_end..header_end + content_length].to_vec())
                .unwrap(),
        }
    }

    /// Answers one connection per canned `(status, body)` pair, in order.
    async fn serve(
        responses: Vec<(u16, &'static str)>,
    ) -> (String, JoinHandle<Vec<ReceivedRequest>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut received = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                received.push(read_request(&mut socket).await);
                let response = format!(
                    "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
            received
        });

        (format!("127.0.0.1:{}", addr.port()), handle)
    }

    fn org1_profile(peer_url: &str) -> ConnectionProfile {
        ConnectionProfile::from_json(profile_json("Org1", peer_url).as_bytes()).unwrap()
    }

    fn alice() -> Identity {
        Identity::new(
            "alice",
            "wallet/org1",
            "Org1MSP",
            "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n",
            "key",
        )
    }

    #[tokio::test]
    async fn discovers_and_submits_over_http() {
        let (addr, server) = serve(vec![
            (200, r#"{"channels":[{"name":"mychannel","contracts":["auction"]}]}"#),
            (200, r#"{"result":"success","payload":"OK"}"#),
        ])
        .await;
        let options = ConnectOptions {
            discovery: true,
            as_localhost: true,
            endpoint: Some(format!("http://{addr}/")),
        };

        let mut connection = RestGateway::new()
            .connect(&org1_profile("grpcs://localhost:7051"), &alice(), &options)
            .await
            .unwrap();
        let contract = connection.resolve("mychannel", "auction").await.unwrap();
        let args = vec!["auction42".to_owned(), "alice".to_owned()];
        let payload = connection.submit(&contract, "Withdraw", &args).await.unwrap();
        connection.disconnect();

        assert_eq!(payload, b"OK");

        let received = server.await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].method, "GET");
        assert_eq!(received[0].path, "/api/discovery");
        assert_eq!(received[1].method, "POST");
        assert_eq!(
            received[1].path,
            "/api/channels/mychannel/contracts/auction/transactions"
        );

        let body: Value = serde_json::from_str(&received[1].body).unwrap();
        assert_eq!(body["function"], "Withdraw");
        assert_eq!(body["args"], serde_json::json!(["auction42", "alice"]));
        assert_eq!(body["identity"]["label"], "alice");
        assert_eq!(body["identity"]["mspId"], "Org1MSP");
        assert_eq!(body["identity"]["certificate"], alice().certificate);
        assert!(body["identity"].get("privateKey").is_none());
    }

    #[tokio::test]
    async fn failed_discovery_is_unreachable() {
        let (addr, server) = serve(vec![(503, r#"{"error":"starting"}"#)]).await;
        let options = ConnectOptions {
            discovery: true,
            as_localhost: false,
            endpoint: Some(format!("http://{addr}")),
        };

        let result = RestGateway::new()
            .connect(&org1_profile("grpcs://localhost:7051"), &alice(), &options)
            .await;

        assert!(matches!(result, Err(GatewayError::Unreachable(_))));
        assert_eq!(server.await.unwrap()[0].path, "/api/discovery");
    }

    #[tokio::test]
    async fn submits_to_profile_peer_without_discovery() {
        let (addr, server) = serve(vec![(
            500,
            r#"{"result":"error","kind":"endorsement","error":"no auction42 auction"}"#,
        )])
        .await;
        let options = ConnectOptions {
            discovery: false,
            as_localhost: false,
            endpoint: None,
        };

        let connection = RestGateway::new()
            .connect(&org1_profile(&format!("grpc://{addr}")), &alice(), &options)
            .await
            .unwrap();
        let contract = connection.resolve("mychannel", "auction").await.unwrap();
        let result = connection
            .submit(&contract, "Withdraw", &["auction42".to_owned(), "alice".to_owned()])
            .await;

        assert_eq!(
            result,
            Err(GatewayError::Endorsement("no auction42 auction".into()))
        );
        let received = server.await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0].path,
            "/api/channels/mychannel/contracts/auction/transactions"
        );
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let options = ConnectOptions {
            discovery: true,
            as_localhost: false,
            endpoint: Some(format!("http://{addr}")),
        };
        let result = RestGateway::new()
            .connect(&org1_profile("grpcs://localhost:7051"), &alice(), &options)
            .await;

        assert!(matches!(result, Err(GatewayError::Unreachable(_))));
    }
}
