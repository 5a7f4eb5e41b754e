pub(crate) mod decode;
pub mod devices;
pub mod directory;
pub mod models;
pub mod registry;
pub mod session;

use std::{path::PathBuf, sync::Arc};

use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{config::Config, credentials::AccountCredentials, error::YoLinkError, response_store};

use self::{
    directory::Device,
    models::{ApiRequest, Method, RawEnvelope, ResponseEnvelope, TokenGrant, TokenResult},
    registry::{select_decoder, DeviceState, Payload},
    session::{Session, SharedClock, SystemClock, TokenAction},
};

pub const DEFAULT_TOKEN_URL: &str = "https://api.yosmart.com/open/yolink/token";
pub const DEFAULT_API_URL: &str = "https://api.yosmart.com/open/yolink/v2/api";

#[derive(Debug, Clone)]
pub struct YoLinkClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    token_url: String,
    api_url: String,
    user_id: String,
    user_key: String,
    clock: SharedClock,
    session: Mutex<Session>,
    /// Raw token and API responses are written here when set.
    response_dump_dir: Option<PathBuf>,
}

impl YoLinkClient {
    pub fn new(config: &Config, account: &AccountCredentials) -> Self {
        Self::with_clock(
            &config.yolink_token_url,
            &config.yolink_api_url,
            account,
            Arc::new(SystemClock),
            config.response_dump_dir.clone(),
        )
    }

    pub fn with_clock(
        token_url: &str,
        api_url: &str,
        account: &AccountCredentials,
        clock: SharedClock,
        response_dump_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: Client::new(),
                token_url: token_url.to_owned(),
                api_url: api_url.to_owned(),
                user_id: account.user_id.clone(),
                user_key: account.user_key.clone(),
                clock,
                session: Mutex::new(Session::new()),
                response_dump_dir,
            }),
        }
    }

    /// Returns a usable bearer token, creating or refreshing it first if needed.
    ///
    /// See [`session`] for the policy. A failed refresh clears the session
    /// before the error is returned.
    pub async fn ensure_valid_token(&self) -> Result<String, YoLinkError> {
        let mut session = self.inner.session.lock().await;

        match session.next_action(self.inner.clock.now()) {
            TokenAction::Reuse { access_token } => Ok(access_token),

            TokenAction::Create => {
                info!("Fetching new YoLink access token");
                let result = self
                    .exchange(TokenGrant::ClientCredentials {
                        client_id: &self.inner.user_id,
                        client_secret: &self.inner.user_key,
                    })
                    .await?;
                let token = session.store(result, self.inner.clock.now());
                Ok(token.access_token.clone())
            }

            TokenAction::Refresh { refresh_token } => {
                info!("YoLink access token expired, refreshing");
                let grant = TokenGrant::RefreshToken {
                    client_id: &self.inner.user_id,
                    refresh_token: &refresh_token,
                };
                match self.exchange(grant).await {
                    Ok(result) => {
                        let token = session.store(result, self.inner.clock.now());
                        Ok(token.access_token.clone())
                    }
                    Err(e) => {
                        warn!(error = %e, "Token refresh failed; session cleared");
                        session.clear();
                        Err(e)
                    }
                }
            }
        }
    }

    async fn exchange(&self, grant: TokenGrant<'_>) -> Result<TokenResult, YoLinkError> {
        let grant_type = grant.grant_type();
        debug!(url = %self.inner.token_url, grant_type, "Requesting YoLink token");

        let response = self
            .inner
            .http
            .post(&self.inner.token_url)
            .form(&grant.form())
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if let Some(dir) = &self.inner.response_dump_dir {
            response_store::save(dir, "token", grant_type, &bytes).await;
        }

        if !status.is_success() {
            return Err(YoLinkError::Token {
                grant: grant_type,
                reason: format!("HTTP {status}: {}", String::from_utf8_lossy(&bytes)),
            });
        }

        serde_json::from_slice::<TokenResult>(&bytes).map_err(|e| YoLinkError::Token {
            grant: grant_type,
            reason: format!("unexpected response ({e}): {}", String::from_utf8_lossy(&bytes)),
        })
    }

    /// Invoke `method`, optionally addressed to `device`, and decode the reply.
    ///
    /// The decoder is selected before anything is sent, so an unsupported
    /// (device type, method) pair never reaches the network.
    pub async fn call(
        &self,
        method: Method,
        device: Option<&Device>,
        params: Option<&Value>,
    ) -> Result<ResponseEnvelope, YoLinkError> {
        let decoder = select_decoder(device.map(|d| &d.device_type), method)?;
        let token = self.ensure_valid_token().await?;

        let body = ApiRequest {
            method: method.as_str(),
            time: self.inner.clock.now(),
            msgid: Uuid::new_v4().to_string(),
            target_device: device.map(|d| d.device_id.as_str()),
            token: device.map(|d| d.token.as_str()),
            params,
        };
        let device_id = device.map(|d| d.device_id.as_str()).unwrap_or_default();
        debug!(method = %method, device_id = %device_id, msgid = %body.msgid, "Calling YoLink API");

        let bytes = self
            .inner
            .http
            .post(&self.inner.api_url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        if let Some(dir) = &self.inner.response_dump_dir {
            response_store::save(dir, method.as_str(), device_id, &bytes).await;
        }

        let raw = serde_json::from_slice::<RawEnvelope>(&bytes).map_err(|source| {
            YoLinkError::Envelope {
                method: method.as_str().to_owned(),
                source,
            }
        })?;

        raw.decode(decoder)
    }

    /// Every device attached to the account.
    pub async fn device_list(&self) -> Result<Vec<Device>, YoLinkError> {
        let method = Method::HomeGetDeviceList;
        match self.call(method, None, None).await?.into_data()? {
            Payload::DeviceList(list) => Ok(list.devices),
            Payload::State(_) => Err(YoLinkError::UnexpectedPayload {
                method: method.as_str().to_owned(),
            }),
        }
    }

    /// Current state of one device via `<type>.getState`.
    pub async fn get_state(&self, device: &Device) -> Result<DeviceState, YoLinkError> {
        let method =
            Method::get_state(&device.device_type).ok_or_else(|| YoLinkError::UnknownDecoder {
                device_type: Some(device.device_type.to_string()),
                method: format!("{}.getState", device.device_type),
            })?;

        match self.call(method, Some(device), None).await?.into_data()? {
            Payload::State(state) => Ok(state),
            Payload::DeviceList(_) => Err(YoLinkError::UnexpectedPayload {
                method: method.as_str().to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, body_string_contains, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::{models::DeviceType, session::testing::ManualClock, *};

    const TOKEN_PATH: &str = "/open/yolink/token";
    const API_PATH: &str = "/open/yolink/v2/api";
    const T0: i64 = 1_700_000_000;

    fn account() -> AccountCredentials {
        AccountCredentials {
            user_id: "uid-1".to_owned(),
            user_key: "key-1".to_owned(),
        }
    }

    fn client(server: &MockServer, clock: Arc<ManualClock>) -> YoLinkClient {
        YoLinkClient::with_clock(
            &format!("{}{TOKEN_PATH}", server.uri()),
            &format!("{}{API_PATH}", server.uri()),
            &account(),
            clock,
            None,
        )
    }

    fn token_body(access: &str, refresh: &str) -> Value {
        json!({
            "access_token": access,
            "refresh_token": refresh,
            "expires_in": 7200,
            "token_type": "bearer",
            "scope": ["create"]
        })
    }

    async fn mount_create(server: &MockServer, access: &str, expected: u64) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=uid-1"))
            .and(body_string_contains("client_secret=key-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access, "r1")))
            .expect(expected)
            .mount(server)
            .await;
    }

    fn device_list_reply() -> Value {
        json!({
            "time": T0 * 1000,
            "method": "Home.getDeviceList",
            "msgid": "m1",
            "code": "000000",
            "desc": "Success",
            "data": {
                "devices": [
                    {"deviceId": "d1", "deviceUDID": "u1", "token": "dev-token-1", "name": "Basement", "type": "THSensor"}
                ]
            }
        })
    }

    fn th_device() -> Device {
        Device {
            device_id: "d1".into(),
            device_uuid: "u1".into(),
            token: "dev-token-1".into(),
            name: "Basement".into(),
            device_type: DeviceType::ThSensor,
        }
    }

    #[tokio::test]
    async fn first_call_authenticates_and_sends_bearer_token() {
        let server = MockServer::start().await;
        mount_create(&server, "a1", 1).await;

        Mock::given(method("POST"))
            .and(path(API_PATH))
            .and(header("authorization", "Bearer a1"))
            .and(body_partial_json(json!({"method": "Home.getDeviceList", "time": T0})))
            .respond_with(ResponseTemplate::new(200).set_body_json(device_list_reply()))
            .expect(1)
            .mount(&server)
            .await;

        let devices = client(&server, Arc::new(ManualClock::new(T0)))
            .device_list()
            .await
            .unwrap();
        assert_eq!(devices, vec![th_device()]);
    }

    #[tokio::test]
    async fn unexpired_token_is_not_re_authenticated() {
        let server = MockServer::start().await;
        mount_create(&server, "a1", 1).await;

        let clock = Arc::new(ManualClock::new(T0));
        let yolink = client(&server, clock.clone());

        assert_eq!(yolink.ensure_valid_token().await.unwrap(), "a1");
        clock.advance(7199);
        assert_eq!(yolink.ensure_valid_token().await.unwrap(), "a1");
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_not_recreated() {
        let server = MockServer::start().await;
        mount_create(&server, "a1", 1).await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=r1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a2", "r2")))
            .expect(1)
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new(T0));
        let yolink = client(&server, clock.clone());

        assert_eq!(yolink.ensure_valid_token().await.unwrap(), "a1");
        clock.advance(7201);
        assert_eq!(yolink.ensure_valid_token().await.unwrap(), "a2");

        let session = yolink.inner.session.lock().await;
        let token = session.token().unwrap();
        assert_eq!(token.refresh_token, "r2");
        assert_eq!(token.expires_at, T0 + 7201 + 7200);
    }

    #[tokio::test]
    async fn failed_refresh_clears_session_for_next_call() {
        let server = MockServer::start().await;
        mount_create(&server, "a1", 2).await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid refresh token"))
            .expect(1)
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new(T0));
        let yolink = client(&server, clock.clone());

        yolink.ensure_valid_token().await.unwrap();
        clock.advance(10_000);

        let err = yolink.ensure_valid_token().await.unwrap_err();
        assert!(
            matches!(err, YoLinkError::Token { grant: "refresh_token", .. }),
            "unexpected error: {err}"
        );
        assert!(yolink.inner.session.lock().await.token().is_none());

        assert_eq!(yolink.ensure_valid_token().await.unwrap(), "a1");
    }

    #[tokio::test]
    async fn rejected_credentials_are_a_token_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"state": "error", "msg": "invalid client"})),
            )
            .mount(&server)
            .await;

        let err = client(&server, Arc::new(ManualClock::new(T0)))
            .device_list()
            .await
            .unwrap_err();
        match err {
            YoLinkError::Token { grant, reason } => {
                assert_eq!(grant, "client_credentials");
                assert!(reason.contains("invalid client"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn device_call_sends_device_token_in_body_only() {
        let server = MockServer::start().await;
        mount_create(&server, "a1", 1).await;

        Mock::given(method("POST"))
            .and(path(API_PATH))
            .and(header("authorization", "Bearer a1"))
            .and(body_partial_json(json!({
                "method": "THSensor.getState",
                "targetDevice": "d1",
                "token": "dev-token-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "time": T0 * 1000,
                "method": "THSensor.getState",
                "msgid": "m2",
                "code": "000000",
                "data": {
                    "state": {
                        "online": true, "state": "normal", "battery": "3",
                        "temperature": 21.5, "humidity": 48.0,
                        "tempLimit": {"max": 30, "min": 0}, "humidityLimit": 10.0,
                        "tempCorrection": 0.0, "humidityCorrection": 0.0, "version": "0101"
                    },
                    "reportAt": "2024-01-01T00:00:00Z",
                    "deviceId": "d1"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let state = client(&server, Arc::new(ManualClock::new(T0)))
            .get_state(&th_device())
            .await
            .unwrap();
        match state {
            DeviceState::ThSensor(s) => {
                assert_eq!(s.temperature, 21.5);
                assert_eq!(s.humidity, 48.0);
                assert_eq!(s.interval, None);
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_success_code_is_an_api_error() {
        let server = MockServer::start().await;
        mount_create(&server, "a1", 1).await;

        Mock::given(method("POST"))
            .and(path(API_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "time": T0 * 1000,
                "method": "THSensor.getState",
                "msgid": "m3",
                "code": "000201",
                "desc": "Cannot connect to Device"
            })))
            .mount(&server)
            .await;

        let err = client(&server, Arc::new(ManualClock::new(T0)))
            .get_state(&th_device())
            .await
            .unwrap_err();
        match err {
            YoLinkError::Api { code, .. } => assert_eq!(code, "000201"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unsupported_device_fails_before_any_request() {
        let server = MockServer::start().await;

        let finger = Device {
            device_type: DeviceType::Other("Finger".into()),
            ..th_device()
        };
        let yolink = client(&server, Arc::new(ManualClock::new(T0)));

        let err = yolink.get_state(&finger).await.unwrap_err();
        assert!(matches!(err, YoLinkError::UnknownDecoder { .. }));

        let err = yolink
            .call(Method::LockGetState, Some(&th_device()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, YoLinkError::UnknownDecoder { .. }));

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_names_missing_field() {
        let server = MockServer::start().await;
        mount_create(&server, "a1", 1).await;

        Mock::given(method("POST"))
            .and(path(API_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "time": T0 * 1000,
                "method": "Home.getDeviceList",
                "code": "000000",
                "data": {"devices": [{"deviceId": "d1"}]}
            })))
            .mount(&server)
            .await;

        let err = client(&server, Arc::new(ManualClock::new(T0)))
            .device_list()
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Home.getDeviceList: missing required field 'devices.0.deviceUDID'"
        );
    }
}
