use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::registry::{DecoderFn, Payload};
use crate::error::YoLinkError;

/// Status code the API uses to signal success.
pub const SUCCESS_CODE: &str = "000000";

// ---------------------------------------------------------------------------
// Response envelope
//
// Every YoLink API reply (BUDP) shares the same outer object:
//
//   { "time": 1704067200000, "method": "THSensor.getState", "msgid": "...",
//     "code": "000000", "desc": "Success", "data": { ... } }
//
// `data` is only meaningful when `code` is "000000". Its shape depends on the
// method and the device type the request targeted; nothing inside the envelope
// says which, so the caller picks the decoder.
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    /// Server timestamp.
    pub time: i64,

    /// Method name echoed back by the server.
    pub method: String,

    /// Message id echoed back; the server sends either a string or a number.
    #[serde(default, deserialize_with = "string_or_number")]
    pub msgid: Option<String>,

    /// `"000000"` on success, a vendor error code otherwise.
    pub code: String,

    /// Human-readable status description.
    pub desc: Option<String>,

    /// Method-specific payload.
    pub data: Option<Value>,
}

impl RawEnvelope {
    /// Check the status code and run `decoder` over `data`.
    pub fn decode(self, decoder: DecoderFn) -> Result<ResponseEnvelope, YoLinkError> {
        if self.code != SUCCESS_CODE {
            return Err(YoLinkError::Api {
                method: self.method,
                code: self.code,
                desc: self.desc,
            });
        }

        let data = self.data.as_ref().map(decoder).transpose()?;

        Ok(ResponseEnvelope {
            time: self.time,
            method: self.method,
            msgid: self.msgid,
            code: self.code,
            description: self.desc,
            data,
        })
    }
}

/// A successful reply with its payload decoded into a typed record.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub time: i64,
    pub method: String,
    pub msgid: Option<String>,
    pub code: String,
    pub description: Option<String>,
    pub data: Option<Payload>,
}

impl ResponseEnvelope {
    /// The decoded payload, or [`YoLinkError::MissingData`] if the server sent none.
    pub fn into_data(self) -> Result<Payload, YoLinkError> {
        self.data.ok_or(YoLinkError::MissingData {
            method: self.method,
        })
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Token: POST /open/yolink/token  (application/x-www-form-urlencoded)
// ---------------------------------------------------------------------------

/// Successful token endpoint reply.
#[derive(Debug, Deserialize)]
pub struct TokenResult {
    /// Bearer token for the API endpoint.
    pub access_token: String,

    /// Used to obtain a new `access_token` without re-sending the user key.
    pub refresh_token: String,

    /// Validity period in **seconds**.
    pub expires_in: i64,

    pub token_type: Option<String>,
}

/// The two grants the token endpoint accepts.
#[derive(Debug, Clone, Copy)]
pub enum TokenGrant<'a> {
    ClientCredentials {
        client_id: &'a str,
        client_secret: &'a str,
    },
    RefreshToken {
        client_id: &'a str,
        refresh_token: &'a str,
    },
}

impl<'a> TokenGrant<'a> {
    pub fn grant_type(&self) -> &'static str {
        match self {
            TokenGrant::ClientCredentials { .. } => "client_credentials",
            TokenGrant::RefreshToken { .. } => "refresh_token",
        }
    }

    /// Form fields in the order the endpoint documents them.
    pub fn form(&self) -> [(&'static str, &'a str); 3] {
        match *self {
            TokenGrant::ClientCredentials {
                client_id,
                client_secret,
            } => [
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ],
            TokenGrant::RefreshToken {
                client_id,
                refresh_token,
            } => [
                ("grant_type", "refresh_token"),
                ("client_id", client_id),
                ("refresh_token", refresh_token),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// API request: POST /open/yolink/v2/api  (BDDP)
// ---------------------------------------------------------------------------

/// Request body sent to the API endpoint.
///
/// `token` is the *device* token from the directory listing, not the bearer
/// token; it is only present when a device is targeted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest<'a> {
    pub method: &'a str,
    pub time: i64,
    pub msgid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_device: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a Value>,
}

// ---------------------------------------------------------------------------
// DeviceType
// ---------------------------------------------------------------------------

/// Capability class reported in the `type` field of a directory entry.
///
/// Tags the vendor reports that are not listed here are kept verbatim in
/// [`DeviceType::Other`]; such devices show up in the directory but have no
/// decoder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceType {
    ThSensor,
    WaterMeterController,
    DoorSensor,
    InfraredRemoter,
    MultiOutlet,
    Lock,
    Outlet,
    SpeakerHub,
    Manipulator,
    VibrationSensor,
    MotionSensor,
    SmartRemoter,
    Hub,
    LeakSensor,
    Switch,
    Other(String),
}

impl DeviceType {
    /// Every device type that has a `getState` decoder.
    pub const KNOWN: [DeviceType; 15] = [
        DeviceType::ThSensor,
        DeviceType::WaterMeterController,
        DeviceType::DoorSensor,
        DeviceType::InfraredRemoter,
        DeviceType::MultiOutlet,
        DeviceType::Lock,
        DeviceType::Outlet,
        DeviceType::SpeakerHub,
        DeviceType::Manipulator,
        DeviceType::VibrationSensor,
        DeviceType::MotionSensor,
        DeviceType::SmartRemoter,
        DeviceType::Hub,
        DeviceType::LeakSensor,
        DeviceType::Switch,
    ];

    /// Map a vendor tag, keeping unknown tags as [`DeviceType::Other`].
    pub fn from_tag(tag: &str) -> Self {
        tag.parse().unwrap_or_else(|_| DeviceType::Other(tag.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            DeviceType::ThSensor => "THSensor",
            DeviceType::WaterMeterController => "WaterMeterController",
            DeviceType::DoorSensor => "DoorSensor",
            DeviceType::InfraredRemoter => "InfraredRemoter",
            DeviceType::MultiOutlet => "MultiOutlet",
            DeviceType::Lock => "Lock",
            DeviceType::Outlet => "Outlet",
            DeviceType::SpeakerHub => "SpeakerHub",
            DeviceType::Manipulator => "Manipulator",
            DeviceType::VibrationSensor => "VibrationSensor",
            DeviceType::MotionSensor => "MotionSensor",
            DeviceType::SmartRemoter => "SmartRemoter",
            DeviceType::Hub => "Hub",
            DeviceType::LeakSensor => "LeakSensor",
            DeviceType::Switch => "Switch",
            DeviceType::Other(tag) => tag,
        }
    }
}

/// Strict parse: only the known tags succeed.
impl FromStr for DeviceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        DeviceType::KNOWN
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown device type: {s:?}"))
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// Remote operations this client knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    HomeGetDeviceList,
    ThSensorGetState,
    WaterMeterControllerGetState,
    DoorSensorGetState,
    InfraredRemoterGetState,
    MultiOutletGetState,
    LockGetState,
    OutletGetState,
    SpeakerHubGetState,
    ManipulatorGetState,
    VibrationSensorGetState,
    MotionSensorGetState,
    SmartRemoterGetState,
    HubGetState,
    LeakSensorGetState,
    SwitchGetState,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::HomeGetDeviceList => "Home.getDeviceList",
            Method::ThSensorGetState => "THSensor.getState",
            Method::WaterMeterControllerGetState => "WaterMeterController.getState",
            Method::DoorSensorGetState => "DoorSensor.getState",
            Method::InfraredRemoterGetState => "InfraredRemoter.getState",
            Method::MultiOutletGetState => "MultiOutlet.getState",
            Method::LockGetState => "Lock.getState",
            Method::OutletGetState => "Outlet.getState",
            Method::SpeakerHubGetState => "SpeakerHub.getState",
            Method::ManipulatorGetState => "Manipulator.getState",
            Method::VibrationSensorGetState => "VibrationSensor.getState",
            Method::MotionSensorGetState => "MotionSensor.getState",
            Method::SmartRemoterGetState => "SmartRemoter.getState",
            Method::HubGetState => "Hub.getState",
            Method::LeakSensorGetState => "LeakSensor.getState",
            Method::SwitchGetState => "Switch.getState",
        }
    }

    /// The `<type>.getState` method for a device type, if it has one.
    pub fn get_state(device_type: &DeviceType) -> Option<Method> {
        Some(match device_type {
            DeviceType::ThSensor => Method::ThSensorGetState,
            DeviceType::WaterMeterController => Method::WaterMeterControllerGetState,
            DeviceType::DoorSensor => Method::DoorSensorGetState,
            DeviceType::InfraredRemoter => Method::InfraredRemoterGetState,
            DeviceType::MultiOutlet => Method::MultiOutletGetState,
            DeviceType::Lock => Method::LockGetState,
            DeviceType::Outlet => Method::OutletGetState,
            DeviceType::SpeakerHub => Method::SpeakerHubGetState,
            DeviceType::Manipulator => Method::ManipulatorGetState,
            DeviceType::VibrationSensor => Method::VibrationSensorGetState,
            DeviceType::MotionSensor => Method::MotionSensorGetState,
            DeviceType::SmartRemoter => Method::SmartRemoterGetState,
            DeviceType::Hub => Method::HubGetState,
            DeviceType::LeakSensor => Method::LeakSensorGetState,
            DeviceType::Switch => Method::SwitchGetState,
            DeviceType::Other(_) => return None,
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
