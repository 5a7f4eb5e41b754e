//! (device type, method) → decoder lookup.
//!
//! The envelope does not say what its `data` is, so the caller has to know
//! which decoder applies to the call it made. Asking for a pair that is not
//! registered is a programming/configuration error and fails loudly; it
//! never yields an empty record.

use serde_json::Value;

use super::{
    devices::{
        DoorSensorState, HubState, InfraredRemoterState, LeakSensorState, LockState,
        ManipulatorState, MotionSensorState, MultiOutletState, OutletState, SmartRemoterState,
        SpeakerHubState, SwitchState, ThSensorState, VibrationSensorState,
        WaterMeterControllerState,
    },
    directory::DeviceList,
    models::{DeviceType, Method},
};
use crate::error::{DecodeError, YoLinkError};

/// Shared contract of every typed payload.
pub trait Decode: Sized {
    /// Method whose `data` this record decodes; also used as the record name
    /// in decode errors.
    const METHOD: Method;

    fn decode(data: &Value) -> Result<Self, DecodeError>;
}

pub type DecoderFn = fn(&Value) -> Result<Payload, DecodeError>;

/// Any decoded `data` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    DeviceList(DeviceList),
    State(DeviceState),
}

/// Decoded result of a `<DeviceType>.getState` call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceState {
    ThSensor(ThSensorState),
    WaterMeterController(WaterMeterControllerState),
    DoorSensor(DoorSensorState),
    InfraredRemoter(InfraredRemoterState),
    MultiOutlet(MultiOutletState),
    Lock(LockState),
    Outlet(OutletState),
    SpeakerHub(SpeakerHubState),
    Manipulator(ManipulatorState),
    VibrationSensor(VibrationSensorState),
    MotionSensor(MotionSensorState),
    SmartRemoter(SmartRemoterState),
    Hub(HubState),
    LeakSensor(LeakSensorState),
    Switch(SwitchState),
}

impl DeviceState {
    pub fn device_type(&self) -> DeviceType {
        match self {
            DeviceState::ThSensor(_) => DeviceType::ThSensor,
            DeviceState::WaterMeterController(_) => DeviceType::WaterMeterController,
            DeviceState::DoorSensor(_) => DeviceType::DoorSensor,
            DeviceState::InfraredRemoter(_) => DeviceType::InfraredRemoter,
            DeviceState::MultiOutlet(_) => DeviceType::MultiOutlet,
            DeviceState::Lock(_) => DeviceType::Lock,
            DeviceState::Outlet(_) => DeviceType::Outlet,
            DeviceState::SpeakerHub(_) => DeviceType::SpeakerHub,
            DeviceState::Manipulator(_) => DeviceType::Manipulator,
            DeviceState::VibrationSensor(_) => DeviceType::VibrationSensor,
            DeviceState::MotionSensor(_) => DeviceType::MotionSensor,
            DeviceState::SmartRemoter(_) => DeviceType::SmartRemoter,
            DeviceState::Hub(_) => DeviceType::Hub,
            DeviceState::LeakSensor(_) => DeviceType::LeakSensor,
            DeviceState::Switch(_) => DeviceType::Switch,
        }
    }
}

/// Look up the decoder for a call.
///
/// Account-level methods (`Home.getDeviceList`) take no device type.
pub fn select_decoder(
    device_type: Option<&DeviceType>,
    method: Method,
) -> Result<DecoderFn, YoLinkError> {
    use DeviceState as S;
    use DeviceType as T;
    use Method as M;

    let decoder: DecoderFn = match (device_type, method) {
        (None, M::HomeGetDeviceList) => |v| DeviceList::decode(v).map(Payload::DeviceList),
        (Some(T::ThSensor), M::ThSensorGetState) => {
            |v| ThSensorState::decode(v).map(|s| Payload::State(S::ThSensor(s)))
        }
        (Some(T::WaterMeterController), M::WaterMeterControllerGetState) => |v| {
            WaterMeterControllerState::decode(v).map(|s| Payload::State(S::WaterMeterController(s)))
        },
        (Some(T::DoorSensor), M::DoorSensorGetState) => {
            |v| DoorSensorState::decode(v).map(|s| Payload::State(S::DoorSensor(s)))
        }
        (Some(T::InfraredRemoter), M::InfraredRemoterGetState) => {
            |v| InfraredRemoterState::decode(v).map(|s| Payload::State(S::InfraredRemoter(s)))
        }
        (Some(T::MultiOutlet), M::MultiOutletGetState) => {
            |v| MultiOutletState::decode(v).map(|s| Payload::State(S::MultiOutlet(s)))
        }
        (Some(T::Lock), M::LockGetState) => {
            |v| LockState::decode(v).map(|s| Payload::State(S::Lock(s)))
        }
        (Some(T::Outlet), M::OutletGetState) => {
            |v| OutletState::decode(v).map(|s| Payload::State(S::Outlet(s)))
        }
        (Some(T::SpeakerHub), M::SpeakerHubGetState) => {
            |v| SpeakerHubState::decode(v).map(|s| Payload::State(S::SpeakerHub(s)))
        }
        (Some(T::Manipulator), M::ManipulatorGetState) => {
            |v| ManipulatorState::decode(v).map(|s| Payload::State(S::Manipulator(s)))
        }
        (Some(T::VibrationSensor), M::VibrationSensorGetState) => {
            |v| VibrationSensorState::decode(v).map(|s| Payload::State(S::VibrationSensor(s)))
        }
        (Some(T::MotionSensor), M::MotionSensorGetState) => {
            |v| MotionSensorState::decode(v).map(|s| Payload::State(S::MotionSensor(s)))
        }
        (Some(T::SmartRemoter), M::SmartRemoterGetState) => {
            |v| SmartRemoterState::decode(v).map(|s| Payload::State(S::SmartRemoter(s)))
        }
        (Some(T::Hub), M::HubGetState) => {
            |v| HubState::decode(v).map(|s| Payload::State(S::Hub(s)))
        }
        (Some(T::LeakSensor), M::LeakSensorGetState) => {
            |v| LeakSensorState::decode(v).map(|s| Payload::State(S::LeakSensor(s)))
        }
        (Some(T::Switch), M::SwitchGetState) => {
            |v| SwitchState::decode(v).map(|s| Payload::State(S::Switch(s)))
        }
        _ => {
            return Err(YoLinkError::UnknownDecoder {
                device_type: device_type.map(ToString::to_string),
                method: method.as_str().to_owned(),
            })
        }
    };

    Ok(decoder)
}
