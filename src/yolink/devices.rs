//! Typed `<DeviceType>.getState` payloads.
//!
//! Each record is built from the raw `data` object through [`Decode`] rather
//! than being a direct deserialisation target, so that a missing required
//! field is reported with its JSON path and optional fields stay `None`
//! instead of collapsing to a default.
//!
//! Battery levels are reported as strings by the sensor family
//! (`"0"`..`"4"`) and as integers by everything else; the records keep
//! whichever the vendor sends.

use serde_json::{Map, Value};

use super::{decode::Fields, models::Method, registry::Decode};
use crate::error::DecodeError;

// --- Temperature / humidity sensor -----------------------------------------
//
//   state.online              bool
//   state.state               "normal" | "alert"
//   state.battery             "0".."4"
//   state.interval            optional, continuous-alert interval
//   state.temperature         float, °C
//   state.humidity            float, %
//   state.tempLimit           object, alert range
//   state.humidityLimit       float
//   state.tempCorrection      float
//   state.humidityCorrection  float
//   state.version             firmware
//   reportAt, deviceId

#[derive(Debug, Clone, PartialEq)]
pub struct ThSensorState {
    pub online: bool,
    pub state: String,
    pub battery: String,
    /// Continuous-alert interval; absent unless configured on the device.
    pub interval: Option<i64>,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity percentage.
    pub humidity: f64,
    /// Normal temperature range; alerts fire outside it.
    pub temp_limit: Map<String, Value>,
    pub humidity_limit: f64,
    pub temp_correction: f64,
    pub humidity_correction: f64,
    pub version: String,
    pub report_at: String,
    pub device_id: String,
}

impl Decode for ThSensorState {
    const METHOD: Method = Method::ThSensorGetState;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let f = Fields::new(Self::METHOD.as_str(), data);
        Ok(Self {
            online: f.bool("state.online")?,
            state: f.string("state.state")?,
            battery: f.string("state.battery")?,
            interval: f.opt_i64("state.interval")?,
            temperature: f.f64("state.temperature")?,
            humidity: f.f64("state.humidity")?,
            temp_limit: f.object("state.tempLimit")?,
            humidity_limit: f.f64("state.humidityLimit")?,
            temp_correction: f.f64("state.tempCorrection")?,
            humidity_correction: f.f64("state.humidityCorrection")?,
            version: f.string("state.version")?,
            report_at: f.string("reportAt")?,
            device_id: f.string("deviceId")?,
        })
    }
}

// --- Door sensor -------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorSensorState {
    pub online: bool,
    /// `"closed"` | `"open"` | `"error"`.
    pub state: String,
    pub battery: String,
    /// Seconds open before an OpenRemind event fires.
    pub open_remind_delay: Option<i64>,
    pub alert_interval: Option<i64>,
    pub version: String,
    pub report_at: String,
    pub device_id: String,
}

impl Decode for DoorSensorState {
    const METHOD: Method = Method::DoorSensorGetState;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let f = Fields::new(Self::METHOD.as_str(), data);
        Ok(Self {
            online: f.bool("state.online")?,
            state: f.string("state.state")?,
            battery: f.string("state.battery")?,
            open_remind_delay: f.opt_i64("state.openRemindDelay")?,
            alert_interval: f.opt_i64("state.alertInterval")?,
            version: f.string("state.version")?,
            report_at: f.string("reportAt")?,
            device_id: f.string("deviceId")?,
        })
    }
}

// --- Leak sensor -------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakSensorState {
    pub online: bool,
    /// `"normal"` | `"alert"`.
    pub state: String,
    pub battery: String,
    pub interval: Option<i64>,
    pub version: String,
    pub report_at: String,
    pub device_id: String,
}

impl Decode for LeakSensorState {
    const METHOD: Method = Method::LeakSensorGetState;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let f = Fields::new(Self::METHOD.as_str(), data);
        Ok(Self {
            online: f.bool("state.online")?,
            state: f.string("state.state")?,
            battery: f.string("state.battery")?,
            interval: f.opt_i64("state.interval")?,
            version: f.string("state.version")?,
            report_at: f.string("reportAt")?,
            device_id: f.string("deviceId")?,
        })
    }
}

// --- Motion sensor -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionSensorState {
    pub online: bool,
    pub state: String,
    pub battery: String,
    pub alert_interval: Option<i64>,
    /// LED blinks when motion is detected.
    pub led_alarm: Option<bool>,
    /// Minutes without motion before entering the no-motion state.
    pub no_motion_delay: Option<i64>,
    pub version: String,
    pub report_at: String,
    pub device_id: String,
}

impl Decode for MotionSensorState {
    const METHOD: Method = Method::MotionSensorGetState;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let f = Fields::new(Self::METHOD.as_str(), data);
        Ok(Self {
            online: f.bool("state.online")?,
            state: f.string("state.state")?,
            battery: f.string("state.battery")?,
            alert_interval: f.opt_i64("state.alertInterval")?,
            led_alarm: f.opt_bool("state.ledAlarm")?,
            no_motion_delay: f.opt_i64("state.nomotionDelay")?,
            version: f.string("state.version")?,
            report_at: f.string("reportAt")?,
            device_id: f.string("deviceId")?,
        })
    }
}

// --- Vibration sensor --------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VibrationSensorState {
    pub online: bool,
    pub state: String,
    pub battery: String,
    pub alert_interval: Option<i64>,
    pub no_vibration_delay: Option<i64>,
    pub version: String,
    pub report_at: String,
    pub device_id: String,
}

impl Decode for VibrationSensorState {
    const METHOD: Method = Method::VibrationSensorGetState;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let f = Fields::new(Self::METHOD.as_str(), data);
        Ok(Self {
            online: f.bool("state.online")?,
            state: f.string("state.state")?,
            battery: f.string("state.battery")?,
            alert_interval: f.opt_i64("state.alertInterval")?,
            no_vibration_delay: f.opt_i64("state.noVibrationDelay")?,
            version: f.string("state.version")?,
            report_at: f.string("reportAt")?,
            device_id: f.string("deviceId")?,
        })
    }
}

// --- Smart remote --------------------------------------------------------------
//
// `state.event` only exists once a key has been pressed; an empty object
// counts as no event. Otherwise both `keyMask` and `type` must be there.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEvent {
    /// Bits 0-7 are keys 0-7.
    pub key_mask: i64,
    /// `"Press"` | `"LongPress"`.
    pub event_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartRemoterState {
    pub event: Option<RemoteEvent>,
    pub battery: i64,
    pub version: String,
    pub report_at: String,
    pub device_id: String,
}

impl Decode for SmartRemoterState {
    const METHOD: Method = Method::SmartRemoterGetState;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let f = Fields::new(Self::METHOD.as_str(), data);
        let event = match f.opt_object("state.event")? {
            Some(event) if !event.is_empty() => Some(RemoteEvent {
                key_mask: f.i64("state.event.keyMask")?,
                event_type: f.string("state.event.type")?,
            }),
            _ => None,
        };
        Ok(Self {
            event,
            battery: f.i64("state.battery")?,
            version: f.string("state.version")?,
            report_at: f.string("reportAt")?,
            device_id: f.string("deviceId")?,
        })
    }
}

// --- Infrared remote -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraredRemoterState {
    /// 1 (empty) to 4 (full).
    pub battery: i64,
    /// One entry per key; `true` when the key has been learned.
    pub keys: Vec<bool>,
    pub version: String,
    pub tz: i64,
}

impl InfraredRemoterState {
    pub fn learned_keys(&self) -> usize {
        self.keys.iter().filter(|k| **k).count()
    }
}

impl Decode for InfraredRemoterState {
    const METHOD: Method = Method::InfraredRemoterGetState;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let f = Fields::new(Self::METHOD.as_str(), data);
        Ok(Self {
            battery: f.i64("battery")?,
            keys: f.bool_array("keys")?,
            version: f.string("version")?,
            tz: f.i64("tz")?,
        })
    }
}

// --- Lock ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockState {
    /// `"locked"` | `"unlocked"`.
    pub state: String,
    pub battery: i64,
    pub version: String,
    /// UTC offset, -12..12.
    pub tz: i64,
}

impl Decode for LockState {
    const METHOD: Method = Method::LockGetState;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let f = Fields::new(Self::METHOD.as_str(), data);
        Ok(Self {
            state: f.string("state.state")?,
            battery: f.i64("state.battery")?,
            version: f.string("version")?,
            tz: f.i64("tz")?,
        })
    }
}

// --- Outlet ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutletState {
    /// `"closed"` | `"open"`.
    pub state: String,
    /// Minutes left on the delay-on timer; 0 is off.
    pub delay_on: i64,
    /// Minutes left on the delay-off timer; 0 is off.
    pub delay_off: i64,
    /// Current power draw; only on models that meter it.
    pub power: Option<i64>,
    pub version: String,
    pub tz: i64,
}

impl Decode for OutletState {
    const METHOD: Method = Method::OutletGetState;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let f = Fields::new(Self::METHOD.as_str(), data);
        Ok(Self {
            state: f.string("state")?,
            delay_on: f.i64("delay.on")?,
            delay_off: f.i64("delay.off")?,
            power: f.opt_i64("power")?,
            version: f.string("version")?,
            tz: f.i64("tz")?,
        })
    }
}

// --- Switch ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchState {
    pub state: String,
    pub delay_on: i64,
    pub delay_off: i64,
    pub version: String,
    pub tz: i64,
}

impl Decode for SwitchState {
    const METHOD: Method = Method::SwitchGetState;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let f = Fields::new(Self::METHOD.as_str(), data);
        Ok(Self {
            state: f.string("state")?,
            delay_on: f.i64("delay.on")?,
            delay_off: f.i64("delay.off")?,
            version: f.string("version")?,
            tz: f.i64("tz")?,
        })
    }
}

// --- Manipulator (valve actuator) ------------------------------------------------
//
// Unlike Outlet/Switch, the delay timers inside `delay` are optional, but the
// `delay` object itself is always sent.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManipulatorState {
    /// `"closed"` | `"open"`.
    pub state: String,
    pub delay_on: Option<i64>,
    pub delay_off: Option<i64>,
    /// Minutes open before a reminder; 0 disables it.
    pub open_remind: Option<i64>,
    pub version: String,
    pub tz: i64,
}

impl Decode for ManipulatorState {
    const METHOD: Method = Method::ManipulatorGetState;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let f = Fields::new(Self::METHOD.as_str(), data);
        f.object("delay")?;
        Ok(Self {
            state: f.string("state")?,
            delay_on: f.opt_i64("delay.on")?,
            delay_off: f.opt_i64("delay.off")?,
            open_remind: f.opt_i64("openRemind")?,
            version: f.string("version")?,
            tz: f.i64("tz")?,
        })
    }
}

// --- Multi-outlet ------------------------------------------------------------------
//
// `state` has one entry per socket. Only the first entry of `delays` is read;
// it carries the timers for the whole strip.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiOutletState {
    pub state: Vec<String>,
    pub delays_on: i64,
    pub delays_off: i64,
    pub version: String,
    pub tz: i64,
}

impl Decode for MultiOutletState {
    const METHOD: Method = Method::MultiOutletGetState;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let f = Fields::new(Self::METHOD.as_str(), data);
        Ok(Self {
            state: f.string_array("state")?,
            delays_on: f.i64("delays.0.on")?,
            delays_off: f.i64("delays.0.off")?,
            version: f.string("version")?,
            tz: f.i64("tz")?,
        })
    }
}

// --- Hubs ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiStatus {
    pub enable: bool,
    pub ssid: String,
    pub ip: String,
    pub gateway: String,
    pub mask: String,
}

impl WifiStatus {
    fn decode(f: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            enable: f.bool("wifi.enable")?,
            ssid: f.string("wifi.ssid")?,
            ip: f.string("wifi.ip")?,
            gateway: f.string("wifi.gateway")?,
            mask: f.string("wifi.mask")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetStatus {
    pub enable: bool,
    pub ip: String,
    pub gateway: String,
    pub mask: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubState {
    pub version: String,
    pub wifi: WifiStatus,
    pub eth: EthernetStatus,
}

impl Decode for HubState {
    const METHOD: Method = Method::HubGetState;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let f = Fields::new(Self::METHOD.as_str(), data);
        Ok(Self {
            version: f.string("version")?,
            wifi: WifiStatus::decode(&f)?,
            eth: EthernetStatus {
                enable: f.bool("eth.enable")?,
                ip: f.string("eth.ip")?,
                gateway: f.string("eth.gateway")?,
                mask: f.string("eth.mask")?,
            },
        })
    }
}

/// A speaker hub reports Wi-Fi details but only whether Ethernet is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerHubState {
    pub version: String,
    pub wifi: WifiStatus,
    pub eth_enable: bool,
    pub volume: i64,
    /// Beep on startup and settings changes.
    pub enable_beep: bool,
    /// Silences everything, including incoming messages.
    pub mute: bool,
}

impl Decode for SpeakerHubState {
    const METHOD: Method = Method::SpeakerHubGetState;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let f = Fields::new(Self::METHOD.as_str(), data);
        Ok(Self {
            version: f.string("version")?,
            wifi: WifiStatus::decode(&f)?,
            eth_enable: f.bool("eth.enable")?,
            volume: f.i64("options.volume")?,
            enable_beep: f.bool("options.enableBeep")?,
            mute: f.bool("options.mute")?,
        })
    }
}

// --- Water meter controller ------------------------------------------------------------
//
//   state.valve / meter / waterFlowing
//   alarm.*            seven alarm flags
//   battery, powerSupply ("battery" | "PowerLine")
//   valveDelay.on/off  optional timers inside a required object
//   attributes.*       configuration; meterUnit 0-GAL 1-CCF 2-M3 3-L
//   recentUsage.amount/duration, dailyUsage, temperature, version, tz

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaterMeterAlarms {
    pub open_reminder: bool,
    pub leak: bool,
    pub amount_overrun: bool,
    pub duration_overrun: bool,
    pub valve_error: bool,
    pub reminder: bool,
    pub freeze_error: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaterMeterAttributes {
    /// Minutes.
    pub open_reminder: i64,
    pub meter_unit: i64,
    /// Minutes.
    pub alert_interval: i64,
    pub meter_step_factor: i64,
    pub leak_limit: f64,
    pub auto_close_valve: bool,
    pub overrun_amount_acv: bool,
    pub overrun_duration_acv: bool,
    /// `"on"` | `"off"` | `"schedule"`.
    pub leak_plan: String,
    pub overrun_amount: f64,
    /// Minutes.
    pub overrun_duration: i64,
    /// Degrees Celsius.
    pub freeze_temp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaterMeterControllerState {
    /// `"close"` | `"open"`.
    pub valve: String,
    pub meter: i64,
    pub water_flowing: bool,
    pub alarm: WaterMeterAlarms,
    pub battery: i64,
    pub power_supply: String,
    pub valve_delay_on: Option<i64>,
    pub valve_delay_off: Option<i64>,
    pub attributes: WaterMeterAttributes,
    pub recent_usage_amount: i64,
    /// Minutes.
    pub recent_usage_duration: i64,
    pub daily_usage: i64,
    /// Degrees Celsius.
    pub temperature: f64,
    pub version: String,
    pub tz: i64,
}

impl Decode for WaterMeterControllerState {
    const METHOD: Method = Method::WaterMeterControllerGetState;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let f = Fields::new(Self::METHOD.as_str(), data);
        f.object("valveDelay")?;
        Ok(Self {
            valve: f.string("state.valve")?,
            meter: f.i64("state.meter")?,
            water_flowing: f.bool("state.waterFlowing")?,
            alarm: WaterMeterAlarms {
                open_reminder: f.bool("alarm.openReminder")?,
                leak: f.bool("alarm.leak")?,
                amount_overrun: f.bool("alarm.amountOverrun")?,
                duration_overrun: f.bool("alarm.durationOverrun")?,
                valve_error: f.bool("alarm.valveError")?,
                reminder: f.bool("alarm.reminder")?,
                freeze_error: f.bool("alarm.freezeError")?,
            },
            battery: f.i64("battery")?,
            power_supply: f.string("powerSupply")?,
            valve_delay_on: f.opt_i64("valveDelay.on")?,
            valve_delay_off: f.opt_i64("valveDelay.off")?,
            attributes: WaterMeterAttributes {
                open_reminder: f.i64("attributes.openReminder")?,
                meter_unit: f.i64("attributes.meterUnit")?,
                alert_interval: f.i64("attributes.alertInterval")?,
                meter_step_factor: f.i64("attributes.meterStepFactor")?,
                leak_limit: f.f64("attributes.leakLimit")?,
                auto_close_valve: f.bool("attributes.autoCloseValve")?,
                overrun_amount_acv: f.bool("attributes.overrunAmountACV")?,
                overrun_duration_acv: f.bool("attributes.overrunDurationACV")?,
                leak_plan: f.string("attributes.leakPlan")?,
                overrun_amount: f.f64("attributes.overrunAmount")?,
                overrun_duration: f.i64("attributes.overrunDuration")?,
                freeze_temp: f.f64("attributes.freezeTemp")?,
            },
            recent_usage_amount: f.i64("recentUsage.amount")?,
            recent_usage_duration: f.i64("recentUsage.duration")?,
            daily_usage: f.i64("dailyUsage")?,
            temperature: f.f64("temperature")?,
            version: f.string("version")?,
            tz: f.i64("tz")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
