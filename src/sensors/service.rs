use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{
    config::{PollTypes, TemperatureUnit},
    db::{models::Row, Sink},
    yolink::{
        directory::{group_by_type, Device},
        models::Method,
        registry::DeviceState,
        YoLinkClient,
    },
};

pub struct PollService<S> {
    yolink: YoLinkClient,
    sink: S,
    poll_types: PollTypes,
    unit: TemperatureUnit,
}

impl<S: Sink> PollService<S> {
    pub fn new(yolink: YoLinkClient, sink: S, poll_types: PollTypes, unit: TemperatureUnit) -> Self {
        Self {
            yolink,
            sink,
            poll_types,
            unit,
        }
    }

    /// One sweep: refresh the device directory, then read and save the state
    /// of every device of a selected type. Returns the number of rows saved.
    ///
    /// The first failing device aborts the sweep.
    pub async fn run_once(&mut self) -> Result<usize> {
        let devices = self
            .yolink
            .device_list()
            .await
            .context("failed to fetch YoLink device list")?;
        let groups = group_by_type(&devices);
        info!(devices = devices.len(), types = groups.len(), "Device directory refreshed");

        for (device_type, members) in &groups {
            for device in members {
                info!(
                    device_type = %device_type,
                    name = %device.name,
                    device_id = %device.device_id,
                    "Device"
                );
            }
        }

        let mut saved = 0;
        for (device_type, members) in &groups {
            if !self.poll_types.includes(device_type) {
                continue;
            }
            if Method::get_state(device_type).is_none() {
                warn!(device_type = %device_type, "No state decoder for device type; skipping");
                continue;
            }

            for device in members {
                let state = self.yolink.get_state(device).await.with_context(|| {
                    format!("failed to read state of {device_type} '{}'", device.name)
                })?;

                let row = row_for(device, &state, self.unit);
                info!(device_type = %device_type, device_id = %device.device_id, reading = %row, "Reading");

                self.sink
                    .save(device_type.as_str(), &row)
                    .await
                    .with_context(|| format!("failed to save {device_type} reading"))?;
                saved += 1;
            }
        }

        info!(rows = saved, "Sweep complete");
        Ok(saved)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// Dew point approximation in °C, good above ~50% relative humidity.
pub fn dew_point(temperature: f64, humidity: f64) -> f64 {
    temperature - (100.0 - humidity) / 5.0
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Map a decoded state to the row saved for it. The device name always
/// comes first.
pub fn row_for(device: &Device, state: &DeviceState, unit: TemperatureUnit) -> Row {
    let row = Row::new().with("name", device.name.as_str());

    match state {
        DeviceState::ThSensor(s) => row
            .with("temperature", round1(unit.convert_celsius(s.temperature)))
            .with("humidity", s.humidity)
            .with(
                "dew_point",
                round1(unit.convert_celsius(dew_point(s.temperature, s.humidity))),
            ),
        DeviceState::DoorSensor(s) => row
            .with("online", s.online)
            .with("state", s.state.as_str())
            .with("battery", s.battery.as_str())
            .with("report_at", s.report_at.as_str()),
        DeviceState::LeakSensor(s) => row
            .with("online", s.online)
            .with("state", s.state.as_str())
            .with("battery", s.battery.as_str())
            .with("report_at", s.report_at.as_str()),
        DeviceState::MotionSensor(s) => row
            .with("online", s.online)
            .with("state", s.state.as_str())
            .with("battery", s.battery.as_str())
            .with("report_at", s.report_at.as_str()),
        DeviceState::VibrationSensor(s) => row
            .with("online", s.online)
            .with("state", s.state.as_str())
            .with("battery", s.battery.as_str())
            .with("report_at", s.report_at.as_str()),
        DeviceState::SmartRemoter(s) => row
            .with("battery", s.battery)
            .with("event_type", s.event.as_ref().map(|e| e.event_type.as_str()))
            .with("key_mask", s.event.as_ref().map(|e| e.key_mask))
            .with("report_at", s.report_at.as_str()),
        DeviceState::InfraredRemoter(s) => row
            .with("battery", s.battery)
            .with("learned_keys", s.learned_keys() as i64),
        DeviceState::Lock(s) => row
            .with("state", s.state.as_str())
            .with("battery", s.battery),
        DeviceState::Outlet(s) => row
            .with("state", s.state.as_str())
            .with("power", s.power),
        DeviceState::Switch(s) => row.with("state", s.state.as_str()),
        DeviceState::Manipulator(s) => row
            .with("state", s.state.as_str())
            .with("open_remind", s.open_remind),
        DeviceState::MultiOutlet(s) => row.with("state", s.state.join("|")),
        DeviceState::Hub(s) => row
            .with("version", s.version.as_str())
            .with("wifi_enable", s.wifi.enable)
            .with("wifi_ssid", s.wifi.ssid.as_str())
            .with("wifi_ip", s.wifi.ip.as_str())
            .with("eth_enable", s.eth.enable)
            .with("eth_ip", s.eth.ip.as_str()),
        DeviceState::SpeakerHub(s) => row
            .with("version", s.version.as_str())
            .with("wifi_enable", s.wifi.enable)
            .with("volume", s.volume)
            .with("mute", s.mute),
        DeviceState::WaterMeterController(s) => row
            .with("valve", s.valve.as_str())
            .with("meter", s.meter)
            .with("water_flowing", s.water_flowing)
            .with("leak", s.alarm.leak)
            .with("battery", s.battery)
            .with("daily_usage", s.daily_usage)
            .with("temperature", round1(unit.convert_celsius(s.temperature))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};
    use wiremock::{
        matchers::{body_partial_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::{
        credentials::AccountCredentials,
        db::models::FieldValue,
        yolink::{
            devices::{LockState, ThSensorState},
            models::DeviceType,
            session::testing::ManualClock,
        },
    };

    #[derive(Default)]
    struct MemorySink {
        rows: Vec<(String, Row)>,
    }

    impl Sink for MemorySink {
        async fn save(&mut self, category: &str, row: &Row) -> Result<()> {
            self.rows.push((category.to_owned(), row.clone()));
            Ok(())
        }
    }

    fn device(id: &str, name: &str, device_type: DeviceType) -> Device {
        Device {
            device_id: id.into(),
            device_uuid: format!("u-{id}"),
            token: format!("t-{id}"),
            name: name.into(),
            device_type,
        }
    }

    fn th_state(temperature: f64, humidity: f64) -> ThSensorState {
        ThSensorState {
            online: true,
            state: "normal".into(),
            battery: "4".into(),
            interval: None,
            temperature,
            humidity,
            temp_limit: Default::default(),
            humidity_limit: 10.0,
            temp_correction: 0.0,
            humidity_correction: 0.0,
            version: "0101".into(),
            report_at: "2024-01-01T00:00:00Z".into(),
            device_id: "d1".into(),
        }
    }

    #[test]
    fn dew_point_approximation() {
        assert_eq!(dew_point(20.0, 100.0), 20.0);
        assert_eq!(dew_point(25.0, 50.0), 15.0);
    }

    #[test]
    fn th_sensor_row_in_celsius() {
        let d = device("d1", "Basement", DeviceType::ThSensor);
        let row = row_for(&d, &DeviceState::ThSensor(th_state(21.5, 48.0)), TemperatureUnit::Celsius);

        assert_eq!(
            row.names().collect::<Vec<_>>(),
            ["name", "temperature", "humidity", "dew_point"]
        );
        assert_eq!(row.get("name"), Some(&FieldValue::Text("Basement".into())));
        assert_eq!(row.get("temperature"), Some(&FieldValue::Float(21.5)));
        assert_eq!(row.get("humidity"), Some(&FieldValue::Float(48.0)));
        assert_eq!(row.get("dew_point"), Some(&FieldValue::Float(11.1)));
    }

    #[test]
    fn th_sensor_row_in_fahrenheit() {
        let d = device("d1", "Basement", DeviceType::ThSensor);
        let row = row_for(
            &d,
            &DeviceState::ThSensor(th_state(21.5, 48.0)),
            TemperatureUnit::Fahrenheit,
        );

        assert_eq!(row.get("temperature"), Some(&FieldValue::Float(70.7)));
        assert_eq!(row.get("humidity"), Some(&FieldValue::Float(48.0)));
        assert_eq!(row.get("dew_point"), Some(&FieldValue::Float(52.0)));
    }

    #[test]
    fn other_rows_start_with_name() {
        let d = device("d9", "Garage", DeviceType::Lock);
        let state = DeviceState::Lock(LockState {
            state: "locked".into(),
            battery: 3,
            version: "0a01".into(),
            tz: 0,
        });
        let row = row_for(&d, &state, TemperatureUnit::Celsius);
        assert_eq!(row.to_string(), "name=Garage state=locked battery=3");
    }

    // --- sweep ---------------------------------------------------------------

    const TOKEN_PATH: &str = "/token";
    const API_PATH: &str = "/api";

    fn envelope(method: &str, data: Value) -> Value {
        json!({"time": 1, "method": method, "msgid": "m", "code": "000000", "data": data})
    }

    fn th_data(id: &str, temperature: f64, humidity: f64) -> Value {
        json!({
            "state": {
                "online": true, "state": "normal", "battery": "4",
                "temperature": temperature, "humidity": humidity,
                "tempLimit": {"max": 30, "min": 0}, "humidityLimit": 10.0,
                "tempCorrection": 0.0, "humidityCorrection": 0.0, "version": "0101"
            },
            "reportAt": "2024-01-01T00:00:00Z",
            "deviceId": id
        })
    }

    async fn yolink_server() -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "a1", "refresh_token": "r1", "expires_in": 7200
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(API_PATH))
            .and(body_partial_json(json!({"method": "Home.getDeviceList"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
                "Home.getDeviceList",
                json!({"devices": [
                    {"deviceId": "d1", "deviceUDID": "u1", "token": "t1", "name": "Basement", "type": "THSensor"},
                    {"deviceId": "d2", "deviceUDID": "u2", "token": "t2", "name": "Front door", "type": "DoorSensor"},
                    {"deviceId": "d3", "deviceUDID": "u3", "token": "t3", "name": "Attic", "type": "THSensor"},
                    {"deviceId": "d4", "deviceUDID": "u4", "token": "t4", "name": "Thumb", "type": "Finger"}
                ]}),
            )))
            .mount(&server)
            .await;

        server
    }

    async fn mount_th(server: &MockServer, id: &str, temperature: f64, humidity: f64) {
        Mock::given(method("POST"))
            .and(path(API_PATH))
            .and(body_partial_json(json!({"method": "THSensor.getState", "targetDevice": id})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(envelope("THSensor.getState", th_data(id, temperature, humidity))),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    fn service(server: &MockServer, poll_types: PollTypes) -> PollService<MemorySink> {
        let yolink = YoLinkClient::with_clock(
            &format!("{}{TOKEN_PATH}", server.uri()),
            &format!("{}{API_PATH}", server.uri()),
            &AccountCredentials {
                user_id: "uid".into(),
                user_key: "key".into(),
            },
            Arc::new(ManualClock::new(1_700_000_000)),
            None,
        );
        PollService::new(yolink, MemorySink::default(), poll_types, TemperatureUnit::Celsius)
    }

    #[tokio::test]
    async fn sweep_saves_selected_types_in_listing_order() {
        let server = yolink_server().await;
        mount_th(&server, "d1", 21.5, 48.0).await;
        mount_th(&server, "d3", 25.0, 50.0).await;

        let mut svc = service(&server, PollTypes::Only(vec![DeviceType::ThSensor]));
        assert_eq!(svc.run_once().await.unwrap(), 2);

        let rows = &svc.sink().rows;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|(category, _)| category == "THSensor"));
        assert_eq!(rows[0].1.to_string(), "name=Basement temperature=21.5 humidity=48.0 dew_point=11.1");
        assert_eq!(rows[1].1.to_string(), "name=Attic temperature=25.0 humidity=50.0 dew_point=15.0");
    }

    #[tokio::test]
    async fn sweep_skips_types_without_decoder() {
        let server = yolink_server().await;
        mount_th(&server, "d1", 21.5, 48.0).await;
        mount_th(&server, "d3", 25.0, 50.0).await;

        Mock::given(method("POST"))
            .and(path(API_PATH))
            .and(body_partial_json(json!({"method": "DoorSensor.getState"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
                "DoorSensor.getState",
                json!({
                    "state": {"online": true, "state": "closed", "battery": "3", "version": "0605"},
                    "reportAt": "2024-01-01T00:00:00Z",
                    "deviceId": "d2"
                }),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let mut svc = service(&server, PollTypes::All);
        assert_eq!(svc.run_once().await.unwrap(), 3);

        let categories: Vec<_> = svc.sink().rows.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(categories, ["THSensor", "THSensor", "DoorSensor"]);
    }

    #[tokio::test]
    async fn failing_device_aborts_the_sweep() {
        let server = yolink_server().await;

        Mock::given(method("POST"))
            .and(path(API_PATH))
            .and(body_partial_json(json!({"method": "THSensor.getState", "targetDevice": "d1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
                "THSensor.getState",
                json!({"state": {"online": true}, "deviceId": "d1"}),
            )))
            .mount(&server)
            .await;

        let mut svc = service(&server, PollTypes::Only(vec![DeviceType::ThSensor]));
        let err = svc.run_once().await.unwrap_err();

        assert!(format!("{err:#}").contains("missing required field 'state.state'"));
        assert!(svc.sink().rows.is_empty());
    }
}
