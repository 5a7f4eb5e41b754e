use std::collections::BTreeMap;

use serde_json::Value;

use super::{
    decode::{Fields, Scoped},
    models::{DeviceType, Method},
    registry::Decode,
};
use crate::error::DecodeError;

/// One physical device as listed by `Home.getDeviceList`.
///
/// `token` is the device's net token, required whenever a message targets
/// this unit. It is unrelated to the account's bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub device_id: String,
    pub device_uuid: String,
    pub token: String,
    pub name: String,
    pub device_type: DeviceType,
}

impl Device {
    fn decode_entry(entry: &Scoped<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            device_id: entry.string("deviceId")?,
            device_uuid: entry.string("deviceUDID")?,
            token: entry.string("token")?,
            name: entry.string("name")?,
            device_type: DeviceType::from_tag(&entry.string("type")?),
        })
    }
}

/// Payload of `Home.getDeviceList`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceList {
    pub devices: Vec<Device>,
}

impl Decode for DeviceList {
    const METHOD: Method = Method::HomeGetDeviceList;

    fn decode(data: &Value) -> Result<Self, DecodeError> {
        let devices = Fields::new(Self::METHOD.as_str(), data)
            .elements("devices")?
            .iter()
            .map(Device::decode_entry)
            .collect::<Result<_, _>>()?;
        Ok(Self { devices })
    }
}

/// Group devices by type, keeping the listing order inside each group.
pub fn group_by_type(devices: &[Device]) -> BTreeMap<DeviceType, Vec<Device>> {
    let mut groups: BTreeMap<DeviceType, Vec<Device>> = BTreeMap::new();
    for device in devices {
        groups
            .entry(device.device_type.clone())
            .or_default()
            .push(device.clone());
    }
    groups
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn listing() -> Value {
        json!({
            "devices": [
                {"deviceId": "d1", "deviceUDID": "u1", "token": "t1", "name": "Basement", "type": "THSensor"},
                {"deviceId": "d2", "deviceUDID": "u2", "token": "t2", "name": "Front door", "type": "DoorSensor"},
                {"deviceId": "d3", "deviceUDID": "u3", "token": "t3", "name": "Attic", "type": "THSensor"},
                {"deviceId": "d4", "deviceUDID": "u4", "token": "t4", "name": "Thumb", "type": "Finger", "modelName": "YS1234"}
            ]
        })
    }

    #[test]
    fn decodes_every_entry() {
        let list = DeviceList::decode(&listing()).unwrap();
        assert_eq!(list.devices.len(), 4);
        assert_eq!(
            list.devices[0],
            Device {
                device_id: "d1".into(),
                device_uuid: "u1".into(),
                token: "t1".into(),
                name: "Basement".into(),
                device_type: DeviceType::ThSensor,
            }
        );
        assert_eq!(list.devices[3].device_type, DeviceType::Other("Finger".into()));
    }

    #[test]
    fn empty_listing_is_valid() {
        let list = DeviceList::decode(&json!({"devices": []})).unwrap();
        assert!(list.devices.is_empty());
    }

    #[test]
    fn missing_devices_array_errors() {
        let err = DeviceList::decode(&json!({})).unwrap_err();
        assert_eq!(err.path(), "devices");
    }

    #[test]
    fn missing_token_names_the_entry() {
        let data = json!({
            "devices": [
                {"deviceId": "d1", "deviceUDID": "u1", "token": "t1", "name": "a", "type": "Lock"},
                {"deviceId": "d2", "deviceUDID": "u2", "name": "b", "type": "Lock"}
            ]
        });
        let err = DeviceList::decode(&data).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Home.getDeviceList: missing required field 'devices.1.token'"
        );
    }

    #[test]
    fn group_by_type_keeps_listing_order() {
        let list = DeviceList::decode(&listing()).unwrap();
        let groups = group_by_type(&list.devices);
        assert_eq!(groups.len(), 3);
        let th: Vec<_> = groups[&DeviceType::ThSensor]
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(th, ["Basement", "Attic"]);
        assert_eq!(groups[&DeviceType::DoorSensor].len(), 1);
    }
}
