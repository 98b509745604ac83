//! Records flowing in and out of a batch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named binary attachment. `data` travels base64-encoded in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryData {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    #[serde(default)]
    pub file_size: u64,
}

impl BinaryData {
    pub fn new(data: Vec<u8>, file_name: Option<&str>) -> BinaryData {
        let file_extension = file_name
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
            .map(str::to_owned);
        BinaryData {
            file_size: data.len() as u64,
            data,
            file_name: file_name.map(str::to_owned),
            file_extension,
        }
    }
}

/// One record: a JSON object plus zero or more binary attachments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub json: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub binary: BTreeMap<String, BinaryData>,
    /// Position of the input record an error record belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paired_item: Option<usize>,
}

impl Item {
    pub fn new(json: Map<String, Value>) -> Item {
        Item {
            json,
            ..Item::default()
        }
    }

    /// Wrap any serializable value; non-objects land under `data`.
    pub fn from_serialize<T: Serialize>(value: &T) -> Item {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Item::new(map),
            Ok(other) => {
                let mut map = Map::new();
                map.insert("data".to_owned(), other);
                Item::new(map)
            }
            Err(err) => Item::new(single("error", Value::String(err.to_string()))),
        }
    }

    /// `{ success: true }`
    pub fn success() -> Item {
        Item::new(single("success", Value::Bool(true)))
    }

    /// `{ error: <message> }` paired with the failing record.
    pub fn error<S: Into<String>>(message: S, index: usize) -> Item {
        Item {
            paired_item: Some(index),
            ..Item::new(single("error", Value::String(message.into())))
        }
    }

    pub fn is_error(&self) -> bool {
        self.json.contains_key("error")
    }
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_owned(), value);
    map
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn binary_travels_as_base64() {
        let mut item = Item::default();
        item.binary.insert(
            "data".to_owned(),
            BinaryData::new(b"hello".to_vec(), Some("hello.txt")),
        );
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["binary"]["data"]["data"], "aGVsbG8=");
        assert_eq!(value["binary"]["data"]["fileName"], "hello.txt");
        assert_eq!(value["binary"]["data"]["fileExtension"], "txt");
        assert_eq!(value["binary"]["data"]["fileSize"], 5);

        let back: Item = serde_json::from_value(value).unwrap();
        assert_eq!(back.binary["data"].data, b"hello");
    }

    #[test]
    fn error_record_shape() {
        let item = Item::error("550 not found", 2);
        assert!(item.is_error());
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({ "json": { "error": "550 not found" }, "pairedItem": 2 })
        );
    }

    #[test]
    fn success_record_shape() {
        assert_eq!(
            serde_json::to_value(Item::success()).unwrap(),
            json!({ "json": { "success": true } })
        );
    }

    #[test]
    fn minimal_input_record() {
        let item: Item = serde_json::from_str(r#"{ "json": { "name": "a" } }"#).unwrap();
        assert_eq!(item.json["name"], "a");
        assert!(item.binary.is_empty());
        assert_eq!(item.paired_item, None);
    }

    #[test]
    fn extension_requires_a_dot() {
        assert_eq!(BinaryData::new(vec![], Some("README")).file_extension, None);
        assert_eq!(BinaryData::new(vec![], None).file_name, None);
    }
}
