//! REST mirror tier.
//!
//! Stateless HTTP access to the same logical place documents through a
//! Firestore-style document REST facade. Field values travel as typed
//! wrappers (`stringValue`, `doubleValue`, `integerValue`), one document per
//! place under `users/{device_id}/places/{place_id}`. Used only when the
//! primary tier fails.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::models::{ComputedFields, Place};

use super::document::{DocumentTier, PlaceDocument};
use super::error::{StoreError, StoreResult};

const COMPUTED_FIELD_PATHS: [&str; 6] = [
    "lastSkyScore",
    "lastWindowStart",
    "lastWindowEnd",
    "lastClearPct",
    "lastMoonPct",
    "lastUpdated",
];

/// Settings for the REST mirror.
#[derive(Debug, Clone)]
pub struct RestMirrorConfig {
    pub base_url: String,
    pub project_id: String,
    pub api_key: String,
}

pub struct RestMirror {
    client: reqwest::Client,
    config: RestMirrorConfig,
    device_id: String,
}

impl RestMirror {
    pub fn new(client: reqwest::Client, config: RestMirrorConfig, device_id: String) -> Self {
        Self {
            client,
            config,
            device_id,
        }
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/{}/databases/(default)/documents/users/{}/places",
            self.config.base_url.trim_end_matches('/'),
            self.config.project_id,
            self.device_id
        )
    }

    fn document_url(&self, place_id: &str) -> String {
        format!("{}/{}", self.collection_url(), place_id)
    }

    async fn check_status(response: reqwest::Response) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::http(
            status.as_u16(),
            truncate(&body, 200).to_string(),
        ))
    }
}

#[async_trait]
impl DocumentTier for RestMirror {
    async fn list(&self) -> StoreResult<Vec<PlaceDocument>> {
        let response = self
            .client
            .get(self.collection_url())
            .query(&[
                ("key", self.config.api_key.as_str()),
                ("orderBy", "fields.createdAt desc"),
            ])
            .send()
            .await?;
        // A missing collection is an empty place list, not a failure.
        if response.status().as_u16() == 404 {
            return Ok(Vec::new());
        }
        let response = Self::check_status(response).await?;
        let body: Value = response.json().await.map_err(StoreError::from)?;

        let docs = body
            .get("documents")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(parse_document).collect())
            .unwrap_or_default();
        Ok(docs)
    }

    async fn get(&self, place_id: &str) -> StoreResult<Option<PlaceDocument>> {
        let response = self
            .client
            .get(self.document_url(place_id))
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let response = Self::check_status(response).await?;
        let body: Value = response.json().await.map_err(StoreError::from)?;
        Ok(parse_document(&body))
    }

    async fn set(&self, doc: PlaceDocument) -> StoreResult<()> {
        let payload = json!({ "fields": encode_place_fields(&doc) });
        let response = self
            .client
            .post(self.collection_url())
            .query(&[
                ("key", self.config.api_key.as_str()),
                ("documentId", doc.place.id.as_str()),
            ])
            .json(&payload)
            .send()
            .await?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn update_computed(&self, place_id: &str, fields: ComputedFields) -> StoreResult<()> {
        let payload = json!({ "fields": encode_computed_fields(&fields) });
        let mut query: Vec<(&str, &str)> = vec![("key", self.config.api_key.as_str())];
        for path in COMPUTED_FIELD_PATHS {
            query.push(("updateMask.fieldPaths", path));
        }
        let response = self
            .client
            .patch(self.document_url(place_id))
            .query(&query)
            .json(&payload)
            .send()
            .await?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn delete(&self, place_id: &str) -> StoreResult<()> {
        let response = self
            .client
            .delete(self.document_url(place_id))
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await?;
        Self::check_status(response).await.map(|_| ())
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

fn double_value(value: f64) -> Value {
    json!({ "doubleValue": value })
}

fn integer_value(value: i64) -> Value {
    // Firestore integers travel as strings.
    json!({ "integerValue": value.to_string() })
}

fn encode_place_fields(doc: &PlaceDocument) -> Value {
    let place = &doc.place;
    let mut fields = Map::new();
    fields.insert("id".into(), string_value(&place.id));
    fields.insert("name".into(), string_value(&place.name));
    fields.insert("lat".into(), double_value(place.lat));
    fields.insert("lon".into(), double_value(place.lon));
    fields.insert("createdAt".into(), integer_value(place.created_at_ms));
    if let Some(device_id) = &place.device_id {
        fields.insert("deviceId".into(), string_value(device_id));
    }
    if let Some(bortle) = place.bortle {
        fields.insert("bortle".into(), integer_value(i64::from(bortle)));
    }
    if let Some(notes) = place.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        fields.insert("notes".into(), string_value(notes));
    }
    if let Some(computed) = &doc.computed {
        if let Value::Object(extra) = encode_computed_fields(computed) {
            fields.extend(extra);
        }
    }
    Value::Object(fields)
}

fn encode_computed_fields(fields: &ComputedFields) -> Value {
    json!({
        "lastSkyScore": integer_value(fields.score),
        "lastWindowStart": integer_value(fields.window_start_ms),
        "lastWindowEnd": integer_value(fields.window_end_ms),
        "lastClearPct": integer_value(i64::from(fields.clear_pct)),
        "lastMoonPct": integer_value(i64::from(fields.moon_pct)),
        "lastUpdated": integer_value(fields.updated_at_ms),
    })
}

fn parse_document(doc: &Value) -> Option<PlaceDocument> {
    let fields = doc.get("fields")?.as_object()?;
    let id = doc
        .get("name")
        .and_then(Value::as_str)
        .and_then(|name| name.rsplit('/').next())
        .or_else(|| read_str(fields, "id"))?
        .to_string();

    let place = Place {
        id,
        name: read_str(fields, "name").unwrap_or_default().to_string(),
        lat: read_f64(fields, "lat").unwrap_or(0.0),
        lon: read_f64(fields, "lon").unwrap_or(0.0),
        bortle: read_i64(fields, "bortle").map(|v| v.clamp(0, 255) as u8),
        notes: read_str(fields, "notes")
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        created_at_ms: read_i64(fields, "createdAt").unwrap_or(0),
        device_id: read_str(fields, "deviceId").map(str::to_string),
    };
    Some(PlaceDocument {
        place,
        computed: parse_computed_fields(fields),
    })
}

fn parse_computed_fields(fields: &Map<String, Value>) -> Option<ComputedFields> {
    let updated_at_ms = read_i64(fields, "lastUpdated").unwrap_or(0);
    if updated_at_ms <= 0 {
        return None;
    }
    Some(ComputedFields {
        score: read_i64(fields, "lastSkyScore").unwrap_or(0),
        window_start_ms: read_i64(fields, "lastWindowStart").unwrap_or(0),
        window_end_ms: read_i64(fields, "lastWindowEnd").unwrap_or(0),
        clear_pct: read_i64(fields, "lastClearPct").unwrap_or(0).clamp(0, 100) as u8,
        moon_pct: read_i64(fields, "lastMoonPct").unwrap_or(0).clamp(0, 100) as u8,
        updated_at_ms,
    })
}

fn read_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key)?.get("stringValue")?.as_str()
}

fn read_f64(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = fields.get(key)?;
    if let Some(v) = value.get("doubleValue").and_then(Value::as_f64) {
        return Some(v);
    }
    read_integer(value).map(|v| v as f64)
}

fn read_i64(fields: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = fields.get(key)?;
    if let Some(v) = read_integer(value) {
        return Some(v);
    }
    value.get("doubleValue").and_then(Value::as_f64).map(|v| v as i64)
}

fn read_integer(value: &Value) -> Option<i64> {
    let raw = value.get("integerValue")?;
    match raw {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> PlaceDocument {
        PlaceDocument {
            place: Place {
                id: "p1".into(),
                name: "Pinnacles Overlook".into(),
                lat: 36.4906,
                lon: -121.1825,
                bortle: Some(3),
                notes: Some("  bring layers  ".into()),
                created_at_ms: 1_700_000_000_000,
                device_id: Some("device-1".into()),
            },
            computed: Some(ComputedFields {
                score: 82,
                window_start_ms: 1_700_000_100_000,
                window_end_ms: 1_700_003_700_000,
                clear_pct: 90,
                moon_pct: 12,
                updated_at_ms: 1_700_000_050_000,
            }),
        }
    }

    #[test]
    fn test_place_fields_round_trip() {
        let doc = sample_doc();
        let wire = json!({
            "name": "projects/demo/databases/(default)/documents/users/d/places/p1",
            "fields": encode_place_fields(&doc),
        });
        let parsed = parse_document(&wire).unwrap();
        let mut expected = doc;
        // Notes are trimmed on the way out.
        expected.place.notes = Some("bring layers".into());
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_integer_values_travel_as_strings() {
        let encoded = integer_value(1_700_000_000_000);
        assert_eq!(
            encoded.get("integerValue").and_then(Value::as_str),
            Some("1700000000000")
        );
    }

    #[test]
    fn test_unscored_document_has_no_computed_fields() {
        let mut doc = sample_doc();
        doc.computed = None;
        let wire = json!({
            "name": "x/places/p1",
            "fields": encode_place_fields(&doc),
        });
        assert_eq!(parse_document(&wire).unwrap().computed, None);
    }

    #[test]
    fn test_parse_tolerates_missing_optional_fields() {
        let wire = json!({
            "name": "x/places/p9",
            "fields": {
                "name": {"stringValue": "Bare"},
                "lat": {"doubleValue": 1.0},
                "lon": {"doubleValue": 2.0},
                "createdAt": {"integerValue": "5"}
            }
        });
        let parsed = parse_document(&wire).unwrap();
        assert_eq!(parsed.place.id, "p9");
        assert_eq!(parsed.place.bortle, None);
        assert_eq!(parsed.place.notes, None);
        assert_eq!(parsed.computed, None);
    }
}
