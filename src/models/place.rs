//! Saved stargazing spots and their durable score projection.

use serde::{Deserialize, Serialize};

/// A saved stargazing spot.
///
/// Places are value objects: once created they are only replaced wholesale,
/// never mutated in place. `id` is a UUID string assigned at creation and is
/// the key for every per-place structure in the crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bortle: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Creation instant, epoch milliseconds.
    pub created_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl Place {
    pub fn has_notes(&self) -> bool {
        self.notes
            .as_deref()
            .map(|n| !n.trim().is_empty())
            .unwrap_or(false)
    }
}

/// User-supplied fields for a new place; id, creation time and owning device
/// are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceDraft {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub bortle: Option<u8>,
    pub notes: Option<String>,
}

/// Durable projection of the latest score attached to a place document.
///
/// Valid iff `updated_at_ms > 0`; an invalid value means the place has never
/// been scored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComputedFields {
    pub score: i64,
    pub window_start_ms: i64,
    pub window_end_ms: i64,
    pub clear_pct: u8,
    pub moon_pct: u8,
    pub updated_at_ms: i64,
}

impl ComputedFields {
    pub fn is_valid(&self) -> bool {
        self.updated_at_ms > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_computed_fields_validity() {
        let mut fields = ComputedFields {
            score: 70,
            window_start_ms: 1,
            window_end_ms: 2,
            clear_pct: 80,
            moon_pct: 10,
            updated_at_ms: 0,
        };
        assert!(!fields.is_valid());
        fields.updated_at_ms = 1;
        assert!(fields.is_valid());
    }

    #[test]
    fn test_has_notes_ignores_whitespace() {
        let mut place = Place {
            id: "a".into(),
            name: "Ridge".into(),
            lat: 0.0,
            lon: 0.0,
            bortle: None,
            notes: Some("   ".into()),
            created_at_ms: 0,
            device_id: None,
        };
        assert!(!place.has_notes());
        place.notes = Some("dark horizon".into());
        assert!(place.has_notes());
    }
}
