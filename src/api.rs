//! UI-facing projection types.
//!
//! These are the values the orchestrator emits for rendering; they carry no
//! behavior beyond stable string forms for the persisted filter/sort modes.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{Place, PlaceSkyState};

/// One row of the rendered place list.
#[derive(Debug, Clone, PartialEq)]
pub struct UiPlace {
    pub place: Place,
    pub sky: Option<PlaceSkyState>,
    pub distance_km: Option<f64>,
    pub is_primary: bool,
}

/// Status filter applied to the place list. Places with no computed state
/// are excluded from every filter except `All`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    All,
    Good,
    Ok,
    Poor,
}

impl Filter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Good => "good",
            Filter::Ok => "ok",
            Filter::Poor => "poor",
        }
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "good" => Ok(Filter::Good),
            "ok" => Ok(Filter::Ok),
            "poor" => Ok(Filter::Poor),
            _ => Err(format!("Unknown filter: {}", s)),
        }
    }
}

/// Sort order of the place list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sort {
    /// Score descending; unscored places last; name breaks ties.
    Score,
    /// Distance ascending; unknown distance last.
    Distance,
    /// Name ascending, case-insensitive.
    Name,
}

impl Sort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sort::Score => "score",
            Sort::Distance => "distance",
            Sort::Name => "name",
        }
    }
}

impl FromStr for Sort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "score" => Ok(Sort::Score),
            "distance" => Ok(Sort::Distance),
            "name" => Ok(Sort::Name),
            _ => Err(format!("Unknown sort: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_round_trips_through_str() {
        for filter in [Filter::All, Filter::Good, Filter::Ok, Filter::Poor] {
            assert_eq!(filter.as_str().parse::<Filter>().unwrap(), filter);
        }
        assert!("invalid".parse::<Filter>().is_err());
    }

    #[test]
    fn test_sort_round_trips_through_str() {
        for sort in [Sort::Score, Sort::Distance, Sort::Name] {
            assert_eq!(sort.as_str().parse::<Sort>().unwrap(), sort);
        }
        assert!("invalid".parse::<Sort>().is_err());
    }
}
