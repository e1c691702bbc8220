//! Filtered, sorted UI projection of the place list.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::api::{Filter, Sort, UiPlace};
use crate::models::{Place, PlaceSkyState, SkyStatus};

pub(crate) fn project(
    places: &[Place],
    sky_states: &HashMap<String, PlaceSkyState>,
    distances: &HashMap<String, f64>,
    primary_place: Option<&str>,
    filter: Filter,
    sort: Sort,
) -> Vec<UiPlace> {
    let mut models: Vec<UiPlace> = places
        .iter()
        .filter_map(|place| {
            let sky = sky_states.get(&place.id).cloned();
            if !passes_filter(filter, sky.as_ref()) {
                return None;
            }
            Some(UiPlace {
                sky,
                distance_km: distances.get(&place.id).copied(),
                is_primary: primary_place == Some(place.id.as_str()),
                place: place.clone(),
            })
        })
        .collect();
    sort_models(&mut models, sort);
    models
}

fn passes_filter(filter: Filter, sky: Option<&PlaceSkyState>) -> bool {
    let wanted = match filter {
        Filter::All => return true,
        Filter::Good => SkyStatus::Good,
        Filter::Ok => SkyStatus::Ok,
        Filter::Poor => SkyStatus::Poor,
    };
    // Unscored places only ever appear under the All filter.
    sky.map(|s| s.status == wanted).unwrap_or(false)
}

fn sort_models(models: &mut [UiPlace], sort: Sort) {
    match sort {
        Sort::Score => models.sort_by(|a, b| {
            let score_a = a.sky.as_ref().map(|s| s.score).unwrap_or(-1);
            let score_b = b.sky.as_ref().map(|s| s.score).unwrap_or(-1);
            score_b
                .cmp(&score_a)
                .then_with(|| name_order(&a.place, &b.place))
        }),
        Sort::Distance => models.sort_by(|a, b| {
            let dist_a = a.distance_km.unwrap_or(f64::MAX);
            let dist_b = b.distance_km.unwrap_or(f64::MAX);
            dist_a.total_cmp(&dist_b)
        }),
        Sort::Name => models.sort_by(|a, b| name_order(&a.place, &b.place)),
    }
}

fn name_order(a: &Place, b: &Place) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}
