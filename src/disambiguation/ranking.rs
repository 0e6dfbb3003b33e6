//! Population/type ranking shared by the geographic strategies.

use crate::config::DisambiguationConfig;
use crate::models::{Location, LocationType};

/// Population used for ranking; cities get `city_population_weight`.
pub fn weighted_population(location: &Location, config: &DisambiguationConfig) -> f64 {
    let population = location.population_or_zero() as f64;
    if location.location_type() == LocationType::City {
        population * config.city_population_weight
    } else {
        population
    }
}

/// Pick one location out of a preselection.
///
/// A continent wins outright. Otherwise locations containing another
/// preselected location are dropped (the nested one is more specific), and
/// the highest weighted population wins; ties go to the earlier candidate.
pub fn select_location<'a>(preselection: &[&'a Location], config: &DisambiguationConfig) -> Option<&'a Location> {
    if let Some(continent) = preselection
        .iter()
        .find(|l| l.location_type() == LocationType::Continent)
    {
        return Some(*continent);
    }

    let mut remaining: Vec<&Location> = preselection
        .iter()
        .copied()
        .filter(|l| !preselection.iter().any(|other| other.descendant_of(l)))
        .collect();

    // stable, so equal populations keep retrieval order
    remaining.sort_by(|a, b| {
        weighted_population(b, config)
            .partial_cmp(&weighted_population(a, config))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    remaining.first().copied()
}
