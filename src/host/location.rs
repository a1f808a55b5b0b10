//! City lookup for room locations

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

use crate::lobby::GameLocation;

pub const FALLBACK_CITY: &str = "New York";

/// Resolves a city name to a playable street location
pub trait LocationResolver {
    fn resolve(&self, city: &str) -> Option<GameLocation>;
}

/// Built-in list of popular cities
#[derive(Debug, Clone)]
pub struct CityDirectory {
    cities: Vec<GameLocation>,
}

fn city(name: &str, lat: f64, lng: f64) -> GameLocation {
    GameLocation {
        city: name.to_string(),
        lat,
        lng,
        heading: 0.0,
        pitch: 0.0,
    }
}

impl CityDirectory {
    pub fn popular() -> Self {
        Self {
            cities: vec![
                city("New York", 40.7128, -74.0060),
                city("London", 51.5074, -0.1278),
                city("Tokyo", 35.6762, 139.6503),
                city("Paris", 48.8566, 2.3522),
                city("Sydney", -33.8688, 151.2093),
                city("Los Angeles", 34.0522, -118.2437),
                city("Berlin", 52.5200, 13.4050),
                city("Rome", 41.9028, 12.4964),
                city("Barcelona", 41.3851, 2.1734),
                city("Amsterdam", 52.3676, 4.9041),
            ],
        }
    }

    pub fn cities(&self) -> &[GameLocation] {
        &self.cities
    }

    pub fn random_city<R: Rng + ?Sized>(&self, rng: &mut R) -> GameLocation {
        self.cities
            .choose(rng)
            .cloned()
            .unwrap_or_else(fallback_location)
    }
}

impl Default for CityDirectory {
    fn default() -> Self {
        Self::popular()
    }
}

impl LocationResolver for CityDirectory {
    fn resolve(&self, name: &str) -> Option<GameLocation> {
        let name = name.trim();
        self.cities
            .iter()
            .find(|c| c.city.eq_ignore_ascii_case(name))
            .cloned()
    }
}

pub fn fallback_location() -> GameLocation {
    city(FALLBACK_CITY, 40.7128, -74.0060)
}

/// Resolve `city`, falling back to New York when the lookup fails
pub fn resolve_or_fallback<R: LocationResolver + ?Sized>(resolver: &R, city: &str) -> GameLocation {
    resolver.resolve(city).unwrap_or_else(|| {
        warn!(city = %city, fallback = FALLBACK_CITY, "Location lookup failed, using fallback");
        fallback_location()
    })
}
