//! Static registry of monitored cities.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KnownRegion {
    pub region: &'static str,
    pub district: &'static str,
    pub state: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

pub const KNOWN_REGIONS: [KnownRegion; 8] = [
    KnownRegion {
        region: "Pune",
        district: "Pune",
        state: "Maharashtra",
        latitude: 18.5204,
        longitude: 73.8567,
    },
    KnownRegion {
        region: "Mumbai",
        district: "Mumbai",
        state: "Maharashtra",
        latitude: 19.0760,
        longitude: 72.8777,
    },
    KnownRegion {
        region: "Delhi",
        district: "New Delhi",
        state: "Delhi",
        latitude: 28.6139,
        longitude: 77.2090,
    },
    KnownRegion {
        region: "Bangalore",
        district: "Bangalore Urban",
        state: "Karnataka",
        latitude: 12.9716,
        longitude: 77.5946,
    },
    KnownRegion {
        region: "Chennai",
        district: "Chennai",
        state: "Tamil Nadu",
        latitude: 13.0827,
        longitude: 80.2707,
    },
    KnownRegion {
        region: "Nagpur",
        district: "Nagpur",
        state: "Maharashtra",
        latitude: 21.1458,
        longitude: 79.0882,
    },
    KnownRegion {
        region: "Hyderabad",
        district: "Hyderabad",
        state: "Telangana",
        latitude: 17.3850,
        longitude: 78.4867,
    },
    KnownRegion {
        region: "Kolkata",
        district: "Kolkata",
        state: "West Bengal",
        latitude: 22.5726,
        longitude: 88.3639,
    },
];

/// Case-insensitive lookup by region name.
pub fn find_region(name: &str) -> Option<&'static KnownRegion> {
    let name = name.trim();
    KNOWN_REGIONS.iter().find(|r| r.region.eq_ignore_ascii_case(name))
}

/// Registry entries restricted to `names` (all entries when `None`).
/// Unknown names are dropped.
pub fn select_regions(names: Option<&[String]>) -> Vec<&'static KnownRegion> {
    match names {
        None => KNOWN_REGIONS.iter().collect(),
        Some(names) => KNOWN_REGIONS
            .iter()
            .filter(|r| names.iter().any(|n| r.region.eq_ignore_ascii_case(n.trim())))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let delhi = find_region("delhi").unwrap();
        assert_eq!(delhi.district, "New Delhi");
        assert!(find_region("Atlantis").is_none());
    }

    #[test]
    fn selection_filters_registry() {
        assert_eq!(select_regions(None).len(), 8);
        let names = vec!["Pune".to_string(), "kolkata".to_string(), "Nowhere".to_string()];
        let picked: Vec<_> = select_regions(Some(&names)).iter().map(|r| r.region).collect();
        assert_eq!(picked, vec!["Pune", "Kolkata"]);
    }

    #[test]
    fn registry_entries_are_distinct_indian_cities() {
        for (i, a) in KNOWN_REGIONS.iter().enumerate() {
            assert!((6.0..38.0).contains(&a.latitude), "{} latitude", a.region);
            assert!((68.0..98.0).contains(&a.longitude), "{} longitude", a.region);
            for b in &KNOWN_REGIONS[i + 1..] {
                assert_ne!(a.region, b.region);
            }
        }
        let bangalore = find_region("Bangalore").unwrap();
        assert_eq!((bangalore.district, bangalore.state), ("Bangalore Urban", "Karnataka"));
        assert_eq!(bangalore.latitude, 12.9716);
    }
}
