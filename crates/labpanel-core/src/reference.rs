//! Beam reference persistence.
//!
//! A reference is the target position and size of a beam on one camera image
//! attribute. References are stored as free properties of the `LaserCamera`
//! object in the device database, one property per `(device, attribute)`
//! pair, encoded as `x=<f>:y=<f>:h=<f>:v=<f>` with two decimals.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::bus::DeviceBus;
use crate::error::{AppResult, PanelError};

/// Database object holding the references and the camera name.
pub const REFERENCE_OBJECT: &str = "LaserCamera";

static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"x=(\d+\.\d+):y=(\d+\.\d+):h=(\d+\.\d+):v=(\d+\.\d+)")
        .expect("Invalid reference regex")
});

/// Target beam position (`x`, `y`) and size (`h`, `v`) in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Reference {
    pub x: f64,
    pub y: f64,
    pub h: f64,
    pub v: f64,
}

impl Reference {
    pub fn new(x: f64, y: f64, h: f64, v: f64) -> Self {
        Self { x, y, h, v }
    }

    /// Property encoding, two decimals per field.
    pub fn encode(&self) -> String {
        format!(
            "x={:.2}:y={:.2}:h={:.2}:v={:.2}",
            self.x, self.y, self.h, self.v
        )
    }

    /// Parse the property encoding. Returns `None` for malformed input.
    pub fn decode(text: &str) -> Option<Self> {
        let caps = REFERENCE_PATTERN.captures(text)?;
        let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<f64>().ok());
        Some(Self {
            x: field(1)?,
            y: field(2)?,
            h: field(3)?,
            v: field(4)?,
        })
    }
}

/// Property key of a reference.
pub fn property_key(device: &str, attribute: &str) -> String {
    format!("{}:{}", device, attribute.to_lowercase())
}

/// References of one camera, keyed by lower-cased attribute name.
///
/// An attribute without a stored reference maps to `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceStore {
    device: String,
    entries: BTreeMap<String, Option<Reference>>,
}

impl ReferenceStore {
    /// Empty store for the given attributes.
    pub fn new<I, S>(device: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            device: device.into(),
            entries: attributes
                .into_iter()
                .map(|a| (a.as_ref().to_lowercase(), None))
                .collect(),
        }
    }

    /// Load stored references of `attributes` from the database.
    ///
    /// Malformed entries are logged and treated as missing.
    pub fn load<I, S>(bus: &dyn DeviceBus, device: &str, attributes: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut store = Self::new(device, attributes);
        let keys: Vec<String> = store.entries.keys().cloned().collect();
        for attr in keys {
            let key = property_key(device, &attr);
            let values = bus.get_property(REFERENCE_OBJECT, &key)?;
            tracing::debug!(property = %key, ?values, "Loaded reference property");
            let parsed = values.first().and_then(|v| {
                let r = Reference::decode(v);
                if r.is_none() {
                    tracing::warn!(property = %key, value = %v, "Malformed reference property");
                }
                r
            });
            store.entries.insert(attr, parsed);
        }
        Ok(store)
    }

    /// Persist every defined reference.
    ///
    /// With `dry_run` the properties are only logged.
    pub fn save(&self, bus: &dyn DeviceBus, dry_run: bool) -> AppResult<()> {
        for (attr, reference) in &self.entries {
            let Some(reference) = reference else { continue };
            let key = property_key(&self.device, attr);
            let value = reference.encode();
            if dry_run {
                tracing::info!("Setting property '{}' to '{}'", key, value);
            } else {
                bus.put_property(REFERENCE_OBJECT, &key, vec![value])
                    .map_err(PanelError::from)?;
            }
        }
        Ok(())
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Reference of `attribute` (case-insensitive).
    pub fn get(&self, attribute: &str) -> Option<Reference> {
        self.entries.get(&attribute.to_lowercase()).copied().flatten()
    }

    pub fn set(&mut self, attribute: &str, reference: Option<Reference>) {
        self.entries.insert(attribute.to_lowercase(), reference);
    }

    /// Known attributes, lower-cased and sorted.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip_to_two_decimals() {
        let original = Reference::new(51.234, 60.0, 23.5551, 19.999);
        let decoded = Reference::decode(&original.encode()).unwrap();
        for (a, b) in [
            (original.x, decoded.x),
            (original.y, decoded.y),
            (original.h, decoded.h),
            (original.v, decoded.v),
        ] {
            assert!((a - b).abs() <= 0.005 + 1e-9, "{} vs {}", a, b);
        }
        assert_eq!(original.encode(), "x=51.23:y=60.00:h=23.56:v=20.00");
    }

    #[test]
    fn decode_rejects_malformed_text() {
        assert_eq!(Reference::decode("x=1:y=2:h=3:v=4"), None);
        assert_eq!(Reference::decode(""), None);
        assert_eq!(
            Reference::decode("x=1.00:y=2.00:h=3.00:v=4.00"),
            Some(Reference::new(1.0, 2.0, 3.0, 4.0))
        );
    }

    #[test]
    fn decode_finds_reference_inside_longer_text() {
        assert!(REFERENCE_PATTERN.is_match("x=1.00:y=2.00:h=3.00:v=4.00"));
        assert_eq!(
            Reference::decode("ref x=1.50:y=2.00:h=3.00:v=4.25 saved"),
            Some(Reference::new(1.5, 2.0, 3.0, 4.25))
        );
    }

    #[test]
    fn keys_are_lower_cased() {
        assert_eq!(property_key("lab/cam/1", "Image_00"), "lab/cam/1:image_00");
        let mut store = ReferenceStore::new("lab/cam/1", ["Image_00"]);
        store.set("IMAGE_00", Some(Reference::default()));
        assert_eq!(store.get("image_00"), Some(Reference::default()));
        assert_eq!(store.attributes().collect::<Vec<_>>(), vec!["image_00"]);
    }
}
