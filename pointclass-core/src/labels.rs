//! Class label catalog and ASPRS code translation
//!
//! Internally every class is identified by its position in a [`LabelCatalog`]
//! (the "training code"). Persisted point clouds use ASPRS classification
//! codes instead; the catalog owns the translation tables between the two.

use crate::{point::Color, Error, Result};
use serde::{Deserialize, Serialize};

/// Training code of a point whose ASPRS code has no class in the catalog
pub const LABEL_UNASSIGNED: u8 = 255;

/// Training code of a point that carries the ASPRS "unclassified" code
pub const LABEL_UNCLASSIFIED: u8 = 254;

/// ASPRS code for points that were created but never classified
pub const ASPRS_CREATED: u8 = 0;

/// ASPRS code for unclassified points
pub const ASPRS_UNCLASSIFIED: u8 = 1;

/// A single class definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    name: String,
    asprs_code: u8,
    color: Color,
}

impl Label {
    pub fn new(name: impl Into<String>, asprs_code: u8, color: Color) -> Self {
        Self {
            name: name.into(),
            asprs_code,
            color,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn asprs_code(&self) -> u8 {
        self.asprs_code
    }

    pub fn color(&self) -> Color {
        self.color
    }
}

/// Ordered list of class definitions; the index of a label is its training code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCatalog {
    labels: Vec<Label>,
}

impl LabelCatalog {
    /// Build a catalog, rejecting empty lists, lists that would collide with
    /// the reserved training codes, and duplicate ASPRS codes
    pub fn new(labels: Vec<Label>) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::InvalidData("label catalog must not be empty".to_string()));
        }

        if labels.len() > LABEL_UNCLASSIFIED as usize {
            return Err(Error::InvalidData(format!(
                "label catalog holds {} classes, at most {} are supported",
                labels.len(),
                LABEL_UNCLASSIFIED
            )));
        }

        let mut seen = [false; 256];
        for label in &labels {
            let code = label.asprs_code as usize;
            if seen[code] {
                return Err(Error::InvalidData(format!(
                    "duplicate ASPRS code {} in label catalog",
                    code
                )));
            }
            seen[code] = true;
        }

        Ok(Self { labels })
    }

    /// The default set of trainable classes
    pub fn training() -> Self {
        Self {
            labels: vec![
                Label::new("ground", 2, Color::new(166, 97, 61)),
                Label::new("low_vegetation", 3, Color::new(0, 255, 0)),
                Label::new("medium_vegetation", 4, Color::new(0, 204, 0)),
                Label::new("high_vegetation", 5, Color::new(0, 153, 0)),
                Label::new("building", 6, Color::new(255, 153, 0)),
                Label::new("low_point", 7, Color::new(255, 0, 0)),
                Label::new("water", 9, Color::new(0, 0, 255)),
                Label::new("rail", 10, Color::new(128, 64, 0)),
                Label::new("road_surface", 11, Color::new(128, 128, 128)),
                Label::new("wire_guard", 13, Color::new(255, 255, 0)),
                Label::new("wire_conductor", 14, Color::new(255, 204, 0)),
                Label::new("transmission_tower", 15, Color::new(204, 0, 204)),
                Label::new("bridge_deck", 17, Color::new(153, 102, 51)),
                Label::new("high_noise", 18, Color::new(255, 0, 255)),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, class: usize) -> Option<&Label> {
        self.labels.get(class)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Label> {
        self.labels.iter()
    }

    /// Names in training code order
    pub fn names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }

    /// Lookup table from ASPRS code to training code
    ///
    /// ASPRS 0 and 1 map to [`LABEL_UNCLASSIFIED`] unless the catalog
    /// defines a class for them, every other unknown code maps to
    /// [`LABEL_UNASSIGNED`].
    pub fn asprs_to_train_codes(&self) -> [u8; 256] {
        let mut table = [LABEL_UNASSIGNED; 256];
        table[ASPRS_CREATED as usize] = LABEL_UNCLASSIFIED;
        table[ASPRS_UNCLASSIFIED as usize] = LABEL_UNCLASSIFIED;

        for (class, label) in self.labels.iter().enumerate() {
            table[label.asprs_code as usize] = class as u8;
        }
        table
    }

    /// Lookup table from training code back to ASPRS code
    pub fn train_to_asprs_codes(&self) -> [u8; 256] {
        let mut table = [ASPRS_CREATED; 256];
        table[LABEL_UNCLASSIFIED as usize] = ASPRS_UNCLASSIFIED;

        for (class, label) in self.labels.iter().enumerate() {
            table[class] = label.asprs_code;
        }
        table
    }

    /// Translate a sequence of ASPRS codes into training codes
    pub fn to_training_codes(&self, asprs: &[u8]) -> Vec<u8> {
        let table = self.asprs_to_train_codes();
        asprs.iter().map(|&c| table[c as usize]).collect()
    }
}

impl Default for LabelCatalog {
    fn default() -> Self {
        Self::training()
    }
}
