use serde::{Deserialize, Serialize};

use crate::errors::FieldError;

pub const NAME_MAX_LEN: usize = 200;
pub const CONTENT_MAX_LEN: usize = 5000;
pub const USAGE_MAX_LEN: usize = 200;

/// Which of a monster's four embedded arrays a feature belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureCategory {
    Traits,
    Actions,
    Reactions,
    LegendaryActions,
}

impl FeatureCategory {
    /// Category order used when flattening a monster's embedded arrays into
    /// a single `FeatureIds` sequence.
    pub const ALL: [FeatureCategory; 4] = [
        FeatureCategory::Traits,
        FeatureCategory::Actions,
        FeatureCategory::Reactions,
        FeatureCategory::LegendaryActions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureCategory::Traits => "Traits",
            FeatureCategory::Actions => "Actions",
            FeatureCategory::Reactions => "Reactions",
            FeatureCategory::LegendaryActions => "LegendaryActions",
        }
    }
}

/// A reusable trait/action/reaction/legendary-action definition, stored as
/// its own document so several monsters can reference it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Content")]
    pub content: String,
    /// Free-text recharge/cost annotation, e.g. "Recharge 5-6".
    #[serde(rename = "Usage", default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    #[serde(rename = "Category")]
    pub category: FeatureCategory,
}

impl Feature {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut fields = Vec::new();

        if self.name.is_empty() {
            fields.push(FieldError::new("Name", "Name is required"));
        } else if self.name.chars().count() > NAME_MAX_LEN {
            fields.push(FieldError::new("Name", "Name too long"));
        }

        if self.content.is_empty() {
            fields.push(FieldError::new("Content", "Description is required"));
        } else if self.content.chars().count() > CONTENT_MAX_LEN {
            fields.push(FieldError::new("Content", "Content too long"));
        }

        if let Some(usage) = &self.usage {
            if usage.chars().count() > USAGE_MAX_LEN {
                fields.push(FieldError::new("Usage", "Usage too long"));
            }
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(fields)
        }
    }
}

/// A stored feature together with its document id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureWithId {
    pub id: String,
    #[serde(flatten)]
    pub feature: Feature,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(name: &str, content: &str) -> Feature {
        Feature {
            name: name.to_string(),
            content: content.to_string(),
            usage: None,
            category: FeatureCategory::Traits,
        }
    }

    #[test]
    fn valid_feature_passes() {
        assert!(feature("Keen Smell", "Advantage on Perception checks that rely on smell.")
            .validate()
            .is_ok());
    }

    #[test]
    fn empty_name_and_content_are_reported_per_field() {
        let errors = feature("", "").validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["Name", "Content"]);
    }

    #[test]
    fn overlong_usage_is_rejected() {
        let mut f = feature("Bite", "Melee weapon attack.");
        f.usage = Some("x".repeat(USAGE_MAX_LEN + 1));
        let errors = f.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "Usage");
    }

    #[test]
    fn category_serializes_to_wire_names() {
        for category in FeatureCategory::ALL {
            let value = serde_json::to_value(category).unwrap();
            assert_eq!(value, serde_json::Value::String(category.as_str().to_string()));
        }
    }
}
