use serde::{Deserialize, Serialize};

use crate::errors::FieldError;

/// One entry of a monster's embedded category arrays: the projection of a
/// feature without its id or category (both implied by array membership).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "Usage", skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillOrSave {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Modifier")]
    pub modifier: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Abilities {
    #[serde(rename = "Str")]
    pub strength: i32,
    #[serde(rename = "Dex")]
    pub dexterity: i32,
    #[serde(rename = "Con")]
    pub constitution: i32,
    #[serde(rename = "Int")]
    pub intelligence: i32,
    #[serde(rename = "Wis")]
    pub wisdom: i32,
    #[serde(rename = "Cha")]
    pub charisma: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmorClass {
    #[serde(rename = "Value")]
    pub value: i32,
    #[serde(rename = "Notes", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitPoints {
    #[serde(rename = "Value")]
    pub value: i32,
    #[serde(rename = "Notes", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A monster stat block. `FeatureIds` is the authoritative list of feature
/// references; the four category arrays are derived from it and recomputed
/// wholesale on every structural change. Monsters that predate feature
/// normalization carry embedded arrays and no `FeatureIds` at all.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monster {
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Challenge")]
    pub challenge: String,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Abilities")]
    pub abilities: Abilities,
    #[serde(rename = "AC")]
    pub ac: ArmorClass,
    #[serde(rename = "HP")]
    pub hp: HitPoints,
    #[serde(rename = "Speed")]
    pub speed: Vec<String>,
    #[serde(rename = "Senses")]
    pub senses: Vec<String>,
    #[serde(rename = "Languages")]
    pub languages: Vec<String>,
    #[serde(rename = "Saves")]
    pub saves: Vec<SkillOrSave>,
    #[serde(rename = "Skills")]
    pub skills: Vec<SkillOrSave>,
    #[serde(rename = "DamageVulnerabilities")]
    pub damage_vulnerabilities: Vec<String>,
    #[serde(rename = "DamageResistances")]
    pub damage_resistances: Vec<String>,
    #[serde(rename = "DamageImmunities")]
    pub damage_immunities: Vec<String>,
    #[serde(rename = "ConditionImmunities")]
    pub condition_immunities: Vec<String>,
    #[serde(rename = "InitiativeModifier", skip_serializing_if = "Option::is_none")]
    pub initiative_modifier: Option<i32>,
    #[serde(rename = "InitiativeAdvantage", skip_serializing_if = "Option::is_none")]
    pub initiative_advantage: Option<bool>,
    #[serde(rename = "Player", skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    #[serde(rename = "ImageURL", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "Version", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "FeatureIds", skip_serializing_if = "Option::is_none")]
    pub feature_ids: Option<Vec<String>>,
    #[serde(rename = "Traits")]
    pub traits: Vec<FeatureEntry>,
    #[serde(rename = "Actions")]
    pub actions: Vec<FeatureEntry>,
    #[serde(rename = "Reactions")]
    pub reactions: Vec<FeatureEntry>,
    #[serde(rename = "LegendaryActions")]
    pub legendary_actions: Vec<FeatureEntry>,
}

impl Monster {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut fields = Vec::new();

        let scores = [
            ("Abilities.Str", self.abilities.strength),
            ("Abilities.Dex", self.abilities.dexterity),
            ("Abilities.Con", self.abilities.constitution),
            ("Abilities.Int", self.abilities.intelligence),
            ("Abilities.Wis", self.abilities.wisdom),
            ("Abilities.Cha", self.abilities.charisma),
        ];
        for (field, score) in scores {
            if !(1..=50).contains(&score) {
                fields.push(FieldError::new(field, "Ability score must be between 1 and 50"));
            }
        }

        if self.ac.value < 1 {
            fields.push(FieldError::new("AC.Value", "AC must be at least 1"));
        }
        if self.hp.value < 1 {
            fields.push(FieldError::new("HP.Value", "HP must be at least 1"));
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(fields)
        }
    }
}
