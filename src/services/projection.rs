use futures_util::future::join_all;

use crate::errors::AppError;
use crate::models::feature::{FeatureCategory, FeatureWithId};
use crate::models::monster::{FeatureEntry, Monster};
use crate::store::{DocumentStore, FEATURES};

/// Re-derives a monster's four category arrays from its `FeatureIds`,
/// fetching every referenced feature document. Ids that no longer resolve
/// are dropped from the projection, not errored. `FeatureIds` itself is
/// left untouched; the caller persists the result.
pub async fn rebuild_embedded_arrays(
    store: &dyn DocumentStore,
    user_id: &str,
    monster: Monster,
) -> Result<Monster, AppError> {
    let ids = monster.feature_ids.clone().unwrap_or_default();

    let fetched = join_all(ids.iter().map(|id| store.get(FEATURES, user_id, id))).await;
    let mut features = Vec::with_capacity(ids.len());
    for (id, doc) in ids.iter().zip(fetched) {
        if let Some(doc) = doc? {
            features.push(FeatureWithId {
                id: id.clone(),
                feature: serde_json::from_value(doc)?,
            });
        }
    }

    Ok(project_features(monster, &features))
}

/// Pure half of the rebuild: buckets `features` (already in `FeatureIds`
/// order) into the four category arrays, projecting each feature down to
/// `{Name, Content, Usage?}`.
pub fn project_features(mut monster: Monster, features: &[FeatureWithId]) -> Monster {
    let pick = |category: FeatureCategory| -> Vec<FeatureEntry> {
        features
            .iter()
            .filter(|f| f.feature.category == category)
            .map(|f| FeatureEntry {
                name: f.feature.name.clone(),
                content: f.feature.content.clone(),
                usage: f.feature.usage.clone(),
            })
            .collect()
    };

    monster.traits = pick(FeatureCategory::Traits);
    monster.actions = pick(FeatureCategory::Actions);
    monster.reactions = pick(FeatureCategory::Reactions);
    monster.legendary_actions = pick(FeatureCategory::LegendaryActions);
    monster
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::feature::Feature;

    fn feature(id: &str, name: &str, category: FeatureCategory) -> FeatureWithId {
        FeatureWithId {
            id: id.to_string(),
            feature: Feature {
                name: name.to_string(),
                content: format!("{} description", name),
                usage: None,
                category,
            },
        }
    }

    #[test]
    fn buckets_by_category_preserving_id_order() {
        let mut monster = Monster::default();
        monster.feature_ids = Some(vec!["t1".into(), "a1".into(), "t2".into()]);
        let features = [
            feature("t1", "Keen Smell", FeatureCategory::Traits),
            feature("a1", "Bite", FeatureCategory::Actions),
            feature("t2", "Pack Tactics", FeatureCategory::Traits),
        ];

        let monster = project_features(monster, &features);

        let trait_names: Vec<&str> = monster.traits.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(trait_names, ["Keen Smell", "Pack Tactics"]);
        assert_eq!(monster.actions.len(), 1);
        assert_eq!(monster.actions[0].name, "Bite");
        assert!(monster.reactions.is_empty());
        assert!(monster.legendary_actions.is_empty());
        // The id list is not the projection's to change.
        assert_eq!(monster.feature_ids.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn unresolved_ids_are_dropped_silently() {
        let mut monster = Monster::default();
        monster.feature_ids = Some(vec!["t1".into(), "gone".into()]);
        let features = [feature("t1", "Keen Smell", FeatureCategory::Traits)];

        let monster = project_features(monster, &features);

        assert_eq!(monster.traits.len(), 1);
        assert_eq!(monster.feature_ids.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn usage_is_carried_but_stale_entries_are_replaced() {
        let mut monster = Monster::default();
        monster.traits = vec![FeatureEntry {
            name: "Old Entry".to_string(),
            content: "stale".to_string(),
            usage: None,
        }];
        monster.feature_ids = Some(vec!["a1".into()]);

        let mut with_usage = feature("a1", "Breath Weapon", FeatureCategory::Actions);
        with_usage.feature.usage = Some("Recharge 5-6".to_string());

        let monster = project_features(monster, &[with_usage]);

        assert!(monster.traits.is_empty());
        assert_eq!(monster.actions[0].usage.as_deref(), Some("Recharge 5-6"));
    }
}
