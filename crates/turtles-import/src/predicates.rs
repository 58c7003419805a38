//! Filters deciding whether a CAPI cluster is handled by this controller at all

use kube::api::ObjectMeta;

use turtles_common::{IMPORTED_ANNOTATION, WATCH_FILTER_LABEL};

/// Label selector restricting the primary watch to one shard
pub fn watch_filter_selector(filter: &str) -> String {
    format!("{}={}", WATCH_FILTER_LABEL, filter)
}

/// Whether the object belongs to the configured shard
///
/// With no filter configured every object matches.
pub fn has_filter_label(meta: &ObjectMeta, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(expected) => meta
            .labels
            .as_ref()
            .and_then(|labels| labels.get(WATCH_FILTER_LABEL))
            .is_some_and(|value| value == expected),
    }
}

/// Whether the cluster is already marked as imported
pub fn is_imported(meta: &ObjectMeta) -> bool {
    meta.annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(IMPORTED_ANNOTATION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn labelled(value: &str) -> ObjectMeta {
        ObjectMeta {
            labels: Some(BTreeMap::from([(
                WATCH_FILTER_LABEL.to_string(),
                value.to_string(),
            )])),
            ..Default::default()
        }
    }

    #[test]
    fn no_filter_matches_everything() {
        assert!(has_filter_label(&ObjectMeta::default(), None));
        assert!(has_filter_label(&labelled("shard-a"), None));
    }

    #[test]
    fn filter_requires_matching_label() {
        assert!(has_filter_label(&labelled("shard-a"), Some("shard-a")));
        assert!(!has_filter_label(&labelled("shard-b"), Some("shard-a")));
        assert!(!has_filter_label(&ObjectMeta::default(), Some("shard-a")));
    }

    #[test]
    fn selector_uses_watch_filter_label() {
        assert_eq!(
            watch_filter_selector("shard-a"),
            "cluster.x-k8s.io/watch-filter=shard-a"
        );
    }

    #[test]
    fn imported_annotation_is_detected_by_presence() {
        assert!(!is_imported(&ObjectMeta::default()));
        let meta = ObjectMeta {
            annotations: Some(BTreeMap::from([(
                IMPORTED_ANNOTATION.to_string(),
                String::new(),
            )])),
            ..Default::default()
        };
        assert!(is_imported(&meta));
    }
}
