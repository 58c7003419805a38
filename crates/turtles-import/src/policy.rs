//! Auto-import policy resolution
//!
//! Decides whether a CAPI cluster should be imported into Rancher from the
//! `rancher-auto-import` annotation. Sources are consulted in precedence order
//! (cluster first, then its namespace) and the first one carrying the
//! annotation decides, whatever its value. No I/O happens here.

use kube::api::ObjectMeta;

use turtles_common::AUTO_IMPORT_ANNOTATION;

/// Outcome of looking up the auto-import annotation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AutoImportDecision {
    /// Whether the annotation was found
    pub present: bool,
    /// Parsed value (false when absent or malformed)
    pub value: bool,
}

impl AutoImportDecision {
    /// Decision for a source without the annotation
    pub const ABSENT: Self = Self {
        present: false,
        value: false,
    };

    /// Read the annotation from a single metadata source
    pub fn from_meta(meta: &ObjectMeta) -> Self {
        match meta
            .annotations
            .as_ref()
            .and_then(|a| a.get(AUTO_IMPORT_ANNOTATION))
        {
            Some(raw) => Self {
                present: true,
                value: parse_bool(raw).unwrap_or(false),
            },
            None => Self::ABSENT,
        }
    }

    /// Whether the cluster should be auto-imported
    pub fn is_eligible(&self) -> bool {
        self.present && self.value
    }
}

/// Resolve the decision over metadata sources in precedence order.
///
/// Short-circuits on the first source that carries the annotation.
pub fn resolve<'a, I>(sources: I) -> AutoImportDecision
where
    I: IntoIterator<Item = &'a ObjectMeta>,
{
    sources
        .into_iter()
        .map(AutoImportDecision::from_meta)
        .find(|decision| decision.present)
        .unwrap_or(AutoImportDecision::ABSENT)
}

/// Lenient boolean parsing (`1`, `t`, `TRUE`, `False`, ...)
fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn meta(value: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            name: Some("obj".to_string()),
            annotations: value.map(|v| {
                BTreeMap::from([(AUTO_IMPORT_ANNOTATION.to_string(), v.to_string())])
            }),
            ..Default::default()
        }
    }

    #[test]
    fn absent_everywhere_is_not_eligible() {
        let decision = resolve([&meta(None), &meta(None)]);
        assert_eq!(decision, AutoImportDecision::ABSENT);
        assert!(!decision.is_eligible());
    }

    #[test]
    fn resource_level_overrides_namespace_regardless_of_value() {
        let cases = [
            ("true", "false", true),
            ("false", "true", false),
            ("garbage", "true", false),
            ("1", "0", true),
        ];
        for (resource, namespace, expected) in cases {
            let decision = resolve([&meta(Some(resource)), &meta(Some(namespace))]);
            assert!(decision.present);
            assert_eq!(
                decision.is_eligible(),
                expected,
                "resource={resource} namespace={namespace}"
            );
        }
    }

    #[test]
    fn namespace_level_applies_when_resource_silent() {
        assert!(resolve([&meta(None), &meta(Some("true"))]).is_eligible());
        assert!(!resolve([&meta(None), &meta(Some("false"))]).is_eligible());
    }

    #[test]
    fn malformed_value_is_present_false() {
        let decision = AutoImportDecision::from_meta(&meta(Some("yes please")));
        assert_eq!(
            decision,
            AutoImportDecision {
                present: true,
                value: false
            }
        );
    }

    #[test]
    fn other_annotations_are_ignored() {
        let mut m = meta(None);
        m.annotations = Some(BTreeMap::from([(
            "some-other-annotation".to_string(),
            "true".to_string(),
        )]));
        assert_eq!(AutoImportDecision::from_meta(&m), AutoImportDecision::ABSENT);
    }

    #[test]
    fn lenient_boolean_forms() {
        for raw in ["1", "t", "T", "true", "TRUE", "True"] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["0", "f", "F", "false", "FALSE", "False"] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        for raw in ["", "yes", "tRuE", " true"] {
            assert_eq!(parse_bool(raw), None, "{raw}");
        }
    }

    #[test]
    fn empty_source_list_is_absent() {
        let sources: Vec<&ObjectMeta> = Vec::new();
        assert_eq!(resolve(sources), AutoImportDecision::ABSENT);
    }
}
