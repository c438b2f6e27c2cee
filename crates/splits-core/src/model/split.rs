use serde::{Deserialize, Serialize};

/// A weighted variant within a split's current registry.
///
/// Weights are carried for the surrounding assignment engine; this store
/// does not select variants itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    #[serde(default)]
    pub weight: u32,
}

/// An experiment definition owning a named set of valid variants.
///
/// The variant set is *current* state: it can change over a split's life,
/// which is why assignments re-check membership on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub split_id: i64,
    pub name: String,
    pub variants: Vec<Variant>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl Split {
    /// Membership test over the current variant-name set.
    #[must_use]
    pub fn has_variant(&self, name: &str) -> bool {
        self.variants.iter().any(|v| v.name == name)
    }

    /// Current variant names in registry order.
    #[must_use]
    pub fn variant_names(&self) -> Vec<&str> {
        self.variants.iter().map(|v| v.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Split, Variant};

    fn button_color() -> Split {
        Split {
            split_id: 1,
            name: "button_color".to_string(),
            variants: vec![
                Variant {
                    name: "red".to_string(),
                    weight: 50,
                },
                Variant {
                    name: "blue".to_string(),
                    weight: 50,
                },
            ],
            created_at_us: 0,
            updated_at_us: 0,
        }
    }

    #[test]
    fn has_variant_checks_current_set() {
        let split = button_color();
        assert!(split.has_variant("red"));
        assert!(split.has_variant("blue"));
        assert!(!split.has_variant("green"));
    }

    #[test]
    fn membership_is_exact_not_prefix() {
        let split = button_color();
        assert!(!split.has_variant("re"));
        assert!(!split.has_variant("RED"));
    }

    #[test]
    fn variant_names_preserve_registry_order() {
        let split = button_color();
        assert_eq!(split.variant_names(), vec!["red", "blue"]);
    }
}
