//! Ready-made form definitions and settings for tests.

use formflow_core::settings::{JumpPolicy, Settings, StorageKind};
use formflow_forms::{
    CrossFieldRule, FieldDefinition, FieldType, FormDefinition, FormValues, StepDefinition, Value,
    VisibilityRule,
};

/// Two steps: a required `name`, then a required `email`.
pub fn two_step_form() -> FormDefinition {
    FormDefinition::new(
        "profile",
        vec![
            StepDefinition::new(
                "about",
                vec![FieldDefinition::new("name", FieldType::Text).required(true)],
            )
            .title("About you"),
            StepDefinition::new(
                "contact",
                vec![FieldDefinition::new("email", FieldType::Email).required(true)],
            )
            .title("Contact"),
        ],
    )
    .expect("fixture definition is valid")
}

/// One step with a password and a confirmation that must match it.
pub fn password_form() -> FormDefinition {
    FormDefinition::new(
        "password",
        vec![StepDefinition::new(
            "credentials",
            vec![
                FieldDefinition::new("password", FieldType::Password).required(true),
                FieldDefinition::new("confirmPassword", FieldType::Password)
                    .label("Confirm password")
                    .required(true),
            ],
        )
        .rule(CrossFieldRule::matches("confirmPassword", "password"))],
    )
    .expect("fixture definition is valid")
}

/// A three-step onboarding form with a conditional field and a hidden
/// review step.
pub fn onboarding_form() -> FormDefinition {
    FormDefinition::new(
        "onboarding",
        vec![
            StepDefinition::new(
                "account",
                vec![
                    FieldDefinition::new("email", FieldType::Email).required(true),
                    FieldDefinition::new("age", FieldType::Number)
                        .required(true)
                        .min(18.0)
                        .max(100.0),
                ],
            ),
            StepDefinition::new(
                "company",
                vec![
                    FieldDefinition::new("has_company", FieldType::Switch).default_value(false),
                    FieldDefinition::new("company.name", FieldType::Text)
                        .required(true)
                        .visible_when(VisibilityRule::equals("has_company", true)),
                    FieldDefinition::new("company.website", FieldType::Url)
                        .visible_when(VisibilityRule::equals("has_company", true)),
                ],
            ),
            StepDefinition::new(
                "review",
                vec![FieldDefinition::new("terms", FieldType::Checkbox).required(true)],
            )
            .hidden_from_progress(),
        ],
    )
    .expect("fixture definition is valid")
}

/// Builds a value map from pairs.
pub fn values<I, K, V>(pairs: I) -> FormValues
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Builds test settings starting from the defaults.
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Starts from [`Settings::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `allow_back_navigation`.
    #[must_use]
    pub const fn allow_back(mut self, allow: bool) -> Self {
        self.settings.allow_back_navigation = allow;
        self
    }

    /// Sets the jump policy.
    #[must_use]
    pub const fn jump_policy(mut self, policy: JumpPolicy) -> Self {
        self.settings.jump_policy = policy;
        self
    }

    /// Sets the storage backend kind.
    #[must_use]
    pub const fn backend(mut self, kind: StorageKind) -> Self {
        self.settings.persistence.backend = kind;
        self
    }

    /// Sets the debounce delay.
    #[must_use]
    pub const fn debounce_ms(mut self, ms: u64) -> Self {
        self.settings.persistence.debounce_ms = ms;
        self
    }

    /// Sets whether a successful submit clears the snapshot.
    #[must_use]
    pub const fn clear_on_submit(mut self, clear: bool) -> Self {
        self.settings.persistence.clear_on_submit = clear;
        self
    }

    /// Disables persistence.
    #[must_use]
    pub const fn without_persistence(mut self) -> Self {
        self.settings.persistence.enabled = false;
        self
    }

    /// Returns the settings.
    pub fn build(self) -> Settings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_are_valid() {
        assert_eq!(two_step_form().step_count(), 2);
        assert_eq!(password_form().step_count(), 1);
        let onboarding = onboarding_form();
        assert_eq!(onboarding.step_of("company.name"), Some(1));
        assert!(!onboarding.step(2).unwrap().show_in_progress);
    }

    #[test]
    fn test_settings_builder() {
        let settings = SettingsBuilder::new()
            .allow_back(false)
            .jump_policy(JumpPolicy::Any)
            .debounce_ms(50)
            .clear_on_submit(false)
            .build();
        assert!(!settings.allow_back_navigation);
        assert_eq!(settings.jump_policy, JumpPolicy::Any);
        assert_eq!(settings.persistence.debounce_ms, 50);
        assert!(!settings.persistence.clear_on_submit);
        assert!(!SettingsBuilder::new().without_persistence().build().persistence.enabled);
    }

    #[test]
    fn test_values_helper() {
        let v = values([("name", "Jane")]);
        assert_eq!(v["name"], Value::from("Jane"));
    }
}
