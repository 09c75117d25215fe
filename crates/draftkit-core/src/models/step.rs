use crate::validation::{FieldRule, StepSchema};

/// One page of a wizard: its number, a title and the rules gating "Next".
#[derive(Debug, Clone)]
pub struct StepDefinition {
    pub number: u32,
    pub title: String,
    pub schema: StepSchema,
}

impl StepDefinition {
    pub fn new(number: u32, title: impl Into<String>, schema: StepSchema) -> Self {
        Self {
            number,
            title: title.into(),
            schema,
        }
    }
}

/// Field holding the step's uploaded assets.
pub const ASSETS_FIELD: &str = "assets";

/// The five-step campaign creation wizard.
pub fn campaign_wizard_steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition::new(
            1,
            "Campaign overview",
            StepSchema::new()
                .field("name", [FieldRule::Required, FieldRule::MaxLength(100)])
                .field("businessGoal", [FieldRule::Required])
                .field("startDate", [FieldRule::Required])
                .field("endDate", [FieldRule::Required])
                .field("contactEmail", [FieldRule::Email])
                .field(
                    "budget",
                    [FieldRule::Range {
                        min: Some(0.0),
                        max: None,
                    }],
                ),
        ),
        StepDefinition::new(
            2,
            "Objectives & messaging",
            StepSchema::new()
                .field("primaryKPI", [FieldRule::Required])
                .field("mainMessage", [FieldRule::Required, FieldRule::MaxLength(500)]),
        ),
        StepDefinition::new(
            3,
            "Target audience",
            StepSchema::new()
                .field("locations", [FieldRule::MinItems(1)])
                .field("ageRange", [FieldRule::Required]),
        ),
        StepDefinition::new(
            4,
            "Creative assets",
            StepSchema::new()
                .field(ASSETS_FIELD, [FieldRule::MinItems(1)])
                .field("landingPage", [FieldRule::Url]),
        ),
        StepDefinition::new(5, "Review", StepSchema::new()),
    ]
}
