//! Church onboarding wizard
//!
//! A new account has no church until it walks through three steps:
//!
//! 1. **Basics**: church name (required) and timezone
//! 2. **Details**: contact and address, all optional
//! 3. **Modules**: which features to turn on (all by default)
//!
//! The client posts the whole form on each step; the server validates only
//! the step being left, so a blank name on step 1 keeps the user on step 1.
//! The final submit validates every step and yields a [`CreateChurch`].

use serde::{Deserialize, Serialize};
use validator::{ValidateEmail, ValidateUrl};

use crate::models::church::{overlong_field, ChurchModule, CreateChurch};
use crate::models::non_blank;

pub const FIRST_STEP: u8 = 1;
pub const LAST_STEP: u8 = 3;
pub const MAX_NAME_LENGTH: usize = 255;
pub const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OnboardingError {
    #[error("Church name is required")]
    NameRequired,

    #[error("Church name must be at most {max} characters")]
    NameTooLong { max: usize },

    #[error("Unknown timezone '{0}'")]
    InvalidTimezone(String),

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Invalid website URL")]
    InvalidWebsite,

    #[error("{field} must be at most {max} characters")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("Select at least one module")]
    NoModules,

    #[error("Onboarding has no step {0}")]
    UnknownStep(u8),
}

impl OnboardingError {
    /// Form field the error belongs to
    pub fn field(&self) -> &'static str {
        match self {
            OnboardingError::NameRequired | OnboardingError::NameTooLong { .. } => "name",
            OnboardingError::InvalidTimezone(_) => "timezone",
            OnboardingError::InvalidEmail => "email",
            OnboardingError::InvalidWebsite => "website_url",
            OnboardingError::FieldTooLong { field, .. } => *field,
            OnboardingError::NoModules => "enabled_modules",
            OnboardingError::UnknownStep(_) => "step",
        }
    }
}

/// Everything the wizard collects, across all steps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardingForm {
    // step 1
    pub name: String,
    pub timezone: Option<String>,

    // step 2
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub website_url: Option<String>,

    // step 3; `None` means every module
    pub enabled_modules: Option<Vec<ChurchModule>>,
}

/// Body of `POST /api/onboarding/validate`
#[derive(Debug, Clone, Deserialize)]
pub struct StepSubmission {
    pub step: u8,
    #[serde(flatten)]
    pub form: OnboardingForm,
}

/// Reply to a step validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub step: u8,
    /// `None` once the last step validates
    pub next_step: Option<u8>,
    pub complete: bool,
}

/// Wizard state: the form plus the step the user is on
#[derive(Debug, Clone)]
pub struct OnboardingWizard {
    form: OnboardingForm,
    step: u8,
}

impl OnboardingWizard {
    pub fn new(form: OnboardingForm) -> Self {
        Self {
            form,
            step: FIRST_STEP,
        }
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn form(&self) -> &OnboardingForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut OnboardingForm {
        &mut self.form
    }

    /// Validates the fields owned by `step`
    pub fn validate_step(&self, step: u8) -> Result<(), OnboardingError> {
        match step {
            1 => self.validate_basics(),
            2 => self.validate_details(),
            3 => self.validate_modules(),
            other => Err(OnboardingError::UnknownStep(other)),
        }
    }

    /// Validates `step` and reports where the wizard goes next
    pub fn check_step(&self, step: u8) -> Result<StepResult, OnboardingError> {
        self.validate_step(step)?;
        let next_step = (step < LAST_STEP).then_some(step + 1);
        Ok(StepResult {
            step,
            next_step,
            complete: next_step.is_none(),
        })
    }

    /// Moves forward one step when the current one is valid
    ///
    /// On error the wizard stays where it is.
    pub fn advance(&mut self) -> Result<u8, OnboardingError> {
        let result = self.check_step(self.step)?;
        if let Some(next) = result.next_step {
            self.step = next;
        }
        Ok(self.step)
    }

    pub fn back(&mut self) -> u8 {
        if self.step > FIRST_STEP {
            self.step -= 1;
        }
        self.step
    }

    /// Validates every step and builds the church to create
    pub fn finish(self) -> Result<CreateChurch, OnboardingError> {
        for step in FIRST_STEP..=LAST_STEP {
            self.validate_step(step)?;
        }

        let form = self.form;
        let enabled_modules = match form.enabled_modules {
            Some(modules) => modules,
            None => ChurchModule::ALL.to_vec(),
        };

        Ok(CreateChurch {
            name: form.name.trim().to_string(),
            timezone: non_blank(form.timezone)
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            email: non_blank(form.email),
            phone: non_blank(form.phone),
            address: non_blank(form.address),
            city: non_blank(form.city),
            state: non_blank(form.state),
            postal_code: non_blank(form.postal_code),
            country: non_blank(form.country),
            website_url: non_blank(form.website_url),
            enabled_modules,
        })
    }

    fn validate_basics(&self) -> Result<(), OnboardingError> {
        let name = self.form.name.trim();
        if name.is_empty() {
            return Err(OnboardingError::NameRequired);
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(OnboardingError::NameTooLong {
                max: MAX_NAME_LENGTH,
            });
        }

        if let Some(tz) = self.form.timezone.as_deref().map(str::trim) {
            if !tz.is_empty() && !looks_like_timezone(tz) {
                return Err(OnboardingError::InvalidTimezone(tz.to_string()));
            }
        }

        Ok(())
    }

    fn validate_details(&self) -> Result<(), OnboardingError> {
        let f = &self.form;
        if let Some((field, max)) = overlong_field([
            ("email", f.email.as_deref()),
            ("phone", f.phone.as_deref()),
            ("address", f.address.as_deref()),
            ("city", f.city.as_deref()),
            ("state", f.state.as_deref()),
            ("postal_code", f.postal_code.as_deref()),
            ("country", f.country.as_deref()),
            ("website_url", f.website_url.as_deref()),
        ]) {
            return Err(OnboardingError::FieldTooLong { field, max });
        }

        if let Some(email) = self.form.email.as_deref().map(str::trim) {
            if !email.is_empty() && !email.validate_email() {
                return Err(OnboardingError::InvalidEmail);
            }
        }

        if let Some(url) = self.form.website_url.as_deref().map(str::trim) {
            if !url.is_empty() && !url.validate_url() {
                return Err(OnboardingError::InvalidWebsite);
            }
        }

        Ok(())
    }

    fn validate_modules(&self) -> Result<(), OnboardingError> {
        match &self.form.enabled_modules {
            Some(modules) if modules.is_empty() => Err(OnboardingError::NoModules),
            _ => Ok(()),
        }
    }
}

/// IANA-style name such as `UTC` or `America/Chicago`
fn looks_like_timezone(tz: &str) -> bool {
    tz.len() <= 64
        && tz
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-' | '+'))
        && !tz.starts_with('/')
        && !tz.ends_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str) -> OnboardingForm {
        OnboardingForm {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_name_blocks_step_one() {
        let mut wizard = OnboardingWizard::new(form("   "));
        assert_eq!(wizard.advance(), Err(OnboardingError::NameRequired));
        assert_eq!(wizard.step(), 1);
    }

    #[test]
    fn test_valid_name_advances() {
        let mut wizard = OnboardingWizard::new(form("Grace Fellowship"));
        assert_eq!(wizard.advance(), Ok(2));
        assert_eq!(wizard.advance(), Ok(3));
        assert_eq!(wizard.advance(), Ok(3));
        assert_eq!(wizard.back(), 2);
    }

    #[test]
    fn test_check_step_reports_next() {
        let wizard = OnboardingWizard::new(form("Grace"));
        assert_eq!(
            wizard.check_step(1),
            Ok(StepResult {
                step: 1,
                next_step: Some(2),
                complete: false
            })
        );
        assert_eq!(wizard.check_step(3).unwrap().next_step, None);
        assert_eq!(wizard.check_step(4), Err(OnboardingError::UnknownStep(4)));
    }

    #[test]
    fn test_step_two_checks_contact() {
        let mut f = form("Grace");
        f.email = Some("not-an-email".to_string());
        let wizard = OnboardingWizard::new(f);
        assert_eq!(wizard.validate_step(2), Err(OnboardingError::InvalidEmail));
        assert_eq!(OnboardingError::InvalidEmail.field(), "email");

        let mut f = form("Grace");
        f.website_url = Some("grace church".to_string());
        assert_eq!(
            OnboardingWizard::new(f).validate_step(2),
            Err(OnboardingError::InvalidWebsite)
        );
    }

    #[test]
    fn test_step_two_rejects_values_wider_than_columns() {
        let mut f = form("Grace");
        f.postal_code = Some("1".repeat(21));
        let err = OnboardingWizard::new(f).validate_step(2).unwrap_err();
        assert_eq!(
            err,
            OnboardingError::FieldTooLong {
                field: "postal_code",
                max: 20
            }
        );
        assert_eq!(err.field(), "postal_code");

        let mut f = form("Grace");
        f.phone = Some("5".repeat(50));
        f.city = Some("c".repeat(100));
        assert!(OnboardingWizard::new(f).validate_step(2).is_ok());
    }

    #[test]
    fn test_timezone_shape() {
        let mut f = form("Grace");
        f.timezone = Some("America/Chicago".to_string());
        assert!(OnboardingWizard::new(f).validate_step(1).is_ok());

        let mut f = form("Grace");
        f.timezone = Some("Mars Base One".to_string());
        assert!(matches!(
            OnboardingWizard::new(f).validate_step(1),
            Err(OnboardingError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn test_empty_module_list_rejected() {
        let mut f = form("Grace");
        f.enabled_modules = Some(Vec::new());
        assert_eq!(
            OnboardingWizard::new(f).validate_step(3),
            Err(OnboardingError::NoModules)
        );
    }

    #[test]
    fn test_finish_defaults() {
        let mut f = form("  Grace Fellowship ");
        f.city = Some("   ".to_string());
        let church = OnboardingWizard::new(f).finish().unwrap();

        assert_eq!(church.name, "Grace Fellowship");
        assert_eq!(church.timezone, DEFAULT_TIMEZONE);
        assert_eq!(church.city, None);
        assert_eq!(church.enabled_modules.len(), ChurchModule::ALL.len());
    }

    #[test]
    fn test_finish_validates_every_step() {
        assert_eq!(
            OnboardingWizard::new(form("")).finish().unwrap_err(),
            OnboardingError::NameRequired
        );
    }

    #[test]
    fn test_step_submission_parses_flat_body() {
        let submission: StepSubmission = serde_json::from_value(serde_json::json!({
            "step": 3,
            "name": "Grace",
            "enabled_modules": ["members", "check_in"]
        }))
        .unwrap();

        assert_eq!(submission.step, 3);
        assert_eq!(
            submission.form.enabled_modules,
            Some(vec![ChurchModule::Members, ChurchModule::CheckIn])
        );
    }
}
